// SPDX-License-Identifier: MPL-2.0

//! Sets of versions represented as sorted, disjoint intervals.
//!
//! An [`IntervalSet`] is kept in canonical form: intervals are non-empty,
//! sorted by lower bound, and no two intervals touch (overlap, or sit
//! directly next to each other with compatible inclusivity). Because the
//! representation is canonical, structural equality is set equality:
//! `>=1,<2 || >=2,<3` and `>=1,<3` normalize to the same value.
//!
//! The element type only needs a total order. Nothing here assumes versions
//! are dense or discrete, so two intervals separated by a finite gap are
//! never merged even if no version happens to live in the gap.
//!
//! ```
//! use version_interval::IntervalSet;
//!
//! let one_x: IntervalSet<u32> = IntervalSet::between(100, 200);
//! let newer = IntervalSet::higher_than(150);
//! assert_eq!(one_x.intersection(&newer), IntervalSet::between(150, 200));
//! assert!(one_x.union(&one_x.complement()) == IntervalSet::full());
//! ```

use std::cmp::Ordering;
use std::fmt;

#[cfg(any(test, feature = "proptest"))]
pub mod testing;

/// One end of a version interval.
///
/// Lower and upper bounds compare differently when versions tie: an
/// inclusive lower bound precedes an exclusive one, while an inclusive
/// upper bound follows an exclusive one. Those orders live in
/// [`Bound::cmp_lower`] and [`Bound::cmp_upper`] rather than an `Ord`
/// implementation, so the two cannot be confused.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Bound<V> {
    NegativeInfinity,
    Finite { version: V, inclusive: bool },
    PositiveInfinity,
}

impl<V> Bound<V> {
    /// A finite bound that admits its own version.
    pub fn inclusive(version: V) -> Self {
        Bound::Finite {
            version,
            inclusive: true,
        }
    }

    /// A finite bound that excludes its own version.
    pub fn exclusive(version: V) -> Self {
        Bound::Finite {
            version,
            inclusive: false,
        }
    }

    fn as_finite(&self) -> Option<(&V, bool)> {
        match self {
            Bound::Finite { version, inclusive } => Some((version, *inclusive)),
            _ => None,
        }
    }
}

impl<V: Ord> Bound<V> {
    /// Compare two bounds in lower-bound position.
    pub fn cmp_lower(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Bound::NegativeInfinity, Bound::NegativeInfinity) => Ordering::Equal,
            (Bound::NegativeInfinity, _) => Ordering::Less,
            (_, Bound::NegativeInfinity) => Ordering::Greater,
            (Bound::PositiveInfinity, Bound::PositiveInfinity) => Ordering::Equal,
            (Bound::PositiveInfinity, _) => Ordering::Greater,
            (_, Bound::PositiveInfinity) => Ordering::Less,
            (
                Bound::Finite {
                    version: a,
                    inclusive: a_inc,
                },
                Bound::Finite {
                    version: b,
                    inclusive: b_inc,
                },
            ) => a.cmp(b).then(match (a_inc, b_inc) {
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                _ => Ordering::Equal,
            }),
        }
    }

    /// Compare two bounds in upper-bound position.
    pub fn cmp_upper(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Bound::PositiveInfinity, Bound::PositiveInfinity) => Ordering::Equal,
            (Bound::PositiveInfinity, _) => Ordering::Greater,
            (_, Bound::PositiveInfinity) => Ordering::Less,
            (Bound::NegativeInfinity, Bound::NegativeInfinity) => Ordering::Equal,
            (Bound::NegativeInfinity, _) => Ordering::Less,
            (_, Bound::NegativeInfinity) => Ordering::Greater,
            (
                Bound::Finite {
                    version: a,
                    inclusive: a_inc,
                },
                Bound::Finite {
                    version: b,
                    inclusive: b_inc,
                },
            ) => a.cmp(b).then(match (a_inc, b_inc) {
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                _ => Ordering::Equal,
            }),
        }
    }
}

/// Whether `upper` ends before `lower` begins, leaving no common version.
///
/// Equal versions share a point only when both bounds are inclusive.
fn no_overlap<V: Ord>(upper: &Bound<V>, lower: &Bound<V>) -> bool {
    match (upper, lower) {
        (Bound::NegativeInfinity, l) => !matches!(l, Bound::NegativeInfinity),
        (u, Bound::PositiveInfinity) => !matches!(u, Bound::PositiveInfinity),
        (Bound::PositiveInfinity, _) => false,
        (_, Bound::NegativeInfinity) => false,
        (
            Bound::Finite {
                version: u,
                inclusive: u_inc,
            },
            Bound::Finite {
                version: l,
                inclusive: l_inc,
            },
        ) => match u.cmp(l) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => !(*u_inc && *l_inc),
        },
    }
}

/// Whether a version could separate `upper` from `lower`.
///
/// Used by the normalizer: two intervals merge only when provably
/// contiguous. `[1, 2)` followed by `[2, 3)` is contiguous, `[1, 2)`
/// followed by `(2, 3)` leaves 2 out, and a strictly smaller upper bound
/// may hide versions in between.
fn gap_between<V: Ord>(upper: &Bound<V>, lower: &Bound<V>) -> bool {
    match (upper.as_finite(), lower.as_finite()) {
        (Some((u, u_inc)), Some((l, l_inc))) => match u.cmp(l) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => !u_inc && !l_inc,
        },
        _ => no_overlap(upper, lower),
    }
}

/// A contiguous, non-empty range of versions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Interval<V> {
    lower: Bound<V>,
    upper: Bound<V>,
}

impl<V: Ord + Clone> Interval<V> {
    /// Returns `None` if the bounds enclose no version.
    fn new(lower: Bound<V>, upper: Bound<V>) -> Option<Self> {
        let interval = Interval { lower, upper };
        if interval.is_empty() {
            None
        } else {
            Some(interval)
        }
    }

    fn is_empty(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Bound::PositiveInfinity, _) | (_, Bound::NegativeInfinity) => true,
            (Bound::NegativeInfinity, _) | (_, Bound::PositiveInfinity) => false,
            (
                Bound::Finite {
                    version: lo,
                    inclusive: lo_inc,
                },
                Bound::Finite {
                    version: hi,
                    inclusive: hi_inc,
                },
            ) => match lo.cmp(hi) {
                Ordering::Less => false,
                Ordering::Greater => true,
                Ordering::Equal => !(*lo_inc && *hi_inc),
            },
        }
    }

    fn contains(&self, version: &V) -> bool {
        if let Bound::Finite {
            version: lo,
            inclusive,
        } = &self.lower
        {
            match version.cmp(lo) {
                Ordering::Less => return false,
                Ordering::Equal if !inclusive => return false,
                _ => {}
            }
        }
        if let Bound::Finite {
            version: hi,
            inclusive,
        } = &self.upper
        {
            match version.cmp(hi) {
                Ordering::Greater => return false,
                Ordering::Equal if !inclusive => return false,
                _ => {}
            }
        }
        true
    }

    fn overlaps(&self, other: &Self) -> bool {
        !no_overlap(&self.upper, &other.lower) && !no_overlap(&other.upper, &self.lower)
    }

    fn touches(&self, other: &Self) -> bool {
        !gap_between(&self.upper, &other.lower) && !gap_between(&other.upper, &self.lower)
    }

    fn covers(&self, other: &Self) -> bool {
        self.lower.cmp_lower(&other.lower) != Ordering::Greater
            && self.upper.cmp_upper(&other.upper) != Ordering::Less
    }

    fn merge(&self, other: &Self) -> Self {
        let lower = if self.lower.cmp_lower(&other.lower) != Ordering::Greater {
            self.lower.clone()
        } else {
            other.lower.clone()
        };
        let upper = if self.upper.cmp_upper(&other.upper) != Ordering::Less {
            self.upper.clone()
        } else {
            other.upper.clone()
        };
        Interval { lower, upper }
    }

    fn intersect(&self, other: &Self) -> Option<Self> {
        let lower = if self.lower.cmp_lower(&other.lower) != Ordering::Less {
            self.lower.clone()
        } else {
            other.lower.clone()
        };
        let upper = if self.upper.cmp_upper(&other.upper) != Ordering::Greater {
            self.upper.clone()
        } else {
            other.upper.clone()
        };
        Interval::new(lower, upper)
    }

    /// Lower bound of the complement region above this interval.
    fn complement_lower(&self) -> Bound<V> {
        match &self.upper {
            Bound::PositiveInfinity => Bound::PositiveInfinity,
            Bound::NegativeInfinity => Bound::NegativeInfinity,
            Bound::Finite { version, inclusive } => Bound::Finite {
                version: version.clone(),
                inclusive: !inclusive,
            },
        }
    }

    /// Upper bound of the complement region below this interval.
    fn complement_upper(&self) -> Bound<V> {
        match &self.lower {
            Bound::NegativeInfinity => Bound::NegativeInfinity,
            Bound::PositiveInfinity => Bound::PositiveInfinity,
            Bound::Finite { version, inclusive } => Bound::Finite {
                version: version.clone(),
                inclusive: !inclusive,
            },
        }
    }
}

/// Drop empty intervals, sort by lower bound, merge everything that touches.
fn normalize<V: Ord + Clone>(intervals: Vec<Interval<V>>) -> Vec<Interval<V>> {
    let mut filtered: Vec<Interval<V>> =
        intervals.into_iter().filter(|iv| !iv.is_empty()).collect();
    if filtered.is_empty() {
        return filtered;
    }
    filtered.sort_by(|a, b| a.lower.cmp_lower(&b.lower));

    let mut merged: Vec<Interval<V>> = Vec::with_capacity(filtered.len());
    for current in filtered {
        match merged.last_mut() {
            Some(last) if last.touches(&current) => *last = last.merge(&current),
            _ => merged.push(current),
        }
    }
    merged
}

/// A set of versions, canonically represented as disjoint sorted intervals.
///
/// All operations return new sets; inputs are never mutated. Equality is
/// structural and, thanks to the canonical form, coincides with set
/// equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IntervalSet<V> {
    intervals: Vec<Interval<V>>,
}

impl<V: Ord + Clone> Default for IntervalSet<V> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<V: Ord + Clone> IntervalSet<V> {
    /// The set containing no version.
    pub fn empty() -> Self {
        IntervalSet {
            intervals: Vec::new(),
        }
    }

    /// The set containing every version.
    pub fn full() -> Self {
        IntervalSet {
            intervals: vec![Interval {
                lower: Bound::NegativeInfinity,
                upper: Bound::PositiveInfinity,
            }],
        }
    }

    /// The set containing exactly one version.
    pub fn singleton(version: V) -> Self {
        IntervalSet {
            intervals: vec![Interval {
                lower: Bound::inclusive(version.clone()),
                upper: Bound::inclusive(version),
            }],
        }
    }

    /// The set of versions between the given bounds, empty if they cross.
    pub fn from_bounds(lower: Bound<V>, upper: Bound<V>) -> Self {
        match Interval::new(lower, upper) {
            Some(interval) => IntervalSet {
                intervals: vec![interval],
            },
            None => Self::empty(),
        }
    }

    /// The half-open set `[lower, upper)`.
    pub fn between(lower: V, upper: V) -> Self {
        Self::from_bounds(Bound::inclusive(lower), Bound::exclusive(upper))
    }

    /// The set of versions greater than or equal to `version`.
    pub fn higher_than(version: V) -> Self {
        Self::from_bounds(Bound::inclusive(version), Bound::PositiveInfinity)
    }

    /// The set of versions strictly greater than `version`.
    pub fn strictly_higher_than(version: V) -> Self {
        Self::from_bounds(Bound::exclusive(version), Bound::PositiveInfinity)
    }

    /// The set of versions lower than or equal to `version`.
    pub fn lower_than(version: V) -> Self {
        Self::from_bounds(Bound::NegativeInfinity, Bound::inclusive(version))
    }

    /// The set of versions strictly lower than `version`.
    pub fn strictly_lower_than(version: V) -> Self {
        Self::from_bounds(Bound::NegativeInfinity, Bound::exclusive(version))
    }

    /// Versions in either set.
    pub fn union(&self, other: &Self) -> Self {
        let mut intervals = self.intervals.clone();
        intervals.extend(other.intervals.iter().cloned());
        IntervalSet {
            intervals: normalize(intervals),
        }
    }

    /// Versions in both sets.
    ///
    /// Sweeps both sequences at once, emitting the overlap of the current
    /// pair and advancing whichever interval ends first.
    pub fn intersection(&self, other: &Self) -> Self {
        if self.intervals.is_empty() || other.intervals.is_empty() {
            return Self::empty();
        }

        let mut result = Vec::with_capacity(self.intervals.len());
        let (mut i, mut j) = (0, 0);
        while i < self.intervals.len() && j < other.intervals.len() {
            let (a, b) = (&self.intervals[i], &other.intervals[j]);
            if let Some(interval) = a.intersect(b) {
                result.push(interval);
            }
            if a.upper.cmp_upper(&b.upper) == Ordering::Less {
                i += 1;
            } else {
                j += 1;
            }
        }
        IntervalSet { intervals: result }
    }

    /// Versions not in this set.
    ///
    /// Walks the intervals left to right, emitting the gap before each one
    /// and finally the tail up to positive infinity.
    pub fn complement(&self) -> Self {
        if self.intervals.is_empty() {
            return Self::full();
        }

        let mut gaps = Vec::with_capacity(self.intervals.len() + 1);
        let mut rolling = Bound::NegativeInfinity;
        for interval in &self.intervals {
            if let Some(gap) = Interval::new(rolling, interval.complement_upper()) {
                gaps.push(gap);
            }
            rolling = interval.complement_lower();
        }
        if let Some(tail) = Interval::new(rolling, Bound::PositiveInfinity) {
            gaps.push(tail);
        }
        IntervalSet { intervals: gaps }
    }

    /// Whether the version is a member of the set.
    pub fn contains(&self, version: &V) -> bool {
        self.intervals.iter().any(|iv| iv.contains(version))
    }

    /// Whether the set has no members.
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Whether every version of `self` is also in `other`.
    pub fn is_subset(&self, other: &Self) -> bool {
        if self.intervals.is_empty() {
            return true;
        }
        if other.intervals.is_empty() {
            return false;
        }

        let mut j = 0;
        for interval in &self.intervals {
            loop {
                if j >= other.intervals.len() {
                    return false;
                }
                if other.intervals[j].covers(interval) {
                    break;
                }
                if no_overlap(&other.intervals[j].upper, &interval.lower) {
                    j += 1;
                    continue;
                }
                return false;
            }
        }
        true
    }

    /// Whether the sets share no version.
    pub fn is_disjoint(&self, other: &Self) -> bool {
        let (mut i, mut j) = (0, 0);
        while i < self.intervals.len() && j < other.intervals.len() {
            let (a, b) = (&self.intervals[i], &other.intervals[j]);
            if a.overlaps(b) {
                return false;
            }
            if a.upper.cmp_upper(&b.upper) == Ordering::Less {
                i += 1;
            } else {
                j += 1;
            }
        }
        true
    }

    /// The sole member of the set, when it has exactly one.
    pub fn as_singleton(&self) -> Option<&V> {
        match self.intervals.as_slice() {
            [interval] => match (&interval.lower, &interval.upper) {
                (
                    Bound::Finite {
                        version: lo,
                        inclusive: true,
                    },
                    Bound::Finite {
                        version: hi,
                        inclusive: true,
                    },
                ) if lo == hi => Some(lo),
                _ => None,
            },
            _ => None,
        }
    }

    /// Bounds of each interval in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (&Bound<V>, &Bound<V>)> {
        self.intervals.iter().map(|iv| (&iv.lower, &iv.upper))
    }
}

impl<V: fmt::Display> fmt::Display for IntervalSet<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.intervals.is_empty() {
            return write!(f, "∅");
        }
        for (i, interval) in self.intervals.iter().enumerate() {
            if i > 0 {
                write!(f, " || ")?;
            }
            fmt_interval(interval, f)?;
        }
        Ok(())
    }
}

fn fmt_interval<V: fmt::Display>(interval: &Interval<V>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match (&interval.lower, &interval.upper) {
        (Bound::NegativeInfinity, Bound::PositiveInfinity) => write!(f, "*"),
        (
            Bound::Finite {
                version: lo,
                inclusive: true,
            },
            Bound::Finite {
                version: hi,
                inclusive: true,
            },
        ) if lo.to_string() == hi.to_string() => write!(f, "=={lo}"),
        (lower, upper) => {
            let mut wrote = false;
            if let Bound::Finite { version, inclusive } = lower {
                let op = if *inclusive { ">=" } else { ">" };
                write!(f, "{op}{version}")?;
                wrote = true;
            }
            if let Bound::Finite { version, inclusive } = upper {
                if wrote {
                    write!(f, ", ")?;
                }
                let op = if *inclusive { "<=" } else { "<" };
                write!(f, "{op}{version}")?;
                wrote = true;
            }
            if !wrote {
                write!(f, "*")?;
            }
            Ok(())
        }
    }
}
