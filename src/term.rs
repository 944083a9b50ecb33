// SPDX-License-Identifier: MPL-2.0

//! A positive or negative constraint on one package.

use std::fmt::{self, Display};

use version_interval::IntervalSet;

use crate::condition::Condition;
use crate::package::Package;
use crate::version::Version;

/// A dependency constraint: a package, a condition and a polarity.
///
/// A positive term ("lodash >=1.0.0") requires the package to satisfy the
/// condition; a negative term ("not lodash ==1.5.0") excludes the matching
/// versions. Terms are the literals of the solver's clauses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term<P, V> {
    package: P,
    condition: Condition<V>,
    positive: bool,
}

impl<P: Package, V: Version> Term<P, V> {
    /// A positive term requiring the package to satisfy the condition.
    pub fn new(package: P, condition: Condition<V>) -> Self {
        Term {
            package,
            condition,
            positive: true,
        }
    }

    /// A negative term excluding versions matching the condition.
    pub fn negative(package: P, condition: Condition<V>) -> Self {
        Term {
            package,
            condition,
            positive: false,
        }
    }

    pub fn package(&self) -> &P {
        &self.package
    }

    pub fn condition(&self) -> &Condition<V> {
        &self.condition
    }

    pub fn is_positive(&self) -> bool {
        self.positive
    }

    /// The logical negation: same package and condition, flipped polarity.
    pub fn negate(&self) -> Self {
        Term {
            package: self.package.clone(),
            condition: self.condition.clone(),
            positive: !self.positive,
        }
    }

    /// Whether a concrete selection satisfies the term, `None` meaning the
    /// package is not selected at all.
    pub fn satisfied_by_version(&self, version: Option<&V>) -> bool {
        match version {
            None => !self.positive,
            Some(version) => self.condition.satisfies(version) == self.positive,
        }
    }

    /// The set a positive term allows; `None` for negative terms and
    /// opaque conditions.
    pub(crate) fn allowed_set(&self) -> Option<IntervalSet<V>> {
        if self.positive {
            self.condition.to_set()
        } else {
            None
        }
    }

    /// The set a negative term forbids; `None` for positive terms and
    /// opaque conditions.
    pub(crate) fn forbidden_set(&self) -> Option<IntervalSet<V>> {
        if self.positive {
            None
        } else {
            self.condition.to_set()
        }
    }

    /// Narrow a package's allowed set by this term.
    ///
    /// Opaque conditions cannot narrow anything and leave the set as is.
    pub(crate) fn apply_to(&self, current: &IntervalSet<V>) -> IntervalSet<V> {
        if self.positive {
            match self.allowed_set() {
                Some(allowed) => current.intersection(&allowed),
                None => current.clone(),
            }
        } else {
            match self.forbidden_set() {
                Some(forbidden) => current.intersection(&forbidden.complement()),
                None => current.clone(),
            }
        }
    }

    /// Whether the term's condition cannot be expressed as a version set.
    pub(crate) fn is_opaque(&self) -> bool {
        self.condition.to_set().is_none()
    }

    /// A positive term for the given allowed set, preferring the
    /// equality shape when the set pins a single version.
    pub(crate) fn from_allowed_set(package: P, set: IntervalSet<V>) -> Self {
        match set.as_singleton() {
            Some(version) => Term::new(package, Condition::Exact(version.clone())),
            None => Term::new(package, Condition::Set(set)),
        }
    }

    /// A negative term forbidding the given set.
    pub(crate) fn from_forbidden_set(package: P, set: IntervalSet<V>) -> Self {
        Term::negative(package, Condition::Set(set))
    }
}

impl<P: Package, V: Version> Display for Term<P, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let condition = self.condition.to_string();
        match (self.positive, condition.as_str()) {
            (true, "*") => write!(f, "{}", self.package),
            (true, _) => write!(f, "{} {}", self.package, condition),
            (false, "*") => write!(f, "not {}", self.package),
            (false, _) => write!(f, "not {} {}", self.package, condition),
        }
    }
}
