// SPDX-License-Identifier: MPL-2.0

//! The evolving solution: assignments organized chronologically and by
//! package, with decision levels for backtracking.

use std::fmt::{self, Display};
use std::hash::BuildHasherDefault;

use indexmap::IndexMap;
use log::debug;
use rustc_hash::FxHasher;
use version_interval::IntervalSet;

use crate::condition::Condition;
use crate::internal::incompatibility::{IncompId, Incompatibility};
use crate::package::Package;
use crate::term::Term;
use crate::type_aliases::{Set, Solution};
use crate::version::Version;

type FnvIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;

/// Why an assignment exists.
#[derive(Debug, Clone)]
pub(crate) enum AssignmentKind<P: Package, V: Version> {
    /// An explicit version choice.
    Decision { version: V },
    /// A constraint implied by unit propagation, with the
    /// incompatibility that forced it.
    Derivation { cause: IncompId<P, V> },
}

/// One constraint recorded against a single package.
#[derive(Debug, Clone)]
pub(crate) struct Assignment<P: Package, V: Version> {
    pub(crate) package: P,
    pub(crate) term: Term<P, V>,
    pub(crate) kind: AssignmentKind<P, V>,
    /// For positive assignments, the effective allowed set at insertion.
    pub(crate) allowed: Option<IntervalSet<V>>,
    /// For negative assignments, the excluded set.
    pub(crate) forbidden: Option<IntervalSet<V>>,
    pub(crate) decision_level: u32,
    pub(crate) index: u64,
}

impl<P: Package, V: Version> Assignment<P, V> {
    pub(crate) fn is_decision(&self) -> bool {
        matches!(self.kind, AssignmentKind::Decision { .. })
    }

    pub(crate) fn cause(&self) -> Option<IncompId<P, V>> {
        match self.kind {
            AssignmentKind::Derivation { cause } => Some(cause),
            AssignmentKind::Decision { .. } => None,
        }
    }
}

impl<P: Package, V: Version> Display for Assignment<P, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_decision() {
            "decision"
        } else {
            "derivation"
        };
        write!(
            f,
            "{} [{kind}, level {}, index {}]",
            self.term, self.decision_level, self.index
        )
    }
}

/// Raised when a derivation would leave a package with no admissible
/// version; the engine upgrades it to a conflict.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct NoAllowedVersions;

/// All assignments made so far, indexed both globally (for satisfier
/// ordering) and per package (for allowed-set computation).
///
/// Both indexes always describe the same assignments: backtracking
/// truncates them in lockstep.
#[derive(Debug, Clone)]
pub(crate) struct PartialSolution<P: Package, V: Version> {
    /// Every assignment, in insertion order.
    assignments: Vec<Assignment<P, V>>,
    /// Positions into `assignments`, stacked per package.
    per_package: FnvIndexMap<P, Vec<usize>>,
    decision_level: u32,
    next_index: u64,
    root: P,
}

impl<P: Package, V: Version> PartialSolution<P, V> {
    pub(crate) fn new(root: P) -> Self {
        PartialSolution {
            assignments: Vec::new(),
            per_package: FnvIndexMap::default(),
            decision_level: 0,
            next_index: 0,
            root,
        }
    }

    pub(crate) fn root(&self) -> &P {
        &self.root
    }

    pub(crate) fn assignment(&self, position: usize) -> &Assignment<P, V> {
        &self.assignments[position]
    }

    fn push(&mut self, assignment: Assignment<P, V>) -> usize {
        let position = self.assignments.len();
        self.per_package
            .entry(assignment.package.clone())
            .or_default()
            .push(position);
        self.assignments.push(assignment);
        self.next_index += 1;
        position
    }

    fn decision(&self, package: P, version: V, level: u32) -> Assignment<P, V> {
        Assignment {
            term: Term::new(package.clone(), Condition::Exact(version.clone())),
            package,
            kind: AssignmentKind::Decision {
                version: version.clone(),
            },
            allowed: Some(IntervalSet::singleton(version)),
            forbidden: None,
            decision_level: level,
            index: self.next_index,
        }
    }

    /// Seed the root package as a decision at level 0.
    pub(crate) fn seed_root(&mut self, package: P, version: V) {
        let assignment = self.decision(package, version, 0);
        self.push(assignment);
    }

    /// Record a version choice, opening a new decision level.
    pub(crate) fn add_decision(&mut self, package: P, version: V) {
        self.decision_level += 1;
        let assignment = self.decision(package, version, self.decision_level);
        self.push(assignment);
    }

    /// The most recent assignment for a package.
    pub(crate) fn latest(&self, package: &P) -> Option<&Assignment<P, V>> {
        let position = *self.per_package.get(package)?.last()?;
        Some(&self.assignments[position])
    }

    /// The cause of the most recent assignment, when it is a derivation.
    pub(crate) fn latest_cause(&self, package: &P) -> Option<IncompId<P, V>> {
        self.latest(package)?.cause()
    }

    pub(crate) fn has_assignments(&self, package: &P) -> bool {
        self.per_package
            .get(package)
            .is_some_and(|stack| !stack.is_empty())
    }

    fn has_decision(&self, package: &P) -> bool {
        self.per_package
            .get(package)
            .is_some_and(|stack| stack.iter().any(|&p| self.assignments[p].is_decision()))
    }

    /// The versions currently admissible for a package: the intersection
    /// of every positive assignment's set with the complement of every
    /// negative assignment's set.
    ///
    /// Recomputed on every call; assignments come and go with
    /// backtracking, so the result must never be cached.
    pub(crate) fn allowed_set(&self, package: &P) -> IntervalSet<V> {
        let mut current = IntervalSet::full();
        let Some(stack) = self.per_package.get(package) else {
            return current;
        };
        for &position in stack {
            let assignment = &self.assignments[position];
            if assignment.term.is_positive() {
                if let Some(allowed) = &assignment.allowed {
                    current = current.intersection(allowed);
                }
            } else if let Some(forbidden) = &assignment.forbidden {
                current = current.intersection(&forbidden.complement());
            }
        }
        current
    }

    /// Record a constraint implied by unit propagation.
    ///
    /// Returns the position of the inserted assignment and whether the
    /// package's allowed set actually tightened. A negative derivation
    /// that tightened the set is followed by a synthetic positive
    /// assignment carrying the tightened set, so later queries read it
    /// without recomputing complements.
    pub(crate) fn add_derivation(
        &mut self,
        term: Term<P, V>,
        cause: IncompId<P, V>,
    ) -> Result<(usize, bool), NoAllowedVersions> {
        let package = term.package().clone();
        let current = self.allowed_set(&package);
        let new_allowed = term.apply_to(&current);
        if new_allowed.is_empty() {
            return Err(NoAllowedVersions);
        }

        let positive = term.is_positive();
        let changed = new_allowed != current;
        let assignment = Assignment {
            package: package.clone(),
            allowed: positive.then(|| new_allowed.clone()),
            forbidden: if positive { None } else { term.forbidden_set() },
            term,
            kind: AssignmentKind::Derivation { cause },
            decision_level: self.decision_level,
            index: self.next_index,
        };
        let position = self.push(assignment);

        if changed && !positive {
            let tightening = Assignment {
                package: package.clone(),
                term: Term::from_allowed_set(package, new_allowed.clone()),
                kind: AssignmentKind::Derivation { cause },
                allowed: Some(new_allowed),
                forbidden: None,
                decision_level: self.decision_level,
                index: self.next_index,
            };
            let position = self.push(tightening);
            return Ok((position, true));
        }

        Ok((position, changed))
    }

    /// Remove every assignment above the given decision level.
    pub(crate) fn backtrack(&mut self, level: u32) {
        debug!("backtracking to decision level {level}");
        while let Some(last) = self.assignments.last() {
            if last.decision_level <= level {
                break;
            }
            let last = self.assignments.pop().unwrap();
            if let Some(stack) = self.per_package.get_mut(&last.package) {
                stack.pop();
                if stack.is_empty() {
                    self.per_package.swap_remove(&last.package);
                }
            }
        }
        self.decision_level = level;
    }

    /// Whether every non-root package with any assignment has a decision.
    pub(crate) fn is_complete(&self) -> bool {
        self.per_package
            .keys()
            .filter(|package| **package != self.root)
            .all(|package| self.has_decision(package))
    }

    /// The next package needing a decision, in order of first appearance
    /// in the chronological log. Deterministic by construction.
    pub(crate) fn next_decision_candidate(&self) -> Option<P> {
        let mut seen: Set<&P> = Set::default();
        for assignment in &self.assignments {
            let package = &assignment.package;
            if *package == self.root || !seen.insert(package) {
                continue;
            }
            if !self.has_decision(package) {
                return Some(package.clone());
            }
        }
        None
    }

    /// The most recently inserted assignment satisfying some term of the
    /// incompatibility, or `None` when it is not satisfied yet.
    ///
    /// Only the newest satisfying assignment of each mentioned package
    /// competes; the winner is the one with the largest global index.
    pub(crate) fn satisfier(&self, incompatibility: &Incompatibility<P, V>) -> Option<usize> {
        let mut selected: Option<usize> = None;
        for term in incompatibility.terms() {
            let Some(stack) = self.per_package.get(term.package()) else {
                continue;
            };
            for &position in stack.iter().rev() {
                let assignment = &self.assignments[position];
                if term_satisfied_by(term, assignment) {
                    if selected.map_or(true, |s| self.assignments[s].index < assignment.index) {
                        selected = Some(position);
                    }
                    break;
                }
            }
        }
        selected
    }

    /// The highest decision level among assignments other than the
    /// satisfier that satisfy some term of the incompatibility; 0 if
    /// none. This is the backtrack target for clause learning.
    pub(crate) fn previous_decision_level(
        &self,
        incompatibility: &Incompatibility<P, V>,
        satisfier: usize,
    ) -> u32 {
        let mut level = 0;
        for term in incompatibility.terms() {
            let Some(stack) = self.per_package.get(term.package()) else {
                continue;
            };
            for &position in stack.iter().rev() {
                if position == satisfier {
                    continue;
                }
                let assignment = &self.assignments[position];
                if term_satisfied_by(term, assignment) && assignment.decision_level > level {
                    level = assignment.decision_level;
                }
            }
        }
        level
    }

    /// Whether every opaque-condition assignment of the package accepts
    /// the candidate version.
    ///
    /// Opaque conditions never participate in set algebra, so this
    /// pointwise check at decision time is all that enforces them.
    pub(crate) fn pointwise_allows(&self, package: &P, version: &V) -> bool {
        let Some(stack) = self.per_package.get(package) else {
            return true;
        };
        stack.iter().all(|&position| {
            let assignment = &self.assignments[position];
            !assignment.term.is_opaque() || assignment.term.satisfied_by_version(Some(version))
        })
    }

    /// The decided `(package, version)` pairs in decision order, root
    /// excluded.
    pub(crate) fn build_solution(&self) -> Solution<P, V> {
        let mut seen: Set<&P> = Set::default();
        let mut solution = Vec::new();
        for assignment in &self.assignments {
            let AssignmentKind::Decision { version } = &assignment.kind else {
                continue;
            };
            if assignment.package == self.root || !seen.insert(&assignment.package) {
                continue;
            }
            solution.push((assignment.package.clone(), version.clone()));
        }
        solution
    }
}

/// Whether an assignment satisfies a term of an incompatibility.
///
/// A positive term is satisfied when the assignment's allowed set is a
/// subset of the required set; being merely disjoint contradicts the term
/// instead, so it does not count. A negative term is satisfied when the
/// assignment's allowed set avoids the forbidden set entirely, or the
/// assignment forbids at least everything the term forbids.
pub(crate) fn term_satisfied_by<P: Package, V: Version>(
    term: &Term<P, V>,
    assignment: &Assignment<P, V>,
) -> bool {
    if term.is_positive() {
        let Some(required) = term.allowed_set() else {
            return false;
        };
        match &assignment.allowed {
            Some(allowed) => allowed.is_subset(&required),
            None => false,
        }
    } else {
        let Some(forbidden) = term.forbidden_set() else {
            return false;
        };
        if let Some(allowed) = &assignment.allowed {
            return allowed.is_disjoint(&forbidden);
        }
        match &assignment.forbidden {
            Some(excluded) => forbidden.is_subset(excluded),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internal::arena::Arena;

    fn cause() -> IncompId<&'static str, u32> {
        let mut store = Arena::new();
        store.alloc(Incompatibility::no_versions(Term::new(
            "x",
            Condition::Exact(0u32),
        )))
    }

    fn solution() -> PartialSolution<&'static str, u32> {
        let mut partial = PartialSolution::new("root");
        partial.seed_root("root", 1);
        partial
    }

    #[test]
    fn allowed_set_intersects_assignments() {
        let mut partial = solution();
        let cause = cause();
        partial
            .add_derivation(
                Term::new("pkg", Condition::Set(IntervalSet::between(0u32, 10))),
                cause,
            )
            .unwrap();
        partial
            .add_derivation(
                Term::negative("pkg", Condition::Set(IntervalSet::between(5u32, 20))),
                cause,
            )
            .unwrap();
        assert_eq!(partial.allowed_set(&"pkg"), IntervalSet::between(0, 5));
        assert_eq!(partial.allowed_set(&"unknown"), IntervalSet::full());
    }

    #[test]
    fn empty_derivation_is_rejected() {
        let mut partial = solution();
        let cause = cause();
        partial
            .add_derivation(Term::new("pkg", Condition::Exact(3u32)), cause)
            .unwrap();
        let err = partial
            .add_derivation(Term::new("pkg", Condition::Exact(4u32)), cause)
            .unwrap_err();
        assert_eq!(err, NoAllowedVersions);
    }

    #[test]
    fn negative_tightening_appends_synthetic_positive() {
        let mut partial = solution();
        let cause = cause();
        let (position, changed) = partial
            .add_derivation(
                Term::negative("pkg", Condition::Set(IntervalSet::higher_than(5u32))),
                cause,
            )
            .unwrap();
        assert!(changed);
        let synthetic = partial.assignment(position);
        assert!(synthetic.term.is_positive());
        assert_eq!(
            synthetic.allowed,
            Some(IntervalSet::strictly_lower_than(5))
        );
        // Both the negative derivation and its tightening are recorded.
        assert_eq!(partial.per_package[&"pkg"].len(), 2);
    }

    #[test]
    fn unchanged_derivation_reports_no_change() {
        let mut partial = solution();
        let cause = cause();
        partial
            .add_derivation(
                Term::new("pkg", Condition::Set(IntervalSet::between(1u32, 5))),
                cause,
            )
            .unwrap();
        let (_, changed) = partial
            .add_derivation(
                Term::new("pkg", Condition::Set(IntervalSet::between(0u32, 10))),
                cause,
            )
            .unwrap();
        assert!(!changed);
    }

    #[test]
    fn backtrack_restores_earlier_state() {
        let mut partial = solution();
        let cause = cause();
        partial
            .add_derivation(
                Term::new("a", Condition::Set(IntervalSet::between(0u32, 10))),
                cause,
            )
            .unwrap();
        partial.add_decision("a", 3);
        partial
            .add_derivation(Term::new("b", Condition::Exact(7u32)), cause)
            .unwrap();
        partial.add_decision("b", 7);

        let before = partial.allowed_set(&"a");
        partial.backtrack(1);
        assert_eq!(partial.decision_level, 1);
        assert_eq!(partial.allowed_set(&"a"), before);
        // b's level-1 derivation survives, its decision does not.
        assert!(partial.has_assignments(&"b"));
        assert_eq!(partial.next_decision_candidate(), Some("b"));

        partial.backtrack(0);
        assert!(!partial.has_assignments(&"b"));
        assert_eq!(partial.allowed_set(&"a"), IntervalSet::between(0, 10));
        // The root decision at level 0 is preserved.
        assert!(partial.has_assignments(&"root"));
    }

    #[test]
    fn completion_requires_decisions() {
        let mut partial = solution();
        let cause = cause();
        assert!(partial.is_complete());
        partial
            .add_derivation(Term::new("a", Condition::Exact(1u32)), cause)
            .unwrap();
        assert!(!partial.is_complete());
        partial.add_decision("a", 1);
        assert!(partial.is_complete());
    }

    #[test]
    fn candidates_follow_first_appearance() {
        let mut partial = solution();
        let cause = cause();
        partial
            .add_derivation(Term::new("b", Condition::Exact(1u32)), cause)
            .unwrap();
        partial
            .add_derivation(Term::new("a", Condition::Exact(1u32)), cause)
            .unwrap();
        assert_eq!(partial.next_decision_candidate(), Some("b"));
        partial.add_decision("b", 1);
        assert_eq!(partial.next_decision_candidate(), Some("a"));
        partial.add_decision("a", 1);
        assert_eq!(partial.next_decision_candidate(), None);
    }

    #[test]
    fn satisfier_picks_latest_index() {
        let mut partial = solution();
        let cause = cause();
        partial
            .add_derivation(Term::new("a", Condition::Exact(1u32)), cause)
            .unwrap();
        partial
            .add_derivation(Term::new("b", Condition::Exact(2u32)), cause)
            .unwrap();

        let mut store = Arena::new();
        let incompatibility = store.alloc(Incompatibility::conflict(
            vec![
                Term::new("a", Condition::Exact(1u32)),
                Term::new("b", Condition::Exact(2u32)),
            ],
            cause,
            cause,
        ));
        let satisfier = partial.satisfier(&store[incompatibility]).unwrap();
        assert_eq!(partial.assignment(satisfier).package, "b");

        // Every satisfied term is satisfied no later than the satisfier.
        let level = partial.previous_decision_level(&store[incompatibility], satisfier);
        assert_eq!(level, 0);
    }

    #[test]
    fn satisfier_requires_subset_not_disjoint() {
        let mut partial = solution();
        let cause = cause();
        partial
            .add_derivation(Term::new("a", Condition::Exact(1u32)), cause)
            .unwrap();

        // a == 2 is contradicted by the assignment, not satisfied.
        let term = Term::new("a", Condition::Exact(2u32));
        assert!(!term_satisfied_by(
            &term,
            partial.latest(&"a").unwrap()
        ));
        // not a == 2 is satisfied: the allowed set avoids {2}.
        assert!(term_satisfied_by(
            &term.negate(),
            partial.latest(&"a").unwrap()
        ));
    }

    #[test]
    fn solution_lists_decisions_in_order_without_root() {
        let mut partial = solution();
        partial.add_decision("b", 2);
        partial.add_decision("a", 1);
        assert_eq!(partial.build_solution(), vec![("b", 2), ("a", 1)]);
    }
}
