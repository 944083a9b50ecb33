// SPDX-License-Identifier: MPL-2.0

//! Mutable solver state: the partial solution, the incompatibility store
//! and the unit propagation queue.

use std::collections::VecDeque;

use log::debug;
use version_interval::IntervalSet;

use crate::internal::arena::Arena;
use crate::internal::incompatibility::{IncompId, Incompatibility, Relation};
use crate::internal::partial_solution::{NoAllowedVersions, PartialSolution};
use crate::package::Package;
use crate::term::Term;
use crate::type_aliases::{Map, Set};
use crate::version::Version;

/// How one round of conflict resolution ended.
pub(crate) enum ConflictResolution<P: Package, V: Version> {
    /// The conflict was learned and the solver backjumped; propagation
    /// should restart from the pivot package.
    Backjump { pivot: P },
    /// The conflict reaches the root decision: version solving failed and
    /// this incompatibility explains why.
    Failed { root: IncompId<P, V> },
}

/// How a single term relates to a package's current allowed set.
enum TermRelation {
    Satisfied,
    Contradicted,
    Inconclusive,
}

pub(crate) struct SolverState<P: Package, V: Version> {
    pub(crate) partial: PartialSolution<P, V>,
    pub(crate) store: Arena<Incompatibility<P, V>>,
    /// Incompatibilities indexed by every package they mention.
    by_package: Map<P, Vec<IncompId<P, V>>>,
    /// Registration order of indexed incompatibilities, kept when
    /// tracking is enabled so failures can expose the learned clauses.
    track: bool,
    learned: Vec<IncompId<P, V>>,
    /// FIFO unit propagation queue with a membership set to suppress
    /// duplicates.
    queue: VecDeque<P>,
    queued: Set<P>,
}

impl<P: Package, V: Version> SolverState<P, V> {
    pub(crate) fn new(root: P, track: bool) -> Self {
        SolverState {
            partial: PartialSolution::new(root),
            store: Arena::new(),
            by_package: Map::default(),
            track,
            learned: Vec::new(),
            queue: VecDeque::new(),
            queued: Set::default(),
        }
    }

    pub(crate) fn enqueue(&mut self, package: P) {
        if self.queued.insert(package.clone()) {
            self.queue.push_back(package);
        }
    }

    fn dequeue(&mut self) -> Option<P> {
        let package = self.queue.pop_front()?;
        self.queued.remove(&package);
        Some(package)
    }

    /// Make an already-allocated incompatibility visible to propagation.
    pub(crate) fn register(&mut self, id: IncompId<P, V>) {
        for term in self.store[id].terms() {
            self.by_package
                .entry(term.package().clone())
                .or_default()
                .push(id);
        }
        if self.track {
            self.learned.push(id);
        }
    }

    pub(crate) fn add_incompatibility(&mut self, incompatibility: Incompatibility<P, V>) -> IncompId<P, V> {
        let id = self.store.alloc(incompatibility);
        self.register(id);
        id
    }

    /// Register the dependency clauses of one package version and apply
    /// each as a derivation. Returns a conflict when a dependency leaves
    /// its package without admissible versions.
    pub(crate) fn register_dependencies(
        &mut self,
        package: &P,
        version: &V,
        dependencies: Vec<Term<P, V>>,
    ) -> Option<IncompId<P, V>> {
        for dependency in dependencies {
            let id = self.add_incompatibility(Incompatibility::from_dependency(
                package.clone(),
                version.clone(),
                &dependency,
            ));
            if let Some(conflict) = self.apply_constraint(dependency, id) {
                return Some(conflict);
            }
        }
        None
    }

    /// Apply one dependency term to the partial solution.
    fn apply_constraint(&mut self, term: Term<P, V>, cause: IncompId<P, V>) -> Option<IncompId<P, V>> {
        match self.partial.add_derivation(term.clone(), cause) {
            Err(NoAllowedVersions) => {
                debug!("constraint leaves no allowed versions: {term}");
                let base = self.store.alloc(Incompatibility::no_versions(term));
                let mut terms = self.store[cause].terms().to_vec();
                terms.extend_from_slice(self.store[base].terms());
                Some(self.store.alloc(Incompatibility::conflict(terms, base, cause)))
            }
            Ok((position, _)) => {
                let package = self.partial.assignment(position).package.clone();
                self.enqueue(package);
                None
            }
        }
    }

    /// Drain the propagation queue, deriving from almost-satisfied
    /// incompatibilities until a conflict shows up or nothing changes.
    pub(crate) fn propagate(&mut self, seed: Option<P>) -> Option<IncompId<P, V>> {
        if let Some(package) = seed {
            self.enqueue(package);
        }

        while let Some(package) = self.dequeue() {
            let watches = self.by_package.get(&package).cloned().unwrap_or_default();
            for id in watches {
                match self.evaluate(id) {
                    Relation::Satisfied => {
                        debug!(
                            "conflict detected during propagation of {package}: {}",
                            self.store[id]
                        );
                        return Some(id);
                    }
                    Relation::AlmostSatisfied(term_index) => {
                        let derived = self.store[id].term(term_index).negate();
                        debug!("unit propagation on {package} derives {derived}");
                        match self.partial.add_derivation(derived, id) {
                            Err(NoAllowedVersions) => return Some(id),
                            Ok((position, changed)) => {
                                if changed {
                                    let affected =
                                        self.partial.assignment(position).package.clone();
                                    self.enqueue(affected);
                                }
                            }
                        }
                    }
                    Relation::Contradicted | Relation::Inconclusive => {}
                }
            }
        }
        None
    }

    /// Classify an incompatibility against the partial solution.
    fn evaluate(&self, id: IncompId<P, V>) -> Relation {
        let mut unsatisfied: Option<usize> = None;
        for (index, term) in self.store[id].terms().iter().enumerate() {
            let allowed = self.partial.allowed_set(term.package());
            let has_assignment = self.partial.has_assignments(term.package());
            match relation_for_term(term, &allowed, has_assignment) {
                TermRelation::Contradicted => return Relation::Contradicted,
                TermRelation::Satisfied => {}
                TermRelation::Inconclusive => {
                    if unsatisfied.is_some() {
                        return Relation::Inconclusive;
                    }
                    unsatisfied = Some(index);
                }
            }
        }
        match unsatisfied {
            None => Relation::Satisfied,
            Some(index) => Relation::AlmostSatisfied(index),
        }
    }

    /// CDCL conflict analysis: walk satisfiers backward, resolving the
    /// conflict against their causes until it can be learned, then
    /// backjump.
    pub(crate) fn resolve_conflict(
        &mut self,
        mut conflict: IncompId<P, V>,
    ) -> Result<ConflictResolution<P, V>, &'static str> {
        loop {
            let Some(position) = self.partial.satisfier(&self.store[conflict]) else {
                return Ok(ConflictResolution::Failed { root: conflict });
            };
            let previous_level = self
                .partial
                .previous_decision_level(&self.store[conflict], position);

            let satisfier = self.partial.assignment(position);
            let satisfier_level = satisfier.decision_level;
            let is_decision = satisfier.is_decision();
            let pivot = satisfier.package.clone();
            let cause = satisfier.cause();
            debug!(
                "conflict analysis: satisfier {satisfier} of {}, previous level {previous_level}",
                self.store[conflict]
            );

            if satisfier_level == 0 && is_decision {
                return Ok(ConflictResolution::Failed { root: conflict });
            }

            if is_decision && previous_level < satisfier_level {
                self.partial.backtrack(previous_level);
                self.register(conflict);
                debug!("learned {} and backjumped", self.store[conflict]);
                return Ok(ConflictResolution::Backjump { pivot });
            }

            let Some(cause) = cause else {
                return Err("derived assignment is missing its cause");
            };
            conflict = Incompatibility::resolve(conflict, cause, &pivot, &mut self.store);
            debug!("resolved into {}", self.store[conflict]);
        }
    }
}

/// Classify one term against its package's current allowed set.
///
/// A positive term needs the allowed set inside its required set, and an
/// actual assignment to witness it. A negative term is satisfied as soon
/// as the allowed set avoids its forbidden set. Terms whose condition
/// cannot be expressed as a set stay inconclusive forever.
fn relation_for_term<P: Package, V: Version>(
    term: &Term<P, V>,
    allowed: &IntervalSet<V>,
    has_assignment: bool,
) -> TermRelation {
    if term.is_positive() {
        let Some(required) = term.allowed_set() else {
            return TermRelation::Inconclusive;
        };
        if allowed.is_subset(&required) {
            if has_assignment {
                return TermRelation::Satisfied;
            }
            return TermRelation::Inconclusive;
        }
        if allowed.is_disjoint(&required) {
            return TermRelation::Contradicted;
        }
        TermRelation::Inconclusive
    } else {
        let Some(forbidden) = term.forbidden_set() else {
            return TermRelation::Inconclusive;
        };
        if allowed.is_disjoint(&forbidden) {
            return TermRelation::Satisfied;
        }
        if allowed.is_subset(&forbidden) {
            if has_assignment {
                return TermRelation::Contradicted;
            }
            return TermRelation::Inconclusive;
        }
        TermRelation::Inconclusive
    }
}
