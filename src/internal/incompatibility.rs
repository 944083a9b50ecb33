// SPDX-License-Identifier: MPL-2.0

//! An incompatibility is a set of terms for different packages
//! that should never be satisfied all together.

use std::fmt::{self, Display};
use std::sync::Arc;

use crate::internal::arena::{Arena, Id};
use crate::package::Package;
use crate::report::{DerivationTree, Derived, External};
use crate::term::Term;
use crate::type_aliases::{Map, Set};
use crate::version::Version;

/// Type alias of unique identifiers for incompatibilities.
pub(crate) type IncompId<P, V> = Id<Incompatibility<P, V>>;

/// A set of terms that cannot all hold jointly.
///
/// An incompatibility usually originates from a package dependency: if
/// package A at version 1 depends on B at version 2, the set
/// `{ A == 1, not B == 2 }` can never be satisfied in full. Conflict
/// resolution derives further incompatibilities from two parents, forming
/// a DAG whose edges are arena ids; the failure report walks that DAG.
#[derive(Debug, Clone)]
pub(crate) struct Incompatibility<P: Package, V: Version> {
    terms: Vec<Term<P, V>>,
    kind: Kind<P, V>,
}

/// The origin of an incompatibility.
#[derive(Debug, Clone)]
pub(crate) enum Kind<P: Package, V: Version> {
    /// The catalog offers nothing satisfying the term.
    NoVersions,
    /// The dependency of one concrete package version.
    FromDependency { package: P, version: V },
    /// Learned during conflict resolution from two parents.
    Conflict {
        cause1: IncompId<P, V>,
        cause2: IncompId<P, V>,
    },
}

/// How an incompatibility relates to the current partial solution.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Relation {
    /// Every term is satisfied: the incompatibility is a conflict.
    Satisfied,
    /// Every term but the one at this index is satisfied; unit propagation
    /// can derive its negation.
    AlmostSatisfied(usize),
    /// Some term is contradicted, the incompatibility is currently inert.
    Contradicted,
    /// More than one term is undetermined.
    Inconclusive,
}

impl<P: Package, V: Version> Incompatibility<P, V> {
    /// An incompatibility recording that no catalog version satisfies the
    /// term.
    pub(crate) fn no_versions(term: Term<P, V>) -> Self {
        Incompatibility {
            terms: vec![term],
            kind: Kind::NoVersions,
        }
    }

    /// The clause of one dependency edge: `{ package == version, not dep }`.
    pub(crate) fn from_dependency(package: P, version: V, dependency: &Term<P, V>) -> Self {
        let base = Term::new(
            package.clone(),
            crate::condition::Condition::Exact(version.clone()),
        );
        Incompatibility {
            terms: vec![base, dependency.negate()],
            kind: Kind::FromDependency { package, version },
        }
    }

    /// A derived incompatibility with its two parents.
    ///
    /// Terms are deduplicated by package, keeping the first occurrence.
    pub(crate) fn conflict(
        terms: Vec<Term<P, V>>,
        cause1: IncompId<P, V>,
        cause2: IncompId<P, V>,
    ) -> Self {
        let mut seen: Set<P> = Set::default();
        let mut deduped = Vec::with_capacity(terms.len());
        for term in terms {
            if seen.insert(term.package().clone()) {
                deduped.push(term);
            }
        }
        Incompatibility {
            terms: deduped,
            kind: Kind::Conflict { cause1, cause2 },
        }
    }

    pub(crate) fn terms(&self) -> &[Term<P, V>] {
        &self.terms
    }

    pub(crate) fn term(&self, index: usize) -> &Term<P, V> {
        &self.terms[index]
    }

    /// Resolve a conflict against the cause of its satisfier, pivoting on
    /// one package.
    ///
    /// The result keeps every term of both parents except those naming the
    /// pivot. When both parents constrain the same package, like-polarity
    /// terms merge (intersection of allowed sets, union of forbidden
    /// sets); opposite polarities do not combine and the cause's term
    /// wins. Order is deterministic: the conflict's terms first, then the
    /// cause's.
    pub(crate) fn resolve(
        conflict: IncompId<P, V>,
        cause: IncompId<P, V>,
        package: &P,
        store: &mut Arena<Self>,
    ) -> IncompId<P, V> {
        let conflict_terms = store[conflict].terms.clone();
        let cause_terms = store[cause].terms.clone();

        let mut by_package: Map<P, Term<P, V>> = Map::default();
        for term in &conflict_terms {
            if term.package() != package {
                by_package.insert(term.package().clone(), term.clone());
            }
        }
        for term in &cause_terms {
            if term.package() == package {
                continue;
            }
            let combined = match by_package.get(term.package()) {
                Some(existing) => merge_terms(existing, term).unwrap_or_else(|| term.clone()),
                None => term.clone(),
            };
            by_package.insert(term.package().clone(), combined);
        }

        let mut merged = Vec::with_capacity(by_package.len());
        for term in conflict_terms.iter().chain(cause_terms.iter()) {
            if term.package() == package {
                continue;
            }
            if let Some(kept) = by_package.remove(term.package()) {
                merged.push(kept);
            }
        }

        store.alloc(Incompatibility::conflict(merged, conflict, cause))
    }

    /// Convert the DAG rooted here into an owned [`DerivationTree`].
    ///
    /// Parents always have smaller ids than the incompatibilities derived
    /// from them, so a single ascending pass can build every node after
    /// its causes. Shared sub-derivations stay shared through `Arc`.
    pub(crate) fn build_derivation_tree(
        root: IncompId<P, V>,
        store: &Arena<Self>,
    ) -> DerivationTree<P, V> {
        let mut reachable: Set<usize> = Set::default();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !reachable.insert(id.into_raw()) {
                continue;
            }
            if let Kind::Conflict { cause1, cause2 } = &store[id].kind {
                stack.push(*cause1);
                stack.push(*cause2);
            }
        }

        let mut trees: Map<usize, Arc<DerivationTree<P, V>>> = Map::default();
        for id in store.ids() {
            if !reachable.contains(&id.into_raw()) {
                continue;
            }
            let node = match &store[id].kind {
                Kind::NoVersions => {
                    DerivationTree::External(External::NoVersions(store[id].terms[0].clone()))
                }
                Kind::FromDependency { package, version } => {
                    DerivationTree::External(External::FromDependency {
                        package: package.clone(),
                        version: version.clone(),
                        dependency: store[id].dependency_term(),
                    })
                }
                Kind::Conflict { cause1, cause2 } => DerivationTree::Derived(Derived {
                    terms: store[id].terms.clone(),
                    cause1: trees[&cause1.into_raw()].clone(),
                    cause2: trees[&cause2.into_raw()].clone(),
                }),
            };
            trees.insert(id.into_raw(), Arc::new(node));
        }

        DerivationTree::clone(&trees[&root.into_raw()])
    }

    /// The dependency of a [`Kind::FromDependency`] clause, un-negated for
    /// display.
    fn dependency_term(&self) -> Term<P, V> {
        let dependent = match &self.kind {
            Kind::FromDependency { package, .. } => package,
            _ => unreachable!("dependency_term on a non-dependency incompatibility"),
        };
        let dependency = self
            .terms
            .iter()
            .find(|term| term.package() != dependent)
            .unwrap_or(&self.terms[1]);
        if dependency.is_positive() {
            dependency.clone()
        } else {
            dependency.negate()
        }
    }
}

/// Combine two terms naming the same package during conflict resolution.
///
/// Positive pairs intersect their allowed sets, negative pairs union
/// their forbidden sets. Opposite polarities, and opaque conditions, do
/// not combine.
fn merge_terms<P: Package, V: Version>(a: &Term<P, V>, b: &Term<P, V>) -> Option<Term<P, V>> {
    if a.package() != b.package() {
        return None;
    }
    match (a.is_positive(), b.is_positive()) {
        (true, true) => {
            let merged = a.allowed_set()?.intersection(&b.allowed_set()?);
            Some(Term::from_allowed_set(a.package().clone(), merged))
        }
        (false, false) => {
            let merged = a.forbidden_set()?.union(&b.forbidden_set()?);
            Some(Term::from_forbidden_set(a.package().clone(), merged))
        }
        _ => None,
    }
}

impl<P: Package, V: Version> Display for Incompatibility<P, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.terms.as_slice() {
            [] => write!(f, "version solving failed"),
            [term] => write!(f, "{term} is forbidden"),
            [_, _] if matches!(self.kind, Kind::FromDependency { .. }) => {
                let Kind::FromDependency { package, version } = &self.kind else {
                    unreachable!()
                };
                write!(
                    f,
                    "{package} {version} depends on {}",
                    self.dependency_term()
                )
            }
            terms => {
                for (i, term) in terms.iter().enumerate() {
                    if i > 0 {
                        write!(f, " and ")?;
                    }
                    write!(f, "{term}")?;
                }
                write!(f, " are incompatible")
            }
        }
    }
}
