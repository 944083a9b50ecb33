// SPDX-License-Identifier: MPL-2.0

//! Human-readable explanations of version solving failures.

use std::sync::Arc;

use crate::package::Package;
use crate::term::Term;
use crate::type_aliases::Set;
use crate::version::Version;

/// The derivation DAG explaining a failure.
///
/// Leaves are facts from the catalog; derived nodes were learned during
/// conflict resolution and point at their two parents. Shared
/// sub-derivations are represented by shared [`Arc`]s, which the
/// reporters use to print each one only once.
#[derive(Debug, Clone)]
pub enum DerivationTree<P: Package, V: Version> {
    /// A fact external to the solver.
    External(External<P, V>),
    /// An incompatibility derived from two others.
    Derived(Derived<P, V>),
}

/// A leaf of the derivation tree.
#[derive(Debug, Clone)]
pub enum External<P: Package, V: Version> {
    /// No version satisfies the term.
    NoVersions(Term<P, V>),
    /// The dependency edge of one concrete package version. The
    /// dependency term is stored un-negated.
    FromDependency {
        package: P,
        version: V,
        dependency: Term<P, V>,
    },
}

/// An incompatibility learned by resolving its two causes.
#[derive(Debug, Clone)]
pub struct Derived<P: Package, V: Version> {
    /// The terms that cannot all hold jointly.
    pub terms: Vec<Term<P, V>>,
    pub cause1: Arc<DerivationTree<P, V>>,
    pub cause2: Arc<DerivationTree<P, V>>,
}

/// Formats a derivation tree into an error message.
pub trait Reporter<P: Package, V: Version> {
    fn report(&self, derivation: &DerivationTree<P, V>) -> String;
}

/// Identity of a node, used to visit shared sub-derivations only once.
fn key<P: Package, V: Version>(node: &DerivationTree<P, V>) -> *const () {
    node as *const DerivationTree<P, V> as *const ()
}

fn join_terms<P: Package, V: Version>(terms: &[Term<P, V>]) -> String {
    terms
        .iter()
        .map(|term| term.to_string())
        .collect::<Vec<_>>()
        .join(" and ")
}

/// Renders the derivation hierarchically, indenting each cause under the
/// conflict it contributed to.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultReporter;

impl DefaultReporter {
    fn visit<P: Package, V: Version>(
        node: &DerivationTree<P, V>,
        lines: &mut Vec<String>,
        depth: usize,
        visited: &mut Set<*const ()>,
    ) {
        if !visited.insert(key(node)) {
            return;
        }
        let indent = "  ".repeat(depth);
        match node {
            DerivationTree::External(External::NoVersions(term)) => {
                lines.push(format!(
                    "{indent}No versions of {term} satisfy the constraint"
                ));
            }
            DerivationTree::External(External::FromDependency {
                package,
                version,
                dependency,
            }) => {
                lines.push(format!(
                    "{indent}Because {package} {version} depends on {dependency}"
                ));
            }
            DerivationTree::Derived(derived) => {
                lines.push(format!("{indent}Because:"));
                Self::visit(&derived.cause1, lines, depth + 1, visited);
                lines.push(format!("{indent}and:"));
                Self::visit(&derived.cause2, lines, depth + 1, visited);
                match derived.terms.as_slice() {
                    [] => lines.push(format!("{indent}version solving has failed.")),
                    [term] => lines.push(format!("{indent}{term} is forbidden.")),
                    terms => lines.push(format!(
                        "{indent}these constraints conflict: {}",
                        join_terms(terms)
                    )),
                }
            }
        }
    }
}

impl<P: Package, V: Version> Reporter<P, V> for DefaultReporter {
    fn report(&self, derivation: &DerivationTree<P, V>) -> String {
        let mut lines = Vec::new();
        let mut visited = Set::default();
        Self::visit(derivation, &mut lines, 0, &mut visited);
        lines.join("\n")
    }
}

/// Renders the derivation as a flat chain of facts collected in
/// post-order, joined with "And because" connectors.
#[derive(Debug, Default, Clone, Copy)]
pub struct CollapsedReporter;

impl CollapsedReporter {
    fn collect<P: Package, V: Version>(
        node: &DerivationTree<P, V>,
        lines: &mut Vec<String>,
        visited: &mut Set<*const ()>,
    ) {
        if !visited.insert(key(node)) {
            return;
        }
        match node {
            DerivationTree::External(External::NoVersions(term)) => {
                lines.push(format!("no versions of {term} satisfy the constraint"));
            }
            DerivationTree::External(External::FromDependency {
                package,
                version,
                dependency,
            }) => {
                lines.push(format!("{package} {version} depends on {dependency}"));
            }
            DerivationTree::Derived(derived) => {
                Self::collect(&derived.cause1, lines, visited);
                Self::collect(&derived.cause2, lines, visited);
                match derived.terms.as_slice() {
                    [] => {}
                    [term] => lines.push(format!("{term} is forbidden")),
                    terms => {
                        lines.push(format!("these constraints conflict: {}", join_terms(terms)))
                    }
                }
            }
        }
    }
}

impl<P: Package, V: Version> Reporter<P, V> for CollapsedReporter {
    fn report(&self, derivation: &DerivationTree<P, V>) -> String {
        let mut lines = Vec::new();
        let mut visited = Set::default();
        Self::collect(derivation, &mut lines, &mut visited);

        let mut lines = lines.into_iter();
        let Some(first) = lines.next() else {
            return "version solving failed".to_string();
        };
        lines.fold(first, |mut report, line| {
            report.push_str("\nAnd because ");
            report.push_str(&line);
            report
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;

    fn sample() -> DerivationTree<&'static str, u32> {
        let left = Arc::new(DerivationTree::External(External::FromDependency {
            package: "a",
            version: 1,
            dependency: Term::new("b", Condition::Exact(1u32)),
        }));
        let right = Arc::new(DerivationTree::External(External::FromDependency {
            package: "c",
            version: 1,
            dependency: Term::new("b", Condition::Exact(2u32)),
        }));
        DerivationTree::Derived(Derived {
            terms: vec![
                Term::new("a", Condition::Exact(1u32)),
                Term::new("c", Condition::Exact(1u32)),
            ],
            cause1: left,
            cause2: right,
        })
    }

    #[test]
    fn hierarchical_report() {
        let report = DefaultReporter.report(&sample());
        let expected = "\
Because:
  Because a 1 depends on b == 1
and:
  Because c 1 depends on b == 2
these constraints conflict: a == 1 and c == 1";
        assert_eq!(report, expected);
    }

    #[test]
    fn collapsed_report() {
        let report = CollapsedReporter.report(&sample());
        let expected = "\
a 1 depends on b == 1
And because c 1 depends on b == 2
And because these constraints conflict: a == 1 and c == 1";
        assert_eq!(report, expected);
    }

    #[test]
    fn shared_subtrees_print_once() {
        let shared = Arc::new(DerivationTree::External(External::NoVersions(Term::new(
            "d",
            Condition::Exact(1u32),
        ))));
        let tree = DerivationTree::Derived(Derived {
            terms: vec![Term::new("e", Condition::Exact(1u32))],
            cause1: shared.clone(),
            cause2: shared,
        });
        let report = CollapsedReporter.report(&tree);
        assert_eq!(
            report.matches("no versions of d == 1").count(),
            1
        );
    }

    #[test]
    fn empty_terms_render_failure_line() {
        let tree = DerivationTree::Derived(Derived {
            terms: vec![],
            cause1: Arc::new(sample()),
            cause2: Arc::new(DerivationTree::External(External::NoVersions(Term::new(
                "z",
                Condition::Exact(9u32),
            )))),
        });
        let report = DefaultReporter.report(&tree);
        assert!(report.ends_with("version solving has failed."));
    }
}
