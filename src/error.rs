// SPDX-License-Identifier: MPL-2.0

//! Errors returned by the solver.

use std::fmt;

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::package::Package;
use crate::report::{DefaultReporter, DerivationTree, Reporter};
use crate::term::Term;
use crate::version::Version;

/// Version solving failed, with the full derivation explaining why.
///
/// Only produced when incompatibility tracking is enabled; its `Display`
/// renders the derivation through [`DefaultReporter`], and
/// [`report_with`](NoSolutionError::report_with) accepts any other
/// [`Reporter`].
#[derive(Debug, Clone)]
pub struct NoSolutionError<P: Package, V: Version> {
    derivation: DerivationTree<P, V>,
}

impl<P: Package, V: Version> NoSolutionError<P, V> {
    pub(crate) fn new(derivation: DerivationTree<P, V>) -> Self {
        NoSolutionError { derivation }
    }

    /// The root of the derivation DAG.
    pub fn derivation_tree(&self) -> &DerivationTree<P, V> {
        &self.derivation
    }

    /// Render the failure with a custom reporter.
    pub fn report_with(&self, reporter: &impl Reporter<P, V>) -> String {
        reporter.report(&self.derivation)
    }
}

impl<P: Package, V: Version> fmt::Display for NoSolutionError<P, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", DefaultReporter.report(&self.derivation))
    }
}

impl<P: Package, V: Version> std::error::Error for NoSolutionError<P, V> {}

/// All the ways a solve can fail.
#[derive(Debug, Error)]
pub enum SolveError<P: Package, V: Version, E: std::error::Error + 'static> {
    /// The root term must be positive and pin an exact version.
    #[error("{package}: {reason}")]
    InvalidRoot { package: P, reason: &'static str },

    /// No assignment satisfies every constraint; the derivation DAG is
    /// attached (tracking enabled).
    #[error(transparent)]
    NoSolution(Box<NoSolutionError<P, V>>),

    /// No assignment satisfies every constraint (tracking disabled, only
    /// the root-facing term survives).
    #[error("no solution found for {term}")]
    NoSolutionFound { term: Term<P, V> },

    /// The catalog failed to list versions for a package.
    #[error("failed to list versions of {package}")]
    Versions {
        package: P,
        #[source]
        source: CatalogError<E>,
    },

    /// The catalog failed to provide dependencies for a package version.
    #[error("failed to get dependencies of {package} {version}")]
    Dependencies {
        package: P,
        version: V,
        #[source]
        source: CatalogError<E>,
    },

    /// The step watchdog tripped.
    #[error("solver exceeded iteration limit after {steps} steps")]
    IterationLimit { steps: u64 },

    /// An internal invariant was broken; this is a bug in the solver.
    #[error("internal solver error: {0}")]
    Failure(&'static str),
}
