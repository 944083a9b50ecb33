// SPDX-License-Identifier: MPL-2.0

//! The solver: CDCL-style PubGrub version solving.

use log::{debug, info};

use crate::catalog::{Catalog, CatalogError};
use crate::condition::Condition;
use crate::error::{NoSolutionError, SolveError};
use crate::internal::{ConflictResolution, IncompId, Incompatibility, SolverState};
use crate::package::Package;
use crate::term::Term;
use crate::type_aliases::Solution;
use crate::version::Version;

/// Configuration of the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverOptions {
    /// Collect learned incompatibilities so failures carry a full
    /// derivation DAG. Off by default: tracking costs memory and most
    /// callers only need the yes/no answer.
    pub track_incompatibilities: bool,
    /// Upper bound on main-loop iterations, `0` to disable. The default
    /// of 100 000 is far beyond what real dependency graphs need and
    /// exists to bound pathological inputs.
    pub max_steps: u64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        SolverOptions {
            track_incompatibilities: false,
            max_steps: 100_000,
        }
    }
}

impl SolverOptions {
    pub fn tracking(mut self, enabled: bool) -> Self {
        self.track_incompatibilities = enabled;
        self
    }

    pub fn max_steps(mut self, steps: u64) -> Self {
        self.max_steps = steps;
        self
    }
}

/// A dependency solver over one [`Catalog`].
///
/// Given a root term pinning a package to an exact version, [`solve`]
/// finds one version per required package such that every dependency
/// constraint holds, preferring the highest admissible versions, or
/// explains why no such assignment exists.
///
/// [`solve`]: Solver::solve
pub struct Solver<C: Catalog> {
    catalog: C,
    options: SolverOptions,
}

impl<C: Catalog> Solver<C> {
    pub fn new(catalog: C) -> Self {
        Solver {
            catalog,
            options: SolverOptions::default(),
        }
    }

    pub fn with_options(catalog: C, options: SolverOptions) -> Self {
        Solver { catalog, options }
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    /// Solve for the given root term.
    ///
    /// The root must be positive and pin an exact version; its
    /// dependencies, as served by the catalog, are the user's top-level
    /// requirements. On success the returned solution lists one
    /// `(package, version)` pair per decided non-root package, in
    /// decision order. Identical inputs produce identical outputs.
    #[allow(clippy::type_complexity)]
    pub fn solve(
        &self,
        root: Term<C::P, C::V>,
    ) -> Result<Solution<C::P, C::V>, SolveError<C::P, C::V, C::Err>> {
        debug!("starting solve for {root}");
        let root_package = root.package().clone();
        let root_version = extract_root_version(&root)?;

        let mut state: SolverState<C::P, C::V> =
            SolverState::new(root_package.clone(), self.options.track_incompatibilities);
        state.partial.seed_root(root_package.clone(), root_version.clone());

        let dependencies = self
            .catalog
            .dependencies(&root_package, &root_version)
            .map_err(|source| SolveError::Dependencies {
                package: root_package.clone(),
                version: root_version.clone(),
                source,
            })?;
        let mut conflict = state.register_dependencies(&root_package, &root_version, dependencies);
        state.enqueue(root_package);

        let mut seed: Option<C::P> = None;
        let mut steps: u64 = 0;
        loop {
            if self.options.max_steps > 0 && steps >= self.options.max_steps {
                return Err(SolveError::IterationLimit {
                    steps: self.options.max_steps,
                });
            }
            steps += 1;

            // A pending conflict takes priority: analyse it, learn a
            // clause and backjump, or fail at the root.
            if let Some(pending) = conflict.take() {
                match state.resolve_conflict(pending) {
                    Ok(ConflictResolution::Backjump { pivot }) => {
                        seed = Some(pivot);
                        continue;
                    }
                    Ok(ConflictResolution::Failed { root }) => {
                        return Err(self.fail(state, root));
                    }
                    Err(message) => return Err(SolveError::Failure(message)),
                }
            }

            if let Some(found) = state.propagate(seed.take()) {
                conflict = Some(found);
                continue;
            }

            if state.partial.is_complete() {
                info!("solution found after {steps} steps");
                return Ok(state.partial.build_solution());
            }
            let Some(package) = state.partial.next_decision_candidate() else {
                info!("solution found after {steps} steps");
                return Ok(state.partial.build_solution());
            };

            let Some(version) = self.pick_version(&state, &package)? else {
                // Nothing admissible: fabricate the no-versions clause,
                // sharpened against the cause that narrowed the package.
                let allowed = state.partial.allowed_set(&package);
                let mut pending = state
                    .store
                    .alloc(Incompatibility::no_versions(Term::from_allowed_set(
                        package.clone(),
                        allowed,
                    )));
                if let Some(cause) = state.partial.latest_cause(&package) {
                    pending = Incompatibility::resolve(pending, cause, &package, &mut state.store);
                }
                state.register(pending);
                conflict = Some(pending);
                continue;
            };

            info!("deciding {package} {version}");
            state.partial.add_decision(package.clone(), version.clone());
            let dependencies = self
                .catalog
                .dependencies(&package, &version)
                .map_err(|source| SolveError::Dependencies {
                    package: package.clone(),
                    version: version.clone(),
                    source,
                })?;
            if let Some(found) = state.register_dependencies(&package, &version, dependencies) {
                conflict = Some(found);
                continue;
            }
            state.enqueue(package);
        }
    }

    /// The highest catalog version admissible for the package, if any.
    ///
    /// A missing package or version is not an error here, it just means
    /// there is nothing to pick. Opaque conditions are enforced
    /// pointwise on each candidate.
    #[allow(clippy::type_complexity)]
    fn pick_version(
        &self,
        state: &SolverState<C::P, C::V>,
        package: &C::P,
    ) -> Result<Option<C::V>, SolveError<C::P, C::V, C::Err>> {
        let allowed = state.partial.allowed_set(package);
        if allowed.is_empty() {
            return Ok(None);
        }

        let versions = match self.catalog.versions(package) {
            Ok(versions) => versions,
            Err(CatalogError::PackageNotFound) | Err(CatalogError::VersionNotFound) => {
                return Ok(None);
            }
            Err(source) => {
                return Err(SolveError::Versions {
                    package: package.clone(),
                    source,
                });
            }
        };

        Ok(versions
            .into_iter()
            .rev()
            .find(|version| {
                allowed.contains(version) && state.partial.pointwise_allows(package, version)
            }))
    }

    fn fail(
        &self,
        state: SolverState<C::P, C::V>,
        root: IncompId<C::P, C::V>,
    ) -> SolveError<C::P, C::V, C::Err> {
        if self.options.track_incompatibilities {
            let tree = Incompatibility::build_derivation_tree(root, &state.store);
            return SolveError::NoSolution(Box::new(NoSolutionError::new(tree)));
        }

        // Without tracking only a root-facing term survives, positive for
        // readability.
        let term = match state.store[root].terms().first() {
            Some(term) if term.is_positive() => term.clone(),
            Some(term) => term.negate(),
            None => Term::new(state.partial.root().clone(), Condition::Any),
        };
        SolveError::NoSolutionFound { term }
    }
}

/// The root term must be positive and pin an exact version.
fn extract_root_version<P: Package, V: Version, E: std::error::Error + 'static>(
    root: &Term<P, V>,
) -> Result<V, SolveError<P, V, E>> {
    if !root.is_positive() {
        return Err(SolveError::InvalidRoot {
            package: root.package().clone(),
            reason: "root term must be positive",
        });
    }
    match root.condition() {
        Condition::Exact(version) => Ok(version.clone()),
        _ => Err(SolveError::InvalidRoot {
            package: root.package().clone(),
            reason: "root term must pin an exact version",
        }),
    }
}
