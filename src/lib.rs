// SPDX-License-Identifier: MPL-2.0

//! CDCL-style PubGrub version solving.
//!
//! Given a root set of version constraints and a [`Catalog`] mapping each
//! package to its available versions and each package version to further
//! constraints, the solver produces one version per required package
//! satisfying every constraint, or an explanation of why none exists.
//! The algorithm is a Conflict-Driven Clause Learning variant of PubGrub:
//! unit propagation over incompatibilities, non-chronological
//! backtracking, and a derivation tree for human-readable failure
//! reports, such as
//!
//! ```txt
//! Because:
//!   Because a 1.0.0 depends on b == 1.0.0
//! and:
//!   Because c 1.0.0 depends on b == 2.0.0
//! these constraints conflict: a == 1.0.0 and c == 1.0.0
//! ```
//!
//! The solver is generic over the package type (anything `Clone + Eq +
//! Hash + Debug + Display`) and the version type (anything `Clone + Ord +
//! Debug + Display`); constraints are sets of versions represented as
//! disjoint ordered intervals from the `version-interval` crate.
//!
//! ## Example
//!
//! ```
//! use depsolve::{CombinedCatalog, Condition, InMemoryCatalog, RootCatalog, Solver, Term};
//!
//! // The user's top-level requirements live in a root pseudo-package.
//! let mut root = RootCatalog::new("$$root", 1u32);
//! root.require("lodash", Condition::Exact(3u32));
//! let root_term = root.term();
//!
//! let mut registry = InMemoryCatalog::new();
//! registry.add_package("lodash", 3u32, [Term::new("core-js", Condition::Any)]);
//! registry.add_package("core-js", 7u32, []);
//!
//! let mut catalog = CombinedCatalog::new();
//! catalog.push(root);
//! catalog.push(registry);
//!
//! let solution = Solver::new(catalog).solve(root_term).unwrap();
//! assert_eq!(solution, vec![("lodash", 3u32), ("core-js", 7u32)]);
//! ```

mod catalog;
mod condition;
mod error;
mod internal;
mod package;
mod range;
mod report;
mod solver;
mod term;
mod type_aliases;
mod version;

pub use catalog::{
    CacheStats, CachedCatalog, Catalog, CatalogError, CombinedCatalog, InMemoryCatalog, RootCatalog,
};
pub use condition::{Condition, CustomCondition};
pub use error::{NoSolutionError, SolveError};
pub use package::Package;
pub use range::{parse_range, RangeParseError};
pub use report::{CollapsedReporter, DefaultReporter, DerivationTree, Derived, External, Reporter};
pub use solver::{Solver, SolverOptions};
pub use term::Term;
pub use type_aliases::{Map, Set, Solution};
pub use version::{InvalidVersion, SemanticVersion, Version};

pub use version_interval::{Bound, IntervalSet};
