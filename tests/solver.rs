// SPDX-License-Identifier: MPL-2.0

use std::fmt;
use std::sync::Arc;

use depsolve::{
    parse_range, CatalogError, CollapsedReporter, CombinedCatalog, Condition, CustomCondition,
    InMemoryCatalog, IntervalSet, RootCatalog, SemanticVersion, SolveError, Solver, SolverOptions,
    Term,
};

type Pkg = &'static str;
type Ver = SemanticVersion;

fn v(s: &str) -> Ver {
    s.parse().unwrap()
}

fn exact(s: &str) -> Condition<Ver> {
    Condition::Exact(v(s))
}

fn range(s: &str) -> Condition<Ver> {
    Condition::Set(parse_range(s).unwrap())
}

fn dep(package: Pkg, condition: Condition<Ver>) -> Term<Pkg, Ver> {
    Term::new(package, condition)
}

fn combine(
    root: RootCatalog<Pkg, Ver>,
    registry: InMemoryCatalog<Pkg, Ver>,
) -> (CombinedCatalog<Pkg, Ver>, Term<Pkg, Ver>) {
    let term = root.term();
    let mut catalog = CombinedCatalog::new();
    catalog.push(root);
    catalog.push(registry);
    (catalog, term)
}

fn root_of(requirements: &[(Pkg, Condition<Ver>)]) -> RootCatalog<Pkg, Ver> {
    let mut root = RootCatalog::new("$$root", v("1.0.0"));
    for (package, condition) in requirements {
        root.require(*package, condition.clone());
    }
    root
}

fn solve(
    root: RootCatalog<Pkg, Ver>,
    registry: InMemoryCatalog<Pkg, Ver>,
) -> Result<Vec<(Pkg, Ver)>, SolveError<Pkg, Ver, std::convert::Infallible>> {
    let (catalog, term) = combine(root, registry);
    Solver::new(catalog).solve(term)
}

fn solve_tracked(
    root: RootCatalog<Pkg, Ver>,
    registry: InMemoryCatalog<Pkg, Ver>,
) -> Result<Vec<(Pkg, Ver)>, SolveError<Pkg, Ver, std::convert::Infallible>> {
    let (catalog, term) = combine(root, registry);
    let options = SolverOptions::default().tracking(true);
    Solver::with_options(catalog, options).solve(term)
}

#[test]
fn linear_chain() {
    let mut registry = InMemoryCatalog::new();
    registry.add_package("A", v("1.0.0"), [dep("B", exact("1.0.0"))]);
    registry.add_package("B", v("1.0.0"), [dep("C", exact("1.0.0"))]);
    registry.add_package("C", v("1.0.0"), [dep("D", exact("1.0.0"))]);
    registry.add_package("D", v("1.0.0"), []);

    let solution = solve(root_of(&[("A", exact("1.0.0"))]), registry).unwrap();
    assert_eq!(
        solution,
        vec![
            ("A", v("1.0.0")),
            ("B", v("1.0.0")),
            ("C", v("1.0.0")),
            ("D", v("1.0.0")),
        ]
    );
}

#[test]
fn diamond() {
    let mut registry = InMemoryCatalog::new();
    registry.add_package(
        "A",
        v("1.0.0"),
        [dep("B", exact("1.0.0")), dep("C", exact("1.0.0"))],
    );
    registry.add_package("B", v("1.0.0"), [dep("D", exact("1.0.0"))]);
    registry.add_package("C", v("1.0.0"), [dep("D", exact("1.0.0"))]);
    registry.add_package("D", v("1.0.0"), []);

    let solution = solve(root_of(&[("A", exact("1.0.0"))]), registry).unwrap();
    assert_eq!(solution.len(), 4);
    assert_eq!(
        solution.iter().filter(|(package, _)| *package == "D").count(),
        1
    );
    for package in ["A", "B", "C", "D"] {
        assert!(solution.contains(&(package, v("1.0.0"))));
    }
}

#[test]
fn backtracking_chooses_alternate_version() {
    let mut registry = InMemoryCatalog::new();
    registry.add_package("A", v("1.1.0"), [dep("B", range("*"))]);
    registry.add_package("B", v("1.0.0"), []);
    // B 2.0.0 needs a package the catalog does not have at all.
    registry.add_package("B", v("2.0.0"), [dep("D", exact("1.0.0"))]);

    let solution = solve(root_of(&[("A", exact("1.1.0"))]), registry).unwrap();
    assert!(solution.contains(&("A", v("1.1.0"))));
    assert!(solution.contains(&("B", v("1.0.0"))));
    assert!(!solution.iter().any(|(package, _)| *package == "D"));
}

#[test]
fn unsatisfiable_conflict_with_tracking() {
    let mut registry = InMemoryCatalog::new();
    registry.add_package("A", v("1.0.0"), [dep("B", exact("1.0.0"))]);
    registry.add_package("C", v("1.0.0"), [dep("B", exact("2.0.0"))]);
    registry.add_package("B", v("1.0.0"), []);
    registry.add_package("B", v("2.0.0"), []);

    let root = root_of(&[("A", exact("1.0.0")), ("C", exact("1.0.0"))]);
    let err = solve_tracked(root, registry).unwrap_err();
    let SolveError::NoSolution(no_solution) = err else {
        panic!("expected NoSolution, got {err:?}");
    };

    let report = no_solution.to_string();
    assert!(
        report.contains("Because A 1.0.0 depends on B == 1.0.0"),
        "missing A clause in: {report}"
    );
    assert!(
        report.contains("Because C 1.0.0 depends on B == 2.0.0"),
        "missing C clause in: {report}"
    );

    let collapsed = no_solution.report_with(&CollapsedReporter);
    assert!(collapsed.contains("And because "));
    assert!(collapsed.contains("C 1.0.0 depends on B == 2.0.0"));
}

#[test]
fn unsatisfiable_conflict_without_tracking() {
    let mut registry = InMemoryCatalog::new();
    registry.add_package("foo", v("1.0.0"), [dep("bar", exact("2.0.0"))]);
    registry.add_package("bar", v("1.0.0"), []);

    let err = solve(root_of(&[("foo", exact("1.0.0"))]), registry).unwrap_err();
    let SolveError::NoSolutionFound { term } = err else {
        panic!("expected NoSolutionFound, got {err:?}");
    };
    assert!(term.is_positive());
}

#[test]
fn range_union() {
    let mut registry = InMemoryCatalog::new();
    registry.add_package(
        "web",
        v("1.0.0"),
        [
            dep("http", range(">=2.0.0, <3.0.0")),
            dep("json", range(">=1.5.0")),
        ],
    );
    registry.add_package("http", v("2.5.0"), []);
    registry.add_package("json", v("1.5.0"), []);

    let solution = solve(root_of(&[("web", exact("1.0.0"))]), registry).unwrap();
    assert!(solution.contains(&("web", v("1.0.0"))));
    assert!(solution.contains(&("http", v("2.5.0"))));
    assert!(solution.contains(&("json", v("1.5.0"))));
}

fn ruby_gems_registry() -> InMemoryCatalog<Pkg, Ver> {
    let mut registry = InMemoryCatalog::new();
    for version in ["1.3.0", "2.3.0", "2.4.0", "2.4.1", "3.0.0"] {
        registry.add_package("rubyzip", v(version), []);
    }
    registry.add_package(
        "roo",
        v("2.1.0"),
        [dep("rubyzip", range(">=3.0.0, <4.0.0"))],
    );
    registry.add_package(
        "roo",
        v("2.10.1"),
        [dep("rubyzip", range(">=1.3.0, <3.0.0"))],
    );
    registry.add_package(
        "roo",
        v("3.0.0"),
        [dep("rubyzip", range(">=3.0.0, <4.0.0"))],
    );
    registry.add_package(
        "rubyXL",
        v("3.4.14"),
        [dep("rubyzip", range(">=2.4.0, <3.0.0"))],
    );
    registry.add_package(
        "rubyXL",
        v("3.4.34"),
        [dep("rubyzip", range(">=2.4.0, <3.0.0"))],
    );
    registry
}

/// The solver must reject the newest roo, backtrack past an
/// already-chosen rubyXL decision, and land on the only compatible
/// rubyzip window.
#[test]
fn late_upgrade_across_learned_clauses() {
    let root = root_of(&[("roo", range("*")), ("rubyXL", range("*"))]);
    let solution = solve(root, ruby_gems_registry()).unwrap();
    assert!(solution.contains(&("roo", v("2.10.1"))));
    assert!(solution.contains(&("rubyXL", v("3.4.34"))));
    assert!(solution.contains(&("rubyzip", v("2.4.1"))));
}

#[test]
fn identical_inputs_solve_identically() {
    let run = || {
        let root = root_of(&[("roo", range("*")), ("rubyXL", range("*"))]);
        solve(root, ruby_gems_registry()).unwrap()
    };
    let first = run();
    for _ in 0..5 {
        assert_eq!(run(), first);
    }
}

#[test]
fn identical_inputs_fail_identically() {
    let run = || {
        let mut registry = InMemoryCatalog::new();
        registry.add_package("A", v("1.0.0"), [dep("B", exact("1.0.0"))]);
        registry.add_package("C", v("1.0.0"), [dep("B", exact("2.0.0"))]);
        registry.add_package("B", v("1.0.0"), []);
        registry.add_package("B", v("2.0.0"), []);
        let root = root_of(&[("A", exact("1.0.0")), ("C", exact("1.0.0"))]);
        solve_tracked(root, registry).unwrap_err().to_string()
    };
    let first = run();
    for _ in 0..5 {
        assert_eq!(run(), first);
    }
}

#[test]
fn iteration_limit_is_enforced() {
    let root = root_of(&[("ghost", exact("1.0.0"))]);
    let (catalog, term) = combine(root, InMemoryCatalog::new());
    let options = SolverOptions::default().max_steps(1);
    let err = Solver::with_options(catalog, options).solve(term).unwrap_err();
    assert!(matches!(err, SolveError::IterationLimit { steps: 1 }));
}

#[test]
fn missing_package_is_a_conflict_not_an_error() {
    // ghost is absent from every catalog: with tracking the failure
    // explains that no versions satisfy the requirement.
    let root = root_of(&[("ghost", exact("1.0.0"))]);
    let err = solve_tracked(root, InMemoryCatalog::new()).unwrap_err();
    let SolveError::NoSolution(no_solution) = err else {
        panic!("expected NoSolution, got {err:?}");
    };
    assert!(no_solution
        .to_string()
        .contains("No versions of ghost == 1.0.0 satisfy the constraint"));
}

#[test]
fn root_term_must_be_positive_and_exact() {
    let registry: InMemoryCatalog<Pkg, Ver> = InMemoryCatalog::new();
    let (catalog, _) = combine(root_of(&[]), registry);
    let solver = Solver::new(catalog);

    let err = solver
        .solve(Term::negative("$$root", exact("1.0.0")))
        .unwrap_err();
    assert!(matches!(err, SolveError::InvalidRoot { .. }));

    let err = solver
        .solve(Term::new("$$root", range(">=1.0.0")))
        .unwrap_err();
    assert!(matches!(err, SolveError::InvalidRoot { .. }));
}

#[derive(Debug)]
struct Caret {
    base: Ver,
}

impl fmt::Display for Caret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "^{}", self.base)
    }
}

impl CustomCondition<Ver> for Caret {
    fn satisfies(&self, version: &Ver) -> bool {
        version.major == self.base.major && *version >= self.base
    }

    fn to_version_set(&self) -> Option<IntervalSet<Ver>> {
        let next_major = SemanticVersion::new(self.base.major + 1, 0, 0);
        Some(IntervalSet::between(self.base.clone(), next_major))
    }
}

#[test]
fn custom_condition_with_version_set() {
    let mut registry = InMemoryCatalog::new();
    for version in ["1.0.0", "1.2.0", "1.2.3", "1.5.0", "2.0.0"] {
        registry.add_package("lib", v(version), []);
    }

    let mut root = RootCatalog::new("$$root", v("1.0.0"));
    root.require(
        "lib",
        Condition::Custom(Arc::new(Caret { base: v("1.2.3") })),
    );

    let solution = solve(root, registry).unwrap();
    assert!(solution.contains(&("lib", v("1.5.0"))));
}

#[derive(Debug)]
struct EvenMinor;

impl fmt::Display for EvenMinor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "even minor")
    }
}

impl CustomCondition<Ver> for EvenMinor {
    fn satisfies(&self, version: &Ver) -> bool {
        version.minor % 2 == 0
    }
}

/// An opaque condition cannot join set algebra; the solver still honors
/// it by checking candidate versions pointwise at decision time.
#[test]
fn opaque_condition_is_checked_pointwise() {
    let mut registry = InMemoryCatalog::new();
    for version in ["1.1.0", "1.2.0", "1.3.0"] {
        registry.add_package("lib", v(version), []);
    }

    let mut root = RootCatalog::new("$$root", v("1.0.0"));
    root.require("lib", Condition::Custom(Arc::new(EvenMinor)));

    let solution = solve(root, registry).unwrap();
    assert!(solution.contains(&("lib", v("1.2.0"))));
}

#[derive(Debug)]
struct BrokenCatalog;

#[derive(Debug)]
struct Offline;

impl fmt::Display for Offline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "registry offline")
    }
}

impl std::error::Error for Offline {}

impl depsolve::Catalog for BrokenCatalog {
    type P = Pkg;
    type V = Ver;
    type Err = Offline;

    fn versions(&self, package: &Pkg) -> Result<Vec<Ver>, CatalogError<Offline>> {
        match *package {
            "$$root" => Ok(vec![v("1.0.0")]),
            _ => Err(CatalogError::Other(Offline)),
        }
    }

    fn dependencies(
        &self,
        package: &Pkg,
        _version: &Ver,
    ) -> Result<Vec<Term<Pkg, Ver>>, CatalogError<Offline>> {
        match *package {
            "$$root" => Ok(vec![dep("lib", exact("1.0.0"))]),
            _ => Err(CatalogError::Other(Offline)),
        }
    }
}

#[test]
fn catalog_failures_surface_immediately() {
    let err = Solver::new(BrokenCatalog)
        .solve(Term::new("$$root", exact("1.0.0")))
        .unwrap_err();
    let SolveError::Versions { package, source } = err else {
        panic!("expected Versions error, got {err:?}");
    };
    assert_eq!(package, "lib");
    assert!(matches!(source, CatalogError::Other(Offline)));
}

/// Every version chosen is the highest the constraints admit.
#[test]
fn prefers_highest_admissible_version() {
    let mut registry = InMemoryCatalog::new();
    for version in ["1.0.0", "1.2.0", "1.9.0", "2.0.0"] {
        registry.add_package("pkg", v(version), []);
    }
    let solution = solve(root_of(&[("pkg", range(">=1.0.0, <2.0.0"))]), registry).unwrap();
    assert_eq!(solution, vec![("pkg", v("1.9.0"))]);
}

/// A range constraint should steer the solver to newer versions that
/// unlock newer transitive dependencies.
#[test]
fn ranges_pick_newer_versions_transitively() {
    let mut registry = InMemoryCatalog::new();
    registry.add_package("A", v("1.0.0"), []);
    registry.add_package("A", v("1.1.0"), [dep("B", range(">=2.0.0"))]);
    registry.add_package("B", v("2.0.0"), []);
    registry.add_package("B", v("2.1.0"), []);

    let solution = solve(root_of(&[("A", range(">=1.0.0, <2.0.0"))]), registry).unwrap();
    assert!(solution.contains(&("A", v("1.1.0"))));
    assert!(solution.contains(&("B", v("2.1.0"))));
}

#[test]
fn prerelease_ranges_resolve() {
    let mut registry = InMemoryCatalog::new();
    registry.add_package("lib", v("1.0.0-alpha.1"), []);
    registry.add_package("lib", v("1.0.0-beta.1"), []);

    let root = root_of(&[("lib", range(">=1.0.0-alpha.1, <1.0.0"))]);
    let solution = solve(root, registry).unwrap();
    // beta sorts above alpha and below the release itself.
    assert_eq!(solution, vec![("lib", v("1.0.0-beta.1"))]);
}

/// Version lists from several catalogs are merged, and the highest
/// admissible version wins regardless of which catalog serves it.
#[test]
fn combined_catalogs_prefer_highest_version() {
    let mut first = InMemoryCatalog::new();
    first.add_package("pkg", v("1.0.0"), []);
    let mut second = InMemoryCatalog::new();
    second.add_package("pkg", v("1.2.0"), []);

    let root = root_of(&[("pkg", range(">=1.0.0, <2.0.0"))]);
    let term = root.term();
    let mut catalog = CombinedCatalog::new();
    catalog.push(root);
    catalog.push(first);
    catalog.push(second);

    let solution = Solver::new(catalog).solve(term).unwrap();
    assert_eq!(solution, vec![("pkg", v("1.2.0"))]);
}

#[test]
fn cached_catalog_answers_repeat_queries_from_cache() {
    use depsolve::CachedCatalog;

    let root = root_of(&[("roo", range("*")), ("rubyXL", range("*"))]);
    let term = root.term();
    let mut catalog = CombinedCatalog::new();
    catalog.push(root);
    catalog.push(ruby_gems_registry());
    let cached = CachedCatalog::new(catalog);

    let solution = Solver::new(cached).solve(term).unwrap();
    assert!(solution.contains(&("rubyzip", v("2.4.1"))));
}
