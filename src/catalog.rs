//! Catalogs supply package versions and dependency terms to the solver.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::convert::Infallible;

use thiserror::Error;

use crate::condition::Condition;
use crate::package::Package;
use crate::term::Term;
use crate::type_aliases::Map;
use crate::version::Version;

/// Error returned by catalog queries.
///
/// The missing-package and missing-version kinds are distinguished because
/// the solver treats them as "no admissible versions" when picking a
/// version, while any other failure aborts the solve.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError<E: std::error::Error + 'static> {
    #[error("package not found")]
    PackageNotFound,
    #[error("version not found")]
    VersionNotFound,
    #[error(transparent)]
    Other(#[from] E),
}

/// Access to package versions and their dependencies.
///
/// Implementations can serve from memory, disk or the network; the solver
/// only requires that repeated queries during one solve return consistent
/// answers. Caching is a catalog concern, see [`CachedCatalog`].
pub trait Catalog {
    /// How packages are identified.
    type P: Package;

    /// How versions are represented.
    type V: Version;

    /// Failures beyond the distinguished not-found kinds.
    type Err: std::error::Error + 'static;

    /// All versions of a package, sorted ascending.
    ///
    /// The solver picks the highest admissible version, so the order
    /// matters and must be consistent between calls.
    fn versions(&self, package: &Self::P) -> Result<Vec<Self::V>, CatalogError<Self::Err>>;

    /// The dependency terms of one package version.
    fn dependencies(
        &self,
        package: &Self::P,
        version: &Self::V,
    ) -> Result<Vec<Term<Self::P, Self::V>>, CatalogError<Self::Err>>;
}

/// An in-memory catalog, useful for tests and small dependency graphs.
///
/// ```
/// use depsolve::{Condition, InMemoryCatalog, Term};
///
/// let mut catalog = InMemoryCatalog::new();
/// catalog.add_package("lodash", 10u32, [Term::new("core-js", Condition::Exact(2u32))]);
/// catalog.add_package("core-js", 2u32, []);
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryCatalog<P: Package, V: Version> {
    packages: Map<P, BTreeMap<V, Vec<Term<P, V>>>>,
}

impl<P: Package, V: Version> Default for InMemoryCatalog<P, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Package, V: Version> InMemoryCatalog<P, V> {
    pub fn new() -> Self {
        InMemoryCatalog {
            packages: Map::default(),
        }
    }

    /// Registers one package version with its dependency terms, replacing
    /// any previous registration of the same pair.
    pub fn add_package(
        &mut self,
        package: P,
        version: V,
        dependencies: impl IntoIterator<Item = Term<P, V>>,
    ) {
        self.packages
            .entry(package)
            .or_default()
            .insert(version, dependencies.into_iter().collect());
    }

    /// The packages registered so far, in no particular order.
    pub fn packages(&self) -> impl Iterator<Item = &P> {
        self.packages.keys()
    }
}

impl<P: Package, V: Version> Catalog for InMemoryCatalog<P, V> {
    type P = P;
    type V = V;
    type Err = Infallible;

    fn versions(&self, package: &P) -> Result<Vec<V>, CatalogError<Infallible>> {
        let versions = self
            .packages
            .get(package)
            .ok_or(CatalogError::PackageNotFound)?;
        Ok(versions.keys().cloned().collect())
    }

    fn dependencies(
        &self,
        package: &P,
        version: &V,
    ) -> Result<Vec<Term<P, V>>, CatalogError<Infallible>> {
        let versions = self
            .packages
            .get(package)
            .ok_or(CatalogError::PackageNotFound)?;
        versions
            .get(version)
            .cloned()
            .ok_or(CatalogError::VersionNotFound)
    }
}

/// The root pseudo-package: a catalog with a single synthetic package whose
/// sole version depends on the user's top-level requirements.
///
/// ```
/// use depsolve::{Condition, RootCatalog};
///
/// let mut root = RootCatalog::new("$$root", 1u32);
/// root.require("lodash", Condition::Exact(3u32));
/// let term = root.term(); // pass this to Solver::solve
/// ```
#[derive(Debug, Clone)]
pub struct RootCatalog<P: Package, V: Version> {
    package: P,
    version: V,
    requirements: Vec<Term<P, V>>,
}

impl<P: Package, V: Version> RootCatalog<P, V> {
    pub fn new(package: P, version: V) -> Self {
        RootCatalog {
            package,
            version,
            requirements: Vec::new(),
        }
    }

    /// Adds a top-level requirement.
    pub fn require(&mut self, package: P, condition: Condition<V>) {
        self.requirements.push(Term::new(package, condition));
    }

    /// The term pinning the root package itself, the starting point for
    /// [`solve`](crate::Solver::solve).
    pub fn term(&self) -> Term<P, V> {
        Term::new(
            self.package.clone(),
            Condition::Exact(self.version.clone()),
        )
    }
}

impl<P: Package, V: Version> Catalog for RootCatalog<P, V> {
    type P = P;
    type V = V;
    type Err = Infallible;

    fn versions(&self, package: &P) -> Result<Vec<V>, CatalogError<Infallible>> {
        if *package != self.package {
            return Err(CatalogError::PackageNotFound);
        }
        Ok(vec![self.version.clone()])
    }

    fn dependencies(
        &self,
        package: &P,
        version: &V,
    ) -> Result<Vec<Term<P, V>>, CatalogError<Infallible>> {
        if *package != self.package {
            return Err(CatalogError::PackageNotFound);
        }
        if *version != self.version {
            return Err(CatalogError::VersionNotFound);
        }
        Ok(self.requirements.clone())
    }
}

/// An ordered fallback over several catalogs.
///
/// Version lists are merged across all catalogs and re-sorted; dependency
/// lists come from the first catalog that knows the package version.
pub struct CombinedCatalog<P: Package, V: Version, E: std::error::Error + 'static = Infallible> {
    catalogs: Vec<Box<dyn Catalog<P = P, V = V, Err = E>>>,
}

impl<P: Package, V: Version, E: std::error::Error + 'static> Default for CombinedCatalog<P, V, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Package, V: Version, E: std::error::Error + 'static> CombinedCatalog<P, V, E> {
    pub fn new() -> Self {
        CombinedCatalog {
            catalogs: Vec::new(),
        }
    }

    /// Appends a catalog; earlier catalogs win for dependency lookups.
    pub fn push<C>(&mut self, catalog: C)
    where
        C: Catalog<P = P, V = V, Err = E> + 'static,
    {
        self.catalogs.push(Box::new(catalog));
    }
}

impl<P: Package, V: Version, E: std::error::Error + 'static> Catalog for CombinedCatalog<P, V, E> {
    type P = P;
    type V = V;
    type Err = E;

    fn versions(&self, package: &P) -> Result<Vec<V>, CatalogError<E>> {
        let mut merged = Vec::new();
        for catalog in &self.catalogs {
            match catalog.versions(package) {
                Ok(versions) => merged.extend(versions),
                Err(CatalogError::PackageNotFound) => continue,
                Err(other) => return Err(other),
            }
        }
        if merged.is_empty() {
            return Err(CatalogError::PackageNotFound);
        }
        merged.sort();
        Ok(merged)
    }

    fn dependencies(&self, package: &P, version: &V) -> Result<Vec<Term<P, V>>, CatalogError<E>> {
        for catalog in &self.catalogs {
            match catalog.dependencies(package, version) {
                Ok(dependencies) => return Ok(dependencies),
                Err(CatalogError::PackageNotFound) | Err(CatalogError::VersionNotFound) => continue,
                Err(other) => return Err(other),
            }
        }
        Err(CatalogError::VersionNotFound)
    }
}

/// Counters kept by [`CachedCatalog`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub versions_calls: u64,
    pub versions_hits: u64,
    pub dependencies_calls: u64,
    pub dependencies_hits: u64,
}

impl CacheStats {
    /// Fraction of all queries answered from the cache.
    pub fn hit_rate(&self) -> f64 {
        let calls = self.versions_calls + self.dependencies_calls;
        if calls == 0 {
            return 0.0;
        }
        (self.versions_hits + self.dependencies_hits) as f64 / calls as f64
    }
}

/// A memoising wrapper around another catalog.
///
/// Worthwhile when the inner catalog performs I/O; version lists and
/// dependency lists are assumed immutable for the cache's lifetime. Only
/// successful answers are cached.
pub struct CachedCatalog<C: Catalog> {
    inner: C,
    versions: RefCell<Map<C::P, Vec<C::V>>>,
    dependencies: RefCell<Map<C::P, BTreeMap<C::V, Vec<Term<C::P, C::V>>>>>,
    stats: RefCell<CacheStats>,
}

impl<C: Catalog> CachedCatalog<C> {
    pub fn new(inner: C) -> Self {
        CachedCatalog {
            inner,
            versions: RefCell::new(Map::default()),
            dependencies: RefCell::new(Map::default()),
            stats: RefCell::new(CacheStats::default()),
        }
    }

    pub fn stats(&self) -> CacheStats {
        *self.stats.borrow()
    }

    /// Drops all cached answers and resets the counters.
    pub fn clear(&self) {
        self.versions.borrow_mut().clear();
        self.dependencies.borrow_mut().clear();
        *self.stats.borrow_mut() = CacheStats::default();
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: Catalog> Catalog for CachedCatalog<C> {
    type P = C::P;
    type V = C::V;
    type Err = C::Err;

    fn versions(&self, package: &C::P) -> Result<Vec<C::V>, CatalogError<C::Err>> {
        self.stats.borrow_mut().versions_calls += 1;
        if let Some(versions) = self.versions.borrow().get(package) {
            self.stats.borrow_mut().versions_hits += 1;
            return Ok(versions.clone());
        }
        let versions = self.inner.versions(package)?;
        self.versions
            .borrow_mut()
            .insert(package.clone(), versions.clone());
        Ok(versions)
    }

    fn dependencies(
        &self,
        package: &C::P,
        version: &C::V,
    ) -> Result<Vec<Term<C::P, C::V>>, CatalogError<C::Err>> {
        self.stats.borrow_mut().dependencies_calls += 1;
        if let Some(dependencies) = self
            .dependencies
            .borrow()
            .get(package)
            .and_then(|by_version| by_version.get(version))
        {
            self.stats.borrow_mut().dependencies_hits += 1;
            return Ok(dependencies.clone());
        }
        let dependencies = self.inner.dependencies(package, version)?;
        self.dependencies
            .borrow_mut()
            .entry(package.clone())
            .or_default()
            .insert(version.clone(), dependencies.clone());
        Ok(dependencies)
    }
}
