// SPDX-License-Identifier: MPL-2.0

//! Publicly exported type aliases.

/// Map implementation used by the library.
pub type Map<K, V> = rustc_hash::FxHashMap<K, V>;

/// Set implementation used by the library.
pub type Set<V> = rustc_hash::FxHashSet<V>;

/// Concrete package versions picked during [`solve`](crate::Solver::solve),
/// one `(package, version)` pair per decided non-root package, in decision
/// order.
pub type Solution<P, V> = Vec<(P, V)>;
