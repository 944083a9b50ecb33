// SPDX-License-Identifier: MPL-2.0

//! Version conditions attached to terms.

use std::fmt::{self, Debug, Display};
use std::sync::Arc;

use version_interval::IntervalSet;

use crate::version::Version;

/// A user-supplied condition shape.
///
/// The solver operates on version sets, so a custom condition should
/// implement [`to_version_set`](CustomCondition::to_version_set) whenever
/// its versions form intervals. Without it the condition stays opaque: the
/// solver never propagates on it and falls back to checking candidate
/// versions one by one with [`satisfies`](CustomCondition::satisfies),
/// which is correct but learns nothing from conflicts involving it.
pub trait CustomCondition<V>: Debug + Display {
    /// Whether the given version meets the condition.
    fn satisfies(&self, version: &V) -> bool;

    /// The condition as a version set, when it can be expressed as one.
    fn to_version_set(&self) -> Option<IntervalSet<V>> {
        None
    }
}

/// A constraint on the versions of one package.
#[derive(Debug, Clone)]
pub enum Condition<V> {
    /// Any version.
    Any,
    /// Exactly the given version.
    Exact(V),
    /// Any version in the set.
    Set(IntervalSet<V>),
    /// A user-supplied condition, shared so terms stay cheap to clone.
    Custom(Arc<dyn CustomCondition<V>>),
}

impl<V: Version> Condition<V> {
    /// Whether the given version meets the condition.
    pub fn satisfies(&self, version: &V) -> bool {
        match self {
            Condition::Any => true,
            Condition::Exact(exact) => exact == version,
            Condition::Set(set) => set.contains(version),
            Condition::Custom(custom) => custom.satisfies(version),
        }
    }

    /// The condition upcast to a version set, `None` for opaque custom
    /// conditions.
    pub fn to_set(&self) -> Option<IntervalSet<V>> {
        match self {
            Condition::Any => Some(IntervalSet::full()),
            Condition::Exact(exact) => Some(IntervalSet::singleton(exact.clone())),
            Condition::Set(set) => Some(set.clone()),
            Condition::Custom(custom) => custom.to_version_set(),
        }
    }
}

impl<V: PartialEq> PartialEq for Condition<V> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Condition::Any, Condition::Any) => true,
            (Condition::Exact(a), Condition::Exact(b)) => a == b,
            (Condition::Set(a), Condition::Set(b)) => a == b,
            (Condition::Custom(a), Condition::Custom(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            _ => false,
        }
    }
}

impl<V: Eq> Eq for Condition<V> {}

impl<V: Display> Display for Condition<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Any => write!(f, "*"),
            Condition::Exact(version) => write!(f, "== {version}"),
            Condition::Set(set) => Display::fmt(set, f),
            Condition::Custom(custom) => Display::fmt(custom, f),
        }
    }
}
