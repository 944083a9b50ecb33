// SPDX-License-Identifier: MPL-2.0

//! Trait for identifying packages.

use std::fmt::{Debug, Display};
use std::hash::Hash;

/// Trait for identifying packages.
///
/// It is automatically implemented for any type that fits, such as
/// [`String`] or `&str`. Cheap equality matters: the solver compares
/// package names constantly, so interned or small types work best.
pub trait Package: Clone + Eq + Hash + Debug + Display {}

impl<T: Clone + Eq + Hash + Debug + Display> Package for T {}
