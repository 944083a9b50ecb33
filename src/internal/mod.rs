// SPDX-License-Identifier: MPL-2.0

//! Non-public modules of the solver engine.

pub(crate) mod arena;
pub(crate) mod incompatibility;
pub(crate) mod partial_solution;
pub(crate) mod state;

pub(crate) use incompatibility::{IncompId, Incompatibility};
pub(crate) use state::{ConflictResolution, SolverState};
