// SPDX-License-Identifier: MPL-2.0

//! Proptest strategies for interval sets.

use crate::{Bound, IntervalSet};

use proptest::prelude::*;

/// A strategy producing arbitrary canonical interval sets over `u32`.
///
/// Bounds are derived from a random vector of deltas so intervals come out
/// ascending; each delta is paired with a random inclusivity flag, and the
/// set may start unbounded below or end unbounded above.
pub fn intervals() -> impl Strategy<Value = IntervalSet<u32>> {
    (
        any::<bool>(),
        prop::collection::vec((1u32..100, any::<bool>()), 0..8),
    )
        .prop_map(|(start_unbounded, deltas)| to_intervals(start_unbounded, deltas))
}

fn to_intervals(start_unbounded: bool, deltas: Vec<(u32, bool)>) -> IntervalSet<u32> {
    let mut set = IntervalSet::empty();
    let mut cursor: u32 = 0;
    let mut pending: Option<Bound<u32>> = if start_unbounded {
        Some(Bound::NegativeInfinity)
    } else {
        None
    };

    for (delta, inclusive) in deltas {
        cursor = match cursor.checked_add(delta) {
            Some(next) => next,
            None => break,
        };
        let bound = Bound::Finite {
            version: cursor,
            inclusive,
        };
        match pending.take() {
            Some(lower) => {
                set = set.union(&IntervalSet::from_bounds(lower, bound));
            }
            None => {
                pending = Some(bound);
            }
        }
    }

    if let Some(lower) = pending {
        set = set.union(&IntervalSet::from_bounds(lower, Bound::PositiveInfinity));
    }
    set
}
