//! Co-scheduling order: a post-sort pass that places each constrained
//! action immediately adjacent to its referent when both are due at the
//! same instant. Constraints are pairwise only; no graph is built.

use std::sync::Arc;

use chrono::DateTime;
use chrono_tz::Tz;

use crate::error::{Error, Result};
use crate::spec::{ActionSpec, OrderHint};

/// One day's materialised (action, due-instant) list, sorted by instant
/// before this pass runs.
pub type DueEntry = (Arc<ActionSpec>, DateTime<Tz>);

/// Enforce `before`/`after` adjacency within equal-due-time runs. The
/// input must already be stably sorted by due instant; the output is one
/// deterministic linearisation.
pub fn apply(entries: &mut Vec<DueEntry>) -> Result<()> {
    // Process constrained actions in their current (stable) order.
    let constrained: Vec<String> = entries
        .iter()
        .filter(|(spec, _)| spec.order.is_some())
        .map(|(spec, _)| spec.name.clone())
        .collect();

    for name in constrained {
        let Some(idx) = entries.iter().position(|(s, _)| s.name == name) else {
            continue;
        };
        let (spec, due) = entries[idx].clone();
        let Some(hint) = spec.order.clone() else {
            continue;
        };
        let referent = hint.referent();
        if referent == spec.name {
            return Err(Error::OrderSelfReference {
                action: spec.name.clone(),
            });
        }
        let Some(ref_idx) = entries.iter().position(|(s, _)| s.name == referent) else {
            return Err(Error::OrderUnknownReferent {
                action: spec.name.clone(),
                referent: referent.to_string(),
            });
        };
        if entries[ref_idx].1 != due {
            return Err(Error::OrderUnequalDue {
                action: spec.name.clone(),
                referent: referent.to_string(),
            });
        }

        entries.remove(idx);
        // Index of the referent after the removal.
        let ref_idx = match entries.iter().position(|(s, _)| s.name == referent) {
            Some(i) => i,
            None => continue,
        };
        let insert_at = match hint {
            OrderHint::Before(_) => ref_idx,
            OrderHint::After(_) => ref_idx + 1,
        };
        entries.insert(insert_at, (spec, due));
    }
    Ok(())
}
