//! Decides whether a new quantity-change intent can be folded into a task
//! that is queued but hasn't started, instead of growing the queue.
//!
//! The constraint is structural stability: a task's payload is only
//! meaningful against the line ordering it was built for. An add appends
//! lines and a removal shifts every index after it, so the scan walks the
//! journal tail-to-head and gives up at the first entry of either kind. The
//! in-flight head (and anything already executing) is never a merge target.

use checkout_utils::{QuantityInput, UpdateItemsVariables};

use crate::local_queue::QueuedMutation;

/// A merge the planner decided on: overwrite the journal entry at `position`
/// with `replacement` (same correlation id, merged payload) and cancel the
/// superseded executor task.
#[derive(Debug)]
pub(crate) struct Merge {
    pub position: usize,
    pub replacement: QueuedMutation,
}

/// Scan `entries` tail-to-head for a task that can absorb `input`.
/// `is_pending` reports whether the entry's executor task is still waiting to
/// start; the scan stops at the first entry that is already running (or done
/// but not yet removed), at the first add, and at the first removal-causing
/// update.
pub(crate) fn plan(
    entries: &[QueuedMutation],
    input: &QuantityInput,
    is_pending: impl Fn(&str) -> bool,
) -> Option<Merge> {
    for (position, entry) in entries.iter().enumerate().rev() {
        if !is_pending(entry.correlation_id()) {
            return None;
        }

        match entry {
            // Price-only: line order is untouched, keep scanning.
            QueuedMutation::SetManualPrice { .. } => continue,
            QueuedMutation::AddItems { .. } => return None,
            QueuedMutation::UpdateItems {
                variables,
                snapshot,
                correlation_id,
                enqueued_at,
            } => {
                let disruptive_or_positional = variables
                    .order_items
                    .iter()
                    .any(|existing| existing.is_removal() || existing.unique_id().is_none());
                if disruptive_or_positional {
                    return None;
                }

                let mut variables = variables.clone();
                merge_quantity_change(&mut variables, input.clone());
                return Some(Merge {
                    position,
                    replacement: QueuedMutation::UpdateItems {
                        variables,
                        snapshot: snapshot.clone(),
                        correlation_id: correlation_id.clone(),
                        enqueued_at: *enqueued_at,
                    },
                });
            }
        }
    }
    None
}

/// Upsert `input` into the payload: the newest intent for a line wins, any
/// other line's change rides along in the same network call.
fn merge_quantity_change(variables: &mut UpdateItemsVariables, input: QuantityInput) {
    if let Some(existing) = variables
        .order_items
        .iter_mut()
        .find(|existing| existing.same_line(&input))
    {
        *existing = input;
    } else {
        variables.order_items.push(input);
    }
}
