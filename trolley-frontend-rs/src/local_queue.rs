//! The persisted shape of a not-yet-confirmed mutation: what the journal
//! stores so a reload can re-submit everything the server hasn't seen yet.

use checkout_utils::{
    AddItemsVariables, CartItem, QuantityInput, SetManualPriceVariables, UpdateItemsVariables,
};
use chrono::{DateTime, Utc};
use conveyor::RewriteRefs;
use serde::{Deserialize, Serialize};

/// One queued unit of work. `snapshot` is the affected-lines copy captured at
/// enqueue time (the rollback source); `correlation_id` keys executor
/// cancellation and in-place coalescing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueuedMutation {
    AddItems {
        variables: AddItemsVariables,
        /// The optimistically-added lines, placeholder ids included.
        snapshot: im::Vector<CartItem>,
        correlation_id: String,
        enqueued_at: DateTime<Utc>,
    },
    UpdateItems {
        variables: UpdateItemsVariables,
        /// The full item list as it was when the task was enqueued, so
        /// index-addressed inputs stay meaningful for rollback.
        snapshot: im::Vector<CartItem>,
        correlation_id: String,
        enqueued_at: DateTime<Utc>,
    },
    SetManualPrice {
        variables: SetManualPriceVariables,
        correlation_id: String,
        enqueued_at: DateTime<Utc>,
    },
}

impl QueuedMutation {
    pub fn correlation_id(&self) -> &str {
        match self {
            Self::AddItems { correlation_id, .. }
            | Self::UpdateItems { correlation_id, .. }
            | Self::SetManualPrice { correlation_id, .. } => correlation_id,
        }
    }
}

impl RewriteRefs for QueuedMutation {
    fn rewrite_reference(&mut self, old_id: &str, new_id: &str) {
        match self {
            Self::AddItems { snapshot, .. } => rewrite_snapshot(snapshot, old_id, new_id),
            Self::UpdateItems {
                variables,
                snapshot,
                ..
            } => {
                for input in &mut variables.order_items {
                    if let QuantityInput::ByUniqueId { unique_id, .. } = input {
                        if unique_id == old_id {
                            *unique_id = new_id.to_string();
                        }
                    }
                }
                rewrite_snapshot(snapshot, old_id, new_id);
            }
            Self::SetManualPrice { .. } => {}
        }
    }
}

fn rewrite_snapshot(snapshot: &mut im::Vector<CartItem>, old_id: &str, new_id: &str) {
    for line in snapshot.iter_mut() {
        if line.unique_id == old_id {
            line.unique_id = new_id.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkout_utils::{Availability, CartItem};

    fn snapshot_line(unique_id: &str) -> CartItem {
        CartItem {
            unique_id: unique_id.to_string(),
            id: "42".to_string(),
            quantity: 1,
            availability: Availability::Available,
            ..CartItem::default()
        }
    }

    fn update(unique_id: &str, quantity: u32) -> QueuedMutation {
        QueuedMutation::UpdateItems {
            variables: UpdateItemsVariables {
                order_items: vec![QuantityInput::ByUniqueId {
                    unique_id: unique_id.to_string(),
                    quantity,
                }],
            },
            snapshot: im::vector![snapshot_line(unique_id)],
            correlation_id: "task-1".to_string(),
            enqueued_at: Utc::now(),
        }
    }

    #[test]
    fn test_rewrite_touches_payload_and_snapshot() {
        let mut task = update("local-1-0", 5);
        task.rewrite_reference("local-1-0", "srv-9");

        let QueuedMutation::UpdateItems {
            variables,
            snapshot,
            ..
        } = task
        else {
            unreachable!()
        };
        assert_eq!(variables.order_items[0].unique_id(), Some("srv-9"));
        assert_eq!(snapshot[0].unique_id, "srv-9");
    }

    #[test]
    fn test_rewrite_leaves_other_ids_alone() {
        let mut task = update("srv-1", 5);
        task.rewrite_reference("local-1-0", "srv-9");

        let QueuedMutation::UpdateItems { variables, .. } = task else {
            unreachable!()
        };
        assert_eq!(variables.order_items[0].unique_id(), Some("srv-1"));
    }

    #[test]
    fn test_persisted_shape_round_trips() {
        let task = update("local-1-0", 3);
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains("\"type\":\"update_items\""));

        let parsed: QueuedMutation = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, task);
    }
}
