#![deny(clippy::string_slice)]

//! The storefront's cart mutation engine.
//!
//! Every façade call updates the local cart synchronously (the UI re-renders
//! right away), journals a task durably, and queues the remote call. The
//! server's answer flows back in strictly the order the edits were made, and
//! only once the whole queue drains does the server's form replace the local
//! one wholesale. A remote failure rolls the optimistic edit back before it
//! surfaces; a reload replays whatever the journal still holds.

mod coalesce;
mod local_queue;
mod reconcile;
mod tasks;
mod totals;
mod transport;
mod utils;

#[cfg(target_arch = "wasm32")]
pub mod browser;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use checkout_utils::{
    AddItemsVariables, CartForm, CartItem, CatalogItemInput, ItemInput, MarketingData,
    QuantityInput, SetManualPriceVariables, UpdateItemsVariables,
};
use chrono::Utc;
use futures::channel::oneshot;
use slotmap::SlotMap;

use conveyor::{Journal, TaskHandle, TaskQueue, TelemetryEvent};

pub use conveyor::{
    BlobStore, ListenerKey, LogTelemetry, MemoryStore, QueueStatus, Spawner, TaskOutcome,
    Telemetry,
};
pub use local_queue::QueuedMutation;
pub use tasks::MutationError;
#[cfg(target_arch = "wasm32")]
pub use transport::HttpTransport;
pub use transport::{CartTransport, TransportError};
pub use utils::set_panic_hook;

use crate::tasks::Shared;
use crate::utils::fresh_correlation_id;

/// localStorage key of the persisted mutation journal.
const JOURNAL_KEY: &str = "cartMutationQueue";

/// How a façade call addresses a cart line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemRef {
    /// Catalog sku id (plus the implicit "no assembly options" match).
    CatalogId(String),
    /// The line's unique id — placeholder or server-confirmed, both work.
    UniqueId(String),
    /// Position in the current item list. Goes stale when the order shifts.
    Index(usize),
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CatalogId(id) => write!(f, "id {id}"),
            Self::UniqueId(unique_id) => write!(f, "unique id {unique_id}"),
            Self::Index(index) => write!(f, "index {index}"),
        }
    }
}

/// Raised synchronously, before anything is queued or applied.
#[derive(Debug, thiserror::Error)]
pub enum CartError {
    #[error("item {0} not found in cart")]
    ItemNotFound(String),
}

/// The UI-facing half of a queued mutation: resolves once the task settles,
/// after rollback/reconciliation already ran. Dropping it is fine — the task
/// is not attached to it.
#[derive(Debug)]
pub struct PendingMutation {
    receiver: oneshot::Receiver<TaskOutcome<CartForm, MutationError>>,
}

impl PendingMutation {
    pub async fn outcome(self) -> TaskOutcome<CartForm, MutationError> {
        self.receiver.await.unwrap_or(TaskOutcome::Cancelled)
    }
}

/// What `add_items` did: `added_new_line` is false when every input folded
/// into an existing line's quantity.
pub struct AddedItems {
    pub added_new_line: bool,
    pub pending: Vec<PendingMutation>,
}

/// The cart mutation engine. One instance per cart; collaborators (durable
/// store, transport, telemetry, spawner) are injected so tests can run any
/// number of independent engines.
pub struct Trolley {
    shared: Rc<Shared>,
    queue: TaskQueue<CartForm, MutationError>,
    spawner: Spawner,
}

impl Trolley {
    pub fn new(
        initial_form: CartForm,
        store: Rc<dyn BlobStore>,
        transport: Rc<dyn CartTransport>,
        telemetry: Rc<dyn Telemetry>,
        spawner: Spawner,
    ) -> Self {
        let journal = Journal::load(store, JOURNAL_KEY, Rc::clone(&telemetry));
        let queue = TaskQueue::new(Rc::clone(&spawner));

        let shared = Rc::new(Shared {
            cart: RefCell::new(initial_form),
            journal: RefCell::new(journal),
            placeholder_ids: RefCell::new(HashMap::new()),
            transport,
            telemetry,
            cart_listeners: RefCell::new(SlotMap::with_key()),
        });

        let trolley = Self {
            shared,
            queue,
            spawner,
        };
        trolley.install_idle_hook();
        trolley.replay_journal();
        trolley
    }

    /// Snapshot of the current (optimistic) cart.
    pub fn cart(&self) -> CartForm {
        self.shared.cart.borrow().clone()
    }

    pub fn queue_status(&self) -> QueueStatus {
        self.queue.status()
    }

    /// Called after every change to the local cart.
    pub fn subscribe(&self, listener: impl Fn() + 'static) -> ListenerKey {
        self.shared
            .cart_listeners
            .borrow_mut()
            .insert(Rc::new(listener))
    }

    pub fn unsubscribe(&self, key: ListenerKey) {
        self.shared.cart_listeners.borrow_mut().remove(key);
    }

    /// Add items to the cart. An item already in the cart increments that
    /// line's quantity (through the update path, coalescing and all) instead
    /// of appending a duplicate line.
    pub fn add_items(
        &self,
        items: Vec<CatalogItemInput>,
        marketing_data: Option<MarketingData>,
    ) -> Result<AddedItems, CartError> {
        let mut pending = Vec::new();
        let mut new_inputs: Vec<CatalogItemInput> = Vec::new();

        for item in &items {
            let existing = {
                let cart = self.shared.cart.borrow();
                cart.items
                    .iter()
                    .find(|line| reconcile::is_same_item(item, line, &cart.items))
                    .map(|line| (line.unique_id.clone(), line.quantity))
            };
            match existing {
                Some((unique_id, current_quantity)) => {
                    let quantity = item.quantity.unwrap_or(1) + current_quantity;
                    pending.push(self.update_quantity(&ItemRef::UniqueId(unique_id), quantity)?);
                }
                None => new_inputs.push(item.clone()),
            }
        }

        if new_inputs.is_empty() {
            return Ok(AddedItems {
                added_new_line: false,
                pending,
            });
        }

        let lines: im::Vector<CartItem> =
            new_inputs.iter().map(reconcile::item_from_input).collect();
        {
            let mut cart = self.shared.cart.borrow_mut();
            reconcile::apply_add(&mut cart, &lines, marketing_data.as_ref());
        }
        tasks::notify_cart_listeners(&self.shared);

        let entry = QueuedMutation::AddItems {
            variables: AddItemsVariables {
                items: new_inputs.iter().map(ItemInput::from).collect(),
                marketing_data,
            },
            snapshot: lines,
            correlation_id: fresh_correlation_id(),
            enqueued_at: Utc::now(),
        };
        self.shared.journal.borrow_mut().push(entry.clone());
        pending.push(self.submit(entry));

        Ok(AddedItems {
            added_new_line: true,
            pending,
        })
    }

    /// Change a line's quantity; zero removes the line. The local cart
    /// updates before this returns; the remote call is queued (or folded
    /// into an already-queued one).
    pub fn update_quantity(
        &self,
        reference: &ItemRef,
        quantity: u32,
    ) -> Result<PendingMutation, CartError> {
        let snapshot = self.shared.cart.borrow().items.clone();
        let index = self.resolve_index(reference)?;
        let unique_id = snapshot[index].unique_id.clone();

        {
            let mut cart = self.shared.cart.borrow_mut();
            reconcile::apply_quantity_change(&mut cart, index, quantity);
        }
        tasks::notify_cart_listeners(&self.shared);

        let input = QuantityInput::ByUniqueId { unique_id, quantity };

        let planned = {
            let journal = self.shared.journal.borrow();
            coalesce::plan(journal.entries(), &input, |key| self.queue.is_pending(key))
        };

        let entry = match planned {
            Some(merge) => {
                // Fold into the queued task: the superseded executor entry is
                // cancelled and the journal slot overwritten in place, so one
                // network call ends up carrying both changes.
                self.queue.cancel(merge.replacement.correlation_id());
                self.shared
                    .journal
                    .borrow_mut()
                    .replace(merge.position, merge.replacement.clone());
                merge.replacement
            }
            None => {
                let entry = QueuedMutation::UpdateItems {
                    variables: UpdateItemsVariables {
                        order_items: vec![input],
                    },
                    snapshot,
                    correlation_id: fresh_correlation_id(),
                    enqueued_at: Utc::now(),
                };
                self.shared.journal.borrow_mut().push(entry.clone());
                entry
            }
        };

        Ok(self.submit(entry))
    }

    /// Sugar for `update_quantity(reference, 0)`.
    pub fn remove_item(&self, reference: &ItemRef) -> Result<PendingMutation, CartError> {
        self.update_quantity(reference, 0)
    }

    /// Queue a manual price override for the line at `item_index`. No
    /// optimistic edit: the client can't predict how a price change ripples
    /// through the totals, so the form updates when the queue drains.
    pub fn set_manual_price(
        &self,
        item_index: usize,
        price: i64,
    ) -> Result<PendingMutation, CartError> {
        {
            let cart = self.shared.cart.borrow();
            if item_index >= cart.items.len() {
                return Err(CartError::ItemNotFound(format!("index {item_index}")));
            }
        }

        let entry = QueuedMutation::SetManualPrice {
            variables: SetManualPriceVariables { item_index, price },
            correlation_id: fresh_correlation_id(),
            enqueued_at: Utc::now(),
        };
        self.shared.journal.borrow_mut().push(entry.clone());
        Ok(self.submit(entry))
    }

    fn resolve_index(&self, reference: &ItemRef) -> Result<usize, CartError> {
        let cart = self.shared.cart.borrow();
        let position = match reference {
            ItemRef::CatalogId(id) => cart.items.iter().position(|line| line.id == *id),
            ItemRef::UniqueId(unique_id) => cart
                .items
                .iter()
                .position(|line| line.unique_id == *unique_id),
            ItemRef::Index(index) => Some(*index),
        };
        match position {
            Some(index) if index < cart.items.len() => Ok(index),
            _ => Err(CartError::ItemNotFound(reference.to_string())),
        }
    }

    /// Hand a journaled task to the executor and wire up its completion.
    fn submit(&self, entry: QueuedMutation) -> PendingMutation {
        let shared = Rc::clone(&self.shared);
        let correlation_id = Some(entry.correlation_id().to_string());
        let handle = match &entry {
            QueuedMutation::AddItems {
                variables,
                snapshot,
                ..
            } => self.queue.enqueue(
                correlation_id,
                tasks::add_items_task(shared, variables.clone(), snapshot.clone()),
            ),
            QueuedMutation::UpdateItems { variables, .. } => self.queue.enqueue(
                correlation_id,
                tasks::update_items_task(shared, variables.clone()),
            ),
            QueuedMutation::SetManualPrice { variables, .. } => self.queue.enqueue(
                correlation_id,
                tasks::set_manual_price_task(shared, *variables),
            ),
        };
        self.finish_task(entry, handle)
    }

    /// Runs after the task settles: journal bookkeeping, rollback on failure,
    /// and the decision of when server truth may replace local state.
    fn finish_task(
        &self,
        entry: QueuedMutation,
        handle: TaskHandle<CartForm, MutationError>,
    ) -> PendingMutation {
        let shared = Rc::clone(&self.shared);
        let queue = self.queue.clone();
        let (done, receiver) = oneshot::channel();

        (self.spawner)(Box::pin(async move {
            let outcome = handle.outcome().await;
            match &outcome {
                TaskOutcome::Completed(form) => {
                    remove_journal_entry(&shared, entry.correlation_id());
                    // Overwrite only when the log fully drained; mid-queue the
                    // server form is older than the local optimistic edits.
                    let drained = queue.status() == QueueStatus::Idle
                        && shared.journal.borrow().is_empty();
                    {
                        let mut cart = shared.cart.borrow_mut();
                        reconcile::merge_server_form(&mut cart, form, drained);
                    }
                    tasks::notify_cart_listeners(&shared);
                }
                TaskOutcome::Failed(error) => {
                    remove_journal_entry(&shared, entry.correlation_id());
                    {
                        let mut cart = shared.cart.borrow_mut();
                        match &entry {
                            QueuedMutation::AddItems { snapshot, .. } => {
                                reconcile::rollback_add(&mut cart, snapshot);
                            }
                            QueuedMutation::UpdateItems {
                                variables,
                                snapshot,
                                ..
                            } => {
                                reconcile::rollback_update(
                                    &mut cart,
                                    snapshot,
                                    &variables.order_items,
                                );
                            }
                            // no optimistic edit to undo
                            QueuedMutation::SetManualPrice { .. } => {}
                        }
                    }
                    tasks::notify_cart_listeners(&shared);
                    shared.telemetry.log(TelemetryEvent {
                        workflow: "CartMutations",
                        instance: "enqueue-task-error",
                        detail: error.to_string(),
                    });
                }
                TaskOutcome::Cancelled => {
                    // Superseded by a merged replacement that now owns this
                    // journal slot: nothing to remove, nothing to undo.
                }
            }
            let _ = done.send(outcome);
        }));

        PendingMutation { receiver }
    }

    fn install_idle_hook(&self) {
        let shared = Rc::clone(&self.shared);
        self.queue.register_listener(move |status| {
            if status == QueueStatus::Idle {
                // Every time the queue drains we know for sure no locally
                // generated unique id is left to map to a real one.
                shared.placeholder_ids.borrow_mut().clear();
            }
        });
    }

    /// Re-submit every task that survived the last session, in its original
    /// order, ahead of anything new the UI asks for.
    fn replay_journal(&self) {
        let entries: Vec<QueuedMutation> = self.shared.journal.borrow().entries().to_vec();
        if entries.is_empty() {
            return;
        }
        log::info!("re-submitting {} persisted mutation(s)", entries.len());
        for entry in entries {
            self.submit(entry);
        }
    }
}

fn remove_journal_entry(shared: &Rc<Shared>, correlation_id: &str) {
    let mut journal = shared.journal.borrow_mut();
    let position = journal
        .entries()
        .iter()
        .position(|entry| entry.correlation_id() == correlation_id);
    if let Some(position) = position {
        journal.remove(position);
    }
}
