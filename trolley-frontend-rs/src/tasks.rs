//! The executable side of a queued mutation: what actually runs when the
//! task's turn arrives. Each body re-derives its payload at start time (a
//! placeholder id may have been confirmed while the task waited) and does its
//! own response bookkeeping while it still holds the executor slot.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use checkout_utils::{
    AddItemsVariables, CartForm, CartItem, MutationResult, QuantityInput, SetManualPriceVariables,
    UpdateItemsVariables,
};
use conveyor::{Journal, ListenerKey, Telemetry, TelemetryEvent};
use futures::future::LocalBoxFuture;
use slotmap::SlotMap;

use crate::local_queue::QueuedMutation;
use crate::reconcile;
use crate::transport::{CartTransport, TransportError};

/// A mutation that made it to the remote call and came back unhappy: the
/// backend either rejected it or the call itself failed. The task's
/// optimistic edit is rolled back before this surfaces.
#[derive(Clone, Debug, thiserror::Error)]
pub enum MutationError {
    #[error("mutation rejected by checkout: {0}")]
    Rejected(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// State shared between the façade, the task bodies, and the completion
/// handlers. Single-threaded: no borrow is held across an `.await`.
pub(crate) struct Shared {
    pub cart: RefCell<CartForm>,
    pub journal: RefCell<Journal<QueuedMutation>>,
    /// Placeholder unique id -> server-confirmed unique id. Cleared whenever
    /// the queue drains; by then nothing can reference a placeholder.
    pub placeholder_ids: RefCell<HashMap<String, String>>,
    pub transport: Rc<dyn CartTransport>,
    pub telemetry: Rc<dyn Telemetry>,
    pub cart_listeners: RefCell<SlotMap<ListenerKey, Rc<dyn Fn()>>>,
}

pub(crate) fn notify_cart_listeners(shared: &Rc<Shared>) {
    // Clone the callbacks out first so a listener can re-enter the engine.
    let listeners: Vec<Rc<dyn Fn()>> = shared.cart_listeners.borrow().values().cloned().collect();
    for listener in listeners {
        listener();
    }
}

fn expect_form(
    result: MutationResult,
    telemetry: &Rc<dyn Telemetry>,
    instance: &'static str,
) -> Result<CartForm, MutationError> {
    let MutationResult { data, errors } = result;
    match data {
        Some(form) if errors.is_empty() => Ok(form),
        _ => {
            let detail = if errors.is_empty() {
                "no data returned".to_string()
            } else {
                errors
                    .iter()
                    .map(|error| error.message.clone())
                    .collect::<Vec<_>>()
                    .join("; ")
            };
            telemetry.log(TelemetryEvent {
                workflow: "CartMutations",
                instance,
                detail: detail.clone(),
            });
            Err(MutationError::Rejected(detail))
        }
    }
}

/// Body of an add task. On success it reconciles placeholder ids — in the
/// journal, the placeholder map, and local state — before returning, i.e.
/// while it still occupies the executor slot, so every queued update that
/// references a placeholder sees the confirmed id before it runs.
pub(crate) fn add_items_task(
    shared: Rc<Shared>,
    variables: AddItemsVariables,
    snapshot: im::Vector<CartItem>,
) -> impl FnOnce() -> LocalBoxFuture<'static, Result<CartForm, MutationError>> {
    move || {
        Box::pin(async move {
            let result = shared.transport.add_items(variables.clone()).await?;
            let form = expect_form(result, &shared.telemetry, "add-items-mutation")?;

            for (old_id, new_id) in reconcile::confirmed_id_pairs(&snapshot, &form) {
                shared
                    .journal
                    .borrow_mut()
                    .rewrite_references(&old_id, &new_id);
                shared.placeholder_ids.borrow_mut().insert(old_id, new_id);
            }

            {
                let mut cart = shared.cart.borrow_mut();
                reconcile::absorb_add_response(&mut cart, &variables, &form);
            }
            notify_cart_listeners(&shared);

            Ok(form)
        })
    }
}

/// Body of an update task. The payload goes through the placeholder map at
/// start time: a unique id invented locally may have been confirmed while
/// this task waited its turn.
pub(crate) fn update_items_task(
    shared: Rc<Shared>,
    variables: UpdateItemsVariables,
) -> impl FnOnce() -> LocalBoxFuture<'static, Result<CartForm, MutationError>> {
    move || {
        Box::pin(async move {
            let order_items = {
                let placeholder_ids = shared.placeholder_ids.borrow();
                variables
                    .order_items
                    .iter()
                    .cloned()
                    .map(|input| match input {
                        QuantityInput::ByUniqueId { unique_id, quantity } => {
                            let unique_id = placeholder_ids
                                .get(&unique_id)
                                .cloned()
                                .unwrap_or(unique_id);
                            QuantityInput::ByUniqueId { unique_id, quantity }
                        }
                        by_index @ QuantityInput::ByIndex { .. } => by_index,
                    })
                    .collect()
            };

            let result = shared
                .transport
                .update_items(UpdateItemsVariables { order_items })
                .await?;
            expect_form(result, &shared.telemetry, "update-items-mutation")
        })
    }
}

pub(crate) fn set_manual_price_task(
    shared: Rc<Shared>,
    variables: SetManualPriceVariables,
) -> impl FnOnce() -> LocalBoxFuture<'static, Result<CartForm, MutationError>> {
    move || {
        Box::pin(async move {
            let result = shared.transport.set_manual_price(variables).await?;
            expect_form(result, &shared.telemetry, "set-manual-price-mutation")
        })
    }
}
