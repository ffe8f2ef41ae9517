//! Browser bindings. wasm-bindgen types can't be generic, so this wraps the
//! engine with its browser collaborators picked: localStorage for the
//! journal, fetch for the transport, `spawn_local` to drive the queue.

use std::rc::Rc;
use std::sync::LazyLock;

use checkout_utils::{CartForm, CatalogItemInput, MarketingData};
use conveyor::{LogTelemetry, Spawner, local_storage::BrowserStore};
use wasm_bindgen::prelude::*;

use crate::transport::HttpTransport;
use crate::{ItemRef, Trolley};

// putting this inside LOGGER prevents us from accidentally initializing the
// logger more than once
#[allow(clippy::declare_interior_mutable_const)]
const LOGGER: LazyLock<()> = LazyLock::new(|| {
    crate::utils::set_panic_hook();

    wasm_logger::init(wasm_logger::Config::default());
    log::info!("Logging initialized");
});

#[wasm_bindgen]
pub struct TrolleyHandle {
    engine: Trolley,
}

#[wasm_bindgen]
impl TrolleyHandle {
    /// `on_cart_change` fires after every local cart change (optimistic or
    /// reconciled); read the new form with [`TrolleyHandle::cart`].
    #[wasm_bindgen(constructor)]
    pub fn new(
        base_url: String,
        initial_form: JsValue,
        on_cart_change: js_sys::Function,
    ) -> Result<TrolleyHandle, JsValue> {
        // used to only initialize the logger once
        #[allow(clippy::borrow_interior_mutable_const)]
        *LOGGER;

        let initial_form: CartForm = serde_wasm_bindgen::from_value(initial_form)
            .map_err(|error| JsValue::from_str(&format!("invalid cart form: {error}")))?;

        let spawner: Spawner = Rc::new(|future| wasm_bindgen_futures::spawn_local(future));

        let engine = Trolley::new(
            initial_form,
            Rc::new(BrowserStore::new()),
            Rc::new(HttpTransport::new(base_url)),
            Rc::new(LogTelemetry),
            spawner,
        );

        engine.subscribe(move || {
            let this = JsValue::null();
            let _ = on_cart_change.call0(&this);
        });

        Ok(Self { engine })
    }

    pub fn cart(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.engine.cart())
            .map_err(|error| JsValue::from_str(&format!("Serialization error: {error:?}")))
    }

    /// Returns true if any new line was created (as opposed to every input
    /// folding into an existing line's quantity).
    pub fn add_items(
        &self,
        items: JsValue,
        marketing_data: JsValue,
    ) -> Result<bool, JsValue> {
        let items: Vec<CatalogItemInput> = serde_wasm_bindgen::from_value(items)
            .map_err(|error| JsValue::from_str(&format!("invalid items: {error}")))?;
        let marketing_data: Option<MarketingData> =
            serde_wasm_bindgen::from_value(marketing_data)
                .map_err(|error| JsValue::from_str(&format!("invalid marketing data: {error}")))?;

        let added = self
            .engine
            .add_items(items, marketing_data)
            .map_err(|error| JsValue::from_str(&error.to_string()))?;

        Ok(added.added_new_line)
    }

    pub fn update_quantity(&self, unique_id: String, quantity: u32) -> Result<(), JsValue> {
        self.engine
            .update_quantity(&ItemRef::UniqueId(unique_id), quantity)
            .map(|_pending| ())
            .map_err(|error| JsValue::from_str(&error.to_string()))
    }

    pub fn update_quantity_at(&self, index: usize, quantity: u32) -> Result<(), JsValue> {
        self.engine
            .update_quantity(&ItemRef::Index(index), quantity)
            .map(|_pending| ())
            .map_err(|error| JsValue::from_str(&error.to_string()))
    }

    pub fn remove_item(&self, unique_id: String) -> Result<(), JsValue> {
        self.engine
            .remove_item(&ItemRef::UniqueId(unique_id))
            .map(|_pending| ())
            .map_err(|error| JsValue::from_str(&error.to_string()))
    }

    pub fn set_manual_price(&self, item_index: usize, price: i64) -> Result<(), JsValue> {
        self.engine
            .set_manual_price(item_index, price)
            .map(|_pending| ())
            .map_err(|error| JsValue::from_str(&error.to_string()))
    }
}
