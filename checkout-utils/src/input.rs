//! Inputs accepted by the mutation façade and the payloads it sends over the
//! wire, plus the response envelope every mutation call comes back in.

use serde::{Deserialize, Serialize};

use crate::form::{Availability, CartForm, ItemOption, MarketingData};

/// What the UI hands to `add_items`: a catalog pick, priced and sellable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItemInput {
    pub id: String,
    /// Defaults to 1 when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub seller: String,
    #[serde(default)]
    pub price: i64,
    #[serde(default)]
    pub list_price: i64,
    #[serde(default)]
    pub selling_price: i64,
    #[serde(default = "default_unit_multiplier")]
    pub unit_multiplier: f64,
    #[serde(default)]
    pub availability: Availability,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ItemOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

fn default_unit_multiplier() -> f64 {
    1.0
}

impl Default for CatalogItemInput {
    fn default() -> Self {
        Self {
            id: String::new(),
            quantity: None,
            seller: String::new(),
            price: 0,
            list_price: 0,
            selling_price: 0,
            // a zero multiplier would silently wipe the line's price
            unit_multiplier: 1.0,
            availability: Availability::default(),
            options: Vec::new(),
            name: None,
            detail_url: None,
            image_url: None,
        }
    }
}

/// The slimmed-down shape the add-items mutation actually sends.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemInput {
    pub id: String,
    pub quantity: u32,
    #[serde(default)]
    pub seller: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ItemOption>,
}

impl From<&CatalogItemInput> for ItemInput {
    fn from(input: &CatalogItemInput) -> Self {
        Self {
            id: input.id.clone(),
            quantity: input.quantity.unwrap_or(1),
            seller: input.seller.clone(),
            options: input.options.clone(),
        }
    }
}

/// One quantity change. Lines are addressed by their unique id wherever
/// possible; positional addressing exists for callers that only know the
/// index, but indices go stale the moment the line order shifts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuantityInput {
    #[serde(rename_all = "camelCase")]
    ByUniqueId { unique_id: String, quantity: u32 },
    #[serde(rename_all = "camelCase")]
    ByIndex { index: usize, quantity: u32 },
}

impl QuantityInput {
    pub fn quantity(&self) -> u32 {
        match self {
            Self::ByUniqueId { quantity, .. } | Self::ByIndex { quantity, .. } => *quantity,
        }
    }

    /// Quantity zero removes the line, which shifts every index after it.
    pub fn is_removal(&self) -> bool {
        self.quantity() == 0
    }

    pub fn unique_id(&self) -> Option<&str> {
        match self {
            Self::ByUniqueId { unique_id, .. } => Some(unique_id),
            Self::ByIndex { .. } => None,
        }
    }

    /// Whether both inputs address the same line.
    pub fn same_line(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::ByUniqueId { unique_id: a, .. },
                Self::ByUniqueId { unique_id: b, .. },
            ) => a == b,
            (Self::ByIndex { index: a, .. }, Self::ByIndex { index: b, .. }) => a == b,
            _ => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemsVariables {
    pub items: Vec<ItemInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marketing_data: Option<MarketingData>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemsVariables {
    pub order_items: Vec<QuantityInput>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetManualPriceVariables {
    pub item_index: usize,
    pub price: i64,
}

/// Every mutation call resolves to this envelope. Absent `data` or any entry
/// in `errors` means the mutation failed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationResult {
    #[serde(default)]
    pub data: Option<CartForm>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<MutationErrorMessage>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationErrorMessage {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}
