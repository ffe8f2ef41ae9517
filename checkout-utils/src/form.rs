//! The cart form: the authoritative-or-optimistic snapshot the UI renders.
//! Prices are integer minor units (cents); `value` is the grand total.

use serde::{Deserialize, Serialize};

/// Totalizer id for the items subtotal.
pub const SUBTOTAL_TOTALIZER: &str = "Items";
/// Totalizer id for the accumulated discounts.
pub const DISCOUNT_TOTALIZER: &str = "Discounts";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartForm {
    #[serde(default)]
    pub items: im::Vector<CartItem>,
    #[serde(default)]
    pub totalizers: Vec<Totalizer>,
    /// Grand total. Invariant: equals the sum of the totalizer values after
    /// any local mutation.
    #[serde(default)]
    pub value: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marketing_data: Option<MarketingData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<CartMessage>,
}

/// One purchasable unit group in the cart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Stable within a session. Either a locally-minted placeholder (the line
    /// hasn't been confirmed by the server yet) or the server-assigned id.
    /// Unique within `CartForm.items` at all times.
    pub unique_id: String,
    /// Catalog sku id.
    pub id: String,
    #[serde(default)]
    pub seller: String,
    pub quantity: u32,
    /// Base unit price.
    #[serde(default)]
    pub price: i64,
    #[serde(default)]
    pub list_price: i64,
    #[serde(default)]
    pub selling_price: i64,
    /// Scales the base price for fractional units (0.5 kg etc).
    #[serde(default = "default_unit_multiplier")]
    pub unit_multiplier: f64,
    #[serde(default)]
    pub availability: Availability,
    /// Sub-selections (assembly options) that make two otherwise-identical
    /// lines distinct.
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

impl Default for CartItem {
    fn default() -> Self {
        Self {
            unique_id: String::new(),
            id: String::new(),
            seller: String::new(),
            quantity: 0,
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

impl CartItem {
    /// Unit price with the unit multiplier applied.
    pub fn scaled_price(&self) -> i64 {
        (self.price as f64 * self.unit_multiplier).round() as i64
    }
}

/// The checkout backend reports availability as an open string set; only
/// `available` lines contribute to totals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Availability {
    #[default]
    Available,
    WithoutStock,
    #[serde(other)]
    Unavailable,
}

impl Availability {
    pub fn is_available(self) -> bool {
        matches!(self, Self::Available)
    }
}

/// A named running sum, maintained incrementally (never recomputed from
/// scratch — the client doesn't know the full pricing rules).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Totalizer {
    pub id: String,
    pub name: String,
    pub value: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemOption {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seller: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct MarketingData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_medium: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_campaign: Option<String>,
}

/// Informational message returned by the checkout backend, e.g. "item price
/// changed since it was added". Safe to merge into local state at any time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_availability_parses_the_backend_strings() {
        assert_eq!(
            serde_json::from_str::<Availability>("\"available\"").unwrap(),
            Availability::Available
        );
        assert_eq!(
            serde_json::from_str::<Availability>("\"withoutStock\"").unwrap(),
            Availability::WithoutStock
        );
        // Unknown availability strings must not fail the whole form.
        assert_eq!(
            serde_json::from_str::<Availability>("\"cannotBeDelivered\"").unwrap(),
            Availability::Unavailable
        );
    }

    #[test]
    fn test_scaled_price_applies_the_unit_multiplier() {
        let item = CartItem {
            price: 1000,
            unit_multiplier: 0.5,
            ..CartItem::default()
        };
        assert_eq!(item.scaled_price(), 500);

        let whole = CartItem {
            price: 1000,
            unit_multiplier: 1.0,
            ..CartItem::default()
        };
        assert_eq!(whole.scaled_price(), 1000);
    }

    #[test]
    fn test_cart_form_round_trips_with_camel_case_keys() {
        let form = CartForm {
            items: im::vector![CartItem {
                unique_id: "SomeUniqueId0".to_string(),
                id: "1".to_string(),
                seller: "0".to_string(),
                quantity: 3,
                price: 2_400_000,
                list_price: 2_800_000,
                selling_price: 2_400_000,
                unit_multiplier: 1.0,
                availability: Availability::Available,
                ..CartItem::default()
            }],
            totalizers: vec![Totalizer {
                id: SUBTOTAL_TOTALIZER.to_string(),
                name: "Items Total".to_string(),
                value: 7_200_000,
            }],
            value: 7_200_000,
            marketing_data: None,
            messages: Vec::new(),
        };

        let json = serde_json::to_value(&form).unwrap();
        assert_eq!(json["items"][0]["uniqueId"], "SomeUniqueId0");
        assert_eq!(json["items"][0]["listPrice"], 2_800_000);

        let parsed: CartForm = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, form);
    }

    #[test]
    fn test_missing_fields_default_instead_of_failing() {
        // A minimal server payload should still parse.
        let parsed: CartForm = serde_json::from_str(r#"{"value": 0}"#).unwrap();
        assert!(parsed.items.is_empty());
        assert!(parsed.totalizers.is_empty());

        let item: CartItem =
            serde_json::from_str(r#"{"uniqueId": "u", "id": "42", "quantity": 1}"#).unwrap();
        assert_eq!(item.unit_multiplier, 1.0);
        assert_eq!(item.availability, Availability::Available);
    }
}
