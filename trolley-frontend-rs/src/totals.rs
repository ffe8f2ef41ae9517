//! Incremental totalizer math.
//!
//! The client never recomputes totals from scratch — it doesn't know the full
//! pricing rules. Every local mutation moves the `Items` and `Discounts`
//! totalizers (and the grand total) by the delta the mutation implies, which
//! keeps `value == sum(totalizers)` without any pricing knowledge.

use checkout_utils::{CartItem, DISCOUNT_TOTALIZER, SUBTOTAL_TOTALIZER, Totalizer};

/// Apply the delta implied by `old_item` becoming `new_item` (or by
/// `new_item` being added, when `old_item` is `None`).
///
/// A line that wasn't `available` before the change contributes zero to
/// totals and must not perturb them; same for a freshly added unavailable
/// line.
pub(crate) fn updated_totals(
    totalizers: &[Totalizer],
    current_value: i64,
    new_item: &CartItem,
    old_item: Option<&CartItem>,
) -> (Vec<Totalizer>, i64) {
    let gate = old_item.unwrap_or(new_item);
    if !gate.availability.is_available() {
        return (totalizers.to_vec(), current_value);
    }

    // For an added line the "old" quantity is zero.
    let (old_price, old_selling_price, old_quantity) = match old_item {
        Some(old) => (old.scaled_price(), old.selling_price, i64::from(old.quantity)),
        None => (new_item.scaled_price(), new_item.selling_price, 0),
    };

    let new_price = new_item.scaled_price();
    let new_quantity = i64::from(new_item.quantity);

    let subtotal_difference = new_price * new_quantity - old_price * old_quantity;

    let old_discount = (old_selling_price - old_price) * old_quantity;
    let new_discount = (new_item.selling_price - new_price) * new_quantity;
    let discount_difference = new_discount - old_discount;

    let updated_value = current_value + subtotal_difference + discount_difference;

    if totalizers.is_empty() {
        return (
            vec![
                Totalizer {
                    id: SUBTOTAL_TOTALIZER.to_string(),
                    name: "Items Total".to_string(),
                    value: subtotal_difference,
                },
                Totalizer {
                    id: DISCOUNT_TOTALIZER.to_string(),
                    name: "Discounts Total".to_string(),
                    value: discount_difference,
                },
            ],
            updated_value,
        );
    }

    let updated = totalizers
        .iter()
        .map(|totalizer| match totalizer.id.as_str() {
            SUBTOTAL_TOTALIZER => Totalizer {
                value: totalizer.value + subtotal_difference,
                ..totalizer.clone()
            },
            DISCOUNT_TOTALIZER => Totalizer {
                value: totalizer.value + discount_difference,
                ..totalizer.clone()
            },
            _ => totalizer.clone(),
        })
        .collect();

    (updated, updated_value)
}
