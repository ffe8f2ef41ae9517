//! Optimistic cart-state transforms and their exact inverses.
//!
//! Everything here is a plain function over `CartForm`, so rollback can be
//! tested as "task + prior snapshot -> restored state" without touching the
//! queue. The façade is the only caller; `CartForm` has a single writer.

use checkout_utils::{
    AddItemsVariables, CartForm, CartItem, CatalogItemInput, MarketingData, QuantityInput,
};

use crate::totals;
use crate::utils::fresh_placeholder_id;

/// Whether `input` and `item` are the same purchasable line: same catalog id
/// and seller, and compatible assembly options.
pub(crate) fn is_same_item(
    input: &CatalogItemInput,
    item: &CartItem,
    all_items: &im::Vector<CartItem>,
) -> bool {
    let same_id = input.id == item.id;
    let same_seller = input.seller == item.seller;

    // input has no options
    if input.options.is_empty() {
        // and the comparing item has, not the same item
        if !item.options.is_empty() {
            return false;
        }

        // neither have options, just compare id and seller
        return same_id && same_seller;
    }

    // does every assembly option exist in the cart as a separate line?
    let options_exist_in_cart = input
        .options
        .iter()
        .all(|option| all_items.iter().any(|line| line.id == option.id));

    same_id && same_seller && options_exist_in_cart
}

/// Build the optimistic line for a catalog input, minting a placeholder
/// unique id the server will later replace.
pub(crate) fn item_from_input(input: &CatalogItemInput) -> CartItem {
    CartItem {
        unique_id: fresh_placeholder_id(),
        id: input.id.clone(),
        seller: input.seller.clone(),
        quantity: input.quantity.unwrap_or(1),
        price: input.price,
        list_price: input.list_price,
        selling_price: input.selling_price,
        unit_multiplier: input.unit_multiplier,
        availability: input.availability,
        options: input.options.clone(),
        name: input.name.clone(),
        detail_url: input.detail_url.clone(),
        image_url: input.image_url.clone(),
    }
}

/// Append freshly-minted lines and move the totals accordingly.
pub(crate) fn apply_add(
    form: &mut CartForm,
    new_lines: &im::Vector<CartItem>,
    marketing_data: Option<&MarketingData>,
) {
    for line in new_lines {
        let (totalizers, value) = totals::updated_totals(&form.totalizers, form.value, line, None);
        form.totalizers = totalizers;
        form.value = value;
        form.items.push_back(line.clone());
    }
    if let Some(marketing_data) = marketing_data {
        form.marketing_data = Some(marketing_data.clone());
    }
}

/// Rewrite (or, at quantity zero, remove) the line at `index`. Returns the
/// line as it was before the change.
pub(crate) fn apply_quantity_change(
    form: &mut CartForm,
    index: usize,
    quantity: u32,
) -> Option<CartItem> {
    let old_item = form.items.get(index)?.clone();
    let mut new_item = old_item.clone();
    new_item.quantity = quantity;

    let (totalizers, value) =
        totals::updated_totals(&form.totalizers, form.value, &new_item, Some(&old_item));

    if quantity > 0 {
        form.items.set(index, new_item);
    } else {
        form.items.remove(index);
    }
    form.totalizers = totalizers;
    form.value = value;

    Some(old_item)
}

/// Remove a line and take its contribution back out of the totals.
pub(crate) fn remove_line_by_unique_id(form: &mut CartForm, unique_id: &str) -> Option<CartItem> {
    let position = form
        .items
        .iter()
        .position(|line| line.unique_id == unique_id)?;
    let current = form.items[position].clone();
    let mut removed = current.clone();
    removed.quantity = 0;

    let (totalizers, value) =
        totals::updated_totals(&form.totalizers, form.value, &removed, Some(&current));
    form.items.remove(position);
    form.totalizers = totalizers;
    form.value = value;
    Some(current)
}

/// Undo an optimistic add: the snapshot holds exactly the lines that were
/// appended, so drop them again (totals included).
pub(crate) fn rollback_add(form: &mut CartForm, snapshot: &im::Vector<CartItem>) {
    for line in snapshot {
        remove_line_by_unique_id(form, &line.unique_id);
    }
}

/// Undo an optimistic quantity change. `snapshot` is the full item list as it
/// was when the task was enqueued; `inputs` are the task's quantity changes.
/// Lines the change removed are re-added, the rest get their prior quantity
/// back, and totals travel through the same delta math as the forward path.
pub(crate) fn rollback_update(
    form: &mut CartForm,
    snapshot: &im::Vector<CartItem>,
    inputs: &[QuantityInput],
) {
    for input in inputs {
        let previous = match input {
            QuantityInput::ByUniqueId { unique_id, .. } => snapshot
                .iter()
                .find(|line| line.unique_id == *unique_id)
                .cloned(),
            QuantityInput::ByIndex { index, .. } => snapshot.get(*index).cloned(),
        };
        let Some(previous) = previous else {
            continue;
        };

        if input.is_removal() {
            // The line was optimistically removed; put it back at the end,
            // like the original order restores deleted lines.
            let already_present = form
                .items
                .iter()
                .any(|line| line.unique_id == previous.unique_id);
            if !already_present {
                let (totalizers, value) =
                    totals::updated_totals(&form.totalizers, form.value, &previous, None);
                form.totalizers = totalizers;
                form.value = value;
                form.items.push_back(previous);
            }
        } else if let Some(position) = form
            .items
            .iter()
            .position(|line| line.unique_id == previous.unique_id)
        {
            let current = form.items[position].clone();
            let mut restored = current.clone();
            restored.quantity = previous.quantity;

            let (totalizers, value) =
                totals::updated_totals(&form.totalizers, form.value, &restored, Some(&current));
            form.items.set(position, restored);
            form.totalizers = totalizers;
            form.value = value;
        }
    }
}

/// The placeholder-to-confirmed id pairs for lines the server accepted,
/// matched by catalog id like the original add flow.
pub(crate) fn confirmed_id_pairs(
    optimistic: &im::Vector<CartItem>,
    server: &CartForm,
) -> Vec<(String, String)> {
    optimistic
        .iter()
        .filter_map(|line| {
            server
                .items
                .iter()
                .find(|confirmed| confirmed.id == line.id)
                .map(|confirmed| (line.unique_id.clone(), confirmed.unique_id.clone()))
        })
        .collect()
}

/// Fold an add response into local state: confirmed lines get their real
/// unique id; lines the server refused (out of stock, ...) are removed
/// entirely, not merely reverted. Items and totals otherwise stay local —
/// newer optimistic edits may already be layered on top.
pub(crate) fn absorb_add_response(
    form: &mut CartForm,
    submitted: &AddItemsVariables,
    server: &CartForm,
) {
    let mut confirmed: Vec<(String, String)> = Vec::new();
    let mut refused: Vec<String> = Vec::new();

    for line in form.items.iter() {
        let was_submitted = submitted.items.iter().any(|input| input.id == line.id);
        if !was_submitted {
            // this line wasn't part of the mutation, skip it
            continue;
        }
        match server
            .items
            .iter()
            .find(|candidate| candidate.id == line.id)
        {
            Some(candidate) => confirmed.push((line.unique_id.clone(), candidate.unique_id.clone())),
            // the item wasn't added to the cart. the reason for this may
            // vary, but could be something like the item doesn't have stock
            // left, etc.
            None => refused.push(line.unique_id.clone()),
        }
    }

    for unique_id in refused {
        remove_line_by_unique_id(form, &unique_id);
    }

    for (old_id, new_id) in confirmed {
        if let Some(position) = form.items.iter().position(|line| line.unique_id == old_id) {
            let mut line = form.items[position].clone();
            line.unique_id = new_id;
            form.items.set(position, line);
        }
    }

    if submitted.marketing_data.is_some() {
        form.marketing_data = submitted.marketing_data.clone();
    }
}

/// Fold a completed task's server form into local state. Wholesale
/// replacement is only safe once the journal has drained — anything earlier
/// would erase newer, not-yet-confirmed optimistic edits — so mid-queue we
/// merge nothing but the server messages.
pub(crate) fn merge_server_form(form: &mut CartForm, server: &CartForm, drained: bool) {
    if drained {
        *form = server.clone();
    } else {
        form.messages = server.messages.clone();
    }
}
