//! Cart shapes shared between the mutation engine, the browser bindings, and
//! the checkout backend contract.

mod form;
mod input;

pub use form::{
    Availability, CartForm, CartItem, CartMessage, ItemOption, MarketingData, Totalizer,
    DISCOUNT_TOTALIZER, SUBTOTAL_TOTALIZER,
};
pub use input::{
    AddItemsVariables, CatalogItemInput, ItemInput, MutationErrorMessage, MutationResult,
    QuantityInput, SetManualPriceVariables, UpdateItemsVariables,
};
