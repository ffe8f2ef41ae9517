//! The remote mutation transport: an async request/response call that, given
//! a payload, answers with an updated cart form or an error. The engine only
//! depends on this trait; the browser build plugs in the HTTP client below
//! and tests plug in scripted doubles.

use checkout_utils::{
    AddItemsVariables, MutationResult, SetManualPriceVariables, UpdateItemsVariables,
};
use futures::future::LocalBoxFuture;

#[derive(Clone, Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("response parsing failed: {0}")]
    Parse(String),
}

pub trait CartTransport {
    fn add_items(
        &self,
        variables: AddItemsVariables,
    ) -> LocalBoxFuture<'static, Result<MutationResult, TransportError>>;

    fn update_items(
        &self,
        variables: UpdateItemsVariables,
    ) -> LocalBoxFuture<'static, Result<MutationResult, TransportError>>;

    fn set_manual_price(
        &self,
        variables: SetManualPriceVariables,
    ) -> LocalBoxFuture<'static, Result<MutationResult, TransportError>>;
}

#[cfg(target_arch = "wasm32")]
pub use http::HttpTransport;

#[cfg(target_arch = "wasm32")]
mod http {
    use serde::Serialize;

    use super::*;

    /// Checkout-backend transport over fetch.
    pub struct HttpTransport {
        base_url: String,
    }

    impl HttpTransport {
        pub fn new(base_url: impl Into<String>) -> Self {
            Self {
                base_url: base_url.into(),
            }
        }

        fn post(
            &self,
            path: &str,
            variables: impl Serialize + 'static,
        ) -> LocalBoxFuture<'static, Result<MutationResult, TransportError>> {
            let url = format!("{}{path}", self.base_url);
            Box::pin(async move {
                let client = fetch_happen::Client;
                let response = client
                    .post(&url)
                    .json(&variables)
                    .map_err(|error| TransportError::Request(format!("{error:?}")))?
                    .send()
                    .await
                    .map_err(|error| TransportError::Request(format!("{error:?}")))?;

                if !response.ok() {
                    return Err(TransportError::Request(format!(
                        "HTTP error: {}",
                        response.status()
                    )));
                }

                response
                    .json()
                    .await
                    .map_err(|error| TransportError::Parse(format!("{error:?}")))
            })
        }
    }

    impl CartTransport for HttpTransport {
        fn add_items(
            &self,
            variables: AddItemsVariables,
        ) -> LocalBoxFuture<'static, Result<MutationResult, TransportError>> {
            self.post("/checkout/cart/add-items", variables)
        }

        fn update_items(
            &self,
            variables: UpdateItemsVariables,
        ) -> LocalBoxFuture<'static, Result<MutationResult, TransportError>> {
            self.post("/checkout/cart/update-items", variables)
        }

        fn set_manual_price(
            &self,
            variables: SetManualPriceVariables,
        ) -> LocalBoxFuture<'static, Result<MutationResult, TransportError>> {
            self.post("/checkout/cart/set-manual-price", variables)
        }
    }
}
