//! Domain ports: traits implemented by outbound adapters.

mod macros;

mod field_api;
mod token_store;

pub(crate) use macros::define_port_error;

#[cfg(test)]
pub use field_api::MockFieldApi;
pub use field_api::{FieldApi, FieldApiError, FixtureFieldApi, LoginGrant};
#[cfg(test)]
pub use token_store::MockTokenStore;
pub use token_store::{TokenStore, TokenStoreError};
