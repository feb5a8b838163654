//! Driven port for durable session credential storage.

use super::define_port_error;
use crate::domain::SessionTokens;

define_port_error! {
    /// Errors surfaced by token store adapters.
    pub enum TokenStoreError {
        /// Reading or writing the backing storage failed.
        Io { message: String } =>
            "token store i/o failed: {message}",
        /// Stored contents could not be decoded.
        Corrupt { message: String } =>
            "token store contents are invalid: {message}",
    }
}

/// Port persisting session tokens across process restarts.
#[cfg_attr(test, mockall::automock)]
pub trait TokenStore: Send + Sync {
    /// Load previously stored tokens; `None` when nothing is stored.
    fn load(&self) -> Result<Option<SessionTokens>, TokenStoreError>;

    /// Replace stored tokens.
    fn store(&self, tokens: &SessionTokens) -> Result<(), TokenStoreError>;

    /// Remove stored tokens. Clearing an empty store succeeds.
    fn clear(&self) -> Result<(), TokenStoreError>;
}
