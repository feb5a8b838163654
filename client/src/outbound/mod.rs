//! Outbound adapters implementing domain ports.
//!
//! - **http**: reqwest-backed client for the field monitoring API.
//! - **token_store**: in-memory and file-backed session persistence.
//!
//! Adapters translate between transport representations and domain types.
//! They contain no session or retry logic.

pub mod http;
pub mod token_store;
