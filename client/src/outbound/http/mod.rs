//! HTTP outbound adapter for the field monitoring API.
//!
//! This module provides a thin reqwest implementation of the `FieldApi`
//! port.

mod dto;
mod http_field_api;

pub use http_field_api::HttpFieldApi;
