//! Client core for the field monitoring API.
//!
//! The crate decodes parcel geometry, derives map viewports, and manages an
//! authenticated session against the remote API. Domain logic lives in
//! [`domain`]; transport and storage adapters live in [`outbound`].

pub mod config;
pub mod domain;
pub mod outbound;
