//! Catalog service integration.
//!
//! This module provides:
//! - Typed request/response shapes of the GEO BON catalog
//! - A stateless [`CatalogClient`] that turns requests into URLs and
//!   decodes the JSON bodies
//! - The [`Transport`] seam the host implements (browser `fetch` on wasm)

mod client;
mod request;
mod transport;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{CatalogClient, CatalogError};
pub use request::{join_path, CatalogRequest, RequestParameters};
pub use transport::{Transport, TransportError};
pub use types::*;

#[cfg(target_arch = "wasm32")]
pub use transport::FetchTransport;
