//! Typed access to the upstream drama catalog.
//!
//! The upstream exposes several list endpoints with slightly different JSON
//! shapes and no way to fetch a single fully populated record. This crate
//! provides the pieces needed to work with it:
//!
//! - [`client::FetchClient`]: a GET client with bounded retries and a
//!   per-host concurrency cap.
//! - [`sources`]: decoders that turn each endpoint's body into
//!   [`PartialRecord`]s.
//! - [`Catalog`]: the typed view of the upstream the resolver consumes, with
//!   [`HttpCatalog`] as the production implementation.

pub mod client;
pub mod config;
pub mod error;
pub mod metrics_defs;
pub mod record;
pub mod sources;
mod upstream;

pub use error::{DecodeError, FetchError, SourceError};
pub use record::{Group, PartialRecord, flatten_groups};
pub use upstream::{Catalog, Feed, HttpCatalog};
