//! TAP client module
//!
//! Structure:
//! - `client.rs`: The `TapClient` facade and its request policy
//! - `service.rs`: Service descriptors and the per-service handle
//! - `upload.rs`: Tables uploaded alongside a query
//! - `votable.rs`, `binary.rs`, `table_convert.rs`: VOTable results to Polars
//! - `tables.rs`: VOSI table listings
//! - `examples.rs`: DALI example queries
//! - `error.rs`: Error types

mod binary;
pub mod client;
pub mod error;
pub mod examples;
pub mod service;
mod table_convert;
pub mod tables;
pub mod upload;
pub mod votable;
mod xml;

// Re-exports for convenience
pub use client::{ColumnListing, TapClient};
pub use error::{Result, TapError};
pub use service::{ServiceDescriptor, TapResult, TapService};
pub use tables::{ColumnDesc, TableDesc};
pub use upload::{Upload, UploadSource};
pub use votable::{Field, Info, Param, QueryStatus, TableMeta, VoDatatype, VoTable};
