//! VO TAP client library
//!
//! A thin facade over Table Access Protocol services: synchronous ADQL
//! queries (with optional table upload), table and column listings, and the
//! example queries a service publishes.
//!
//! ```no_run
//! # async fn run() -> vo_tap::tap::Result<()> {
//! use vo_tap::config::ClientConfig;
//! use vo_tap::tap::TapClient;
//!
//! let client = TapClient::new(ClientConfig::default())?;
//! let result = client
//!     .query("https://example.org/tap", "SELECT TOP 5 * FROM ivoa.obscore", None)
//!     .await?;
//! println!("{}", result.table.data);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod tap;
