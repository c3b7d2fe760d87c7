//! Chartkeep - caching proxy for music chart data
//!
//! This crate sits in front of a third-party chart provider and decides,
//! per request, whether to answer from cache, fetch a fresh chart, or fall
//! back to a stale one. Historical weeks are cached forever, the current
//! chart is refreshed on the provider's publishing day, and an upstream 429
//! arms a cooldown during which cached data is served instead. Chart
//! entries can be enriched with catalog metadata (links, previews, artwork)
//! looked up with bounded concurrency.
//!
//! # Example
//!
//! ```rust,no_run
//! use chartkeep::{ChartRequest, Chartkeep};
//!
//! #[tokio::main]
//! async fn main() -> chartkeep::Result<()> {
//!     let handler = Chartkeep::builder()
//!         .rapidapi("your-rapidapi-key")
//!         .build()?;
//!
//!     let reply = handler
//!         .handle(ChartRequest::new("hot-100").enrich(false))
//!         .await?;
//!
//!     println!("cached: {}", reply.is_cached());
//!     println!("{}", reply.to_json()?);
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `server` (default): the axum HTTP surface, TOML configuration and the
//!   `chartkeepd` daemon.

pub mod cache;
pub mod catalog;
pub mod clock;
pub mod error;
pub mod handler;
pub mod refresh;
#[cfg(feature = "server")]
pub mod server;
pub mod telemetry;
pub mod types;
pub mod upstream;
pub mod version;

// Re-export main types at crate root
pub use cache::{KeyValueCache, MemoryCache};
pub use catalog::{CatalogConfig, CatalogCredentials, CatalogService};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ChartkeepError, Result};
pub use handler::{ChartRequestHandler, Chartkeep, ChartkeepBuilder};
pub use refresh::{Decision, RefreshDecisionEngine, RefreshPolicy};
pub use types::{
    CatalogMetadata, ChartEntry, ChartReply, ChartRequest, ChartSnapshot, EntryLayout,
};
pub use upstream::{ChartSource, UpstreamConfig};
