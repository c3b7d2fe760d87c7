//! Domain types shared by the decision engine, the catalog service and the
//! transport layer.

pub mod catalog;
pub mod chart;
pub mod request;

pub use catalog::CatalogMetadata;
pub use chart::{ChartEntry, ChartSnapshot, EntryLayout};
pub use request::{ChartReply, ChartRequest, DEFAULT_CHART_ID, parse_flag};
