//! Chart request parameters and the reply handed back to the transport.

use chrono::NaiveDate;
use serde_json::{Map, Value};

use super::chart::ChartSnapshot;
use crate::{ChartkeepError, Result};

/// Chart served when the caller does not name one.
pub const DEFAULT_CHART_ID: &str = "hot-100";

/// Parameters of a single chart request.
///
/// ```rust
/// # use chartkeep::ChartRequest;
/// let request = ChartRequest::new("billboard-200")
///     .week("2022-01-01")
///     .force_refresh(true)
///     .enrich(false);
/// assert!(request.is_historical());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartRequest {
    pub chart_id: String,
    /// ISO date selecting a historical week; `None` means the current chart.
    pub week: Option<String>,
    pub force_refresh: bool,
    pub enrich: bool,
}

impl Default for ChartRequest {
    fn default() -> Self {
        Self::new(DEFAULT_CHART_ID)
    }
}

impl ChartRequest {
    pub fn new(chart_id: impl Into<String>) -> Self {
        Self {
            chart_id: chart_id.into(),
            week: None,
            force_refresh: false,
            enrich: true,
        }
    }

    pub fn week(mut self, week: impl Into<String>) -> Self {
        self.week = Some(week.into());
        self
    }

    pub fn force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }

    pub fn enrich(mut self, enrich: bool) -> Self {
        self.enrich = enrich;
        self
    }

    pub fn is_historical(&self) -> bool {
        self.week.is_some()
    }

    /// Check identifiers before they are used in cache keys and upstream URLs.
    ///
    /// An empty `week` is treated as absent.
    pub fn validate(mut self) -> Result<Self> {
        let chart_id = self.chart_id.trim();
        if chart_id.is_empty() {
            return Err(ChartkeepError::InvalidInput(
                "chart id must not be empty".to_string(),
            ));
        }
        if chart_id.contains(':') {
            return Err(ChartkeepError::InvalidInput(format!(
                "invalid chart id: {chart_id}"
            )));
        }
        self.chart_id = chart_id.to_string();

        self.week = match self.week.take().map(|w| w.trim().to_string()) {
            Some(week) if week.is_empty() => None,
            Some(week) => {
                NaiveDate::parse_from_str(&week, "%Y-%m-%d").map_err(|_| {
                    ChartkeepError::InvalidInput(format!("week must be YYYY-MM-DD, got {week:?}"))
                })?;
                Some(week)
            }
            None => None,
        };
        Ok(self)
    }
}

/// Parse a loosely-typed boolean query flag.
///
/// Returns `None` for values that are neither truthy nor falsy so callers
/// can fall back to their default.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Outcome of a chart request.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartReply {
    /// A snapshot was produced, fresh or from cache.
    Served {
        snapshot: ChartSnapshot,
        cached: bool,
        note: Option<String>,
    },
    /// Upstream failed and nothing was cached to fall back on.
    Unavailable {
        error: String,
        status_code: Option<u16>,
    },
}

impl ChartReply {
    pub fn is_cached(&self) -> bool {
        matches!(self, ChartReply::Served { cached: true, .. })
    }

    pub fn note(&self) -> Option<&str> {
        match self {
            ChartReply::Served { note, .. } => note.as_deref(),
            ChartReply::Unavailable { .. } => None,
        }
    }

    pub fn snapshot(&self) -> Option<&ChartSnapshot> {
        match self {
            ChartReply::Served { snapshot, .. } => Some(snapshot),
            ChartReply::Unavailable { .. } => None,
        }
    }

    /// Response body: the upstream payload plus `cached` and `note`, or an
    /// error object.
    pub fn to_json(&self) -> Result<Value> {
        match self {
            ChartReply::Served {
                snapshot,
                cached,
                note,
            } => {
                let mut body = match snapshot.to_payload()? {
                    Value::Object(map) => map,
                    other => {
                        let mut map = Map::new();
                        map.insert("data".to_string(), other);
                        map
                    }
                };
                body.insert("cached".to_string(), Value::Bool(*cached));
                if let Some(note) = note {
                    body.insert("note".to_string(), Value::String(note.clone()));
                }
                Ok(Value::Object(body))
            }
            ChartReply::Unavailable { error, status_code } => {
                let mut body = Map::new();
                body.insert("error".to_string(), Value::String(error.clone()));
                body.insert("cached".to_string(), Value::Bool(false));
                if let Some(code) = status_code {
                    body.insert("status_code".to_string(), Value::from(*code));
                }
                Ok(Value::Object(body))
            }
        }
    }
}
