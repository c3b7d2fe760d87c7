//! Chart snapshots and the payload layouts they are ingested from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use tracing::debug;

use super::catalog::CatalogMetadata;
use crate::{ChartkeepError, Result};

/// How the upstream arranged the entry list.
///
/// The provider has served two layouts over time; both are normalised into
/// [`ChartSnapshot::entries`] on ingestion and re-emitted in their original
/// shape by [`ChartSnapshot::to_payload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryLayout {
    /// `{"chart": {"date": .., "entries": [{"title", "artist", ..}]}}`
    ChartEntries,
    /// `{"songs": [{"name", "artist", ..}]}`
    Songs,
    /// Anything else. Carried through untouched and never enriched.
    Opaque,
}

/// One row of a chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    #[serde(alias = "name")]
    pub title: String,
    #[serde(default)]
    pub artist: String,
    /// Weeks on chart.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weeks: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak: Option<u32>,
    /// Rank in the previous week's chart.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<u32>,
    #[serde(
        default,
        alias = "apple_music",
        skip_serializing_if = "Option::is_none"
    )]
    pub enrichment: Option<CatalogMetadata>,
    /// Provider fields we do not model.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChartEntry {
    pub fn new(rank: u32, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            rank: Some(rank),
            title: title.into(),
            artist: artist.into(),
            weeks: None,
            peak: None,
            last: None,
            enrichment: None,
            extra: Map::new(),
        }
    }

    pub fn is_enriched(&self) -> bool {
        self.enrichment.is_some()
    }
}

/// One retrieved state of a chart, keyed by `(chart_id, week)`.
///
/// A snapshot with `week` set is historical and immutable once cached; the
/// current chart (`week == None`) is replaced wholesale when a newer one is
/// accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSnapshot {
    pub chart_id: String,
    pub week: Option<String>,
    /// Provider-reported chart date.
    pub as_of_date: Option<String>,
    pub layout: EntryLayout,
    pub entries: Vec<ChartEntry>,
    /// Fields around the entry list: the `chart` object's siblings of
    /// `entries` for [`EntryLayout::ChartEntries`], top-level siblings of
    /// `songs` for [`EntryLayout::Songs`], the whole body for
    /// [`EntryLayout::Opaque`].
    #[serde(default)]
    pub extra: Map<String, Value>,
    /// Top-level siblings of `chart` in the [`EntryLayout::ChartEntries`] layout.
    #[serde(default)]
    pub envelope: Map<String, Value>,
    /// When the cached copy lapses, stamped on every write with a TTL.
    /// `None` for permanent entries and snapshots that were never stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl ChartSnapshot {
    /// Normalise an upstream body into a snapshot.
    ///
    /// Fails with [`ChartkeepError::Payload`] when the body is not an object
    /// or is an error envelope (`error`/`message` without any entries). An
    /// entry list whose rows are not songs is kept as an opaque payload.
    pub fn from_payload(chart_id: &str, week: Option<&str>, body: Value) -> Result<Self> {
        let Value::Object(mut root) = body else {
            return Err(ChartkeepError::Payload(
                "expected a JSON object from the chart provider".to_string(),
            ));
        };

        let snapshot = |layout: EntryLayout,
                        as_of_date: Option<String>,
                        entries: Vec<ChartEntry>,
                        extra: Map<String, Value>,
                        envelope: Map<String, Value>| Self {
            chart_id: chart_id.to_string(),
            week: week.map(str::to_string),
            as_of_date,
            layout,
            entries,
            extra,
            envelope,
            expires_at: None,
        };

        let has_chart_entries = matches!(
            root.get("chart"),
            Some(Value::Object(chart)) if chart.get("entries").is_some_and(Value::is_array)
        );
        if has_chart_entries {
            let parsed = root
                .get("chart")
                .and_then(|chart| parse_entries(chart.get("entries")));
            if let Some(entries) = parsed {
                if let Some(Value::Object(mut chart)) = root.remove("chart") {
                    chart.remove("entries");
                    let as_of_date = take_date(&mut chart);
                    return Ok(snapshot(
                        EntryLayout::ChartEntries,
                        as_of_date,
                        entries,
                        chart,
                        root,
                    ));
                }
            }
        } else if root.get("songs").is_some_and(Value::is_array) {
            if let Some(entries) = parse_entries(root.get("songs")) {
                root.remove("songs");
                let as_of_date = take_date(&mut root);
                return Ok(snapshot(
                    EntryLayout::Songs,
                    as_of_date,
                    entries,
                    root,
                    Map::new(),
                ));
            }
        } else if let Some(message) = error_message(&root) {
            return Err(ChartkeepError::Payload(message));
        }

        let as_of_date = opaque_date(&root);
        Ok(snapshot(
            EntryLayout::Opaque,
            as_of_date,
            Vec::new(),
            root,
            Map::new(),
        ))
    }

    pub fn is_historical(&self) -> bool {
        self.week.is_some()
    }

    /// Re-emit the snapshot in the layout it arrived in.
    pub fn to_payload(&self) -> Result<Value> {
        match self.layout {
            EntryLayout::ChartEntries => {
                let mut chart = self.extra.clone();
                if let Some(date) = &self.as_of_date {
                    chart.insert("date".to_string(), Value::String(date.clone()));
                }
                chart.insert("entries".to_string(), serde_json::to_value(&self.entries)?);
                let mut root = self.envelope.clone();
                root.insert("chart".to_string(), Value::Object(chart));
                Ok(Value::Object(root))
            }
            EntryLayout::Songs => {
                let mut root = self.extra.clone();
                if let Some(date) = &self.as_of_date {
                    root.insert("date".to_string(), Value::String(date.clone()));
                }
                let songs = self
                    .entries
                    .iter()
                    .map(|entry| {
                        let mut value = serde_json::to_value(entry)?;
                        if let Value::Object(fields) = &mut value {
                            if let Some(title) = fields.remove("title") {
                                fields.insert("name".to_string(), title);
                            }
                        }
                        Ok(value)
                    })
                    .collect::<Result<Vec<_>>>()?;
                root.insert("songs".to_string(), Value::Array(songs));
                Ok(Value::Object(root))
            }
            EntryLayout::Opaque => Ok(Value::Object(self.extra.clone())),
        }
    }
}

/// Entries of a recognised list, or `None` when the rows are not song
/// entries (artist charts, unexpected field types).
fn parse_entries(list: Option<&Value>) -> Option<Vec<ChartEntry>> {
    let list = list?;
    match serde_json::from_value(list.clone()) {
        Ok(entries) => Some(entries),
        Err(e) => {
            debug!(error = %e, "Chart rows are not song entries, keeping payload opaque");
            None
        }
    }
}

/// Chart date of a payload kept as-is: top-level `date`, else `chart.date`.
fn opaque_date(root: &Map<String, Value>) -> Option<String> {
    root.get("date")
        .or_else(|| root.get("chart").and_then(|chart| chart.get("date")))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn take_date(fields: &mut Map<String, Value>) -> Option<String> {
    match fields.remove("date") {
        Some(Value::String(date)) => Some(date),
        Some(other) => {
            // Keep non-string dates verbatim rather than dropping them.
            fields.insert("date".to_string(), other);
            None
        }
        None => None,
    }
}

fn error_message(root: &Map<String, Value>) -> Option<String> {
    ["error", "message"].iter().find_map(|key| match root.get(*key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    })
}
