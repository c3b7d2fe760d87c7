//! HTTP routes.
//!
//! - `GET /chart` and its legacy alias `GET /billboard_api.php`
//! - `GET /health`
//! - `DELETE /cache`

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::types::{ChartReply, ChartRequest, DEFAULT_CHART_ID, parse_flag};
use crate::{ChartRequestHandler, ChartkeepError, version};

/// Build the service router.
pub fn router(handler: Arc<ChartRequestHandler>) -> Router {
    Router::new()
        .route("/chart", get(get_chart))
        .route("/billboard_api.php", get(get_chart))
        .route("/health", get(health))
        .route("/cache", delete(clear_cache))
        .layer(TraceLayer::new_for_http())
        .with_state(handler)
}

/// Query string of a chart request. Flags are loosely typed
/// (`true`/`1`/`yes`/`on`); unrecognised values fall back to the default.
#[derive(Debug, Default, Deserialize)]
pub struct ChartQuery {
    pub id: Option<String>,
    pub week: Option<String>,
    pub refresh: Option<String>,
    pub enrich: Option<String>,
    /// Legacy name of `enrich`.
    pub apple_music: Option<String>,
}

impl ChartQuery {
    pub fn into_request(self) -> ChartRequest {
        let flag = |value: Option<&str>, default: bool| value.and_then(parse_flag).unwrap_or(default);

        let enrich = flag(
            self.enrich.as_deref().or(self.apple_music.as_deref()),
            true,
        );
        let mut request = ChartRequest::new(self.id.unwrap_or_else(|| DEFAULT_CHART_ID.to_string()))
            .force_refresh(flag(self.refresh.as_deref(), false))
            .enrich(enrich);
        if let Some(week) = self.week {
            request = request.week(week);
        }
        request
    }
}

async fn get_chart(
    State(handler): State<Arc<ChartRequestHandler>>,
    Query(query): Query<ChartQuery>,
) -> Response {
    match handler.handle(query.into_request()).await {
        Ok(reply) => reply_response(&reply),
        Err(e) => e.into_response(),
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "chartkeep",
        "version": version::version_string(),
    }))
}

async fn clear_cache(State(handler): State<Arc<ChartRequestHandler>>) -> Response {
    match handler.clear_cache().await {
        Ok(()) => Json(json!({"cleared": true})).into_response(),
        Err(e) => e.into_response(),
    }
}

fn reply_response(reply: &ChartReply) -> Response {
    let status = match reply {
        ChartReply::Served { .. } => StatusCode::OK,
        ChartReply::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
    };
    match reply.to_json() {
        Ok(body) => (status, Json(body)).into_response(),
        Err(e) => e.into_response(),
    }
}

impl IntoResponse for ChartkeepError {
    fn into_response(self) -> Response {
        let status = match &self {
            ChartkeepError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => {
                error!(error = %self, "Request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = Json(json!({
            "error": self.to_string(),
            "cached": false,
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> ChartQuery {
        let mut q = ChartQuery::default();
        for (k, v) in pairs {
            let v = Some(v.to_string());
            match *k {
                "id" => q.id = v,
                "week" => q.week = v,
                "refresh" => q.refresh = v,
                "enrich" => q.enrich = v,
                "apple_music" => q.apple_music = v,
                _ => {}
            }
        }
        q
    }

    #[test]
    fn empty_query_uses_defaults() {
        assert_eq!(query(&[]).into_request(), ChartRequest::default());
    }

    #[test]
    fn flags_are_loose() {
        let request = query(&[("refresh", "1"), ("enrich", "no")]).into_request();
        assert!(request.force_refresh);
        assert!(!request.enrich);

        let request = query(&[("refresh", "maybe")]).into_request();
        assert!(!request.force_refresh);
    }

    #[test]
    fn legacy_enrich_flag() {
        assert!(!query(&[("apple_music", "false")]).into_request().enrich);
        assert!(
            query(&[("apple_music", "false"), ("enrich", "true")])
                .into_request()
                .enrich
        );
    }

    #[test]
    fn week_passes_through() {
        let request = query(&[("id", "billboard-200"), ("week", "2022-01-01")]).into_request();
        assert_eq!(request.chart_id, "billboard-200");
        assert_eq!(request.week.as_deref(), Some("2022-01-01"));
    }
}
