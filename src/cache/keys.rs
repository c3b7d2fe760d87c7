//! Cache key layout.
//!
//! Keys are shared with deployments that ran the earlier service against
//! the same store, so the prefixes are fixed.

use std::borrow::Cow;

/// Rate-limit cooldown flag for the chart provider.
pub const RATE_LIMIT_KEY: &str = "billboard:rate_limited";

/// Catalog bearer token.
pub const CATALOG_TOKEN_KEY: &str = "apple_music:token";

/// `billboard:{chart_id}` or `billboard:{chart_id}:{week}`.
pub fn chart_key(chart_id: &str, week: Option<&str>) -> String {
    match week {
        Some(week) => format!("billboard:{chart_id}:{week}"),
        None => format!("billboard:{chart_id}"),
    }
}

/// `apple_music:search:{title}:{artist}`, keyed on the literal pair.
///
/// `%` and `:` inside either part are percent-escaped so that
/// `("a:b", "c")` and `("a", "b:c")` get different keys. Pairs without
/// those characters keep their historical keys.
pub fn catalog_search_key(title: &str, artist: &str) -> String {
    format!(
        "apple_music:search:{}:{}",
        escape_part(title),
        escape_part(artist)
    )
}

fn escape_part(part: &str) -> Cow<'_, str> {
    if part.contains(['%', ':']) {
        Cow::Owned(part.replace('%', "%25").replace(':', "%3A"))
    } else {
        Cow::Borrowed(part)
    }
}
