//! Build metadata embedded by `build.rs`.
//!
//! Reported by the `/health` route and sent as the `User-Agent` of every
//! outbound request so upstream operators can tell deployments apart.

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git commit SHA at build time, or "unknown" outside a checkout.
pub const GIT_SHA: &str = match option_env!("VERGEN_GIT_SHA") {
    Some(sha) => sha,
    None => "unknown",
};

/// RFC 3339 build timestamp, or "unknown".
pub const BUILD_TIMESTAMP: &str = match option_env!("VERGEN_BUILD_TIMESTAMP") {
    Some(ts) => ts,
    None => "unknown",
};

fn short_sha() -> &'static str {
    GIT_SHA.get(..7).unwrap_or(GIT_SHA)
}

/// Version plus short commit: `0.1.0+abc1234`, with `.dirty` appended when
/// the tree had uncommitted changes.
pub fn version_string() -> String {
    let dirty = if option_env!("VERGEN_GIT_DIRTY") == Some("true") {
        ".dirty"
    } else {
        ""
    };
    format!("{PKG_VERSION}+{}{dirty}", short_sha())
}

/// `User-Agent` header value for upstream requests.
pub fn user_agent() -> String {
    format!("chartkeep/{PKG_VERSION}")
}
