//! Artwork URL canonicalisation.
//!
//! The catalog returns artwork either as a template
//! (`…/{w}x{h}bb.jpg`, sometimes `…/{w}x{h}{c}.{f}`) or already resolved to
//! some size (`…/100x100bb.jpg`). Both are rewritten to one fixed size so
//! cached and fresh entries look the same.

use std::sync::LazyLock;

use regex::Regex;

/// Size token in the final path segment.
static SIZE_SEGMENT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?:\{w\}x\{h\}|\d+x\d+)(?P<rest>[^/]*)$").ok());

/// Rewrite the size token of `url` to `size`x`size`.
///
/// URLs without a recognisable size token are returned unchanged.
pub fn normalize_artwork_url(url: &str, size: u32) -> String {
    let Some(pattern) = SIZE_SEGMENT.as_ref() else {
        return url.to_string();
    };
    let Some(caps) = pattern.captures(url) else {
        return url.to_string();
    };
    let (Some(whole), Some(rest)) = (caps.get(0), caps.name("rest")) else {
        return url.to_string();
    };
    let rest = rest.as_str().replace("{c}", "bb").replace("{f}", "jpg");
    format!("{}{size}x{size}{rest}", &url[..whole.start()])
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://is1-ssl.mzstatic.com/image/thumb/Music116/v4/aa/bb/cc/886449.jpg";

    #[test]
    fn fills_template() {
        assert_eq!(
            normalize_artwork_url(&format!("{BASE}/{{w}}x{{h}}bb.jpg"), 300),
            format!("{BASE}/300x300bb.jpg")
        );
    }

    #[test]
    fn fills_format_placeholders() {
        assert_eq!(
            normalize_artwork_url(&format!("{BASE}/{{w}}x{{h}}{{c}}.{{f}}"), 300),
            format!("{BASE}/300x300bb.jpg")
        );
    }

    #[test]
    fn resizes_concrete_size() {
        assert_eq!(
            normalize_artwork_url(&format!("{BASE}/100x100bb.jpg"), 300),
            format!("{BASE}/300x300bb.jpg")
        );
    }

    #[test]
    fn is_idempotent() {
        let once = normalize_artwork_url(&format!("{BASE}/{{w}}x{{h}}bb.jpg"), 300);
        assert_eq!(normalize_artwork_url(&once, 300), once);
    }

    #[test]
    fn leaves_unrecognised_urls_alone() {
        let url = "https://example.com/cover.jpg";
        assert_eq!(normalize_artwork_url(url, 300), url);
    }
}
