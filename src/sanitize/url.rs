use std::sync::LazyLock;

use regex::Regex;

/// Schemes a URL may use.
pub const ALLOWED_SCHEMES: &[&str] = &["http", "https", "mailto"];

/// Rejected wherever they appear in the URL, not only as the scheme.
pub const DENIED_SCHEME_MARKERS: &[&str] = &["javascript:", "vbscript:", "data:", "file:", "ftp:"];

static SCHEME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-zA-Z][a-zA-Z0-9+.\-]*):(.*)$").expect("valid scheme regex"));

// //[userinfo@]host[:port][/path][?query][#fragment]
static HTTP_REST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^//(?:[^/?#@]+@)?(?:[a-zA-Z0-9](?:[a-zA-Z0-9\-]*[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9\-]*[a-zA-Z0-9])?)*|\[[0-9a-fA-F:.]+\])(?::\d{1,5})?(?:[/?#].*)?$",
    )
    .expect("valid http regex")
});

/// Return the trimmed URL if it is a well-formed http, https or mailto URL
/// free of dangerous scheme markers; `None` otherwise.
pub fn sanitize_url(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() || url.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return None;
    }

    let lower = url.to_ascii_lowercase();
    if DENIED_SCHEME_MARKERS.iter().any(|m| lower.contains(m)) {
        return None;
    }

    let caps = SCHEME_RE.captures(url)?;
    let scheme = caps[1].to_ascii_lowercase();
    if !ALLOWED_SCHEMES.contains(&scheme.as_str()) {
        return None;
    }

    let rest = &caps[2];
    let well_formed = match scheme.as_str() {
        "mailto" => {
            let address = rest.split('?').next().unwrap_or_default();
            super::sanitize_email(address).is_some()
        }
        _ => HTTP_REST_RE.is_match(rest),
    };

    well_formed.then(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_https() {
        assert_eq!(
            sanitize_url("  https://example.com/path?q=1#top "),
            Some("https://example.com/path?q=1#top".into())
        );
    }

    #[test]
    fn accepts_port_and_ipv6() {
        assert!(sanitize_url("http://localhost:8080/").is_some());
        assert!(sanitize_url("http://[::1]/").is_some());
    }

    #[test]
    fn accepts_mailto() {
        assert!(sanitize_url("mailto:someone@example.com?subject=hi").is_some());
        assert!(sanitize_url("mailto:not-an-address").is_none());
    }

    #[test]
    fn rejects_dangerous_schemes() {
        assert!(sanitize_url("javascript:alert(1)").is_none());
        assert!(sanitize_url("JAVASCRIPT:alert(1)").is_none());
        assert!(sanitize_url("data:text/html;base64,AAAA").is_none());
        assert!(sanitize_url("file:///etc/passwd").is_none());
        assert!(sanitize_url("ftp://example.com/").is_none());
    }

    #[test]
    fn rejects_marker_hidden_in_query() {
        assert!(sanitize_url("https://example.com/?next=javascript:alert(1)").is_none());
    }

    #[test]
    fn rejects_malformed() {
        assert!(sanitize_url("").is_none());
        assert!(sanitize_url("example.com").is_none());
        assert!(sanitize_url("https://").is_none());
        assert!(sanitize_url("https://exa mple.com").is_none());
        assert!(sanitize_url("https://-bad-.com").is_none());
    }
}
