use std::sync::LazyLock;

use regex::{Regex, RegexSet};

/// RFC 5321 path limit.
const MAX_EMAIL_LEN: usize = 254;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9._%+\-]+@[a-z0-9](?:[a-z0-9\-]*[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9\-]*[a-z0-9])?)*\.[a-z]{2,}$")
        .expect("valid email regex")
});

static SUSPICIOUS_RE: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        // Markup and quoting characters
        r#"[<>"']"#,
        // Repeated dots anywhere
        r"\.\.",
        // Leading or trailing dot in the local part
        r"^\.|\.@",
        // Executable-looking top-level suffixes
        r"\.(exe|bat|cmd|scr|js|vbs|pif|msi|jar)$",
    ])
    .expect("valid suspicious email patterns")
});

/// Return the trimmed, lowercased address if it is syntactically valid and
/// matches none of the suspicious patterns; `None` otherwise.
pub fn sanitize_email(email: &str) -> Option<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || email.len() > MAX_EMAIL_LEN {
        return None;
    }
    if SUSPICIOUS_RE.is_match(&email) || !EMAIL_RE.is_match(&email) {
        return None;
    }
    Some(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_address() {
        assert_eq!(
            sanitize_email("good.name@example.com"),
            Some("good.name@example.com".into())
        );
    }

    #[test]
    fn lowercases_and_trims() {
        assert_eq!(
            sanitize_email("  Jane.Doe+news@Example.ORG "),
            Some("jane.doe+news@example.org".into())
        );
    }

    #[test]
    fn rejects_markup() {
        assert_eq!(sanitize_email("bad<script>@x.com"), None);
        assert_eq!(sanitize_email("o'brien@example.com"), None);
    }

    #[test]
    fn rejects_repeated_dots() {
        assert_eq!(sanitize_email("a..b@example.com"), None);
        assert_eq!(sanitize_email("a@example..com"), None);
        assert_eq!(sanitize_email(".a@example.com"), None);
        assert_eq!(sanitize_email("a.@example.com"), None);
    }

    #[test]
    fn rejects_executable_suffix() {
        assert_eq!(sanitize_email("user@download.exe"), None);
    }

    #[test]
    fn rejects_malformed() {
        assert_eq!(sanitize_email(""), None);
        assert_eq!(sanitize_email("no-at-sign.example.com"), None);
        assert_eq!(sanitize_email("a@b"), None);
        assert_eq!(sanitize_email("a@@example.com"), None);
        let long = format!("{}@example.com", "a".repeat(250));
        assert_eq!(sanitize_email(&long), None);
    }
}
