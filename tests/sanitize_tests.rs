//! Tests for text, HTML, URL, email and filename sanitization through the
//! public API.

use intake_shield::sanitize::aho::SchemeSanitizer;
use intake_shield::sanitize::regex_san::RegexSanitizer;
use intake_shield::sanitize::{
    sanitize_email, sanitize_filename, sanitize_html, sanitize_text, sanitize_url,
    ContentSanitizer, SanitizePipeline, Sanitizer,
};

fn assert_inert(output: &str) {
    let lower = output.to_ascii_lowercase();
    assert!(!lower.contains("javascript:"), "javascript: survived in {output:?}");
    assert!(!lower.contains("vbscript:"), "vbscript: survived in {output:?}");
    assert!(
        !RegexSanitizer::new(vec![r"(?i)on\w+\s*=".into()])
            .unwrap()
            .is_match(output),
        "inline handler survived in {output:?}"
    );
}

// ---------------------------------------------------------------------------
// Free text
// ---------------------------------------------------------------------------

#[test]
fn text_never_carries_dangerous_schemes_or_handlers() {
    let payloads = [
        "<a href=\"javascript:alert(1)\">x</a>",
        "<img src=x onerror=alert(1)>",
        "jajavascript:vascript:alert(1)",
        "<div OnMouseOver = 'steal()'>hover</div>",
        "VBScript:MsgBox(1)",
        "%6Aavascript%3Aalert(1)",
        "&#106;avascript&#58;alert(1)",
        "<<script>script>alert(1)<</script>/script>",
        "<svg><style>x{}</style><a xlink:href=javascript:alert(1)>y</a></svg>",
        "o\u{0000}nclick=evil()",
    ];
    for payload in payloads {
        for strip in [true, false] {
            let out = sanitize_text(payload, 5000, strip);
            assert_inert(&out);
        }
    }
}

#[test]
fn text_output_respects_max_length() {
    let long = "word ".repeat(2000);
    for max in [1, 2, 10, 100, 5000] {
        let out = sanitize_text(&long, max, true);
        assert!(out.chars().count() <= max, "max {max}: got {}", out.chars().count());
    }
}

#[test]
fn truncation_does_not_leave_open_tag() {
    let out = sanitize_text("<p>hello there</p><strong>more text here</strong>", 25, true);
    assert!(out.chars().count() <= 25);
    assert!(out.ends_with('…'));
    let last_open = out.rfind('<');
    let last_close = out.rfind('>');
    assert!(last_open.is_none() || last_close > last_open, "dangling tag in {out:?}");
}

#[test]
fn truncation_drops_elements_left_open() {
    assert_eq!(sanitize_text("<b>hello world, this is bold</b>", 10, true), "hello…");
    assert_eq!(
        sanitize_text("<em>short</em> then <strong>a long tail</strong>", 24, true),
        "<em>short</em> then…"
    );
}

#[test]
fn truncation_never_splits_an_escaped_character() {
    assert_eq!(sanitize_text("ab<cd", 4, false), "ab…");
    assert_eq!(sanitize_text("x & y & z", 5, false), "x…");
}

#[test]
fn text_keeps_allowed_formatting() {
    assert_eq!(
        sanitize_text("<strong>Bold</strong> and <em>soft</em>", 5000, true),
        "<strong>Bold</strong> and <em>soft</em>"
    );
}

#[test]
fn text_drops_control_characters() {
    assert_eq!(sanitize_text("a\u{0007}b\r\nc\td", 5000, true), "ab\nc\td");
}

#[test]
fn custom_allow_list_applies_to_text() {
    let sanitizer = ContentSanitizer::with_allowed_tags(&["b"]).unwrap();
    assert_eq!(sanitizer.sanitize_text("<b>x</b><i>y</i>", 100, true), "<b>x</b>y");
}

// ---------------------------------------------------------------------------
// HTML
// ---------------------------------------------------------------------------

#[test]
fn html_strips_denied_attributes_and_elements() {
    let out = sanitize_html(
        "<p style=\"color:red\" onclick=\"x()\" title=\"t\">Hi</p><iframe src=\"//evil\"></iframe>",
        None,
    );
    assert_eq!(out, "<p title=\"t\">Hi</p>");
}

#[test]
fn html_output_is_inert() {
    let out = sanitize_html("<a href=\"javascript:alert(1)\" onfocus=\"x\">go</a>", None);
    assert_inert(&out);
    assert!(out.contains("go"));
}

#[test]
fn html_drops_schemes_split_by_whitespace_or_references() {
    let payloads = [
        "<a href=\"java\tscript:alert(1)\">x</a>",
        "<a href=\"java\nscript:alert(1)\">x</a>",
        "<a href=\"java&#9;script:alert(1)\">x</a>",
        "<a href=\"&#106;ava&#x09;script:alert(1)\">x</a>",
        "<img src=\" java&NewLine;script:alert(1)\">",
    ];
    for payload in payloads {
        let out = sanitize_html(payload, Some(&["a", "img"][..]));
        assert!(!out.contains("href"), "href survived in {out:?}");
        assert!(!out.contains("src"), "src survived in {out:?}");
        assert!(!sanitize_text(payload, 5000, true).contains("href"));
    }
}

// ---------------------------------------------------------------------------
// URL and email
// ---------------------------------------------------------------------------

#[test]
fn url_examples() {
    assert_eq!(
        sanitize_url("https://example.com/a?b=c").as_deref(),
        Some("https://example.com/a?b=c")
    );
    assert!(sanitize_url("javascript:alert(1)").is_none());
    assert!(sanitize_url("data:text/html,<script>x</script>").is_none());
    assert!(sanitize_url("//example.com").is_none());
}

#[test]
fn email_examples() {
    assert_eq!(
        sanitize_email("good.name@example.com").as_deref(),
        Some("good.name@example.com")
    );
    assert_eq!(sanitize_email("bad<script>@x.com"), None);
    assert_eq!(sanitize_email(&format!("{}@example.com", "a".repeat(250))), None);
}

// ---------------------------------------------------------------------------
// Filenames
// ---------------------------------------------------------------------------

#[test]
fn filename_strips_directories() {
    assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
    assert_eq!(sanitize_filename("C:\\Windows\\system32\\cmd.exe"), "cmd.exe");
}

#[test]
fn filename_is_idempotent() {
    let long = format!("{}.png", "x".repeat(400));
    let inputs = [
        "../../etc/passwd",
        "...hidden",
        "my photo (1).JPG",
        "a..b...c",
        "",
        "résumé.pdf",
        "shell.php.jpg",
        long.as_str(),
        "name.",
        "\u{0000}\u{0007}",
    ];
    for input in inputs {
        let once = sanitize_filename(input);
        assert_eq!(sanitize_filename(&once), once, "not idempotent for {input:?}");
        assert!(!once.is_empty());
        assert!(once.len() <= 255);
        assert!(!once.starts_with('.'));
    }
}

// ---------------------------------------------------------------------------
// Custom pipelines
// ---------------------------------------------------------------------------

struct Shout;

impl Sanitizer for Shout {
    fn sanitize(&self, input: &str) -> String {
        input.to_uppercase()
    }

    fn name(&self) -> &str {
        "shout"
    }
}

#[test]
fn custom_layers_run_in_order() {
    let pipeline = SanitizePipeline::new(vec![
        Box::new(Shout),
        Box::new(SchemeSanitizer::new(SchemeSanitizer::default_schemes()).unwrap()),
    ]);
    assert_eq!(pipeline.layer_names(), vec!["shout", "schemes"]);
    assert_eq!(pipeline.sanitize("go javascript:x"), "GO X");
}
