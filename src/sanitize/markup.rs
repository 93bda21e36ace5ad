use std::collections::HashSet;
use std::fmt::Write as _;
use std::ops::Range;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::{IntakeShieldError, Result};

use super::Sanitizer;

/// Basic formatting elements kept in free text.
pub const DEFAULT_ALLOWED_TAGS: &[&str] = &[
    "b",
    "i",
    "em",
    "strong",
    "p",
    "br",
    "ul",
    "ol",
    "li",
    "a",
    "code",
    "pre",
    "blockquote",
];

/// Elements removed together with everything between their open and close tags.
pub const CONTENT_DROPPING_TAGS: &[&str] = &["script", "style", "iframe", "object", "embed"];

/// Attributes always stripped from kept elements.
pub const DENIED_ATTRIBUTES: &[&str] = &[
    "onload",
    "onerror",
    "onclick",
    "onmouseover",
    "onmouseout",
    "onmousedown",
    "onmouseup",
    "onfocus",
    "onblur",
    "onchange",
    "onsubmit",
    "onkeydown",
    "onkeyup",
    "onkeypress",
    "formaction",
    "style",
];

/// Attributes whose value a browser navigates to or fetches.
pub const URL_ATTRIBUTES: &[&str] = &[
    "href",
    "src",
    "action",
    "formaction",
    "xlink:href",
    "poster",
    "cite",
    "background",
];

/// How attributes on allowed elements are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributePolicy {
    /// Drop every attribute except a safe `href` on `<a>`.
    LinksOnly,
    /// Keep attributes unless deny-listed or an `on*` handler.
    DenyListed,
}

/// Allow-list tag filter driven by attribute-level regexes.
pub struct MarkupSanitizer {
    allowed: HashSet<String>,
    policy: AttributePolicy,
    tag_re: Regex,
    attr_re: Regex,
    comment_re: Regex,
    dropping: Vec<Regex>,
    denied_attrs: HashSet<&'static str>,
}

impl MarkupSanitizer {
    pub fn new<S: AsRef<str>>(allowed_tags: &[S], policy: AttributePolicy) -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| IntakeShieldError::InvalidRule {
                reason: format!("invalid markup pattern: {e}"),
            })
        };
        let dropping = CONTENT_DROPPING_TAGS
            .iter()
            .map(|tag| compile(&format!(r"(?is)<\s*{tag}\b[^>]*>.*?<\s*/\s*{tag}\s*>")))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            allowed: allowed_tags
                .iter()
                .map(|t| t.as_ref().to_ascii_lowercase())
                .collect(),
            policy,
            // Second alternative catches a stray '<' that starts no tag.
            tag_re: compile(r"<\s*(/?)\s*([a-zA-Z][a-zA-Z0-9-]*)([^>]*)>|<")?,
            attr_re: compile(
                r#"([a-zA-Z_:][-a-zA-Z0-9_:.]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#,
            )?,
            comment_re: compile(r"(?s)<!--.*?-->")?,
            dropping,
            denied_attrs: DENIED_ATTRIBUTES.iter().copied().collect(),
        })
    }

    fn keep_attribute(&self, tag: &str, name: &str, value: Option<&str>) -> bool {
        match self.policy {
            AttributePolicy::LinksOnly => tag == "a" && name == "href" && value.is_some(),
            AttributePolicy::DenyListed => {
                !self.denied_attrs.contains(name) && !name.starts_with("on")
            }
        }
    }

    fn rebuild_tag(&self, caps: &Captures) -> String {
        let Some(name) = caps.get(2) else {
            return "&lt;".to_string();
        };
        let name = name.as_str().to_ascii_lowercase();
        if !self.allowed.contains(&name) {
            return String::new();
        }
        if !caps[1].is_empty() {
            return format!("</{name}>");
        }

        let raw_attrs = &caps[3];
        let mut tag = format!("<{name}");
        for attr in self.attr_re.captures_iter(raw_attrs) {
            let attr_name = attr[1].to_ascii_lowercase();
            let value = attr
                .get(2)
                .or_else(|| attr.get(3))
                .or_else(|| attr.get(4))
                .map(|m| m.as_str());
            if !self.keep_attribute(&name, &attr_name, value) {
                continue;
            }
            let value = match value {
                Some(raw) if URL_ATTRIBUTES.contains(&attr_name.as_str()) => {
                    let relative_ok = self.policy == AttributePolicy::DenyListed;
                    match safe_url_value(raw, relative_ok) {
                        Some(url) => Some(url),
                        None => continue,
                    }
                }
                other => other.map(str::to_string),
            };
            match value {
                Some(v) => {
                    let escaped = v.replace('"', "&quot;").replace('<', "&lt;");
                    let _ = write!(tag, " {attr_name}=\"{escaped}\"");
                }
                None => {
                    let _ = write!(tag, " {attr_name}");
                }
            }
        }
        if raw_attrs.trim_end().ends_with('/') {
            tag.push_str(" /");
        }
        tag.push('>');
        tag
    }
}

impl Sanitizer for MarkupSanitizer {
    fn sanitize(&self, input: &str) -> String {
        let mut result = self.comment_re.replace_all(input, "").into_owned();
        for re in &self.dropping {
            result = re.replace_all(&result, "").into_owned();
        }
        self.tag_re
            .replace_all(&result, |caps: &Captures| self.rebuild_tag(caps))
            .into_owned()
    }

    fn name(&self) -> &str {
        "markup"
    }
}

/// The URL a browser would resolve from an attribute value: character
/// references decoded, ASCII whitespace and control characters removed.
/// Absolute URLs must pass `sanitize_url`; relative references are kept only
/// when `relative_ok`.
fn safe_url_value(raw: &str, relative_ok: bool) -> Option<String> {
    let url: String = super::encoding::entity_decode(raw)
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_ascii_control())
        .collect();
    let path_start = url.find(['/', '?', '#']).unwrap_or(url.len());
    if relative_ok && !url[..path_start].contains(':') {
        return Some(url);
    }
    super::sanitize_url(&url)
}

/// Escapes `&`, `<` and `>` so that no markup renders.
pub struct EscapeSanitizer;

impl Sanitizer for EscapeSanitizer {
    fn sanitize(&self, input: &str) -> String {
        let mut output = String::with_capacity(input.len());
        for c in input.chars() {
            match c {
                '&' => output.push_str("&amp;"),
                '<' => output.push_str("&lt;"),
                '>' => output.push_str("&gt;"),
                _ => output.push(c),
            }
        }
        output
    }

    fn name(&self) -> &str {
        "escape"
    }
}

/// Elements that never take a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "wbr",
];

static BALANCE_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<\s*(/?)\s*([a-zA-Z][a-zA-Z0-9-]*)[^<>]*?(/?)\s*>").expect("valid tag regex")
});

static PARTIAL_ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#?[a-zA-Z0-9]*$").expect("valid entity regex"));

/// Truncate to at most `max_chars` characters, ending with an ellipsis when
/// anything was cut. The kept text never ends inside a tag or an entity, and
/// elements whose closing tag fell past the cut are removed.
pub fn truncate_balanced(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }

    let cut = input
        .char_indices()
        .nth(max_chars - 1)
        .map(|(idx, _)| idx)
        .unwrap_or(input.len());
    let mut kept = &input[..cut];

    if let Some(open) = kept.rfind('<') {
        if kept[open..].find('>').is_none() {
            kept = &kept[..open];
        }
    }
    if let Some(partial) = PARTIAL_ENTITY_RE.find(kept) {
        kept = &kept[..partial.start()];
    }

    let mut result = strip_unclosed(kept).trim_end().to_string();
    result.push('…');
    result
}

/// Remove opening tags that have no matching closing tag later in `fragment`.
fn strip_unclosed(fragment: &str) -> String {
    let mut open: Vec<(String, Range<usize>)> = Vec::new();
    let mut unmatched: Vec<Range<usize>> = Vec::new();

    for caps in BALANCE_TAG_RE.captures_iter(fragment) {
        let Some(whole) = caps.get(0) else { continue };
        let name = caps[2].to_ascii_lowercase();
        if !caps[1].is_empty() {
            if let Some(pos) = open.iter().rposition(|(tag, _)| *tag == name) {
                // Everything opened after the match is closed implicitly.
                unmatched.extend(open.drain(pos..).skip(1).map(|(_, span)| span));
            }
        } else if caps[3].is_empty() && !VOID_ELEMENTS.contains(&name.as_str()) {
            open.push((name, whole.range()));
        }
    }
    unmatched.extend(open.into_iter().map(|(_, span)| span));
    if unmatched.is_empty() {
        return fragment.to_string();
    }

    unmatched.sort_by_key(|span| span.start);
    let mut result = String::with_capacity(fragment.len());
    let mut last = 0;
    for span in unmatched {
        result.push_str(&fragment[last..span.start]);
        last = span.end;
    }
    result.push_str(&fragment[last..]);
    result
}
