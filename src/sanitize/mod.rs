pub mod aho;
pub mod control;
pub mod email;
pub mod encoding;
pub mod filename;
pub mod markup;
pub mod regex_san;
pub mod url;

use std::sync::LazyLock;

pub use email::sanitize_email;
pub use filename::sanitize_filename;
pub use url::sanitize_url;

use crate::error::Result;
use markup::{AttributePolicy, MarkupSanitizer};

/// A single sanitization layer.
pub trait Sanitizer: Send + Sync {
    /// Sanitize the input string, removing or neutralising what the layer targets.
    fn sanitize(&self, input: &str) -> String;

    /// Name of this sanitizer layer (for logging/debugging).
    fn name(&self) -> &str;
}

/// Upper bound on passes before falling back to escaping everything.
const MAX_PASSES: usize = 16;

/// An ordered list of layers.
pub struct SanitizePipeline {
    layers: Vec<Box<dyn Sanitizer>>,
}

impl SanitizePipeline {
    /// Create a pipeline from custom layers.
    pub fn new(layers: Vec<Box<dyn Sanitizer>>) -> Self {
        Self { layers }
    }

    /// Run all sanitization layers in sequence, once.
    pub fn sanitize(&self, input: &str) -> String {
        let mut result = input.to_string();
        for layer in &self.layers {
            result = layer.sanitize(&result);
        }
        result
    }

    /// Repeat the pipeline until a pass changes nothing. Returns `None` if
    /// the input is still changing after `max_passes`.
    pub fn sanitize_until_stable(&self, input: &str, max_passes: usize) -> Option<String> {
        let mut current = input.to_string();
        for pass in 0..max_passes {
            let next = self.sanitize(&current);
            if next == current {
                tracing::trace!(passes = pass + 1, "sanitize pipeline stable");
                return Some(next);
            }
            current = next;
        }
        None
    }

    /// Layer names, in order.
    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.name()).collect()
    }
}

fn removal_layers() -> Result<Vec<Box<dyn Sanitizer>>> {
    let layers: Vec<Box<dyn Sanitizer>> = vec![
        Box::new(aho::SchemeSanitizer::new(
            aho::SchemeSanitizer::default_schemes(),
        )?),
        Box::new(regex_san::RegexSanitizer::new(
            regex_san::RegexSanitizer::default_patterns(),
        )?),
    ];
    Ok(layers)
}

fn encoding_layer() -> Result<Box<dyn Sanitizer>> {
    let layer: Box<dyn Sanitizer> =
        Box::new(encoding::EncodingSanitizer::new(removal_layers()?));
    Ok(layer)
}

/// Compiled rule tables for text and HTML sanitization.
///
/// Order for markup-stripping text and for HTML:
/// control chars -> [encoded payloads -> markup -> schemes -> handlers]*.
/// Order for escaped text:
/// control chars -> encoded payloads -> escape -> [schemes -> handlers]*.
/// Bracketed groups repeat until stable.
pub struct ContentSanitizer {
    control: control::ControlCharSanitizer,
    text_strip: SanitizePipeline,
    text_escape_prep: SanitizePipeline,
    removal: SanitizePipeline,
    html_default: SanitizePipeline,
    encoded_check: SanitizePipeline,
}

impl ContentSanitizer {
    /// Build with the default text allow-list.
    pub fn new() -> Result<Self> {
        Self::with_allowed_tags(markup::DEFAULT_ALLOWED_TAGS)
    }

    /// Build with a custom allow-list for free-text markup and default HTML.
    pub fn with_allowed_tags<S: AsRef<str>>(allowed_tags: &[S]) -> Result<Self> {
        let escape_prep: Vec<Box<dyn Sanitizer>> =
            vec![encoding_layer()?, Box::new(markup::EscapeSanitizer)];
        Ok(Self {
            control: control::ControlCharSanitizer,
            text_strip: Self::markup_pipeline(allowed_tags, AttributePolicy::LinksOnly)?,
            text_escape_prep: SanitizePipeline::new(escape_prep),
            removal: SanitizePipeline::new(removal_layers()?),
            html_default: Self::markup_pipeline(allowed_tags, AttributePolicy::DenyListed)?,
            encoded_check: SanitizePipeline::new(vec![encoding_layer()?]),
        })
    }

    fn markup_pipeline<S: AsRef<str>>(
        allowed_tags: &[S],
        policy: AttributePolicy,
    ) -> Result<SanitizePipeline> {
        let mut layers = vec![
            encoding_layer()?,
            Box::new(MarkupSanitizer::new(allowed_tags, policy)?) as Box<dyn Sanitizer>,
        ];
        layers.extend(removal_layers()?);
        Ok(SanitizePipeline::new(layers))
    }

    /// Run `pipeline` to a fixed point, escaping everything if it never settles.
    fn settle(&self, pipeline: &SanitizePipeline, input: &str) -> String {
        pipeline
            .sanitize_until_stable(input, MAX_PASSES)
            .unwrap_or_else(|| {
                tracing::debug!(
                    layers = ?pipeline.layer_names(),
                    "sanitize pipeline did not settle, escaping input"
                );
                let escaped = markup::EscapeSanitizer.sanitize(input);
                self.removal
                    .sanitize_until_stable(&escaped, MAX_PASSES)
                    .unwrap_or_default()
            })
    }

    /// Sanitize free text: strip control characters, strip (or escape) markup,
    /// remove dangerous schemes and inline handlers, trim, and truncate to
    /// `max_length` characters with an ellipsis.
    pub fn sanitize_text(&self, content: &str, max_length: usize, strip_markup: bool) -> String {
        let cleaned = self.control.sanitize(content);
        let neutralised = if strip_markup {
            self.settle(&self.text_strip, &cleaned)
        } else {
            let escaped = self.text_escape_prep.sanitize(&cleaned);
            self.settle(&self.removal, &escaped)
        };
        markup::truncate_balanced(neutralised.trim(), max_length)
    }

    /// True when `input` carries a script-bearing element, a dangerous scheme
    /// or an inline handler, plain or percent/entity encoded.
    pub fn is_hostile(&self, input: &str) -> bool {
        let lowered = input.to_ascii_lowercase();
        markup::CONTENT_DROPPING_TAGS
            .iter()
            .any(|tag| lowered.contains(&format!("<{tag}")))
            || self.removal.sanitize(input) != input
            || self.encoded_check.sanitize(input) != input
    }

    /// Sanitize an HTML fragment, keeping only `allowed_tags` (or the
    /// configured allow-list) and stripping deny-listed attributes.
    pub fn sanitize_html(&self, html: &str, allowed_tags: Option<&[&str]>) -> String {
        let cleaned = self.control.sanitize(html);
        match allowed_tags {
            None => self.settle(&self.html_default, &cleaned),
            Some(tags) => match Self::markup_pipeline(tags, AttributePolicy::DenyListed) {
                Ok(pipeline) => self.settle(&pipeline, &cleaned),
                Err(e) => {
                    // Unreachable with the built-in tables; fail closed.
                    tracing::warn!(error = %e, "html pipeline build failed, escaping input");
                    self.settle(&self.removal, &markup::EscapeSanitizer.sanitize(&cleaned))
                }
            },
        }
    }
}

static DEFAULT_SANITIZER: LazyLock<ContentSanitizer> =
    LazyLock::new(|| ContentSanitizer::new().expect("default sanitizer rules should compile"));

/// The shared default sanitizer.
pub fn default_sanitizer() -> &'static ContentSanitizer {
    &DEFAULT_SANITIZER
}

/// See [`ContentSanitizer::sanitize_text`].
pub fn sanitize_text(content: &str, max_length: usize, strip_markup: bool) -> String {
    DEFAULT_SANITIZER.sanitize_text(content, max_length, strip_markup)
}

/// See [`ContentSanitizer::sanitize_html`].
pub fn sanitize_html(html: &str, allowed_tags: Option<&[&str]>) -> String {
    DEFAULT_SANITIZER.sanitize_html(html, allowed_tags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_strips_markup_and_schemes() {
        let result = sanitize_text(
            "<p onclick=\"x()\">Hi <script>alert(1)</script><a href=\"javascript:go()\">there</a></p>",
            500,
            true,
        );
        assert_eq!(result, "<p>Hi <a>there</a></p>");
    }

    #[test]
    fn text_escapes_when_not_stripping() {
        let result = sanitize_text("<b>hi</b> & bye", 100, false);
        assert_eq!(result, "&lt;b&gt;hi&lt;/b&gt; &amp; bye");
    }

    #[test]
    fn text_trims_and_truncates() {
        let result = sanitize_text("   hello world   ", 8, true);
        assert_eq!(result, "hello w…");
        assert_eq!(result.chars().count(), 8);
    }

    #[test]
    fn html_keeps_custom_allow_list() {
        let result = sanitize_html("<h1 class=\"t\">T</h1><p>p</p>", Some(&["h1"][..]));
        assert_eq!(result, "<h1 class=\"t\">T</h1>p");
    }

    #[test]
    fn hostile_input_detection() {
        let sanitizer = default_sanitizer();
        assert!(sanitizer.is_hostile("<SCRIPT>alert(1)</SCRIPT>"));
        assert!(sanitizer.is_hostile("<img src=x onerror=alert(1)>"));
        assert!(sanitizer.is_hostile("click %6Aavascript%3Aalert(1)"));
        assert!(!sanitizer.is_hostile("<b>bold</b> and plain text"));
    }

    #[test]
    fn pipeline_reports_layer_names() {
        let pipeline = SanitizePipeline::new(removal_layers().unwrap());
        assert_eq!(pipeline.layer_names(), vec!["schemes", "regex"]);
    }

    #[test]
    fn unstable_pipeline_returns_none() {
        struct Grow;
        impl Sanitizer for Grow {
            fn sanitize(&self, input: &str) -> String {
                format!("{input}x")
            }
            fn name(&self) -> &str {
                "grow"
            }
        }
        let pipeline = SanitizePipeline::new(vec![Box::new(Grow)]);
        assert!(pipeline.sanitize_until_stable("a", 3).is_none());
    }
}
