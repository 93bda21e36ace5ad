use std::io::Read;

use crate::config::ShieldConfig;
use crate::error::Result;
use crate::sanitize::{sanitize_email, sanitize_filename, sanitize_url, ContentSanitizer};

/// What kind of value `intake-shield sanitize` reads from stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SanitizeKind {
    Text,
    Html,
    Url,
    Email,
    Filename,
}

/// Sanitize stdin and print the result. Returns `false` when the value was
/// rejected outright. Bytes that are not UTF-8 become U+FFFD.
pub async fn run(
    config: &ShieldConfig,
    kind: SanitizeKind,
    max_length: Option<usize>,
    keep_markup: bool,
) -> Result<bool> {
    let raw = tokio::task::spawn_blocking(|| {
        let mut raw = Vec::new();
        std::io::stdin().read_to_end(&mut raw).map(|_| raw)
    })
    .await
    .map_err(std::io::Error::other)??;
    let input = String::from_utf8_lossy(&raw);
    let input = input.trim_end_matches(['\r', '\n']);

    match sanitize_value(config, kind, input, max_length, keep_markup)? {
        Some(value) => {
            println!("{value}");
            Ok(true)
        }
        None => {
            eprintln!("intake-shield: {} rejected.", kind_name(kind));
            Ok(false)
        }
    }
}

/// Apply the sanitizer for `kind`. Text and HTML never reject.
pub fn sanitize_value(
    config: &ShieldConfig,
    kind: SanitizeKind,
    input: &str,
    max_length: Option<usize>,
    keep_markup: bool,
) -> Result<Option<String>> {
    let value = match kind {
        SanitizeKind::Text => {
            let sanitizer = ContentSanitizer::with_allowed_tags(&config.text.allowed_tags)?;
            Some(sanitizer.sanitize_text(
                input,
                max_length.unwrap_or(config.text.max_length),
                config.text.strip_markup && !keep_markup,
            ))
        }
        SanitizeKind::Html => {
            let sanitizer = ContentSanitizer::with_allowed_tags(&config.text.allowed_tags)?;
            Some(sanitizer.sanitize_html(input, None))
        }
        SanitizeKind::Url => sanitize_url(input),
        SanitizeKind::Email => sanitize_email(input),
        SanitizeKind::Filename => Some(sanitize_filename(input)),
    };
    Ok(value)
}

fn kind_name(kind: SanitizeKind) -> &'static str {
    match kind {
        SanitizeKind::Text => "text",
        SanitizeKind::Html => "html",
        SanitizeKind::Url => "url",
        SanitizeKind::Email => "email",
        SanitizeKind::Filename => "filename",
    }
}
