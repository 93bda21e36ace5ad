/// Placeholder used when nothing survives normalization.
pub const FALLBACK_FILENAME: &str = "unnamed_file";

/// Filesystem limit on a single path component.
pub const MAX_FILENAME_BYTES: usize = 255;

/// Extensions longer than this are treated as part of the stem when truncating.
const MAX_EXTENSION_BYTES: usize = 32;

/// Rewrite an untrusted filename into `[A-Za-z0-9._-]`, without directory
/// components, runs of dots or leading dots, at most 255 bytes long.
/// Idempotent: normalizing an already normalized name returns it unchanged.
pub fn sanitize_filename(name: &str) -> String {
    // 1. Take only the last path component
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    // 2. Replace everything outside the safe charset
    let mapped: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    // 3. Collapse runs of dots
    let mut collapsed = String::with_capacity(mapped.len());
    for c in mapped.chars() {
        if c == '.' && collapsed.ends_with('.') {
            continue;
        }
        collapsed.push(c);
    }

    // 4. Strip leading dots
    let trimmed = collapsed.trim_start_matches('.');
    if trimmed.is_empty() {
        return FALLBACK_FILENAME.to_string();
    }

    // 5. Cap the length, keeping the extension when there is one
    if trimmed.len() <= MAX_FILENAME_BYTES {
        return trimmed.to_string();
    }
    truncate_preserving_extension(trimmed)
}

// Input is ASCII at this point, so byte slicing is safe.
fn truncate_preserving_extension(name: &str) -> String {
    let extension = name
        .rfind('.')
        .filter(|&dot| dot > 0 && name.len() - dot <= MAX_EXTENSION_BYTES)
        .map(|dot| &name[dot..])
        .unwrap_or("");

    let stem = &name[..name.len() - extension.len()];
    let budget = MAX_FILENAME_BYTES - extension.len();
    // A stem ending in '.' would form ".." with the extension.
    let stem = stem[..budget.min(stem.len())].trim_end_matches('.');

    format!("{stem}{extension}")
}
