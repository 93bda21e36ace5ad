use super::Sanitizer;

/// Pre-processing layer that catches encoded payloads.
///
/// Whitespace-delimited tokens containing `%XX` escapes or HTML character
/// references (`&#106;`, `&#x6A;`, `&colon;`) are decoded and run through the
/// inner layers. If the decoded form would be modified, the whole encoded
/// token is removed from the output.
pub struct EncodingSanitizer {
    inner: Vec<Box<dyn Sanitizer>>,
}

impl EncodingSanitizer {
    pub fn new(inner: Vec<Box<dyn Sanitizer>>) -> Self {
        Self { inner }
    }

    /// Check if decoded content would be modified by any inner layer.
    fn would_strip(&self, decoded: &str) -> bool {
        self.inner
            .iter()
            .any(|sanitizer| sanitizer.sanitize(decoded) != decoded)
    }

    /// Byte spans of encoded tokens whose decoded form is dangerous.
    fn find_encoded_spans(&self, input: &str) -> Vec<(usize, usize)> {
        let mut spans = Vec::new();
        let bytes = input.as_bytes();
        let len = bytes.len();
        let mut pos = 0;

        while pos < len {
            if bytes[pos].is_ascii_whitespace() {
                pos += 1;
                continue;
            }
            let start = pos;
            while pos < len && !bytes[pos].is_ascii_whitespace() {
                pos += 1;
            }
            let token = &input[start..pos];
            if !token.contains('%') && !token.contains('&') {
                continue;
            }
            let decoded = entity_decode(&url_decode(token));
            if decoded != token && self.would_strip(&decoded) {
                spans.push((start, pos));
            }
        }

        spans
    }
}

impl Sanitizer for EncodingSanitizer {
    fn sanitize(&self, input: &str) -> String {
        let spans = self.find_encoded_spans(input);
        if spans.is_empty() {
            return input.to_string();
        }

        let mut result = input.to_string();
        for &(start, end) in spans.iter().rev() {
            result.replace_range(start..end, "");
        }
        result
    }

    fn name(&self) -> &str {
        "encoding"
    }
}

/// URL-decode %XX sequences.
fn url_decode(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let bytes = input.as_bytes();
    let len = bytes.len();
    let mut i = 0;

    while i < len {
        if bytes[i] == b'%' && i + 2 < len {
            if let (Some(hi), Some(lo)) = (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                result.push((hi << 4 | lo) as char);
                i += 3;
                continue;
            }
        }
        // Copy the whole UTF-8 sequence starting here.
        let ch_len = utf8_len(bytes[i]);
        let end = (i + ch_len).min(len);
        result.push_str(input.get(i..end).unwrap_or("\u{fffd}"));
        i = end;
    }

    result
}

/// Decode numeric character references and the few named ones used to
/// smuggle schemes and handlers.
pub(crate) fn entity_decode(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(amp) = rest.find('&') {
        result.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match decode_reference(tail) {
            Some((ch, consumed)) => {
                result.push(ch);
                rest = &tail[consumed..];
            }
            None => {
                result.push('&');
                rest = &tail[1..];
            }
        }
    }
    result.push_str(rest);
    result
}

/// Decode one reference at the start of `s` (which begins with `&`).
/// Returns the character and the number of bytes consumed.
fn decode_reference(s: &str) -> Option<(char, usize)> {
    const NAMED: &[(&str, char)] = &[
        ("colon", ':'),
        ("lpar", '('),
        ("rpar", ')'),
        ("equals", '='),
        ("Tab", '\t'),
        ("NewLine", '\n'),
        ("tab", '\t'),
        ("newline", '\n'),
        ("lt", '<'),
        ("gt", '>'),
        ("quot", '"'),
        ("apos", '\''),
        ("amp", '&'),
    ];

    let body = &s[1..];
    if let Some(num) = body.strip_prefix('#') {
        let (digits, radix, prefix) = match num.strip_prefix(['x', 'X']) {
            Some(hex) => (hex, 16, 2),
            None => (num, 10, 1),
        };
        let end = digits
            .find(|c: char| !c.is_digit(radix))
            .unwrap_or(digits.len());
        if end == 0 {
            return None;
        }
        let code = u32::from_str_radix(&digits[..end], radix).ok()?;
        let ch = char::from_u32(code)?;
        // '&' + prefix + digits + optional ';'
        let mut consumed = 1 + prefix + end;
        if digits[end..].starts_with(';') {
            consumed += 1;
        }
        return Some((ch, consumed));
    }

    NAMED.iter().find_map(|&(name, ch)| {
        let after = body.strip_prefix(name)?;
        let semicolon = after.starts_with(';');
        // Named references need their ';' unless they end the token.
        if !semicolon && !after.is_empty() {
            return None;
        }
        Some((ch, 1 + name.len() + usize::from(semicolon)))
    })
}

fn utf8_len(first: u8) -> usize {
    match first {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf7 => 4,
        _ => 1,
    }
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
