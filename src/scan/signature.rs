use super::{ScanCheck, ScanSubject, ThreatKind};

/// A magic prefix expected at offset 0.
struct Signature {
    magic: &'static [u8],
    kind: ThreatKind,
    ignore_case: bool,
}

const SIGNATURES: &[Signature] = &[
    // PE / DOS
    Signature { magic: b"MZ", kind: ThreatKind::ExecutableSignature, ignore_case: false },
    // ELF, with and without the 0x7f lead byte
    Signature { magic: b"\x7fELF", kind: ThreatKind::ExecutableSignature, ignore_case: false },
    Signature { magic: b"ELF", kind: ThreatKind::ExecutableSignature, ignore_case: false },
    // Mach-O 32/64, both byte orders
    Signature { magic: b"\xfe\xed\xfa\xce", kind: ThreatKind::ExecutableSignature, ignore_case: false },
    Signature { magic: b"\xfe\xed\xfa\xcf", kind: ThreatKind::ExecutableSignature, ignore_case: false },
    Signature { magic: b"\xce\xfa\xed\xfe", kind: ThreatKind::ExecutableSignature, ignore_case: false },
    Signature { magic: b"\xcf\xfa\xed\xfe", kind: ThreatKind::ExecutableSignature, ignore_case: false },
    // Scripts
    Signature { magic: b"#!/", kind: ThreatKind::ScriptSignature, ignore_case: false },
    Signature { magic: b"<?php", kind: ThreatKind::ScriptSignature, ignore_case: true },
    Signature { magic: b"<script", kind: ThreatKind::ScriptSignature, ignore_case: true },
];

/// Header check: executable/script magic at offset 0, and empty files.
#[derive(Default)]
pub struct SignatureCheck;

impl SignatureCheck {
    pub fn new() -> Self {
        Self
    }
}

fn starts_with(header: &[u8], sig: &Signature) -> bool {
    match header.get(..sig.magic.len()) {
        Some(prefix) if sig.ignore_case => prefix.eq_ignore_ascii_case(sig.magic),
        Some(prefix) => prefix == sig.magic,
        None => false,
    }
}

impl ScanCheck for SignatureCheck {
    fn inspect(&self, subject: &ScanSubject<'_>) -> Vec<ThreatKind> {
        if subject.content.is_empty() {
            return vec![ThreatKind::EmptyFile];
        }
        let mut found = Vec::new();
        for sig in SIGNATURES {
            if starts_with(subject.header, sig) && !found.contains(&sig.kind) {
                found.push(sig.kind);
            }
        }
        found
    }

    fn name(&self) -> &str {
        "signature"
    }
}
