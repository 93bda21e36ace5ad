use super::{ScanCheck, ScanSubject, ThreatKind};

/// Shannon entropy of the header, a weak signal for packed or encrypted payloads.
pub struct EntropyCheck {
    /// Bits per byte above which the header is flagged. Default: 7.5.
    pub threshold: f64,
    /// Declared extensions exempt from the check.
    pub exempt_extensions: Vec<String>,
}

impl EntropyCheck {
    pub fn new(threshold: f64, exempt_extensions: Vec<String>) -> Self {
        Self {
            threshold,
            exempt_extensions: exempt_extensions
                .into_iter()
                .map(|e| e.to_ascii_lowercase())
                .collect(),
        }
    }
}

/// Calculate Shannon entropy (base 2) of a byte slice, in bits per byte.
pub fn shannon_entropy(bytes: &[u8]) -> f64 {
    if bytes.is_empty() {
        return 0.0;
    }
    let mut freq = [0u32; 256];
    for &b in bytes {
        freq[b as usize] += 1;
    }
    let len = bytes.len() as f64;
    freq.iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / len;
            -p * p.log2()
        })
        .sum()
}

impl ScanCheck for EntropyCheck {
    fn inspect(&self, subject: &ScanSubject<'_>) -> Vec<ThreatKind> {
        if self
            .exempt_extensions
            .iter()
            .any(|e| e == subject.extension)
        {
            return Vec::new();
        }
        let entropy = shannon_entropy(subject.header);
        if entropy > self.threshold {
            tracing::debug!(entropy, threshold = self.threshold, "high header entropy");
            vec![ThreatKind::HighEntropy]
        } else {
            Vec::new()
        }
    }

    fn name(&self) -> &str {
        "entropy"
    }
}
