use super::Severity;

/// Severity of known `(category, event_name)` pairs.
const SEVERITY_TABLE: &[(&str, &str, Severity)] = &[
    ("attack_detection", "potential_brute_force", Severity::Critical),
    ("file_upload", "malicious_file_detected", Severity::Critical),
    ("suspicious", "sql_injection_attempt", Severity::Critical),
    ("suspicious", "xss_attempt", Severity::Critical),
    ("attack_detection", "suspicious_activity_pattern", Severity::Error),
    ("file_upload", "scan_error", Severity::Error),
    ("access_control", "privilege_escalation", Severity::Error),
    ("suspicious", "login_failed", Severity::Warning),
    ("access_control", "access_denied", Severity::Warning),
    ("file_upload", "upload_rejected", Severity::Warning),
    ("validation", "input_rejected", Severity::Warning),
    ("authentication", "login_success", Severity::Info),
    ("authentication", "logout", Severity::Info),
    ("file_upload", "upload_accepted", Severity::Info),
];

/// Look up the severity of an event. Unknown pairs are warnings.
pub fn classify(category: &str, event_name: &str) -> Severity {
    SEVERITY_TABLE
        .iter()
        .find(|(c, n, _)| *c == category && *n == event_name)
        .map(|(_, _, severity)| *severity)
        .unwrap_or(Severity::Warning)
}
