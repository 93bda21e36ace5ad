use super::{SecurityEvent, Severity};

/// Destination for recorded events, in addition to the store.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &SecurityEvent);
}

/// Writes each event as a structured `tracing` record on the
/// `intake_shield::security` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &SecurityEvent) {
        let payload = serde_json::Value::Object(event.payload.clone());
        match event.severity {
            Severity::Critical | Severity::Error => tracing::error!(
                target: "intake_shield::security",
                severity = %event.severity,
                category = %event.category,
                event = %event.event_name,
                client_ip = %event.client_ip,
                actor = event.actor_id.as_deref().unwrap_or("-"),
                method = %event.request_method,
                url = %event.request_url,
                %payload,
                "security event"
            ),
            Severity::Warning => tracing::warn!(
                target: "intake_shield::security",
                severity = %event.severity,
                category = %event.category,
                event = %event.event_name,
                client_ip = %event.client_ip,
                actor = event.actor_id.as_deref().unwrap_or("-"),
                method = %event.request_method,
                url = %event.request_url,
                %payload,
                "security event"
            ),
            Severity::Info => tracing::info!(
                target: "intake_shield::security",
                severity = %event.severity,
                category = %event.category,
                event = %event.event_name,
                client_ip = %event.client_ip,
                actor = event.actor_id.as_deref().unwrap_or("-"),
                method = %event.request_method,
                url = %event.request_url,
                %payload,
                "security event"
            ),
        }
    }
}
