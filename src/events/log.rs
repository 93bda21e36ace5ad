use std::collections::HashSet;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::config::EventLogConfig;
use crate::storage::EventStore;

use super::{EventSink, EventStats, RequestContext, SecurityEvent, TracingSink, ATTACK_CATEGORY};

const RECENT_KEY: &str = "security_events:recent";

/// Event names that count toward `potential_brute_force`.
pub const LOGIN_FAILURE_EVENTS: &[&str] = &[
    "login_failed",
    "failed_login",
    "authentication_failed",
    "invalid_credentials",
];

/// Event names that count toward `suspicious_activity_pattern`.
pub const DENIAL_EVENTS: &[&str] = &[
    "upload_rejected",
    "malicious_file_detected",
    "validation_failed",
    "input_rejected",
    "access_denied",
    "unauthorized_access",
    "csrf_token_mismatch",
];

pub const BRUTE_FORCE_ALERT: &str = "potential_brute_force";
pub const SUSPICIOUS_PATTERN_ALERT: &str = "suspicious_activity_pattern";

fn ip_key(ip: &str) -> String {
    format!("security_events:ip:{ip}")
}

fn cooldown_key(ip: &str, alert: &str) -> String {
    format!("security_events:alerted:{alert}:{ip}")
}

/// Bounded, expiring security event log with per-IP pattern correlation.
///
/// Every operation is best effort: store failures are logged and swallowed so
/// they never change the outcome of the request being inspected.
pub struct SecurityEventLog<S: EventStore> {
    store: S,
    sink: Box<dyn EventSink>,
    config: EventLogConfig,
}

impl<S: EventStore> SecurityEventLog<S> {
    pub fn new(store: S, config: EventLogConfig) -> Self {
        Self {
            store,
            sink: Box::new(TracingSink),
            config,
        }
    }

    /// Replace the default tracing sink.
    pub fn with_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EventLogConfig {
        &self.config
    }

    /// Record an event and, for correlated categories, check the client's
    /// recent history for attack patterns. Never fails.
    pub fn record(
        &self,
        category: &str,
        event_name: &str,
        ctx: &RequestContext,
        payload: Map<String, Value>,
    ) -> SecurityEvent {
        let (event, history) = self.append(SecurityEvent::new(category, event_name, ctx, payload));

        if category != ATTACK_CATEGORY
            && self.config.correlate_categories.iter().any(|c| c == category)
        {
            self.correlate(ctx, &history);
        }
        event
    }

    /// Up to `limit` most recent events, newest last.
    pub fn recent_events(&self, limit: usize) -> Vec<SecurityEvent> {
        let mut events = self.load(RECENT_KEY);
        if events.len() > limit {
            events.drain(..events.len() - limit);
        }
        events
    }

    /// Recent events from one client IP, newest last.
    pub fn events_for_ip(&self, client_ip: &str) -> Vec<SecurityEvent> {
        self.load(&ip_key(client_ip))
    }

    /// Aggregate counts over the global buffer.
    pub fn stats(&self) -> EventStats {
        let events = self.load(RECENT_KEY);
        let mut stats = EventStats {
            total_events: events.len(),
            ..Default::default()
        };
        let mut ips = HashSet::new();
        for event in &events {
            *stats.by_severity.entry(event.severity).or_default() += 1;
            *stats.by_category.entry(event.category.clone()).or_default() += 1;
            if event.is_attack_alert() {
                stats.attack_alerts += 1;
            }
            ips.insert(event.client_ip.as_str());
        }
        stats.distinct_client_ips = ips.len();
        stats
    }

    fn ttl(&self) -> Duration {
        Duration::from_secs(self.config.ttl_secs)
    }

    /// Store the event in both buffers and forward it to the sink. Returns
    /// the event and the client's buffer after the append.
    fn append(&self, event: SecurityEvent) -> (SecurityEvent, Vec<SecurityEvent>) {
        let mut history = Vec::new();
        match serde_json::to_value(&event) {
            Ok(value) => {
                if let Err(e) = self.store.append_bounded(
                    RECENT_KEY,
                    value.clone(),
                    self.config.global_capacity,
                    self.ttl(),
                ) {
                    tracing::warn!(error = %e, "failed to append to recent events");
                }
                match self.store.append_bounded(
                    &ip_key(&event.client_ip),
                    value,
                    self.config.per_ip_capacity,
                    self.ttl(),
                ) {
                    Ok(items) => history = parse_events(items),
                    Err(e) => {
                        tracing::warn!(error = %e, client_ip = %event.client_ip, "failed to append to client events")
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to serialize security event"),
        }

        self.sink.emit(&event);
        (event, history)
    }

    fn correlate(&self, ctx: &RequestContext, history: &[SecurityEvent]) {
        let window = &history[history.len().saturating_sub(self.config.correlation_window)..];
        let failures = count_matching(window, LOGIN_FAILURE_EVENTS);
        if failures >= self.config.brute_force_threshold {
            self.alert(ctx, BRUTE_FORCE_ALERT, failures);
        }
        let denials = count_matching(window, DENIAL_EVENTS);
        if denials >= self.config.suspicious_pattern_threshold {
            self.alert(ctx, SUSPICIOUS_PATTERN_ALERT, denials);
        }
    }

    /// Record a derived alert unless one for the same client and pattern was
    /// raised within the cool-down window.
    fn alert(&self, ctx: &RequestContext, alert: &str, count: usize) {
        let key = cooldown_key(&ctx.client_ip, alert);
        match self.store.get(&key) {
            Ok(Some(_)) => {
                tracing::debug!(client_ip = %ctx.client_ip, alert, "alert suppressed during cool-down");
                return;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "failed to read alert cool-down"),
        }

        let cooldown = Duration::from_secs(self.config.alert_cooldown_secs);
        if let Err(e) = self.store.put(&key, Value::Bool(true), cooldown) {
            tracing::warn!(error = %e, "failed to store alert cool-down");
        }

        let mut payload = Map::new();
        payload.insert("matching_events".into(), count.into());
        payload.insert("window".into(), self.config.correlation_window.into());
        self.append(SecurityEvent::new(ATTACK_CATEGORY, alert, ctx, payload));
    }

    fn load(&self, key: &str) -> Vec<SecurityEvent> {
        match self.store.get(key) {
            Ok(Some(Value::Array(items))) => parse_events(items),
            Ok(_) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, key, "failed to read security events");
                Vec::new()
            }
        }
    }
}

fn count_matching(window: &[SecurityEvent], names: &[&str]) -> usize {
    window
        .iter()
        .filter(|e| !e.is_attack_alert() && names.iter().any(|n| *n == e.event_name))
        .count()
}

fn parse_events(items: Vec<Value>) -> Vec<SecurityEvent> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed security event");
                None
            }
        })
        .collect()
}
