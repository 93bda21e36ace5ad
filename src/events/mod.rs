pub mod classify;
pub mod log;
pub mod sink;

pub use classify::classify;
pub use log::SecurityEventLog;
pub use sink::{EventSink, TracingSink};

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Category under which correlation alerts are recorded.
pub const ATTACK_CATEGORY: &str = "attack_detection";

/// Event severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who made the request that produced an event. Passed explicitly to every
/// logging call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub client_ip: String,
    pub user_agent: String,
    pub actor_id: Option<String>,
    pub request_url: String,
    pub request_method: String,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            client_ip: "unknown".into(),
            user_agent: String::new(),
            actor_id: None,
            request_url: String::new(),
            request_method: String::new(),
        }
    }
}

impl RequestContext {
    pub fn new(client_ip: impl Into<String>) -> Self {
        Self {
            client_ip: client_ip.into(),
            ..Self::default()
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    pub fn with_request(mut self, method: impl Into<String>, url: impl Into<String>) -> Self {
        self.request_method = method.into();
        self.request_url = url.into();
        self
    }
}

/// A notable security condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub category: String,
    pub event_name: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    pub client_ip: String,
    pub user_agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    pub request_url: String,
    pub request_method: String,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl SecurityEvent {
    /// Build an event stamped now, with severity from the classification table.
    pub fn new(
        category: &str,
        event_name: &str,
        ctx: &RequestContext,
        payload: Map<String, Value>,
    ) -> Self {
        Self {
            category: category.to_string(),
            event_name: event_name.to_string(),
            severity: classify(category, event_name),
            timestamp: Utc::now(),
            client_ip: ctx.client_ip.clone(),
            user_agent: ctx.user_agent.clone(),
            actor_id: ctx.actor_id.clone(),
            request_url: ctx.request_url.clone(),
            request_method: ctx.request_method.clone(),
            payload,
        }
    }

    pub fn is_attack_alert(&self) -> bool {
        self.category == ATTACK_CATEGORY
    }
}

/// Aggregate counts over the global recent-events buffer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventStats {
    pub total_events: usize,
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_category: BTreeMap<String, usize>,
    pub distinct_client_ips: usize,
    pub attack_alerts: usize,
}

/// Build a payload map from `(key, value)` pairs.
pub fn payload<I, K, V>(pairs: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
