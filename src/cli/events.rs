use crate::config::ShieldConfig;
use crate::error::Result;
use crate::events::SecurityEvent;

/// Print recent events, or aggregate stats, from the file-backed log.
pub fn run(config: &ShieldConfig, limit: usize, stats: bool, json: bool) -> Result<()> {
    let log = super::open_event_log(config)?;

    if stats {
        println!("{}", serde_json::to_string_pretty(&log.stats())?);
        return Ok(());
    }

    let events = log.recent_events(limit);
    if json {
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }
    if events.is_empty() {
        println!("No security events recorded.");
        return Ok(());
    }
    for event in &events {
        println!("{}", event_line(event));
    }
    println!("{} event(s)", events.len());
    Ok(())
}

fn event_line(event: &SecurityEvent) -> String {
    let mut line = format!(
        "{} {:<8} {}/{} ip={}",
        event.timestamp.format("%Y-%m-%d %H:%M:%S"),
        event.severity.as_str(),
        event.category,
        event.event_name,
        event.client_ip,
    );
    if let Some(actor) = &event.actor_id {
        line.push_str(&format!(" actor={actor}"));
    }
    if !event.payload.is_empty() {
        line.push(' ');
        line.push_str(&serde_json::Value::Object(event.payload.clone()).to_string());
    }
    line
}
