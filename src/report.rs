//! Outbound event construction and delivery.
use std::time::Instant;
use thiserror::Error;

use crate::event::{Check, Entity, Event};
use crate::exec::CommandRun;
use crate::output::{trace_line, Trace};

/// Why a group's event did not reach its destination.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("encode event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("POST {endpoint}: {source}")]
    Transport {
        endpoint: String,
        source: ureq::Error,
    },
}

/// Everything a sink needs to deliver one group's event.
pub struct Delivery<'a> {
    pub command_line: &'a str,
    pub event: &'a Event,
    pub json: &'a [u8],
}

/// Destination for generated events. Shared by all group tasks.
pub trait EventSink: Sync {
    fn deliver(&self, delivery: &Delivery<'_>) -> Result<(), ReportError>;
}

/// POSTs each event to the events API. One attempt, no retry.
pub struct HttpSink {
    endpoint: String,
    agent: ureq::Agent,
}

impl HttpSink {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            agent: ureq::Agent::new_with_defaults(),
        }
    }
}

impl EventSink for HttpSink {
    fn deliver(&self, delivery: &Delivery<'_>) -> Result<(), ReportError> {
        let start = Instant::now();
        let response = self
            .agent
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .send(delivery.json)
            .map_err(|source| ReportError::Transport {
                endpoint: self.endpoint.clone(),
                source,
            })?;
        tracing::info!(
            endpoint = %self.endpoint,
            status = response.status().as_u16(),
            bytes = delivery.json.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "event posted"
        );
        Ok(())
    }
}

/// Writes each event to the dry-run trace instead of sending it.
pub struct DryRunSink<'t> {
    endpoint: String,
    trace: &'t Trace,
}

impl<'t> DryRunSink<'t> {
    pub fn new(endpoint: impl Into<String>, trace: &'t Trace) -> Self {
        Self {
            endpoint: endpoint.into(),
            trace,
        }
    }
}

impl EventSink for DryRunSink<'_> {
    fn deliver(&self, delivery: &Delivery<'_>) -> Result<(), ReportError> {
        let check = delivery.event.check.as_ref();
        let trace = self.trace;
        trace_line!(trace, "Event For Command: {}", delivery.command_line);
        trace_line!(
            trace,
            "  Check Name: {}",
            check.map(|check| check.metadata.name.as_str()).unwrap_or_default()
        );
        trace_line!(
            trace,
            "  Check Status: {}",
            check.map(|check| check.status).unwrap_or_default()
        );
        trace_line!(
            trace,
            "  Check Output: {}",
            check.map(|check| check.output.as_str()).unwrap_or_default()
        );
        trace_line!(trace, "  Event API: {}", self.endpoint);
        trace_line!(
            trace,
            "  Event Data: {}",
            String::from_utf8_lossy(delivery.json)
        );
        Ok(())
    }
}

/// Check name of the event generated for `group`.
pub fn check_name(prefix: &str, group: &str) -> String {
    format!("{prefix}{group}")
}

/// Static parts of every outbound event.
pub struct EventTemplate<'a> {
    pub inbound: &'a Event,
    pub check_name_prefix: &'a str,
    pub entity_override: Option<&'a Entity>,
    pub check_override: Option<&'a Check>,
}

impl EventTemplate<'_> {
    /// Copy of the inbound event carrying one group's result.
    pub fn build(&self, group: &str, run: &CommandRun) -> Event {
        let mut event = self.inbound.clone();
        if let Some(entity) = self.entity_override {
            event.entity = Some(entity.clone());
        }
        if let Some(check) = self.check_override {
            event.check = Some(check.clone());
        }
        let check = event.check.get_or_insert_with(Check::default);
        check.metadata.name = check_name(self.check_name_prefix, group);
        check.status = run.status;
        check.output = run.output.clone();
        event
    }
}

/// Build, encode and deliver one group's event.
pub fn report(
    template: &EventTemplate<'_>,
    sink: &dyn EventSink,
    group: &str,
    run: &CommandRun,
) -> Result<(), ReportError> {
    let event = template.build(group, run);
    let json = match serde_json::to_vec(&event) {
        Ok(json) => json,
        Err(err) => {
            tracing::error!(group, error = %err, "create event failed");
            return Err(err.into());
        }
    };
    let delivery = Delivery {
        command_line: &run.command_line,
        event: &event,
        json: &json,
    };
    sink.deliver(&delivery).inspect_err(|err| {
        tracing::error!(group, error = %err, "event delivery failed");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ObjectMeta;
    use crate::output::capture::SharedBuf;

    fn run(status: u32, output: &str) -> CommandRun {
        CommandRun {
            command_line: "probe --timeout 30".to_string(),
            status,
            output: output.to_string(),
            error: None,
        }
    }

    fn inbound() -> Event {
        let raw = r#"{
            "timestamp": 42,
            "entity": {"metadata": {"name": "web-01"}},
            "check": {"metadata": {"name": "multiplex", "annotations": {"acme.io/chk/db/timeout": "30"}},
                      "status": 0, "output": "", "interval": 60}
        }"#;
        serde_json::from_str(raw).expect("decode inbound")
    }

    #[test]
    fn build_overwrites_name_status_and_output_only() {
        let inbound = inbound();
        let template = EventTemplate {
            inbound: &inbound,
            check_name_prefix: "multiplex_",
            entity_override: None,
            check_override: None,
        };
        let event = template.build("db", &run(2, "CRITICAL: db down\n"));
        let check = event.check.as_ref().expect("check");
        assert_eq!(check.metadata.name, "multiplex_db");
        assert_eq!(check.status, 2);
        assert_eq!(check.output, "CRITICAL: db down\n");
        assert_eq!(check.extra["interval"], 60);
        assert_eq!(event.extra["timestamp"], 42);
        assert_eq!(event.entity, inbound.entity);
        // The inbound event stays untouched for the other groups.
        assert_eq!(inbound.check.as_ref().expect("check").metadata.name, "multiplex");
    }

    #[test]
    fn build_applies_overrides_and_creates_missing_check() {
        let inbound = Event::default();
        let entity = Entity {
            metadata: ObjectMeta {
                name: "proxy-db".to_string(),
                ..ObjectMeta::default()
            },
            ..Entity::default()
        };
        let template = EventTemplate {
            inbound: &inbound,
            check_name_prefix: "mx_",
            entity_override: Some(&entity),
            check_override: None,
        };
        let event = template.build("web", &run(0, "ok"));
        assert_eq!(event.entity.as_ref().expect("entity").metadata.name, "proxy-db");
        assert_eq!(event.check.as_ref().expect("check").metadata.name, "mx_web");
    }

    #[test]
    fn dry_run_sink_prints_breakdown() {
        let buf = SharedBuf::default();
        let trace = Trace::to_writer(buf.clone());
        let sink = DryRunSink::new("http://localhost:3031/events", &trace);
        let inbound = inbound();
        let template = EventTemplate {
            inbound: &inbound,
            check_name_prefix: "multiplex_",
            entity_override: None,
            check_override: None,
        };
        report(&template, &sink, "db", &run(1, "WARN")).expect("dry run delivery");
        let text = buf.contents();
        assert!(text.contains("Event For Command: probe --timeout 30"));
        assert!(text.contains("  Check Name: multiplex_db"));
        assert!(text.contains("  Check Status: 1"));
        assert!(text.contains("  Event API: http://localhost:3031/events"));
        assert!(text.contains(r#""name":"multiplex_db""#));
    }

    #[test]
    fn unreachable_endpoint_is_a_transport_error() {
        let sink = HttpSink::new("http://127.0.0.1:1/events");
        let inbound = inbound();
        let template = EventTemplate {
            inbound: &inbound,
            check_name_prefix: "multiplex_",
            entity_override: None,
            check_override: None,
        };
        let err = report(&template, &sink, "db", &run(0, "ok")).expect_err("connection refused");
        assert!(matches!(err, ReportError::Transport { .. }));
        assert!(err.to_string().starts_with("POST http://127.0.0.1:1/events"));
    }
}
