//! Batching OTLP/HTTP span exporter.
//!
//! Every observer event becomes one single-point span (start == end ==
//! now) with fresh random trace and span ids.  Spans buffer in memory
//! and flush as an OTLP/HTTP JSON `resourceSpans` payload when the
//! batch fills, on [`Observer::flush`], and on drop.  Export failures
//! are logged and the batch is cleared either way.
//!
//! Metric export is deliberately absent; the slot is reserved for a
//! future OTLP metrics endpoint.

use parking_lot::Mutex;
use serde_json::{json, Value};

use cq_domain::config::OtelSettings;
use cq_domain::observe::{ObserverEvent, ObserverMetric};

use crate::Observer;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Span model
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A typed attribute value, mirroring the OTLP `AnyValue` subset used here.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Str(String),
    Int(i64),
    Double(f64),
    Bool(bool),
}

impl AttrValue {
    fn to_otlp(&self) -> Value {
        match self {
            AttrValue::Str(s) => json!({ "stringValue": s }),
            AttrValue::Int(i) => json!({ "intValue": i.to_string() }),
            AttrValue::Double(d) => json!({ "doubleValue": d }),
            AttrValue::Bool(b) => json!({ "boolValue": b }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpanStatus {
    Unset,
    Ok,
    Error(Option<String>),
}

impl SpanStatus {
    fn code(&self) -> u8 {
        match self {
            SpanStatus::Unset => 0,
            SpanStatus::Ok => 1,
            SpanStatus::Error(_) => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Span {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub name: String,
    /// OTLP span kind; always `SPAN_KIND_INTERNAL` here.
    pub kind: u8,
    pub start_unix_nano: i64,
    pub end_unix_nano: i64,
    pub attributes: Vec<(String, AttrValue)>,
    pub status: SpanStatus,
}

const SPAN_KIND_INTERNAL: u8 = 1;

/// 16 random bytes, hex.
fn new_trace_id() -> String {
    hex::encode(uuid::Uuid::new_v4().as_bytes())
}

/// 8 random bytes, hex.
fn new_span_id() -> String {
    hex::encode(&uuid::Uuid::new_v4().as_bytes()[..8])
}

fn now_unix_nano() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Event → span materialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn span_from_event(event: &ObserverEvent) -> Span {
    let mut attributes: Vec<(String, AttrValue)> = Vec::new();
    let mut status = SpanStatus::Unset;

    match event {
        ObserverEvent::AgentStart { provider, model } => {
            attributes.push(("llm.provider".into(), AttrValue::Str(provider.clone())));
            attributes.push(("llm.model".into(), AttrValue::Str(model.clone())));
        }
        ObserverEvent::LlmRequest {
            provider,
            model,
            message_count,
        } => {
            attributes.push(("llm.provider".into(), AttrValue::Str(provider.clone())));
            attributes.push(("llm.model".into(), AttrValue::Str(model.clone())));
            attributes.push((
                "llm.message_count".into(),
                AttrValue::Int(*message_count as i64),
            ));
        }
        ObserverEvent::LlmResponse {
            provider,
            model,
            duration_ms,
            success,
            error,
        } => {
            attributes.push(("llm.provider".into(), AttrValue::Str(provider.clone())));
            attributes.push(("llm.model".into(), AttrValue::Str(model.clone())));
            attributes.push(("duration_ms".into(), AttrValue::Int(*duration_ms as i64)));
            attributes.push(("success".into(), AttrValue::Bool(*success)));
            status = if *success {
                SpanStatus::Ok
            } else {
                SpanStatus::Error(error.clone())
            };
        }
        ObserverEvent::AgentEnd {
            duration_ms,
            tokens_used,
        } => {
            attributes.push(("duration_ms".into(), AttrValue::Int(*duration_ms as i64)));
            if let Some(tokens) = tokens_used {
                attributes.push(("llm.tokens_used".into(), AttrValue::Int(*tokens as i64)));
            }
        }
        ObserverEvent::ToolCallStart { tool } => {
            attributes.push(("tool.name".into(), AttrValue::Str(tool.clone())));
        }
        ObserverEvent::ToolCall {
            tool,
            duration_ms,
            success,
        } => {
            attributes.push(("tool.name".into(), AttrValue::Str(tool.clone())));
            attributes.push(("duration_ms".into(), AttrValue::Int(*duration_ms as i64)));
            attributes.push(("success".into(), AttrValue::Bool(*success)));
            status = if *success {
                SpanStatus::Ok
            } else {
                SpanStatus::Error(None)
            };
        }
        ObserverEvent::TurnComplete => {}
        ObserverEvent::ChannelMessage { channel, direction } => {
            attributes.push(("channel.name".into(), AttrValue::Str(channel.clone())));
            attributes.push((
                "channel.direction".into(),
                AttrValue::Str(format!("{direction:?}").to_lowercase()),
            ));
        }
    }

    let now = now_unix_nano();
    Span {
        trace_id: new_trace_id(),
        span_id: new_span_id(),
        parent_span_id: None,
        name: event.span_name().to_owned(),
        kind: SPAN_KIND_INTERNAL,
        start_unix_nano: now,
        end_unix_nano: now,
        attributes,
        status,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// OTLP JSON payload
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn attr_list(attrs: &[(String, AttrValue)]) -> Value {
    Value::Array(
        attrs
            .iter()
            .map(|(k, v)| json!({ "key": k, "value": v.to_otlp() }))
            .collect(),
    )
}

fn span_to_otlp(span: &Span) -> Value {
    let mut status = json!({ "code": span.status.code() });
    if let SpanStatus::Error(Some(message)) = &span.status {
        status["message"] = Value::String(message.clone());
    }

    let mut out = json!({
        "traceId": span.trace_id,
        "spanId": span.span_id,
        "name": span.name,
        "kind": span.kind,
        // OTLP/JSON carries 64-bit nanos as decimal strings.
        "startTimeUnixNano": span.start_unix_nano.to_string(),
        "endTimeUnixNano": span.end_unix_nano.to_string(),
        "attributes": attr_list(&span.attributes),
        "status": status,
    });
    if let Some(parent) = &span.parent_span_id {
        out["parentSpanId"] = Value::String(parent.clone());
    }
    out
}

fn build_payload(settings: &OtelSettings, spans: &[Span]) -> Value {
    let mut resource_attrs: Vec<(String, AttrValue)> = vec![
        (
            "service.name".into(),
            AttrValue::Str(settings.service_name.clone()),
        ),
        (
            "service.version".into(),
            AttrValue::Str(settings.service_version.clone()),
        ),
    ];
    for (k, v) in OtelSettings::parse_kv_pairs(&settings.resource_attributes) {
        resource_attrs.push((k, AttrValue::Str(v)));
    }

    json!({
        "resourceSpans": [{
            "resource": { "attributes": attr_list(&resource_attrs) },
            "scopeSpans": [{
                "scope": {
                    "name": "cq-observer",
                    "version": env!("CARGO_PKG_VERSION"),
                },
                "spans": spans.iter().map(span_to_otlp).collect::<Vec<_>>(),
            }],
        }],
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Exporter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Batching span exporter speaking OTLP/HTTP JSON.
pub struct OtelObserver {
    settings: OtelSettings,
    client: reqwest::Client,
    buffer: Mutex<Vec<Span>>,
}

impl OtelObserver {
    pub fn new(settings: OtelSettings) -> Self {
        Self {
            settings,
            client: reqwest::Client::new(),
            buffer: Mutex::new(Vec::new()),
        }
    }

    /// Drain the buffer and ship it.  The POST runs on a spawned task;
    /// callers never wait on the collector.
    fn export(&self) {
        let spans: Vec<Span> = std::mem::take(&mut *self.buffer.lock());
        if spans.is_empty() {
            return;
        }

        let payload = build_payload(&self.settings, &spans);
        let endpoint = self.settings.endpoint.clone();
        let headers = OtelSettings::parse_kv_pairs(&self.settings.headers);
        let client = self.client.clone();
        let count = spans.len();

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(spans = count, "no async runtime; dropping span batch");
            return;
        };

        handle.spawn(async move {
            let mut req = client.post(&endpoint).json(&payload);
            for (k, v) in &headers {
                req = req.header(k, v);
            }
            match req.send().await {
                Ok(resp) if resp.status().is_success() => {
                    tracing::debug!(spans = count, "exported span batch");
                }
                Ok(resp) => {
                    tracing::warn!(
                        status = resp.status().as_u16(),
                        spans = count,
                        "collector rejected span batch"
                    );
                }
                Err(e) => {
                    tracing::warn!(error = %e, spans = count, "span export failed");
                }
            }
        });
    }

    #[cfg(test)]
    fn buffered(&self) -> usize {
        self.buffer.lock().len()
    }
}

impl Observer for OtelObserver {
    fn record_event(&self, event: &ObserverEvent) {
        let span = span_from_event(event);
        let should_flush = {
            let mut buf = self.buffer.lock();
            buf.push(span);
            buf.len() >= self.settings.max_batch_size
        };
        if should_flush {
            self.export();
        }
    }

    fn record_metric(&self, _metric: ObserverMetric, _value: f64) {
        // Reserved for a future OTLP metrics endpoint.
    }

    fn flush(&self) {
        self.export();
    }

    fn name(&self) -> &'static str {
        "otel"
    }
}

impl Drop for OtelObserver {
    fn drop(&mut self) {
        self.export();
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
