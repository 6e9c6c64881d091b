//! Text-oriented observer sinks.

use cq_domain::observe::{Direction, ObserverEvent, ObserverMetric};

use crate::Observer;

/// Emits each event as a structured tracing record.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn record_event(&self, event: &ObserverEvent) {
        let json = serde_json::to_string(event).unwrap_or_default();
        tracing::info!(observer_event = %json, "colloquy_event");
    }

    fn record_metric(&self, metric: ObserverMetric, value: f64) {
        tracing::info!(metric = metric.name(), value, "colloquy_metric");
    }

    fn flush(&self) {}

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Human-oriented CLI sink: one arrow line per event on stderr, so it
/// never interleaves with streamed assistant output on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct VerboseObserver;

impl Observer for VerboseObserver {
    fn record_event(&self, event: &ObserverEvent) {
        match event {
            ObserverEvent::AgentStart { provider, model } => {
                eprintln!("\u{2192} agent start [{provider}/{model}]");
            }
            ObserverEvent::LlmRequest {
                provider,
                message_count,
                ..
            } => {
                eprintln!("\u{2192} llm request [{provider}] ({message_count} messages)");
            }
            ObserverEvent::LlmResponse {
                provider,
                duration_ms,
                success,
                error,
                ..
            } => {
                if *success {
                    eprintln!("\u{2190} llm response [{provider}] {duration_ms}ms");
                } else {
                    let msg = error.as_deref().unwrap_or("unknown error");
                    eprintln!("\u{2190} llm error [{provider}] {duration_ms}ms: {msg}");
                }
            }
            ObserverEvent::ToolCallStart { tool } => {
                eprintln!("\u{2192} tool {tool}");
            }
            ObserverEvent::ToolCall {
                tool,
                duration_ms,
                success,
            } => {
                let mark = if *success { "ok" } else { "failed" };
                eprintln!("\u{2190} tool {tool} {mark} {duration_ms}ms");
            }
            ObserverEvent::AgentEnd {
                duration_ms,
                tokens_used,
            } => match tokens_used {
                Some(tokens) => {
                    eprintln!("\u{2190} agent end {duration_ms}ms ({tokens} tokens)");
                }
                None => eprintln!("\u{2190} agent end {duration_ms}ms"),
            },
            ObserverEvent::TurnComplete => eprintln!("\u{2500} turn complete"),
            ObserverEvent::ChannelMessage { channel, direction } => {
                let arrow = match direction {
                    Direction::Inbound => "\u{2192}",
                    Direction::Outbound => "\u{2190}",
                };
                eprintln!("{arrow} channel {channel}");
            }
        }
    }

    fn record_metric(&self, metric: ObserverMetric, value: f64) {
        eprintln!("\u{2500} {} = {value}", metric.name());
    }

    fn flush(&self) {}

    fn name(&self) -> &'static str {
        "verbose"
    }
}
