//! Observer sinks for runtime events and metrics.
//!
//! The runtime records [`ObserverEvent`]s and [`ObserverMetric`]s through
//! the [`Observer`] trait without knowing where they go.  Implementations
//! must be internally thread-safe and must swallow their own failures —
//! a broken exporter may never break an agent run.

mod log;
mod multi;
mod otel;

pub use crate::log::{LogObserver, VerboseObserver};
pub use crate::multi::MultiObserver;
pub use crate::otel::OtelObserver;

use std::sync::Arc;

use cq_domain::config::{ObservabilityConfig, ObserverKind};
use cq_domain::observe::{ObserverEvent, ObserverMetric};

/// A polymorphic sink for structured events and metrics.
pub trait Observer: Send + Sync {
    fn record_event(&self, event: &ObserverEvent);
    fn record_metric(&self, metric: ObserverMetric, value: f64);
    /// Push any buffered data out.  Must not error.
    fn flush(&self);
    fn name(&self) -> &'static str;
}

/// Discards everything.  The zero-cost default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn record_event(&self, _event: &ObserverEvent) {}
    fn record_metric(&self, _metric: ObserverMetric, _value: f64) {}
    fn flush(&self) {}
    fn name(&self) -> &'static str {
        "noop"
    }
}

/// Construct the configured observer stack.
///
/// Zero kinds yields a noop, one kind yields that sink directly, and
/// several kinds yield a [`MultiObserver`] fan-out.
pub fn from_config(cfg: &ObservabilityConfig) -> Arc<dyn Observer> {
    let mut sinks: Vec<Arc<dyn Observer>> = Vec::new();
    for kind in &cfg.observers {
        match kind {
            ObserverKind::Noop => {}
            ObserverKind::Log => sinks.push(Arc::new(LogObserver)),
            ObserverKind::Verbose => sinks.push(Arc::new(VerboseObserver)),
            ObserverKind::Otel => sinks.push(Arc::new(OtelObserver::new(
                cfg.otel.clone().with_env_overrides(),
            ))),
        }
    }
    match sinks.len() {
        0 => Arc::new(NoopObserver),
        1 => sinks.remove(0),
        _ => Arc::new(MultiObserver::new(sinks)),
    }
}
