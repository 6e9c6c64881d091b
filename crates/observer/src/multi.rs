//! Fan-out to several observer sinks.

use std::sync::Arc;

use cq_domain::observe::{ObserverEvent, ObserverMetric};

use crate::Observer;

/// Fans every record out to a fixed list of sinks.  The list is set at
/// construction and never changes.
pub struct MultiObserver {
    sinks: Vec<Arc<dyn Observer>>,
}

impl MultiObserver {
    pub fn new(sinks: Vec<Arc<dyn Observer>>) -> Self {
        Self { sinks }
    }
}

impl Observer for MultiObserver {
    fn record_event(&self, event: &ObserverEvent) {
        for sink in &self.sinks {
            sink.record_event(event);
        }
    }

    fn record_metric(&self, metric: ObserverMetric, value: f64) {
        for sink in &self.sinks {
            sink.record_metric(metric, value);
        }
    }

    fn flush(&self) {
        for sink in &self.sinks {
            sink.flush();
        }
    }

    fn name(&self) -> &'static str {
        "multi"
    }
}
