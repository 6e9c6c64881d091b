use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Observability configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Which observer sinks to construct.  Selection happens once at
/// construction time; the set is not runtime-reconfigurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObserverKind {
    Noop,
    Log,
    Verbose,
    Otel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Sinks to fan out to.  Empty means noop.
    #[serde(default)]
    pub observers: Vec<ObserverKind>,

    #[serde(default)]
    pub otel: OtelSettings,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            observers: Vec::new(),
            otel: OtelSettings::default(),
        }
    }
}

/// OTLP/HTTP span exporter settings.  Every field can be overridden by
/// the standard OTEL environment variables via [`OtelSettings::with_env_overrides`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtelSettings {
    /// Collector endpoint, e.g. `http://localhost:4318/v1/traces`.
    #[serde(default = "d_endpoint")]
    pub endpoint: String,

    #[serde(default = "d_service_name")]
    pub service_name: String,

    #[serde(default = "d_service_version")]
    pub service_version: String,

    /// Extra request headers as comma-separated `k=v` pairs.
    #[serde(default)]
    pub headers: String,

    /// Extra resource attributes as comma-separated `k=v` pairs.
    #[serde(default)]
    pub resource_attributes: String,

    /// Spans buffered before an automatic flush.
    #[serde(default = "d_max_batch")]
    pub max_batch_size: usize,
}

impl Default for OtelSettings {
    fn default() -> Self {
        Self {
            endpoint: d_endpoint(),
            service_name: d_service_name(),
            service_version: d_service_version(),
            headers: String::new(),
            resource_attributes: String::new(),
            max_batch_size: d_max_batch(),
        }
    }
}

impl OtelSettings {
    /// Apply the standard `OTEL_*` environment overrides on top of the
    /// file-configured values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
            self.endpoint = v;
        }
        if let Ok(v) = std::env::var("OTEL_EXPORTER_OTLP_HEADERS") {
            self.headers = v;
        }
        if let Ok(v) = std::env::var("OTEL_SERVICE_NAME") {
            self.service_name = v;
        }
        if let Ok(v) = std::env::var("OTEL_SERVICE_VERSION") {
            self.service_version = v;
        }
        if let Ok(v) = std::env::var("OTEL_RESOURCE_ATTRIBUTES") {
            self.resource_attributes = v;
        }
        self
    }

    /// Parse a comma-separated `k=v` list.  Entries without `=` are
    /// dropped; whitespace around keys and values is trimmed.
    pub fn parse_kv_pairs(raw: &str) -> Vec<(String, String)> {
        raw.split(',')
            .filter_map(|pair| {
                let (k, v) = pair.split_once('=')?;
                let k = k.trim();
                let v = v.trim();
                if k.is_empty() {
                    return None;
                }
                Some((k.to_owned(), v.to_owned()))
            })
            .collect()
    }
}

fn d_endpoint() -> String {
    "http://localhost:4318/v1/traces".into()
}

fn d_service_name() -> String {
    "colloquy".into()
}

fn d_service_version() -> String {
    env!("CARGO_PKG_VERSION").into()
}

fn d_max_batch() -> usize {
    64
}
