use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Ingestion pipeline configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IngestConfig {
    /// Remote endpoint returning a JSON array of posts.
    /// TOML: `ingest.endpoint`. Default: `https://jsonplaceholder.typicode.com/posts`.
    #[serde(default = "default_endpoint")]
    pub endpoint: Url,

    /// Optional upstream HTTP proxy. If set, used for the reqwest client.
    /// TOML: `ingest.proxy`. Example: `http://127.0.0.1:1080`.
    #[serde(default)]
    pub proxy: Option<Url>,

    /// Allow HTTP/2 multiplexing for the reqwest client; disabled forces HTTP/1.
    /// TOML: `ingest.enable_multiplexing`. Default: `false`.
    #[serde(default)]
    pub enable_multiplexing: bool,

    /// TOML: `ingest.connect_timeout_secs`. Default: `5`.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Whole-request timeout, body included.
    /// TOML: `ingest.request_timeout_secs`. Default: `30`.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Number of synthetic progress ticks emitted per fetch.
    /// TOML: `ingest.progress_steps`. Default: `5`.
    #[serde(default = "default_progress_steps")]
    pub progress_steps: u32,

    /// Delay before each progress tick, in milliseconds.
    /// TOML: `ingest.progress_tick_ms`. Default: `500`.
    #[serde(default = "default_progress_tick_ms")]
    pub progress_tick_ms: u64,

    /// Pause after each persisted record, in milliseconds.
    /// TOML: `ingest.save_pacing_ms`. Default: `100`.
    #[serde(default = "default_save_pacing_ms")]
    pub save_pacing_ms: u64,

    /// Period of the background trigger, in seconds.
    /// TOML: `ingest.trigger_interval_secs`. Default: `10`.
    #[serde(default = "default_trigger_interval_secs")]
    pub trigger_interval_secs: u64,

    /// Buffer size of the cycle event channel; slow subscribers past this lag.
    /// TOML: `ingest.event_capacity`. Default: `64`.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl IngestConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn progress_tick(&self) -> Duration {
        Duration::from_millis(self.progress_tick_ms)
    }

    pub fn save_pacing(&self) -> Duration {
        Duration::from_millis(self.save_pacing_ms)
    }

    pub fn trigger_interval(&self) -> Duration {
        Duration::from_secs(self.trigger_interval_secs)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            proxy: None,
            enable_multiplexing: false,
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            progress_steps: default_progress_steps(),
            progress_tick_ms: default_progress_tick_ms(),
            save_pacing_ms: default_save_pacing_ms(),
            trigger_interval_secs: default_trigger_interval_secs(),
            event_capacity: default_event_capacity(),
        }
    }
}

fn default_endpoint() -> Url {
    Url::parse("https://jsonplaceholder.typicode.com/posts").expect("valid default endpoint URL")
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_progress_steps() -> u32 {
    5
}

fn default_progress_tick_ms() -> u64 {
    500
}

fn default_save_pacing_ms() -> u64 {
    100
}

fn default_trigger_interval_secs() -> u64 {
    10
}

fn default_event_capacity() -> usize {
    64
}
