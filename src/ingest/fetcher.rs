use crate::config::IngestConfig;
use crate::db::Post;
use crate::error::FetchError;
use crate::utils::logging::{body_preview, with_pretty_json_debug};
use async_trait::async_trait;
use reqwest::header::{CONNECTION, HeaderMap, HeaderValue};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

pub const POSTSYNC_USER_AGENT: &str = concat!("postsync/", env!("CARGO_PKG_VERSION"));

/// Progress callback handed to a fetch. Fire-and-forget; must not block.
pub type ProgressFn<'a> = &'a (dyn Fn(u8) + Send + Sync);

/// One remote retrieval of the full record list.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, progress: ProgressFn<'_>) -> Result<Vec<Post>, FetchError>;
}

/// `floor(step / total * 100)`, computed in integers.
pub fn progress_value(step: u32, total: u32) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = u64::from(step.min(total)) * 100 / u64::from(total);
    u8::try_from(pct).unwrap_or(100)
}

/// GETs the configured endpoint and decodes a JSON array of posts.
///
/// Once the upstream answers with a 2xx status, `steps` progress ticks are emitted,
/// each after a `tick` delay, before the body is read and decoded.
pub struct HttpFetcher {
    client: reqwest::Client,
    endpoint: Url,
    steps: u32,
    tick: Duration,
}

impl HttpFetcher {
    pub fn new(cfg: &IngestConfig) -> Result<Self, FetchError> {
        let client = build_client(cfg)?;
        Ok(Self::with_client(client, cfg))
    }

    pub fn with_client(client: reqwest::Client, cfg: &IngestConfig) -> Self {
        Self {
            client,
            endpoint: cfg.endpoint.clone(),
            steps: cfg.progress_steps,
            tick: cfg.progress_tick(),
        }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, progress: ProgressFn<'_>) -> Result<Vec<Post>, FetchError> {
        let resp = self.client.get(self.endpoint.clone()).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = match resp.bytes().await {
                Ok(bytes) => body_preview(&bytes),
                Err(e) => format!("<failed to read body: {e}>"),
            };
            debug!(
                %status,
                url = %self.endpoint,
                body = %body,
                "Upstream returned non-success status"
            );
            return Err(FetchError::UpstreamStatus(status));
        }

        for step in 1..=self.steps {
            tokio::time::sleep(self.tick).await;
            progress(progress_value(step, self.steps));
        }

        let bytes = resp.bytes().await?;
        let posts: Vec<Post> = serde_json::from_slice(&bytes).inspect_err(|e| {
            debug!(
                error = %e,
                body = %body_preview(&bytes),
                "Upstream payload did not decode as a post list"
            );
        })?;

        with_pretty_json_debug(&posts, |json| debug!("Decoded posts:\n{json}"));
        info!(url = %self.endpoint, count = posts.len(), "Fetched posts");
        Ok(posts)
    }
}

fn build_client(cfg: &IngestConfig) -> Result<reqwest::Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    let mut builder = reqwest::Client::builder()
        .user_agent(POSTSYNC_USER_AGENT)
        .connect_timeout(cfg.connect_timeout())
        .timeout(cfg.request_timeout());

    if let Some(proxy_url) = cfg.proxy.clone() {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
    }

    if !cfg.enable_multiplexing {
        headers.insert(CONNECTION, HeaderValue::from_static("close"));

        builder = builder
            .http1_only()
            .pool_max_idle_per_host(0)
            .pool_idle_timeout(Duration::from_secs(0));
    } else {
        builder = builder.http2_adaptive_window(true);
    }

    builder.default_headers(headers).build()
}
