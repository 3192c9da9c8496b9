use crate::feeds::alert::AlertsResponse;
use crate::feeds::environment::Environment;
use crate::tiles::planner::TileBox;
use crate::{Error, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::StatusCode;
use serde_json::Value;

/// Shared async HTTP client for every feed the crate talks to
pub(crate) static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent(concat!("hazardmap/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(20))
        .tcp_keepalive(std::time::Duration::from_secs(30))
        .pool_idle_timeout(std::time::Duration::from_secs(90))
        .build()
        .expect("failed to build reqwest async client")
});

/// Anything that can answer one bounding-box alert query.
///
/// Implementations return the raw `alerts` entries; validation happens in
/// the orchestrator so every source gets the same skip-malformed behaviour.
#[async_trait]
pub trait AlertSource: Send + Sync {
    async fn fetch_alerts(&self, env: Environment, bbox: &TileBox) -> Result<Vec<Value>>;
}

/// Alert feed reached over HTTP GET
#[derive(Debug, Clone)]
pub struct HttpAlertSource {
    base_url: String,
}

impl HttpAlertSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Query parameters for one box, in the order the feed documents them
    pub fn query_params(env: Environment, bbox: &TileBox) -> [(&'static str, String); 5] {
        [
            ("env", env.tag().to_string()),
            ("top", bbox.top.to_string()),
            ("bottom", bbox.bottom.to_string()),
            ("left", bbox.left.to_string()),
            ("right", bbox.right.to_string()),
        ]
    }
}

/// Maps a response status onto the crate's error taxonomy.
pub(crate) fn check_status(response: &reqwest::Response) -> Result<()> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        return Err(Error::RateLimited { retry_after });
    }
    if !status.is_success() {
        return Err(Error::Http {
            status: status.as_u16(),
        });
    }
    Ok(())
}

#[async_trait]
impl AlertSource for HttpAlertSource {
    async fn fetch_alerts(&self, env: Environment, bbox: &TileBox) -> Result<Vec<Value>> {
        log::debug!("querying alert feed env={} box={:?}", env, bbox);
        let response = HTTP_CLIENT
            .get(&self.base_url)
            .query(&Self::query_params(env, bbox))
            .send()
            .await?;
        check_status(&response)?;

        let body: AlertsResponse = response.json().await?;
        Ok(body.alerts)
    }
}
