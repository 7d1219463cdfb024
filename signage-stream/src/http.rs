//! HTTP pull source

use std::time::Duration;

use async_trait::async_trait;
use signage_model::{DisplaySlug, FullState};
use tracing::debug;

use crate::error::Result;
use crate::transport::{join_url, StateSource};

/// Pulls `GET {server_url}/api/displays/{slug}/state`
#[derive(Debug, Clone)]
pub struct HttpStateSource {
    client: reqwest::Client,
    server_url: String,
}

impl HttpStateSource {
    pub fn new(server_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let server_url = server_url.into();
        url::Url::parse(&server_url)?;
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self { client, server_url })
    }

    pub fn state_url(&self, slug: &DisplaySlug) -> Result<url::Url> {
        join_url(&self.server_url, &format!("api/displays/{}/state", slug))
    }
}

#[async_trait]
impl StateSource for HttpStateSource {
    async fn fetch(&self, slug: &DisplaySlug) -> Result<FullState> {
        let url = self.state_url(slug)?;
        debug!("Pulling state from {}", url);

        let response = self.client.get(url).send().await?.error_for_status()?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}
