use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::api::{AttributionApi, HTTP_ATTRIBUTION_ROUTE, IGNORE_PARAM};

pub struct AttributionClient {
    endpoint: String,
    http: reqwest::Client,
}

impl AttributionClient {
    pub fn new(endpoint: String) -> AttributionClient {
        AttributionClient {
            endpoint,
            http: reqwest::Client::new(),
        }
    }

    /// URL the browser should ping when a sponsored suggestion is picked.
    pub fn attribution_url(&self) -> String {
        format!("{}{}?", self.endpoint, HTTP_ATTRIBUTION_ROUTE)
    }
}

#[async_trait]
impl AttributionApi for AttributionClient {
    async fn hits(&self) -> Result<u64> {
        let url = format!(
            "{}{}?{}=true",
            self.endpoint, HTTP_ATTRIBUTION_ROUTE, IGNORE_PARAM
        );
        let body = self
            .http
            .get(url)
            .send()
            .await
            .context("attribution hits request")?
            .error_for_status()
            .context("attribution hits status")?
            .text()
            .await
            .context("attribution hits response")?;
        body.trim()
            .parse()
            .with_context(|| format!("attribution hits response is not a number: {body:?}"))
    }
}
