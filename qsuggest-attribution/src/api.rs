use anyhow::Result;
use async_trait::async_trait;

pub const HTTP_ATTRIBUTION_ROUTE: &str = "/attribution";

/// Query parameter marking a request as a read of the counter rather than an attribution.
pub const IGNORE_PARAM: &str = "ignore";

#[async_trait]
pub trait AttributionApi: Send + Sync {
    /// Number of attributed requests seen so far.
    async fn hits(&self) -> Result<u64>;
}
