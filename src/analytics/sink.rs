use anyhow::Result;
use async_trait::async_trait;

use super::models::AnalyticsEvent;

/// Destination for access events (database table, log pipeline, ...)
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn write(&self, event: &AnalyticsEvent) -> Result<()>;
}

/// Emits each event as a structured log line under the `access_log` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl AnalyticsSink for TracingSink {
    async fn write(&self, event: &AnalyticsEvent) -> Result<()> {
        tracing::info!(
            target: "access_log",
            slug = %event.slug,
            url = %event.url,
            timestamp = event.timestamp,
            referrer = event.referrer.as_deref().unwrap_or(""),
            user_agent = event.user_agent.as_deref().unwrap_or(""),
            ip_hash = event.ip_hash.as_deref().unwrap_or(""),
            country = event.country.as_deref().unwrap_or(""),
            is_bot = event.is_bot,
            "access"
        );
        Ok(())
    }
}
