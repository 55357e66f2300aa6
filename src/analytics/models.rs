//! Data models for analytics

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// One resolved redirect, as handed to the analytics sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    /// Slug that was accessed
    pub slug: String,

    /// Target the visitor was sent to
    pub url: String,

    /// Unix timestamp of the visit
    pub timestamp: i64,

    pub referrer: Option<String>,

    pub user_agent: Option<String>,

    /// SHA-256 of the client IP
    pub ip_hash: Option<String>,

    /// ISO country code, best effort
    pub country: Option<String>,

    pub is_bot: bool,
}

/// Raw request details for a redirect, before bot detection and hashing
#[derive(Debug, Clone, Default)]
pub struct Visit {
    pub slug: String,
    pub url: String,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub ip: Option<IpAddr>,
    pub country: Option<String>,
}
