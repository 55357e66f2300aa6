use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// A slug-to-URL mapping as persisted in the key-value store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub slug: String,
    pub url: String,
    /// Unix seconds; never changes after creation
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Link {
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(chrono::Utc::now().timestamp())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateLinkRequest {
    /// Explicit slug; generated when omitted
    pub slug: Option<String>,
    #[serde(alias = "target_url")]
    pub url: String,
    pub expires_at: Option<i64>,
    pub comment: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Partial update; `Some(None)` (an explicit JSON `null`) clears a field
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateLinkRequest {
    #[serde(alias = "target_url")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub expires_at: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub comment: Option<Option<String>>,
    pub metadata: Option<BTreeMap<String, String>>,
}

/// Distinguish a present `null` from a missing field
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub cursor: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkPage {
    pub links: Vec<Link>,
    /// Opaque cursor for the next page
    pub cursor: Option<String>,
    pub list_complete: bool,
}
