use axum::http::StatusCode;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use crate::config::RedirectStatus;
use crate::error::{LinkError, LinkResult};
use crate::models::Link;
use crate::slug::SlugCodec;
use crate::storage::LinkCache;

/// Where to send a visitor
#[derive(Debug, Clone)]
pub struct Resolution {
    pub link: Link,
    pub location: String,
    pub status: StatusCode,
    pub cache_hit: bool,
}

/// Turns a requested slug into a redirect target
pub struct LinkResolver {
    cache: Arc<LinkCache>,
    codec: SlugCodec,
    status: RedirectStatus,
    redirect_with_query: bool,
}

impl LinkResolver {
    pub fn new(
        cache: Arc<LinkCache>,
        codec: SlugCodec,
        status: RedirectStatus,
        redirect_with_query: bool,
    ) -> Self {
        Self {
            cache,
            codec,
            status,
            redirect_with_query,
        }
    }

    pub fn cache(&self) -> &Arc<LinkCache> {
        &self.cache
    }

    /// Resolve `raw_slug`; `query` is the raw query string of the request, if any.
    ///
    /// Malformed slugs and expired links both resolve to [`LinkError::NotFound`].
    pub async fn resolve(&self, raw_slug: &str, query: Option<&str>) -> LinkResult<Resolution> {
        let slug = match self.codec.normalize(raw_slug) {
            Ok(slug) => slug,
            Err(err) => {
                debug!(slug = %raw_slug, error = %err, "rejecting malformed slug");
                return Err(LinkError::NotFound);
            }
        };

        let lookup = self.cache.resolve(&slug).await?;
        let link = lookup.link.ok_or(LinkError::NotFound)?;

        if link.is_expired() {
            debug!(slug = %slug, "link expired");
            self.purge_expired(slug);
            return Err(LinkError::NotFound);
        }

        let location = match query {
            Some(query) if self.redirect_with_query && !query.is_empty() => {
                append_query(&link.url, query)
            }
            _ => link.url.clone(),
        };

        Ok(Resolution {
            link,
            location,
            status: self.status.status_code(),
            cache_hit: lookup.cache_hit,
        })
    }

    /// Delete an expired link in the background; the visitor is not kept waiting
    fn purge_expired(&self, slug: String) {
        let cache = Arc::clone(&self.cache);
        tokio::spawn(async move {
            let links = cache.store();
            // Only delete when the stored record is still the expired one
            match links.get(&slug).await {
                Ok(Some(current)) if current.is_expired() => {
                    if let Err(err) = links.delete(&slug).await {
                        warn!(slug = %slug, error = %err, "failed to delete expired link");
                        return;
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(slug = %slug, error = %err, "failed to check expired link");
                    return;
                }
            }
            cache.invalidate(&slug);
        });
    }
}

/// Merge `query` into the query component of `url`, keeping any fragment last
fn append_query(url: &str, query: &str) -> String {
    let Ok(mut target) = Url::parse(url) else {
        return url.to_string();
    };
    let merged = match target.query().filter(|existing| !existing.is_empty()) {
        Some(existing) => format!("{existing}&{query}"),
        None => query.to_string(),
    };
    target.set_query(Some(&merged));
    target.into()
}
