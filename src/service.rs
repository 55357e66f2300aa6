//! Link management shared by the HTTP API and the admin CLI

use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use crate::cursor::{CursorCodec, CursorData};
use crate::error::{LinkError, LinkResult};
use crate::models::{CreateLinkRequest, Link, LinkPage, ListQuery, UpdateLinkRequest};
use crate::pagination::QueryLimiter;
use crate::slug::{SlugCodec, SlugGenerator};
use crate::storage::{LinkCache, LinkStore};

/// Page size when the caller does not ask for one
pub const DEFAULT_LIST_LIMIT: usize = 20;

/// Generated slugs can lose the race to a concurrent writer between the
/// availability check and the insert; draw again this many times
const GENERATED_INSERT_ATTEMPTS: usize = 3;

pub struct LinkService {
    links: Arc<LinkStore>,
    cache: Arc<LinkCache>,
    codec: SlugCodec,
    generator: SlugGenerator,
    limiter: QueryLimiter,
    cursors: CursorCodec,
}

impl LinkService {
    pub fn new(
        cache: Arc<LinkCache>,
        codec: SlugCodec,
        generator: SlugGenerator,
        limiter: QueryLimiter,
        cursors: CursorCodec,
    ) -> Self {
        Self {
            links: Arc::clone(cache.store()),
            cache,
            codec,
            generator,
            limiter,
            cursors,
        }
    }

    pub fn codec(&self) -> &SlugCodec {
        &self.codec
    }

    /// Create a link under the requested slug, or a generated one
    pub async fn create(&self, request: CreateLinkRequest) -> LinkResult<Link> {
        let url = validate_url(&request.url)?;
        let now = chrono::Utc::now().timestamp();
        let mut link = Link {
            slug: String::new(),
            url,
            created_at: now,
            updated_at: now,
            expires_at: request.expires_at,
            comment: request.comment,
            metadata: request.metadata,
        };

        match request.slug.as_deref() {
            Some(raw) => {
                link.slug = self.codec.normalize(raw)?;
                if !self.links.insert(&link).await? {
                    return Err(LinkError::SlugCollision(link.slug));
                }
            }
            None => self.insert_generated(&mut link).await?,
        }

        info!(slug = %link.slug, url = %link.url, "link created");
        self.cache.prime(&link.slug, link.clone());
        Ok(link)
    }

    async fn insert_generated(&self, link: &mut Link) -> LinkResult<()> {
        for attempt in 1..=GENERATED_INSERT_ATTEMPTS {
            link.slug = self.generator.generate(None).await?;
            if self.links.insert(link).await? {
                return Ok(());
            }
            debug!(slug = %link.slug, attempt, "generated slug taken before insert");
        }

        Err(LinkError::GenerationFailed(
            "generated slugs kept colliding on insert".to_string(),
        ))
    }

    /// Read a link straight from the store, bypassing the cache
    pub async fn get(&self, raw_slug: &str) -> LinkResult<Link> {
        let slug = self.codec.normalize(raw_slug)?;
        self.links.get(&slug).await?.ok_or(LinkError::NotFound)
    }

    /// Apply the given fields to an existing link; `created_at` is kept
    pub async fn update(&self, raw_slug: &str, request: UpdateLinkRequest) -> LinkResult<Link> {
        let slug = self.codec.normalize(raw_slug)?;
        let mut link = self.links.get(&slug).await?.ok_or(LinkError::NotFound)?;

        if let Some(url) = request.url {
            link.url = validate_url(&url)?;
        }
        // An explicit null clears the field
        if let Some(expires_at) = request.expires_at {
            link.expires_at = expires_at;
        }
        if let Some(comment) = request.comment {
            link.comment = comment;
        }
        if let Some(metadata) = request.metadata {
            link.metadata = metadata;
        }
        link.updated_at = chrono::Utc::now().timestamp().max(link.created_at);

        self.links.put(&link).await?;
        self.cache.invalidate(&slug);

        info!(slug = %slug, url = %link.url, "link updated");
        Ok(link)
    }

    /// Remove a link; deleting an unknown slug succeeds
    pub async fn delete(&self, raw_slug: &str) -> LinkResult<()> {
        let Ok(slug) = self.codec.normalize(raw_slug) else {
            // No link can exist under an invalid slug
            return Ok(());
        };

        self.links.delete(&slug).await?;
        self.cache.invalidate(&slug);

        info!(slug = %slug, "link deleted");
        Ok(())
    }

    /// One page of links in slug order
    pub async fn list(&self, query: ListQuery) -> LinkResult<LinkPage> {
        let limit = self
            .limiter
            .clamp(query.limit.unwrap_or(DEFAULT_LIST_LIMIT));

        let after = match query.cursor.as_deref().filter(|c| !c.is_empty()) {
            Some(cursor) => Some(
                self.cursors
                    .decode(cursor)
                    .map_err(|err| {
                        debug!(error = %err, "rejecting list cursor");
                        LinkError::InvalidCursor
                    })?
                    .after,
            ),
            None => None,
        };

        let (links, next) = self.links.list(after.as_deref(), limit).await?;

        let cursor = next
            .map(|after| {
                self.cursors.encode(&CursorData { after }).map_err(|err| {
                    LinkError::StoreUnavailable(format!("failed to encode cursor: {err}"))
                })
            })
            .transpose()?;

        Ok(LinkPage {
            links,
            list_complete: cursor.is_none(),
            cursor,
        })
    }

    /// Propose an unused slug for `url`
    pub async fn suggest(&self, url: &str) -> LinkResult<String> {
        let url = validate_url(url)?;
        self.generator.suggest(&url).await
    }
}

/// Accept absolute http(s) URLs only, returned in serialized form
///
/// Serializing strips tabs and newlines and converts IDN hosts to punycode,
/// so the stored URL is always a valid `Location` header value.
fn validate_url(raw: &str) -> LinkResult<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(LinkError::InvalidUrl("url must not be empty".to_string()));
    }

    let parsed = Url::parse(raw).map_err(|err| LinkError::InvalidUrl(format!("{raw}: {err}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(LinkError::InvalidUrl(format!(
            "unsupported scheme '{}'",
            parsed.scheme()
        )));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(LinkError::InvalidUrl(format!("{raw}: missing host")));
    }

    Ok(parsed.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn service_with(max_list: usize, query_limit: usize) -> LinkService {
        let links = Arc::new(LinkStore::new(
            Arc::new(MemoryStore::new(max_list)),
            Duration::from_secs(1),
        ));
        let cache = Arc::new(LinkCache::new(
            Arc::clone(&links),
            Duration::from_secs(60),
            100,
        ));
        let codec = SlugCodec::new(false, 64);
        let generator = SlugGenerator::new(links, codec.clone(), 6);
        LinkService::new(
            cache,
            codec,
            generator,
            QueryLimiter::new(query_limit),
            CursorCodec::new(Some("test-secret")),
        )
    }

    fn service() -> LinkService {
        service_with(1000, 500)
    }

    fn create_request(slug: Option<&str>, url: &str) -> CreateLinkRequest {
        CreateLinkRequest {
            slug: slug.map(str::to_string),
            url: url.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://example.com/a?b=c").is_ok());
        assert!(validate_url("http://localhost:8080").is_ok());
        assert!(matches!(validate_url(""), Err(LinkError::InvalidUrl(_))));
        assert!(matches!(validate_url("example.com"), Err(LinkError::InvalidUrl(_))));
        assert!(matches!(
            validate_url("javascript:alert(1)"),
            Err(LinkError::InvalidUrl(_))
        ));
        assert!(matches!(
            validate_url("ftp://example.com/file"),
            Err(LinkError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_validate_url_normalizes() {
        assert_eq!(
            validate_url("https://bücher.de/").unwrap(),
            "https://xn--bcher-kva.de/"
        );
        assert_eq!(
            validate_url("https://example.com/a\nb\tc").unwrap(),
            "https://example.com/abc"
        );
        assert_eq!(
            validate_url("http://localhost:8080").unwrap(),
            "http://localhost:8080/"
        );
    }

    #[tokio::test]
    async fn test_create_with_explicit_slug() {
        let service = service();
        let link = service
            .create(create_request(Some("Launch"), "https://example.com/launch-page"))
            .await
            .unwrap();

        assert_eq!(link.slug, "launch");
        assert_eq!(link.created_at, link.updated_at);
        assert_eq!(service.get("LAUNCH").await.unwrap(), link);
    }

    #[tokio::test]
    async fn test_explicit_slug_collision() {
        let service = service();
        service
            .create(create_request(Some("docs"), "https://example.com/a"))
            .await
            .unwrap();

        let err = service
            .create(create_request(Some("Docs"), "https://example.com/b"))
            .await
            .unwrap_err();
        assert_eq!(err, LinkError::SlugCollision("docs".to_string()));
        assert_eq!(service.get("docs").await.unwrap().url, "https://example.com/a");
    }

    #[tokio::test]
    async fn test_generated_slug() {
        let service = service();
        let link = service
            .create(create_request(None, "https://example.com/generated"))
            .await
            .unwrap();

        assert_eq!(link.slug.len(), 6);
        assert!(service.codec().validate(&link.slug));
        assert_eq!(service.get(&link.slug).await.unwrap(), link);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_input() {
        let service = service();
        assert!(matches!(
            service.create(create_request(Some("x y"), "https://example.com")).await,
            Err(LinkError::InvalidSlug(_))
        ));
        assert!(matches!(
            service.create(create_request(Some("ok"), "not a url")).await,
            Err(LinkError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_update_preserves_created_at() {
        let service = service();
        let created = service
            .create(create_request(Some("promo"), "https://example.com/old"))
            .await
            .unwrap();

        let mut metadata = BTreeMap::new();
        metadata.insert("utm_source".to_string(), "newsletter".to_string());
        let updated = service
            .update(
                "promo",
                UpdateLinkRequest {
                    url: Some("https://example.com/new".to_string()),
                    comment: Some(Some("spring campaign".to_string())),
                    metadata: Some(metadata.clone()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);
        assert_eq!(updated.url, "https://example.com/new");
        assert_eq!(updated.metadata, metadata);
        assert_eq!(service.get("promo").await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_update_clears_expiry_and_comment() {
        let service = service();
        service
            .create(CreateLinkRequest {
                slug: Some("promo".to_string()),
                url: "https://example.com/".to_string(),
                expires_at: Some(4_000_000_000),
                comment: Some("limited".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        // Absent fields are left alone
        let kept = service
            .update("promo", UpdateLinkRequest::default())
            .await
            .unwrap();
        assert_eq!(kept.expires_at, Some(4_000_000_000));
        assert_eq!(kept.comment.as_deref(), Some("limited"));

        let cleared = service
            .update(
                "promo",
                UpdateLinkRequest {
                    expires_at: Some(None),
                    comment: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.expires_at, None);
        assert_eq!(cleared.comment, None);
        assert_eq!(service.get("promo").await.unwrap(), cleared);
    }

    #[tokio::test]
    async fn test_update_missing_link() {
        let service = service();
        let err = service
            .update("ghost", UpdateLinkRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err, LinkError::NotFound);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let service = service();
        service
            .create(create_request(Some("gone"), "https://example.com"))
            .await
            .unwrap();

        service.delete("gone").await.unwrap();
        service.delete("gone").await.unwrap();
        service.delete("not valid!").await.unwrap();
        assert_eq!(service.get("gone").await.unwrap_err(), LinkError::NotFound);
    }

    #[tokio::test]
    async fn test_list_pages_through_all_links() {
        let service = service();
        for i in 0..5 {
            service
                .create(create_request(
                    Some(&format!("link-{i}")),
                    "https://example.com",
                ))
                .await
                .unwrap();
        }

        let first = service
            .list(ListQuery {
                cursor: None,
                limit: Some(2),
            })
            .await
            .unwrap();
        assert_eq!(first.links.len(), 2);
        assert!(!first.list_complete);

        let mut seen: Vec<String> = first.links.into_iter().map(|l| l.slug).collect();
        let mut cursor = first.cursor;
        while let Some(next) = cursor {
            let page = service
                .list(ListQuery {
                    cursor: Some(next),
                    limit: Some(2),
                })
                .await
                .unwrap();
            seen.extend(page.links.into_iter().map(|l| l.slug));
            cursor = page.cursor;
        }

        assert_eq!(seen, vec!["link-0", "link-1", "link-2", "link-3", "link-4"]);
    }

    #[tokio::test]
    async fn test_list_limit_is_clamped() {
        let service = service_with(1000, 3);
        for i in 0..5 {
            service
                .create(create_request(Some(&format!("s{i}")), "https://example.com"))
                .await
                .unwrap();
        }

        let page = service
            .list(ListQuery {
                cursor: None,
                limit: Some(10_000),
            })
            .await
            .unwrap();
        assert_eq!(page.links.len(), 3);

        let page = service
            .list(ListQuery {
                cursor: None,
                limit: Some(0),
            })
            .await
            .unwrap();
        assert_eq!(page.links.len(), 1);
    }

    #[tokio::test]
    async fn test_list_rejects_forged_cursor() {
        let service = service();
        let err = service
            .list(ListQuery {
                cursor: Some("bGluazp6enp6.forged".to_string()),
                limit: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err, LinkError::InvalidCursor);
    }

    #[tokio::test]
    async fn test_suggest_without_ai_draws_random_slug() {
        let service = service();
        let slug = service.suggest("https://example.com/blog/rust").await.unwrap();
        assert!(service.codec().validate(&slug));
        assert!(matches!(
            service.suggest("nope").await,
            Err(LinkError::InvalidUrl(_))
        ));
    }
}
