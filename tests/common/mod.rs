//! Shared helpers for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use serde_json::Value;
use sink::analytics::{AnalyticsEvent, AnalyticsSink};
use sink::config::{Config, StoreBackend};
use sink::slug::TextGenerator;
use sink::storage::{KeyPage, KeyValueStore, MemoryStore, StoreResult};
use sink::Sink;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

/// In-memory store that counts reads
pub struct CountingStore {
    inner: MemoryStore,
    gets: AtomicUsize,
}

impl CountingStore {
    pub fn new(max_list_size: usize) -> Self {
        Self {
            inner: MemoryStore::new(max_list_size),
            gets: AtomicUsize::new(0),
        }
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyValueStore for CountingStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> StoreResult<()> {
        self.inner.put(key, value, ttl).await
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> StoreResult<bool> {
        self.inner.put_if_absent(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.inner.delete(key).await
    }

    async fn list_by_prefix(
        &self,
        prefix: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> StoreResult<KeyPage> {
        self.inner.list_by_prefix(prefix, cursor, limit).await
    }

    fn max_list_size(&self) -> usize {
        self.inner.max_list_size()
    }
}

/// Collects analytics events in memory
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AnalyticsEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<AnalyticsEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalyticsSink for RecordingSink {
    async fn write(&self, event: &AnalyticsEvent) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Text generator returning a fixed answer
pub struct FixedModel(pub &'static str);

#[async_trait]
impl TextGenerator for FixedModel {
    async fn generate(&self, _model: &str, _prompt: &str, _input: &str) -> anyhow::Result<String> {
        Ok(self.0.to_string())
    }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.store.backend = StoreBackend::Memory;
    config.cursor_secret = Some("integration-secret".to_string());
    config
}

pub struct TestApp {
    pub app: Sink,
    pub router: Router,
    pub store: Arc<CountingStore>,
    pub events: Arc<RecordingSink>,
    /// Site token the API accepts; sent by [`TestApp::send`]
    pub token: String,
}

impl TestApp {
    pub fn new(config: Config) -> Self {
        Self::with_ai(config, None)
    }

    pub fn with_ai(config: Config, ai: Option<Arc<dyn TextGenerator>>) -> Self {
        let store = Arc::new(CountingStore::new(config.list_query_limit));
        let events = Arc::new(RecordingSink::default());
        let analytics_sink: Arc<dyn AnalyticsSink> = events.clone();
        let app = Sink::build(&config, store.clone(), ai, Some(analytics_sink)).unwrap();
        let router = app.router();
        let token = app.site_token().to_string();
        Self {
            app,
            router,
            store,
            events,
            token,
        }
    }

    /// Send `request`, adding the site token unless it already carries credentials
    pub async fn send(&self, mut request: Request<Body>) -> TestResponse {
        if !request.headers().contains_key(header::AUTHORIZATION) {
            let bearer = format!("Bearer {}", self.token);
            request
                .headers_mut()
                .insert(header::AUTHORIZATION, bearer.parse().unwrap());
        }
        self.send_anonymous(request).await
    }

    /// Send `request` exactly as given
    pub async fn send_anonymous(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        TestResponse {
            status,
            headers,
            body: body.to_vec(),
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn get_anonymous(&self, uri: &str) -> TestResponse {
        self.send_anonymous(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> TestResponse {
        self.send(json_request("POST", uri, body)).await
    }

    /// Create a link through the API, asserting success
    pub async fn create_link(&self, slug: &str, url: &str) -> Value {
        let response = self
            .post_json("/api/link", serde_json::json!({ "slug": slug, "url": url }))
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
        response.json()
    }
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }

    pub fn error_code(&self) -> String {
        self.json()["error"]["code"].as_str().unwrap_or_default().to_string()
    }
}
