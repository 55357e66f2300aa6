//! Wiring of stores, caches and routers into a running service

use anyhow::Context;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::{info, Level};

use crate::analytics::{
    AnalyticsRecorder, AnalyticsSink, IpHasher, TracingSink, UserAgentBotDetector,
};
use crate::api::{create_api_router, AppState};
use crate::auth::AuthService;
use crate::config::{Config, StoreBackend};
use crate::cursor::CursorCodec;
use crate::pagination::QueryLimiter;
use crate::redirect::{create_redirect_router, LinkResolver, RedirectState};
use crate::service::LinkService;
use crate::slug::{SlugCodec, SlugGenerator, TextGenerator, WorkersAiClient};
use crate::storage::{
    KeyValueStore, LinkCache, LinkStore, MemoryStore, PostgresStore, SqliteStore,
};

/// A ready store plus the analytics sink that goes with it
pub struct OpenedStore {
    pub kv: Arc<dyn KeyValueStore>,
    /// SQL backends keep access logs next to the links; otherwise events are logged
    pub analytics_sink: Arc<dyn AnalyticsSink>,
}

/// Connect to the configured backend and create its tables
pub async fn open_store(config: &Config) -> anyhow::Result<OpenedStore> {
    let store = &config.store;
    let max_list_size = config.list_query_limit;

    let opened = match store.backend {
        StoreBackend::Memory => {
            info!("Using in-memory store; links are lost on restart");
            let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new(max_list_size));
            OpenedStore {
                kv,
                analytics_sink: Arc::new(TracingSink),
            }
        }
        StoreBackend::Sqlite => {
            info!(url = %store.url, "Using SQLite store");
            let sqlite = Arc::new(
                SqliteStore::new(&store.url, store.max_connections, max_list_size)
                    .await
                    .context("failed to open SQLite store")?,
            );
            OpenedStore {
                kv: sqlite.clone(),
                analytics_sink: sqlite,
            }
        }
        StoreBackend::Postgres => {
            info!("Using PostgreSQL store");
            let postgres = Arc::new(
                PostgresStore::new(&store.url, store.max_connections, max_list_size)
                    .await
                    .context("failed to connect to PostgreSQL")?,
            );
            OpenedStore {
                kv: postgres.clone(),
                analytics_sink: postgres,
            }
        }
    };

    opened
        .kv
        .init()
        .await
        .context("failed to initialize store schema")?;
    Ok(opened)
}

/// Workers AI client, when both account id and token are configured
pub fn ai_client(config: &Config) -> anyhow::Result<Option<Arc<dyn TextGenerator>>> {
    match (&config.ai.account_id, &config.ai.api_token) {
        (Some(account_id), Some(api_token)) => {
            let client = WorkersAiClient::new(account_id, api_token, config.ai.timeout())
                .context("failed to build Workers AI client")?;
            Ok(Some(Arc::new(client)))
        }
        _ => Ok(None),
    }
}

/// The assembled service components
pub struct Sink {
    pub cache: Arc<LinkCache>,
    pub service: Arc<LinkService>,
    pub resolver: Arc<LinkResolver>,
    /// Present when analytics are enabled and a sink was supplied
    pub recorder: Option<Arc<AnalyticsRecorder>>,
    home_url: Option<String>,
    auth: Arc<AuthService>,
    api_cors: bool,
}

impl Sink {
    /// Build every component on top of `kv`.
    ///
    /// Must be called inside a tokio runtime when an analytics sink is given,
    /// since the recorder spawns its worker.
    pub fn build(
        config: &Config,
        kv: Arc<dyn KeyValueStore>,
        ai: Option<Arc<dyn TextGenerator>>,
        analytics_sink: Option<Arc<dyn AnalyticsSink>>,
    ) -> anyhow::Result<Self> {
        let links = Arc::new(LinkStore::new(kv, config.store.timeout()));
        let cache = Arc::new(LinkCache::new(
            Arc::clone(&links),
            config.cache_ttl(),
            config.cache.max_entries,
        ));
        let codec = SlugCodec::new(config.case_sensitive, config.slug_max_length);

        let mut generator = SlugGenerator::new(links, codec.clone(), config.slug_default_length);
        if let Some(client) = ai {
            info!(model = %config.ai_model, "AI slug suggestions enabled");
            generator = generator.with_ai(
                client,
                &config.ai_model,
                &config.ai_prompt,
                config.ai.timeout(),
            );
        }

        let service = Arc::new(LinkService::new(
            Arc::clone(&cache),
            codec.clone(),
            generator,
            QueryLimiter::new(config.list_query_limit),
            CursorCodec::new(config.cursor_secret.as_deref()),
        ));

        let resolver = Arc::new(LinkResolver::new(
            Arc::clone(&cache),
            codec,
            config.redirect_status_code,
            config.redirect_with_query,
        ));

        let recorder = match analytics_sink.filter(|_| config.analytics.enabled) {
            Some(sink) => {
                let hasher = IpHasher::new(config.analytics.ip_hash_secret.as_deref())
                    .context("failed to build visitor IP hasher")?;
                Some(Arc::new(AnalyticsRecorder::new(
                    sink,
                    Arc::new(UserAgentBotDetector),
                    hasher,
                    &config.analytics,
                    config.disable_bot_access_log,
                )))
            }
            None => None,
        };

        Ok(Self {
            cache,
            service,
            resolver,
            recorder,
            home_url: config.home_url.clone(),
            auth: Arc::new(AuthService::new(config.site_token.clone())),
            api_cors: config.api_cors,
        })
    }

    /// Bearer token accepted by the management API
    pub fn site_token(&self) -> &str {
        self.auth.site_token()
    }

    /// Management API under `/api`, redirects at the root
    pub fn router(&self) -> Router {
        let api_state = Arc::new(AppState {
            service: Arc::clone(&self.service),
        });
        let redirect_state = Arc::new(RedirectState {
            resolver: Arc::clone(&self.resolver),
            recorder: self.recorder.clone(),
            home_url: self.home_url.clone(),
        });

        let mut api_router = create_api_router(api_state, Arc::clone(&self.auth));
        if self.api_cors {
            api_router = api_router.layer(CorsLayer::permissive());
        }

        Router::new()
            .nest("/api", api_router)
            .merge(create_redirect_router(redirect_state))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                    .on_response(
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .latency_unit(LatencyUnit::Millis),
                    ),
            )
    }

    /// Flush pending analytics writes
    pub async fn shutdown(&self) {
        if let Some(recorder) = &self.recorder {
            recorder.shutdown().await;
            let stats = recorder.stats();
            info!(
                written = stats.written,
                dropped = stats.dropped,
                failed = stats.failed,
                skipped_bots = stats.skipped_bots,
                "analytics recorder stopped"
            );
        }
    }
}
