use anyhow::{Context, Result};
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sink::app::{ai_client, open_store};
use sink::config::Config;
use sink::Sink;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if std::env::var("SINK_LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env must be loaded before the log filter is read
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env()?;
    info!(
        backend = ?config.store.backend,
        redirect_status = config.redirect_status_code.status_code().as_u16(),
        cache_ttl_secs = config.link_cache_ttl,
        case_sensitive = config.case_sensitive,
        "Loaded configuration"
    );

    let store = open_store(&config).await?;
    let ai = ai_client(&config)?;
    if ai.is_none() {
        info!("AI slug suggestions disabled, falling back to random slugs");
    }

    let app = Sink::build(&config, store.kv, ai, Some(store.analytics_sink))?;
    let router = app.router();

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Sink listening on http://{}", addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    app.shutdown().await;
    Ok(())
}
