use axum::{
    extract::{ConnectInfo, Path, Request, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;

use super::resolver::LinkResolver;
use crate::analytics::request::{
    extract_client_ip, extract_country, extract_referrer, extract_user_agent,
};
use crate::analytics::{AnalyticsRecorder, Visit};
use crate::error::LinkError;

pub static CACHE_HIT_HEADER: HeaderName = HeaderName::from_static("x-sink-cache-hit");

pub struct RedirectState {
    pub resolver: Arc<LinkResolver>,
    /// `None` when analytics are disabled
    pub recorder: Option<Arc<AnalyticsRecorder>>,
    pub home_url: Option<String>,
}

/// Redirect a slug to its target URL
pub async fn redirect_link(
    State(state): State<Arc<RedirectState>>,
    Path(slug): Path<String>,
    request: Request,
) -> Result<Response, LinkError> {
    let (parts, _) = request.into_parts();
    let resolution = state.resolver.resolve(&slug, parts.uri.query()).await?;

    let Ok(location) = HeaderValue::from_str(&resolution.location) else {
        tracing::error!(slug = %resolution.link.slug, "stored url is not a valid header value");
        return Ok((StatusCode::INTERNAL_SERVER_ERROR, "Invalid redirect target").into_response());
    };

    if let Some(recorder) = &state.recorder {
        let headers = &parts.headers;
        let socket_ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        recorder.record_visit(Visit {
            slug: resolution.link.slug.clone(),
            url: resolution.location.clone(),
            referrer: extract_referrer(headers),
            user_agent: extract_user_agent(headers),
            ip: extract_client_ip(headers, socket_ip),
            country: extract_country(headers),
        });
    }

    let cache_hit = HeaderValue::from_static(if resolution.cache_hit { "true" } else { "false" });
    Ok((
        resolution.status,
        [
            (header::LOCATION, location),
            (CACHE_HIT_HEADER.clone(), cache_hit),
        ],
    )
        .into_response())
}

/// Site root: send visitors to the configured home page, or report health
pub async fn home(State(state): State<Arc<RedirectState>>) -> Response {
    match &state.home_url {
        Some(url) => Redirect::to(url).into_response(),
        None => health_check().await.into_response(),
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "OK" })
}
