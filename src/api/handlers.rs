use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::LinkResult;
use crate::models::{CreateLinkRequest, Link, LinkPage, ListQuery, UpdateLinkRequest};
use crate::service::LinkService;

pub struct AppState {
    pub service: Arc<LinkService>,
}

#[derive(Deserialize)]
pub struct SuggestQuery {
    pub url: String,
}

#[derive(Serialize)]
pub struct SuggestResponse {
    pub slug: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

/// Create a new link
pub async fn create_link(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateLinkRequest>,
) -> LinkResult<(StatusCode, Json<Link>)> {
    let link = state.service.create(payload).await?;
    Ok((StatusCode::CREATED, Json(link)))
}

/// Get a link by slug
pub async fn get_link(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> LinkResult<Json<Link>> {
    state.service.get(&slug).await.map(Json)
}

pub async fn update_link(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Json(payload): Json<UpdateLinkRequest>,
) -> LinkResult<Json<Link>> {
    state.service.update(&slug, payload).await.map(Json)
}

pub async fn delete_link(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> LinkResult<StatusCode> {
    state.service.delete(&slug).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List links, one page at a time
pub async fn list_links(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> LinkResult<Json<LinkPage>> {
    state.service.list(query).await.map(Json)
}

/// Suggest a slug for a target URL
pub async fn suggest_slug(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SuggestQuery>,
) -> LinkResult<Json<SuggestResponse>> {
    let slug = state.service.suggest(&query.url).await?;
    Ok(Json(SuggestResponse { slug }))
}

/// Reached only with a valid token
pub async fn verify() -> Json<StatusResponse> {
    Json(StatusResponse { status: "OK" })
}

/// Health check endpoint
pub async fn health_check() -> Json<StatusResponse> {
    Json(StatusResponse { status: "OK" })
}
