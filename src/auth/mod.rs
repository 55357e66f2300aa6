use axum::{
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::prelude::*;
use serde_json::json;
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Bearer-token check for the management API
pub struct AuthService {
    site_token: String,
}

impl AuthService {
    /// Without a configured token a random one is generated and logged once
    pub fn new(site_token: Option<String>) -> Self {
        let site_token = match site_token.filter(|token| !token.is_empty()) {
            Some(token) => token,
            None => {
                let bytes: Vec<u8> = (0..24).map(|_| rand::random::<u8>()).collect();
                let token = BASE64_URL_SAFE_NO_PAD.encode(bytes);
                tracing::warn!(
                    site_token = %token,
                    "no site token configured, generated one for this process"
                );
                token
            }
        };
        Self { site_token }
    }

    pub fn site_token(&self) -> &str {
        &self.site_token
    }

    pub fn validate_token(&self, token: Option<&str>) -> bool {
        let Some(token) = token else {
            return false;
        };
        token.as_bytes().ct_eq(self.site_token.as_bytes()).into()
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
}

pub async fn auth_middleware(
    auth_service: Arc<AuthService>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    if auth_service.validate_token(bearer_token(&headers)) {
        next.run(request).await
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": { "code": "unauthorized", "message": "missing or invalid site token" }
            })),
        )
            .into_response()
    }
}
