use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

pub static TIMING_HEADER: HeaderName = HeaderName::from_static("x-sink-timing-ms");

/// Report how long the redirect took to produce, in milliseconds
pub async fn response_timing(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let mut response = next.run(request).await;

    let elapsed = start.elapsed().as_millis().to_string();
    if let Ok(value) = HeaderValue::from_str(&elapsed) {
        response.headers_mut().insert(TIMING_HEADER.clone(), value);
    }
    response
}
