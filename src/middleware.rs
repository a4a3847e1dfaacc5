//! HTTP middleware.
//!
//! The token-count middleware inspects the request body, estimates the
//! question's token footprint, and stamps `X-Token-Count` and
//! `X-Model-Name` headers on the response so clients can see cost before
//! the provider bills it.

use crate::constants::DEFAULT_MODEL;
use crate::usage::estimate_tokens;
use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;

const MAX_BUFFERED_BODY: usize = 2 * 1024 * 1024;

/// Estimate the token footprint of the request and annotate the response.
pub async fn token_count(req: Request, next: Next) -> Response {
    let (parts, body) = req.into_parts();

    let bytes = match axum::body::to_bytes(body, MAX_BUFFERED_BODY).await {
        Ok(bytes) => bytes,
        Err(_) => Bytes::new(),
    };

    let (tokens, model) = inspect_body(&bytes);

    // Replay the buffered body for the handler.
    let req = Request::from_parts(parts, Body::from(bytes));
    let mut response = next.run(req).await;

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&tokens.to_string()) {
        headers.insert("x-token-count", value);
    }
    if let Ok(value) = HeaderValue::from_str(&model) {
        headers.insert("x-model-name", value);
    }
    response
}

/// Pull the question text and model name out of a JSON request body.
fn inspect_body(bytes: &[u8]) -> (u64, String) {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(bytes) else {
        return (0, DEFAULT_MODEL.to_string());
    };

    let text = value
        .get("question")
        .or_else(|| value.get("prompt"))
        .and_then(|v| v.as_str())
        .unwrap_or_default();

    let model = value
        .get("model")
        .and_then(|v| v.as_str())
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(DEFAULT_MODEL);

    (estimate_tokens(text), model.to_string())
}
