//! Liveness endpoint, also the target of the keep-alive task.

use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::models::format_timestamp;

/// Header sent by the keep-alive task so its pings are not logged.
pub const KEEP_ALIVE_HEADER: &str = "x-keep-alive";

#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub status: &'static str,
    pub timestamp: String,
}

/// `GET /api/ping`
pub async fn check(headers: HeaderMap) -> Json<PingResponse> {
    if !is_keep_alive(&headers) {
        tracing::info!("Manual ping received");
    }

    Json(PingResponse {
        status: "ok",
        timestamp: format_timestamp(&Utc::now()),
    })
}

fn is_keep_alive(headers: &HeaderMap) -> bool {
    headers
        .get(KEEP_ALIVE_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn keep_alive_header_detected() {
        let mut headers = HeaderMap::new();
        assert!(!is_keep_alive(&headers));
        headers.insert(KEEP_ALIVE_HEADER, HeaderValue::from_static("true"));
        assert!(is_keep_alive(&headers));
        headers.insert(KEEP_ALIVE_HEADER, HeaderValue::from_static("no"));
        assert!(!is_keep_alive(&headers));
    }
}
