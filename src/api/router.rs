//! HTTP router for the diagnostic test service.
//!
//! JSON endpoints live under `/api/`; every other path is served from the
//! public directory, which is where stored attachments (`/uploads/...`)
//! resolve.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tower_http::services::ServeDir;

use crate::api::endpoints;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the application router.
///
/// `max_body_bytes` caps whole request bodies; individual attachments are
/// still held to the attachment size limit.
pub fn api_router(core: Arc<CoreState>, max_body_bytes: usize) -> Router {
    let public_dir = core.attachments().public_dir().to_path_buf();
    let ctx = ApiContext::new(core);

    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let api = Router::new()
        .route(
            "/tests",
            get(endpoints::diagnostic_tests::list).post(endpoints::diagnostic_tests::create),
        )
        .route(
            "/tests/:id",
            get(endpoints::diagnostic_tests::detail)
                .put(endpoints::diagnostic_tests::update)
                .delete(endpoints::diagnostic_tests::remove),
        )
        .route("/test-types", get(endpoints::test_types::list))
        .route("/ping", get(endpoints::ping::check))
        .with_state(ctx);

    Router::new()
        .nest("/api", api)
        .fallback_service(ServeDir::new(public_dir))
        .layer(DefaultBodyLimit::max(max_body_bytes))
}
