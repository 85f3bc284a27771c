use axum::Json;
use serde::Serialize;

use crate::models::SUGGESTED_TEST_TYPES;

#[derive(Debug, Serialize)]
pub struct TestTypesResponse {
    pub types: &'static [&'static str],
}

/// `GET /api/test-types`: suggestions offered by the entry form.
pub async fn list() -> Json<TestTypesResponse> {
    Json(TestTypesResponse {
        types: SUGGESTED_TEST_TYPES,
    })
}
