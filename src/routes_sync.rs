// --------------------------------------------------
// Handles API endpoints related to remote sync
// and whole-dataset operations.
//
// Responsibilities:
// - Report sync state / trigger a forced re-sync
// - Export, import and reset all local data
// -------------------------------------------------

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

use crate::SharedState;

// -----------------------------
// GET /api/sync
// -----------------------------
pub async fn get_sync(State(state): State<SharedState>) -> impl IntoResponse {
    Json(state.planner.sync().state())
}

// -----------------------------
// POST /api/sync
// Re-runs the bootstrap reconciliation
// -----------------------------
pub async fn force_resync(State(state): State<SharedState>) -> impl IntoResponse {
    Json(state.planner.sync().force_resync().await)
}

// -----------------------------
// GET /api/export
// -----------------------------
pub async fn export_all(State(state): State<SharedState>) -> impl IntoResponse {
    match state.planner.export_all() {
        Ok(json) => ([(header::CONTENT_TYPE, "application/json")], json).into_response(),
        Err(e) => e.into_response(),
    }
}

// -----------------------------
// POST /api/import
// Body is an export document; absent collections are left untouched
// -----------------------------
pub async fn import_all(State(state): State<SharedState>, body: String) -> impl IntoResponse {
    match state.planner.import_all(&body) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

// -----------------------------
// POST /api/reset
// -----------------------------
pub async fn reset_all(State(state): State<SharedState>) -> impl IntoResponse {
    match state.planner.reset_all() {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}
