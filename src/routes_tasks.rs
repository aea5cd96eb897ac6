// --------------------------------------------------
// Handles API endpoints related to bucket tasks,
// app settings and bucket label overrides.
//
// Responsibilities:
// - Create / read / update / delete / archive tasks
// - Get / update app settings
// - Get / rename bucket labels
// -------------------------------------------------

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use highlight_planner::models::{AppSettings, Bucket, TaskUpdate};

use crate::SharedState;

fn parse_id(raw: &str) -> Result<Uuid, (StatusCode, &'static str)> {
    Uuid::parse_str(raw).map_err(|_| (StatusCode::BAD_REQUEST, "invalid id"))
}

fn parse_bucket(raw: &str) -> Result<Bucket, (StatusCode, &'static str)> {
    Bucket::parse(raw).ok_or((StatusCode::BAD_REQUEST, "invalid bucket"))
}

#[derive(Debug, Deserialize)]
pub struct TasksQuery {
    pub bucket: Option<String>, // "primary-burner" | "secondary-burner" | "sink"
}

// -----------------------------
// GET /api/tasks[?bucket=]
// All tasks, or the non-archived tasks of one bucket in order
// -----------------------------
pub async fn get_tasks(State(state): State<SharedState>, Query(q): Query<TasksQuery>) -> impl IntoResponse {
    match q.bucket {
        None => Json(state.planner.tasks()).into_response(),
        Some(raw) => match parse_bucket(&raw) {
            Ok(bucket) => Json(state.planner.tasks_by_bucket(bucket)).into_response(),
            Err(e) => e.into_response(),
        },
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskInput {
    pub title: String,
    pub bucket: Bucket,
}

// -----------------------------
// POST /api/tasks
// Creates a new task at the end of its bucket
// -----------------------------
pub async fn create_task(
    State(state): State<SharedState>,
    Json(input): Json<CreateTaskInput>,
) -> impl IntoResponse {
    match state.planner.create_task(&input.title, input.bucket) {
        Ok(task) => (StatusCode::CREATED, Json(task)).into_response(),
        Err(e) => e.into_response(),
    }
}

// -----------------------------
// PUT /api/tasks/:id
// Merges the given fields into an existing task
// -----------------------------
pub async fn update_task(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(input): Json<TaskUpdate>,
) -> impl IntoResponse {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };

    match state.planner.update_task(id, input) {
        Ok(Some(task)) => Json(task).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "task not found").into_response(),
        Err(e) => e.into_response(),
    }
}

// -----------------------------
// POST /api/tasks/:id/archive
// -----------------------------
pub async fn archive_task(State(state): State<SharedState>, Path(id): Path<String>) -> impl IntoResponse {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };

    match state.planner.archive_task(id) {
        Ok(Some(task)) => Json(task).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "task not found").into_response(),
        Err(e) => e.into_response(),
    }
}

// -----------------------------
// DELETE /api/tasks/:id
// Removes a task locally and remotely
// -----------------------------
pub async fn delete_task(State(state): State<SharedState>, Path(id): Path<String>) -> impl IntoResponse {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };

    match state.planner.delete_task(id) {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "task not found").into_response(),
        Err(e) => e.into_response(),
    }
}

// -----------------------------
// GET /api/settings
// -----------------------------
pub async fn get_settings(State(state): State<SharedState>) -> impl IntoResponse {
    Json(state.planner.settings())
}

// -----------------------------
// PUT /api/settings
// Missing fields fall back to their defaults
// -----------------------------
pub async fn put_settings(
    State(state): State<SharedState>,
    Json(input): Json<AppSettings>,
) -> impl IntoResponse {
    match state.planner.save_settings(input) {
        Ok(settings) => Json(settings).into_response(),
        Err(e) => e.into_response(),
    }
}

// -----------------------------
// GET /api/bucket-names
// -----------------------------
pub async fn get_bucket_names(State(state): State<SharedState>) -> impl IntoResponse {
    Json(state.planner.bucket_names())
}

#[derive(Debug, Deserialize)]
pub struct BucketNameInput {
    pub name: String,
}

// -----------------------------
// PUT /api/bucket-names/:bucket
// Empty name restores the built-in label
// -----------------------------
pub async fn put_bucket_name(
    State(state): State<SharedState>,
    Path(bucket): Path<String>,
    Json(input): Json<BucketNameInput>,
) -> impl IntoResponse {
    let bucket = match parse_bucket(&bucket) {
        Ok(b) => b,
        Err(e) => return e.into_response(),
    };

    match state.planner.update_bucket_name(bucket, &input.name) {
        Ok(names) => Json(names).into_response(),
        Err(e) => e.into_response(),
    }
}
