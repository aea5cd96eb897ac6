// --------------------------------------------------
// Handles API endpoints related to the daily highlight.
//
// Responsibilities:
// - Plan (upsert / create) a highlight from date + "HH:MM"
// - Lookups: all, range, active, overdue, by date
// - Completion, not-done, keep-for-tomorrow, review marks
// - Reflection history of reviewed highlights
// -------------------------------------------------

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use highlight_planner::logic::build_scheduled_at;
use highlight_planner::models::{DailyHighlight, HighlightDraft, HighlightUpdate};
use highlight_planner::planner::Planner;

use crate::SharedState;

type Rejection = (StatusCode, &'static str);

fn parse_id(raw: &str) -> Result<Uuid, Rejection> {
    Uuid::parse_str(raw).map_err(|_| (StatusCode::BAD_REQUEST, "invalid id"))
}

fn parse_date(raw: &str) -> Result<NaiveDate, Rejection> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| (StatusCode::BAD_REQUEST, "invalid date"))
}

// Found -> 200 with the highlight, missing -> 404
fn found(result: highlight_planner::error::PlannerResult<Option<DailyHighlight>>) -> Response {
    match result {
        Ok(Some(h)) => Json(h).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "highlight not found").into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanHighlightInput {
    pub date: String,         // "YYYY-MM-DD"
    pub time: Option<String>, // "HH:MM", defaults to the settings' plan hour
    pub title: String,
    pub task_id: Option<Uuid>,
    pub duration_minutes: Option<i64>,
    pub remind_before_minutes: Option<i64>,
    pub google_calendar_event_id: Option<String>,
    pub google_calendar_event_link: Option<String>,
}

impl PlanHighlightInput {
    fn into_draft(self, planner: &Planner) -> Result<HighlightDraft, Rejection> {
        let date = parse_date(&self.date)?;
        let settings = planner.settings();
        let time = self.time.unwrap_or(settings.default_plan_hour);
        let offset = *planner.clock().now_local().offset();
        let scheduled_at =
            build_scheduled_at(date, &time, offset).ok_or((StatusCode::BAD_REQUEST, "invalid time"))?;

        Ok(HighlightDraft {
            date,
            task_id: self.task_id,
            title: self.title,
            scheduled_at,
            duration_minutes: self.duration_minutes.unwrap_or(settings.default_duration_minutes),
            remind_before_minutes: self
                .remind_before_minutes
                .unwrap_or(settings.default_remind_before_minutes),
            google_calendar_event_id: self.google_calendar_event_id,
            google_calendar_event_link: self.google_calendar_event_link,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

// -----------------------------
// GET /api/highlights[?start=&end=]
// All highlights in canonical order, or an inclusive date range
// -----------------------------
pub async fn get_highlights(State(state): State<SharedState>, Query(q): Query<RangeQuery>) -> impl IntoResponse {
    match (q.start, q.end) {
        (None, None) => Json(state.planner.highlights()).into_response(),
        (Some(start), Some(end)) => {
            let (start, end) = match (parse_date(&start), parse_date(&end)) {
                (Ok(s), Ok(e)) => (s, e),
                (Err(e), _) | (_, Err(e)) => return e.into_response(),
            };
            Json(state.planner.highlights_range(start, end)).into_response()
        }
        _ => (StatusCode::BAD_REQUEST, "start and end go together").into_response(),
    }
}

// -----------------------------
// GET /api/highlights/active
// -----------------------------
pub async fn get_active(State(state): State<SharedState>) -> impl IntoResponse {
    Json(state.planner.active_highlight())
}

// -----------------------------
// GET /api/highlights/overdue
// Active highlight whose time has passed (null otherwise)
// -----------------------------
pub async fn get_overdue(State(state): State<SharedState>) -> impl IntoResponse {
    Json(state.planner.overdue_highlight())
}

// -----------------------------
// GET /api/highlights/by-date/:date
// -----------------------------
pub async fn get_by_date(State(state): State<SharedState>, Path(date): Path<String>) -> impl IntoResponse {
    match parse_date(&date) {
        Ok(date) => Json(state.planner.highlight_by_date(date)).into_response(),
        Err(e) => e.into_response(),
    }
}

// -----------------------------
// PUT /api/highlights
// Plans the active highlight, reusing the current active record
// -----------------------------
pub async fn upsert_highlight(
    State(state): State<SharedState>,
    Json(input): Json<PlanHighlightInput>,
) -> impl IntoResponse {
    let draft = match input.into_draft(&state.planner) {
        Ok(d) => d,
        Err(e) => return e.into_response(),
    };

    match state.planner.upsert_highlight(draft) {
        Ok(h) => Json(h).into_response(),
        Err(e) => e.into_response(),
    }
}

// -----------------------------
// POST /api/highlights
// Always inserts a new record
// -----------------------------
pub async fn create_highlight(
    State(state): State<SharedState>,
    Json(input): Json<PlanHighlightInput>,
) -> impl IntoResponse {
    let draft = match input.into_draft(&state.planner) {
        Ok(d) => d,
        Err(e) => return e.into_response(),
    };

    match state.planner.create_highlight(draft) {
        Ok(h) => (StatusCode::CREATED, Json(h)).into_response(),
        Err(e) => e.into_response(),
    }
}

// -----------------------------
// PUT /api/highlights/:id
// -----------------------------
pub async fn update_highlight(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(input): Json<HighlightUpdate>,
) -> impl IntoResponse {
    match parse_id(&id) {
        Ok(id) => found(state.planner.update_highlight(id, input)),
        Err(e) => e.into_response(),
    }
}

// -----------------------------
// DELETE /api/highlights/:id
// -----------------------------
pub async fn delete_highlight(State(state): State<SharedState>, Path(id): Path<String>) -> impl IntoResponse {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };

    match state.planner.delete_highlight(id) {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "highlight not found").into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct CompletionInput {
    pub completed: bool,
}

// -----------------------------
// POST /api/highlights/:id/completion
// -----------------------------
pub async fn set_completion(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(input): Json<CompletionInput>,
) -> impl IntoResponse {
    match parse_id(&id) {
        Ok(id) => found(state.planner.set_highlight_completion(id, input.completed)),
        Err(e) => e.into_response(),
    }
}

// -----------------------------
// POST /api/highlights/:id/not-done
// -----------------------------
pub async fn mark_not_done(State(state): State<SharedState>, Path(id): Path<String>) -> impl IntoResponse {
    match parse_id(&id) {
        Ok(id) => found(state.planner.mark_highlight_not_done(id)),
        Err(e) => e.into_response(),
    }
}

// -----------------------------
// POST /api/highlights/:id/keep
// Moves the highlight to tomorrow at the same local time
// -----------------------------
pub async fn keep_for_tomorrow(State(state): State<SharedState>, Path(id): Path<String>) -> impl IntoResponse {
    match parse_id(&id) {
        Ok(id) => found(state.planner.keep_highlight_for_tomorrow(id)),
        Err(e) => e.into_response(),
    }
}

// -----------------------------
// POST /api/highlights/:id/review
// -----------------------------
pub async fn mark_reviewed(State(state): State<SharedState>, Path(id): Path<String>) -> impl IntoResponse {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };
    if state.planner.highlight(id).is_none() {
        return (StatusCode::NOT_FOUND, "highlight not found").into_response();
    }

    match state.planner.mark_highlight_reviewed(id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

// -----------------------------
// DELETE /api/highlights/:id/review
// -----------------------------
pub async fn unmark_reviewed(State(state): State<SharedState>, Path(id): Path<String>) -> impl IntoResponse {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };

    match state.planner.unmark_highlight_reviewed(id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct ReflectQuery {
    pub days: Option<u64>,
}

// -----------------------------
// GET /api/reflect?days=
// Reviewed highlights of the last N days (default 7)
// -----------------------------
pub async fn get_reflection(State(state): State<SharedState>, Query(q): Query<ReflectQuery>) -> impl IntoResponse {
    Json(state.planner.reflection_history(q.days.unwrap_or(7)))
}
