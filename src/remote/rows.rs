//! Row shapes of the remote tables and their conversion to domain records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AppSettings, Bucket, BucketNames, Completion, DailyHighlight, Task, TaskStatus};

/// Id of the single bucket-names row.
pub const SHARED_BUCKET_NAMES_ROW_ID: &str = "global";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskRow {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub notes: Option<String>,
    pub bucket: Bucket,
    pub order_index: i64,
    pub status: TaskStatus,
    pub est_minutes: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRow {
    pub fn from_task(task: &Task, user_id: &str) -> Self {
        Self {
            id: task.id,
            user_id: user_id.to_string(),
            title: task.title.clone(),
            notes: task.notes.clone(),
            bucket: task.bucket,
            order_index: task.order_index,
            status: task.status,
            est_minutes: task.est_minutes,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }

    pub fn into_task(self) -> Task {
        Task {
            id: self.id,
            title: self.title,
            notes: self.notes,
            bucket: self.bucket,
            order_index: self.order_index,
            status: self.status,
            est_minutes: self.est_minutes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HighlightRow {
    pub id: Uuid,
    pub user_id: String,
    pub date: NaiveDate,
    pub task_id: Option<Uuid>,
    pub title: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub remind_before_minutes: i64,
    pub google_calendar_event_id: Option<String>,
    pub google_calendar_event_link: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub not_done_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HighlightRow {
    pub fn from_highlight(h: &DailyHighlight, user_id: &str) -> Self {
        Self {
            id: h.id,
            user_id: user_id.to_string(),
            date: h.date,
            task_id: h.task_id,
            title: h.title.clone(),
            scheduled_at: h.scheduled_at,
            duration_minutes: h.duration_minutes,
            remind_before_minutes: h.remind_before_minutes,
            google_calendar_event_id: h.google_calendar_event_id.clone(),
            google_calendar_event_link: h.google_calendar_event_link.clone(),
            completed_at: h.completion.completed_at(),
            not_done_at: h.completion.not_done_at(),
            created_at: h.created_at,
            updated_at: h.updated_at,
        }
    }

    pub fn into_highlight(self) -> DailyHighlight {
        DailyHighlight {
            completion: Completion::from_columns(self.completed_at, self.not_done_at, self.updated_at),
            id: self.id,
            date: self.date,
            task_id: self.task_id,
            title: self.title,
            scheduled_at: self.scheduled_at,
            duration_minutes: self.duration_minutes,
            remind_before_minutes: self.remind_before_minutes,
            google_calendar_event_id: self.google_calendar_event_id,
            google_calendar_event_link: self.google_calendar_event_link,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SettingsRow {
    pub user_id: String,
    pub timezone: String,
    pub default_duration_minutes: i64,
    pub default_remind_before_minutes: i64,
    pub default_plan_hour: String,
    pub updated_at: DateTime<Utc>,
}

impl SettingsRow {
    pub fn from_settings(s: &AppSettings, user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            timezone: s.timezone.clone(),
            default_duration_minutes: s.default_duration_minutes,
            default_remind_before_minutes: s.default_remind_before_minutes,
            default_plan_hour: s.default_plan_hour.clone(),
            updated_at: now,
        }
    }

    pub fn into_settings(self) -> AppSettings {
        AppSettings {
            timezone: self.timezone,
            default_duration_minutes: self.default_duration_minutes,
            default_remind_before_minutes: self.default_remind_before_minutes,
            default_plan_hour: self.default_plan_hour,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BucketNamesRow {
    pub id: String,
    #[serde(default)]
    pub primary_burner_name: String,
    #[serde(default)]
    pub secondary_burner_name: String,
    #[serde(default)]
    pub sink_name: String,
    pub updated_at: DateTime<Utc>,
}

impl BucketNamesRow {
    pub fn from_names(names: &BucketNames, now: DateTime<Utc>) -> Self {
        Self {
            id: SHARED_BUCKET_NAMES_ROW_ID.to_string(),
            primary_burner_name: names.primary_burner.clone(),
            secondary_burner_name: names.secondary_burner.clone(),
            sink_name: names.sink.clone(),
            updated_at: now,
        }
    }

    pub fn into_names(self) -> BucketNames {
        BucketNames {
            primary_burner: self.primary_burner_name,
            secondary_burner: self.secondary_burner_name,
            sink: self.sink_name,
        }
    }
}
