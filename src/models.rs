use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed three-way placement of a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum Bucket {
    PrimaryBurner,
    SecondaryBurner,
    Sink,
}

impl Bucket {
    pub const ALL: [Bucket; 3] = [Bucket::PrimaryBurner, Bucket::SecondaryBurner, Bucket::Sink];

    pub fn default_label(self) -> &'static str {
        match self {
            Bucket::PrimaryBurner => "Primary burner",
            Bucket::SecondaryBurner => "Secondary burner",
            Bucket::Sink => "Sink",
        }
    }

    pub fn parse(raw: &str) -> Option<Bucket> {
        match raw {
            "primary-burner" => Some(Bucket::PrimaryBurner),
            "secondary-burner" => Some(Bucket::SecondaryBurner),
            "sink" => Some(Bucket::Sink),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    Doing,
    Done,
    Archived,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub bucket: Bucket,
    pub order_index: i64, // rank among same-bucket tasks, gaps allowed
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub est_minutes: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn is_archived(&self) -> bool {
        self.status == TaskStatus::Archived
    }
}

/// Partial task update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub notes: Option<String>,
    pub bucket: Option<Bucket>,
    pub order_index: Option<i64>,
    pub status: Option<TaskStatus>,
    pub est_minutes: Option<i64>,
}

/// Review state of a highlight.
///
/// Only `Pending` counts as active. On the wire `NotDone` is written as the
/// epoch-zero sentinel in `completedAt` so it stays non-null like `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Pending,
    Done(DateTime<Utc>),
    NotDone(DateTime<Utc>),
}

pub fn not_done_sentinel() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

impl Completion {
    pub fn is_active(&self) -> bool {
        matches!(self, Completion::Pending)
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Completion::Done(_))
    }

    pub fn is_not_done(&self) -> bool {
        matches!(self, Completion::NotDone(_))
    }

    /// Value of the `completedAt` column.
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Completion::Pending => None,
            Completion::Done(at) => Some(*at),
            Completion::NotDone(_) => Some(not_done_sentinel()),
        }
    }

    /// Value of the `notDoneAt` column.
    pub fn not_done_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Completion::NotDone(at) => Some(*at),
            _ => None,
        }
    }

    /// Rebuilds the state from its two columns. A bare sentinel falls back to `fallback`.
    pub fn from_columns(
        completed_at: Option<DateTime<Utc>>,
        not_done_at: Option<DateTime<Utc>>,
        fallback: DateTime<Utc>,
    ) -> Self {
        match completed_at {
            None => Completion::Pending,
            Some(at) if at == not_done_sentinel() => {
                Completion::NotDone(not_done_at.unwrap_or(fallback))
            }
            Some(at) => Completion::Done(at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "HighlightRecord", into = "HighlightRecord")]
pub struct DailyHighlight {
    pub id: Uuid,
    pub date: NaiveDate,
    pub task_id: Option<Uuid>,
    pub title: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub remind_before_minutes: i64,
    pub google_calendar_event_id: Option<String>,
    pub google_calendar_event_link: Option<String>,
    pub completion: Completion,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DailyHighlight {
    pub fn is_active(&self) -> bool {
        self.completion.is_active()
    }

    pub fn is_done(&self) -> bool {
        self.completion.is_done()
    }

    pub fn is_not_done(&self) -> bool {
        self.completion.is_not_done()
    }
}

// Flat JSON shape shared by local storage and export files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HighlightRecord {
    id: Uuid,
    date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    task_id: Option<Uuid>,
    title: String,
    scheduled_at: DateTime<Utc>,
    duration_minutes: i64,
    remind_before_minutes: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    google_calendar_event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    google_calendar_event_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    not_done_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<HighlightRecord> for DailyHighlight {
    fn from(r: HighlightRecord) -> Self {
        DailyHighlight {
            completion: Completion::from_columns(r.completed_at, r.not_done_at, r.updated_at),
            id: r.id,
            date: r.date,
            task_id: r.task_id,
            title: r.title,
            scheduled_at: r.scheduled_at,
            duration_minutes: r.duration_minutes,
            remind_before_minutes: r.remind_before_minutes,
            google_calendar_event_id: r.google_calendar_event_id,
            google_calendar_event_link: r.google_calendar_event_link,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

impl From<DailyHighlight> for HighlightRecord {
    fn from(h: DailyHighlight) -> Self {
        HighlightRecord {
            completed_at: h.completion.completed_at(),
            not_done_at: h.completion.not_done_at(),
            id: h.id,
            date: h.date,
            task_id: h.task_id,
            title: h.title,
            scheduled_at: h.scheduled_at,
            duration_minutes: h.duration_minutes,
            remind_before_minutes: h.remind_before_minutes,
            google_calendar_event_id: h.google_calendar_event_id,
            google_calendar_event_link: h.google_calendar_event_link,
            created_at: h.created_at,
            updated_at: h.updated_at,
        }
    }
}

/// Input for placing a highlight (upsert or create).
#[derive(Debug, Clone)]
pub struct HighlightDraft {
    pub date: NaiveDate,
    pub task_id: Option<Uuid>,
    pub title: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub remind_before_minutes: i64,
    pub google_calendar_event_id: Option<String>,
    pub google_calendar_event_link: Option<String>,
}

impl HighlightDraft {
    pub fn apply_to(self, h: &mut DailyHighlight) {
        h.date = self.date;
        h.task_id = self.task_id;
        h.title = self.title;
        h.scheduled_at = self.scheduled_at;
        h.duration_minutes = self.duration_minutes;
        h.remind_before_minutes = self.remind_before_minutes;
        h.google_calendar_event_id = self.google_calendar_event_id;
        h.google_calendar_event_link = self.google_calendar_event_link;
    }

    pub fn into_highlight(self, id: Uuid, now: DateTime<Utc>) -> DailyHighlight {
        DailyHighlight {
            id,
            date: self.date,
            task_id: self.task_id,
            title: self.title,
            scheduled_at: self.scheduled_at,
            duration_minutes: self.duration_minutes,
            remind_before_minutes: self.remind_before_minutes,
            google_calendar_event_id: self.google_calendar_event_id,
            google_calendar_event_link: self.google_calendar_event_link,
            completion: Completion::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial highlight update. Completion and the task link have dedicated operations.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightUpdate {
    pub date: Option<NaiveDate>,
    pub title: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub remind_before_minutes: Option<i64>,
    pub google_calendar_event_id: Option<String>,
    pub google_calendar_event_link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub timezone: String,
    pub default_duration_minutes: i64,
    pub default_remind_before_minutes: i64,
    pub default_plan_hour: String, // "HH:MM"
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            timezone: "Europe/Madrid".to_string(),
            default_duration_minutes: 60,
            default_remind_before_minutes: 30,
            default_plan_hour: "20:30".to_string(),
        }
    }
}

/// Per-bucket label overrides. Empty means "use the built-in label".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BucketNames {
    pub primary_burner: String,
    pub secondary_burner: String,
    pub sink: String,
}

impl BucketNames {
    pub fn get(&self, bucket: Bucket) -> &str {
        match bucket {
            Bucket::PrimaryBurner => &self.primary_burner,
            Bucket::SecondaryBurner => &self.secondary_burner,
            Bucket::Sink => &self.sink,
        }
    }

    pub fn set(&mut self, bucket: Bucket, name: String) {
        match bucket {
            Bucket::PrimaryBurner => self.primary_burner = name,
            Bucket::SecondaryBurner => self.secondary_burner = name,
            Bucket::Sink => self.sink = name,
        }
    }

    pub fn label(&self, bucket: Bucket) -> &str {
        let custom = self.get(bucket).trim();
        if custom.is_empty() { bucket.default_label() } else { custom }
    }

    pub fn is_default(&self) -> bool {
        Bucket::ALL.iter().all(|b| self.get(*b).trim().is_empty())
    }
}

/// Whole-dataset export document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub tasks: Vec<Task>,
    pub highlights: Vec<DailyHighlight>,
    pub settings: AppSettings,
    pub bucket_names: BucketNames,
}

/// Import document; every key is optional and applied independently.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBundle {
    pub tasks: Option<Vec<Task>>,
    pub highlights: Option<Vec<DailyHighlight>>,
    pub settings: Option<AppSettings>,
    pub bucket_names: Option<BucketNames>,
}
