//! Task and highlight operations.
//!
//! Every mutation reads the whole collection, changes it, writes it back to
//! the local store and queues the matching remote write. The store's writer
//! lock is held for the whole read-modify-write, so two operations in this
//! process never interleave; writes from another process sharing the data
//! directory are still last-write-wins per collection.

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{PlannerError, PlannerResult};
use crate::logic::{
    archive_task_for_highlight, build_scheduled_at, is_overdue, local_time_of_day, parse_hhmm,
    pick_most_recent, prepare_highlights, restore_task_from_highlight, tasks_in_bucket,
};
use crate::models::{
    AppSettings, Bucket, BucketNames, Completion, DailyHighlight, ExportBundle, HighlightDraft,
    HighlightUpdate, ImportBundle, Task, TaskStatus, TaskUpdate,
};
use crate::store::{Collection, LocalStore};
use crate::sync::{SyncEngine, SyncJob};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    /// Merge into the current active highlight when there is one.
    ReuseActive,
    /// Always insert a new record.
    AlwaysNew,
}

pub struct Planner {
    store: Arc<LocalStore>,
    sync: Arc<SyncEngine>,
    clock: Arc<dyn Clock>,
}

impl Planner {
    pub fn new(store: Arc<LocalStore>, sync: Arc<SyncEngine>, clock: Arc<dyn Clock>) -> Self {
        Self { store, sync, clock }
    }

    pub fn sync(&self) -> &Arc<SyncEngine> {
        &self.sync
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // -----------------------------
    // persistence helpers (caller holds the writer lock)
    // -----------------------------

    fn persist_tasks(&self, tasks: Vec<Task>) -> PlannerResult<()> {
        self.store.write_tasks(&tasks)?;
        self.sync.enqueue(SyncJob::PushTasks(tasks));
        Ok(())
    }

    fn persist_highlights(&self, highlights: Vec<DailyHighlight>) -> PlannerResult<()> {
        let prepared = prepare_highlights(highlights);
        self.store.write_highlights(&prepared)?;
        self.sync.enqueue(SyncJob::PushHighlights(prepared));
        Ok(())
    }

    fn persist_settings(&self, settings: AppSettings) -> PlannerResult<()> {
        self.store.write_settings(&settings)?;
        self.sync.enqueue(SyncJob::PushSettings(settings));
        Ok(())
    }

    fn persist_bucket_names(&self, names: BucketNames) -> PlannerResult<()> {
        self.store.write_bucket_names(&names)?;
        self.sync.enqueue(SyncJob::PushBucketNames(names));
        Ok(())
    }

    // -----------------------------
    // tasks
    // -----------------------------

    pub fn tasks(&self) -> Vec<Task> {
        self.store.read_tasks()
    }

    pub fn tasks_by_bucket(&self, bucket: Bucket) -> Vec<Task> {
        tasks_in_bucket(&self.tasks(), bucket)
    }

    /// New `todo` task ranked after every task already in `bucket`, archived ones included.
    pub fn create_task(&self, title: &str, bucket: Bucket) -> PlannerResult<Task> {
        let title = title.trim();
        if title.is_empty() {
            return Err(PlannerError::Invalid("title required".to_string()));
        }

        let _writer = self.store.lock();
        let mut tasks = self.store.read_tasks();
        let now = self.clock.now();
        let task = Task {
            id: Uuid::new_v4(),
            title: title.to_string(),
            notes: None,
            bucket,
            order_index: tasks.iter().filter(|t| t.bucket == bucket).count() as i64,
            status: TaskStatus::Todo,
            est_minutes: None,
            created_at: now,
            updated_at: now,
        };
        tasks.push(task.clone());
        self.persist_tasks(tasks)?;
        tracing::debug!(task_id = %task.id, ?bucket, "task created");
        Ok(task)
    }

    pub fn update_task(&self, id: Uuid, update: TaskUpdate) -> PlannerResult<Option<Task>> {
        if update.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(PlannerError::Invalid("title required".to_string()));
        }

        let _writer = self.store.lock();
        let mut tasks = self.store.read_tasks();
        let Some(t) = tasks.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };

        if let Some(title) = update.title {
            t.title = title;
        }
        if let Some(notes) = update.notes {
            t.notes = Some(notes);
        }
        if let Some(bucket) = update.bucket {
            t.bucket = bucket;
        }
        if let Some(order_index) = update.order_index {
            t.order_index = order_index;
        }
        if let Some(status) = update.status {
            t.status = status;
        }
        if let Some(est_minutes) = update.est_minutes {
            t.est_minutes = Some(est_minutes);
        }
        t.updated_at = self.clock.now();

        let updated = t.clone();
        self.persist_tasks(tasks)?;
        Ok(Some(updated))
    }

    pub fn archive_task(&self, id: Uuid) -> PlannerResult<Option<Task>> {
        self.update_task(id, TaskUpdate { status: Some(TaskStatus::Archived), ..TaskUpdate::default() })
    }

    /// Hard delete, locally and remotely.
    pub fn delete_task(&self, id: Uuid) -> PlannerResult<bool> {
        let _writer = self.store.lock();
        let mut tasks = self.store.read_tasks();
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() == before {
            return Ok(false);
        }

        self.persist_tasks(tasks)?;
        self.sync.enqueue(SyncJob::DeleteTask(id));
        Ok(true)
    }

    // -----------------------------
    // highlights
    // -----------------------------

    /// All highlights, deduplicated, single-active and in canonical order.
    pub fn highlights(&self) -> Vec<DailyHighlight> {
        prepare_highlights(self.store.read_highlights())
    }

    pub fn highlight(&self, id: Uuid) -> Option<DailyHighlight> {
        self.highlights().into_iter().find(|h| h.id == id)
    }

    /// The active highlight planned for `date`.
    pub fn highlight_by_date(&self, date: NaiveDate) -> Option<DailyHighlight> {
        self.highlights().into_iter().find(|h| h.date == date && h.is_active())
    }

    pub fn active_highlight(&self) -> Option<DailyHighlight> {
        let highlights = self.highlights();
        pick_most_recent(highlights.iter().filter(|h| h.is_active())).cloned()
    }

    /// Highlights dated within `start..=end`, newest date first.
    pub fn highlights_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<DailyHighlight> {
        let mut range: Vec<DailyHighlight> = self
            .highlights()
            .into_iter()
            .filter(|h| h.date >= start && h.date <= end)
            .collect();
        range.sort_by(|a, b| b.date.cmp(&a.date));
        range
    }

    /// Active highlight whose scheduled time has passed.
    pub fn overdue_highlight(&self) -> Option<DailyHighlight> {
        let now = self.clock.now();
        self.active_highlight().filter(|h| is_overdue(h, now))
    }

    /// Plan the active highlight: reuses the current active record when there is one.
    pub fn upsert_highlight(&self, draft: HighlightDraft) -> PlannerResult<DailyHighlight> {
        let _writer = self.store.lock();
        self.place_highlight(draft, Placement::ReuseActive)
    }

    /// Plan a new highlight record; the previously active one becomes not-done.
    pub fn create_highlight(&self, draft: HighlightDraft) -> PlannerResult<DailyHighlight> {
        let _writer = self.store.lock();
        self.place_highlight(draft, Placement::AlwaysNew)
    }

    fn place_highlight(&self, draft: HighlightDraft, placement: Placement) -> PlannerResult<DailyHighlight> {
        validate_draft(&draft)?;
        let now = self.clock.now();
        let mut highlights = self.highlights();
        let active = pick_most_recent(highlights.iter().filter(|h| h.is_active())).cloned();
        let active_task = active.as_ref().and_then(|h| h.task_id);

        let mut tasks = self.store.read_tasks();
        let mut tasks_changed = false;
        if let Some(task_id) = active_task {
            if draft.task_id != Some(task_id) {
                tasks_changed |= restore_task_from_highlight(&mut tasks, task_id, now);
            }
        }
        if let Some(task_id) = draft.task_id {
            if active_task != Some(task_id) {
                tasks_changed |= archive_task_for_highlight(&mut tasks, task_id, now);
            }
        }
        if tasks_changed {
            self.persist_tasks(tasks)?;
        }

        let keep = match placement {
            Placement::ReuseActive => active.map(|h| h.id),
            Placement::AlwaysNew => None,
        };
        for h in highlights.iter_mut().filter(|h| h.is_active() && Some(h.id) != keep) {
            h.completion = Completion::NotDone(now);
            h.updated_at = now;
        }

        let saved = match keep.and_then(|id| highlights.iter_mut().find(|h| h.id == id)) {
            Some(h) => {
                draft.apply_to(h);
                h.completion = Completion::Pending;
                h.updated_at = now;
                h.clone()
            }
            None => {
                let h = draft.into_highlight(Uuid::new_v4(), now);
                highlights.push(h.clone());
                h
            }
        };

        self.persist_highlights(highlights)?;
        tracing::debug!(highlight_id = %saved.id, ?placement, "highlight planned");
        Ok(saved)
    }

    /// `true` finishes the highlight; `false` reactivates it unless another one is active.
    pub fn set_highlight_completion(&self, id: Uuid, completed: bool) -> PlannerResult<Option<DailyHighlight>> {
        let _writer = self.store.lock();
        let mut highlights = self.highlights();
        let Some(idx) = highlights.iter().position(|h| h.id == id) else {
            return Ok(None);
        };
        let now = self.clock.now();

        if completed {
            highlights[idx].completion = Completion::Done(now);
            highlights[idx].updated_at = now;
            let updated = highlights[idx].clone();
            self.persist_highlights(highlights)?;

            if let Some(task_id) = updated.task_id {
                let mut tasks = self.store.read_tasks();
                if archive_task_for_highlight(&mut tasks, task_id, now) {
                    self.persist_tasks(tasks)?;
                }
            }
            return Ok(Some(updated));
        }

        let another_active = highlights.iter().any(|h| h.id != id && h.is_active());
        highlights[idx].completion = if another_active {
            Completion::NotDone(now)
        } else {
            Completion::Pending
        };
        highlights[idx].updated_at = now;
        let updated = highlights[idx].clone();
        self.persist_highlights(highlights)?;
        Ok(Some(updated))
    }

    pub fn mark_highlight_done(&self, id: Uuid) -> PlannerResult<Option<DailyHighlight>> {
        self.set_highlight_completion(id, true)
    }

    /// Reviewed and rejected: the linked task goes back to its bucket.
    pub fn mark_highlight_not_done(&self, id: Uuid) -> PlannerResult<Option<DailyHighlight>> {
        let _writer = self.store.lock();
        let mut highlights = self.highlights();
        let Some(h) = highlights.iter_mut().find(|h| h.id == id) else {
            return Ok(None);
        };
        let now = self.clock.now();
        h.completion = Completion::NotDone(now);
        h.updated_at = now;
        let updated = h.clone();
        let restore = updated.task_id.filter(|&task_id| !held_by_other_active(&highlights, task_id, id));
        self.persist_highlights(highlights)?;

        if let Some(task_id) = restore {
            let mut tasks = self.store.read_tasks();
            if restore_task_from_highlight(&mut tasks, task_id, now) {
                self.persist_tasks(tasks)?;
            }
        }
        Ok(Some(updated))
    }

    pub fn update_highlight(&self, id: Uuid, update: HighlightUpdate) -> PlannerResult<Option<DailyHighlight>> {
        if update.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(PlannerError::Invalid("title required".to_string()));
        }

        let _writer = self.store.lock();
        self.apply_highlight_update(id, update)
    }

    // Caller holds the writer lock.
    fn apply_highlight_update(&self, id: Uuid, update: HighlightUpdate) -> PlannerResult<Option<DailyHighlight>> {
        let mut highlights = self.highlights();
        let Some(h) = highlights.iter_mut().find(|h| h.id == id) else {
            return Ok(None);
        };

        if let Some(date) = update.date {
            h.date = date;
        }
        if let Some(title) = update.title {
            h.title = title;
        }
        if let Some(scheduled_at) = update.scheduled_at {
            h.scheduled_at = scheduled_at;
        }
        if let Some(minutes) = update.duration_minutes {
            h.duration_minutes = minutes;
        }
        if let Some(minutes) = update.remind_before_minutes {
            h.remind_before_minutes = minutes;
        }
        if let Some(event_id) = update.google_calendar_event_id {
            h.google_calendar_event_id = Some(event_id);
        }
        if let Some(link) = update.google_calendar_event_link {
            h.google_calendar_event_link = Some(link);
        }
        h.updated_at = self.clock.now();

        let updated = h.clone();
        self.persist_highlights(highlights)?;
        Ok(Some(updated))
    }

    /// Move a highlight to tomorrow, keeping its local time of day.
    pub fn keep_highlight_for_tomorrow(&self, id: Uuid) -> PlannerResult<Option<DailyHighlight>> {
        let _writer = self.store.lock();
        let Some(current) = self.highlight(id) else {
            return Ok(None);
        };
        let local_now = self.clock.now_local();
        let offset = *local_now.offset();
        let tomorrow = local_now
            .date_naive()
            .checked_add_days(Days::new(1))
            .ok_or_else(|| PlannerError::Invalid("date out of range".to_string()))?;
        let time = local_time_of_day(current.scheduled_at, offset);
        let scheduled_at = build_scheduled_at(tomorrow, &time, offset)
            .ok_or_else(|| PlannerError::Invalid(format!("cannot schedule {tomorrow} at {time}")))?;

        self.apply_highlight_update(
            id,
            HighlightUpdate {
                date: Some(tomorrow),
                scheduled_at: Some(scheduled_at),
                ..HighlightUpdate::default()
            },
        )
    }

    /// Hard delete. A linked task comes back unless the highlight was done
    /// or the active highlight now holds it.
    pub fn delete_highlight(&self, id: Uuid) -> PlannerResult<bool> {
        let _writer = self.store.lock();
        let mut highlights = self.highlights();
        let Some(idx) = highlights.iter().position(|h| h.id == id) else {
            return Ok(false);
        };
        let removed = highlights.remove(idx);

        if let Some(task_id) = removed.task_id {
            if !removed.is_done() && !held_by_other_active(&highlights, task_id, id) {
                let mut tasks = self.store.read_tasks();
                if restore_task_from_highlight(&mut tasks, task_id, self.clock.now()) {
                    self.persist_tasks(tasks)?;
                }
            }
        }

        self.persist_highlights(highlights)?;
        self.sync.enqueue(SyncJob::DeleteHighlight(id));

        let mut reviewed = self.store.read_reviewed();
        if reviewed.remove(&id) {
            self.store.write_reviewed(&reviewed)?;
        }
        Ok(true)
    }

    // -----------------------------
    // review history (local only)
    // -----------------------------

    pub fn is_highlight_reviewed(&self, id: Uuid) -> bool {
        self.store.read_reviewed().contains(&id)
    }

    pub fn mark_highlight_reviewed(&self, id: Uuid) -> PlannerResult<()> {
        let _writer = self.store.lock();
        let mut reviewed = self.store.read_reviewed();
        if reviewed.insert(id) {
            self.store.write_reviewed(&reviewed)?;
        }
        Ok(())
    }

    pub fn unmark_highlight_reviewed(&self, id: Uuid) -> PlannerResult<()> {
        let _writer = self.store.lock();
        let mut reviewed = self.store.read_reviewed();
        if reviewed.remove(&id) {
            self.store.write_reviewed(&reviewed)?;
        }
        Ok(())
    }

    /// Reviewed highlights of the last `days` days, newest date first.
    pub fn reflection_history(&self, days: u64) -> Vec<DailyHighlight> {
        let today = self.clock.now_local().date_naive();
        let start = today.checked_sub_days(Days::new(days)).unwrap_or(NaiveDate::MIN);
        let reviewed = self.store.read_reviewed();
        self.highlights_range(start, today)
            .into_iter()
            .filter(|h| reviewed.contains(&h.id))
            .collect()
    }

    // -----------------------------
    // settings & bucket names
    // -----------------------------

    pub fn settings(&self) -> AppSettings {
        self.store.read_settings()
    }

    pub fn save_settings(&self, settings: AppSettings) -> PlannerResult<AppSettings> {
        validate_settings(&settings)?;
        let _writer = self.store.lock();
        self.persist_settings(settings.clone())?;
        Ok(settings)
    }

    pub fn bucket_names(&self) -> BucketNames {
        self.store.read_bucket_names()
    }

    pub fn save_bucket_names(&self, names: BucketNames) -> PlannerResult<()> {
        let _writer = self.store.lock();
        self.persist_bucket_names(names)
    }

    pub fn update_bucket_name(&self, bucket: Bucket, name: &str) -> PlannerResult<BucketNames> {
        let _writer = self.store.lock();
        let mut names = self.store.read_bucket_names();
        names.set(bucket, name.trim().to_string());
        self.persist_bucket_names(names.clone())?;
        Ok(names)
    }

    // -----------------------------
    // whole dataset
    // -----------------------------

    pub fn export_all(&self) -> PlannerResult<String> {
        let bundle = ExportBundle {
            tasks: self.tasks(),
            highlights: self.highlights(),
            settings: self.settings(),
            bucket_names: self.bucket_names(),
        };
        serde_json::to_string_pretty(&bundle).map_err(PlannerError::Export)
    }

    /// Apply each collection present in `json`; missing keys are left alone.
    pub fn import_all(&self, json: &str) -> PlannerResult<()> {
        let bundle: ImportBundle = serde_json::from_str(json).map_err(PlannerError::Import)?;

        let _writer = self.store.lock();
        if let Some(tasks) = bundle.tasks {
            self.persist_tasks(tasks)?;
        }
        if let Some(highlights) = bundle.highlights {
            self.persist_highlights(highlights)?;
        }
        if let Some(settings) = bundle.settings {
            self.persist_settings(settings)?;
        }
        if let Some(names) = bundle.bucket_names {
            self.persist_bucket_names(names)?;
        }
        tracing::info!("data imported");
        Ok(())
    }

    /// Clear every local collection and wipe this identity's remote data.
    pub fn reset_all(&self) -> PlannerResult<()> {
        let _writer = self.store.lock();
        for collection in [
            Collection::Tasks,
            Collection::Highlights,
            Collection::Settings,
            Collection::BucketNames,
            Collection::ReviewedHighlights,
        ] {
            self.store.remove(collection)?;
        }
        self.sync.enqueue(SyncJob::RemoveAll);
        tracing::info!("all data reset");
        Ok(())
    }
}

// Another active highlight still links `task_id`, so the task stays archived.
fn held_by_other_active(highlights: &[DailyHighlight], task_id: Uuid, except: Uuid) -> bool {
    highlights
        .iter()
        .any(|h| h.id != except && h.is_active() && h.task_id == Some(task_id))
}

fn validate_draft(draft: &HighlightDraft) -> PlannerResult<()> {
    if draft.title.trim().is_empty() {
        return Err(PlannerError::Invalid("title required".to_string()));
    }
    if draft.duration_minutes <= 0 {
        return Err(PlannerError::Invalid("duration must be positive".to_string()));
    }
    if draft.remind_before_minutes < 0 {
        return Err(PlannerError::Invalid("reminder must not be negative".to_string()));
    }
    Ok(())
}

fn validate_settings(settings: &AppSettings) -> PlannerResult<()> {
    if settings.default_duration_minutes <= 0 {
        return Err(PlannerError::Invalid("default duration must be positive".to_string()));
    }
    if settings.default_remind_before_minutes < 0 {
        return Err(PlannerError::Invalid("default reminder must not be negative".to_string()));
    }
    if parse_hhmm(&settings.default_plan_hour).is_none() {
        return Err(PlannerError::Invalid("default plan hour must be HH:MM".to_string()));
    }
    Ok(())
}
