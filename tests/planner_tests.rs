use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, TimeZone, Utc};
use tempfile::TempDir;
use uuid::Uuid;

use highlight_planner::clock::{Clock, ManualClock};
use highlight_planner::error::PlannerError;
use highlight_planner::logic::build_scheduled_at;
use highlight_planner::models::{
    AppSettings, Bucket, Completion, HighlightDraft, HighlightUpdate, TaskStatus, TaskUpdate,
};
use highlight_planner::planner::Planner;
use highlight_planner::store::LocalStore;
use highlight_planner::sync::SyncEngine;

struct Fixture {
    _dir: TempDir,
    clock: Arc<ManualClock>,
    planner: Planner,
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 7, 0, 0).unwrap()
}

fn fixture() -> Fixture {
    fixture_at(ManualClock::new(start()))
}

fn fixture_at(clock: ManualClock) -> Fixture {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(LocalStore::open(dir.path()).unwrap());
    let clock = Arc::new(clock);
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let sync = Arc::new(SyncEngine::disabled(Arc::clone(&store), Arc::clone(&dyn_clock)));
    let planner = Planner::new(store, sync, dyn_clock);
    Fixture { _dir: dir, clock, planner }
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
}

fn draft(date: NaiveDate, title: &str, task_id: Option<Uuid>) -> HighlightDraft {
    HighlightDraft {
        date,
        task_id,
        title: title.to_string(),
        scheduled_at: build_scheduled_at(date, "09:00", Utc.fix()).unwrap(),
        duration_minutes: 60,
        remind_before_minutes: 30,
        google_calendar_event_id: None,
        google_calendar_event_link: None,
    }
}

fn active_count(f: &Fixture) -> usize {
    f.planner.highlights().iter().filter(|h| h.is_active()).count()
}

#[test]
fn second_created_highlight_demotes_the_first() {
    let f = fixture();

    let first = f.planner.create_highlight(draft(day(1), "Draft report", None)).unwrap();
    f.clock.advance(Duration::minutes(5));
    let second = f.planner.create_highlight(draft(day(2), "Call client", None)).unwrap();

    let first = f.planner.highlight(first.id).unwrap();
    assert!(first.is_not_done());
    assert_eq!(f.planner.active_highlight().map(|h| h.id), Some(second.id));
    assert_eq!(active_count(&f), 1);
}

#[test]
fn completing_a_linked_highlight_archives_its_task() {
    let f = fixture();
    let task = f.planner.create_task("Write tests", Bucket::PrimaryBurner).unwrap();

    let h = f.planner.upsert_highlight(draft(day(1), "Write tests", Some(task.id))).unwrap();
    f.clock.advance(Duration::hours(3));
    let done = f.planner.set_highlight_completion(h.id, true).unwrap().unwrap();

    let completed_at = done.completion.completed_at().unwrap();
    assert_eq!(completed_at, f.clock.now());
    assert_ne!(completed_at, DateTime::<Utc>::UNIX_EPOCH);
    assert!(done.is_done());

    let task = f.planner.tasks().into_iter().find(|t| t.id == task.id).unwrap();
    assert_eq!(task.status, TaskStatus::Archived);
}

#[test]
fn deleting_an_open_linked_highlight_restores_the_task() {
    let f = fixture();
    let task = f.planner.create_task("Plan trip", Bucket::Sink).unwrap();
    let h = f.planner.upsert_highlight(draft(day(1), "Plan trip", Some(task.id))).unwrap();
    assert!(f.planner.tasks_by_bucket(Bucket::Sink).is_empty());

    assert!(f.planner.delete_highlight(h.id).unwrap());

    assert!(f.planner.highlights().iter().all(|x| x.id != h.id));
    let restored = f.planner.tasks_by_bucket(Bucket::Sink);
    assert_eq!(restored.len(), 1);
    assert_eq!(restored[0].status, TaskStatus::Todo);
}

#[test]
fn deleting_a_done_highlight_keeps_the_task_archived() {
    let f = fixture();
    let task = f.planner.create_task("Ship it", Bucket::PrimaryBurner).unwrap();
    let h = f.planner.upsert_highlight(draft(day(1), "Ship it", Some(task.id))).unwrap();
    f.planner.mark_highlight_done(h.id).unwrap();

    f.planner.delete_highlight(h.id).unwrap();

    let task = f.planner.tasks().into_iter().find(|t| t.id == task.id).unwrap();
    assert_eq!(task.status, TaskStatus::Archived);
}

#[test]
fn not_done_restores_task_after_open_bucket_tasks() {
    let f = fixture();
    let linked = f.planner.create_task("Linked", Bucket::SecondaryBurner).unwrap();
    f.planner.create_task("Other A", Bucket::SecondaryBurner).unwrap();
    f.planner.create_task("Other B", Bucket::SecondaryBurner).unwrap();

    let h = f.planner.upsert_highlight(draft(day(1), "Linked", Some(linked.id))).unwrap();
    f.planner.mark_highlight_not_done(h.id).unwrap();

    let bucket = f.planner.tasks_by_bucket(Bucket::SecondaryBurner);
    assert_eq!(bucket.len(), 3);
    let restored = bucket.iter().find(|t| t.id == linked.id).unwrap();
    assert_eq!(restored.status, TaskStatus::Todo);
    assert_eq!(restored.order_index, 2);
    assert!(bucket.iter().all(|t| t.order_index <= restored.order_index));
    assert!(f.planner.highlight(h.id).unwrap().is_not_done());
}

#[test]
fn at_most_one_active_after_every_operation() {
    let f = fixture();
    let t1 = f.planner.create_task("One", Bucket::PrimaryBurner).unwrap();
    let t2 = f.planner.create_task("Two", Bucket::PrimaryBurner).unwrap();

    let a = f.planner.upsert_highlight(draft(day(1), "One", Some(t1.id))).unwrap();
    assert!(active_count(&f) <= 1);
    f.clock.advance(Duration::minutes(1));
    let b = f.planner.create_highlight(draft(day(2), "Two", Some(t2.id))).unwrap();
    assert!(active_count(&f) <= 1);
    f.clock.advance(Duration::minutes(1));
    f.planner.set_highlight_completion(a.id, false).unwrap();
    assert!(active_count(&f) <= 1);
    f.clock.advance(Duration::minutes(1));
    f.planner.set_highlight_completion(b.id, true).unwrap();
    assert!(active_count(&f) <= 1);
    f.clock.advance(Duration::minutes(1));
    f.planner.set_highlight_completion(a.id, false).unwrap();
    assert_eq!(active_count(&f), 1);
    f.clock.advance(Duration::minutes(1));
    f.planner.upsert_highlight(draft(day(3), "Three", None)).unwrap();
    assert_eq!(active_count(&f), 1);
}

#[test]
fn reopening_while_another_is_active_stays_not_done() {
    let f = fixture();
    let a = f.planner.create_highlight(draft(day(1), "A", None)).unwrap();
    f.clock.advance(Duration::minutes(1));
    let b = f.planner.create_highlight(draft(day(2), "B", None)).unwrap();

    let reopened = f.planner.set_highlight_completion(a.id, false).unwrap().unwrap();

    assert!(reopened.is_not_done());
    assert_eq!(f.planner.active_highlight().map(|h| h.id), Some(b.id));
}

#[test]
fn upsert_updates_the_active_record_in_place() {
    let f = fixture();
    let first = f.planner.upsert_highlight(draft(day(1), "Morning", None)).unwrap();
    f.clock.advance(Duration::minutes(10));
    let second = f.planner.upsert_highlight(draft(day(2), "Moved", None)).unwrap();

    assert_eq!(first.id, second.id);
    let all = f.planner.highlights();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].date, day(2));
    assert_eq!(all[0].title, "Moved");
    assert_eq!(all[0].created_at, first.created_at);
    assert!(all[0].updated_at > first.updated_at);
}

#[test]
fn upsert_swapping_tasks_restores_the_previous_one() {
    let f = fixture();
    let old = f.planner.create_task("Old", Bucket::PrimaryBurner).unwrap();
    let new = f.planner.create_task("New", Bucket::PrimaryBurner).unwrap();

    f.planner.upsert_highlight(draft(day(1), "Old", Some(old.id))).unwrap();
    f.planner.upsert_highlight(draft(day(1), "New", Some(new.id))).unwrap();

    let tasks = f.planner.tasks();
    let status = |id| tasks.iter().find(|t| t.id == id).unwrap().status;
    assert_eq!(status(old.id), TaskStatus::Todo);
    assert_eq!(status(new.id), TaskStatus::Archived);
}

#[test]
fn create_task_counts_archived_tasks_in_bucket() {
    let f = fixture();
    let a = f.planner.create_task("A", Bucket::Sink).unwrap();
    f.planner.archive_task(a.id).unwrap();
    f.planner.create_task("Elsewhere", Bucket::PrimaryBurner).unwrap();

    let b = f.planner.create_task("B", Bucket::Sink).unwrap();
    assert_eq!(b.order_index, 1);
    assert_eq!(b.status, TaskStatus::Todo);
}

#[test]
fn blank_task_title_is_rejected() {
    let f = fixture();
    let err = f.planner.create_task("   ", Bucket::Sink).unwrap_err();
    assert!(matches!(err, PlannerError::Invalid(_)));
    assert!(f.planner.tasks().is_empty());
}

#[test]
fn update_task_merges_fields_and_bumps_updated_at() {
    let f = fixture();
    let t = f.planner.create_task("Draft", Bucket::Sink).unwrap();
    f.clock.advance(Duration::minutes(3));

    let updated = f
        .planner
        .update_task(
            t.id,
            TaskUpdate {
                notes: Some("with numbers".into()),
                est_minutes: Some(45),
                ..TaskUpdate::default()
            },
        )
        .unwrap()
        .unwrap();

    assert_eq!(updated.title, "Draft");
    assert_eq!(updated.notes.as_deref(), Some("with numbers"));
    assert_eq!(updated.est_minutes, Some(45));
    assert_eq!(updated.updated_at, f.clock.now());
    assert!(f.planner.update_task(Uuid::new_v4(), TaskUpdate::default()).unwrap().is_none());
}

#[test]
fn delete_task_is_a_hard_removal() {
    let f = fixture();
    let t = f.planner.create_task("Gone", Bucket::Sink).unwrap();
    assert!(f.planner.delete_task(t.id).unwrap());
    assert!(!f.planner.delete_task(t.id).unwrap());
    assert!(f.planner.tasks().is_empty());
}

#[test]
fn export_then_import_reproduces_the_dataset() {
    let source = fixture();
    let task = source.planner.create_task("Portable", Bucket::PrimaryBurner).unwrap();
    source.planner.upsert_highlight(draft(day(1), "Portable", Some(task.id))).unwrap();
    source
        .planner
        .save_settings(AppSettings { default_duration_minutes: 25, ..AppSettings::default() })
        .unwrap();
    source.planner.update_bucket_name(Bucket::Sink, "  Someday ").unwrap();

    let json = source.planner.export_all().unwrap();
    let target = fixture();
    target.planner.import_all(&json).unwrap();

    assert_eq!(target.planner.tasks(), source.planner.tasks());
    assert_eq!(target.planner.highlights(), source.planner.highlights());
    assert_eq!(target.planner.settings(), source.planner.settings());
    assert_eq!(target.planner.bucket_names().sink, "Someday");
}

#[test]
fn partial_import_leaves_other_collections_alone() {
    let f = fixture();
    f.planner.create_task("Keep me", Bucket::Sink).unwrap();

    f.planner.import_all(r#"{"settings": {"defaultPlanHour": "07:15"}}"#).unwrap();

    assert_eq!(f.planner.tasks().len(), 1);
    assert_eq!(f.planner.settings().default_plan_hour, "07:15");
    assert_eq!(f.planner.settings().default_duration_minutes, 60);
}

#[test]
fn malformed_import_is_rejected() {
    let f = fixture();
    let err = f.planner.import_all("{ not json").unwrap_err();
    assert!(matches!(err, PlannerError::Import(_)));
}

#[test]
fn reset_clears_everything() {
    let f = fixture();
    f.planner.create_task("Temp", Bucket::Sink).unwrap();
    let h = f.planner.upsert_highlight(draft(day(1), "Temp", None)).unwrap();
    f.planner.mark_highlight_reviewed(h.id).unwrap();
    f.planner.update_bucket_name(Bucket::Sink, "Later").unwrap();

    f.planner.reset_all().unwrap();

    assert!(f.planner.tasks().is_empty());
    assert!(f.planner.highlights().is_empty());
    assert_eq!(f.planner.settings(), AppSettings::default());
    assert!(f.planner.bucket_names().is_default());
    assert!(!f.planner.is_highlight_reviewed(h.id));
}

#[test]
fn invalid_settings_are_rejected() {
    let f = fixture();
    let err = f
        .planner
        .save_settings(AppSettings { default_plan_hour: "25:00".into(), ..AppSettings::default() })
        .unwrap_err();
    assert!(matches!(err, PlannerError::Invalid(_)));
    assert_eq!(f.planner.settings(), AppSettings::default());
}

#[test]
fn overdue_once_scheduled_time_passes() {
    let f = fixture(); // 07:00 UTC
    f.planner.upsert_highlight(draft(day(1), "Focus", None)).unwrap(); // 09:00 UTC
    assert!(f.planner.overdue_highlight().is_none());

    f.clock.advance(Duration::hours(2));
    assert!(f.planner.overdue_highlight().is_some());
}

#[test]
fn keep_for_tomorrow_preserves_local_time() {
    let madrid = FixedOffset::east_opt(2 * 3600).unwrap();
    // 2024-06-01 23:30 local
    let f = fixture_at(ManualClock::with_offset(
        Utc.with_ymd_and_hms(2024, 6, 1, 21, 30, 0).unwrap(),
        madrid,
    ));
    let mut d = draft(day(1), "Late", None);
    d.scheduled_at = build_scheduled_at(day(1), "18:45", madrid).unwrap();
    let h = f.planner.upsert_highlight(d).unwrap();

    let kept = f.planner.keep_highlight_for_tomorrow(h.id).unwrap().unwrap();

    assert_eq!(kept.date, day(2));
    assert_eq!(kept.scheduled_at, build_scheduled_at(day(2), "18:45", madrid).unwrap());
    assert!(kept.is_active());
}

#[test]
fn update_highlight_leaves_completion_alone() {
    let f = fixture();
    let h = f.planner.upsert_highlight(draft(day(1), "Old title", None)).unwrap();
    f.planner.mark_highlight_done(h.id).unwrap();

    let updated = f
        .planner
        .update_highlight(h.id, HighlightUpdate { title: Some("New title".into()), ..HighlightUpdate::default() })
        .unwrap()
        .unwrap();

    assert_eq!(updated.title, "New title");
    assert!(updated.is_done());
}

#[test]
fn lookups_by_date_and_range() {
    let f = fixture();
    let a = f.planner.create_highlight(draft(day(1), "A", None)).unwrap();
    f.clock.advance(Duration::minutes(1));
    f.planner.create_highlight(draft(day(3), "B", None)).unwrap();
    f.clock.advance(Duration::minutes(1));
    f.planner.create_highlight(draft(day(5), "C", None)).unwrap();

    // only the active record counts as "the" highlight of a day
    assert!(f.planner.highlight_by_date(day(1)).is_none());
    assert_eq!(f.planner.highlight_by_date(day(5)).map(|h| h.title), Some("C".to_string()));

    let range: Vec<NaiveDate> = f.planner.highlights_range(day(1), day(3)).iter().map(|h| h.date).collect();
    assert_eq!(range, vec![day(3), day(1)]);
    assert!(f.planner.highlight(a.id).is_some());
}

#[test]
fn reflection_lists_reviewed_recent_highlights() {
    let f = fixture_at(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap()));
    let old = f.planner.create_highlight(draft(day(1), "Old", None)).unwrap();
    let recent = f.planner.create_highlight(draft(day(8), "Recent", None)).unwrap();
    let unreviewed = f.planner.create_highlight(draft(day(9), "Skipped", None)).unwrap();
    f.planner.mark_highlight_reviewed(old.id).unwrap();
    f.planner.mark_highlight_reviewed(recent.id).unwrap();

    let history = f.planner.reflection_history(7);
    assert_eq!(history.iter().map(|h| h.id).collect::<Vec<_>>(), vec![recent.id]);
    assert!(!f.planner.is_highlight_reviewed(unreviewed.id));

    f.planner.delete_highlight(recent.id).unwrap();
    assert!(!f.planner.is_highlight_reviewed(recent.id));
    assert!(f.planner.reflection_history(7).is_empty());
}

#[test]
fn demotion_is_stamped_when_the_new_highlight_is_created() {
    let f = fixture();
    let a = f.planner.create_highlight(draft(day(1), "A", None)).unwrap();
    f.clock.advance(Duration::minutes(30));
    f.planner.create_highlight(draft(day(2), "B", None)).unwrap();

    let a = f.planner.highlight(a.id).unwrap();
    assert_eq!(a.completion, Completion::NotDone(f.clock.now()));
}

#[test]
fn deleting_a_demoted_highlight_leaves_task_with_active_link() {
    let f = fixture();
    let task = f.planner.create_task("Book venue", Bucket::SecondaryBurner).unwrap();
    let first = f.planner.create_highlight(draft(day(1), "Book venue", Some(task.id))).unwrap();
    f.clock.advance(Duration::minutes(5));
    let second = f.planner.create_highlight(draft(day(2), "Book venue", Some(task.id))).unwrap();

    assert!(f.planner.delete_highlight(first.id).unwrap());

    let task = f.planner.tasks().into_iter().find(|t| t.id == task.id).unwrap();
    assert_eq!(task.status, TaskStatus::Archived);
    assert_eq!(f.planner.active_highlight().map(|h| h.id), Some(second.id));
}

#[test]
fn not_done_on_a_demoted_highlight_leaves_task_with_active_link() {
    let f = fixture();
    let task = f.planner.create_task("Book venue", Bucket::SecondaryBurner).unwrap();
    let first = f.planner.create_highlight(draft(day(1), "Book venue", Some(task.id))).unwrap();
    f.clock.advance(Duration::minutes(5));
    f.planner.create_highlight(draft(day(2), "Book venue", Some(task.id))).unwrap();

    f.planner.mark_highlight_not_done(first.id).unwrap().unwrap();

    let task = f.planner.tasks().into_iter().find(|t| t.id == task.id).unwrap();
    assert_eq!(task.status, TaskStatus::Archived);
    assert!(f.planner.tasks_by_bucket(Bucket::SecondaryBurner).is_empty());
}

#[test]
fn upsert_without_calendar_link_clears_the_old_one() {
    let f = fixture();
    let mut d = draft(day(1), "Draft report", None);
    d.google_calendar_event_id = Some("evt-1".into());
    d.google_calendar_event_link = Some("https://calendar.example/evt-1".into());
    let h = f.planner.upsert_highlight(d).unwrap();

    let replaced = f.planner.upsert_highlight(draft(day(2), "Call client", None)).unwrap();

    assert_eq!(replaced.id, h.id);
    assert!(replaced.google_calendar_event_id.is_none());
    assert!(replaced.google_calendar_event_link.is_none());
}

#[test]
fn keep_for_tomorrow_on_unknown_id_is_none() {
    let f = fixture();
    f.planner.upsert_highlight(draft(day(1), "Draft report", None)).unwrap();

    assert!(f.planner.keep_highlight_for_tomorrow(Uuid::new_v4()).unwrap().is_none());
    assert_eq!(f.planner.highlights()[0].date, day(1));
}
