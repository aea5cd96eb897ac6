/*
Collection invariants for highlights and tasks.
Pure functions, independent from storage / sync / HTTP for testing
*/

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Timelike, Utc};
use uuid::Uuid;

use crate::models::{Bucket, Completion, DailyHighlight, Task, TaskStatus};

// true when `next` should replace `current` for the same id:
// later updated_at wins, tie -> later created_at
pub fn is_more_recent(next: &DailyHighlight, current: &DailyHighlight) -> bool {
    if next.updated_at != current.updated_at {
        return next.updated_at > current.updated_at;
    }
    next.created_at > current.created_at
}

pub fn pick_most_recent<'a, I>(highlights: I) -> Option<&'a DailyHighlight>
where
    I: IntoIterator<Item = &'a DailyHighlight>,
{
    let mut winner: Option<&DailyHighlight> = None;
    for h in highlights {
        if winner.is_none_or(|w| is_more_recent(h, w)) {
            winner = Some(h);
        }
    }
    winner
}

// Canonical order:
// 1) active first
// 2) date desc
// 3) updated_at desc
// 4) created_at desc
fn canonical_order(a: &DailyHighlight, b: &DailyHighlight) -> Ordering {
    b.is_active()
        .cmp(&a.is_active())
        .then_with(|| b.date.cmp(&a.date))
        .then_with(|| b.updated_at.cmp(&a.updated_at))
        .then_with(|| b.created_at.cmp(&a.created_at))
}

/// Dedupe by id keeping the most recent copy, then sort canonically.
///
/// First-seen position is kept for each id so the stable sort makes the
/// result independent of how many times this runs.
pub fn normalize_highlights(highlights: Vec<DailyHighlight>) -> Vec<DailyHighlight> {
    let mut slots: HashMap<Uuid, usize> = HashMap::new();
    let mut unique: Vec<DailyHighlight> = Vec::with_capacity(highlights.len());

    for h in highlights {
        match slots.get(&h.id) {
            Some(&idx) => {
                if is_more_recent(&h, &unique[idx]) {
                    unique[idx] = h;
                }
            }
            None => {
                slots.insert(h.id, unique.len());
                unique.push(h);
            }
        }
    }

    unique.sort_by(canonical_order);
    unique
}

/// Keep at most one active highlight: the most recent one stays, the rest
/// become NotDone. Only `completion` changes; `updated_at` is left alone.
pub fn enforce_single_active_highlight(mut highlights: Vec<DailyHighlight>) -> Vec<DailyHighlight> {
    let keep = {
        let active: Vec<&DailyHighlight> = highlights.iter().filter(|h| h.is_active()).collect();
        if active.len() <= 1 {
            return highlights;
        }
        match pick_most_recent(active) {
            Some(h) => h.id,
            None => return highlights,
        }
    };

    for h in highlights.iter_mut().filter(|h| h.is_active() && h.id != keep) {
        h.completion = Completion::NotDone(h.updated_at);
    }
    highlights
}

/// Normalize, enforce a single active record, and re-sort so demoted records
/// leave the active group. Applied to every highlight read and write.
pub fn prepare_highlights(highlights: Vec<DailyHighlight>) -> Vec<DailyHighlight> {
    let mut prepared = enforce_single_active_highlight(normalize_highlights(highlights));
    prepared.sort_by(canonical_order);
    prepared
}

/// Non-archived tasks of a bucket, in display order.
pub fn tasks_in_bucket(tasks: &[Task], bucket: Bucket) -> Vec<Task> {
    let mut listed: Vec<Task> = tasks
        .iter()
        .filter(|t| t.bucket == bucket && !t.is_archived())
        .cloned()
        .collect();
    listed.sort_by_key(|t| t.order_index);
    listed
}

// Slot after every non-archived task already in `bucket`
pub fn next_bucket_order_index(tasks: &[Task], bucket: Bucket, exclude: Option<Uuid>) -> i64 {
    tasks
        .iter()
        .filter(|t| t.bucket == bucket)
        .filter(|t| !t.is_archived())
        .filter(|t| Some(t.id) != exclude)
        .count() as i64
}

/// Archive a task because a highlight now holds it. Returns whether anything changed.
pub fn archive_task_for_highlight(tasks: &mut [Task], task_id: Uuid, now: DateTime<Utc>) -> bool {
    let Some(t) = tasks.iter_mut().find(|t| t.id == task_id) else {
        return false;
    };
    if t.is_archived() {
        return false;
    }
    t.status = TaskStatus::Archived;
    t.updated_at = now;
    true
}

/// Give a task back to its bucket once its highlight link is gone.
pub fn restore_task_from_highlight(tasks: &mut [Task], task_id: Uuid, now: DateTime<Utc>) -> bool {
    let Some(idx) = tasks.iter().position(|t| t.id == task_id) else {
        return false;
    };
    let order_index = next_bucket_order_index(tasks, tasks[idx].bucket, Some(task_id));

    let t = &mut tasks[idx];
    if t.status == TaskStatus::Todo && t.order_index == order_index {
        return false;
    }
    t.status = TaskStatus::Todo;
    t.order_index = order_index;
    t.updated_at = now;
    true
}

// Parse a "HH:MM" string into (hour, minute).
pub fn parse_hhmm(hhmm: &str) -> Option<(u32, u32)> {
    let (h, m) = hhmm.split_once(':')?;
    let h: u32 = h.trim().parse().ok()?;
    let m: u32 = m.trim().parse().ok()?;
    if h > 23 || m > 59 {
        return None;
    }
    Some((h, m))
}

/// Instant for `date` at wall-clock `hhmm` in `offset`.
pub fn build_scheduled_at(date: NaiveDate, hhmm: &str, offset: FixedOffset) -> Option<DateTime<Utc>> {
    let (h, m) = parse_hhmm(hhmm)?;
    let naive = date.and_hms_opt(h, m, 0)?;
    let local = offset.from_local_datetime(&naive).single()?;
    Some(local.with_timezone(&Utc))
}

/// "HH:MM" of an instant as seen in `offset`.
pub fn local_time_of_day(at: DateTime<Utc>, offset: FixedOffset) -> String {
    let local = at.with_timezone(&offset);
    format!("{:02}:{:02}", local.hour(), local.minute())
}

pub fn is_overdue(highlight: &DailyHighlight, now: DateTime<Utc>) -> bool {
    highlight.is_active() && highlight.scheduled_at <= now
}
