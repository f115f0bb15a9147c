//! Session statistics.
//!
//! [`calculate_stats`] is a pure function over the session history. Every
//! "completed" count uses [`is_completed`], which classifies by timing rather
//! than by the flags stored on the record.

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{Phase, SessionRecord};

/// Slack (ms) around the expected end within which a session still counts
/// as completed.
pub const COMPLETION_TOLERANCE_MS: u64 = 5_000;

/// Aggregate metrics over a session history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_sessions: u64,
    pub completed_sessions: u64,
    /// Percent of all sessions that completed.
    pub completion_rate: f64,
    /// Minutes.
    pub total_focus_time: u64,
    /// Minutes.
    pub total_break_time: u64,
    /// Minutes per focus session.
    pub avg_session_length: f64,
    /// Minutes per break session.
    pub avg_break_length: f64,
    pub current_streak: u64,
    pub longest_streak: u64,
    pub todays_sessions: u64,
    pub emergency_stops: u64,
    pub early_stops: u64,
    pub focus_efficiency: f64,
    pub session_consistency: f64,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            total_sessions: 0,
            completed_sessions: 0,
            completion_rate: 0.0,
            total_focus_time: 0,
            total_break_time: 0,
            avg_session_length: 0.0,
            avg_break_length: 0.0,
            current_streak: 0,
            longest_streak: 0,
            todays_sessions: 0,
            emergency_stops: 0,
            early_stops: 0,
            focus_efficiency: 100.0,
            session_consistency: 100.0,
        }
    }
}

/// Completed iff start, end and expected duration are all known and the end
/// falls within the tolerance window of the expected end. Ending a full
/// tolerance early is not a completion.
pub fn is_completed(record: &SessionRecord) -> bool {
    let (Some(end), Some(expected_end)) = (record.end_time, record.expected_end_time()) else {
        return false;
    };
    let early_by = expected_end.saturating_sub(end);
    let late_by = end.saturating_sub(expected_end);
    early_by < COMPLETION_TOLERANCE_MS && late_by <= COMPLETION_TOLERANCE_MS
}

/// Ended before the tolerance window opened.
fn ended_early(record: &SessionRecord) -> bool {
    match (record.end_time, record.expected_end_time()) {
        (Some(end), Some(expected_end)) => expected_end.saturating_sub(end) >= COMPLETION_TOLERANCE_MS,
        _ => false,
    }
}

/// Statistics relative to the local calendar day.
pub fn calculate_stats(sessions: &[SessionRecord]) -> Stats {
    calculate_stats_at(sessions, &Local::now())
}

/// Statistics with "today" taken from `now`'s calendar day in its own time zone.
pub fn calculate_stats_at<Tz: TimeZone>(sessions: &[SessionRecord], now: &DateTime<Tz>) -> Stats {
    let mut stats = Stats::default();
    if sessions.is_empty() {
        return stats;
    }

    let today = now.date_naive();
    let tz = now.timezone();

    let mut focus_secs = 0u64;
    let mut break_secs = 0u64;
    let mut focus_count = 0u64;
    let mut break_count = 0u64;
    let mut completed_focus = 0u64;
    let mut consistency_sum = 0.0f64;
    let mut run = 0u64;

    for record in sessions {
        let completed = is_completed(record);
        stats.total_sessions += 1;
        if completed {
            stats.completed_sessions += 1;
        }
        if record.emergency_stop {
            stats.emergency_stops += 1;
        } else if !completed && ended_early(record) {
            stats.early_stops += 1;
        }

        if let Some(ts) = record.end_time.or(record.start_time) {
            if let Some(utc) = DateTime::<Utc>::from_timestamp_millis(ts as i64) {
                if utc.with_timezone(&tz).date_naive() == today {
                    stats.todays_sessions += 1;
                }
            }
        }

        match record.phase {
            Phase::Focus => {
                focus_count += 1;
                focus_secs = focus_secs.saturating_add(record.actual_duration);
                if completed {
                    completed_focus += 1;
                    consistency_sum += consistency(record);
                    run += 1;
                    stats.longest_streak = stats.longest_streak.max(run);
                } else {
                    run = 0;
                }
            }
            Phase::ShortBreak | Phase::LongBreak => {
                break_count += 1;
                break_secs = break_secs.saturating_add(record.actual_duration);
            }
        }
    }

    stats.current_streak = sessions
        .iter()
        .rev()
        .filter(|r| r.phase == Phase::Focus)
        .take_while(|r| is_completed(r))
        .count() as u64;

    stats.total_focus_time = secs_to_minutes(focus_secs);
    stats.total_break_time = secs_to_minutes(break_secs);
    stats.completion_rate = finite_or(
        stats.completed_sessions as f64 / stats.total_sessions as f64 * 100.0,
        0.0,
    );
    stats.avg_session_length = finite_or(focus_secs as f64 / 60.0 / focus_count as f64, 0.0);
    stats.avg_break_length = finite_or(break_secs as f64 / 60.0 / break_count as f64, 0.0);
    stats.focus_efficiency = finite_or(completed_focus as f64 / focus_count as f64 * 100.0, 100.0);
    stats.session_consistency =
        finite_or(consistency_sum / completed_focus as f64 * 100.0, 100.0);
    stats
}

/// `1 - |1 - actual/expected|`, clamped to `[0, 1]`.
fn consistency(record: &SessionRecord) -> f64 {
    let expected = record.expected_duration.unwrap_or(0) as f64;
    let ratio = record.actual_duration as f64 / expected;
    finite_or(1.0 - (1.0 - ratio).abs(), 0.0).clamp(0.0, 1.0)
}

fn secs_to_minutes(secs: u64) -> u64 {
    secs.saturating_add(30) / 60
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}
