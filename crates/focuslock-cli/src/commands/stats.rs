use chrono::{DateTime, Local};
use focuslock_core::{calculate_stats_at, Config, SessionRecord};

use super::{open_scheduler, print_json, CommandResult};

pub fn run(today: bool, config: &Config) -> CommandResult {
    let (scheduler, _) = open_scheduler(config)?;
    let now = Local::now();

    let stats = if today {
        let todays: Vec<SessionRecord> = scheduler
            .sessions()
            .iter()
            .filter(|r| ended_on(r, &now))
            .cloned()
            .collect();
        calculate_stats_at(&todays, &now)
    } else {
        scheduler.stats_at(&now)
    };
    print_json(&stats)
}

fn ended_on(record: &SessionRecord, now: &DateTime<Local>) -> bool {
    record
        .end_time
        .or(record.start_time)
        .and_then(|ms| DateTime::from_timestamp_millis(ms as i64))
        .is_some_and(|t| t.with_timezone(&Local).date_naive() == now.date_naive())
}
