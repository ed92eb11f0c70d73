//! Schedule matching: which channels hold their scrum at this instant.
//!
//! Each schedule is evaluated in its own timezone: local hour and minute
//! must match exactly and the local weekday must be in the schedule's day
//! set. Only the first second of a minute counts, so one minute produces
//! at most one match per channel.

use chrono::{DateTime, Datelike, Timelike, Utc};
use scrumbot_core::types::ChannelSchedule;

/// Is this schedule due at `now`?
pub fn is_due(schedule: &ChannelSchedule, now: DateTime<Utc>) -> bool {
    if now.second() != 0 {
        return false;
    }

    let tz = match schedule.timezone() {
        Ok(tz) => tz,
        Err(e) => {
            tracing::warn!("⚠️ Channel {} has a bad schedule: {e}", schedule.channel_id);
            return false;
        }
    };

    let local = now.with_timezone(&tz);
    local.hour() == schedule.hour
        && local.minute() == schedule.minute
        && schedule.days_of_week.contains(local.weekday())
}

/// Filter the schedules due at `now`. The list is expected to be freshly
/// loaded on every tick; nothing is cached here.
pub fn due_schedules(schedules: &[ChannelSchedule], now: DateTime<Utc>) -> Vec<&ChannelSchedule> {
    if now.second() != 0 {
        return Vec::new();
    }
    schedules.iter().filter(|s| is_due(s, now)).collect()
}
