//! Meeting lifecycle: advancing a channel from one meeting to the next.
//!
//! An advance, in order: purge completed meetings → date the open meeting →
//! send its report in-channel → close it → open the next one. A channel
//! whose open meeting has no statuses is left untouched, so an idle team
//! doesn't accumulate empty meetings.

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use chrono_tz::Tz;
use scrumbot_core::error::{Result, ScrumError};
use scrumbot_core::message::{Message, RETRY_TEXT, Visibility};
use scrumbot_core::traits::Notifier;
use scrumbot_core::types::ChannelSchedule;

use crate::persistence::ScrumDb;
use crate::report::{compose_report, send_pages};

/// What an advance attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// No statuses on the open meeting; nothing changed.
    Skipped,
    Advanced {
        closed_meeting_id: i64,
        next_meeting_id: i64,
        pages_sent: usize,
    },
}

/// `now` with seconds and sub-seconds dropped.
pub fn truncate_to_minute(now: DateTime<Utc>) -> DateTime<Utc> {
    now.duration_trunc(TimeDelta::minutes(1)).unwrap_or(now)
}

/// Report pages for the channel's open meeting.
pub fn open_meeting_report(db: &ScrumDb, channel_id: &str, tz: Tz) -> Result<Vec<Message>> {
    let meeting = db
        .open_meeting(channel_id)?
        .ok_or_else(|| ScrumError::NotFound(format!("open meeting for channel {channel_id}")))?;
    let statuses = db.statuses_for_meeting(meeting.meeting_id)?;
    Ok(compose_report(&meeting, &statuses, tz))
}

/// Advance one channel's meeting cycle.
pub async fn advance_channel(
    db: &ScrumDb,
    notifier: &dyn Notifier,
    schedule: &ChannelSchedule,
    now: DateTime<Utc>,
) -> Result<AdvanceOutcome> {
    let channel_id = schedule.channel_id.as_str();

    if db.count_pending_statuses(channel_id)? <= 0 {
        tracing::debug!("⏭️ Channel {channel_id}: no statuses, meeting not advanced");
        return Ok(AdvanceOutcome::Skipped);
    }
    let tz = schedule.timezone()?;

    let purged = db.delete_completed_meetings(channel_id)?;
    if purged > 0 {
        tracing::debug!("🧹 Channel {channel_id}: purged {purged} completed meeting(s)");
    }

    db.update_meeting_date(channel_id, truncate_to_minute(now))?;

    let meeting = db
        .open_meeting(channel_id)?
        .ok_or_else(|| ScrumError::NotFound(format!("open meeting for channel {channel_id}")))?;
    let statuses = db.statuses_for_meeting(meeting.meeting_id)?;
    let pages = compose_report(&meeting, &statuses, tz);

    let pages_sent = send_pages(
        notifier,
        &schedule.webhook_url,
        channel_id,
        pages,
        Visibility::InChannel,
    )
    .await?;

    let next_meeting_id = db.close_and_open_next(channel_id)?;

    tracing::info!(
        "📣 Channel {channel_id}: meeting {} closed with {} status(es), next meeting {}",
        meeting.meeting_id,
        statuses.len(),
        next_meeting_id
    );

    Ok(AdvanceOutcome::Advanced {
        closed_meeting_id: meeting.meeting_id,
        next_meeting_id,
        pages_sent,
    })
}

/// Advance and absorb failure: the error is logged and the channel gets a
/// retry notice. Never returns an error, so sibling channels are unaffected.
pub async fn run_daily_scrum(
    db: &ScrumDb,
    notifier: &dyn Notifier,
    schedule: &ChannelSchedule,
    now: DateTime<Utc>,
) -> Option<AdvanceOutcome> {
    match advance_channel(db, notifier, schedule, now).await {
        Ok(outcome) => {
            tracing::info!(
                target: "scrumbot::access",
                kind = "DAILY_MSG",
                channel = %schedule.channel_id,
                "{:?}",
                outcome
            );
            Some(outcome)
        }
        Err(e) => {
            tracing::error!(kind = "DAILY_MSG_ERR", channel = %schedule.channel_id, "{e}");
            let notice = Message::text(RETRY_TEXT).in_channel();
            if let Err(e) = notifier
                .send(&schedule.webhook_url, &schedule.channel_id, &notice)
                .await
            {
                tracing::warn!("⚠️ Could not notify channel {}: {e}", schedule.channel_id);
            }
            None
        }
    }
}
