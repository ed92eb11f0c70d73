//! Status submission resolver.
//!
//! Decides whether a member writing a status gets the write form for the
//! upcoming meeting or a chooser over missed meetings, and classifies what a
//! submission did once it is stored.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use scrumbot_core::error::{Result, ScrumError};
use scrumbot_core::types::{MeetingWithStatus, StatusSubmission, date_label};

use crate::persistence::ScrumDb;

/// One button of the date chooser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateChoice {
    pub meeting_id: i64,
    /// `MM/DD` or `Next`.
    pub label: String,
}

/// Pre-filled write form.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusDraft {
    pub meeting_id: i64,
    pub yesterday_work: String,
    pub today_work: String,
    pub blocker: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteEntry {
    /// The member has backlog; let them pick the meeting.
    ChooseDate(Vec<DateChoice>),
    Dialog(StatusDraft),
}

/// What a stored submission turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionKind {
    /// First entry for the upcoming meeting.
    Write,
    /// Overwrote an existing entry.
    Edit,
    /// First entry for an older meeting.
    Late { meeting_at: Option<DateTime<Utc>> },
}

/// Pick the entry point for a member from the channel's meetings (ascending
/// id, each joined with the member's own status).
pub fn resolve_entry(meetings: &[MeetingWithStatus], tz: Tz) -> Result<WriteEntry> {
    let Some(newest) = meetings.last() else {
        return Err(ScrumError::NotFound("no meetings for channel".into()));
    };

    let required = meetings.len() as i64 - 2;
    let written = meetings.iter().filter(|m| m.my_status.is_some()).count() as i64;

    if written <= required {
        let choices = meetings
            .iter()
            .map(|m| DateChoice {
                meeting_id: m.meeting_id,
                label: date_label(m.meeting_at, tz),
            })
            .collect();
        return Ok(WriteEntry::ChooseDate(choices));
    }

    let previous = meetings.len().checked_sub(2).and_then(|i| meetings.get(i));
    let carried = previous
        .and_then(|m| m.my_status.as_ref())
        .map(|s| s.today_work.clone())
        .unwrap_or_default();

    let draft = match &newest.my_status {
        Some(own) => StatusDraft {
            meeting_id: newest.meeting_id,
            yesterday_work: own.yesterday_work.clone(),
            today_work: own.today_work.clone(),
            blocker: own.blocker.clone().unwrap_or_default(),
        },
        None => StatusDraft {
            meeting_id: newest.meeting_id,
            yesterday_work: carried,
            ..Default::default()
        },
    };
    Ok(WriteEntry::Dialog(draft))
}

/// Load the member's view of the channel and resolve it.
pub fn resolve_for_member(
    db: &ScrumDb,
    channel_id: &str,
    member: &str,
    tz: Tz,
) -> Result<WriteEntry> {
    let meetings = db.meetings_with_member_status(channel_id, member)?;
    resolve_entry(&meetings, tz)
}

/// Classify a submission for `meeting_id` against the member's state before
/// it was stored.
pub fn classify(before: &[MeetingWithStatus], meeting_id: i64) -> Result<SubmissionKind> {
    let target = before
        .iter()
        .find(|m| m.meeting_id == meeting_id)
        .ok_or_else(|| ScrumError::NotFound(format!("meeting {meeting_id}")))?;

    if target.my_status.is_some() {
        return Ok(SubmissionKind::Edit);
    }
    let newest = before.last().map(|m| m.meeting_id);
    if newest == Some(meeting_id) {
        Ok(SubmissionKind::Write)
    } else {
        Ok(SubmissionKind::Late {
            meeting_at: target.meeting_at,
        })
    }
}

/// Store a member's status and report what kind of write it was. Meetings
/// that don't belong to the channel (or were purged) are rejected.
pub fn submit(
    db: &ScrumDb,
    channel_id: &str,
    member: &str,
    meeting_id: i64,
    submission: &StatusSubmission,
) -> Result<SubmissionKind> {
    let before = db.meetings_with_member_status(channel_id, member)?;
    let kind = classify(&before, meeting_id)?;
    db.upsert_status(meeting_id, member, submission)?;
    tracing::debug!("📝 {member} → meeting {meeting_id} in {channel_id}: {kind:?}");
    Ok(kind)
}
