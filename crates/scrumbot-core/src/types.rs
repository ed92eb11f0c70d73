//! Daily scrum domain model: channel schedules, meeting instances and the
//! status entries members submit for them.

use chrono::{DateTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScrumError};

/// Days of the week a channel holds its scrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DaySet {
    Everyday,
    Weekday,
    Weekend,
}

impl DaySet {
    /// The weekdays this set expands to.
    pub fn days(&self) -> &'static [Weekday] {
        use Weekday::*;
        match self {
            DaySet::Everyday => &[Mon, Tue, Wed, Thu, Fri, Sat, Sun],
            DaySet::Weekday => &[Mon, Tue, Wed, Thu, Fri],
            DaySet::Weekend => &[Sat, Sun],
        }
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.days().contains(&day)
    }

    /// Stored / displayed label.
    pub fn as_str(&self) -> &'static str {
        match self {
            DaySet::Everyday => "EVERYDAY",
            DaySet::Weekday => "WEEKDAY",
            DaySet::Weekend => "WEEKEND",
        }
    }

    pub fn all() -> [DaySet; 3] {
        [DaySet::Weekday, DaySet::Weekend, DaySet::Everyday]
    }
}

impl std::fmt::Display for DaySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DaySet {
    type Err = ScrumError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EVERYDAY" => Ok(DaySet::Everyday),
            "WEEKDAY" => Ok(DaySet::Weekday),
            "WEEKEND" => Ok(DaySet::Weekend),
            other => Err(ScrumError::InvalidInput(format!("Unknown day set: {other}"))),
        }
    }
}

/// Parse an IANA timezone name.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| ScrumError::InvalidInput(format!("Unknown timezone: {name}")))
}

/// Mention string identifying a member on the messenger. Masters and status
/// authors are stored in this form.
pub fn member_mention(tenant_id: &str, user_id: &str) -> String {
    format!("(dooray://{tenant_id}/members/{user_id} \"member\")")
}

/// Per-channel scrum schedule. At most one per channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSchedule {
    pub channel_id: String,
    pub master_mention: String,
    pub days_of_week: DaySet,
    pub hour: u32,
    pub minute: u32,
    pub timezone_name: String,
    /// Incoming webhook the daily report is posted to.
    pub webhook_url: String,
}

impl ChannelSchedule {
    pub fn timezone(&self) -> Result<Tz> {
        parse_timezone(&self.timezone_name)
    }

    pub fn is_master(&self, mention: &str) -> bool {
        self.master_mention == mention
    }

    /// `HH:MM (Zone/Name)`.
    pub fn time_label(&self) -> String {
        format!("{:02}:{:02} ({})", self.hour, self.minute, self.timezone_name)
    }
}

/// One occurrence of a channel's scrum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingInstance {
    pub meeting_id: i64,
    pub channel_id: String,
    /// `None` while the meeting is still the upcoming one.
    pub meeting_at: Option<DateTime<Utc>>,
    pub completed: bool,
}

impl MeetingInstance {
    pub fn date_label(&self, tz: Tz) -> String {
        date_label(self.meeting_at, tz)
    }
}

/// `MM/DD` in the channel timezone, or `Next` for an undated meeting.
pub fn date_label(meeting_at: Option<DateTime<Utc>>, tz: Tz) -> String {
    match meeting_at {
        Some(at) => at.with_timezone(&tz).format("%m/%d").to_string(),
        None => "Next".into(),
    }
}

/// A member's status for one meeting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub meeting_id: i64,
    pub member_mention: String,
    pub yesterday_work: String,
    pub today_work: String,
    pub blocker: Option<String>,
}

impl StatusEntry {
    /// Blocker text, if the member actually wrote one.
    pub fn blocker(&self) -> Option<&str> {
        self.blocker.as_deref().map(str::trim).filter(|b| !b.is_empty())
    }
}

/// What a member types into the status dialog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSubmission {
    #[serde(default)]
    pub yesterday_work: String,
    #[serde(default)]
    pub today_work: String,
    #[serde(default)]
    pub blocker: Option<String>,
}

impl StatusSubmission {
    pub fn blocker(&self) -> Option<&str> {
        self.blocker.as_deref().map(str::trim).filter(|b| !b.is_empty())
    }

    /// Blank blockers stored as absent.
    pub fn normalized(mut self) -> Self {
        self.blocker = self.blocker().map(String::from);
        self
    }
}

/// A channel meeting joined with one member's own entry (left join).
#[derive(Debug, Clone, PartialEq)]
pub struct MeetingWithStatus {
    pub meeting_id: i64,
    pub meeting_at: Option<DateTime<Utc>>,
    pub my_status: Option<StatusEntry>,
}
