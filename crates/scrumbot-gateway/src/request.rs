//! Inbound request bodies from the messenger, plus callback-id routing and
//! setup form validation.

use scrumbot_core::error::ScrumError;
use scrumbot_core::traits::TenantContext;
use scrumbot_core::types::{DaySet, member_mention, parse_timezone};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Ids arrive as strings or numbers depending on the messenger version.
fn lenient_id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!("expected an id, got {other}"))),
    }
}

/// Slash command request (`POST /`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRequest {
    #[serde(default, deserialize_with = "lenient_id")]
    pub tenant_id: String,
    #[serde(default)]
    pub tenant_domain: String,
    #[serde(default, deserialize_with = "lenient_id")]
    pub channel_id: String,
    #[serde(default, deserialize_with = "lenient_id")]
    pub user_id: String,
    /// Sub-verb after the command, e.g. `setup`.
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub response_url: String,
    #[serde(default)]
    pub app_token: String,
    #[serde(default)]
    pub cmd_token: String,
    #[serde(default)]
    pub trigger_id: String,
}

impl CommandRequest {
    pub fn member(&self) -> String {
        member_mention(&self.tenant_id, &self.user_id)
    }

    pub fn tenant(&self) -> TenantContext {
        TenantContext {
            domain: self.tenant_domain.clone(),
            cmd_token: self.cmd_token.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TenantRef {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default)]
    pub domain: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdRef {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: String,
}

/// Interactive component request (`POST /req`): dialog submissions and
/// message button/select actions.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionRequest {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub tenant: TenantRef,
    #[serde(default)]
    pub channel: IdRef,
    #[serde(default)]
    pub user: IdRef,
    #[serde(default)]
    pub callback_id: String,
    #[serde(default)]
    pub submission: Value,
    #[serde(default)]
    pub action_name: String,
    #[serde(default, deserialize_with = "lenient_id")]
    pub action_value: String,
    #[serde(default)]
    pub response_url: String,
    #[serde(default)]
    pub app_token: String,
    #[serde(default)]
    pub cmd_token: String,
    #[serde(default)]
    pub trigger_id: String,
}

impl InteractionRequest {
    pub fn is_dialog_submission(&self) -> bool {
        self.kind == "dialog_submission"
    }

    pub fn member(&self) -> String {
        member_mention(&self.tenant.id, &self.user.id)
    }

    pub fn tenant(&self) -> TenantContext {
        TenantContext {
            domain: self.tenant.domain.clone(),
            cmd_token: self.cmd_token.clone(),
        }
    }
}

/// Structured callback ids carried by dialogs and attachments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackId {
    Setup,
    Status(i64),
    ChooseDate(i64),
    SetupSession(String),
}

impl std::fmt::Display for CallbackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallbackId::Setup => write!(f, "setup"),
            CallbackId::Status(id) => write!(f, "status-{id}"),
            CallbackId::ChooseDate(id) => write!(f, "chooseDate-{id}"),
            CallbackId::SetupSession(key) => write!(f, "setupSession-{key}"),
        }
    }
}

impl std::str::FromStr for CallbackId {
    type Err = ScrumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ScrumError::InvalidInput(format!("Unknown callback id: {s}"));
        if s == "setup" {
            return Ok(CallbackId::Setup);
        }
        let (prefix, rest) = s.split_once('-').ok_or_else(bad)?;
        match prefix {
            "status" => rest.parse().map(CallbackId::Status).map_err(|_| bad()),
            "chooseDate" => rest.parse().map(CallbackId::ChooseDate).map_err(|_| bad()),
            "setupSession" if !rest.is_empty() => Ok(CallbackId::SetupSession(rest.to_string())),
            _ => Err(bad()),
        }
    }
}

/// Raw setup dialog values.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupForm {
    #[serde(default)]
    pub timezone_name: String,
    #[serde(default, deserialize_with = "lenient_id")]
    pub hour: String,
    #[serde(default, deserialize_with = "lenient_id")]
    pub minute: String,
    #[serde(default)]
    pub days_of_week: String,
}

/// A validated setup, waiting for the master selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupRequest {
    pub timezone_name: String,
    pub hour: u32,
    pub minute: u32,
    pub days_of_week: DaySet,
}

/// Field-level dialog error (`{"name": .., "error": ..}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub name: String,
    pub error: String,
}

impl FieldError {
    fn new(name: &str, error: &str) -> Self {
        Self {
            name: name.into(),
            error: error.into(),
        }
    }
}

fn parse_in_range(raw: &str, max: u32) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|v| *v <= max)
}

impl SetupForm {
    /// Validate every field; all problems are reported at once.
    pub fn validate(&self) -> Result<SetupRequest, Vec<FieldError>> {
        let mut errors = Vec::new();

        let hour = parse_in_range(&self.hour, 23);
        if hour.is_none() {
            errors.push(FieldError::new("hour", "Must be 0 ~ 23"));
        }
        let minute = parse_in_range(&self.minute, 59);
        if minute.is_none() {
            errors.push(FieldError::new("minute", "Must be 0 ~ 59"));
        }
        if parse_timezone(&self.timezone_name).is_err() {
            errors.push(FieldError::new("timezoneName", "Unknown timezone"));
        }
        let days = self.days_of_week.parse::<DaySet>().ok();
        if days.is_none() {
            errors.push(FieldError::new("daysOfWeek", "Choose Weekday, Weekend or Everyday"));
        }

        match (hour, minute, days) {
            (Some(hour), Some(minute), Some(days_of_week)) if errors.is_empty() => Ok(SetupRequest {
                timezone_name: self.timezone_name.clone(),
                hour,
                minute,
                days_of_week,
            }),
            _ => Err(errors),
        }
    }
}
