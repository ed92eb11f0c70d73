//! API route handlers for the gateway.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use scrumbot_core::error::{Result, ScrumError};
use scrumbot_core::message::{Message, Visibility};
use scrumbot_core::types::{ChannelSchedule, StatusSubmission, member_mention};
use scrumbot_scheduler::lifecycle::open_meeting_report;
use scrumbot_scheduler::report::send_pages;
use scrumbot_scheduler::status::{self, SubmissionKind, WriteEntry};
use std::sync::Arc;

use crate::request::{CallbackId, CommandRequest, FieldError, InteractionRequest, SetupForm};
use crate::server::AppState;
use crate::templates::{self, MASTER_ACTION, MEETING_ACTION};

/// What a handler answers the messenger with.
#[derive(Debug, PartialEq)]
pub enum Reply {
    Message(Message),
    /// Bare 200; the real answer (if any) goes out through a response URL.
    Empty,
    Forbidden,
    /// Dialog field errors; the dialog stays open.
    Errors(Vec<FieldError>),
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        match self {
            Reply::Message(message) => Json(message).into_response(),
            Reply::Empty => StatusCode::OK.into_response(),
            Reply::Forbidden => StatusCode::FORBIDDEN.into_response(),
            Reply::Errors(errors) => Json(serde_json::json!({ "errors": errors })).into_response(),
        }
    }
}

/// Access log line for a handled request.
fn access(kind: &str, tenant: &str, channel: &str, user: &str) {
    tracing::info!(target: "scrumbot::access", kind, tenant, channel, user, "SCRUM");
}

fn authorized(state: &AppState, token: &str) -> bool {
    !state.config.app_token.is_empty() && token == state.config.app_token
}

/// Log the outcome under `kind`; failures become the retry message.
fn respond(kind: &str, who: (&str, &str, &str), result: Result<Reply>) -> Reply {
    let (tenant, channel, user) = who;
    match result {
        Ok(reply) => {
            access(kind, tenant, channel, user);
            reply
        }
        Err(e) => {
            tracing::error!(kind = %format!("{kind}_ERR"), tenant, channel, user, "{e}");
            Reply::Message(templates::error())
        }
    }
}

/// Report a failure through the response URL; the HTTP reply stays empty.
async fn fail_via_response_url(
    state: &AppState,
    kind: &str,
    req: &InteractionRequest,
    err: ScrumError,
) -> Reply {
    tracing::error!(kind = %format!("{kind}_ERR"), channel = %req.channel.id, "{err}");
    let notice = templates::error().replace_original(false);
    if let Err(e) = state
        .notifier
        .send(&req.response_url, &req.channel.id, &notice)
        .await
    {
        tracing::warn!("⚠️ Could not deliver error notice: {e}");
    }
    Reply::Empty
}

// ─── Slash commands ────────────────────────────────────

/// `POST /`: slash command entry point.
pub async fn handle_command(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CommandRequest>,
) -> Reply {
    if !authorized(&state, &req.app_token) {
        tracing::error!(kind = "APP_TOKEN_ERROR", channel = %req.channel_id, "Rejected command token");
        return Reply::Forbidden;
    }
    let who = (req.tenant_id.as_str(), req.channel_id.as_str(), req.user_id.as_str());

    match req.text.trim() {
        "" => respond("CALL_WRITE_DIALOG", who, call_write_dialog(&state, &req).await),
        "setup" | "config" => respond("CALL_SETUP_DIALOG", who, call_setup_dialog(&state, &req).await),
        "info" => respond("INFO", who, scrum_info(&state, &req)),
        "status" | "list" => status_command(state.clone(), &req),
        "delete" => respond("DELETE", who, delete_scrum(&state, &req)),
        _ => {
            access("HELP", who.0, who.1, who.2);
            Reply::Message(templates::help())
        }
    }
}

async fn call_write_dialog(state: &AppState, req: &CommandRequest) -> Result<Reply> {
    let Some(schedule) = state.db.get_scrum(&req.channel_id)? else {
        return Ok(Reply::Message(templates::not_set_up()));
    };
    if !req.response_url.is_empty() {
        state.db.update_webhook(&req.channel_id, &req.response_url)?;
    }

    let tz = schedule.timezone()?;
    match status::resolve_for_member(&state.db, &req.channel_id, &req.member(), tz)? {
        WriteEntry::ChooseDate(choices) => Ok(Reply::Message(templates::choose_date(&choices))),
        WriteEntry::Dialog(draft) => {
            let dialog = templates::write_dialog(&draft);
            state
                .notifier
                .open_dialog(&req.tenant(), &req.channel_id, &req.trigger_id, &dialog)
                .await?;
            Ok(Reply::Empty)
        }
    }
}

async fn call_setup_dialog(state: &AppState, req: &CommandRequest) -> Result<Reply> {
    let current = state.db.get_scrum(&req.channel_id)?;
    if let Some(schedule) = &current {
        if !schedule.is_master(&req.member()) {
            return Ok(Reply::Message(templates::cant_edit_delete(&schedule.master_mention)));
        }
    }

    let dialog = templates::setup_dialog(current.as_ref());
    state
        .notifier
        .open_dialog(&req.tenant(), &req.channel_id, &req.trigger_id, &dialog)
        .await?;
    Ok(Reply::Empty)
}

fn scrum_info(state: &AppState, req: &CommandRequest) -> Result<Reply> {
    Ok(Reply::Message(match state.db.get_scrum(&req.channel_id)? {
        Some(schedule) => templates::info(&schedule),
        None => templates::not_set_up(),
    }))
}

fn delete_scrum(state: &AppState, req: &CommandRequest) -> Result<Reply> {
    let Some(schedule) = state.db.get_scrum(&req.channel_id)? else {
        return Ok(Reply::Message(templates::not_set_up()));
    };
    let member = req.member();
    if !schedule.is_master(&member) {
        return Ok(Reply::Message(templates::cant_edit_delete(&schedule.master_mention)));
    }
    state.db.delete_scrum(&req.channel_id)?;
    tracing::info!("🗑️ Daily scrum deleted in channel {}", req.channel_id);
    Ok(Reply::Message(templates::scrum_deleted(&member)))
}

/// Acknowledge immediately; the report pages follow on the response URL.
fn status_command(state: Arc<AppState>, req: &CommandRequest) -> Reply {
    let who = (req.tenant_id.as_str(), req.channel_id.as_str(), req.user_id.as_str());
    let schedule = match state.db.get_scrum(&req.channel_id) {
        Ok(Some(schedule)) => schedule,
        Ok(None) => return Reply::Message(templates::not_set_up()),
        Err(e) => return respond("STATUS", who, Err(e)),
    };
    access("STATUS", who.0, who.1, who.2);

    let response_url = req.response_url.clone();
    tokio::spawn(async move {
        send_status_pages(&state, &schedule, &response_url).await;
    });
    Reply::Empty
}

/// Send the open meeting's report, only visible to the requester.
pub async fn send_status_pages(state: &AppState, schedule: &ChannelSchedule, response_url: &str) {
    let channel_id = schedule.channel_id.as_str();
    let result = async {
        let pages = open_meeting_report(&state.db, channel_id, schedule.timezone()?)?;
        send_pages(
            state.notifier.as_ref(),
            response_url,
            channel_id,
            pages,
            Visibility::Ephemeral,
        )
        .await
    }
    .await;

    if let Err(e) = result {
        tracing::error!(kind = "STATUS_ERR", channel = channel_id, "{e}");
        let notice = templates::error().replace_original(false);
        if let Err(e) = state.notifier.send(response_url, channel_id, &notice).await {
            tracing::warn!("⚠️ Could not deliver error notice: {e}");
        }
    }
}

// ─── Interactions ──────────────────────────────────────

/// `POST /req`: dialog submissions and message actions.
pub async fn handle_interaction(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InteractionRequest>,
) -> Reply {
    // Dialog submissions are not signed by the messenger.
    if !req.is_dialog_submission() && !authorized(&state, &req.app_token) {
        tracing::error!(kind = "APP_TOKEN_ERROR", channel = %req.channel.id, "Rejected interaction token");
        return Reply::Forbidden;
    }
    let who = (req.tenant.id.as_str(), req.channel.id.as_str(), req.user.id.as_str());

    if req.is_dialog_submission() {
        return match req.callback_id.parse::<CallbackId>() {
            Ok(CallbackId::Setup) => submit_setup_dialog(&state, &req).await,
            Ok(CallbackId::Status(meeting_id)) => {
                match submit_status(&state, &req, meeting_id).await {
                    Ok(reply) => {
                        access("SUBMIT_WRITE_DIALOG", who.0, who.1, who.2);
                        reply
                    }
                    Err(e) => fail_via_response_url(&state, "SUBMIT_WRITE_DIALOG", &req, e).await,
                }
            }
            _ => {
                tracing::warn!("⚠️ Unhandled dialog callback: {}", req.callback_id);
                Reply::Empty
            }
        };
    }

    match req.action_name.as_str() {
        MEETING_ACTION => respond("CHOOSE_DATE", who, choose_date(&state, &req).await),
        MASTER_ACTION => respond("SUBMIT_SETUP_MASTER", who, select_master(&state, &req)),
        other => {
            tracing::warn!("⚠️ Unhandled action: {other}");
            Reply::Empty
        }
    }
}

/// Decode the setup dialog values. An unreadable body falls back to an
/// empty form, so the dialog reports every field as missing.
fn setup_form(submission: &serde_json::Value) -> SetupForm {
    serde_json::from_value(submission.clone()).unwrap_or_else(|e| {
        tracing::warn!("⚠️ Unreadable setup submission ({e}): {submission}");
        SetupForm::default()
    })
}

async fn submit_setup_dialog(state: &AppState, req: &InteractionRequest) -> Reply {
    let form = setup_form(&req.submission);
    let setup = match form.validate() {
        Ok(setup) => setup,
        Err(errors) => return Reply::Errors(errors),
    };

    let result = async {
        let current = state.db.get_scrum(&req.channel.id)?;
        let key = state.sessions.insert(&req.channel.id, setup);
        let prompt = templates::master_select(current.as_ref().map(|s| s.master_mention.as_str()), &key);
        state
            .notifier
            .send(&req.response_url, &req.channel.id, &prompt)
            .await
    }
    .await;

    match result {
        Ok(()) => {
            access("SUBMIT_SETUP_DIALOG", &req.tenant.id, &req.channel.id, &req.user.id);
            Reply::Empty
        }
        Err(e) => fail_via_response_url(state, "SUBMIT_SETUP_DIALOG", req, e).await,
    }
}

async fn submit_status(state: &AppState, req: &InteractionRequest, meeting_id: i64) -> Result<Reply> {
    let channel_id = req.channel.id.as_str();
    let schedule = state
        .db
        .get_scrum(channel_id)?
        .ok_or_else(|| ScrumError::NotFound(format!("scrum for channel {channel_id}")))?;
    let tz = schedule.timezone()?;

    let submission: StatusSubmission = serde_json::from_value(req.submission.clone())?;
    let submission = submission.normalized();
    let member = req.member();

    let reply = match status::submit(&state.db, channel_id, &member, meeting_id, &submission)? {
        SubmissionKind::Write => templates::wrote_status(&member),
        SubmissionKind::Edit => templates::edited_status(),
        SubmissionKind::Late { meeting_at } => {
            templates::late_status(&member, meeting_at, tz, &submission)
        }
    };
    state.notifier.send(&req.response_url, channel_id, &reply).await?;
    Ok(Reply::Empty)
}

/// A date chooser button: open an empty form for that meeting and drop the
/// chooser message.
async fn choose_date(state: &AppState, req: &InteractionRequest) -> Result<Reply> {
    let meeting_id: i64 = req
        .action_value
        .parse()
        .map_err(|_| ScrumError::InvalidInput(format!("meeting id: {}", req.action_value)))?;
    let meeting = state
        .db
        .get_meeting(meeting_id)?
        .filter(|m| m.channel_id == req.channel.id)
        .ok_or_else(|| ScrumError::NotFound(format!("meeting {meeting_id}")))?;

    let dialog = templates::write_dialog(&status::StatusDraft {
        meeting_id: meeting.meeting_id,
        ..Default::default()
    });
    state
        .notifier
        .open_dialog(&req.tenant(), &req.channel.id, &req.trigger_id, &dialog)
        .await?;
    Ok(Reply::Message(templates::delete_original()))
}

/// Master selection: commits the parked setup.
fn select_master(state: &AppState, req: &InteractionRequest) -> Result<Reply> {
    let channel_id = req.channel.id.as_str();
    let member = req.member();

    let current = state.db.get_scrum(channel_id)?;
    if let Some(schedule) = &current {
        if !schedule.is_master(&member) {
            return Ok(Reply::Message(templates::cant_edit_delete(&schedule.master_mention)));
        }
    }

    let key = match req.callback_id.parse::<CallbackId>()? {
        CallbackId::SetupSession(key) => key,
        other => return Err(ScrumError::InvalidInput(format!("not a setup session: {other}"))),
    };
    let setup = state
        .sessions
        .get(&key, channel_id)
        .ok_or_else(|| ScrumError::NotFound(format!("setup session {key}")))?;

    // "Not change" sends the current master mention back verbatim.
    let master_mention = match &current {
        Some(schedule) if schedule.is_master(&req.action_value) => schedule.master_mention.clone(),
        _ => member_mention(&req.tenant.id, &req.action_value),
    };

    let schedule = ChannelSchedule {
        channel_id: channel_id.to_string(),
        master_mention,
        days_of_week: setup.days_of_week,
        hour: setup.hour,
        minute: setup.minute,
        timezone_name: setup.timezone_name,
        webhook_url: req.response_url.clone(),
    };
    let created = state.db.upsert_scrum(&schedule)?;
    if created {
        state.db.insert_next_meeting(channel_id)?;
        tracing::info!("📅 Daily scrum set up in channel {channel_id}");
    }
    state.sessions.remove(&key);

    let creator = created.then_some(member.as_str());
    Ok(Reply::Message(templates::setup_done(creator, &schedule)))
}

// ─── Health ────────────────────────────────────────────

/// `GET /health-check`: 503 while the maintenance marker exists.
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    let maintenance = tokio::fs::try_exists(&state.config.health.maintenance_file)
        .await
        .unwrap_or(false);
    if maintenance {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT OK")
    } else {
        (StatusCode::OK, "OK")
    }
}
