use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use kintai_core::clock::{civil_instant, CivilMonth};
use kintai_core::context::RequestContext;
use kintai_core::domain::shift::ShiftId;
use kintai_core::domain::user::{ProfileUpdate, UserId};
use kintai_core::errors::DomainError;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::blocks::MessageTemplate;
use crate::client::SlackApi;

/// Direct-message texts that open the menu. Matched exactly after trimming.
pub const MENU_KEYWORDS: [&str; 3] = ["menu", "メニュー", "めにゅー"];

/// Action ids carried by buttons and inputs in the bot's messages.
pub mod action {
    pub const START_WORK: &str = "start_work";
    pub const SAVE_START_TIME: &str = "save_start_time";
    pub const CANCEL_START_TIME: &str = "cancel_start_time";
    pub const END_WORK: &str = "end_work";
    pub const SAVE_END_TIME: &str = "save_end_time";
    pub const CANCEL_END_TIME: &str = "cancel_end_time";
    pub const UPDATE_ATTENDANCE: &str = "update_attendance";
    pub const ATTEND_YES: &str = "attend_yes";
    pub const ATTEND_NO: &str = "attend_no";
    pub const CHECK_ATTENDANCE: &str = "check_attendance";
    pub const USER_INFO: &str = "user_info";
    pub const EDIT_USER: &str = "edit_user";
    pub const SAVE_USER: &str = "save_user";
    pub const MONTHLY_REPORT: &str = "monthly_report";
    pub const MONTHLY_REPORT_PREV: &str = "monthly_report_prev";
    pub const MONTHLY_REPORT_NEXT: &str = "monthly_report_next";
    pub const DELETE_SHIFT: &str = "delete_shift";

    pub const START_DATE: &str = "datapicker";
    pub const START_TIME: &str = "timepicker";
    pub const END_DATE: &str = "end_datepicker";
    pub const END_TIME: &str = "end_timepicker";
    pub const BREAK_TIME: &str = "break_time_picker";
    pub const END_NOTE: &str = "end_comment_input";
    pub const PLAN_DATE: &str = "plan_datepicker";
    pub const PLAN_TIME: &str = "plan_timepicker";
    pub const PROFILE_CONTACT: &str = "profile_contact";
    pub const PROFILE_WORK_TYPE: &str = "profile_work_type";
    pub const PROFILE_TRANSPORTATION_COST: &str = "profile_transportation_cost";
    pub const PROFILE_HOURLY_WAGE: &str = "profile_hourly_wage";

    /// Inputs whose change events need an ack and nothing else.
    pub const INPUTS: [&str; 12] = [
        START_DATE,
        START_TIME,
        END_DATE,
        END_TIME,
        BREAK_TIME,
        END_NOTE,
        PLAN_DATE,
        PLAN_TIME,
        PROFILE_CONTACT,
        PROFILE_WORK_TYPE,
        PROFILE_TRANSPORTATION_COST,
        PROFILE_HOURLY_WAGE,
    ];

    /// Delete buttons of one report page share an actions block, so each
    /// carries its slot: `delete_shift_3`.
    pub fn delete_shift_slot(slot: usize) -> String {
        format!("{DELETE_SHIFT}_{slot}")
    }

    pub fn is_delete_shift(action_id: &str) -> bool {
        match action_id.strip_prefix(DELETE_SHIFT) {
            Some("") => true,
            Some(rest) => rest
                .strip_prefix('_')
                .is_some_and(|slot| !slot.is_empty() && slot.bytes().all(|b| b.is_ascii_digit())),
            None => false,
        }
    }
}

/// Values submitted with the end-of-shift form. Kept verbatim so a rejected
/// submission can be re-rendered as the user left it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EndForm {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub break_time: Option<NaiveTime>,
    pub note: Option<String>,
}

impl EndForm {
    /// The civil date and time when both are picked, otherwise `now`.
    pub fn end_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match (self.date, self.time) {
            (Some(date), Some(time)) => civil_instant(date, time),
            _ => now,
        }
    }

    /// The `HH:MM` break picker read as a duration.
    pub fn break_minutes(&self) -> u32 {
        self.break_time.map(|time| time.hour() * 60 + time.minute()).unwrap_or(0)
    }
}

/// Raw profile edit form. Numbers are parsed by [`ProfileForm::to_update`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProfileForm {
    pub contact: Option<String>,
    pub work_type: Option<String>,
    pub transportation_cost: Option<String>,
    pub hourly_wage: Option<String>,
}

impl ProfileForm {
    pub fn to_update(&self) -> Result<ProfileUpdate, DomainError> {
        let update = ProfileUpdate {
            contact: self.contact.clone(),
            work_type: self.work_type.clone(),
            transportation_cost: parse_amount(
                "transportation_cost",
                self.transportation_cost.as_deref(),
            )?,
            hourly_wage: parse_amount("hourly_wage", self.hourly_wage.as_deref())?,
        };
        update.validate()?;
        Ok(update)
    }
}

fn parse_amount(field: &str, raw: Option<&str>) -> Result<Option<Decimal>, DomainError> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(None);
    };
    let normalized = raw.replace(',', "");
    Decimal::from_str(&normalized).map(Some).map_err(|_| DomainError::InvalidProfileField {
        field: field.to_owned(),
        reason: format!("`{raw}` is not a number"),
    })
}

/// Everything the bot reacts to, decoded once from the Slack payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotCommand {
    ShowMenu,
    OpenStartForm,
    SubmitStart { date: Option<NaiveDate>, time: Option<NaiveTime> },
    CancelStart,
    OpenEndForm,
    SubmitEnd { form: EndForm },
    CancelEnd,
    OpenPlanForm,
    SubmitPlan { date: Option<NaiveDate>, will_attend: bool, planned_start: Option<String> },
    ShowOverview,
    ShowProfile,
    EditProfile,
    SaveProfile { form: ProfileForm },
    ShowMonthlyReport { month: Option<CivilMonth> },
    DeleteShift { shift_id: ShiftId, month: Option<CivilMonth> },
    Acknowledge,
    Unsupported { action_id: String },
}

impl BotCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ShowMenu => "show_menu",
            Self::OpenStartForm => "open_start_form",
            Self::SubmitStart { .. } => "submit_start",
            Self::CancelStart => "cancel_start",
            Self::OpenEndForm => "open_end_form",
            Self::SubmitEnd { .. } => "submit_end",
            Self::CancelEnd => "cancel_end",
            Self::OpenPlanForm => "open_plan_form",
            Self::SubmitPlan { .. } => "submit_plan",
            Self::ShowOverview => "show_overview",
            Self::ShowProfile => "show_profile",
            Self::EditProfile => "edit_profile",
            Self::SaveProfile { .. } => "save_profile",
            Self::ShowMonthlyReport { .. } => "show_monthly_report",
            Self::DeleteShift { .. } => "delete_shift",
            Self::Acknowledge => "acknowledge",
            Self::Unsupported { .. } => "unsupported",
        }
    }
}

/// One decoded user interaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub user_id: UserId,
    pub channel_id: String,
    /// Filled from `users.profile.get` before routing when available.
    pub display_name: Option<String>,
    pub command: BotCommand,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundPayload {
    UrlVerification { challenge: String },
    Envelope(SlackEnvelope),
    Ignored { reason: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("request body is not valid JSON: {0}")]
    MalformedJson(String),
    #[error("form body is not valid: {0}")]
    MalformedForm(String),
    #[error("form body has no `payload` field")]
    MissingPayload,
}

/// Decodes a `/slack/events` request body. Form bodies carry interactive
/// payloads, everything else is treated as Events API JSON.
pub fn decode_request(
    content_type: Option<&str>,
    body: &[u8],
) -> Result<InboundPayload, DecodeError> {
    let is_form = content_type
        .is_some_and(|value| value.trim_start().starts_with("application/x-www-form-urlencoded"));
    if is_form {
        let payload = form_payload(body)?;
        let interaction: InteractionPayload = serde_json::from_str(&payload)
            .map_err(|error| DecodeError::MalformedJson(error.to_string()))?;
        return Ok(decode_interaction(interaction));
    }

    let body: EventsApiBody = serde_json::from_slice(body)
        .map_err(|error| DecodeError::MalformedJson(error.to_string()))?;
    Ok(match body {
        EventsApiBody::UrlVerification { challenge } => {
            InboundPayload::UrlVerification { challenge }
        }
        EventsApiBody::EventCallback { event_id, event } => decode_event(event_id, event),
        EventsApiBody::Other => InboundPayload::Ignored { reason: "unsupported body type".into() },
    })
}

/// Interactive requests post `payload=<json>`; other form fields are ignored.
#[derive(Deserialize)]
struct InteractionForm {
    payload: Option<String>,
}

fn form_payload(body: &[u8]) -> Result<String, DecodeError> {
    let form: InteractionForm = serde_urlencoded::from_bytes(body)
        .map_err(|error| DecodeError::MalformedForm(error.to_string()))?;
    form.payload.ok_or(DecodeError::MissingPayload)
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum EventsApiBody {
    UrlVerification {
        challenge: String,
    },
    EventCallback {
        event_id: Option<String>,
        event: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct MessageEvent {
    #[serde(rename = "type")]
    kind: String,
    channel_type: Option<String>,
    subtype: Option<String>,
    bot_id: Option<String>,
    user: Option<String>,
    channel: Option<String>,
    text: Option<String>,
    ts: Option<String>,
}

fn decode_event(event_id: Option<String>, event: Value) -> InboundPayload {
    let ignored = |reason: &str| InboundPayload::Ignored { reason: reason.to_owned() };

    let Ok(message) = serde_json::from_value::<MessageEvent>(event) else {
        return ignored("event is not a message");
    };
    if message.kind != "message" {
        return ignored("event is not a message");
    }
    if message.subtype.is_some() || message.bot_id.is_some() {
        return ignored("message has a subtype or comes from a bot");
    }
    if message.channel_type.as_deref() != Some("im") {
        return ignored("message is not a direct message");
    }
    let (Some(user), Some(channel)) = (message.user, message.channel) else {
        return ignored("message has no sender");
    };
    let text = message.text.unwrap_or_default();
    if !MENU_KEYWORDS.contains(&text.trim()) {
        return ignored("message is not a menu keyword");
    }

    InboundPayload::Envelope(SlackEnvelope {
        envelope_id: event_id.or(message.ts).unwrap_or_else(|| "message".to_owned()),
        user_id: UserId(user),
        channel_id: channel,
        display_name: None,
        command: BotCommand::ShowMenu,
    })
}

#[derive(Deserialize)]
struct InteractionPayload {
    #[serde(rename = "type")]
    kind: String,
    user: PayloadUser,
    channel: Option<PayloadChannel>,
    container: Option<PayloadContainer>,
    trigger_id: Option<String>,
    #[serde(default)]
    actions: Vec<PayloadAction>,
    state: Option<PayloadState>,
}

#[derive(Deserialize)]
struct PayloadUser {
    id: String,
}

#[derive(Deserialize)]
struct PayloadChannel {
    id: String,
}

#[derive(Deserialize)]
struct PayloadContainer {
    channel_id: Option<String>,
}

#[derive(Deserialize)]
struct PayloadAction {
    action_id: String,
    value: Option<String>,
    action_ts: Option<String>,
}

#[derive(Deserialize)]
struct PayloadState {
    #[serde(default)]
    values: HashMap<String, HashMap<String, StateValue>>,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct StateValue {
    selected_date: Option<String>,
    selected_time: Option<String>,
    value: Option<String>,
}

/// `state.values` flattened by action id. Block ids are generated by Slack
/// for some blocks, so they are not used for lookup.
struct FormValues(HashMap<String, StateValue>);

impl FormValues {
    fn from_state(state: Option<PayloadState>) -> Self {
        let values = state
            .map(|state| state.values.into_values().flat_map(HashMap::into_iter).collect())
            .unwrap_or_default();
        Self(values)
    }

    fn date(&self, action_id: &str) -> Option<NaiveDate> {
        let raw = self.0.get(action_id)?.selected_date.as_deref()?;
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
    }

    fn time(&self, action_id: &str) -> Option<NaiveTime> {
        self.raw_time(action_id).and_then(|raw| NaiveTime::parse_from_str(raw, "%H:%M").ok())
    }

    fn raw_time(&self, action_id: &str) -> Option<&str> {
        self.0.get(action_id)?.selected_time.as_deref()
    }

    fn text(&self, action_id: &str) -> Option<String> {
        self.0.get(action_id)?.value.clone()
    }
}

fn decode_interaction(payload: InteractionPayload) -> InboundPayload {
    if payload.kind != "block_actions" {
        return InboundPayload::Ignored { reason: format!("interaction `{}`", payload.kind) };
    }
    let Some(action) = payload.actions.into_iter().next() else {
        return InboundPayload::Ignored { reason: "block_actions without actions".to_owned() };
    };

    let channel_id = payload
        .channel
        .map(|channel| channel.id)
        .or_else(|| payload.container.and_then(|container| container.channel_id))
        .unwrap_or_else(|| payload.user.id.clone());
    let envelope_id = payload
        .trigger_id
        .or_else(|| action.action_ts.clone())
        .unwrap_or_else(|| action.action_id.clone());
    let form = FormValues::from_state(payload.state);

    InboundPayload::Envelope(SlackEnvelope {
        envelope_id,
        user_id: UserId(payload.user.id),
        channel_id,
        display_name: None,
        command: decode_action(&action.action_id, action.value.as_deref(), &form),
    })
}

fn decode_action(action_id: &str, value: Option<&str>, form: &FormValues) -> BotCommand {
    match action_id {
        action::START_WORK => BotCommand::OpenStartForm,
        action::SAVE_START_TIME => BotCommand::SubmitStart {
            date: form.date(action::START_DATE),
            time: form.time(action::START_TIME),
        },
        action::CANCEL_START_TIME => BotCommand::CancelStart,
        action::END_WORK => BotCommand::OpenEndForm,
        action::SAVE_END_TIME => BotCommand::SubmitEnd {
            form: EndForm {
                date: form.date(action::END_DATE),
                time: form.time(action::END_TIME),
                break_time: form.time(action::BREAK_TIME),
                note: form.text(action::END_NOTE),
            },
        },
        action::CANCEL_END_TIME => BotCommand::CancelEnd,
        action::UPDATE_ATTENDANCE => BotCommand::OpenPlanForm,
        action::ATTEND_YES | action::ATTEND_NO => BotCommand::SubmitPlan {
            date: form.date(action::PLAN_DATE),
            will_attend: action_id == action::ATTEND_YES,
            planned_start: form.raw_time(action::PLAN_TIME).map(str::to_owned),
        },
        action::CHECK_ATTENDANCE => BotCommand::ShowOverview,
        action::USER_INFO => BotCommand::ShowProfile,
        action::EDIT_USER => BotCommand::EditProfile,
        action::SAVE_USER => BotCommand::SaveProfile {
            form: ProfileForm {
                contact: form.text(action::PROFILE_CONTACT),
                work_type: form.text(action::PROFILE_WORK_TYPE),
                transportation_cost: form.text(action::PROFILE_TRANSPORTATION_COST),
                hourly_wage: form.text(action::PROFILE_HOURLY_WAGE),
            },
        },
        action::MONTHLY_REPORT | action::MONTHLY_REPORT_PREV | action::MONTHLY_REPORT_NEXT => {
            BotCommand::ShowMonthlyReport { month: value.and_then(|raw| raw.parse().ok()) }
        }
        id if action::is_delete_shift(id) => match value.map(decode_delete_value) {
            Some((shift_id, month)) if !shift_id.as_str().is_empty() => {
                BotCommand::DeleteShift { shift_id, month }
            }
            _ => BotCommand::Unsupported { action_id: action_id.to_owned() },
        },
        other if action::INPUTS.contains(&other) => BotCommand::Acknowledge,
        other => BotCommand::Unsupported { action_id: other.to_owned() },
    }
}

/// Delete buttons carry `YYYY-MM:<shift id>` so the report can be re-rendered
/// for the month the user was looking at.
pub fn encode_delete_value(month: CivilMonth, shift_id: &ShiftId) -> String {
    format!("{month}:{}", shift_id.as_str())
}

fn decode_delete_value(raw: &str) -> (ShiftId, Option<CivilMonth>) {
    match raw.split_once(':') {
        Some((month, id)) => match month.parse::<CivilMonth>() {
            Ok(month) => (ShiftId(id.trim().to_owned()), Some(month)),
            Err(_) => (ShiftId(raw.trim().to_owned()), None),
        },
        None => (ShiftId(raw.trim().to_owned()), None),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(MessageTemplate),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("handler failure: {0}")]
    Handler(String),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &RequestContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

/// Runs one decoded envelope end to end: resolves the sender's display name,
/// routes the command and posts the reply.
#[derive(Clone)]
pub struct EventProcessor {
    handler: Arc<dyn EventHandler>,
    api: Arc<dyn SlackApi>,
}

impl EventProcessor {
    pub fn new(handler: Arc<dyn EventHandler>, api: Arc<dyn SlackApi>) -> Self {
        Self { handler, api }
    }

    pub async fn process(&self, mut envelope: SlackEnvelope) -> HandlerResult {
        let ctx = RequestContext::new(envelope.envelope_id.clone());
        let command = envelope.command.name();

        if !matches!(envelope.command, BotCommand::Acknowledge | BotCommand::Unsupported { .. }) {
            envelope.display_name = self.lookup_display_name(&envelope.user_id, &ctx).await;
        }

        let result = match self.handler.handle(&envelope, &ctx).await {
            Ok(result) => result,
            Err(error) => {
                warn!(
                    event_name = "slack.handler_failed",
                    correlation_id = %ctx.correlation_id,
                    user_id = %envelope.user_id.as_str(),
                    command,
                    error = %error,
                    "command handler failed"
                );
                return HandlerResult::Ignored;
            }
        };

        if let HandlerResult::Responded(message) = &result {
            match self.api.post_message(&envelope.channel_id, message).await {
                Ok(()) => info!(
                    event_name = "slack.replied",
                    correlation_id = %ctx.correlation_id,
                    user_id = %envelope.user_id.as_str(),
                    command,
                    "reply posted"
                ),
                Err(error) => warn!(
                    event_name = "slack.reply_failed",
                    correlation_id = %ctx.correlation_id,
                    user_id = %envelope.user_id.as_str(),
                    command,
                    error = %error,
                    "failed to post reply"
                ),
            }
        } else {
            debug!(
                event_name = "slack.no_reply",
                correlation_id = %ctx.correlation_id,
                command,
                "command produced no reply"
            );
        }
        result
    }

    async fn lookup_display_name(&self, user_id: &UserId, ctx: &RequestContext) -> Option<String> {
        match self.api.display_name(user_id).await {
            Ok(name) => name,
            Err(error) => {
                warn!(
                    event_name = "slack.profile_lookup_failed",
                    correlation_id = %ctx.correlation_id,
                    user_id = %user_id.as_str(),
                    error = %error,
                    "falling back to the user id as display name"
                );
                None
            }
        }
    }
}
