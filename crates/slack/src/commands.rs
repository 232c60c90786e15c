use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use kintai_core::accounting::compute_worked_hours;
use kintai_core::clock::{
    civil_date_of, civil_datetime_of, civil_instant, CivilMonth, Clock, InstantRange,
};
use kintai_core::context::RequestContext;
use kintai_core::directory::UserDirectory;
use kintai_core::domain::shift::ShiftId;
use kintai_core::domain::user::{User, UserId};
use kintai_core::errors::ApplicationError;
use kintai_core::overview::{OverviewAggregator, DEFAULT_WINDOW_DAYS};
use kintai_core::scheduler::AttendanceScheduler;
use kintai_core::shift_engine::{CloseShiftRequest, ShiftAccountingEngine};
use tracing::{debug, info, warn};

use crate::blocks::MessageTemplate;
use crate::events::{
    BotCommand, EndForm, EventHandler, EventHandlerError, HandlerResult, ProfileForm,
    SlackEnvelope,
};
use crate::views;

/// Services a command can touch. Cloned per router; each one is `Arc`-backed.
#[derive(Clone)]
pub struct CommandServices {
    pub shifts: ShiftAccountingEngine,
    pub scheduler: AttendanceScheduler,
    pub overview: OverviewAggregator,
    pub directory: UserDirectory,
    pub clock: Arc<dyn Clock>,
}

/// Maps each [`BotCommand`] onto the engines and renders the reply.
///
/// User-correctable failures come back as a re-rendered form with an inline
/// message. Persistence failures become a generic "try again later" card.
pub struct CommandRouter {
    services: CommandServices,
    overview_window_days: u32,
}

impl CommandRouter {
    pub fn new(services: CommandServices) -> Self {
        Self { services, overview_window_days: DEFAULT_WINDOW_DAYS }
    }

    pub fn with_overview_window(mut self, days: u32) -> Self {
        self.overview_window_days = days;
        self
    }

    pub async fn route(
        &self,
        envelope: &SlackEnvelope,
        ctx: &RequestContext,
    ) -> Result<HandlerResult, ApplicationError> {
        let user_id = &envelope.user_id;
        let command = &envelope.command;

        if let BotCommand::Acknowledge = command {
            return Ok(HandlerResult::Processed);
        }
        if let BotCommand::Unsupported { action_id } = command {
            debug!(
                event_name = "slack.unsupported_action",
                correlation_id = %ctx.correlation_id,
                user_id = %user_id.as_str(),
                action_id = %action_id,
                "ignoring unknown action"
            );
            return Ok(HandlerResult::Ignored);
        }

        let user = self
            .services
            .directory
            .ensure_user(user_id, envelope.display_name.as_deref().unwrap_or_default(), ctx)
            .await?;

        let message = match command {
            BotCommand::ShowMenu => self.menu(user_id, ctx).await?,
            BotCommand::CancelStart => views::notice(
                "開始日時の選択がキャンセルされました。メニューに戻ります。",
            )
            .followed_by(self.menu(user_id, ctx).await?),
            BotCommand::CancelEnd => views::notice("退勤入力をキャンセルしました。メニューに戻ります。")
                .followed_by(self.menu(user_id, ctx).await?),
            BotCommand::OpenStartForm => {
                let now = civil_datetime_of(self.services.clock.now());
                views::start_form(now.date(), now.time())
            }
            BotCommand::SubmitStart { date, time } => {
                self.submit_start(user_id, *date, *time, ctx).await?
            }
            BotCommand::OpenEndForm => {
                let open = self.services.shifts.open_shift_today(user_id, ctx).await?;
                views::end_form(
                    &EndForm::default(),
                    self.services.clock.now(),
                    open.map(|record| record.start_at),
                    None,
                )
            }
            BotCommand::SubmitEnd { form } => self.submit_end(user_id, form, ctx).await?,
            BotCommand::OpenPlanForm => views::plan_form(self.services.clock.today(), None),
            BotCommand::SubmitPlan { date, will_attend, planned_start } => {
                self.submit_plan(user_id, *date, *will_attend, planned_start.as_deref(), ctx).await?
            }
            BotCommand::ShowOverview => {
                let users = self.services.directory.list_users().await?;
                let now = self.services.clock.now();
                let overview = self
                    .services
                    .overview
                    .build_overview(&users, now, self.overview_window_days, ctx)
                    .await?;
                views::overview(&overview)
            }
            BotCommand::ShowProfile => views::profile_card(&user),
            BotCommand::EditProfile => views::profile_form_for(&user),
            BotCommand::SaveProfile { form } => self.save_profile(&user, form, ctx).await?,
            BotCommand::ShowMonthlyReport { month } => self.report(user_id, *month, ctx).await?,
            BotCommand::DeleteShift { shift_id, month } => {
                self.delete_shift(user_id, shift_id, *month, ctx).await?
            }
            BotCommand::Acknowledge | BotCommand::Unsupported { .. } => {
                return Ok(HandlerResult::Ignored)
            }
        };

        info!(
            event_name = "slack.command_handled",
            correlation_id = %ctx.correlation_id,
            user_id = %user_id.as_str(),
            command = command.name(),
            "command handled"
        );
        Ok(HandlerResult::Responded(message))
    }

    async fn menu(
        &self,
        user_id: &UserId,
        ctx: &RequestContext,
    ) -> Result<MessageTemplate, ApplicationError> {
        let has_open = self.services.shifts.has_open_shift_today(user_id, ctx).await?;
        Ok(views::menu(has_open))
    }

    async fn submit_start(
        &self,
        user_id: &UserId,
        date: Option<NaiveDate>,
        time: Option<NaiveTime>,
        ctx: &RequestContext,
    ) -> Result<MessageTemplate, ApplicationError> {
        let (Some(date), Some(time)) = (date, time) else {
            return Ok(views::notice(
                "開始日時の選択を取得できませんでした。もう一度お試しください。",
            ));
        };

        self.services.shifts.start_shift(user_id, civil_instant(date, time), None, ctx).await?;
        Ok(views::notice(format!(
            "開始を登録しました: {} {}",
            date.format("%Y-%m-%d"),
            time.format("%H:%M")
        )))
    }

    async fn submit_end(
        &self,
        user_id: &UserId,
        form: &EndForm,
        ctx: &RequestContext,
    ) -> Result<MessageTemplate, ApplicationError> {
        let now = self.services.clock.now();
        let request = CloseShiftRequest {
            end_at: form.end_at(now),
            break_minutes: Some(form.break_minutes()),
            note: form.note.clone(),
        };

        match self.services.shifts.close_shift(user_id, request, ctx).await {
            Ok(record) => {
                let end_at = record.end_at.unwrap_or(now);
                let worked =
                    compute_worked_hours(&record, &InstantRange::new(record.start_at, end_at));
                let picked = form.date.is_some() && form.time.is_some();
                Ok(views::notice(views::end_saved(&record, picked, &worked))
                    .followed_by(self.menu(user_id, ctx).await?))
            }
            Err(ApplicationError::Domain(error)) => {
                let open = self.services.shifts.open_shift_today(user_id, ctx).await?;
                Ok(views::end_form(
                    form,
                    now,
                    open.map(|record| record.start_at),
                    Some(&views::domain_error_text(&error)),
                ))
            }
            Err(other) => Err(other),
        }
    }

    async fn submit_plan(
        &self,
        user_id: &UserId,
        date: Option<NaiveDate>,
        will_attend: bool,
        planned_start: Option<&str>,
        ctx: &RequestContext,
    ) -> Result<MessageTemplate, ApplicationError> {
        let date = date.unwrap_or_else(|| self.services.clock.today());
        match self.services.scheduler.set_plan(user_id, date, will_attend, planned_start, ctx).await
        {
            Ok(plan) => {
                let day = date.format("%Y-%m-%d");
                Ok(views::notice(match (plan.will_attend, plan.planned_start) {
                    (true, Some(start)) => format!("出勤予定を保存しました: {day} {start}〜"),
                    (true, None) => format!("出勤予定を保存しました: {day}"),
                    (false, _) => format!("休み予定を保存しました: {day}"),
                }))
            }
            Err(ApplicationError::Domain(error)) => {
                Ok(views::plan_form(date, Some(&views::domain_error_text(&error))))
            }
            Err(other) => Err(other),
        }
    }

    async fn save_profile(
        &self,
        user: &User,
        form: &ProfileForm,
        ctx: &RequestContext,
    ) -> Result<MessageTemplate, ApplicationError> {
        let update = match form.to_update() {
            Ok(update) => update,
            Err(error) => {
                return Ok(views::profile_form(form, Some(&views::domain_error_text(&error))))
            }
        };
        let saved =
            self.services.directory.update_profile(&user.id, &user.display_name, update, ctx).await;
        match saved {
            Ok(saved) => Ok(views::notice("ユーザー情報を保存しました。")
                .followed_by(views::profile_card(&saved))),
            Err(ApplicationError::Domain(error)) => {
                Ok(views::profile_form(form, Some(&views::domain_error_text(&error))))
            }
            Err(other) => Err(other),
        }
    }

    async fn report(
        &self,
        user_id: &UserId,
        month: Option<CivilMonth>,
        ctx: &RequestContext,
    ) -> Result<MessageTemplate, ApplicationError> {
        let month = month.unwrap_or_else(|| CivilMonth::containing(self.services.clock.now()));
        let total = self.services.shifts.monthly_total(user_id, month, ctx).await?;
        Ok(views::monthly_report(&total))
    }

    async fn delete_shift(
        &self,
        user_id: &UserId,
        shift_id: &ShiftId,
        month: Option<CivilMonth>,
        ctx: &RequestContext,
    ) -> Result<MessageTemplate, ApplicationError> {
        let owned = self
            .services
            .shifts
            .find_shift(shift_id)
            .await?
            .filter(|record| &record.user_id == user_id);
        let Some(record) = owned else {
            warn!(
                event_name = "shift.delete_rejected",
                correlation_id = %ctx.correlation_id,
                user_id = %user_id.as_str(),
                shift_id = %shift_id.as_str(),
                "shift missing or owned by another user"
            );
            return Ok(views::notice("削除対象の勤務記録が見つかりませんでした。")
                .followed_by(self.report(user_id, month, ctx).await?));
        };

        self.services.shifts.delete_shift(&record.id, ctx).await?;
        let month = month.unwrap_or_else(|| CivilMonth::of(civil_date_of(record.start_at)));
        Ok(views::notice("勤務記録を削除しました。")
            .followed_by(self.report(user_id, Some(month), ctx).await?))
    }
}

#[async_trait]
impl EventHandler for CommandRouter {
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &RequestContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        match self.route(envelope, ctx).await {
            Ok(result) => Ok(result),
            Err(error) => {
                let correctable = error.is_user_correctable();
                let interface = error.into_interface(ctx.correlation_id.clone());
                warn!(
                    event_name = "slack.command_failed",
                    correlation_id = %ctx.correlation_id,
                    user_id = %envelope.user_id.as_str(),
                    command = envelope.command.name(),
                    correctable,
                    error = %interface,
                    "command failed"
                );
                let text =
                    if correctable { views::INVALID_INPUT_TEXT } else { views::UNAVAILABLE_TEXT };
                Ok(HandlerResult::Responded(views::error_message(text, interface.correlation_id())))
            }
        }
    }
}
