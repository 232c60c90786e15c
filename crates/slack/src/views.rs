//! Messages the bot posts. Texts are Japanese, as the team uses them.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use kintai_core::accounting::{MonthlyTotal, WorkedTime};
use kintai_core::clock::civil_datetime_of;
use kintai_core::domain::attendance::AttendanceStatus;
use kintai_core::domain::shift::ShiftRecord;
use kintai_core::domain::user::User;
use kintai_core::errors::DomainError;
use kintai_core::overview::{AttendanceOverview, OverviewDay};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::blocks::{ButtonElement, ButtonStyle, Element, MessageBuilder, MessageTemplate};
use crate::events::{action, encode_delete_value, EndForm, ProfileForm};

pub const INVALID_INPUT_TEXT: &str = "入力内容を確認して、もう一度お試しください。";
pub const UNAVAILABLE_TEXT: &str = "ただいま処理できません。しばらくしてから再度お試しください。";

/// Slack rejects messages with more blocks than this.
pub const MAX_BLOCKS: usize = 50;
/// Character limit of a section's text.
pub const SECTION_TEXT_LIMIT: usize = 3000;

const REPORT_ENTRIES_PER_PAGE: usize = 10;
// Header, omission note, total and navigation leave room for this many
// entry sections with their delete buttons.
const MAX_REPORT_PAGES: usize = (MAX_BLOCKS - 4) / 2;
const DAY_SEPARATOR: &str = "\n\n";

/// Start button while no shift is open today, end button otherwise.
pub fn menu(has_open_shift: bool) -> MessageTemplate {
    MessageBuilder::new("項目を選択してください。")
        .header("kintai.menu.header.v1", "勤怠メニュー")
        .actions("kintai.menu.primary.v1", |actions| {
            if has_open_shift {
                actions.button(ButtonElement::new(action::END_WORK, "退勤"));
            } else {
                actions.button(
                    ButtonElement::new(action::START_WORK, "出勤開始").style(ButtonStyle::Primary),
                );
            }
        })
        .actions("kintai.menu.secondary.v1", |actions| {
            actions
                .button(ButtonElement::new(action::UPDATE_ATTENDANCE, "出勤更新"))
                .button(ButtonElement::new(action::CHECK_ATTENDANCE, "出勤確認"))
                .button(ButtonElement::new(action::USER_INFO, "ユーザー情報"))
                .button(ButtonElement::new(action::MONTHLY_REPORT, "月次レポート"));
        })
        .build()
}

pub fn start_form(date: NaiveDate, time: NaiveTime) -> MessageTemplate {
    MessageBuilder::new("開始時間を選択してください。")
        .header("kintai.start.header.v1", "開始日時を選択")
        .actions("kintai.start.pickers.v1", |actions| {
            actions
                .element(Element::datepicker(action::START_DATE, Some(date)))
                .element(Element::timepicker(action::START_TIME, Some(time)));
        })
        .actions("kintai.start.submit.v1", |actions| {
            actions
                .button(
                    ButtonElement::new(action::SAVE_START_TIME, "決定").style(ButtonStyle::Primary),
                )
                .button(ButtonElement::new(action::CANCEL_START_TIME, "キャンセル"));
        })
        .build()
}

/// End-of-shift form. Values already in `form` are kept; the rest default to
/// `now` in civil time, no break and an empty note.
pub fn end_form(
    form: &EndForm,
    now: DateTime<Utc>,
    open_start: Option<DateTime<Utc>>,
    error: Option<&str>,
) -> MessageTemplate {
    let civil_now = civil_datetime_of(now);
    let header = match open_start.map(civil_datetime_of) {
        Some(start) => format!(
            "終了日時を選択 ({}/{} {}開始)",
            start.month(),
            start.day(),
            start.format("%H:%M")
        ),
        None => "終了日時を選択".to_owned(),
    };

    let mut builder =
        MessageBuilder::new("終了日時を選択してください。").header("kintai.end.header.v1", header);
    if let Some(error) = error {
        builder = builder.section("kintai.end.error.v1", |section| {
            section.mrkdwn(format!("❌ {error}"));
        });
    }

    builder
        .actions("kintai.end.pickers.v1", |actions| {
            actions
                .element(Element::datepicker(
                    action::END_DATE,
                    Some(form.date.unwrap_or(civil_now.date())),
                ))
                .element(Element::timepicker(
                    action::END_TIME,
                    Some(form.time.unwrap_or(civil_now.time())),
                ));
        })
        .section("kintai.end.break.v1", |section| {
            section.mrkdwn("*休憩時間を選択（HH:MM形式）*").accessory(Element::timepicker(
                action::BREAK_TIME,
                Some(form.break_time.unwrap_or(NaiveTime::MIN)),
            ));
        })
        .input(
            "kintai.end.note.v1",
            "コメント",
            text_input(action::END_NOTE, form.note.as_deref(), true, Some("業務内容を入力してください（必須）")),
            false,
        )
        .actions("kintai.end.submit.v1", |actions| {
            actions
                .button(
                    ButtonElement::new(action::SAVE_END_TIME, "決定").style(ButtonStyle::Primary),
                )
                .button(ButtonElement::new(action::CANCEL_END_TIME, "キャンセル"));
        })
        .build()
}

pub fn end_saved(record: &ShiftRecord, picked: bool, worked: &WorkedTime) -> String {
    let end = record.end_at.map(civil_datetime_of);
    let when = match (picked, end) {
        (true, Some(end)) => end.format("%Y-%m-%d %H:%M").to_string(),
        _ => "現在時刻".to_owned(),
    };
    let worked = match worked.hours() {
        Some(hours) => format!("{}時間", format_hours(hours)),
        None => "計算不可".to_owned(),
    };
    format!(
        "退勤を保存しました: {when}\n休憩: {}\n勤務時間: {worked}",
        format_break(record.break_minutes.unwrap_or(0))
    )
}

pub fn plan_form(date: NaiveDate, error: Option<&str>) -> MessageTemplate {
    let mut builder = MessageBuilder::new("出勤予定の選択").section("kintai.plan.prompt.v1", |section| {
        section.mrkdwn("出勤予定を選択してください（開始予定時刻は任意）");
    });
    if let Some(error) = error {
        builder = builder.section("kintai.plan.error.v1", |section| {
            section.mrkdwn(format!("❌ {error}"));
        });
    }

    builder
        .actions("kintai.plan.pickers.v1", |actions| {
            actions
                .element(Element::datepicker(action::PLAN_DATE, Some(date)))
                .element(Element::timepicker(action::PLAN_TIME, None));
        })
        .actions("kintai.plan.submit.v1", |actions| {
            actions
                .button(ButtonElement::new(action::ATTEND_YES, "出勤").style(ButtonStyle::Primary))
                .button(ButtonElement::new(action::ATTEND_NO, "休み").style(ButtonStyle::Danger));
        })
        .build()
}

pub fn overview(overview: &AttendanceOverview) -> MessageTemplate {
    let mut builder =
        MessageBuilder::new("出勤確認").header("kintai.overview.header.v1", "出勤確認（火/金）");

    if overview.is_empty() {
        return builder
            .section("kintai.overview.empty.v1", |section| {
                section.mrkdwn("対象期間にデータがありません。");
            })
            .build();
    }

    let days = overview.days.iter().map(|day| clip(&overview_day(day), SECTION_TEXT_LIMIT));
    let chunks = pack_texts(days, DAY_SEPARATOR, SECTION_TEXT_LIMIT);
    // Header plus the omission note.
    let max_sections = MAX_BLOCKS - 2;
    let hidden: usize = chunks.iter().skip(max_sections).map(Vec::len).sum();

    for (index, chunk) in chunks.iter().take(max_sections).enumerate() {
        builder = builder.section(format!("kintai.overview.days.{index}"), |section| {
            section.mrkdwn(chunk.join(DAY_SEPARATOR));
        });
    }
    if hidden > 0 {
        builder = builder.context("kintai.overview.omitted.v1", |context| {
            context.plain(format!("ほか {hidden}日分は表示しきれません。"));
        });
    }
    builder.build()
}

fn overview_day(day: &OverviewDay) -> String {
    let lines = day
        .entries
        .iter()
        .map(|entry| format!("{}: {}", entry.display_name, status_label(&entry.status)))
        .collect::<Vec<_>>();
    let body = if lines.is_empty() { "（ユーザーがいません）".to_owned() } else { lines.join("\n") };
    format!("*{} ({})*\n{body}", day.date.format("%Y-%m-%d"), weekday_label(day.date.weekday()))
}

/// `出勤`, `出勤 HH:MM〜`, `休み` or `未報告`.
pub fn status_label(status: &AttendanceStatus) -> String {
    match status {
        AttendanceStatus::Attending { planned_start: Some(start) } => format!("出勤 {start}〜"),
        AttendanceStatus::Attending { planned_start: None } => "出勤".to_owned(),
        AttendanceStatus::Off => "休み".to_owned(),
        AttendanceStatus::Unreported => "未報告".to_owned(),
    }
}

pub fn profile_card(user: &User) -> MessageTemplate {
    let amount = |value: Option<Decimal>| value.map(|v| v.normalize().to_string());
    MessageBuilder::new("ユーザー情報")
        .header("kintai.profile.header.v1", "ユーザー情報")
        .section("kintai.profile.fields.v1", |section| {
            section
                .field(format!("*名前*\n{}", user.display_name))
                .field(format!("*連絡先*\n{}", or_dash(user.contact.clone())))
                .field(format!("*勤務形態*\n{}", or_dash(user.work_type.clone())))
                .field(format!("*交通費*\n{}", or_dash(amount(user.transportation_cost))))
                .field(format!("*時給*\n{}", or_dash(amount(user.hourly_wage))));
        })
        .actions("kintai.profile.actions.v1", |actions| {
            actions.button(ButtonElement::new(action::EDIT_USER, "編集"));
        })
        .build()
}

pub fn profile_form(form: &ProfileForm, error: Option<&str>) -> MessageTemplate {
    let mut builder = MessageBuilder::new("ユーザー編集").header("kintai.profile_edit.header.v1", "ユーザー情報の編集");
    if let Some(error) = error {
        builder = builder.section("kintai.profile_edit.error.v1", |section| {
            section.mrkdwn(format!("❌ {error}"));
        });
    }

    builder
        .input(
            "kintai.profile_edit.contact.v1",
            "連絡先",
            text_input(action::PROFILE_CONTACT, form.contact.as_deref(), false, None),
            true,
        )
        .input(
            "kintai.profile_edit.work_type.v1",
            "勤務形態",
            text_input(action::PROFILE_WORK_TYPE, form.work_type.as_deref(), false, None),
            true,
        )
        .input(
            "kintai.profile_edit.transportation_cost.v1",
            "交通費",
            text_input(
                action::PROFILE_TRANSPORTATION_COST,
                form.transportation_cost.as_deref(),
                false,
                None,
            ),
            true,
        )
        .input(
            "kintai.profile_edit.hourly_wage.v1",
            "時給",
            text_input(action::PROFILE_HOURLY_WAGE, form.hourly_wage.as_deref(), false, None),
            true,
        )
        .actions("kintai.profile_edit.submit.v1", |actions| {
            actions.button(ButtonElement::new(action::SAVE_USER, "保存").style(ButtonStyle::Primary));
        })
        .build()
}

/// The stored profile as an edit form.
pub fn profile_form_for(user: &User) -> MessageTemplate {
    let form = ProfileForm {
        contact: user.contact.clone(),
        work_type: user.work_type.clone(),
        transportation_cost: user.transportation_cost.map(|v| v.normalize().to_string()),
        hourly_wage: user.hourly_wage.map(|v| v.normalize().to_string()),
    };
    profile_form(&form, None)
}

/// Entries are numbered and listed ten per section, each section followed by
/// an actions block with one delete button per entry.
pub fn monthly_report(total: &MonthlyTotal) -> MessageTemplate {
    let month = total.month;
    let mut builder = MessageBuilder::new(format!("{month} の勤務記録"))
        .header("kintai.report.header.v1", format!("月次レポート {month}"));

    if total.entries.is_empty() {
        builder = builder.section("kintai.report.empty.v1", |section| {
            section.mrkdwn("この月の勤務記録はありません。");
        });
    }

    let line_limit = (SECTION_TEXT_LIMIT - REPORT_ENTRIES_PER_PAGE) / REPORT_ENTRIES_PER_PAGE;
    let pages = total.entries.chunks(REPORT_ENTRIES_PER_PAGE).take(MAX_REPORT_PAGES);
    for (page, entries) in pages.enumerate() {
        let first = page * REPORT_ENTRIES_PER_PAGE + 1;
        let text = entries
            .iter()
            .enumerate()
            .map(|(slot, entry)| {
                let line = report_line(&entry.record, &entry.worked);
                clip(&format!("*{}.* {line}", first + slot), line_limit)
            })
            .collect::<Vec<_>>()
            .join("\n");

        builder = builder
            .section(format!("kintai.report.entries.{page}"), |section| {
                section.mrkdwn(text);
            })
            .actions(format!("kintai.report.delete.{page}"), |actions| {
                for (slot, entry) in entries.iter().enumerate() {
                    actions.button(
                        ButtonElement::new(
                            action::delete_shift_slot(slot),
                            format!("{} 削除", first + slot),
                        )
                        .style(ButtonStyle::Danger)
                        .value(encode_delete_value(month, &entry.record.id)),
                    );
                }
            });
    }

    let hidden = total.entries.len().saturating_sub(MAX_REPORT_PAGES * REPORT_ENTRIES_PER_PAGE);
    if hidden > 0 {
        builder = builder.context("kintai.report.omitted.v1", |context| {
            context.plain(format!("ほか {hidden}件は表示しきれません（合計には含まれます）。"));
        });
    }

    let summary = match total.open_count() {
        0 => format!("*合計*: {}時間", format_hours(total.total_hours)),
        open => format!("*合計*: {}時間（勤務中 {open}件は集計外）", format_hours(total.total_hours)),
    };
    builder
        .section("kintai.report.total.v1", |section| {
            section.mrkdwn(summary);
        })
        .actions("kintai.report.nav.v1", |actions| {
            actions
                .button(
                    ButtonElement::new(action::MONTHLY_REPORT_PREV, "< 前月")
                        .value(month.previous().to_string()),
                )
                .button(
                    ButtonElement::new(action::MONTHLY_REPORT_NEXT, "翌月 >")
                        .value(month.next().to_string()),
                );
        })
        .build()
}

fn report_line(record: &ShiftRecord, worked: &WorkedTime) -> String {
    let start = civil_datetime_of(record.start_at);
    let date = start.date();
    let head = format!("`{}/{} ({})`", date.month(), date.day(), weekday_label(date.weekday()));
    let note = record.note.as_deref().map(|note| format!("\n> {note}")).unwrap_or_default();

    match (record.end_at.map(civil_datetime_of), worked.hours()) {
        (Some(end), Some(hours)) => format!(
            "{head} {}〜{} 休憩{} *{}時間*{note}",
            start.format("%H:%M"),
            end.format("%H:%M"),
            format_break(record.break_minutes.unwrap_or(0)),
            format_hours(hours)
        ),
        _ => format!("{head} {}〜 （勤務中）{note}", start.format("%H:%M")),
    }
}

/// Plain confirmation text.
pub fn notice(text: impl Into<String>) -> MessageTemplate {
    let text = text.into();
    MessageBuilder::new(text.clone())
        .section("kintai.notice.v1", |section| {
            section.mrkdwn(text);
        })
        .build()
}

pub fn error_message(summary: &str, correlation_id: &str) -> MessageTemplate {
    MessageBuilder::new(summary.to_owned())
        .section("kintai.error.summary.v1", |section| {
            section.mrkdwn(format!(":warning: {summary}"));
        })
        .context("kintai.error.context.v1", |context| {
            context.plain(format!("Correlation ID: {correlation_id}"));
        })
        .build()
}

pub fn domain_error_text(error: &DomainError) -> String {
    match error {
        DomainError::NoOpenShift => {
            "対象日の開始記録が見つかりませんでした。先に出勤開始を登録してください。".to_owned()
        }
        DomainError::InvalidTimeOrder { .. } => {
            "終了時刻は開始時刻よりも後の時刻を設定してください。".to_owned()
        }
        DomainError::MissingNote => "コメントは必須です。業務内容を入力してください。".to_owned(),
        DomainError::NegativeWorkedTime { .. } => {
            "勤務時間よりも長く休憩時間を設定することはできません。".to_owned()
        }
        DomainError::InvalidPlannedStart(_) => {
            "開始予定時刻は HH:MM 形式で入力してください。".to_owned()
        }
        DomainError::InvalidMonth { .. } => "月の指定が正しくありません。".to_owned(),
        DomainError::InvalidProfileField { field, .. } => {
            format!("{}には0以上の数値を入力してください。", field_label(field))
        }
        DomainError::InvalidOverviewWindow { max, .. } => {
            format!("表示期間は1〜{max}日の範囲で指定してください。")
        }
    }
}

fn field_label(field: &str) -> &str {
    match field {
        "transportation_cost" => "交通費",
        "hourly_wage" => "時給",
        "contact" => "連絡先",
        "work_type" => "勤務形態",
        other => other,
    }
}

/// One decimal place, half away from zero.
pub fn format_hours(hours: Decimal) -> String {
    let mut rounded = hours.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(1);
    rounded.to_string()
}

pub fn format_break(minutes: u32) -> String {
    let (hours, minutes) = (minutes / 60, minutes % 60);
    if hours > 0 {
        format!("{hours}時間{minutes}分")
    } else {
        format!("{minutes}分")
    }
}

/// Cuts `text` to at most `limit` characters, marking the cut with `…`.
fn clip(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_owned();
    }
    let mut clipped: String = text.chars().take(limit.saturating_sub(1)).collect();
    clipped.push('…');
    clipped
}

/// Groups `texts` in order so each group joined by `separator` stays within
/// `limit` characters. A text longer than `limit` gets a group of its own.
fn pack_texts(
    texts: impl IntoIterator<Item = String>,
    separator: &str,
    limit: usize,
) -> Vec<Vec<String>> {
    let separator_len = separator.chars().count();
    let mut groups: Vec<Vec<String>> = Vec::new();
    let mut used = 0;
    for text in texts {
        let len = text.chars().count();
        match groups.last_mut() {
            Some(group) if used + separator_len + len <= limit => {
                used += separator_len + len;
                group.push(text);
            }
            _ => {
                used = len;
                groups.push(vec![text]);
            }
        }
    }
    groups
}

fn or_dash(value: Option<String>) -> String {
    value.filter(|text| !text.trim().is_empty()).unwrap_or_else(|| "-".to_owned())
}

fn weekday_label(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "月",
        Weekday::Tue => "火",
        Weekday::Wed => "水",
        Weekday::Thu => "木",
        Weekday::Fri => "金",
        Weekday::Sat => "土",
        Weekday::Sun => "日",
    }
}

fn text_input(
    action_id: &str,
    initial: Option<&str>,
    multiline: bool,
    placeholder: Option<&str>,
) -> Element {
    Element::PlainTextInput(crate::blocks::PlainTextInputElement {
        action_id: action_id.to_owned(),
        multiline,
        initial_value: initial.unwrap_or_default().to_owned(),
        placeholder: placeholder.map(crate::blocks::TextObject::plain),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::{Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
    use kintai_core::accounting::{MonthlyTotal, WorkedTime};
    use kintai_core::clock::CivilMonth;
    use kintai_core::domain::attendance::{AttendanceStatus, PlannedStart};
    use kintai_core::domain::shift::ShiftRecord;
    use kintai_core::domain::user::{User, UserId};
    use kintai_core::errors::DomainError;
    use kintai_core::overview::{AttendanceOverview, OverviewDay, OverviewEntry};
    use rust_decimal::Decimal;

    use super::{
        domain_error_text, end_form, end_saved, error_message, format_break, menu,
        monthly_report, notice, overview, plan_form, profile_card, profile_form_for, start_form,
        status_label, MAX_BLOCKS, SECTION_TEXT_LIMIT,
    };
    use crate::blocks::{Block, MessageTemplate};
    use crate::events::{action, EndForm};

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).single().expect("valid instant")
    }

    /// `count` closed shifts of 8h with a 1h break, two per day from May 1st.
    fn may_report(count: i64) -> MonthlyTotal {
        let records = (0..count)
            .map(|index| {
                let start = utc(2024, 5, 1, 0, 0) + Duration::hours(index * 12);
                let mut record = ShiftRecord::open(UserId("U1".to_owned()), start, None, start);
                record.end_at = Some(start + Duration::hours(8));
                record.break_minutes = Some(60);
                record.note = Some("定例".to_owned());
                record
            })
            .collect();
        MonthlyTotal::from_records(CivilMonth::new(2024, 5).expect("month"), records)
    }

    /// Every Tuesday and Friday in `days` days from 2024-05-14, one entry per user.
    fn long_overview(days: i64, users: usize) -> AttendanceOverview {
        let start = NaiveDate::from_ymd_opt(2024, 5, 14).expect("date");
        let days = (0..=days)
            .map(|offset| start + Duration::days(offset))
            .filter(|date| matches!(date.weekday(), Weekday::Tue | Weekday::Fri))
            .map(|date| OverviewDay {
                date,
                entries: (0..users)
                    .map(|index| OverviewEntry {
                        user_id: UserId(format!("U{index}")),
                        display_name: format!("メンバー{index}"),
                        status: AttendanceStatus::Unreported,
                    })
                    .collect(),
            })
            .collect();
        AttendanceOverview { days }
    }

    fn assert_within_slack_limits(name: &str, message: &MessageTemplate) {
        assert!(
            message.blocks.len() <= MAX_BLOCKS,
            "{name}: {} blocks exceed {MAX_BLOCKS}",
            message.blocks.len()
        );
        for block in &message.blocks {
            if let Block::Section { text: Some(text), .. } = block {
                let len = text.text().chars().count();
                assert!(len <= SECTION_TEXT_LIMIT, "{name}: section {} has {len} chars", block.block_id());
            }
        }
    }

    #[test]
    fn menu_switches_between_start_and_end() {
        assert!(menu(false).action_ids().contains(&"start_work"));
        assert!(!menu(false).action_ids().contains(&"end_work"));
        assert!(menu(true).action_ids().contains(&"end_work"));
        assert!(menu(true).action_ids().contains(&"monthly_report"));
    }

    #[test]
    fn end_form_shows_open_start_and_inline_error() {
        let form = EndForm { note: Some("draft".to_owned()), ..EndForm::default() };
        // 00:05 UTC is 09:05 civil.
        let message = end_form(
            &form,
            utc(2024, 5, 14, 9, 0),
            Some(utc(2024, 5, 14, 0, 5)),
            Some("コメントは必須です。"),
        );

        let text = message.plain_text();
        assert!(text.contains("終了日時を選択 (5/14 09:05開始)"));
        assert!(text.contains("❌ コメントは必須です。"));
        let json = serde_json::to_value(&message.blocks).expect("serialize");
        let note = json
            .as_array()
            .and_then(|blocks| blocks.iter().find(|block| block["type"] == "input"))
            .expect("note input");
        assert_eq!(note["element"]["initial_value"], "draft");
        // 09:00 UTC is 18:00 civil.
        let pickers = json
            .as_array()
            .and_then(|blocks| blocks.iter().find(|block| block["block_id"] == "kintai.end.pickers.v1"))
            .expect("pickers");
        assert_eq!(pickers["elements"][1]["initial_time"], "18:00");
    }

    #[test]
    fn overview_lists_each_user_status() {
        let tuesday = NaiveDate::from_ymd_opt(2024, 5, 14).expect("date");
        let entry = |id: &str, name: &str, status| OverviewEntry {
            user_id: UserId(id.to_owned()),
            display_name: name.to_owned(),
            status,
        };
        let data = AttendanceOverview {
            days: vec![OverviewDay {
                date: tuesday,
                entries: vec![
                    entry(
                        "U1",
                        "Hanako",
                        AttendanceStatus::Attending {
                            planned_start: Some(PlannedStart::parse("10:00").expect("time")),
                        },
                    ),
                    entry("U2", "Taro", AttendanceStatus::Off),
                    entry("U3", "Jiro", AttendanceStatus::Unreported),
                ],
            }],
        };

        let text = overview(&data).plain_text();
        assert!(text.contains("*2024-05-14 (火)*"));
        assert!(text.contains("Hanako: 出勤 10:00〜"));
        assert!(text.contains("Taro: 休み"));
        assert!(text.contains("Jiro: 未報告"));
    }

    #[test]
    fn empty_overview_says_so() {
        let text = overview(&AttendanceOverview::default()).plain_text();
        assert!(text.contains("対象期間にデータがありません。"));
        assert_eq!(status_label(&AttendanceStatus::Attending { planned_start: None }), "出勤");
    }

    #[test]
    fn monthly_report_lists_entries_with_delete_buttons() {
        let month = CivilMonth::new(2024, 5).expect("month");
        let mut closed = ShiftRecord::open(
            UserId("U1".to_owned()),
            utc(2024, 5, 14, 0, 0),
            None,
            utc(2024, 5, 14, 0, 0),
        );
        closed.end_at = Some(utc(2024, 5, 14, 8, 0));
        closed.break_minutes = Some(60);
        closed.note = Some("review".to_owned());
        let open = ShiftRecord::open(
            UserId("U1".to_owned()),
            utc(2024, 5, 15, 0, 0),
            None,
            utc(2024, 5, 15, 0, 0),
        );

        let message = monthly_report(&MonthlyTotal::from_records(month, vec![closed, open]));
        let text = message.plain_text();

        assert!(text.contains("月次レポート 2024-05"));
        assert!(text.contains("09:00〜17:00 休憩1時間0分 *7.0時間*"));
        assert!(text.contains("（勤務中）"));
        assert!(text.contains("*合計*: 7.0時間（勤務中 1件は集計外）"));
        assert!(text.contains("*1.* `5/14 (火)`"));
        let deletes = message.action_ids().iter().filter(|id| id.starts_with("delete_shift")).count();
        assert_eq!(deletes, 2);
    }

    #[test]
    fn saved_summary_formats_break_and_hours() {
        let mut record = ShiftRecord::open(
            UserId("U1".to_owned()),
            utc(2024, 5, 14, 0, 0),
            None,
            utc(2024, 5, 14, 0, 0),
        );
        record.end_at = Some(utc(2024, 5, 14, 9, 30));
        record.break_minutes = Some(45);

        let text = end_saved(&record, true, &WorkedTime::Closed { hours: Decimal::new(875, 2) });
        assert_eq!(text, "退勤を保存しました: 2024-05-14 18:30\n休憩: 45分\n勤務時間: 8.8時間");
        assert_eq!(format_break(90), "1時間30分");
    }

    #[test]
    fn profile_card_shows_dash_for_missing_fields() {
        let mut user = User::new(UserId("U1".to_owned()), "Hanako", Utc::now());
        user.hourly_wage = Some(Decimal::new(120000, 2));
        let text = profile_card(&user).plain_text();
        assert!(text.contains("*名前*\nHanako"));
        assert!(text.contains("*連絡先*\n-"));
        assert!(text.contains("*時給*\n1200"));
    }

    #[test]
    fn domain_errors_have_japanese_texts() {
        assert!(domain_error_text(&DomainError::MissingNote).contains("コメントは必須"));
        let field = DomainError::InvalidProfileField {
            field: "hourly_wage".to_owned(),
            reason: "negative".to_owned(),
        };
        assert!(domain_error_text(&field).starts_with("時給"));
        let window = DomainError::InvalidOverviewWindow { days: 400, max: 366 };
        assert!(domain_error_text(&window).contains("1〜366日"));
    }

    #[test]
    fn action_ids_are_unique_within_each_block() {
        let user = User::new(UserId("U1".to_owned()), "Hanako", Utc::now());
        let date = NaiveDate::from_ymd_opt(2024, 5, 14).expect("date");
        let views = [
            ("menu (idle)", menu(false)),
            ("menu (working)", menu(true)),
            ("start form", start_form(date, NaiveTime::MIN)),
            ("end form", end_form(&EndForm::default(), utc(2024, 5, 14, 9, 0), None, Some("x"))),
            ("plan form", plan_form(date, Some("x"))),
            ("overview", overview(&long_overview(30, 3))),
            ("profile card", profile_card(&user)),
            ("profile form", profile_form_for(&user)),
            ("empty report", monthly_report(&may_report(0))),
            ("long report", monthly_report(&may_report(60))),
            ("notice", notice("saved").followed_by(menu(true))),
            ("error", error_message("failed", "corr-1")),
        ];

        for (name, message) in views {
            let mut block_ids = HashSet::new();
            for block in &message.blocks {
                assert!(block_ids.insert(block.block_id()), "{name}: block id {} repeats", block.block_id());
                let ids = block.action_ids();
                let unique: HashSet<&str> = ids.iter().copied().collect();
                assert_eq!(unique.len(), ids.len(), "{name}: duplicate action_id in {}: {ids:?}", block.block_id());
            }
        }
    }

    #[test]
    fn report_navigation_points_at_neighbouring_months() {
        let message = monthly_report(&may_report(0));
        let json = serde_json::to_value(&message.blocks).expect("serialize");
        let nav = json
            .as_array()
            .and_then(|blocks| blocks.iter().find(|block| block["block_id"] == "kintai.report.nav.v1"))
            .expect("navigation");
        assert_eq!(nav["elements"][0]["action_id"], action::MONTHLY_REPORT_PREV);
        assert_eq!(nav["elements"][0]["value"], "2024-04");
        assert_eq!(nav["elements"][1]["action_id"], action::MONTHLY_REPORT_NEXT);
        assert_eq!(nav["elements"][1]["value"], "2024-06");
    }

    #[test]
    fn long_months_and_windows_fit_in_one_message() {
        let sixty = monthly_report(&may_report(60));
        assert_within_slack_limits("60 shifts", &sixty);
        let deletes = sixty.action_ids().iter().filter(|id| id.starts_with("delete_shift")).count();
        assert_eq!(deletes, 60);
        assert!(sixty.plain_text().contains("*60.*"));
        assert!(sixty.plain_text().contains("*合計*: 420.0時間"));

        let crowded = monthly_report(&may_report(300));
        assert_within_slack_limits("300 shifts", &crowded);
        assert!(crowded.plain_text().contains("ほか 70件は表示しきれません"));
        assert!(crowded.plain_text().contains("*合計*: "));

        let year = overview(&long_overview(366, 3));
        assert_within_slack_limits("366 days", &year);
        assert!(year.plain_text().contains("*2025-05-13 (火)*"));

        let many_users = overview(&long_overview(366, 200));
        assert_within_slack_limits("366 days, 200 users", &many_users);
        assert!(many_users.plain_text().contains("日分は表示しきれません"));
    }
}
