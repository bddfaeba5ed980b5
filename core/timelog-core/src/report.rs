//! Report data built on engine queries.
//!
//! Everything here is read-only and returns plain data; turning it into text,
//! CSV or JSON output is left to the front ends (plus the small CSV/JSON
//! encoders at the bottom, shared by every front end that exports).

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::duration::duration_minutes;
use crate::engine::{Clock, Engine};
use crate::error::{Result, TimelogError};
use crate::ledger::Ledger;
use crate::types::{Category, DayTotals, Session};

// ─────────────────────────────────────────────────────────────────────────────
// Recent days summary
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub totals: DayTotals,
    /// The open session contributed to this day.
    pub live: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentSummary {
    /// Oldest first, ending at the requested day.
    pub days: Vec<DaySummary>,
    pub totals: DayTotals,
    pub max_daily_study: f64,
    pub active_days: usize,
    /// study / (study + game), None when both are zero.
    pub study_ratio: Option<f64>,
}

/// Longest report window, in days.
pub const MAX_WINDOW_DAYS: u32 = 36_600;

/// First day of the `days`-long window ending at `today` (inclusive).
pub fn window_first_day(today: NaiveDate, days: u32) -> Result<NaiveDate> {
    if days == 0 || days > MAX_WINDOW_DAYS {
        return Err(TimelogError::validation(format!(
            "days must be between 1 and {}",
            MAX_WINDOW_DAYS
        )));
    }
    today
        .checked_sub_days(Days::new(u64::from(days - 1)))
        .ok_or_else(|| {
            TimelogError::validation(format!("{} days before {} is out of range", days, today))
        })
}

/// Midnight of the first day of the window.
pub fn window_start(today: NaiveDate, days: u32) -> Result<NaiveDateTime> {
    Ok(window_first_day(today, days)?.and_time(NaiveTime::MIN))
}

/// The `days` dates ending at `today`, oldest first.
pub fn date_window(today: NaiveDate, days: u32) -> Result<Vec<NaiveDate>> {
    let first = window_first_day(today, days)?;
    Ok(first.iter_days().take(days as usize).collect())
}

pub fn recent_summary<C: Clock>(
    engine: &Engine<C>,
    ledger: &Ledger,
    today: NaiveDate,
    days: u32,
) -> Result<RecentSummary> {
    let window = date_window(today, days)?;
    let live_date = ledger.open_session().map(|s| s.date());
    let days: Vec<DaySummary> = engine
        .range_stats(ledger, &window)
        .into_iter()
        .map(|(date, totals)| DaySummary {
            date,
            totals,
            live: live_date == Some(date),
        })
        .collect();

    let mut totals = DayTotals::default();
    let mut max_daily_study: f64 = 0.0;
    let mut active_days = 0;
    for day in &days {
        for category in Category::ALL {
            *totals.slot_mut(category) += day.totals.get(category);
        }
        max_daily_study = max_daily_study.max(day.totals.study);
        if !day.totals.is_empty() {
            active_days += 1;
        }
    }

    let focus = totals.study + totals.game;
    let study_ratio = (focus > 0.0).then(|| totals.study / focus);

    Ok(RecentSummary {
        days,
        totals,
        max_daily_study,
        active_days,
        study_ratio,
    })
}

/// Per-day hours for bar charts, oldest first.
pub fn chart_series<C: Clock>(
    engine: &Engine<C>,
    ledger: &Ledger,
    today: NaiveDate,
    days: u32,
) -> Result<Vec<(NaiveDate, DayTotals)>> {
    let window = date_window(today, days)?;
    let series = engine
        .range_stats(ledger, &window)
        .into_iter()
        .map(|(date, minutes)| {
            (
                date,
                DayTotals {
                    study: minutes.study / 60.0,
                    game: minutes.game / 60.0,
                    other: minutes.other / 60.0,
                },
            )
        })
        .collect();
    Ok(series)
}

// ─────────────────────────────────────────────────────────────────────────────
// Session log
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub position: usize,
    pub session: Session,
    /// Closed duration, or elapsed time so far for the open session.
    pub minutes: f64,
}

/// Sessions started at or after `since`, newest first.
pub fn session_log<C: Clock>(
    engine: &Engine<C>,
    ledger: &Ledger,
    since: NaiveDateTime,
) -> Vec<LogEntry> {
    let now = engine.now();
    let mut entries: Vec<LogEntry> = ledger
        .sessions()
        .iter()
        .enumerate()
        .filter(|(_, s)| s.start >= since)
        .map(|(position, session)| LogEntry {
            position,
            minutes: session
                .closed_minutes()
                .unwrap_or_else(|| duration_minutes(session.start, now).max(0.0)),
            session: session.clone(),
        })
        .collect();
    entries.sort_by(|a, b| b.session.start.cmp(&a.session.start));
    entries
}

// ─────────────────────────────────────────────────────────────────────────────
// Export
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub start_date: String,
    pub start_time: String,
    pub end_date: String,
    pub end_time: String,
    pub task: String,
    pub category: Category,
    /// Hours rounded to one decimal; None for the open session.
    pub hours: Option<f64>,
}

impl From<&Session> for ExportRow {
    fn from(session: &Session) -> Self {
        ExportRow {
            start_date: session.start.format("%Y-%m-%d").to_string(),
            start_time: session.start.format("%H:%M").to_string(),
            end_date: session
                .end
                .map(|e| e.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            end_time: session
                .end
                .map(|e| e.format("%H:%M").to_string())
                .unwrap_or_default(),
            task: session.task.clone(),
            category: session.category,
            hours: session
                .closed_minutes()
                .map(|minutes| (minutes / 60.0 * 10.0).round() / 10.0),
        }
    }
}

/// Rows for sessions started at or after `since`, newest first.
pub fn export_rows(ledger: &Ledger, since: NaiveDateTime) -> Vec<ExportRow> {
    let mut sessions: Vec<&Session> = ledger
        .sessions()
        .iter()
        .filter(|s| s.start >= since)
        .collect();
    sessions.sort_by(|a, b| b.start.cmp(&a.start));
    sessions.into_iter().map(ExportRow::from).collect()
}

const CSV_HEADER: [&str; 7] = [
    "start_date",
    "start_time",
    "end_date",
    "end_time",
    "task",
    "category",
    "hours",
];

fn csv_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// RFC 4180 CSV with every field quoted.
pub fn to_csv(rows: &[ExportRow]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(CSV_HEADER.join(","));
    for row in rows {
        let hours = row.hours.map(|h| format!("{:.1}", h)).unwrap_or_default();
        let fields = [
            row.start_date.as_str(),
            row.start_time.as_str(),
            row.end_date.as_str(),
            row.end_time.as_str(),
            row.task.as_str(),
            row.category.as_str(),
            hours.as_str(),
        ];
        lines.push(
            fields
                .iter()
                .map(|f| csv_field(f))
                .collect::<Vec<_>>()
                .join(","),
        );
    }
    lines.join("\r\n") + "\r\n"
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonExport<'a> {
    pub export_date: NaiveDateTime,
    pub total_records: usize,
    pub sessions: Vec<&'a Session>,
}

/// JSON export document for sessions started at or after `since`.
pub fn to_json_export(ledger: &Ledger, since: NaiveDateTime, now: NaiveDateTime) -> Result<String> {
    let mut sessions: Vec<&Session> = ledger
        .sessions()
        .iter()
        .filter(|s| s.start >= since)
        .collect();
    sessions.sort_by(|a, b| b.start.cmp(&a.start));
    let export = JsonExport {
        export_date: now,
        total_records: sessions.len(),
        sessions,
    };
    serde_json::to_string_pretty(&export).map_err(|e| TimelogError::Json {
        context: "serializing export".to_string(),
        source: e,
    })
}
