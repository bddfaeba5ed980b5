//! Subcommand handlers.
//!
//! Each handler calls one core operation and renders the result as text.
//! Handlers return the rendered output instead of printing it so they can be
//! exercised against an in-memory repository.

use std::fmt::Write as _;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use clap::ValueEnum;
use thiserror::Error;
use timelog_core::report::{self, RecentSummary};
use timelog_core::{
    parse_date, parse_timestamp, Category, Clock, LedgerService, NewSession, Repository,
    Session, SessionPatch, TimelogConfig, TimelogError,
};

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] TimelogError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Usage(String),
}

impl CliError {
    /// True when the command failed because of what the user typed.
    pub fn is_user_error(&self) -> bool {
        match self {
            CliError::Core(err) => err.is_user_error(),
            CliError::Usage(_) => true,
            CliError::Io(_) => false,
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Json,
}

pub struct Context<R: Repository, C: Clock> {
    pub service: LedgerService<R, C>,
    pub config: TimelogConfig,
}

// ─────────────────────────────────────────────────────────────────────────────
// Argument parsing
// ─────────────────────────────────────────────────────────────────────────────

/// Parses a full timestamp, or a bare `HH:MM` on `base`.
pub fn parse_time_arg(value: &str, base: NaiveDate) -> Result<NaiveDateTime, TimelogError> {
    if let Ok(timestamp) = parse_timestamp(value) {
        return Ok(timestamp);
    }
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map(|time| base.and_time(time))
        .map_err(|_| TimelogError::InvalidTimestamp {
            value: value.to_string(),
        })
}

// ─────────────────────────────────────────────────────────────────────────────
// Formatting
// ─────────────────────────────────────────────────────────────────────────────

pub fn format_minutes(minutes: f64) -> String {
    let total = minutes.max(0.0).round() as i64;
    let (hours, mins) = (total / 60, total % 60);
    if hours > 0 {
        format!("{}h {:02}m", hours, mins)
    } else {
        format!("{}m", mins)
    }
}

fn format_span(session: &Session) -> String {
    let start = session.start.format("%Y-%m-%d %H:%M");
    match session.end {
        Some(end) if end.date() == session.start.date() => {
            format!("{} - {}", start, end.format("%H:%M"))
        }
        Some(end) => format!("{} - {}", start, end.format("%Y-%m-%d %H:%M")),
        None => format!("{} - (running)", start),
    }
}

fn describe(position: usize, session: &Session) -> String {
    format!(
        "@{} {} [{}] {} {}",
        position,
        session.id,
        session.category,
        session.task,
        format_span(session)
    )
}

fn render_summary(summary: &RecentSummary) -> String {
    let mut out = String::new();
    for day in &summary.days {
        let _ = writeln!(
            out,
            "{}  study {:>8}  game {:>8}  other {:>8}{}",
            day.date,
            format_minutes(day.totals.study),
            format_minutes(day.totals.game),
            format_minutes(day.totals.other),
            if day.live { "  *" } else { "" }
        );
    }
    let _ = writeln!(
        out,
        "Total       study {:>8}  game {:>8}  other {:>8}",
        format_minutes(summary.totals.study),
        format_minutes(summary.totals.game),
        format_minutes(summary.totals.other)
    );
    let _ = writeln!(
        out,
        "Active days: {}/{}  Best study day: {}",
        summary.active_days,
        summary.days.len(),
        format_minutes(summary.max_daily_study)
    );
    if let Some(ratio) = summary.study_ratio {
        let _ = writeln!(out, "Study share of study+game: {:.0}%", ratio * 100.0);
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

impl<R: Repository, C: Clock> Context<R, C> {
    pub fn start(&self, task: &str, category: Option<Category>) -> CliResult<String> {
        let category = category.unwrap_or(self.config.default_category);
        let outcome = self.service.start_task(task, category)?;

        let mut out = String::new();
        if let Some(closed) = &outcome.closed {
            let _ = writeln!(
                out,
                "Stopped '{}' ({}) after {}",
                closed.session.task,
                closed.session.category,
                format_minutes(closed.minutes)
            );
        }
        let _ = writeln!(
            out,
            "Started '{}' ({}) at {}",
            outcome.started.task,
            outcome.started.category,
            outcome.started.start.format("%H:%M")
        );
        Ok(out)
    }

    pub fn stop(&self) -> CliResult<String> {
        let closed = self.service.stop_task()?;
        Ok(format!(
            "Stopped '{}' ({}) after {}\n",
            closed.session.task,
            closed.session.category,
            format_minutes(closed.minutes)
        ))
    }

    pub fn status(&self) -> CliResult<String> {
        let today = self.service.engine().today();
        let (active, totals) = self.service.read(|engine, ledger| {
            Ok((
                engine.current_session(ledger),
                engine.day_stats(ledger, today),
            ))
        })?;

        let mut out = String::new();
        match active {
            Some(active) => {
                let _ = writeln!(
                    out,
                    "In progress: '{}' ({}) since {}, {}",
                    active.session.task,
                    active.session.category,
                    active.session.start.format("%Y-%m-%d %H:%M"),
                    format_minutes(active.elapsed_minutes)
                );
            }
            None => out.push_str("No session in progress.\n"),
        }
        let _ = writeln!(
            out,
            "Today: study {}, game {}, other {}",
            format_minutes(totals.study),
            format_minutes(totals.game),
            format_minutes(totals.other)
        );
        Ok(out)
    }

    pub fn stats(&self, date: Option<&str>, days: Option<u32>) -> CliResult<String> {
        if let Some(date) = date {
            let date = parse_date(date)?;
            let totals = self.service.day_stats(date)?;
            return Ok(format!(
                "{}  study {}  game {}  other {}  total {}\n",
                date,
                format_minutes(totals.study),
                format_minutes(totals.game),
                format_minutes(totals.other),
                format_minutes(totals.total())
            ));
        }

        let days = days.unwrap_or(self.config.stats_days);
        let today = self.service.engine().today();
        let summary = self
            .service
            .read(|engine, ledger| report::recent_summary(engine, ledger, today, days))?;
        Ok(render_summary(&summary))
    }

    pub fn log(&self, days: Option<u32>) -> CliResult<String> {
        let days = days.unwrap_or(self.config.log_days);
        let since = report::window_start(self.service.engine().today(), days)?;
        let entries = self
            .service
            .read(|engine, ledger| Ok(report::session_log(engine, ledger, since)))?;

        if entries.is_empty() {
            return Ok(format!("No sessions in the last {} days.\n", days));
        }
        let mut out = String::new();
        for entry in &entries {
            let _ = writeln!(
                out,
                "{}  {}",
                describe(entry.position, &entry.session),
                format_minutes(entry.minutes)
            );
        }
        Ok(out)
    }

    pub fn chart(&self, days: Option<u32>) -> CliResult<String> {
        const CELLS_PER_HOUR: f64 = 4.0;

        let days = days.unwrap_or(self.config.stats_days);
        let today = self.service.engine().today();
        let series = self
            .service
            .read(|engine, ledger| report::chart_series(engine, ledger, today, days))?;

        let mut out = String::new();
        for (date, hours) in &series {
            for category in Category::ALL {
                let value = hours.get(category);
                let cells = (value * CELLS_PER_HOUR).round() as usize;
                let _ = writeln!(
                    out,
                    "{} {:<5} {} {:.1}h",
                    date.format("%m-%d"),
                    category.label(),
                    "#".repeat(cells),
                    value
                );
            }
        }
        Ok(out)
    }

    pub fn add(
        &self,
        task: &str,
        category: Category,
        start: &str,
        end: Option<&str>,
    ) -> CliResult<String> {
        let today = self.service.engine().today();
        let start = parse_time_arg(start, today)?;
        let end = end
            .map(|value| parse_time_arg(value, start.date()))
            .transpose()?;

        let session = self.service.create_session(NewSession {
            task: task.to_string(),
            category,
            start,
            end,
        })?;
        Ok(format!("Added {} '{}' {}\n", session.id, session.task, format_span(&session)))
    }

    pub fn show(&self, reference: &str) -> CliResult<String> {
        let (position, session) = self.service.show_session(reference)?;
        let duration = session
            .closed_minutes()
            .map(format_minutes)
            .unwrap_or_else(|| "running".to_string());
        Ok(format!("{}  {}\n", describe(position, &session), duration))
    }

    pub fn edit(
        &self,
        reference: &str,
        task: Option<String>,
        category: Option<Category>,
        start: Option<&str>,
        end: Option<&str>,
        reopen: bool,
    ) -> CliResult<String> {
        let today = self.service.engine().today();
        let updated = self.service.mutate(|engine, ledger| {
            let id = ledger.sessions().resolve(reference)?;
            let current = ledger.sessions().get(&id)?;

            let start = start.map(|v| parse_time_arg(v, today)).transpose()?;
            let base = start.unwrap_or(current.start).date();
            let end = match (end, reopen) {
                (_, true) => Some(None),
                (Some(value), false) => Some(Some(parse_time_arg(value, base)?)),
                (None, false) => None,
            };

            let patch = SessionPatch {
                task,
                category,
                start,
                end,
            };
            if patch.is_empty() {
                return Err(TimelogError::Validation("nothing to change".to_string()));
            }
            engine.edit_session(ledger, &id, &patch)
        })?;
        Ok(format!("Updated {} '{}' {}\n", updated.id, updated.task, format_span(&updated)))
    }

    pub fn delete(&self, reference: &str) -> CliResult<String> {
        let removed = self.service.delete_session(reference)?;
        Ok(format!("Deleted {} '{}' {}\n", removed.id, removed.task, format_span(&removed)))
    }

    pub fn export(
        &self,
        format: ExportFormat,
        days: Option<u32>,
        output: Option<&Path>,
    ) -> CliResult<String> {
        let days = days.unwrap_or(self.config.export_days);
        let since = report::window_start(self.service.engine().today(), days)?;
        let (body, count) = self.service.read(|engine, ledger| {
            let count = report::export_rows(ledger, since).len();
            let body = match format {
                ExportFormat::Csv => report::to_csv(&report::export_rows(ledger, since)),
                ExportFormat::Json => report::to_json_export(ledger, since, engine.now())?,
            };
            Ok((body, count))
        })?;

        match output {
            Some(path) => {
                fs_err::write(path, &body)?;
                tracing::info!(path = %path.display(), count, "Exported sessions");
                Ok(format!("Exported {} sessions to {}\n", count, path.display()))
            }
            None => Ok(body),
        }
    }

    pub fn audit(&self, fix: bool) -> CliResult<String> {
        let drifts = if fix {
            self.service.rebuild()?
        } else {
            self.service.audit()?
        };

        if drifts.is_empty() {
            return Ok("Daily aggregates match the session log.\n".to_string());
        }
        let mut out = String::new();
        for drift in &drifts {
            let _ = writeln!(
                out,
                "{} {:<5} cached {:.3} expected {:.3}",
                drift.date, drift.category, drift.cached, drift.expected
            );
        }
        if fix {
            let _ = writeln!(out, "Rebuilt {} aggregate values.", drifts.len());
        } else {
            let _ = writeln!(out, "{} mismatches; run `timelog audit --fix` to rebuild.", drifts.len());
        }
        Ok(out)
    }

    pub fn clear(&self, yes: bool) -> CliResult<String> {
        if !yes {
            return Err(CliError::Usage(
                "refusing to delete all sessions without --yes".to_string(),
            ));
        }
        self.service.clear()?;
        Ok("All sessions and statistics cleared.\n".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timelog_core::{Engine, FixedClock, MemoryRepository};

    fn at(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    fn context() -> Context<MemoryRepository, FixedClock> {
        Context {
            service: LedgerService::new(
                MemoryRepository::new(),
                Engine::new(FixedClock::new(at("2025-03-03T10:00:00"))),
            ),
            config: TimelogConfig::default(),
        }
    }

    #[test]
    fn test_parse_time_arg_forms() {
        let base = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        assert_eq!(parse_time_arg("09:30", base).unwrap(), at("2025-03-03T09:30"));
        assert_eq!(
            parse_time_arg("2025-03-01 08:00", base).unwrap(),
            at("2025-03-01T08:00")
        );
        assert!(matches!(
            parse_time_arg("half past nine", base),
            Err(TimelogError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn test_format_minutes() {
        assert_eq!(format_minutes(0.0), "0m");
        assert_eq!(format_minutes(42.4), "42m");
        assert_eq!(format_minutes(125.0), "2h 05m");
        assert_eq!(format_minutes(-3.0), "0m");
    }

    #[test]
    fn test_start_uses_default_category() {
        let ctx = context();
        let out = ctx.start("Math", None).unwrap();
        assert!(out.contains("Started 'Math' (study)"));

        let out = ctx.start("Chess", Some(Category::Game)).unwrap();
        assert!(out.contains("Stopped 'Math'"));
        assert!(out.contains("Started 'Chess' (game)"));
    }

    #[test]
    fn test_add_with_bare_times_uses_start_date() {
        let ctx = context();
        ctx.add("Math", Category::Study, "2025-03-01 09:00", Some("10:30"))
            .unwrap();
        let out = ctx.stats(Some("2025-03-01"), None).unwrap();
        assert!(out.contains("study 1h 30m"));
    }

    #[test]
    fn test_edit_requires_a_change() {
        let ctx = context();
        ctx.add("Math", Category::Study, "09:00", Some("09:45")).unwrap();
        let err = ctx.edit("@0", None, None, None, None, false).unwrap_err();
        assert!(matches!(err, CliError::Core(TimelogError::Validation(_))));
        assert!(err.is_user_error());

        let out = ctx
            .edit("@0", None, Some(Category::Other), None, Some("09:50"), false)
            .unwrap();
        assert!(out.contains("09:00 - 09:50"));
        let stats = ctx.stats(Some("2025-03-03"), None).unwrap();
        assert!(stats.contains("other 50m"));
        assert!(stats.contains("study 0m"));
    }

    #[test]
    fn test_reopen_then_stop() {
        let ctx = context();
        ctx.add("Math", Category::Study, "09:00", Some("09:30")).unwrap();
        ctx.edit("@0", None, None, None, None, true).unwrap();
        assert!(ctx.status().unwrap().contains("In progress: 'Math'"));
        assert!(ctx.stop().unwrap().contains("1h 00m"));
    }

    #[test]
    fn test_log_lists_newest_first() {
        let ctx = context();
        ctx.add("Old", Category::Game, "2025-03-02 20:00", Some("21:00"))
            .unwrap();
        ctx.add("New", Category::Study, "08:00", Some("09:00")).unwrap();
        let out = ctx.log(Some(7)).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].contains("New"));
        assert!(lines[1].contains("Old"));
        assert!(lines[1].starts_with("@0 "));
    }

    #[test]
    fn test_export_csv_to_stdout() {
        let ctx = context();
        ctx.add("Math", Category::Study, "08:00", Some("09:00")).unwrap();
        let out = ctx.export(ExportFormat::Csv, None, None).unwrap();
        assert!(out.starts_with("start_date,"));
        assert!(out.contains("\"Math\",\"study\",\"1.0\""));
    }

    #[test]
    fn test_export_json_to_file() {
        let ctx = context();
        ctx.add("Math", Category::Study, "08:00", Some("09:00")).unwrap();
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("export.json");
        let out = ctx
            .export(ExportFormat::Json, Some(7), Some(&path))
            .unwrap();
        assert!(out.contains("Exported 1 sessions"));
        let written = fs_err::read_to_string(&path).unwrap();
        assert!(written.contains("\"totalRecords\": 1"));
    }

    #[test]
    fn test_huge_day_windows_are_rejected() {
        let ctx = context();
        ctx.add("Math", Category::Study, "08:00", Some("09:00")).unwrap();
        let huge = Some(4_000_000_000);

        for result in [
            ctx.log(huge),
            ctx.export(ExportFormat::Csv, huge, None),
            ctx.stats(None, huge),
            ctx.chart(huge),
            ctx.log(Some(0)),
        ] {
            let err = result.unwrap_err();
            assert!(matches!(err, CliError::Core(TimelogError::Validation(_))));
        }
    }

    #[test]
    fn test_user_errors_are_classified() {
        assert!(CliError::Usage("bad".to_string()).is_user_error());
        assert!(CliError::Core(TimelogError::NoActiveSession).is_user_error());
        assert!(!CliError::Core(TimelogError::HomeDirNotFound).is_user_error());
        assert!(!CliError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk")).is_user_error());
    }

    #[test]
    fn test_clear_requires_confirmation() {
        let ctx = context();
        ctx.start("Math", None).unwrap();
        assert!(matches!(ctx.clear(false), Err(CliError::Usage(_))));
        ctx.clear(true).unwrap();
        assert!(ctx.status().unwrap().contains("No session in progress."));
    }

    #[test]
    fn test_audit_reports_clean_ledger() {
        let ctx = context();
        ctx.add("Math", Category::Study, "08:00", Some("09:00")).unwrap();
        assert!(ctx.audit(false).unwrap().contains("match"));
    }
}
