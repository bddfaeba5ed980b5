//! Consistency engine: the only code that mutates a [`Ledger`].
//!
//! The daily cache must always equal the sum of closed-session durations
//! grouped by (start date, category). Every mutation below preserves that:
//!
//! ```text
//! start   close open session (fold in) → append new open session
//! stop    set end → fold in
//! edit    withdraw old contribution → apply patch → fold in new contribution
//! delete  withdraw contribution → remove
//! create  append → fold in if closed
//! ```
//!
//! The open session is never folded into the cache. Day queries overlay its
//! live elapsed time on a copy of the cached totals instead, so the cache only
//! ever holds finished work and reads stay current without a background timer.
//!
//! At most one session is open at a time: `start` closes the previous one, and
//! `edit`/`create` refuse to produce a second.

use std::sync::Mutex;

use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::duration::duration_minutes;
use crate::error::{Result, TimelogError};
use crate::ledger::{validate, Ledger};
use crate::types::{Category, DayTotals, NewSession, Session, SessionId, SessionPatch};

/// Cached values closer than this to the recomputed sum are considered equal.
pub const DRIFT_TOLERANCE_MINUTES: f64 = 1e-6;

/// Smallest interval a session can be closed with when "now" is not after
/// its start.
const MIN_CLOSE_GAP_MS: i64 = 1;

// ─────────────────────────────────────────────────────────────────────────────
// Clocks
// ─────────────────────────────────────────────────────────────────────────────

/// Source of "now" for the engine.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        FixedClock {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Results
// ─────────────────────────────────────────────────────────────────────────────

/// A session that was just closed, with the minutes folded into the cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosedSession {
    pub session: Session,
    pub minutes: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartOutcome {
    pub started: Session,
    /// The previously open session, closed implicitly by this start.
    pub closed: Option<ClosedSession>,
}

/// The open session and how long it has been running.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveSession {
    pub session: Session,
    pub elapsed_minutes: f64,
}

/// A cached (date, category) total that disagrees with the session log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateDrift {
    pub date: NaiveDate,
    pub category: Category,
    pub cached: f64,
    pub expected: f64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct Engine<C: Clock = SystemClock> {
    clock: C,
}

impl Engine<SystemClock> {
    pub fn system() -> Self {
        Engine { clock: SystemClock }
    }
}

impl<C: Clock> Engine<C> {
    pub fn new(clock: C) -> Self {
        Engine { clock }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.now().date()
    }

    /// Closes any open session at "now", then opens a new one.
    pub fn start_task(
        &self,
        ledger: &mut Ledger,
        task: &str,
        category: Category,
    ) -> Result<StartOutcome> {
        let now = self.clock.now();
        let started = Session {
            id: SessionId::new(),
            task: task.trim().to_string(),
            category,
            start: now,
            end: None,
        };
        validate(&started)?;

        let closed = match ledger.sessions.find_open().map(|s| s.id) {
            Some(open_id) => Some(self.close_session(ledger, &open_id, now)?),
            None => None,
        };

        let position = ledger.sessions.append(started.clone());
        info!(
            id = %started.id,
            task = %started.task,
            category = %category,
            position,
            "Started session"
        );
        Ok(StartOutcome { started, closed })
    }

    /// Closes the open session at "now".
    pub fn stop_task(&self, ledger: &mut Ledger) -> Result<ClosedSession> {
        let open_id = ledger
            .sessions
            .find_open()
            .map(|s| s.id)
            .ok_or(TimelogError::NoActiveSession)?;
        self.close_session(ledger, &open_id, self.clock.now())
    }

    /// Applies `patch`, moving the session's contribution from its old
    /// (date, category) to its new one. Nothing changes when validation fails.
    pub fn edit_session(
        &self,
        ledger: &mut Ledger,
        id: &SessionId,
        patch: &SessionPatch,
    ) -> Result<Session> {
        let old = ledger.sessions.get(id)?.clone();
        let prospective = patch.apply_to(&old);
        validate(&prospective)?;
        if prospective.is_open() && !old.is_open() {
            self.ensure_no_other_open(ledger, id)?;
        }

        self.withdraw(ledger, &old);
        let updated = ledger.sessions.update(id, patch)?;
        self.fold(ledger, &updated);

        info!(
            id = %id,
            old_date = %old.date(),
            new_date = %updated.date(),
            old_category = %old.category,
            new_category = %updated.category,
            reopened = updated.is_open() && !old.is_open(),
            "Edited session"
        );
        Ok(updated)
    }

    /// Removes a session and its contribution.
    pub fn delete_session(&self, ledger: &mut Ledger, id: &SessionId) -> Result<Session> {
        let session = ledger.sessions.get(id)?.clone();
        self.withdraw(ledger, &session);
        let removed = ledger.sessions.remove(id)?;
        info!(id = %id, task = %removed.task, "Deleted session");
        Ok(removed)
    }

    /// Appends a session with explicit times, folding it in when closed.
    pub fn create_session(&self, ledger: &mut Ledger, fields: NewSession) -> Result<Session> {
        let session = Session {
            id: SessionId::new(),
            task: fields.task.trim().to_string(),
            category: fields.category,
            start: fields.start,
            end: fields.end,
        };
        validate(&session)?;
        if session.is_open() && ledger.sessions.find_open().is_some() {
            return Err(TimelogError::validation(
                "another session is already in progress",
            ));
        }

        ledger.sessions.append(session.clone());
        self.fold(ledger, &session);
        info!(
            id = %session.id,
            date = %session.date(),
            category = %session.category,
            open = session.is_open(),
            "Created session"
        );
        Ok(session)
    }

    /// Cached totals for `date` with the open session's live elapsed time
    /// added, when it started on that date. Never mutates the cache.
    pub fn day_stats(&self, ledger: &Ledger, date: NaiveDate) -> DayTotals {
        let mut totals = ledger.daily.get(date);
        if let Some(open) = ledger.sessions.find_open() {
            if open.date() == date {
                let elapsed = duration_minutes(open.start, self.clock.now()).max(0.0);
                *totals.slot_mut(open.category) += elapsed;
            }
        }
        totals
    }

    /// [`Engine::day_stats`] for each date independently.
    pub fn range_stats(&self, ledger: &Ledger, dates: &[NaiveDate]) -> Vec<(NaiveDate, DayTotals)> {
        dates
            .iter()
            .map(|&date| (date, self.day_stats(ledger, date)))
            .collect()
    }

    pub fn current_session(&self, ledger: &Ledger) -> Option<ActiveSession> {
        ledger.sessions.find_open().map(|session| ActiveSession {
            elapsed_minutes: duration_minutes(session.start, self.clock.now()).max(0.0),
            session: session.clone(),
        })
    }

    /// Compares the cache against a fresh sum over closed sessions.
    pub fn audit(&self, ledger: &Ledger) -> Vec<AggregateDrift> {
        let expected = ledger.recompute_daily();
        let mut dates: Vec<NaiveDate> = expected.keys().copied().collect();
        dates.extend(ledger.daily.iter().map(|(date, _)| *date));
        dates.sort();
        dates.dedup();

        let mut drifts = Vec::new();
        for date in dates {
            let cached = ledger.daily.get(date);
            let want = expected.get(&date).copied().unwrap_or_default();
            for category in Category::ALL {
                let (c, e) = (cached.get(category), want.get(category));
                if (c - e).abs() > DRIFT_TOLERANCE_MINUTES {
                    drifts.push(AggregateDrift {
                        date,
                        category,
                        cached: c,
                        expected: e,
                    });
                }
            }
        }
        drifts
    }

    /// Replaces the cache with the sum recomputed from the log. Returns the
    /// drifts that were corrected.
    pub fn rebuild(&self, ledger: &mut Ledger) -> Vec<AggregateDrift> {
        let drifts = self.audit(ledger);
        if !drifts.is_empty() {
            warn!(count = drifts.len(), "Rebuilding daily aggregates from session log");
            ledger.daily = crate::ledger::DailyAggregates::from_map(ledger.recompute_daily());
        }
        drifts
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    fn close_session(
        &self,
        ledger: &mut Ledger,
        id: &SessionId,
        now: NaiveDateTime,
    ) -> Result<ClosedSession> {
        let start = ledger.sessions.get(id)?.start;
        let end = if now > start {
            now
        } else {
            let nudged = start + Duration::milliseconds(MIN_CLOSE_GAP_MS);
            warn!(
                id = %id,
                start = %start,
                now = %now,
                "Clock is not past session start; closing at start + 1ms"
            );
            nudged
        };

        let session = ledger.sessions.close(id, end)?;
        let minutes = self.fold(ledger, &session);
        info!(
            id = %id,
            task = %session.task,
            category = %session.category,
            minutes,
            "Closed session"
        );
        Ok(ClosedSession { session, minutes })
    }

    fn ensure_no_other_open(&self, ledger: &Ledger, id: &SessionId) -> Result<()> {
        match ledger.sessions.iter().find(|s| s.is_open() && s.id != *id) {
            Some(other) => Err(TimelogError::validation(format!(
                "cannot reopen: session {} is already in progress",
                other.id
            ))),
            None => Ok(()),
        }
    }

    /// Adds a closed session's duration to the cache. Open sessions add nothing.
    fn fold(&self, ledger: &mut Ledger, session: &Session) -> f64 {
        let Some(minutes) = session.closed_minutes() else {
            return 0.0;
        };
        ledger.daily.add(session.date(), session.category, minutes);
        debug!(
            date = %session.date(),
            category = %session.category,
            minutes,
            "Folded session into daily aggregate"
        );
        minutes
    }

    /// Removes a closed session's duration from the cache, clamping at zero.
    fn withdraw(&self, ledger: &mut Ledger, session: &Session) {
        let Some(minutes) = session.closed_minutes() else {
            return;
        };
        let deficit = ledger.daily.subtract(session.date(), session.category, minutes);
        if deficit > DRIFT_TOLERANCE_MINUTES {
            warn!(
                id = %session.id,
                date = %session.date(),
                category = %session.category,
                minutes,
                deficit,
                "Daily aggregate clamped at zero; cache was already short of the session log"
            );
        } else {
            debug!(
                date = %session.date(),
                category = %session.category,
                minutes,
                "Withdrew session from daily aggregate"
            );
        }
    }
}
