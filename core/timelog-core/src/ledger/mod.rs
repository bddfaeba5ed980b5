//! In-memory ledger state: the session log plus the daily aggregate cache.
//!
//! # Module Structure
//!
//! - [`sessions`]: ordered session log with id and position lookups
//! - [`daily`]: per-date category totals for closed sessions
//!
//! Both halves are readable by anyone, but only the
//! [`Engine`](crate::engine::Engine) mutates them, which is what keeps the
//! cache equal to the sum of closed-session durations.

pub mod daily;
pub mod sessions;

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::types::{DayTotals, Session};

pub use daily::DailyAggregates;
pub use sessions::{validate, SessionStore, MIN_ID_PREFIX_LEN};

/// Explicit state object handed to the engine and the repository.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    pub(crate) sessions: SessionStore,
    pub(crate) daily: DailyAggregates,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(sessions: Vec<Session>, daily: BTreeMap<NaiveDate, DayTotals>) -> Self {
        Ledger {
            sessions: SessionStore::from_vec(sessions),
            daily: DailyAggregates::from_map(daily),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn daily(&self) -> &DailyAggregates {
        &self.daily
    }

    pub fn open_session(&self) -> Option<&Session> {
        self.sessions.find_open()
    }

    /// Sums closed-session durations by (start date, category), which is what
    /// the cache must always equal.
    pub fn recompute_daily(&self) -> BTreeMap<NaiveDate, DayTotals> {
        let mut days: BTreeMap<NaiveDate, DayTotals> = BTreeMap::new();
        for session in self.sessions.iter() {
            if let Some(minutes) = session.closed_minutes() {
                *days.entry(session.date()).or_default().slot_mut(session.category) += minutes;
            }
        }
        days
    }
}
