//! Core types shared by the engine, the repository and every front end.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::TimelogError;

// ═══════════════════════════════════════════════════════════════════════════════
// Category
// ═══════════════════════════════════════════════════════════════════════════════

/// Closed three-way classification of tracked time.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Study,
    Game,
    Other,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Study, Category::Game, Category::Other];

    /// Lowercase name used on disk and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Study => "study",
            Self::Game => "game",
            Self::Other => "other",
        }
    }

    /// Human-facing label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Study => "Study",
            Self::Game => "Game",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = TimelogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "study" => Ok(Self::Study),
            "game" => Ok(Self::Game),
            "other" => Ok(Self::Other),
            other => Err(TimelogError::validation(format!(
                "invalid category {:?} (expected study, game or other)",
                other
            ))),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Sessions
// ═══════════════════════════════════════════════════════════════════════════════

/// Stable identifier assigned to a session when it is created.
///
/// Position in the log is a display concern only; edits and deletes resolve
/// sessions through this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Ulid);

impl SessionId {
    pub fn new() -> Self {
        SessionId(Ulid::new())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = TimelogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s.trim())
            .map(SessionId)
            .map_err(|_| TimelogError::NotFound(s.to_string()))
    }
}

/// One recorded interval of activity.
///
/// `end == None` means the session is still open. When present, `end > start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub task: String,
    pub category: Category,
    pub start: NaiveDateTime,
    #[serde(default)]
    pub end: Option<NaiveDateTime>,
}

impl Session {
    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Calendar date the session is attributed to (always the start date).
    pub fn date(&self) -> NaiveDate {
        self.start.date()
    }

    /// Duration in minutes for a closed session.
    pub fn closed_minutes(&self) -> Option<f64> {
        self.end
            .map(|end| crate::duration::duration_minutes(self.start, end))
    }
}

/// Fields for a session created directly (backfilling history).
#[derive(Debug, Clone, PartialEq)]
pub struct NewSession {
    pub task: String,
    pub category: Category,
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
}

/// Partial update for an existing session. `None` leaves a field untouched.
///
/// `end` is doubly optional: `Some(None)` clears the end and re-opens the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPatch {
    pub task: Option<String>,
    pub category: Option<Category>,
    pub start: Option<NaiveDateTime>,
    pub end: Option<Option<NaiveDateTime>>,
}

impl SessionPatch {
    pub fn is_empty(&self) -> bool {
        self.task.is_none() && self.category.is_none() && self.start.is_none() && self.end.is_none()
    }

    /// Returns a copy of `session` with this patch applied. Does not validate.
    pub(crate) fn apply_to(&self, session: &Session) -> Session {
        let mut patched = session.clone();
        if let Some(task) = &self.task {
            patched.task = task.trim().to_string();
        }
        if let Some(category) = self.category {
            patched.category = category;
        }
        if let Some(start) = self.start {
            patched.start = start;
        }
        if let Some(end) = self.end {
            patched.end = end;
        }
        patched
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Daily Totals
// ═══════════════════════════════════════════════════════════════════════════════

/// Minutes accumulated per category for one calendar date.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct DayTotals {
    #[serde(default)]
    pub study: f64,
    #[serde(default)]
    pub game: f64,
    #[serde(default)]
    pub other: f64,
}

impl DayTotals {
    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Study => self.study,
            Category::Game => self.game,
            Category::Other => self.other,
        }
    }

    pub(crate) fn slot_mut(&mut self, category: Category) -> &mut f64 {
        match category {
            Category::Study => &mut self.study,
            Category::Game => &mut self.game,
            Category::Other => &mut self.other,
        }
    }

    pub fn total(&self) -> f64 {
        self.study + self.game + self.other
    }

    pub fn is_empty(&self) -> bool {
        self.total() <= 0.0
    }
}
