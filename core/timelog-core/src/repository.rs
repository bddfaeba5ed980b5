//! Persistence boundary: `load` / `save` of the whole ledger.
//!
//! # File Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "sessions": [
//!     { "id": "01J...", "task": "Math", "category": "study",
//!       "start": "2025-03-01T09:00:00", "end": "2025-03-01T10:00:00" }
//!   ],
//!   "daily_stats": {
//!     "2025-03-01": { "study": 60.0, "game": 0.0, "other": 0.0 }
//!   }
//! }
//! ```
//!
//! Files written before ids and versions existed (`version` absent, sessions
//! without `id`) are accepted; ids are minted on load and written back.
//! Absent collections load as empty. A file that does not parse is an error:
//! it is never replaced by an empty ledger.
//!
//! # Atomic Writes
//!
//! Uses temp file + rename so a crash mid-write leaves the previous file intact.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{Result, TimelogError};
use crate::ledger::{validate, Ledger};
use crate::types::{Category, DayTotals, Session, SessionId};

/// Current on-disk format version.
pub const DATA_FILE_VERSION: u32 = 1;

/// Load/save capability injected into the service.
pub trait Repository: Send {
    fn load(&self) -> Result<Ledger>;
    fn save(&mut self, ledger: &Ledger) -> Result<()>;
    /// Discards all persisted state.
    fn clear(&mut self) -> Result<()>;
}

// ─────────────────────────────────────────────────────────────────────────────
// On-disk document
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct DataFileOut<'a> {
    version: u32,
    sessions: &'a [Session],
    daily_stats: &'a BTreeMap<NaiveDate, DayTotals>,
}

#[derive(Deserialize)]
struct DataFileIn {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    sessions: Vec<StoredSession>,
    #[serde(default)]
    daily_stats: BTreeMap<NaiveDate, DayTotals>,
}

#[derive(Deserialize)]
struct StoredSession {
    #[serde(default)]
    id: Option<SessionId>,
    task: String,
    category: Category,
    start: NaiveDateTime,
    #[serde(default)]
    end: Option<NaiveDateTime>,
}

/// Result of decoding a document: the ledger plus how many ids were minted.
struct Decoded {
    ledger: Ledger,
    minted_ids: usize,
}

fn decode(content: &str, origin: &str) -> Result<Decoded> {
    if content.trim().is_empty() {
        return Ok(Decoded {
            ledger: Ledger::new(),
            minted_ids: 0,
        });
    }

    let file: DataFileIn = serde_json::from_str(content).map_err(|e| TimelogError::Json {
        context: format!("parsing {}", origin),
        source: e,
    })?;

    if file.version > DATA_FILE_VERSION {
        return Err(TimelogError::UnsupportedVersion {
            found: file.version,
            supported: DATA_FILE_VERSION,
        });
    }

    let mut minted_ids = 0;
    let sessions: Vec<Session> = file
        .sessions
        .into_iter()
        .map(|stored| Session {
            id: stored.id.unwrap_or_else(|| {
                minted_ids += 1;
                SessionId::new()
            }),
            task: stored.task,
            category: stored.category,
            start: stored.start,
            end: stored.end,
        })
        .collect();

    let invalid = sessions.iter().filter(|s| validate(s).is_err()).count();
    if invalid > 0 {
        warn!(origin, invalid, "Data file contains sessions that fail validation");
    }
    let open = sessions.iter().filter(|s| s.is_open()).count();
    if open > 1 {
        warn!(origin, open, "Data file has more than one open session; the latest wins");
    }

    Ok(Decoded {
        ledger: Ledger::from_parts(sessions, file.daily_stats),
        minted_ids,
    })
}

fn encode(ledger: &Ledger) -> Result<String> {
    let out = DataFileOut {
        version: DATA_FILE_VERSION,
        sessions: ledger.sessions().as_slice(),
        daily_stats: ledger.daily().as_map(),
    };
    serde_json::to_string_pretty(&out).map_err(|e| TimelogError::Json {
        context: "serializing ledger".to_string(),
        source: e,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// JSON file repository
// ─────────────────────────────────────────────────────────────────────────────

/// Ledger persisted as a single pretty-printed JSON document.
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    path: PathBuf,
}

impl JsonFileRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileRepository { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_atomic(&self, content: &str) -> Result<()> {
        let parent_dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs_err::create_dir_all(&parent_dir).map_err(|e| io_error("creating data directory", e))?;

        let mut temp_file = NamedTempFile::new_in(&parent_dir)
            .map_err(|e| io_error(&format!("creating temp file in {}", parent_dir.display()), e))?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(|e| io_error("writing temp data file", e))?;
        temp_file
            .flush()
            .map_err(|e| io_error("flushing temp data file", e))?;
        temp_file
            .persist(&self.path)
            .map_err(|e| io_error(&format!("replacing {}", self.path.display()), e.error))?;
        Ok(())
    }
}

fn io_error(context: &str, source: std::io::Error) -> TimelogError {
    TimelogError::Io {
        context: context.to_string(),
        source,
    }
}

impl Repository for JsonFileRepository {
    fn load(&self) -> Result<Ledger> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No data file yet; starting empty");
            return Ok(Ledger::new());
        }

        let content = fs_err::read_to_string(&self.path)
            .map_err(|e| io_error(&format!("reading {}", self.path.display()), e))?;
        let decoded = decode(&content, &self.path.display().to_string())?;

        if decoded.minted_ids > 0 {
            info!(
                path = %self.path.display(),
                minted = decoded.minted_ids,
                "Assigned ids to sessions from an older data file"
            );
            if let Err(err) = self.write_atomic(&encode(&decoded.ledger)?) {
                warn!(error = %err, "Failed to write upgraded data file; ids will be reassigned next load");
            }
        }

        Ok(decoded.ledger)
    }

    fn save(&mut self, ledger: &Ledger) -> Result<()> {
        self.write_atomic(&encode(ledger)?)?;
        debug!(
            path = %self.path.display(),
            sessions = ledger.sessions().len(),
            days = ledger.daily().len(),
            "Saved ledger"
        );
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        if self.path.exists() {
            fs_err::remove_file(&self.path)
                .map_err(|e| io_error(&format!("removing {}", self.path.display()), e))?;
            info!(path = %self.path.display(), "Cleared data file");
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory repository
// ─────────────────────────────────────────────────────────────────────────────

/// Repository that keeps the ledger in memory. Counts saves for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    ledger: Ledger,
    saves: usize,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl Repository for MemoryRepository {
    fn load(&self) -> Result<Ledger> {
        Ok(self.ledger.clone())
    }

    fn save(&mut self, ledger: &Ledger) -> Result<()> {
        self.ledger = ledger.clone();
        self.saves += 1;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.ledger = Ledger::new();
        Ok(())
    }
}
