//! # timelog-core
//!
//! Core library for timelog: a session log plus a per-day aggregate cache
//! that is kept consistent with it across every mutation.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. Every operation is a short
//!   load → mutate → save.
//! - **Explicit state**: The [`Ledger`] is a value passed to the [`Engine`]; no
//!   module-level state.
//! - **Injected storage and time**: Persistence goes through [`Repository`] and
//!   "now" through [`Clock`], so tests run against memory and fixed clocks.
//! - **Serialized writers**: [`LedgerService`] holds one lock across each
//!   load → op → save.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use timelog_core::{Category, JsonFileRepository, LedgerService, StorageConfig};
//!
//! let storage = StorageConfig::from_env()?;
//! let service = LedgerService::with_system_clock(JsonFileRepository::new(storage.data_file()));
//! service.start_task("Linear algebra", Category::Study)?;
//! let today = service.engine().today();
//! let totals = service.day_stats(today)?;
//! ```

pub mod config;
pub mod duration;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod report;
pub mod repository;
pub mod service;
pub mod storage;
pub mod types;

pub use config::{load_config, load_config_from, TimelogConfig};
pub use duration::{duration_minutes, duration_minutes_str, parse_date, parse_timestamp};
pub use engine::{
    ActiveSession, AggregateDrift, Clock, ClosedSession, Engine, FixedClock, StartOutcome,
    SystemClock,
};
pub use error::{Result, TimelogError};
pub use ledger::{DailyAggregates, Ledger, SessionStore};
pub use repository::{JsonFileRepository, MemoryRepository, Repository, DATA_FILE_VERSION};
pub use service::LedgerService;
pub use storage::{StorageConfig, TIMELOG_HOME_ENV};
pub use types::*;
