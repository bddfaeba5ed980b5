//! Serialized access to a persisted ledger.
//!
//! Every operation runs load → engine → save while holding one lock, so two
//! callers sharing a service can never lose each other's updates. Session
//! references are resolved inside the same critical section as the mutation
//! that uses them.
//!
//! The lock guards the repository, not the ledger: the persisted document is
//! the source of truth and is re-read on every call. A poisoned lock is
//! therefore safe to recover.

use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;

use crate::engine::{
    ActiveSession, AggregateDrift, ClosedSession, Clock, Engine, StartOutcome, SystemClock,
};
use crate::error::Result;
use crate::ledger::Ledger;
use crate::repository::Repository;
use crate::types::{Category, DayTotals, NewSession, Session, SessionPatch};

pub struct LedgerService<R: Repository, C: Clock = SystemClock> {
    repo: Mutex<R>,
    engine: Engine<C>,
}

impl<R: Repository> LedgerService<R, SystemClock> {
    pub fn with_system_clock(repo: R) -> Self {
        Self::new(repo, Engine::system())
    }
}

impl<R: Repository, C: Clock> LedgerService<R, C> {
    pub fn new(repo: R, engine: Engine<C>) -> Self {
        LedgerService {
            repo: Mutex::new(repo),
            engine,
        }
    }

    pub fn engine(&self) -> &Engine<C> {
        &self.engine
    }

    fn lock(&self) -> MutexGuard<'_, R> {
        self.repo.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Ledger lock was poisoned; continuing from persisted state");
            poisoned.into_inner()
        })
    }

    /// Load → `op` → save, atomically with respect to other callers.
    /// Nothing is saved when `op` fails.
    pub fn mutate<T>(&self, op: impl FnOnce(&Engine<C>, &mut Ledger) -> Result<T>) -> Result<T> {
        let mut repo = self.lock();
        let mut ledger = repo.load()?;
        let value = op(&self.engine, &mut ledger)?;
        repo.save(&ledger)?;
        Ok(value)
    }

    /// Load → `op`, without saving.
    pub fn read<T>(&self, op: impl FnOnce(&Engine<C>, &Ledger) -> Result<T>) -> Result<T> {
        let repo = self.lock();
        let ledger = repo.load()?;
        op(&self.engine, &ledger)
    }

    pub fn snapshot(&self) -> Result<Ledger> {
        self.read(|_, ledger| Ok(ledger.clone()))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    pub fn start_task(&self, task: &str, category: Category) -> Result<StartOutcome> {
        self.mutate(|engine, ledger| engine.start_task(ledger, task, category))
    }

    pub fn stop_task(&self) -> Result<ClosedSession> {
        self.mutate(|engine, ledger| engine.stop_task(ledger))
    }

    /// Edits the session named by `reference` (id, id prefix or `@N`).
    pub fn edit_session(&self, reference: &str, patch: &SessionPatch) -> Result<Session> {
        self.mutate(|engine, ledger| {
            let id = ledger.sessions().resolve(reference)?;
            engine.edit_session(ledger, &id, patch)
        })
    }

    pub fn delete_session(&self, reference: &str) -> Result<Session> {
        self.mutate(|engine, ledger| {
            let id = ledger.sessions().resolve(reference)?;
            engine.delete_session(ledger, &id)
        })
    }

    pub fn create_session(&self, fields: NewSession) -> Result<Session> {
        self.mutate(|engine, ledger| engine.create_session(ledger, fields))
    }

    pub fn rebuild(&self) -> Result<Vec<AggregateDrift>> {
        self.mutate(|engine, ledger| Ok(engine.rebuild(ledger)))
    }

    pub fn clear(&self) -> Result<()> {
        let mut repo = self.lock();
        repo.clear()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// The session named by `reference` and its current position.
    pub fn show_session(&self, reference: &str) -> Result<(usize, Session)> {
        self.read(|_, ledger| {
            let id = ledger.sessions().resolve(reference)?;
            let session = ledger.sessions().get(&id)?.clone();
            let position = ledger.sessions().position(&id).unwrap_or_default();
            Ok((position, session))
        })
    }

    pub fn day_stats(&self, date: NaiveDate) -> Result<DayTotals> {
        self.read(|engine, ledger| Ok(engine.day_stats(ledger, date)))
    }

    pub fn range_stats(&self, dates: &[NaiveDate]) -> Result<Vec<(NaiveDate, DayTotals)>> {
        self.read(|engine, ledger| Ok(engine.range_stats(ledger, dates)))
    }

    pub fn current_session(&self) -> Result<Option<ActiveSession>> {
        self.read(|engine, ledger| Ok(engine.current_session(ledger)))
    }

    pub fn audit(&self) -> Result<Vec<AggregateDrift>> {
        self.read(|engine, ledger| Ok(engine.audit(ledger)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duration::parse_timestamp;
    use crate::engine::FixedClock;
    use crate::error::TimelogError;
    use crate::repository::{JsonFileRepository, MemoryRepository};
    use chrono::Duration;
    use std::sync::Arc;
    use std::thread;
    use tempfile::tempdir;

    fn service_at(now: &str) -> LedgerService<MemoryRepository, FixedClock> {
        LedgerService::new(
            MemoryRepository::new(),
            Engine::new(FixedClock::new(parse_timestamp(now).unwrap())),
        )
    }

    #[test]
    fn test_mutation_persists() {
        let service = service_at("2025-03-01T09:00:00");
        service.start_task("Math", Category::Study).unwrap();
        service.engine().clock().advance(Duration::minutes(30));
        let closed = service.stop_task().unwrap();
        assert_eq!(closed.minutes, 30.0);

        let ledger = service.snapshot().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert_eq!(ledger.daily().get(date).study, 30.0);
    }

    #[test]
    fn test_failed_operation_is_not_saved() {
        let service = service_at("2025-03-01T09:00:00");
        assert!(matches!(
            service.stop_task(),
            Err(TimelogError::NoActiveSession)
        ));
        let saves = service.lock().save_count();
        assert_eq!(saves, 0);
    }

    #[test]
    fn test_reads_do_not_save() {
        let service = service_at("2025-03-01T09:00:00");
        service.start_task("Math", Category::Study).unwrap();
        service.day_stats(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()).unwrap();
        service.current_session().unwrap();
        assert_eq!(service.lock().save_count(), 1);
    }

    #[test]
    fn test_edit_and_delete_by_position() {
        let service = service_at("2025-03-01T12:00:00");
        service
            .create_session(NewSession {
                task: "Math".to_string(),
                category: Category::Study,
                start: parse_timestamp("2025-03-01T09:00").unwrap(),
                end: Some(parse_timestamp("2025-03-01T10:00").unwrap()),
            })
            .unwrap();

        let patch = SessionPatch {
            category: Some(Category::Game),
            ..Default::default()
        };
        service.edit_session("@0", &patch).unwrap();
        let (position, shown) = service.show_session("@0").unwrap();
        assert_eq!(position, 0);
        assert_eq!(shown.category, Category::Game);

        service.delete_session("@0").unwrap();
        assert!(matches!(
            service.delete_session("@0"),
            Err(TimelogError::NotFound(_))
        ));
    }

    #[test]
    fn test_clear_resets_state() {
        let service = service_at("2025-03-01T09:00:00");
        service.start_task("Math", Category::Study).unwrap();
        service.clear().unwrap();
        assert!(service.current_session().unwrap().is_none());
    }

    #[test]
    fn test_concurrent_writers_do_not_lose_updates() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("timelog.json");
        let service = Arc::new(LedgerService::new(
            JsonFileRepository::new(&file),
            Engine::new(FixedClock::new(
                parse_timestamp("2025-03-02T00:00:00").unwrap(),
            )),
        ));

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let service = Arc::clone(&service);
                thread::spawn(move || {
                    for i in 0..5 {
                        let start = parse_timestamp("2025-03-01T00:00:00").unwrap()
                            + Duration::minutes((worker * 60 + i * 10) as i64);
                        service
                            .create_session(NewSession {
                                task: format!("w{}-{}", worker, i),
                                category: Category::Study,
                                start,
                                end: Some(start + Duration::minutes(10)),
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let ledger = JsonFileRepository::new(&file).load().unwrap();
        assert_eq!(ledger.sessions().len(), 40);
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert_eq!(ledger.daily().get(date).study, 400.0);
        assert!(service.audit().unwrap().is_empty());
    }
}
