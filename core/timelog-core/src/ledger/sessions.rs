//! Ordered log of sessions.
//!
//! Append order is preserved and is what positional references (`@N`) index.
//! Every other lookup goes through the session's stable id.

use crate::error::{Result, TimelogError};
use crate::types::{Session, SessionId, SessionPatch};

/// Shortest id prefix accepted by [`SessionStore::resolve`].
pub const MIN_ID_PREFIX_LEN: usize = 4;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStore {
    sessions: Vec<Session>,
}

impl SessionStore {
    pub(crate) fn from_vec(sessions: Vec<Session>) -> Self {
        SessionStore { sessions }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Session> + ExactSizeIterator {
        self.sessions.iter()
    }

    pub fn as_slice(&self) -> &[Session] {
        &self.sessions
    }

    /// Appends a session and returns its position.
    pub(crate) fn append(&mut self, session: Session) -> usize {
        self.sessions.push(session);
        self.sessions.len() - 1
    }

    /// The open session, if any. Should there ever be more than one, the
    /// most recently appended wins.
    pub fn find_open(&self) -> Option<&Session> {
        self.sessions.iter().rev().find(|s| s.is_open())
    }

    pub fn open_count(&self) -> usize {
        self.sessions.iter().filter(|s| s.is_open()).count()
    }

    pub fn position(&self, id: &SessionId) -> Option<usize> {
        self.sessions.iter().position(|s| s.id == *id)
    }

    pub fn get(&self, id: &SessionId) -> Result<&Session> {
        self.sessions
            .iter()
            .find(|s| s.id == *id)
            .ok_or_else(|| TimelogError::NotFound(id.to_string()))
    }

    pub fn get_at(&self, index: usize) -> Result<&Session> {
        self.sessions
            .get(index)
            .ok_or_else(|| TimelogError::NotFound(format!("@{}", index)))
    }

    /// Id of the session at `index`, for callers that address sessions by position.
    pub fn session_id_at(&self, index: usize) -> Result<SessionId> {
        self.get_at(index).map(|s| s.id)
    }

    /// Applies `patch` to the session with `id`. Nothing is committed when the
    /// patched session fails [`validate`].
    pub(crate) fn update(&mut self, id: &SessionId, patch: &SessionPatch) -> Result<Session> {
        let index = self
            .position(id)
            .ok_or_else(|| TimelogError::NotFound(id.to_string()))?;
        let updated = patch.apply_to(&self.sessions[index]);
        validate(&updated)?;
        self.sessions[index] = updated.clone();
        Ok(updated)
    }

    /// Sets the end of the session with `id`.
    pub(crate) fn close(&mut self, id: &SessionId, end: chrono::NaiveDateTime) -> Result<Session> {
        self.update(
            id,
            &SessionPatch {
                end: Some(Some(end)),
                ..Default::default()
            },
        )
    }

    /// Removes the session with `id`. Later positions shift down by one.
    pub(crate) fn remove(&mut self, id: &SessionId) -> Result<Session> {
        let index = self
            .position(id)
            .ok_or_else(|| TimelogError::NotFound(id.to_string()))?;
        Ok(self.sessions.remove(index))
    }

    /// Resolves a user-supplied reference to a session id.
    ///
    /// Accepts a full id, a unique id prefix of at least
    /// [`MIN_ID_PREFIX_LEN`] characters (case-insensitive), or `@N` for the
    /// zero-based position in the log.
    pub fn resolve(&self, reference: &str) -> Result<SessionId> {
        let reference = reference.trim();

        if let Some(position) = reference.strip_prefix('@') {
            let index: usize = position
                .parse()
                .map_err(|_| TimelogError::NotFound(reference.to_string()))?;
            return self.session_id_at(index);
        }

        if reference.len() < MIN_ID_PREFIX_LEN {
            return Err(TimelogError::NotFound(reference.to_string()));
        }

        let needle = reference.to_ascii_uppercase();
        let mut matches = self
            .sessions
            .iter()
            .filter(|s| s.id.to_string().starts_with(&needle));

        match (matches.next(), matches.next()) {
            (Some(session), None) => Ok(session.id),
            (Some(_), Some(_)) => Err(TimelogError::AmbiguousSession(reference.to_string())),
            (None, _) => Err(TimelogError::NotFound(reference.to_string())),
        }
    }
}

/// Field-level checks every stored session must pass.
pub fn validate(session: &Session) -> Result<()> {
    if session.task.trim().is_empty() {
        return Err(TimelogError::validation("task must not be empty"));
    }
    if let Some(end) = session.end {
        if end <= session.start {
            return Err(TimelogError::validation(format!(
                "end {} must be after start {}",
                end, session.start
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duration::parse_timestamp;
    use crate::types::Category;
    use ulid::Ulid;

    fn session(task: &str, start: &str, end: Option<&str>) -> Session {
        Session {
            id: SessionId::new(),
            task: task.to_string(),
            category: Category::Study,
            start: parse_timestamp(start).unwrap(),
            end: end.map(|e| parse_timestamp(e).unwrap()),
        }
    }

    #[test]
    fn test_append_returns_position() {
        let mut store = SessionStore::default();
        assert_eq!(store.append(session("a", "2025-03-01T09:00", Some("2025-03-01T10:00"))), 0);
        assert_eq!(store.append(session("b", "2025-03-01T11:00", None)), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_find_open_prefers_most_recent() {
        let mut store = SessionStore::default();
        store.append(session("old", "2025-03-01T09:00", None));
        store.append(session("closed", "2025-03-01T10:00", Some("2025-03-01T11:00")));
        store.append(session("new", "2025-03-01T12:00", None));
        assert_eq!(store.find_open().unwrap().task, "new");
        assert_eq!(store.open_count(), 2);
    }

    #[test]
    fn test_find_open_on_closed_log_is_none() {
        let mut store = SessionStore::default();
        store.append(session("a", "2025-03-01T09:00", Some("2025-03-01T10:00")));
        assert!(store.find_open().is_none());
    }

    #[test]
    fn test_get_unknown_is_not_found() {
        let store = SessionStore::default();
        assert!(matches!(
            store.get(&SessionId::new()),
            Err(TimelogError::NotFound(_))
        ));
        assert!(matches!(store.get_at(3), Err(TimelogError::NotFound(_))));
    }

    #[test]
    fn test_update_rejects_inverted_interval_without_committing() {
        let mut store = SessionStore::default();
        let s = session("a", "2025-03-01T09:00", Some("2025-03-01T10:00"));
        let id = s.id;
        store.append(s.clone());

        let patch = SessionPatch {
            end: Some(Some(parse_timestamp("2025-03-01T09:00").unwrap())),
            ..Default::default()
        };
        assert!(matches!(
            store.update(&id, &patch),
            Err(TimelogError::Validation(_))
        ));
        assert_eq!(store.get(&id).unwrap(), &s);
    }

    #[test]
    fn test_update_applies_fields() {
        let mut store = SessionStore::default();
        let s = session("a", "2025-03-01T09:00", None);
        let id = s.id;
        store.append(s);

        let patch = SessionPatch {
            task: Some("  renamed ".to_string()),
            category: Some(Category::Other),
            ..Default::default()
        };
        let updated = store.update(&id, &patch).unwrap();
        assert_eq!(updated.task, "renamed");
        assert_eq!(updated.category, Category::Other);
        assert_eq!(store.get(&id).unwrap(), &updated);
    }

    #[test]
    fn test_remove_shifts_positions() {
        let mut store = SessionStore::default();
        let first = session("a", "2025-03-01T09:00", Some("2025-03-01T10:00"));
        let second = session("b", "2025-03-01T11:00", Some("2025-03-01T12:00"));
        let (first_id, second_id) = (first.id, second.id);
        store.append(first);
        store.append(second);

        store.remove(&first_id).unwrap();
        assert_eq!(store.position(&second_id), Some(0));
        assert!(store.remove(&first_id).is_err());
    }

    #[test]
    fn test_resolve_by_position_and_prefix() {
        let mut store = SessionStore::default();
        let s = session("a", "2025-03-01T09:00", None);
        let id = s.id;
        store.append(s);

        assert_eq!(store.resolve("@0").unwrap(), id);
        assert_eq!(store.resolve(&id.to_string()).unwrap(), id);
        let prefix = id.to_string()[..8].to_ascii_lowercase();
        assert_eq!(store.resolve(&prefix).unwrap(), id);
        assert!(store.resolve("@1").is_err());
        assert!(store.resolve("01").is_err());
    }

    fn session_with_id(ulid: Ulid, task: &str) -> Session {
        Session {
            id: ulid.to_string().parse().unwrap(),
            ..session(task, "2025-03-01T09:00", Some("2025-03-01T10:00"))
        }
    }

    #[test]
    fn test_resolve_ambiguous_prefix() {
        let first = Ulid::from_parts(1_740_819_600_000, 1);
        let second = Ulid::from_parts(1_740_819_600_000, 2);
        let mut store = SessionStore::default();
        store.append(session_with_id(first, "a"));
        store.append(session_with_id(second, "b"));

        // Same timestamp, so the first 10 characters are shared
        let shared = &first.to_string()[..10];
        assert_eq!(shared, &second.to_string()[..10]);
        assert!(matches!(
            store.resolve(shared),
            Err(TimelogError::AmbiguousSession(_))
        ));
        assert!(matches!(
            store.resolve(&shared.to_ascii_lowercase()),
            Err(TimelogError::AmbiguousSession(_))
        ));

        let full = second.to_string();
        assert_eq!(store.resolve(&full).unwrap().to_string(), full);
    }

    #[test]
    fn test_validate_rejects_blank_task() {
        let s = session("   ", "2025-03-01T09:00", None);
        assert!(matches!(validate(&s), Err(TimelogError::Validation(_))));
    }
}
