//! In-progress sessions keyed by applicant identity.
//!
//! Sessions are created on start and removed on every terminal outcome. Idle sessions
//! are expired lazily: the check happens when the applicant's next directive arrives.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};

use super::domain::UserId;
use super::machine::Session;

#[derive(Debug, Clone)]
struct SessionEntry {
    session: Session,
    touched_at: DateTime<Utc>,
}

/// Outcome of looking up a user's session for the next step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionLookup {
    Active(Session),
    /// The session sat idle past the limit and has been discarded.
    Expired,
    Absent,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    entries: Mutex<HashMap<UserId, SessionEntry>>,
    idle_limit: Option<Duration>,
}

impl SessionStore {
    /// `idle_limit` of `None` keeps sessions until a terminal outcome.
    pub fn new(idle_limit: Option<Duration>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            idle_limit,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<UserId, SessionEntry>> {
        // Entries are replaced wholesale, so a poisoned map is still consistent.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_stale(&self, entry: &SessionEntry, now: DateTime<Utc>) -> bool {
        self.idle_limit
            .is_some_and(|limit| now.signed_duration_since(entry.touched_at) > limit)
    }

    /// Store (or replace) the user's session, stamping it with `now`.
    pub fn put(&self, user: UserId, session: Session, now: DateTime<Utc>) {
        self.entries().insert(
            user,
            SessionEntry {
                session,
                touched_at: now,
            },
        );
    }

    /// Remove the user's session for a step; the caller puts it back if it continues.
    pub fn take(&self, user: UserId, now: DateTime<Utc>) -> SessionLookup {
        let mut entries = self.entries();
        match entries.remove(&user) {
            Some(entry) if self.is_stale(&entry, now) => SessionLookup::Expired,
            Some(entry) => SessionLookup::Active(entry.session),
            None => SessionLookup::Absent,
        }
    }

    /// Copy of the live session without consuming it; stale sessions are dropped.
    pub fn peek(&self, user: UserId, now: DateTime<Utc>) -> SessionLookup {
        let mut entries = self.entries();
        let lookup = match entries.get(&user) {
            Some(entry) if self.is_stale(entry, now) => SessionLookup::Expired,
            Some(entry) => SessionLookup::Active(entry.session.clone()),
            None => SessionLookup::Absent,
        };
        if matches!(lookup, SessionLookup::Expired) {
            entries.remove(&user);
        }
        lookup
    }

    pub fn remove(&self, user: UserId) -> bool {
        self.entries().remove(&user).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
