//! In-memory session store for the browser UI.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use invex_core::Session;

struct Entry {
    /// `None` while a parse has the session checked out.
    session: Option<Session>,
    last_seen: Instant,
}

/// Sessions keyed by the id held in the browser cookie.
///
/// The lock is only held to look up, take or return a session, never while
/// a batch is being extracted.
pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, Entry>>,
    ttl: Duration,
    max_image_bytes: usize,
}

impl SessionStore {
    pub fn new(ttl: Duration, max_image_bytes: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
            max_image_bytes,
        }
    }

    fn new_session(&self) -> Session {
        Session::new().with_max_image_bytes(self.max_image_bytes)
    }

    fn evict_expired(&self, sessions: &mut HashMap<Uuid, Entry>) {
        let before = sessions.len();
        sessions.retain(|_, entry| {
            entry.session.is_none() || entry.last_seen.elapsed() <= self.ttl
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!("Evicted {} idle sessions", evicted);
        }
    }

    /// Run `f` on the session for `id`, creating one if it is unknown.
    ///
    /// A session checked out by a running parse is seen as a fresh one under
    /// the same id.
    pub fn view<R>(&self, id: Option<Uuid>, f: impl FnOnce(&Session) -> R) -> (Uuid, R) {
        let mut sessions = self.sessions.lock();
        self.evict_expired(&mut sessions);

        let id = id
            .filter(|id| sessions.contains_key(id))
            .unwrap_or_else(Uuid::new_v4);
        let entry = sessions.entry(id).or_insert_with(|| Entry {
            session: Some(self.new_session()),
            last_seen: Instant::now(),
        });
        entry.last_seen = Instant::now();

        match &entry.session {
            Some(session) => (id, f(session)),
            None => (id, f(&self.new_session())),
        }
    }

    /// Take the session out of the store for a long-running update.
    ///
    /// The id stays reserved until [`restore`](Self::restore) puts a session back.
    pub fn checkout(&self, id: Option<Uuid>) -> (Uuid, Session) {
        let mut sessions = self.sessions.lock();
        self.evict_expired(&mut sessions);
        let now = Instant::now();

        if let Some(id) = id {
            if let Some(entry) = sessions.get_mut(&id) {
                entry.last_seen = now;
                let session = entry.session.take().unwrap_or_else(|| self.new_session());
                return (id, session);
            }
        }

        let id = Uuid::new_v4();
        sessions.insert(
            id,
            Entry {
                session: None,
                last_seen: now,
            },
        );
        (id, self.new_session())
    }

    /// Put a checked-out session back.
    pub fn restore(&self, id: Uuid, session: Session) {
        self.sessions.lock().insert(
            id,
            Entry {
                session: Some(session),
                last_seen: Instant::now(),
            },
        );
    }

    /// Replace the session for `id` with an empty one.
    pub fn reset(&self, id: Option<Uuid>) -> Uuid {
        let (id, mut session) = self.checkout(id);
        session.reset();
        self.restore(id, session);
        id
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }
}
