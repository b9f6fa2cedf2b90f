/*!
The set of live sessions.

A `Registry` does no locking of its own; the `Hub` keeps it behind the
same lock as the history log.
*/
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
    sync::atomic::{AtomicU64, Ordering},
};

use crate::session::ClientSession;

/// Identifies one session instance. Never reused within a hub, so two
/// sessions with the same name are still distinct.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SessionId(u64);

/// Hands out `SessionId`s. Each hub owns one.
#[derive(Debug, Default)]
pub struct SessionIds(AtomicU64);

impl SessionIds {
    pub fn next(&self) -> SessionId {
        SessionId(self.0.fetch_add(1, Ordering::Relaxed))
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why a session was refused admission.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Rejection {
    NameTaken,
    Full,
}

pub struct Registry {
    sessions: BTreeMap<SessionId, ClientSession>,
    max_clients: usize,
}

impl Registry {
    pub fn new(max_clients: usize) -> Registry {
        Registry { sessions: BTreeMap::new(), max_clients }
    }

    /// Admit `session`, or hand it back along with the reason it was refused.
    ///
    /// A name collision is reported ahead of a full registry.
    pub fn add(
        &mut self,
        session: ClientSession
    ) -> Result<SessionId, (Rejection, ClientSession)> {
        if self.sessions.values().any(|s| s.name() == session.name()) {
            return Err((Rejection::NameTaken, session));
        }
        if self.sessions.len() >= self.max_clients {
            return Err((Rejection::Full, session));
        }

        let id = session.id();
        self.sessions.insert(id, session);
        Ok(id)
    }

    /// Remove and close the session with the given id. Absent ids are
    /// ignored, so this may be called any number of times.
    pub fn remove(&mut self, id: SessionId) -> Option<String> {
        let session = self.sessions.remove(&id)?;
        let name = session.name().to_owned();
        session.close();
        Some(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClientSession> {
        self.sessions.values()
    }

    #[cfg(test)]
    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn len(&self) -> usize { self.sessions.len() }
}
