use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::time::Instant;

use super::endpoint::Transport;
use crate::error::RoomError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u32);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of one server-side connection. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionStatus {
    Connecting,
    Authenticating,
    Joined,
    Closed,
}

pub struct Session {
    id: SessionId,
    status: SessionStatus,
    transport: Box<dyn Transport>,
    connected_at: Instant,
    listed: bool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("listed", &self.listed)
            .field("connected_at", &self.connected_at)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(id: SessionId, transport: Box<dyn Transport>) -> Self {
        Self {
            id,
            status: SessionStatus::Connecting,
            transport,
            connected_at: Instant::now(),
            listed: false,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_joined(&self) -> bool {
        self.status == SessionStatus::Joined
    }

    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }

    /// Joined and visible to client queries and broadcasts.
    pub fn is_client(&self) -> bool {
        self.is_joined() && self.listed
    }

    /// Makes a joined session visible as a client.
    pub fn list(&mut self) {
        self.listed = true;
    }

    /// Moves to `next` if it lies ahead of the current status.
    pub fn advance(&mut self, next: SessionStatus) -> bool {
        if next > self.status {
            self.status = next;
            true
        } else {
            false
        }
    }

    pub fn send_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.transport.send(bytes)
    }

    pub fn close_transport(&mut self) {
        self.transport.close();
    }
}

/// Live sessions keyed by id. Ids grow monotonically, so iteration order is
/// accept order.
#[derive(Debug)]
pub struct SessionManager {
    sessions: BTreeMap<SessionId, Session>,
    /// `None` once every id has been handed out.
    next_session_id: Option<u32>,
    max_clients: Option<usize>,
}

impl SessionManager {
    pub fn new(max_clients: Option<usize>) -> Self {
        Self {
            sessions: BTreeMap::new(),
            next_session_id: Some(1),
            max_clients,
        }
    }

    pub fn create(&mut self, transport: Box<dyn Transport>) -> Result<SessionId, RoomError> {
        let next = self.next_session_id.ok_or(RoomError::SessionIdsExhausted)?;
        let id = SessionId(next);
        self.next_session_id = next.checked_add(1);

        self.sessions.insert(id, Session::new(id, transport));
        Ok(id)
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    pub fn remove(&mut self, id: SessionId) -> Option<Session> {
        self.sessions.remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.sessions.values_mut()
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.keys().copied().collect()
    }

    /// Listed clients only.
    pub fn clients(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values().filter(|s| s.is_client())
    }

    pub fn clients_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.sessions.values_mut().filter(|s| s.is_client())
    }

    pub fn is_client(&self, id: SessionId) -> bool {
        self.sessions.get(&id).is_some_and(Session::is_client)
    }

    /// Joined, whether or not the session is listed yet.
    pub fn is_joined(&self, id: SessionId) -> bool {
        self.sessions.get(&id).is_some_and(Session::is_joined)
    }

    pub fn client_count(&self) -> usize {
        self.clients().count()
    }

    pub fn total_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn max_clients(&self) -> Option<usize> {
        self.max_clients
    }

    pub fn is_full(&self) -> bool {
        self.max_clients
            .is_some_and(|max| self.client_count() >= max)
    }
}
