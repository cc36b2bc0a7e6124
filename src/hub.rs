//! Hub: session registry and lobby directory
//!
//! The single process-wide registry of live sessions and live lobbies.
//! Session maps and the lobby directory are plain maps behind reader-writer
//! locks so whisper and list lookups run concurrently from every connection.
//! Locks are only held for the map access itself; broadcasts iterate a
//! snapshot and never block on a recipient.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::error::{AppError, CommandError};
use crate::lobby::{Lobby, DEFAULT_MAX_LOBBY_CAPACITY};
use crate::message::{encode, Action, LobbyItem};
use crate::session::Session;
use crate::types::SessionId;

/// Session maps, kept in lockstep under one lock
#[derive(Debug, Default)]
struct Directory {
    /// All registered sessions: SessionId -> Session
    sessions: HashMap<SessionId, Arc<Session>>,
    /// Display name index: name -> SessionId
    by_name: HashMap<String, SessionId>,
}

/// Registry of sessions and lobbies
#[derive(Debug)]
pub struct Hub {
    directory: RwLock<Directory>,
    /// All live lobbies: name -> Lobby
    lobbies: RwLock<HashMap<String, Arc<Lobby>>>,
    /// Largest capacity a client may request
    max_lobby_capacity: usize,
}

impl Default for Hub {
    fn default() -> Self {
        Self::with_max_lobby_capacity(DEFAULT_MAX_LOBBY_CAPACITY)
    }
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_lobby_capacity(max_lobby_capacity: usize) -> Self {
        Self {
            directory: RwLock::default(),
            lobbies: RwLock::default(),
            max_lobby_capacity,
        }
    }

    pub fn max_lobby_capacity(&self) -> usize {
        self.max_lobby_capacity
    }

    // ----- sessions -----

    /// Register a session under its display name
    ///
    /// Fails without inserting anything if the name is already registered.
    pub fn register(&self, session: Arc<Session>) -> Result<(), AppError> {
        let mut dir = self.directory.write();
        if dir.by_name.contains_key(session.name()) {
            warn!(name = %session.name(), "Rejecting duplicate display name");
            return Err(AppError::NameTaken(session.name().to_string()));
        }

        dir.by_name.insert(session.name().to_string(), session.id());
        dir.sessions.insert(session.id(), Arc::clone(&session));
        info!(session = %session.id(), "Client {} registered", session.name());
        debug!("Total sessions: {}", dir.sessions.len());
        Ok(())
    }

    /// Remove a session from the hub
    ///
    /// The session's lobby is handled first: an owned lobby is destroyed,
    /// otherwise the session leaves it. Calling this twice is a no-op.
    pub fn unregister(&self, session: &Arc<Session>) {
        if let Some(lobby) = session.current_lobby() {
            self.leave_lobby(session, &lobby);
        }

        let removed = {
            let mut dir = self.directory.write();
            let removed = dir.sessions.remove(&session.id()).is_some();
            if dir.by_name.get(session.name()) == Some(&session.id()) {
                dir.by_name.remove(session.name());
            }
            removed
        };

        if removed {
            info!(session = %session.id(), "Client {} unregistered", session.name());
        }
    }

    /// Resolve a display name to its session
    pub fn lookup_by_name(&self, name: &str) -> Option<Arc<Session>> {
        let dir = self.directory.read();
        dir.by_name
            .get(name)
            .and_then(|id| dir.sessions.get(id))
            .cloned()
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.directory.read().sessions.get(&id).cloned()
    }

    /// Check whether a display name is taken by a live session
    pub fn is_name_taken(&self, name: &str) -> bool {
        self.directory.read().by_name.contains_key(name)
    }

    pub fn session_count(&self) -> usize {
        self.directory.read().sessions.len()
    }

    // ----- delivery -----

    /// Enqueue a message for one session, evicting it if its mailbox is
    /// full or closed
    pub fn deliver(&self, session: &Arc<Session>, msg: String) {
        if let Err(e) = session.send(msg) {
            warn!(session = %session.id(), "Dropping {}: {}", session.name(), e);
            self.evict(session);
        }
    }

    /// Enqueue a message for every member of a lobby
    ///
    /// Members that cannot keep up are evicted; the rest still receive it.
    pub fn broadcast_to_lobby(&self, lobby: &Lobby, msg: &str) {
        for session in lobby.broadcast(msg) {
            warn!(session = %session.id(), lobby = %lobby.name(), "Dropping slow member {}", session.name());
            self.evict(&session);
        }
    }

    /// Enqueue a message for every registered session
    pub fn broadcast_all(&self, msg: &str) {
        let sessions: Vec<Arc<Session>> = self.directory.read().sessions.values().cloned().collect();
        for session in sessions {
            if session.send(msg.to_string()).is_err() {
                warn!(session = %session.id(), "Dropping slow client {}", session.name());
                self.evict(&session);
            }
        }
    }

    /// Treat a session as dead: close its mailbox and unregister it
    ///
    /// Closing the mailbox stops the session's writer pump, which tears the
    /// connection down; unregistering here as well makes the removal visible
    /// to other sessions immediately.
    pub fn evict(&self, session: &Arc<Session>) {
        session.mailbox().close();
        self.unregister(session);
    }

    // ----- lobbies -----

    /// Create a lobby owned by `owner`
    ///
    /// Capacity must lie in `1..=max_lobby_capacity`. The lobby is built
    /// before the directory lock is taken; the name check and the insert
    /// happen under one write lock, so at most one of several concurrent
    /// creators of the same name wins.
    pub fn create_lobby(
        &self,
        owner: &Arc<Session>,
        name: String,
        capacity: usize,
    ) -> Result<Arc<Lobby>, CommandError> {
        if owner.current_lobby().is_some() {
            return Err(CommandError::AlreadyInLobby);
        }
        if capacity > self.max_lobby_capacity {
            return Err(CommandError::BadCapacity);
        }
        if self.lobbies.read().contains_key(&name) {
            return Err(CommandError::LobbyNameTaken);
        }
        let lobby = Arc::new(Lobby::new(name.clone(), owner, capacity)?);

        let mut lobbies = self.lobbies.write();
        if lobbies.contains_key(&name) {
            return Err(CommandError::LobbyNameTaken);
        }
        lobbies.insert(name, Arc::clone(&lobby));
        owner.set_lobby(Arc::clone(&lobby));

        info!(lobby = %lobby.name(), owner = %owner.name(), capacity, "Lobby created");
        debug!("Total lobbies: {}", lobbies.len());
        Ok(lobby)
    }

    pub fn find_lobby(&self, name: &str) -> Option<Arc<Lobby>> {
        self.lobbies.read().get(name).cloned()
    }

    /// Summaries of every live lobby, ordered by name
    pub fn list_lobbies(&self) -> Vec<LobbyItem> {
        let lobbies: Vec<Arc<Lobby>> = self.lobbies.read().values().cloned().collect();
        let mut items: Vec<LobbyItem> = lobbies.iter().map(|l| l.summary()).collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        items
    }

    pub fn lobby_count(&self) -> usize {
        self.lobbies.read().len()
    }

    /// Remove a lobby's directory entry
    ///
    /// Only removes the entry if it still refers to this lobby, so a newer
    /// lobby that reused the name is left alone.
    pub fn remove_lobby(&self, lobby: &Arc<Lobby>) -> bool {
        let mut lobbies = self.lobbies.write();
        match lobbies.get(lobby.name()) {
            Some(current) if Arc::ptr_eq(current, lobby) => {
                lobbies.remove(lobby.name());
                true
            }
            _ => false,
        }
    }

    /// Seat a session in the named lobby and broadcast the new roster
    pub fn join_lobby(&self, session: &Arc<Session>, name: &str) -> Result<(), CommandError> {
        if session.current_lobby().is_some() {
            return Err(CommandError::AlreadyInLobby);
        }
        let lobby = self.find_lobby(name).ok_or(CommandError::LobbyNotFound)?;
        let users = lobby.join(session)?;
        self.broadcast_to_lobby(&lobby, &encode(Action::UserJoinedToLobby, users));
        Ok(())
    }

    /// Take a session out of a lobby
    ///
    /// The owner leaving destroys the lobby. Any other member frees its slot
    /// and the remaining members receive the updated roster.
    pub fn leave_lobby(&self, session: &Arc<Session>, lobby: &Arc<Lobby>) {
        if lobby.is_owner(session.id()) {
            self.destroy_lobby(lobby);
            return;
        }
        if let Some(users) = lobby.leave(session) {
            self.broadcast_to_lobby(lobby, &encode(Action::UserLeavedFromLobby, users));
        }
    }

    /// Destroy a lobby
    ///
    /// The single teardown path for explicit destroy, owner leave, owner
    /// disconnect and owner eviction. Members receive `lobby_destroyed`, the
    /// roster is cleared and the directory entry removed. Idempotent.
    pub fn destroy_lobby(&self, lobby: &Arc<Lobby>) {
        if let Some(members) = lobby.close() {
            let notice = encode(Action::LobbyDestroyed, "");
            for session in members {
                self.deliver(&session, notice.clone());
            }
        }
        if self.remove_lobby(lobby) {
            debug!(lobby = %lobby.name(), "Lobby removed from directory");
        }
    }
}
