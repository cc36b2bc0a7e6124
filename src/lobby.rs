//! Lobby (room) definition
//!
//! A named room with a fixed capacity and a single owner. The roster maps
//! each member to a slot in `[0, capacity)`. Slots are handed out lowest
//! first: released slots are reused before the high-water mark advances, so
//! the pool never holds more than the slots actually vacated.
//!
//! All roster mutations take the write lock; broadcasts copy the member list
//! under the read lock and enqueue after releasing it.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::CommandError;
use crate::message::{LobbyItem, UserItem};
use crate::session::Session;
use crate::types::SessionId;

/// Owner's slot
const OWNER_SLOT: usize = 0;

/// Largest capacity a hub accepts unless configured otherwise
pub const DEFAULT_MAX_LOBBY_CAPACITY: usize = 64;

/// Upper bound on roster preallocation
const ROSTER_PREALLOC: usize = 16;

#[derive(Debug)]
struct Member {
    session: Arc<Session>,
    slot: usize,
}

#[derive(Debug)]
struct Roster {
    members: HashMap<SessionId, Member>,
    /// Slots vacated below `next_slot`
    released: BTreeSet<usize>,
    /// Every slot from here up to the capacity is unused
    next_slot: usize,
    closed: bool,
}

impl Roster {
    /// Lowest unused slot below `capacity`
    fn take_slot(&mut self, capacity: usize) -> Option<usize> {
        if let Some(slot) = self.released.pop_first() {
            return Some(slot);
        }
        if self.next_slot < capacity {
            self.next_slot += 1;
            return Some(self.next_slot - 1);
        }
        None
    }

    fn users(&self) -> Vec<UserItem> {
        let mut users: Vec<UserItem> = self
            .members
            .values()
            .map(|m| UserItem {
                name: m.session.name().to_string(),
                player_index: m.slot,
            })
            .collect();
        users.sort_by_key(|u| u.player_index);
        users
    }
}

/// Capacity-bounded room with a single owner
#[derive(Debug)]
pub struct Lobby {
    name: String,
    owner: SessionId,
    capacity: usize,
    roster: RwLock<Roster>,
}

impl Lobby {
    /// Create a lobby with the owner seated at slot 0
    ///
    /// Does not touch the owner's current-lobby reference; the hub sets it
    /// once the lobby is registered in the directory.
    pub fn new(name: String, owner: &Arc<Session>, capacity: usize) -> Result<Self, CommandError> {
        if capacity == 0 {
            return Err(CommandError::BadCapacity);
        }

        let mut members = HashMap::with_capacity(capacity.min(ROSTER_PREALLOC));
        members.insert(
            owner.id(),
            Member {
                session: Arc::clone(owner),
                slot: OWNER_SLOT,
            },
        );

        Ok(Self {
            name,
            owner: owner.id(),
            capacity,
            roster: RwLock::new(Roster {
                members,
                released: BTreeSet::new(),
                next_slot: OWNER_SLOT + 1,
                closed: false,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> SessionId {
        self.owner
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Check whether the given session created this lobby
    pub fn is_owner(&self, id: SessionId) -> bool {
        self.owner == id
    }

    /// Number of members currently seated
    pub fn member_count(&self) -> usize {
        self.roster.read().members.len()
    }

    /// Whether the lobby has been destroyed
    pub fn is_closed(&self) -> bool {
        self.roster.read().closed
    }

    /// Check if a session is seated in this lobby
    pub fn contains(&self, id: SessionId) -> bool {
        self.roster.read().members.contains_key(&id)
    }

    /// Summary for a `lobby_list` reply
    pub fn summary(&self) -> LobbyItem {
        LobbyItem {
            name: self.name.clone(),
            current_players: self.member_count(),
            max_players: self.capacity,
        }
    }

    /// Current roster ordered by slot
    pub fn users(&self) -> Vec<UserItem> {
        self.roster.read().users()
    }

    /// Snapshot of the member sessions
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.roster
            .read()
            .members
            .values()
            .map(|m| Arc::clone(&m.session))
            .collect()
    }

    /// Seat a session at the lowest free slot
    ///
    /// Sets the session's current lobby while the roster is locked, so a
    /// concurrent `close` always sees and clears it. Returns the new roster.
    pub fn join(self: &Arc<Self>, session: &Arc<Session>) -> Result<Vec<UserItem>, CommandError> {
        let mut roster = self.roster.write();
        if roster.closed {
            return Err(CommandError::LobbyNotFound);
        }
        if roster.members.contains_key(&session.id()) {
            return Err(CommandError::AlreadyInLobby);
        }
        let slot = roster
            .take_slot(self.capacity)
            .ok_or(CommandError::LobbyFull)?;

        roster.members.insert(
            session.id(),
            Member {
                session: Arc::clone(session),
                slot,
            },
        );
        session.set_lobby(Arc::clone(self));

        debug!(lobby = %self.name, name = %session.name(), slot, "Member joined");
        Ok(roster.users())
    }

    /// Remove a member and return its slot to the pool
    ///
    /// Returns the remaining roster, or `None` if the session was not seated.
    pub fn leave(&self, session: &Session) -> Option<Vec<UserItem>> {
        let mut roster = self.roster.write();
        let member = roster.members.remove(&session.id())?;
        roster.released.insert(member.slot);
        session.clear_lobby_if(self);

        debug!(lobby = %self.name, name = %session.name(), slot = member.slot, "Member left");
        Some(roster.users())
    }

    /// Enqueue a message to every member without blocking
    ///
    /// Returns the members whose mailbox was full or closed; the caller is
    /// responsible for evicting them.
    pub fn broadcast(&self, msg: &str) -> Vec<Arc<Session>> {
        self.sessions()
            .into_iter()
            .filter(|session| session.send(msg.to_string()).is_err())
            .collect()
    }

    /// Destroy the lobby
    ///
    /// Clears the roster and the slot pool and detaches every member.
    /// Returns the members that were seated, or `None` if the lobby was
    /// already closed.
    pub fn close(&self) -> Option<Vec<Arc<Session>>> {
        let mut roster = self.roster.write();
        if roster.closed {
            return None;
        }
        roster.closed = true;
        roster.released.clear();

        let members: Vec<Arc<Session>> = roster.members.drain().map(|(_, m)| m.session).collect();
        for session in &members {
            session.clear_lobby_if(self);
        }

        info!(lobby = %self.name, members = members.len(), "Lobby destroyed");
        Some(members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn session(name: &str) -> (Arc<Session>, mpsc::Receiver<String>) {
        let (session, rx) = Session::new(name.to_string(), "127.0.0.1:9000".to_string(), 8);
        (Arc::new(session), rx)
    }

    fn lobby(owner: &Arc<Session>, capacity: usize) -> Arc<Lobby> {
        let lobby = Arc::new(Lobby::new("r1".to_string(), owner, capacity).unwrap());
        owner.set_lobby(Arc::clone(&lobby));
        lobby
    }

    #[test]
    fn test_lobby_creation() {
        let (owner, _owner_rx) = session("alice");
        let lobby = lobby(&owner, 3);

        assert_eq!(lobby.name(), "r1");
        assert!(lobby.is_owner(owner.id()));
        assert_eq!(lobby.member_count(), 1);
        assert_eq!(
            lobby.users(),
            vec![UserItem {
                name: "alice".to_string(),
                player_index: 0,
            }]
        );
        assert_eq!(
            lobby.summary(),
            LobbyItem {
                name: "r1".to_string(),
                current_players: 1,
                max_players: 3,
            }
        );
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let (owner, _owner_rx) = session("alice");
        let result = Lobby::new("r1".to_string(), &owner, 0);
        assert_eq!(result.err(), Some(CommandError::BadCapacity));
    }

    #[test]
    fn test_huge_capacity_allocates_lazily() {
        let (owner, _owner_rx) = session("alice");
        let (bob, _bob_rx) = session("bob");
        let lobby = lobby(&owner, usize::MAX);

        let users = lobby.join(&bob).unwrap();
        assert_eq!(users[1].player_index, 1);
        assert_eq!(lobby.summary().max_players, usize::MAX);
    }

    #[test]
    fn test_lowest_released_slot_first() {
        let (owner, _owner_rx) = session("alice");
        let (bob, _bob_rx) = session("bob");
        let (carol, _carol_rx) = session("carol");
        let (dave, _dave_rx) = session("dave");
        let lobby = lobby(&owner, 4);

        lobby.join(&bob).unwrap();
        lobby.join(&carol).unwrap();
        lobby.leave(&bob).unwrap();
        lobby.join(&dave).unwrap();
        lobby.join(&bob).unwrap();

        let users = lobby.users();
        let slots: Vec<(&str, usize)> = users
            .iter()
            .map(|u| (u.name.as_str(), u.player_index))
            .collect();
        assert_eq!(slots, vec![("alice", 0), ("dave", 1), ("carol", 2), ("bob", 3)]);
    }

    #[test]
    fn test_join_allocates_distinct_slots() {
        let (owner, _owner_rx) = session("alice");
        let (bob, _bob_rx) = session("bob");
        let (carol, _carol_rx) = session("carol");
        let lobby = lobby(&owner, 3);

        lobby.join(&bob).unwrap();
        let users = lobby.join(&carol).unwrap();

        let slots: Vec<usize> = users.iter().map(|u| u.player_index).collect();
        assert_eq!(slots, vec![0, 1, 2]);
        assert!(bob.current_lobby().is_some());
    }

    #[test]
    fn test_join_full_lobby_fails_without_mutation() {
        let (owner, _owner_rx) = session("alice");
        let (bob, _bob_rx) = session("bob");
        let (carol, _carol_rx) = session("carol");
        let lobby = lobby(&owner, 2);

        lobby.join(&bob).unwrap();
        assert_eq!(lobby.join(&carol), Err(CommandError::LobbyFull));
        assert_eq!(lobby.member_count(), 2);
        assert!(carol.current_lobby().is_none());
    }

    #[test]
    fn test_join_twice_rejected() {
        let (owner, _owner_rx) = session("alice");
        let (bob, _bob_rx) = session("bob");
        let lobby = lobby(&owner, 3);

        lobby.join(&bob).unwrap();
        assert_eq!(lobby.join(&bob), Err(CommandError::AlreadyInLobby));
    }

    #[test]
    fn test_slot_reused_after_leave() {
        let (owner, _owner_rx) = session("alice");
        let (bob, _bob_rx) = session("bob");
        let (carol, _carol_rx) = session("carol");
        let lobby = lobby(&owner, 3);

        lobby.join(&bob).unwrap();
        lobby.join(&carol).unwrap();

        let remaining = lobby.leave(&bob).unwrap();
        assert_eq!(remaining.len(), 2);
        assert!(bob.current_lobby().is_none());

        let users = lobby.join(&bob).unwrap();
        let bob_slot = users.iter().find(|u| u.name == "bob").unwrap().player_index;
        assert_eq!(bob_slot, 1);
    }

    #[test]
    fn test_leave_unknown_member() {
        let (owner, _owner_rx) = session("alice");
        let (bob, _bob_rx) = session("bob");
        let lobby = lobby(&owner, 3);

        assert!(lobby.leave(&bob).is_none());
    }

    #[test]
    fn test_close_is_idempotent() {
        let (owner, _owner_rx) = session("alice");
        let (bob, _bob_rx) = session("bob");
        let lobby = lobby(&owner, 3);
        lobby.join(&bob).unwrap();

        let members = lobby.close().unwrap();
        assert_eq!(members.len(), 2);
        assert!(lobby.is_closed());
        assert_eq!(lobby.member_count(), 0);
        assert!(owner.current_lobby().is_none());
        assert!(bob.current_lobby().is_none());

        assert!(lobby.close().is_none());
        assert_eq!(lobby.join(&bob), Err(CommandError::LobbyNotFound));
    }

    #[test]
    fn test_broadcast_reports_saturated_members() {
        let (owner, _owner_rx) = session("alice");
        let (bob, _bob_rx) = Session::new("bob".to_string(), "127.0.0.1:9001".to_string(), 1);
        let bob = Arc::new(bob);
        let lobby = lobby(&owner, 3);
        lobby.join(&bob).unwrap();

        bob.send("filler".to_string()).unwrap();

        let dead = lobby.broadcast("hello");
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].id(), bob.id());
    }
}
