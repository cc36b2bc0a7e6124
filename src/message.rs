//! Message protocol definitions
//!
//! Every message sent to a peer is a JSON envelope `{"action": ..., "body": ...}`.
//! Messages are encoded once by the producer and queued as text, so a room
//! broadcast serializes its payload a single time.

use serde::Serialize;
use tracing::error;

use crate::error::CommandError;

/// Server → Client action names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Command rejected
    Error,
    /// Lobby created, body is the creator's address
    LobbyCreated,
    /// Summary of every live lobby
    LobbyList,
    /// Full roster of the caller's lobby
    AllPlayers,
    /// Direct message
    SendMessageForPlayer,
    /// Room-scoped message
    SendMessageLobby,
    /// Terminal notice for a destroyed lobby
    LobbyDestroyed,
    /// Roster after a member joined
    UserJoinedToLobby,
    /// Roster after a member left
    UserLeavedFromLobby,
}

/// Wire envelope
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub action: Action,
    pub body: T,
}

/// One entry of a `lobby_list` reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LobbyItem {
    pub name: String,
    pub current_players: usize,
    pub max_players: usize,
}

/// One roster entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserItem {
    pub name: String,
    pub player_index: usize,
}

/// Encode an action and payload into the text queued on a mailbox
pub fn encode<T: Serialize>(action: Action, body: T) -> String {
    match serde_json::to_string(&Envelope { action, body }) {
        Ok(json) => json,
        Err(e) => {
            // Only reachable for payloads with non-string map keys
            error!("Failed to serialize {:?} message: {}", action, e);
            r#"{"action":"error","body":"internal error"}"#.to_string()
        }
    }
}

/// Convert a CommandError into the `error` reply for the invoking session
impl From<CommandError> for String {
    fn from(err: CommandError) -> Self {
        encode(Action::Error, err.to_string())
    }
}
