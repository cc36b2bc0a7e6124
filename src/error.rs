//! Error types for the session broker
//!
//! Defines fatal application errors, user-facing command errors and
//! mailbox send errors. Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// These end a connection attempt (or the process, at startup).
/// They are never sent to a peer as a reply.
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Another live session already uses this display name
    #[error("Display name already registered: {0}")]
    NameTaken(String),

    /// Rejected configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Command errors
///
/// Malformed commands and precondition violations. The `Display` text is
/// exactly the body of the `error` reply sent to the invoking session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Empty input line
    #[error("unknown command, bad length")]
    Empty,

    /// Input without the `/` command marker
    #[error("unknown command, bad format")]
    BadFormat,

    /// Verb not recognised
    #[error("unknown command {0}")]
    Unknown(String),

    /// Required argument missing
    #[error("unknown command, bad length split")]
    MissingArgument,

    /// Whisper without a target or text
    #[error("need player_name and message")]
    WhisperUsage,

    /// Whisper target not registered
    #[error("need correct player_name")]
    PlayerNotFound,

    /// Named lobby does not exist, or the caller is not in one
    #[error("lobby not found")]
    LobbyNotFound,

    /// Caller is not in a lobby
    #[error("lobby not exist")]
    NotInLobby,

    /// Caller is already in a lobby
    #[error("lobby already exist")]
    AlreadyInLobby,

    /// Another lobby already has this name
    #[error("lobby with selected name is exist")]
    LobbyNameTaken,

    /// Capacity is not a positive integer
    #[error("unknown command, bad max players")]
    BadCapacity,

    /// No free slot left in the lobby
    #[error("lobby is full")]
    LobbyFull,

    /// Only the owner may destroy a lobby
    #[error("destroy lobby can only owner")]
    NotOwner,
}

/// Mailbox send errors
///
/// Both variants mean the recipient is treated as dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    /// The mailbox is at capacity
    #[error("Mailbox full")]
    Full,

    /// The mailbox has been closed
    #[error("Mailbox closed")]
    Closed,
}
