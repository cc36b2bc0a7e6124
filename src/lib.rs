//! WebSocket Session Broker Library
//!
//! A WebSocket server where clients pick a display name, whisper to each
//! other by name, and form capacity-bounded lobbies with a single owner.
//!
//! # Features
//! - Display name supplied in the `PlayerName` upgrade header
//! - Direct messages by name
//! - Lobby creation, listing, joining and leaving with dense slot numbers
//! - Room-scoped messages
//! - Keep-alive pings with read/write deadlines
//! - Slow clients are dropped instead of blocking senders
//!
//! # Architecture
//! Shared state sits behind `parking_lot` locks:
//! - `Hub` holds the session registry and the lobby directory
//! - each `Lobby` serializes its own roster mutations
//! - each connection runs a reader and a writer pump that share a
//!   `CancellationToken` and tear the session down exactly once
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use lobby_hub::{ConnectionSettings, Hub, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let hub = Arc::new(Hub::new());
//!     let server = Server::bind("127.0.0.1:8080", hub, ConnectionSettings::default())
//!         .await
//!         .unwrap();
//!     server.run(CancellationToken::new()).await;
//! }
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod handler;
pub mod hub;
pub mod lobby;
pub mod mailbox;
pub mod message;
pub mod server;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use command::Command;
pub use config::{Config, ConnectionSettings};
pub use error::{AppError, CommandError, SendError};
pub use handler::{handle_connection, serve_session, PLAYER_NAME_HEADER};
pub use hub::Hub;
pub use lobby::Lobby;
pub use mailbox::Mailbox;
pub use message::{Action, LobbyItem, UserItem};
pub use server::Server;
pub use session::Session;
pub use types::SessionId;
