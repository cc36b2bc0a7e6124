//! Session definition and command handling
//!
//! A session is one connected participant: its identity, display name,
//! outbound mailbox and the lobby it currently sits in. The reader pump hands
//! every inbound line to [`Session::handle_input`], which runs the command
//! synchronously against the hub and the session's lobby.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::command::{self, Command};
use crate::error::{CommandError, SendError};
use crate::hub::Hub;
use crate::lobby::Lobby;
use crate::mailbox::Mailbox;
use crate::message::{encode, Action};
use crate::types::SessionId;

/// Connected participant
#[derive(Debug)]
pub struct Session {
    /// Unique identifier for this session
    id: SessionId,
    /// Display name supplied during the handshake
    name: String,
    /// Peer address, sent back as the `lobby_created` body
    remote_addr: String,
    /// Outbound queue drained by the writer pump
    mailbox: Mailbox,
    /// Lobby the session sits in, if any
    lobby: Mutex<Option<Arc<Lobby>>>,
}

impl Session {
    /// Create a session and the receiver its writer pump drains
    pub fn new(
        name: String,
        remote_addr: String,
        mailbox_capacity: usize,
    ) -> (Self, mpsc::Receiver<String>) {
        let (mailbox, rx) = Mailbox::new(mailbox_capacity);
        let session = Self {
            id: SessionId::new(),
            name,
            remote_addr,
            mailbox,
            lobby: Mutex::new(None),
        };
        (session, rx)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    /// Enqueue an encoded message without blocking
    pub fn send(&self, msg: String) -> Result<(), SendError> {
        self.mailbox.try_send(msg)
    }

    /// The lobby this session currently sits in
    pub fn current_lobby(&self) -> Option<Arc<Lobby>> {
        self.lobby.lock().clone()
    }

    pub(crate) fn set_lobby(&self, lobby: Arc<Lobby>) {
        *self.lobby.lock() = Some(lobby);
    }

    /// Clear the lobby reference if it still points at `lobby`
    pub(crate) fn clear_lobby_if(&self, lobby: &Lobby) {
        let mut current = self.lobby.lock();
        if current
            .as_ref()
            .is_some_and(|l| std::ptr::eq(Arc::as_ptr(l), lobby))
        {
            *current = None;
        }
    }

    /// Handle one normalized input line
    ///
    /// Failures are replied to this session alone as an `error` message.
    pub fn handle_input(self: &Arc<Self>, hub: &Hub, input: &str) {
        let result = self
            .check_lobby_state(input)
            .and_then(|()| Command::parse(input))
            .and_then(|cmd| self.execute(hub, cmd));
        if let Err(err) = result {
            debug!(session = %self.id, "Command rejected: {}", err);
            hub.deliver(self, err.into());
        }
    }

    /// Lobby preconditions reported ahead of argument errors
    fn check_lobby_state(&self, input: &str) -> Result<(), CommandError> {
        match command::verb(input) {
            "/lobby" if self.current_lobby().is_none() => Err(CommandError::LobbyNotFound),
            "/create_lobby" if self.current_lobby().is_some() => {
                Err(CommandError::AlreadyInLobby)
            }
            _ => Ok(()),
        }
    }

    /// Run a parsed command
    fn execute(self: &Arc<Self>, hub: &Hub, cmd: Command) -> Result<(), CommandError> {
        match cmd {
            Command::Whisper { target, text } => {
                let recipient = hub
                    .lookup_by_name(&target)
                    .ok_or(CommandError::PlayerNotFound)?;
                hub.deliver(&recipient, encode(Action::SendMessageForPlayer, text));
            }
            Command::LobbyMessage { text } => {
                let lobby = self.current_lobby().ok_or(CommandError::LobbyNotFound)?;
                hub.broadcast_to_lobby(&lobby, &encode(Action::SendMessageLobby, text));
            }
            Command::CreateLobby { name, capacity } => {
                let lobby = hub.create_lobby(self, name, capacity)?;
                info!(session = %self.id, lobby = %lobby.name(), "Client {} created lobby", self.name);
                hub.deliver(self, encode(Action::LobbyCreated, &self.remote_addr));
            }
            Command::DestroyLobby => {
                let lobby = self.current_lobby().ok_or(CommandError::LobbyNotFound)?;
                if !lobby.is_owner(self.id) {
                    return Err(CommandError::NotOwner);
                }
                hub.destroy_lobby(&lobby);
            }
            Command::ListLobbies => {
                hub.deliver(self, encode(Action::LobbyList, hub.list_lobbies()));
            }
            Command::JoinLobby { name } => {
                hub.join_lobby(self, &name)?;
                info!(session = %self.id, lobby = %name, "Client {} joined lobby", self.name);
            }
            Command::LeaveLobby => {
                let lobby = self.current_lobby().ok_or(CommandError::NotInLobby)?;
                hub.leave_lobby(self, &lobby);
                info!(session = %self.id, lobby = %lobby.name(), "Client {} left lobby", self.name);
            }
            Command::ListMembers => {
                let lobby = self.current_lobby().ok_or(CommandError::NotInLobby)?;
                hub.deliver(self, encode(Action::AllPlayers, lobby.users()));
            }
        }
        Ok(())
    }
}
