//! Command line parsing
//!
//! A peer sends one line of text per frame. A well-formed line starts with
//! the `/` marker followed by a verb; the remaining space-delimited tokens
//! are the arguments, and message text takes the rest of the line.

use crate::error::CommandError;

/// Command marker prefix
pub const COMMAND_MARKER: char = '/';

/// A parsed client command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/w <player_name> <text>`
    Whisper { target: String, text: String },
    /// `/lobby <text>`
    LobbyMessage { text: String },
    /// `/create_lobby <name> <capacity>`
    CreateLobby { name: String, capacity: usize },
    /// `/destroy_lobby`
    DestroyLobby,
    /// `/get_lobby_list`
    ListLobbies,
    /// `/join_to_lobby <name>`
    JoinLobby { name: String },
    /// `/leave_from_lobby`
    LeaveLobby,
    /// `/get_all_players_from_lobby`
    ListMembers,
}

/// Normalize a raw inbound payload: embedded newlines become spaces and
/// surrounding whitespace is trimmed.
pub fn normalize(raw: &str) -> String {
    raw.replace('\n', " ").trim().to_string()
}

/// Verb token of an input line, marker included
pub fn verb(input: &str) -> &str {
    input.split_once(' ').map_or(input, |(verb, _)| verb)
}

impl Command {
    /// Parse a normalized input line
    pub fn parse(input: &str) -> Result<Self, CommandError> {
        if input.is_empty() {
            return Err(CommandError::Empty);
        }
        if !input.starts_with(COMMAND_MARKER) {
            return Err(CommandError::BadFormat);
        }

        let verb = verb(input);
        let rest = input[verb.len()..].trim();

        match verb {
            "/w" => {
                let (target, text) = rest.split_once(' ').ok_or(CommandError::WhisperUsage)?;
                let text = text.trim();
                if target.is_empty() || text.is_empty() {
                    return Err(CommandError::WhisperUsage);
                }
                Ok(Command::Whisper {
                    target: target.to_string(),
                    text: text.to_string(),
                })
            }
            "/lobby" => {
                if rest.is_empty() {
                    return Err(CommandError::MissingArgument);
                }
                Ok(Command::LobbyMessage {
                    text: rest.to_string(),
                })
            }
            "/create_lobby" => {
                let (name, capacity) = rest
                    .split_once(' ')
                    .ok_or(CommandError::MissingArgument)?;
                let capacity = match capacity.trim().parse::<usize>() {
                    Ok(n) if n > 0 => n,
                    _ => return Err(CommandError::BadCapacity),
                };
                Ok(Command::CreateLobby {
                    name: name.to_string(),
                    capacity,
                })
            }
            "/destroy_lobby" => Ok(Command::DestroyLobby),
            "/get_lobby_list" => Ok(Command::ListLobbies),
            "/join_to_lobby" => {
                if rest.is_empty() {
                    return Err(CommandError::MissingArgument);
                }
                Ok(Command::JoinLobby {
                    name: rest.to_string(),
                })
            }
            "/leave_from_lobby" => Ok(Command::LeaveLobby),
            "/get_all_players_from_lobby" => Ok(Command::ListMembers),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  /lobby hi\nthere \n"), "/lobby hi there");
    }

    #[test]
    fn test_empty_and_bad_format() {
        assert_eq!(Command::parse(""), Err(CommandError::Empty));
        assert_eq!(Command::parse("hello"), Err(CommandError::BadFormat));
    }

    #[test]
    fn test_whisper_keeps_rest_of_line() {
        assert_eq!(
            Command::parse("/w bob hello there"),
            Ok(Command::Whisper {
                target: "bob".to_string(),
                text: "hello there".to_string(),
            })
        );
        assert_eq!(Command::parse("/w bob"), Err(CommandError::WhisperUsage));
        assert_eq!(Command::parse("/w"), Err(CommandError::WhisperUsage));
    }

    #[test]
    fn test_create_lobby() {
        assert_eq!(
            Command::parse("/create_lobby r1 2"),
            Ok(Command::CreateLobby {
                name: "r1".to_string(),
                capacity: 2,
            })
        );
        assert_eq!(
            Command::parse("/create_lobby r1"),
            Err(CommandError::MissingArgument)
        );
        assert_eq!(
            Command::parse("/create_lobby r1 many"),
            Err(CommandError::BadCapacity)
        );
        assert_eq!(
            Command::parse("/create_lobby r1 0"),
            Err(CommandError::BadCapacity)
        );
        assert_eq!(
            Command::parse("/create_lobby r1 -3"),
            Err(CommandError::BadCapacity)
        );
    }

    #[test]
    fn test_lobby_message_and_join() {
        assert_eq!(
            Command::parse("/lobby gg all"),
            Ok(Command::LobbyMessage {
                text: "gg all".to_string(),
            })
        );
        assert_eq!(Command::parse("/lobby"), Err(CommandError::MissingArgument));
        assert_eq!(
            Command::parse("/join_to_lobby r1"),
            Ok(Command::JoinLobby {
                name: "r1".to_string(),
            })
        );
        assert_eq!(
            Command::parse("/join_to_lobby"),
            Err(CommandError::MissingArgument)
        );
    }

    #[test]
    fn test_argumentless_verbs() {
        assert_eq!(Command::parse("/destroy_lobby"), Ok(Command::DestroyLobby));
        assert_eq!(Command::parse("/get_lobby_list"), Ok(Command::ListLobbies));
        assert_eq!(Command::parse("/leave_from_lobby"), Ok(Command::LeaveLobby));
        assert_eq!(
            Command::parse("/get_all_players_from_lobby"),
            Ok(Command::ListMembers)
        );
    }

    #[test]
    fn test_verb() {
        assert_eq!(verb("/lobby hi all"), "/lobby");
        assert_eq!(verb("/destroy_lobby"), "/destroy_lobby");
        assert_eq!(verb(""), "");
    }

    #[test]
    fn test_unknown_verb() {
        assert_eq!(
            Command::parse("/dance now"),
            Err(CommandError::Unknown("/dance".to_string()))
        );
    }
}
