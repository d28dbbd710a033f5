//! Parsing of input lines typed at the prompt.

use lapak_server::infrastructure::dto::websocket::ClientFrame;
use thiserror::Error;

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/join <room>`
    Join(u64),
    /// `/leave`
    Leave,
    /// `/read <message_id>`
    Read(u64),
    /// `/quit`
    Quit,
    /// Anything else: a chat message for the joined room
    Chat(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("unknown command '{0}' (try /join, /leave, /read, /quit)")]
    Unknown(String),

    #[error("join a room first with /join <room>")]
    NoActiveRoom,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Command::Chat(line.to_string()));
        };

        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let arg = parts.next();

        match name {
            "join" => parse_id(arg, "/join <room>").map(Command::Join),
            "leave" => Ok(Command::Leave),
            "read" => parse_id(arg, "/read <message_id>").map(Command::Read),
            "quit" => Ok(Command::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }

    /// Frame to send for this command, or `None` for `/quit`.
    pub fn to_frame(&self, active_room: Option<u64>) -> Result<Option<ClientFrame>, CommandError> {
        let frame = match self {
            Command::Join(room) => ClientFrame::JoinRoom {
                chat_room_id: *room,
            },
            Command::Leave => ClientFrame::LeaveRoom,
            Command::Read(message_id) => ClientFrame::Read {
                message_id: *message_id,
            },
            Command::Quit => return Ok(None),
            Command::Chat(content) => ClientFrame::Chat {
                chat_room_id: active_room.ok_or(CommandError::NoActiveRoom)?,
                content: content.clone(),
                product: None,
            },
        };
        Ok(Some(frame))
    }
}

fn parse_id(arg: Option<&str>, usage: &'static str) -> Result<u64, CommandError> {
    arg.and_then(|s| s.parse::<u64>().ok())
        .filter(|id| *id > 0)
        .ok_or(CommandError::Usage(usage))
}
