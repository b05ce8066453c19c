use time::OffsetDateTime;
use uuid::Uuid;

use crate::command::Command;
use crate::rooms::profile::Profile;

/// Identifies one live connection. Fresh for every session.
pub type ClientId = Uuid;

/// Nickname used for messages the room itself originates.
pub const SYSTEM_NICK: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Message,
    Command,
    Whisper,
    Error,
    Notice,
    Join,
    Leave,
    Reset,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Message => "message",
            MessageType::Command => "command",
            MessageType::Whisper => "whisper",
            MessageType::Error => "error",
            MessageType::Notice => "notice",
            MessageType::Join => "join",
            MessageType::Leave => "leave",
            MessageType::Reset => "reset",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            MessageType::Message => "#cdd6f4",
            MessageType::Command => "#74c7ec",
            MessageType::Whisper => "#cba6f7",
            MessageType::Error => "#f38ba8",
            MessageType::Notice => "#f9e2af",
            MessageType::Join => "#a6e3a1",
            MessageType::Leave => "#eba0ac",
            MessageType::Reset => "#6c7086",
        }
    }
}

/// Who a room message is for, evaluated against each roster entry at delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    All,
    NickIs(String),
    NickIsNot(String),
    HandleIs(ClientId),
    HandleIsNot(ClientId),
}

impl Target {
    pub fn matches(&self, client: ClientId, profile: &Profile) -> bool {
        match self {
            Target::All => true,
            Target::NickIs(nick) => *nick == profile.nick,
            Target::NickIsNot(nick) => *nick != profile.nick,
            Target::HandleIs(id) => *id == client,
            Target::HandleIsNot(id) => *id != client,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomMessage {
    pub id: Uuid,
    pub kind: MessageType,
    pub time: OffsetDateTime,
    pub nick: String,
    pub color: String,
    pub body: String,
    pub target: Target,
}

impl RoomMessage {
    /// A system message: fresh id, current time, `*` sender and the type's color,
    /// addressed to everyone.
    pub fn new(kind: MessageType, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind,
            time: OffsetDateTime::now_utc(),
            nick: SYSTEM_NICK.to_owned(),
            color: kind.color().to_owned(),
            body: body.into(),
            target: Target::All,
        }
    }

    pub fn error(body: impl Into<String>) -> Self {
        Self::new(MessageType::Error, body)
    }

    pub fn notice(body: impl Into<String>) -> Self {
        Self::new(MessageType::Notice, body)
    }

    pub fn reset() -> Self {
        Self::new(MessageType::Reset, "")
    }

    pub fn sent_by(mut self, profile: &Profile) -> Self {
        if !profile.nick.is_empty() {
            self.nick = profile.nick.clone();
        }
        if !profile.color.is_empty() {
            self.color = profile.color.clone();
        }
        self
    }

    pub fn to(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    pub fn to_client(self, client: ClientId) -> Self {
        self.to(Target::HandleIs(client))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessageKind {
    Chat(String),
    Command(Command),
}

/// Something a client asks its room to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientMessage {
    pub client: ClientId,
    pub kind: ClientMessageKind,
}

impl ClientMessage {
    pub fn chat(client: ClientId, body: impl Into<String>) -> Self {
        Self { client, kind: ClientMessageKind::Chat(body.into()) }
    }

    pub fn command(client: ClientId, command: Command) -> Self {
        Self { client, kind: ClientMessageKind::Command(command) }
    }

    /// Turns a chat line into the broadcast everyone in the room sees.
    pub fn promote(body: &str, profile: &Profile) -> RoomMessage {
        RoomMessage::new(MessageType::Message, body).sent_by(profile)
    }
}
