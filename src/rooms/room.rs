//! The room actor.
//!
//! A [`Room`] owns its roster and rules and runs as a single task. Everything
//! else talks to it through a cloneable [`RoomHandle`], whose bounded queues
//! are the only way in.

use std::{
    collections::{HashMap, VecDeque},
    net::SocketAddr,
    ops::ControlFlow,
    sync::Arc,
};

use anyhow::anyhow;
use tokio::sync::{
    mpsc::{self, error::TrySendError},
    watch,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    AppResult,
    command::OpLevel,
    config::QueueSizes,
    message::{ClientId, ClientMessage, ClientMessageKind, MessageType, RoomMessage, Target},
    registry::Rooms,
    rules::Rules,
};

use super::{error::JoinError, profile::Profile};

/// The parts of a connection a room needs to serve it.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    pub id: ClientId,
    pub addr: SocketAddr,
    pub send: mpsc::Sender<RoomMessage>,
}

#[derive(Debug)]
pub struct RegisterRequest {
    pub client: ClientHandle,
    pub wants_nick: String,
    pub creator: bool,
}

#[derive(Debug)]
pub struct UnregisterRequest {
    pub client: ClientId,
    pub reason: String,
}

/// Joins and leaves share one queue so a client's requests are handled in
/// the order it sent them.
#[derive(Debug)]
enum MembershipRequest {
    Register(RegisterRequest),
    Unregister(UnregisterRequest),
}

#[derive(Clone)]
pub struct RoomHandle {
    id: Uuid,
    name: Arc<str>,
    no_commands: bool,
    password: watch::Receiver<Option<String>>,
    membership: mpsc::Sender<MembershipRequest>,
    internal: mpsc::Sender<RoomMessage>,
    external: mpsc::Sender<ClientMessage>,
}

impl RoomHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn commands_disabled(&self) -> bool {
        self.no_commands
    }

    /// The room's current password, as last published by the actor.
    pub fn password(&self) -> Option<String> {
        self.password.borrow().clone()
    }

    pub fn check_password(&self, given: Option<&str>) -> Result<(), JoinError> {
        match (self.password.borrow().as_deref(), given) {
            (None, _) => Ok(()),
            (Some(_), None) => Err(JoinError::PasswordRequired),
            (Some(password), Some(given)) if password == given => Ok(()),
            (Some(_), Some(_)) => Err(JoinError::WrongPassword),
        }
    }

    pub async fn register(&self, request: RegisterRequest) -> AppResult<()> {
        self.membership
            .send(MembershipRequest::Register(request))
            .await
            .map_err(|_| self.closed())?;
        Ok(())
    }

    pub async fn unregister(&self, client: ClientId, reason: impl Into<String>) -> AppResult<()> {
        let request = UnregisterRequest { client, reason: reason.into() };
        self.membership
            .send(MembershipRequest::Unregister(request))
            .await
            .map_err(|_| self.closed())?;
        Ok(())
    }

    /// Queues a message for delivery to every member its target matches.
    pub async fn broadcast(&self, message: RoomMessage) -> AppResult<()> {
        self.internal.send(message).await.map_err(|_| self.closed())?;
        Ok(())
    }

    pub async fn send(&self, message: ClientMessage) -> AppResult<()> {
        self.external.send(message).await.map_err(|_| self.closed())?;
        Ok(())
    }

    fn closed(&self) -> anyhow::Error {
        anyhow!("room {} is closed", self.name)
    }
}

struct Member {
    addr: SocketAddr,
    send: mpsc::Sender<RoomMessage>,
    profile: Profile,
}

pub struct Room {
    id: Uuid,
    name: Arc<str>,
    rules: Rules,
    rooms: Rooms,
    members: HashMap<ClientId, Member>,
    pending: VecDeque<RoomMessage>,
    password: watch::Sender<Option<String>>,
    membership: mpsc::Receiver<MembershipRequest>,
    internal: mpsc::Receiver<RoomMessage>,
    external: mpsc::Receiver<ClientMessage>,
}

impl Room {
    /// Builds a room and the handle to reach it. The room does nothing until
    /// [`Room::run`] is spawned, and is not registered anywhere yet.
    pub fn new(name: &str, rules: Rules, rooms: Rooms, queues: QueueSizes) -> (Room, RoomHandle) {
        let id = Uuid::now_v7();
        let name: Arc<str> = Arc::from(name);

        let (membership_tx, membership) = mpsc::channel(queues.membership);
        let (internal_tx, internal) = mpsc::channel(queues.room);
        let (external_tx, external) = mpsc::channel(queues.room);
        let (password, password_rx) = watch::channel(rules.get_password().map(str::to_owned));

        let handle = RoomHandle {
            id,
            name: name.clone(),
            no_commands: rules.commands_disabled(),
            password: password_rx,
            membership: membership_tx,
            internal: internal_tx,
            external: external_tx,
        };

        let room = Room {
            id,
            name,
            rules,
            rooms,
            members: HashMap::new(),
            pending: VecDeque::new(),
            password,
            membership,
            internal,
            external,
        };

        (room, handle)
    }

    pub async fn run(mut self) {
        info!(room = %self.name, "room opened");

        loop {
            // Messages the room emitted for itself go out before anything new is read.
            let flow = match self.pending.pop_front() {
                Some(message) => self.handle_internal(message),
                None => tokio::select! {
                    Some(request) = self.membership.recv() => match request {
                        MembershipRequest::Register(request) => self.handle_register(request),
                        MembershipRequest::Unregister(request) => self.handle_unregister(request),
                    },
                    Some(message) = self.internal.recv() => self.handle_internal(message),
                    Some(message) = self.external.recv() => self.handle_external(message),
                    else => ControlFlow::Break(()),
                },
            };

            if flow.is_break() {
                break;
            }
        }

        info!(room = %self.name, "room closed");
    }

    fn emit(&mut self, message: RoomMessage) {
        self.pending.push_back(message);
    }

    fn reply(&mut self, client: ClientId, kind: MessageType, body: impl Into<String>) {
        self.emit(RoomMessage::new(kind, body).to_client(client));
    }

    fn handle_register(&mut self, request: RegisterRequest) -> ControlFlow<()> {
        let RegisterRequest { client, wants_nick, creator } = request;
        debug!(room = %self.name, client = %client.id, creator, "register");

        self.members.insert(
            client.id,
            Member {
                addr: client.addr,
                send: client.send,
                profile: Profile::new(creator),
            },
        );

        if let Some(welcome) = self.rules.get_welcome_message().map(str::to_owned) {
            self.reply(client.id, MessageType::Notice, welcome);
        }

        if !self.rules.commands_disabled() && !wants_nick.is_empty() {
            self.set_nick(client.id, &wants_nick);
        }

        ControlFlow::Continue(())
    }

    fn handle_unregister(&mut self, request: UnregisterRequest) -> ControlFlow<()> {
        let UnregisterRequest { client, reason } = request;
        let Some(member) = self.members.get(&client) else {
            return ControlFlow::Continue(());
        };
        debug!(room = %self.name, %client, %reason, "unregister");

        if !member.profile.nick.is_empty() {
            let body = format!("{} left the room: {reason}", member.profile.nick);
            self.emit(RoomMessage::new(MessageType::Leave, body));
        }

        self.remove(client)
    }

    /// Drops a member. Breaks when the room should shut down.
    fn remove(&mut self, client: ClientId) -> ControlFlow<()> {
        self.members.remove(&client);

        if self.rules.stays_open() || !self.members.is_empty() {
            return ControlFlow::Continue(());
        }

        if self.rooms.get(&self.name).is_some_and(|handle| handle.id() == self.id) {
            self.rooms.remove(&self.name);
        }
        ControlFlow::Break(())
    }

    fn handle_internal(&mut self, message: RoomMessage) -> ControlFlow<()> {
        let mut stalled = Vec::new();

        for (id, member) in &self.members {
            if !message.target.matches(*id, &member.profile) {
                continue;
            }

            match member.send.try_send(message.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => stalled.push(*id),
                Err(TrySendError::Closed(_)) => {
                    debug!(room = %self.name, client = %id, "outbound queue closed");
                }
            }
        }

        let mut flow = ControlFlow::Continue(());
        for client in stalled {
            warn!(room = %self.name, %client, "outbound queue full, dropping client");
            if self.remove(client).is_break() {
                flow = ControlFlow::Break(());
            }
        }
        flow
    }

    fn handle_external(&mut self, message: ClientMessage) -> ControlFlow<()> {
        let ClientMessage { client, kind } = message;

        match kind {
            ClientMessageKind::Chat(body) => {
                if self.rules.messages_disabled() {
                    self.reply(client, MessageType::Error, "messages are disabled on this room");
                    return ControlFlow::Continue(());
                }

                let Some(member) = self.members.get(&client) else {
                    debug!(room = %self.name, %client, "chat from non-member");
                    return ControlFlow::Continue(());
                };

                if member.profile.nick.is_empty() {
                    self.reply(
                        client,
                        MessageType::Error,
                        "you must set a nickname with /nick before sending messages",
                    );
                    return ControlFlow::Continue(());
                }

                let message = ClientMessage::promote(&body, &member.profile);
                self.handle_internal(message)
            }

            ClientMessageKind::Command(command) => {
                // Informational only: the command still runs below.
                if self.rules.commands_disabled() {
                    self.reply(client, MessageType::Error, "commands are disabled on this room");
                }

                let Some(level) = self.members.get(&client).map(|member| member.profile.level) else {
                    debug!(room = %self.name, %client, "command from non-member");
                    return ControlFlow::Continue(());
                };

                if command.level > level {
                    let body = format!(
                        "insufficient permission ({level}) to use {} ({})",
                        command.name, command.level
                    );
                    self.reply(client, MessageType::Error, body);
                    return ControlFlow::Continue(());
                }

                debug!(room = %self.name, %client, command = %command.name, "command");
                match (command.name.as_str(), command.arg(0), command.arg(1)) {
                    ("nick", Some(nick), _) => self.set_nick(client, nick),
                    ("who", _, _) => self.who(client),
                    ("w", Some(nick), Some(text)) => self.whisper(client, nick, text),
                    ("op", Some(nick), Some(level)) => self.op(client, nick, level),
                    ("welcome", text, _) => self.welcome(client, text),
                    ("password", password, _) => self.password(client, password),
                    (name, _, _) => debug!(room = %self.name, %client, command = name, "not a room command"),
                }

                ControlFlow::Continue(())
            }
        }
    }

    fn set_nick(&mut self, client: ClientId, nick: &str) {
        let nick = nick.trim();
        if nick.is_empty() {
            self.reply(client, MessageType::Error, "nickname cannot be empty");
            return;
        }

        let taken = self
            .members
            .iter()
            .any(|(id, member)| *id != client && member.profile.nick == nick);
        if taken {
            self.reply(client, MessageType::Error, format!("nickname {nick} is already in use"));
            return;
        }

        let Some(member) = self.members.get_mut(&client) else {
            return;
        };
        let old = std::mem::replace(&mut member.profile.nick, nick.to_owned());
        debug!(room = %self.name, %client, %old, new = nick, "nick");

        if old.is_empty() {
            self.emit(RoomMessage::new(MessageType::Join, format!("{nick} joined the room")));
        } else {
            self.emit(RoomMessage::notice(format!("{old} changed their nickname to {nick}")));
        }
    }

    fn who(&mut self, client: ClientId) {
        let mut online: Vec<(&str, SocketAddr)> = self
            .members
            .values()
            .filter(|member| !member.profile.nick.is_empty())
            .map(|member| (member.profile.nick.as_str(), member.addr))
            .collect();
        online.sort();

        let message = if online.is_empty() {
            RoomMessage::notice("no one is currently online")
        } else {
            let lines: Vec<String> = online
                .into_iter()
                .map(|(nick, addr)| format!("{nick} ({addr})"))
                .collect();
            RoomMessage::new(MessageType::Command, format!("currently online:\n{}", lines.join("\n")))
        };

        self.emit(message.to_client(client));
    }

    fn whisper(&mut self, client: ClientId, nick: &str, text: &str) {
        let Some(sender) = self.members.get(&client) else {
            return;
        };

        if sender.profile.nick.is_empty() {
            self.reply(client, MessageType::Error, "you must set a nickname before sending messages");
            return;
        }

        let whisper = || {
            RoomMessage::new(MessageType::Whisper, format!("whispers: {text}")).sent_by(&sender.profile)
        };
        let to_target = whisper().to(Target::NickIs(nick.to_owned()));
        let to_sender = whisper().to_client(client);

        self.emit(to_target);
        self.emit(to_sender);
    }

    fn op(&mut self, client: ClientId, nick: &str, level: &str) {
        let level: OpLevel = match level.parse() {
            Ok(level) => level,
            Err(err) => {
                self.reply(client, MessageType::Error, err.to_string());
                return;
            }
        };

        let Some(target) = self
            .members
            .iter()
            .find(|(_, member)| member.profile.nick == nick)
            .map(|(id, _)| *id)
        else {
            self.reply(client, MessageType::Error, format!("user {nick} is not online"));
            return;
        };

        // The issuer's level is the one that changes; the named member keeps theirs.
        if let Some(member) = self.members.get_mut(&client) {
            member.profile.level = level;
        }

        self.reply(client, MessageType::Notice, format!("{nick}'s permission level is now {level}"));
        self.reply(target, MessageType::Notice, format!("your permission level is now {level}"));
    }

    fn welcome(&mut self, client: ClientId, text: Option<&str>) {
        match text.filter(|text| !text.is_empty()) {
            None => {
                self.rules.set_welcome_message(None);
                self.reply(client, MessageType::Notice, "welcome message disabled");
            }
            Some(text) => {
                self.rules.set_welcome_message(Some(text.to_owned()));
                self.reply(client, MessageType::Notice, format!("welcome message set to: {text}"));
            }
        }
    }

    fn password(&mut self, client: ClientId, password: Option<&str>) {
        let password = password.map(str::to_owned);
        self.rules.set_password(password.clone());
        self.password.send_replace(password.clone());

        let body = match password {
            None => "password disabled".to_owned(),
            Some(password) => format!("password set to: {password}"),
        };
        self.reply(client, MessageType::Notice, body);
    }
}
