use std::net::SocketAddr;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    command::{self, Command, CommandTarget},
    config::QueueSizes,
    message::{ClientId, ClientMessage, MessageType, RoomMessage},
    registry::Rooms,
    rules::Rules,
};

use super::{
    DEFAULT_ROOM, JoinError, spawn_room,
    room::{ClientHandle, RegisterRequest, RoomHandle},
};

/// The room a client is in, and what that room has queued for it.
struct Membership {
    handle: RoomHandle,
    messages: mpsc::Receiver<RoomMessage>,
}

/// One connection's session: decodes what the client types, talks to its
/// current room and forwards the room's messages to the transport.
pub struct Client {
    id: ClientId,
    addr: SocketAddr,
    rooms: Rooms,
    queues: QueueSizes,
    nick: String,
    room: Option<Membership>,
    send: mpsc::Sender<RoomMessage>,
    recv: mpsc::Receiver<String>,
}

impl Client {
    pub fn new(
        addr: SocketAddr,
        rooms: Rooms,
        queues: QueueSizes,
        send: mpsc::Sender<RoomMessage>,
        recv: mpsc::Receiver<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            addr,
            rooms,
            queues,
            nick: String::new(),
            room: None,
            send,
            recv,
        }
    }

    /// Runs until either side of the transport goes away.
    ///
    /// Dropping `recv`'s sender or `send`'s receiver ends the session; the
    /// current room is told exactly once and the outbound queue is closed.
    pub async fn serve(mut self) {
        info!(client = %self.id, addr = %self.addr, "connected");

        self.deliver(RoomMessage::reset()).await;
        self.join(DEFAULT_ROOM, None).await;

        loop {
            tokio::select! {
                _ = self.send.closed() => break,
                line = self.recv.recv() => match line {
                    Some(line) => self.handle(line).await,
                    None => break,
                },
                message = next_message(&mut self.room) => match message {
                    Some(message) => self.deliver(message).await,
                    None => {
                        if !self.lost_room().await {
                            break;
                        }
                    }
                },
            }
        }

        self.close("quit").await;
        info!(client = %self.id, addr = %self.addr, "disconnected");
    }

    async fn handle(&mut self, line: String) {
        if line.trim().is_empty() {
            return;
        }

        match command::parse(&line) {
            Ok(None) => self.forward(ClientMessage::chat(self.id, line)).await,
            Err(err) if err.partial().is_none() => {
                self.forward(ClientMessage::chat(self.id, line)).await
            }
            Err(err) => self.error(err.to_string()).await,
            Ok(Some(command)) if command.target == CommandTarget::Room => {
                self.forward(ClientMessage::command(self.id, command)).await
            }
            Ok(Some(command)) => self.command(command).await,
        }
    }

    async fn command(&mut self, command: Command) {
        debug!(client = %self.id, command = %command.name, "client command");

        match (command.name.as_str(), command.arg(0), command.arg(1)) {
            ("join", Some(room), password) => self.join(room, password).await,
            ("start", Some(room), password) => self.start(room, password).await,
            ("exit", _, _) => self.join(DEFAULT_ROOM, None).await,
            ("clear", _, _) => self.deliver(RoomMessage::reset()).await,
            ("help", _, _) => {
                let body = command::help(command.args.as_slice());
                self.deliver(RoomMessage::new(MessageType::Command, body)).await
            }
            ("nick", Some(nick), _) => {
                self.nick = nick.to_owned();

                let room_handles_nick = self
                    .room
                    .as_ref()
                    .is_some_and(|membership| !membership.handle.commands_disabled());
                if room_handles_nick {
                    self.forward(ClientMessage::command(self.id, command.clone())).await;
                }
            }
            (name, _, _) => debug!(client = %self.id, command = name, "not a client command"),
        }
    }

    async fn join(&mut self, name: &str, password: Option<&str>) {
        let Some(handle) = self.rooms.get(name) else {
            return self.error(JoinError::NoSuchRoom(name.to_owned()).to_string()).await;
        };

        if let Err(err) = handle.check_password(password) {
            return self.error(err.to_string()).await;
        }

        let already_here = self
            .room
            .as_ref()
            .is_some_and(|membership| membership.handle.id() == handle.id());
        if already_here {
            let body = format!("you are already in room {name}");
            return self.deliver(RoomMessage::notice(body)).await;
        }

        self.leave(format!("joining room {name}")).await;
        self.enter(handle, false).await;
    }

    async fn start(&mut self, name: &str, password: Option<&str>) {
        if self.rooms.contains(name) {
            return self.error(JoinError::AlreadyExists(name.to_owned()).to_string()).await;
        }

        let rules = match password {
            Some(password) => Rules::new().password(password),
            None => Rules::new(),
        };

        let handle = match spawn_room(&self.rooms, name, rules, self.queues) {
            Ok(handle) => handle,
            Err(err) => return self.error(err.to_string()).await,
        };

        self.leave(format!("starting room {name}")).await;
        self.enter(handle, true).await;
    }

    /// Leaves the current room, forgetting whatever it or the client had queued.
    async fn leave(&mut self, reason: String) {
        let Some(membership) = self.room.take() else {
            return;
        };
        debug!(client = %self.id, room = membership.handle.name(), %reason, "leaving room");

        if let Err(err) = membership.handle.unregister(self.id, reason).await {
            debug!(client = %self.id, %err, "unregister");
        }
        drop(membership);
        while self.recv.try_recv().is_ok() {}

        self.deliver(RoomMessage::reset()).await;
    }

    /// Registers with `handle`. If the room is already gone, reports it and
    /// falls back to the lobby so the session is never left without a room.
    async fn enter(&mut self, handle: RoomHandle, creator: bool) {
        let name = handle.name().to_owned();
        if self.register(handle, creator).await {
            return;
        }

        self.error(JoinError::NoSuchRoom(name.clone()).to_string()).await;
        if name == DEFAULT_ROOM {
            return;
        }

        match self.rooms.get(DEFAULT_ROOM) {
            Some(lobby) => {
                self.register(lobby, false).await;
            }
            None => warn!(client = %self.id, "lobby is gone"),
        }
    }

    async fn register(&mut self, handle: RoomHandle, creator: bool) -> bool {
        let (send, messages) = mpsc::channel(self.queues.client);
        let request = RegisterRequest {
            client: ClientHandle {
                id: self.id,
                addr: self.addr,
                send,
            },
            wants_nick: self.nick.clone(),
            creator,
        };

        if let Err(err) = handle.register(request).await {
            warn!(client = %self.id, %err, "register");
            return false;
        }

        debug!(client = %self.id, room = handle.name(), creator, "entered room");
        self.room = Some(Membership { handle, messages });
        true
    }

    /// The room stopped delivering to us. Falls back to the lobby, or reports
    /// `false` if there is no lobby left to fall back to.
    async fn lost_room(&mut self) -> bool {
        let Some(membership) = self.room.take() else {
            return true;
        };
        let name = membership.handle.name().to_owned();
        warn!(client = %self.id, room = %name, "room stopped delivering");

        if name == DEFAULT_ROOM {
            return false;
        }

        self.error(format!("lost connection to room {name}")).await;
        self.join(DEFAULT_ROOM, None).await;
        self.room.is_some()
    }

    async fn close(&mut self, reason: &str) {
        if let Some(membership) = self.room.take() {
            let _ = membership.handle.unregister(self.id, reason).await;
        }
    }

    async fn forward(&mut self, message: ClientMessage) {
        let Some(membership) = &self.room else {
            return self.error("you are not in a room".to_owned()).await;
        };

        if let Err(err) = membership.handle.send(message).await {
            warn!(client = %self.id, %err, "forward");
        }
    }

    async fn deliver(&mut self, message: RoomMessage) {
        // A closed queue is noticed by the serve loop.
        let _ = self.send.send(message).await;
    }

    async fn error(&mut self, body: String) {
        self.deliver(RoomMessage::error(body)).await;
    }
}

async fn next_message(room: &mut Option<Membership>) -> Option<RoomMessage> {
    match room {
        Some(membership) => membership.messages.recv().await,
        None => std::future::pending().await,
    }
}
