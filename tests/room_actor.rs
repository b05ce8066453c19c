//! Room actor tests, driven through the room's handle with in-memory client queues.

use std::{net::SocketAddr, time::Duration};

use parlour::{
    command::{self, Command},
    config::QueueSizes,
    message::{ClientMessage, MessageType, RoomMessage},
    registry::Rooms,
    rooms::{ClientHandle, JoinError, RegisterRequest, Room, RoomHandle},
    rules::Rules,
};
use tokio::{sync::mpsc, task::JoinHandle, time::timeout};
use uuid::Uuid;

const WAIT: Duration = Duration::from_secs(2);

struct Member {
    id: Uuid,
    rx: mpsc::Receiver<RoomMessage>,
}

fn open(rooms: &Rooms, name: &str, rules: Rules) -> (RoomHandle, JoinHandle<()>) {
    let (room, handle) = Room::new(name, rules, rooms.clone(), QueueSizes::default());
    assert!(rooms.create(name, handle.clone()));
    (handle, tokio::spawn(room.run()))
}

async fn register(room: &RoomHandle, port: u16, nick: &str, creator: bool, capacity: usize) -> Member {
    let (send, rx) = mpsc::channel(capacity);
    let id = Uuid::now_v7();
    let client = ClientHandle {
        id,
        addr: SocketAddr::from(([127, 0, 0, 1], port)),
        send,
    };

    room.register(RegisterRequest {
        client,
        wants_nick: nick.to_owned(),
        creator,
    })
    .await
    .unwrap();

    Member { id, rx }
}

/// Registers a member with a nickname and waits until the room has announced it.
async fn join(room: &RoomHandle, port: u16, nick: &str, creator: bool) -> Member {
    let mut member = register(room, port, nick, creator, 64).await;
    let announce = format!("{nick} joined the room");
    until(&mut member, |m| m.kind == MessageType::Join && m.body == announce).await;
    member
}

async fn next(member: &mut Member) -> RoomMessage {
    timeout(WAIT, member.rx.recv())
        .await
        .expect("timed out waiting for a message")
        .expect("outbound queue closed")
}

async fn until(member: &mut Member, pred: impl Fn(&RoomMessage) -> bool) -> RoomMessage {
    loop {
        let message = next(member).await;
        if pred(&message) {
            return message;
        }
    }
}

fn cmd(line: &str) -> Command {
    command::parse(line).unwrap().unwrap()
}

async fn run(room: &RoomHandle, member: &Member, line: &str) {
    room.send(ClientMessage::command(member.id, cmd(line))).await.unwrap();
}

async fn say(room: &RoomHandle, member: &Member, text: &str) {
    room.send(ClientMessage::chat(member.id, text)).await.unwrap();
}

fn assert_message(message: &RoomMessage, kind: MessageType, body: &str) {
    assert_eq!(message.kind, kind, "{message:?}");
    assert_eq!(message.body, body, "{message:?}");
}

#[tokio::test]
async fn register_sends_private_welcome_then_announces_nick() {
    let rooms = Rooms::new();
    let (room, _task) = open(&rooms, "lounge", Rules::new().welcome_message("be nice"));

    let mut alice = register(&room, 1, "alice", false, 64).await;
    assert_message(&next(&mut alice).await, MessageType::Notice, "be nice");
    let joined = next(&mut alice).await;
    assert_message(&joined, MessageType::Join, "alice joined the room");
    assert_eq!(joined.nick, "*");

    let mut bob = register(&room, 2, "bob", false, 64).await;
    assert_message(&next(&mut bob).await, MessageType::Notice, "be nice");
    assert_message(&next(&mut bob).await, MessageType::Join, "bob joined the room");

    assert_message(&next(&mut alice).await, MessageType::Join, "bob joined the room");
    assert!(alice.rx.try_recv().is_err(), "welcome leaked to another member");
}

#[tokio::test]
async fn duplicate_nick_is_rejected_without_roster_change() {
    let rooms = Rooms::new();
    let (room, _task) = open(&rooms, "lounge", Rules::new());

    let _alice = join(&room, 1, "alice", false).await;
    let mut bob = join(&room, 2, "bob", false).await;

    run(&room, &bob, "/nick alice").await;
    assert_message(&next(&mut bob).await, MessageType::Error, "nickname alice is already in use");

    run(&room, &bob, "/who").await;
    assert_message(
        &next(&mut bob).await,
        MessageType::Command,
        "currently online:\nalice (127.0.0.1:1)\nbob (127.0.0.1:2)",
    );
}

#[tokio::test]
async fn nick_changes_are_announced() {
    let rooms = Rooms::new();
    let (room, _task) = open(&rooms, "lounge", Rules::new());
    let mut alice = join(&room, 1, "alice", false).await;

    run(&room, &alice, "/nick alicia").await;
    assert_message(&next(&mut alice).await, MessageType::Notice, "alice changed their nickname to alicia");

    run(&room, &alice, r#"/nick "   ""#).await;
    assert_message(&next(&mut alice).await, MessageType::Error, "nickname cannot be empty");
}

#[tokio::test]
async fn taken_nick_at_registration_leaves_member_nameless() {
    let rooms = Rooms::new();
    let (room, _task) = open(&rooms, "lounge", Rules::new().welcome_message("hi"));

    let mut alice = register(&room, 1, "alice", false, 64).await;
    until(&mut alice, |m| m.body == "alice joined the room").await;

    let mut impostor = register(&room, 2, "alice", false, 64).await;
    assert_message(&next(&mut impostor).await, MessageType::Notice, "hi");
    assert_message(&next(&mut impostor).await, MessageType::Error, "nickname alice is already in use");

    say(&room, &impostor, "hello").await;
    assert_message(
        &next(&mut impostor).await,
        MessageType::Error,
        "you must set a nickname with /nick before sending messages",
    );
}

#[tokio::test]
async fn chat_without_nick_is_never_broadcast() {
    let rooms = Rooms::new();
    let (room, _task) = open(&rooms, "lounge", Rules::new().welcome_message("hi"));

    let mut alice = register(&room, 1, "alice", false, 64).await;
    until(&mut alice, |m| m.body == "alice joined the room").await;

    let mut anon = register(&room, 2, "", false, 64).await;
    assert_message(&next(&mut anon).await, MessageType::Notice, "hi");

    say(&room, &anon, "hello").await;
    assert_message(
        &next(&mut anon).await,
        MessageType::Error,
        "you must set a nickname with /nick before sending messages",
    );

    run(&room, &anon, "/w alice psst").await;
    assert_message(
        &next(&mut anon).await,
        MessageType::Error,
        "you must set a nickname before sending messages",
    );

    say(&room, &alice, "ping").await;
    let ping = next(&mut alice).await;
    assert_message(&ping, MessageType::Message, "ping");
    assert_eq!(ping.nick, "alice");

    assert_message(&next(&mut anon).await, MessageType::Message, "ping");
}

#[tokio::test]
async fn whisper_reaches_target_and_echoes_to_sender() {
    let rooms = Rooms::new();
    let (room, _task) = open(&rooms, "lounge", Rules::new());

    let mut alice = join(&room, 1, "alice", false).await;
    let mut bob = join(&room, 2, "bob", false).await;
    let mut carol = join(&room, 3, "carol", false).await;
    until(&mut alice, |m| m.body == "carol joined the room").await;
    until(&mut bob, |m| m.body == "carol joined the room").await;

    run(&room, &alice, r#"/w bob "meet at noon""#).await;

    let to_bob = next(&mut bob).await;
    assert_message(&to_bob, MessageType::Whisper, "whispers: meet at noon");
    assert_eq!(to_bob.nick, "alice");

    let echo = next(&mut alice).await;
    assert_message(&echo, MessageType::Whisper, "whispers: meet at noon");
    assert_ne!(echo.id, to_bob.id);

    say(&room, &alice, "done").await;
    assert_message(&next(&mut carol).await, MessageType::Message, "done");
}

#[tokio::test]
async fn op_changes_the_issuers_level_not_the_targets() {
    let rooms = Rooms::new();
    let (room, _task) = open(&rooms, "lounge", Rules::new());

    let mut root = join(&room, 1, "root", true).await;
    let mut bob = join(&room, 2, "bob", false).await;
    until(&mut root, |m| m.body == "bob joined the room").await;

    run(&room, &root, "/op bob admin").await;
    assert_message(&next(&mut root).await, MessageType::Notice, "bob's permission level is now admin");
    assert_message(&next(&mut bob).await, MessageType::Notice, "your permission level is now admin");

    run(&room, &bob, "/welcome hi").await;
    assert_message(
        &next(&mut bob).await,
        MessageType::Error,
        "insufficient permission (user) to use welcome (admin)",
    );

    run(&room, &root, "/op bob none").await;
    assert_message(&next(&mut root).await, MessageType::Notice, "bob's permission level is now none");
    assert_message(&next(&mut bob).await, MessageType::Notice, "your permission level is now none");

    run(&room, &root, "/welcome hi").await;
    assert_message(
        &next(&mut root).await,
        MessageType::Error,
        "insufficient permission (none) to use welcome (admin)",
    );
}

#[tokio::test]
async fn op_rejects_unknown_levels_and_absent_members() {
    let rooms = Rooms::new();
    let (room, _task) = open(&rooms, "lounge", Rules::new());
    let mut root = join(&room, 1, "root", true).await;

    run(&room, &root, "/op root superuser").await;
    assert_message(&next(&mut root).await, MessageType::Error, "unknown OP level: superuser");

    run(&room, &root, "/op ghost admin").await;
    assert_message(&next(&mut root).await, MessageType::Error, "user ghost is not online");
}

#[tokio::test]
async fn welcome_treats_empty_text_as_disabled() {
    let rooms = Rooms::new();
    let (room, _task) = open(&rooms, "lounge", Rules::new());
    let mut root = join(&room, 1, "root", true).await;

    run(&room, &root, r#"/welcome "hello all""#).await;
    assert_message(&next(&mut root).await, MessageType::Notice, "welcome message set to: hello all");

    let mut bob = register(&room, 2, "bob", false, 64).await;
    assert_message(&next(&mut bob).await, MessageType::Notice, "hello all");
    assert_message(&next(&mut bob).await, MessageType::Join, "bob joined the room");

    run(&room, &root, r#"/welcome """#).await;
    until(&mut root, |m| m.body == "welcome message disabled").await;

    run(&room, &root, "/welcome").await;
    assert_message(&next(&mut root).await, MessageType::Notice, "welcome message disabled");
}

#[tokio::test]
async fn password_treats_presence_as_enabled() {
    let rooms = Rooms::new();
    let (room, _task) = open(&rooms, "lounge", Rules::new());
    let mut root = join(&room, 1, "root", true).await;
    assert_eq!(room.password(), None);

    run(&room, &root, "/password secret").await;
    assert_message(&next(&mut root).await, MessageType::Notice, "password set to: secret");
    assert_eq!(room.password().as_deref(), Some("secret"));
    assert_eq!(room.check_password(None), Err(JoinError::PasswordRequired));
    assert_eq!(room.check_password(Some("nope")), Err(JoinError::WrongPassword));
    assert_eq!(room.check_password(Some("secret")), Ok(()));

    run(&room, &root, r#"/password """#).await;
    assert_message(&next(&mut root).await, MessageType::Notice, "password set to: ");
    assert_eq!(room.password().as_deref(), Some(""));

    run(&room, &root, "/password").await;
    assert_message(&next(&mut root).await, MessageType::Notice, "password disabled");
    assert_eq!(room.password(), None);
    assert_eq!(room.check_password(None), Ok(()));
}

#[tokio::test]
async fn no_messages_rejects_chat() {
    let rooms = Rooms::new();
    let (room, _task) = open(&rooms, "quiet", Rules::new().no_messages());
    let mut alice = join(&room, 1, "alice", false).await;

    say(&room, &alice, "hello").await;
    assert_message(&next(&mut alice).await, MessageType::Error, "messages are disabled on this room");
}

#[tokio::test]
async fn no_commands_warns_but_still_runs_the_command() {
    let rooms = Rooms::new();
    let (room, _task) = open(&rooms, "strict", Rules::new().no_commands().welcome_message("hi"));

    let mut alice = register(&room, 1, "alice", false, 64).await;
    assert_message(&next(&mut alice).await, MessageType::Notice, "hi");

    run(&room, &alice, "/who").await;
    assert_message(&next(&mut alice).await, MessageType::Error, "commands are disabled on this room");
    assert_message(&next(&mut alice).await, MessageType::Notice, "no one is currently online");

    run(&room, &alice, "/nick alice").await;
    assert_message(&next(&mut alice).await, MessageType::Error, "commands are disabled on this room");
    assert_message(&next(&mut alice).await, MessageType::Join, "alice joined the room");
}

#[tokio::test]
async fn leaving_is_announced_and_last_member_closes_room() {
    let rooms = Rooms::new();
    let (room, task) = open(&rooms, "lounge", Rules::new());

    let alice = join(&room, 1, "alice", false).await;
    let mut bob = join(&room, 2, "bob", false).await;

    room.unregister(alice.id, "quit").await.unwrap();
    assert_message(&next(&mut bob).await, MessageType::Leave, "alice left the room: quit");
    assert!(rooms.contains("lounge"));

    room.unregister(bob.id, "quit").await.unwrap();
    timeout(WAIT, task).await.expect("room did not shut down").unwrap();
    assert!(!rooms.contains("lounge"));
}

#[tokio::test]
async fn leave_then_rejoin_from_one_client_is_handled_in_order() {
    let rooms = Rooms::new();
    let (room, _task) = open(&rooms, "main", Rules::new().keep_open());
    let mut bob = join(&room, 2, "bob", false).await;

    for round in 0..20 {
        let first = join(&room, 1, "alice", false).await;
        until(&mut bob, |m| m.body == "alice joined the room").await;

        // Leave and come straight back with the same id and a fresh queue.
        room.unregister(first.id, "rejoining").await.unwrap();
        let (send, rx) = mpsc::channel(64);
        let client = ClientHandle {
            id: first.id,
            addr: SocketAddr::from(([127, 0, 0, 1], 1)),
            send,
        };
        room.register(RegisterRequest {
            client,
            wants_nick: "alice".to_owned(),
            creator: false,
        })
        .await
        .unwrap();

        let mut second = Member { id: first.id, rx };
        until(&mut second, |m| m.body == "alice joined the room").await;
        until(&mut bob, |m| m.body == "alice joined the room").await;

        say(&room, &second, &format!("round {round}")).await;
        let echoed = format!("round {round}");
        until(&mut second, |m| m.body == echoed).await;

        room.unregister(second.id, "done").await.unwrap();
        until(&mut bob, |m| m.body == "alice left the room: done").await;
    }
}

#[tokio::test]
async fn keep_open_room_survives_an_empty_roster() {
    let rooms = Rooms::new();
    let (room, task) = open(&rooms, "main", Rules::new().keep_open());

    let alice = join(&room, 1, "alice", false).await;
    room.unregister(alice.id, "quit").await.unwrap();

    let _bob = join(&room, 2, "bob", false).await;
    assert!(rooms.contains("main"));
    assert!(!task.is_finished());
}

#[tokio::test]
async fn full_outbound_queue_drops_only_that_client() {
    let rooms = Rooms::new();
    let (room, _task) = open(&rooms, "lounge", Rules::new());

    let mut a = join(&room, 1, "a", false).await;
    let mut b = join(&room, 2, "b", false).await;
    let mut c = join(&room, 3, "c", false).await;

    let mut x = register(&room, 4, "x", false, 1).await;
    until(&mut a, |m| m.body == "x joined the room").await;

    say(&room, &a, "hello").await;
    for member in [&mut a, &mut b, &mut c] {
        until(member, |m| m.kind == MessageType::Message && m.body == "hello").await;
    }

    assert_message(&next(&mut x).await, MessageType::Join, "x joined the room");
    let after = timeout(WAIT, x.rx.recv()).await.expect("queue was not closed");
    assert!(after.is_none(), "stalled client still received {after:?}");

    run(&room, &a, "/who").await;
    let who = until(&mut a, |m| m.kind == MessageType::Command).await;
    assert_eq!(
        who.body,
        "currently online:\na (127.0.0.1:1)\nb (127.0.0.1:2)\nc (127.0.0.1:3)"
    );
}

#[tokio::test]
async fn broadcasts_from_the_handle_reach_every_member() {
    let rooms = Rooms::new();
    let (room, _task) = open(&rooms, "lounge", Rules::new());

    let mut alice = join(&room, 1, "alice", false).await;
    let mut bob = join(&room, 2, "bob", false).await;

    room.broadcast(RoomMessage::notice("server is shutting down")).await.unwrap();
    until(&mut alice, |m| m.body == "server is shutting down").await;
    assert_message(&next(&mut bob).await, MessageType::Notice, "server is shutting down");
}
