use std::{fmt, str::FromStr};

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandTarget {
    Client,
    Room,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OpLevel {
    #[default]
    None,
    User,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown OP level: {0}")]
pub struct ParseLevelError(pub String);

impl FromStr for OpLevel {
    type Err = ParseLevelError;

    fn from_str(level: &str) -> Result<Self, Self::Err> {
        match level {
            "none" => Ok(OpLevel::None),
            "user" => Ok(OpLevel::User),
            "admin" => Ok(OpLevel::Admin),
            _ => Err(ParseLevelError(level.to_owned())),
        }
    }
}

impl fmt::Display for OpLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            OpLevel::None => "none",
            OpLevel::User => "user",
            OpLevel::Admin => "admin",
        })
    }
}

pub struct CommandSpec {
    pub name: &'static str,
    pub desc: &'static str,
    pub usage: &'static str,
    pub args_min: usize,
    pub args_max: usize,
    pub target: CommandTarget,
    pub level: OpLevel,
}

pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "join",
        desc: "join a room",
        usage: "/join <room> [password]",
        args_min: 1,
        args_max: 2,
        target: CommandTarget::Client,
        level: OpLevel::None,
    },
    CommandSpec {
        name: "start",
        desc: "start a new room",
        usage: "/start <room> [password]",
        args_min: 1,
        args_max: 2,
        target: CommandTarget::Client,
        level: OpLevel::None,
    },
    CommandSpec {
        name: "exit",
        desc: "exit the current room",
        usage: "/exit",
        args_min: 0,
        args_max: 0,
        target: CommandTarget::Client,
        level: OpLevel::None,
    },
    CommandSpec {
        name: "nick",
        desc: "change or set your nickname",
        usage: "/nick [nick]",
        args_min: 1,
        args_max: 1,
        target: CommandTarget::Client,
        level: OpLevel::User,
    },
    CommandSpec {
        name: "who",
        desc: "list all users in the current room",
        usage: "/who",
        args_min: 0,
        args_max: 0,
        target: CommandTarget::Room,
        level: OpLevel::User,
    },
    CommandSpec {
        name: "w",
        desc: "send a direct message to a user",
        usage: "/w <nickname> <message>",
        args_min: 2,
        args_max: 2,
        target: CommandTarget::Room,
        level: OpLevel::User,
    },
    CommandSpec {
        name: "clear",
        desc: "clear the chat window",
        usage: "/clear",
        args_min: 0,
        args_max: 0,
        target: CommandTarget::Client,
        level: OpLevel::None,
    },
    CommandSpec {
        name: "help",
        desc: "list all commands, or get help for a specific command",
        usage: "/help [command]",
        args_min: 0,
        args_max: 1,
        target: CommandTarget::Client,
        level: OpLevel::None,
    },
    CommandSpec {
        name: "op",
        desc: "change permission levels",
        usage: "/op <user> <level>",
        args_min: 2,
        args_max: 2,
        target: CommandTarget::Room,
        level: OpLevel::Admin,
    },
    CommandSpec {
        name: "welcome",
        desc: "set or clear the welcome message",
        usage: "/welcome [message]",
        args_min: 0,
        args_max: 1,
        target: CommandTarget::Room,
        level: OpLevel::Admin,
    },
    CommandSpec {
        name: "password",
        desc: "set or clear the password for the room",
        usage: "/password [password]",
        args_min: 0,
        args_max: 1,
        target: CommandTarget::Room,
        level: OpLevel::Admin,
    },
];

pub fn spec(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.name == name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
    pub target: CommandTarget,
    pub level: OpLevel,
}

impl Command {
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("failed to parse command: unbalanced quotes")]
    Malformed,
    #[error("unknown command: {}", .0.name)]
    Unknown(Command),
    #[error("missing arguments for: {}\nUsage:\n  {usage}", .command.name)]
    MissingArguments { command: Command, usage: &'static str },
    #[error("too many arguments for: {}\nUsage:\n  {usage}", .command.name)]
    TooManyArguments { command: Command, usage: &'static str },
}

impl CommandError {
    /// The command as far as it was parsed, if tokenizing got that far.
    pub fn partial(&self) -> Option<&Command> {
        match self {
            CommandError::Malformed => None,
            CommandError::Unknown(command)
            | CommandError::MissingArguments { command, .. }
            | CommandError::TooManyArguments { command, .. } => Some(command),
        }
    }
}

/// Parses a chat line into a command.
///
/// `Ok(None)` means the line is not a command at all and should be treated as
/// chat.
pub fn parse(input: &str) -> Result<Option<Command>, CommandError> {
    let input = input.trim();
    if input.is_empty() || !input.starts_with('/') {
        return Ok(None);
    }

    let mut tokens = shlex::split(input).ok_or(CommandError::Malformed)?.into_iter();
    let name = tokens
        .next()
        .map(|head| head.trim_start_matches('/').to_owned())
        .unwrap_or_default();
    let args: Vec<String> = tokens.collect();

    let mut command = Command {
        name,
        args,
        target: CommandTarget::Client,
        level: OpLevel::None,
    };

    let Some(spec) = spec(&command.name) else {
        return Err(CommandError::Unknown(command));
    };

    if command.args.len() < spec.args_min {
        return Err(CommandError::MissingArguments { command, usage: spec.usage });
    }

    if command.args.len() > spec.args_max {
        return Err(CommandError::TooManyArguments { command, usage: spec.usage });
    }

    command.target = spec.target;
    command.level = spec.level;
    Ok(Some(command))
}

pub fn help<S: AsRef<str>>(args: &[S]) -> String {
    match args.first() {
        None => COMMANDS
            .iter()
            .map(|spec| format!("/{}: {}", spec.name, spec.desc))
            .collect::<Vec<_>>()
            .join("\n"),
        Some(name) => match spec(name.as_ref()) {
            Some(spec) => format!("/{}: {}\n  {}", spec.name, spec.desc, spec.usage),
            None => "unknown command".to_owned(),
        },
    }
}
