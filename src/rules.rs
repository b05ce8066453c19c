/// Per-room configuration. Only the owning room actor mutates it after setup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rules {
    password: Option<String>,
    welcome_message: Option<String>,
    no_commands: bool,
    no_messages: bool,
    keep_open: bool,
}

impl Rules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn welcome_message(mut self, message: impl Into<String>) -> Self {
        self.welcome_message = Some(message.into());
        self
    }

    pub fn no_commands(mut self) -> Self {
        self.no_commands = true;
        self
    }

    pub fn no_messages(mut self) -> Self {
        self.no_messages = true;
        self
    }

    pub fn keep_open(mut self) -> Self {
        self.keep_open = true;
        self
    }

    pub fn get_password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn get_welcome_message(&self) -> Option<&str> {
        self.welcome_message.as_deref()
    }

    pub fn commands_disabled(&self) -> bool {
        self.no_commands
    }

    pub fn messages_disabled(&self) -> bool {
        self.no_messages
    }

    pub fn stays_open(&self) -> bool {
        self.keep_open
    }

    pub(crate) fn set_password(&mut self, password: Option<String>) {
        self.password = password;
    }

    pub(crate) fn set_welcome_message(&mut self, message: Option<String>) {
        self.welcome_message = message;
    }
}
