use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    #[error("room {0} does not exist")]
    NoSuchRoom(String),
    #[error("room {0} already exists")]
    AlreadyExists(String),
    #[error("room has a password")]
    PasswordRequired,
    #[error("incorrect password")]
    WrongPassword,
}
