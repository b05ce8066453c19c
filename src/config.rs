use std::{net::SocketAddr, str::FromStr};

use anyhow::{anyhow, Context};

use crate::AppResult;

/// Capacities of the bounded queues between sessions and rooms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSizes {
    /// Per-client inbound lines and outbound messages.
    pub client: usize,
    /// A room's internal and external message queues.
    pub room: usize,
    /// A room's register/unregister queue.
    pub membership: usize,
}

impl Default for QueueSizes {
    fn default() -> Self {
        Self {
            client: 256,
            room: 512,
            membership: 256,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    pub queues: QueueSizes,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        dotenv::dotenv().ok();

        let defaults = QueueSizes::default();
        Ok(Config {
            bind: var_or("PARLOUR_BIND", SocketAddr::from(([0, 0, 0, 0], 8080)))?,
            queues: QueueSizes {
                client: capacity("PARLOUR_CLIENT_QUEUE", defaults.client)?,
                room: capacity("PARLOUR_ROOM_QUEUE", defaults.room)?,
                membership: capacity("PARLOUR_MEMBERSHIP_QUEUE", defaults.membership)?,
            },
        })
    }
}

fn var_or<T>(key: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match dotenv::var(key) {
        Ok(value) => Ok(value
            .trim()
            .parse()
            .with_context(|| format!("invalid {key}: {value:?}"))?),
        Err(_) => Ok(default),
    }
}

fn capacity(key: &str, default: usize) -> AppResult<usize> {
    match var_or(key, default)? {
        0 => Err(anyhow!("{key} must be at least 1").into()),
        n => Ok(n),
    }
}
