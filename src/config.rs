use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{anyhow, Context};

pub const ADDR: &str = "CHAT_ADDR";
pub const ACCOUNTS: &str = "CHAT_ACCOUNTS";
pub const OUTBOX_CAPACITY: &str = "CHAT_OUTBOX_CAPACITY";
pub const SEND_TIMEOUT_MS: &str = "CHAT_SEND_TIMEOUT_MS";

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub accounts_path: PathBuf,
    /// Frames queued per stream before deliveries to it start failing.
    pub outbox_capacity: usize,
    /// Deadline for a single socket send.
    pub send_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 55555)),
            accounts_path: PathBuf::from("db/UserCredentials.json"),
            outbox_capacity: 64,
            send_timeout: Duration::from_millis(5000),
        }
    }
}

impl Config {
    /// Reads `CHAT_*` variables, `.env` included. Unset ones keep their defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(addr) = parse(&lookup, ADDR)? {
            config.addr = addr;
        }
        if let Some(path) = lookup(ACCOUNTS) {
            config.accounts_path = PathBuf::from(path);
        }
        if let Some(capacity) = parse::<usize>(&lookup, OUTBOX_CAPACITY)? {
            if capacity == 0 {
                return Err(anyhow!("{OUTBOX_CAPACITY} must be greater than zero"));
            }
            config.outbox_capacity = capacity;
        }
        if let Some(ms) = parse::<u64>(&lookup, SEND_TIMEOUT_MS)? {
            if ms == 0 {
                return Err(anyhow!("{SEND_TIMEOUT_MS} must be greater than zero"));
            }
            config.send_timeout = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| raw.trim().parse::<T>().with_context(|| format!("invalid {key}: {raw:?}")))
        .transpose()
}
