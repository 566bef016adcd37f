use crate::error::ConfigError;
use crate::pow::MAX_DIFFICULTY;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_DIFFICULTY: usize = 2;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9095;
pub const DEFAULT_MINE_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Leading zero characters required of a block hash, for sealing and appending alike.
    pub difficulty: usize,
    /// Upper bound on nonces tried per seal; `None` searches until found or cancelled.
    pub max_attempts: Option<u64>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            difficulty: DEFAULT_DIFFICULTY,
            max_attempts: None,
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let difficulty = parse_var(&lookup, "LEDGER_DIFFICULTY")?.unwrap_or(DEFAULT_DIFFICULTY);
        if difficulty > MAX_DIFFICULTY {
            return Err(ConfigError::Invalid {
                key: "LEDGER_DIFFICULTY",
                value: difficulty.to_string(),
            });
        }
        let max_attempts = parse_var(&lookup, "LEDGER_MAX_ATTEMPTS")?;
        Ok(LedgerConfig {
            difficulty,
            max_attempts,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// How long a `/mine` request may search before it is cancelled.
    pub mine_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            mine_timeout: Duration::from_millis(DEFAULT_MINE_TIMEOUT_MS),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("SERVER_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_var(&lookup, "SERVER_PORT")?.unwrap_or(DEFAULT_PORT);
        let mine_timeout_ms =
            parse_var(&lookup, "MINE_TIMEOUT_MS")?.unwrap_or(DEFAULT_MINE_TIMEOUT_MS);
        Ok(ServerConfig {
            host,
            port,
            mine_timeout: Duration::from_millis(mine_timeout_ms),
        })
    }

    pub fn bind_addr(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}
