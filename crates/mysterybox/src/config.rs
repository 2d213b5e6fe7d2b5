//! Startup configuration read from the environment.
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `MYSTERYBOX_BIND` | listen address | `127.0.0.1:5000` |
//! | `PORT` | shorthand for `0.0.0.0:$PORT` when `MYSTERYBOX_BIND` is unset | none |
//! | `MYSTERYBOX_STORE` | JSON file for sessions | in-memory |
//! | `MYSTERYBOX_MAX_ATTEMPTS` | attempts per round | 3 |
//! | `MYSTERYBOX_TOTAL_BOXES` | boxes on the board | 200 |
//! | `MYSTERYBOX_WIN_PROBABILITY` | chance per reveal, `[0, 1]` | 0.10 |
//! | `MYSTERYBOX_IDLE_TIMEOUT_SECS` | silent-connection cutoff | 60 |

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use mysterybox_reveal::RevealConfig;
use mysterybox_session::SessionConfig;

use crate::MysteryBoxError;
use crate::server::{DEFAULT_BIND_ADDR, DEFAULT_IDLE_TIMEOUT, MysteryBoxServerBuilder};

pub const ENV_BIND: &str = "MYSTERYBOX_BIND";
pub const ENV_PORT: &str = "PORT";
pub const ENV_STORE: &str = "MYSTERYBOX_STORE";
pub const ENV_MAX_ATTEMPTS: &str = "MYSTERYBOX_MAX_ATTEMPTS";
pub const ENV_TOTAL_BOXES: &str = "MYSTERYBOX_TOTAL_BOXES";
pub const ENV_WIN_PROBABILITY: &str = "MYSTERYBOX_WIN_PROBABILITY";
pub const ENV_IDLE_TIMEOUT_SECS: &str = "MYSTERYBOX_IDLE_TIMEOUT_SECS";

/// Everything the binary needs to start a server.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind_addr: String,
    /// `None` keeps sessions in memory only.
    pub store_path: Option<PathBuf>,
    pub session: SessionConfig,
    pub reveal: RevealConfig,
    pub idle_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            store_path: None,
            session: SessionConfig::default(),
            reveal: RevealConfig::default(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl AppConfig {
    /// Reads the process environment.
    pub fn from_env() -> Result<Self, MysteryBoxError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key → value lookup. Unset or empty
    /// variables keep their defaults; set-but-invalid ones are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, MysteryBoxError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(addr) = get(ENV_BIND) {
            config.bind_addr = addr.trim().to_string();
        } else if let Some(port) = parse::<u16>(ENV_PORT, get(ENV_PORT))? {
            config.bind_addr = format!("0.0.0.0:{port}");
        }

        config.store_path = get(ENV_STORE).map(|p| PathBuf::from(p.trim()));

        if let Some(max_attempts) = parse(ENV_MAX_ATTEMPTS, get(ENV_MAX_ATTEMPTS))? {
            config.session.max_attempts = max_attempts;
        }
        if let Some(total_boxes) = parse(ENV_TOTAL_BOXES, get(ENV_TOTAL_BOXES))? {
            config.reveal.total_boxes = total_boxes;
        }
        if let Some(p) = parse(ENV_WIN_PROBABILITY, get(ENV_WIN_PROBABILITY))? {
            config.reveal.win_probability = p;
        }
        if let Some(secs) = parse(ENV_IDLE_TIMEOUT_SECS, get(ENV_IDLE_TIMEOUT_SECS))? {
            config.idle_timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejects configs the server can't run with.
    pub fn validate(&self) -> Result<(), MysteryBoxError> {
        if self.session.max_attempts == 0 {
            return Err(MysteryBoxError::Config(format!(
                "{ENV_MAX_ATTEMPTS} must be at least 1"
            )));
        }
        if self.idle_timeout.is_zero() {
            return Err(MysteryBoxError::Config(format!(
                "{ENV_IDLE_TIMEOUT_SECS} must be at least 1"
            )));
        }
        self.reveal
            .validate()
            .map_err(|e| MysteryBoxError::Config(e.to_string()))
    }

    /// A server builder carrying this config.
    pub fn builder(&self) -> MysteryBoxServerBuilder {
        MysteryBoxServerBuilder::new()
            .bind(&self.bind_addr)
            .session_config(self.session.clone())
            .reveal_config(self.reveal.clone())
            .idle_timeout(self.idle_timeout)
    }
}

fn parse<T>(key: &str, raw: Option<String>) -> Result<Option<T>, MysteryBoxError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.map(|value| {
        value
            .trim()
            .parse()
            .map_err(|e| MysteryBoxError::Config(format!("{key}={value:?}: {e}")))
    })
    .transpose()
}
