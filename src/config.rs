use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use lettre::message::Mailbox;
use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::core::{ConfigError, RetryPolicy};
use crate::io::load_in::DEFAULT_FEED_URL;
use crate::io::mail_out::{DEFAULT_SMTP_HOST, DEFAULT_SMTP_PORT};
use crate::poller::Schedule;

pub const ENV_SMTP_USER: &str = "GRIDWATCH_SMTP_USER";
pub const ENV_SMTP_PASSWORD: &str = "GRIDWATCH_SMTP_PASSWORD";
pub const ENV_CONFIG_PATH: &str = "GRIDWATCH_CONFIG";

// ---------- Feed ----------
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct FeedConfig {
    pub url: String,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            connect_timeout_secs: 10,
            read_timeout_secs: 30,
        }
    }
}

impl FeedConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

// ---------- SMTP ----------
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SMTP_HOST.to_string(),
            port: DEFAULT_SMTP_PORT,
            username: None,
        }
    }
}

// ---------- Schedule ----------
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ScheduleConfig {
    pub window_secs: u64,
    pub lead_secs: u64,
    pub settle_secs: u64,
    pub recheck_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        let schedule = Schedule::default();
        Self {
            window_secs: schedule.window.as_secs(),
            lead_secs: schedule.lead.as_secs(),
            settle_secs: schedule.settle.as_secs(),
            recheck_secs: schedule.recheck.as_secs(),
        }
    }
}

impl ScheduleConfig {
    pub fn schedule(&self) -> Schedule {
        Schedule {
            window: Duration::from_secs(self.window_secs),
            lead: Duration::from_secs(self.lead_secs),
            settle: Duration::from_secs(self.settle_secs),
            recheck: Duration::from_secs(self.recheck_secs),
        }
    }
}

// ---------- Retry ----------
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_secs: u64,
    pub max_backoff_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_backoff_secs: policy.initial_backoff.as_secs(),
            max_backoff_secs: policy.max_backoff.as_secs(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_secs(self.initial_backoff_secs),
            max_backoff: Duration::from_secs(self.max_backoff_secs),
        }
    }
}

// ---------- Root ----------
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Settings {
    pub feed: FeedConfig,
    pub smtp: SmtpConfig,
    pub schedule: ScheduleConfig,
    pub retry: RetryConfig,
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let txt = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::with_context(format!("reading {}", path.display()), e))?;
        let settings: Self = toml::from_str(&txt)
            .map_err(|e| ConfigError::with_context(format!("parsing {}", path.display()), e))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feed.url.trim().is_empty() {
            return Err(ConfigError::message("feed.url must not be empty"));
        }
        if self.smtp.host.trim().is_empty() {
            return Err(ConfigError::message("smtp.host must not be empty"));
        }
        if self.smtp.port == 0 {
            return Err(ConfigError::message("smtp.port must not be 0"));
        }

        let s = &self.schedule;
        if s.window_secs == 0 {
            return Err(ConfigError::message("schedule.window_secs must be > 0"));
        }
        if s.lead_secs >= s.window_secs {
            return Err(ConfigError::message(
                "schedule.lead_secs must be shorter than schedule.window_secs",
            ));
        }
        if s.settle_secs == 0 || s.recheck_secs == 0 {
            return Err(ConfigError::message(
                "schedule.settle_secs and schedule.recheck_secs must be > 0",
            ));
        }

        let r = &self.retry;
        if r.max_attempts == 0 {
            return Err(ConfigError::message("retry.max_attempts must be >= 1"));
        }
        if r.initial_backoff_secs > r.max_backoff_secs {
            return Err(ConfigError::message(
                "retry.initial_backoff_secs must not exceed retry.max_backoff_secs",
            ));
        }
        Ok(())
    }
}

// ---------- Verbosity ----------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Error,
    Info,
    Debug,
}

impl Verbosity {
    pub fn level_filter(self) -> LevelFilter {
        match self {
            Verbosity::Error => LevelFilter::Error,
            Verbosity::Info => LevelFilter::Info,
            Verbosity::Debug => LevelFilter::Debug,
        }
    }
}

impl FromStr for Verbosity {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "0" | "error" => Ok(Verbosity::Error),
            "1" | "info" => Ok(Verbosity::Info),
            "2" | "debug" => Ok(Verbosity::Debug),
            _ => Err(ConfigError::Verbosity {
                value: value.to_string(),
            }),
        }
    }
}

// ---------- Runtime ----------
#[derive(Clone)]
pub struct SmtpCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for SmtpCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything the process needs, fixed at startup.
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub recipient: Mailbox,
    pub sender: Mailbox,
    pub credentials: SmtpCredentials,
    pub verbosity: Verbosity,
    pub settings: Settings,
}

impl NotificationConfig {
    /// `args` excludes the program name; `env` looks up environment
    /// variables.
    pub fn from_sources<F>(args: &[String], env: F, settings: Settings) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let [recipient, verbosity] = args else {
            return Err(ConfigError::Usage { got: args.len() });
        };

        let verbosity: Verbosity = verbosity.parse()?;
        let recipient: Mailbox = recipient.trim().parse().map_err(|e| {
            ConfigError::with_context(format!("invalid destination address '{}'", recipient), e)
        })?;

        let username = env(ENV_SMTP_USER)
            .filter(|v| !v.trim().is_empty())
            .or_else(|| settings.smtp.username.clone())
            .ok_or(ConfigError::MissingEnv {
                name: ENV_SMTP_USER,
            })?;
        let password = env(ENV_SMTP_PASSWORD)
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingEnv {
                name: ENV_SMTP_PASSWORD,
            })?;

        let sender: Mailbox = username.trim().parse().map_err(|e| {
            ConfigError::with_context(format!("invalid sender address '{}'", username), e)
        })?;

        settings.validate()?;

        Ok(Self {
            recipient,
            sender,
            credentials: SmtpCredentials { username, password },
            verbosity,
            settings,
        })
    }

    /// Reads settings from `$GRIDWATCH_CONFIG` when set, defaults otherwise.
    pub fn from_env(args: &[String]) -> Result<Self, ConfigError> {
        let settings = match std::env::var(ENV_CONFIG_PATH) {
            Ok(path) if !path.trim().is_empty() => Settings::load(path)?,
            _ => Settings::default(),
        };
        Self::from_sources(args, |name| std::env::var(name).ok(), settings)
    }
}
