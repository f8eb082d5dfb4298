use std::error::Error as StdError;
use thiserror::Error;

pub type WatchResult<T> = Result<T, WatchError>;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("network failure during {operation}: {message}")]
    NetworkFailure {
        operation: &'static str,
        message: String,
    },
    #[error("load data unavailable: {reason}")]
    DataUnavailable { reason: String },
    #[error("could not build notification: {message}")]
    InvalidMessage { message: String },
    #[error("{operation} gave up after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        operation: &'static str,
        attempts: u32,
        #[source]
        last: Box<WatchError>,
    },
    #[error("interrupted")]
    Interrupted,
}

impl WatchError {
    pub fn network(operation: &'static str, message: impl ToString) -> Self {
        Self::NetworkFailure {
            operation,
            message: message.to_string(),
        }
    }

    pub fn data(reason: impl Into<String>) -> Self {
        Self::DataUnavailable {
            reason: reason.into(),
        }
    }

    /// Whether another attempt of the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NetworkFailure { .. } | Self::DataUnavailable { .. }
        )
    }

    pub fn is_interrupt(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{message}")]
    Message { message: String },
    #[error("usage: gridwatch <destination_address> <verbosity_level> (got {got} argument(s))")]
    Usage { got: usize },
    #[error("invalid verbosity level '{value}' (expected 0|error, 1|info or 2|debug)")]
    Verbosity { value: String },
    #[error("missing environment variable {name}")]
    MissingEnv { name: &'static str },
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl ConfigError {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Context {
            context: context.into(),
            source: Box::new(source),
        }
    }
}
