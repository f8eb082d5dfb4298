pub mod clock;
pub mod error;
pub mod logging;
pub mod retry;

use std::fmt;

pub use clock::{Clock, SystemClock, delay_until_window};
pub use error::{ConfigError, WatchError, WatchResult};
pub use logging::{ComponentLogger, LogContext};
pub use retry::RetryPolicy;

/// One (timestamp, load) observation from the upstream feed. Load is in MW.
///
/// `load_text` is the feed's value exactly as published; `load` is its
/// numeric reading, used only to detect changes.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadSample {
    pub timestamp: String,
    pub load: f64,
    pub load_text: String,
}

impl LoadSample {
    pub fn new(timestamp: impl Into<String>, load: f64) -> Self {
        Self::with_text(timestamp, load, load.to_string())
    }

    pub fn with_text(timestamp: impl Into<String>, load: f64, load_text: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            load,
            load_text: load_text.into(),
        }
    }
}

impl fmt::Display for LoadSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} MW at {}", self.load_text, self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_display_is_verbatim() {
        let sample = LoadSample::new("2024-01-01T00:10", 52000.0);
        assert_eq!(sample.to_string(), "52000 MW at 2024-01-01T00:10");

        let grouped = LoadSample::with_text("12:05", 71234.5, "71,234.50");
        assert_eq!(grouped.to_string(), "71,234.50 MW at 12:05");
    }
}
