// src/core/logging.rs
use std::io::Write;

use log::LevelFilter;

/// Last line printed on a clean shutdown.
pub const FAREWELL: &str = "Quitting...";

#[derive(Debug, Clone)]
pub struct LogContext {
    pub component: String,
    pub instance_id: String,
}

impl LogContext {
    pub fn new(component: &str, instance_id: &str) -> Self {
        Self {
            component: component.to_string(),
            instance_id: instance_id.to_string(),
        }
    }

    pub fn format(&self, message: &str) -> String {
        format!("[{}:{}] {}", self.component, self.instance_id, message)
    }
}

/// Prefixes every line with the component that emitted it.
pub trait ComponentLogger {
    fn log_context(&self) -> &LogContext;

    fn debug(&self, message: &str) {
        log::debug!("{}", self.log_context().format(message));
    }

    fn info(&self, message: &str) {
        log::info!("{}", self.log_context().format(message));
    }

    fn warn(&self, message: &str) {
        log::warn!("{}", self.log_context().format(message));
    }

    fn error(&self, message: &str) {
        log::error!("{}", self.log_context().format(message));
    }
}

/// Installs the global logger. `RUST_LOG` still wins over `level`.
pub fn init(level: LevelFilter) {
    let default = level.as_str().to_ascii_lowercase();
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp_millis()
        .try_init();
}

/// Writes the shutdown line directly, so it shows at every verbosity,
/// including `error`.
pub fn farewell<W: Write>(out: &mut W) -> std::io::Result<()> {
    writeln!(out, "{}", FAREWELL)?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_context_format() {
        let ctx = LogContext::new("fetcher", "miso");
        let formatted = ctx.format("GET ok");

        assert_eq!(formatted, "[fetcher:miso] GET ok");
    }

    #[test]
    fn test_component_logger_trait() {
        struct MockComponent {
            ctx: LogContext,
        }

        impl ComponentLogger for MockComponent {
            fn log_context(&self) -> &LogContext {
                &self.ctx
            }
        }

        let component = MockComponent {
            ctx: LogContext::new("Mock", "test-123"),
        };

        // must not panic without a logger installed
        component.debug("debug");
        component.info("info");
        component.warn("warn");
        component.error("error");
        assert_eq!(component.log_context().instance_id, "test-123");
    }

    #[test]
    fn test_farewell_ignores_log_level() {
        log::set_max_level(LevelFilter::Error);
        let mut out = Vec::new();

        farewell(&mut out).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "Quitting...\n");
    }
}
