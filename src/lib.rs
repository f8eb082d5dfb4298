// src/lib.rs
pub mod config;
pub mod core;
pub mod io;
pub mod poller;
pub mod testing;

pub use crate::config::{NotificationConfig, Settings, Verbosity};
pub use crate::core::{LoadSample, RetryPolicy, WatchError, WatchResult};
pub use crate::poller::{PollState, Poller, Schedule, Tick};
