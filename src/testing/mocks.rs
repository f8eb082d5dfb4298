use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};

use crate::core::{Clock, LoadSample, WatchError, WatchResult};
use crate::io::load_in::LoadSource;
use crate::io::mail_out::{Email, Mailer};

/// Replays queued fetch results; fails with `DataUnavailable` once empty.
#[derive(Default)]
pub struct ScriptedSource {
    responses: VecDeque<WatchResult<LoadSample>>,
    calls: usize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_samples(samples: &[(&str, f64)]) -> Self {
        let mut source = Self::new();
        for (timestamp, load) in samples {
            source = source.then_sample(timestamp, *load);
        }
        source
    }

    pub fn then_sample(mut self, timestamp: &str, load: f64) -> Self {
        self.responses
            .push_back(Ok(LoadSample::new(timestamp, load)));
        self
    }

    pub fn then_error(mut self, err: WatchError) -> Self {
        self.responses.push_back(Err(err));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl LoadSource for ScriptedSource {
    fn fetch_latest(&mut self) -> WatchResult<LoadSample> {
        self.calls += 1;
        self.responses
            .pop_front()
            .unwrap_or_else(|| Err(WatchError::data("script exhausted")))
    }
}

/// Records every email it is asked to send.
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<Email>>>,
    failures_left: u32,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::new_with_shared().0
    }

    pub fn new_with_shared() -> (Self, Arc<Mutex<Vec<Email>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                sent: sent.clone(),
                failures_left: 0,
            },
            sent,
        )
    }

    /// The next `count` sends fail with a network error.
    pub fn fail_next(mut self, count: u32) -> Self {
        self.failures_left = count;
        self
    }
}

impl Default for RecordingMailer {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailer for RecordingMailer {
    fn send(&mut self, email: &Email) -> WatchResult<()> {
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(WatchError::network("send", "mock transport down"));
        }
        self.sent
            .lock()
            .expect("lock sent emails")
            .push(email.clone());
        Ok(())
    }
}

/// Fixed wall clock that records sleeps instead of blocking.
pub struct ManualClock {
    now: DateTime<Local>,
    sleeps: Arc<Mutex<Vec<Duration>>>,
    interrupt_after: Option<usize>,
    slept: Cell<usize>,
}

impl ManualClock {
    pub fn at(now: DateTime<Local>) -> Self {
        Self {
            now,
            sleeps: Arc::new(Mutex::new(Vec::new())),
            interrupt_after: None,
            slept: Cell::new(0),
        }
    }

    pub fn at_hms(hour: u32, minute: u32, second: u32) -> Self {
        let now = Local
            .with_ymd_and_hms(2024, 1, 1, hour, minute, second)
            .earliest()
            .expect("valid local time");
        Self::at(now)
    }

    /// Sleeps after the first `count` report an interrupt.
    pub fn interrupt_after(mut self, count: usize) -> Self {
        self.interrupt_after = Some(count);
        self
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().expect("lock sleeps").clone()
    }

    pub fn shared_sleeps(&self) -> Arc<Mutex<Vec<Duration>>> {
        self.sleeps.clone()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at_hms(12, 0, 0)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        self.now
    }

    fn sleep(&self, duration: Duration) -> bool {
        self.sleeps.lock().expect("lock sleeps").push(duration);
        let slept = self.slept.get();
        self.slept.set(slept + 1);
        match self.interrupt_after {
            Some(limit) => slept < limit,
            None => true,
        }
    }
}
