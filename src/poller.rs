// src/poller.rs
use std::time::Duration;

use crate::core::{
    Clock, ComponentLogger, LoadSample, LogContext, RetryPolicy, WatchError, WatchResult,
    delay_until_window,
};
use crate::io::{LoadSource, Mailer, Notifier};

/// Timing of the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    /// Upstream publication cadence.
    pub window: Duration,
    /// How far ahead of a window boundary the first steady poll starts.
    pub lead: Duration,
    /// Pause after a new timestamp was seen.
    pub settle: Duration,
    /// Pause while the timestamp has not moved.
    pub recheck: Duration,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(300),
            lead: Duration::from_secs(10),
            settle: Duration::from_secs(250),
            recheck: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Init,
    AlignToWindow,
    SteadyPoll,
}

/// Result of one `Poller::step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub notified: bool,
    pub sleep: Duration,
}

impl Tick {
    fn quiet(sleep: Duration) -> Self {
        Self {
            notified: false,
            sleep,
        }
    }
}

pub struct Poller<S: LoadSource, M: Mailer, C: Clock> {
    source: S,
    notifier: Notifier<M>,
    clock: C,
    schedule: Schedule,
    retry: RetryPolicy,
    state: PollState,
    last_seen: Option<LoadSample>,
    ctx: LogContext,
}

impl<S: LoadSource, M: Mailer, C: Clock> Poller<S, M, C> {
    pub fn new(
        source: S,
        notifier: Notifier<M>,
        clock: C,
        schedule: Schedule,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            source,
            notifier,
            clock,
            schedule,
            retry,
            state: PollState::Init,
            last_seen: None,
            ctx: LogContext::new("poller", "main"),
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn last_seen(&self) -> Option<&LoadSample> {
        self.last_seen.as_ref()
    }

    pub fn notifier(&self) -> &Notifier<M> {
        &self.notifier
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Polls until interrupted. Returns an error only when a fetch or send
    /// failed for good.
    pub fn run(&mut self) -> WatchResult<()> {
        loop {
            let tick = match self.step() {
                Ok(tick) => tick,
                Err(e) if e.is_interrupt() => break,
                Err(e) => {
                    self.error(&format!("stopping: {}", e));
                    return Err(e);
                }
            };

            if !tick.sleep.is_zero() {
                self.debug(&format!("sleeping {:?}", tick.sleep));
            }
            if !self.clock.sleep(tick.sleep) {
                break;
            }
        }

        self.info(&format!(
            "interrupted after {} notification(s)",
            self.notifier.sent()
        ));
        Ok(())
    }

    /// Advances the state machine by one transition.
    pub fn step(&mut self) -> WatchResult<Tick> {
        match self.state {
            PollState::Init => self.step_init(),
            PollState::AlignToWindow => Ok(self.step_align()),
            PollState::SteadyPoll => self.step_poll(),
        }
    }

    fn step_init(&mut self) -> WatchResult<Tick> {
        // a malformed first response is fatal straight away
        let sample = self.fetch(|e| matches!(e, WatchError::NetworkFailure { .. }))?;
        self.info(&format!("initial sample {}", sample));

        self.notifier.notify(&sample, &self.clock)?;
        self.last_seen = Some(sample);
        self.state = PollState::AlignToWindow;
        Ok(Tick {
            notified: true,
            sleep: Duration::ZERO,
        })
    }

    fn step_align(&mut self) -> Tick {
        let now = self.clock.now().time();
        let delay = delay_until_window(now, self.schedule.window, self.schedule.lead);
        self.info(&format!(
            "aligning to publication window, first poll in {}s",
            delay.as_secs()
        ));
        self.state = PollState::SteadyPoll;
        Tick::quiet(delay)
    }

    fn step_poll(&mut self) -> WatchResult<Tick> {
        let sample = self.fetch(WatchError::is_transient)?;

        if let Some(last) = self.last_seen.as_ref() {
            if sample.timestamp == last.timestamp {
                self.debug(&format!("no new sample since {}", last.timestamp));
                return Ok(Tick::quiet(self.schedule.recheck));
            }
        }

        let load_changed = self
            .last_seen
            .as_ref()
            .is_none_or(|last| last.load != sample.load);
        let notified = if load_changed {
            self.notifier.notify(&sample, &self.clock)?;
            true
        } else {
            self.info(&format!(
                "new timestamp {} with unchanged load {}",
                sample.timestamp, sample.load_text
            ));
            false
        };

        self.last_seen = Some(sample);
        Ok(Tick {
            notified,
            sleep: self.schedule.settle,
        })
    }

    fn fetch<P>(&mut self, retryable: P) -> WatchResult<LoadSample>
    where
        P: Fn(&WatchError) -> bool,
    {
        let source = &mut self.source;
        self.retry
            .run("fetch", &self.clock, retryable, || source.fetch_latest())
    }
}

impl<S: LoadSource, M: Mailer, C: Clock> ComponentLogger for Poller<S, M, C> {
    fn log_context(&self) -> &LogContext {
        &self.ctx
    }
}
