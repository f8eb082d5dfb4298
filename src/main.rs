// src/main.rs
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use log::{LevelFilter, error, info};

use gridwatch::config::{NotificationConfig, Verbosity};
use gridwatch::core::{SystemClock, logging};
use gridwatch::io::{HttpLoadSource, Notifier, SmtpMailer};
use gridwatch::poller::Poller;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // logger first, so configuration errors are reported through it
    let level = args
        .get(1)
        .and_then(|v| v.parse::<Verbosity>().ok())
        .map(Verbosity::level_filter)
        .unwrap_or(LevelFilter::Info);
    logging::init(level);

    // ------------------------------------------------------------
    // Config
    // ------------------------------------------------------------
    let cfg = match NotificationConfig::from_env(&args) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("[gridwatch] {}", e);
            return Err(e).context("invalid configuration");
        }
    };
    info!(
        "[gridwatch] notifying {} from {}",
        cfg.recipient, cfg.sender
    );

    // ------------------------------------------------------------
    // Graceful shutdown
    // ------------------------------------------------------------
    let running = Arc::new(AtomicBool::new(true));
    {
        let r = running.clone();
        ctrlc::set_handler(move || {
            info!("[gridwatch] shutdown requested");
            r.store(false, Ordering::SeqCst);
        })?;
    }

    // ------------------------------------------------------------
    // Fetcher / Notifier / Poll loop
    // ------------------------------------------------------------
    let settings = &cfg.settings;
    let retry = settings.retry.policy();

    let source = HttpLoadSource::new(
        settings.feed.url.clone(),
        settings.feed.connect_timeout(),
        settings.feed.read_timeout(),
    );
    info!("[gridwatch] polling {}", source.url());
    let mailer = SmtpMailer::new(
        &settings.smtp.host,
        settings.smtp.port,
        &cfg.credentials.username,
        &cfg.credentials.password,
    )?;
    let notifier = Notifier::new(mailer, cfg.sender.clone(), cfg.recipient.clone(), retry);

    let mut poller = Poller::new(
        source,
        notifier,
        SystemClock::new(running.clone()),
        settings.schedule.schedule(),
        retry,
    );

    info!("[gridwatch] running – Ctrl+C to stop");
    if let Err(e) = poller.run() {
        error!("[gridwatch] fatal: {}", e);
        return Err(e).context("polling stopped");
    }

    logging::farewell(&mut std::io::stderr())?;
    Ok(())
}
