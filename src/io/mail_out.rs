use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::core::{
    Clock, ComponentLogger, LoadSample, LogContext, RetryPolicy, WatchError, WatchResult,
};

pub const DEFAULT_SMTP_HOST: &str = "smtp.office365.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// A composed plain-text notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Email {
    pub from: Mailbox,
    pub to: Mailbox,
    pub subject: String,
    pub body: String,
}

impl Email {
    pub fn for_sample(from: Mailbox, to: Mailbox, sample: &LoadSample) -> Self {
        Self {
            from,
            to,
            subject: format!("Load Notification for recent_time {}", sample.timestamp),
            body: format!(
                "The most recent load is {} MW at time {} EST",
                sample.load_text, sample.timestamp
            ),
        }
    }
}

/// Delivers one email per call.
pub trait Mailer {
    fn send(&mut self, email: &Email) -> WatchResult<()>;
}

/// Authenticated STARTTLS submission. A fresh session is opened per send.
pub struct SmtpMailer {
    transport: SmtpTransport,
}

impl SmtpMailer {
    pub fn new(host: &str, port: u16, username: &str, password: &str) -> WatchResult<Self> {
        let credentials = Credentials::new(username.to_string(), password.to_string());
        let transport = SmtpTransport::starttls_relay(host)
            .map_err(|e| WatchError::network("smtp setup", e))?
            .port(port)
            .credentials(credentials)
            .build();

        Ok(Self { transport })
    }
}

impl Mailer for SmtpMailer {
    fn send(&mut self, email: &Email) -> WatchResult<()> {
        let message = Message::builder()
            .from(email.from.clone())
            .to(email.to.clone())
            .subject(email.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())
            .map_err(|e| WatchError::InvalidMessage {
                message: e.to_string(),
            })?;

        self.transport
            .send(&message)
            .map_err(|e| WatchError::network("send", e))?;
        Ok(())
    }
}

/// Formats load samples into emails and sends them with retry.
pub struct Notifier<M: Mailer> {
    mailer: M,
    from: Mailbox,
    to: Mailbox,
    retry: RetryPolicy,
    sent: u64,
    ctx: LogContext,
}

impl<M: Mailer> Notifier<M> {
    pub fn new(mailer: M, from: Mailbox, to: Mailbox, retry: RetryPolicy) -> Self {
        let ctx = LogContext::new("mail_out", &to.email.to_string());
        Self {
            mailer,
            from,
            to,
            retry,
            sent: 0,
            ctx,
        }
    }

    /// Emails sent successfully since this notifier was created.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn notify(&mut self, sample: &LoadSample, clock: &dyn Clock) -> WatchResult<()> {
        let email = Email::for_sample(self.from.clone(), self.to.clone(), sample);
        let mailer = &mut self.mailer;

        let result = self.retry.run(
            "send",
            clock,
            |e| matches!(e, WatchError::NetworkFailure { .. }),
            || mailer.send(&email),
        );
        match &result {
            Err(e) if !e.is_interrupt() => self.error(&format!("sending failed: {}", e)),
            _ => {}
        }
        result?;

        self.sent += 1;
        self.info(&format!("sent notification #{} ({})", self.sent, sample));
        Ok(())
    }
}

impl<M: Mailer> ComponentLogger for Notifier<M> {
    fn log_context(&self) -> &LogContext {
        &self.ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::{ManualClock, RecordingMailer};
    use std::time::Duration;

    fn mailbox(addr: &str) -> Mailbox {
        addr.parse().unwrap()
    }

    fn quick_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(4),
        }
    }

    #[test]
    fn email_interpolates_sample_verbatim() {
        let email = Email::for_sample(
            mailbox("sender@example.com"),
            mailbox("ops@example.com"),
            &LoadSample::new("2024-01-01T00:10", 52000.0),
        );

        assert_eq!(
            email.subject,
            "Load Notification for recent_time 2024-01-01T00:10"
        );
        assert_eq!(
            email.body,
            "The most recent load is 52000 MW at time 2024-01-01T00:10 EST"
        );
    }

    #[test]
    fn counts_successful_sends() {
        let (mailer, sent) = RecordingMailer::new_with_shared();
        let clock = ManualClock::default();
        let mut notifier = Notifier::new(
            mailer,
            mailbox("sender@example.com"),
            mailbox("ops@example.com"),
            quick_retry(3),
        );

        notifier
            .notify(&LoadSample::new("12:00", 1.0), &clock)
            .unwrap();
        notifier
            .notify(&LoadSample::new("12:05", 2.0), &clock)
            .unwrap();

        assert_eq!(notifier.sent(), 2);
        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].to, mailbox("ops@example.com"));
    }

    #[test]
    fn retries_transport_failures() {
        let (mailer, sent) = RecordingMailer::new_with_shared();
        let mailer = mailer.fail_next(2);
        let clock = ManualClock::default();
        let mut notifier = Notifier::new(
            mailer,
            mailbox("sender@example.com"),
            mailbox("ops@example.com"),
            quick_retry(3),
        );

        notifier
            .notify(&LoadSample::new("12:00", 1.0), &clock)
            .unwrap();

        assert_eq!(sent.lock().unwrap().len(), 1);
        assert_eq!(notifier.sent(), 1);
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[test]
    fn exhausted_send_does_not_count() {
        let (mailer, sent) = RecordingMailer::new_with_shared();
        let mailer = mailer.fail_next(5);
        let clock = ManualClock::default();
        let mut notifier = Notifier::new(
            mailer,
            mailbox("sender@example.com"),
            mailbox("ops@example.com"),
            quick_retry(2),
        );

        let err = notifier
            .notify(&LoadSample::new("12:00", 1.0), &clock)
            .unwrap_err();

        assert!(matches!(err, WatchError::RetriesExhausted { attempts: 2, .. }));
        assert_eq!(notifier.sent(), 0);
        assert!(sent.lock().unwrap().is_empty());
    }

    #[test]
    fn interrupted_send_is_not_a_failure() {
        let (mailer, sent) = RecordingMailer::new_with_shared();
        let mailer = mailer.fail_next(5);
        let clock = ManualClock::default().interrupt_after(0);
        let mut notifier = Notifier::new(
            mailer,
            mailbox("sender@example.com"),
            mailbox("ops@example.com"),
            quick_retry(3),
        );

        let err = notifier
            .notify(&LoadSample::new("12:00", 1.0), &clock)
            .unwrap_err();

        assert!(err.is_interrupt());
        assert!(!matches!(err, WatchError::RetriesExhausted { .. }));
        assert_eq!(clock.sleeps().len(), 1);
        assert_eq!(notifier.sent(), 0);
        assert!(sent.lock().unwrap().is_empty());
    }
}
