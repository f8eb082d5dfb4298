pub mod load_in;
pub mod mail_out;

pub use load_in::{HttpLoadSource, LoadSource, parse_latest};
pub use mail_out::{Email, Mailer, Notifier, SmtpMailer};
