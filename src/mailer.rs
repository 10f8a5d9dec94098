/// Outbound mail for account verification. Sending is fire-and-forget: nothing
/// about delivery flows back to the caller.
pub trait Mailer: Send + Sync {
    fn send_email_confirm(&self, to_email: &str, token: &str);

    fn send_password_reset_confirm(&self, to_email: &str, token: &str);
}

/// Tokens in mail are live credentials; keep them out of default log output.
const MAIL_LOG_LEVEL: log::Level = log::Level::Debug;

/// Mailer that only records what would have been sent.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send_email_confirm(&self, to_email: &str, token: &str) {
        log::log!(MAIL_LOG_LEVEL, "Email confirmation for {}: token {}", to_email, token);
    }

    fn send_password_reset_confirm(&self, to_email: &str, token: &str) {
        log::log!(MAIL_LOG_LEVEL, "Password reset for {}: token {}", to_email, token);
    }
}
