//! Console mail transport for development. Logs messages to tracing
//! output instead of delivering them.

use async_trait::async_trait;
use elevia_application::MailTransport;
use elevia_core::AppResult;
use tracing::info;

/// Development mail transport that logs messages to the console.
#[derive(Clone, Default)]
pub struct ConsoleMailTransport;

impl ConsoleMailTransport {
    /// Creates a new console mail transport.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MailTransport for ConsoleMailTransport {
    async fn send_mail(
        &self,
        to: &[String],
        cc: &[String],
        subject: &str,
        html_body: &str,
        reply: bool,
    ) -> AppResult<()> {
        info!(
            to = %to.join(", "),
            cc = %cc.join(", "),
            reply = reply,
            "--- EMAIL (console) ---\nSubject: {}\n\n{}\n--- END EMAIL ---",
            subject,
            html_body
        );

        Ok(())
    }
}
