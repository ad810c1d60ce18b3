use async_trait::async_trait;
use elevia_core::AppResult;

/// Outbound mail delivery.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Returns whether the transport is currently able to deliver.
    fn can_send(&self) -> bool {
        true
    }

    /// Delivers one HTML message.
    ///
    /// `reply` marks the message as a follow-up in an existing exchange
    /// rather than a fresh request for action.
    async fn send_mail(
        &self,
        to: &[String],
        cc: &[String],
        subject: &str,
        html_body: &str,
        reply: bool,
    ) -> AppResult<()>;
}
