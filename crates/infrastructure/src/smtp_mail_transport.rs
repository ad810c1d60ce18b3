//! SMTP mail transport using the `lettre` crate.

use async_trait::async_trait;
use elevia_application::MailTransport;
use elevia_core::{AppError, AppResult};
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// SMTP transport configuration.
#[derive(Clone)]
pub struct SmtpMailConfig {
    /// SMTP server hostname.
    pub host: String,
    /// SMTP server port.
    pub port: u16,
    /// SMTP username.
    pub username: String,
    /// SMTP password.
    pub password: String,
    /// Sender email address.
    pub from_address: String,
}

/// Production mail transport over SMTP.
#[derive(Clone)]
pub struct SmtpMailTransport {
    from_address: Mailbox,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailTransport {
    /// Creates a new SMTP mail transport.
    pub fn new(config: SmtpMailConfig) -> AppResult<Self> {
        let from_address = config.from_address.parse().map_err(|error| {
            AppError::InvalidArgument(format!("invalid SMTP from address: {error}"))
        })?;

        let credentials = Credentials::new(config.username, config.password);

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|error| {
                AppError::InvalidArgument(format!("failed to create SMTP transport: {error}"))
            })?
            .port(config.port)
            .credentials(credentials)
            .timeout(Some(std::time::Duration::from_secs(10)))
            .build();

        Ok(Self {
            from_address,
            mailer,
        })
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn send_mail(
        &self,
        to: &[String],
        cc: &[String],
        subject: &str,
        html_body: &str,
        reply: bool,
    ) -> AppResult<()> {
        if subject.contains('\r') || subject.contains('\n') {
            return Err(AppError::InvalidArgument(
                "email subject must not contain newline characters".to_owned(),
            ));
        }
        if to.is_empty() {
            return Err(AppError::InvalidArgument(
                "at least one recipient is required".to_owned(),
            ));
        }

        let subject = if reply {
            format!("Re: {subject}")
        } else {
            subject.to_owned()
        };

        let mut message_builder = Message::builder()
            .from(self.from_address.clone())
            .subject(subject);

        for recipient in to {
            let mailbox: Mailbox = recipient.parse().map_err(|error| {
                AppError::InvalidArgument(format!("invalid recipient address: {error}"))
            })?;
            message_builder = message_builder.to(mailbox);
        }
        for recipient in cc {
            let mailbox: Mailbox = recipient.parse().map_err(|error| {
                AppError::InvalidArgument(format!("invalid cc address: {error}"))
            })?;
            message_builder = message_builder.cc(mailbox);
        }

        let message = message_builder
            .singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_HTML)
                    .body(html_body.to_owned()),
            )
            .map_err(|error| AppError::Internal(format!("failed to build email: {error}")))?;

        self.mailer
            .send(message)
            .await
            .map_err(|error| AppError::Transient(format!("failed to send email: {error}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{SmtpMailConfig, SmtpMailTransport};

    #[test]
    fn invalid_from_address_is_rejected() {
        let result = SmtpMailTransport::new(SmtpMailConfig {
            host: "smtp.example.com".to_owned(),
            port: 587,
            username: "mailer".to_owned(),
            password: "secret".to_owned(),
            from_address: "not an address".to_owned(),
        });
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn valid_config_builds_a_transport() {
        let result = SmtpMailTransport::new(SmtpMailConfig {
            host: "smtp.example.com".to_owned(),
            port: 587,
            username: "mailer".to_owned(),
            password: "secret".to_owned(),
            from_address: "Elevia <no-reply@example.com>".to_owned(),
        });
        assert!(result.is_ok());
    }
}
