//! Infrastructure adapters for the engine's ports.

#![forbid(unsafe_code)]

mod console_mail_transport;
mod http_jwks_client;
mod in_memory_iam_policy_store;
mod smtp_mail_transport;
mod system_clock;

pub use console_mail_transport::ConsoleMailTransport;
pub use http_jwks_client::HttpJwksClient;
pub use in_memory_iam_policy_store::InMemoryIamPolicyStore;
pub use smtp_mail_transport::{SmtpMailConfig, SmtpMailTransport};
pub use system_clock::SystemClock;
