//! Outbound interfaces the engine consumes.
//!
//! External collaborators (the policy analyzer, the resource manager,
//! the credentials service, mail delivery, and the wall clock) are
//! reached exclusively through these traits; implementations live in the
//! infrastructure crate or in the embedding process.

mod analysis;
mod clock;
mod credentials;
mod iam;
mod mail;

pub use analysis::{
    AccessControlList, AnalysisResult, ConditionEvaluation, PolicyAnalysis, PolicyAnalysisClient,
};
pub use clock::Clock;
pub use credentials::{service_account_jwks_url, CredentialsClient, JwksClient};
pub use iam::{IamPolicyStore, ProjectSearchClient};
pub use mail::MailTransport;
