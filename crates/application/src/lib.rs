//! Application services and ports of the Elevia engine.

#![forbid(unsafe_code)]

mod activation_service;
mod catalog_service;
mod config;
mod eligibility_service;
mod engine;
mod notification_service;
mod ports;
mod provisioner_service;
mod token_service;

pub use activation_service::ActivationService;
pub use catalog_service::RoleCatalogService;
pub use config::{
    CatalogOptions, JustificationPolicy, NotificationOptions, Scope, TokenOptions,
};
pub use eligibility_service::EligibilityService;
pub use engine::AccessEngine;
pub use notification_service::{Notification, NotificationService, NotificationType};
pub use ports::{
    service_account_jwks_url, AccessControlList, AnalysisResult, Clock, ConditionEvaluation,
    CredentialsClient, IamPolicyStore, JwksClient, MailTransport, PolicyAnalysis,
    PolicyAnalysisClient, ProjectSearchClient,
};
pub use provisioner_service::{IamBindingOption, IamProvisionerService};
pub use token_service::{ActivationTokenClaims, TokenService, TokenWithExpiry};
