//! Domain model for the Elevia just-in-time access engine.

#![forbid(unsafe_code)]

mod activation;
mod conditions;
mod eligibility;
mod iam;
mod project;
mod user;

pub use activation::{
    Activation, ActivationId, ActivationRequest, JitRequest, MpaRequest,
};
pub use conditions::{
    eligibility_constraint_type, is_activation_condition, is_peer_approval_constraint,
    is_self_approval_constraint, TemporaryAccessCondition, ACTIVATION_CONDITION_TITLE,
};
pub use eligibility::{ActivationType, Eligibility, EligibilitySet, EligibilityStatus};
pub use iam::{IamBinding, IamCondition, IamPolicy, RoleBinding};
pub use project::ProjectId;
pub use user::UserId;
