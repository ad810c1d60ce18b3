use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use elevia_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::eligibility::ActivationType;
use crate::iam::RoleBinding;
use crate::user::UserId;

/// Unique, printable identifier of an activation request.
///
/// The activation type is encoded as a prefix so token consumers can
/// reject cross-type confusion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActivationId(String);

impl ActivationId {
    /// Creates a fresh random id for the given activation type.
    #[must_use]
    pub fn new(activation_type: ActivationType) -> Self {
        Self(format!(
            "{}-{}",
            activation_type.as_str(),
            Uuid::new_v4().simple()
        ))
    }

    /// Parses an id, requiring a recognized activation-type prefix.
    pub fn parse(value: &str) -> AppResult<Self> {
        let (prefix, remainder) = value.split_once('-').ok_or_else(|| {
            AppError::InvalidArgument(format!("'{value}' is not an activation id"))
        })?;

        ActivationType::from_str(prefix)?;
        if remainder.is_empty() {
            return Err(AppError::InvalidArgument(format!(
                "'{value}' is not an activation id"
            )));
        }

        Ok(Self(value.to_owned()))
    }

    /// Returns the activation type encoded in the prefix.
    ///
    /// `new` and `parse` only admit recognized prefixes; an id that
    /// somehow carries anything else reports the self-approval type,
    /// which cannot be used to approve on another user's behalf.
    #[must_use]
    pub fn activation_type(&self) -> ActivationType {
        self.0
            .split_once('-')
            .and_then(|(prefix, _)| ActivationType::from_str(prefix).ok())
            .unwrap_or(ActivationType::SelfApproval)
    }

    /// Returns the id string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for ActivationId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

fn validate_common(
    justification: &str,
    duration: Duration,
) -> AppResult<()> {
    if justification.trim().is_empty() {
        return Err(AppError::InvalidArgument(
            "a justification is required".to_owned(),
        ));
    }
    if duration <= Duration::zero() {
        return Err(AppError::InvalidArgument(
            "the activation duration must be positive".to_owned(),
        ));
    }

    Ok(())
}

/// A self-approval activation request covering one or more entitlements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JitRequest {
    id: ActivationId,
    requesting_user: UserId,
    entitlements: BTreeSet<RoleBinding>,
    justification: String,
    start_time: DateTime<Utc>,
    duration: Duration,
}

impl JitRequest {
    /// Creates a self-approval request with a fresh id.
    pub fn new(
        requesting_user: UserId,
        entitlements: BTreeSet<RoleBinding>,
        justification: impl Into<String>,
        start_time: DateTime<Utc>,
        duration: Duration,
    ) -> AppResult<Self> {
        let justification = justification.into();
        validate_common(&justification, duration)?;

        if entitlements.is_empty() {
            return Err(AppError::InvalidArgument(
                "at least one role must be requested".to_owned(),
            ));
        }

        Ok(Self {
            id: ActivationId::new(ActivationType::SelfApproval),
            requesting_user,
            entitlements,
            justification,
            start_time,
            duration,
        })
    }

    /// Returns the request id.
    #[must_use]
    pub fn id(&self) -> &ActivationId {
        &self.id
    }

    /// Returns the requesting user.
    #[must_use]
    pub fn requesting_user(&self) -> &UserId {
        &self.requesting_user
    }

    /// Returns the requested entitlements.
    #[must_use]
    pub fn entitlements(&self) -> &BTreeSet<RoleBinding> {
        &self.entitlements
    }

    /// Returns the justification.
    #[must_use]
    pub fn justification(&self) -> &str {
        self.justification.as_str()
    }

    /// Returns the intended start of the activation window.
    #[must_use]
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Returns the requested duration.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Returns the end of the activation window.
    #[must_use]
    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + self.duration
    }
}

/// A peer-approval activation request covering exactly one entitlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MpaRequest {
    id: ActivationId,
    requesting_user: UserId,
    entitlement: RoleBinding,
    reviewers: BTreeSet<UserId>,
    justification: String,
    start_time: DateTime<Utc>,
    duration: Duration,
}

impl MpaRequest {
    /// Creates a peer-approval request with a fresh id.
    pub fn new(
        requesting_user: UserId,
        entitlement: RoleBinding,
        reviewers: BTreeSet<UserId>,
        justification: impl Into<String>,
        start_time: DateTime<Utc>,
        duration: Duration,
    ) -> AppResult<Self> {
        Self::with_id(
            ActivationId::new(ActivationType::PeerApproval),
            requesting_user,
            entitlement,
            reviewers,
            justification,
            start_time,
            duration,
        )
    }

    /// Reconstructs a peer-approval request under an existing id, as
    /// needed when a verified token is decoded back into a request.
    pub fn with_id(
        id: ActivationId,
        requesting_user: UserId,
        entitlement: RoleBinding,
        reviewers: BTreeSet<UserId>,
        justification: impl Into<String>,
        start_time: DateTime<Utc>,
        duration: Duration,
    ) -> AppResult<Self> {
        let justification = justification.into();
        validate_common(&justification, duration)?;

        if id.activation_type() != ActivationType::PeerApproval {
            return Err(AppError::InvalidArgument(format!(
                "'{id}' is not a peer-approval activation id"
            )));
        }
        if reviewers.is_empty() {
            return Err(AppError::InvalidArgument(
                "at least one reviewer is required".to_owned(),
            ));
        }
        if reviewers.contains(&requesting_user) {
            return Err(AppError::InvalidArgument(
                "the requesting user cannot be a reviewer".to_owned(),
            ));
        }

        Ok(Self {
            id,
            requesting_user,
            entitlement,
            reviewers,
            justification,
            start_time,
            duration,
        })
    }

    /// Returns the request id.
    #[must_use]
    pub fn id(&self) -> &ActivationId {
        &self.id
    }

    /// Returns the requesting user (the beneficiary).
    #[must_use]
    pub fn requesting_user(&self) -> &UserId {
        &self.requesting_user
    }

    /// Returns the single requested entitlement.
    #[must_use]
    pub fn entitlement(&self) -> &RoleBinding {
        &self.entitlement
    }

    /// Returns the reviewers that may approve this request.
    #[must_use]
    pub fn reviewers(&self) -> &BTreeSet<UserId> {
        &self.reviewers
    }

    /// Returns the justification.
    #[must_use]
    pub fn justification(&self) -> &str {
        self.justification.as_str()
    }

    /// Returns the intended start of the activation window.
    #[must_use]
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Returns the requested duration.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Returns the end of the activation window.
    #[must_use]
    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + self.duration
    }
}

/// An activation request, dispatched on by the activator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationRequest {
    /// Self-approval request.
    Jit(JitRequest),
    /// Peer-approval request.
    Mpa(MpaRequest),
}

impl ActivationRequest {
    /// Returns the request id.
    #[must_use]
    pub fn id(&self) -> &ActivationId {
        match self {
            Self::Jit(request) => request.id(),
            Self::Mpa(request) => request.id(),
        }
    }

    /// Returns the requesting user.
    #[must_use]
    pub fn requesting_user(&self) -> &UserId {
        match self {
            Self::Jit(request) => request.requesting_user(),
            Self::Mpa(request) => request.requesting_user(),
        }
    }

    /// Returns the requested entitlements.
    #[must_use]
    pub fn entitlements(&self) -> Vec<&RoleBinding> {
        match self {
            Self::Jit(request) => request.entitlements().iter().collect(),
            Self::Mpa(request) => vec![request.entitlement()],
        }
    }

    /// Returns the justification.
    #[must_use]
    pub fn justification(&self) -> &str {
        match self {
            Self::Jit(request) => request.justification(),
            Self::Mpa(request) => request.justification(),
        }
    }

    /// Returns the intended start of the activation window.
    #[must_use]
    pub fn start_time(&self) -> DateTime<Utc> {
        match self {
            Self::Jit(request) => request.start_time(),
            Self::Mpa(request) => request.start_time(),
        }
    }

    /// Returns the requested duration.
    #[must_use]
    pub fn duration(&self) -> Duration {
        match self {
            Self::Jit(request) => request.duration(),
            Self::Mpa(request) => request.duration(),
        }
    }

    /// Returns the end of the activation window.
    #[must_use]
    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time() + self.duration()
    }

    /// Returns the approval modality of this request.
    #[must_use]
    pub fn activation_type(&self) -> ActivationType {
        match self {
            Self::Jit(_) => ActivationType::SelfApproval,
            Self::Mpa(_) => ActivationType::PeerApproval,
        }
    }
}

/// The observable outcome of a successful provisioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    request: ActivationRequest,
    end_time: DateTime<Utc>,
}

impl Activation {
    /// Creates the activation outcome for a provisioned request.
    #[must_use]
    pub fn new(request: ActivationRequest) -> Self {
        let end_time = request.end_time();
        Self { request, end_time }
    }

    /// Returns the consumed request.
    #[must_use]
    pub fn request(&self) -> &ActivationRequest {
        &self.request
    }

    /// Returns when the granted access expires.
    #[must_use]
    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{Duration, Utc};

    use super::{Activation, ActivationId, ActivationRequest, JitRequest, MpaRequest};
    use crate::eligibility::ActivationType;
    use crate::iam::RoleBinding;
    use crate::user::UserId;

    fn sample_binding() -> RoleBinding {
        RoleBinding::new(
            "//cloudresourcemanager.googleapis.com/projects/project-1",
            "roles/viewer",
        )
        .expect("valid binding")
    }

    fn alice() -> UserId {
        UserId::from_email("alice@example.com").expect("valid user")
    }

    fn bob() -> UserId {
        UserId::from_email("bob@example.com").expect("valid user")
    }

    #[test]
    fn activation_id_encodes_the_type() {
        let id = ActivationId::new(ActivationType::PeerApproval);
        assert!(id.as_str().starts_with("mpa-"));
        assert_eq!(id.activation_type(), ActivationType::PeerApproval);

        let parsed = ActivationId::parse(id.as_str()).expect("parsable id");
        assert_eq!(parsed, id);

        let id = ActivationId::new(ActivationType::SelfApproval);
        assert!(id.as_str().starts_with("jit-"));
        assert_eq!(id.activation_type(), ActivationType::SelfApproval);
    }

    #[test]
    fn activation_id_without_known_prefix_is_rejected() {
        assert!(ActivationId::parse("external-1234").is_err());
        assert!(ActivationId::parse("jit-").is_err());
        assert!(ActivationId::parse("nodash").is_err());
    }

    #[test]
    fn jit_request_requires_entitlements_and_justification() {
        let result = JitRequest::new(
            alice(),
            BTreeSet::new(),
            "bug #7",
            Utc::now(),
            Duration::minutes(10),
        );
        assert!(result.is_err());

        let result = JitRequest::new(
            alice(),
            BTreeSet::from([sample_binding()]),
            "  ",
            Utc::now(),
            Duration::minutes(10),
        );
        assert!(result.is_err());
    }

    #[test]
    fn mpa_request_rejects_self_review() {
        let result = MpaRequest::new(
            alice(),
            sample_binding(),
            BTreeSet::from([alice(), bob()]),
            "bug #7",
            Utc::now(),
            Duration::minutes(10),
        );
        assert!(result.is_err());
    }

    #[test]
    fn mpa_request_rejects_jit_id() {
        let result = MpaRequest::with_id(
            ActivationId::new(ActivationType::SelfApproval),
            alice(),
            sample_binding(),
            BTreeSet::from([bob()]),
            "bug #7",
            Utc::now(),
            Duration::minutes(10),
        );
        assert!(result.is_err());
    }

    #[test]
    fn end_time_is_start_plus_duration() {
        let start = Utc::now();
        let request = JitRequest::new(
            alice(),
            BTreeSet::from([sample_binding()]),
            "bug #7",
            start,
            Duration::minutes(10),
        )
        .expect("valid request");

        let activation = Activation::new(ActivationRequest::Jit(request));
        assert_eq!(activation.end_time(), start + Duration::minutes(10));
    }

    #[test]
    fn zero_duration_is_rejected() {
        let result = JitRequest::new(
            alice(),
            BTreeSet::from([sample_binding()]),
            "bug #7",
            Utc::now(),
            Duration::zero(),
        );
        assert!(result.is_err());
    }
}
