use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use elevia_core::{AppError, AppResult};
use elevia_domain::{
    Activation, ActivationRequest, IamBinding, IamCondition, JitRequest, MpaRequest, RoleBinding,
    TemporaryAccessCondition, UserId, ACTIVATION_CONDITION_TITLE,
};
use tracing::info;

use crate::catalog_service::RoleCatalogService;
use crate::config::JustificationPolicy;
use crate::ports::Clock;
use crate::provisioner_service::{IamBindingOption, IamProvisionerService};

/// How far in the past a requested start time may lie.
fn start_time_tolerance() -> Duration {
    Duration::minutes(1)
}

/// The activation state machine: validates requests against the
/// justification policy, the catalog's bounds, and live eligibility,
/// then provisions the time-conditioned binding.
#[derive(Clone)]
pub struct ActivationService {
    catalog: Arc<RoleCatalogService>,
    provisioner: Arc<IamProvisionerService>,
    justification_policy: JustificationPolicy,
    clock: Arc<dyn Clock>,
}

impl ActivationService {
    /// Creates the activator.
    #[must_use]
    pub fn new(
        catalog: Arc<RoleCatalogService>,
        provisioner: Arc<IamProvisionerService>,
        justification_policy: JustificationPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog,
            provisioner,
            justification_policy,
            clock,
        }
    }

    /// Creates a self-approval request.
    ///
    /// Eligibility is not verified here; `activate` re-derives it
    /// immediately before provisioning.
    pub fn create_jit_request(
        &self,
        requesting_user: UserId,
        entitlements: BTreeSet<RoleBinding>,
        justification: impl Into<String>,
        start_time: DateTime<Utc>,
        duration: Duration,
    ) -> AppResult<JitRequest> {
        if entitlements.len() > self.catalog.options().max_entitlements_per_jit_request() {
            return Err(AppError::InvalidArgument(format!(
                "the number of roles exceeds the allowed maximum of {}",
                self.catalog.options().max_entitlements_per_jit_request()
            )));
        }
        self.check_start_time(start_time)?;

        JitRequest::new(
            requesting_user,
            entitlements,
            justification,
            start_time,
            duration,
        )
    }

    /// Creates a peer-approval request.
    ///
    /// Eligibility is pre-verified so that no token is minted for a
    /// request whose approval is bound to fail.
    pub async fn create_mpa_request(
        &self,
        requesting_user: UserId,
        entitlement: RoleBinding,
        reviewers: BTreeSet<UserId>,
        justification: impl Into<String>,
        start_time: DateTime<Utc>,
        duration: Duration,
    ) -> AppResult<MpaRequest> {
        let justification = justification.into();
        self.check_start_time(start_time)?;
        self.justification_policy.check(&justification)?;

        let request = MpaRequest::new(
            requesting_user,
            entitlement,
            reviewers,
            justification,
            start_time,
            duration,
        )?;

        self.catalog
            .verify_user_can_request(&ActivationRequest::Mpa(request.clone()))
            .await?;

        info!(
            id = %request.id(),
            user = %request.requesting_user(),
            role = request.entitlement().role(),
            "created peer-approval request"
        );

        Ok(request)
    }

    /// Activates a self-approval request.
    pub async fn activate(&self, request: &JitRequest) -> AppResult<Activation> {
        self.justification_policy.check(request.justification())?;
        self.check_start_time(request.start_time())?;

        let wrapped = ActivationRequest::Jit(request.clone());
        self.catalog.verify_user_can_request(&wrapped).await?;

        let description = format!(
            "Self-approved, justification: {}",
            request.justification()
        );
        for binding in request.entitlements() {
            self.provision_temporary_binding(
                &description,
                binding,
                request.requesting_user(),
                request.start_time(),
                request.end_time(),
                &[IamBindingOption::PurgeExistingTemporaryBindings],
            )
            .await?;
        }

        info!(
            id = %request.id(),
            user = %request.requesting_user(),
            roles = request.entitlements().len(),
            "activated self-approval request"
        );

        Ok(Activation::new(wrapped))
    }

    /// Approves another user's peer-approval request.
    pub async fn approve(
        &self,
        approver: &UserId,
        request: &MpaRequest,
    ) -> AppResult<Activation> {
        if approver == request.requesting_user() {
            return Err(AppError::AccessDenied(
                "a peer-approval request cannot be approved by its beneficiary".to_owned(),
            ));
        }
        if !request.reviewers().contains(approver) {
            return Err(AppError::AccessDenied(format!(
                "the request does not permit approval by '{approver}'"
            )));
        }

        self.justification_policy.check(request.justification())?;
        self.catalog
            .verify_user_can_request(&ActivationRequest::Mpa(request.clone()))
            .await?;
        self.catalog.verify_user_can_approve(approver, request).await?;

        let description = format!(
            "Approved by {}, justification: {}",
            approver.email(),
            request.justification()
        );

        // The window is derived from the request, not from the wall
        // clock: two reviewers approving the same token compute the
        // same binding, and the strict insert turns the loser of the
        // race into an AlreadyExists that is safe to treat as success.
        let outcome = self
            .provision_temporary_binding(
                &description,
                request.entitlement(),
                request.requesting_user(),
                request.start_time(),
                request.end_time(),
                &[
                    IamBindingOption::PurgeExistingTemporaryBindings,
                    IamBindingOption::FailIfBindingExists,
                ],
            )
            .await;

        match outcome {
            Ok(()) => {}
            Err(AppError::AlreadyExists(_)) => {
                info!(
                    id = %request.id(),
                    approver = %approver,
                    "request was already provisioned by a concurrent approval"
                );
            }
            Err(error) => return Err(error),
        }

        info!(
            id = %request.id(),
            approver = %approver,
            beneficiary = %request.requesting_user(),
            role = request.entitlement().role(),
            "approved peer-approval request"
        );

        Ok(Activation::new(ActivationRequest::Mpa(request.clone())))
    }

    async fn provision_temporary_binding(
        &self,
        description: &str,
        binding: &RoleBinding,
        beneficiary: &UserId,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        options: &[IamBindingOption],
    ) -> AppResult<()> {
        let window = TemporaryAccessCondition::new(start_time, end_time)?;
        let project = binding.project_id()?;

        let iam_binding = IamBinding {
            role: binding.role().to_owned(),
            members: vec![beneficiary.iam_member()],
            condition: Some(IamCondition {
                title: Some(ACTIVATION_CONDITION_TITLE.to_owned()),
                description: Some(description.to_owned()),
                expression: window.to_expression(),
            }),
        };

        self.provisioner
            .add_project_iam_binding(&project, iam_binding, options, description)
            .await
    }

    fn check_start_time(&self, start_time: DateTime<Utc>) -> AppResult<()> {
        if start_time < self.clock.now() - start_time_tolerance() {
            return Err(AppError::InvalidArgument(
                "the start time must not be in the past".to_owned(),
            ));
        }

        Ok(())
    }
}
