use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use elevia_core::{AppError, AppResult};
use elevia_domain::{
    ActivationRequest, ActivationType, Eligibility, EligibilitySet, EligibilityStatus, MpaRequest,
    ProjectId, RoleBinding, UserId,
};

use crate::config::CatalogOptions;
use crate::eligibility_service::EligibilityService;
use crate::ports::ProjectSearchClient;

/// Query-facing catalog of projects, eligibilities, and reviewers, plus
/// the guards the activator re-runs before touching IAM.
#[derive(Clone)]
pub struct RoleCatalogService {
    eligibility: Arc<EligibilityService>,
    project_search: Arc<dyn ProjectSearchClient>,
    options: CatalogOptions,
}

impl RoleCatalogService {
    /// Creates the catalog from the eligibility service, a project
    /// search client, and validated options.
    #[must_use]
    pub fn new(
        eligibility: Arc<EligibilityService>,
        project_search: Arc<dyn ProjectSearchClient>,
        options: CatalogOptions,
    ) -> Self {
        Self {
            eligibility,
            project_search,
            options,
        }
    }

    /// Returns the configured options.
    #[must_use]
    pub fn options(&self) -> &CatalogOptions {
        &self.options
    }

    /// Lists the projects the user can request access to.
    ///
    /// When a project query is configured the resource manager's search
    /// is used; otherwise the policy analyzer sweeps the entire scope.
    pub async fn list_projects(&self, user: &UserId) -> AppResult<BTreeSet<ProjectId>> {
        match self.options.project_query() {
            Some(query) => self.project_search.search_project_ids(query).await,
            None => self.eligibility.find_projects_with_eligibilities(user).await,
        }
    }

    /// Lists the user's eligibilities on a project, all activation types
    /// and statuses included.
    pub async fn list_eligibilities(
        &self,
        user: &UserId,
        project: &ProjectId,
    ) -> AppResult<EligibilitySet> {
        self.eligibility
            .find_eligibilities(
                user,
                project,
                ActivationType::all(),
                EligibilityStatus::all(),
            )
            .await
    }

    /// Lists the users that may review an activation of the given
    /// eligibility, excluding the requesting user.
    ///
    /// The requesting user must hold the same eligibility themselves;
    /// otherwise the call fails with `AccessDenied`.
    pub async fn list_reviewers(
        &self,
        requesting_user: &UserId,
        eligibility: &Eligibility,
    ) -> AppResult<BTreeSet<UserId>> {
        self.require_eligibility(
            requesting_user,
            eligibility.binding(),
            eligibility.activation_type(),
        )
        .await?;

        let mut holders = self
            .eligibility
            .find_eligibility_holders(eligibility.binding(), eligibility.activation_type())
            .await?;
        holders.remove(requesting_user);

        Ok(holders)
    }

    /// Validates a request against the configured bounds.
    pub fn validate_request(&self, request: &ActivationRequest) -> AppResult<()> {
        let duration = request.duration();
        if duration < self.options.min_activation_duration()
            || duration > self.options.max_activation_duration()
        {
            return Err(AppError::InvalidArgument(format!(
                "the activation duration must be between {} and {} minutes",
                self.options.min_activation_duration().num_minutes(),
                self.options.max_activation_duration().num_minutes()
            )));
        }

        match request {
            ActivationRequest::Jit(request) => {
                if request.entitlements().len() > self.options.max_entitlements_per_jit_request() {
                    return Err(AppError::InvalidArgument(format!(
                        "the number of roles exceeds the allowed maximum of {}",
                        self.options.max_entitlements_per_jit_request()
                    )));
                }
            }
            ActivationRequest::Mpa(request) => {
                let reviewers = request.reviewers().len();
                if reviewers < self.options.min_reviewers()
                    || reviewers > self.options.max_reviewers()
                {
                    return Err(AppError::InvalidArgument(format!(
                        "the number of reviewers must be between {} and {}",
                        self.options.min_reviewers(),
                        self.options.max_reviewers()
                    )));
                }
            }
        }

        Ok(())
    }

    /// Verifies that the requesting user still qualifies for every
    /// entitlement of the request, via the request's activation type.
    pub async fn verify_user_can_request(&self, request: &ActivationRequest) -> AppResult<()> {
        self.validate_request(request)?;

        let mut per_project: BTreeMap<ProjectId, Vec<&RoleBinding>> = BTreeMap::new();
        for binding in request.entitlements() {
            per_project
                .entry(binding.project_id()?)
                .or_default()
                .push(binding);
        }

        for (project, bindings) in per_project {
            let set = self
                .eligibility
                .find_eligibilities(
                    request.requesting_user(),
                    &project,
                    &[request.activation_type()],
                    EligibilityStatus::all(),
                )
                .await?;

            for binding in bindings {
                if set.find(binding, request.activation_type()).is_none() {
                    return Err(AppError::AccessDenied(format!(
                        "user '{}' does not hold a suitable eligibility to activate '{}'",
                        request.requesting_user(),
                        binding.role()
                    )));
                }
            }
        }

        Ok(())
    }

    /// Verifies that the approver holds the peer-approval eligibility
    /// for the request's entitlement and is listed as a reviewer on the
    /// request.
    pub async fn verify_user_can_approve(
        &self,
        approver: &UserId,
        request: &MpaRequest,
    ) -> AppResult<()> {
        if !request.reviewers().contains(approver) {
            return Err(AppError::AccessDenied(format!(
                "the request does not permit approval by '{approver}'"
            )));
        }

        let holders = self
            .eligibility
            .find_eligibility_holders(request.entitlement(), ActivationType::PeerApproval)
            .await?;
        if !holders.contains(approver) {
            return Err(AppError::AccessDenied(format!(
                "user '{}' does not hold a reviewer eligibility for '{}'",
                approver,
                request.entitlement().role()
            )));
        }

        Ok(())
    }

    async fn require_eligibility(
        &self,
        user: &UserId,
        binding: &RoleBinding,
        activation_type: ActivationType,
    ) -> AppResult<()> {
        let project = binding.project_id()?;
        let set = self
            .eligibility
            .find_eligibilities(user, &project, &[activation_type], EligibilityStatus::all())
            .await?;

        if set.find(binding, activation_type).is_none() {
            return Err(AppError::AccessDenied(format!(
                "user '{}' is not eligible to request approval for '{}'",
                user,
                binding.role()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
