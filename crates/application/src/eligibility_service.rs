use std::collections::BTreeSet;
use std::sync::Arc;

use elevia_core::AppResult;
use elevia_domain::{
    eligibility_constraint_type, is_activation_condition, is_peer_approval_constraint,
    is_self_approval_constraint, ActivationType, Eligibility, EligibilitySet, EligibilityStatus,
    IamCondition, ProjectId, RoleBinding, UserId,
};
use tracing::debug;

use crate::config::Scope;
use crate::ports::{ConditionEvaluation, PolicyAnalysis, PolicyAnalysisClient};

/// Permission used to narrow the project sweep to resources the user can
/// at least see.
const PROJECT_SWEEP_PERMISSION: &str = "resourcemanager.projects.get";

const USER_PRINCIPAL_PREFIX: &str = "user:";

/// Derives per-user eligibilities from the cloud policy analyzer's
/// output.
///
/// Eligibility is never stored: every call re-reads the authoritative
/// IAM policy graph and reconstructs the set.
#[derive(Clone)]
pub struct EligibilityService {
    analysis_client: Arc<dyn PolicyAnalysisClient>,
    scope: Scope,
}

impl EligibilityService {
    /// Creates the service for a policy analyzer and search scope.
    #[must_use]
    pub fn new(analysis_client: Arc<dyn PolicyAnalysisClient>, scope: Scope) -> Self {
        Self {
            analysis_client,
            scope,
        }
    }

    /// Returns the projects on which the user holds any eligible or
    /// active binding.
    pub async fn find_projects_with_eligibilities(
        &self,
        user: &UserId,
    ) -> AppResult<BTreeSet<ProjectId>> {
        let analysis = self
            .analysis_client
            .find_accessible_resources_by_user(
                &self.scope,
                user,
                Some(PROJECT_SWEEP_PERMISSION),
                None,
                true,
            )
            .await?;

        let mut bindings = find_role_bindings(
            &analysis,
            |condition| eligibility_constraint_type(condition).is_some(),
            ConditionEvaluation::Conditional,
        );
        bindings.extend(find_role_bindings(
            &analysis,
            is_activation_condition,
            ConditionEvaluation::True,
        ));

        Ok(bindings
            .iter()
            .filter_map(|binding| binding.project_id().ok())
            .collect())
    }

    /// Returns the user's eligibilities on a project, filtered to the
    /// requested activation types and statuses.
    pub async fn find_eligibilities(
        &self,
        user: &UserId,
        project: &ProjectId,
        types: &[ActivationType],
        statuses: &[EligibilityStatus],
    ) -> AppResult<EligibilitySet> {
        let analysis = self
            .analysis_client
            .find_accessible_resources_by_user(
                &self.scope,
                user,
                None,
                Some(&project.full_resource_name()),
                false,
            )
            .await?;

        // Candidate eligible bindings carry a marker condition the
        // analyzer could not decide; bindings the engine activated
        // earlier carry the reserved title and currently evaluate true.
        // Active-but-false bindings are expired leftovers.
        let self_eligible = find_role_bindings(
            &analysis,
            is_self_approval_constraint,
            ConditionEvaluation::Conditional,
        );
        let peer_eligible = find_role_bindings(
            &analysis,
            is_peer_approval_constraint,
            ConditionEvaluation::Conditional,
        );
        let active = find_role_bindings(
            &analysis,
            is_activation_condition,
            ConditionEvaluation::True,
        );

        let mut items = BTreeSet::new();
        for (bindings, activation_type) in [
            (&self_eligible, ActivationType::SelfApproval),
            (&peer_eligible, ActivationType::PeerApproval),
        ] {
            for binding in bindings {
                if binding.project_id().ok().as_ref() != Some(project) {
                    continue;
                }

                let status = if active.contains(binding) {
                    EligibilityStatus::Active
                } else {
                    EligibilityStatus::Available
                };
                items.insert(Eligibility::new(binding.clone(), activation_type, status));
            }
        }

        // An activation can outlive the eligibility it came from when
        // the marker binding is removed mid-window. Surface it so the
        // grant stays visible until it expires; the analysis feed does
        // not retain the modality, so it is reported as self-approval.
        for binding in &active {
            if binding.project_id().ok().as_ref() != Some(project) {
                continue;
            }
            if !self_eligible.contains(binding) && !peer_eligible.contains(binding) {
                items.insert(Eligibility::new(
                    binding.clone(),
                    ActivationType::SelfApproval,
                    EligibilityStatus::Active,
                ));
            }
        }

        items.retain(|eligibility| {
            types.contains(&eligibility.activation_type())
                && statuses.contains(&eligibility.status())
        });

        debug!(
            user = %user,
            project = %project,
            eligibilities = items.len(),
            warnings = analysis.non_critical_errors.len(),
            "derived eligibility set"
        );

        Ok(EligibilitySet::new(items, analysis.non_critical_errors))
    }

    /// Returns the users that hold an eligible binding of the given type
    /// on the given role binding.
    ///
    /// Only `user:` principals are considered; service accounts and
    /// groups are discarded.
    pub async fn find_eligibility_holders(
        &self,
        binding: &RoleBinding,
        activation_type: ActivationType,
    ) -> AppResult<BTreeSet<UserId>> {
        let analysis = self
            .analysis_client
            .find_permissioned_principals_by_resource(
                &self.scope,
                binding.full_resource_name(),
                binding.role(),
            )
            .await?;

        let mut holders = BTreeSet::new();
        for result in &analysis.results {
            let condition = result
                .binding
                .as_ref()
                .and_then(|binding| binding.condition.as_ref());
            if eligibility_constraint_type(condition) != Some(activation_type) {
                continue;
            }

            for identity in &result.identities {
                let Some(email) = identity.strip_prefix(USER_PRINCIPAL_PREFIX) else {
                    continue;
                };

                match UserId::from_email(email) {
                    Ok(user) => {
                        holders.insert(user);
                    }
                    Err(_) => {
                        debug!(identity = identity, "skipping malformed user principal");
                    }
                }
            }
        }

        Ok(holders)
    }
}

/// Collects the project-level role bindings of all analysis results
/// whose binding condition satisfies the predicate and whose
/// access-control lists carry the wanted verdict.
fn find_role_bindings(
    analysis: &PolicyAnalysis,
    condition_predicate: impl Fn(Option<&IamCondition>) -> bool,
    wanted_evaluation: ConditionEvaluation,
) -> BTreeSet<RoleBinding> {
    let mut bindings = BTreeSet::new();

    for result in &analysis.results {
        let Some(iam_binding) = result.binding.as_ref() else {
            continue;
        };
        if !condition_predicate(iam_binding.condition.as_ref()) {
            continue;
        }

        for acl in &result.access_control_lists {
            if acl.condition_evaluation != Some(wanted_evaluation) {
                continue;
            }

            for resource in &acl.resources {
                if !ProjectId::is_project_full_resource_name(resource) {
                    continue;
                }
                if let Ok(binding) = RoleBinding::new(resource, &iam_binding.role) {
                    bindings.insert(binding);
                }
            }
        }
    }

    bindings
}
