use std::sync::Arc;
use std::time::Duration;

use elevia_core::{AppError, AppResult};
use elevia_domain::{IamBinding, ProjectId, ACTIVATION_CONDITION_TITLE};
use tracing::{debug, info};

use crate::ports::IamPolicyStore;

/// Conditions require policy version 3.
const CONDITIONAL_POLICY_VERSION: i32 = 3;

const DEFAULT_MAX_ATTEMPTS: u8 = 4;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 200;

/// Flags controlling how a binding is inserted into a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IamBindingOption {
    /// Remove every activation binding for the same member before
    /// inserting the new one, whether or not its window is still valid.
    PurgeExistingTemporaryBindings,
    /// Make the insert strict: fail with `AlreadyExists` when a binding
    /// with identical members, role, and condition expression is
    /// already present.
    FailIfBindingExists,
}

/// Applies time-conditioned bindings to project IAM policies.
///
/// The policy is read with its etag, modified locally, and written back;
/// a stale etag triggers a bounded retry with linear backoff before the
/// conflict is surfaced.
#[derive(Clone)]
pub struct IamProvisionerService {
    policy_store: Arc<dyn IamPolicyStore>,
    max_attempts: u8,
    retry_backoff_ms: u64,
}

impl IamProvisionerService {
    /// Creates a provisioner with default retry behavior.
    #[must_use]
    pub fn new(policy_store: Arc<dyn IamPolicyStore>) -> Self {
        Self::with_retry(policy_store, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BACKOFF_MS)
    }

    /// Creates a provisioner with explicit retry behavior.
    #[must_use]
    pub fn with_retry(
        policy_store: Arc<dyn IamPolicyStore>,
        max_attempts: u8,
        retry_backoff_ms: u64,
    ) -> Self {
        Self {
            policy_store,
            max_attempts: max_attempts.max(1),
            retry_backoff_ms: retry_backoff_ms.max(50),
        }
    }

    /// Adds a binding to the project's IAM policy.
    pub async fn add_project_iam_binding(
        &self,
        project: &ProjectId,
        binding: IamBinding,
        options: &[IamBindingOption],
        audit_reason: &str,
    ) -> AppResult<()> {
        let [member] = binding.members.as_slice() else {
            return Err(AppError::InvalidArgument(
                "an activation binding must have exactly one member".to_owned(),
            ));
        };
        let member = member.clone();

        let mut attempt = 0_u8;
        loop {
            attempt = attempt.saturating_add(1);

            let mut policy = self.policy_store.read_project_policy(project).await?;

            if options.contains(&IamBindingOption::FailIfBindingExists) {
                let duplicate = policy.bindings.iter().any(|existing| {
                    existing.role == binding.role
                        && existing.members == binding.members
                        && condition_expression(existing) == condition_expression(&binding)
                });
                if duplicate {
                    return Err(AppError::AlreadyExists(format!(
                        "a binding for '{member}' on '{}' with the same condition already exists",
                        binding.role
                    )));
                }
            }

            if options.contains(&IamBindingOption::PurgeExistingTemporaryBindings) {
                let before = policy.bindings.len();
                policy.bindings.retain(|existing| {
                    let is_activation = existing
                        .condition
                        .as_ref()
                        .and_then(|condition| condition.title.as_deref())
                        == Some(ACTIVATION_CONDITION_TITLE);
                    let sole_member =
                        existing.members.len() == 1 && existing.members[0] == member;
                    !(is_activation && sole_member)
                });
                let purged = before - policy.bindings.len();
                if purged > 0 {
                    debug!(
                        project = %project,
                        member = member.as_str(),
                        purged,
                        "purged prior activation bindings"
                    );
                }
            }

            policy.bindings.push(binding.clone());
            policy.version = policy.version.max(CONDITIONAL_POLICY_VERSION);

            match self.policy_store.write_project_policy(project, &policy).await {
                Ok(()) => {
                    info!(
                        project = %project,
                        role = binding.role.as_str(),
                        member = member.as_str(),
                        reason = audit_reason,
                        "provisioned temporary role binding"
                    );
                    return Ok(());
                }
                Err(AppError::Conflict(_)) if attempt < self.max_attempts => {
                    let delay = self.retry_backoff_ms.saturating_mul(u64::from(attempt));
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Err(AppError::Conflict(detail)) => {
                    return Err(AppError::Conflict(format!(
                        "the policy of project '{project}' kept changing concurrently: {detail}"
                    )));
                }
                Err(error) => return Err(error),
            }
        }
    }
}

fn condition_expression(binding: &IamBinding) -> Option<&str> {
    binding
        .condition
        .as_ref()
        .map(|condition| condition.expression.as_str())
}
