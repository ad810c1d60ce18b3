use async_trait::async_trait;
use elevia_core::AppResult;
use elevia_domain::{IamBinding, UserId};

use crate::config::Scope;

/// Verdict of evaluating a binding's condition for an access-control
/// list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionEvaluation {
    /// The condition currently evaluates to true.
    True,
    /// The condition currently evaluates to false.
    False,
    /// The condition could not be decided at analysis time.
    Conditional,
}

/// One access-control list of an analysis result: the resources a
/// binding applies to, under one condition verdict.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessControlList {
    /// Full resource names the list applies to, descendants included.
    pub resources: Vec<String>,
    /// Condition verdict; absent for unconditional bindings.
    pub condition_evaluation: Option<ConditionEvaluation>,
}

/// One analysis result: a binding and the access it grants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisResult {
    /// The analyzed IAM binding.
    pub binding: Option<IamBinding>,
    /// Access-control lists derived from the binding.
    pub access_control_lists: Vec<AccessControlList>,
    /// Principals the binding applies to, in IAM member syntax.
    pub identities: Vec<String>,
}

/// A policy-analysis document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyAnalysis {
    /// All analysis results.
    pub results: Vec<AnalysisResult>,
    /// Non-critical analysis errors, surfaced as free-text warnings.
    pub non_critical_errors: Vec<String>,
}

/// Client for the cloud policy analyzer.
///
/// Implementations must bound each call with a server-side deadline and
/// abort promptly when the returned future is dropped.
#[async_trait]
pub trait PolicyAnalysisClient: Send + Sync {
    /// Finds resources a user could access, directly or through group
    /// membership, within the given scope.
    async fn find_accessible_resources_by_user(
        &self,
        scope: &Scope,
        user: &UserId,
        permission_filter: Option<&str>,
        resource_filter: Option<&str>,
        expand_resources: bool,
    ) -> AppResult<PolicyAnalysis>;

    /// Finds principals that have been (conditionally) granted a role on
    /// a resource within the given scope.
    async fn find_permissioned_principals_by_resource(
        &self,
        scope: &Scope,
        full_resource_name: &str,
        role: &str,
    ) -> AppResult<PolicyAnalysis>;
}
