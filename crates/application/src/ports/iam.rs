use std::collections::BTreeSet;

use async_trait::async_trait;
use elevia_core::AppResult;
use elevia_domain::{IamPolicy, ProjectId};

/// Etag-guarded access to a project's IAM policy.
#[async_trait]
pub trait IamPolicyStore: Send + Sync {
    /// Reads the current policy, including its etag.
    async fn read_project_policy(&self, project: &ProjectId) -> AppResult<IamPolicy>;

    /// Writes a policy derived from a prior read.
    ///
    /// Implementations must fail with `AppError::Conflict` when the
    /// policy's etag no longer matches the stored one.
    async fn write_project_policy(&self, project: &ProjectId, policy: &IamPolicy)
        -> AppResult<()>;
}

/// Resource-manager project search.
#[async_trait]
pub trait ProjectSearchClient: Send + Sync {
    /// Returns the projects matching a resource-manager query.
    async fn search_project_ids(&self, query: &str) -> AppResult<BTreeSet<ProjectId>>;
}
