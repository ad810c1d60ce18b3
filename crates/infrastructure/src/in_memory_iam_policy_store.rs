use std::collections::HashMap;

use async_trait::async_trait;
use elevia_application::IamPolicyStore;
use elevia_core::{AppError, AppResult};
use elevia_domain::{IamPolicy, ProjectId};
use tokio::sync::RwLock;

const INITIAL_ETAG: &str = "etag-0";

/// In-memory IAM policy store for development and tests.
///
/// Reads return an empty version-1 policy for unknown projects; every
/// successful write bumps the etag, and a write carrying a stale etag
/// fails with `Conflict`, matching the resource manager's optimistic
/// concurrency.
#[derive(Debug, Default)]
pub struct InMemoryIamPolicyStore {
    state: RwLock<State>,
}

#[derive(Debug, Default)]
struct State {
    policies: HashMap<ProjectId, IamPolicy>,
    writes: u64,
}

impl InMemoryIamPolicyStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }

    /// Seeds a project's policy, assigning it a fresh etag.
    pub async fn seed_policy(&self, project: ProjectId, mut policy: IamPolicy) {
        let mut state = self.state.write().await;
        state.writes += 1;
        policy.etag = format!("etag-{}", state.writes);
        state.policies.insert(project, policy);
    }
}

#[async_trait]
impl IamPolicyStore for InMemoryIamPolicyStore {
    async fn read_project_policy(&self, project: &ProjectId) -> AppResult<IamPolicy> {
        let state = self.state.read().await;
        Ok(state.policies.get(project).cloned().unwrap_or(IamPolicy {
            version: 1,
            bindings: Vec::new(),
            etag: INITIAL_ETAG.to_owned(),
        }))
    }

    async fn write_project_policy(
        &self,
        project: &ProjectId,
        policy: &IamPolicy,
    ) -> AppResult<()> {
        let mut state = self.state.write().await;

        let current_etag = state
            .policies
            .get(project)
            .map(|current| current.etag.clone())
            .unwrap_or_else(|| INITIAL_ETAG.to_owned());
        if policy.etag != current_etag {
            return Err(AppError::Conflict(format!(
                "the policy of project '{project}' was modified concurrently"
            )));
        }

        state.writes += 1;
        let mut stored = policy.clone();
        stored.etag = format!("etag-{}", state.writes);
        state.policies.insert(project.clone(), stored);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use elevia_application::IamPolicyStore;
    use elevia_core::AppError;
    use elevia_domain::{IamBinding, IamPolicy, ProjectId};

    use super::InMemoryIamPolicyStore;

    fn project() -> ProjectId {
        ProjectId::new("project-1").expect("valid project")
    }

    fn binding(role: &str) -> IamBinding {
        IamBinding {
            role: role.to_owned(),
            members: vec!["user:alice@example.com".to_owned()],
            condition: None,
        }
    }

    #[tokio::test]
    async fn unknown_projects_read_as_empty_policies() {
        let store = InMemoryIamPolicyStore::new();

        let policy = store
            .read_project_policy(&project())
            .await
            .expect("read succeeds");
        assert!(policy.bindings.is_empty());
        assert_eq!(policy.version, 1);
    }

    #[tokio::test]
    async fn writes_bump_the_etag() {
        let store = InMemoryIamPolicyStore::new();

        let mut policy = store
            .read_project_policy(&project())
            .await
            .expect("read succeeds");
        policy.bindings.push(binding("roles/viewer"));
        store
            .write_project_policy(&project(), &policy)
            .await
            .expect("write succeeds");

        let stored = store
            .read_project_policy(&project())
            .await
            .expect("read succeeds");
        assert_eq!(stored.bindings.len(), 1);
        assert_ne!(stored.etag, policy.etag);
    }

    #[tokio::test]
    async fn stale_etags_conflict() {
        let store = InMemoryIamPolicyStore::new();

        let first_read = store
            .read_project_policy(&project())
            .await
            .expect("read succeeds");

        let mut winner = first_read.clone();
        winner.bindings.push(binding("roles/viewer"));
        store
            .write_project_policy(&project(), &winner)
            .await
            .expect("first write succeeds");

        let mut loser = first_read;
        loser.bindings.push(binding("roles/browser"));
        let error = store
            .write_project_policy(&project(), &loser)
            .await
            .expect_err("stale etag");
        assert!(matches!(error, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn seeded_policies_are_readable() {
        let store = InMemoryIamPolicyStore::new();
        store
            .seed_policy(
                project(),
                IamPolicy {
                    version: 3,
                    bindings: vec![binding("roles/owner")],
                    etag: String::new(),
                },
            )
            .await;

        let policy = store
            .read_project_policy(&project())
            .await
            .expect("read succeeds");
        assert_eq!(policy.bindings.len(), 1);
        assert!(!policy.etag.is_empty());
    }
}
