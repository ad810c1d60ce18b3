//! IAM policy documents as read from and written to the cloud resource
//! manager, plus the role-binding value the rest of the engine keys on.

use std::fmt::{Display, Formatter};

use elevia_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::project::ProjectId;

/// A role granted on a resource, identified by the resource's full name
/// and an opaque role string such as `roles/viewer`.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct RoleBinding {
    full_resource_name: String,
    role: String,
}

impl RoleBinding {
    /// Creates a role binding for a resource full name and role.
    pub fn new(
        full_resource_name: impl Into<String>,
        role: impl Into<String>,
    ) -> AppResult<Self> {
        let full_resource_name = full_resource_name.into();
        let role = role.into();

        if full_resource_name.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "role binding resource name must not be empty".to_owned(),
            ));
        }
        if role.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "role binding role must not be empty".to_owned(),
            ));
        }

        Ok(Self {
            full_resource_name,
            role,
        })
    }

    /// Creates a role binding on a project.
    #[must_use]
    pub fn for_project(project: &ProjectId, role: impl Into<String>) -> Self {
        Self {
            full_resource_name: project.full_resource_name(),
            role: role.into(),
        }
    }

    /// Returns the full resource name the role is bound on.
    #[must_use]
    pub fn full_resource_name(&self) -> &str {
        self.full_resource_name.as_str()
    }

    /// Returns the role string.
    #[must_use]
    pub fn role(&self) -> &str {
        self.role.as_str()
    }

    /// Returns the project the binding applies to.
    pub fn project_id(&self) -> AppResult<ProjectId> {
        ProjectId::from_full_resource_name(&self.full_resource_name)
    }
}

impl Display for RoleBinding {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{} on {}", self.role, self.full_resource_name)
    }
}

/// A CEL condition attached to an IAM binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IamCondition {
    /// Condition title; the engine reserves `JIT access activation`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// CEL expression text.
    pub expression: String,
}

/// One binding row of an IAM policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IamBinding {
    /// Role string, e.g. `roles/viewer`.
    pub role: String,
    /// IAM member strings, e.g. `user:alice@example.com`.
    pub members: Vec<String>,
    /// Optional condition restricting the binding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<IamCondition>,
}

/// An IAM policy document with its optimistic-concurrency etag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IamPolicy {
    /// Policy version; conditions require version 3.
    pub version: i32,
    /// All bindings of the policy.
    pub bindings: Vec<IamBinding>,
    /// Etag the policy was read at.
    pub etag: String,
}
