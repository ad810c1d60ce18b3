use std::fmt::{Display, Formatter};

use elevia_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Full-resource-name prefix identifying a bare project.
const PROJECT_RESOURCE_NAME_PREFIX: &str = "//cloudresourcemanager.googleapis.com/projects/";

/// An unqualified project name, in bijection with the project's full
/// resource name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectId(String);

impl ProjectId {
    /// Creates a project id from a bare project name.
    pub fn new(id: impl Into<String>) -> AppResult<Self> {
        let id = id.into();
        if id.trim().is_empty() || id.contains('/') {
            return Err(AppError::InvalidArgument(format!(
                "'{id}' is not a valid project id"
            )));
        }

        Ok(Self(id))
    }

    /// Parses a project id from a full resource name.
    ///
    /// Only bare projects are accepted; folders, organizations, and
    /// resources below project level are rejected.
    pub fn from_full_resource_name(full_resource_name: &str) -> AppResult<Self> {
        if !Self::is_project_full_resource_name(full_resource_name) {
            return Err(AppError::InvalidArgument(format!(
                "'{full_resource_name}' is not a project resource name"
            )));
        }

        Self::new(&full_resource_name[PROJECT_RESOURCE_NAME_PREFIX.len()..])
    }

    /// Returns whether the full resource name denotes a bare project,
    /// with no further path segments.
    #[must_use]
    pub fn is_project_full_resource_name(full_resource_name: &str) -> bool {
        match full_resource_name.strip_prefix(PROJECT_RESOURCE_NAME_PREFIX) {
            Some(remainder) => !remainder.is_empty() && !remainder.contains('/'),
            None => false,
        }
    }

    /// Returns the bare project name.
    #[must_use]
    pub fn id(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the full resource name for this project.
    #[must_use]
    pub fn full_resource_name(&self) -> String {
        format!("{PROJECT_RESOURCE_NAME_PREFIX}{}", self.0)
    }
}

impl Display for ProjectId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}
