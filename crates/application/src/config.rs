//! Process-wide configuration, captured once at startup and immutable
//! afterwards. Parsing from the environment or files is the embedding
//! process's concern; these types only validate.

use chrono::Duration;
use elevia_core::{AppError, AppResult};
use elevia_domain::UserId;
use regex::Regex;

/// Root of the analyzer search: an organization, folder, or project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope(String);

impl Scope {
    /// Creates a validated scope identifier.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let valid = ["organizations/", "folders/", "projects/"]
            .iter()
            .any(|prefix| {
                value
                    .strip_prefix(prefix)
                    .map(|id| !id.is_empty() && !id.contains('/'))
                    .unwrap_or(false)
            });

        if !valid {
            return Err(AppError::InvalidArgument(format!(
                "scope must be organizations/<id>, folders/<id>, or projects/<id>, got '{value}'"
            )));
        }

        Ok(Self(value))
    }

    /// Returns the scope identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Bounds and modes of the role catalog and activator.
#[derive(Debug, Clone)]
pub struct CatalogOptions {
    scope: Scope,
    project_query: Option<String>,
    min_activation_duration: Duration,
    max_activation_duration: Duration,
    min_reviewers: usize,
    max_reviewers: usize,
    max_entitlements_per_jit_request: usize,
}

impl CatalogOptions {
    /// Creates validated catalog options.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        scope: Scope,
        project_query: Option<String>,
        min_activation_duration: Duration,
        max_activation_duration: Duration,
        min_reviewers: usize,
        max_reviewers: usize,
        max_entitlements_per_jit_request: usize,
    ) -> AppResult<Self> {
        if min_activation_duration <= Duration::zero() {
            return Err(AppError::InvalidArgument(
                "the minimum activation duration must be positive".to_owned(),
            ));
        }
        if max_activation_duration < min_activation_duration {
            return Err(AppError::InvalidArgument(
                "the maximum activation duration must not be below the minimum".to_owned(),
            ));
        }
        if min_reviewers == 0 {
            return Err(AppError::InvalidArgument(
                "at least one reviewer must be required".to_owned(),
            ));
        }
        if max_reviewers < min_reviewers {
            return Err(AppError::InvalidArgument(
                "the maximum reviewer count must not be below the minimum".to_owned(),
            ));
        }
        if max_entitlements_per_jit_request == 0 {
            return Err(AppError::InvalidArgument(
                "at least one role per self-approval request must be allowed".to_owned(),
            ));
        }

        Ok(Self {
            scope,
            project_query: project_query.filter(|query| !query.trim().is_empty()),
            min_activation_duration,
            max_activation_duration,
            min_reviewers,
            max_reviewers,
            max_entitlements_per_jit_request,
        })
    }

    /// Returns the analyzer search scope.
    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Returns the resource-manager project query, if one is configured.
    #[must_use]
    pub fn project_query(&self) -> Option<&str> {
        self.project_query.as_deref()
    }

    /// Returns the minimum activation duration.
    #[must_use]
    pub fn min_activation_duration(&self) -> Duration {
        self.min_activation_duration
    }

    /// Returns the maximum activation duration.
    #[must_use]
    pub fn max_activation_duration(&self) -> Duration {
        self.max_activation_duration
    }

    /// Returns the minimum reviewer count for peer-approval requests.
    #[must_use]
    pub fn min_reviewers(&self) -> usize {
        self.min_reviewers
    }

    /// Returns the maximum reviewer count for peer-approval requests.
    #[must_use]
    pub fn max_reviewers(&self) -> usize {
        self.max_reviewers
    }

    /// Returns the maximum batch size of a self-approval request.
    #[must_use]
    pub fn max_entitlements_per_jit_request(&self) -> usize {
        self.max_entitlements_per_jit_request
    }
}

/// Policy every justification string has to satisfy.
#[derive(Debug, Clone)]
pub struct JustificationPolicy {
    pattern: Regex,
    hint: String,
}

impl JustificationPolicy {
    /// Compiles a justification policy from a pattern and the hint shown
    /// to users when the pattern does not match.
    pub fn new(pattern: &str, hint: impl Into<String>) -> AppResult<Self> {
        let pattern = Regex::new(pattern).map_err(|error| {
            AppError::InvalidArgument(format!("invalid justification pattern: {error}"))
        })?;

        Ok(Self {
            pattern,
            hint: hint.into(),
        })
    }

    /// Returns the user-visible hint.
    #[must_use]
    pub fn hint(&self) -> &str {
        self.hint.as_str()
    }

    /// Checks a justification against the policy.
    pub fn check(&self, justification: &str) -> AppResult<()> {
        if self.pattern.is_match(justification) {
            return Ok(());
        }

        Err(AppError::AccessDenied(format!(
            "justification does not meet criteria: {}",
            self.hint
        )))
    }
}

/// Signing identity and validity bound of activation tokens.
#[derive(Debug, Clone)]
pub struct TokenOptions {
    service_account: UserId,
    token_validity: Duration,
}

impl TokenOptions {
    /// Creates validated token options.
    pub fn new(service_account: UserId, token_validity: Duration) -> AppResult<Self> {
        if token_validity <= Duration::zero() {
            return Err(AppError::InvalidArgument(
                "the token validity must be positive".to_owned(),
            ));
        }

        Ok(Self {
            service_account,
            token_validity,
        })
    }

    /// Returns the signing service account; it is both issuer and
    /// audience of issued tokens.
    #[must_use]
    pub fn service_account(&self) -> &UserId {
        &self.service_account
    }

    /// Returns the maximum span between issuance and expiry.
    #[must_use]
    pub fn token_validity(&self) -> Duration {
        self.token_validity
    }
}

/// Notification delivery options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationOptions {
    /// When false, notifications are logged instead of sent.
    pub enable_email: bool,
}
