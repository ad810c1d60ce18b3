//! Shared primitives for all Rust crates in Elevia.

#![forbid(unsafe_code)]

use thiserror::Error;

/// Result type used across Elevia crates.
pub type AppResult<T> = Result<T, AppError>;

/// Common application error categories.
///
/// Error kinds are values, not types: every fallible operation in the
/// engine reports one of these categories with free-text detail.
#[derive(Debug, Error)]
pub enum AppError {
    /// The upstream identity is missing. Raised by adapters only, never
    /// by the engine itself.
    #[error("not authenticated: {0}")]
    NotAuthenticated(String),

    /// The caller is ineligible, not a listed reviewer, or the
    /// justification fails the policy.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A binding with identical member, role, and condition is already
    /// present.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Out-of-range duration, reviewer count, batch size, or a start
    /// time in the past.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Optimistic-concurrency retries on a policy write were exhausted.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Signature mismatch, wrong algorithm, issuer/audience mismatch,
    /// or an expired token.
    #[error("invalid token: {0}")]
    TokenInvalid(String),

    /// Transport-level failure; the caller may retry.
    #[error("transient error: {0}")]
    Transient(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::AppError;

    #[test]
    fn error_display_carries_detail() {
        let error = AppError::AccessDenied("not eligible for roles/viewer".to_owned());
        assert_eq!(
            error.to_string(),
            "access denied: not eligible for roles/viewer"
        );
    }

    #[test]
    fn every_category_names_itself() {
        let cases = [
            (
                AppError::NotAuthenticated("x".to_owned()),
                "not authenticated",
            ),
            (AppError::AlreadyExists("x".to_owned()), "already exists"),
            (AppError::TokenInvalid("x".to_owned()), "invalid token"),
            (AppError::Transient("x".to_owned()), "transient error"),
            (AppError::Conflict("x".to_owned()), "conflict"),
        ];

        for (error, prefix) in cases {
            assert!(
                error.to_string().starts_with(prefix),
                "'{error}' must start with '{prefix}'"
            );
        }
    }
}
