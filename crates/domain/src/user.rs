use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

use elevia_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// An end user of the engine: an opaque account identifier plus the
/// primary email address the identity provider reported for it.
///
/// Equality, ordering, and hashing consider the account identifier only;
/// the email is carried for display, notifications, and IAM membership
/// strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserId {
    id: String,
    email: String,
}

impl UserId {
    /// Creates a user from an account identifier and email address.
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> AppResult<Self> {
        let id = id.into();
        let email = email.into();

        if id.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "user account id must not be empty".to_owned(),
            ));
        }
        if email.trim().is_empty() || !email.contains('@') {
            return Err(AppError::InvalidArgument(format!(
                "'{email}' is not a valid user email address"
            )));
        }

        Ok(Self { id, email })
    }

    /// Creates a user whose only known identifier is an email address,
    /// as reported by the policy analyzer's identity lists.
    pub fn from_email(email: impl Into<String>) -> AppResult<Self> {
        let email = email.into();
        Self::new(email.clone(), email)
    }

    /// Returns the opaque account identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    /// Returns the email address.
    #[must_use]
    pub fn email(&self) -> &str {
        self.email.as_str()
    }

    /// Returns the IAM member string for this user.
    #[must_use]
    pub fn iam_member(&self) -> String {
        format!("user:{}", self.email)
    }
}

impl PartialEq for UserId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for UserId {}

impl Hash for UserId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for UserId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for UserId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Display for UserId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.email)
    }
}

#[cfg(test)]
mod tests {
    use super::UserId;

    #[test]
    fn equality_considers_account_id_only() {
        let first = UserId::new("user-1", "alice@example.com").expect("valid user");
        let second = UserId::new("user-1", "alice@corp.example.com").expect("valid user");
        assert_eq!(first, second);
    }

    #[test]
    fn from_email_uses_email_as_id() {
        let user = UserId::from_email("bob@example.com").expect("valid user");
        assert_eq!(user.id(), "bob@example.com");
        assert_eq!(user.email(), "bob@example.com");
    }

    #[test]
    fn iam_member_carries_user_prefix() {
        let user = UserId::from_email("alice@example.com").expect("valid user");
        assert_eq!(user.iam_member(), "user:alice@example.com");
    }

    #[test]
    fn empty_id_is_rejected() {
        assert!(UserId::new("", "alice@example.com").is_err());
        assert!(UserId::from_email("not-an-email").is_err());
    }
}
