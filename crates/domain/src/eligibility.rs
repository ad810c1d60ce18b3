use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use elevia_core::AppError;
use serde::{Deserialize, Serialize};

use crate::iam::RoleBinding;

/// The modality by which an eligibility can be turned into a grant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ActivationType {
    /// Just-in-time self-approval: the user's own justification suffices.
    SelfApproval,
    /// Multi-party approval: a co-eligible peer must sign off.
    PeerApproval,
}

impl ActivationType {
    /// Returns a stable transport value for this activation type. The
    /// value doubles as the activation-id prefix.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SelfApproval => "jit",
            Self::PeerApproval => "mpa",
        }
    }

    /// Returns all known activation types.
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[Self::SelfApproval, Self::PeerApproval]
    }
}

impl FromStr for ActivationType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "jit" => Ok(Self::SelfApproval),
            "mpa" => Ok(Self::PeerApproval),
            _ => Err(AppError::InvalidArgument(format!(
                "unknown activation type '{value}'"
            ))),
        }
    }
}

impl Display for ActivationType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.as_str())
    }
}

/// Whether an eligibility is latent or currently exercised.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityStatus {
    /// The eligibility can be activated.
    Available,
    /// A temporary grant is presently in effect.
    Active,
}

impl EligibilityStatus {
    /// Returns all known statuses.
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[Self::Available, Self::Active]
    }
}

/// A role a user may activate on a project, together with the approval
/// modality and its current status.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Eligibility {
    binding: RoleBinding,
    activation_type: ActivationType,
    status: EligibilityStatus,
}

impl Eligibility {
    /// Creates an eligibility entry.
    #[must_use]
    pub fn new(
        binding: RoleBinding,
        activation_type: ActivationType,
        status: EligibilityStatus,
    ) -> Self {
        Self {
            binding,
            activation_type,
            status,
        }
    }

    /// Returns the role binding.
    #[must_use]
    pub fn binding(&self) -> &RoleBinding {
        &self.binding
    }

    /// Returns the approval modality.
    #[must_use]
    pub fn activation_type(&self) -> ActivationType {
        self.activation_type
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> EligibilityStatus {
        self.status
    }
}

/// An ordered set of eligibilities plus non-fatal analysis warnings.
///
/// A given (role binding, activation type) pair appears at most once;
/// ordering follows the binding's resource name, then the role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilitySet {
    items: BTreeSet<Eligibility>,
    warnings: Vec<String>,
}

impl EligibilitySet {
    /// Creates a set from pre-merged items and warnings.
    #[must_use]
    pub fn new(items: BTreeSet<Eligibility>, warnings: Vec<String>) -> Self {
        Self { items, warnings }
    }

    /// Returns the eligibility entries in order.
    #[must_use]
    pub fn items(&self) -> &BTreeSet<Eligibility> {
        &self.items
    }

    /// Returns the non-fatal warnings the analysis produced.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Returns whether the set carries no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Looks up the entry for a binding and activation type.
    #[must_use]
    pub fn find(
        &self,
        binding: &RoleBinding,
        activation_type: ActivationType,
    ) -> Option<&Eligibility> {
        self.items.iter().find(|eligibility| {
            eligibility.binding() == binding && eligibility.activation_type() == activation_type
        })
    }
}
