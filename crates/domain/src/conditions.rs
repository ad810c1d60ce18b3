//! Recognized CEL condition markers.
//!
//! Eligibility is encoded upstream as a conditional role binding whose
//! condition consists of exactly one marker expression. A condition that
//! merely contains a marker alongside further clauses is not recognized:
//! the engine refuses to reason about restrictions it does not know.

use std::sync::OnceLock;

use chrono::{DateTime, SecondsFormat, Utc};
use elevia_core::{AppError, AppResult};
use regex::Regex;

use crate::eligibility::ActivationType;
use crate::iam::IamCondition;

/// Reserved title of provisioned activation bindings.
pub const ACTIVATION_CONDITION_TITLE: &str = "JIT access activation";

const SELF_APPROVAL_MARKER: &str = "has({}.jitAccessConstraint)";
const PEER_APPROVAL_MARKER: &str = "has({}.multiPartyApprovalConstraint)";

fn marker_matches(condition: Option<&IamCondition>, marker: &str) -> bool {
    condition
        .map(|condition| condition.expression.trim().eq_ignore_ascii_case(marker))
        .unwrap_or(false)
}

/// Returns whether the condition is the self-approval eligibility marker.
#[must_use]
pub fn is_self_approval_constraint(condition: Option<&IamCondition>) -> bool {
    marker_matches(condition, SELF_APPROVAL_MARKER)
}

/// Returns whether the condition is the peer-approval eligibility marker.
#[must_use]
pub fn is_peer_approval_constraint(condition: Option<&IamCondition>) -> bool {
    marker_matches(condition, PEER_APPROVAL_MARKER)
}

/// Returns the activation type an eligibility marker stands for, if the
/// condition is a recognized marker.
#[must_use]
pub fn eligibility_constraint_type(condition: Option<&IamCondition>) -> Option<ActivationType> {
    if is_self_approval_constraint(condition) {
        Some(ActivationType::SelfApproval)
    } else if is_peer_approval_constraint(condition) {
        Some(ActivationType::PeerApproval)
    } else {
        None
    }
}

/// Returns whether the condition is an activation condition written by
/// the engine: reserved title plus a temporary-access window expression.
#[must_use]
pub fn is_activation_condition(condition: Option<&IamCondition>) -> bool {
    condition
        .map(|condition| {
            condition.title.as_deref() == Some(ACTIVATION_CONDITION_TITLE)
                && TemporaryAccessCondition::parse(&condition.expression).is_some()
        })
        .unwrap_or(false)
}

/// The half-open activation window `[start, end)` expressed as the
/// standard temporary-access CEL predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporaryAccessCondition {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TemporaryAccessCondition {
    /// Creates a window; the end must be after the start.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<Self> {
        if end <= start {
            return Err(AppError::InvalidArgument(format!(
                "activation window end '{end}' must be after start '{start}'"
            )));
        }

        Ok(Self { start, end })
    }

    /// Returns the inclusive window start.
    #[must_use]
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Returns the exclusive window end.
    #[must_use]
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Renders the CEL expression for this window.
    #[must_use]
    pub fn to_expression(&self) -> String {
        format!(
            "(request.time >= timestamp(\"{}\") && request.time < timestamp(\"{}\"))",
            self.start.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.end.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }

    /// Parses a temporary-access window expression, returning `None` for
    /// anything that is not exactly a window predicate.
    #[must_use]
    pub fn parse(expression: &str) -> Option<Self> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN.get_or_init(|| {
            Regex::new(
                r#"(?i)^\s*\(request\.time >= timestamp\("([^"]+)"\) && request\.time < timestamp\("([^"]+)"\)\)\s*$"#,
            )
            .expect("window expression pattern is valid")
        });

        let captures = pattern.captures(expression)?;
        let start = DateTime::parse_from_rfc3339(&captures[1]).ok()?;
        let end = DateTime::parse_from_rfc3339(&captures[2]).ok()?;

        Self::new(start.with_timezone(&Utc), end.with_timezone(&Utc)).ok()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{
        eligibility_constraint_type, is_activation_condition, is_peer_approval_constraint,
        is_self_approval_constraint, TemporaryAccessCondition, ACTIVATION_CONDITION_TITLE,
    };
    use crate::eligibility::ActivationType;
    use crate::iam::IamCondition;

    fn condition(title: Option<&str>, expression: &str) -> IamCondition {
        IamCondition {
            title: title.map(str::to_owned),
            description: None,
            expression: expression.to_owned(),
        }
    }

    #[test]
    fn markers_are_recognized_case_insensitively() {
        let self_approval = condition(None, "  has({}.JitAccessConstraint) ");
        assert!(is_self_approval_constraint(Some(&self_approval)));

        let peer_approval = condition(None, "has({}.multiPartyApprovalconstraint)");
        assert!(is_peer_approval_constraint(Some(&peer_approval)));

        assert_eq!(
            eligibility_constraint_type(Some(&peer_approval)),
            Some(ActivationType::PeerApproval)
        );
    }

    #[test]
    fn marker_with_extra_clauses_is_not_recognized() {
        let narrowed = condition(
            None,
            "has({}.jitAccessConstraint) && resource.name=='X'",
        );
        assert!(!is_self_approval_constraint(Some(&narrowed)));
        assert_eq!(eligibility_constraint_type(Some(&narrowed)), None);
    }

    #[test]
    fn missing_condition_is_not_a_marker() {
        assert!(!is_self_approval_constraint(None));
        assert!(!is_peer_approval_constraint(None));
        assert!(!is_activation_condition(None));
    }

    #[test]
    fn window_expression_roundtrip() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let window = TemporaryAccessCondition::new(start, start + Duration::minutes(30))
            .expect("valid window");

        let expression = window.to_expression();
        assert_eq!(
            expression,
            "(request.time >= timestamp(\"2024-03-01T09:00:00Z\") \
             && request.time < timestamp(\"2024-03-01T09:30:00Z\"))"
        );

        let parsed = TemporaryAccessCondition::parse(&expression).expect("parsable window");
        assert_eq!(parsed, window);
    }

    #[test]
    fn activation_condition_requires_title_and_window() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let window = TemporaryAccessCondition::new(start, start + Duration::minutes(10))
            .expect("valid window");

        let activation = condition(Some(ACTIVATION_CONDITION_TITLE), &window.to_expression());
        assert!(is_activation_condition(Some(&activation)));

        let wrong_title = condition(Some("some other title"), &window.to_expression());
        assert!(!is_activation_condition(Some(&wrong_title)));

        let wrong_expression = condition(Some(ACTIVATION_CONDITION_TITLE), "request.time > 0");
        assert!(!is_activation_condition(Some(&wrong_expression)));
    }

    #[test]
    fn inverted_window_is_rejected() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        assert!(TemporaryAccessCondition::new(start, start).is_err());
    }
}
