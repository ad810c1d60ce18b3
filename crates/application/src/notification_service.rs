use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use elevia_core::AppResult;
use elevia_domain::{JitRequest, MpaRequest, UserId};
use tracing::{info, warn};

use crate::config::NotificationOptions;
use crate::ports::MailTransport;

/// The notification kinds the state machine emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationType {
    /// A peer-approval request is pending review.
    RequestActivation,
    /// A peer-approval request was approved.
    ActivationApproved,
    /// A self-approval request was activated.
    ActivationSelfApproved,
}

impl NotificationType {
    /// Returns a stable transport value for this notification type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestActivation => "RequestActivation",
            Self::ActivationApproved => "ActivationApproved",
            Self::ActivationSelfApproved => "ActivationSelfApproved",
        }
    }
}

/// A templated message to reviewers or beneficiaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    notification_type: NotificationType,
    recipients: BTreeSet<UserId>,
    cc_recipients: BTreeSet<UserId>,
    subject: String,
    reply: bool,
    properties: BTreeMap<String, String>,
}

impl Notification {
    /// Builds the notification for a pending peer-approval request:
    /// to the reviewers, beneficiary in copy.
    pub fn request_activation(
        request: &MpaRequest,
        request_expiry: DateTime<Utc>,
        action_url: &str,
    ) -> AppResult<Self> {
        let project = request.entitlement().project_id()?;
        let subject = format!(
            "{} requests access to project {}",
            request.requesting_user().email(),
            project
        );

        let mut properties = common_properties(
            request.requesting_user(),
            &project.to_string(),
            request.entitlement().role(),
            request.justification(),
            request.start_time(),
            request.end_time(),
        );
        properties.insert("REVIEWERS".to_owned(), join_reviewers(request.reviewers()));
        properties.insert(
            "REQUEST_EXPIRY_TIME".to_owned(),
            format_time(request_expiry),
        );
        properties.insert("ACTION_URL".to_owned(), action_url.to_owned());
        properties.insert("SUBJECT".to_owned(), subject.clone());

        Ok(Self {
            notification_type: NotificationType::RequestActivation,
            recipients: request.reviewers().clone(),
            cc_recipients: BTreeSet::from([request.requesting_user().clone()]),
            subject,
            reply: false,
            properties,
        })
    }

    /// Builds the notification for a granted approval: to the
    /// beneficiary, reviewers in copy, marked as a reply.
    pub fn activation_approved(request: &MpaRequest, approver: &UserId) -> AppResult<Self> {
        let project = request.entitlement().project_id()?;
        let subject = format!(
            "{} requests access to project {}",
            request.requesting_user().email(),
            project
        );

        let mut properties = common_properties(
            request.requesting_user(),
            &project.to_string(),
            request.entitlement().role(),
            request.justification(),
            request.start_time(),
            request.end_time(),
        );
        properties.insert("APPROVER".to_owned(), approver.email().to_owned());
        properties.insert("REVIEWERS".to_owned(), join_reviewers(request.reviewers()));
        properties.insert("SUBJECT".to_owned(), subject.clone());

        Ok(Self {
            notification_type: NotificationType::ActivationApproved,
            recipients: BTreeSet::from([request.requesting_user().clone()]),
            cc_recipients: request.reviewers().clone(),
            subject,
            reply: true,
            properties,
        })
    }

    /// Builds the notification for a completed self-approval: to the
    /// beneficiary, marked as a reply.
    pub fn activation_self_approved(request: &JitRequest) -> AppResult<Self> {
        let first = request.entitlements().iter().next().ok_or_else(|| {
            elevia_core::AppError::Internal(
                "a self-approval request carries at least one entitlement".to_owned(),
            )
        })?;
        let project = first.project_id()?;

        let roles = request
            .entitlements()
            .iter()
            .map(|binding| format!("'{}'", binding.role()))
            .collect::<Vec<_>>()
            .join(", ");
        let subject = format!("Activated roles {roles} on '{project}'");

        let mut properties = common_properties(
            request.requesting_user(),
            &project.to_string(),
            first.role(),
            request.justification(),
            request.start_time(),
            request.end_time(),
        );
        properties.insert(
            "ROLES".to_owned(),
            request
                .entitlements()
                .iter()
                .map(|binding| binding.role().to_owned())
                .collect::<Vec<_>>()
                .join(", "),
        );
        properties.insert("SUBJECT".to_owned(), subject.clone());

        Ok(Self {
            notification_type: NotificationType::ActivationSelfApproved,
            recipients: BTreeSet::from([request.requesting_user().clone()]),
            cc_recipients: BTreeSet::new(),
            subject,
            reply: true,
            properties,
        })
    }

    /// Returns the notification type.
    #[must_use]
    pub fn notification_type(&self) -> NotificationType {
        self.notification_type
    }

    /// Returns the primary recipients.
    #[must_use]
    pub fn recipients(&self) -> &BTreeSet<UserId> {
        &self.recipients
    }

    /// Returns the copied recipients.
    #[must_use]
    pub fn cc_recipients(&self) -> &BTreeSet<UserId> {
        &self.cc_recipients
    }

    /// Returns the subject line.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_str()
    }

    /// Returns whether the message is a reply in an existing exchange.
    #[must_use]
    pub fn is_reply(&self) -> bool {
        self.reply
    }

    /// Returns the template properties.
    #[must_use]
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }
}

fn common_properties(
    beneficiary: &UserId,
    project: &str,
    role: &str,
    justification: &str,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("BENEFICIARY".to_owned(), beneficiary.email().to_owned()),
        ("PROJECT_ID".to_owned(), project.to_owned()),
        ("ROLE".to_owned(), role.to_owned()),
        ("JUSTIFICATION".to_owned(), justification.to_owned()),
        ("START_TIME".to_owned(), format_time(start_time)),
        ("END_TIME".to_owned(), format_time(end_time)),
    ])
}

fn join_reviewers(reviewers: &BTreeSet<UserId>) -> String {
    reviewers
        .iter()
        .map(|reviewer| reviewer.email().to_owned())
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_time(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Renders notifications into the configured HTML template and delivers
/// them once per functional transport.
pub struct NotificationService {
    transports: Vec<Arc<dyn MailTransport>>,
    template: String,
    options: NotificationOptions,
}

impl NotificationService {
    /// Creates the notification engine.
    #[must_use]
    pub fn new(
        transports: Vec<Arc<dyn MailTransport>>,
        template: impl Into<String>,
        options: NotificationOptions,
    ) -> Self {
        Self {
            transports,
            template: template.into(),
            options,
        }
    }

    /// Returns the HTML template shipped with the crate.
    #[must_use]
    pub fn default_template() -> &'static str {
        include_str!("../assets/approval.email.html")
    }

    /// Returns whether at least one transport can currently deliver.
    #[must_use]
    pub fn can_send_notifications(&self) -> bool {
        self.options.enable_email
            && self.transports.iter().any(|transport| transport.can_send())
    }

    /// Delivers a notification.
    ///
    /// Transport failures are isolated: a failing transport is logged
    /// and the remaining ones still get their attempt; the call itself
    /// does not fail over delivery problems.
    pub async fn send(&self, notification: &Notification) -> AppResult<()> {
        if !self.options.enable_email {
            info!(
                notification_type = notification.notification_type().as_str(),
                to = %join_reviewers(notification.recipients()),
                cc = %join_reviewers(notification.cc_recipients()),
                subject = notification.subject(),
                properties = ?notification.properties(),
                "email is disabled, logging notification instead"
            );
            return Ok(());
        }

        let body = render_template(&self.template, notification);
        let to: Vec<String> = notification
            .recipients()
            .iter()
            .map(|recipient| recipient.email().to_owned())
            .collect();
        let cc: Vec<String> = notification
            .cc_recipients()
            .iter()
            .map(|recipient| recipient.email().to_owned())
            .collect();

        let mut delivered = 0_usize;
        for transport in &self.transports {
            if !transport.can_send() {
                continue;
            }

            match transport
                .send_mail(
                    &to,
                    &cc,
                    notification.subject(),
                    &body,
                    notification.is_reply(),
                )
                .await
            {
                Ok(()) => delivered += 1,
                Err(error) => {
                    warn!(
                        notification_type = notification.notification_type().as_str(),
                        error = %error,
                        "a mail transport failed to deliver the notification"
                    );
                }
            }
        }

        if delivered == 0 && !self.transports.is_empty() {
            warn!(
                notification_type = notification.notification_type().as_str(),
                "no transport delivered the notification"
            );
        }

        Ok(())
    }
}

/// Substitutes `{{KEY}}` placeholders with HTML-escaped property
/// values. Placeholders without a property are left untouched.
fn render_template(template: &str, notification: &Notification) -> String {
    let mut rendered = template.to_owned();
    for (key, value) in notification.properties() {
        rendered = rendered.replace(&format!("{{{{{key}}}}}"), &html_escape(value));
    }

    rendered
}

fn html_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for character in value.chars() {
        match character {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }

    escaped
}
