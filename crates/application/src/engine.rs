use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use elevia_core::AppResult;
use elevia_domain::{
    Activation, ActivationRequest, Eligibility, EligibilitySet, JitRequest, MpaRequest, ProjectId,
    RoleBinding, UserId,
};
use tracing::warn;

use crate::activation_service::ActivationService;
use crate::catalog_service::RoleCatalogService;
use crate::notification_service::{Notification, NotificationService};
use crate::token_service::{TokenService, TokenWithExpiry};

/// The process-wide composition of the engine: catalog queries, the
/// activation state machine, token handling, and notifications.
///
/// The engine is immutable after construction and stateless per
/// request; the REST façade and other collaborators call straight into
/// it.
pub struct AccessEngine {
    catalog: Arc<RoleCatalogService>,
    activator: Arc<ActivationService>,
    tokens: Arc<TokenService>,
    notifications: Arc<NotificationService>,
}

impl AccessEngine {
    /// Composes the engine from its services.
    #[must_use]
    pub fn new(
        catalog: Arc<RoleCatalogService>,
        activator: Arc<ActivationService>,
        tokens: Arc<TokenService>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            catalog,
            activator,
            tokens,
            notifications,
        }
    }

    /// Lists the projects the user can request access to.
    pub async fn list_projects(&self, user: &UserId) -> AppResult<BTreeSet<ProjectId>> {
        self.catalog.list_projects(user).await
    }

    /// Lists the user's eligibilities on a project.
    pub async fn list_eligibilities(
        &self,
        user: &UserId,
        project: &ProjectId,
    ) -> AppResult<EligibilitySet> {
        self.catalog.list_eligibilities(user, project).await
    }

    /// Lists the candidate reviewers for an eligibility.
    pub async fn list_reviewers(
        &self,
        requesting_user: &UserId,
        eligibility: &Eligibility,
    ) -> AppResult<BTreeSet<UserId>> {
        self.catalog
            .list_reviewers(requesting_user, eligibility)
            .await
    }

    /// Creates a self-approval request.
    pub fn create_jit_request(
        &self,
        requesting_user: UserId,
        entitlements: BTreeSet<RoleBinding>,
        justification: impl Into<String>,
        start_time: DateTime<Utc>,
        duration: Duration,
    ) -> AppResult<JitRequest> {
        self.activator.create_jit_request(
            requesting_user,
            entitlements,
            justification,
            start_time,
            duration,
        )
    }

    /// Creates a peer-approval request.
    pub async fn create_mpa_request(
        &self,
        requesting_user: UserId,
        entitlement: RoleBinding,
        reviewers: BTreeSet<UserId>,
        justification: impl Into<String>,
        start_time: DateTime<Utc>,
        duration: Duration,
    ) -> AppResult<MpaRequest> {
        self.activator
            .create_mpa_request(
                requesting_user,
                entitlement,
                reviewers,
                justification,
                start_time,
                duration,
            )
            .await
    }

    /// Activates a self-approval request and notifies the beneficiary.
    pub async fn activate(&self, request: &JitRequest) -> AppResult<Activation> {
        let activation = self.activator.activate(request).await?;
        self.notify(Notification::activation_self_approved(request))
            .await;

        Ok(activation)
    }

    /// Approves a verified peer-approval request and notifies the
    /// beneficiary, reviewers in copy.
    pub async fn approve(
        &self,
        approver: &UserId,
        request: &MpaRequest,
    ) -> AppResult<Activation> {
        let activation = self.activator.approve(approver, request).await?;
        self.notify(Notification::activation_approved(request, approver))
            .await;

        Ok(activation)
    }

    /// Signs a peer-approval request into an activation token and
    /// notifies the reviewers, beneficiary in copy.
    ///
    /// `action_link` turns the raw token into the URL reviewers follow;
    /// it is supplied by the caller so that the obfuscation transform
    /// applied before embedding stays outside the engine.
    pub async fn sign_token<F>(
        &self,
        request: &MpaRequest,
        action_link: F,
    ) -> AppResult<TokenWithExpiry>
    where
        F: FnOnce(&str) -> String,
    {
        let token = self.tokens.sign(request).await?;
        let action_url = action_link(token.token());
        self.notify(Notification::request_activation(
            request,
            token.expires_at(),
            &action_url,
        ))
        .await;

        Ok(token)
    }

    /// Verifies an activation token back into a peer-approval request.
    pub async fn verify_token(&self, token: &str) -> AppResult<MpaRequest> {
        self.tokens.verify(token).await
    }

    /// Re-verifies that the requesting user still qualifies for the
    /// request.
    pub async fn verify_user_can_request(&self, request: &ActivationRequest) -> AppResult<()> {
        self.catalog.verify_user_can_request(request).await
    }

    /// Verifies that the approver may approve the request.
    pub async fn verify_user_can_approve(
        &self,
        approver: &UserId,
        request: &MpaRequest,
    ) -> AppResult<()> {
        self.catalog.verify_user_can_approve(approver, request).await
    }

    async fn notify(&self, notification: AppResult<Notification>) {
        // Notification problems never fail the transition they follow.
        match notification {
            Ok(notification) => {
                if let Err(error) = self.notifications.send(&notification).await {
                    warn!(error = %error, "failed to dispatch notification");
                }
            }
            Err(error) => {
                warn!(error = %error, "failed to build notification");
            }
        }
    }
}
