use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use elevia_core::{AppError, AppResult};
use elevia_domain::{
    ActivationRequest, ActivationType, Eligibility, EligibilityStatus, IamBinding, IamCondition,
    JitRequest, MpaRequest, ProjectId, RoleBinding, UserId,
};

use crate::config::{CatalogOptions, Scope};
use crate::eligibility_service::EligibilityService;
use crate::ports::{
    AccessControlList, AnalysisResult, ConditionEvaluation, PolicyAnalysis, PolicyAnalysisClient,
    ProjectSearchClient,
};

use super::RoleCatalogService;

const SELF_APPROVAL_CONDITION: &str = "has({}.jitAccessConstraint)";
const PEER_APPROVAL_CONDITION: &str = "has({}.multiPartyApprovalConstraint)";

#[derive(Default)]
struct FakePolicyAnalysisClient {
    accessible_resources: PolicyAnalysis,
    permissioned_principals: PolicyAnalysis,
}

#[async_trait]
impl PolicyAnalysisClient for FakePolicyAnalysisClient {
    async fn find_accessible_resources_by_user(
        &self,
        _scope: &Scope,
        _user: &UserId,
        _permission_filter: Option<&str>,
        _resource_filter: Option<&str>,
        _expand_resources: bool,
    ) -> AppResult<PolicyAnalysis> {
        Ok(self.accessible_resources.clone())
    }

    async fn find_permissioned_principals_by_resource(
        &self,
        _scope: &Scope,
        _full_resource_name: &str,
        _role: &str,
    ) -> AppResult<PolicyAnalysis> {
        Ok(self.permissioned_principals.clone())
    }
}

#[derive(Default)]
struct FakeProjectSearchClient {
    projects: BTreeSet<ProjectId>,
}

#[async_trait]
impl ProjectSearchClient for FakeProjectSearchClient {
    async fn search_project_ids(&self, _query: &str) -> AppResult<BTreeSet<ProjectId>> {
        Ok(self.projects.clone())
    }
}

fn project() -> ProjectId {
    ProjectId::new("project-1").expect("valid project")
}

fn alice() -> UserId {
    UserId::from_email("alice@example.com").expect("valid user")
}

fn bob() -> UserId {
    UserId::from_email("bob@example.com").expect("valid user")
}

fn viewer_binding() -> RoleBinding {
    RoleBinding::for_project(&project(), "roles/viewer")
}

fn marker_result(expression: &str) -> AnalysisResult {
    AnalysisResult {
        binding: Some(IamBinding {
            role: "roles/viewer".to_owned(),
            members: vec!["user:alice@example.com".to_owned()],
            condition: Some(IamCondition {
                title: None,
                description: None,
                expression: expression.to_owned(),
            }),
        }),
        access_control_lists: vec![AccessControlList {
            resources: vec![project().full_resource_name()],
            condition_evaluation: Some(ConditionEvaluation::Conditional),
        }],
        identities: vec![
            "user:alice@example.com".to_owned(),
            "user:bob@example.com".to_owned(),
            "user:carol@example.com".to_owned(),
        ],
    }
}

fn options(project_query: Option<&str>) -> CatalogOptions {
    CatalogOptions::new(
        Scope::new("organizations/0").expect("valid scope"),
        project_query.map(str::to_owned),
        Duration::minutes(5),
        Duration::minutes(60),
        1,
        2,
        3,
    )
    .expect("valid options")
}

fn catalog_with(
    analysis_client: FakePolicyAnalysisClient,
    search_client: FakeProjectSearchClient,
    options: CatalogOptions,
) -> RoleCatalogService {
    let eligibility = EligibilityService::new(
        Arc::new(analysis_client),
        Scope::new("organizations/0").expect("valid scope"),
    );
    RoleCatalogService::new(Arc::new(eligibility), Arc::new(search_client), options)
}

fn mpa_request(reviewers: BTreeSet<UserId>, duration: Duration) -> MpaRequest {
    MpaRequest::new(
        alice(),
        viewer_binding(),
        reviewers,
        "bug #7",
        Utc::now(),
        duration,
    )
    .expect("valid request")
}

fn jit_request(roles: &[&str], duration: Duration) -> JitRequest {
    let entitlements = roles
        .iter()
        .map(|role| RoleBinding::for_project(&project(), *role))
        .collect();
    JitRequest::new(alice(), entitlements, "bug #7", Utc::now(), duration)
        .expect("valid request")
}

#[tokio::test]
async fn list_projects_uses_search_when_query_configured() {
    let catalog = catalog_with(
        FakePolicyAnalysisClient::default(),
        FakeProjectSearchClient {
            projects: BTreeSet::from([project()]),
        },
        options(Some("state:ACTIVE")),
    );

    let projects = catalog.list_projects(&alice()).await.expect("search works");
    assert_eq!(projects, BTreeSet::from([project()]));
}

#[tokio::test]
async fn list_projects_uses_analyzer_without_query() {
    let catalog = catalog_with(
        FakePolicyAnalysisClient {
            accessible_resources: PolicyAnalysis {
                results: vec![marker_result(SELF_APPROVAL_CONDITION)],
                non_critical_errors: Vec::new(),
            },
            ..FakePolicyAnalysisClient::default()
        },
        FakeProjectSearchClient {
            projects: BTreeSet::from([ProjectId::new("search-only").expect("valid project")]),
        },
        options(None),
    );

    let projects = catalog.list_projects(&alice()).await.expect("sweep works");
    assert_eq!(projects, BTreeSet::from([project()]));
}

#[tokio::test]
async fn list_eligibilities_covers_all_types_and_statuses() {
    let catalog = catalog_with(
        FakePolicyAnalysisClient {
            accessible_resources: PolicyAnalysis {
                results: vec![marker_result(PEER_APPROVAL_CONDITION)],
                non_critical_errors: Vec::new(),
            },
            ..FakePolicyAnalysisClient::default()
        },
        FakeProjectSearchClient::default(),
        options(None),
    );

    let set = catalog
        .list_eligibilities(&alice(), &project())
        .await
        .expect("analysis succeeds");
    assert_eq!(set.items().len(), 1);
    assert_eq!(
        set.items().iter().next().expect("one entry").activation_type(),
        ActivationType::PeerApproval
    );
}

#[tokio::test]
async fn list_reviewers_excludes_the_requesting_user() {
    let catalog = catalog_with(
        FakePolicyAnalysisClient {
            accessible_resources: PolicyAnalysis {
                results: vec![marker_result(PEER_APPROVAL_CONDITION)],
                non_critical_errors: Vec::new(),
            },
            permissioned_principals: PolicyAnalysis {
                results: vec![marker_result(PEER_APPROVAL_CONDITION)],
                non_critical_errors: Vec::new(),
            },
        },
        FakeProjectSearchClient::default(),
        options(None),
    );

    let eligibility = Eligibility::new(
        viewer_binding(),
        ActivationType::PeerApproval,
        EligibilityStatus::Available,
    );
    let reviewers = catalog
        .list_reviewers(&alice(), &eligibility)
        .await
        .expect("caller is eligible");

    assert!(!reviewers.contains(&alice()));
    assert_eq!(
        reviewers,
        BTreeSet::from([
            bob(),
            UserId::from_email("carol@example.com").expect("valid user"),
        ])
    );
}

#[tokio::test]
async fn list_reviewers_requires_the_same_eligibility() {
    let catalog = catalog_with(
        FakePolicyAnalysisClient::default(),
        FakeProjectSearchClient::default(),
        options(None),
    );

    let eligibility = Eligibility::new(
        viewer_binding(),
        ActivationType::PeerApproval,
        EligibilityStatus::Available,
    );
    let error = catalog
        .list_reviewers(&alice(), &eligibility)
        .await
        .expect_err("caller is not eligible");
    assert!(matches!(error, AppError::AccessDenied(_)));
}

#[tokio::test]
async fn duration_bounds_are_inclusive() {
    let catalog = catalog_with(
        FakePolicyAnalysisClient::default(),
        FakeProjectSearchClient::default(),
        options(None),
    );

    for minutes in [5, 60] {
        let request = ActivationRequest::Mpa(mpa_request(
            BTreeSet::from([bob()]),
            Duration::minutes(minutes),
        ));
        assert!(catalog.validate_request(&request).is_ok());
    }

    for minutes in [4, 61] {
        let request = ActivationRequest::Mpa(mpa_request(
            BTreeSet::from([bob()]),
            Duration::minutes(minutes),
        ));
        let error = catalog
            .validate_request(&request)
            .expect_err("out of bounds");
        assert!(matches!(error, AppError::InvalidArgument(_)));
    }
}

#[tokio::test]
async fn reviewer_bounds_are_inclusive() {
    let catalog = catalog_with(
        FakePolicyAnalysisClient::default(),
        FakeProjectSearchClient::default(),
        options(None),
    );

    let carol = UserId::from_email("carol@example.com").expect("valid user");
    let dave = UserId::from_email("dave@example.com").expect("valid user");

    for reviewers in [
        BTreeSet::from([bob()]),
        BTreeSet::from([bob(), carol.clone()]),
    ] {
        let request = ActivationRequest::Mpa(mpa_request(reviewers, Duration::minutes(10)));
        assert!(catalog.validate_request(&request).is_ok());
    }

    let request = ActivationRequest::Mpa(mpa_request(
        BTreeSet::from([bob(), carol, dave]),
        Duration::minutes(10),
    ));
    assert!(catalog.validate_request(&request).is_err());
}

#[tokio::test]
async fn jit_batch_size_is_bounded() {
    let catalog = catalog_with(
        FakePolicyAnalysisClient::default(),
        FakeProjectSearchClient::default(),
        options(None),
    );

    let request = ActivationRequest::Jit(jit_request(
        &["roles/a", "roles/b", "roles/c"],
        Duration::minutes(10),
    ));
    assert!(catalog.validate_request(&request).is_ok());

    let request = ActivationRequest::Jit(jit_request(
        &["roles/a", "roles/b", "roles/c", "roles/d"],
        Duration::minutes(10),
    ));
    assert!(catalog.validate_request(&request).is_err());
}

#[tokio::test]
async fn verify_user_can_request_denies_without_eligibility() {
    let catalog = catalog_with(
        FakePolicyAnalysisClient::default(),
        FakeProjectSearchClient::default(),
        options(None),
    );

    let request =
        ActivationRequest::Mpa(mpa_request(BTreeSet::from([bob()]), Duration::minutes(10)));
    let error = catalog
        .verify_user_can_request(&request)
        .await
        .expect_err("not eligible");

    match error {
        AppError::AccessDenied(message) => assert!(message.contains("roles/viewer")),
        other => panic!("expected AccessDenied, got {other:?}"),
    }
}

#[tokio::test]
async fn verify_user_can_request_accepts_matching_eligibility() {
    let catalog = catalog_with(
        FakePolicyAnalysisClient {
            accessible_resources: PolicyAnalysis {
                results: vec![marker_result(PEER_APPROVAL_CONDITION)],
                non_critical_errors: Vec::new(),
            },
            ..FakePolicyAnalysisClient::default()
        },
        FakeProjectSearchClient::default(),
        options(None),
    );

    let request =
        ActivationRequest::Mpa(mpa_request(BTreeSet::from([bob()]), Duration::minutes(10)));
    assert!(catalog.verify_user_can_request(&request).await.is_ok());
}

#[tokio::test]
async fn verify_user_can_approve_requires_listed_reviewer_and_holder() {
    let catalog = catalog_with(
        FakePolicyAnalysisClient {
            permissioned_principals: PolicyAnalysis {
                results: vec![marker_result(PEER_APPROVAL_CONDITION)],
                non_critical_errors: Vec::new(),
            },
            ..FakePolicyAnalysisClient::default()
        },
        FakeProjectSearchClient::default(),
        options(None),
    );

    let request = mpa_request(BTreeSet::from([bob()]), Duration::minutes(10));
    assert!(catalog.verify_user_can_approve(&bob(), &request).await.is_ok());

    // carol holds the eligibility but is not on the reviewer list
    let carol = UserId::from_email("carol@example.com").expect("valid user");
    let error = catalog
        .verify_user_can_approve(&carol, &request)
        .await
        .expect_err("not a listed reviewer");
    assert!(matches!(error, AppError::AccessDenied(_)));

    // dave is listed but holds no reviewer eligibility
    let dave = UserId::from_email("dave@example.com").expect("valid user");
    let request = mpa_request(BTreeSet::from([dave.clone()]), Duration::minutes(10));
    let error = catalog
        .verify_user_can_approve(&dave, &request)
        .await
        .expect_err("not an eligibility holder");
    assert!(matches!(error, AppError::AccessDenied(_)));
}
