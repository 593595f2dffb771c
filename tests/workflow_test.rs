mod common;

use chrono::NaiveDate;
use orgserver::review::{
    create_review, get_available_actions, update_review, workflow_action, CreateReviewRequest,
    ReviewState, UpdateReviewRequest, WorkflowAction,
};
use orgserver::OrgError;

use common::{admin, company, employee_user, hire, manager, state};

fn request(employee: uuid::Uuid, reviewer: uuid::Uuid) -> CreateReviewRequest {
    CreateReviewRequest {
        employee,
        reviewer,
        review_period_start: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        review_period_end: NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
        review_date: None,
        feedback: None,
        overall_rating: None,
        submitted_for_approval: false,
        goals_achievements: None,
        areas_for_improvement: None,
        development_plan: None,
        workflow_state: None,
    }
}

#[test]
fn test_full_review_cycle_with_rejection() {
    let state = state();
    let acme = company(&state, "Acme");
    let ana = hire(&state, acme, "ana@acme.test");
    let boss = hire(&state, acme, "boss@acme.test");
    let mgr = manager(acme, "boss@acme.test");

    let created = create_review(&state, &admin(), request(ana.id, boss.id)).unwrap();
    let id = created.review.id;
    assert_eq!(created.review.workflow_state, ReviewState::PendingReview);

    let scheduled = workflow_action(&state, &mgr, id, "Schedule Review").unwrap();
    assert_eq!(scheduled.review.workflow_state, ReviewState::ReviewScheduled);

    let with_feedback = update_review(
        &state,
        &mgr,
        id,
        UpdateReviewRequest {
            feedback: Some("Solid first half".into()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(
        with_feedback.review.workflow_state,
        ReviewState::FeedbackProvided
    );
    assert_eq!(
        with_feedback.notices,
        vec!["Workflow automatically transitioned to: Feedback Provided".to_string()]
    );

    let submitted = workflow_action(&state, &mgr, id, "Submit for Approval").unwrap();
    assert_eq!(submitted.review.workflow_state, ReviewState::UnderApproval);
    assert!(submitted.review.submitted_for_approval);

    let rejected = workflow_action(&state, &admin(), id, "Reject Review").unwrap();
    assert_eq!(rejected.review.workflow_state, ReviewState::ReviewRejected);
    assert!(!rejected.review.submitted_for_approval);

    let untouched = update_review(&state, &mgr, id, UpdateReviewRequest::default()).unwrap();
    assert_eq!(untouched.review.workflow_state, ReviewState::ReviewRejected);

    let revised = update_review(
        &state,
        &mgr,
        id,
        UpdateReviewRequest {
            development_plan: Some("Mentor a new hire".into()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(revised.review.workflow_state, ReviewState::FeedbackProvided);
}

#[test]
fn test_available_actions_follow_roles() {
    let state = state();
    let acme = company(&state, "Acme");
    let ana = hire(&state, acme, "ana@acme.test");
    let boss = hire(&state, acme, "boss@acme.test");
    let created = create_review(&state, &admin(), request(ana.id, boss.id)).unwrap();

    let mgr = manager(acme, "boss@acme.test");
    assert_eq!(
        get_available_actions(&state, &mgr, created.review.id).unwrap(),
        vec![WorkflowAction::ScheduleReview]
    );

    let viewer = employee_user(acme, "ana@acme.test");
    assert!(get_available_actions(&state, &viewer, created.review.id)
        .unwrap()
        .is_empty());
}

#[test]
fn test_manual_action_from_wrong_state_is_rejected() {
    let state = state();
    let acme = company(&state, "Acme");
    let ana = hire(&state, acme, "ana@acme.test");
    let boss = hire(&state, acme, "boss@acme.test");
    let created = create_review(&state, &admin(), request(ana.id, boss.id)).unwrap();

    let err = workflow_action(
        &state,
        &manager(acme, "boss@acme.test"),
        created.review.id,
        "Update Feedback",
    )
    .unwrap_err();
    assert!(matches!(err, OrgError::InvalidTransition(_)));
}

#[test]
fn test_other_company_cannot_act_on_review() {
    let state = state();
    let acme = company(&state, "Acme");
    let globex = company(&state, "Globex");
    let ana = hire(&state, acme, "ana@acme.test");
    let boss = hire(&state, acme, "boss@acme.test");
    let created = create_review(&state, &admin(), request(ana.id, boss.id)).unwrap();

    let err = workflow_action(
        &state,
        &manager(globex, "m@globex.test"),
        created.review.id,
        "Schedule Review",
    )
    .unwrap_err();
    assert!(matches!(err, OrgError::Permission(_)));
}
