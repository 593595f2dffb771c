//! Performance reviews and their approval workflow.

pub mod handlers;
pub mod types;
pub mod workflow;

use chrono::Utc;
use log::info;
use uuid::Uuid;

use crate::core::audit;
use crate::core::error::{OrgError, OrgResult};
use crate::core::shared::models::RecordType;
use crate::core::shared::state::AppState;
use crate::core::store::{Filter, Repository};
use crate::employee::{self, Employee};
use crate::security::{ensure_company_access, Caller, Operation, Scope};

pub use handlers::configure_review_routes;
pub use types::{
    CreateReviewRequest, DocStatus, PerformanceReview, Rating, ReviewQuery, ReviewState,
    UpdateReviewRequest, WorkflowActionRequest,
};
pub use workflow::{available_actions, WorkflowAction};

/// A persisted review plus the workflow notices raised while saving it.
#[derive(Debug, Clone)]
pub struct SavedReview {
    pub review: PerformanceReview,
    pub notices: Vec<String>,
}

fn reject_state_override(value: &Option<serde_json::Value>) -> OrgResult<()> {
    match value {
        Some(v) if !v.is_null() => Err(OrgError::Validation(
            "workflow_state can only change through workflow actions".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Company of the reviewed employee.
fn review_company(repo: &Repository, review: &PerformanceReview) -> OrgResult<Option<Uuid>> {
    Ok(repo.get::<Employee>(review.employee)?.map(|e| e.company))
}

fn validate(state: &AppState, review: &PerformanceReview) -> OrgResult<()> {
    state.repo.link::<Employee>(review.employee)?;
    state.repo.link::<Employee>(review.reviewer)?;
    Ok(())
}

/// Persists `review`, first applying automatic transitions unless the save is
/// driven by a manual workflow action.
fn save(
    state: &AppState,
    review: &mut PerformanceReview,
    previous: Option<&PerformanceReview>,
    via_manual_action: bool,
) -> OrgResult<Vec<String>> {
    validate(state, review)?;

    let mut notices = Vec::new();
    if !via_manual_action {
        let from = review.workflow_state;
        for entered in workflow::apply_automatic_transitions(review, previous) {
            info!(
                "Review {} automatically transitioned to {}",
                review.id, entered
            );
            notices.push(format!("Workflow automatically transitioned to: {entered}"));
        }
        if review.workflow_state != from {
            audit::log_workflow_action(
                "system",
                review.id,
                "automatic",
                from.as_str(),
                review.workflow_state.as_str(),
            );
        }
    }

    review.updated_at = Utc::now();
    match previous {
        None => state.repo.insert(review)?,
        Some(_) => state.repo.update(review)?,
    }
    Ok(notices)
}

fn fetch_accessible(state: &AppState, caller: &Caller, id: Uuid) -> OrgResult<PerformanceReview> {
    let review: PerformanceReview = state.repo.fetch(id)?;
    let company = review_company(&state.repo, &review)?;
    ensure_company_access(&state.permissions, caller, company)?;
    Ok(review)
}

/// Reviews of `employee`, newest period first.
pub fn reviews_for_employee(repo: &Repository, employee: Uuid) -> OrgResult<Vec<PerformanceReview>> {
    let mut reviews: Vec<PerformanceReview> = repo.list(&Filter::new().eq("employee", employee))?;
    reviews.sort_by(|a, b| b.review_period_end.cmp(&a.review_period_end));
    Ok(reviews)
}

pub fn list_reviews(
    state: &AppState,
    caller: &Caller,
    query: &ReviewQuery,
) -> OrgResult<Vec<PerformanceReview>> {
    state
        .permissions
        .require(caller, RecordType::PerformanceReview, Operation::Read)?;

    let filter = Filter::new()
        .eq_opt("employee", query.employee)
        .eq_opt("reviewer", query.reviewer)
        .eq_opt("workflow_state", query.workflow_state);
    let filter = match Scope::for_caller(&state.permissions, caller) {
        Scope::All => filter,
        Scope::Nothing => return Ok(Vec::new()),
        Scope::Company(company) => {
            let employees: Vec<Employee> =
                state.repo.list(&Filter::new().eq("company", company))?;
            let ids: Vec<Uuid> = employees.iter().map(|e| e.id).collect();
            filter.is_in("employee", &ids)
        }
    };
    state.repo.list(&filter)
}

pub fn get_review(state: &AppState, caller: &Caller, id: Uuid) -> OrgResult<PerformanceReview> {
    state
        .permissions
        .require(caller, RecordType::PerformanceReview, Operation::Read)?;
    fetch_accessible(state, caller, id)
}

pub fn get_reviews_by_employee(
    state: &AppState,
    caller: &Caller,
    employee: Uuid,
) -> OrgResult<Vec<PerformanceReview>> {
    state
        .permissions
        .require(caller, RecordType::PerformanceReview, Operation::Read)?;
    if let Some(record) = state.repo.get::<Employee>(employee)? {
        ensure_company_access(&state.permissions, caller, Some(record.company))?;
    }
    reviews_for_employee(&state.repo, employee)
}

/// Reviews where the caller's employee record is the reviewer and the
/// review still needs the reviewer's attention.
pub fn get_pending_reviews_for_current_user(
    state: &AppState,
    caller: &Caller,
) -> OrgResult<Vec<PerformanceReview>> {
    state
        .permissions
        .require(caller, RecordType::PerformanceReview, Operation::Read)?;

    let Some(me) = employee::find_by_email(&state.repo, &caller.user)? else {
        return Ok(Vec::new());
    };

    let pending = [
        ReviewState::PendingReview,
        ReviewState::ReviewScheduled,
        ReviewState::UnderApproval,
    ];
    state.repo.list(
        &Filter::new()
            .eq("reviewer", me.id)
            .is_in("workflow_state", &pending),
    )
}

pub fn create_review(
    state: &AppState,
    caller: &Caller,
    req: CreateReviewRequest,
) -> OrgResult<SavedReview> {
    state
        .permissions
        .require(caller, RecordType::PerformanceReview, Operation::Create)?;
    reject_state_override(&req.workflow_state)?;

    let employee: Employee = state.repo.link(req.employee)?;
    ensure_company_access(&state.permissions, caller, Some(employee.company))?;

    let now = Utc::now();
    let mut review = PerformanceReview {
        id: Uuid::new_v4(),
        employee: req.employee,
        reviewer: req.reviewer,
        review_period_start: req.review_period_start,
        review_period_end: req.review_period_end,
        workflow_state: ReviewState::PendingReview,
        review_date: req.review_date,
        feedback: req.feedback,
        overall_rating: req.overall_rating,
        submitted_for_approval: req.submitted_for_approval,
        goals_achievements: req.goals_achievements,
        areas_for_improvement: req.areas_for_improvement,
        development_plan: req.development_plan,
        docstatus: DocStatus::Draft,
        created_at: now,
        updated_at: now,
    };
    let notices = save(state, &mut review, None, false)?;

    info!(
        "Performance review created: {} for employee {}",
        review.id, review.employee
    );
    audit::log_record_change(
        &caller.user,
        RecordType::PerformanceReview,
        review.id,
        Operation::Create,
    );
    Ok(SavedReview { review, notices })
}

pub fn update_review(
    state: &AppState,
    caller: &Caller,
    id: Uuid,
    req: UpdateReviewRequest,
) -> OrgResult<SavedReview> {
    state
        .permissions
        .require(caller, RecordType::PerformanceReview, Operation::Write)?;
    reject_state_override(&req.workflow_state)?;

    let previous = fetch_accessible(state, caller, id)?;
    if previous.is_locked() {
        return Err(OrgError::Validation(
            "Cannot edit a finalized performance review".to_string(),
        ));
    }

    let mut review = previous.clone();
    if let Some(v) = req.reviewer {
        review.reviewer = v;
    }
    if let Some(v) = req.review_period_start {
        review.review_period_start = v;
    }
    if let Some(v) = req.review_period_end {
        review.review_period_end = v;
    }
    if let Some(v) = req.review_date {
        review.review_date = Some(v);
    }
    if let Some(v) = req.feedback {
        review.feedback = Some(v);
    }
    if let Some(v) = req.overall_rating {
        review.overall_rating = Some(v);
    }
    if let Some(v) = req.submitted_for_approval {
        review.submitted_for_approval = v;
    }
    if let Some(v) = req.goals_achievements {
        review.goals_achievements = Some(v);
    }
    if let Some(v) = req.areas_for_improvement {
        review.areas_for_improvement = Some(v);
    }
    if let Some(v) = req.development_plan {
        review.development_plan = Some(v);
    }
    let notices = save(state, &mut review, Some(&previous), false)?;

    audit::log_record_change(
        &caller.user,
        RecordType::PerformanceReview,
        id,
        Operation::Write,
    );
    Ok(SavedReview { review, notices })
}

/// Marks a review with feedback as submitted for approval; the automatic
/// rules then move it to `Under Approval`.
pub fn submit_review(state: &AppState, caller: &Caller, id: Uuid) -> OrgResult<SavedReview> {
    state
        .permissions
        .require(caller, RecordType::PerformanceReview, Operation::Submit)?;
    let previous = fetch_accessible(state, caller, id)?;
    if previous.is_locked() {
        return Err(OrgError::Validation(
            "Cannot edit a finalized performance review".to_string(),
        ));
    }
    if previous.workflow_state != ReviewState::FeedbackProvided {
        return Err(OrgError::InvalidTransition(format!(
            "Review cannot be submitted for approval from state {}",
            previous.workflow_state
        )));
    }

    let mut review = previous.clone();
    review.submitted_for_approval = true;
    let notices = save(state, &mut review, Some(&previous), false)?;

    audit::log_record_change(
        &caller.user,
        RecordType::PerformanceReview,
        id,
        Operation::Submit,
    );
    Ok(SavedReview { review, notices })
}

/// Executes a manual workflow action. Automatic rules are skipped for this save.
pub fn workflow_action(
    state: &AppState,
    caller: &Caller,
    id: Uuid,
    action: &str,
) -> OrgResult<SavedReview> {
    let action: WorkflowAction = action.parse().map_err(|_| {
        OrgError::InvalidTransition("Invalid action for current state".to_string())
    })?;
    let previous = fetch_accessible(state, caller, id)?;

    let mut review = previous.clone();
    let transition = match workflow::apply_action(&mut review, action, caller) {
        Ok(t) => t,
        Err(e) => {
            if matches!(e, OrgError::Permission(_)) {
                audit::log_security_event(
                    "workflow_action_denied",
                    &caller.user,
                    &format!("{action} on review {id}"),
                );
            }
            return Err(e);
        }
    };
    let notices = save(state, &mut review, Some(&previous), true)?;

    info!(
        "Review {} moved {} -> {} by {}",
        id, transition.from, transition.to, caller.user
    );
    audit::log_workflow_action(
        &caller.user,
        id,
        action.as_str(),
        transition.from.as_str(),
        transition.to.as_str(),
    );
    Ok(SavedReview { review, notices })
}

pub fn get_available_actions(
    state: &AppState,
    caller: &Caller,
    id: Uuid,
) -> OrgResult<Vec<WorkflowAction>> {
    let review = get_review(state, caller, id)?;
    Ok(available_actions(review.workflow_state, caller))
}

pub fn delete_review(state: &AppState, caller: &Caller, id: Uuid) -> OrgResult<()> {
    state
        .permissions
        .require(caller, RecordType::PerformanceReview, Operation::Delete)?;
    let review = fetch_accessible(state, caller, id)?;
    if review.is_locked() {
        return Err(OrgError::Validation(
            "Cannot delete a finalized performance review".to_string(),
        ));
    }
    state.repo.delete::<PerformanceReview>(id)?;

    info!("Performance review deleted: {}", id);
    audit::log_record_change(
        &caller.user,
        RecordType::PerformanceReview,
        id,
        Operation::Delete,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::company::{create_company, CreateCompanyRequest};
    use crate::employee::{create_employee, CreateEmployeeRequest};
    use crate::security::Role;
    use chrono::NaiveDate;

    struct Fixture {
        state: AppState,
        company: Uuid,
        employee: Uuid,
        reviewer: Uuid,
    }

    fn admin() -> Caller {
        Caller::new("admin@example.com").with_role(Role::CompanyAdmin)
    }

    fn setup() -> Fixture {
        let state = AppState::in_memory().unwrap();
        let company = create_company(
            &state,
            &admin(),
            CreateCompanyRequest {
                company_name: "Acme".into(),
                ..Default::default()
            },
        )
        .unwrap()
        .id;
        let hire = |name: &str| {
            create_employee(
                &state,
                &admin(),
                CreateEmployeeRequest {
                    employee_name: name.to_string(),
                    email_address: format!("{name}@acme.test"),
                    company,
                    ..Default::default()
                },
            )
            .unwrap()
            .id
        };
        let employee = hire("ana");
        let reviewer = hire("boss");
        Fixture {
            state,
            company,
            employee,
            reviewer,
        }
    }

    fn new_review(f: &Fixture) -> CreateReviewRequest {
        CreateReviewRequest {
            employee: f.employee,
            reviewer: f.reviewer,
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

    fn manager(f: &Fixture) -> Caller {
        Caller::new("boss@acme.test")
            .with_role(Role::DepartmentManager)
            .with_company(f.company)
    }

    #[test]
    fn test_created_in_pending_review() {
        let f = setup();
        let saved = create_review(&f.state, &admin(), new_review(&f)).unwrap();
        assert_eq!(saved.review.workflow_state, ReviewState::PendingReview);
        assert!(saved.notices.is_empty());
    }

    #[test]
    fn test_state_cannot_be_set_by_payload() {
        let f = setup();
        let req = CreateReviewRequest {
            workflow_state: Some(serde_json::json!("Review Approved")),
            ..new_review(&f)
        };
        assert!(matches!(
            create_review(&f.state, &admin(), req),
            Err(OrgError::Validation(_))
        ));
    }

    #[test]
    fn test_review_date_update_schedules_with_notice() {
        let f = setup();
        let created = create_review(&f.state, &admin(), new_review(&f)).unwrap();

        let saved = update_review(
            &f.state,
            &manager(&f),
            created.review.id,
            UpdateReviewRequest {
                review_date: NaiveDate::from_ymd_opt(2025, 7, 10),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(saved.review.workflow_state, ReviewState::ReviewScheduled);
        assert_eq!(
            saved.notices,
            vec!["Workflow automatically transitioned to: Review Scheduled".to_string()]
        );

        let again = update_review(
            &f.state,
            &manager(&f),
            created.review.id,
            UpdateReviewRequest::default(),
        )
        .unwrap();
        assert_eq!(again.review.workflow_state, ReviewState::ReviewScheduled);
        assert!(again.notices.is_empty());
    }

    #[test]
    fn test_workflow_action_errors_leave_record_unchanged() {
        let f = setup();
        let created = create_review(&f.state, &admin(), new_review(&f)).unwrap();
        let id = created.review.id;

        let err = workflow_action(&f.state, &admin(), id, "Approve Review").unwrap_err();
        assert!(matches!(err, OrgError::InvalidTransition(_)));
        assert_eq!(err.to_string(), "Invalid action for current state");

        let employee = Caller::new("ana@acme.test")
            .with_role(Role::EmployeeUser)
            .with_company(f.company);
        let err = workflow_action(&f.state, &employee, id, "Schedule Review").unwrap_err();
        assert_eq!(err.to_string(), "Insufficient permissions for this action");

        let err = workflow_action(&f.state, &admin(), id, "Teleport").unwrap_err();
        assert!(matches!(err, OrgError::InvalidTransition(_)));

        let stored: PerformanceReview = f.state.repo.fetch(id).unwrap();
        assert_eq!(stored, created.review);
    }

    #[test]
    fn test_submit_review_moves_to_under_approval() {
        let f = setup();
        let req = CreateReviewRequest {
            review_date: NaiveDate::from_ymd_opt(2025, 7, 10),
            feedback: Some("Strong delivery".into()),
            ..new_review(&f)
        };
        let created = create_review(&f.state, &admin(), req).unwrap();
        assert_eq!(created.review.workflow_state, ReviewState::FeedbackProvided);

        let submitted = submit_review(&f.state, &manager(&f), created.review.id).unwrap();
        assert_eq!(submitted.review.workflow_state, ReviewState::UnderApproval);
        assert!(submitted.review.submitted_for_approval);

        assert!(matches!(
            submit_review(&f.state, &manager(&f), created.review.id),
            Err(OrgError::InvalidTransition(_))
        ));
    }

    #[test]
    fn test_approved_review_is_locked() {
        let f = setup();
        let req = CreateReviewRequest {
            review_date: NaiveDate::from_ymd_opt(2025, 7, 10),
            feedback: Some("Strong delivery".into()),
            submitted_for_approval: true,
            ..new_review(&f)
        };
        let created = create_review(&f.state, &admin(), req).unwrap();
        assert_eq!(created.review.workflow_state, ReviewState::UnderApproval);

        let approved =
            workflow_action(&f.state, &admin(), created.review.id, "Approve Review").unwrap();
        assert_eq!(approved.review.workflow_state, ReviewState::ReviewApproved);
        assert_eq!(approved.review.docstatus, DocStatus::Submitted);

        let err = update_review(
            &f.state,
            &admin(),
            created.review.id,
            UpdateReviewRequest {
                feedback: Some("edited".into()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, OrgError::Validation(_)));
        assert!(delete_review(&f.state, &admin(), created.review.id).is_err());
    }

    #[test]
    fn test_pending_reviews_for_reviewer() {
        let f = setup();
        create_review(&f.state, &admin(), new_review(&f)).unwrap();
        let done = create_review(
            &f.state,
            &admin(),
            CreateReviewRequest {
                review_date: NaiveDate::from_ymd_opt(2025, 7, 10),
                feedback: Some("ok".into()),
                ..new_review(&f)
            },
        )
        .unwrap();
        assert_eq!(done.review.workflow_state, ReviewState::FeedbackProvided);

        let pending = get_pending_reviews_for_current_user(&f.state, &manager(&f)).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].workflow_state, ReviewState::PendingReview);

        let stranger = Caller::new("nobody@acme.test")
            .with_role(Role::DepartmentManager)
            .with_company(f.company);
        assert!(get_pending_reviews_for_current_user(&f.state, &stranger)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_pending_reviews_match_email_ignoring_case() {
        let f = setup();
        let lead = create_employee(
            &f.state,
            &admin(),
            CreateEmployeeRequest {
                employee_name: "Lead".into(),
                email_address: "Lead@Acme.test".into(),
                company: f.company,
                ..Default::default()
            },
        )
        .unwrap();
        create_review(
            &f.state,
            &admin(),
            CreateReviewRequest {
                reviewer: lead.id,
                ..new_review(&f)
            },
        )
        .unwrap();

        let caller = Caller::new("lead@acme.test")
            .with_role(Role::DepartmentManager)
            .with_company(f.company);
        let pending = get_pending_reviews_for_current_user(&f.state, &caller).unwrap();
        assert_eq!(pending.len(), 1);

        let shouting = Caller::new("LEAD@ACME.TEST")
            .with_role(Role::DepartmentManager)
            .with_company(f.company);
        assert_eq!(
            get_pending_reviews_for_current_user(&f.state, &shouting)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_reviews_by_employee_newest_first() {
        let f = setup();
        for (start, end) in [((2024, 1, 1), (2024, 6, 30)), ((2024, 7, 1), (2024, 12, 31))] {
            create_review(
                &f.state,
                &admin(),
                CreateReviewRequest {
                    review_period_start: NaiveDate::from_ymd_opt(start.0, start.1, start.2)
                        .unwrap(),
                    review_period_end: NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
                    ..new_review(&f)
                },
            )
            .unwrap();
        }

        let reviews = get_reviews_by_employee(&f.state, &admin(), f.employee).unwrap();
        assert_eq!(reviews.len(), 2);
        assert!(reviews[0].review_period_end > reviews[1].review_period_end);
    }

    #[test]
    fn test_review_list_scoped_through_employee_company() {
        let f = setup();
        create_review(&f.state, &admin(), new_review(&f)).unwrap();

        let other_company = Uuid::new_v4();
        let outsider = Caller::new("x@globex.test")
            .with_role(Role::EmployeeUser)
            .with_company(other_company);
        assert!(list_reviews(&f.state, &outsider, &ReviewQuery::default())
            .unwrap()
            .is_empty());
        assert_eq!(
            list_reviews(&f.state, &manager(&f), &ReviewQuery::default())
                .unwrap()
                .len(),
            1
        );
    }
}
