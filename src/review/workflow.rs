//! Performance review state machine.
//!
//! Manual transitions come from [`TRANSITIONS`]; automatic ones are derived
//! from field values on every save that is not itself driven by a manual
//! action.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::types::{DocStatus, PerformanceReview, ReviewState};
use crate::core::error::{OrgError, OrgResult};
use crate::security::{Caller, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowAction {
    #[serde(rename = "Schedule Review")]
    ScheduleReview,
    #[serde(rename = "Provide Feedback")]
    ProvideFeedback,
    #[serde(rename = "Submit for Approval")]
    SubmitForApproval,
    #[serde(rename = "Approve Review")]
    ApproveReview,
    #[serde(rename = "Reject Review")]
    RejectReview,
    #[serde(rename = "Update Feedback")]
    UpdateFeedback,
}

impl WorkflowAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScheduleReview => "Schedule Review",
            Self::ProvideFeedback => "Provide Feedback",
            Self::SubmitForApproval => "Submit for Approval",
            Self::ApproveReview => "Approve Review",
            Self::RejectReview => "Reject Review",
            Self::UpdateFeedback => "Update Feedback",
        }
    }
}

impl fmt::Display for WorkflowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkflowAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['_', '-'], " ").as_str() {
            "schedule review" => Ok(Self::ScheduleReview),
            "provide feedback" => Ok(Self::ProvideFeedback),
            "submit for approval" => Ok(Self::SubmitForApproval),
            "approve review" => Ok(Self::ApproveReview),
            "reject review" => Ok(Self::RejectReview),
            "update feedback" => Ok(Self::UpdateFeedback),
            _ => Err(format!("Unknown workflow action: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ReviewState,
    pub action: WorkflowAction,
    pub to: ReviewState,
    pub allowed_roles: &'static [Role],
}

const MANAGERS: &[Role] = &[Role::DepartmentManager, Role::CompanyAdmin];
const DEPARTMENT_MANAGER: &[Role] = &[Role::DepartmentManager];
const COMPANY_ADMIN: &[Role] = &[Role::CompanyAdmin];

pub const TRANSITIONS: [Transition; 6] = [
    Transition {
        from: ReviewState::PendingReview,
        action: WorkflowAction::ScheduleReview,
        to: ReviewState::ReviewScheduled,
        allowed_roles: MANAGERS,
    },
    Transition {
        from: ReviewState::ReviewScheduled,
        action: WorkflowAction::ProvideFeedback,
        to: ReviewState::FeedbackProvided,
        allowed_roles: MANAGERS,
    },
    Transition {
        from: ReviewState::FeedbackProvided,
        action: WorkflowAction::SubmitForApproval,
        to: ReviewState::UnderApproval,
        allowed_roles: DEPARTMENT_MANAGER,
    },
    Transition {
        from: ReviewState::UnderApproval,
        action: WorkflowAction::ApproveReview,
        to: ReviewState::ReviewApproved,
        allowed_roles: COMPANY_ADMIN,
    },
    Transition {
        from: ReviewState::UnderApproval,
        action: WorkflowAction::RejectReview,
        to: ReviewState::ReviewRejected,
        allowed_roles: COMPANY_ADMIN,
    },
    Transition {
        from: ReviewState::ReviewRejected,
        action: WorkflowAction::UpdateFeedback,
        to: ReviewState::FeedbackProvided,
        allowed_roles: DEPARTMENT_MANAGER,
    },
];

pub fn find_transition(from: ReviewState, action: WorkflowAction) -> Option<&'static Transition> {
    TRANSITIONS
        .iter()
        .find(|t| t.from == from && t.action == action)
}

/// Actions the caller may take from `state`.
pub fn available_actions(state: ReviewState, caller: &Caller) -> Vec<WorkflowAction> {
    TRANSITIONS
        .iter()
        .filter(|t| t.from == state && caller.has_any_role(t.allowed_roles))
        .map(|t| t.action)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AutoRule {
    Schedule,
    Feedback,
    Submit,
    Revise,
}

fn matching_rule(
    review: &PerformanceReview,
    previous: Option<&PerformanceReview>,
) -> Option<(AutoRule, ReviewState)> {
    match review.workflow_state {
        ReviewState::PendingReview if review.review_date.is_some() => {
            Some((AutoRule::Schedule, ReviewState::ReviewScheduled))
        }
        ReviewState::ReviewScheduled if review.has_feedback() => {
            Some((AutoRule::Feedback, ReviewState::FeedbackProvided))
        }
        ReviewState::FeedbackProvided if review.submitted_for_approval => {
            Some((AutoRule::Submit, ReviewState::UnderApproval))
        }
        ReviewState::ReviewRejected
            if previous.is_some_and(|prev| review.feedback_changed_since(prev)) =>
        {
            Some((AutoRule::Revise, ReviewState::FeedbackProvided))
        }
        _ => None,
    }
}

/// Target of the single automatic rule that applies now, if any.
pub fn automatic_target(
    review: &PerformanceReview,
    previous: Option<&PerformanceReview>,
) -> Option<ReviewState> {
    matching_rule(review, previous)
        .map(|(_, target)| target)
        .filter(|target| *target != review.workflow_state)
}

/// Applies automatic rules until none fires, each rule at most once.
/// Returns the states entered, in order.
pub fn apply_automatic_transitions(
    review: &mut PerformanceReview,
    previous: Option<&PerformanceReview>,
) -> Vec<ReviewState> {
    let mut fired = Vec::new();
    let mut entered = Vec::new();
    while let Some((rule, target)) = matching_rule(review, previous) {
        if fired.contains(&rule) || target == review.workflow_state {
            break;
        }
        fired.push(rule);
        review.workflow_state = target;
        entered.push(target);
    }
    entered
}

/// Validates `action` against the current state and the caller's roles, then
/// applies it with its side effects. The review is untouched on error.
pub fn apply_action(
    review: &mut PerformanceReview,
    action: WorkflowAction,
    caller: &Caller,
) -> OrgResult<&'static Transition> {
    let transition = find_transition(review.workflow_state, action).ok_or_else(|| {
        OrgError::InvalidTransition("Invalid action for current state".to_string())
    })?;
    if !caller.has_any_role(transition.allowed_roles) {
        return Err(OrgError::Permission(
            "Insufficient permissions for this action".to_string(),
        ));
    }

    review.workflow_state = transition.to;
    match action {
        WorkflowAction::SubmitForApproval => review.submitted_for_approval = true,
        WorkflowAction::ApproveReview => review.docstatus = DocStatus::Submitted,
        WorkflowAction::RejectReview => review.submitted_for_approval = false,
        _ => {}
    }
    Ok(transition)
}
