use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::core::shared::models::{Record, RecordType};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReviewState {
    #[default]
    #[serde(rename = "Pending Review")]
    PendingReview,
    #[serde(rename = "Review Scheduled")]
    ReviewScheduled,
    #[serde(rename = "Feedback Provided")]
    FeedbackProvided,
    #[serde(rename = "Under Approval")]
    UnderApproval,
    #[serde(rename = "Review Approved")]
    ReviewApproved,
    #[serde(rename = "Review Rejected")]
    ReviewRejected,
}

impl ReviewState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingReview => "Pending Review",
            Self::ReviewScheduled => "Review Scheduled",
            Self::FeedbackProvided => "Feedback Provided",
            Self::UnderApproval => "Under Approval",
            Self::ReviewApproved => "Review Approved",
            Self::ReviewRejected => "Review Rejected",
        }
    }

    /// States still waiting on the reviewer.
    pub fn is_pending_for_reviewer(&self) -> bool {
        matches!(
            self,
            Self::PendingReview | Self::ReviewScheduled | Self::UnderApproval
        )
    }
}

impl fmt::Display for ReviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rating {
    #[serde(rename = "1 - Poor")]
    Poor,
    #[serde(rename = "2 - Below Average")]
    BelowAverage,
    #[serde(rename = "3 - Average")]
    Average,
    #[serde(rename = "4 - Good")]
    Good,
    #[serde(rename = "5 - Excellent")]
    Excellent,
}

impl Rating {
    pub fn score(&self) -> u8 {
        match self {
            Self::Poor => 1,
            Self::BelowAverage => 2,
            Self::Average => 3,
            Self::Good => 4,
            Self::Excellent => 5,
        }
    }
}

/// `Submitted` marks a finalized review that no longer accepts edits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocStatus {
    #[default]
    Draft,
    Submitted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerformanceReview {
    pub id: Uuid,
    pub employee: Uuid,
    pub reviewer: Uuid,
    pub review_period_start: NaiveDate,
    pub review_period_end: NaiveDate,
    #[serde(default)]
    pub workflow_state: ReviewState,
    pub review_date: Option<NaiveDate>,
    pub feedback: Option<String>,
    pub overall_rating: Option<Rating>,
    #[serde(default)]
    pub submitted_for_approval: bool,
    pub goals_achievements: Option<String>,
    pub areas_for_improvement: Option<String>,
    pub development_plan: Option<String>,
    #[serde(default)]
    pub docstatus: DocStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for PerformanceReview {
    const RECORD_TYPE: RecordType = RecordType::PerformanceReview;

    fn id(&self) -> Uuid {
        self.id
    }
}

impl PerformanceReview {
    pub fn is_locked(&self) -> bool {
        self.docstatus == DocStatus::Submitted
    }

    pub fn has_feedback(&self) -> bool {
        self.feedback.as_deref().is_some_and(|f| !f.is_empty())
    }

    /// Whether any of the feedback fields differs from `previous`.
    pub fn feedback_changed_since(&self, previous: &PerformanceReview) -> bool {
        self.feedback != previous.feedback
            || self.goals_achievements != previous.goals_achievements
            || self.areas_for_improvement != previous.areas_for_improvement
            || self.development_plan != previous.development_plan
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReviewRequest {
    pub employee: Uuid,
    pub reviewer: Uuid,
    pub review_period_start: NaiveDate,
    pub review_period_end: NaiveDate,
    pub review_date: Option<NaiveDate>,
    pub feedback: Option<String>,
    pub overall_rating: Option<Rating>,
    #[serde(default)]
    pub submitted_for_approval: bool,
    pub goals_achievements: Option<String>,
    pub areas_for_improvement: Option<String>,
    pub development_plan: Option<String>,
    /// Present only to reject attempts to set the state directly.
    pub workflow_state: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateReviewRequest {
    pub reviewer: Option<Uuid>,
    pub review_period_start: Option<NaiveDate>,
    pub review_period_end: Option<NaiveDate>,
    pub review_date: Option<NaiveDate>,
    pub feedback: Option<String>,
    pub overall_rating: Option<Rating>,
    pub submitted_for_approval: Option<bool>,
    pub goals_achievements: Option<String>,
    pub areas_for_improvement: Option<String>,
    pub development_plan: Option<String>,
    pub workflow_state: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewQuery {
    pub employee: Option<Uuid>,
    pub reviewer: Option<Uuid>,
    pub workflow_state: Option<ReviewState>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowActionRequest {
    pub action: String,
}
