use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

use super::{
    create_review, delete_review, get_available_actions, get_pending_reviews_for_current_user,
    get_review, get_reviews_by_employee, list_reviews, submit_review, update_review,
    workflow_action, CreateReviewRequest, PerformanceReview, ReviewQuery, UpdateReviewRequest,
    WorkflowAction, WorkflowActionRequest,
};
use crate::core::error::OrgError;
use crate::core::shared::extract::{Json, Path, Query};
use crate::core::shared::response::ApiResponse;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::run_blocking;
use crate::security::Caller;

type ReviewResponse = Result<Json<ApiResponse<PerformanceReview>>, OrgError>;

pub async fn handle_list_reviews(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<ReviewQuery>,
) -> Result<Json<ApiResponse<Vec<PerformanceReview>>>, OrgError> {
    let reviews = run_blocking(&state, move |s| list_reviews(s, &caller, &query)).await?;
    Ok(Json(ApiResponse::ok(reviews)))
}

pub async fn handle_get_review(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ReviewResponse {
    let review = run_blocking(&state, move |s| get_review(s, &caller, id)).await?;
    Ok(Json(ApiResponse::ok(review)))
}

pub async fn handle_create_review(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<CreateReviewRequest>,
) -> ReviewResponse {
    let saved = run_blocking(&state, move |s| create_review(s, &caller, req)).await?;
    Ok(Json(ApiResponse::ok(saved.review).with_notices(&saved.notices)))
}

pub async fn handle_update_review(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateReviewRequest>,
) -> ReviewResponse {
    let saved = run_blocking(&state, move |s| update_review(s, &caller, id, req)).await?;
    Ok(Json(ApiResponse::ok(saved.review).with_notices(&saved.notices)))
}

pub async fn handle_delete_review(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, OrgError> {
    run_blocking(&state, move |s| delete_review(s, &caller, id)).await?;
    Ok(Json(ApiResponse::message_only(
        "Performance review deleted successfully",
    )))
}

pub async fn handle_submit_review(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ReviewResponse {
    let saved = run_blocking(&state, move |s| submit_review(s, &caller, id)).await?;
    Ok(Json(
        ApiResponse::ok(saved.review)
            .with_message("Performance review submitted successfully")
            .with_notices(&saved.notices),
    ))
}

pub async fn handle_workflow_action(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<WorkflowActionRequest>,
) -> ReviewResponse {
    let saved = run_blocking(&state, move |s| workflow_action(s, &caller, id, &req.action)).await?;
    let message = format!("Action completed. New state: {}", saved.review.workflow_state);
    Ok(Json(ApiResponse::ok(saved.review).with_message(message)))
}

pub async fn handle_available_actions(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<WorkflowAction>>>, OrgError> {
    let actions = run_blocking(&state, move |s| get_available_actions(s, &caller, id)).await?;
    Ok(Json(ApiResponse::ok(actions)))
}

pub async fn handle_pending_reviews(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<Json<ApiResponse<Vec<PerformanceReview>>>, OrgError> {
    let reviews =
        run_blocking(&state, move |s| get_pending_reviews_for_current_user(s, &caller)).await?;
    Ok(Json(ApiResponse::ok(reviews)))
}

pub async fn handle_reviews_by_employee(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(employee): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<PerformanceReview>>>, OrgError> {
    let reviews =
        run_blocking(&state, move |s| get_reviews_by_employee(s, &caller, employee)).await?;
    Ok(Json(ApiResponse::ok(reviews)))
}

pub fn configure_review_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/reviews",
            get(handle_list_reviews).post(handle_create_review),
        )
        .route(
            "/api/reviews/:id",
            get(handle_get_review)
                .patch(handle_update_review)
                .delete(handle_delete_review),
        )
        .route("/api/reviews/:id/submit", post(handle_submit_review))
        .route("/api/reviews/:id/workflow", post(handle_workflow_action))
        .route("/api/reviews/:id/actions", get(handle_available_actions))
        .route("/api/pending-reviews", get(handle_pending_reviews))
        .route(
            "/api/employees/:id/reviews",
            get(handle_reviews_by_employee),
        )
}
