//! Combines the routes of every record module into one API router.

use axum::Router;
use std::sync::Arc;

use crate::core::shared::state::AppState;

pub fn configure_api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(crate::company::configure_company_routes())
        .merge(crate::department::configure_department_routes())
        .merge(crate::employee::configure_employee_routes())
        .merge(crate::project::configure_project_routes())
        .merge(crate::review::configure_review_routes())
        .merge(crate::directory::configure_user_routes())
        .merge(crate::analytics::configure_analytics_routes())
}
