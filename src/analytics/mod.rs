//! Cached read-only aggregates: company statistics, employee performance and
//! the per-user dashboard.

use axum::{
    extract::State,
    routing::{delete, get},
    Router,
};
use chrono::{Datelike, NaiveDate};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::company::Company;
use crate::core::cache::{self, company_stats_key, dashboard_key, employee_performance_key};
use crate::core::error::{OrgError, OrgResult};
use crate::core::shared::extract::{Json, Path};
use crate::core::shared::models::RecordType;
use crate::core::shared::response::ApiResponse;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{run_blocking, today};
use crate::core::store::Filter;
use crate::department::Department;
use crate::employee::{self, Employee, EmployeeStatus};
use crate::project::{Project, ProjectStatus};
use crate::review::{self, PerformanceReview, Rating, ReviewState};
use crate::security::{ensure_company_access, Caller, Operation, Scope};

const PENDING_STATES: [ReviewState; 3] = [
    ReviewState::PendingReview,
    ReviewState::ReviewScheduled,
    ReviewState::UnderApproval,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentHeadcount {
    pub department: Uuid,
    pub department_name: String,
    pub employee_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyStats {
    pub company: Uuid,
    pub departments: usize,
    pub employees: usize,
    pub active_employees: usize,
    pub projects: usize,
    pub active_projects: usize,
    pub pending_reviews: usize,
    pub employee_distribution: Vec<DepartmentHeadcount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewDigest {
    pub id: Uuid,
    pub review_period_end: NaiveDate,
    pub overall_rating: Option<Rating>,
    pub workflow_state: ReviewState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeePerformance {
    pub employee: Uuid,
    pub total_reviews: usize,
    pub latest_rating: Option<Rating>,
    pub average_rating: f64,
    pub reviews_by_year: BTreeMap<i32, Vec<ReviewDigest>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub user: String,
    pub generated_on: NaiveDate,
    pub companies: usize,
    pub employees: usize,
    pub active_projects: usize,
    pub my_pending_reviews: usize,
    pub company_stats: Option<CompanyStats>,
}

fn is_active_project(project: &Project) -> bool {
    project.status != ProjectStatus::Completed
}

pub fn calculate_company_stats(state: &AppState, company: Uuid) -> OrgResult<CompanyStats> {
    let by_company = Filter::new().eq("company", company);
    let departments: Vec<Department> = state.repo.list(&by_company)?;
    let employees: Vec<Employee> = state.repo.list(&by_company)?;
    let projects: Vec<Project> = state.repo.list(&by_company)?;

    let employee_ids: Vec<Uuid> = employees.iter().map(|e| e.id).collect();
    let pending_reviews = state.repo.count::<PerformanceReview>(
        &Filter::new()
            .is_in("employee", &employee_ids)
            .is_in("workflow_state", &PENDING_STATES),
    )?;

    let employee_distribution = departments
        .iter()
        .map(|d| DepartmentHeadcount {
            department: d.id,
            department_name: d.department_name.clone(),
            employee_count: employees
                .iter()
                .filter(|e| e.department == Some(d.id))
                .count(),
        })
        .collect();

    Ok(CompanyStats {
        company,
        departments: departments.len(),
        employees: employees.len(),
        active_employees: employees
            .iter()
            .filter(|e| e.status == EmployeeStatus::Active)
            .count(),
        projects: projects.len(),
        active_projects: projects.iter().filter(|p| is_active_project(p)).count(),
        pending_reviews,
        employee_distribution,
    })
}

/// Reviews are expected newest period first.
pub fn calculate_employee_performance(
    employee: Uuid,
    reviews: &[PerformanceReview],
) -> EmployeePerformance {
    let mut reviews_by_year: BTreeMap<i32, Vec<ReviewDigest>> = BTreeMap::new();
    let mut rating_sum = 0u32;
    let mut rating_count = 0u32;

    for review in reviews {
        let Some(rating) = review.overall_rating else {
            continue;
        };
        rating_sum += u32::from(rating.score());
        rating_count += 1;
        reviews_by_year
            .entry(review.review_period_end.year())
            .or_default()
            .push(ReviewDigest {
                id: review.id,
                review_period_end: review.review_period_end,
                overall_rating: review.overall_rating,
                workflow_state: review.workflow_state,
            });
    }

    let average_rating = if rating_count > 0 {
        (f64::from(rating_sum) / f64::from(rating_count) * 100.0).round() / 100.0
    } else {
        0.0
    };

    EmployeePerformance {
        employee,
        total_reviews: reviews.len(),
        latest_rating: reviews.first().and_then(|r| r.overall_rating),
        average_rating,
        reviews_by_year,
    }
}

pub fn get_company_stats(state: &AppState, caller: &Caller, id: Uuid) -> OrgResult<CompanyStats> {
    state
        .permissions
        .require(caller, RecordType::Company, Operation::Read)?;
    let company: Company = state.repo.fetch(id)?;
    ensure_company_access(&state.permissions, caller, Some(company.id))?;

    let key = company_stats_key(&id);
    if let Some(stats) = cache::get_json::<CompanyStats>(state.cache.as_ref(), &key) {
        debug!("Retrieved cached stats for company: {}", id);
        return Ok(stats);
    }

    let stats = calculate_company_stats(state, id)?;
    cache::set_json(
        state.cache.as_ref(),
        &key,
        &stats,
        state.config.cache.company_stats_ttl_secs,
    );
    info!("Calculated and cached stats for company: {}", id);
    Ok(stats)
}

pub fn get_employee_performance(
    state: &AppState,
    caller: &Caller,
    id: Uuid,
) -> OrgResult<EmployeePerformance> {
    state
        .permissions
        .require(caller, RecordType::PerformanceReview, Operation::Read)?;
    let employee: Employee = state.repo.fetch(id)?;
    ensure_company_access(&state.permissions, caller, Some(employee.company))?;

    let key = employee_performance_key(&id);
    if let Some(performance) = cache::get_json::<EmployeePerformance>(state.cache.as_ref(), &key)
    {
        debug!("Retrieved cached performance data for employee: {}", id);
        return Ok(performance);
    }

    let reviews = review::reviews_for_employee(&state.repo, id)?;
    let performance = calculate_employee_performance(id, &reviews);
    cache::set_json(
        state.cache.as_ref(),
        &key,
        &performance,
        state.config.cache.employee_performance_ttl_secs,
    );
    info!("Calculated and cached performance data for employee: {}", id);
    Ok(performance)
}

fn build_dashboard(state: &AppState, caller: &Caller) -> OrgResult<Dashboard> {
    let scope = Scope::for_caller(&state.permissions, caller);
    let companies = match scope.apply(RecordType::Company, Filter::new()) {
        Some(f) => state.repo.count::<Company>(&f)?,
        None => 0,
    };
    let employees = match scope.apply(RecordType::Employee, Filter::new()) {
        Some(f) => state.repo.count::<Employee>(&f)?,
        None => 0,
    };
    let active_projects = match scope.apply(RecordType::Project, Filter::new()) {
        Some(f) => state
            .repo
            .list::<Project>(&f)?
            .iter()
            .filter(|p| is_active_project(p))
            .count(),
        None => 0,
    };

    let my_pending_reviews = match employee::find_by_email(&state.repo, &caller.user)? {
        Some(me) => state.repo.count::<PerformanceReview>(
            &Filter::new()
                .eq("reviewer", me.id)
                .is_in("workflow_state", &PENDING_STATES),
        )?,
        None => 0,
    };

    let company_stats = match caller.company {
        Some(company) if state.repo.get::<Company>(company)?.is_some() => {
            Some(calculate_company_stats(state, company)?)
        }
        _ => None,
    };

    Ok(Dashboard {
        user: caller.user.clone(),
        generated_on: today(),
        companies,
        employees,
        active_projects,
        my_pending_reviews,
        company_stats,
    })
}

/// Dashboard for the caller, cached per user and day.
pub fn get_dashboard(state: &AppState, caller: &Caller) -> OrgResult<Dashboard> {
    state
        .permissions
        .require(caller, RecordType::Company, Operation::Read)?;

    let key = dashboard_key("main", &caller.user, today());
    if let Some(dashboard) = cache::get_json::<Dashboard>(state.cache.as_ref(), &key) {
        debug!("Retrieved cached dashboard data: {}", key);
        return Ok(dashboard);
    }

    let dashboard = build_dashboard(state, caller)?;
    cache::set_json(
        state.cache.as_ref(),
        &key,
        &dashboard,
        state.config.cache.dashboard_ttl_secs,
    );
    debug!("Cached dashboard data: {}", key);
    Ok(dashboard)
}

pub fn clear_company_cache(state: &AppState, caller: &Caller, id: Uuid) -> OrgResult<()> {
    state
        .permissions
        .require(caller, RecordType::Company, Operation::Write)?;
    ensure_company_access(&state.permissions, caller, Some(id))?;
    state.cache.delete(&company_stats_key(&id));
    info!("Cleared cache for company: {}", id);
    Ok(())
}

pub fn clear_employee_cache(state: &AppState, caller: &Caller, id: Uuid) -> OrgResult<()> {
    state
        .permissions
        .require(caller, RecordType::Employee, Operation::Write)?;
    if let Some(employee) = state.repo.get::<Employee>(id)? {
        ensure_company_access(&state.permissions, caller, Some(employee.company))?;
    }
    state.cache.delete(&employee_performance_key(&id));
    info!("Cleared cache for employee: {}", id);
    Ok(())
}

pub async fn handle_company_stats(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<CompanyStats>>, OrgError> {
    let stats = run_blocking(&state, move |s| get_company_stats(s, &caller, id)).await?;
    Ok(Json(ApiResponse::ok(stats)))
}

pub async fn handle_employee_performance(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<EmployeePerformance>>, OrgError> {
    let performance = run_blocking(&state, move |s| get_employee_performance(s, &caller, id)).await?;
    Ok(Json(ApiResponse::ok(performance)))
}

pub async fn handle_dashboard(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<Json<ApiResponse<Dashboard>>, OrgError> {
    let dashboard = run_blocking(&state, move |s| get_dashboard(s, &caller)).await?;
    Ok(Json(ApiResponse::ok(dashboard)))
}

pub async fn handle_clear_company_cache(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, OrgError> {
    run_blocking(&state, move |s| clear_company_cache(s, &caller, id)).await?;
    Ok(Json(ApiResponse::message_only("Company cache cleared")))
}

pub async fn handle_clear_employee_cache(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, OrgError> {
    run_blocking(&state, move |s| clear_employee_cache(s, &caller, id)).await?;
    Ok(Json(ApiResponse::message_only("Employee cache cleared")))
}

pub fn configure_analytics_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/analytics/dashboard", get(handle_dashboard))
        .route("/api/companies/:id/stats", get(handle_company_stats))
        .route(
            "/api/companies/:id/stats/cache",
            delete(handle_clear_company_cache),
        )
        .route(
            "/api/employees/:id/performance",
            get(handle_employee_performance),
        )
        .route(
            "/api/employees/:id/performance/cache",
            delete(handle_clear_employee_cache),
        )
}
