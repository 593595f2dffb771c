use axum::{extract::State, routing::get, Router};
use chrono::{DateTime, NaiveDate, Utc};
use log::info;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use uuid::Uuid;

use crate::company::Company;
use crate::core::audit;
use crate::core::counters::{self, ParentRef};
use crate::core::error::{OrgError, OrgResult};
use crate::core::shared::extract::{Json, Path, Query};
use crate::core::shared::models::{Record, RecordType};
use crate::core::shared::response::ApiResponse;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{run_blocking, today};
use crate::core::store::{Filter, Repository};
use crate::department::Department;
use crate::project::Project;
use crate::review::{self, PerformanceReview};
use crate::security::{ensure_company_access, Caller, Operation, Scope};

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("Invalid email regex")
});

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email.trim())
}

/// Looks up the employee record for an email, case-insensitively.
pub fn find_by_email(repo: &Repository, email: &str) -> OrgResult<Option<Employee>> {
    let wanted = email.trim().to_lowercase();
    let employees: Vec<Employee> = repo.list(&Filter::new().eq("email_address", &wanted))?;
    Ok(employees.into_iter().next())
}

/// Projects of `company` whose team or management still references `employee`.
fn projects_referencing(repo: &Repository, company: Uuid, employee: Uuid) -> OrgResult<Vec<Uuid>> {
    let projects: Vec<Project> = repo.list(&Filter::new().eq("company", company))?;
    Ok(projects
        .into_iter()
        .filter(|p| {
            p.project_manager == Some(employee)
                || p.assigned_employees.iter().any(|m| m.employee == employee)
        })
        .map(|p| p.id)
        .collect())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmployeeStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
    Left,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Employee {
    pub id: Uuid,
    pub employee_name: String,
    pub email_address: String,
    pub company: Uuid,
    pub department: Option<Uuid>,
    pub designation: Option<String>,
    pub phone_number: Option<String>,
    #[serde(default)]
    pub status: EmployeeStatus,
    pub hired_on: Option<NaiveDate>,
    pub days_employed: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Employee {
    const RECORD_TYPE: RecordType = RecordType::Employee;

    fn id(&self) -> Uuid {
        self.id
    }

    fn company_id(&self) -> Option<Uuid> {
        Some(self.company)
    }
}

impl Employee {
    pub fn calculate_days_employed(&mut self, on: NaiveDate) {
        self.days_employed = self.hired_on.map(|hired| (on - hired).num_days());
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateEmployeeRequest {
    pub employee_name: String,
    pub email_address: String,
    pub company: Uuid,
    pub department: Option<Uuid>,
    pub designation: Option<String>,
    pub phone_number: Option<String>,
    pub status: Option<EmployeeStatus>,
    pub hired_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateEmployeeRequest {
    pub employee_name: Option<String>,
    pub email_address: Option<String>,
    pub company: Option<Uuid>,
    pub department: Option<Uuid>,
    pub designation: Option<String>,
    pub phone_number: Option<String>,
    pub status: Option<EmployeeStatus>,
    pub hired_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmployeeQuery {
    pub company: Option<Uuid>,
    pub department: Option<Uuid>,
    pub status: Option<EmployeeStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceSummary {
    pub employee: Employee,
    pub performance_reviews: Vec<PerformanceReview>,
}

fn validate(state: &AppState, employee: &Employee) -> OrgResult<()> {
    if employee.employee_name.trim().is_empty() {
        return Err(OrgError::Validation("Employee name is required".to_string()));
    }
    if !is_valid_email(&employee.email_address) {
        return Err(OrgError::Validation("Invalid email address".to_string()));
    }
    state.repo.link::<Company>(employee.company)?;
    if let Some(department) = employee.department {
        let dept: Department = state.repo.link(department)?;
        if dept.company != employee.company {
            return Err(OrgError::Validation(format!(
                "Department {department} does not belong to company {}",
                employee.company
            )));
        }
    }
    Ok(())
}

/// `previous_department` is `None` for inserts and `Some(old)` for updates.
fn save(
    state: &AppState,
    employee: &mut Employee,
    previous_department: Option<Option<Uuid>>,
) -> OrgResult<()> {
    employee.email_address = employee.email_address.trim().to_lowercase();
    validate(state, employee)?;
    employee.calculate_days_employed(today());
    employee.updated_at = Utc::now();
    match previous_department {
        None => state.repo.insert(employee)?,
        Some(_) => state.repo.update(employee)?,
    }

    if let Some(department) = employee.department {
        counters::on_child_saved(&state.repo, ParentRef::Department(department))?;
    }
    if let Some(Some(old)) = previous_department {
        if employee.department != Some(old) {
            counters::on_child_saved(&state.repo, ParentRef::Department(old))?;
        }
    }
    Ok(())
}

pub fn list_employees(
    state: &AppState,
    caller: &Caller,
    query: &EmployeeQuery,
) -> OrgResult<Vec<Employee>> {
    state
        .permissions
        .require(caller, RecordType::Employee, Operation::Read)?;
    let filter = Filter::new()
        .eq_opt("company", query.company)
        .eq_opt("department", query.department)
        .eq_opt("status", query.status);
    match Scope::for_caller(&state.permissions, caller).apply(RecordType::Employee, filter) {
        Some(filter) => state.repo.list(&filter),
        None => Ok(Vec::new()),
    }
}

pub fn get_employees_by_department(
    state: &AppState,
    caller: &Caller,
    department: Uuid,
) -> OrgResult<Vec<Employee>> {
    list_employees(
        state,
        caller,
        &EmployeeQuery {
            department: Some(department),
            ..Default::default()
        },
    )
}

pub fn get_employee(state: &AppState, caller: &Caller, id: Uuid) -> OrgResult<Employee> {
    state
        .permissions
        .require(caller, RecordType::Employee, Operation::Read)?;
    let employee: Employee = state.repo.fetch(id)?;
    ensure_company_access(&state.permissions, caller, Some(employee.company))?;
    Ok(employee)
}

pub fn get_employee_performance_summary(
    state: &AppState,
    caller: &Caller,
    id: Uuid,
) -> OrgResult<PerformanceSummary> {
    let employee = get_employee(state, caller, id)?;
    let performance_reviews = review::reviews_for_employee(&state.repo, id)?;
    Ok(PerformanceSummary {
        employee,
        performance_reviews,
    })
}

pub fn create_employee(
    state: &AppState,
    caller: &Caller,
    req: CreateEmployeeRequest,
) -> OrgResult<Employee> {
    state
        .permissions
        .require(caller, RecordType::Employee, Operation::Create)?;
    ensure_company_access(&state.permissions, caller, Some(req.company))?;

    let now = Utc::now();
    let mut employee = Employee {
        id: Uuid::new_v4(),
        employee_name: req.employee_name,
        email_address: req.email_address,
        company: req.company,
        department: req.department,
        designation: req.designation,
        phone_number: req.phone_number,
        status: req.status.unwrap_or_default(),
        hired_on: req.hired_on,
        days_employed: None,
        created_at: now,
        updated_at: now,
    };
    save(state, &mut employee, None)?;

    info!("Employee created: {} ({})", employee.employee_name, employee.id);
    audit::log_record_change(&caller.user, RecordType::Employee, employee.id, Operation::Create);
    Ok(employee)
}

pub fn update_employee(
    state: &AppState,
    caller: &Caller,
    id: Uuid,
    req: UpdateEmployeeRequest,
) -> OrgResult<Employee> {
    state
        .permissions
        .require(caller, RecordType::Employee, Operation::Write)?;
    let mut employee: Employee = state.repo.fetch(id)?;
    ensure_company_access(&state.permissions, caller, Some(employee.company))?;
    let previous_department = employee.department;

    if let Some(v) = req.employee_name {
        employee.employee_name = v;
    }
    if let Some(v) = req.email_address {
        employee.email_address = v;
    }
    if let Some(v) = req.company.filter(|v| *v != employee.company) {
        ensure_company_access(&state.permissions, caller, Some(v))?;
        let projects = projects_referencing(&state.repo, employee.company, id)?;
        if !projects.is_empty() {
            return Err(OrgError::Validation(format!(
                "Employee {id} is still on projects {projects:?} of company {}; \
                 remove them from those teams before changing company",
                employee.company
            )));
        }
        employee.company = v;
    }
    if let Some(v) = req.department {
        employee.department = Some(v);
    }
    if let Some(v) = req.designation {
        employee.designation = Some(v);
    }
    if let Some(v) = req.phone_number {
        employee.phone_number = Some(v);
    }
    if let Some(v) = req.status {
        employee.status = v;
    }
    if let Some(v) = req.hired_on {
        employee.hired_on = Some(v);
    }
    save(state, &mut employee, Some(previous_department))?;

    audit::log_record_change(&caller.user, RecordType::Employee, id, Operation::Write);
    Ok(employee)
}

pub fn delete_employee(state: &AppState, caller: &Caller, id: Uuid) -> OrgResult<()> {
    state
        .permissions
        .require(caller, RecordType::Employee, Operation::Delete)?;
    let employee: Employee = state.repo.fetch(id)?;
    ensure_company_access(&state.permissions, caller, Some(employee.company))?;
    state.repo.delete::<Employee>(id)?;

    info!("Employee deleted: {}", id);
    audit::log_record_change(&caller.user, RecordType::Employee, id, Operation::Delete);
    Ok(())
}

pub async fn handle_list_employees(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<EmployeeQuery>,
) -> Result<Json<ApiResponse<Vec<Employee>>>, OrgError> {
    let employees = run_blocking(&state, move |s| list_employees(s, &caller, &query)).await?;
    Ok(Json(ApiResponse::ok(employees)))
}

pub async fn handle_employees_by_department(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(department): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<Employee>>>, OrgError> {
    let employees =
        run_blocking(&state, move |s| get_employees_by_department(s, &caller, department)).await?;
    Ok(Json(ApiResponse::ok(employees)))
}

pub async fn handle_get_employee(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Employee>>, OrgError> {
    let employee = run_blocking(&state, move |s| get_employee(s, &caller, id)).await?;
    Ok(Json(ApiResponse::ok(employee)))
}

pub async fn handle_performance_summary(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<PerformanceSummary>>, OrgError> {
    let summary =
        run_blocking(&state, move |s| get_employee_performance_summary(s, &caller, id)).await?;
    Ok(Json(ApiResponse::ok(summary)))
}

pub async fn handle_create_employee(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<CreateEmployeeRequest>,
) -> Result<Json<ApiResponse<Employee>>, OrgError> {
    let employee = run_blocking(&state, move |s| create_employee(s, &caller, req)).await?;
    Ok(Json(ApiResponse::ok(employee)))
}

pub async fn handle_update_employee(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateEmployeeRequest>,
) -> Result<Json<ApiResponse<Employee>>, OrgError> {
    let employee = run_blocking(&state, move |s| update_employee(s, &caller, id, req)).await?;
    Ok(Json(ApiResponse::ok(employee)))
}

pub async fn handle_delete_employee(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, OrgError> {
    run_blocking(&state, move |s| delete_employee(s, &caller, id)).await?;
    Ok(Json(ApiResponse::message_only("Employee deleted successfully")))
}

pub fn configure_employee_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/employees",
            get(handle_list_employees).post(handle_create_employee),
        )
        .route(
            "/api/employees/:id",
            get(handle_get_employee)
                .patch(handle_update_employee)
                .delete(handle_delete_employee),
        )
        .route(
            "/api/employees/:id/performance-summary",
            get(handle_performance_summary),
        )
        .route(
            "/api/departments/:id/employees",
            get(handle_employees_by_department),
        )
}
