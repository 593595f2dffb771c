use axum::{extract::State, routing::get, Router};
use chrono::{DateTime, NaiveDate, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
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
use crate::core::store::Filter;
use crate::employee::Employee;
use crate::security::{ensure_company_access, Caller, Operation, Scope};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Department {
    pub id: Uuid,
    pub department_name: String,
    pub company: Uuid,
    pub manager: Option<Uuid>,
    pub description: Option<String>,
    pub created_date: Option<NaiveDate>,
    #[serde(default)]
    pub number_of_employees: usize,
    #[serde(default)]
    pub number_of_projects: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Department {
    const RECORD_TYPE: RecordType = RecordType::Department;

    fn id(&self) -> Uuid {
        self.id
    }

    fn company_id(&self) -> Option<Uuid> {
        Some(self.company)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateDepartmentRequest {
    pub department_name: String,
    pub company: Uuid,
    pub manager: Option<Uuid>,
    pub description: Option<String>,
    pub created_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDepartmentRequest {
    pub department_name: Option<String>,
    pub company: Option<Uuid>,
    pub manager: Option<Uuid>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DepartmentQuery {
    pub company: Option<Uuid>,
    pub manager: Option<Uuid>,
}

fn validate(state: &AppState, department: &Department) -> OrgResult<()> {
    if department.department_name.trim().is_empty() {
        return Err(OrgError::Validation(
            "Department name is required".to_string(),
        ));
    }
    state.repo.link::<Company>(department.company)?;
    if let Some(manager) = department.manager {
        let employee: Employee = state.repo.link(manager)?;
        if employee.company != department.company {
            return Err(OrgError::Validation(format!(
                "Manager {manager} does not belong to company {}",
                department.company
            )));
        }
    }
    Ok(())
}

/// Validates, recomputes counts and persists; the owning company is refreshed afterwards.
fn save(state: &AppState, department: &mut Department, previous_company: Option<Uuid>) -> OrgResult<()> {
    validate(state, department)?;
    counters::recompute_department(&state.repo, department)?;
    department.updated_at = Utc::now();
    match previous_company {
        None => state.repo.insert(department)?,
        Some(_) => state.repo.update(department)?,
    }

    counters::on_child_saved(&state.repo, ParentRef::Company(department.company))?;
    if let Some(old) = previous_company.filter(|c| *c != department.company) {
        counters::on_child_saved(&state.repo, ParentRef::Company(old))?;
    }
    Ok(())
}

pub fn list_departments(
    state: &AppState,
    caller: &Caller,
    query: &DepartmentQuery,
) -> OrgResult<Vec<Department>> {
    state
        .permissions
        .require(caller, RecordType::Department, Operation::Read)?;
    let filter = Filter::new()
        .eq_opt("company", query.company)
        .eq_opt("manager", query.manager);
    match Scope::for_caller(&state.permissions, caller).apply(RecordType::Department, filter) {
        Some(filter) => state.repo.list(&filter),
        None => Ok(Vec::new()),
    }
}

pub fn get_departments_by_company(
    state: &AppState,
    caller: &Caller,
    company: Uuid,
) -> OrgResult<Vec<Department>> {
    state
        .permissions
        .require(caller, RecordType::Department, Operation::Read)?;
    ensure_company_access(&state.permissions, caller, Some(company))?;
    state.repo.list(&Filter::new().eq("company", company))
}

pub fn get_department(state: &AppState, caller: &Caller, id: Uuid) -> OrgResult<Department> {
    state
        .permissions
        .require(caller, RecordType::Department, Operation::Read)?;
    let department: Department = state.repo.fetch(id)?;
    ensure_company_access(&state.permissions, caller, Some(department.company))?;
    Ok(department)
}

pub fn create_department(
    state: &AppState,
    caller: &Caller,
    req: CreateDepartmentRequest,
) -> OrgResult<Department> {
    state
        .permissions
        .require(caller, RecordType::Department, Operation::Create)?;
    ensure_company_access(&state.permissions, caller, Some(req.company))?;

    let now = Utc::now();
    let mut department = Department {
        id: Uuid::new_v4(),
        department_name: req.department_name,
        company: req.company,
        manager: req.manager,
        description: req.description,
        created_date: Some(req.created_date.unwrap_or_else(today)),
        number_of_employees: 0,
        number_of_projects: 0,
        created_at: now,
        updated_at: now,
    };
    save(state, &mut department, None)?;

    info!(
        "Department created: {} ({}) in company {}",
        department.department_name, department.id, department.company
    );
    audit::log_record_change(&caller.user, RecordType::Department, department.id, Operation::Create);
    Ok(department)
}

pub fn update_department(
    state: &AppState,
    caller: &Caller,
    id: Uuid,
    req: UpdateDepartmentRequest,
) -> OrgResult<Department> {
    state
        .permissions
        .require(caller, RecordType::Department, Operation::Write)?;
    let mut department: Department = state.repo.fetch(id)?;
    ensure_company_access(&state.permissions, caller, Some(department.company))?;
    let previous_company = department.company;

    if let Some(v) = req.department_name {
        department.department_name = v;
    }
    if let Some(v) = req.company {
        ensure_company_access(&state.permissions, caller, Some(v))?;
        department.company = v;
    }
    if let Some(v) = req.manager {
        department.manager = Some(v);
    }
    if let Some(v) = req.description {
        department.description = Some(v);
    }
    save(state, &mut department, Some(previous_company))?;

    audit::log_record_change(&caller.user, RecordType::Department, id, Operation::Write);
    Ok(department)
}

pub fn delete_department(state: &AppState, caller: &Caller, id: Uuid) -> OrgResult<()> {
    state
        .permissions
        .require(caller, RecordType::Department, Operation::Delete)?;
    let department: Department = state.repo.fetch(id)?;
    ensure_company_access(&state.permissions, caller, Some(department.company))?;
    state.repo.delete::<Department>(id)?;

    info!("Department deleted: {}", id);
    audit::log_record_change(&caller.user, RecordType::Department, id, Operation::Delete);
    Ok(())
}

pub async fn handle_list_departments(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<DepartmentQuery>,
) -> Result<Json<ApiResponse<Vec<Department>>>, OrgError> {
    let departments = run_blocking(&state, move |s| list_departments(s, &caller, &query)).await?;
    Ok(Json(ApiResponse::ok(departments)))
}

pub async fn handle_departments_by_company(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(company): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<Department>>>, OrgError> {
    let departments =
        run_blocking(&state, move |s| get_departments_by_company(s, &caller, company)).await?;
    Ok(Json(ApiResponse::ok(departments)))
}

pub async fn handle_get_department(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Department>>, OrgError> {
    let department = run_blocking(&state, move |s| get_department(s, &caller, id)).await?;
    Ok(Json(ApiResponse::ok(department)))
}

pub async fn handle_create_department(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<CreateDepartmentRequest>,
) -> Result<Json<ApiResponse<Department>>, OrgError> {
    let department = run_blocking(&state, move |s| create_department(s, &caller, req)).await?;
    Ok(Json(ApiResponse::ok(department)))
}

pub async fn handle_update_department(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateDepartmentRequest>,
) -> Result<Json<ApiResponse<Department>>, OrgError> {
    let department =
        run_blocking(&state, move |s| update_department(s, &caller, id, req)).await?;
    Ok(Json(ApiResponse::ok(department)))
}

pub async fn handle_delete_department(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, OrgError> {
    run_blocking(&state, move |s| delete_department(s, &caller, id)).await?;
    Ok(Json(ApiResponse::message_only("Department deleted successfully")))
}

pub fn configure_department_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/departments",
            get(handle_list_departments).post(handle_create_department),
        )
        .route(
            "/api/departments/:id",
            get(handle_get_department)
                .patch(handle_update_department)
                .delete(handle_delete_department),
        )
        .route(
            "/api/companies/:id/departments",
            get(handle_departments_by_company),
        )
}
