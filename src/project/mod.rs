pub mod team;

use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
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
use crate::core::shared::utils::run_blocking;
use crate::core::store::Filter;
use crate::department::Department;
use crate::employee::Employee;
use crate::security::{ensure_company_access, Caller, Operation, Scope};

pub use team::{TeamMember, TeamMemberView};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectStatus {
    #[default]
    Planning,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "On Hold")]
    OnHold,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: Uuid,
    pub project_name: String,
    pub company: Uuid,
    pub department: Option<Uuid>,
    pub project_manager: Option<Uuid>,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: ProjectStatus,
    pub budget: Option<f64>,
    #[serde(default)]
    pub priority: ProjectPriority,
    #[serde(default)]
    pub assigned_employees: Vec<TeamMember>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Project {
    const RECORD_TYPE: RecordType = RecordType::Project;

    fn id(&self) -> Uuid {
        self.id
    }

    fn company_id(&self) -> Option<Uuid> {
        Some(self.company)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateProjectRequest {
    pub project_name: String,
    pub company: Uuid,
    pub department: Option<Uuid>,
    pub project_manager: Option<Uuid>,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<ProjectStatus>,
    pub budget: Option<f64>,
    pub priority: Option<ProjectPriority>,
    #[serde(default)]
    pub assigned_employees: Vec<TeamMember>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProjectRequest {
    pub project_name: Option<String>,
    pub department: Option<Uuid>,
    pub project_manager: Option<Uuid>,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<ProjectStatus>,
    pub budget: Option<f64>,
    pub priority: Option<ProjectPriority>,
    /// Replaces the whole team when present.
    pub assigned_employees: Option<Vec<TeamMember>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectQuery {
    pub company: Option<Uuid>,
    pub department: Option<Uuid>,
    pub status: Option<ProjectStatus>,
    pub priority: Option<ProjectPriority>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignEmployeeRequest {
    pub employee: Uuid,
    pub role: Option<String>,
    pub allocated_hours: Option<f64>,
    pub hourly_rate: Option<f64>,
}

fn validate(state: &AppState, project: &Project) -> OrgResult<()> {
    if project.project_name.trim().is_empty() {
        return Err(OrgError::Validation("Project name is required".to_string()));
    }
    if let (Some(start), Some(end)) = (project.start_date, project.end_date) {
        if end < start {
            return Err(OrgError::Validation(
                "End date cannot be before start date".to_string(),
            ));
        }
    }
    state.repo.link::<Company>(project.company)?;
    if let Some(department) = project.department {
        let dept: Department = state.repo.link(department)?;
        if dept.company != project.company {
            return Err(OrgError::Validation(format!(
                "Department {department} does not belong to company {}",
                project.company
            )));
        }
    }
    if let Some(manager) = project.project_manager {
        let employee: Employee = state.repo.link(manager)?;
        if employee.company != project.company {
            return Err(OrgError::Validation(format!(
                "Project manager {manager} does not belong to company {}",
                project.company
            )));
        }
    }
    team::validate_team(&state.repo, project)
}

/// `previous_department` is `None` for inserts and `Some(old)` for updates.
fn save(
    state: &AppState,
    project: &mut Project,
    previous_department: Option<Option<Uuid>>,
) -> OrgResult<()> {
    validate(state, project)?;
    project.updated_at = Utc::now();
    match previous_department {
        None => state.repo.insert(project)?,
        Some(_) => state.repo.update(project)?,
    }

    if let Some(department) = project.department {
        counters::on_child_saved(&state.repo, ParentRef::Department(department))?;
    }
    if let Some(Some(old)) = previous_department {
        if project.department != Some(old) {
            counters::on_child_saved(&state.repo, ParentRef::Department(old))?;
        }
    }
    Ok(())
}

fn fetch_accessible(state: &AppState, caller: &Caller, id: Uuid) -> OrgResult<Project> {
    let project: Project = state.repo.fetch(id)?;
    ensure_company_access(&state.permissions, caller, Some(project.company))?;
    Ok(project)
}

pub fn list_projects(
    state: &AppState,
    caller: &Caller,
    query: &ProjectQuery,
) -> OrgResult<Vec<Project>> {
    state
        .permissions
        .require(caller, RecordType::Project, Operation::Read)?;
    let filter = Filter::new()
        .eq_opt("company", query.company)
        .eq_opt("department", query.department)
        .eq_opt("status", query.status)
        .eq_opt("priority", query.priority);
    match Scope::for_caller(&state.permissions, caller).apply(RecordType::Project, filter) {
        Some(filter) => state.repo.list(&filter),
        None => Ok(Vec::new()),
    }
}

pub fn get_projects_by_department(
    state: &AppState,
    caller: &Caller,
    department: Uuid,
) -> OrgResult<Vec<Project>> {
    list_projects(
        state,
        caller,
        &ProjectQuery {
            department: Some(department),
            ..Default::default()
        },
    )
}

pub fn get_project(state: &AppState, caller: &Caller, id: Uuid) -> OrgResult<Project> {
    state
        .permissions
        .require(caller, RecordType::Project, Operation::Read)?;
    fetch_accessible(state, caller, id)
}

pub fn get_project_team(
    state: &AppState,
    caller: &Caller,
    id: Uuid,
) -> OrgResult<Vec<TeamMemberView>> {
    let project = get_project(state, caller, id)?;
    team::team_members(&state.repo, &project)
}

pub fn create_project(
    state: &AppState,
    caller: &Caller,
    req: CreateProjectRequest,
) -> OrgResult<Project> {
    state
        .permissions
        .require(caller, RecordType::Project, Operation::Create)?;
    ensure_company_access(&state.permissions, caller, Some(req.company))?;

    let now = Utc::now();
    let mut project = Project {
        id: Uuid::new_v4(),
        project_name: req.project_name,
        company: req.company,
        department: req.department,
        project_manager: req.project_manager,
        description: req.description,
        start_date: req.start_date,
        end_date: req.end_date,
        status: req.status.unwrap_or_default(),
        budget: req.budget,
        priority: req.priority.unwrap_or_default(),
        assigned_employees: req.assigned_employees,
        created_at: now,
        updated_at: now,
    };
    save(state, &mut project, None)?;

    info!("Project created: {} ({})", project.project_name, project.id);
    audit::log_record_change(&caller.user, RecordType::Project, project.id, Operation::Create);
    Ok(project)
}

pub fn update_project(
    state: &AppState,
    caller: &Caller,
    id: Uuid,
    req: UpdateProjectRequest,
) -> OrgResult<Project> {
    state
        .permissions
        .require(caller, RecordType::Project, Operation::Write)?;
    let mut project = fetch_accessible(state, caller, id)?;
    let previous_department = project.department;

    if let Some(v) = req.project_name {
        project.project_name = v;
    }
    if let Some(v) = req.department {
        project.department = Some(v);
    }
    if let Some(v) = req.project_manager {
        project.project_manager = Some(v);
    }
    if let Some(v) = req.description {
        project.description = Some(v);
    }
    if let Some(v) = req.start_date {
        project.start_date = Some(v);
    }
    if let Some(v) = req.end_date {
        project.end_date = Some(v);
    }
    if let Some(v) = req.status {
        project.status = v;
    }
    if let Some(v) = req.budget {
        project.budget = Some(v);
    }
    if let Some(v) = req.priority {
        project.priority = v;
    }
    if let Some(v) = req.assigned_employees {
        project.assigned_employees = v;
    }
    save(state, &mut project, Some(previous_department))?;

    audit::log_record_change(&caller.user, RecordType::Project, id, Operation::Write);
    Ok(project)
}

pub fn assign_employee_to_project(
    state: &AppState,
    caller: &Caller,
    project_id: Uuid,
    req: AssignEmployeeRequest,
) -> OrgResult<Project> {
    state
        .permissions
        .require(caller, RecordType::Project, Operation::Write)?;
    let mut project = fetch_accessible(state, caller, project_id)?;
    let previous_department = project.department;

    team::assign(
        &state.repo,
        &mut project,
        TeamMember {
            employee: req.employee,
            role: req.role,
            allocated_hours: req.allocated_hours,
            hourly_rate: req.hourly_rate,
        },
    )?;
    save(state, &mut project, Some(previous_department))?;

    info!("Employee {} assigned to project {}", req.employee, project_id);
    audit::log_record_change(&caller.user, RecordType::Project, project_id, Operation::Write);
    Ok(project)
}

pub fn delete_project(state: &AppState, caller: &Caller, id: Uuid) -> OrgResult<()> {
    state
        .permissions
        .require(caller, RecordType::Project, Operation::Delete)?;
    fetch_accessible(state, caller, id)?;
    state.repo.delete::<Project>(id)?;

    info!("Project deleted: {}", id);
    audit::log_record_change(&caller.user, RecordType::Project, id, Operation::Delete);
    Ok(())
}

pub async fn handle_list_projects(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<ProjectQuery>,
) -> Result<Json<ApiResponse<Vec<Project>>>, OrgError> {
    let projects = run_blocking(&state, move |s| list_projects(s, &caller, &query)).await?;
    Ok(Json(ApiResponse::ok(projects)))
}

pub async fn handle_projects_by_department(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(department): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<Project>>>, OrgError> {
    let projects =
        run_blocking(&state, move |s| get_projects_by_department(s, &caller, department)).await?;
    Ok(Json(ApiResponse::ok(projects)))
}

pub async fn handle_get_project(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Project>>, OrgError> {
    let project = run_blocking(&state, move |s| get_project(s, &caller, id)).await?;
    Ok(Json(ApiResponse::ok(project)))
}

pub async fn handle_get_project_team(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<TeamMemberView>>>, OrgError> {
    let team = run_blocking(&state, move |s| get_project_team(s, &caller, id)).await?;
    Ok(Json(ApiResponse::ok(team)))
}

pub async fn handle_create_project(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<CreateProjectRequest>,
) -> Result<Json<ApiResponse<Project>>, OrgError> {
    let project = run_blocking(&state, move |s| create_project(s, &caller, req)).await?;
    Ok(Json(ApiResponse::ok(project)))
}

pub async fn handle_update_project(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProjectRequest>,
) -> Result<Json<ApiResponse<Project>>, OrgError> {
    let project = run_blocking(&state, move |s| update_project(s, &caller, id, req)).await?;
    Ok(Json(ApiResponse::ok(project)))
}

pub async fn handle_assign_employee(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<AssignEmployeeRequest>,
) -> Result<Json<ApiResponse<Project>>, OrgError> {
    let project =
        run_blocking(&state, move |s| assign_employee_to_project(s, &caller, id, req)).await?;
    Ok(Json(ApiResponse::ok(project)))
}

pub async fn handle_delete_project(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, OrgError> {
    run_blocking(&state, move |s| delete_project(s, &caller, id)).await?;
    Ok(Json(ApiResponse::message_only("Project deleted successfully")))
}

pub fn configure_project_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/projects",
            get(handle_list_projects).post(handle_create_project),
        )
        .route(
            "/api/projects/:id",
            get(handle_get_project)
                .patch(handle_update_project)
                .delete(handle_delete_project),
        )
        .route("/api/projects/:id/team", get(handle_get_project_team))
        .route("/api/projects/:id/assign", post(handle_assign_employee))
        .route(
            "/api/departments/:id/projects",
            get(handle_projects_by_department),
        )
}
