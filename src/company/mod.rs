use axum::{extract::State, routing::get, Router};
use chrono::{DateTime, NaiveDate, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::audit;
use crate::core::counters;
use crate::core::error::{OrgError, OrgResult};
use crate::core::shared::extract::{Json, Path};
use crate::core::shared::models::{Record, RecordType};
use crate::core::shared::response::ApiResponse;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::run_blocking;
use crate::core::store::Filter;
use crate::security::{ensure_company_access, Caller, Operation, Scope};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Company {
    pub id: Uuid,
    pub company_name: String,
    pub description: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub established_date: Option<NaiveDate>,
    #[serde(default)]
    pub number_of_departments: usize,
    #[serde(default)]
    pub number_of_employees: usize,
    #[serde(default)]
    pub number_of_projects: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Company {
    const RECORD_TYPE: RecordType = RecordType::Company;

    fn id(&self) -> Uuid {
        self.id
    }

    fn company_id(&self) -> Option<Uuid> {
        Some(self.id)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateCompanyRequest {
    pub company_name: String,
    pub description: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub established_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCompanyRequest {
    pub company_name: Option<String>,
    pub description: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub established_date: Option<NaiveDate>,
}

fn validate(company: &Company) -> OrgResult<()> {
    if company.company_name.trim().is_empty() {
        return Err(OrgError::Validation("Company name is required".to_string()));
    }
    if let Some(email) = company.email.as_deref().filter(|e| !e.is_empty()) {
        if !crate::employee::is_valid_email(email) {
            return Err(OrgError::Validation("Invalid email address".to_string()));
        }
    }
    Ok(())
}

/// Recomputes the derived counts and persists the company.
pub(crate) fn save(state: &AppState, company: &mut Company, is_new: bool) -> OrgResult<()> {
    validate(company)?;
    counters::recompute_company(&state.repo, company)?;
    company.updated_at = Utc::now();
    if is_new {
        state.repo.insert(company)
    } else {
        state.repo.update(company)
    }
}

pub fn list_companies(state: &AppState, caller: &Caller) -> OrgResult<Vec<Company>> {
    state
        .permissions
        .require(caller, RecordType::Company, Operation::Read)?;
    match Scope::for_caller(&state.permissions, caller).apply(RecordType::Company, Filter::new()) {
        Some(filter) => state.repo.list(&filter),
        None => Ok(Vec::new()),
    }
}

pub fn get_company(state: &AppState, caller: &Caller, id: Uuid) -> OrgResult<Company> {
    state
        .permissions
        .require(caller, RecordType::Company, Operation::Read)?;
    let company: Company = state.repo.fetch(id)?;
    ensure_company_access(&state.permissions, caller, Some(company.id))?;
    Ok(company)
}

pub fn create_company(
    state: &AppState,
    caller: &Caller,
    req: CreateCompanyRequest,
) -> OrgResult<Company> {
    state
        .permissions
        .require(caller, RecordType::Company, Operation::Create)?;

    let now = Utc::now();
    let mut company = Company {
        id: Uuid::new_v4(),
        company_name: req.company_name,
        description: req.description,
        email: req.email,
        phone: req.phone,
        website: req.website,
        address_line1: req.address_line1,
        address_line2: req.address_line2,
        city: req.city,
        state: req.state,
        country: req.country,
        postal_code: req.postal_code,
        established_date: req.established_date,
        number_of_departments: 0,
        number_of_employees: 0,
        number_of_projects: 0,
        created_at: now,
        updated_at: now,
    };
    save(state, &mut company, true)?;

    info!("Company created: {} ({})", company.company_name, company.id);
    audit::log_record_change(&caller.user, RecordType::Company, company.id, Operation::Create);
    Ok(company)
}

pub fn update_company(
    state: &AppState,
    caller: &Caller,
    id: Uuid,
    req: UpdateCompanyRequest,
) -> OrgResult<Company> {
    state
        .permissions
        .require(caller, RecordType::Company, Operation::Write)?;
    let mut company: Company = state.repo.fetch(id)?;
    ensure_company_access(&state.permissions, caller, Some(company.id))?;

    if let Some(v) = req.company_name {
        company.company_name = v;
    }
    if let Some(v) = req.description {
        company.description = Some(v);
    }
    if let Some(v) = req.email {
        company.email = Some(v);
    }
    if let Some(v) = req.phone {
        company.phone = Some(v);
    }
    if let Some(v) = req.website {
        company.website = Some(v);
    }
    if let Some(v) = req.address_line1 {
        company.address_line1 = Some(v);
    }
    if let Some(v) = req.address_line2 {
        company.address_line2 = Some(v);
    }
    if let Some(v) = req.city {
        company.city = Some(v);
    }
    if let Some(v) = req.state {
        company.state = Some(v);
    }
    if let Some(v) = req.country {
        company.country = Some(v);
    }
    if let Some(v) = req.postal_code {
        company.postal_code = Some(v);
    }
    if let Some(v) = req.established_date {
        company.established_date = Some(v);
    }
    save(state, &mut company, false)?;

    audit::log_record_change(&caller.user, RecordType::Company, id, Operation::Write);
    Ok(company)
}

pub fn delete_company(state: &AppState, caller: &Caller, id: Uuid) -> OrgResult<()> {
    state
        .permissions
        .require(caller, RecordType::Company, Operation::Delete)?;
    let company: Company = state.repo.fetch(id)?;
    ensure_company_access(&state.permissions, caller, Some(company.id))?;
    state.repo.delete::<Company>(id)?;

    info!("Company deleted: {}", id);
    audit::log_record_change(&caller.user, RecordType::Company, id, Operation::Delete);
    Ok(())
}

pub async fn handle_list_companies(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<Json<ApiResponse<Vec<Company>>>, OrgError> {
    let companies = run_blocking(&state, move |s| list_companies(s, &caller)).await?;
    Ok(Json(ApiResponse::ok(companies)))
}

pub async fn handle_get_company(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Company>>, OrgError> {
    let company = run_blocking(&state, move |s| get_company(s, &caller, id)).await?;
    Ok(Json(ApiResponse::ok(company)))
}

pub async fn handle_create_company(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<CreateCompanyRequest>,
) -> Result<Json<ApiResponse<Company>>, OrgError> {
    let company = run_blocking(&state, move |s| create_company(s, &caller, req)).await?;
    Ok(Json(ApiResponse::ok(company)))
}

pub async fn handle_update_company(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCompanyRequest>,
) -> Result<Json<ApiResponse<Company>>, OrgError> {
    let company = run_blocking(&state, move |s| update_company(s, &caller, id, req)).await?;
    Ok(Json(ApiResponse::ok(company)))
}

pub async fn handle_delete_company(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, OrgError> {
    run_blocking(&state, move |s| delete_company(s, &caller, id)).await?;
    Ok(Json(ApiResponse::message_only("Company deleted successfully")))
}

pub fn configure_company_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/companies",
            get(handle_list_companies).post(handle_create_company),
        )
        .route(
            "/api/companies/:id",
            get(handle_get_company)
                .patch(handle_update_company)
                .delete(handle_delete_company),
        )
}
