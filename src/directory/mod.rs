//! User accounts: the directory the request caller is resolved against.

use axum::{extract::State, routing::get, Router};
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::company::Company;
use crate::core::audit;
use crate::core::error::{OrgError, OrgResult};
use crate::core::shared::extract::{Json, Path, Query};
use crate::core::shared::models::{Record, RecordType};
use crate::core::shared::response::ApiResponse;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::run_blocking;
use crate::core::store::{Filter, Repository};
use crate::employee::is_valid_email;
use crate::security::{ensure_company_access, Caller, Operation, Role, Scope};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserType {
    Admin,
    Manager,
    #[default]
    Employee,
}

impl UserType {
    pub fn default_role(&self) -> Role {
        match self {
            Self::Admin => Role::CompanyAdmin,
            Self::Manager => Role::DepartmentManager,
            Self::Employee => Role::EmployeeUser,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserAccount {
    pub id: Uuid,
    pub full_name: String,
    pub email_address: String,
    #[serde(default)]
    pub user_type: UserType,
    pub role: Option<Role>,
    pub company: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for UserAccount {
    const RECORD_TYPE: RecordType = RecordType::UserAccount;

    fn id(&self) -> Uuid {
        self.id
    }

    fn company_id(&self) -> Option<Uuid> {
        self.company
    }
}

impl UserAccount {
    /// The role this account acts with; falls back to the user type's default.
    pub fn effective_role(&self) -> Role {
        self.role.unwrap_or_else(|| self.user_type.default_role())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateUserRequest {
    pub full_name: String,
    pub email_address: String,
    pub user_type: Option<UserType>,
    pub role: Option<Role>,
    pub company: Option<Uuid>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub email_address: Option<String>,
    pub user_type: Option<UserType>,
    pub role: Option<Role>,
    pub company: Option<Uuid>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserQuery {
    pub company: Option<Uuid>,
    pub user_type: Option<UserType>,
    pub is_active: Option<bool>,
}

/// Looks up an account by email, case-insensitively.
pub fn find_by_email(repo: &Repository, email: &str) -> OrgResult<Option<UserAccount>> {
    let wanted = email.trim().to_lowercase();
    let accounts: Vec<UserAccount> = repo.list(&Filter::new().eq("email_address", &wanted))?;
    Ok(accounts.into_iter().next())
}

fn validate(state: &AppState, account: &UserAccount) -> OrgResult<()> {
    if account.full_name.trim().is_empty() {
        return Err(OrgError::Validation("Full name is required".to_string()));
    }
    if !is_valid_email(&account.email_address) {
        return Err(OrgError::Validation("Invalid email address".to_string()));
    }
    if let Some(existing) = find_by_email(&state.repo, &account.email_address)? {
        if existing.id != account.id {
            return Err(OrgError::Validation(format!(
                "A user with email {} already exists",
                account.email_address
            )));
        }
    }
    if let Some(company) = account.company {
        state.repo.link::<Company>(company)?;
    }
    Ok(())
}

fn save(state: &AppState, account: &mut UserAccount, is_new: bool) -> OrgResult<()> {
    account.email_address = account.email_address.trim().to_lowercase();
    if account.role.is_none() {
        account.role = Some(account.user_type.default_role());
    }
    validate(state, account)?;
    account.updated_at = Utc::now();
    if is_new {
        state.repo.insert(account)
    } else {
        state.repo.update(account)
    }
}

pub fn list_users(
    state: &AppState,
    caller: &Caller,
    query: &UserQuery,
) -> OrgResult<Vec<UserAccount>> {
    state
        .permissions
        .require(caller, RecordType::UserAccount, Operation::Read)?;
    let filter = Filter::new()
        .eq_opt("company", query.company)
        .eq_opt("user_type", query.user_type)
        .eq_opt("is_active", query.is_active);
    match Scope::for_caller(&state.permissions, caller).apply(RecordType::UserAccount, filter) {
        Some(filter) => state.repo.list(&filter),
        None => Ok(Vec::new()),
    }
}

pub fn get_user(state: &AppState, caller: &Caller, id: Uuid) -> OrgResult<UserAccount> {
    state
        .permissions
        .require(caller, RecordType::UserAccount, Operation::Read)?;
    let account: UserAccount = state.repo.fetch(id)?;
    ensure_company_access(&state.permissions, caller, account.company)?;
    Ok(account)
}

pub fn create_user(
    state: &AppState,
    caller: &Caller,
    req: CreateUserRequest,
) -> OrgResult<UserAccount> {
    state
        .permissions
        .require(caller, RecordType::UserAccount, Operation::Create)?;
    ensure_company_access(&state.permissions, caller, req.company)?;

    let now = Utc::now();
    let mut account = UserAccount {
        id: Uuid::new_v4(),
        full_name: req.full_name,
        email_address: req.email_address,
        user_type: req.user_type.unwrap_or_default(),
        role: req.role,
        company: req.company,
        is_active: req.is_active.unwrap_or(true),
        created_at: now,
        updated_at: now,
    };
    save(state, &mut account, true)?;

    info!("User account created: {} ({})", account.email_address, account.id);
    audit::log_record_change(&caller.user, RecordType::UserAccount, account.id, Operation::Create);
    Ok(account)
}

pub fn update_user(
    state: &AppState,
    caller: &Caller,
    id: Uuid,
    req: UpdateUserRequest,
) -> OrgResult<UserAccount> {
    state
        .permissions
        .require(caller, RecordType::UserAccount, Operation::Write)?;
    let mut account: UserAccount = state.repo.fetch(id)?;
    ensure_company_access(&state.permissions, caller, account.company)?;

    if let Some(v) = req.full_name {
        account.full_name = v;
    }
    if let Some(v) = req.email_address {
        account.email_address = v;
    }
    if let Some(v) = req.user_type {
        account.user_type = v;
        if req.role.is_none() {
            account.role = Some(v.default_role());
        }
    }
    if let Some(v) = req.role {
        account.role = Some(v);
    }
    if let Some(v) = req.company {
        ensure_company_access(&state.permissions, caller, Some(v))?;
        account.company = Some(v);
    }
    if let Some(v) = req.is_active {
        account.is_active = v;
    }
    save(state, &mut account, false)?;

    audit::log_record_change(&caller.user, RecordType::UserAccount, id, Operation::Write);
    Ok(account)
}

pub fn delete_user(state: &AppState, caller: &Caller, id: Uuid) -> OrgResult<()> {
    state
        .permissions
        .require(caller, RecordType::UserAccount, Operation::Delete)?;
    let account: UserAccount = state.repo.fetch(id)?;
    ensure_company_access(&state.permissions, caller, account.company)?;
    state.repo.delete::<UserAccount>(id)?;

    info!("User account deleted: {}", id);
    audit::log_record_change(&caller.user, RecordType::UserAccount, id, Operation::Delete);
    Ok(())
}

pub async fn handle_list_users(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<UserQuery>,
) -> Result<Json<ApiResponse<Vec<UserAccount>>>, OrgError> {
    let users = run_blocking(&state, move |s| list_users(s, &caller, &query)).await?;
    Ok(Json(ApiResponse::ok(users)))
}

pub async fn handle_get_user(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<UserAccount>>, OrgError> {
    let user = run_blocking(&state, move |s| get_user(s, &caller, id)).await?;
    Ok(Json(ApiResponse::ok(user)))
}

pub async fn handle_create_user(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<ApiResponse<UserAccount>>, OrgError> {
    let user = run_blocking(&state, move |s| create_user(s, &caller, req)).await?;
    Ok(Json(ApiResponse::ok(user)))
}

pub async fn handle_update_user(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserAccount>>, OrgError> {
    let user = run_blocking(&state, move |s| update_user(s, &caller, id, req)).await?;
    Ok(Json(ApiResponse::ok(user)))
}

pub async fn handle_delete_user(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, OrgError> {
    run_blocking(&state, move |s| delete_user(s, &caller, id)).await?;
    Ok(Json(ApiResponse::message_only("User deleted successfully")))
}

pub fn configure_user_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/users", get(handle_list_users).post(handle_create_user))
        .route(
            "/api/users/:id",
            get(handle_get_user)
                .patch(handle_update_user)
                .delete(handle_delete_user),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::company::{create_company, CreateCompanyRequest};

    fn admin() -> Caller {
        Caller::new("admin@example.com").with_role(Role::CompanyAdmin)
    }

    fn company(state: &AppState) -> Uuid {
        create_company(
            state,
            &admin(),
            CreateCompanyRequest {
                company_name: "Acme".into(),
                ..Default::default()
            },
        )
        .unwrap()
        .id
    }

    #[test]
    fn test_role_defaults_from_user_type() {
        let state = AppState::in_memory().unwrap();
        let manager = create_user(
            &state,
            &admin(),
            CreateUserRequest {
                full_name: "Mo Manager".into(),
                email_address: "Mo@Acme.test".into(),
                user_type: Some(UserType::Manager),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(manager.role, Some(Role::DepartmentManager));
        assert_eq!(manager.email_address, "mo@acme.test");
        assert!(manager.is_active);

        let plain = create_user(
            &state,
            &admin(),
            CreateUserRequest {
                full_name: "Eve".into(),
                email_address: "eve@acme.test".into(),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(plain.effective_role(), Role::EmployeeUser);
    }

    #[test]
    fn test_explicit_role_wins() {
        let state = AppState::in_memory().unwrap();
        let account = create_user(
            &state,
            &admin(),
            CreateUserRequest {
                full_name: "Sam".into(),
                email_address: "sam@acme.test".into(),
                user_type: Some(UserType::Employee),
                role: Some(Role::SystemManager),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(account.role, Some(Role::SystemManager));
    }

    #[test]
    fn test_email_unique_and_valid() {
        let state = AppState::in_memory().unwrap();
        let req = CreateUserRequest {
            full_name: "Ana".into(),
            email_address: "ana@acme.test".into(),
            ..Default::default()
        };
        create_user(&state, &admin(), req.clone()).unwrap();

        let dup = CreateUserRequest {
            email_address: "ANA@acme.test".into(),
            ..req.clone()
        };
        assert!(matches!(
            create_user(&state, &admin(), dup),
            Err(OrgError::Validation(_))
        ));

        let bad = CreateUserRequest {
            email_address: "not-an-email".into(),
            ..req
        };
        assert!(matches!(
            create_user(&state, &admin(), bad),
            Err(OrgError::Validation(_))
        ));
    }

    #[test]
    fn test_find_by_email_is_case_insensitive() {
        let state = AppState::in_memory().unwrap();
        let acme = company(&state);
        let created = create_user(
            &state,
            &admin(),
            CreateUserRequest {
                full_name: "Ana".into(),
                email_address: "ana@acme.test".into(),
                company: Some(acme),
                ..Default::default()
            },
        )
        .unwrap();

        let found = find_by_email(&state.repo, " Ana@ACME.test ").unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(find_by_email(&state.repo, "nobody@acme.test")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_only_admins_create_accounts() {
        let state = AppState::in_memory().unwrap();
        let acme = company(&state);
        let manager = Caller::new("m@acme.test")
            .with_role(Role::DepartmentManager)
            .with_company(acme);
        let err = create_user(
            &state,
            &manager,
            CreateUserRequest {
                full_name: "X".into(),
                email_address: "x@acme.test".into(),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, OrgError::Permission(_)));
    }
}
