//! Resolves the request caller from identity headers.
//!
//! `X-User-Email` is required. Roles and company come from `X-User-Roles`
//! (comma separated) and `X-User-Company`; whichever is absent is filled from
//! the caller's user account.

use axum::{extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::roles::{Caller, Role};
use crate::core::error::{OrgError, OrgResult};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::run_blocking;
use crate::directory;

pub const HEADER_USER_EMAIL: &str = "x-user-email";
pub const HEADER_USER_ROLES: &str = "x-user-roles";
pub const HEADER_USER_COMPANY: &str = "x-user-company";

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Unknown role names are dropped with a warning.
pub fn parse_roles(value: &str) -> Vec<Role> {
    value
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .filter_map(|r| match r.parse::<Role>() {
            Ok(role) => Some(role),
            Err(e) => {
                warn!("Ignoring caller role: {}", e);
                None
            }
        })
        .collect()
}

fn parse_company(value: &str) -> OrgResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| OrgError::Validation(format!("Invalid {HEADER_USER_COMPANY} header: {value}")))
}

/// Completes a header-derived caller from the user account, if one exists.
fn complete_from_directory(state: &AppState, mut caller: Caller, need_roles: bool) -> OrgResult<Caller> {
    let Some(account) = directory::find_by_email(&state.repo, &caller.user)? else {
        return Ok(caller);
    };
    if !account.is_active {
        return Err(OrgError::Unauthorized(format!(
            "User account {} is inactive",
            caller.user
        )));
    }
    if need_roles {
        caller.roles.insert(account.effective_role());
    }
    if caller.company.is_none() {
        caller.company = account.company;
    }
    Ok(caller)
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = OrgError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let email = header(parts, HEADER_USER_EMAIL).ok_or_else(|| {
            OrgError::Unauthorized(format!("Missing {HEADER_USER_EMAIL} header"))
        })?;

        let mut caller = Caller::new(email);
        let roles = header(parts, HEADER_USER_ROLES).map(parse_roles);
        let need_roles = roles.as_ref().map_or(true, Vec::is_empty);
        if let Some(roles) = roles {
            caller = caller.with_roles(roles);
        }
        if let Some(company) = header(parts, HEADER_USER_COMPANY) {
            caller = caller.with_company(parse_company(company)?);
        }

        let caller = if need_roles || caller.company.is_none() {
            run_blocking(state, move |s| complete_from_directory(s, caller, need_roles)).await?
        } else {
            caller
        };

        debug!(
            "Request caller user={} roles={:?} company={:?}",
            caller.user, caller.roles, caller.company
        );
        Ok(caller)
    }
}
