use tracing::debug;
use uuid::Uuid;

use super::permissions::PermissionTable;
use super::roles::Caller;
use crate::core::audit;
use crate::core::error::{OrgError, OrgResult};
use crate::core::shared::models::RecordType;
use crate::core::store::Filter;

/// Which companies' records a caller may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    Company(Uuid),
    Nothing,
}

impl Scope {
    pub fn for_caller(table: &PermissionTable, caller: &Caller) -> Self {
        if table.is_scope_exempt(caller) {
            return Self::All;
        }
        match caller.company {
            Some(company) => Self::Company(company),
            None => Self::Nothing,
        }
    }

    pub fn allows(&self, company: Option<Uuid>) -> bool {
        match (self, company) {
            (Self::All, _) => true,
            (_, None) => true,
            (Self::Company(own), Some(c)) => *own == c,
            (Self::Nothing, Some(_)) => false,
        }
    }

    /// Narrows `filter` to this scope; `None` means the query can match nothing.
    pub fn apply(&self, record_type: RecordType, filter: Filter) -> Option<Filter> {
        match (self, record_type.company_field()) {
            (Self::All, _) | (_, None) => Some(filter),
            (Self::Company(company), Some(field)) => Some(filter.eq(field, company)),
            (Self::Nothing, Some(_)) => None,
        }
    }
}

/// Direct reads and writes get the same company check as list queries.
pub fn ensure_company_access(
    table: &PermissionTable,
    caller: &Caller,
    company: Option<Uuid>,
) -> OrgResult<()> {
    if Scope::for_caller(table, caller).allows(company) {
        return Ok(());
    }
    debug!(
        "Company scope violation: user={} company={:?}",
        caller.user, company
    );
    audit::log_security_event(
        "company_scope_violation",
        &caller.user,
        &format!("record company {company:?}"),
    );
    Err(OrgError::Permission(
        "You can only access data for your company".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::roles::Role;
    use serde_json::json;

    #[test]
    fn test_scope_for_callers() {
        let table = PermissionTable::builtin().unwrap();
        let company = Uuid::new_v4();

        let admin = Caller::new("a").with_role(Role::CompanyAdmin);
        assert_eq!(Scope::for_caller(&table, &admin), Scope::All);

        let manager = Caller::new("m")
            .with_role(Role::DepartmentManager)
            .with_company(company);
        assert_eq!(Scope::for_caller(&table, &manager), Scope::Company(company));

        let loner = Caller::new("l").with_role(Role::EmployeeUser);
        assert_eq!(Scope::for_caller(&table, &loner), Scope::Nothing);
    }

    #[test]
    fn test_scope_apply_filters_by_company_field() {
        let company = Uuid::new_v4();
        let other = Uuid::new_v4();
        let scope = Scope::Company(company);

        let filter = scope.apply(RecordType::Employee, Filter::new()).unwrap();
        assert!(filter.matches(&json!({"company": company})));
        assert!(!filter.matches(&json!({"company": other})));

        let filter = scope.apply(RecordType::Company, Filter::new()).unwrap();
        assert!(filter.matches(&json!({"id": company})));

        assert!(Scope::Nothing.apply(RecordType::Project, Filter::new()).is_none());
    }

    #[test]
    fn test_ensure_company_access() {
        let table = PermissionTable::builtin().unwrap();
        let company = Uuid::new_v4();
        let caller = Caller::new("e")
            .with_role(Role::EmployeeUser)
            .with_company(company);

        assert!(ensure_company_access(&table, &caller, Some(company)).is_ok());
        assert!(ensure_company_access(&table, &caller, None).is_ok());
        let err = ensure_company_access(&table, &caller, Some(Uuid::new_v4())).unwrap_err();
        assert_eq!(err.to_string(), "You can only access data for your company");
    }
}
