//! Static role/record-type/operation grant table.
//!
//! Loaded once at startup from TOML and immutable afterwards. Unknown roles,
//! record types or operations are logged and skipped rather than failing the
//! whole table.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

use super::roles::{Caller, Role};
use crate::core::audit;
use crate::core::error::{OrgError, OrgResult};
use crate::core::shared::models::RecordType;

const BUILTIN_PERMISSIONS: &str = include_str!("../../config/permissions.toml");
const WILDCARD: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Read,
    Write,
    Create,
    Delete,
    Submit,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Self::Read,
        Self::Write,
        Self::Create,
        Self::Delete,
        Self::Submit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Submit => "submit",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "create" => Ok(Self::Create),
            "delete" => Ok(Self::Delete),
            "submit" => Ok(Self::Submit),
            _ => Err(format!("Unknown operation: {s}")),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PermissionTableError {
    #[error("Failed to read permission table {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid permission table: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Deserialize)]
struct RawTable {
    #[serde(default)]
    scope_exempt_roles: Vec<String>,
    #[serde(default)]
    grant: Vec<RawGrant>,
}

#[derive(Debug, Deserialize)]
struct RawGrant {
    record_type: String,
    role: String,
    #[serde(default)]
    operations: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PermissionTable {
    grants: HashMap<(RecordType, Role), HashSet<Operation>>,
    scope_exempt: HashSet<Role>,
}

impl PermissionTable {
    /// The table shipped with the binary.
    pub fn builtin() -> Result<Self, PermissionTableError> {
        Self::from_toml(BUILTIN_PERMISSIONS)
    }

    pub fn load(path: &Path) -> Result<Self, PermissionTableError> {
        let content = std::fs::read_to_string(path).map_err(|source| PermissionTableError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, PermissionTableError> {
        let raw: RawTable = toml::from_str(content)?;
        let mut table = Self::default();

        for name in &raw.scope_exempt_roles {
            match name.parse::<Role>() {
                Ok(role) => {
                    table.scope_exempt.insert(role);
                }
                Err(e) => warn!("Skipping scope exemption: {e}"),
            }
        }

        for grant in raw.grant {
            table.add_grant(&grant);
        }

        debug!(
            "Permission table loaded: {} grants, {} scope-exempt roles",
            table.grants.len(),
            table.scope_exempt.len()
        );
        Ok(table)
    }

    fn add_grant(&mut self, grant: &RawGrant) {
        let role = match grant.role.parse::<Role>() {
            Ok(role) => role,
            Err(e) => {
                warn!("Skipping grant for {}: {e}", grant.record_type);
                return;
            }
        };

        let record_types: Vec<RecordType> = if grant.record_type == WILDCARD {
            RecordType::ALL.to_vec()
        } else {
            match grant.record_type.parse::<RecordType>() {
                Ok(rt) => vec![rt],
                Err(e) => {
                    warn!("Skipping grant for {role}: {e}");
                    return;
                }
            }
        };

        let mut operations = HashSet::new();
        for op in &grant.operations {
            if op == WILDCARD {
                operations.extend(Operation::ALL);
                continue;
            }
            match op.parse::<Operation>() {
                Ok(op) => {
                    operations.insert(op);
                }
                Err(e) => warn!("Skipping operation in grant {role}/{}: {e}", grant.record_type),
            }
        }

        for rt in record_types {
            self.grants
                .entry((rt, role))
                .or_default()
                .extend(operations.iter().copied());
        }
    }

    pub fn authorize<'a>(
        &self,
        roles: impl IntoIterator<Item = &'a Role>,
        record_type: RecordType,
        operation: Operation,
    ) -> bool {
        roles.into_iter().any(|role| {
            self.grants
                .get(&(record_type, *role))
                .is_some_and(|ops| ops.contains(&operation))
        })
    }

    /// Fails with a permission error, before any data access, unless one of the caller's roles holds the grant.
    pub fn require(
        &self,
        caller: &Caller,
        record_type: RecordType,
        operation: Operation,
    ) -> OrgResult<()> {
        if self.authorize(&caller.roles, record_type, operation) {
            return Ok(());
        }
        warn!(
            "Permission denied: user={} type={} operation={}",
            caller.user, record_type, operation
        );
        audit::log_security_event(
            "permission_denied",
            &caller.user,
            &format!("{operation} on {record_type}"),
        );
        Err(OrgError::insufficient_permissions())
    }

    pub fn is_scope_exempt(&self, caller: &Caller) -> bool {
        caller.roles.iter().any(|r| self.scope_exempt.contains(r))
    }

    pub fn operations_for(&self, role: Role, record_type: RecordType) -> Vec<Operation> {
        let mut ops: Vec<Operation> = self
            .grants
            .get(&(record_type, role))
            .map(|ops| ops.iter().copied().collect())
            .unwrap_or_default();
        ops.sort();
        ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Operation::*;

    fn ops(table: &PermissionTable, role: Role, rt: RecordType) -> Vec<Operation> {
        table.operations_for(role, rt)
    }

    #[test]
    fn test_builtin_matrix() {
        let table = PermissionTable::builtin().unwrap();

        assert_eq!(
            ops(&table, Role::CompanyAdmin, RecordType::PerformanceReview),
            vec![Read, Write, Create, Delete, Submit]
        );
        assert_eq!(
            ops(&table, Role::DepartmentManager, RecordType::PerformanceReview),
            vec![Read, Write, Create, Submit]
        );
        assert_eq!(
            ops(&table, Role::DepartmentManager, RecordType::Department),
            vec![Read, Write]
        );
        assert_eq!(
            ops(&table, Role::DepartmentManager, RecordType::Employee),
            vec![Read, Write, Create]
        );
        assert_eq!(ops(&table, Role::EmployeeUser, RecordType::Project), vec![Read]);
        assert_eq!(ops(&table, Role::DepartmentManager, RecordType::Company), vec![Read]);
        for rt in RecordType::ALL {
            assert_eq!(ops(&table, Role::SystemManager, rt), Operation::ALL.to_vec());
        }
    }

    #[test]
    fn test_authorize_any_role() {
        let table = PermissionTable::builtin().unwrap();
        let roles = [Role::EmployeeUser, Role::DepartmentManager];

        assert!(table.authorize(&roles, RecordType::Employee, Create));
        assert!(!table.authorize(&roles, RecordType::Employee, Delete));
        let none: [Role; 0] = [];
        assert!(!table.authorize(&none, RecordType::Employee, Read));
    }

    #[test]
    fn test_require_denies_with_message() {
        let table = PermissionTable::builtin().unwrap();
        let caller = Caller::new("e@example.com").with_role(Role::EmployeeUser);

        let err = table
            .require(&caller, RecordType::Company, Delete)
            .unwrap_err();
        assert!(matches!(err, OrgError::Permission(_)));
        assert_eq!(err.to_string(), "Insufficient permissions");
        assert!(table.require(&caller, RecordType::Company, Read).is_ok());
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let table = PermissionTable::from_toml(
            r#"
            scope_exempt_roles = ["Company Admin", "Overlord"]

            [[grant]]
            record_type = "Invoice"
            role = "Company Admin"
            operations = ["read"]

            [[grant]]
            record_type = "Project"
            role = "Intern"
            operations = ["read"]

            [[grant]]
            record_type = "Project"
            role = "Employee User"
            operations = ["read", "fly"]
            "#,
        )
        .unwrap();

        assert_eq!(ops(&table, Role::EmployeeUser, RecordType::Project), vec![Read]);
        assert!(table.is_scope_exempt(&Caller::new("a").with_role(Role::CompanyAdmin)));
        assert!(!table.is_scope_exempt(&Caller::new("b").with_role(Role::EmployeeUser)));
    }

    #[test]
    fn test_unparseable_table_fails() {
        assert!(matches!(
            PermissionTable::from_toml("grant = 5 = 6"),
            Err(PermissionTableError::Parse(_))
        ));
    }
}
