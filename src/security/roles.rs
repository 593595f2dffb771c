use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "Company Admin")]
    CompanyAdmin,
    #[serde(rename = "Department Manager")]
    DepartmentManager,
    #[serde(rename = "Employee User")]
    EmployeeUser,
    #[serde(rename = "System Manager")]
    SystemManager,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Self::CompanyAdmin,
        Self::DepartmentManager,
        Self::EmployeeUser,
        Self::SystemManager,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CompanyAdmin => "Company Admin",
            Self::DepartmentManager => "Department Manager",
            Self::EmployeeUser => "Employee User",
            Self::SystemManager => "System Manager",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['_', '-'], " ").as_str() {
            "company admin" => Ok(Self::CompanyAdmin),
            "department manager" => Ok(Self::DepartmentManager),
            "employee user" => Ok(Self::EmployeeUser),
            "system manager" => Ok(Self::SystemManager),
            _ => Err(format!("Unknown role: {s}")),
        }
    }
}

/// The identity a request acts as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user: String,
    pub roles: BTreeSet<Role>,
    pub company: Option<Uuid>,
}

impl Caller {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            roles: BTreeSet::new(),
            company: None,
        }
    }

    /// Unaffiliated identity holding only the System Manager role.
    #[cfg(test)]
    pub fn system() -> Self {
        Self::new("system").with_role(Role::SystemManager)
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.roles.insert(role);
        self
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles.extend(roles);
        self
    }

    pub fn with_company(mut self, company: Uuid) -> Self {
        self.company = Some(company);
        self
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.iter().any(|r| self.roles.contains(r))
    }
}
