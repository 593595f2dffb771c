use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordType {
    Company,
    Department,
    Employee,
    Project,
    #[serde(rename = "Performance Review")]
    PerformanceReview,
    #[serde(rename = "User Account")]
    UserAccount,
}

impl RecordType {
    pub const ALL: [RecordType; 6] = [
        Self::Company,
        Self::Department,
        Self::Employee,
        Self::Project,
        Self::PerformanceReview,
        Self::UserAccount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Company => "Company",
            Self::Department => "Department",
            Self::Employee => "Employee",
            Self::Project => "Project",
            Self::PerformanceReview => "Performance Review",
            Self::UserAccount => "User Account",
        }
    }

    /// Field holding the owning company, used for company scoping.
    /// A company is scoped by its own id.
    pub fn company_field(&self) -> Option<&'static str> {
        match self {
            Self::Company => Some("id"),
            Self::Department | Self::Employee | Self::Project | Self::UserAccount => {
                Some("company")
            }
            Self::PerformanceReview => None,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "company" => Ok(Self::Company),
            "department" => Ok(Self::Department),
            "employee" => Ok(Self::Employee),
            "project" => Ok(Self::Project),
            "performance review" => Ok(Self::PerformanceReview),
            "user account" => Ok(Self::UserAccount),
            _ => Err(format!("Unknown record type: {s}")),
        }
    }
}

/// A typed document kept in the record store.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const RECORD_TYPE: RecordType;

    fn id(&self) -> Uuid;

    fn company_id(&self) -> Option<Uuid> {
        None
    }
}
