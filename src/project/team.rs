use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use super::Project;
use crate::core::error::{OrgError, OrgResult};
use crate::core::store::Repository;
use crate::employee::Employee;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    pub employee: Uuid,
    pub role: Option<String>,
    pub allocated_hours: Option<f64>,
    pub hourly_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamMemberView {
    pub employee: Uuid,
    pub employee_name: String,
    pub email_address: String,
    pub designation: Option<String>,
    pub role: Option<String>,
    pub allocated_hours: Option<f64>,
    pub hourly_rate: Option<f64>,
}

fn check_company(repo: &Repository, project: &Project, employee: Uuid) -> OrgResult<()> {
    let record: Employee = repo.link(employee)?;
    if record.company != project.company {
        return Err(OrgError::Validation(format!(
            "Employee {employee} does not belong to company {}",
            project.company
        )));
    }
    Ok(())
}

/// Every assigned employee belongs to the project's company and appears once.
pub fn validate_team(repo: &Repository, project: &Project) -> OrgResult<()> {
    let mut seen = HashSet::new();
    for member in &project.assigned_employees {
        if !seen.insert(member.employee) {
            return Err(OrgError::Validation(format!(
                "Employee {} is assigned to this project more than once",
                member.employee
            )));
        }
        check_company(repo, project, member.employee)?;
    }
    Ok(())
}

/// Appends `member`, leaving the team untouched on any violation.
pub fn assign(repo: &Repository, project: &mut Project, member: TeamMember) -> OrgResult<()> {
    if project
        .assigned_employees
        .iter()
        .any(|m| m.employee == member.employee)
    {
        return Err(OrgError::Validation(
            "Employee already assigned to this project".to_string(),
        ));
    }
    check_company(repo, project, member.employee)?;
    project.assigned_employees.push(member);
    Ok(())
}

/// Assigned members joined with their employee records; members whose
/// employee no longer exists are left out.
pub fn team_members(repo: &Repository, project: &Project) -> OrgResult<Vec<TeamMemberView>> {
    let mut members = Vec::with_capacity(project.assigned_employees.len());
    for member in &project.assigned_employees {
        let Some(employee) = repo.get::<Employee>(member.employee)? else {
            continue;
        };
        members.push(TeamMemberView {
            employee: member.employee,
            employee_name: employee.employee_name,
            email_address: employee.email_address,
            designation: employee.designation,
            role: member.role.clone(),
            allocated_hours: member.allocated_hours,
            hourly_rate: member.hourly_rate,
        });
    }
    Ok(members)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::employee::EmployeeStatus;
    use crate::project::{ProjectPriority, ProjectStatus};
    use chrono::Utc;

    fn employee(repo: &Repository, company: Uuid, name: &str) -> Uuid {
        let record = Employee {
            id: Uuid::new_v4(),
            employee_name: name.to_string(),
            email_address: format!("{}@example.com", name.to_lowercase()),
            company,
            department: None,
            designation: Some("Engineer".to_string()),
            phone_number: None,
            status: EmployeeStatus::Active,
            hired_on: None,
            days_employed: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        repo.insert(&record).unwrap();
        record.id
    }

    fn project(company: Uuid) -> Project {
        Project {
            id: Uuid::new_v4(),
            project_name: "Apollo".to_string(),
            company,
            department: None,
            project_manager: None,
            description: None,
            start_date: None,
            end_date: None,
            status: ProjectStatus::Planning,
            budget: None,
            priority: ProjectPriority::Medium,
            assigned_employees: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn member(employee: Uuid) -> TeamMember {
        TeamMember {
            employee,
            role: Some("Developer".to_string()),
            allocated_hours: Some(20.0),
            hourly_rate: None,
        }
    }

    #[test]
    fn test_assign_preserves_order() {
        let repo = Repository::in_memory();
        let company = Uuid::new_v4();
        let a = employee(&repo, company, "Ana");
        let b = employee(&repo, company, "Bo");
        let mut p = project(company);

        assign(&repo, &mut p, member(a)).unwrap();
        assign(&repo, &mut p, member(b)).unwrap();

        let order: Vec<Uuid> = p.assigned_employees.iter().map(|m| m.employee).collect();
        assert_eq!(order, vec![a, b]);
        assert!(validate_team(&repo, &p).is_ok());
    }

    #[test]
    fn test_assign_rejects_duplicate() {
        let repo = Repository::in_memory();
        let company = Uuid::new_v4();
        let a = employee(&repo, company, "Ana");
        let mut p = project(company);
        assign(&repo, &mut p, member(a)).unwrap();

        let err = assign(&repo, &mut p, member(a)).unwrap_err();
        assert_eq!(err.to_string(), "Employee already assigned to this project");
        assert_eq!(p.assigned_employees.len(), 1);
    }

    #[test]
    fn test_assign_rejects_other_company() {
        let repo = Repository::in_memory();
        let company = Uuid::new_v4();
        let outsider = employee(&repo, Uuid::new_v4(), "Eve");
        let mut p = project(company);

        assert!(matches!(
            assign(&repo, &mut p, member(outsider)),
            Err(OrgError::Validation(_))
        ));
        assert!(p.assigned_employees.is_empty());
    }

    #[test]
    fn test_validate_team_catches_smuggled_members() {
        let repo = Repository::in_memory();
        let company = Uuid::new_v4();
        let a = employee(&repo, company, "Ana");
        let outsider = employee(&repo, Uuid::new_v4(), "Eve");

        let mut p = project(company);
        p.assigned_employees = vec![member(a), member(a)];
        assert!(validate_team(&repo, &p).is_err());

        p.assigned_employees = vec![member(a), member(outsider)];
        assert!(validate_team(&repo, &p).is_err());
    }

    #[test]
    fn test_team_members_join_employee_data() {
        let repo = Repository::in_memory();
        let company = Uuid::new_v4();
        let a = employee(&repo, company, "Ana");
        let mut p = project(company);
        assign(&repo, &mut p, member(a)).unwrap();
        p.assigned_employees.push(member(Uuid::new_v4()));

        let team = team_members(&repo, &p).unwrap();
        assert_eq!(team.len(), 1);
        assert_eq!(team[0].employee_name, "Ana");
        assert_eq!(team[0].role.as_deref(), Some("Developer"));
    }
}
