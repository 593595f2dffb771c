//! Denormalized child counts on companies and departments.
//!
//! Counts are recomputed from live queries on every parent save and never
//! trusted. A child save refreshes its direct parent once; the parent save
//! triggered that way does not cascade further. Deletes do not cascade, so a
//! parent's counts stay stale until it is next saved.

use chrono::Utc;
use log::debug;
use uuid::Uuid;

use crate::company::Company;
use crate::core::error::OrgResult;
use crate::core::store::{Filter, Repository};
use crate::department::Department;
use crate::employee::Employee;
use crate::project::Project;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentRef {
    Company(Uuid),
    Department(Uuid),
}

pub fn recompute_company(repo: &Repository, company: &mut Company) -> OrgResult<()> {
    let filter = Filter::new().eq("company", company.id);
    company.number_of_departments = repo.count::<Department>(&filter)?;
    company.number_of_employees = repo.count::<Employee>(&filter)?;
    company.number_of_projects = repo.count::<Project>(&filter)?;
    Ok(())
}

pub fn recompute_department(repo: &Repository, department: &mut Department) -> OrgResult<()> {
    let filter = Filter::new().eq("department", department.id);
    department.number_of_employees = repo.count::<Employee>(&filter)?;
    department.number_of_projects = repo.count::<Project>(&filter)?;
    Ok(())
}

/// Refreshes and saves the parent of a record that was just saved.
pub fn on_child_saved(repo: &Repository, parent: ParentRef) -> OrgResult<()> {
    match parent {
        ParentRef::Company(id) => {
            let Some(mut company) = repo.get::<Company>(id)? else {
                debug!("Skipping count refresh for missing company {id}");
                return Ok(());
            };
            recompute_company(repo, &mut company)?;
            company.updated_at = Utc::now();
            repo.update(&company)
        }
        ParentRef::Department(id) => {
            let Some(mut department) = repo.get::<Department>(id)? else {
                debug!("Skipping count refresh for missing department {id}");
                return Ok(());
            };
            recompute_department(repo, &mut department)?;
            department.updated_at = Utc::now();
            repo.update(&department)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::company::{create_company, CreateCompanyRequest};
    use crate::core::shared::state::AppState;
    use crate::department::{create_department, update_department, CreateDepartmentRequest};
    use crate::employee::{create_employee, delete_employee, CreateEmployeeRequest};
    use crate::security::{Caller, Role};

    fn admin() -> Caller {
        Caller::new("admin@example.com").with_role(Role::CompanyAdmin)
    }

    #[test]
    fn test_department_counts_follow_employees() {
        let state = AppState::in_memory().unwrap();
        let company = create_company(
            &state,
            &admin(),
            CreateCompanyRequest {
                company_name: "Acme".into(),
                ..Default::default()
            },
        )
        .unwrap();
        let department = create_department(
            &state,
            &admin(),
            CreateDepartmentRequest {
                department_name: "Engineering".into(),
                company: company.id,
                ..Default::default()
            },
        )
        .unwrap();

        let mut employees = Vec::new();
        for i in 0..3 {
            let employee = create_employee(
                &state,
                &admin(),
                CreateEmployeeRequest {
                    employee_name: format!("Worker {i}"),
                    email_address: format!("worker{i}@acme.test"),
                    company: company.id,
                    department: Some(department.id),
                    ..Default::default()
                },
            )
            .unwrap();
            employees.push(employee);
        }

        let refreshed: Department = state.repo.fetch(department.id).unwrap();
        assert_eq!(refreshed.number_of_employees, 3);

        let company_now: Company = state.repo.fetch(company.id).unwrap();
        assert_eq!(company_now.number_of_departments, 1);

        delete_employee(&state, &admin(), employees[0].id).unwrap();
        let stale: Department = state.repo.fetch(department.id).unwrap();
        assert_eq!(stale.number_of_employees, 3);

        let saved = update_department(&state, &admin(), department.id, Default::default()).unwrap();
        assert_eq!(saved.number_of_employees, 2);
    }

    #[test]
    fn test_missing_parent_is_ignored() {
        let repo = Repository::in_memory();
        assert!(on_child_saved(&repo, ParentRef::Department(Uuid::new_v4())).is_ok());
        assert!(on_child_saved(&repo, ParentRef::Company(Uuid::new_v4())).is_ok());
    }
}
