#![allow(dead_code)]

use orgserver::company::{create_company, CreateCompanyRequest};
use orgserver::employee::{create_employee, CreateEmployeeRequest, Employee};
use orgserver::security::{Caller, Role};
use orgserver::AppState;
use uuid::Uuid;

pub fn admin() -> Caller {
    Caller::new("admin@example.com").with_role(Role::CompanyAdmin)
}

pub fn manager(company: Uuid, email: &str) -> Caller {
    Caller::new(email)
        .with_role(Role::DepartmentManager)
        .with_company(company)
}

pub fn employee_user(company: Uuid, email: &str) -> Caller {
    Caller::new(email)
        .with_role(Role::EmployeeUser)
        .with_company(company)
}

pub fn state() -> AppState {
    AppState::in_memory().expect("in-memory state")
}

pub fn company(state: &AppState, name: &str) -> Uuid {
    create_company(
        state,
        &admin(),
        CreateCompanyRequest {
            company_name: name.to_string(),
            ..Default::default()
        },
    )
    .expect("company")
    .id
}

pub fn hire(state: &AppState, company: Uuid, email: &str) -> Employee {
    create_employee(
        state,
        &admin(),
        CreateEmployeeRequest {
            employee_name: email.split('@').next().unwrap_or("someone").to_string(),
            email_address: email.to_string(),
            company,
            ..Default::default()
        },
    )
    .expect("employee")
}
