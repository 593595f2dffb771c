//! Role-based access control: the grant table, company scoping and the
//! request caller.

pub mod access;
pub mod caller;
pub mod permissions;
pub mod roles;

pub use access::{ensure_company_access, Scope};
pub use caller::{HEADER_USER_COMPANY, HEADER_USER_EMAIL, HEADER_USER_ROLES};
pub use permissions::{Operation, PermissionTable, PermissionTableError};
pub use roles::{Caller, Role};
