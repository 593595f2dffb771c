pub mod analytics;
pub mod api_router;
pub mod company;
pub mod core;
pub mod department;
pub mod directory;
pub mod employee;
pub mod main_module;
pub mod project;
pub mod review;
pub mod security;

pub use crate::core::error::{OrgError, OrgResult};
pub use crate::core::shared::state::AppState;
