pub mod extract;
pub mod models;
pub mod response;
#[cfg(feature = "postgres")]
pub mod schema;
pub mod state;
pub mod utils;

pub use models::{Record, RecordType};
pub use response::ApiResponse;
pub use state::AppState;
