pub mod admin;
pub mod health;
pub mod query;
pub mod response;

pub use admin::{AdminService, admin_routes};
pub use health::{AppStartTime, HealthService, health_routes};
pub use query::{QueryService, query_routes};
pub use response::{ApiResponse, ErrorCode};
