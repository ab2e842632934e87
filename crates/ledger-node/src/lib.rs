pub mod api;
pub mod config;

pub use api::{router, ApiError, AppState};
pub use config::NodeConfig;
