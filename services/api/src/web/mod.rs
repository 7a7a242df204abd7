pub mod intake;
pub mod middleware;
pub mod rest;
pub mod state;

pub use middleware::require_identity;
pub use state::AppState;
