pub mod admin;
pub mod auth;
pub mod public;
pub mod responses;
pub mod router;
pub mod scans;
pub mod settings;
pub mod state;

pub use auth::{AuthTokens, AuthUser};
pub use router::build_router;
pub use state::AppState;
