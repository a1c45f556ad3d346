pub mod auth;
pub mod counsellor;
pub mod dashboard;
pub mod middleware;
pub mod onboarding;
pub mod rest;
pub mod state;
pub mod todos;
pub mod universities;

// Re-export what the binaries need to build the server.
pub use middleware::{require_auth, require_onboarding};
pub use rest::{api_router, ApiDoc};
