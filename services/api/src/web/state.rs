//! services/api/src/web/state.rs
//!
//! Defines the application state shared by every handler.

use crate::config::Config;
use std::sync::Arc;
use study_planner_core::ports::{CounsellorModel, DatabaseService, PlannerStore};

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    /// Transactional access to the planner tables. Usually the same adapter as `db`.
    pub store: Arc<dyn PlannerStore>,
    pub counsellor_model: Arc<dyn CounsellorModel>,
    pub config: Arc<Config>,
}
