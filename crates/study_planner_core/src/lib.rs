pub mod actions;
pub mod counsellor;
pub mod dashboard;
pub mod domain;
pub mod executor;
pub mod onboarding;
pub mod planner;
pub mod ports;
pub mod recommend;
pub mod scoring;
pub mod stage;
pub mod strength;
pub mod todos;

pub use domain::{
    Category, ChatEntry, ListedUniversity, Profile, Todo, University, User, UserCredentials,
    UserUniversity,
};
pub use executor::{ActionExecutor, ActionReport};
pub use planner::{Planner, PlannerError};
pub use ports::{
    CounsellorModel, DatabaseService, PlannerStore, PlannerTransaction, PortError, PortResult,
};
