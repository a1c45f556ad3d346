//! crates/study_planner_core/src/ports.rs
//!
//! Defines the service contracts (traits) the planner core depends on.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    ChatEntry, ListedUniversity, Profile, StatusCounts, Todo, TodoFilter, University,
    UniversityQuery, UniversityStatus, User, UserCredentials, UserUniversity,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Reads and single-statement writes. Anything that changes a user's
/// shortlist goes through [`PlannerStore`] instead.
#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Accounts ---
    async fn create_user(
        &self,
        email: &str,
        hashed_password: &str,
        full_name: &str,
    ) -> PortResult<User>;

    async fn get_user(&self, user_id: Uuid) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Onboarding ---
    async fn upsert_profile(&self, profile: &Profile) -> PortResult<Profile>;

    async fn get_profile(&self, user_id: Uuid) -> PortResult<Option<Profile>>;

    // --- Catalogue ---
    /// Universities passing `query`, in catalogue order, at most `query.limit`.
    async fn search_universities(&self, query: &UniversityQuery) -> PortResult<Vec<University>>;

    // --- Planner reads ---
    async fn list_user_universities(
        &self,
        user_id: Uuid,
        status: UniversityStatus,
    ) -> PortResult<Vec<ListedUniversity>>;

    async fn count_user_universities(&self, user_id: Uuid) -> PortResult<StatusCounts>;

    // --- Todos ---
    async fn insert_todo(&self, todo: &Todo) -> PortResult<()>;

    async fn list_todos(&self, user_id: Uuid, filter: TodoFilter) -> PortResult<Vec<Todo>>;

    async fn get_todo(&self, user_id: Uuid, todo_id: Uuid) -> PortResult<Todo>;

    async fn update_todo(&self, todo: &Todo) -> PortResult<()>;

    async fn delete_todo(&self, user_id: Uuid, todo_id: Uuid) -> PortResult<()>;

    // --- Chat history ---
    async fn append_chat_entries(&self, entries: &[ChatEntry]) -> PortResult<()>;

    /// The newest `limit` entries, returned oldest first.
    async fn recent_chat_entries(&self, user_id: Uuid, limit: usize) -> PortResult<Vec<ChatEntry>>;

    async fn clear_chat_history(&self, user_id: Uuid) -> PortResult<()>;
}

/// Hands out units of work over the planner tables.
#[async_trait]
pub trait PlannerStore: Send + Sync {
    async fn begin(&self) -> PortResult<Box<dyn PlannerTransaction>>;
}

/// One open transaction. Writes are visible to later reads on the same
/// transaction and to nobody else until `commit`.
#[async_trait]
pub trait PlannerTransaction: Send {
    async fn find_profile(&mut self, user_id: Uuid) -> PortResult<Option<Profile>>;

    async fn find_university(&mut self, university_id: Uuid) -> PortResult<Option<University>>;

    /// The relationship for `(user_id, university_id)`, optionally only if it
    /// currently has `status`.
    async fn find_user_university(
        &mut self,
        user_id: Uuid,
        university_id: Uuid,
        status: Option<UniversityStatus>,
    ) -> PortResult<Option<UserUniversity>>;

    /// Fails with [`PortError::Conflict`] if the pair already has a row.
    async fn insert_user_university(&mut self, entry: &UserUniversity) -> PortResult<()>;

    async fn update_user_university_status(
        &mut self,
        id: Uuid,
        status: UniversityStatus,
    ) -> PortResult<()>;

    async fn delete_user_university(&mut self, id: Uuid) -> PortResult<()>;

    async fn insert_todo(&mut self, todo: &Todo) -> PortResult<()>;

    /// Marks the point `rollback_to_savepoint` returns to. Savepoints do not
    /// nest: a new one replaces the previous mark.
    async fn savepoint(&mut self) -> PortResult<()>;

    async fn release_savepoint(&mut self) -> PortResult<()>;

    /// Discards everything since the last `savepoint` and makes the
    /// transaction usable again after a failed statement.
    async fn rollback_to_savepoint(&mut self) -> PortResult<()>;

    /// Fails without committing if an earlier statement left the transaction
    /// unusable, since committing it would silently persist nothing.
    async fn commit(self: Box<Self>) -> PortResult<()>;

    async fn rollback(self: Box<Self>) -> PortResult<()>;
}

/// A prior message handed to the language model as conversation context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub from_user: bool,
    pub text: String,
}

#[async_trait]
pub trait CounsellorModel: Send + Sync {
    /// Generates the counsellor's raw reply text, which may contain an
    /// embedded `[ACTIONS]` or `[DATA]` block.
    async fn generate_reply(
        &self,
        context: &str,
        history: &[ConversationTurn],
        message: &str,
    ) -> PortResult<String>;
}
