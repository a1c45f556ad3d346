//! crates/study_planner_core/src/executor.rs
//!
//! Applies counsellor actions to the planner state.
//!
//! A batch runs inside one transaction and each action inside its own
//! savepoint. An action that does not apply is rolled back to its savepoint and
//! the batch moves on with the transaction still usable. The transaction is
//! committed once at the end; if that commit fails, or a savepoint cannot be
//! managed, the whole batch is lost and the report says so.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::actions::{decode_actions, ActionDecodeError, ChatAction};
use crate::domain::{Todo, TodoCategory, TodoPriority};
use crate::planner::{lock_in, shortlist_in, PlannerError};
use crate::ports::{PlannerStore, PlannerTransaction, PortError};

pub const COMMIT_FAILED: &str = "Database error during commit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The change was staged and committed.
    Applied,
    /// A precondition did not hold (already listed, not shortlisted, ...).
    Skipped,
    /// The request itself was malformed.
    Rejected,
    /// Unexpected error while applying this action.
    Failed,
    /// Staged, but lost when the batch commit failed.
    RolledBack,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionOutcome {
    pub kind: String,
    pub status: OutcomeStatus,
    pub message: String,
}

impl ActionOutcome {
    fn new(kind: &str, status: OutcomeStatus, message: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            status,
            message: message.into(),
        }
    }

    fn failed(kind: &str) -> Self {
        Self::new(kind, OutcomeStatus::Failed, format!("Failed to execute action {kind}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionReport {
    /// One entry per recognised action, in input order.
    pub outcomes: Vec<ActionOutcome>,
    pub committed: bool,
}

impl ActionReport {
    /// Human-readable result lines for the chat transcript.
    pub fn lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .outcomes
            .iter()
            .map(|outcome| outcome.message.clone())
            .collect();
        if !self.committed {
            lines.push(COMMIT_FAILED.to_string());
        }
        lines
    }

    pub fn applied(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == OutcomeStatus::Applied)
            .count()
    }
}

pub struct ActionExecutor<'a> {
    store: &'a dyn PlannerStore,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(store: &'a dyn PlannerStore) -> Self {
        Self { store }
    }

    /// Decodes and applies `raw` actions for `user_id`. Unrecognised action
    /// types produce no outcome at all.
    pub async fn execute(&self, user_id: Uuid, raw: &[Value]) -> ActionReport {
        let decoded = decode_actions(raw);
        if decoded.is_empty() {
            return ActionReport {
                outcomes: Vec::new(),
                committed: true,
            };
        }

        let mut tx = match self.store.begin().await {
            Ok(tx) => tx,
            Err(err) => {
                error!("Could not open a transaction for {} actions: {:?}", decoded.len(), err);
                let outcomes = decoded
                    .iter()
                    .map(|action| match action {
                        Ok(action) => ActionOutcome::failed(action.kind()),
                        Err(err) => ActionOutcome::failed(err.kind()),
                    })
                    .collect();
                return ActionReport {
                    outcomes,
                    committed: false,
                };
            }
        };

        let mut outcomes = Vec::with_capacity(decoded.len());
        let mut usable = true;
        for action in decoded {
            let outcome = match action {
                Err(err) => reject(err),
                Ok(action) if usable => {
                    match apply_isolated(tx.as_mut(), user_id, &action).await {
                        Ok(outcome) => outcome,
                        Err(err) => {
                            error!("Savepoint for {} action failed: {:?}", action.kind(), err);
                            usable = false;
                            ActionOutcome::failed(action.kind())
                        }
                    }
                }
                Ok(action) => ActionOutcome::failed(action.kind()),
            };
            outcomes.push(outcome);
        }

        let finished = if usable {
            tx.commit().await
        } else {
            if let Err(err) = tx.rollback().await {
                warn!("Rollback of abandoned action batch failed: {:?}", err);
            }
            Err(PortError::Unexpected("action batch abandoned".to_string()))
        };
        let committed = match finished {
            Ok(()) => true,
            Err(err) => {
                error!("Commit of action batch for user {} failed: {:?}", user_id, err);
                for outcome in outcomes
                    .iter_mut()
                    .filter(|outcome| outcome.status == OutcomeStatus::Applied)
                {
                    outcome.status = OutcomeStatus::RolledBack;
                }
                false
            }
        };

        let report = ActionReport {
            outcomes,
            committed,
        };
        if committed {
            info!(
                "Applied {} of {} counsellor actions for user {}",
                report.applied(),
                report.outcomes.len(),
                user_id
            );
        }
        report
    }
}

fn reject(err: ActionDecodeError) -> ActionOutcome {
    warn!("Rejected malformed {} action: {}", err.kind(), err);
    ActionOutcome::new(err.kind(), OutcomeStatus::Rejected, format!("Error: {err}"))
}

/// Maps a planner precondition to a reported skip; anything else is a failure.
fn planner_outcome(kind: &str, err: PlannerError) -> ActionOutcome {
    match err {
        PlannerError::AlreadyListed
        | PlannerError::UniversityNotFound
        | PlannerError::NotShortlisted => {
            ActionOutcome::new(kind, OutcomeStatus::Skipped, err.to_string())
        }
        other => {
            error!("Action {} failed: {:?}", kind, other);
            ActionOutcome::failed(kind)
        }
    }
}

/// Runs one action inside a savepoint. Anything short of `Applied` is rolled
/// back to the savepoint so later actions see a usable transaction.
async fn apply_isolated(
    tx: &mut dyn PlannerTransaction,
    user_id: Uuid,
    action: &ChatAction,
) -> Result<ActionOutcome, PortError> {
    tx.savepoint().await?;
    let outcome = apply(tx, user_id, action).await;
    if outcome.status == OutcomeStatus::Applied {
        tx.release_savepoint().await?;
    } else {
        tx.rollback_to_savepoint().await?;
    }
    Ok(outcome)
}

async fn apply(
    tx: &mut dyn PlannerTransaction,
    user_id: Uuid,
    action: &ChatAction,
) -> ActionOutcome {
    let kind = action.kind();
    match action {
        ChatAction::ShortlistUniversity {
            university_id,
            category,
        } => match shortlist_in(tx, user_id, *university_id, *category).await {
            Ok(listed) => ActionOutcome::new(
                kind,
                OutcomeStatus::Applied,
                format!("Shortlisted {}", listed.university.name),
            ),
            Err(err) => planner_outcome(kind, err),
        },
        ChatAction::LockUniversity { university_id } => {
            match lock_in(tx, user_id, *university_id).await {
                Ok(university) => ActionOutcome::new(
                    kind,
                    OutcomeStatus::Applied,
                    format!("Locked {}", university.name),
                ),
                Err(err) => planner_outcome(kind, err),
            }
        }
        ChatAction::CreateTodo {
            title,
            description,
            category,
            priority,
        } => match create_todo_in(tx, user_id, title, description.clone(), *category, *priority)
            .await
        {
            Ok(()) => ActionOutcome::new(
                kind,
                OutcomeStatus::Applied,
                format!("Created task: {title}"),
            ),
            Err(err) => {
                error!("Action {} failed: {:?}", kind, err);
                ActionOutcome::failed(kind)
            }
        },
    }
}

async fn create_todo_in(
    tx: &mut dyn PlannerTransaction,
    user_id: Uuid,
    title: &str,
    description: Option<String>,
    category: TodoCategory,
    priority: TodoPriority,
) -> Result<(), PortError> {
    let todo = Todo {
        id: Uuid::new_v4(),
        user_id,
        university_id: None,
        title: title.to_string(),
        description,
        category,
        priority,
        deadline: None,
        is_complete: false,
        completed_at: None,
        created_at: Utc::now(),
    };
    tx.insert_todo(&todo).await
}
