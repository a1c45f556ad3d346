//! crates/study_planner_core/src/planner.rs
//!
//! Lifecycle of a user's relationship to a university:
//!
//! ```text
//! (absent) --shortlist--> shortlisted --lock--> locked
//!     ^                       |   ^               |
//!     +-------remove----------+   +----unlock-----+
//! ```
//!
//! There is at most one row per (user, university). A locked row can only go
//! back to shortlisted; it must be unlocked before it can be removed.

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use crate::domain::{Category, ListedUniversity, University, UniversityStatus, UserUniversity};
use crate::ports::{PlannerStore, PlannerTransaction, PortError};
use crate::scoring::{categorize_university, generate_fit_analysis};

#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("University already in your list")]
    AlreadyListed,
    #[error("University not found")]
    UniversityNotFound,
    #[error("Onboarding must be completed first")]
    ProfileMissing,
    #[error("University must be shortlisted first")]
    NotShortlisted,
    #[error("Locked university not found")]
    NotLocked,
    #[error("Shortlisted university not found")]
    NotInShortlist,
    #[error(transparent)]
    Port(#[from] PortError),
}

pub type PlannerResult<T> = Result<T, PlannerError>;

/// Creates a shortlisted row with a freshly computed analysis. The stored
/// category is `requested` when given, otherwise the computed one; likelihood
/// and fit text always come from the computed analysis.
pub async fn shortlist_in(
    tx: &mut dyn PlannerTransaction,
    user_id: Uuid,
    university_id: Uuid,
    requested: Option<Category>,
) -> PlannerResult<ListedUniversity> {
    if tx
        .find_user_university(user_id, university_id, None)
        .await?
        .is_some()
    {
        return Err(PlannerError::AlreadyListed);
    }

    let university = tx
        .find_university(university_id)
        .await?
        .ok_or(PlannerError::UniversityNotFound)?;
    let profile = tx
        .find_profile(user_id)
        .await?
        .ok_or(PlannerError::ProfileMissing)?;

    let (computed, acceptance) = categorize_university(&profile, &university);
    let analysis = generate_fit_analysis(&profile, &university, computed, acceptance);
    let now = Utc::now();

    let entry = UserUniversity {
        id: Uuid::new_v4(),
        user_id,
        university_id,
        status: UniversityStatus::Shortlisted,
        category: requested.unwrap_or(computed),
        acceptance_likelihood: acceptance,
        fit_reason: analysis.fit_reason(),
        risk_factors: analysis.risk_summary(),
        created_at: now,
        updated_at: now,
    };

    match tx.insert_user_university(&entry).await {
        Ok(()) => Ok(ListedUniversity { entry, university }),
        // Lost a race with a concurrent request for the same pair. The failed
        // insert leaves the transaction unusable until the caller rolls back.
        Err(PortError::Conflict(_)) => Err(PlannerError::AlreadyListed),
        Err(err) => Err(err.into()),
    }
}

/// Moves a shortlisted row to locked.
pub async fn lock_in(
    tx: &mut dyn PlannerTransaction,
    user_id: Uuid,
    university_id: Uuid,
) -> PlannerResult<University> {
    let entry = tx
        .find_user_university(user_id, university_id, Some(UniversityStatus::Shortlisted))
        .await?
        .ok_or(PlannerError::NotShortlisted)?;
    let university = tx
        .find_university(university_id)
        .await?
        .ok_or(PlannerError::UniversityNotFound)?;

    tx.update_user_university_status(entry.id, UniversityStatus::Locked)
        .await?;
    Ok(university)
}

/// Moves a locked row back to shortlisted.
pub async fn unlock_in(
    tx: &mut dyn PlannerTransaction,
    user_id: Uuid,
    university_id: Uuid,
) -> PlannerResult<()> {
    let entry = tx
        .find_user_university(user_id, university_id, Some(UniversityStatus::Locked))
        .await?
        .ok_or(PlannerError::NotLocked)?;
    tx.update_user_university_status(entry.id, UniversityStatus::Shortlisted)
        .await?;
    Ok(())
}

/// Deletes a shortlisted row. Locked rows are left alone.
pub async fn remove_in(
    tx: &mut dyn PlannerTransaction,
    user_id: Uuid,
    university_id: Uuid,
) -> PlannerResult<()> {
    let entry = tx
        .find_user_university(user_id, university_id, Some(UniversityStatus::Shortlisted))
        .await?
        .ok_or(PlannerError::NotInShortlist)?;
    tx.delete_user_university(entry.id).await?;
    Ok(())
}

/// Commits on success, rolls back on failure.
async fn finish<T>(
    tx: Box<dyn PlannerTransaction>,
    result: PlannerResult<T>,
) -> PlannerResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!("Rollback after planner error failed: {:?}", rollback_err);
            }
            Err(err)
        }
    }
}

/// Single-operation entry points, each in its own transaction.
pub struct Planner<'a> {
    store: &'a dyn PlannerStore,
}

impl<'a> Planner<'a> {
    pub fn new(store: &'a dyn PlannerStore) -> Self {
        Self { store }
    }

    pub async fn shortlist(
        &self,
        user_id: Uuid,
        university_id: Uuid,
        category: Option<Category>,
    ) -> PlannerResult<ListedUniversity> {
        let mut tx = self.store.begin().await?;
        let result = shortlist_in(tx.as_mut(), user_id, university_id, category).await;
        finish(tx, result).await
    }

    pub async fn lock(&self, user_id: Uuid, university_id: Uuid) -> PlannerResult<University> {
        let mut tx = self.store.begin().await?;
        let result = lock_in(tx.as_mut(), user_id, university_id).await;
        finish(tx, result).await
    }

    pub async fn unlock(&self, user_id: Uuid, university_id: Uuid) -> PlannerResult<()> {
        let mut tx = self.store.begin().await?;
        let result = unlock_in(tx.as_mut(), user_id, university_id).await;
        finish(tx, result).await
    }

    pub async fn remove(&self, user_id: Uuid, university_id: Uuid) -> PlannerResult<()> {
        let mut tx = self.store.begin().await?;
        let result = remove_in(tx.as_mut(), user_id, university_id).await;
        finish(tx, result).await
    }
}
