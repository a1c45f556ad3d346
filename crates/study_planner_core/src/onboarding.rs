//! crates/study_planner_core/src/onboarding.rs

use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::domain::{Profile, ProfileError};
use crate::ports::{DatabaseService, PortError};

#[derive(Debug, thiserror::Error)]
pub enum OnboardingError {
    #[error(transparent)]
    Invalid(#[from] ProfileError),
    #[error(transparent)]
    Port(#[from] PortError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OnboardingStatus {
    pub is_complete: bool,
    pub exists: bool,
}

/// Validates and stores the user's single profile, marking it complete.
/// Resubmitting replaces the previous snapshot.
pub async fn submit_onboarding(
    db: &dyn DatabaseService,
    user_id: Uuid,
    mut profile: Profile,
) -> Result<Profile, OnboardingError> {
    profile.validate()?;
    profile.user_id = user_id;
    profile.preferred_countries = profile
        .preferred_countries
        .iter()
        .map(|country| country.trim().to_string())
        .filter(|country| !country.is_empty())
        .collect();
    profile.completed_at = Some(Utc::now());

    let stored = db.upsert_profile(&profile).await?;
    info!("Onboarding completed for user {}", user_id);
    Ok(stored)
}

pub async fn onboarding_status(
    db: &dyn DatabaseService,
    user_id: Uuid,
) -> Result<OnboardingStatus, PortError> {
    let profile = db.get_profile(user_id).await?;
    Ok(OnboardingStatus {
        is_complete: profile.as_ref().is_some_and(|p| p.completed_at.is_some()),
        exists: profile.is_some(),
    })
}

/// The completed profile, or `NotFound` while onboarding is outstanding.
pub async fn require_profile(
    db: &dyn DatabaseService,
    user_id: Uuid,
) -> Result<Profile, PortError> {
    db.get_profile(user_id)
        .await?
        .filter(|profile| profile.completed_at.is_some())
        .ok_or_else(|| PortError::NotFound(format!("Onboarding profile for user {user_id}")))
}
