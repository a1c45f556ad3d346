//! crates/study_planner_core/src/stage.rs
//!
//! The planning journey's stage. Nothing is stored: the stage is re-derived on
//! every read from the profile score and the current shortlist/lock counts, so
//! undoing an action (e.g. unlocking) can move a user back a stage.

use serde::Serialize;

/// Minimum profile score to move past profile building.
pub const DISCOVERY_THRESHOLD: u8 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    ProfileBuilding = 1,
    UniversityDiscovery = 2,
    UniversityFinalization = 3,
    ApplicationPreparation = 4,
}

impl Stage {
    pub fn number(&self) -> u8 {
        *self as u8
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::ProfileBuilding => "Profile Building",
            Stage::UniversityDiscovery => "University Discovery",
            Stage::UniversityFinalization => "University Finalization",
            Stage::ApplicationPreparation => "Application Preparation",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Stage::ProfileBuilding => "Strengthen your profile with exams and SOP",
            Stage::UniversityDiscovery => "Explore and shortlist universities",
            Stage::UniversityFinalization => "Lock your final university choices",
            Stage::ApplicationPreparation => {
                "Prepare your applications and complete required documents"
            }
        }
    }

    pub fn next_action(&self) -> &'static str {
        match self {
            Stage::ProfileBuilding => "Complete exams and prepare your SOP",
            Stage::UniversityDiscovery => "Talk to AI Counsellor to discover universities",
            Stage::UniversityFinalization => "Lock at least one university to proceed",
            Stage::ApplicationPreparation => "Work on your application tasks and deadlines",
        }
    }

    pub fn info(&self) -> StageInfo {
        StageInfo {
            current_stage: self.number(),
            stage_name: self.name(),
            stage_description: self.description(),
            is_locked: false,
            next_action: self.next_action(),
        }
    }
}

/// Display form of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageInfo {
    pub current_stage: u8,
    pub stage_name: &'static str,
    pub stage_description: &'static str,
    pub is_locked: bool,
    pub next_action: &'static str,
}

/// Highest applicable stage wins: any lock, then any shortlist, then a
/// sufficiently strong profile.
pub fn determine_stage(overall_score: u8, shortlisted_count: i64, locked_count: i64) -> Stage {
    if locked_count > 0 {
        Stage::ApplicationPreparation
    } else if shortlisted_count > 0 {
        Stage::UniversityFinalization
    } else if overall_score >= DISCOVERY_THRESHOLD {
        Stage::UniversityDiscovery
    } else {
        Stage::ProfileBuilding
    }
}
