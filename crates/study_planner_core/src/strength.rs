//! crates/study_planner_core/src/strength.rs
//!
//! Profile strength: a coarse readiness read-out of an onboarding snapshot.

use serde::Serialize;

use crate::domain::{DegreeType, ExamRecord, Profile, SopStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AcademicTier {
    Strong,
    Average,
    Weak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamReadiness {
    Completed,
    InProgress,
    NotStarted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProfileStrength {
    pub academic: AcademicTier,
    pub exams: ExamReadiness,
    pub sop: SopStatus,
    /// 0..=100, the sum of the three tier contributions.
    pub overall_score: u8,
}

impl AcademicTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            AcademicTier::Strong => "strong",
            AcademicTier::Average => "average",
            AcademicTier::Weak => "weak",
        }
    }

    fn points(&self) -> u8 {
        match self {
            AcademicTier::Strong => 40,
            AcademicTier::Average => 25,
            AcademicTier::Weak => 10,
        }
    }
}

impl ExamReadiness {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExamReadiness::Completed => "completed",
            ExamReadiness::InProgress => "in_progress",
            ExamReadiness::NotStarted => "not_started",
        }
    }

    fn points(&self) -> u8 {
        match self {
            ExamReadiness::Completed => 40,
            ExamReadiness::InProgress => 20,
            ExamReadiness::NotStarted => 0,
        }
    }
}

fn sop_points(sop: SopStatus) -> u8 {
    match sop {
        SopStatus::Ready => 20,
        SopStatus::Draft => 10,
        SopStatus::NotStarted => 0,
    }
}

/// strong at 3.5 and above, weak below 2.5, average otherwise or when unknown.
pub fn academic_tier(gpa: Option<f64>) -> AcademicTier {
    match gpa {
        Some(gpa) if gpa >= 3.5 => AcademicTier::Strong,
        Some(gpa) if gpa < 2.5 => AcademicTier::Weak,
        _ => AcademicTier::Average,
    }
}

/// Outcome of one group of interchangeable exams (IELTS/TOEFL, GRE/GMAT).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupState {
    NotRelevant,
    Pending,
    Done,
}

fn exam_group<A, B>(relevant: bool, first: &ExamRecord<A>, second: &ExamRecord<B>) -> GroupState {
    // A group with nothing recorded for either exam does not count.
    if !relevant || (first.status.is_none() && second.status.is_none()) {
        return GroupState::NotRelevant;
    }
    if first.is_completed() || second.is_completed() {
        GroupState::Done
    } else {
        GroupState::Pending
    }
}

pub fn exam_readiness(profile: &Profile) -> ExamReadiness {
    let needs_aptitude = matches!(profile.intended_degree, DegreeType::Masters | DegreeType::Phd);
    let groups = [
        exam_group(true, &profile.ielts, &profile.toefl),
        exam_group(needs_aptitude, &profile.gre, &profile.gmat),
    ];

    let relevant = groups
        .iter()
        .filter(|group| **group != GroupState::NotRelevant)
        .count();
    let completed = groups
        .iter()
        .filter(|group| **group == GroupState::Done)
        .count();

    if relevant == 0 || completed == 0 {
        ExamReadiness::NotStarted
    } else if completed == relevant {
        ExamReadiness::Completed
    } else {
        ExamReadiness::InProgress
    }
}

pub fn calculate_profile_strength(profile: &Profile) -> ProfileStrength {
    let academic = academic_tier(profile.gpa);
    let exams = exam_readiness(profile);
    let sop = profile.sop_status.unwrap_or(SopStatus::NotStarted);

    ProfileStrength {
        academic,
        exams,
        sop,
        overall_score: academic.points() + exams.points() + sop_points(sop),
    }
}
