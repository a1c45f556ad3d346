//! crates/study_planner_core/src/recommend.rs
//!
//! Recommendation ranking over the university catalogue.

use serde::Serialize;

use crate::domain::{Category, Likelihood, Profile, University, UniversityQuery};
use crate::ports::{DatabaseService, PortResult};
use crate::scoring::{categorize_university, generate_fit_analysis};

pub const DEFAULT_LIMIT: usize = 20;
pub const MAX_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("limit must be between 1 and 50, got {0}")]
pub struct LimitError(pub i64);

/// A result-count limit already checked against `[1, MAX_LIMIT]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultLimit(usize);

impl ResultLimit {
    pub fn new(requested: i64) -> Result<Self, LimitError> {
        if (1..=MAX_LIMIT as i64).contains(&requested) {
            Ok(Self(requested as usize))
        } else {
            Err(LimitError(requested))
        }
    }

    /// `None` means the caller did not ask for a specific limit.
    pub fn from_param(requested: Option<i64>) -> Result<Self, LimitError> {
        requested.map_or(Ok(Self::default()), Self::new)
    }

    pub fn get(&self) -> usize {
        self.0
    }
}

impl Default for ResultLimit {
    fn default() -> Self {
        Self(DEFAULT_LIMIT)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub university: University,
    pub category: Category,
    pub acceptance_likelihood: Likelihood,
    pub fit_reason: String,
    pub risk_factors: String,
}

/// Candidate filters derived from a profile: exact degree, one of the
/// preferred countries, and the field of study as a substring.
pub fn candidate_query(profile: &Profile, limit: ResultLimit) -> UniversityQuery {
    UniversityQuery {
        degree_type: Some(profile.intended_degree),
        countries: profile
            .preferred_countries
            .iter()
            .map(|country| country.trim().to_string())
            .filter(|country| !country.is_empty())
            .collect(),
        field_contains: profile.field().map(str::to_string),
        limit: limit.get(),
    }
}

/// Scores each candidate and orders the result safe, then target, then dream.
/// Within a category the catalogue order is kept.
pub fn rank_candidates(profile: &Profile, candidates: Vec<University>) -> Vec<Recommendation> {
    let mut recommendations: Vec<Recommendation> = candidates
        .into_iter()
        .map(|university| {
            let (category, acceptance) = categorize_university(profile, &university);
            let analysis = generate_fit_analysis(profile, &university, category, acceptance);
            Recommendation {
                category,
                acceptance_likelihood: acceptance,
                fit_reason: analysis.fit_reason(),
                risk_factors: analysis.risk_summary(),
                university,
            }
        })
        .collect();

    // `sort_by_key` is stable.
    recommendations.sort_by_key(|rec| rec.category.priority());
    recommendations
}

pub async fn recommend_universities(
    db: &dyn DatabaseService,
    profile: &Profile,
    limit: ResultLimit,
) -> PortResult<Vec<Recommendation>> {
    let candidates = db
        .search_universities(&candidate_query(profile, limit))
        .await?;
    Ok(rank_candidates(profile, candidates))
}

/// Unscored browsing: programs of the profile's intended degree, optionally in
/// a single country.
pub async fn discover_universities(
    db: &dyn DatabaseService,
    profile: &Profile,
    country: Option<&str>,
    limit: ResultLimit,
) -> PortResult<Vec<University>> {
    let query = UniversityQuery {
        degree_type: Some(profile.intended_degree),
        countries: country
            .map(str::trim)
            .filter(|country| !country.is_empty())
            .map(|country| vec![country.to_string()])
            .unwrap_or_default(),
        field_contains: None,
        limit: limit.get(),
    };
    db.search_universities(&query).await
}
