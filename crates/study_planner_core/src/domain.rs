//! crates/study_planner_core/src/domain.rs
//!
//! Defines the core data structures for the planner: the onboarding profile,
//! the university catalogue, a user's relationship to a university, todos and
//! chat history. Enumerations are stored as lowercase text labels at every
//! boundary (JSON, SQL), so each one carries `as_str` / `FromStr`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Returned when a text label does not name any variant of a domain enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{value}' is not a valid {kind}")]
pub struct UnknownLabel {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! labelled_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($kind:literal) { $($variant:ident => $label:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownLabel;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value.trim().to_ascii_lowercase().as_str() {
                    $($label => Ok(Self::$variant),)+
                    _ => Err(UnknownLabel {
                        kind: $kind,
                        value: value.to_string(),
                    }),
                }
            }
        }
    };
}

labelled_enum! {
    /// The degree a student intends to pursue, or a program offers.
    DegreeType("degree type") {
        Bachelors => "bachelors",
        Masters => "masters",
        Mba => "mba",
        Phd => "phd",
    }
}

labelled_enum! {
    /// Three-point scale used for competitiveness and cost level.
    Level("level") {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
}

labelled_enum! {
    ExamStatus("exam status") {
        NotStarted => "not_started",
        InProgress => "in_progress",
        Completed => "completed",
    }
}

labelled_enum! {
    SopStatus("SOP status") {
        NotStarted => "not_started",
        Draft => "draft",
        Ready => "ready",
    }
}

labelled_enum! {
    FundingType("funding type") {
        SelfFunded => "self_funded",
        Loan => "loan",
        Scholarship => "scholarship",
    }
}

labelled_enum! {
    /// Status of a user's relationship to a university.
    UniversityStatus("university status") {
        Shortlisted => "shortlisted",
        Locked => "locked",
    }
}

labelled_enum! {
    /// Competitiveness-relative bucket of a university for one profile.
    Category("category") {
        Dream => "dream",
        Target => "target",
        Safe => "safe",
    }
}

labelled_enum! {
    Likelihood("acceptance likelihood") {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
}

labelled_enum! {
    TodoCategory("todo category") {
        Exam => "exam",
        Document => "document",
        Application => "application",
        Other => "other",
    }
}

labelled_enum! {
    TodoPriority("todo priority") {
        High => "high",
        Medium => "medium",
        Low => "low",
    }
}

labelled_enum! {
    ChatRole("chat role") {
        User => "user",
        Assistant => "assistant",
    }
}

impl Category {
    /// Ranking used when ordering recommendations: safe first, dream last.
    pub fn priority(&self) -> u8 {
        match self {
            Category::Safe => 1,
            Category::Target => 2,
            Category::Dream => 3,
        }
    }
}

impl TodoPriority {
    /// Higher is more urgent.
    pub fn rank(&self) -> u8 {
        match self {
            TodoPriority::High => 3,
            TodoPriority::Medium => 2,
            TodoPriority::Low => 1,
        }
    }
}

//=========================================================================================
// Accounts
//=========================================================================================

#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: String,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub hashed_password: String,
}

//=========================================================================================
// Onboarding profile
//=========================================================================================

/// Status and optional score of one standardized exam.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExamRecord<S> {
    pub status: Option<ExamStatus>,
    pub score: Option<S>,
}

impl<S> ExamRecord<S> {
    pub fn is_completed(&self) -> bool {
        self.status == Some(ExamStatus::Completed)
    }
}

/// A user's onboarding snapshot. The engine only ever reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: Uuid,

    // Academic background
    pub education_level: Option<String>,
    pub degree: Option<String>,
    pub major: Option<String>,
    pub graduation_year: Option<i32>,
    pub gpa: Option<f64>,

    // Study goal
    pub intended_degree: DegreeType,
    pub field_of_study: Option<String>,
    pub target_intake_year: Option<i32>,
    pub preferred_countries: Vec<String>,

    // Budget, in the catalogue's currency per year
    pub budget_min: Option<i32>,
    pub budget_max: Option<i32>,
    pub funding_type: Option<FundingType>,

    // Exams and readiness
    pub ielts: ExamRecord<f64>,
    pub toefl: ExamRecord<i32>,
    pub gre: ExamRecord<i32>,
    pub gmat: ExamRecord<i32>,
    pub sop_status: Option<SopStatus>,

    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProfileError {
    #[error("At least one preferred country is required")]
    NoPreferredCountries,
    #[error("Budget minimum ({min}) cannot exceed budget maximum ({max})")]
    InvertedBudget { min: i32, max: i32 },
    #[error("GPA must be between 0 and 10, got {0}")]
    GpaOutOfRange(f64),
    #[error("IELTS score must be between 0 and 9, got {0}")]
    IeltsOutOfRange(f64),
}

impl Profile {
    /// Checks the invariants an onboarding submission must satisfy.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self
            .preferred_countries
            .iter()
            .all(|country| country.trim().is_empty())
        {
            return Err(ProfileError::NoPreferredCountries);
        }
        if let (Some(min), Some(max)) = (self.budget_min, self.budget_max) {
            if min > max {
                return Err(ProfileError::InvertedBudget { min, max });
            }
        }
        if let Some(gpa) = self.gpa {
            if !(0.0..=10.0).contains(&gpa) {
                return Err(ProfileError::GpaOutOfRange(gpa));
            }
        }
        if let Some(score) = self.ielts.score {
            if !(0.0..=9.0).contains(&score) {
                return Err(ProfileError::IeltsOutOfRange(score));
            }
        }
        Ok(())
    }

    /// The field of study, if one was given and is not blank.
    pub fn field(&self) -> Option<&str> {
        self.field_of_study
            .as_deref()
            .map(str::trim)
            .filter(|field| !field.is_empty())
    }
}

//=========================================================================================
// University catalogue
//=========================================================================================

/// Immutable reference data for one program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct University {
    pub id: Uuid,
    pub name: String,
    pub country: String,
    pub degree_type: DegreeType,
    pub field_of_study: Option<String>,

    pub cost_level: Option<Level>,
    pub estimated_cost_min: Option<i32>,
    pub estimated_cost_max: Option<i32>,

    pub competitiveness: Option<Level>,
    pub avg_gpa_required: Option<f64>,
    pub min_ielts_required: Option<f64>,
    pub min_toefl_required: Option<i32>,
    pub min_gre_required: Option<i32>,

    pub description: Option<String>,
    pub website: Option<String>,
    pub ranking: Option<i32>,
}

/// Hard filters applied to the catalogue before any scoring happens.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniversityQuery {
    pub degree_type: Option<DegreeType>,
    /// Empty means any country.
    pub countries: Vec<String>,
    /// Case-insensitive substring of the program's field of study.
    pub field_contains: Option<String>,
    pub limit: usize,
}

impl UniversityQuery {
    /// Whether `university` passes every filter. Adapters that cannot push the
    /// filters down to storage use this directly.
    pub fn matches(&self, university: &University) -> bool {
        if let Some(degree) = self.degree_type {
            if university.degree_type != degree {
                return false;
            }
        }
        if !self.countries.is_empty() && !self.countries.contains(&university.country) {
            return false;
        }
        if let Some(needle) = &self.field_contains {
            let haystack = university
                .field_of_study
                .as_deref()
                .unwrap_or_default()
                .to_lowercase();
            if !haystack.contains(&needle.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

//=========================================================================================
// Planner state
//=========================================================================================

/// A user's shortlisted or locked university, with the analysis cached when
/// it was first shortlisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserUniversity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub university_id: Uuid,
    pub status: UniversityStatus,
    pub category: Category,
    pub acceptance_likelihood: Likelihood,
    pub fit_reason: String,
    pub risk_factors: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A relationship joined with the university it points at.
#[derive(Debug, Clone)]
pub struct ListedUniversity {
    pub entry: UserUniversity,
    pub university: University,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub shortlisted: i64,
    pub locked: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Todo {
    pub id: Uuid,
    pub user_id: Uuid,
    pub university_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub category: TodoCategory,
    pub priority: TodoPriority,
    pub deadline: Option<NaiveDate>,
    pub is_complete: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Filters for listing a user's todos.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TodoFilter {
    pub completed: Option<bool>,
    pub category: Option<TodoCategory>,
}

impl TodoFilter {
    pub fn matches(&self, todo: &Todo) -> bool {
        self.completed.map_or(true, |done| todo.is_complete == done)
            && self.category.map_or(true, |category| todo.category == category)
    }
}

/// One message in the counsellor transcript. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role: ChatRole,
    pub message: String,
    pub actions: Option<serde_json::Value>,
    pub suggested_questions: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_parse_case_insensitively() {
        assert_eq!("Masters".parse::<DegreeType>(), Ok(DegreeType::Masters));
        assert_eq!(" in_progress ".parse::<ExamStatus>(), Ok(ExamStatus::InProgress));
        let err = "reach".parse::<Category>().unwrap_err();
        assert_eq!(err.to_string(), "'reach' is not a valid category");
    }

    #[test]
    fn query_filters_on_degree_country_and_field() {
        let university = University {
            id: Uuid::new_v4(),
            name: "Edinburgh".to_string(),
            country: "UK".to_string(),
            degree_type: DegreeType::Masters,
            field_of_study: Some("Computer Science".to_string()),
            cost_level: None,
            estimated_cost_min: None,
            estimated_cost_max: None,
            competitiveness: None,
            avg_gpa_required: None,
            min_ielts_required: None,
            min_toefl_required: None,
            min_gre_required: None,
            description: None,
            website: None,
            ranking: None,
        };
        let mut query = UniversityQuery {
            degree_type: Some(DegreeType::Masters),
            countries: vec!["UK".to_string(), "USA".to_string()],
            field_contains: Some("computer".to_string()),
            limit: 20,
        };
        assert!(query.matches(&university));

        query.countries = vec!["Canada".to_string()];
        assert!(!query.matches(&university));

        query.countries.clear();
        query.degree_type = Some(DegreeType::Phd);
        assert!(!query.matches(&university));
    }
}
