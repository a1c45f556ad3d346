//! crates/study_planner_core/src/scoring.rs
//!
//! Per-university fit scoring: acceptance likelihood, dream/target/safe
//! categorization and the human-readable fit and risk analysis.
//!
//! Requirement comparisons are done in fixed point (GPA in hundredths, IELTS in
//! tenths) so that e.g. 3.8 - 3.5 lands on the 0.3 threshold exactly.

use serde::Serialize;

use crate::domain::{Category, Level, Likelihood, Profile, University};

const GPA_WEIGHT: u32 = 40;
const IELTS_WEIGHT: u32 = 30;
const GRE_WEIGHT: u32 = 30;

fn hundredths(value: f64) -> i64 {
    (value * 100.0).round() as i64
}

fn tenths(value: f64) -> i64 {
    (value * 10.0).round() as i64
}

/// User GPA minus required GPA, in hundredths of a grade point.
fn gpa_gap(profile: &Profile, university: &University) -> Option<i64> {
    match (profile.gpa, university.avg_gpa_required) {
        (Some(gpa), Some(required)) => Some(hundredths(gpa) - hundredths(required)),
        _ => None,
    }
}

/// User IELTS minus required IELTS, in tenths of a band.
fn ielts_gap(profile: &Profile, university: &University) -> Option<i64> {
    match (profile.ielts.score, university.min_ielts_required) {
        (Some(score), Some(required)) => Some(tenths(score) - tenths(required)),
        _ => None,
    }
}

fn gre_gap(profile: &Profile, university: &University) -> Option<i64> {
    match (profile.gre.score, university.min_gre_required) {
        (Some(score), Some(required)) => Some(i64::from(score) - i64::from(required)),
        _ => None,
    }
}

fn gpa_points(gap: i64) -> u32 {
    match gap {
        g if g >= 30 => 40,
        g if g >= 0 => 30,
        g if g >= -20 => 15,
        _ => 5,
    }
}

fn ielts_points(gap: i64) -> u32 {
    match gap {
        g if g >= 10 => 30,
        g if g >= 0 => 25,
        g if g >= -5 => 10,
        _ => 0,
    }
}

fn gre_points(gap: i64) -> u32 {
    match gap {
        g if g >= 20 => 30,
        g if g >= 0 => 25,
        g if g >= -10 => 10,
        _ => 0,
    }
}

/// Weighted comparison of the profile against the university's published
/// thresholds. A criterion only counts when both sides are known; with no
/// usable criterion the university's competitiveness decides.
pub fn calculate_acceptance_likelihood(profile: &Profile, university: &University) -> Likelihood {
    let mut score = 0u32;
    let mut max_score = 0u32;

    if let Some(gap) = gpa_gap(profile, university) {
        max_score += GPA_WEIGHT;
        score += gpa_points(gap);
    }
    if let Some(gap) = ielts_gap(profile, university) {
        max_score += IELTS_WEIGHT;
        score += ielts_points(gap);
    }
    if let Some(gap) = gre_gap(profile, university) {
        max_score += GRE_WEIGHT;
        score += gre_points(gap);
    }

    if max_score == 0 {
        return match university.competitiveness {
            Some(Level::Low) => Likelihood::High,
            Some(Level::Medium) => Likelihood::Medium,
            Some(Level::High) | None => Likelihood::Low,
        };
    }

    // score / max_score >= 0.75, kept in integers.
    if score * 4 >= max_score * 3 {
        Likelihood::High
    } else if score * 2 >= max_score {
        Likelihood::Medium
    } else {
        Likelihood::Low
    }
}

/// Dream is checked before safe: a low-competitiveness school the student is
/// unlikely to get into is still a dream.
pub fn categorize(competitiveness: Option<Level>, acceptance: Likelihood) -> Category {
    if competitiveness == Some(Level::High) || acceptance == Likelihood::Low {
        Category::Dream
    } else if competitiveness == Some(Level::Low) || acceptance == Likelihood::High {
        Category::Safe
    } else {
        Category::Target
    }
}

/// Returns the category together with the likelihood it was derived from.
pub fn categorize_university(profile: &Profile, university: &University) -> (Category, Likelihood) {
    let acceptance = calculate_acceptance_likelihood(profile, university);
    (categorize(university.competitiveness, acceptance), acceptance)
}

pub const GENERAL_ALIGNMENT: &str = "General alignment with your profile";
pub const NO_SIGNIFICANT_RISKS: &str = "No significant risks identified";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FitAnalysis {
    pub fit_reasons: Vec<String>,
    pub risk_factors: Vec<String>,
}

impl FitAnalysis {
    /// Semicolon-delimited form used for storage and display.
    pub fn fit_reason(&self) -> String {
        self.fit_reasons.join("; ")
    }

    pub fn risk_summary(&self) -> String {
        self.risk_factors.join("; ")
    }
}

/// 65000 -> "65,000"
pub(crate) fn with_thousands(value: i32) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if value < 0 {
        out.insert(0, '-');
    }
    out
}

/// Builds the ordered fit reasons and risks for one university. The category
/// and likelihood are accepted for parity with the stored analysis but the
/// reasons themselves depend only on profile and university data.
pub fn generate_fit_analysis(
    profile: &Profile,
    university: &University,
    _category: Category,
    _acceptance: Likelihood,
) -> FitAnalysis {
    let mut fit_reasons = Vec::new();
    let mut risk_factors = Vec::new();

    if let Some(field) = profile.field() {
        let offered = university
            .field_of_study
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();
        if offered.contains(&field.to_lowercase()) {
            fit_reasons.push(format!("Matches your field of study: {field}"));
        }
    }

    if profile.preferred_countries.contains(&university.country) {
        fit_reasons.push(format!(
            "Located in your preferred country: {}",
            university.country
        ));
    }

    if profile.intended_degree == university.degree_type {
        fit_reasons.push(format!("Offers {} programs", university.degree_type));
    }

    if let (Some(cost_max), Some(budget_max)) = (university.estimated_cost_max, profile.budget_max)
    {
        if cost_max <= budget_max {
            fit_reasons.push("Within your budget range".to_string());
        } else {
            risk_factors.push(format!(
                "Cost may exceed budget (${}/year)",
                with_thousands(cost_max)
            ));
        }
    }

    if let Some(gap) = gpa_gap(profile, university) {
        if gap < -20 {
            risk_factors.push(format!(
                "Your GPA ({:.2}) is below average requirement ({:.2})",
                profile.gpa.unwrap_or_default(),
                university.avg_gpa_required.unwrap_or_default()
            ));
        }
    }

    if let Some(gap) = ielts_gap(profile, university) {
        if gap < 0 {
            risk_factors.push(format!(
                "IELTS score below requirement ({:.1} < {:.1})",
                profile.ielts.score.unwrap_or_default(),
                university.min_ielts_required.unwrap_or_default()
            ));
        }
    }

    if university.competitiveness == Some(Level::High) {
        risk_factors.push("Highly competitive program with low acceptance rate".to_string());
    }

    if fit_reasons.is_empty() {
        fit_reasons.push(GENERAL_ALIGNMENT.to_string());
    }
    if risk_factors.is_empty() {
        risk_factors.push(NO_SIGNIFICANT_RISKS.to_string());
    }

    FitAnalysis {
        fit_reasons,
        risk_factors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DegreeType, ExamRecord, ExamStatus};
    use uuid::Uuid;

    fn profile() -> Profile {
        Profile {
            user_id: Uuid::new_v4(),
            education_level: None,
            degree: None,
            major: None,
            graduation_year: None,
            gpa: Some(3.8),
            intended_degree: DegreeType::Masters,
            field_of_study: Some("Computer Science".to_string()),
            target_intake_year: Some(2026),
            preferred_countries: vec!["USA".to_string()],
            budget_min: Some(10_000),
            budget_max: Some(50_000),
            funding_type: None,
            ielts: ExamRecord {
                status: Some(ExamStatus::Completed),
                score: Some(7.5),
            },
            toefl: ExamRecord::default(),
            gre: ExamRecord::default(),
            gmat: ExamRecord::default(),
            sop_status: None,
            completed_at: None,
        }
    }

    fn university(competitiveness: Option<Level>) -> University {
        University {
            id: Uuid::new_v4(),
            name: "Test University".to_string(),
            country: "USA".to_string(),
            degree_type: DegreeType::Masters,
            field_of_study: Some("Computer Science".to_string()),
            cost_level: None,
            estimated_cost_min: None,
            estimated_cost_max: Some(45_000),
            competitiveness,
            avg_gpa_required: None,
            min_ielts_required: None,
            min_toefl_required: None,
            min_gre_required: None,
            description: None,
            website: None,
            ranking: None,
        }
    }

    #[test]
    fn falls_back_to_competitiveness_without_criteria() {
        let p = profile();
        let cases = [
            (Some(Level::Low), Likelihood::High),
            (Some(Level::Medium), Likelihood::Medium),
            (Some(Level::High), Likelihood::Low),
            (None, Likelihood::Low),
        ];
        for (competitiveness, expected) in cases {
            let u = university(competitiveness);
            assert_eq!(calculate_acceptance_likelihood(&p, &u), expected);
        }
    }

    #[test]
    fn gpa_threshold_is_exact_at_point_three() {
        let p = profile();
        let mut u = university(Some(Level::Medium));
        u.avg_gpa_required = Some(3.5);
        // 40 / 40
        assert_eq!(calculate_acceptance_likelihood(&p, &u), Likelihood::High);

        u.avg_gpa_required = Some(3.51);
        // 30 / 40 = 0.75
        assert_eq!(calculate_acceptance_likelihood(&p, &u), Likelihood::High);

        u.avg_gpa_required = Some(3.95);
        // 15 / 40
        assert_eq!(calculate_acceptance_likelihood(&p, &u), Likelihood::Low);
    }

    #[test]
    fn criteria_combine_by_ratio() {
        let mut p = profile();
        p.gre.score = Some(305);
        let mut u = university(Some(Level::Medium));
        u.avg_gpa_required = Some(3.8); // 30
        u.min_ielts_required = Some(8.0); // -0.5 -> 10
        u.min_gre_required = Some(310); // -5 -> 10
        // 50 / 100
        assert_eq!(calculate_acceptance_likelihood(&p, &u), Likelihood::Medium);

        u.min_gre_required = Some(330); // -25 -> 0
        // 40 / 100
        assert_eq!(calculate_acceptance_likelihood(&p, &u), Likelihood::Low);
    }

    #[test]
    fn high_competitiveness_is_always_dream() {
        for acceptance in [Likelihood::Low, Likelihood::Medium, Likelihood::High] {
            assert_eq!(categorize(Some(Level::High), acceptance), Category::Dream);
        }
    }

    #[test]
    fn dream_check_precedes_safe_check() {
        assert_eq!(categorize(Some(Level::Low), Likelihood::Low), Category::Dream);
        assert_eq!(categorize(Some(Level::Low), Likelihood::Medium), Category::Safe);
        assert_eq!(categorize(Some(Level::Low), Likelihood::High), Category::Safe);
        assert_eq!(categorize(Some(Level::Medium), Likelihood::High), Category::Safe);
        assert_eq!(categorize(Some(Level::Medium), Likelihood::Medium), Category::Target);
        assert_eq!(categorize(None, Likelihood::Medium), Category::Target);
    }

    #[test]
    fn fit_analysis_lists_reasons_in_order() {
        let p = profile();
        let u = university(Some(Level::Medium));
        let analysis = generate_fit_analysis(&p, &u, Category::Target, Likelihood::Medium);
        assert_eq!(
            analysis.fit_reason(),
            "Matches your field of study: Computer Science; \
             Located in your preferred country: USA; \
             Offers masters programs; \
             Within your budget range"
        );
        assert_eq!(analysis.risk_summary(), NO_SIGNIFICANT_RISKS);
    }

    #[test]
    fn fit_analysis_reports_risks() {
        let mut p = profile();
        p.gpa = Some(3.2);
        p.preferred_countries = vec!["Canada".to_string()];
        p.field_of_study = Some("Biology".to_string());
        p.intended_degree = DegreeType::Phd;
        let mut u = university(Some(Level::High));
        u.estimated_cost_max = Some(65_000);
        u.avg_gpa_required = Some(3.8);
        u.min_ielts_required = Some(8.0);

        let analysis = generate_fit_analysis(&p, &u, Category::Dream, Likelihood::Low);
        assert_eq!(analysis.fit_reasons, vec![GENERAL_ALIGNMENT.to_string()]);
        assert_eq!(
            analysis.risk_factors,
            vec![
                "Cost may exceed budget ($65,000/year)".to_string(),
                "Your GPA (3.20) is below average requirement (3.80)".to_string(),
                "IELTS score below requirement (7.5 < 8.0)".to_string(),
                "Highly competitive program with low acceptance rate".to_string(),
            ]
        );
    }

    #[test]
    fn thousands_separator() {
        assert_eq!(with_thousands(999), "999");
        assert_eq!(with_thousands(1_000), "1,000");
        assert_eq!(with_thousands(1_234_567), "1,234,567");
    }
}
