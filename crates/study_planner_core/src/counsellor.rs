//! crates/study_planner_core/src/counsellor.rs
//!
//! Orchestrates one counsellor exchange: build the student's context, ask the
//! model, record both sides of the conversation, then apply whatever actions
//! the model proposed.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::actions::parse_reply;
use crate::domain::{
    ChatEntry, ChatRole, ExamRecord, ListedUniversity, Profile, UniversityStatus, User,
};
use crate::executor::{ActionExecutor, ActionReport};
use crate::ports::{ConversationTurn, CounsellorModel, DatabaseService, PlannerStore, PortResult};
use crate::scoring::with_thousands;
use crate::stage::{determine_stage, Stage};
use crate::strength::{calculate_profile_strength, ProfileStrength};

pub const FALLBACK_REPLY: &str = "I apologize, but I am currently experiencing high traffic or quota limits. Please try again in a minute.";

/// Prior messages handed to the model with each request.
pub const HISTORY_WINDOW: usize = 5;

pub const DEFAULT_HISTORY_LIMIT: usize = 50;
pub const MAX_HISTORY_LIMIT: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("history limit must be between 1 and 200, got {0}")]
pub struct HistoryLimitError(pub i64);

/// The transcript length to return, checked against `[1, MAX_HISTORY_LIMIT]`.
pub fn history_limit(requested: Option<i64>) -> Result<usize, HistoryLimitError> {
    match requested {
        None => Ok(DEFAULT_HISTORY_LIMIT),
        Some(n) if (1..=MAX_HISTORY_LIMIT as i64).contains(&n) => Ok(n as usize),
        Some(n) => Err(HistoryLimitError(n)),
    }
}

/// Everything the system prompt is rendered from.
pub struct CounsellorContext<'a> {
    pub user: &'a User,
    pub profile: &'a Profile,
    pub strength: ProfileStrength,
    pub stage: Stage,
    pub shortlisted: &'a [ListedUniversity],
    pub locked: &'a [ListedUniversity],
}

fn or_unknown<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "Not provided".to_string(), |v| v.to_string())
}

fn exam_line<S: ToString>(name: &str, exam: &ExamRecord<S>) -> String {
    let status = exam
        .status
        .map_or("Not applicable", |status| status.as_str());
    match &exam.score {
        Some(score) => format!("- {name}: {status} (Score: {})", score.to_string()),
        None => format!("- {name}: {status}"),
    }
}

fn budget_line(profile: &Profile) -> String {
    let amount = |value: Option<i32>| {
        value.map_or_else(|| "?".to_string(), |v| format!("${}", with_thousands(v)))
    };
    format!(
        "- Range: {} - {} per year",
        amount(profile.budget_min),
        amount(profile.budget_max)
    )
}

fn university_lines(listed: &[ListedUniversity]) -> String {
    if listed.is_empty() {
        return "None".to_string();
    }
    listed
        .iter()
        .map(|item| {
            format!(
                "- {} ({}) [id: {}] - {} | Acceptance: {} | Fit: {}",
                item.university.name,
                item.university.country,
                item.university.id,
                item.entry.category.as_str().to_uppercase(),
                item.entry.acceptance_likelihood,
                item.entry.fit_reason
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

const ROLE_AND_RULES: &str = "\
YOUR ROLE:
1. Provide personalized, actionable advice based on the current stage
2. Recommend universities that fit the student's profile and explain why
3. Help shortlist and lock universities
4. Create relevant tasks and to-dos

STAGE-SPECIFIC GUIDANCE:
- Stage 1 (Profile Building): focus on test scores, GPA and SOP
- Stage 2 (University Discovery): recommend universities as Dream, Target or Safe
- Stage 3 (University Finalization): help lock universities and explain the commitment
- Stage 4 (Application Preparation): create application tasks, deadlines and document checklists

IMPORTANT RULES:
- Always consider the student's budget and funding constraints
- Never recommend universities outside their budget or field
- Be concise (3-4 sentences unless asked for detail), encouraging but realistic
- Always explain your reasoning

When you want to take actions, append them at the end of your reply wrapped in [ACTIONS]...[/ACTIONS] tags.
You may also suggest up to three follow-up questions.

Action format:
[ACTIONS]
{
  \"actions\": [
    {\"type\": \"shortlist_university\", \"university_id\": \"uuid\", \"category\": \"dream|target|safe\"},
    {\"type\": \"lock_university\", \"university_id\": \"uuid\"},
    {\"type\": \"create_todo\", \"title\": \"Task title\", \"description\": \"Details\", \"category\": \"exam|document|application|other\", \"priority\": \"high|medium|low\"}
  ],
  \"suggestions\": [\"Follow-up question\"]
}
[/ACTIONS]
";

/// Renders the counsellor's system prompt.
pub fn render_context(ctx: &CounsellorContext<'_>) -> String {
    let profile = ctx.profile;
    let sections = [
        "You are an expert study-abroad counsellor helping a student plan their journey.".to_string(),
        format!(
            "STUDENT PROFILE:\n- Name: {}\n- Education: {} in {}\n- GPA: {}\n- Graduation Year: {}",
            ctx.user.full_name,
            or_unknown(profile.education_level.as_deref()),
            or_unknown(profile.major.as_deref()),
            or_unknown(profile.gpa),
            or_unknown(profile.graduation_year),
        ),
        format!(
            "STUDY GOALS:\n- Intended Degree: {}\n- Field of Study: {}\n- Target Intake: {}\n- Preferred Countries: {}",
            profile.intended_degree,
            or_unknown(profile.field()),
            or_unknown(profile.target_intake_year),
            profile.preferred_countries.join(", "),
        ),
        format!(
            "BUDGET:\n{}\n- Funding Type: {}",
            budget_line(profile),
            or_unknown(profile.funding_type),
        ),
        [
            "EXAM STATUS:".to_string(),
            exam_line("IELTS", &profile.ielts),
            exam_line("TOEFL", &profile.toefl),
            exam_line("GRE", &profile.gre),
            exam_line("GMAT", &profile.gmat),
        ]
        .join("\n"),
        format!("SOP STATUS: {}", ctx.strength.sop),
        format!(
            "PROFILE STRENGTH:\n- Academic: {}\n- Exams: {}\n- SOP: {}\n- Overall Score: {}/100",
            ctx.strength.academic.as_str(),
            ctx.strength.exams.as_str(),
            ctx.strength.sop,
            ctx.strength.overall_score,
        ),
        format!(
            "CURRENT STAGE: Stage {} - {}\n{}",
            ctx.stage.number(),
            ctx.stage.name(),
            ctx.stage.description(),
        ),
        format!(
            "SHORTLISTED UNIVERSITIES ({}):\n{}",
            ctx.shortlisted.len(),
            university_lines(ctx.shortlisted),
        ),
        format!(
            "LOCKED UNIVERSITIES ({}):\n{}",
            ctx.locked.len(),
            university_lines(ctx.locked),
        ),
        ROLE_AND_RULES.to_string(),
    ];
    sections.join("\n\n")
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub message: String,
    pub actions: Vec<Value>,
    pub suggested_questions: Vec<String>,
    pub action_results: Vec<String>,
    #[serde(skip)]
    pub report: ActionReport,
}

pub struct Counsellor<'a> {
    db: &'a dyn DatabaseService,
    store: &'a dyn PlannerStore,
    model: &'a dyn CounsellorModel,
}

impl<'a> Counsellor<'a> {
    pub fn new(
        db: &'a dyn DatabaseService,
        store: &'a dyn PlannerStore,
        model: &'a dyn CounsellorModel,
    ) -> Self {
        Self { db, store, model }
    }

    pub async fn build_context(&self, profile: &Profile) -> PortResult<String> {
        let user = self.db.get_user(profile.user_id).await?;
        let shortlisted = self
            .db
            .list_user_universities(profile.user_id, UniversityStatus::Shortlisted)
            .await?;
        let locked = self
            .db
            .list_user_universities(profile.user_id, UniversityStatus::Locked)
            .await?;
        let strength = calculate_profile_strength(profile);
        let stage = determine_stage(
            strength.overall_score,
            shortlisted.len() as i64,
            locked.len() as i64,
        );

        Ok(render_context(&CounsellorContext {
            user: &user,
            profile,
            strength,
            stage,
            shortlisted: &shortlisted,
            locked: &locked,
        }))
    }

    /// One exchange. A model failure is not an error: the user gets the
    /// fallback reply and nothing is executed.
    pub async fn chat(&self, profile: &Profile, message: &str) -> PortResult<ChatReply> {
        let user_id = profile.user_id;
        let context = self.build_context(profile).await?;
        let history: Vec<ConversationTurn> = self
            .db
            .recent_chat_entries(user_id, HISTORY_WINDOW)
            .await?
            .into_iter()
            .map(|entry| ConversationTurn {
                from_user: entry.role == ChatRole::User,
                text: entry.message,
            })
            .collect();

        let raw = match self.model.generate_reply(&context, &history, message).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!("Counsellor model failed for user {}: {}", user_id, err);
                FALLBACK_REPLY.to_string()
            }
        };
        let parsed = parse_reply(&raw);
        debug!(
            "Counsellor reply for user {} carried {} actions",
            user_id,
            parsed.actions.len()
        );

        let now = Utc::now();
        let entries = [
            ChatEntry {
                id: Uuid::new_v4(),
                user_id,
                role: ChatRole::User,
                message: message.to_string(),
                actions: None,
                suggested_questions: None,
                created_at: now,
            },
            ChatEntry {
                id: Uuid::new_v4(),
                user_id,
                role: ChatRole::Assistant,
                message: parsed.message.clone(),
                actions: (!parsed.actions.is_empty()).then(|| Value::Array(parsed.actions.clone())),
                suggested_questions: (!parsed.suggestions.is_empty())
                    .then(|| parsed.suggestions.clone()),
                created_at: now,
            },
        ];
        self.db.append_chat_entries(&entries).await?;

        let report = ActionExecutor::new(self.store)
            .execute(user_id, &parsed.actions)
            .await;

        Ok(ChatReply {
            message: parsed.message,
            actions: parsed.actions,
            suggested_questions: parsed.suggestions,
            action_results: report.lines(),
            report,
        })
    }

    pub async fn history(&self, user_id: Uuid, limit: usize) -> PortResult<Vec<ChatEntry>> {
        self.db.recent_chat_entries(user_id, limit).await
    }

    pub async fn clear_history(&self, user_id: Uuid) -> PortResult<()> {
        self.db.clear_chat_history(user_id).await
    }
}
