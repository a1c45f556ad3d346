//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` and `PlannerStore` ports from the `core` crate. It
//! handles all interactions with the PostgreSQL database using `sqlx`.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use study_planner_core::domain::{
    ChatEntry, ExamRecord, ListedUniversity, Profile, StatusCounts, Todo, TodoFilter, University,
    UniversityQuery, UniversityStatus, UnknownLabel, User, UserCredentials, UserUniversity,
};
use study_planner_core::ports::{
    DatabaseService, PlannerStore, PlannerTransaction, PortError, PortResult,
};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` and `PlannerStore` ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

/// Parses a stored text label back into its domain enum.
fn label<T: FromStr<Err = UnknownLabel>>(raw: &str) -> PortResult<T> {
    raw.parse::<T>()
        .map_err(|e| PortError::Unexpected(format!("Corrupt row: {e}")))
}

fn optional_label<T: FromStr<Err = UnknownLabel>>(raw: Option<String>) -> PortResult<Option<T>> {
    raw.as_deref().map(label).transpose()
}

/// Escapes LIKE wildcards so user text only ever matches literally.
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: String,
    full_name: String,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: self.email,
            full_name: self.full_name,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    full_name: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user: User {
                user_id: self.user_id,
                email: self.email,
                full_name: self.full_name,
            },
            hashed_password: self.hashed_password,
        }
    }
}

const PROFILE_COLUMNS: &str = "user_id, education_level, degree, major, graduation_year, gpa, \
    intended_degree, field_of_study, target_intake_year, preferred_countries, budget_min, \
    budget_max, funding_type, ielts_status, ielts_score, toefl_status, toefl_score, gre_status, \
    gre_score, gmat_status, gmat_score, sop_status, completed_at";

#[derive(FromRow)]
struct ProfileRecord {
    user_id: Uuid,
    education_level: Option<String>,
    degree: Option<String>,
    major: Option<String>,
    graduation_year: Option<i32>,
    gpa: Option<f64>,
    intended_degree: String,
    field_of_study: Option<String>,
    target_intake_year: Option<i32>,
    preferred_countries: Vec<String>,
    budget_min: Option<i32>,
    budget_max: Option<i32>,
    funding_type: Option<String>,
    ielts_status: Option<String>,
    ielts_score: Option<f64>,
    toefl_status: Option<String>,
    toefl_score: Option<i32>,
    gre_status: Option<String>,
    gre_score: Option<i32>,
    gmat_status: Option<String>,
    gmat_score: Option<i32>,
    sop_status: Option<String>,
    completed_at: Option<DateTime<Utc>>,
}
impl ProfileRecord {
    fn to_domain(self) -> PortResult<Profile> {
        Ok(Profile {
            user_id: self.user_id,
            education_level: self.education_level,
            degree: self.degree,
            major: self.major,
            graduation_year: self.graduation_year,
            gpa: self.gpa,
            intended_degree: label(&self.intended_degree)?,
            field_of_study: self.field_of_study,
            target_intake_year: self.target_intake_year,
            preferred_countries: self.preferred_countries,
            budget_min: self.budget_min,
            budget_max: self.budget_max,
            funding_type: optional_label(self.funding_type)?,
            ielts: ExamRecord {
                status: optional_label(self.ielts_status)?,
                score: self.ielts_score,
            },
            toefl: ExamRecord {
                status: optional_label(self.toefl_status)?,
                score: self.toefl_score,
            },
            gre: ExamRecord {
                status: optional_label(self.gre_status)?,
                score: self.gre_score,
            },
            gmat: ExamRecord {
                status: optional_label(self.gmat_status)?,
                score: self.gmat_score,
            },
            sop_status: optional_label(self.sop_status)?,
            completed_at: self.completed_at,
        })
    }
}

const UNIVERSITY_COLUMNS: &str = "id, name, country, degree_type, field_of_study, cost_level, \
    estimated_cost_min, estimated_cost_max, competitiveness, avg_gpa_required, \
    min_ielts_required, min_toefl_required, min_gre_required, description, website, ranking";

#[derive(FromRow)]
struct UniversityRecord {
    id: Uuid,
    name: String,
    country: String,
    degree_type: String,
    field_of_study: Option<String>,
    cost_level: Option<String>,
    estimated_cost_min: Option<i32>,
    estimated_cost_max: Option<i32>,
    competitiveness: Option<String>,
    avg_gpa_required: Option<f64>,
    min_ielts_required: Option<f64>,
    min_toefl_required: Option<i32>,
    min_gre_required: Option<i32>,
    description: Option<String>,
    website: Option<String>,
    ranking: Option<i32>,
}
impl UniversityRecord {
    fn to_domain(self) -> PortResult<University> {
        Ok(University {
            id: self.id,
            name: self.name,
            country: self.country,
            degree_type: label(&self.degree_type)?,
            field_of_study: self.field_of_study,
            cost_level: optional_label(self.cost_level)?,
            estimated_cost_min: self.estimated_cost_min,
            estimated_cost_max: self.estimated_cost_max,
            competitiveness: optional_label(self.competitiveness)?,
            avg_gpa_required: self.avg_gpa_required,
            min_ielts_required: self.min_ielts_required,
            min_toefl_required: self.min_toefl_required,
            min_gre_required: self.min_gre_required,
            description: self.description,
            website: self.website,
            ranking: self.ranking,
        })
    }
}

const USER_UNIVERSITY_COLUMNS: &str = "id, user_id, university_id, status, category, \
    acceptance_likelihood, fit_reason, risk_factors, created_at, updated_at";

#[derive(FromRow)]
struct UserUniversityRecord {
    id: Uuid,
    user_id: Uuid,
    university_id: Uuid,
    status: String,
    category: String,
    acceptance_likelihood: String,
    fit_reason: String,
    risk_factors: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl UserUniversityRecord {
    fn to_domain(self) -> PortResult<UserUniversity> {
        Ok(UserUniversity {
            id: self.id,
            user_id: self.user_id,
            university_id: self.university_id,
            status: label(&self.status)?,
            category: label(&self.category)?,
            acceptance_likelihood: label(&self.acceptance_likelihood)?,
            fit_reason: self.fit_reason,
            risk_factors: self.risk_factors,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const TODO_COLUMNS: &str = "id, user_id, university_id, title, description, category, priority, \
    deadline, is_complete, completed_at, created_at";

#[derive(FromRow)]
struct TodoRecord {
    id: Uuid,
    user_id: Uuid,
    university_id: Option<Uuid>,
    title: String,
    description: Option<String>,
    category: String,
    priority: String,
    deadline: Option<NaiveDate>,
    is_complete: bool,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}
impl TodoRecord {
    fn to_domain(self) -> PortResult<Todo> {
        Ok(Todo {
            id: self.id,
            user_id: self.user_id,
            university_id: self.university_id,
            title: self.title,
            description: self.description,
            category: label(&self.category)?,
            priority: label(&self.priority)?,
            deadline: self.deadline,
            is_complete: self.is_complete,
            completed_at: self.completed_at,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct ChatRecord {
    id: Uuid,
    user_id: Uuid,
    role: String,
    message: String,
    actions: Option<Value>,
    suggested_questions: Option<Json<Vec<String>>>,
    created_at: DateTime<Utc>,
}
impl ChatRecord {
    fn to_domain(self) -> PortResult<ChatEntry> {
        Ok(ChatEntry {
            id: self.id,
            user_id: self.user_id,
            role: label(&self.role)?,
            message: self.message,
            actions: self.actions,
            suggested_questions: self.suggested_questions.map(|Json(questions)| questions),
            created_at: self.created_at,
        })
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    // --- Accounts ---

    async fn create_user(
        &self,
        email: &str,
        hashed_password: &str,
        full_name: &str,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (email, hashed_password, full_name) VALUES ($1, $2, $3) \
             RETURNING user_id, email, full_name",
        )
        .bind(email)
        .bind(hashed_password)
        .bind(full_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PortError::Conflict(format!("User with email {} already exists", email))
            } else {
                unexpected(e)
            }
        })?;
        Ok(record.to_domain())
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, email, full_name FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", user_id)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, full_name, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", email)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    // --- Onboarding ---

    async fn upsert_profile(&self, profile: &Profile) -> PortResult<Profile> {
        let sql = format!(
            "INSERT INTO profiles ({PROFILE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
                     $17, $18, $19, $20, $21, $22, $23) \
             ON CONFLICT (user_id) DO UPDATE SET \
                 education_level = EXCLUDED.education_level, \
                 degree = EXCLUDED.degree, \
                 major = EXCLUDED.major, \
                 graduation_year = EXCLUDED.graduation_year, \
                 gpa = EXCLUDED.gpa, \
                 intended_degree = EXCLUDED.intended_degree, \
                 field_of_study = EXCLUDED.field_of_study, \
                 target_intake_year = EXCLUDED.target_intake_year, \
                 preferred_countries = EXCLUDED.preferred_countries, \
                 budget_min = EXCLUDED.budget_min, \
                 budget_max = EXCLUDED.budget_max, \
                 funding_type = EXCLUDED.funding_type, \
                 ielts_status = EXCLUDED.ielts_status, \
                 ielts_score = EXCLUDED.ielts_score, \
                 toefl_status = EXCLUDED.toefl_status, \
                 toefl_score = EXCLUDED.toefl_score, \
                 gre_status = EXCLUDED.gre_status, \
                 gre_score = EXCLUDED.gre_score, \
                 gmat_status = EXCLUDED.gmat_status, \
                 gmat_score = EXCLUDED.gmat_score, \
                 sop_status = EXCLUDED.sop_status, \
                 completed_at = EXCLUDED.completed_at, \
                 updated_at = now() \
             RETURNING {PROFILE_COLUMNS}"
        );
        let record = sqlx::query_as::<_, ProfileRecord>(&sql)
            .bind(profile.user_id)
            .bind(&profile.education_level)
            .bind(&profile.degree)
            .bind(&profile.major)
            .bind(profile.graduation_year)
            .bind(profile.gpa)
            .bind(profile.intended_degree.as_str())
            .bind(&profile.field_of_study)
            .bind(profile.target_intake_year)
            .bind(&profile.preferred_countries)
            .bind(profile.budget_min)
            .bind(profile.budget_max)
            .bind(profile.funding_type.map(|f| f.as_str()))
            .bind(profile.ielts.status.map(|s| s.as_str()))
            .bind(profile.ielts.score)
            .bind(profile.toefl.status.map(|s| s.as_str()))
            .bind(profile.toefl.score)
            .bind(profile.gre.status.map(|s| s.as_str()))
            .bind(profile.gre.score)
            .bind(profile.gmat.status.map(|s| s.as_str()))
            .bind(profile.gmat.score)
            .bind(profile.sop_status.map(|s| s.as_str()))
            .bind(profile.completed_at)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        record.to_domain()
    }

    async fn get_profile(&self, user_id: Uuid) -> PortResult<Option<Profile>> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = $1");
        sqlx::query_as::<_, ProfileRecord>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .map(ProfileRecord::to_domain)
            .transpose()
    }

    // --- Catalogue ---

    async fn search_universities(&self, query: &UniversityQuery) -> PortResult<Vec<University>> {
        let sql = format!(
            "SELECT {UNIVERSITY_COLUMNS} FROM universities \
             WHERE ($1::text IS NULL OR degree_type = $1) \
               AND (cardinality($2::text[]) = 0 OR country = ANY($2)) \
               AND ($3::text IS NULL OR field_of_study ILIKE $3) \
             ORDER BY ranking ASC NULLS LAST, name ASC \
             LIMIT $4"
        );
        let records = sqlx::query_as::<_, UniversityRecord>(&sql)
            .bind(query.degree_type.map(|d| d.as_str()))
            .bind(&query.countries)
            .bind(query.field_contains.as_deref().map(like_pattern))
            .bind(query.limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        records.into_iter().map(UniversityRecord::to_domain).collect()
    }

    // --- Planner reads ---

    async fn list_user_universities(
        &self,
        user_id: Uuid,
        status: UniversityStatus,
    ) -> PortResult<Vec<ListedUniversity>> {
        let sql = format!(
            "SELECT {USER_UNIVERSITY_COLUMNS} FROM user_universities \
             WHERE user_id = $1 AND status = $2 ORDER BY created_at ASC"
        );
        let entries = sqlx::query_as::<_, UserUniversityRecord>(&sql)
            .bind(user_id)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?
            .into_iter()
            .map(UserUniversityRecord::to_domain)
            .collect::<PortResult<Vec<_>>>()?;

        let ids: Vec<Uuid> = entries.iter().map(|entry| entry.university_id).collect();
        let sql = format!("SELECT {UNIVERSITY_COLUMNS} FROM universities WHERE id = ANY($1)");
        let mut universities: HashMap<Uuid, University> =
            sqlx::query_as::<_, UniversityRecord>(&sql)
                .bind(&ids)
                .fetch_all(&self.pool)
                .await
                .map_err(unexpected)?
                .into_iter()
                .map(|record| record.to_domain().map(|u| (u.id, u)))
                .collect::<PortResult<_>>()?;

        Ok(entries
            .into_iter()
            .filter_map(|entry| {
                universities
                    .remove(&entry.university_id)
                    .map(|university| ListedUniversity { entry, university })
            })
            .collect())
    }

    async fn count_user_universities(&self, user_id: Uuid) -> PortResult<StatusCounts> {
        let (shortlisted, locked) = sqlx::query_as::<_, (i64, i64)>(
            "SELECT COUNT(*) FILTER (WHERE status = 'shortlisted'), \
                    COUNT(*) FILTER (WHERE status = 'locked') \
             FROM user_universities WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(StatusCounts { shortlisted, locked })
    }

    // --- Todos ---

    async fn insert_todo(&self, todo: &Todo) -> PortResult<()> {
        insert_todo(&self.pool, todo).await
    }

    async fn list_todos(&self, user_id: Uuid, filter: TodoFilter) -> PortResult<Vec<Todo>> {
        let sql = format!(
            "SELECT {TODO_COLUMNS} FROM todos \
             WHERE user_id = $1 \
               AND ($2::bool IS NULL OR is_complete = $2) \
               AND ($3::text IS NULL OR category = $3) \
             ORDER BY created_at DESC"
        );
        let records = sqlx::query_as::<_, TodoRecord>(&sql)
            .bind(user_id)
            .bind(filter.completed)
            .bind(filter.category.map(|c| c.as_str()))
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        records.into_iter().map(TodoRecord::to_domain).collect()
    }

    async fn get_todo(&self, user_id: Uuid, todo_id: Uuid) -> PortResult<Todo> {
        let sql = format!("SELECT {TODO_COLUMNS} FROM todos WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, TodoRecord>(&sql)
            .bind(todo_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Todo {} not found", todo_id)))?
            .to_domain()
    }

    async fn update_todo(&self, todo: &Todo) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE todos SET title = $1, description = $2, category = $3, priority = $4, \
                 deadline = $5, is_complete = $6, completed_at = $7 \
             WHERE id = $8 AND user_id = $9",
        )
        .bind(&todo.title)
        .bind(&todo.description)
        .bind(todo.category.as_str())
        .bind(todo.priority.as_str())
        .bind(todo.deadline)
        .bind(todo.is_complete)
        .bind(todo.completed_at)
        .bind(todo.id)
        .bind(todo.user_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Todo {} not found", todo.id)));
        }
        Ok(())
    }

    async fn delete_todo(&self, user_id: Uuid, todo_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM todos WHERE id = $1 AND user_id = $2")
            .bind(todo_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Todo {} not found", todo_id)));
        }
        Ok(())
    }

    // --- Chat history ---

    async fn append_chat_entries(&self, entries: &[ChatEntry]) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        for entry in entries {
            sqlx::query(
                "INSERT INTO chat_history \
                     (id, user_id, role, message, actions, suggested_questions, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(entry.id)
            .bind(entry.user_id)
            .bind(entry.role.as_str())
            .bind(&entry.message)
            .bind(&entry.actions)
            .bind(entry.suggested_questions.as_ref().map(Json))
            .bind(entry.created_at)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }
        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn recent_chat_entries(&self, user_id: Uuid, limit: usize) -> PortResult<Vec<ChatEntry>> {
        let records = sqlx::query_as::<_, ChatRecord>(
            "SELECT id, user_id, role, message, actions, suggested_questions, created_at FROM ( \
                 SELECT * FROM chat_history WHERE user_id = $1 ORDER BY seq DESC LIMIT $2 \
             ) recent ORDER BY seq ASC",
        )
        .bind(user_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(ChatRecord::to_domain).collect()
    }

    async fn clear_chat_history(&self, user_id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM chat_history WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}

async fn insert_todo<'e, E>(executor: E, todo: &Todo) -> PortResult<()>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(
        "INSERT INTO todos (id, user_id, university_id, title, description, category, priority, \
             deadline, is_complete, completed_at, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(todo.id)
    .bind(todo.user_id)
    .bind(todo.university_id)
    .bind(&todo.title)
    .bind(&todo.description)
    .bind(todo.category.as_str())
    .bind(todo.priority.as_str())
    .bind(todo.deadline)
    .bind(todo.is_complete)
    .bind(todo.completed_at)
    .bind(todo.created_at)
    .execute(executor)
    .await
    .map_err(unexpected)?;
    Ok(())
}

//=========================================================================================
// `PlannerStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl PlannerStore for DbAdapter {
    async fn begin(&self) -> PortResult<Box<dyn PlannerTransaction>> {
        let tx = self.pool.begin().await.map_err(unexpected)?;
        Ok(Box::new(PgPlannerTransaction { tx }))
    }
}

/// One sqlx transaction. Dropping it without `commit` rolls back.
pub struct PgPlannerTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl PlannerTransaction for PgPlannerTransaction {
    async fn find_profile(&mut self, user_id: Uuid) -> PortResult<Option<Profile>> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = $1");
        sqlx::query_as::<_, ProfileRecord>(&sql)
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(unexpected)?
            .map(ProfileRecord::to_domain)
            .transpose()
    }

    async fn find_university(&mut self, university_id: Uuid) -> PortResult<Option<University>> {
        let sql = format!("SELECT {UNIVERSITY_COLUMNS} FROM universities WHERE id = $1");
        sqlx::query_as::<_, UniversityRecord>(&sql)
            .bind(university_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(unexpected)?
            .map(UniversityRecord::to_domain)
            .transpose()
    }

    async fn find_user_university(
        &mut self,
        user_id: Uuid,
        university_id: Uuid,
        status: Option<UniversityStatus>,
    ) -> PortResult<Option<UserUniversity>> {
        // FOR UPDATE serializes concurrent transitions of the same row.
        let sql = format!(
            "SELECT {USER_UNIVERSITY_COLUMNS} FROM user_universities \
             WHERE user_id = $1 AND university_id = $2 AND ($3::text IS NULL OR status = $3) \
             FOR UPDATE"
        );
        sqlx::query_as::<_, UserUniversityRecord>(&sql)
            .bind(user_id)
            .bind(university_id)
            .bind(status.map(|s| s.as_str()))
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(unexpected)?
            .map(UserUniversityRecord::to_domain)
            .transpose()
    }

    async fn insert_user_university(&mut self, entry: &UserUniversity) -> PortResult<()> {
        let sql = format!(
            "INSERT INTO user_universities ({USER_UNIVERSITY_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        );
        sqlx::query(&sql)
            .bind(entry.id)
            .bind(entry.user_id)
            .bind(entry.university_id)
            .bind(entry.status.as_str())
            .bind(entry.category.as_str())
            .bind(entry.acceptance_likelihood.as_str())
            .bind(&entry.fit_reason)
            .bind(&entry.risk_factors)
            .bind(entry.created_at)
            .bind(entry.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    PortError::Conflict(format!(
                        "University {} already listed for user {}",
                        entry.university_id, entry.user_id
                    ))
                } else {
                    unexpected(e)
                }
            })?;
        Ok(())
    }

    async fn update_user_university_status(
        &mut self,
        id: Uuid,
        status: UniversityStatus,
    ) -> PortResult<()> {
        sqlx::query("UPDATE user_universities SET status = $1, updated_at = now() WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn delete_user_university(&mut self, id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM user_universities WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn insert_todo(&mut self, todo: &Todo) -> PortResult<()> {
        insert_todo(&mut *self.tx, todo).await
    }

    async fn savepoint(&mut self) -> PortResult<()> {
        sqlx::query("SAVEPOINT planner_action")
            .execute(&mut *self.tx)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn release_savepoint(&mut self) -> PortResult<()> {
        sqlx::query("RELEASE SAVEPOINT planner_action")
            .execute(&mut *self.tx)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn rollback_to_savepoint(&mut self) -> PortResult<()> {
        sqlx::query("ROLLBACK TO SAVEPOINT planner_action")
            .execute(&mut *self.tx)
            .await
            .map_err(unexpected)?;
        // ROLLBACK TO keeps the savepoint; release it so marks do not pile up.
        self.release_savepoint().await
    }

    async fn commit(mut self: Box<Self>) -> PortResult<()> {
        // COMMIT on an aborted transaction reports success but rolls back.
        // Dropping `tx` here rolls it back instead.
        if let Err(e) = sqlx::query("SELECT 1").execute(&mut *self.tx).await {
            return Err(PortError::Unexpected(format!(
                "Transaction aborted before commit: {e}"
            )));
        }
        self.tx.commit().await.map_err(unexpected)
    }

    async fn rollback(self: Box<Self>) -> PortResult<()> {
        self.tx.rollback().await.map_err(unexpected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_patterns_escape_wildcards() {
        assert_eq!(like_pattern("Data Science"), "%Data Science%");
        assert_eq!(like_pattern("100%_ok"), "%100\\%\\_ok%");
    }
}
