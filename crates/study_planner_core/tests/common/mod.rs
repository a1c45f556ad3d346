#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use study_planner_core::domain::{
    ChatEntry, DegreeType, ExamRecord, ExamStatus, Level, ListedUniversity, Profile, SopStatus,
    StatusCounts, Todo, TodoFilter, University, UniversityQuery, UniversityStatus, User,
    UserCredentials, UserUniversity,
};
use study_planner_core::ports::{
    ConversationTurn, CounsellorModel, DatabaseService, PlannerStore, PlannerTransaction,
    PortError, PortResult,
};

//=========================================================================================
// In-memory storage
//=========================================================================================

#[derive(Debug, Default, Clone)]
pub struct State {
    pub users: HashMap<Uuid, UserCredentials>,
    pub sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
    pub profiles: HashMap<Uuid, Profile>,
    pub universities: Vec<University>,
    pub user_universities: Vec<UserUniversity>,
    pub todos: Vec<Todo>,
    pub chat: Vec<ChatEntry>,
}

impl State {
    fn listed(&self, user_id: Uuid, status: UniversityStatus) -> Vec<ListedUniversity> {
        self.user_universities
            .iter()
            .filter(|entry| entry.user_id == user_id && entry.status == status)
            .filter_map(|entry| {
                self.universities
                    .iter()
                    .find(|university| university.id == entry.university_id)
                    .map(|university| ListedUniversity {
                        entry: entry.clone(),
                        university: university.clone(),
                    })
            })
            .collect()
    }
}

/// Shared state behind both the plain database port and the transactional
/// planner store. Transactions work on a snapshot and write it back on commit.
///
/// Like Postgres, a failed statement leaves the transaction aborted: every
/// later statement fails and commit is refused until it rolls back to a
/// savepoint.
#[derive(Default, Clone)]
pub struct MemoryDatabase {
    pub state: Arc<Mutex<State>>,
    fail_commit: Arc<AtomicBool>,
    fail_savepoint: Arc<AtomicBool>,
    fail_next_todo_insert: Arc<AtomicBool>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_universities(universities: Vec<University>) -> Self {
        let db = Self::default();
        db.state.lock().expect("state mutex poisoned").universities = universities;
        db
    }

    /// Makes every subsequent commit fail.
    pub fn fail_commits(&self) {
        self.fail_commit.store(true, Ordering::SeqCst);
    }

    /// Makes every subsequent savepoint fail.
    pub fn fail_savepoints(&self) {
        self.fail_savepoint.store(true, Ordering::SeqCst);
    }

    /// Makes the next transactional todo insert fail once, aborting its
    /// transaction.
    pub fn fail_next_todo_insert(&self) {
        self.fail_next_todo_insert.store(true, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> State {
        self.state.lock().expect("state mutex poisoned").clone()
    }

    pub fn seed_user(&self, full_name: &str) -> User {
        let user = User {
            user_id: Uuid::new_v4(),
            email: format!("{}@example.com", full_name.to_lowercase().replace(' ', ".")),
            full_name: full_name.to_string(),
        };
        self.state.lock().expect("state mutex poisoned").users.insert(
            user.user_id,
            UserCredentials {
                user: user.clone(),
                hashed_password: "hash".to_string(),
            },
        );
        user
    }

    pub fn seed_profile(&self, profile: Profile) {
        self.state
            .lock()
            .expect("state mutex poisoned")
            .profiles
            .insert(profile.user_id, profile);
    }
}

#[async_trait]
impl DatabaseService for MemoryDatabase {
    async fn create_user(
        &self,
        email: &str,
        hashed_password: &str,
        full_name: &str,
    ) -> PortResult<User> {
        let mut state = self.state.lock().expect("state mutex poisoned");
        if state.users.values().any(|creds| creds.user.email == email) {
            return Err(PortError::Conflict(format!("User {email}")));
        }
        let user = User {
            user_id: Uuid::new_v4(),
            email: email.to_string(),
            full_name: full_name.to_string(),
        };
        state.users.insert(
            user.user_id,
            UserCredentials {
                user: user.clone(),
                hashed_password: hashed_password.to_string(),
            },
        );
        Ok(user)
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        let state = self.state.lock().expect("state mutex poisoned");
        state
            .users
            .get(&user_id)
            .map(|creds| creds.user.clone())
            .ok_or_else(|| PortError::NotFound(format!("User {user_id}")))
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let state = self.state.lock().expect("state mutex poisoned");
        state
            .users
            .values()
            .find(|creds| creds.user.email == email)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {email}")))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut state = self.state.lock().expect("state mutex poisoned");
        state
            .sessions
            .insert(session_id.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let state = self.state.lock().expect("state mutex poisoned");
        match state.sessions.get(session_id) {
            Some((user_id, expires_at)) if *expires_at > Utc::now() => Ok(*user_id),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.state
            .lock()
            .expect("state mutex poisoned")
            .sessions
            .remove(session_id);
        Ok(())
    }

    async fn upsert_profile(&self, profile: &Profile) -> PortResult<Profile> {
        let mut state = self.state.lock().expect("state mutex poisoned");
        state.profiles.insert(profile.user_id, profile.clone());
        Ok(profile.clone())
    }

    async fn get_profile(&self, user_id: Uuid) -> PortResult<Option<Profile>> {
        let state = self.state.lock().expect("state mutex poisoned");
        Ok(state.profiles.get(&user_id).cloned())
    }

    async fn search_universities(&self, query: &UniversityQuery) -> PortResult<Vec<University>> {
        let state = self.state.lock().expect("state mutex poisoned");
        let mut matches: Vec<University> = state
            .universities
            .iter()
            .filter(|university| query.matches(university))
            .cloned()
            .collect();
        matches.sort_by(|a, b| {
            let key = |u: &University| (u.ranking.is_none(), u.ranking, u.name.clone());
            key(a).cmp(&key(b))
        });
        matches.truncate(query.limit);
        Ok(matches)
    }

    async fn list_user_universities(
        &self,
        user_id: Uuid,
        status: UniversityStatus,
    ) -> PortResult<Vec<ListedUniversity>> {
        let state = self.state.lock().expect("state mutex poisoned");
        Ok(state.listed(user_id, status))
    }

    async fn count_user_universities(&self, user_id: Uuid) -> PortResult<StatusCounts> {
        let state = self.state.lock().expect("state mutex poisoned");
        let count = |status| {
            state
                .user_universities
                .iter()
                .filter(|entry| entry.user_id == user_id && entry.status == status)
                .count() as i64
        };
        Ok(StatusCounts {
            shortlisted: count(UniversityStatus::Shortlisted),
            locked: count(UniversityStatus::Locked),
        })
    }

    async fn insert_todo(&self, todo: &Todo) -> PortResult<()> {
        self.state
            .lock()
            .expect("state mutex poisoned")
            .todos
            .push(todo.clone());
        Ok(())
    }

    async fn list_todos(&self, user_id: Uuid, filter: TodoFilter) -> PortResult<Vec<Todo>> {
        let state = self.state.lock().expect("state mutex poisoned");
        Ok(state
            .todos
            .iter()
            .filter(|todo| todo.user_id == user_id && filter.matches(todo))
            .cloned()
            .collect())
    }

    async fn get_todo(&self, user_id: Uuid, todo_id: Uuid) -> PortResult<Todo> {
        let state = self.state.lock().expect("state mutex poisoned");
        state
            .todos
            .iter()
            .find(|todo| todo.id == todo_id && todo.user_id == user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Todo {todo_id}")))
    }

    async fn update_todo(&self, todo: &Todo) -> PortResult<()> {
        let mut state = self.state.lock().expect("state mutex poisoned");
        let slot = state
            .todos
            .iter_mut()
            .find(|existing| existing.id == todo.id && existing.user_id == todo.user_id)
            .ok_or_else(|| PortError::NotFound(format!("Todo {}", todo.id)))?;
        *slot = todo.clone();
        Ok(())
    }

    async fn delete_todo(&self, user_id: Uuid, todo_id: Uuid) -> PortResult<()> {
        let mut state = self.state.lock().expect("state mutex poisoned");
        let before = state.todos.len();
        state
            .todos
            .retain(|todo| !(todo.id == todo_id && todo.user_id == user_id));
        if state.todos.len() == before {
            return Err(PortError::NotFound(format!("Todo {todo_id}")));
        }
        Ok(())
    }

    async fn append_chat_entries(&self, entries: &[ChatEntry]) -> PortResult<()> {
        self.state
            .lock()
            .expect("state mutex poisoned")
            .chat
            .extend_from_slice(entries);
        Ok(())
    }

    async fn recent_chat_entries(&self, user_id: Uuid, limit: usize) -> PortResult<Vec<ChatEntry>> {
        let state = self.state.lock().expect("state mutex poisoned");
        let mine: Vec<ChatEntry> = state
            .chat
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .cloned()
            .collect();
        let skip = mine.len().saturating_sub(limit);
        Ok(mine.into_iter().skip(skip).collect())
    }

    async fn clear_chat_history(&self, user_id: Uuid) -> PortResult<()> {
        self.state
            .lock()
            .expect("state mutex poisoned")
            .chat
            .retain(|entry| entry.user_id != user_id);
        Ok(())
    }
}

#[async_trait]
impl PlannerStore for MemoryDatabase {
    async fn begin(&self) -> PortResult<Box<dyn PlannerTransaction>> {
        let snapshot = self.snapshot();
        Ok(Box::new(MemoryTransaction {
            shared: self.state.clone(),
            working: snapshot,
            savepoint: None,
            aborted: false,
            fail_commit: self.fail_commit.load(Ordering::SeqCst),
            fail_savepoint: self.fail_savepoint.load(Ordering::SeqCst),
            fail_next_todo_insert: self.fail_next_todo_insert.clone(),
        }))
    }
}

pub struct MemoryTransaction {
    shared: Arc<Mutex<State>>,
    working: State,
    savepoint: Option<State>,
    aborted: bool,
    fail_commit: bool,
    fail_savepoint: bool,
    fail_next_todo_insert: Arc<AtomicBool>,
}

impl MemoryTransaction {
    fn usable(&self) -> PortResult<()> {
        if self.aborted {
            return Err(PortError::Unexpected(
                "current transaction is aborted".to_string(),
            ));
        }
        Ok(())
    }

    fn abort<T>(&mut self, err: PortError) -> PortResult<T> {
        self.aborted = true;
        Err(err)
    }
}

#[async_trait]
impl PlannerTransaction for MemoryTransaction {
    async fn find_profile(&mut self, user_id: Uuid) -> PortResult<Option<Profile>> {
        self.usable()?;
        Ok(self.working.profiles.get(&user_id).cloned())
    }

    async fn find_university(&mut self, university_id: Uuid) -> PortResult<Option<University>> {
        self.usable()?;
        Ok(self
            .working
            .universities
            .iter()
            .find(|university| university.id == university_id)
            .cloned())
    }

    async fn find_user_university(
        &mut self,
        user_id: Uuid,
        university_id: Uuid,
        status: Option<UniversityStatus>,
    ) -> PortResult<Option<UserUniversity>> {
        self.usable()?;
        Ok(self
            .working
            .user_universities
            .iter()
            .find(|entry| {
                entry.user_id == user_id
                    && entry.university_id == university_id
                    && status.map_or(true, |status| entry.status == status)
            })
            .cloned())
    }

    async fn insert_user_university(&mut self, entry: &UserUniversity) -> PortResult<()> {
        self.usable()?;
        if self
            .working
            .user_universities
            .iter()
            .any(|existing| {
                existing.user_id == entry.user_id && existing.university_id == entry.university_id
            })
        {
            return self.abort(PortError::Conflict("user_universities".to_string()));
        }
        self.working.user_universities.push(entry.clone());
        Ok(())
    }

    async fn update_user_university_status(
        &mut self,
        id: Uuid,
        status: UniversityStatus,
    ) -> PortResult<()> {
        self.usable()?;
        let Some(entry) = self
            .working
            .user_universities
            .iter_mut()
            .find(|entry| entry.id == id)
        else {
            return self.abort(PortError::NotFound(format!("UserUniversity {id}")));
        };
        entry.status = status;
        entry.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_user_university(&mut self, id: Uuid) -> PortResult<()> {
        self.usable()?;
        self.working.user_universities.retain(|entry| entry.id != id);
        Ok(())
    }

    async fn insert_todo(&mut self, todo: &Todo) -> PortResult<()> {
        self.usable()?;
        if self.fail_next_todo_insert.swap(false, Ordering::SeqCst) {
            return self.abort(PortError::Unexpected(
                "invalid byte sequence for encoding \"UTF8\": 0x00".to_string(),
            ));
        }
        self.working.todos.push(todo.clone());
        Ok(())
    }

    async fn savepoint(&mut self) -> PortResult<()> {
        self.usable()?;
        if self.fail_savepoint {
            return self.abort(PortError::Unexpected("savepoint refused".to_string()));
        }
        self.savepoint = Some(self.working.clone());
        Ok(())
    }

    async fn release_savepoint(&mut self) -> PortResult<()> {
        self.usable()?;
        self.savepoint = None;
        Ok(())
    }

    async fn rollback_to_savepoint(&mut self) -> PortResult<()> {
        let saved = self
            .savepoint
            .take()
            .ok_or_else(|| PortError::Unexpected("no savepoint".to_string()))?;
        self.working = saved;
        self.aborted = false;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> PortResult<()> {
        if self.aborted {
            return Err(PortError::Unexpected(
                "transaction aborted before commit".to_string(),
            ));
        }
        if self.fail_commit {
            return Err(PortError::Unexpected("commit refused".to_string()));
        }
        *self.shared.lock().expect("state mutex poisoned") = self.working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> PortResult<()> {
        Ok(())
    }
}

//=========================================================================================
// Language model stubs
//=========================================================================================

/// Returns a fixed reply and records what it was asked.
#[derive(Default)]
pub struct ScriptedModel {
    reply: String,
    pub calls: Mutex<Vec<(String, Vec<ConversationTurn>, String)>>,
}

impl ScriptedModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CounsellorModel for ScriptedModel {
    async fn generate_reply(
        &self,
        context: &str,
        history: &[ConversationTurn],
        message: &str,
    ) -> PortResult<String> {
        self.calls.lock().expect("calls mutex poisoned").push((
            context.to_string(),
            history.to_vec(),
            message.to_string(),
        ));
        Ok(self.reply.clone())
    }
}

pub struct FailingModel;

#[async_trait]
impl CounsellorModel for FailingModel {
    async fn generate_reply(
        &self,
        _context: &str,
        _history: &[ConversationTurn],
        _message: &str,
    ) -> PortResult<String> {
        Err(PortError::Unexpected("429 quota exceeded".to_string()))
    }
}

//=========================================================================================
// Fixtures
//=========================================================================================

pub fn profile(user_id: Uuid) -> Profile {
    Profile {
        user_id,
        education_level: Some("Bachelor's".to_string()),
        degree: Some("B.Tech".to_string()),
        major: Some("Computer Science".to_string()),
        graduation_year: Some(2024),
        gpa: Some(3.8),
        intended_degree: DegreeType::Masters,
        field_of_study: Some("Computer Science".to_string()),
        target_intake_year: Some(2026),
        preferred_countries: vec!["Canada".to_string()],
        budget_min: Some(20000),
        budget_max: Some(60000),
        funding_type: None,
        ielts: ExamRecord {
            status: Some(ExamStatus::Completed),
            score: Some(7.5),
        },
        toefl: ExamRecord::default(),
        gre: ExamRecord::default(),
        gmat: ExamRecord::default(),
        sop_status: Some(SopStatus::Draft),
        completed_at: Some(Utc::now()),
    }
}

pub fn university(name: &str, ranking: Option<i32>, competitiveness: Level) -> University {
    University {
        id: Uuid::new_v4(),
        name: name.to_string(),
        country: "Canada".to_string(),
        degree_type: DegreeType::Masters,
        field_of_study: Some("Computer Science".to_string()),
        cost_level: Some(Level::Medium),
        estimated_cost_min: Some(30000),
        estimated_cost_max: Some(45000),
        competitiveness: Some(competitiveness),
        avg_gpa_required: Some(3.5),
        min_ielts_required: Some(6.5),
        min_toefl_required: None,
        min_gre_required: None,
        description: None,
        website: None,
        ranking,
    }
}

/// A user with a completed profile and the given catalogue.
pub fn seeded(universities: Vec<University>) -> (MemoryDatabase, User, Profile) {
    let db = MemoryDatabase::with_universities(universities);
    let user = db.seed_user("Ana Silva");
    let profile = profile(user.user_id);
    db.seed_profile(profile.clone());
    (db, user, profile)
}
