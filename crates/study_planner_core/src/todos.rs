//! crates/study_planner_core/src/todos.rs
//!
//! The application task list.

use chrono::{DateTime, NaiveDate, Utc};
use std::cmp::Reverse;
use uuid::Uuid;

use crate::domain::{Todo, TodoCategory, TodoFilter, TodoPriority};
use crate::ports::{DatabaseService, PortError};

#[derive(Debug, thiserror::Error)]
pub enum TodoError {
    #[error("Todo title cannot be blank")]
    BlankTitle,
    #[error(transparent)]
    Port(#[from] PortError),
}

pub type TodoResult<T> = Result<T, TodoError>;

#[derive(Debug, Clone)]
pub struct NewTodo {
    pub title: String,
    pub description: Option<String>,
    pub category: TodoCategory,
    pub priority: TodoPriority,
    pub deadline: Option<NaiveDate>,
    pub university_id: Option<Uuid>,
}

/// Partial update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct TodoPatch {
    pub title: Option<String>,
    /// `Some(Some(val))` = set, `Some(None)` = clear, `None` = no change.
    pub description: Option<Option<String>>,
    pub category: Option<TodoCategory>,
    pub priority: Option<TodoPriority>,
    /// `Some(Some(val))` = set, `Some(None)` = clear, `None` = no change.
    pub deadline: Option<Option<NaiveDate>>,
    pub is_complete: Option<bool>,
}

fn checked_title(title: &str) -> TodoResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(TodoError::BlankTitle);
    }
    Ok(title.to_string())
}

impl NewTodo {
    pub fn into_todo(self, user_id: Uuid, now: DateTime<Utc>) -> TodoResult<Todo> {
        Ok(Todo {
            id: Uuid::new_v4(),
            user_id,
            university_id: self.university_id,
            title: checked_title(&self.title)?,
            description: self.description,
            category: self.category,
            priority: self.priority,
            deadline: self.deadline,
            is_complete: false,
            completed_at: None,
            created_at: now,
        })
    }
}

impl Todo {
    /// `completed_at` is stamped on false -> true and cleared on true -> false.
    /// Completing an already-complete todo keeps its original timestamp.
    pub fn set_complete(&mut self, complete: bool, now: DateTime<Utc>) {
        match (self.is_complete, complete) {
            (false, true) => self.completed_at = Some(now),
            (true, false) => self.completed_at = None,
            _ => {}
        }
        self.is_complete = complete;
    }

    pub fn apply(&mut self, patch: TodoPatch, now: DateTime<Utc>) -> TodoResult<()> {
        if let Some(title) = patch.title {
            self.title = checked_title(&title)?;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(deadline) = patch.deadline {
            self.deadline = deadline;
        }
        if let Some(complete) = patch.is_complete {
            self.set_complete(complete, now);
        }
        Ok(())
    }
}

/// Incomplete first, then most urgent, then newest.
pub fn sort_for_display(todos: &mut [Todo]) {
    todos.sort_by_key(|todo| {
        (
            todo.is_complete,
            Reverse(todo.priority.rank()),
            Reverse(todo.created_at),
        )
    });
}

pub async fn create_todo(
    db: &dyn DatabaseService,
    user_id: Uuid,
    new_todo: NewTodo,
) -> TodoResult<Todo> {
    let todo = new_todo.into_todo(user_id, Utc::now())?;
    db.insert_todo(&todo).await?;
    Ok(todo)
}

pub async fn list_todos(
    db: &dyn DatabaseService,
    user_id: Uuid,
    filter: TodoFilter,
) -> TodoResult<Vec<Todo>> {
    let mut todos = db.list_todos(user_id, filter).await?;
    sort_for_display(&mut todos);
    Ok(todos)
}

pub async fn update_todo(
    db: &dyn DatabaseService,
    user_id: Uuid,
    todo_id: Uuid,
    patch: TodoPatch,
) -> TodoResult<Todo> {
    let mut todo = db.get_todo(user_id, todo_id).await?;
    todo.apply(patch, Utc::now())?;
    db.update_todo(&todo).await?;
    Ok(todo)
}

pub async fn complete_todo(
    db: &dyn DatabaseService,
    user_id: Uuid,
    todo_id: Uuid,
) -> TodoResult<Todo> {
    let patch = TodoPatch {
        is_complete: Some(true),
        ..TodoPatch::default()
    };
    update_todo(db, user_id, todo_id, patch).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn todo(priority: TodoPriority, age_minutes: i64) -> Todo {
        NewTodo {
            title: format!("{priority} task"),
            description: None,
            category: TodoCategory::Other,
            priority,
            deadline: None,
            university_id: None,
        }
        .into_todo(Uuid::new_v4(), Utc::now() - Duration::minutes(age_minutes))
        .expect("valid todo")
    }

    #[test]
    fn completion_timestamp_follows_transitions() {
        let mut t = todo(TodoPriority::High, 0);
        let first = Utc::now();
        t.set_complete(true, first);
        assert_eq!(t.completed_at, Some(first));

        t.set_complete(true, first + Duration::hours(1));
        assert_eq!(t.completed_at, Some(first));

        t.set_complete(false, first + Duration::hours(2));
        assert!(!t.is_complete);
        assert_eq!(t.completed_at, None);
    }

    #[test]
    fn blank_titles_are_rejected() {
        let mut t = todo(TodoPriority::Low, 0);
        let patch = TodoPatch {
            title: Some("   ".to_string()),
            ..TodoPatch::default()
        };
        assert!(matches!(t.apply(patch, Utc::now()), Err(TodoError::BlankTitle)));
    }

    #[test]
    fn patches_set_keep_and_clear_optional_fields() {
        let mut t = todo(TodoPriority::Low, 0);
        let deadline = NaiveDate::from_ymd_opt(2026, 1, 15).expect("valid date");
        let set = TodoPatch {
            description: Some(Some("Certified copies".to_string())),
            deadline: Some(Some(deadline)),
            ..TodoPatch::default()
        };
        t.apply(set, Utc::now()).expect("set");
        assert_eq!(t.description.as_deref(), Some("Certified copies"));
        assert_eq!(t.deadline, Some(deadline));

        t.apply(TodoPatch::default(), Utc::now()).expect("keep");
        assert_eq!(t.deadline, Some(deadline));

        let clear = TodoPatch {
            description: Some(None),
            deadline: Some(None),
            ..TodoPatch::default()
        };
        t.apply(clear, Utc::now()).expect("clear");
        assert_eq!(t.description, None);
        assert_eq!(t.deadline, None);
    }

    #[test]
    fn display_order() {
        let mut done = todo(TodoPriority::High, 1);
        done.set_complete(true, Utc::now());
        let mut todos = vec![
            done,
            todo(TodoPriority::Low, 1),
            todo(TodoPriority::High, 10),
            todo(TodoPriority::High, 1),
            todo(TodoPriority::Medium, 1),
        ];
        let ids: Vec<Uuid> = todos.iter().map(|t| t.id).collect();
        sort_for_display(&mut todos);
        let order: Vec<Uuid> = todos.iter().map(|t| t.id).collect();
        assert_eq!(order, vec![ids[3], ids[2], ids[4], ids[1], ids[0]]);
    }
}
