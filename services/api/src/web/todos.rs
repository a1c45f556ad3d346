//! services/api/src/web/todos.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use study_planner_core::domain::{Todo, TodoCategory, TodoFilter, TodoPriority, UnknownLabel};
use study_planner_core::ports::PortError;
use study_planner_core::todos::{self, NewTodo, TodoPatch};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TodoResponse {
    pub id: Uuid,
    pub university_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    #[schema(example = "document")]
    pub category: String,
    #[schema(example = "high")]
    pub priority: String,
    pub deadline: Option<NaiveDate>,
    pub is_complete: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Todo> for TodoResponse {
    fn from(todo: Todo) -> Self {
        Self {
            id: todo.id,
            university_id: todo.university_id,
            title: todo.title,
            description: todo.description,
            category: todo.category.to_string(),
            priority: todo.priority.to_string(),
            deadline: todo.deadline,
            is_complete: todo.is_complete,
            completed_at: todo.completed_at,
            created_at: todo.created_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateTodoRequest {
    pub title: String,
    pub description: Option<String>,
    #[schema(example = "exam")]
    pub category: String,
    /// Defaults to `medium`.
    pub priority: Option<String>,
    pub deadline: Option<NaiveDate>,
    pub university_id: Option<Uuid>,
}

/// Omitted fields are left unchanged. An explicit `null` clears
/// `description` and `deadline`.
#[derive(Deserialize, Default, ToSchema)]
pub struct UpdateTodoRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    pub category: Option<String>,
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<NaiveDate>)]
    pub deadline: Option<Option<NaiveDate>>,
    pub is_complete: Option<bool>,
}

/// Maps a present field, `null` included, to `Some`. Absent fields fall back
/// to `None` through `#[serde(default)]`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TodoListParams {
    pub completed: Option<bool>,
    pub category: Option<String>,
}

fn parse_category(value: &str) -> Result<TodoCategory, ApiError> {
    value
        .parse()
        .map_err(|e: UnknownLabel| ApiError::BadRequest(e.to_string()))
}

fn parse_priority(value: &str) -> Result<TodoPriority, ApiError> {
    value
        .parse()
        .map_err(|e: UnknownLabel| ApiError::BadRequest(e.to_string()))
}

impl CreateTodoRequest {
    fn into_new_todo(self) -> Result<NewTodo, ApiError> {
        Ok(NewTodo {
            title: self.title,
            description: self.description,
            category: parse_category(&self.category)?,
            priority: self
                .priority
                .as_deref()
                .map(parse_priority)
                .transpose()?
                .unwrap_or(TodoPriority::Medium),
            deadline: self.deadline,
            university_id: self.university_id,
        })
    }
}

impl UpdateTodoRequest {
    fn into_patch(self) -> Result<TodoPatch, ApiError> {
        Ok(TodoPatch {
            title: self.title,
            description: self.description,
            category: self.category.as_deref().map(parse_category).transpose()?,
            priority: self.priority.as_deref().map(parse_priority).transpose()?,
            deadline: self.deadline,
            is_complete: self.is_complete,
        })
    }
}

fn todo_not_found(err: PortError) -> ApiError {
    match err {
        PortError::NotFound(_) => ApiError::NotFound("Todo not found".to_string()),
        other => ApiError::Port(other),
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/api/todos",
    tag = "Todos",
    params(TodoListParams),
    responses(
        (status = 200, description = "Todos, incomplete and most urgent first", body = [TodoResponse])
    )
)]
pub async fn list_todos_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(params): Query<TodoListParams>,
) -> Result<Json<Vec<TodoResponse>>, ApiError> {
    let filter = TodoFilter {
        completed: params.completed,
        category: params.category.as_deref().map(parse_category).transpose()?,
    };
    let todos = todos::list_todos(state.db.as_ref(), user_id, filter).await?;
    Ok(Json(todos.into_iter().map(TodoResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/api/todos",
    tag = "Todos",
    request_body = CreateTodoRequest,
    responses(
        (status = 201, description = "Todo created", body = TodoResponse),
        (status = 400, description = "Blank title or unknown label")
    )
)]
pub async fn create_todo_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<CreateTodoRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let todo = todos::create_todo(state.db.as_ref(), user_id, req.into_new_todo()?).await?;
    Ok((StatusCode::CREATED, Json(TodoResponse::from(todo))))
}

#[utoipa::path(
    get,
    path = "/api/todos/{todo_id}",
    tag = "Todos",
    params(("todo_id" = Uuid, Path, description = "The todo to fetch")),
    responses(
        (status = 200, description = "The todo", body = TodoResponse),
        (status = 404, description = "Todo not found")
    )
)]
pub async fn get_todo_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(todo_id): Path<Uuid>,
) -> Result<Json<TodoResponse>, ApiError> {
    let todo = state
        .db
        .get_todo(user_id, todo_id)
        .await
        .map_err(todo_not_found)?;
    Ok(Json(todo.into()))
}

#[utoipa::path(
    patch,
    path = "/api/todos/{todo_id}",
    tag = "Todos",
    request_body = UpdateTodoRequest,
    params(("todo_id" = Uuid, Path, description = "The todo to update")),
    responses(
        (status = 200, description = "The updated todo", body = TodoResponse),
        (status = 404, description = "Todo not found")
    )
)]
pub async fn update_todo_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(todo_id): Path<Uuid>,
    Json(req): Json<UpdateTodoRequest>,
) -> Result<Json<TodoResponse>, ApiError> {
    let todo = todos::update_todo(state.db.as_ref(), user_id, todo_id, req.into_patch()?).await?;
    Ok(Json(todo.into()))
}

#[utoipa::path(
    post,
    path = "/api/todos/{todo_id}/complete",
    tag = "Todos",
    params(("todo_id" = Uuid, Path, description = "The todo to complete")),
    responses(
        (status = 200, description = "The completed todo", body = TodoResponse),
        (status = 404, description = "Todo not found")
    )
)]
pub async fn complete_todo_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(todo_id): Path<Uuid>,
) -> Result<Json<TodoResponse>, ApiError> {
    let todo = todos::complete_todo(state.db.as_ref(), user_id, todo_id).await?;
    Ok(Json(todo.into()))
}

#[utoipa::path(
    delete,
    path = "/api/todos/{todo_id}",
    tag = "Todos",
    params(("todo_id" = Uuid, Path, description = "The todo to delete")),
    responses(
        (status = 204, description = "Todo deleted"),
        (status = 404, description = "Todo not found")
    )
)]
pub async fn delete_todo_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(todo_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .db
        .delete_todo(user_id, todo_id)
        .await
        .map_err(todo_not_found)?;
    Ok(StatusCode::NO_CONTENT)
}
