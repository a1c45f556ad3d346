//! crates/study_planner_core/src/actions.rs
//!
//! The structured-action protocol embedded in counsellor replies.
//!
//! The model is asked to end its reply with a tagged JSON block:
//!
//! ```text
//! [ACTIONS]
//! {"actions": [{"type": "lock_university", "university_id": "..."}], "suggestions": ["..."]}
//! [/ACTIONS]
//! ```
//!
//! A `[DATA]` block with the same shape is also accepted and takes precedence.
//! Anything malformed degrades to "no actions"; nothing here returns an error
//! to the chat layer.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::{Category, TodoCategory, TodoPriority};

fn data_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\[DATA\](.*?)\[/DATA\]").expect("valid regex"))
}

fn actions_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\[ACTIONS\](.*?)\[/ACTIONS\]").expect("valid regex"))
}

/// The model reply split into what the user sees and what the system acts on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedReply {
    pub message: String,
    /// Raw action objects, kept verbatim for the chat transcript.
    pub actions: Vec<Value>,
    pub suggestions: Vec<String>,
}

/// Returns the first tagged block (DATA, then ACTIONS) whose body is valid JSON.
pub fn extract_payload(raw: &str) -> Option<Value> {
    [data_block(), actions_block()].into_iter().find_map(|re| {
        re.captures(raw)
            .and_then(|caps| caps.get(1))
            .and_then(|body| serde_json::from_str::<Value>(body.as_str().trim()).ok())
    })
}

/// `actions` must be an array made only of objects.
fn payload_actions(payload: &Value) -> Vec<Value> {
    match payload.get("actions") {
        Some(Value::Array(items)) if items.iter().all(Value::is_object) => items.clone(),
        _ => Vec::new(),
    }
}

fn payload_suggestions(payload: &Value) -> Vec<String> {
    match payload.get("suggestions") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str())
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

pub fn parse_reply(raw: &str) -> ParsedReply {
    let payload = extract_payload(raw);
    let stripped = data_block().replace_all(raw, "");
    let stripped = actions_block().replace_all(&stripped, "");

    ParsedReply {
        message: stripped.trim().to_string(),
        actions: payload.as_ref().map(payload_actions).unwrap_or_default(),
        suggestions: payload.as_ref().map(payload_suggestions).unwrap_or_default(),
    }
}

//=========================================================================================
// Typed actions
//=========================================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ChatAction {
    ShortlistUniversity {
        university_id: Uuid,
        /// Requested storage category; `None` when absent or not a valid label.
        category: Option<Category>,
    },
    LockUniversity {
        university_id: Uuid,
    },
    CreateTodo {
        title: String,
        description: Option<String>,
        category: TodoCategory,
        priority: TodoPriority,
    },
}

impl ChatAction {
    pub fn kind(&self) -> &str {
        match self {
            ChatAction::ShortlistUniversity { .. } => "shortlist_university",
            ChatAction::LockUniversity { .. } => "lock_university",
            ChatAction::CreateTodo { .. } => "create_todo",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionDecodeError {
    #[error("Invalid university ID received ({raw})")]
    InvalidUniversityId { kind: String, raw: String },
    #[error("Task title is required")]
    MissingTitle,
}

impl ActionDecodeError {
    /// The action type the malformed request claimed to be.
    pub fn kind(&self) -> &str {
        match self {
            ActionDecodeError::InvalidUniversityId { kind, .. } => kind,
            ActionDecodeError::MissingTitle => "create_todo",
        }
    }
}

fn text_field<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Renders a field the way it arrived, for error messages.
fn raw_field(fields: &Map<String, Value>, key: &str) -> String {
    match fields.get(key) {
        None | Some(Value::Null) => "None".to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

fn university_id(fields: &Map<String, Value>, kind: &str) -> Result<Uuid, ActionDecodeError> {
    text_field(fields, "university_id")
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or_else(|| ActionDecodeError::InvalidUniversityId {
            kind: kind.to_string(),
            raw: raw_field(fields, "university_id"),
        })
}

/// Decodes one action object, or `Ok(None)` for an unrecognised `type`.
/// Optional enum fields that do not parse fall back to their defaults rather
/// than failing the action.
pub fn decode_action(
    fields: &Map<String, Value>,
) -> Result<Option<ChatAction>, ActionDecodeError> {
    let kind = fields
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let action = match kind {
        "shortlist_university" => ChatAction::ShortlistUniversity {
            university_id: university_id(fields, kind)?,
            category: text_field(fields, "category").and_then(|c| c.parse().ok()),
        },
        "lock_university" => ChatAction::LockUniversity {
            university_id: university_id(fields, kind)?,
        },
        "create_todo" => {
            let title = text_field(fields, "title").ok_or(ActionDecodeError::MissingTitle)?;
            ChatAction::CreateTodo {
                title: title.to_string(),
                description: text_field(fields, "description").map(str::to_string),
                category: text_field(fields, "category")
                    .and_then(|c| c.parse().ok())
                    .unwrap_or(TodoCategory::Other),
                priority: text_field(fields, "priority")
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(TodoPriority::Medium),
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(action))
}

/// Decodes a batch, keeping input order. Non-object entries and unrecognised
/// action types are dropped.
pub fn decode_actions(raw: &[Value]) -> Vec<Result<ChatAction, ActionDecodeError>> {
    raw.iter()
        .filter_map(Value::as_object)
        .filter_map(|fields| decode_action(fields).transpose())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_actions_and_strips_block() {
        let raw = "Great choice!\n[ACTIONS]\n{\"actions\": [{\"type\": \"create_todo\", \"title\": \"Book IELTS\"}], \"suggestions\": [\"What next?\"]}\n[/ACTIONS]";
        let parsed = parse_reply(raw);
        assert_eq!(parsed.message, "Great choice!");
        assert_eq!(parsed.actions.len(), 1);
        assert_eq!(parsed.suggestions, vec!["What next?".to_string()]);
    }

    #[test]
    fn data_block_takes_precedence() {
        let raw = "Hi [DATA]{\"actions\": [], \"suggestions\": [\"a\"]}[/DATA] \
                   [ACTIONS]{\"actions\": [{\"type\": \"x\"}]}[/ACTIONS]";
        let parsed = parse_reply(raw);
        assert!(parsed.actions.is_empty());
        assert_eq!(parsed.suggestions, vec!["a".to_string()]);
        assert_eq!(parsed.message, "Hi");
    }

    #[test]
    fn falls_back_to_actions_when_data_is_malformed() {
        let raw = "[DATA]{not json[/DATA][ACTIONS]{\"actions\": [{\"type\": \"x\"}]}[/ACTIONS]";
        assert_eq!(parse_reply(raw).actions.len(), 1);
    }

    #[test]
    fn malformed_payloads_degrade_to_no_actions() {
        for raw in [
            "[ACTIONS]{\"actions\": [1, 2]}[/ACTIONS]",
            "[ACTIONS]{\"actions\": {\"type\": \"create_todo\"}}[/ACTIONS]",
            "[ACTIONS]not json at all[/ACTIONS]",
            "no block here",
        ] {
            let parsed = parse_reply(raw);
            assert!(parsed.actions.is_empty(), "{raw}");
        }
    }

    #[test]
    fn decodes_known_actions() {
        let id = Uuid::new_v4();
        let raw = vec![
            json!({"type": "shortlist_university", "university_id": id.to_string(), "category": "dream"}),
            json!({"type": "lock_university", "university_id": id.to_string()}),
            json!({"type": "create_todo", "title": "Draft SOP"}),
            json!({"type": "update_stage"}),
            json!("not an object"),
        ];
        let decoded = decode_actions(&raw);
        assert_eq!(decoded.len(), 3);
        assert_eq!(
            decoded[0],
            Ok(ChatAction::ShortlistUniversity {
                university_id: id,
                category: Some(Category::Dream)
            })
        );
        assert_eq!(decoded[1], Ok(ChatAction::LockUniversity { university_id: id }));
        assert_eq!(
            decoded[2],
            Ok(ChatAction::CreateTodo {
                title: "Draft SOP".to_string(),
                description: None,
                category: TodoCategory::Other,
                priority: TodoPriority::Medium,
            })
        );
    }

    #[test]
    fn rejects_malformed_university_ids() {
        let fields = json!({"type": "lock_university", "university_id": "mit"});
        let err = decode_action(fields.as_object().unwrap()).unwrap_err();
        assert_eq!(err.to_string(), "Invalid university ID received (mit)");
        assert_eq!(err.kind(), "lock_university");

        let fields = json!({"type": "shortlist_university"});
        let err = decode_action(fields.as_object().unwrap()).unwrap_err();
        assert_eq!(err.to_string(), "Invalid university ID received (None)");
    }
}
