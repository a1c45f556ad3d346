//! services/api/src/adapters/counsellor_llm.rs
//!
//! This module contains the adapter for the counsellor chat model.
//! It implements the `CounsellorModel` port from the `core` crate against any
//! OpenAI-compatible chat completions endpoint (OpenAI itself, or Gemini's
//! compatibility endpoint).

use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use study_planner_core::ports::{ConversationTurn, CounsellorModel, PortError, PortResult};

use crate::config::{AiService, Config, ConfigError};

const GEMINI_OPENAI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `CounsellorModel` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiCounsellorAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    timeout: Duration,
}

impl OpenAiCounsellorAdapter {
    /// Creates a new `OpenAiCounsellorAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String, timeout: Duration) -> Self {
        Self {
            client,
            model,
            timeout,
        }
    }

    /// Builds the client for whichever provider the configuration selects.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let (key_var, base) = match config.ai_service {
            AiService::Gemini => ("GEMINI_API_KEY", Some(GEMINI_OPENAI_BASE)),
            AiService::OpenAi => ("OPENAI_API_KEY", None),
        };
        let api_key = config
            .counsellor_api_key()
            .ok_or_else(|| ConfigError::MissingVar(key_var.to_string()))?;

        let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base) = base {
            openai_config = openai_config.with_api_base(base);
        }

        Ok(Self::new(
            Client::with_config(openai_config),
            config.counsellor_model.clone(),
            config.counsellor_timeout,
        ))
    }
}

fn build_messages(
    context: &str,
    history: &[ConversationTurn],
    message: &str,
) -> PortResult<Vec<ChatCompletionRequestMessage>> {
    let mut messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(history.len() + 2);
    messages.push(
        ChatCompletionRequestSystemMessageArgs::default()
            .content(context)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into(),
    );

    for turn in history {
        let turn_message = if turn.from_user {
            ChatCompletionRequestUserMessageArgs::default()
                .content(turn.text.as_str())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into()
        } else {
            ChatCompletionRequestAssistantMessageArgs::default()
                .content(turn.text.as_str())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into()
        };
        messages.push(turn_message);
    }

    messages.push(
        ChatCompletionRequestUserMessageArgs::default()
            .content(message)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into(),
    );
    Ok(messages)
}

//=========================================================================================
// `CounsellorModel` Trait Implementation
//=========================================================================================

#[async_trait]
impl CounsellorModel for OpenAiCounsellorAdapter {
    async fn generate_reply(
        &self,
        context: &str,
        history: &[ConversationTurn],
        message: &str,
    ) -> PortResult<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(build_messages(context, history, message)?)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| {
                PortError::Unexpected(format!(
                    "Counsellor model timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected("Counsellor model returned no text content.".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_replayed_between_system_and_new_message() {
        let history = vec![
            ConversationTurn {
                from_user: true,
                text: "Is Canada affordable?".to_string(),
            },
            ConversationTurn {
                from_user: false,
                text: "It can be.".to_string(),
            },
        ];
        let messages =
            build_messages("context", &history, "What about Germany?").expect("messages");

        assert_eq!(messages.len(), 4);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(messages[1], ChatCompletionRequestMessage::User(_)));
        assert!(matches!(messages[2], ChatCompletionRequestMessage::Assistant(_)));
        assert!(matches!(messages[3], ChatCompletionRequestMessage::User(_)));
    }
}
