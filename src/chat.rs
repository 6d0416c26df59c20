//! LLM chat orchestration: prompt assembly and conversation history

use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::config::Settings;
use crate::conversation::ConversationStore;
use crate::error::Result;
use crate::integrations::{ChatMessage, OpenAIClient, Usage};

const PERSONA: &str = "You are a helpful AI assistant for infrastructure questions. You provide \
accurate, professional, and friendly responses to user queries.";

/// System prompt, with retrieved context appended when there is any.
pub fn build_system_prompt(context: &str) -> String {
    let mut prompt = PERSONA.to_string();
    if !context.is_empty() {
        prompt.push_str(
            "\n\nYou have access to the following relevant information to help answer the \
             user's question:\n\n",
        );
        prompt.push_str(context);
        prompt.push_str(
            "\n\nUse this information to provide accurate and contextual responses. If the \
             information provided is not relevant to the question, rely on your general \
             knowledge. Always cite sources when using the provided information.",
        );
    }
    prompt
}

/// A model reply bound to its conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    pub response: String,
    pub conversation_id: String,
    pub model: String,
    pub usage: Usage,
}

/// Sends user messages to the completion API with history and context.
pub struct ChatEngine {
    client: OpenAIClient,
    conversations: Arc<dyn ConversationStore>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl ChatEngine {
    pub fn new(
        client: OpenAIClient,
        conversations: Arc<dyn ConversationStore>,
        model: impl Into<String>,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            client,
            conversations,
            model: model.into(),
            temperature,
            max_tokens,
        }
    }

    pub fn from_settings(settings: &Settings, conversations: Arc<dyn ConversationStore>) -> Result<Self> {
        let client = OpenAIClient::new(settings.openai_api_key.clone())?
            .with_base_url(settings.openai_base_url.clone());
        Ok(Self::new(
            client,
            conversations,
            settings.openai_model.clone(),
            settings.openai_temperature,
            settings.openai_max_tokens,
        ))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn conversations(&self) -> &Arc<dyn ConversationStore> {
        &self.conversations
    }

    /// Answer `user_message`, continuing `conversation_id` or starting a new
    /// conversation. History is only updated when the completion succeeds.
    pub async fn generate_response(
        &self,
        user_message: &str,
        context: &str,
        conversation_id: Option<&str>,
    ) -> Result<ChatReply> {
        let conversation_id = match conversation_id {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };

        let history = self.conversations.history(&conversation_id).await?;
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(build_system_prompt(context)));
        messages.extend(history);
        messages.push(ChatMessage::user(user_message));

        info!("Generating response for conversation {}", conversation_id);

        let completion = self
            .client
            .chat_completion(messages, &self.model, self.temperature, self.max_tokens)
            .await?;

        self.conversations
            .append_exchange(&conversation_id, user_message, &completion.content)
            .await?;

        Ok(ChatReply {
            response: completion.content,
            conversation_id,
            model: self.model.clone(),
            usage: completion.usage,
        })
    }
}
