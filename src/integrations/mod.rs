//! External integrations module.
//!
//! Provides the OpenAI chat completion client.

pub mod openai;

pub use openai::{ChatMessage, Completion, OpenAIClient, Usage};
