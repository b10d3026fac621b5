use crate::{
    error::RecadoError,
    intent::ProviderReply,
    message::{IncomingMessage, OutgoingMessage},
    task::{NewTask, Task, TaskFilter, TaskStatus},
};
use async_trait::async_trait;

/// Intent-extraction provider — the brain.
///
/// Turns a free-form user message into either a chat reply or a structured
/// intent, via an LLM with tool calling.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Whether this provider requires an API key to function.
    fn requires_api_key(&self) -> bool;

    /// Extract a reply or intent from a user message.
    async fn extract(&self, text: &str) -> Result<ProviderReply, RecadoError>;

    /// Check if the provider is available and ready.
    async fn is_available(&self) -> bool;
}

/// Messaging channel trait — how users reach the assistant.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name.
    fn name(&self) -> &str;

    /// Start listening for incoming messages.
    /// Returns a receiver that yields incoming messages.
    async fn start(&self) -> Result<tokio::sync::mpsc::Receiver<IncomingMessage>, RecadoError>;

    /// Send a response back through this channel.
    async fn send(&self, message: OutgoingMessage) -> Result<(), RecadoError>;

    /// Send a typing indicator to show the bot is processing.
    async fn send_typing(&self, _target: &str) -> Result<(), RecadoError> {
        Ok(())
    }

    /// Graceful shutdown.
    async fn stop(&self) -> Result<(), RecadoError>;
}

/// External task store contract.
///
/// The store (Notion in production) is the system of record for tasks; a
/// write must be visible to the next read.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// List tasks matching the filter. Archived tasks are never returned.
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, RecadoError>;

    /// Fetch a single task by store ID. `Ok(None)` when it no longer exists
    /// or has been archived.
    async fn get_task(&self, id: &str) -> Result<Option<Task>, RecadoError>;

    /// Create a task and return it with its store-assigned ID.
    async fn create_task(&self, task: NewTask) -> Result<Task, RecadoError>;

    /// Update the status of an existing task.
    async fn set_status(&self, id: &str, status: TaskStatus) -> Result<(), RecadoError>;

    /// Archive (soft-delete) a task.
    async fn archive(&self, id: &str) -> Result<(), RecadoError>;
}
