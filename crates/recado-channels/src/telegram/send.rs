//! Message sending and command registration.

use super::TelegramChannel;
use crate::utils::split_message;
use recado_core::error::RecadoError;
use thiserror::Error;
use tracing::{info, warn};

/// Why a sendMessage call failed.
#[derive(Debug, Error)]
enum PostError {
    #[error("entity parse rejected: {0}")]
    BadEntities(String),
    #[error("{0}")]
    Http(String),
}

impl TelegramChannel {
    /// Send a text message to a specific chat.
    ///
    /// Messages are chunked at Telegram's 4096-character limit. Markdown is
    /// attempted first; on an entity-parse rejection the chunk is resent as
    /// plain text, since replies often quote user-written titles.
    pub(crate) async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), RecadoError> {
        for chunk in split_message(text, 4096) {
            match self.post_message(chat_id, chunk, Some("Markdown")).await {
                Ok(()) => {}
                Err(PostError::BadEntities(detail)) => {
                    warn!("Markdown parse failed, retrying as plain text: {detail}");
                    self.post_message(chat_id, chunk, None)
                        .await
                        .map_err(|e| {
                            RecadoError::Channel(format!("telegram plain fallback failed: {e}"))
                        })?;
                }
                Err(e) => {
                    return Err(RecadoError::Channel(format!("telegram send failed: {e}")));
                }
            }
        }
        Ok(())
    }

    /// One sendMessage call. An entity-parse rejection is split out so the
    /// caller can downgrade the chunk to plain text.
    async fn post_message(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: Option<&str>,
    ) -> Result<(), PostError> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(mode) = parse_mode {
            body["parse_mode"] = serde_json::Value::from(mode);
        }

        let resp = self
            .client
            .post(format!("{}/sendMessage", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| PostError::Http(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let detail = resp.text().await.unwrap_or_default();
        if detail.contains("can't parse entities") {
            Err(PostError::BadEntities(detail))
        } else {
            Err(PostError::Http(format!("{status}: {detail}")))
        }
    }

    /// Register bot commands with Telegram so users see an autocomplete menu.
    /// Best-effort: logs failures but does not propagate errors.
    pub(crate) async fn register_commands(&self) {
        let commands = serde_json::json!({
            "commands": [
                { "command": "start", "description": "Saludar a Olivia y empezar de cero" },
            ]
        });

        let url = format!("{}/setMyCommands", self.base_url);
        match self.client.post(&url).json(&commands).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!("registered Telegram bot commands");
            }
            Ok(resp) => {
                let body = resp.text().await.unwrap_or_default();
                warn!("failed to register Telegram bot commands: {body}");
            }
            Err(e) => {
                warn!("failed to register Telegram bot commands: {e}");
            }
        }
    }

    /// Send a chat action (e.g. "typing") to a chat.
    pub(crate) async fn send_chat_action(
        &self,
        chat_id: i64,
        action: &str,
    ) -> Result<(), RecadoError> {
        let url = format!("{}/sendChatAction", self.base_url);
        let body = serde_json::json!({
            "chat_id": chat_id,
            "action": action,
        });

        self.client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RecadoError::Channel(format!("telegram sendChatAction failed: {e}")))?;

        Ok(())
    }
}
