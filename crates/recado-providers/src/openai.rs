//! OpenAI-compatible intent extraction.
//!
//! One chat-completion call with the task tools attached. A tool call in
//! the response becomes a structured [`Intent`]; plain content becomes a
//! chat reply.

use async_trait::async_trait;
use recado_core::{
    config::OpenAiConfig,
    error::RecadoError,
    intent::{Intent, ProviderReply},
    task::Category,
    traits::Provider,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Olivia's instructions, mirrored from the production prompt.
const SYSTEM_PROMPT: &str = "Eres Olivia, una asistente virtual que ayuda a los usuarios a \
gestionar tareas en Notion. Tu objetivo es facilitar la vida del usuario, guiándolo paso a \
paso y usando un lenguaje sencillo. Solo puedes usar las siguientes categorías: Estudios, \
Laboral, Domésticas. Si el usuario menciona una categoría no reconocida, sugiere la más \
cercana o pídele que elija una válida. Acepta fechas en cualquier formato (ej: 'mañana', \
'21-06-2025', 'el viernes'). Si falta información, pregunta solo lo necesario. Antes de \
crear, editar o borrar una tarea, confirma con el usuario si la instrucción no es explícita. \
Nunca inventes etiquetas nuevas. Si el usuario comete errores de tipeo, intenta adivinar la \
intención y sugiere correcciones. Nunca crees una tarea nueva a menos que el usuario lo \
solicite claramente.";

/// OpenAI-compatible provider.
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    /// Create from config values.
    pub fn from_config(config: &OpenAiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    tools: Vec<Value>,
    tool_choice: &'static str,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ResponseMessage>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Deserialize)]
struct ToolCall {
    function: Option<FunctionCall>,
}

#[derive(Deserialize)]
struct FunctionCall {
    name: String,
    arguments: String,
}

/// The five task tools exposed to the model.
fn tool_defs() -> Vec<Value> {
    let categories = Category::labels_joined();
    let statuses = ["Por hacer", "En progreso", "Hecho"];
    vec![
        json!({
            "type": "function",
            "function": {
                "name": "create_task",
                "description": "Crea una tarea nueva.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "title": {"type": "string", "description": "El título de la tarea."},
                        "description": {"type": "string", "description": "Una descripción opcional para la tarea."},
                        "category": {"type": "string", "description": format!("La categoría de la tarea. Debe ser una de: {categories}")},
                        "due_date": {"type": "string", "description": "La fecha de entrega, ej. 'mañana', '31 de diciembre', '25/12/2024'."}
                    },
                    "required": ["title", "category", "due_date"]
                }
            }
        }),
        json!({
            "type": "function",
            "function": {
                "name": "list_tasks",
                "description": "Recupera una lista de tareas, opcionalmente filtradas por categoría o estado.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "category": {"type": "string", "description": format!("Filtrar por categoría. Opciones: {categories}")},
                        "status": {"type": "string", "enum": statuses, "description": "Filtrar por estado."}
                    }
                }
            }
        }),
        json!({
            "type": "function",
            "function": {
                "name": "update_task",
                "description": "Actualiza el estado de una tarea existente, identificada por su título o ID.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "task_id": {"type": "string", "description": "El ID de la tarea a actualizar."},
                        "title": {"type": "string", "description": "El título de la tarea a actualizar."},
                        "status": {"type": "string", "enum": statuses, "description": "El nuevo estado de la tarea."}
                    },
                    "required": ["status"]
                }
            }
        }),
        json!({
            "type": "function",
            "function": {
                "name": "delete_task",
                "description": "Elimina (archiva) una tarea existente, identificada por su título o ID.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "task_id": {"type": "string", "description": "El ID de la tarea a eliminar."},
                        "title": {"type": "string", "description": "El título de la tarea a eliminar."}
                    }
                }
            }
        }),
        json!({
            "type": "function",
            "function": {
                "name": "set_reminder",
                "description": "Configura un recordatorio para una tarea existente. El usuario debe especificar cuánto tiempo antes de la fecha límite.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "title": {"type": "string", "description": "El título de la tarea para la cual se configura el recordatorio."},
                        "reminder_str": {"type": "string", "description": "Descripción del tiempo para el recordatorio, ej: '30 minutos antes', '1 hora antes', '2 dias antes'."}
                    },
                    "required": ["title", "reminder_str"]
                }
            }
        }),
    ]
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn requires_api_key(&self) -> bool {
        true
    }

    async fn extract(&self, text: &str) -> Result<ProviderReply, RecadoError> {
        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: text.to_string(),
                },
            ],
            tools: tool_defs(),
            tool_choice: "auto",
            temperature: 0.3,
        };

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        debug!("openai: POST {url} model={}", self.model);

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| RecadoError::Provider(format!("openai request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(RecadoError::Provider(format!(
                "openai returned {status}: {text}"
            )));
        }

        let parsed: ChatCompletionResponse = resp
            .json()
            .await
            .map_err(|e| RecadoError::Provider(format!("openai: failed to parse response: {e}")))?;

        let message = parsed
            .choices
            .and_then(|mut c| c.drain(..).next())
            .and_then(|c| c.message)
            .ok_or_else(|| RecadoError::Provider("openai: empty response".to_string()))?;

        if let Some(call) = message
            .tool_calls
            .and_then(|mut calls| calls.drain(..).next())
            .and_then(|c| c.function)
        {
            let intent = Intent::from_tool_call(&call.name, &call.arguments)?;
            return Ok(ProviderReply::Intent(intent));
        }

        let content = message
            .content
            .unwrap_or_else(|| "No entendí tu mensaje, ¿puedes reformularlo?".to_string());
        Ok(ProviderReply::Chat(content))
    }

    async fn is_available(&self) -> bool {
        if self.api_key.is_empty() {
            warn!("openai: no API key configured");
            return false;
        }
        // Basic check: try to list models.
        let url = format!("{}/models", self.base_url.trim_end_matches('/'));
        match self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!("openai not available: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OpenAiProvider {
        OpenAiProvider::from_config(&OpenAiConfig {
            api_key: "sk-test".into(),
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4".into(),
        })
    }

    #[test]
    fn provider_name_and_key_requirement() {
        let p = provider();
        assert_eq!(p.name(), "openai");
        assert!(p.requires_api_key());
    }

    #[test]
    fn tool_defs_cover_all_intents() {
        let defs = tool_defs();
        let names: Vec<&str> = defs
            .iter()
            .map(|d| d["function"]["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            ["create_task", "list_tasks", "update_task", "delete_task", "set_reminder"]
        );
    }

    #[test]
    fn tool_call_response_becomes_intent() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":null,
            "tool_calls":[{"id":"call_1","type":"function","function":{
                "name":"set_reminder",
                "arguments":"{\"title\":\"informe\",\"reminder_str\":\"1 hora antes\"}"}}]}}]}"#;
        let resp: ChatCompletionResponse = serde_json::from_str(json).unwrap();
        let message = resp.choices.unwrap().remove(0).message.unwrap();
        let call = message.tool_calls.unwrap().remove(0).function.unwrap();
        let intent = Intent::from_tool_call(&call.name, &call.arguments).unwrap();
        assert_eq!(
            intent,
            Intent::SetReminder {
                title: "informe".into(),
                reminder_str: "1 hora antes".into(),
            }
        );
    }

    #[test]
    fn plain_content_response_parses() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"¡Hola!"}}]}"#;
        let resp: ChatCompletionResponse = serde_json::from_str(json).unwrap();
        let message = resp.choices.unwrap().remove(0).message.unwrap();
        assert!(message.tool_calls.is_none());
        assert_eq!(message.content.as_deref(), Some("¡Hola!"));
    }
}
