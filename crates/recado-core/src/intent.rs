use serde::Deserialize;

use crate::error::RecadoError;

/// What the provider extracted from a user message.
///
/// Fields arrive as raw strings from the model and are re-validated by the
/// normalizers before anything touches the task store.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    CreateTask {
        title: String,
        description: String,
        category: String,
        due_date: String,
    },
    ListTasks {
        category: Option<String>,
        status: Option<String>,
    },
    UpdateTask {
        task_id: Option<String>,
        title: Option<String>,
        status: String,
    },
    DeleteTask {
        task_id: Option<String>,
        title: Option<String>,
    },
    SetReminder {
        title: String,
        reminder_str: String,
    },
}

/// A provider turn: either plain conversation or an extracted intent.
#[derive(Debug, Clone)]
pub enum ProviderReply {
    Chat(String),
    Intent(Intent),
}

#[derive(Deserialize)]
struct CreateTaskArgs {
    title: String,
    #[serde(default)]
    description: String,
    category: String,
    due_date: String,
}

#[derive(Deserialize)]
struct ListTasksArgs {
    category: Option<String>,
    status: Option<String>,
}

#[derive(Deserialize)]
struct UpdateTaskArgs {
    task_id: Option<String>,
    title: Option<String>,
    status: String,
}

#[derive(Deserialize)]
struct DeleteTaskArgs {
    task_id: Option<String>,
    title: Option<String>,
}

#[derive(Deserialize)]
struct SetReminderArgs {
    title: String,
    reminder_str: String,
}

impl Intent {
    /// Decode a tool call by function name and JSON arguments.
    pub fn from_tool_call(name: &str, arguments: &str) -> Result<Intent, RecadoError> {
        let intent = match name {
            "create_task" => {
                let a: CreateTaskArgs = serde_json::from_str(arguments)?;
                Intent::CreateTask {
                    title: a.title,
                    description: a.description,
                    category: a.category,
                    due_date: a.due_date,
                }
            }
            "list_tasks" => {
                let a: ListTasksArgs = serde_json::from_str(arguments)?;
                Intent::ListTasks {
                    category: a.category,
                    status: a.status,
                }
            }
            "update_task" => {
                let a: UpdateTaskArgs = serde_json::from_str(arguments)?;
                Intent::UpdateTask {
                    task_id: a.task_id,
                    title: a.title,
                    status: a.status,
                }
            }
            "delete_task" => {
                let a: DeleteTaskArgs = serde_json::from_str(arguments)?;
                Intent::DeleteTask {
                    task_id: a.task_id,
                    title: a.title,
                }
            }
            "set_reminder" => {
                let a: SetReminderArgs = serde_json::from_str(arguments)?;
                Intent::SetReminder {
                    title: a.title,
                    reminder_str: a.reminder_str,
                }
            }
            other => {
                return Err(RecadoError::Provider(format!("unknown tool call: {other}")));
            }
        };
        Ok(intent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_create_task() {
        let intent = Intent::from_tool_call(
            "create_task",
            r#"{"title":"Pagar cuentas","category":"hogar","due_date":"mañana"}"#,
        )
        .unwrap();
        assert_eq!(
            intent,
            Intent::CreateTask {
                title: "Pagar cuentas".into(),
                description: String::new(),
                category: "hogar".into(),
                due_date: "mañana".into(),
            }
        );
    }

    #[test]
    fn decodes_set_reminder() {
        let intent = Intent::from_tool_call(
            "set_reminder",
            r#"{"title":"informe","reminder_str":"1 hora antes"}"#,
        )
        .unwrap();
        assert!(matches!(intent, Intent::SetReminder { .. }));
    }

    #[test]
    fn unknown_tool_is_an_error() {
        assert!(Intent::from_tool_call("fly_to_moon", "{}").is_err());
    }
}
