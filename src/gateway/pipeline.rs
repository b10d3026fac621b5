//! Message processing pipeline — the main handle_message flow.

use super::{ordinals, Gateway};
use chrono::Utc;
use recado_core::{
    intent::{Intent, ProviderReply},
    message::IncomingMessage,
    task::{Category, DueDate, NewTask, TaskFilter, TaskStatus},
    text::normalize_title,
};
use recado_resolver::{dates, MatchKind, Resolution};
use recado_scheduler::ScheduleError;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// How long a yes/no question stays answerable.
const CONFIRM_TTL: Duration = Duration::from_secs(300);

/// A question waiting for the sender's next message.
pub(super) enum Pending {
    /// "A similar task exists, create anyway?"
    CreateSimilar { draft: NewTask, asked_at: Instant },
    /// "Did you mean task X?" after a fuzzy resolution. A yes both runs
    /// the operation and teaches the resolver the shorthand.
    ConfirmMatch {
        op: PendingOp,
        task_id: String,
        title: String,
        fragment: String,
        asked_at: Instant,
    },
}

impl Pending {
    fn asked_at(&self) -> Instant {
        match self {
            Pending::CreateSimilar { asked_at, .. } => *asked_at,
            Pending::ConfirmMatch { asked_at, .. } => *asked_at,
        }
    }
}

/// The operation held back until the match is confirmed.
pub(super) enum PendingOp {
    SetStatus(TaskStatus),
    Delete,
    Remind { offset: String },
}

enum PendingOutcome {
    Replied,
    FallThrough,
}

/// "sí", "si", "dale", "ok" — after title normalization.
fn is_affirmative(answer: &str) -> bool {
    matches!(answer, "si" | "dale" | "ok" | "claro")
}

/// The create-anyway confirmation accepts the same set the prompt asks for.
fn is_create_confirmation(answer: &str) -> bool {
    matches!(answer, "si crear" | "crear" | "si")
}

impl Gateway {
    /// Process a single incoming message through the full pipeline.
    pub(super) async fn handle_message(&self, incoming: IncomingMessage) {
        let preview = if incoming.text.chars().count() > 60 {
            let truncated: String = incoming.text.chars().take(60).collect();
            format!("{truncated}...")
        } else {
            incoming.text.clone()
        };
        info!(
            "[{}] {} says: {}",
            incoming.channel,
            incoming.sender_name.as_deref().unwrap_or("unknown"),
            preview
        );

        let text = incoming.text.trim().to_string();
        let sender_key = format!("{}:{}", incoming.channel, incoming.sender_id);

        // --- 1. PENDING CONFIRMATION ---
        let pending = { self.pending.lock().await.remove(&sender_key) };
        if let Some(pending) = pending {
            if pending.asked_at().elapsed() <= CONFIRM_TTL {
                match self.resume_pending(&incoming, pending, &text).await {
                    PendingOutcome::Replied => return,
                    PendingOutcome::FallThrough => {}
                }
            } else {
                info!("pending confirmation for {sender_key} expired");
            }
        }

        // --- 2. /start ---
        if text == "/start" {
            let greeting = format!(
                "¡Hola! Soy {} 🤖. Estoy lista para ayudarte a gestionar \
                 tus tareas en Notion. ¿Qué necesitas hacer?",
                self.assistant_name
            );
            self.send_text(&incoming, &greeting).await;
            return;
        }

        // --- 3. TYPING INDICATOR ---
        if let (Some(channel), Some(target)) = (
            self.channels.get(&incoming.channel),
            incoming.reply_target.as_deref(),
        ) {
            let _ = channel.send_typing(target).await;
        }

        // --- 4. POSITIONAL TASK REFERENCE ---
        let text = match self.rewrite_ordinal(&incoming, &text).await {
            RewriteOutcome::Unchanged => text,
            RewriteOutcome::Rewritten(t) => t,
            RewriteOutcome::Replied => return,
        };

        // --- 5. INTENT EXTRACTION AND EXECUTION ---
        let reply = match self.provider.extract(&text).await {
            Ok(ProviderReply::Chat(msg)) => msg,
            Ok(ProviderReply::Intent(intent)) => {
                self.execute_intent(&incoming, &sender_key, intent).await
            }
            Err(e) => {
                error!("provider extraction failed: {e}");
                "Lo siento, ocurrió un error inesperado al procesar tu solicitud.".to_string()
            }
        };
        self.send_text(&incoming, &reply).await;
    }

    /// Answer a stored yes/no question. Anything that is not an answer to
    /// a fuzzy-match question falls through to normal processing.
    async fn resume_pending(
        &self,
        incoming: &IncomingMessage,
        pending: Pending,
        text: &str,
    ) -> PendingOutcome {
        let answer = normalize_title(text);
        match pending {
            Pending::CreateSimilar { draft, .. } => {
                if is_create_confirmation(&answer) {
                    let reply = self.create_task(draft).await;
                    self.send_text(incoming, &reply).await;
                } else {
                    self.send_text(
                        incoming,
                        "Operación cancelada. No se creó la tarea. Puedes ver tus \
                         tareas preguntando '¿Qué tareas tengo?'.",
                    )
                    .await;
                }
                PendingOutcome::Replied
            }
            Pending::ConfirmMatch {
                op,
                task_id,
                title,
                fragment,
                ..
            } => {
                if is_affirmative(&answer) {
                    self.resolver.learn_alias(&fragment, &task_id).await;
                    let reply = self.apply_op(incoming, op, &task_id, &title).await;
                    self.send_text(incoming, &reply).await;
                    PendingOutcome::Replied
                } else if answer == "no" {
                    self.send_text(incoming, "Operación cancelada.").await;
                    PendingOutcome::Replied
                } else {
                    PendingOutcome::FallThrough
                }
            }
        }
    }

    /// Swap "la primera tarea" / "tarea 2" for the real task title before
    /// the provider sees the message.
    async fn rewrite_ordinal(&self, incoming: &IncomingMessage, text: &str) -> RewriteOutcome {
        let Some((idx, span)) = ordinals::find_reference(text) else {
            return RewriteOutcome::Unchanged;
        };
        let tasks = match self.store.list_tasks(&TaskFilter::default()).await {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!("task listing for positional reference failed: {e}");
                self.send_text(incoming, "❌ Error al listar tareas desde Notion.")
                    .await;
                return RewriteOutcome::Replied;
            }
        };
        match tasks.get(idx) {
            Some(task) => {
                info!("positional reference -> '{}'", task.title);
                RewriteOutcome::Rewritten(ordinals::rewrite(text, span, &task.title))
            }
            None => {
                self.send_text(
                    incoming,
                    &format!(
                        "No hay una tarea en la posición indicada. \
                         Actualmente tienes {} tareas.",
                        tasks.len()
                    ),
                )
                .await;
                RewriteOutcome::Replied
            }
        }
    }

    /// Run an extracted intent and produce the Spanish reply.
    async fn execute_intent(
        &self,
        incoming: &IncomingMessage,
        sender_key: &str,
        intent: Intent,
    ) -> String {
        match intent {
            Intent::CreateTask {
                title,
                description,
                category,
                due_date,
            } => {
                let Some(cat) = Category::normalize(&category) else {
                    return format!(
                        "❌ Error: La categoría '{category}' no es válida. \
                         Usa una de estas: {}.",
                        Category::labels_joined()
                    );
                };
                let today = Utc::now().with_timezone(&self.tz).date_naive();
                let Some(due) = dates::normalize_date(&due_date, today) else {
                    return format!(
                        "❌ Error: La fecha '{due_date}' no es válida. Intenta con \
                         'mañana', 'próximo viernes' o 'DD-MM-YYYY'."
                    );
                };
                let draft = NewTask {
                    title: title.clone(),
                    description,
                    category: cat,
                    due,
                };

                match self.resolver.resolve(&title).await {
                    Resolution::Found { title: similar, .. } => {
                        let question = format!(
                            "Ya existe una tarea similar llamada '{similar}'. ¿Seguro que \
                             quieres crear una nueva tarea llamada '{title}'? Responde \
                             'Sí, crear' para confirmar."
                        );
                        self.pending.lock().await.insert(
                            sender_key.to_string(),
                            Pending::CreateSimilar {
                                draft,
                                asked_at: Instant::now(),
                            },
                        );
                        question
                    }
                    Resolution::StoreError(e) => {
                        // An unreadable store should not block the create.
                        warn!("similar-task check failed: {e}");
                        self.create_task(draft).await
                    }
                    Resolution::NotFound => self.create_task(draft).await,
                }
            }

            Intent::ListTasks { category, status } => {
                let filter = TaskFilter {
                    category: category.as_deref().and_then(Category::normalize),
                    status: status.as_deref().and_then(TaskStatus::from_label),
                };
                match self.store.list_tasks(&filter).await {
                    Err(e) => {
                        error!("task listing failed: {e}");
                        format!("❌ Error al listar tareas: {e}")
                    }
                    Ok(tasks) if tasks.is_empty() => {
                        "No encontré tareas con esos criterios.".to_string()
                    }
                    Ok(tasks) => {
                        let mut out = String::from("Aquí están tus tareas:\n\n");
                        for task in &tasks {
                            let due = task
                                .due
                                .as_ref()
                                .map(DueDate::to_iso)
                                .unwrap_or_else(|| "N/A".to_string());
                            out.push_str(&format!(
                                "🔹 *{}*\n   - Estado: {}\n   - Fecha: {due}\n",
                                task.title,
                                task.status.label(),
                            ));
                        }
                        out
                    }
                }
            }

            Intent::UpdateTask {
                task_id,
                title,
                status,
            } => {
                let Some(new_status) = TaskStatus::from_label(&status) else {
                    return format!(
                        "❌ Error: El estado '{status}' no es válido. \
                         Usa: Por hacer, En progreso o Hecho."
                    );
                };
                if let Some(id) = task_id {
                    let label = title.unwrap_or_else(|| format!("ID {id}"));
                    return self
                        .apply_op(incoming, PendingOp::SetStatus(new_status), &id, &label)
                        .await;
                }
                let Some(fragment) = title else {
                    return "❌ Error: Se necesita el título o ID de la tarea para actualizarla."
                        .to_string();
                };
                self.resolve_then(
                    incoming,
                    sender_key,
                    &fragment,
                    PendingOp::SetStatus(new_status),
                )
                .await
            }

            Intent::DeleteTask { task_id, title } => {
                if let Some(id) = task_id {
                    let label = title.unwrap_or_else(|| format!("ID {id}"));
                    return self.apply_op(incoming, PendingOp::Delete, &id, &label).await;
                }
                let Some(fragment) = title else {
                    return "❌ Error: Se necesita el título o ID de la tarea para eliminarla."
                        .to_string();
                };
                self.resolve_then(incoming, sender_key, &fragment, PendingOp::Delete)
                    .await
            }

            Intent::SetReminder {
                title,
                reminder_str,
            } => {
                self.resolve_then(
                    incoming,
                    sender_key,
                    &title,
                    PendingOp::Remind {
                        offset: reminder_str,
                    },
                )
                .await
            }
        }
    }

    /// Resolve a task fragment, then either run the operation or park it
    /// behind a confirmation when the match was fuzzy.
    async fn resolve_then(
        &self,
        incoming: &IncomingMessage,
        sender_key: &str,
        fragment: &str,
        op: PendingOp,
    ) -> String {
        match self.resolver.resolve(fragment).await {
            Resolution::Found {
                task_id,
                title,
                kind: MatchKind::Fuzzy,
            } => {
                let question =
                    format!("¿Te refieres a la tarea '{title}'? Responde 'sí' para confirmar.");
                self.pending.lock().await.insert(
                    sender_key.to_string(),
                    Pending::ConfirmMatch {
                        op,
                        task_id,
                        title,
                        fragment: fragment.to_string(),
                        asked_at: Instant::now(),
                    },
                );
                question
            }
            Resolution::Found { task_id, title, .. } => {
                self.apply_op(incoming, op, &task_id, &title).await
            }
            Resolution::NotFound => format!(
                "No encontré ninguna tarea parecida a '{fragment}'. Si quieres, pídeme \
                 crearla indicando la categoría y la fecha límite."
            ),
            Resolution::StoreError(e) => {
                error!("task resolution failed: {e}");
                "❌ Error al consultar las tareas en Notion. Inténtalo de nuevo en un momento."
                    .to_string()
            }
        }
    }

    /// Execute a confirmed (or directly addressed) operation on a task.
    async fn apply_op(
        &self,
        incoming: &IncomingMessage,
        op: PendingOp,
        task_id: &str,
        title: &str,
    ) -> String {
        match op {
            PendingOp::SetStatus(status) => match self.store.set_status(task_id, status).await {
                Ok(()) => format!(
                    "✅ ¡Tarea actualizada! '{title}' ahora está '{}'.",
                    status.label()
                ),
                Err(e) => {
                    error!("status update failed for {task_id}: {e}");
                    format!("❌ Error al actualizar la tarea: {e}")
                }
            },
            PendingOp::Delete => match self.store.archive(task_id).await {
                Ok(()) => format!("🗑️ ¡Tarea '{title}' eliminada correctamente!"),
                Err(e) => {
                    error!("archive failed for {task_id}: {e}");
                    format!("❌ Error al eliminar la tarea: {e}")
                }
            },
            PendingOp::Remind { offset } => {
                self.schedule_reminder(incoming, task_id, title, &offset).await
            }
        }
    }

    /// Look up the task's due date and hand off to the scheduler.
    async fn schedule_reminder(
        &self,
        incoming: &IncomingMessage,
        task_id: &str,
        title: &str,
        offset: &str,
    ) -> String {
        let due = match self.store.get_task(task_id).await {
            Ok(Some(task)) => task.due,
            Ok(None) => return format!("❌ Error: Tarea '{title}' no encontrada."),
            Err(e) => {
                error!("task fetch failed for {task_id}: {e}");
                return "❌ Error al consultar las tareas en Notion. Inténtalo de nuevo \
                        en un momento."
                    .to_string();
            }
        };
        let chat_id = incoming
            .reply_target
            .clone()
            .unwrap_or_else(|| incoming.sender_id.clone());
        match self.scheduler.schedule(&chat_id, title, due, offset).await {
            Ok(confirmation) => confirmation,
            Err(ScheduleError::BadOffset(_)) => {
                "No entendí el formato del recordatorio. Prueba con '30 minutos antes', \
                 '1 hora antes', etc."
                    .to_string()
            }
            Err(ScheduleError::MissingDue) => format!(
                "La tarea '{title}' no tiene una fecha límite válida para crear un recordatorio."
            ),
            Err(ScheduleError::Store(e)) => {
                error!("reminder persistence failed: {e}");
                "❌ Error al guardar el recordatorio. Inténtalo de nuevo.".to_string()
            }
        }
    }

    /// Create the task and format the confirmation.
    async fn create_task(&self, draft: NewTask) -> String {
        match self.store.create_task(draft).await {
            Ok(task) => {
                let category = task.category.map(|c| c.label()).unwrap_or("N/A");
                let due = task
                    .due
                    .as_ref()
                    .map(DueDate::to_iso)
                    .unwrap_or_else(|| "N/A".to_string());
                format!(
                    "✅ ¡Tarea creada!\n*Título:* {}\n*Categoría:* {category}\n*Fecha:* {due}",
                    task.title
                )
            }
            Err(e) => {
                error!("task creation failed: {e}");
                format!("❌ Error al crear la tarea en Notion: {e}")
            }
        }
    }
}

enum RewriteOutcome {
    Unchanged,
    Rewritten(String),
    /// An error or out-of-range reply already went out.
    Replied,
}
