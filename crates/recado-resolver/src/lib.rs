//! # recado-resolver
//!
//! Maps user-supplied task fragments ("el informe", "revisar liquidaciones")
//! to real tasks in the store. Learned aliases short-circuit the search;
//! otherwise candidates are scored on shared keywords with a fuzzy bonus.

pub mod dates;

use std::sync::Arc;

use recado_core::{
    task::{TaskFilter, TaskStatus, FUZZY_CUTOFF},
    text::{normalize_title, similarity},
    traits::TaskStore,
};
use recado_memory::Store;
use tracing::{debug, warn};

/// How a resolved task was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// A previously learned alias pointed straight at the task.
    Alias,
    /// The normalized fragment equals the normalized title.
    Exact,
    /// Best keyword/similarity score won.
    Fuzzy,
}

/// Outcome of a resolution attempt. Store failures are data, not panics:
/// the caller decides how to phrase them to the user.
#[derive(Debug, Clone)]
pub enum Resolution {
    Found {
        task_id: String,
        title: String,
        kind: MatchKind,
    },
    NotFound,
    StoreError(String),
}

/// Resolves task references against the task store, remembering confirmed
/// shorthand in the local alias table.
pub struct TaskResolver {
    store: Arc<dyn TaskStore>,
    memory: Store,
}

impl TaskResolver {
    pub fn new(store: Arc<dyn TaskStore>, memory: Store) -> Self {
        Self { store, memory }
    }

    /// Resolve a free-form fragment to a task.
    ///
    /// Aliases are checked first and bypass scoring entirely. A stale alias
    /// (its task vanished from the store) falls through to the search
    /// silently. Only tasks that are not done compete in the scoring pass.
    pub async fn resolve(&self, fragment: &str) -> Resolution {
        let needle = normalize_title(fragment);
        if needle.is_empty() {
            return Resolution::NotFound;
        }

        match self.memory.get_alias(&needle).await {
            Ok(Some(task_id)) => match self.store.get_task(&task_id).await {
                Ok(Some(task)) => {
                    debug!("alias hit: '{needle}' -> {task_id}");
                    return Resolution::Found {
                        task_id,
                        title: task.title,
                        kind: MatchKind::Alias,
                    };
                }
                Ok(None) => {
                    debug!("alias '{needle}' points at a vanished task, falling through");
                }
                Err(e) => return Resolution::StoreError(e.to_string()),
            },
            Ok(None) => {}
            Err(e) => {
                // A broken alias table should not block resolution.
                warn!("alias lookup failed: {e}");
            }
        }

        let tasks = match self.store.list_tasks(&TaskFilter::default()).await {
            Ok(tasks) => tasks,
            Err(e) => return Resolution::StoreError(e.to_string()),
        };

        let mut best: Option<(u32, String, String, String)> = None;
        for task in &tasks {
            if task.status == TaskStatus::Done {
                continue;
            }
            let norm_title = normalize_title(&task.title);
            let score = score(&needle, &norm_title);
            if score == 0 {
                continue;
            }
            let replace = match &best {
                None => true,
                Some((best_score, best_norm, _, _)) => {
                    // Deterministic tie-break: shortest normalized title,
                    // earlier store order wins the rest.
                    score > *best_score
                        || (score == *best_score && norm_title.len() < best_norm.len())
                }
            };
            if replace {
                best = Some((score, norm_title, task.id.clone(), task.title.clone()));
            }
        }

        match best {
            Some((_, norm_title, task_id, title)) => {
                let kind = if norm_title == needle {
                    MatchKind::Exact
                } else {
                    MatchKind::Fuzzy
                };
                Resolution::Found {
                    task_id,
                    title,
                    kind,
                }
            }
            None => Resolution::NotFound,
        }
    }

    /// Remember a confirmed shorthand. This is the only alias write path;
    /// it must run only after the user said yes to a fuzzy match.
    pub async fn learn_alias(&self, fragment: &str, task_id: &str) {
        if let Err(e) = self.memory.put_alias(fragment, task_id).await {
            warn!("failed to learn alias '{fragment}': {e}");
        }
    }
}

/// Relevance score between a normalized fragment and a normalized title:
/// two points per shared word, one bonus point when the whole strings are
/// similar enough.
fn score(needle: &str, title: &str) -> u32 {
    let needle_words: Vec<&str> = needle.split_whitespace().collect();
    let common = title
        .split_whitespace()
        .filter(|w| needle_words.contains(w))
        .count() as u32;

    let mut score = 2 * common;
    if similarity(needle, title) >= FUZZY_CUTOFF {
        score += 1;
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use recado_core::{
        error::RecadoError,
        task::{NewTask, Task, TaskStatus},
    };
    struct MockStore {
        tasks: Vec<Task>,
        fail: bool,
    }

    impl MockStore {
        fn with_titles(titles: &[&str]) -> Self {
            let tasks = titles
                .iter()
                .enumerate()
                .map(|(i, t)| Task {
                    id: format!("task-{i}"),
                    title: t.to_string(),
                    category: None,
                    due: None,
                    status: TaskStatus::Todo,
                })
                .collect();
            Self { tasks, fail: false }
        }
    }

    #[async_trait]
    impl TaskStore for MockStore {
        async fn list_tasks(&self, _filter: &TaskFilter) -> Result<Vec<Task>, RecadoError> {
            if self.fail {
                return Err(RecadoError::Store("boom".into()));
            }
            Ok(self.tasks.clone())
        }

        async fn get_task(&self, id: &str) -> Result<Option<Task>, RecadoError> {
            if self.fail {
                return Err(RecadoError::Store("boom".into()));
            }
            Ok(self.tasks.iter().find(|t| t.id == id).cloned())
        }

        async fn create_task(&self, _task: NewTask) -> Result<Task, RecadoError> {
            unimplemented!("not used by resolver tests")
        }

        async fn set_status(&self, _id: &str, _status: TaskStatus) -> Result<(), RecadoError> {
            Ok(())
        }

        async fn archive(&self, _id: &str) -> Result<(), RecadoError> {
            Ok(())
        }
    }

    async fn resolver(store: MockStore) -> TaskResolver {
        let memory = Store::open_in_memory().await.unwrap();
        TaskResolver::new(Arc::new(store), memory)
    }

    #[tokio::test]
    async fn empty_store_is_not_found() {
        let r = resolver(MockStore::with_titles(&[])).await;
        assert!(matches!(r.resolve("informe").await, Resolution::NotFound));
    }

    #[tokio::test]
    async fn exact_match_wins() {
        let r = resolver(MockStore::with_titles(&[
            "Pagar cuentas",
            "Revisar liquidaciones",
        ]))
        .await;
        match r.resolve("revisar liquidaciones").await {
            Resolution::Found { task_id, kind, .. } => {
                assert_eq!(task_id, "task-1");
                assert_eq!(kind, MatchKind::Exact);
            }
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn keyword_overlap_finds_fuzzy_match() {
        let r = resolver(MockStore::with_titles(&[
            "Pagar cuentas de la casa",
            "Revisar liquidaciones de sueldo",
        ]))
        .await;
        match r.resolve("las liquidaciones").await {
            Resolution::Found { task_id, kind, .. } => {
                assert_eq!(task_id, "task-1");
                assert_eq!(kind, MatchKind::Fuzzy);
            }
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn confirmed_fuzzy_match_teaches_the_alias() {
        // The confirmation flow: a fuzzy hit stays fuzzy until the user says
        // yes, and only the confirmation call writes the alias.
        let r = resolver(MockStore::with_titles(&[
            "Revisar liquidaciones de sueldo",
        ]))
        .await;

        let (task_id, first_kind) = match r.resolve("las liquidaciones").await {
            Resolution::Found { task_id, kind, .. } => (task_id, kind),
            other => panic!("expected Found, got {other:?}"),
        };
        assert_eq!(first_kind, MatchKind::Fuzzy);

        // No confirmation yet (user could still say no): resolving again
        // must not have learned anything.
        match r.resolve("las liquidaciones").await {
            Resolution::Found { kind, .. } => assert_eq!(kind, MatchKind::Fuzzy),
            other => panic!("expected Found, got {other:?}"),
        }

        // User said yes.
        r.learn_alias("las liquidaciones", &task_id).await;

        match r.resolve("las liquidaciones").await {
            Resolution::Found {
                task_id: hit, kind, ..
            } => {
                assert_eq!(hit, task_id);
                assert_eq!(kind, MatchKind::Alias);
            }
            other => panic!("expected alias Found, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn done_tasks_do_not_compete() {
        let mut store = MockStore::with_titles(&["Entregar informe"]);
        store.tasks[0].status = TaskStatus::Done;
        let r = resolver(store).await;
        assert!(matches!(r.resolve("informe").await, Resolution::NotFound));
    }

    #[tokio::test]
    async fn tie_break_prefers_shorter_title() {
        // Both titles share the same two keywords and neither clears the
        // similarity cutoff, so the scores tie at 4.
        let r = resolver(MockStore::with_titles(&[
            "Comprar regalo de navidad para pedro",
            "Comprar regalo de cumpleaños",
        ]))
        .await;
        match r.resolve("comprar regalo").await {
            Resolution::Found { task_id, .. } => assert_eq!(task_id, "task-1"),
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn store_error_is_reported_not_swallowed() {
        let mut store = MockStore::with_titles(&["Pagar cuentas"]);
        store.fail = true;
        let r = resolver(store).await;
        assert!(matches!(
            r.resolve("cuentas").await,
            Resolution::StoreError(_)
        ));
    }

    #[tokio::test]
    async fn learned_alias_bypasses_scoring() {
        let r = resolver(MockStore::with_titles(&[
            "Revisar liquidaciones de sueldo",
            "Revisar liquidaciones",
        ]))
        .await;
        // "las liqui" shares no whole word with either title; only the
        // learned alias can find the task.
        r.learn_alias("las liqui", "task-0").await;

        match r.resolve("las liqui").await {
            Resolution::Found { task_id, kind, .. } => {
                assert_eq!(task_id, "task-0");
                assert_eq!(kind, MatchKind::Alias);
            }
            other => panic!("expected alias Found, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stale_alias_falls_through() {
        let r = resolver(MockStore::with_titles(&["Pagar cuentas"])).await;
        r.learn_alias("cuentas", "task-gone").await;

        match r.resolve("cuentas").await {
            Resolution::Found { task_id, kind, .. } => {
                assert_eq!(task_id, "task-0");
                assert_ne!(kind, MatchKind::Alias);
            }
            other => panic!("expected fallthrough Found, got {other:?}"),
        }
    }
}
