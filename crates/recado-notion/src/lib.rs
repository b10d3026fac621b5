//! # recado-notion
//!
//! [`TaskStore`] implementation over the Notion pages/databases API. The
//! Notion database is the system of record for tasks; this crate only
//! translates between its property soup and [`Task`].

use async_trait::async_trait;
use recado_core::{
    config::NotionConfig,
    error::RecadoError,
    task::{Category, DueDate, NewTask, Task, TaskFilter, TaskStatus},
    traits::TaskStore,
};
use serde_json::{json, Value};
use tracing::debug;

const NOTION_VERSION: &str = "2022-06-28";

/// Notion-backed task store.
pub struct NotionStore {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
    database_id: String,
}

impl NotionStore {
    pub fn from_config(config: &NotionConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: "https://api.notion.com/v1".to_string(),
            api_token: config.api_token.clone(),
            database_id: config.database_id.clone(),
        }
    }

    /// Override the API endpoint (for tests against a local server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_token))
            .header("Notion-Version", NOTION_VERSION)
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<Value, RecadoError> {
        let resp = builder
            .send()
            .await
            .map_err(|e| RecadoError::Store(format!("{what}: request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RecadoError::Store(format!("{what}: notion returned {status}: {body}")));
        }

        resp.json()
            .await
            .map_err(|e| RecadoError::Store(format!("{what}: bad response body: {e}")))
    }
}

/// Build the property payload for a create.
fn task_properties(task: &NewTask) -> Value {
    json!({
        "Nombre de tarea": {"title": [{"text": {"content": task.title}}]},
        "Etiquetas": {"multi_select": [{"name": task.category.label()}]},
        "Fecha límite": {"date": {"start": task.due.to_iso()}},
        "Descripción": {"rich_text": [{"text": {"content": task.description}}]},
        "Estado": {"status": {"name": TaskStatus::Todo.label()}}
    })
}

/// Build the query filter for a listing.
fn query_filter(filter: &TaskFilter) -> Option<Value> {
    let mut clauses = Vec::new();
    if let Some(category) = filter.category {
        clauses.push(json!({
            "property": "Etiquetas",
            "multi_select": {"contains": category.label()}
        }));
    }
    if let Some(status) = filter.status {
        clauses.push(json!({
            "property": "Estado",
            "status": {"equals": status.label()}
        }));
    }
    match clauses.len() {
        0 => None,
        1 => clauses.pop(),
        _ => Some(json!({"and": clauses})),
    }
}

/// Translate a Notion page object into a [`Task`]. Pages without a title
/// are skipped (`None`), as are archived ones.
fn parse_page(page: &Value) -> Option<Task> {
    if page["archived"].as_bool().unwrap_or(false) {
        return None;
    }
    let id = page["id"].as_str()?.to_string();
    let props = &page["properties"];

    let title = props["Nombre de tarea"]["title"]
        .as_array()?
        .first()?
        .pointer("/plain_text")?
        .as_str()?
        .to_string();

    let category = props["Etiquetas"]["multi_select"]
        .as_array()
        .and_then(|tags| tags.first())
        .and_then(|tag| tag["name"].as_str())
        .and_then(Category::from_label);

    let due = props["Fecha límite"]["date"]["start"]
        .as_str()
        .and_then(DueDate::parse_iso);

    let status = props["Estado"]["status"]["name"]
        .as_str()
        .and_then(TaskStatus::from_label)
        .unwrap_or(TaskStatus::Todo);

    Some(Task {
        id,
        title,
        category,
        due,
        status,
    })
}

#[async_trait]
impl TaskStore for NotionStore {
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, RecadoError> {
        let mut body = json!({});
        if let Some(f) = query_filter(filter) {
            body["filter"] = f;
        }

        let path = format!("/databases/{}/query", self.database_id);
        let response = self
            .send(self.request(reqwest::Method::POST, &path).json(&body), "list tasks")
            .await?;

        let tasks = response["results"]
            .as_array()
            .map(|pages| pages.iter().filter_map(parse_page).collect())
            .unwrap_or_default();
        Ok(tasks)
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>, RecadoError> {
        let resp = self
            .request(reqwest::Method::GET, &format!("/pages/{id}"))
            .send()
            .await
            .map_err(|e| RecadoError::Store(format!("get task: request failed: {e}")))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RecadoError::Store(format!("get task: notion returned {status}: {body}")));
        }

        let page: Value = resp
            .json()
            .await
            .map_err(|e| RecadoError::Store(format!("get task: bad response body: {e}")))?;
        Ok(parse_page(&page))
    }

    async fn create_task(&self, task: NewTask) -> Result<Task, RecadoError> {
        let body = json!({
            "parent": {"database_id": self.database_id},
            "properties": task_properties(&task),
        });

        debug!("notion: creating task '{}'", task.title);
        let page = self
            .send(self.request(reqwest::Method::POST, "/pages").json(&body), "create task")
            .await?;

        parse_page(&page)
            .ok_or_else(|| RecadoError::Store("create task: unreadable page in response".into()))
    }

    async fn set_status(&self, id: &str, status: TaskStatus) -> Result<(), RecadoError> {
        let body = json!({
            "properties": {"Estado": {"status": {"name": status.label()}}}
        });
        self.send(
            self.request(reqwest::Method::PATCH, &format!("/pages/{id}")).json(&body),
            "update task",
        )
        .await?;
        Ok(())
    }

    async fn archive(&self, id: &str) -> Result<(), RecadoError> {
        let body = json!({"archived": true});
        self.send(
            self.request(reqwest::Method::PATCH, &format!("/pages/{id}")).json(&body),
            "archive task",
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_page() -> Value {
        json!({
            "id": "page-1",
            "archived": false,
            "properties": {
                "Nombre de tarea": {"title": [{"plain_text": "Entregar informe"}]},
                "Etiquetas": {"multi_select": [{"name": "Laboral"}]},
                "Fecha límite": {"date": {"start": "2025-06-21"}},
                "Estado": {"status": {"name": "Por hacer"}}
            }
        })
    }

    #[test]
    fn parses_a_full_page() {
        let task = parse_page(&sample_page()).unwrap();
        assert_eq!(task.id, "page-1");
        assert_eq!(task.title, "Entregar informe");
        assert_eq!(task.category, Some(Category::Work));
        assert_eq!(task.due.unwrap().to_iso(), "2025-06-21");
        assert_eq!(task.status, TaskStatus::Todo);
    }

    #[test]
    fn archived_and_untitled_pages_are_skipped() {
        let mut archived = sample_page();
        archived["archived"] = json!(true);
        assert!(parse_page(&archived).is_none());

        let untitled = json!({
            "id": "page-2",
            "properties": {"Nombre de tarea": {"title": []}}
        });
        assert!(parse_page(&untitled).is_none());
    }

    #[test]
    fn page_without_due_or_category_still_parses() {
        let page = json!({
            "id": "page-3",
            "properties": {
                "Nombre de tarea": {"title": [{"plain_text": "Algo"}]},
                "Estado": {"status": {"name": "Hecho"}}
            }
        });
        let task = parse_page(&page).unwrap();
        assert_eq!(task.category, None);
        assert_eq!(task.due, None);
        assert_eq!(task.status, TaskStatus::Done);
    }

    #[test]
    fn filters_compose() {
        assert!(query_filter(&TaskFilter::default()).is_none());

        let one = query_filter(&TaskFilter {
            category: Some(Category::Studies),
            status: None,
        })
        .unwrap();
        assert_eq!(one["property"], "Etiquetas");

        let both = query_filter(&TaskFilter {
            category: Some(Category::Studies),
            status: Some(TaskStatus::InProgress),
        })
        .unwrap();
        assert_eq!(both["and"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn create_payload_uses_canonical_labels() {
        let props = task_properties(&NewTask {
            title: "Estudiar cálculo".into(),
            description: String::new(),
            category: Category::Studies,
            due: DueDate::parse_iso("2025-06-21").unwrap(),
        });
        assert_eq!(props["Etiquetas"]["multi_select"][0]["name"], "Estudios");
        assert_eq!(props["Estado"]["status"]["name"], "Por hacer");
        assert_eq!(props["Fecha límite"]["date"]["start"], "2025-06-21");
    }
}
