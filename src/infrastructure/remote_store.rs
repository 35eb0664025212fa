use crate::domain::models::{TaskRecord, TaskRecordPatch};
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_TABLE: &str = "tasks";
pub const REMOTE_SCHEMA_SQL: &str = include_str!("../../sql/remote_tasks.sql");

/// Durable shared store holding the same records as the local cache.
#[async_trait]
pub trait RemoteTaskStore: Send + Sync {
    /// All rows, newest `created_at` first.
    async fn list(&self) -> Result<Vec<TaskRecord>, InfraError>;

    async fn insert(&self, record: &TaskRecord) -> Result<(), InfraError>;

    /// Writes only the columns present in `patch`.
    async fn update(&self, id: &str, patch: &TaskRecordPatch) -> Result<(), InfraError>;

    async fn delete(&self, id: &str) -> Result<(), InfraError>;
}

/// Row shape of the remote `tasks` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskRow {
    pub id: String,
    pub date: String,
    pub task_name: String,
    pub notes: Option<String>,
    pub start_time: String,
    pub end_time: String,
    pub duration: u64,
    pub created_at: i64,
    pub user_id: Option<String>,
}

impl From<&TaskRecord> for TaskRow {
    fn from(record: &TaskRecord) -> Self {
        Self {
            id: record.id.clone(),
            date: record.date.clone(),
            task_name: record.task_name.clone(),
            notes: Some(record.notes.clone()),
            start_time: record.start_time.clone(),
            end_time: record.end_time.clone(),
            duration: record.duration,
            created_at: record.created_at,
            user_id: None,
        }
    }
}

impl From<TaskRow> for TaskRecord {
    fn from(row: TaskRow) -> Self {
        Self {
            id: row.id,
            date: row.date,
            task_name: row.task_name,
            notes: row.notes.unwrap_or_default(),
            start_time: row.start_time,
            end_time: row.end_time,
            duration: row.duration,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct TaskRowPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

impl From<&TaskRecordPatch> for TaskRowPatch {
    fn from(patch: &TaskRecordPatch) -> Self {
        Self {
            date: patch.date.clone(),
            task_name: patch.task_name.clone(),
            notes: patch.notes.clone(),
            start_time: patch.start_time.clone(),
            end_time: patch.end_time.clone(),
            duration: patch.duration,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PostgrestRemoteTaskStore {
    client: Client,
    table_endpoint: Url,
    api_key: String,
}

impl PostgrestRemoteTaskStore {
    pub fn new(base_url: &str, table: &str, api_key: impl Into<String>) -> Result<Self, InfraError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(InfraError::InvalidConfig("remote api key must not be empty".to_string()));
        }
        Ok(Self {
            client: Client::new(),
            table_endpoint: Self::table_endpoint(base_url, table)?,
            api_key,
        })
    }

    fn table_endpoint(base_url: &str, table: &str) -> Result<Url, InfraError> {
        let table = table.trim();
        if table.is_empty() {
            return Err(InfraError::InvalidConfig("remote table must not be empty".to_string()));
        }
        let mut url = Url::parse(base_url.trim())
            .map_err(|error| InfraError::InvalidConfig(format!("invalid remote url '{base_url}': {error}")))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                InfraError::InvalidConfig("remote url cannot be a base".to_string())
            })?;
            segments.pop_if_empty();
            segments.push("rest");
            segments.push("v1");
            segments.push(table);
        }
        Ok(url)
    }

    fn request(&self, method: reqwest::Method) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.table_endpoint.clone())
            .header("apikey", self.api_key.as_str())
            .bearer_auth(&self.api_key)
    }

    fn http_error(action: &str, status: reqwest::StatusCode, body: &str) -> InfraError {
        let message = if body.trim().is_empty() {
            format!("{action} failed: http {}", status.as_u16())
        } else {
            format!("{action} failed: http {}; body={body}", status.as_u16())
        };
        InfraError::Remote(message)
    }

    async fn send(&self, action: &str, request: reqwest::RequestBuilder) -> Result<String, InfraError> {
        let response = request
            .send()
            .await
            .map_err(|error| InfraError::Remote(format!("network error during {action}: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Remote(format!("failed reading {action} response: {error}")))?;

        if !status.is_success() {
            return Err(Self::http_error(action, status, &body));
        }
        Ok(body)
    }

    fn ensure_id(id: &str) -> Result<&str, InfraError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(InfraError::InvalidInput("task id must not be empty".to_string()));
        }
        Ok(id)
    }
}

#[async_trait]
impl RemoteTaskStore for PostgrestRemoteTaskStore {
    async fn list(&self) -> Result<Vec<TaskRecord>, InfraError> {
        let request = self
            .request(reqwest::Method::GET)
            .query(&[("select", "*"), ("order", "created_at.desc")]);
        let body = self.send("list tasks", request).await?;

        let rows: Vec<TaskRow> = serde_json::from_str(&body).map_err(|error| {
            InfraError::Remote(format!("invalid task list payload: {error}; body={body}"))
        })?;
        Ok(rows.into_iter().map(TaskRecord::from).collect())
    }

    async fn insert(&self, record: &TaskRecord) -> Result<(), InfraError> {
        Self::ensure_id(&record.id)?;
        let request = self
            .request(reqwest::Method::POST)
            .header("Prefer", "return=minimal")
            .json(&[TaskRow::from(record)]);
        self.send("insert task", request).await?;
        Ok(())
    }

    async fn update(&self, id: &str, patch: &TaskRecordPatch) -> Result<(), InfraError> {
        let id = Self::ensure_id(id)?;
        if patch.is_empty() {
            return Ok(());
        }
        let request = self
            .request(reqwest::Method::PATCH)
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=minimal")
            .json(&TaskRowPatch::from(patch));
        self.send("update task", request).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), InfraError> {
        let id = Self::ensure_id(id)?;
        let request = self
            .request(reqwest::Method::DELETE)
            .query(&[("id", format!("eq.{id}"))]);
        self.send("delete task", request).await?;
        Ok(())
    }
}

/// Stand-in used when no remote url/key is configured; every call fails,
/// which the task store treats as being offline.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredRemoteTaskStore;

#[async_trait]
impl RemoteTaskStore for UnconfiguredRemoteTaskStore {
    async fn list(&self) -> Result<Vec<TaskRecord>, InfraError> {
        Err(InfraError::RemoteUnconfigured)
    }

    async fn insert(&self, _record: &TaskRecord) -> Result<(), InfraError> {
        Err(InfraError::RemoteUnconfigured)
    }

    async fn update(&self, _id: &str, _patch: &TaskRecordPatch) -> Result<(), InfraError> {
        Err(InfraError::RemoteUnconfigured)
    }

    async fn delete(&self, _id: &str) -> Result<(), InfraError> {
        Err(InfraError::RemoteUnconfigured)
    }
}
