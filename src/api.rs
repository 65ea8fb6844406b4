//! Blocking HTTP client for the Taskboard REST API.
//!
//! Covers the workspace/board/column/task/subtask/comment surface. Non-2xx
//! responses become [`ApiError::Api`] carrying the server's own message
//! when the body holds one (the "last column" deletion guard travels to the
//! user verbatim through this path); transport failures become
//! [`ApiError::Http`].

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::fields::Priority;
use crate::model::{
    Board, BoardDetail, Column, Comment, Subtask, Task, TaskDetail, TaskPatch, Workspace,
};

/// Errors from the network/API boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server answered with a non-success status.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// The request never completed (connect, timeout, TLS, decode).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Authenticated client bound to one server.
pub struct ApiClient {
    base_url: String,
    token: String,
    http: Client,
}

impl ApiClient {
    pub fn new(server_url: &str, token: &str) -> Result<ApiClient, ApiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(ApiClient {
            base_url: server_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send(&self, req: RequestBuilder) -> Result<Response, ApiError> {
        let resp = req.bearer_auth(&self.token).send()?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().unwrap_or_default();
        Err(ApiError::Api {
            status: status.as_u16(),
            message: extract_message(&body, status.as_u16()),
        })
    }

    fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R, ApiError> {
        debug!(path, "GET");
        Ok(self.send(self.http.get(self.url(path)))?.json()?)
    }

    fn post_json<R: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<R, ApiError> {
        debug!(path, "POST");
        Ok(self.send(self.http.post(self.url(path)).json(body))?.json()?)
    }

    fn patch(&self, path: &str, body: &serde_json::Value) -> Result<(), ApiError> {
        debug!(path, "PATCH");
        self.send(self.http.patch(self.url(path)).json(body))?;
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<(), ApiError> {
        debug!(path, "DELETE");
        self.send(self.http.delete(self.url(path)))?;
        Ok(())
    }

    // Workspaces

    pub fn workspaces(&self) -> Result<Vec<Workspace>, ApiError> {
        self.get_json("/workspaces")
    }

    pub fn create_workspace(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Workspace, ApiError> {
        self.post_json(
            "/workspaces",
            &json!({ "name": name, "description": description }),
        )
    }

    // Boards

    pub fn boards(&self, workspace_id: &str) -> Result<Vec<Board>, ApiError> {
        self.get_json(&paths::boards(workspace_id))
    }

    pub fn create_board(
        &self,
        workspace_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<Board, ApiError> {
        self.post_json(
            &paths::boards(workspace_id),
            &json!({ "name": name, "description": description }),
        )
    }

    /// Fetch the full column/task tree: the initial snapshot.
    pub fn board(&self, workspace_id: &str, board_id: &str) -> Result<BoardDetail, ApiError> {
        self.get_json(&paths::board(workspace_id, board_id))
    }

    // Columns

    pub fn create_column(
        &self,
        workspace_id: &str,
        board_id: &str,
        name: &str,
        color: &str,
    ) -> Result<Column, ApiError> {
        self.post_json(
            &paths::columns(workspace_id, board_id),
            &json!({ "name": name, "color": color }),
        )
    }

    pub fn update_column(
        &self,
        workspace_id: &str,
        board_id: &str,
        column_id: &str,
        name: Option<&str>,
        color: Option<&str>,
    ) -> Result<(), ApiError> {
        let mut body = serde_json::Map::new();
        if let Some(name) = name {
            body.insert("name".into(), json!(name));
        }
        if let Some(color) = color {
            body.insert("color".into(), json!(color));
        }
        self.patch(
            &paths::column(workspace_id, board_id, column_id),
            &serde_json::Value::Object(body),
        )
    }

    /// Fails with the server's domain error when this is the board's last
    /// column; the message is surfaced to the caller verbatim.
    pub fn delete_column(
        &self,
        workspace_id: &str,
        board_id: &str,
        column_id: &str,
    ) -> Result<(), ApiError> {
        self.delete(&paths::column(workspace_id, board_id, column_id))
    }

    /// Apply a full column order in one call.
    pub fn reorder_columns(
        &self,
        workspace_id: &str,
        board_id: &str,
        column_ids: &[String],
    ) -> Result<(), ApiError> {
        self.patch(
            &paths::reorder_columns(workspace_id, board_id),
            &json!({ "columnIds": column_ids }),
        )
    }

    // Tasks

    pub fn create_task(
        &self,
        board_id: &str,
        column_id: &str,
        title: &str,
        description: Option<&str>,
        priority: Priority,
    ) -> Result<Task, ApiError> {
        self.post_json(
            &paths::tasks(board_id),
            &json!({
                "columnId": column_id,
                "title": title,
                "description": description,
                "priority": priority,
            }),
        )
    }

    pub fn update_task(
        &self,
        board_id: &str,
        task_id: &str,
        patch: &TaskPatch,
    ) -> Result<(), ApiError> {
        let body = serde_json::to_value(patch).expect("patch is plain data");
        self.patch(&paths::task(board_id, task_id), &body)
    }

    pub fn delete_task(&self, board_id: &str, task_id: &str) -> Result<(), ApiError> {
        self.delete(&paths::task(board_id, task_id))
    }

    pub fn task_detail(&self, board_id: &str, task_id: &str) -> Result<TaskDetail, ApiError> {
        self.get_json(&paths::task(board_id, task_id))
    }

    // Subtasks

    pub fn create_subtask(&self, task_id: &str, title: &str) -> Result<Subtask, ApiError> {
        self.post_json(&paths::subtasks(task_id), &json!({ "title": title }))
    }

    pub fn update_subtask(
        &self,
        task_id: &str,
        subtask_id: &str,
        is_completed: bool,
    ) -> Result<(), ApiError> {
        self.patch(
            &paths::subtask(task_id, subtask_id),
            &json!({ "isCompleted": is_completed }),
        )
    }

    pub fn delete_subtask(&self, task_id: &str, subtask_id: &str) -> Result<(), ApiError> {
        self.delete(&paths::subtask(task_id, subtask_id))
    }

    // Comments

    pub fn create_comment(&self, task_id: &str, content: &str) -> Result<Comment, ApiError> {
        self.post_json(&paths::comments(task_id), &json!({ "content": content }))
    }

    pub fn delete_comment(&self, task_id: &str, comment_id: &str) -> Result<(), ApiError> {
        self.delete(&paths::comment(task_id, comment_id))
    }
}

/// Pull the server's error message out of a response body, falling back to
/// the bare status code.
fn extract_message(body: &str, status: u16) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "error"] {
            if let Some(msg) = value.get(key).and_then(|m| m.as_str()) {
                return msg.to_string();
            }
        }
    }
    format!("server returned status {status}")
}

/// Endpoint path templates, kept together so the URL shapes are testable
/// without a live server.
mod paths {
    pub fn boards(workspace_id: &str) -> String {
        format!("/workspaces/{workspace_id}/boards")
    }

    pub fn board(workspace_id: &str, board_id: &str) -> String {
        format!("/workspaces/{workspace_id}/boards/{board_id}")
    }

    pub fn columns(workspace_id: &str, board_id: &str) -> String {
        format!("/workspaces/{workspace_id}/boards/{board_id}/columns")
    }

    pub fn column(workspace_id: &str, board_id: &str, column_id: &str) -> String {
        format!("/workspaces/{workspace_id}/boards/{board_id}/columns/{column_id}")
    }

    pub fn reorder_columns(workspace_id: &str, board_id: &str) -> String {
        format!("/workspaces/{workspace_id}/boards/{board_id}/columns/reorder")
    }

    pub fn tasks(board_id: &str) -> String {
        format!("/boards/{board_id}/tasks")
    }

    pub fn task(board_id: &str, task_id: &str) -> String {
        format!("/boards/{board_id}/tasks/{task_id}")
    }

    pub fn subtasks(task_id: &str) -> String {
        format!("/tasks/{task_id}/subtasks")
    }

    pub fn subtask(task_id: &str, subtask_id: &str) -> String {
        format!("/tasks/{task_id}/subtasks/{subtask_id}")
    }

    pub fn comments(task_id: &str) -> String {
        format!("/tasks/{task_id}/comments")
    }

    pub fn comment(task_id: &str, comment_id: &str) -> String {
        format!("/tasks/{task_id}/comments/{comment_id}")
    }
}
