//! Wire-level data model for the Taskboard API.
//!
//! Field names follow the server's camelCase JSON. All ids are opaque
//! server-assigned strings; `task_number` is the human-readable handle
//! (e.g. "TB-42") and is immutable once assigned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fields::Priority;

/// A workspace owning boards and members.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    pub plan_tier: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "_count", default)]
    pub counts: Option<WorkspaceCounts>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceCounts {
    pub members: u32,
    pub boards: u32,
}

/// A board as listed inside a workspace (no column tree attached).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub workspace_id: String,
    #[serde(rename = "_count", default)]
    pub counts: Option<BoardCounts>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoardCounts {
    pub tasks: u32,
    pub columns: u32,
}

/// The full board tree returned by the board-detail fetch. This is the
/// payload the snapshot store installs wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardDetail {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub workspace: WorkspaceRef,
    #[serde(default)]
    pub columns: Vec<Column>,
}

/// Minimal workspace reference embedded in a board detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceRef {
    pub id: String,
    pub name: String,
}

/// An ordered column of tasks. `position` is the server's persisted slot;
/// the client treats array order as authoritative once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub id: String,
    pub name: String,
    pub color: String,
    pub position: i64,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// A task card as it appears inside a board column.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub task_number: String,
    pub priority: Priority,
    pub column_id: String,
    pub position: i64,
    #[serde(default)]
    pub assignee: Option<UserRef>,
    #[serde(rename = "_count", default)]
    pub counts: Option<TaskCounts>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskCounts {
    pub subtasks: u32,
    pub comments: u32,
}

/// A user reference attached to tasks and comments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub id: String,
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// A checklist item owned by a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub id: String,
    pub title: String,
    pub is_completed: bool,
    pub position: i64,
}

/// A comment on a task. Append-only from the client's perspective apart
/// from deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub user: UserRef,
}

/// Task detail with nested subtasks and comments, fetched on demand for
/// the detail popup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetail {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub task_number: String,
    pub priority: Priority,
    pub column_id: String,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(rename = "_count", default)]
    pub counts: Option<TaskCounts>,
}

/// Partial task update sent to `PATCH /boards/:boardId/tasks/:taskId`.
/// Only the set fields are serialized.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.column_id.is_none()
            && self.position.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::Priority;

    #[test]
    fn board_detail_parses_nested_tree() {
        let json = r##"{
            "id": "b1",
            "name": "Launch",
            "workspace": { "id": "w1", "name": "Acme" },
            "columns": [
                {
                    "id": "c1",
                    "name": "Todo",
                    "color": "#3B82F6",
                    "position": 0,
                    "tasks": [
                        {
                            "id": "t1",
                            "title": "Ship it",
                            "taskNumber": "TB-1",
                            "priority": "high",
                            "columnId": "c1",
                            "position": 0,
                            "_count": { "subtasks": 2, "comments": 1 }
                        }
                    ]
                }
            ]
        }"##;
        let detail: BoardDetail = serde_json::from_str(json).unwrap();
        assert_eq!(detail.columns.len(), 1);
        let task = &detail.columns[0].tasks[0];
        assert_eq!(task.task_number, "TB-1");
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.column_id, "c1");
        assert_eq!(task.counts.as_ref().unwrap().subtasks, 2);
    }

    #[test]
    fn task_patch_serializes_only_set_fields() {
        let patch = TaskPatch {
            column_id: Some("c2".into()),
            position: Some(3),
            ..TaskPatch::default()
        };
        let body = serde_json::to_value(&patch).unwrap();
        assert_eq!(body, serde_json::json!({ "columnId": "c2", "position": 3 }));
        assert!(TaskPatch::default().is_empty());
        assert!(!patch.is_empty());
    }

    #[test]
    fn column_tolerates_missing_tasks_array() {
        let col: Column = serde_json::from_str(
            r##"{ "id": "c9", "name": "Done", "color": "#fff", "position": 4 }"##,
        )
        .unwrap();
        assert!(col.tasks.is_empty());
    }
}
