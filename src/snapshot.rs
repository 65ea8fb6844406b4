//! In-memory snapshot of one open board's column/task tree.
//!
//! The snapshot is the single owned aggregate on the client: tasks and
//! columns are never held outside it, so every transformation reads and
//! rewrites through the aggregate root and cannot leave a dangling
//! cross-reference. Each applied mutation bumps `version`, which is what
//! consumers (the render loop, the sync worker) compare to detect change;
//! a rejected operation leaves the tree and the version untouched.

use crate::model::{BoardDetail, Column, Task, TaskDetail};

/// The currently open board's tree plus a mutation counter.
#[derive(Debug, Clone)]
pub struct BoardSnapshot {
    pub board_id: String,
    pub name: String,
    pub description: Option<String>,
    pub workspace_id: String,
    pub columns: Vec<Column>,
    version: u64,
}

impl BoardSnapshot {
    /// Build the initial snapshot from a freshly fetched board tree.
    pub fn from_detail(detail: BoardDetail) -> Self {
        BoardSnapshot {
            board_id: detail.id,
            name: detail.name,
            description: detail.description,
            workspace_id: detail.workspace.id,
            columns: detail.columns,
            version: 1,
        }
    }

    /// Mutation counter. Monotonically increasing; equal versions imply an
    /// identical tree.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Install a freshly fetched tree wholesale. Used after the initial
    /// load and whenever the controller reconciles by reloading.
    pub fn replace(&mut self, detail: BoardDetail) {
        self.board_id = detail.id;
        self.name = detail.name;
        self.description = detail.description;
        self.workspace_id = detail.workspace.id;
        self.columns = detail.columns;
        self.version += 1;
    }

    /// Total number of tasks across all columns. Reorder and move
    /// operations preserve this count.
    pub fn task_count(&self) -> usize {
        self.columns.iter().map(|c| c.tasks.len()).sum()
    }

    /// Find a column by id.
    pub fn column(&self, column_id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == column_id)
    }

    /// Find a task anywhere in the tree.
    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.columns
            .iter()
            .flat_map(|c| c.tasks.iter())
            .find(|t| t.id == task_id)
    }

    /// Resolve the column physically holding a task.
    pub fn column_of_task(&self, task_id: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.tasks.iter().any(|t| t.id == task_id))
    }

    /// Locate a task as (column index, task index).
    pub fn locate_task(&self, task_id: &str) -> Option<(usize, usize)> {
        for (ci, col) in self.columns.iter().enumerate() {
            if let Some(ti) = col.tasks.iter().position(|t| t.id == task_id) {
                return Some((ci, ti));
            }
        }
        None
    }

    /// Move a task to a new index within one column. Silently refuses when
    /// the task is not in that column (a drop can race a completed reload)
    /// or when the index is unchanged. Returns whether it applied.
    pub fn reorder_task_in_column(
        &mut self,
        column_id: &str,
        task_id: &str,
        new_index: usize,
    ) -> bool {
        let Some(col) = self.columns.iter_mut().find(|c| c.id == column_id) else {
            return false;
        };
        let Some(old_index) = col.tasks.iter().position(|t| t.id == task_id) else {
            return false;
        };
        let task = col.tasks.remove(old_index);
        let new_index = new_index.min(col.tasks.len());
        if new_index == old_index {
            col.tasks.insert(old_index, task);
            return false;
        }
        col.tasks.insert(new_index, task);
        self.version += 1;
        true
    }

    /// Move a task from one column to another, inserting at `new_index` in
    /// the destination. The embedded `column_id` is rewritten in the same
    /// mutation so it always matches the containing list. Returns whether
    /// it applied.
    pub fn move_task_across_columns(
        &mut self,
        task_id: &str,
        source_column_id: &str,
        dest_column_id: &str,
        new_index: usize,
    ) -> bool {
        if source_column_id == dest_column_id {
            return self.reorder_task_in_column(source_column_id, task_id, new_index);
        }
        if !self.columns.iter().any(|c| c.id == dest_column_id) {
            return false;
        }
        let Some(source) = self.columns.iter_mut().find(|c| c.id == source_column_id) else {
            return false;
        };
        let Some(old_index) = source.tasks.iter().position(|t| t.id == task_id) else {
            return false;
        };
        let mut task = source.tasks.remove(old_index);
        task.column_id = dest_column_id.to_string();
        let dest = self
            .columns
            .iter_mut()
            .find(|c| c.id == dest_column_id)
            .expect("destination column checked above");
        let new_index = new_index.min(dest.tasks.len());
        dest.tasks.insert(new_index, task);
        self.version += 1;
        true
    }

    /// Rebuild the column list in the exact order given by `order`. Ids not
    /// present on the board are ignored; current columns missing from the
    /// sequence are dropped (callers supply a permutation, this is the
    /// defensive fallback). No-op when the order already matches.
    pub fn reorder_columns(&mut self, order: &[String]) -> bool {
        let current = self.column_order();
        let mut reordered: Vec<Column> = Vec::with_capacity(self.columns.len());
        for id in order {
            if let Some(pos) = self.columns.iter().position(|c| &c.id == id) {
                reordered.push(self.columns.remove(pos));
            }
        }
        // Anything left in self.columns was absent from `order` and is dropped.
        self.columns = reordered;
        if self.column_order() == current {
            return false;
        }
        self.version += 1;
        true
    }

    /// Merge partial fields into a task wherever it nests. Column and
    /// position are deliberately not merged here: physical placement only
    /// changes through the move/reorder operations, which keep the embedded
    /// `column_id` and the containing list in lockstep.
    pub fn apply_task_fields(&mut self, detail: &TaskDetail) -> bool {
        for col in &mut self.columns {
            if let Some(task) = col.tasks.iter_mut().find(|t| t.id == detail.id) {
                task.title = detail.title.clone();
                task.description = detail.description.clone();
                task.priority = detail.priority;
                task.counts = detail.counts.clone();
                self.version += 1;
                return true;
            }
        }
        false
    }

    /// Append a newly created task to its column.
    pub fn insert_task(&mut self, task: Task) -> bool {
        let Some(col) = self.columns.iter_mut().find(|c| c.id == task.column_id) else {
            return false;
        };
        col.tasks.push(task);
        self.version += 1;
        true
    }

    /// Remove a deleted task from whichever column holds it.
    pub fn remove_task(&mut self, task_id: &str) -> bool {
        for col in &mut self.columns {
            if let Some(idx) = col.tasks.iter().position(|t| t.id == task_id) {
                col.tasks.remove(idx);
                self.version += 1;
                return true;
            }
        }
        false
    }

    /// Dense 0-based positions for one column, as sent on reorder calls.
    pub fn dense_positions(&self, column_id: &str) -> Vec<(String, i64)> {
        self.column(column_id)
            .map(|c| {
                c.tasks
                    .iter()
                    .enumerate()
                    .map(|(i, t)| (t.id.clone(), i as i64))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The current column id sequence.
    pub fn column_order(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.id.clone()).collect()
    }

    /// Verify that every task's embedded `column_id` matches the column
    /// array it physically resides in.
    pub fn check_consistency(&self) -> bool {
        self.columns
            .iter()
            .all(|c| c.tasks.iter().all(|t| t.column_id == c.id))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::fields::Priority;
    use crate::model::{Column, Task, WorkspaceRef};

    pub fn task(id: &str, column_id: &str, position: i64) -> Task {
        Task {
            id: id.to_string(),
            title: format!("Task {id}"),
            description: None,
            task_number: format!("TB-{id}"),
            priority: Priority::Medium,
            column_id: column_id.to_string(),
            position,
            assignee: None,
            counts: None,
        }
    }

    pub fn column(id: &str, name: &str, task_ids: &[&str]) -> Column {
        Column {
            id: id.to_string(),
            name: name.to_string(),
            color: "#3B82F6".to_string(),
            position: 0,
            tasks: task_ids
                .iter()
                .enumerate()
                .map(|(i, t)| task(t, id, i as i64))
                .collect(),
        }
    }

    /// Columns Todo/Doing/Done; Todo holds tasks A, B, C.
    pub fn board() -> BoardSnapshot {
        BoardSnapshot::from_detail(BoardDetail {
            id: "b1".to_string(),
            name: "Launch".to_string(),
            description: None,
            workspace: WorkspaceRef {
                id: "w1".to_string(),
                name: "Acme".to_string(),
            },
            columns: vec![
                column("todo", "Todo", &["A", "B", "C"]),
                column("doing", "Doing", &[]),
                column("done", "Done", &[]),
            ],
        })
    }

    pub fn task_ids(snapshot: &BoardSnapshot, column_id: &str) -> Vec<String> {
        snapshot
            .column(column_id)
            .map(|c| c.tasks.iter().map(|t| t.id.clone()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn reorder_moves_task_to_new_index() {
        let mut board = board();
        assert!(board.reorder_task_in_column("todo", "B", 0));
        assert_eq!(task_ids(&board, "todo"), ["B", "A", "C"]);
        assert!(board.check_consistency());
    }

    #[test]
    fn reorder_round_trip_restores_order() {
        let mut board = board();
        assert!(board.reorder_task_in_column("todo", "B", 2));
        assert!(board.reorder_task_in_column("todo", "B", 1));
        assert_eq!(task_ids(&board, "todo"), ["A", "B", "C"]);
    }

    #[test]
    fn reorder_to_same_index_is_a_no_op() {
        let mut board = board();
        let v = board.version();
        assert!(!board.reorder_task_in_column("todo", "B", 1));
        assert_eq!(board.version(), v);
        assert_eq!(task_ids(&board, "todo"), ["A", "B", "C"]);
    }

    #[test]
    fn reorder_unknown_task_is_a_no_op() {
        let mut board = board();
        let v = board.version();
        assert!(!board.reorder_task_in_column("todo", "Z", 0));
        assert!(!board.reorder_task_in_column("doing", "A", 0));
        assert_eq!(board.version(), v);
    }

    #[test]
    fn reorder_clamps_index_past_end() {
        let mut board = board();
        assert!(board.reorder_task_in_column("todo", "A", 99));
        assert_eq!(task_ids(&board, "todo"), ["B", "C", "A"]);
    }

    #[test]
    fn move_across_columns_shifts_counts_by_one() {
        let mut board = board();
        let total = board.task_count();
        assert!(board.move_task_across_columns("A", "todo", "doing", 0));
        assert_eq!(board.column("todo").unwrap().tasks.len(), 2);
        assert_eq!(board.column("doing").unwrap().tasks.len(), 1);
        assert_eq!(board.task_count(), total);
        assert_eq!(board.task("A").unwrap().column_id, "doing");
        assert!(board.check_consistency());
    }

    #[test]
    fn move_to_missing_source_or_dest_is_a_no_op() {
        let mut board = board();
        let v = board.version();
        assert!(!board.move_task_across_columns("A", "doing", "done", 0));
        assert!(!board.move_task_across_columns("A", "todo", "nope", 0));
        assert_eq!(board.version(), v);
        assert_eq!(task_ids(&board, "todo"), ["A", "B", "C"]);
    }

    #[test]
    fn move_with_same_source_and_dest_degrades_to_reorder() {
        let mut board = board();
        assert!(board.move_task_across_columns("A", "todo", "todo", 2));
        assert_eq!(task_ids(&board, "todo"), ["B", "C", "A"]);
    }

    #[test]
    fn reorder_columns_applies_permutation_without_touching_tasks() {
        let mut board = board();
        let order: Vec<String> = ["done", "todo", "doing"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert!(board.reorder_columns(&order));
        assert_eq!(board.column_order(), order);
        assert_eq!(task_ids(&board, "todo"), ["A", "B", "C"]);
    }

    #[test]
    fn reorder_columns_ignores_unknown_ids() {
        let mut board = board();
        let order: Vec<String> = ["ghost", "doing", "todo", "done"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert!(board.reorder_columns(&order));
        assert_eq!(board.column_order(), ["doing", "todo", "done"]);
    }

    #[test]
    fn reorder_columns_drops_ids_missing_from_sequence() {
        let mut board = board();
        let order: Vec<String> = ["done", "doing"].iter().map(|s| s.to_string()).collect();
        assert!(board.reorder_columns(&order));
        assert_eq!(board.column_order(), ["done", "doing"]);
    }

    #[test]
    fn scenario_drag_within_then_across() {
        let mut board = board();
        // Dragging B to index 0 within Todo.
        assert!(board.reorder_task_in_column("todo", "B", 0));
        assert_eq!(task_ids(&board, "todo"), ["B", "A", "C"]);
        // Dragging A from Todo onto the empty Doing column body.
        assert!(board.move_task_across_columns("A", "todo", "doing", 1));
        assert_eq!(task_ids(&board, "todo"), ["B", "C"]);
        assert_eq!(task_ids(&board, "doing"), ["A"]);
        assert!(board.check_consistency());
    }

    #[test]
    fn apply_task_fields_merges_without_moving() {
        use crate::fields::Priority;
        use crate::model::TaskDetail;

        let mut board = board();
        let detail = TaskDetail {
            id: "B".to_string(),
            title: "Renamed".to_string(),
            description: Some("now with detail".to_string()),
            task_number: "TB-B".to_string(),
            priority: Priority::Critical,
            column_id: "B-doesnt-matter".to_string(),
            subtasks: Vec::new(),
            comments: Vec::new(),
            counts: None,
        };
        assert!(board.apply_task_fields(&detail));
        let task = board.task("B").unwrap();
        assert_eq!(task.title, "Renamed");
        assert_eq!(task.priority, Priority::Critical);
        // Physical placement untouched.
        assert_eq!(task.column_id, "todo");
        assert_eq!(task_ids(&board, "todo"), ["A", "B", "C"]);
    }

    #[test]
    fn insert_and_remove_task() {
        let mut board = board();
        assert!(board.insert_task(task("D", "doing", 0)));
        assert_eq!(task_ids(&board, "doing"), ["D"]);
        assert!(board.remove_task("D"));
        assert!(board.column("doing").unwrap().tasks.is_empty());
        assert!(!board.remove_task("D"));
    }

    #[test]
    fn dense_positions_follow_array_order() {
        let mut board = board();
        board.reorder_task_in_column("todo", "C", 0);
        let positions = board.dense_positions("todo");
        assert_eq!(
            positions,
            vec![
                ("C".to_string(), 0),
                ("A".to_string(), 1),
                ("B".to_string(), 2)
            ]
        );
    }

    #[test]
    fn replace_installs_new_tree_and_bumps_version() {
        let mut board = board();
        let v = board.version();
        let detail = crate::model::BoardDetail {
            id: "b2".to_string(),
            name: "Other".to_string(),
            description: None,
            workspace: crate::model::WorkspaceRef {
                id: "w1".to_string(),
                name: "Acme".to_string(),
            },
            columns: vec![column("only", "Only", &["X"])],
        };
        board.replace(detail);
        assert!(board.version() > v);
        assert_eq!(board.board_id, "b2");
        assert_eq!(board.column_order(), ["only"]);
    }
}
