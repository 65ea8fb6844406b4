//! Drag gesture interpretation for the board view.
//!
//! A drag session turns the three-phase gesture (press, motion over a
//! target, release) into one semantic intent. The tracker never mutates
//! the snapshot itself: hovering is purely advisory, and a cancelled or
//! ineffective drop resolves to `None` with zero side effects. What is
//! being dragged is classified exactly once, at gesture start, into a
//! tagged entity carrying the full dragged object for preview rendering.

use crate::model::{Column, Task};
use crate::snapshot::BoardSnapshot;

/// Minimum pointer travel, in terminal cells, before a press counts as a
/// drag rather than a click.
pub const DRAG_ACTIVATION_DISTANCE: u16 = 2;

/// What the user picked up, resolved at gesture start.
#[derive(Debug, Clone)]
pub enum DragEntity {
    Task(Task),
    Column(Column),
}

/// The semantic outcome of a completed drag gesture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragIntent {
    ReorderTask {
        column_id: String,
        task_id: String,
        new_index: usize,
    },
    MoveTask {
        task_id: String,
        source_column_id: String,
        dest_column_id: String,
        new_index: usize,
    },
    ReorderColumns {
        order: Vec<String>,
    },
}

/// State carried across one press-to-release gesture.
#[derive(Debug, Clone)]
pub struct DragSession {
    entity: DragEntity,
    origin: (u16, u16),
    active: bool,
    hover_column_id: Option<String>,
}

impl DragSession {
    /// Start a potential drag from the entity under the pointer. Returns
    /// `None` when the pressed id is neither a task nor a column on the
    /// board. The session stays pending until the pointer travels past
    /// [`DRAG_ACTIVATION_DISTANCE`].
    pub fn begin(snapshot: &BoardSnapshot, origin_id: &str, at: (u16, u16)) -> Option<DragSession> {
        let entity = if let Some(task) = snapshot.task(origin_id) {
            DragEntity::Task(task.clone())
        } else if let Some(column) = snapshot.column(origin_id) {
            DragEntity::Column(column.clone())
        } else {
            return None;
        };
        Some(DragSession {
            entity,
            origin: at,
            active: false,
            hover_column_id: None,
        })
    }

    /// Record pointer motion; activates the session once travel crosses
    /// the threshold (Chebyshev distance, so one cell diagonally counts
    /// the same as one cell straight).
    pub fn update_position(&mut self, at: (u16, u16)) {
        if self.active {
            return;
        }
        let dx = self.origin.0.abs_diff(at.0);
        let dy = self.origin.1.abs_diff(at.1);
        if dx.max(dy) >= DRAG_ACTIVATION_DISTANCE {
            self.active = true;
        }
    }

    /// Whether the press has been recognised as a drag.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The entity snapshot taken at gesture start, for preview rendering.
    pub fn entity(&self) -> &DragEntity {
        &self.entity
    }

    /// Column currently highlighted as a drop target, for visual feedback
    /// only; drop correctness never depends on it.
    pub fn hover_column_id(&self) -> Option<&str> {
        self.hover_column_id.as_deref()
    }

    /// Advisory hover update. Only task drags resolve a hover column;
    /// column drags and unresolvable targets clear it.
    pub fn hover(&mut self, snapshot: &BoardSnapshot, target_id: Option<&str>) {
        self.hover_column_id = match (&self.entity, target_id) {
            (DragEntity::Task(_), Some(id)) => resolve_column(snapshot, id),
            _ => None,
        };
    }

    /// Terminate the gesture, resolving it to an intent. `None` means the
    /// gesture was cancelled or would change nothing: the press never
    /// activated, there was no target under the pointer, the target
    /// resolves to nothing on the board, or source and destination slot
    /// are identical.
    pub fn drop(self, snapshot: &BoardSnapshot, target_id: Option<&str>) -> Option<DragIntent> {
        if !self.active {
            return None;
        }
        let target_id = target_id?;
        match self.entity {
            DragEntity::Column(column) => resolve_column_drop(snapshot, &column.id, target_id),
            DragEntity::Task(task) => resolve_task_drop(snapshot, &task.id, target_id),
        }
    }
}

/// Resolve the column owning a target id: a task id maps to its containing
/// column, a column id to itself.
fn resolve_column(snapshot: &BoardSnapshot, target_id: &str) -> Option<String> {
    if let Some(col) = snapshot.column_of_task(target_id) {
        return Some(col.id.clone());
    }
    snapshot.column(target_id).map(|c| c.id.clone())
}

fn resolve_column_drop(
    snapshot: &BoardSnapshot,
    column_id: &str,
    target_id: &str,
) -> Option<DragIntent> {
    if column_id == target_id {
        return None;
    }
    let mut order = snapshot.column_order();
    let old_index = order.iter().position(|id| id == column_id)?;
    let new_index = order.iter().position(|id| id == target_id)?;
    if old_index == new_index {
        return None;
    }
    let moved = order.remove(old_index);
    order.insert(new_index, moved);
    Some(DragIntent::ReorderColumns { order })
}

fn resolve_task_drop(
    snapshot: &BoardSnapshot,
    task_id: &str,
    target_id: &str,
) -> Option<DragIntent> {
    let source_column_id = snapshot.column_of_task(task_id)?.id.clone();
    let dest_column_id = resolve_column(snapshot, target_id)?;
    let dest = snapshot.column(&dest_column_id)?;

    // Dropped on a task lands at that task's index; dropped on the column
    // body lands at the end of the list.
    let new_index = dest
        .tasks
        .iter()
        .position(|t| t.id == target_id)
        .unwrap_or(dest.tasks.len());

    if source_column_id == dest_column_id {
        let old_index = snapshot.locate_task(task_id)?.1;
        if old_index == new_index {
            return None;
        }
        Some(DragIntent::ReorderTask {
            column_id: source_column_id,
            task_id: task_id.to_string(),
            new_index,
        })
    } else {
        Some(DragIntent::MoveTask {
            task_id: task_id.to_string(),
            source_column_id,
            dest_column_id,
            new_index,
        })
    }
}
