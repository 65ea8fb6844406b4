//! Interactive board view.
//!
//! Renders the open board's columns and cards, and wires user gestures
//! into the ordering engine: mouse press/drag/release flows through the
//! drag session tracker, keyboard shortcuts build the same intents
//! directly, and everything lands in the sync controller. All remote
//! failures surface on the status line; nothing in here panics the
//! render loop.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use crossterm::event::{self, Event, KeyCode, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame, Terminal,
};

use crate::api::ApiClient;
use crate::drag::{DragEntity, DragIntent, DragSession};
use crate::fields::{format_priority, Priority};
use crate::model::TaskDetail;
use crate::sync::{SyncController, SyncEvent};
use crate::tui::colors::{column_color, priority_color, DROP_HIGHLIGHT};
use crate::tui::input::InputField;

const CARD_HEIGHT: u16 = 2;
const DEFAULT_COLUMN_COLOR: &str = "#6B7280";

/// What a modal input box is collecting.
enum ModalKind {
    NewTask { column_id: String, column_name: String },
    NewColumn,
    RenameColumn { column_id: String },
    EditTitle { task_id: String },
    EditDescription { task_id: String },
    NewSubtask { task_id: String },
    NewComment { task_id: String },
}

struct Modal {
    kind: ModalKind,
    input: InputField,
}

impl Modal {
    fn title(&self) -> String {
        match &self.kind {
            ModalKind::NewTask { column_name, .. } => format!("New task in {column_name}"),
            ModalKind::NewColumn => "New column".to_string(),
            ModalKind::RenameColumn { .. } => "Rename column".to_string(),
            ModalKind::EditTitle { .. } => "Edit title".to_string(),
            ModalKind::EditDescription { .. } => "Edit description".to_string(),
            ModalKind::NewSubtask { .. } => "New subtask".to_string(),
            ModalKind::NewComment { .. } => "New comment".to_string(),
        }
    }
}

/// Pending destructive action awaiting y/n.
enum ConfirmAction {
    DeleteTask { task_id: String, title: String },
    DeleteColumn { column_id: String, name: String },
}

impl ConfirmAction {
    fn prompt(&self) -> String {
        match self {
            ConfirmAction::DeleteTask { title, .. } => {
                format!("Delete task \"{title}\"? (y/n)")
            }
            ConfirmAction::DeleteColumn { name, .. } => {
                format!("Delete column \"{name}\" and its tasks? (y/n)")
            }
        }
    }
}

/// The task-detail popup.
struct DetailView {
    task: TaskDetail,
    selected: usize,
}

impl DetailView {
    fn item_count(&self) -> usize {
        self.task.subtasks.len() + self.task.comments.len()
    }
}

/// Rects captured during render, used to resolve mouse coordinates back
/// to entity ids. Cards win over column headers, headers over bodies.
#[derive(Default)]
struct HitAreas {
    cards: Vec<(String, Rect)>,
    column_headers: Vec<(String, Rect)>,
    column_bodies: Vec<(String, Rect)>,
}

impl HitAreas {
    fn clear(&mut self) {
        self.cards.clear();
        self.column_headers.clear();
        self.column_bodies.clear();
    }

    /// Entity id under the pointer: a task id, or a column id for header
    /// and body hits.
    fn target_at(&self, x: u16, y: u16) -> Option<String> {
        let pos = Position::new(x, y);
        for (id, rect) in &self.cards {
            if rect.contains(pos) {
                return Some(id.clone());
            }
        }
        for (id, rect) in &self.column_headers {
            if rect.contains(pos) {
                return Some(id.clone());
            }
        }
        for (id, rect) in &self.column_bodies {
            if rect.contains(pos) {
                return Some(id.clone());
            }
        }
        None
    }

    /// Id under the pointer that may start a drag: a card or a column
    /// header. Pressing empty column body starts nothing.
    fn drag_origin_at(&self, x: u16, y: u16) -> Option<String> {
        let pos = Position::new(x, y);
        for (id, rect) in &self.cards {
            if rect.contains(pos) {
                return Some(id.clone());
            }
        }
        for (id, rect) in &self.column_headers {
            if rect.contains(pos) {
                return Some(id.clone());
            }
        }
        None
    }
}

/// Main board application state.
pub struct BoardApp {
    controller: SyncController<ApiClient>,
    api: Arc<ApiClient>,
    selected_column: usize,
    selected_card: usize,
    scroll_offsets: Vec<usize>,
    status_message: String,
    drag: Option<DragSession>,
    areas: HitAreas,
    detail: Option<DetailView>,
    modal: Option<Modal>,
    confirm: Option<ConfirmAction>,
}

impl BoardApp {
    /// Wrap an already-loaded controller. Loading happens before the
    /// terminal is put into raw mode so a failure never leaves the user
    /// with a broken screen.
    pub fn new(controller: SyncController<ApiClient>, api: Arc<ApiClient>) -> Self {
        BoardApp {
            controller,
            api,
            selected_column: 0,
            selected_card: 0,
            scroll_offsets: Vec::new(),
            status_message: "Enter: details | n: new task | drag with mouse | h: help".to_string(),
            drag: None,
            areas: HitAreas::default(),
            detail: None,
            modal: None,
            confirm: None,
        }
    }

    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            terminal.draw(|f| self.render(f))?;
            if self.handle_input()? {
                return Ok(());
            }
            self.pump_sync();
        }
    }

    /// Drain background sync outcomes into status updates.
    fn pump_sync(&mut self) {
        for event in self.controller.pump() {
            match event {
                SyncEvent::Reloaded => {
                    self.clamp_selection();
                    self.set_status("Board refreshed".to_string());
                }
                SyncEvent::PushFailed(msg) => {
                    self.set_status(format!("Sync failed ({msg}), reloading board"));
                }
                SyncEvent::ReloadFailed(msg) => {
                    self.set_status(format!("Reload failed: {msg}"));
                }
            }
        }
    }

    fn set_status(&mut self, msg: String) {
        self.status_message = msg;
    }

    fn clamp_selection(&mut self) {
        let columns = &self.controller.snapshot().columns;
        if columns.is_empty() {
            self.selected_column = 0;
            self.selected_card = 0;
            return;
        }
        if self.selected_column >= columns.len() {
            self.selected_column = columns.len() - 1;
        }
        let len = columns[self.selected_column].tasks.len();
        if len == 0 {
            self.selected_card = 0;
        } else if self.selected_card >= len {
            self.selected_card = len - 1;
        }
    }

    fn selected_task_id(&self) -> Option<String> {
        self.controller
            .snapshot()
            .columns
            .get(self.selected_column)?
            .tasks
            .get(self.selected_card)
            .map(|t| t.id.clone())
    }

    // Input handling

    fn handle_input(&mut self) -> io::Result<bool> {
        if !event::poll(Duration::from_millis(50))? {
            return Ok(false);
        }
        match event::read()? {
            Event::Key(key) => {
                if self.modal.is_some() {
                    self.handle_modal_key(key.code);
                    return Ok(false);
                }
                if self.confirm.is_some() {
                    self.handle_confirm_key(key.code);
                    return Ok(false);
                }
                if self.detail.is_some() {
                    self.handle_detail_key(key.code);
                    return Ok(false);
                }
                return self.handle_board_key(key.code, key.modifiers);
            }
            Event::Mouse(mouse) => {
                if self.modal.is_none() && self.confirm.is_none() && self.detail.is_none() {
                    self.handle_mouse(mouse);
                }
            }
            _ => {}
        }
        Ok(false)
    }

    fn handle_board_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> io::Result<bool> {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => return Ok(true),

            // Keyboard equivalents of the drag intents.
            KeyCode::Left if modifiers.contains(KeyModifiers::CONTROL) => {
                self.move_selected_task(-1);
            }
            KeyCode::Right if modifiers.contains(KeyModifiers::CONTROL) => {
                self.move_selected_task(1);
            }
            KeyCode::Up if modifiers.contains(KeyModifiers::CONTROL) => {
                self.reorder_selected_task(-1);
            }
            KeyCode::Down if modifiers.contains(KeyModifiers::CONTROL) => {
                self.reorder_selected_task(1);
            }
            KeyCode::Left if modifiers.contains(KeyModifiers::ALT) => {
                self.reorder_selected_column(-1);
            }
            KeyCode::Right if modifiers.contains(KeyModifiers::ALT) => {
                self.reorder_selected_column(1);
            }

            // Selection movement.
            KeyCode::Left => {
                if self.selected_column > 0 {
                    self.selected_column -= 1;
                    self.clamp_selection();
                }
            }
            KeyCode::Right => {
                let cols = self.controller.snapshot().columns.len();
                if cols > 0 && self.selected_column + 1 < cols {
                    self.selected_column += 1;
                    self.clamp_selection();
                }
            }
            KeyCode::Up => {
                if self.selected_card > 0 {
                    self.selected_card -= 1;
                }
            }
            KeyCode::Down => {
                let len = self
                    .controller
                    .snapshot()
                    .columns
                    .get(self.selected_column)
                    .map(|c| c.tasks.len())
                    .unwrap_or(0);
                if len > 0 && self.selected_card + 1 < len {
                    self.selected_card += 1;
                }
            }

            KeyCode::Enter => {
                if let Some(task_id) = self.selected_task_id() {
                    self.open_detail(&task_id);
                }
            }
            KeyCode::Char('n') => {
                if let Some(col) = self
                    .controller
                    .snapshot()
                    .columns
                    .get(self.selected_column)
                {
                    self.modal = Some(Modal {
                        kind: ModalKind::NewTask {
                            column_id: col.id.clone(),
                            column_name: col.name.clone(),
                        },
                        input: InputField::new(),
                    });
                }
            }
            KeyCode::Char('N') => {
                self.modal = Some(Modal {
                    kind: ModalKind::NewColumn,
                    input: InputField::new(),
                });
            }
            KeyCode::Char('R') => {
                let selected = self
                    .controller
                    .snapshot()
                    .columns
                    .get(self.selected_column)
                    .map(|c| (c.id.clone(), c.name.clone()));
                if let Some((column_id, name)) = selected {
                    self.modal = Some(Modal {
                        kind: ModalKind::RenameColumn { column_id },
                        input: InputField::with_value(&name),
                    });
                }
            }
            KeyCode::Char('x') => {
                let selected = self
                    .controller
                    .snapshot()
                    .columns
                    .get(self.selected_column)
                    .and_then(|c| c.tasks.get(self.selected_card))
                    .map(|t| (t.id.clone(), t.title.clone()));
                if let Some((task_id, title)) = selected {
                    self.confirm = Some(ConfirmAction::DeleteTask { task_id, title });
                }
            }
            KeyCode::Char('X') => {
                let selected = self
                    .controller
                    .snapshot()
                    .columns
                    .get(self.selected_column)
                    .map(|c| (c.id.clone(), c.name.clone()));
                if let Some((column_id, name)) = selected {
                    self.confirm = Some(ConfirmAction::DeleteColumn { column_id, name });
                }
            }
            KeyCode::Char('r') => {
                self.controller.request_reload();
                self.set_status("Refreshing board...".to_string());
            }
            KeyCode::Char('h') => {
                self.set_status(
                    "Arrows: select | Ctrl+arrows: move task | Alt+arrows: move column | \
                     n/N: new task/column | R: rename column | x/X: delete | Enter: details | \
                     r: refresh | q: quit"
                        .to_string(),
                );
            }
            _ => {}
        }
        Ok(false)
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        let at = (mouse.column, mouse.row);
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some(origin_id) = self.areas.drag_origin_at(at.0, at.1) {
                    self.drag = DragSession::begin(self.controller.snapshot(), &origin_id, at);
                    self.select_entity(&origin_id);
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                let target = self.areas.target_at(at.0, at.1);
                if let Some(session) = self.drag.as_mut() {
                    let was_active = session.is_active();
                    session.update_position(at);
                    if session.is_active() {
                        session.hover(self.controller.snapshot(), target.as_deref());
                    }
                    if !was_active && session.is_active() {
                        // A reload finishing mid-gesture must not replace
                        // the tree under the pointer.
                        self.controller.set_hold(true);
                    }
                }
            }
            MouseEventKind::Up(MouseButton::Left) => {
                if let Some(session) = self.drag.take() {
                    if session.is_active() {
                        self.finish_drag(session, at);
                    } else if let Some(target) = self.areas.target_at(at.0, at.1) {
                        // A press without travel is a click.
                        if self.controller.snapshot().task(&target).is_some() {
                            self.open_detail(&target);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn finish_drag(&mut self, session: DragSession, at: (u16, u16)) {
        let target = self.areas.target_at(at.0, at.1);
        let intent = session.drop(self.controller.snapshot(), target.as_deref());
        if let Some(intent) = intent {
            let status = self.intent_status(&intent);
            let followed = followed_selection(&intent);
            if self.controller.apply(intent) {
                self.set_status(status);
                if let Some(task_id) = followed {
                    self.select_entity(&task_id);
                }
            }
        }
        if let Some(SyncEvent::Reloaded) = self.controller.set_hold(false) {
            self.clamp_selection();
            self.set_status("Board refreshed".to_string());
        }
    }

    fn intent_status(&self, intent: &DragIntent) -> String {
        match intent {
            DragIntent::ReorderTask { .. } => "Task reordered!".to_string(),
            DragIntent::MoveTask { dest_column_id, .. } => {
                let name = self
                    .controller
                    .snapshot()
                    .column(dest_column_id)
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| "column".to_string());
                format!("Moved to {name}!")
            }
            DragIntent::ReorderColumns { .. } => "Columns reordered!".to_string(),
        }
    }

    /// Point the selection at an entity after a mutation moved it.
    fn select_entity(&mut self, id: &str) {
        let snapshot = self.controller.snapshot();
        if let Some((ci, ti)) = snapshot.locate_task(id) {
            self.selected_column = ci;
            self.selected_card = ti;
        } else if let Some(ci) = snapshot.columns.iter().position(|c| c.id == id) {
            self.selected_column = ci;
            self.selected_card = 0;
        }
    }

    // Keyboard intents

    fn move_selected_task(&mut self, dir: i64) {
        let snapshot = self.controller.snapshot();
        let Some(task_id) = self.selected_task_id() else {
            return;
        };
        let dest_index = self.selected_column as i64 + dir;
        if dest_index < 0 || dest_index as usize >= snapshot.columns.len() {
            return;
        }
        let source = snapshot.columns[self.selected_column].id.clone();
        let dest_col = &snapshot.columns[dest_index as usize];
        let intent = DragIntent::MoveTask {
            task_id: task_id.clone(),
            source_column_id: source,
            dest_column_id: dest_col.id.clone(),
            new_index: dest_col.tasks.len(),
        };
        let status = self.intent_status(&intent);
        if self.controller.apply(intent) {
            self.set_status(status);
            self.select_entity(&task_id);
        }
    }

    fn reorder_selected_task(&mut self, dir: i64) {
        let Some(task_id) = self.selected_task_id() else {
            return;
        };
        let new_index = self.selected_card as i64 + dir;
        if new_index < 0 {
            return;
        }
        let column_id = self.controller.snapshot().columns[self.selected_column]
            .id
            .clone();
        let intent = DragIntent::ReorderTask {
            column_id,
            task_id: task_id.clone(),
            new_index: new_index as usize,
        };
        if self.controller.apply(intent) {
            self.set_status("Task reordered!".to_string());
            self.select_entity(&task_id);
        }
    }

    fn reorder_selected_column(&mut self, dir: i64) {
        let mut order = self.controller.snapshot().column_order();
        let from = self.selected_column as i64;
        let to = from + dir;
        if to < 0 || to as usize >= order.len() {
            return;
        }
        let id = order.remove(from as usize);
        order.insert(to as usize, id.clone());
        if self.controller.apply(DragIntent::ReorderColumns { order }) {
            self.set_status("Columns reordered!".to_string());
            self.select_entity(&id);
        }
    }

    // Modal / confirm / detail handling

    fn handle_modal_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => {
                self.modal = None;
            }
            KeyCode::Enter => {
                if let Some(modal) = self.modal.take() {
                    self.submit_modal(modal);
                }
            }
            KeyCode::Backspace => {
                if let Some(modal) = self.modal.as_mut() {
                    modal.input.handle_backspace();
                }
            }
            KeyCode::Left => {
                if let Some(modal) = self.modal.as_mut() {
                    modal.input.move_cursor_left();
                }
            }
            KeyCode::Right => {
                if let Some(modal) = self.modal.as_mut() {
                    modal.input.move_cursor_right();
                }
            }
            KeyCode::Char(c) => {
                if let Some(modal) = self.modal.as_mut() {
                    modal.input.handle_char(c);
                }
            }
            _ => {}
        }
    }

    fn submit_modal(&mut self, modal: Modal) {
        let Some(text) = modal.input.submit() else {
            return;
        };
        match modal.kind {
            ModalKind::NewTask { column_id, .. } => {
                let board_id = self.controller.board_id().to_string();
                match self
                    .api
                    .create_task(&board_id, &column_id, &text, None, Priority::Medium)
                {
                    Ok(task) => {
                        self.controller.record_created_task(task);
                        self.set_status("Task created!".to_string());
                    }
                    Err(e) => self.set_status(format!("Failed to create task: {e}")),
                }
            }
            ModalKind::NewColumn => {
                let (ws, board) = (
                    self.controller.workspace_id().to_string(),
                    self.controller.board_id().to_string(),
                );
                match self
                    .api
                    .create_column(&ws, &board, &text, DEFAULT_COLUMN_COLOR)
                {
                    Ok(_) => {
                        self.controller.request_reload();
                        self.set_status("Column created!".to_string());
                    }
                    Err(e) => self.set_status(format!("Failed to create column: {e}")),
                }
            }
            ModalKind::RenameColumn { column_id } => {
                let (ws, board) = (
                    self.controller.workspace_id().to_string(),
                    self.controller.board_id().to_string(),
                );
                match self
                    .api
                    .update_column(&ws, &board, &column_id, Some(&text), None)
                {
                    Ok(()) => {
                        self.controller.request_reload();
                        self.set_status("Column renamed!".to_string());
                    }
                    Err(e) => self.set_status(format!("Failed to rename column: {e}")),
                }
            }
            ModalKind::EditTitle { task_id } => {
                self.patch_task_fields(
                    &task_id,
                    crate::model::TaskPatch {
                        title: Some(text),
                        ..Default::default()
                    },
                );
            }
            ModalKind::EditDescription { task_id } => {
                self.patch_task_fields(
                    &task_id,
                    crate::model::TaskPatch {
                        description: Some(text),
                        ..Default::default()
                    },
                );
            }
            ModalKind::NewSubtask { task_id } => {
                match self.api.create_subtask(&task_id, &text) {
                    Ok(_) => {
                        self.refresh_detail(&task_id);
                        self.set_status("Subtask added!".to_string());
                    }
                    Err(e) => self.set_status(format!("Failed to add subtask: {e}")),
                }
            }
            ModalKind::NewComment { task_id } => {
                match self.api.create_comment(&task_id, &text) {
                    Ok(_) => {
                        self.refresh_detail(&task_id);
                        self.set_status("Comment added!".to_string());
                    }
                    Err(e) => self.set_status(format!("Failed to add comment: {e}")),
                }
            }
        }
    }

    /// Remote-first field update shared by title/description/priority
    /// edits; prior state stays untouched on failure.
    fn patch_task_fields(&mut self, task_id: &str, patch: crate::model::TaskPatch) {
        match self.controller.update_task_fields(task_id, &patch) {
            Ok(detail) => {
                if let Some(view) = self.detail.as_mut() {
                    if view.task.id == detail.id {
                        view.task = detail;
                    }
                }
                self.set_status("Task updated!".to_string());
            }
            Err(e) => self.set_status(format!("Failed to update task: {e}")),
        }
    }

    fn handle_confirm_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                if let Some(action) = self.confirm.take() {
                    self.run_confirmed(action);
                }
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.confirm = None;
                self.set_status("Cancelled".to_string());
            }
            _ => {}
        }
    }

    fn run_confirmed(&mut self, action: ConfirmAction) {
        match action {
            ConfirmAction::DeleteTask { task_id, .. } => {
                let board_id = self.controller.board_id().to_string();
                match self.api.delete_task(&board_id, &task_id) {
                    Ok(()) => {
                        self.controller.record_deleted_task(&task_id);
                        self.clamp_selection();
                        self.set_status("Task deleted!".to_string());
                    }
                    Err(e) => self.set_status(format!("Failed to delete task: {e}")),
                }
            }
            ConfirmAction::DeleteColumn { column_id, .. } => {
                let (ws, board) = (
                    self.controller.workspace_id().to_string(),
                    self.controller.board_id().to_string(),
                );
                match self.api.delete_column(&ws, &board, &column_id) {
                    Ok(()) => {
                        self.controller.request_reload();
                        self.set_status("Column deleted".to_string());
                    }
                    // The last-column guard arrives here; show the
                    // server's own words.
                    Err(e) => self.set_status(e.to_string()),
                }
            }
        }
    }

    fn open_detail(&mut self, task_id: &str) {
        let board_id = self.controller.board_id().to_string();
        match self.api.task_detail(&board_id, task_id) {
            Ok(task) => {
                self.controller.merge_task_detail(&task);
                self.detail = Some(DetailView { task, selected: 0 });
            }
            Err(e) => self.set_status(format!("Failed to load task details: {e}")),
        }
    }

    fn refresh_detail(&mut self, task_id: &str) {
        let board_id = self.controller.board_id().to_string();
        match self.api.task_detail(&board_id, task_id) {
            Ok(task) => {
                self.controller.merge_task_detail(&task);
                if let Some(view) = self.detail.as_mut() {
                    if view.task.id == task.id {
                        let items = task.subtasks.len() + task.comments.len();
                        view.task = task;
                        if view.selected >= items && items > 0 {
                            view.selected = items - 1;
                        }
                    }
                }
            }
            Err(e) => self.set_status(format!("Failed to refresh task: {e}")),
        }
    }

    fn handle_detail_key(&mut self, code: KeyCode) {
        let Some(view) = self.detail.as_mut() else {
            return;
        };
        match code {
            KeyCode::Esc | KeyCode::Char('q') => {
                self.detail = None;
            }
            KeyCode::Up => {
                if view.selected > 0 {
                    view.selected -= 1;
                }
            }
            KeyCode::Down => {
                if view.selected + 1 < view.item_count() {
                    view.selected += 1;
                }
            }
            KeyCode::Char(' ') => {
                if view.selected < view.task.subtasks.len() {
                    let task_id = view.task.id.clone();
                    let subtask = &view.task.subtasks[view.selected];
                    let (subtask_id, done) = (subtask.id.clone(), subtask.is_completed);
                    match self.api.update_subtask(&task_id, &subtask_id, !done) {
                        Ok(()) => self.refresh_detail(&task_id),
                        Err(e) => self.set_status(format!("Failed to update subtask: {e}")),
                    }
                }
            }
            KeyCode::Char('a') => {
                let task_id = view.task.id.clone();
                self.modal = Some(Modal {
                    kind: ModalKind::NewSubtask { task_id },
                    input: InputField::new(),
                });
            }
            KeyCode::Char('c') => {
                let task_id = view.task.id.clone();
                self.modal = Some(Modal {
                    kind: ModalKind::NewComment { task_id },
                    input: InputField::new(),
                });
            }
            KeyCode::Char('t') => {
                let task_id = view.task.id.clone();
                let current = view.task.title.clone();
                self.modal = Some(Modal {
                    kind: ModalKind::EditTitle { task_id },
                    input: InputField::with_value(&current),
                });
            }
            KeyCode::Char('e') => {
                let task_id = view.task.id.clone();
                let current = view.task.description.clone().unwrap_or_default();
                self.modal = Some(Modal {
                    kind: ModalKind::EditDescription { task_id },
                    input: InputField::with_value(&current),
                });
            }
            KeyCode::Char('p') => {
                let task_id = view.task.id.clone();
                let next = view.task.priority.cycled();
                self.patch_task_fields(
                    &task_id,
                    crate::model::TaskPatch {
                        priority: Some(next),
                        ..Default::default()
                    },
                );
            }
            KeyCode::Char('d') | KeyCode::Char('x') => {
                let task_id = view.task.id.clone();
                let subtask_count = view.task.subtasks.len();
                let selected = view.selected;
                let result = if selected < subtask_count {
                    let id = view.task.subtasks[selected].id.clone();
                    self.api.delete_subtask(&task_id, &id)
                } else if selected - subtask_count < view.task.comments.len() {
                    let id = view.task.comments[selected - subtask_count].id.clone();
                    self.api.delete_comment(&task_id, &id)
                } else {
                    return;
                };
                match result {
                    Ok(()) => {
                        self.refresh_detail(&task_id);
                        self.set_status("Deleted".to_string());
                    }
                    Err(e) => self.set_status(format!("Failed to delete: {e}")),
                }
            }
            _ => {}
        }
    }

    // Rendering

    fn render(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(5),
                Constraint::Length(1),
            ])
            .split(f.area());

        self.render_title(f, chunks[0]);
        self.render_columns(f, chunks[1]);
        self.render_status(f, chunks[2]);

        if self.detail.is_some() {
            self.render_detail(f);
        }
        if self.modal.is_some() {
            self.render_modal(f);
        }
        if let Some(confirm) = &self.confirm {
            let prompt = confirm.prompt();
            render_prompt(f, &prompt);
        }
    }

    fn render_title(&self, f: &mut Frame, area: Rect) {
        let snapshot = self.controller.snapshot();
        let line = Line::from(vec![
            Span::styled(
                format!(" {} ", snapshot.name),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                snapshot.description.clone().unwrap_or_default(),
                Style::default().fg(Color::DarkGray),
            ),
        ]);
        f.render_widget(Paragraph::new(line), area);
    }

    fn render_status(&self, f: &mut Frame, area: Rect) {
        let text = if let Some(session) = &self.drag {
            if session.is_active() {
                match session.entity() {
                    DragEntity::Task(task) => {
                        format!("Dragging \"{}\" - release over a column or card", task.title)
                    }
                    DragEntity::Column(col) => {
                        format!("Dragging column \"{}\" - release over another column", col.name)
                    }
                }
            } else {
                self.status_message.clone()
            }
        } else {
            self.status_message.clone()
        };
        f.render_widget(
            Paragraph::new(Span::styled(text, Style::default().fg(Color::DarkGray))),
            area,
        );
    }

    fn render_columns(&mut self, f: &mut Frame, area: Rect) {
        self.areas.clear();
        let snapshot = self.controller.snapshot();
        let n = snapshot.columns.len();
        if n == 0 {
            f.render_widget(
                Paragraph::new("No columns yet - press N to create one"),
                area,
            );
            return;
        }
        self.scroll_offsets.resize(n, 0);

        let hover = self
            .drag
            .as_ref()
            .filter(|s| s.is_active())
            .and_then(|s| s.hover_column_id())
            .map(|s| s.to_string());
        let dragged_task_id = self.drag.as_ref().and_then(|s| match s.entity() {
            DragEntity::Task(t) if s.is_active() => Some(t.id.clone()),
            _ => None,
        });

        let constraints: Vec<Constraint> = (0..n).map(|_| Constraint::Ratio(1, n as u32)).collect();
        let slots = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(constraints)
            .split(area);

        // Collect render data first; recording hit areas needs &mut self.
        struct ColumnRender {
            id: String,
            title: Line<'static>,
            border: Style,
            cards: Vec<(String, Vec<Line<'static>>, bool)>,
            skipped: usize,
            total: usize,
        }

        let mut renders = Vec::with_capacity(n);
        for (i, col) in snapshot.columns.iter().enumerate() {
            let is_hover = hover.as_deref() == Some(col.id.as_str());
            let border = if is_hover {
                Style::default().fg(DROP_HIGHLIGHT).add_modifier(Modifier::BOLD)
            } else if i == self.selected_column {
                Style::default().fg(Color::White)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            let title = Line::from(vec![
                Span::styled("● ", Style::default().fg(column_color(&col.color))),
                Span::styled(
                    col.name.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format!(" ({})", col.tasks.len()),
                    Style::default().fg(Color::DarkGray),
                ),
            ]);

            let body_height = slots[i].height.saturating_sub(2);
            let visible = (body_height / CARD_HEIGHT).max(1) as usize;
            let mut offset = self.scroll_offsets[i];
            if i == self.selected_column && !col.tasks.is_empty() {
                let selected = self.selected_card.min(col.tasks.len() - 1);
                if selected < offset {
                    offset = selected;
                } else if selected >= offset + visible {
                    offset = selected + 1 - visible;
                }
            }
            offset = offset.min(col.tasks.len().saturating_sub(1));
            self.scroll_offsets[i] = offset;

            let mut cards = Vec::new();
            for (j, task) in col.tasks.iter().enumerate().skip(offset).take(visible) {
                let selected = i == self.selected_column && j == self.selected_card;
                let dragged = dragged_task_id.as_deref() == Some(task.id.as_str());
                let base = if dragged {
                    Style::default().fg(Color::DarkGray)
                } else if selected {
                    Style::default().add_modifier(Modifier::REVERSED)
                } else {
                    Style::default()
                };
                let counts = task
                    .counts
                    .as_ref()
                    .map(|c| format!(" [{}s {}c]", c.subtasks, c.comments))
                    .unwrap_or_default();
                let meta = Line::from(vec![
                    Span::styled(task.task_number.clone(), base.fg(Color::DarkGray)),
                    Span::raw(" "),
                    Span::styled(
                        format_priority(task.priority).to_string(),
                        base.fg(priority_color(task.priority)),
                    ),
                    Span::styled(counts, base.fg(Color::DarkGray)),
                ]);
                let title_line = Line::from(Span::styled(task.title.clone(), base));
                cards.push((task.id.clone(), vec![meta, title_line], dragged));
            }

            renders.push(ColumnRender {
                id: col.id.clone(),
                title,
                border,
                cards,
                skipped: offset,
                total: col.tasks.len(),
            });
        }

        for (i, render) in renders.into_iter().enumerate() {
            let slot = slots[i];
            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(render.border)
                .title(render.title);
            let inner = block.inner(slot);
            f.render_widget(block, slot);

            // Header row doubles as the column drag handle.
            self.areas.column_headers.push((
                render.id.clone(),
                Rect {
                    x: slot.x,
                    y: slot.y,
                    width: slot.width,
                    height: 1,
                },
            ));
            self.areas.column_bodies.push((render.id.clone(), inner));

            let mut y = inner.y;
            if render.skipped > 0 && inner.width > 0 {
                // One-cell hint that cards are scrolled off the top.
                f.render_widget(
                    Paragraph::new(Span::styled("▲", Style::default().fg(Color::DarkGray))),
                    Rect {
                        x: inner.x,
                        y: inner.y,
                        width: 1,
                        height: 1,
                    },
                );
            }
            let shown = render.cards.len();
            for (task_id, lines, _) in render.cards {
                if y + CARD_HEIGHT > inner.y + inner.height {
                    break;
                }
                let card_rect = Rect {
                    x: inner.x,
                    y,
                    width: inner.width,
                    height: CARD_HEIGHT,
                };
                f.render_widget(Paragraph::new(lines), card_rect);
                self.areas.cards.push((task_id, card_rect));
                y += CARD_HEIGHT;
            }
            if render.skipped + shown < render.total && inner.height > 0 && inner.width > 0 {
                f.render_widget(
                    Paragraph::new(Span::styled("▼", Style::default().fg(Color::DarkGray))),
                    Rect {
                        x: inner.x,
                        y: inner.y + inner.height - 1,
                        width: 1,
                        height: 1,
                    },
                );
            }
        }
    }

    fn render_detail(&self, f: &mut Frame) {
        let Some(view) = &self.detail else {
            return;
        };
        let task = &view.task;
        let area = centered_rect(70, 80, f.area());
        f.render_widget(Clear, area);

        let mut lines: Vec<Line> = Vec::new();
        lines.push(Line::from(vec![
            Span::styled(
                task.task_number.clone(),
                Style::default().fg(Color::DarkGray),
            ),
            Span::raw("  "),
            Span::styled(
                format_priority(task.priority).to_string(),
                Style::default()
                    .fg(priority_color(task.priority))
                    .add_modifier(Modifier::BOLD),
            ),
        ]));
        lines.push(Line::from(Span::styled(
            task.title.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::raw(""));
        lines.push(Line::from(Span::styled(
            task.description.clone().unwrap_or_else(|| "No description".to_string()),
            Style::default().fg(Color::Gray),
        )));
        lines.push(Line::raw(""));

        let done = task.subtasks.iter().filter(|s| s.is_completed).count();
        lines.push(Line::from(Span::styled(
            format!("Subtasks ({done}/{})", task.subtasks.len()),
            Style::default().add_modifier(Modifier::UNDERLINED),
        )));
        for (i, subtask) in task.subtasks.iter().enumerate() {
            let marker = if subtask.is_completed { "[x]" } else { "[ ]" };
            let style = if view.selected == i {
                Style::default().add_modifier(Modifier::REVERSED)
            } else if subtask.is_completed {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default()
            };
            lines.push(Line::from(Span::styled(
                format!("{marker} {}", subtask.title),
                style,
            )));
        }
        lines.push(Line::raw(""));
        lines.push(Line::from(Span::styled(
            format!("Comments ({})", task.comments.len()),
            Style::default().add_modifier(Modifier::UNDERLINED),
        )));
        for (i, comment) in task.comments.iter().enumerate() {
            let style = if view.selected == task.subtasks.len() + i {
                Style::default().add_modifier(Modifier::REVERSED)
            } else {
                Style::default()
            };
            let when = comment
                .created_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M");
            lines.push(Line::from(vec![
                Span::styled(
                    format!("{} ({when}): ", comment.user.full_name),
                    style.fg(Color::Cyan),
                ),
                Span::styled(comment.content.clone(), style),
            ]));
        }

        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Task detail - Space: toggle | a: subtask | c: comment | t/e: edit | p: priority | d: delete | Esc ");
        f.render_widget(
            Paragraph::new(lines).wrap(Wrap { trim: false }).block(block),
            area,
        );
    }

    fn render_modal(&self, f: &mut Frame) {
        let Some(modal) = &self.modal else {
            return;
        };
        let area = centered_rect(50, 20, f.area());
        let area = Rect {
            height: 3.min(area.height),
            ..area
        };
        f.render_widget(Clear, area);
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} (Enter to save, Esc to cancel) ", modal.title()));
        f.render_widget(
            Paragraph::new(modal.input.value.clone()).block(block),
            area,
        );
        let cursor_x = area.x + 1 + modal.input.value[..modal.input.cursor].chars().count() as u16;
        let max_x = (area.x + area.width).saturating_sub(2);
        f.set_cursor_position(Position::new(cursor_x.min(max_x), area.y + 1));
    }
}

/// Which entity the selection should follow after an intent applies.
fn followed_selection(intent: &DragIntent) -> Option<String> {
    match intent {
        DragIntent::ReorderTask { task_id, .. } | DragIntent::MoveTask { task_id, .. } => {
            Some(task_id.clone())
        }
        DragIntent::ReorderColumns { .. } => None,
    }
}

fn render_prompt(f: &mut Frame, prompt: &str) {
    let area = centered_rect(50, 20, f.area());
    let area = Rect {
        height: 3.min(area.height),
        ..area
    };
    f.render_widget(Clear, area);
    let block = Block::default().borders(Borders::ALL).title(" Confirm ");
    f.render_widget(Paragraph::new(prompt.to_string()).block(block), area);
}

/// Centered sub-rectangle, percent-sized on both axes.
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);
    horizontal[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_areas_prefer_cards_over_columns() {
        let mut areas = HitAreas::default();
        areas.column_bodies.push((
            "col".to_string(),
            Rect {
                x: 0,
                y: 1,
                width: 20,
                height: 20,
            },
        ));
        areas.cards.push((
            "task".to_string(),
            Rect {
                x: 1,
                y: 2,
                width: 18,
                height: 2,
            },
        ));
        assert_eq!(areas.target_at(2, 3).as_deref(), Some("task"));
        assert_eq!(areas.target_at(2, 10).as_deref(), Some("col"));
        assert_eq!(areas.target_at(50, 50), None);
        // Empty column body is a drop target but not a drag origin.
        assert_eq!(areas.drag_origin_at(2, 10), None);
        assert_eq!(areas.drag_origin_at(2, 3).as_deref(), Some("task"));
    }

    #[test]
    fn centered_rect_stays_inside_parent() {
        let parent = Rect {
            x: 0,
            y: 0,
            width: 100,
            height: 40,
        };
        let rect = centered_rect(70, 80, parent);
        assert!(rect.x >= parent.x && rect.y >= parent.y);
        assert!(rect.right() <= parent.right() && rect.bottom() <= parent.bottom());
    }
}
