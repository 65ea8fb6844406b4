//! Optimistic synchronization between the board snapshot and the server.
//!
//! A resolved drag intent is applied to the snapshot synchronously, then
//! the matching remote call runs on a background worker thread. Every
//! background call is tagged with the snapshot version it was issued
//! against; outcomes for superseded versions are discarded so a stale
//! failure can never clobber newer client state. Failures that are still
//! current reconcile the same way for every intent: one full-board reload,
//! itself tagged with a generation counter so only the latest reload
//! response is ever installed.

use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;

use tracing::{debug, warn};

use crate::api::{ApiClient, ApiError};
use crate::drag::DragIntent;
use crate::model::{BoardDetail, Task, TaskDetail, TaskPatch};
use crate::snapshot::BoardSnapshot;

/// The remote calls the controller needs. `ApiClient` is the production
/// implementation; tests substitute a recording fake.
pub trait Transport: Send + Sync {
    fn fetch_board(&self, workspace_id: &str, board_id: &str) -> Result<BoardDetail, ApiError>;
    fn push_task_placement(
        &self,
        board_id: &str,
        task_id: &str,
        column_id: &str,
        position: i64,
    ) -> Result<(), ApiError>;
    fn push_column_order(
        &self,
        workspace_id: &str,
        board_id: &str,
        order: &[String],
    ) -> Result<(), ApiError>;
    fn push_task_fields(
        &self,
        board_id: &str,
        task_id: &str,
        patch: &TaskPatch,
    ) -> Result<(), ApiError>;
    fn fetch_task_detail(&self, board_id: &str, task_id: &str) -> Result<TaskDetail, ApiError>;
}

impl Transport for ApiClient {
    fn fetch_board(&self, workspace_id: &str, board_id: &str) -> Result<BoardDetail, ApiError> {
        self.board(workspace_id, board_id)
    }

    fn push_task_placement(
        &self,
        board_id: &str,
        task_id: &str,
        column_id: &str,
        position: i64,
    ) -> Result<(), ApiError> {
        let patch = TaskPatch {
            column_id: Some(column_id.to_string()),
            position: Some(position),
            ..TaskPatch::default()
        };
        self.update_task(board_id, task_id, &patch)
    }

    fn push_column_order(
        &self,
        workspace_id: &str,
        board_id: &str,
        order: &[String],
    ) -> Result<(), ApiError> {
        self.reorder_columns(workspace_id, board_id, order)
    }

    fn push_task_fields(
        &self,
        board_id: &str,
        task_id: &str,
        patch: &TaskPatch,
    ) -> Result<(), ApiError> {
        self.update_task(board_id, task_id, patch)
    }

    fn fetch_task_detail(&self, board_id: &str, task_id: &str) -> Result<TaskDetail, ApiError> {
        self.task_detail(board_id, task_id)
    }
}

/// A background call queued for the worker.
#[derive(Debug)]
pub enum SyncJob {
    TaskPlacement {
        version: u64,
        task_id: String,
        column_id: String,
        position: i64,
    },
    ColumnOrder {
        version: u64,
        order: Vec<String>,
    },
    Reload {
        generation: u64,
    },
}

/// A completed background call, tagged with what it was issued against.
#[derive(Debug)]
pub enum SyncOutcome {
    Push {
        version: u64,
        result: Result<(), ApiError>,
    },
    Reload {
        generation: u64,
        result: Result<BoardDetail, ApiError>,
    },
}

/// Something the view may want to report after a `pump`.
#[derive(Debug, PartialEq, Eq)]
pub enum SyncEvent {
    /// A fresh tree was installed after reconciliation.
    Reloaded,
    /// A background push failed; a reload has been requested.
    PushFailed(String),
    /// The reconciling reload itself failed.
    ReloadFailed(String),
}

/// Owns the snapshot and the worker channels for one open board.
pub struct SyncController<T: Transport + 'static> {
    transport: Arc<T>,
    workspace_id: String,
    board_id: String,
    snapshot: Option<BoardSnapshot>,
    job_tx: Sender<SyncJob>,
    outcome_rx: Receiver<SyncOutcome>,
    reload_generation: u64,
    hold_reloads: bool,
    parked_tree: Option<BoardDetail>,
}

impl<T: Transport + 'static> SyncController<T> {
    /// Create the controller and spawn its worker thread.
    pub fn spawn(transport: Arc<T>, workspace_id: &str, board_id: &str) -> SyncController<T> {
        let (job_tx, job_rx) = channel();
        let (outcome_tx, outcome_rx) = channel();
        {
            let transport = Arc::clone(&transport);
            let workspace_id = workspace_id.to_string();
            let board_id = board_id.to_string();
            thread::spawn(move || {
                worker_loop(transport, &workspace_id, &board_id, job_rx, outcome_tx);
            });
        }
        SyncController {
            transport,
            workspace_id: workspace_id.to_string(),
            board_id: board_id.to_string(),
            snapshot: None,
            job_tx,
            outcome_rx,
            reload_generation: 0,
            hold_reloads: false,
            parked_tree: None,
        }
    }

    /// Test constructor: no worker thread; the caller receives the job end
    /// of the queue and the outcome sender and plays the worker itself.
    #[cfg(test)]
    pub fn detached(
        transport: Arc<T>,
        workspace_id: &str,
        board_id: &str,
    ) -> (SyncController<T>, Receiver<SyncJob>, Sender<SyncOutcome>) {
        let (job_tx, job_rx) = channel();
        let (outcome_tx, outcome_rx) = channel();
        let controller = SyncController {
            transport,
            workspace_id: workspace_id.to_string(),
            board_id: board_id.to_string(),
            snapshot: None,
            job_tx,
            outcome_rx,
            reload_generation: 0,
            hold_reloads: false,
            parked_tree: None,
        };
        (controller, job_rx, outcome_tx)
    }

    /// Blocking initial load. The board view is unusable until this
    /// succeeds.
    pub fn load(&mut self) -> Result<(), ApiError> {
        let detail = self
            .transport
            .fetch_board(&self.workspace_id, &self.board_id)?;
        match &mut self.snapshot {
            Some(snapshot) => snapshot.replace(detail),
            None => self.snapshot = Some(BoardSnapshot::from_detail(detail)),
        }
        Ok(())
    }

    /// The current tree. Panics only if called before `load` succeeded,
    /// which the view never does.
    pub fn snapshot(&self) -> &BoardSnapshot {
        self.snapshot.as_ref().expect("board loaded before use")
    }

    fn snapshot_mut(&mut self) -> &mut BoardSnapshot {
        self.snapshot.as_mut().expect("board loaded before use")
    }

    /// While held (an active drag gesture), arriving reload trees are
    /// parked instead of installed, so the tree is never replaced
    /// mid-gesture.
    pub fn set_hold(&mut self, hold: bool) -> Option<SyncEvent> {
        self.hold_reloads = hold;
        if !hold {
            if let Some(tree) = self.parked_tree.take() {
                self.snapshot_mut().replace(tree);
                return Some(SyncEvent::Reloaded);
            }
        }
        None
    }

    /// Apply a drag intent optimistically and queue the matching remote
    /// update. Returns false when the snapshot refused the mutation (stale
    /// intent), in which case nothing is sent.
    pub fn apply(&mut self, intent: DragIntent) -> bool {
        match intent {
            DragIntent::ReorderTask {
                column_id,
                task_id,
                new_index,
            } => {
                if !self
                    .snapshot_mut()
                    .reorder_task_in_column(&column_id, &task_id, new_index)
                {
                    return false;
                }
                self.queue_task_placement(&task_id, &column_id);
                true
            }
            DragIntent::MoveTask {
                task_id,
                source_column_id,
                dest_column_id,
                new_index,
            } => {
                if !self.snapshot_mut().move_task_across_columns(
                    &task_id,
                    &source_column_id,
                    &dest_column_id,
                    new_index,
                ) {
                    return false;
                }
                self.queue_task_placement(&task_id, &dest_column_id);
                true
            }
            DragIntent::ReorderColumns { order } => {
                if !self.snapshot_mut().reorder_columns(&order) {
                    return false;
                }
                let version = self.snapshot().version();
                let order = self.snapshot().column_order();
                self.queue(SyncJob::ColumnOrder { version, order });
                true
            }
        }
    }

    fn queue_task_placement(&mut self, task_id: &str, column_id: &str) {
        // Position is the dense index the task landed on, not the stored
        // position field.
        let position = self
            .snapshot()
            .dense_positions(column_id)
            .iter()
            .find(|(id, _)| id == task_id)
            .map(|(_, p)| *p)
            .unwrap_or_default();
        let version = self.snapshot().version();
        self.queue(SyncJob::TaskPlacement {
            version,
            task_id: task_id.to_string(),
            column_id: column_id.to_string(),
            position,
        });
    }

    fn queue(&mut self, job: SyncJob) {
        debug!(?job, "queueing background sync");
        // A dead worker means the process is tearing down; dropping the
        // job is the fire-and-forget contract.
        let _ = self.job_tx.send(job);
    }

    /// Ask the worker for a fresh tree. Any earlier in-flight reload is
    /// superseded by bumping the generation.
    pub fn request_reload(&mut self) {
        self.reload_generation += 1;
        let generation = self.reload_generation;
        self.queue(SyncJob::Reload { generation });
    }

    /// Drain completed background work without blocking. Called once per
    /// UI tick.
    pub fn pump(&mut self) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        loop {
            let outcome = match self.outcome_rx.try_recv() {
                Ok(outcome) => outcome,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            };
            match outcome {
                SyncOutcome::Push { version, result } => match result {
                    Ok(()) => debug!(version, "background push confirmed"),
                    Err(err) => {
                        if version == self.snapshot().version() {
                            warn!(version, %err, "push failed, reloading board");
                            events.push(SyncEvent::PushFailed(err.to_string()));
                            self.request_reload();
                        } else {
                            // Superseded by a newer local mutation.
                            debug!(version, %err, "discarding stale push failure");
                        }
                    }
                },
                SyncOutcome::Reload { generation, result } => {
                    if generation != self.reload_generation {
                        debug!(generation, "discarding superseded reload");
                        continue;
                    }
                    match result {
                        Ok(tree) => {
                            if self.hold_reloads {
                                self.parked_tree = Some(tree);
                            } else {
                                self.snapshot_mut().replace(tree);
                                events.push(SyncEvent::Reloaded);
                            }
                        }
                        Err(err) => {
                            warn!(%err, "board reload failed");
                            events.push(SyncEvent::ReloadFailed(err.to_string()));
                        }
                    }
                }
            }
        }
        events
    }

    /// Remote-first field update: patch on the server, then re-fetch the
    /// task detail and merge it into the snapshot. On failure the prior
    /// state is left untouched and the error is returned to the caller.
    pub fn update_task_fields(
        &mut self,
        task_id: &str,
        patch: &TaskPatch,
    ) -> Result<TaskDetail, ApiError> {
        self.transport
            .push_task_fields(&self.board_id, task_id, patch)?;
        let detail = self.transport.fetch_task_detail(&self.board_id, task_id)?;
        self.snapshot_mut().apply_task_fields(&detail);
        Ok(detail)
    }

    /// Merge an externally fetched detail (subtask/comment mutations change
    /// the counts shown on the card).
    pub fn merge_task_detail(&mut self, detail: &TaskDetail) {
        self.snapshot_mut().apply_task_fields(detail);
    }

    /// Record a task created through the API into the snapshot.
    pub fn record_created_task(&mut self, task: Task) {
        self.snapshot_mut().insert_task(task);
    }

    /// Record a task deleted through the API.
    pub fn record_deleted_task(&mut self, task_id: &str) {
        self.snapshot_mut().remove_task(task_id);
    }

    pub fn board_id(&self) -> &str {
        &self.board_id
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }
}

/// Worker body: execute jobs in arrival order, report outcomes with their
/// tags. Calls may still complete out of order relative to user actions;
/// the controller's version checks handle that.
fn worker_loop<T: Transport>(
    transport: Arc<T>,
    workspace_id: &str,
    board_id: &str,
    job_rx: Receiver<SyncJob>,
    outcome_tx: Sender<SyncOutcome>,
) {
    while let Ok(job) = job_rx.recv() {
        let outcome = execute_job(transport.as_ref(), workspace_id, board_id, job);
        if outcome_tx.send(outcome).is_err() {
            // Controller gone; abandon remaining work.
            break;
        }
    }
}

fn execute_job<T: Transport + ?Sized>(
    transport: &T,
    workspace_id: &str,
    board_id: &str,
    job: SyncJob,
) -> SyncOutcome {
    match job {
        SyncJob::TaskPlacement {
            version,
            task_id,
            column_id,
            position,
        } => SyncOutcome::Push {
            version,
            result: transport.push_task_placement(board_id, &task_id, &column_id, position),
        },
        SyncJob::ColumnOrder { version, order } => SyncOutcome::Push {
            version,
            result: transport.push_column_order(workspace_id, board_id, &order),
        },
        SyncJob::Reload { generation } => SyncOutcome::Reload {
            generation,
            result: transport.fetch_board(workspace_id, board_id),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::Priority;
    use crate::model::{BoardDetail, WorkspaceRef};
    use crate::snapshot::fixtures;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeTransport {
        calls: Mutex<Vec<String>>,
        fail_pushes: bool,
    }

    impl FakeTransport {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn tree(&self) -> BoardDetail {
            BoardDetail {
                id: "b1".to_string(),
                name: "Launch".to_string(),
                description: None,
                workspace: WorkspaceRef {
                    id: "w1".to_string(),
                    name: "Acme".to_string(),
                },
                columns: vec![
                    fixtures::column("todo", "Todo", &["A", "B", "C"]),
                    fixtures::column("doing", "Doing", &[]),
                    fixtures::column("done", "Done", &[]),
                ],
            }
        }
    }

    impl Transport for FakeTransport {
        fn fetch_board(&self, _: &str, _: &str) -> Result<BoardDetail, ApiError> {
            self.record("fetch_board".to_string());
            Ok(self.tree())
        }

        fn push_task_placement(
            &self,
            _: &str,
            task_id: &str,
            column_id: &str,
            position: i64,
        ) -> Result<(), ApiError> {
            self.record(format!("place {task_id} {column_id} {position}"));
            if self.fail_pushes {
                return Err(ApiError::Api {
                    status: 500,
                    message: "boom".to_string(),
                });
            }
            Ok(())
        }

        fn push_column_order(&self, _: &str, _: &str, order: &[String]) -> Result<(), ApiError> {
            self.record(format!("order {}", order.join(",")));
            Ok(())
        }

        fn push_task_fields(
            &self,
            _: &str,
            task_id: &str,
            _: &TaskPatch,
        ) -> Result<(), ApiError> {
            self.record(format!("fields {task_id}"));
            Ok(())
        }

        fn fetch_task_detail(&self, _: &str, task_id: &str) -> Result<TaskDetail, ApiError> {
            self.record(format!("detail {task_id}"));
            Ok(TaskDetail {
                id: task_id.to_string(),
                title: "Renamed".to_string(),
                description: None,
                task_number: format!("TB-{task_id}"),
                priority: Priority::High,
                column_id: "todo".to_string(),
                subtasks: Vec::new(),
                comments: Vec::new(),
                counts: None,
            })
        }
    }

    fn loaded_controller(
        transport: Arc<FakeTransport>,
    ) -> (
        SyncController<FakeTransport>,
        Receiver<SyncJob>,
        Sender<SyncOutcome>,
    ) {
        let (mut controller, jobs, outcomes) = SyncController::detached(transport, "w1", "b1");
        controller.load().unwrap();
        (controller, jobs, outcomes)
    }

    #[test]
    fn applied_reorder_queues_version_tagged_placement() {
        let transport = Arc::new(FakeTransport::default());
        let (mut controller, jobs, _outcomes) = loaded_controller(transport);
        let applied = controller.apply(DragIntent::ReorderTask {
            column_id: "todo".to_string(),
            task_id: "B".to_string(),
            new_index: 0,
        });
        assert!(applied);
        match jobs.try_recv().unwrap() {
            SyncJob::TaskPlacement {
                version,
                task_id,
                column_id,
                position,
            } => {
                assert_eq!(version, controller.snapshot().version());
                assert_eq!(task_id, "B");
                assert_eq!(column_id, "todo");
                assert_eq!(position, 0);
            }
            other => panic!("unexpected job: {other:?}"),
        }
    }

    #[test]
    fn stale_intent_sends_nothing() {
        let transport = Arc::new(FakeTransport::default());
        let (mut controller, jobs, _outcomes) = loaded_controller(transport);
        let applied = controller.apply(DragIntent::ReorderTask {
            column_id: "doing".to_string(),
            task_id: "A".to_string(),
            new_index: 0,
        });
        assert!(!applied);
        assert!(jobs.try_recv().is_err());
    }

    #[test]
    fn move_sends_dense_destination_position() {
        let transport = Arc::new(FakeTransport::default());
        let (mut controller, jobs, _outcomes) = loaded_controller(transport);
        controller.apply(DragIntent::MoveTask {
            task_id: "A".to_string(),
            source_column_id: "todo".to_string(),
            dest_column_id: "doing".to_string(),
            new_index: 5,
        });
        match jobs.try_recv().unwrap() {
            SyncJob::TaskPlacement {
                column_id, position, ..
            } => {
                assert_eq!(column_id, "doing");
                // Clamped to the end of the empty destination list.
                assert_eq!(position, 0);
            }
            other => panic!("unexpected job: {other:?}"),
        }
    }

    #[test]
    fn column_reorder_queues_full_order() {
        let transport = Arc::new(FakeTransport::default());
        let (mut controller, jobs, _outcomes) = loaded_controller(transport);
        controller.apply(DragIntent::ReorderColumns {
            order: vec![
                "done".to_string(),
                "todo".to_string(),
                "doing".to_string(),
            ],
        });
        match jobs.try_recv().unwrap() {
            SyncJob::ColumnOrder { order, .. } => {
                assert_eq!(order, ["done", "todo", "doing"]);
            }
            other => panic!("unexpected job: {other:?}"),
        }
    }

    #[test]
    fn current_push_failure_triggers_one_reload() {
        let transport = Arc::new(FakeTransport::default());
        let (mut controller, jobs, outcomes) = loaded_controller(transport);
        controller.apply(DragIntent::ReorderTask {
            column_id: "todo".to_string(),
            task_id: "B".to_string(),
            new_index: 0,
        });
        let version = controller.snapshot().version();
        outcomes
            .send(SyncOutcome::Push {
                version,
                result: Err(ApiError::Api {
                    status: 500,
                    message: "boom".to_string(),
                }),
            })
            .unwrap();
        let events = controller.pump();
        assert!(events
            .iter()
            .any(|e| matches!(e, SyncEvent::PushFailed(m) if m == "boom")));
        // Exactly one reload requested, after the placement job.
        let _placement = jobs.try_recv().unwrap();
        assert!(matches!(jobs.try_recv().unwrap(), SyncJob::Reload { .. }));
        assert!(jobs.try_recv().is_err());
    }

    #[test]
    fn superseded_push_failure_is_discarded() {
        let transport = Arc::new(FakeTransport::default());
        let (mut controller, jobs, outcomes) = loaded_controller(transport);
        controller.apply(DragIntent::ReorderTask {
            column_id: "todo".to_string(),
            task_id: "B".to_string(),
            new_index: 0,
        });
        let stale_version = controller.snapshot().version();
        // A newer mutation supersedes the first push.
        controller.apply(DragIntent::ReorderTask {
            column_id: "todo".to_string(),
            task_id: "C".to_string(),
            new_index: 0,
        });
        outcomes
            .send(SyncOutcome::Push {
                version: stale_version,
                result: Err(ApiError::Api {
                    status: 500,
                    message: "late failure".to_string(),
                }),
            })
            .unwrap();
        let events = controller.pump();
        assert!(events.is_empty());
        // Two placements, no reload.
        let _ = jobs.try_recv().unwrap();
        let _ = jobs.try_recv().unwrap();
        assert!(jobs.try_recv().is_err());
    }

    #[test]
    fn stale_reload_response_is_discarded() {
        let transport = Arc::new(FakeTransport::default());
        let (mut controller, _jobs, outcomes) = loaded_controller(transport.clone());
        controller.request_reload();
        controller.request_reload();
        let version_before = controller.snapshot().version();
        outcomes
            .send(SyncOutcome::Reload {
                generation: 1,
                result: Ok(transport.tree()),
            })
            .unwrap();
        assert!(controller.pump().is_empty());
        assert_eq!(controller.snapshot().version(), version_before);
        outcomes
            .send(SyncOutcome::Reload {
                generation: 2,
                result: Ok(transport.tree()),
            })
            .unwrap();
        let events = controller.pump();
        assert_eq!(events, vec![SyncEvent::Reloaded]);
        assert!(controller.snapshot().version() > version_before);
    }

    #[test]
    fn held_reload_is_parked_until_release() {
        let transport = Arc::new(FakeTransport::default());
        let (mut controller, _jobs, outcomes) = loaded_controller(transport.clone());
        controller.apply(DragIntent::ReorderTask {
            column_id: "todo".to_string(),
            task_id: "B".to_string(),
            new_index: 0,
        });
        controller.set_hold(true);
        controller.request_reload();
        outcomes
            .send(SyncOutcome::Reload {
                generation: 1,
                result: Ok(transport.tree()),
            })
            .unwrap();
        assert!(controller.pump().is_empty());
        // Optimistic order still visible mid-gesture.
        assert_eq!(fixtures::task_ids(controller.snapshot(), "todo"), ["B", "A", "C"]);
        let event = controller.set_hold(false);
        assert_eq!(event, Some(SyncEvent::Reloaded));
        assert_eq!(fixtures::task_ids(controller.snapshot(), "todo"), ["A", "B", "C"]);
    }

    #[test]
    fn field_update_is_remote_first_then_merged() {
        let transport = Arc::new(FakeTransport::default());
        let (mut controller, _jobs, _outcomes) = loaded_controller(transport.clone());
        let patch = TaskPatch {
            priority: Some(Priority::High),
            ..TaskPatch::default()
        };
        let detail = controller.update_task_fields("B", &patch).unwrap();
        assert_eq!(detail.priority, Priority::High);
        assert_eq!(controller.snapshot().task("B").unwrap().priority, Priority::High);
        assert_eq!(
            transport.calls(),
            ["fetch_board", "fields B", "detail B"]
        );
    }

    #[test]
    fn execute_job_tags_outcomes() {
        let transport = FakeTransport {
            fail_pushes: true,
            ..FakeTransport::default()
        };
        let outcome = execute_job(
            &transport,
            "w1",
            "b1",
            SyncJob::TaskPlacement {
                version: 7,
                task_id: "A".to_string(),
                column_id: "todo".to_string(),
                position: 1,
            },
        );
        match outcome {
            SyncOutcome::Push { version, result } => {
                assert_eq!(version, 7);
                assert!(result.is_err());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
