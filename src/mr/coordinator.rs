//! Task registry, assignment policy, lease timeouts, and the map→reduce
//! phase transition: a small distributed scheduler with
//! at-most-once-effective semantics in the presence of worker crashes,
//! built around one mutex.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::future::{ready, Ready};
use tarpc::context;

use crate::error::EngineError;
use crate::mr::naming;
use crate::mr::rpc::{
    Server, TaskAssignment, TaskKind, TaskState, TaskUpdateReply, TaskUpdateRequest,
};

/// How long a lease is valid for before the coordinator assumes the
/// assigned worker died or hung and resets the task to `Idle`.
const LEASE_TIMEOUT: Duration = Duration::from_secs(10);

/// How often the expiry daemon scans the task registry.
const LEASE_SCAN_INTERVAL: Duration = Duration::from_secs(1);

/// A single unit of work, coordinator-owned.
#[derive(Debug, Clone)]
pub struct Task {
    pub kind: TaskKind,
    pub number: usize,
    pub state: TaskState,
    /// Map: the single input file path. Reduce: the intermediate file
    /// paths feeding this bucket.
    pub inputs: Vec<String>,
    /// Populated on completion: map's non-empty-bucket intermediate
    /// files, or reduce's single final output file.
    pub outputs: Vec<String>,
    pub assigned_worker: String,
    pub assigned_at: Option<Instant>,
}

impl Task {
    fn new_map(number: usize, input: String) -> Self {
        Self {
            kind: TaskKind::Map,
            number,
            state: TaskState::Idle,
            inputs: vec![input],
            outputs: Vec::new(),
            assigned_worker: String::new(),
            assigned_at: None,
        }
    }

    fn new_reduce(number: usize, inputs: Vec<String>) -> Self {
        Self {
            kind: TaskKind::Reduce,
            number,
            state: TaskState::Idle,
            inputs,
            outputs: Vec::new(),
            assigned_worker: String::new(),
            assigned_at: None,
        }
    }

    fn is_expired(&self) -> bool {
        self.state == TaskState::InProgress
            && !self.assigned_worker.is_empty()
            && self
                .assigned_at
                .is_some_and(|at| at.elapsed() > LEASE_TIMEOUT)
    }
}

struct Registry {
    tasks: Vec<Task>,
    reduce_fanout: usize,
}

impl Registry {
    fn count(&self, kinds: &[TaskKind], states: &[TaskState]) -> usize {
        self.tasks
            .iter()
            .filter(|t| kinds.contains(&t.kind) && states.contains(&t.state))
            .count()
    }

    fn all_terminal(&self) -> bool {
        self.tasks
            .iter()
            .all(|t| matches!(t.state, TaskState::Completed | TaskState::Error))
    }

    fn done(&self) -> bool {
        let has_reduce = self.tasks.iter().any(|t| t.kind == TaskKind::Reduce);
        has_reduce && self.all_terminal()
    }
}

/// The coordinator's task registry, guarded by a single mutex. Every path
/// that touches task state — assignment, completion, expiry, reduce
/// synthesis — holds this lock for the whole logical operation.
#[derive(Clone)]
pub struct Coordinator {
    registry: Arc<Mutex<Registry>>,
}

impl Coordinator {
    /// Create a coordinator with one map task per input path and a reduce
    /// fanout of `reduce_fanout`.
    pub fn new(inputs: Vec<String>, reduce_fanout: usize) -> Self {
        assert!(reduce_fanout > 0, "reduce fanout must be positive");
        let tasks = inputs
            .into_iter()
            .enumerate()
            .map(|(number, input)| Task::new_map(number, input))
            .collect();
        Coordinator {
            registry: Arc::new(Mutex::new(Registry {
                tasks,
                reduce_fanout,
            })),
        }
    }

    /// True once every reduce task (and thus every map task before it) is
    /// terminal.
    pub fn done(&self) -> bool {
        self.registry.lock().unwrap().done()
    }

    /// A snapshot of the current tasks, for diagnostics and tests.
    pub fn tasks(&self) -> Vec<Task> {
        self.registry.lock().unwrap().tasks.clone()
    }

    /// Spawn the ~1Hz lease-expiry daemon. Returns the `tokio` task handle
    /// so callers can hold onto it for the process lifetime.
    pub fn spawn_lease_daemon(&self) -> tokio::task::JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(LEASE_SCAN_INTERVAL);
            loop {
                interval.tick().await;
                coordinator.expire_leases();
            }
        })
    }

    fn expire_leases(&self) {
        let mut registry = self.registry.lock().unwrap();
        for task in registry.tasks.iter_mut() {
            if task.is_expired() {
                tracing::warn!(
                    kind = ?task.kind,
                    number = task.number,
                    worker = %task.assigned_worker,
                    "lease expired, resetting task to idle"
                );
                task.state = TaskState::Idle;
                task.assigned_worker.clear();
                task.assigned_at = None;
            }
        }
    }

    fn classify_and_assign(&self, worker: String) -> TaskAssignment {
        let mut registry = self.registry.lock().unwrap();
        let reduce_fanout = registry.reduce_fanout;

        if let Some(task) = registry
            .tasks
            .iter_mut()
            .find(|t| t.state == TaskState::Idle)
        {
            task.state = TaskState::InProgress;
            task.assigned_worker = worker;
            task.assigned_at = Some(Instant::now());
            tracing::info!(kind = ?task.kind, number = task.number, worker = %task.assigned_worker, "assigned task");
            return TaskAssignment::Assigned {
                kind: task.kind,
                number: task.number,
                inputs: task.inputs.clone(),
                reduce_fanout,
            };
        }

        let reduce_exists = registry.tasks.iter().any(|t| t.kind == TaskKind::Reduce);
        if !reduce_exists {
            return TaskAssignment::WaitMaps;
        }

        if registry.count(&[TaskKind::Reduce], &[TaskState::InProgress]) > 0 {
            let maps_outstanding =
                registry.count(&[TaskKind::Map], &[TaskState::Idle, TaskState::InProgress]);
            if maps_outstanding != 0 {
                invariant_breach("map task outstanding while reduce tasks are in flight");
            }
            return TaskAssignment::WaitReduces;
        }

        if registry.all_terminal() {
            return TaskAssignment::AllDone;
        }

        tracing::error!(tasks = ?registry.tasks, "assignment classifier found no matching branch");
        TaskAssignment::Error
    }

    fn apply_update(&self, request: TaskUpdateRequest) -> TaskUpdateReply {
        let should_synthesize_reduce;
        let reply;
        {
            let mut registry = self.registry.lock().unwrap();

            let task_index = registry
                .tasks
                .iter()
                .position(|t| t.kind == request.kind && t.number == request.number)
                .unwrap_or_else(|| unknown_task(request.kind, request.number));

            let lease_matches = registry.tasks[task_index].assigned_worker == request.worker;
            if !lease_matches {
                tracing::debug!(
                    kind = ?request.kind,
                    number = request.number,
                    reporting_worker = %request.worker,
                    lease_holder = %registry.tasks[task_index].assigned_worker,
                    "ignoring task update from a worker that no longer holds the lease"
                );
                let task = &registry.tasks[task_index];
                return TaskUpdateReply {
                    state: task.state,
                    outputs: task.outputs.clone(),
                    all_done: false,
                };
            }

            if registry.tasks[task_index].state != TaskState::InProgress {
                invariant_breach("task update for a task that was not in progress");
            }

            registry.tasks[task_index].state = request.new_state;
            registry.tasks[task_index].outputs = request.outputs;

            let kind = registry.tasks[task_index].kind;
            should_synthesize_reduce = kind == TaskKind::Map
                && registry.count(&[TaskKind::Map], &[TaskState::Idle, TaskState::InProgress])
                    == 0;

            let all_done = kind == TaskKind::Reduce
                && registry.count(&[TaskKind::Reduce], &[TaskState::Idle, TaskState::InProgress])
                    == 0;

            let task = &registry.tasks[task_index];
            reply = TaskUpdateReply {
                state: task.state,
                outputs: task.outputs.clone(),
                all_done,
            };
        }

        if should_synthesize_reduce {
            self.synthesize_reduce_tasks();
        }

        reply
    }

    /// Executed exactly once, when the last map task becomes `Completed`.
    /// Groups every completed map task's intermediate files by the
    /// reduce-bucket number encoded in their base name and appends one
    /// `Idle` reduce task per distinct bucket observed.
    fn synthesize_reduce_tasks(&self) {
        let mut registry = self.registry.lock().unwrap();
        let reduce_fanout = registry.reduce_fanout;

        let mut by_bucket: Vec<Vec<String>> = vec![Vec::new(); reduce_fanout];
        for task in &registry.tasks {
            if task.kind != TaskKind::Map {
                continue;
            }
            if task.state != TaskState::Completed {
                invariant_breach("reduce synthesis ran with an incomplete map task");
            }
            for path in &task.outputs {
                let base_name = std::path::Path::new(path)
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or_default();
                let bucket = naming::parse_bucket_from_intermediate_name(base_name)
                    .unwrap_or_else(|e| invariant_breach(&e.to_string()));
                if bucket >= reduce_fanout {
                    invariant_breach(&format!(
                        "reduce bucket {bucket} out of range for fanout {reduce_fanout}"
                    ));
                }
                by_bucket[bucket].push(path.clone());
            }
        }

        for (bucket, inputs) in by_bucket.into_iter().enumerate() {
            if inputs.is_empty() {
                continue;
            }
            tracing::info!(bucket, files = inputs.len(), "synthesized reduce task");
            registry.tasks.push(Task::new_reduce(bucket, inputs));
        }
    }
}

/// The classifier's "no branch matched" case and any detected invariant
/// breach are coordinator-side assertion failures, not conditions exposed
/// to workers over RPC. Logs at `error` before panicking so the failure
/// is visible in the coordinator's own output.
fn invariant_breach(message: &str) -> ! {
    tracing::error!(%message, "coordinator invariant breach");
    panic!("coordinator invariant breach: {message}");
}

/// A completion report whose `(kind, number)` isn't in the registry is a
/// protocol violation (§7 "Unknown task on update"), distinct from the
/// generic invariant-breach cases above.
fn unknown_task(kind: TaskKind, number: usize) -> ! {
    let err = EngineError::UnknownTask { kind, number };
    tracing::error!(%err, "coordinator protocol violation");
    panic!("{err}");
}

impl Server for Coordinator {
    type TaskRequestFut = Ready<TaskAssignment>;
    type TaskUpdateFut = Ready<TaskUpdateReply>;

    fn task_request(self, _: context::Context, worker: String) -> Self::TaskRequestFut {
        ready(self.classify_and_assign(worker))
    }

    fn task_update(self, _: context::Context, request: TaskUpdateRequest) -> Self::TaskUpdateFut {
        ready(self.apply_update(request))
    }
}

/// Default rendezvous socket path, overridable via `MAPREDUCE_SOCKET` so
/// tests don't collide on a shared path.
pub fn default_socket_path() -> PathBuf {
    std::env::var_os("MAPREDUCE_SOCKET")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/var/tmp/mapreduce-master.sock"))
}

/// Bind the coordinator's RPC service at `socket_path`, removing any stale
/// socket left behind by a previous run, and serve it in the background
/// for the lifetime of the returned task.
pub async fn serve(
    coordinator: Coordinator,
    socket_path: &std::path::Path,
) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    use futures::StreamExt;
    use tarpc::server::incoming::Incoming;
    use tarpc::tokio_serde::formats::Json;

    let _ = std::fs::remove_file(socket_path);
    let listener = tarpc::serde_transport::unix::listen(socket_path, Json::default).await?;

    let handle = tokio::spawn(
        listener
            .filter_map(|r| async { r.ok() })
            .map(tarpc::server::BaseChannel::with_defaults)
            .execute(coordinator.serve()),
    );

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator(n_maps: usize, reduce_fanout: usize) -> Coordinator {
        let inputs = (0..n_maps).map(|i| format!("in-{i}.txt")).collect();
        Coordinator::new(inputs, reduce_fanout)
    }

    #[test]
    fn assigns_idle_tasks_in_registration_order() {
        let c = coordinator(2, 1);
        let first = c.classify_and_assign("w1".into());
        match first {
            TaskAssignment::Assigned { number, kind, .. } => {
                assert_eq!(number, 0);
                assert_eq!(kind, TaskKind::Map);
            }
            other => panic!("expected Assigned, got {other:?}"),
        }
        let second = c.classify_and_assign("w2".into());
        assert!(matches!(
            second,
            TaskAssignment::Assigned {
                number: 1,
                kind: TaskKind::Map,
                ..
            }
        ));
    }

    #[test]
    fn waits_for_maps_when_all_in_progress_and_no_reduces_yet() {
        let c = coordinator(1, 1);
        c.classify_and_assign("w1".into());
        assert!(matches!(
            c.classify_and_assign("w2".into()),
            TaskAssignment::WaitMaps
        ));
    }

    #[test]
    fn all_done_once_every_task_is_terminal() {
        let c = coordinator(1, 1);
        c.classify_and_assign("w1".into());
        c.apply_update(TaskUpdateRequest {
            kind: TaskKind::Map,
            number: 0,
            worker: "w1".into(),
            new_state: TaskState::Completed,
            outputs: vec!["/tmp/intermediate-M0-R0.json".into()],
        });
        c.classify_and_assign("w2".into());
        let reply = c.apply_update(TaskUpdateRequest {
            kind: TaskKind::Reduce,
            number: 0,
            worker: "w2".into(),
            new_state: TaskState::Completed,
            outputs: vec!["mapreduce-out-0-of-0".into()],
        });
        assert!(reply.all_done);
        assert!(c.done());
    }

    #[test]
    fn reduce_tasks_are_synthesized_only_after_every_map_completes() {
        let c = coordinator(2, 2);
        c.classify_and_assign("w1".into());
        c.classify_and_assign("w2".into());
        c.apply_update(TaskUpdateRequest {
            kind: TaskKind::Map,
            number: 0,
            worker: "w1".into(),
            new_state: TaskState::Completed,
            outputs: vec!["/tmp/intermediate-M0-R0.json".into()],
        });
        assert!(!c.tasks().iter().any(|t| t.kind == TaskKind::Reduce));

        c.apply_update(TaskUpdateRequest {
            kind: TaskKind::Map,
            number: 1,
            worker: "w2".into(),
            new_state: TaskState::Completed,
            outputs: vec![
                "/tmp/intermediate-M1-R0.json".into(),
                "/tmp/intermediate-M1-R1.json".into(),
            ],
        });
        let reduce_tasks: Vec<_> = c
            .tasks()
            .into_iter()
            .filter(|t| t.kind == TaskKind::Reduce)
            .collect();
        assert_eq!(reduce_tasks.len(), 2);
        let bucket0 = reduce_tasks.iter().find(|t| t.number == 0).unwrap();
        assert_eq!(bucket0.inputs.len(), 2);
    }

    #[test]
    fn empty_buckets_do_not_get_a_reduce_task() {
        let c = coordinator(1, 10);
        c.classify_and_assign("w1".into());
        c.apply_update(TaskUpdateRequest {
            kind: TaskKind::Map,
            number: 0,
            worker: "w1".into(),
            new_state: TaskState::Completed,
            outputs: vec!["/tmp/intermediate-M0-R3.json".into()],
        });
        let reduce_tasks: Vec<_> = c
            .tasks()
            .into_iter()
            .filter(|t| t.kind == TaskKind::Reduce)
            .collect();
        assert_eq!(reduce_tasks.len(), 1);
        assert_eq!(reduce_tasks[0].number, 3);
    }

    #[test]
    fn stale_lease_report_is_ignored() {
        let c = coordinator(1, 1);
        c.classify_and_assign("w1".into());
        c.expire_leases_for_test();
        c.classify_and_assign("w2".into());

        let reply = c.apply_update(TaskUpdateRequest {
            kind: TaskKind::Map,
            number: 0,
            worker: "w1".into(),
            new_state: TaskState::Completed,
            outputs: vec!["/tmp/intermediate-M0-R0.json".into()],
        });
        assert!(!reply.all_done);
        let task = c.tasks().into_iter().find(|t| t.number == 0).unwrap();
        assert_eq!(task.state, TaskState::InProgress);
        assert_eq!(task.assigned_worker, "w2");
    }

    #[test]
    fn expired_lease_resets_task_to_idle() {
        let c = coordinator(1, 1);
        c.classify_and_assign("w1".into());
        {
            let mut registry = c.registry.lock().unwrap();
            registry.tasks[0].assigned_at = Some(Instant::now() - Duration::from_secs(11));
        }
        c.expire_leases();
        let task = c.tasks().into_iter().next().unwrap();
        assert_eq!(task.state, TaskState::Idle);
        assert!(task.assigned_worker.is_empty());
        assert!(task.assigned_at.is_none());
    }

    #[test]
    #[should_panic(expected = "invariant breach")]
    fn out_of_range_bucket_is_an_invariant_breach() {
        let c = coordinator(1, 2);
        c.classify_and_assign("w1".into());
        c.apply_update(TaskUpdateRequest {
            kind: TaskKind::Map,
            number: 0,
            worker: "w1".into(),
            new_state: TaskState::Completed,
            outputs: vec!["/tmp/intermediate-M0-R9.json".into()],
        });
    }

    #[test]
    #[should_panic(expected = "task update for unknown task")]
    fn unknown_task_on_update_is_a_protocol_violation() {
        let c = coordinator(1, 1);
        c.apply_update(TaskUpdateRequest {
            kind: TaskKind::Reduce,
            number: 7,
            worker: "w1".into(),
            new_state: TaskState::Completed,
            outputs: vec![],
        });
    }

    impl Coordinator {
        /// Force every in-progress task back to idle, simulating what the
        /// lease daemon would eventually do, without waiting out the real
        /// 10s threshold.
        fn expire_leases_for_test(&self) {
            let mut registry = self.registry.lock().unwrap();
            for task in registry.tasks.iter_mut() {
                task.state = TaskState::Idle;
                task.assigned_worker.clear();
                task.assigned_at = None;
            }
        }
    }
}
