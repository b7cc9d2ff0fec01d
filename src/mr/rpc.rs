//! Task model and RPC contract shared between the coordinator and worker.
//!
//! Two request/reply pairs are the entire protocol: [`Server::task_request`]
//! (a worker asking for an assignment) and [`Server::task_update`] (a worker
//! reporting completion). Both are plain `tarpc` methods; the tagged
//! [`TaskAssignment`] enum is the one place the original bit-flag-integer
//! design is re-expressed as a proper sum type.

use serde::{Deserialize, Serialize};

/// A key/value pair of strings, the atomic unit exchanged between map and
/// reduce. Field names are capitalized to match the on-disk JSON contract.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pair {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value")]
    pub value: String,
}

impl Pair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// One of `{Map, Reduce}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    Map,
    Reduce,
}

/// `{Idle, InProgress, Completed, Error}`. Tasks begin `Idle`, move to
/// `InProgress` on assignment, to `Completed` on a successful report, or
/// back to `Idle` on lease expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Idle,
    InProgress,
    Completed,
    Error,
}

/// Reply to [`Server::task_request`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TaskAssignment {
    /// A lease has been granted; the worker must execute the task and
    /// report back with [`Server::task_update`].
    Assigned {
        kind: TaskKind,
        number: usize,
        inputs: Vec<String>,
        reduce_fanout: usize,
    },
    /// No idle task right now, but the map phase isn't over; back off and
    /// retry.
    WaitMaps,
    /// All maps are done, reduces are in flight but none are idle; back
    /// off and retry.
    WaitReduces,
    /// The job is complete; the worker should exit.
    AllDone,
    /// The coordinator's assignment classifier could not place the
    /// current state into any of the above branches. Kept for wire
    /// forward-compatibility; the reference coordinator never
    /// constructs this variant (see `DESIGN.md`) and instead treats the
    /// condition as a local assertion failure.
    Error,
}

/// Request payload for [`Server::task_update`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskUpdateRequest {
    pub kind: TaskKind,
    pub number: usize,
    pub worker: String,
    pub new_state: TaskState,
    pub outputs: Vec<String>,
}

/// Reply to [`Server::task_update`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskUpdateReply {
    pub state: TaskState,
    pub outputs: Vec<String>,
    /// Set when this was the last reduce task; the reporting worker
    /// should exit promptly rather than loop around for another
    /// `task_request`.
    pub all_done: bool,
}

/// The coordinator's RPC surface, served over a Unix-domain-socket
/// rendezvous point (see [`crate::mr::coordinator`]).
#[tarpc::service]
pub trait Server {
    /// A worker asks for an assignment, identifying itself by name.
    async fn task_request(worker: String) -> TaskAssignment;
    /// A worker reports the outcome of a previously assigned task.
    async fn task_update(request: TaskUpdateRequest) -> TaskUpdateReply;
}

/// `fnv1a_32(key) mod R` is the fixed, on-disk-contract hash that decides
/// which reduce bucket a key belongs to. Reducers never recompute it; the
/// naming discipline it drives (`intermediate-M{m}-R{r}.json`) is the only
/// thing that has to stay identical across runs.
pub fn fnv1a_32(key: &str) -> u32 {
    const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
    const FNV_PRIME: u32 = 0x0100_0193;

    let mut hash = FNV_OFFSET_BASIS;
    for byte in key.as_bytes() {
        hash ^= *byte as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// `bucket = fnv1a_32(key) mod reduce_fanout`.
pub fn bucket_for_key(key: &str, reduce_fanout: usize) -> usize {
    (fnv1a_32(key) as usize) % reduce_fanout
}
