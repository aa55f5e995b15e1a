//! Job and snapshot types (§4.4).

use sdforge_gateway::Txt2ImgRequest;
use sdforge_types::{JobId, JobState, Priority};

use crate::pipeline::PipelineOutcome;

/// A request to generate, as handed to `enqueue` (§4.4).
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// The wire request sent to the SD engine once the job runs.
    pub txt2img: Txt2ImgRequest,
    /// Optional path the caller wants the result written to, informational.
    pub output_path: Option<String>,
    /// The user who requested the job, for upload routing downstream.
    pub user_id: Option<String>,
}

/// The outcome of a completed job.
#[derive(Debug, Clone)]
pub struct JobResult {
    /// Engine-reported generation info, opaque JSON.
    pub info: serde_json::Value,
    /// Post-censor images plus where (if anywhere) they ended up.
    pub pipeline: PipelineOutcome,
}

/// A point-in-time view of a job (§4.4 `get`).
#[derive(Debug, Clone)]
pub struct JobSnapshot {
    /// Stable job identifier.
    pub id: JobId,
    /// Scheduling priority (lower runs first).
    pub priority: Priority,
    /// Monotonic creation instant tag, used only for FIFO tie-break.
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Current lifecycle state.
    pub state: JobState,
    /// Progress in `[0, 1]`, monotonically non-decreasing until terminal.
    pub progress: f64,
    /// Populated once `state` is `Completed`.
    pub result: Option<JobResult>,
    /// Populated once `state` is `Failed`.
    pub error: Option<String>,
}

impl JobSnapshot {
    pub(crate) fn new(id: JobId, priority: Priority, created_at: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            id,
            priority,
            created_at,
            state: JobState::Queued,
            progress: 0.0,
            result: None,
            error: None,
        }
    }
}

/// An internal heap entry; orders by `(priority, created_at)` ascending,
/// so `BinaryHeap<Reverse<QueueKey>>` pops the highest-priority, oldest
/// job first (§4.4 scheduling).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct QueueKey {
    pub priority: Priority,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub id: JobId,
}

impl Ord for QueueKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.created_at.cmp(&other.created_at))
    }
}

impl PartialOrd for QueueKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
