//! [`QueueEngine`]: priority scheduling and the single background worker
//! that drives the SD engine (§4.4).

use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use sdforge_gateway::SdGateway;
use sdforge_types::{JobId, JobState, Priority, SdForgeError};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

use crate::pipeline::{JobPipeline, NoopPipeline};
use crate::types::{GenerationRequest, JobResult, JobSnapshot, QueueKey};

/// How often the worker polls `/sdapi/v1/progress` while a job runs.
const PROGRESS_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How many terminal jobs `history` retains (§4.4 retention cap).
const DEFAULT_HISTORY_CAP: usize = 200;

struct State {
    heap: BinaryHeap<std::cmp::Reverse<QueueKey>>,
    jobs: HashMap<JobId, JobSnapshot>,
    requests: HashMap<JobId, GenerationRequest>,
    running: Option<JobId>,
    cancel_requested: HashSet<JobId>,
    history: VecDeque<JobId>,
    history_cap: usize,
}

impl State {
    fn new(history_cap: usize) -> Self {
        Self {
            heap: BinaryHeap::new(),
            jobs: HashMap::new(),
            requests: HashMap::new(),
            running: None,
            cancel_requested: HashSet::new(),
            history: VecDeque::new(),
            history_cap,
        }
    }

    fn push_history(&mut self, id: JobId) {
        self.history.push_front(id);
        while self.history.len() > self.history_cap {
            self.history.pop_back();
        }
    }
}

/// Priority queue plus single-worker pipeline over the SD engine (§4.4).
pub struct QueueEngine {
    state: Arc<Mutex<State>>,
    notify: Arc<Notify>,
    gateway: Arc<SdGateway>,
    worker: JoinHandle<()>,
}

impl QueueEngine {
    /// Start the engine, spawning its background worker.
    pub fn new(gateway: Arc<SdGateway>, pipeline: Arc<dyn JobPipeline>) -> Self {
        Self::with_history_cap(gateway, pipeline, DEFAULT_HISTORY_CAP)
    }

    /// As [`QueueEngine::new`], with an explicit history retention cap.
    pub fn with_history_cap(
        gateway: Arc<SdGateway>,
        pipeline: Arc<dyn JobPipeline>,
        history_cap: usize,
    ) -> Self {
        let state = Arc::new(Mutex::new(State::new(history_cap)));
        let notify = Arc::new(Notify::new());
        let worker = tokio::spawn(worker_loop(
            Arc::clone(&state),
            Arc::clone(&notify),
            Arc::clone(&gateway),
            pipeline,
        ));
        Self { state, notify, gateway, worker }
    }

    /// Start the engine with no censoring or upload routing configured.
    pub fn with_noop_pipeline(gateway: Arc<SdGateway>) -> Self {
        Self::new(gateway, Arc::new(NoopPipeline))
    }

    /// Enqueue a generation request (§4.4 `enqueue`).
    pub async fn enqueue(&self, request: GenerationRequest, priority: Priority) -> JobId {
        let id = JobId::new(uuid::Uuid::new_v4().to_string());
        let created_at = chrono::Utc::now();
        let mut state = self.state.lock().await;
        state.jobs.insert(id.clone(), JobSnapshot::new(id.clone(), priority, created_at));
        state.requests.insert(id.clone(), request);
        state.heap.push(std::cmp::Reverse(QueueKey { priority, created_at, id: id.clone() }));
        drop(state);
        self.notify.notify_one();
        id
    }

    /// Fetch a point-in-time snapshot (§4.4 `get`).
    pub async fn get(&self, job_id: &JobId) -> Option<JobSnapshot> {
        self.state.lock().await.jobs.get(job_id).cloned()
    }

    /// Cancel a job (§4.4, §5 cancellation semantics).
    pub async fn cancel(&self, job_id: &JobId) -> Result<(), SdForgeError> {
        let mut state = self.state.lock().await;
        let Some(snapshot) = state.jobs.get(job_id).cloned() else {
            return Err(SdForgeError::NotFound(format!("job not found: {job_id}")));
        };
        if snapshot.state.is_terminal() {
            return Ok(());
        }
        if state.running.as_ref() == Some(job_id) {
            state.cancel_requested.insert(job_id.clone());
            drop(state);
            // The in-flight txt2img call resolves (with or without error)
            // once interrupted; run_job checks cancel_requested and
            // discards whatever came back.
            let _ = self.gateway.interrupt().await;
            Ok(())
        } else {
            state.heap.retain(|std::cmp::Reverse(key)| &key.id != job_id);
            state.requests.remove(job_id);
            if let Some(job) = state.jobs.get_mut(job_id) {
                job.state = JobState::Cancelled;
            }
            state.push_history(job_id.clone());
            Ok(())
        }
    }

    /// List jobs, optionally filtered by state (§4.4 `list`).
    pub async fn list(&self, status_filter: Option<JobState>) -> Vec<JobSnapshot> {
        let state = self.state.lock().await;
        let mut jobs: Vec<JobSnapshot> = state
            .jobs
            .values()
            .filter(|j| status_filter.map(|f| j.state == f).unwrap_or(true))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        jobs
    }

    /// Terminal jobs, most recently completed first (§4.4 `history`).
    pub async fn history(&self, limit: usize) -> Vec<JobSnapshot> {
        let state = self.state.lock().await;
        state
            .history
            .iter()
            .take(limit)
            .filter_map(|id| state.jobs.get(id).cloned())
            .collect()
    }

    /// Stop the background worker. Any job currently running is left in
    /// whatever state it was in; new enqueues are still accepted but will
    /// never run.
    pub fn shutdown(&self) {
        self.worker.abort();
    }
}

impl Drop for QueueEngine {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn worker_loop(
    state: Arc<Mutex<State>>,
    notify: Arc<Notify>,
    gateway: Arc<SdGateway>,
    pipeline: Arc<dyn JobPipeline>,
) {
    loop {
        let next = {
            let mut guard = state.lock().await;
            guard.heap.pop()
        };
        let Some(std::cmp::Reverse(key)) = next else {
            notify.notified().await;
            continue;
        };

        let request = {
            let mut guard = state.lock().await;
            let Some(request) = guard.requests.remove(&key.id) else {
                continue;
            };
            guard.running = Some(key.id.clone());
            if let Some(job) = guard.jobs.get_mut(&key.id) {
                job.state = JobState::Running;
            }
            request
        };

        let gateway = Arc::clone(&gateway);
        let pipeline = Arc::clone(&pipeline);
        let job_id = key.id.clone();
        let state_for_job = Arc::clone(&state);
        let handle = tokio::spawn(async move {
            run_job(state_for_job, gateway, pipeline, job_id, request).await;
        });

        if let Err(panic) = handle.await {
            tracing::error!(job_id = %key.id, error = %panic, "queue worker panicked running a job");
            let mut guard = state.lock().await;
            if let Some(job) = guard.jobs.get_mut(&key.id) {
                job.state = JobState::Failed;
                job.error = Some(format!("worker panicked: {panic}"));
            }
            guard.running = None;
            guard.cancel_requested.remove(&key.id);
            guard.push_history(key.id.clone());
        }
    }
}

async fn run_job(
    state: Arc<Mutex<State>>,
    gateway: Arc<SdGateway>,
    pipeline: Arc<dyn JobPipeline>,
    job_id: JobId,
    request: GenerationRequest,
) {
    let gen_future = gateway.txt2img(&request.txt2img);
    tokio::pin!(gen_future);
    let mut ticker = tokio::time::interval(PROGRESS_POLL_INTERVAL);
    ticker.tick().await; // first tick fires immediately

    let outcome = loop {
        tokio::select! {
            result = &mut gen_future => break result,
            _ = ticker.tick() => {
                if let Ok(snapshot) = gateway.poll_progress().await {
                    let mut guard = state.lock().await;
                    if let Some(job) = guard.jobs.get_mut(&job_id) {
                        job.progress = job.progress.max(snapshot.progress.clamp(0.0, 1.0));
                    }
                }
            }
        }
    };

    let mut guard = state.lock().await;
    let was_cancelled = guard.cancel_requested.remove(&job_id);
    guard.running = None;

    if was_cancelled {
        if let Some(job) = guard.jobs.get_mut(&job_id) {
            job.state = JobState::Cancelled;
            job.progress = 1.0;
        }
        guard.push_history(job_id.clone());
        return;
    }
    drop(guard);

    match outcome {
        Ok(response) => {
            match pipeline.process(response.images, request.user_id.as_deref()).await {
                Ok(pipeline_outcome) => {
                    let mut guard = state.lock().await;
                    if guard.cancel_requested.remove(&job_id) {
                        if let Some(job) = guard.jobs.get_mut(&job_id) {
                            job.state = JobState::Cancelled;
                        }
                    } else if let Some(job) = guard.jobs.get_mut(&job_id) {
                        job.state = JobState::Completed;
                        job.progress = 1.0;
                        job.result = Some(JobResult {
                            info: response.info,
                            pipeline: pipeline_outcome,
                        });
                    }
                    guard.push_history(job_id.clone());
                }
                Err(err) => {
                    let mut guard = state.lock().await;
                    if let Some(job) = guard.jobs.get_mut(&job_id) {
                        job.state = JobState::Failed;
                        job.error = Some(err.to_string());
                    }
                    guard.push_history(job_id.clone());
                }
            }
        }
        Err(err) => {
            tracing::warn!(job_id = %job_id, error = %err, "generation failed");
            let mut guard = state.lock().await;
            if let Some(job) = guard.jobs.get_mut(&job_id) {
                job.state = JobState::Failed;
                job.error = Some(err.to_string());
            }
            guard.push_history(job_id.clone());
        }
    }
}
