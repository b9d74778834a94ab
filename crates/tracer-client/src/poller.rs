use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracer_common::{Job, JobId};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::request::{path_segment, ApiClient, RequestOptions};

/// Where job status comes from.
#[async_trait]
pub trait JobSource: Send + Sync + 'static {
    async fn list_jobs(&self) -> Result<Vec<Job>, ClientError>;
    async fn get_job(&self, id: &JobId) -> Result<Job, ClientError>;
}

/// [`JobSource`] over the jobs endpoints.
#[derive(Debug, Clone)]
pub struct JobsApi {
    api: ApiClient,
    jobs_path: String,
}

impl JobsApi {
    pub fn new(api: ApiClient, config: &ClientConfig) -> Self {
        Self {
            api,
            jobs_path: config.jobs_path.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl JobSource for JobsApi {
    async fn list_jobs(&self) -> Result<Vec<Job>, ClientError> {
        self.api.get_json(&self.jobs_path, RequestOptions::new()).await
    }

    async fn get_job(&self, id: &JobId) -> Result<Job, ClientError> {
        let endpoint = format!("{}/{}", self.jobs_path, path_segment(id.as_str())?);
        self.api.get_json(&endpoint, RequestOptions::new()).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollScope {
    All,
    One(JobId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Polling,
    Stopped,
}

impl PollState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => PollState::Idle,
            1 => PollState::Polling,
            _ => PollState::Stopped,
        }
    }
}

/// What an observer sees after each completed fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollSnapshot {
    pub jobs: Vec<Job>,
    /// Set by a failed fetch, cleared by the next successful one.
    pub last_error: Option<String>,
    pub fetches: u64,
    pub fetched_at: Option<DateTime<Utc>>,
}

pub struct JobPoller;

impl JobPoller {
    /// Starts polling immediately: one fetch now, then one per `interval`.
    pub fn spawn(source: Arc<dyn JobSource>, scope: PollScope, interval: Duration) -> PollHandle {
        let cancel = CancellationToken::new();
        let (snapshot_tx, snapshot_rx) = watch::channel(PollSnapshot::default());
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let state = Arc::new(AtomicU8::new(PollState::Idle as u8));

        let task = tokio::spawn(poll_loop(
            source,
            scope,
            interval,
            cancel.clone(),
            notify_rx,
            snapshot_tx,
            state.clone(),
        ));

        PollHandle {
            cancel,
            notify: notify_tx,
            snapshots: snapshot_rx,
            state,
            task: Some(task),
        }
    }
}

/// Owned by whoever displays the jobs. Dropping it stops the poller.
pub struct PollHandle {
    cancel: CancellationToken,
    notify: mpsc::UnboundedSender<Option<JobId>>,
    snapshots: watch::Receiver<PollSnapshot>,
    state: Arc<AtomicU8>,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    /// Fetch now, out of band. The interval schedule keeps its phase.
    pub fn notify_new_job(&self, id: JobId) {
        self.wake(Some(id));
    }

    /// Manual refresh: an out-of-band fetch of the current scope.
    pub fn refresh_now(&self) {
        self.wake(None);
    }

    fn wake(&self, id: Option<JobId>) {
        if self.notify.send(id).is_err() {
            tracing::debug!("poller already stopped, notification dropped");
        }
    }

    pub fn snapshot(&self) -> PollSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollSnapshot> {
        self.snapshots.clone()
    }

    pub fn state(&self) -> PollState {
        PollState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Cancels the loop and waits for it to exit. A fetch in flight is
    /// abandoned and its result discarded.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error=%e, "poller task ended abnormally");
            }
        }
        self.state.store(PollState::Stopped as u8, Ordering::SeqCst);
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn poll_loop(
    source: Arc<dyn JobSource>,
    mut scope: PollScope,
    interval: Duration,
    cancel: CancellationToken,
    mut notify: mpsc::UnboundedReceiver<Option<JobId>>,
    snapshots: watch::Sender<PollSnapshot>,
    state: Arc<AtomicU8>,
) {
    state.store(PollState::Polling as u8, Ordering::SeqCst);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
            Some(wake) = notify.recv() => match wake {
                Some(id) => {
                    tracing::debug!(job_id=%id, "new job queued, refreshing");
                    if let PollScope::One(current) = &mut scope {
                        *current = id;
                    }
                }
                None => tracing::debug!("manual refresh"),
            },
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            outcome = fetch(source.as_ref(), &scope) => outcome,
        };

        let now = Utc::now();
        snapshots.send_modify(|snap| apply_fetch(snap, outcome, now));
    }

    state.store(PollState::Stopped as u8, Ordering::SeqCst);
    tracing::debug!("job poller stopped");
}

async fn fetch(source: &dyn JobSource, scope: &PollScope) -> Result<Vec<Job>, ClientError> {
    match scope {
        PollScope::All => source.list_jobs().await,
        PollScope::One(id) => source.get_job(id).await.map(|job| vec![job]),
    }
}

/// Folds one fetch outcome into the snapshot. A successful fetch replaces
/// the job list wholesale; a failed one leaves it in place.
fn apply_fetch(snap: &mut PollSnapshot, outcome: Result<Vec<Job>, ClientError>, now: DateTime<Utc>) {
    snap.fetches += 1;
    snap.fetched_at = Some(now);
    match outcome {
        Ok(jobs) => {
            snap.jobs = hold_terminal(&snap.jobs, jobs);
            snap.last_error = None;
        }
        Err(err) => {
            tracing::warn!(error=%err, "job status refresh failed");
            snap.last_error = Some(err.to_string());
        }
    }
}

/// A job seen complete or failed stays that way even if a later (stale)
/// read reports otherwise.
fn hold_terminal(previous: &[Job], mut next: Vec<Job>) -> Vec<Job> {
    for job in &mut next {
        let Some(prev) = previous.iter().find(|p| p.id == job.id) else {
            continue;
        };
        if !prev.status.allows_transition_to(job.status) {
            tracing::warn!(
                job_id=%job.id,
                seen=%prev.status,
                reported=%job.status,
                "ignoring status regression"
            );
            job.status = prev.status;
        }
    }
    next
}
