//! Bounded-concurrency transfer queue.

use std::collections::{HashMap, VecDeque};
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Weak};

use chrono::Utc;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use fleetdesk_config::TransferConfig;
use fleetdesk_core::{ListenerSet, Subscription};
use fleetdesk_protocols::TransferError;

use crate::task::{Progress, TransferRequest, TransferStatus, TransferTask};

type Executor = Box<dyn FnOnce(TransferContext) -> BoxFuture<'static, Result<(), String>> + Send>;

struct Entry {
    task: TransferTask,
    executor: Option<Executor>,
}

#[derive(Default)]
struct QueueState {
    /// Enqueue order, for snapshots.
    order: Vec<String>,
    tasks: HashMap<String, Entry>,
    waiting: VecDeque<String>,
    active: usize,
}

impl QueueState {
    fn is_idle(&self) -> bool {
        self.active == 0 && self.waiting.is_empty()
    }

    fn remove(&mut self, id: &str) -> Option<Entry> {
        let entry = self.tasks.remove(id)?;
        self.order.retain(|existing| existing != id);
        Some(entry)
    }
}

struct QueueInner {
    concurrency: usize,
    state: Mutex<QueueState>,
    updates: ListenerSet<TransferTask>,
    idle: Notify,
}

/// Handed to each executor.
pub struct TransferContext {
    id: String,
    queue: Weak<QueueInner>,
}

impl TransferContext {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Record progress and notify observers. Ignored once the task has
    /// finished or the queue is gone.
    pub fn report_progress(&self, done: u64, total: Option<u64>) {
        if let Some(inner) = self.queue.upgrade() {
            inner.update_progress(&self.id, Progress { done, total });
        }
    }
}

/// FIFO transfer queue with a concurrency cap.
///
/// Cloning shares the queue. [`enqueue`](Self::enqueue) spawns executors and
/// must be called from within a tokio runtime.
#[derive(Clone)]
pub struct TransferQueue {
    inner: Arc<QueueInner>,
}

impl TransferQueue {
    /// A cap of zero is raised to one.
    pub fn new(concurrency: usize) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                concurrency: concurrency.max(1),
                state: Mutex::new(QueueState::default()),
                updates: ListenerSet::new(),
                idle: Notify::new(),
            }),
        }
    }

    pub fn from_config(config: &TransferConfig) -> Self {
        Self::new(config.concurrency)
    }

    /// Add a task. It starts immediately when a slot is free.
    ///
    /// An id that is Queued or Active is rejected with
    /// [`TransferError::DuplicateTask`]. A finished task with the same id is
    /// replaced.
    pub fn enqueue<F, Fut, E>(
        &self,
        request: TransferRequest,
        executor: F,
    ) -> Result<TransferTask, TransferError>
    where
        F: FnOnce(TransferContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Display,
    {
        let id = request.id.clone();
        let boxed: Executor = Box::new(
            move |ctx: TransferContext| -> BoxFuture<'static, Result<(), String>> {
                Box::pin(async move { executor(ctx).await.map_err(|e| e.to_string()) })
            },
        );

        let snapshot = {
            let mut state = self.inner.state.lock();
            if let Some(existing) = state.tasks.get(&id) {
                if !existing.task.status.is_terminal() {
                    return Err(TransferError::DuplicateTask(id));
                }
                state.remove(&id);
            }

            let task = TransferTask::queued(request);
            let snapshot = task.clone();
            state.order.push(id.clone());
            state.waiting.push_back(id.clone());
            state.tasks.insert(
                id.clone(),
                Entry {
                    task,
                    executor: Some(boxed),
                },
            );
            snapshot
        };

        debug!("Transfer {} queued", id);
        self.inner.publish(&snapshot);
        pump(&self.inner);
        Ok(self.get(&id).unwrap_or(snapshot))
    }

    pub fn get(&self, id: &str) -> Option<TransferTask> {
        self.inner
            .state
            .lock()
            .tasks
            .get(id)
            .map(|entry| entry.task.clone())
    }

    /// All tracked tasks in enqueue order.
    pub fn snapshot(&self) -> Vec<TransferTask> {
        let state = self.inner.state.lock();
        state
            .order
            .iter()
            .filter_map(|id| state.tasks.get(id).map(|entry| entry.task.clone()))
            .collect()
    }

    /// Acknowledge a finished task and stop tracking it.
    pub fn dismiss(&self, id: &str) -> Result<TransferTask, TransferError> {
        let mut state = self.inner.state.lock();
        let status = match state.tasks.get(id) {
            Some(entry) => entry.task.status,
            None => return Err(TransferError::NotFound(id.to_string())),
        };
        if !status.is_terminal() {
            return Err(TransferError::NotFinished(id.to_string()));
        }
        state
            .remove(id)
            .map(|entry| entry.task)
            .ok_or_else(|| TransferError::NotFound(id.to_string()))
    }

    /// Drop every Completed task. Failed tasks stay until dismissed.
    pub fn clear_completed(&self) -> usize {
        let mut state = self.inner.state.lock();
        let completed: Vec<String> = state
            .tasks
            .iter()
            .filter(|(_, entry)| entry.task.status == TransferStatus::Completed)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &completed {
            state.remove(id);
        }
        completed.len()
    }

    /// Register a listener for every status or progress change.
    pub fn on_update<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&TransferTask) + Send + Sync + 'static,
    {
        self.inner.updates.register(listener)
    }

    /// Resolve once nothing is Active or Queued.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    pub fn is_idle(&self) -> bool {
        self.inner.state.lock().is_idle()
    }

    pub fn active_count(&self) -> usize {
        self.inner.state.lock().active
    }

    pub fn queued_count(&self) -> usize {
        self.inner.state.lock().waiting.len()
    }

    pub fn concurrency(&self) -> usize {
        self.inner.concurrency
    }
}

impl QueueInner {
    fn publish(&self, task: &TransferTask) {
        let failed = self.updates.emit(task);
        if failed > 0 {
            warn!("{} transfer listener(s) panicked", failed);
        }
    }

    fn update_progress(&self, id: &str, progress: Progress) {
        let snapshot = {
            let mut state = self.state.lock();
            match state.tasks.get_mut(id) {
                Some(entry) if entry.task.status == TransferStatus::Active => {
                    entry.task.progress = progress;
                    entry.task.clone()
                }
                _ => return,
            }
        };
        self.publish(&snapshot);
    }

    fn finish(&self, id: &str, outcome: Result<(), String>) {
        let (snapshot, idle) = {
            let mut state = self.state.lock();
            state.active = state.active.saturating_sub(1);
            let idle = state.is_idle();
            let Some(entry) = state.tasks.get_mut(id) else {
                return;
            };
            entry.task.finished_at = Some(Utc::now());
            match outcome {
                Ok(()) => entry.task.status = TransferStatus::Completed,
                Err(reason) => {
                    entry.task.status = TransferStatus::Failed;
                    entry.task.error = Some(reason);
                }
            }
            (entry.task.clone(), idle)
        };

        match &snapshot.error {
            None => info!("Transfer {} completed", id),
            Some(reason) => error!("Transfer {} failed: {}", id, reason),
        }
        self.publish(&snapshot);
        if idle {
            self.idle.notify_waiters();
        }
    }
}

/// Promote waiting tasks while slots are free, oldest first.
fn pump(inner: &Arc<QueueInner>) {
    loop {
        let (snapshot, executor) = {
            let mut state = inner.state.lock();
            if state.active >= inner.concurrency {
                return;
            }
            let Some(id) = state.waiting.pop_front() else {
                return;
            };
            let Some(entry) = state.tasks.get_mut(&id) else {
                continue;
            };
            let Some(executor) = entry.executor.take() else {
                continue;
            };
            entry.task.status = TransferStatus::Active;
            entry.task.started_at = Some(Utc::now());
            let snapshot = entry.task.clone();
            state.active += 1;
            (snapshot, executor)
        };

        debug!("Transfer {} started", snapshot.id);
        let id = snapshot.id.clone();
        inner.publish(&snapshot);
        tokio::spawn(run(inner.clone(), id, executor));
    }
}

async fn run(inner: Arc<QueueInner>, id: String, executor: Executor) {
    let ctx = TransferContext {
        id: id.clone(),
        queue: Arc::downgrade(&inner),
    };

    // A panicking executor surfaces here as a JoinError.
    let outcome = match tokio::spawn(executor(ctx)).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err("executor panicked".to_string()),
        Err(_) => Err("executor cancelled".to_string()),
    };

    inner.finish(&id, outcome);
    pump(&inner);
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
