use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Sender a worker offers while idle; the item is handed over through it
type Offer = mpsc::Sender<WorkItem>;

/// One unit of dispatchable work
pub struct WorkItem {
    label: String,
    future: BoxFuture<'static, ()>,
}

impl WorkItem {
    pub fn new<F>(label: impl Into<String>, future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            label: label.into(),
            future: future.boxed(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl std::fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkItem").field("label", &self.label).finish()
    }
}

/// A pool worker: its shutdown signal and task
pub struct WorkerHandle {
    id: usize,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn id(&self) -> usize {
        self.id
    }
}

/// Pool counters
#[derive(Debug, Default)]
struct Counters {
    busy: AtomicUsize,
    completed: AtomicU64,
    panicked: AtomicU64,
}

/// Snapshot of the pool counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatcherStats {
    pub pool_size: usize,
    pub busy: usize,
    pub completed: u64,
    pub panicked: u64,
    pub stopped: bool,
}

/// Fixed-size worker pool
pub struct Dispatcher {
    pool_size: usize,
    submit_tx: Mutex<Option<mpsc::UnboundedSender<WorkItem>>>,
    workers: Mutex<Vec<WorkerHandle>>,
    coordinator: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl Dispatcher {
    /// Spawn `pool_size` workers and the intake coordinator
    pub fn start(pool_size: usize) -> Self {
        let pool_size = pool_size.max(1);
        let (ready_tx, ready_rx) = mpsc::channel::<Offer>(pool_size);
        let (submit_tx, submit_rx) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters::default());

        let workers = (0..pool_size)
            .map(|id| spawn_worker(id, ready_tx.clone(), Arc::clone(&counters)))
            .collect();
        // Only workers hold ready senders, so the ready queue closes once they all exit
        drop(ready_tx);

        let coordinator = tokio::spawn(run_coordinator(submit_rx, ready_rx));

        tracing::info!(pool_size, "Dispatcher started");

        Self {
            pool_size,
            submit_tx: Mutex::new(Some(submit_tx)),
            workers: Mutex::new(workers),
            coordinator: Mutex::new(Some(coordinator)),
            counters,
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Queue a work item; never blocks
    pub fn submit(&self, item: WorkItem) -> Result<(), DispatchError> {
        let guard = self.submit_tx.lock();
        let tx = guard.as_ref().ok_or(DispatchError::Stopped)?;
        tx.send(item).map_err(|_| DispatchError::Stopped)
    }

    pub fn is_stopped(&self) -> bool {
        self.submit_tx.lock().is_none()
    }

    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            pool_size: self.pool_size,
            busy: self.counters.busy.load(Ordering::SeqCst),
            completed: self.counters.completed.load(Ordering::SeqCst),
            panicked: self.counters.panicked.load(Ordering::SeqCst),
            stopped: self.is_stopped(),
        }
    }

    /// Stop accepting work, signal every worker once and wait for them.
    ///
    /// Items already running finish first; queued items that no worker has
    /// claimed are dropped.
    pub async fn stop(&self) {
        let Some(submit_tx) = self.submit_tx.lock().take() else {
            return;
        };
        drop(submit_tx);

        let workers = std::mem::take(&mut *self.workers.lock());
        let mut tasks = Vec::with_capacity(workers.len());
        for worker in workers {
            // A worker that already exited has dropped its receiver
            let id = worker.id();
            let _ = worker.shutdown_tx.send(());
            tasks.push((id, worker.task));
        }

        for (id, task) in tasks {
            if let Err(e) = task.await {
                tracing::error!(worker = id, error = %e, "Worker task failed");
            }
        }

        let coordinator = self.coordinator.lock().take();
        if let Some(coordinator) = coordinator {
            let _ = coordinator.await;
        }

        tracing::info!(
            completed = self.counters.completed.load(Ordering::SeqCst),
            "Dispatcher stopped"
        );
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if let Some(coordinator) = self.coordinator.get_mut().take() {
            coordinator.abort();
        }
        for worker in self.workers.get_mut().drain(..) {
            worker.task.abort();
        }
    }
}

fn spawn_worker(
    id: usize,
    ready_tx: mpsc::Sender<Offer>,
    counters: Arc<Counters>,
) -> WorkerHandle {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(run_worker(id, ready_tx, shutdown_rx, counters));
    WorkerHandle {
        id,
        shutdown_tx,
        task,
    }
}

async fn run_worker(
    id: usize,
    ready_tx: mpsc::Sender<Offer>,
    mut shutdown_rx: oneshot::Receiver<()>,
    counters: Arc<Counters>,
) {
    let (work_tx, mut work_rx) = mpsc::channel::<WorkItem>(1);
    tracing::debug!(worker = id, "Worker started");

    loop {
        if ready_tx.send(work_tx.clone()).await.is_err() {
            break;
        }

        tokio::select! {
            biased;
            _ = &mut shutdown_rx => {
                // An item handed over just before the signal still runs
                work_rx.close();
                while let Ok(item) = work_rx.try_recv() {
                    execute(id, item, &counters).await;
                }
                break;
            }
            item = work_rx.recv() => match item {
                Some(item) => execute(id, item, &counters).await,
                None => break,
            },
        }
    }

    tracing::debug!(worker = id, "Worker stopped");
}

async fn execute(worker: usize, item: WorkItem, counters: &Counters) {
    counters.busy.fetch_add(1, Ordering::SeqCst);
    let WorkItem { label, future } = item;

    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(()) => {
            counters.completed.fetch_add(1, Ordering::SeqCst);
        }
        Err(panic) => {
            counters.panicked.fetch_add(1, Ordering::SeqCst);
            tracing::error!(
                worker,
                label = %label,
                panic = panic_message(panic.as_ref()),
                "Work item panicked"
            );
        }
    }

    counters.busy.fetch_sub(1, Ordering::SeqCst);
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

async fn run_coordinator(
    mut submit_rx: mpsc::UnboundedReceiver<WorkItem>,
    ready_rx: mpsc::Receiver<Offer>,
) {
    let ready_rx = Arc::new(tokio::sync::Mutex::new(ready_rx));

    while let Some(item) = submit_rx.recv().await {
        tokio::spawn(hand_off(item, Arc::clone(&ready_rx)));
    }

    tracing::debug!("Dispatcher intake closed");
}

/// Claim a ready worker and give it the item, skipping workers that exited
async fn hand_off(
    mut item: WorkItem,
    ready_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Offer>>>,
) {
    loop {
        let offer = ready_rx.lock().await.recv().await;
        let Some(offer) = offer else {
            tracing::warn!(label = %item.label(), "No worker left, dropping work item");
            return;
        };

        match offer.send(item).await {
            Ok(()) => return,
            Err(mpsc::error::SendError(returned)) => item = returned,
        }
    }
}

/// Dispatcher errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("Dispatcher is stopped")]
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_bound_and_completion() {
        let dispatcher = Dispatcher::start(3);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();

        for i in 0..10 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            let done_tx = done_tx.clone();
            dispatcher
                .submit(WorkItem::new(format!("item-{}", i), async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    let _ = done_tx.send(i);
                }))
                .unwrap();
        }

        let mut finished = Vec::new();
        for _ in 0..10 {
            finished.push(done_rx.recv().await.unwrap());
        }
        finished.sort();

        assert_eq!(finished, (0..10).collect::<Vec<_>>());
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 2);
        assert_eq!(dispatcher.stats().completed, 10);

        dispatcher.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_waits_for_in_flight() {
        let dispatcher = Dispatcher::start(2);
        let finished = Arc::new(AtomicBool::new(false));
        let (started_tx, started_rx) = oneshot::channel();

        let flag = Arc::clone(&finished);
        dispatcher
            .submit(WorkItem::new("slow", async move {
                let _ = started_tx.send(());
                tokio::time::sleep(Duration::from_secs(5)).await;
                flag.store(true, Ordering::SeqCst);
            }))
            .unwrap();

        started_rx.await.unwrap();
        dispatcher.stop().await;

        assert!(finished.load(Ordering::SeqCst));
        assert!(dispatcher.is_stopped());
        assert_eq!(
            dispatcher.submit(WorkItem::new("late", async {})),
            Err(DispatchError::Stopped)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_drops_queued_items() {
        let dispatcher = Dispatcher::start(1);
        let (started_tx, started_rx) = oneshot::channel();
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();

        let mut started_tx = Some(started_tx);
        for i in 0..4 {
            let started_tx = started_tx.take();
            let done_tx = done_tx.clone();
            let item = WorkItem::new(format!("item-{}", i), async move {
                if let Some(tx) = started_tx {
                    let _ = tx.send(());
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
                let _ = done_tx.send(i);
            });
            assert_eq!(item.label(), format!("item-{}", i));
            dispatcher.submit(item).unwrap();
        }
        drop(done_tx);

        started_rx.await.unwrap();
        dispatcher.stop().await;

        // the worker exits with its offer still queued; the pending handoff
        // fails on it, finds no other worker and drops the rest
        let mut finished = Vec::new();
        while let Some(i) = done_rx.recv().await {
            finished.push(i);
        }
        assert_eq!(finished, vec![0]);

        let stats = dispatcher.stats();
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.busy, 0);
        assert!(stats.stopped);
    }

    #[tokio::test]
    async fn test_panic_is_isolated() {
        let dispatcher = Dispatcher::start(1);
        let (done_tx, done_rx) = oneshot::channel();

        dispatcher
            .submit(WorkItem::new("boom", async { panic!("boom") }))
            .unwrap();
        while dispatcher.stats().panicked == 0 {
            tokio::task::yield_now().await;
        }

        dispatcher
            .submit(WorkItem::new("after", async move {
                let _ = done_tx.send(());
            }))
            .unwrap();

        done_rx.await.unwrap();
        let stats = dispatcher.stats();
        assert_eq!(stats.panicked, 1);
        assert_eq!(stats.completed, 1);

        dispatcher.stop().await;
    }

    #[tokio::test]
    async fn test_zero_pool_size_clamped() {
        let dispatcher = Dispatcher::start(0);
        assert_eq!(dispatcher.pool_size(), 1);

        let (tx, rx) = oneshot::channel();
        dispatcher
            .submit(WorkItem::new("one", async move {
                let _ = tx.send(42);
            }))
            .unwrap();
        assert_eq!(rx.await.unwrap(), 42);

        dispatcher.stop().await;
        // second stop is a no-op
        dispatcher.stop().await;
        assert_eq!(dispatcher.stats().pool_size, 1);
    }
}
