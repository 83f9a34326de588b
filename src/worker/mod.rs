//! # Effect worker: the single authoritative async execution context.
//!
//! One dedicated OS thread owns a cooperative (current-thread tokio) event
//! loop. Every side effect triggered by the store — event delivery, async
//! handlers, polling loops — executes here; producers on arbitrary threads
//! (GUI thread, hardware callbacks) marshal work in over a channel instead
//! of touching shared internals.
//!
//! ## Architecture
//! ```text
//! any thread                         worker thread
//! ──────────                        ─────────────────────────────────────
//! handle.create_task(fut)  ──┐
//! handle.run_in_background ──┼──► command channel ──► loop {
//! handle.stop()            ──┘                          select! {
//!                                                         recv cmd → JoinSet::spawn
//!                                                         join_next → reap (log panics)
//!                                                       }
//!                                                     }
//!                                                     └─► drain: await all under
//!                                                         grace, then abort_all
//! ```
//!
//! ## Rules
//! - **Thread-safe submission**: `create_task` never blocks; it sends over
//!   an unbounded channel (the cross-thread scheduling bridge).
//! - **Containment**: a panicking task is reaped and logged with its task
//!   id (and creation backtrace when `debug_tasks` is on); the loop never
//!   dies with it.
//! - **Graceful shutdown**: `stop()` is idempotent; outstanding tasks get
//!   one bounded grace period to finish, then are aborted and the loop
//!   halts. Blocking work already handed to the OS pool keeps running
//!   detached (abandoned, not force-killed).
//! - **Cancellation**: cooperative; long-running tasks should observe
//!   [`WorkerHandle::cancellation_token`], which fires at shutdown.
//!
//! Exactly one worker is constructed per application, by its startup
//! routine; the cloneable [`WorkerHandle`] is what every component gets.

mod signals;

pub use signals::{bind_shutdown_signals, wait_for_shutdown_signal};

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::{panic_message, WorkerError};

/// Configuration for the effect worker.
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Maximum time the drain phase waits for outstanding tasks before
    /// aborting them. `stop()` therefore completes within roughly this
    /// bound regardless of what tasks do.
    pub grace: Duration,

    /// Capture a creation backtrace per task and log it if the task later
    /// panics. Costly; meant for development.
    pub debug_tasks: bool,
}

impl Default for WorkerConfig {
    /// Defaults: `grace = 1s`, `debug_tasks = false`.
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(1),
            debug_tasks: false,
        }
    }
}

enum Command {
    Spawn {
        fut: BoxFuture<'static, ()>,
        ack: Option<Box<dyn FnOnce(TaskHandle) + Send>>,
        origin: Option<Arc<str>>,
    },
    Stop,
}

/// Handle to one scheduled task, passed to `create_task_with_callback`'s
/// callback right after the task is scheduled (not after it completes).
pub struct TaskHandle {
    abort: tokio::task::AbortHandle,
}

impl TaskHandle {
    /// Runtime-unique id of the task.
    pub fn id(&self) -> tokio::task::Id {
        self.abort.id()
    }

    /// Requests cooperative cancellation: the task is cancelled at its next
    /// suspension point.
    pub fn cancel(&self) {
        self.abort.abort();
    }

    /// True once the task has completed or been cancelled.
    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

/// Cloneable, thread-safe handle to the worker loop.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::UnboundedSender<Command>,
    cancel: CancellationToken,
    stopping: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    debug_tasks: bool,
}

impl WorkerHandle {
    /// Schedules a future onto the worker loop. Safe to call from any
    /// thread; returns immediately.
    pub fn create_task<F>(&self, fut: F) -> Result<(), WorkerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.submit(Command::Spawn {
            fut: Box::pin(fut),
            ack: None,
            origin: self.origin(),
        })
    }

    /// Like [`create_task`](Self::create_task), additionally invoking
    /// `callback(task_handle)` **on the worker loop** right after the task
    /// is scheduled.
    pub fn create_task_with_callback<F, C>(&self, fut: F, callback: C) -> Result<(), WorkerError>
    where
        F: Future<Output = ()> + Send + 'static,
        C: FnOnce(TaskHandle) + Send + 'static,
    {
        self.submit(Command::Spawn {
            fut: Box::pin(fut),
            ack: Some(Box::new(callback)),
            origin: self.origin(),
        })
    }

    /// Runs a blocking function on the OS thread pool and bridges its
    /// result back as a [`BackgroundJob`] — a future resolved on the worker
    /// loop, or awaited synchronously off-loop via [`BackgroundJob::wait`].
    pub fn run_in_background<T, F>(&self, f: F) -> Result<BackgroundJob<T>, WorkerError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.create_task(async move {
            match tokio::task::spawn_blocking(f).await {
                Ok(value) => {
                    // Receiver may be gone; the job was fire-and-forget.
                    let _ = tx.send(value);
                }
                Err(err) => {
                    tracing::error!(error = %err, "background job panicked");
                }
            }
        })?;
        Ok(BackgroundJob { rx })
    }

    /// Requests a graceful shutdown. Idempotent; returns immediately.
    ///
    /// Tasks already submitted are still scheduled and drained under the
    /// configured grace period; new submissions are rejected with
    /// [`WorkerError::Stopped`].
    pub fn stop(&self) {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.tx.send(Command::Stop);
    }

    /// Token cancelled when shutdown begins; long-running tasks select on
    /// it to exit promptly.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// True once the loop has fully halted.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    fn submit(&self, cmd: Command) -> Result<(), WorkerError> {
        if self.stopping.load(Ordering::SeqCst) {
            return Err(WorkerError::Stopped);
        }
        self.tx.send(cmd).map_err(|_| WorkerError::Stopped)
    }

    fn origin(&self) -> Option<Arc<str>> {
        if self.debug_tasks {
            Some(std::backtrace::Backtrace::force_capture().to_string().into())
        } else {
            None
        }
    }
}

/// Result bridge for [`WorkerHandle::run_in_background`].
pub struct BackgroundJob<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> BackgroundJob<T> {
    /// Blocks the calling thread until the result arrives.
    ///
    /// Must not be called from the worker loop itself — await the job
    /// there instead.
    pub fn wait(self) -> Result<T, WorkerError> {
        self.rx.blocking_recv().map_err(|_| WorkerError::Background {
            reason: "result channel closed",
        })
    }
}

impl<T> Future for BackgroundJob<T> {
    type Output = Result<T, WorkerError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx).poll(cx).map(|result| {
            result.map_err(|_| WorkerError::Background {
                reason: "result channel closed",
            })
        })
    }
}

/// The effect worker: owns the dedicated thread and its event loop.
pub struct Worker {
    handle: WorkerHandle,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl Worker {
    /// Builds the runtime and starts the worker thread.
    pub fn start(config: WorkerConfig) -> std::io::Result<Worker> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let finished = Arc::new(AtomicBool::new(false));

        let handle = WorkerHandle {
            tx,
            cancel: cancel.clone(),
            stopping: Arc::new(AtomicBool::new(false)),
            finished: finished.clone(),
            debug_tasks: config.debug_tasks,
        };

        let grace = config.grace;
        let thread = std::thread::Builder::new()
            .name("statevisor-worker".into())
            .spawn(move || {
                tracing::debug!("worker loop starting");
                runtime.block_on(run_loop(rx, cancel, grace));
                finished.store(true, Ordering::SeqCst);
                tracing::debug!("worker loop halted");
            })?;

        Ok(Worker {
            handle,
            thread: Some(thread),
        })
    }

    /// A cloneable handle for components that schedule work.
    pub fn handle(&self) -> WorkerHandle {
        self.handle.clone()
    }

    /// Delegates to [`WorkerHandle::stop`].
    pub fn stop(&self) {
        self.handle.stop();
    }

    /// Blocks until the loop has halted and the thread exited.
    ///
    /// Call [`stop`](Self::stop) first (directly or via `FinishAction`),
    /// otherwise this waits forever.
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("worker thread terminated by panic");
            }
        }
    }
}

async fn run_loop(
    mut rx: mpsc::UnboundedReceiver<Command>,
    cancel: CancellationToken,
    grace: Duration,
) {
    let mut tasks = JoinSet::new();
    let mut origins: HashMap<tokio::task::Id, Arc<str>> = HashMap::new();

    loop {
        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(Command::Spawn { fut, ack, origin }) => {
                    spawn_tracked(&mut tasks, &mut origins, fut, ack, origin);
                }
                Some(Command::Stop) | None => break,
            },
            Some(result) = tasks.join_next_with_id(), if !tasks.is_empty() => {
                reap(result, &mut origins);
            }
        }
    }

    // Tasks submitted before the stop request are still honored.
    rx.close();
    while let Ok(cmd) = rx.try_recv() {
        if let Command::Spawn { fut, ack, origin } = cmd {
            spawn_tracked(&mut tasks, &mut origins, fut, ack, origin);
        }
    }

    cancel.cancel();

    let drained = tokio::time::timeout(grace, async {
        while let Some(result) = tasks.join_next_with_id().await {
            reap(result, &mut origins);
        }
    })
    .await;

    if drained.is_err() {
        tracing::warn!(
            outstanding = tasks.len(),
            ?grace,
            "grace period exceeded; aborting outstanding tasks"
        );
        tasks.abort_all();
        while let Some(result) = tasks.join_next_with_id().await {
            reap(result, &mut origins);
        }
    }
}

fn spawn_tracked(
    tasks: &mut JoinSet<()>,
    origins: &mut HashMap<tokio::task::Id, Arc<str>>,
    fut: BoxFuture<'static, ()>,
    ack: Option<Box<dyn FnOnce(TaskHandle) + Send>>,
    origin: Option<Arc<str>>,
) {
    let abort = tasks.spawn(fut);
    if let Some(origin) = origin {
        origins.insert(abort.id(), origin);
    }
    if let Some(ack) = ack {
        ack(TaskHandle { abort });
    }
}

/// Loop-level exception handler: log, never crash the loop.
fn reap(
    result: Result<(tokio::task::Id, ()), tokio::task::JoinError>,
    origins: &mut HashMap<tokio::task::Id, Arc<str>>,
) {
    match result {
        Ok((id, ())) => {
            origins.remove(&id);
        }
        Err(err) => {
            let id = err.id();
            let origin = origins.remove(&id);
            if err.is_panic() {
                let payload = err.into_panic();
                tracing::error!(
                    task = %id,
                    origin = origin.as_deref().unwrap_or("<unknown>"),
                    payload = %panic_message(payload.as_ref()),
                    "task panicked"
                );
            } else {
                tracing::debug!(task = %id, "task cancelled");
            }
        }
    }
}
