//! Dispatcher — routes a channel's inbound stream to per-user workers.
//!
//! Each user gets a worker task with its own queue, so one user's events are
//! handled strictly in arrival order while different users run concurrently.
//! A worker that sees no event for the idle timeout exits; the user's next
//! event starts a new one.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::channels::{Channel, IncomingMessage};
use crate::conversation::ConversationEngine;
use crate::error::ChannelError;

/// How long a user's worker waits for another event before exiting.
pub const DEFAULT_WORKER_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Dispatcher-side handle to one user's worker.
struct WorkerHandle {
    tx: mpsc::UnboundedSender<IncomingMessage>,
    /// Resolves once the worker task has returned.
    exited: oneshot::Receiver<()>,
}

impl WorkerHandle {
    fn has_exited(&mut self) -> bool {
        matches!(
            self.exited.try_recv(),
            Err(oneshot::error::TryRecvError::Closed)
        )
    }
}

pub struct Dispatcher {
    engine: Arc<ConversationEngine>,
    channel: Arc<dyn Channel>,
    worker_idle_timeout: Duration,
    live_workers: Arc<AtomicUsize>,
}

impl Dispatcher {
    pub fn new(engine: Arc<ConversationEngine>, channel: Arc<dyn Channel>) -> Self {
        Self {
            engine,
            channel,
            worker_idle_timeout: DEFAULT_WORKER_IDLE_TIMEOUT,
            live_workers: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_worker_idle_timeout(mut self, timeout: Duration) -> Self {
        self.worker_idle_timeout = timeout;
        self
    }

    /// Number of per-user workers currently running.
    pub fn active_workers(&self) -> usize {
        self.live_workers.load(Ordering::Relaxed)
    }

    /// Consume the channel until its stream ends or `shutdown` resolves.
    ///
    /// Events already queued for a worker are still handled before returning.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) -> Result<(), ChannelError> {
        let mut stream = self.channel.start().await?;
        let mut workers: HashMap<String, WorkerHandle> = HashMap::new();
        let mut tasks = JoinSet::new();
        tokio::pin!(shutdown);

        info!(channel = self.channel.name(), "Dispatcher started");

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                next = stream.next() => match next {
                    Some(msg) => self.route(msg, &mut workers, &mut tasks),
                    None => {
                        info!(channel = self.channel.name(), "Channel stream ended");
                        break;
                    }
                },
                Some(result) = tasks.join_next(), if !tasks.is_empty() => {
                    self.reap(result);
                    workers.retain(|_, handle| !handle.has_exited());
                }
            }
        }

        // Closing the queues lets each worker finish its backlog and exit.
        drop(workers);
        while let Some(result) = tasks.join_next().await {
            self.reap(result);
        }

        self.channel.shutdown().await
    }

    fn reap(&self, result: Result<(), tokio::task::JoinError>) {
        self.live_workers.fetch_sub(1, Ordering::Relaxed);
        if let Err(e) = result {
            warn!(error = %e, "Conversation worker panicked");
        }
    }

    fn route(
        &self,
        msg: IncomingMessage,
        workers: &mut HashMap<String, WorkerHandle>,
        tasks: &mut JoinSet<()>,
    ) {
        let msg = match workers.get(&msg.user_id) {
            Some(handle) => match handle.tx.send(msg) {
                Ok(()) => return,
                // Worker went idle or panicked; start a new one below.
                Err(mpsc::error::SendError(msg)) => msg,
            },
            None => msg,
        };
        // The successor waits for its predecessor so this user's events stay
        // in order.
        let previous = workers.remove(&msg.user_id).map(|handle| handle.exited);

        debug!(user_id = %msg.user_id, "Spawning conversation worker");
        let (tx, rx) = mpsc::unbounded_channel();
        let (exited_tx, exited) = oneshot::channel();
        let user_id = msg.user_id.clone();
        // A fresh receiver is held by the worker we are about to spawn.
        let _ = tx.send(msg);
        workers.insert(user_id, WorkerHandle { tx, exited });
        self.live_workers.fetch_add(1, Ordering::Relaxed);
        tasks.spawn(worker(
            Arc::clone(&self.engine),
            Arc::clone(&self.channel),
            rx,
            self.worker_idle_timeout,
            previous,
            exited_tx,
        ));
    }
}

async fn worker(
    engine: Arc<ConversationEngine>,
    channel: Arc<dyn Channel>,
    mut rx: mpsc::UnboundedReceiver<IncomingMessage>,
    idle_timeout: Duration,
    previous: Option<oneshot::Receiver<()>>,
    _exited: oneshot::Sender<()>,
) {
    if let Some(previous) = previous {
        let _ = previous.await;
    }

    loop {
        match tokio::time::timeout(idle_timeout, rx.recv()).await {
            Ok(Some(msg)) => handle(&engine, channel.as_ref(), &msg).await,
            Ok(None) => break,
            Err(_) => {
                // Refuse new events, then finish whatever raced in.
                rx.close();
                while let Some(msg) = rx.recv().await {
                    handle(&engine, channel.as_ref(), &msg).await;
                }
                debug!("Conversation worker idle, exiting");
                break;
            }
        }
    }
}

async fn handle(engine: &ConversationEngine, channel: &dyn Channel, msg: &IncomingMessage) {
    if let Err(e) = engine.handle(channel, msg).await {
        warn!(
            user_id = %msg.user_id,
            event = msg.event.label(),
            error = %e,
            "Failed to deliver reply"
        );
    }
}
