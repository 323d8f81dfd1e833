use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::capture::events::IngestEvent;
use crate::capture::presenter::Presenter;
use crate::capture::store::{CaptureStore, SessionPhase};
use crate::models::stats::TrafficSummary;
use crate::utils::error::{AppError, AppResult};

/// Commands accepted by the capture service.
///
/// Each command carries the channel its reply goes to, which also tells
/// the sender that the command has been applied.
#[derive(Debug)]
pub enum StoreCommand {
    /// An ingestion event; the reply carries the event's parse result
    Ingest(IngestEvent, oneshot::Sender<AppResult<()>>),
    Clear(oneshot::Sender<()>),
    AppendMessage(String, oneshot::Sender<()>),
    AppendSummary(oneshot::Sender<()>),
    SetPacketLimit(usize, oneshot::Sender<()>),
    /// Encode the current session as dump text
    Export(oneshot::Sender<AppResult<String>>),
    Snapshot(oneshot::Sender<StoreSnapshot>),
}

/// Totals and lifecycle information about the running session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub phase: SessionPhase,
    pub summary: TrafficSummary,
    pub buffered_packets: usize,
    pub removed_packets: u64,
    pub last_id: u64,
    pub packet_limit: usize,
}

/// Sending side of the service, cloned into whoever produces events
#[derive(Clone)]
pub struct CaptureHandle {
    commands: mpsc::Sender<StoreCommand>,
}

impl CaptureHandle {
    /// Create a handle together with the receiver the service consumes
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<StoreCommand>) {
        let (commands, receiver) = mpsc::channel(capacity);
        (Self { commands }, receiver)
    }

    /// Submit an event and wait for it to be processed
    pub async fn ingest(&self, event: IngestEvent) -> AppResult<()> {
        self.request(|reply| StoreCommand::Ingest(event, reply)).await?
    }

    pub async fn clear(&self) -> AppResult<()> {
        self.request(StoreCommand::Clear).await
    }

    pub async fn append_message(&self, message: String) -> AppResult<()> {
        self.request(|reply| StoreCommand::AppendMessage(message, reply))
            .await
    }

    pub async fn append_summary(&self) -> AppResult<()> {
        self.request(StoreCommand::AppendSummary).await
    }

    pub async fn set_packet_limit(&self, limit: usize) -> AppResult<()> {
        self.request(|reply| StoreCommand::SetPacketLimit(limit, reply))
            .await
    }

    pub async fn export(&self) -> AppResult<String> {
        self.request(StoreCommand::Export).await?
    }

    pub async fn snapshot(&self) -> AppResult<StoreSnapshot> {
        self.request(StoreCommand::Snapshot).await
    }

    /// Send a command and wait for its reply
    async fn request<T, F>(&self, build: F) -> AppResult<T>
    where
        F: FnOnce(oneshot::Sender<T>) -> StoreCommand,
    {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| AppError::ServiceClosed)?;
        response.await.map_err(|_| AppError::ServiceClosed)
    }
}

/// Runs a [`CaptureStore`] against an injected command source.
///
/// Commands are processed one at a time on a single task, so the store
/// is never entered concurrently. The same loop fires the store's
/// debounced refresh when its deadline passes.
pub struct CaptureService<P> {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<CaptureStore<P>>,
}

impl<P> CaptureService<P>
where
    P: Presenter + Send + 'static,
{
    /// Start consuming `commands` on a background task
    pub fn attach(store: CaptureStore<P>, commands: mpsc::Receiver<StoreCommand>) -> Self {
        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(Self::run(store, commands, shutdown_rx));
        info!("Capture service attached");
        Self {
            shutdown: Some(shutdown),
            task,
        }
    }

    /// Stop listening for commands and hand the store back
    pub async fn dispose(mut self) -> Option<CaptureStore<P>> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        match (&mut self.task).await {
            Ok(store) => {
                info!("Capture service disposed");
                Some(store)
            }
            Err(e) => {
                warn!("Capture service task failed: {}", e);
                None
            }
        }
    }

    async fn run(
        mut store: CaptureStore<P>,
        mut commands: mpsc::Receiver<StoreCommand>,
        mut shutdown: oneshot::Receiver<()>,
    ) -> CaptureStore<P> {
        loop {
            let deadline = store.refresh_deadline();

            tokio::select! {
                _ = &mut shutdown => {
                    debug!("Capture service received shutdown");
                    break;
                }
                command = commands.recv() => match command {
                    Some(command) => Self::dispatch(&mut store, command),
                    None => {
                        debug!("All capture handles dropped");
                        break;
                    }
                },
                _ = wait_for(deadline) => {
                    store.flush_due();
                }
            }
        }

        // Releases the event source; a pending refresh is flushed so the
        // presenter sees the final state.
        commands.close();
        if store.refresh_deadline().is_some() {
            store.compute_view();
        }
        store
    }

    fn dispatch(store: &mut CaptureStore<P>, command: StoreCommand) {
        // A dropped reply receiver only means the caller stopped waiting
        match command {
            StoreCommand::Ingest(event, reply) => {
                let name = event.name();
                let result = store.handle_event(event);
                if let Err(e) = &result {
                    warn!("Failed to ingest {}: {}", name, e);
                }
                let _ = reply.send(result);
            }
            StoreCommand::Clear(reply) => {
                store.clear();
                let _ = reply.send(());
            }
            StoreCommand::AppendMessage(message, reply) => {
                store.append_message(message);
                let _ = reply.send(());
            }
            StoreCommand::AppendSummary(reply) => {
                store.append_summary();
                let _ = reply.send(());
            }
            StoreCommand::SetPacketLimit(limit, reply) => {
                store.set_packet_limit(limit);
                let _ = reply.send(());
            }
            StoreCommand::Export(reply) => {
                let _ = reply.send(store.encode_session());
            }
            StoreCommand::Snapshot(reply) => {
                let buffer = &store.session().buffer;
                let snapshot = StoreSnapshot {
                    phase: store.phase(),
                    summary: store.summary(),
                    buffered_packets: buffer.len(),
                    removed_packets: buffer.removed_packets(),
                    last_id: buffer.unique_id(),
                    packet_limit: store.packet_limit(),
                };
                let _ = reply.send(snapshot);
            }
        }
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
