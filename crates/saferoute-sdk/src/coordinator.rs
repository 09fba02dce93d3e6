//! Serialized reducer loop around a routing session.
//!
//! One task owns the session and the request builder. Callers talk to it
//! through [`Coordinator`] handles; engine answers come back on an internal
//! channel. Nothing else mutates session state.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use saferoute_core::{
    BuildError, Path, PathId, PathSafetyRecord, PlannedRequest, Query, RequestBuilder, RequestId,
    ResponseOutcome, RoutingResult, RoutingRules, RoutingSession, SessionError, SessionSnapshot,
};

use crate::engine::{EngineError, RoutingEngine};

const COMMAND_BUFFER: usize = 64;
const EVENT_BUFFER: usize = 256;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Coordinator has shut down")]
    Closed,
}

/// Changes pushed to subscribers.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The merged path collection or the selection changed.
    PathsUpdated {
        paths: Vec<Path>,
        selected: Option<Path>,
    },
    /// Every safety record of the session so far.
    SafetyUpdated { records: Vec<PathSafetyRecord> },
    /// A current request failed. Paths already merged are kept.
    RequestFailed { message: String },
    Cleared,
}

enum Command {
    Submit {
        query: Box<Query>,
        reply: oneshot::Sender<Result<usize, BuildError>>,
    },
    Select {
        id: PathId,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Clear {
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

struct EngineResponse {
    id: RequestId,
    result: Result<RoutingResult, EngineError>,
}

/// Handle to a running coordinator loop. Cheap to clone.
#[derive(Clone)]
pub struct Coordinator {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<SessionEvent>,
}

impl Coordinator {
    /// Start the loop on the current tokio runtime.
    pub fn spawn(engine: Arc<dyn RoutingEngine>, rules: RoutingRules) -> Self {
        let builder = RequestBuilder::new(rules.clone());
        let session = RoutingSession::new(rules);
        Self::start(engine, builder, session)
    }

    /// Like [`Coordinator::spawn`] with deterministic decoy and score sampling.
    pub fn spawn_with_seed(engine: Arc<dyn RoutingEngine>, rules: RoutingRules, seed: u64) -> Self {
        let builder = RequestBuilder::with_seed(rules.clone(), seed);
        let session = RoutingSession::with_seed(rules, seed.wrapping_add(1));
        Self::start(engine, builder, session)
    }

    fn start(engine: Arc<dyn RoutingEngine>, builder: RequestBuilder, session: RoutingSession) -> Self {
        let (commands, rx) = mpsc::channel(COMMAND_BUFFER);
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let state = LoopState {
            engine,
            builder,
            session,
            events: events.clone(),
        };
        tokio::spawn(run_coordinator_loop(state, rx));
        Self { commands, events }
    }

    /// Replace the current query. Returns how many requests were sent.
    pub async fn submit_query(&self, query: Query) -> Result<usize, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Submit {
            query: Box::new(query),
            reply,
        })
        .await?;
        Ok(rx.await.map_err(|_| CoordinatorError::Closed)??)
    }

    pub async fn select_path(&self, id: PathId) -> Result<(), CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Select { id, reply }).await?;
        Ok(rx.await.map_err(|_| CoordinatorError::Closed)??)
    }

    /// Drop the current batch, paths and scores.
    pub async fn clear_query(&self) -> Result<(), CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Clear { reply }).await?;
        rx.await.map_err(|_| CoordinatorError::Closed)
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot { reply }).await?;
        rx.await.map_err(|_| CoordinatorError::Closed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Stop the loop. Responses still in flight are discarded.
    pub async fn shutdown(&self) -> Result<(), CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Shutdown { reply }).await?;
        rx.await.map_err(|_| CoordinatorError::Closed)
    }

    async fn send(&self, command: Command) -> Result<(), CoordinatorError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| CoordinatorError::Closed)
    }
}

struct LoopState {
    engine: Arc<dyn RoutingEngine>,
    builder: RequestBuilder,
    session: RoutingSession,
    events: broadcast::Sender<SessionEvent>,
}

async fn run_coordinator_loop(mut state: LoopState, mut commands: mpsc::Receiver<Command>) {
    let (responses_tx, mut responses) = mpsc::unbounded_channel::<EngineResponse>();
    tracing::info!("Routing coordinator started");

    loop {
        tokio::select! {
            maybe_command = commands.recv() => {
                match maybe_command {
                    Some(Command::Shutdown { reply }) => {
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => state.handle_command(command, &responses_tx),
                    None => {
                        tracing::info!("All coordinator handles dropped");
                        break;
                    }
                }
            }
            Some(response) = responses.recv() => {
                state.handle_response(response);
            }
        }
    }

    tracing::info!("Routing coordinator shutting down");
}

impl LoopState {
    fn handle_command(
        &mut self,
        command: Command,
        responses: &mpsc::UnboundedSender<EngineResponse>,
    ) {
        match command {
            Command::Submit { query, reply } => {
                let result = self.submit(&query, responses);
                let _ = reply.send(result);
            }
            Command::Select { id, reply } => {
                let result = self.session.select_path(id).map(|_| ());
                if result.is_ok() {
                    self.emit_paths();
                }
                let _ = reply.send(result);
            }
            Command::Clear { reply } => {
                self.session.clear();
                self.emit(SessionEvent::Cleared);
                let _ = reply.send(());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.session.snapshot());
            }
            // Handled by the loop itself
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    fn submit(
        &mut self,
        query: &Query,
        responses: &mpsc::UnboundedSender<EngineResponse>,
    ) -> Result<usize, BuildError> {
        let planned = self.builder.build(query)?;
        let had_paths = !self.session.paths().is_empty();
        let had_records = !self.session.safety_records().is_empty();

        let (registered_tx, registered_rx) = watch::channel(false);
        for request in &planned {
            self.dispatch(request, registered_rx.clone(), responses.clone());
        }
        let count = planned.len();
        self.session.submit(planned);
        // Responses may only be correlated once their batch is tracked
        let _ = registered_tx.send(true);

        tracing::info!("Submitted {} routing request(s)", count);
        if had_paths {
            self.emit_paths();
        }
        if had_records {
            self.emit_records();
        }
        Ok(count)
    }

    fn dispatch(
        &self,
        planned: &PlannedRequest,
        mut registered: watch::Receiver<bool>,
        responses: mpsc::UnboundedSender<EngineResponse>,
    ) {
        let engine = Arc::clone(&self.engine);
        let request = planned.request.clone();
        tokio::spawn(async move {
            let result = engine.route(&request).await;
            if registered.wait_for(|done| *done).await.is_err() {
                tracing::debug!("Batch for {} was never registered", request.id);
                return;
            }
            // Receiver is gone only after shutdown
            let _ = responses.send(EngineResponse {
                id: request.id,
                result,
            });
        });
    }

    fn handle_response(&mut self, response: EngineResponse) {
        let records_before = self.session.safety_records().len();
        match self.session.on_response(response.id, response.result) {
            Ok(ResponseOutcome::Stale) => {}
            Ok(ResponseOutcome::Merged { added, records }) => {
                if !added.is_empty() {
                    self.emit_paths();
                }
                if !records.is_empty() {
                    self.emit_records();
                }
            }
            Err(err) => {
                self.emit(SessionEvent::RequestFailed {
                    message: err.to_string(),
                });
                if self.session.safety_records().len() != records_before {
                    self.emit_records();
                }
            }
        }
    }

    fn emit_paths(&self) {
        self.emit(SessionEvent::PathsUpdated {
            paths: self.session.paths().to_vec(),
            selected: self.session.selected_path().cloned(),
        });
    }

    fn emit_records(&self) {
        self.emit(SessionEvent::SafetyUpdated {
            records: self.session.safety_records().to_vec(),
        });
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
