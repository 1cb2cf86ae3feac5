//! Progress protocol between a worker and the terminal.
//!
//! Every command runs as a single worker task that reports what it is doing as a
//! stream of [`ProgressEvent`]s. A single consumer drains the stream, renders
//! each event and decides how the command ends:
//!
//! - an event carrying an error ends the stream and fails the command;
//! - an event with [`Action::Terminate`] ends the stream successfully;
//! - anything else is rendered and the consumer keeps listening.
//!
//! The channel holds a single event, so a worker never runs far ahead of what
//! the user has seen. [`run_with_progress`] owns the terminal event: whatever
//! path the worker takes, exactly one terminal event reaches the consumer.
//!
//! # Example
//!
//! ```rust,no_run
//! use multiwerf::events::{ProgressEvent, TextRenderer, run_with_progress};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut renderer = TextRenderer::stderr();
//! let answer = run_with_progress(&mut renderer, false, "demo", |events| async move {
//!     events.send(ProgressEvent::ok("demo", "working")).await?;
//!     Ok(42)
//! })
//! .await?;
//! assert_eq!(answer, 42);
//! # Ok(())
//! # }
//! ```

pub mod render;

pub use render::{Render, TextRenderer};

use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

/// Event bus failures.
#[derive(Debug, Error)]
pub enum EventBusError {
    /// The stream already ended, either through a terminal event or because
    /// the consumer went away. The worker should stop.
    #[error("Progress stream has ended")]
    Halted,

    /// The worker dropped its sender without a terminal event.
    #[error("Worker stopped without reporting a result")]
    WorkerVanished,
}

/// What the consumer should do after rendering an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// The stage is still running; more events for it follow.
    Continue,
    /// The stream is complete.
    Terminate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Ok,
    Warn,
    Fail,
}

/// One progress report.
#[derive(Debug)]
pub struct ProgressEvent {
    pub stage: String,
    pub action: Option<Action>,
    pub text: String,
    pub severity: Severity,
    pub error: Option<anyhow::Error>,
    pub comment: Option<String>,
    pub debug: bool,
}

impl ProgressEvent {
    fn new(stage: impl Into<String>, text: impl Into<String>, severity: Severity) -> Self {
        Self {
            stage: stage.into(),
            action: None,
            text: text.into(),
            severity,
            error: None,
            comment: None,
            debug: false,
        }
    }

    pub fn ok(stage: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(stage, text, Severity::Ok)
    }

    pub fn warn(stage: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(stage, text, Severity::Warn)
    }

    /// A failed step. Without an attached error this does not end the stream.
    pub fn fail(stage: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(stage, text, Severity::Fail)
    }

    /// Diagnostic detail, shown only in verbose mode.
    pub fn debug(stage: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            debug: true,
            ..Self::new(stage, text, Severity::Ok)
        }
    }

    /// A step that has started and will report again.
    pub fn started(stage: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            action: Some(Action::Continue),
            ..Self::new(stage, text, Severity::Ok)
        }
    }

    pub fn terminate(stage: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            action: Some(Action::Terminate),
            ..Self::new(stage, text, Severity::Ok)
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Attach a causal error, which makes this event fatal.
    pub fn with_error(mut self, error: anyhow::Error) -> Self {
        self.severity = Severity::Fail;
        self.error = Some(error);
        self
    }

    /// Whether the consumer stops after this event.
    pub fn is_terminal(&self) -> bool {
        self.error.is_some() || self.action == Some(Action::Terminate)
    }
}

/// Worker side of the bus.
///
/// Clones share the halted state, so once any clone delivered a terminal event
/// every clone refuses to send more.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<ProgressEvent>,
    halted: Arc<AtomicBool>,
}

impl EventSender {
    pub fn new(tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self {
            tx,
            halted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Deliver an event, waiting until the consumer has room for it.
    ///
    /// # Errors
    ///
    /// [`EventBusError::Halted`] once a terminal event was delivered or the
    /// consumer has gone away.
    pub async fn send(&self, event: ProgressEvent) -> Result<(), EventBusError> {
        if self.is_halted() {
            return Err(EventBusError::Halted);
        }

        let terminal = event.is_terminal();
        if self.tx.send(event).await.is_err() {
            self.halted.store(true, Ordering::SeqCst);
            return Err(EventBusError::Halted);
        }
        if terminal {
            self.halted.store(true, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Drain events until the stream terminates.
///
/// Returns the error carried by a fatal event, or `Ok` on a terminate event.
/// Debug events are dropped unless `verbose` is set.
pub async fn consume(
    mut rx: mpsc::Receiver<ProgressEvent>,
    renderer: &mut dyn Render,
    verbose: bool,
) -> Result<()> {
    while let Some(mut event) = rx.recv().await {
        if event.debug && !verbose && !event.is_terminal() {
            continue;
        }

        if let Err(e) = renderer.render(&event) {
            debug!("Failed to render progress event: {e}");
        }

        if let Some(error) = event.error.take() {
            return Err(error);
        }
        if event.action == Some(Action::Terminate) {
            return Ok(());
        }
    }

    Err(EventBusError::WorkerVanished.into())
}

/// Run `worker` in its own task while rendering its events.
///
/// The worker's `Ok` result is followed by a terminate event for `stage` and its
/// `Err` by a fatal fail event, so the consumer always sees an end.
pub async fn run_with_progress<T, F, Fut>(
    renderer: &mut dyn Render,
    verbose: bool,
    stage: &str,
    worker: F,
) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(EventSender) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(1);
    let events = EventSender::new(tx);
    let stage = stage.to_string();
    let work = worker(events.clone());

    // Err(None): the error reached the consumer. Err(Some): it could not be delivered.
    let handle = tokio::spawn(async move {
        match work.await {
            Ok(value) => {
                if let Err(e) = events.send(ProgressEvent::terminate(stage, "")).await {
                    debug!("Terminate event not delivered: {e}");
                }
                Ok(value)
            }
            Err(error) => {
                if events.is_halted() {
                    return Err(Some(error));
                }
                let text = error.to_string();
                match events.send(ProgressEvent::fail(stage, text).with_error(error)).await {
                    Ok(()) => Err(None),
                    Err(e) => Err(Some(anyhow::Error::new(e))),
                }
            }
        }
    });

    let consumed = consume(rx, renderer, verbose).await;
    let joined = handle.await.context("Worker task panicked")?;

    match (consumed, joined) {
        (Err(error), _) => Err(error),
        (Ok(()), Ok(value)) => Ok(value),
        (Ok(()), Err(Some(error))) => Err(error),
        (Ok(()), Err(None)) => Err(EventBusError::WorkerVanished.into()),
    }
}
