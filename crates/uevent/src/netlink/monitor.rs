//! Background uevent monitoring.
//!
//! [`MonitorBuilder::spawn`] moves a [`DatagramSource`] (normally a
//! [`Connection`]) into a tokio task that reads, parses and filters
//! datagrams, handing accepted events to the caller one at a time.
//!
//! The worker moves through [`MonitorState`]:
//!
//! ```text
//! Idle -> Running -> Stopped   (cancelled, limit reached, consumer gone,
//!                               matcher failed to compile)
//!                 -> Failed    (socket error)
//! ```
//!
//! Unparsable datagrams are reported on the error stream and skipped.
//! Cancellation is checked before every datagram and while waiting for
//! one; a datagram that is already being read is always delivered first.
//!
//! # Example
//!
//! ```ignore
//! use uevent::netlink::{Action, Connection, Mode, MonitorBuilder, PropertyMatcher};
//! use tokio_stream::StreamExt;
//!
//! let conn = Connection::open(Mode::Udev)?;
//! let mut monitor = MonitorBuilder::new()
//!     .matcher(PropertyMatcher::new().action(Action::Add).subsystem("block"))
//!     .limit(1)
//!     .spawn(conn);
//!
//! if let Some(event) = monitor.events.next().await {
//!     println!("new disk at {}", event.kobject_path);
//! }
//! ```

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, trace, warn};

use super::connection::Connection;
use super::error::{Error, Result};
use super::matcher::Matcher;
use super::parse::parse_uevent;
use super::uevent::Uevent;

/// Events in flight between the worker and the consumer.
const EVENT_QUEUE_CAPACITY: usize = 1;

/// Default bound of the error stream.
const DEFAULT_ERROR_CAPACITY: usize = 16;

/// Where the monitor reads datagrams from.
pub trait DatagramSource: Send + 'static {
    /// Wait until a datagram is pending, without consuming it.
    fn ready(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Consume exactly one datagram.
    fn read_datagram(&mut self) -> impl Future<Output = Result<Bytes>> + Send;
}

impl DatagramSource for Connection {
    async fn ready(&mut self) -> Result<()> {
        Connection::ready(self).await
    }

    async fn read_datagram(&mut self) -> Result<Bytes> {
        Connection::read_datagram(self).await
    }
}

/// Lifecycle of a monitor worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Spawned, not yet polled.
    Idle,
    /// Reading datagrams.
    Running,
    /// Ended normally.
    Stopped,
    /// Ended on a socket error.
    Failed,
}

impl MonitorState {
    /// Check if the worker has ended.
    pub fn is_terminal(self) -> bool {
        matches!(self, MonitorState::Stopped | MonitorState::Failed)
    }
}

/// Cooperative stop signal for a running monitor.
///
/// Cloning shares the same signal. Cancelling more than once is harmless.
/// Dropping every handle does not stop the monitor.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Ask the worker to stop before its next datagram.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Handle to the spawned worker task.
#[derive(Debug)]
pub struct MonitorTask {
    worker: Option<JoinHandle<MonitorState>>,
    state: watch::Receiver<MonitorState>,
}

impl MonitorTask {
    /// Current state of the worker.
    pub fn state(&self) -> MonitorState {
        *self.state.borrow()
    }

    /// Check if the worker has ended.
    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().is_none_or(|w| w.is_finished())
    }

    /// Wait for the worker to end and return its terminal state.
    ///
    /// A worker that panicked is reported as [`MonitorState::Failed`].
    pub async fn join(self) -> MonitorState {
        match self.worker {
            Some(worker) => worker.await.unwrap_or(MonitorState::Failed),
            None => *self.state.borrow(),
        }
    }
}

/// A running monitor: accepted events, reported errors, and the controls.
///
/// Both streams end once the worker reaches a terminal state.
#[derive(Debug)]
pub struct Monitor {
    /// Parsed events that passed the matcher, in socket order.
    pub events: ReceiverStream<Uevent>,
    /// Every recoverable and fatal error the worker ran into.
    pub errors: ReceiverStream<Error>,
    /// Stop signal.
    pub cancel: CancelHandle,
    /// The worker task.
    pub task: MonitorTask,
}

/// Configures and spawns a monitor.
pub struct MonitorBuilder {
    matcher: Option<Box<dyn Matcher>>,
    limit: usize,
    error_capacity: usize,
}

impl Default for MonitorBuilder {
    fn default() -> Self {
        Self {
            matcher: None,
            limit: 0,
            error_capacity: DEFAULT_ERROR_CAPACITY,
        }
    }
}

impl std::fmt::Debug for MonitorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorBuilder")
            .field("matcher", &self.matcher.is_some())
            .field("limit", &self.limit)
            .field("error_capacity", &self.error_capacity)
            .finish()
    }
}

impl MonitorBuilder {
    /// Create a builder: no matcher, no limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver only events the matcher accepts.
    pub fn matcher(mut self, matcher: impl Matcher + 'static) -> Self {
        self.matcher = Some(Box::new(matcher));
        self
    }

    /// Set or clear an already boxed matcher.
    pub fn boxed_matcher(mut self, matcher: Option<Box<dyn Matcher>>) -> Self {
        self.matcher = matcher;
        self
    }

    /// Stop after `limit` delivered events. Zero means no limit.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Bound of the error stream (at least 1).
    ///
    /// The worker waits when the error stream is full.
    pub fn error_capacity(mut self, capacity: usize) -> Self {
        self.error_capacity = capacity.max(1);
        self
    }

    /// Compile the matcher and spawn the worker on the current tokio runtime.
    ///
    /// If the matcher fails to compile, no worker is started: the error is
    /// the only item on the error stream, the event stream is already
    /// closed and the task reports [`MonitorState::Stopped`].
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn<S: DatagramSource>(self, source: S) -> Monitor {
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (error_tx, error_rx) = mpsc::channel(self.error_capacity);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(MonitorState::Idle);

        let cancel = CancelHandle {
            tx: Arc::new(cancel_tx),
        };

        let mut matcher = self.matcher;
        if let Some(m) = matcher.as_mut()
            && let Err(err) = m.compile()
        {
            let err = match err {
                err @ Error::MatcherCompile(_) => err,
                other => Error::matcher_compile(other.to_string()),
            };
            warn!(error = %err, "matcher rejected, monitor not started");
            // The channel is new and has room for at least one item.
            let _ = error_tx.try_send(err);
            state_tx.send_replace(MonitorState::Stopped);

            return Monitor {
                events: ReceiverStream::new(event_rx),
                errors: ReceiverStream::new(error_rx),
                cancel,
                task: MonitorTask {
                    worker: None,
                    state: state_rx,
                },
            };
        }

        let worker = Worker {
            source,
            matcher,
            limit: self.limit,
            matched: 0,
            events: event_tx,
            errors: error_tx,
            cancel: cancel_rx,
            state: state_tx,
        };

        Monitor {
            events: ReceiverStream::new(event_rx),
            errors: ReceiverStream::new(error_rx),
            cancel,
            task: MonitorTask {
                worker: Some(tokio::spawn(worker.run())),
                state: state_rx,
            },
        }
    }
}

/// Spawn a monitor over `source` with an optional matcher and match limit.
///
/// Shorthand for [`MonitorBuilder`].
pub fn start_monitor<S: DatagramSource>(
    source: S,
    matcher: Option<Box<dyn Matcher>>,
    limit: usize,
) -> Monitor {
    MonitorBuilder::new()
        .boxed_matcher(matcher)
        .limit(limit)
        .spawn(source)
}

struct Worker<S> {
    source: S,
    matcher: Option<Box<dyn Matcher>>,
    limit: usize,
    matched: usize,
    events: mpsc::Sender<Uevent>,
    errors: mpsc::Sender<Error>,
    cancel: watch::Receiver<bool>,
    state: watch::Sender<MonitorState>,
}

impl<S: DatagramSource> Worker<S> {
    async fn run(mut self) -> MonitorState {
        self.state.send_replace(MonitorState::Running);
        debug!(limit = self.limit, "monitor running");

        let state = self.drive().await;

        debug!(?state, matched = self.matched, "monitor finished");
        self.state.send_replace(state);
        state
    }

    async fn drive(&mut self) -> MonitorState {
        loop {
            let cancelled = *self.cancel.borrow();
            if cancelled {
                return MonitorState::Stopped;
            }

            // Cancellation wins ties with a pending datagram.
            let ready = tokio::select! {
                biased;
                () = wait_cancelled(&mut self.cancel) => None,
                ready = self.source.ready() => Some(ready),
            };
            match ready {
                None => return MonitorState::Stopped,
                Some(Err(err)) => return self.fail(err).await,
                Some(Ok(())) => {}
            }

            let datagram = match self.source.read_datagram().await {
                Ok(datagram) => datagram,
                Err(err) => return self.fail(err).await,
            };

            let event = match parse_uevent(&datagram) {
                Ok(event) => event,
                Err(err) => {
                    debug!(error = %err, len = datagram.len(), "skipping datagram");
                    self.report(err).await;
                    continue;
                }
            };

            if let Some(matcher) = &self.matcher
                && !matcher.evaluate(&event)
            {
                trace!(action = %event.action, path = %event.kobject_path, "not matched");
                continue;
            }

            if self.events.send(event).await.is_err() {
                debug!("event consumer dropped");
                return MonitorState::Stopped;
            }

            self.matched += 1;
            if self.limit > 0 && self.matched >= self.limit {
                debug!(limit = self.limit, "match limit reached");
                return MonitorState::Stopped;
            }
        }
    }

    async fn fail(&mut self, err: Error) -> MonitorState {
        warn!(error = %err, "uevent socket failed");
        self.report(err).await;
        MonitorState::Failed
    }

    async fn report(&mut self, err: Error) {
        if self.errors.send(err).await.is_err() {
            trace!("error consumer dropped");
        }
    }
}

/// Resolve once cancellation is requested; never if every handle is gone.
async fn wait_cancelled(rx: &mut watch::Receiver<bool>) {
    let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}
