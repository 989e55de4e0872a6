//! Long-running daemon components
//!
//! A component exposes one blocking `run` taking a cancellation signal. The
//! supervisor starts components, forwards OS termination signals into the
//! shared cancellation handle and tells clean shutdowns apart from failures.

pub mod scheduler;

use async_trait::async_trait;
use log::{debug, error, info};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;

pub use scheduler::{MeasurementScheduler, SchedulerState};

/// How a component's run ended
#[derive(Debug)]
pub enum Outcome {
    /// The component finished its work on its own
    Completed,
    /// Cancellation was observed; a normal shutdown
    Interrupted,
    Failed(anyhow::Error),
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Completed => write!(f, "completed"),
            Outcome::Interrupted => write!(f, "interrupted"),
            Outcome::Failed(err) => write!(f, "failed: {:#}", err),
        }
    }
}

#[async_trait]
pub trait Component: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, cancel: CancellationSignal) -> Outcome;
}

/// Creates a linked cancellation handle and signal
pub fn cancellation() -> (CancellationHandle, CancellationSignal) {
    let (tx, rx) = watch::channel(false);
    (
        CancellationHandle { tx: Arc::new(tx) },
        CancellationSignal { rx },
    )
}

/// Owner side of the cancellation; cloning shares the same signal
#[derive(Debug, Clone)]
pub struct CancellationHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancellationHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn signal(&self) -> CancellationSignal {
        CancellationSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Observer side of the cancellation
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    rx: watch::Receiver<bool>,
}

impl CancellationSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested; never resolves if the handle is
    /// dropped without cancelling
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}

/// Runs components until they all stop
pub struct Supervisor {
    handle: CancellationHandle,
    tasks: JoinSet<(String, Outcome)>,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    pub fn new() -> Self {
        let (handle, _) = cancellation();
        Self {
            handle,
            tasks: JoinSet::new(),
        }
    }

    pub fn cancellation_handle(&self) -> CancellationHandle {
        self.handle.clone()
    }

    /// Starts a component on its own task
    pub fn start(&mut self, component: Arc<dyn Component>) {
        let signal = self.handle.signal();
        info!("starting the {} component", component.name());

        self.tasks.spawn(async move {
            let outcome = component.run(signal).await;
            (component.name().to_string(), outcome)
        });
    }

    /// Cancels every component on Ctrl-C or SIGTERM
    pub fn forward_os_signals(&self) {
        let handle = self.handle.clone();
        tokio::spawn(async move {
            let signal = wait_for_termination().await;
            debug!("received {} signal", signal);
            handle.cancel();
        });
    }

    /// Waits for all components; a failure cancels the remaining ones
    ///
    /// Returns the outcome of every component in completion order.
    pub async fn wait(mut self) -> Vec<(String, Outcome)> {
        let mut outcomes = Vec::new();

        while let Some(joined) = self.tasks.join_next().await {
            let (name, outcome) = match joined {
                Ok(finished) => finished,
                Err(e) => (
                    "unknown".to_string(),
                    Outcome::Failed(anyhow::anyhow!("component task panicked: {}", e)),
                ),
            };

            match &outcome {
                Outcome::Failed(err) => {
                    error!("the {} component has failed: {:#}", name, err);
                    self.handle.cancel();
                }
                Outcome::Interrupted => info!("the {} component has been interrupted", name),
                Outcome::Completed => info!("the {} component has completed", name),
            }

            outcomes.push((name, outcome));
        }

        outcomes
    }
}

#[cfg(unix)]
async fn wait_for_termination() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => tokio::select! {
            _ = tokio::signal::ctrl_c() => "interrupt",
            _ = terminate.recv() => "terminate",
        },
        Err(e) => {
            error!("unable to listen for SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            "interrupt"
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "interrupt"
}
