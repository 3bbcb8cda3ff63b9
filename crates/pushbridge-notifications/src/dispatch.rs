//! Main-context redelivery.
//!
//! Native callbacks arrive on whatever thread the platform picks. Completions
//! handed to UI code must run on the host's main context, so the bridge
//! routes them through a [`MainDispatcher`].

use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A unit of work to run on the main context.
pub type MainJob = Box<dyn FnOnce() + Send>;

/// Runs jobs on the host's main/UI context.
pub trait MainDispatcher: Send + Sync {
    /// Schedule `job`. Must not run it on the caller's stack unless the
    /// caller is already on the main context.
    fn dispatch(&self, job: MainJob);
}

/// Runs jobs inline. For hosts with a single context, and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateDispatcher;

impl MainDispatcher for ImmediateDispatcher {
    fn dispatch(&self, job: MainJob) {
        job();
    }
}

/// Queues jobs for a main loop that drains a [`MainQueue`].
#[derive(Debug, Clone)]
pub struct QueueDispatcher {
    tx: mpsc::UnboundedSender<MainJob>,
}

/// Receiving end of a [`QueueDispatcher`], owned by the main loop.
#[derive(Debug)]
pub struct MainQueue {
    rx: mpsc::UnboundedReceiver<MainJob>,
}

impl QueueDispatcher {
    /// Create a dispatcher and the queue the main loop drains.
    pub fn new() -> (Self, MainQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, MainQueue { rx })
    }
}

impl MainDispatcher for QueueDispatcher {
    fn dispatch(&self, job: MainJob) {
        if self.tx.send(job).is_err() {
            warn!("main queue closed, dropping job");
        }
    }
}

impl MainQueue {
    /// Run every job queued so far. Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        if ran > 0 {
            debug!(ran, "drained main queue");
        }
        ran
    }

    /// Run jobs as they arrive until every dispatcher is dropped.
    pub async fn run(mut self) {
        while let Some(job) = self.rx.recv().await {
            job();
        }
    }
}
