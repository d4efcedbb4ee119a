//! ==============================================================================
//! persist.rs - single persistence worker in front of the telemetry store
//! ==============================================================================
//!
//! purpose:
//!     one dedicated thread owns every store insert. batches are written in
//!     the order they were submitted, so rows keep arrival order across
//!     messages even when one insert is slow.
//!
//! backpressure:
//!     the queue is bounded. `submit` never blocks: when the queue is full
//!     the batch is dropped and logged, and ingestion carries on.
//!
//! ==============================================================================

use crate::domain::SensorReading;
use crate::store::TelemetryStore;

use anyhow::{Context, Result};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::oneshot;

enum PersistCommand {
    Batch(Vec<SensorReading>),
    Flush(oneshot::Sender<()>),
}

pub struct PersistWorker {
    sender: Option<SyncSender<PersistCommand>>,
    worker: Option<JoinHandle<()>>,
}

impl PersistWorker {
    pub fn spawn(store: Arc<dyn TelemetryStore>, capacity: usize) -> Result<Self> {
        let (sender, receiver) = mpsc::sync_channel::<PersistCommand>(capacity.max(1));

        let worker = thread::Builder::new()
            .name("aquafeed-store".into())
            .spawn(move || {
                while let Ok(command) = receiver.recv() {
                    match command {
                        PersistCommand::Batch(readings) => {
                            for reading in &readings {
                                if let Err(e) = store.insert(reading) {
                                    let cause = format!("{e:#}");
                                    tracing::error!(kind = %reading.kind, error = %cause, "failed to persist reading");
                                }
                            }
                        }
                        PersistCommand::Flush(done) => {
                            let _ = done.send(());
                        }
                    }
                }
            })
            .context("failed to spawn persistence worker")?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    /// queue one batch. false if it was dropped.
    pub fn submit(&self, readings: Vec<SensorReading>) -> bool {
        let Some(sender) = &self.sender else {
            return false;
        };
        match sender.try_send(PersistCommand::Batch(readings)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!("persistence queue full, dropping readings");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::error!("persistence worker is gone, dropping readings");
                false
            }
        }
    }

    /// wait until every batch submitted before this call has been written
    pub async fn flush(&self) {
        let Some(sender) = self.sender.clone() else {
            return;
        };
        let (done_tx, done_rx) = oneshot::channel();
        let queued = tokio::task::spawn_blocking(move || sender.send(PersistCommand::Flush(done_tx)).is_ok())
            .await
            .unwrap_or(false);
        if queued {
            let _ = done_rx.await;
        }
    }
}

impl Drop for PersistWorker {
    fn drop(&mut self) {
        // closing the channel lets the worker drain what is queued and exit
        self.sender.take();
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                tracing::error!("persistence worker panicked");
            }
        }
    }
}
