//! Background retention sweeper.
//!
//! Runs `cleanup` against a shared store on a fixed interval from a
//! dedicated thread. The store itself never schedules anything; a host that
//! prefers its own scheduler can call `EntityStore::cleanup` directly.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tracing::{info, warn};

use crate::config::DEFAULT_RETENTION_DAYS;
use crate::error::{LedgerError, LedgerResult, ValidationError};
use crate::storage::{EntityStore, StorageError};

/// Sweeper configuration.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Time between sweeps.
    pub interval: Duration,
    /// Entities not updated for this many days (and never read) are removed.
    pub retention_days: u32,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60 * 60),
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

enum Command {
    SweepNow {
        reply: Sender<Result<usize, StorageError>>,
    },
}

/// Handle to a running sweeper thread. Dropping it stops the thread.
pub struct RetentionSweeper {
    tx: Option<Sender<Command>>,
    worker: Option<JoinHandle<()>>,
}

impl RetentionSweeper {
    /// Start sweeping `store` every `config.interval`.
    ///
    /// # Errors
    ///
    /// - `Validation` if the interval is zero or retention is zero days.
    /// - `Internal` if the thread cannot be spawned.
    pub fn spawn(store: Arc<dyn EntityStore>, config: SweeperConfig) -> LedgerResult<Self> {
        if config.retention_days == 0 {
            return Err(ValidationError::InvalidRetention {
                days: config.retention_days,
            }
            .into());
        }
        if config.interval.is_zero() {
            return Err(ValidationError::InvalidConfig {
                reason: "sweep interval must be non-zero".to_string(),
            }
            .into());
        }

        let (tx, rx) = bounded::<Command>(1);
        let worker = thread::Builder::new()
            .name("entity-ledger-sweeper".to_string())
            .spawn(move || run(&*store, &config, &rx))
            .map_err(|e| LedgerError::internal(format!("failed to spawn sweeper: {e}")))?;

        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
        })
    }

    /// Run a sweep immediately and wait for its result.
    ///
    /// # Errors
    ///
    /// - `Storage` if the cleanup itself fails.
    /// - `Internal` if the sweeper thread has exited.
    pub fn sweep_now(&self) -> LedgerResult<usize> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| LedgerError::internal("sweeper is shut down"))?;
        let (reply, rx) = bounded(1);
        tx.send(Command::SweepNow { reply })
            .map_err(|_| LedgerError::internal("sweeper thread exited"))?;
        let removed = rx
            .recv()
            .map_err(|_| LedgerError::internal("sweeper thread exited"))??;
        Ok(removed)
    }

    /// Stop the thread and wait for it to exit.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        // Closing the channel wakes the thread out of its wait.
        drop(self.tx.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for RetentionSweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(store: &dyn EntityStore, config: &SweeperConfig, rx: &Receiver<Command>) {
    info!(
        interval_secs = config.interval.as_secs(),
        retention_days = config.retention_days,
        "retention sweeper started"
    );
    loop {
        match rx.recv_timeout(config.interval) {
            Ok(Command::SweepNow { reply }) => {
                let _ = reply.send(store.cleanup(config.retention_days));
            }
            Err(RecvTimeoutError::Timeout) => {
                if let Err(error) = store.cleanup(config.retention_days) {
                    warn!(error = %error, "scheduled sweep failed");
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    info!("retention sweeper stopped");
}
