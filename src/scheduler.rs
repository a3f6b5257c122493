// src/scheduler.rs - Cancellable periodic background task
use crate::error::{AlarmError, Result};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// A timer loop running `on_tick` every `period` until stopped.
///
/// The first tick fires one full period after spawning. Stopping is
/// synchronous, idempotent, and also happens on drop.
///
/// # Examples
///
/// ```rust
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
/// use threshold_alarm::scheduler::PeriodicTask;
///
/// # #[tokio::main(flavor = "current_thread", start_paused = true)]
/// # async fn main() -> threshold_alarm::Result<()> {
/// let ticks = Arc::new(AtomicU32::new(0));
/// let counter = ticks.clone();
/// let mut task = PeriodicTask::spawn("doc", Duration::from_secs(1), move || {
///     counter.fetch_add(1, Ordering::Relaxed);
/// })?;
///
/// tokio::time::sleep(Duration::from_millis(3_500)).await;
/// task.stop();
/// task.stop();
/// assert_eq!(ticks.load(Ordering::Relaxed), 3);
/// # Ok(())
/// # }
/// ```
pub struct PeriodicTask {
    name: &'static str,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Spawn the loop on the current tokio runtime.
    ///
    /// Fails with a configuration error when called outside a runtime or
    /// with a zero period.
    pub fn spawn<F>(name: &'static str, period: Duration, mut on_tick: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        if period.is_zero() {
            return Err(AlarmError::Config(format!("{} period must be greater than zero", name)));
        }

        let runtime = Handle::try_current().map_err(|_| {
            AlarmError::Config(format!("{} task requires a running tokio runtime", name))
        })?;

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let handle = runtime.spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval() completes its first tick immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        debug!("{} task received shutdown", name);
                        break;
                    }
                    _ = ticker.tick() => on_tick(),
                }
            }
        });

        info!("Started {} task (period {:?})", name, period);

        Ok(Self {
            name,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Stop the loop. Later calls are no-ops.
    pub fn stop(&mut self) {
        // Dropping the sender closes the channel, which wakes the loop
        let Some(shutdown_tx) = self.shutdown_tx.take() else {
            return;
        };
        drop(shutdown_tx);

        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                handle.abort();
            }
        }

        info!("Stopped {} task", self.name);
    }

    /// True until [`stop`](Self::stop) has been called
    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for PeriodicTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicTask")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}
