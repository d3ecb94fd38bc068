//! AdapterHandle - Wraps AdapterLogic with consistent lifecycle management

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::adapters::traits::{AdapterContext, AdapterLogic};
use crate::sync::{EventSender, SyncEvent};

/// Restart backoff for adapter loops
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

/// AdapterHandle wraps an AdapterLogic implementation and provides:
/// - Consistent shutdown handling (can't forget it)
/// - Restart with exponential backoff when the loop ends or fails
/// - A `SessionClosed` event every time the loop exits, so the synchronizer
///   never keeps a dead session
pub struct AdapterHandle<T: AdapterLogic> {
    logic: Arc<T>,
    events: EventSender,
    shutdown: CancellationToken,
    retry: RetryConfig,
}

impl<T: AdapterLogic> AdapterHandle<T> {
    pub fn new(logic: T, events: EventSender, shutdown: CancellationToken) -> Self {
        Self {
            logic: Arc::new(logic),
            events,
            shutdown,
            retry: RetryConfig::default(),
        }
    }

    /// Get the adapter's prefix
    pub fn prefix(&self) -> &'static str {
        self.logic.prefix()
    }

    /// Run the adapter until shutdown
    /// - Calls init() once
    /// - Runs the adapter's main loop, restarting it with backoff
    /// - Sends SessionClosed after every exit of the loop
    pub async fn run(self) -> Result<()> {
        let prefix = self.logic.prefix();
        info!("Starting adapter: {}", prefix);

        if let Err(e) = self.logic.init().await {
            error!("Adapter {} init failed: {}", prefix, e);
            return Err(e);
        }

        let mut retry_delay = self.retry.initial_delay;

        loop {
            let ctx = AdapterContext {
                events: self.events.clone(),
                shutdown: self.shutdown.clone(),
            };

            tokio::select! {
                result = self.logic.run(ctx) => {
                    match &result {
                        Ok(()) => info!("Adapter {} loop ended", prefix),
                        Err(e) => error!("Adapter {} error: {}", prefix, e),
                    }
                }
                _ = self.shutdown.cancelled() => {
                    info!("Adapter {} cancelled via token", prefix);
                }
            }

            // Receiver gone means the synchronizer already stopped
            let _ = self.events.send(SyncEvent::SessionClosed);

            if self.shutdown.is_cancelled() {
                break;
            }

            info!("Adapter {} restarting in {:?}", prefix, retry_delay);
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(retry_delay) => {
                    retry_delay = (retry_delay * 2).min(self.retry.max_delay);
                }
            }
        }

        info!("Adapter {} stopped", prefix);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    struct FlakyAdapter {
        runs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl AdapterLogic for FlakyAdapter {
        fn prefix(&self) -> &'static str {
            "flaky"
        }

        async fn run(&self, _ctx: AdapterContext) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("core went away")
        }
    }

    struct FailingInit;

    #[async_trait]
    impl AdapterLogic for FailingInit {
        fn prefix(&self) -> &'static str {
            "broken"
        }

        async fn init(&self) -> Result<()> {
            anyhow::bail!("no state dir")
        }

        async fn run(&self, _ctx: AdapterContext) -> Result<()> {
            unreachable!("run must not be called after init failure")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_restarts_with_backoff_until_shutdown() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let handle = AdapterHandle::new(
            FlakyAdapter { runs: runs.clone() },
            tx,
            shutdown.clone(),
        );
        let task = tokio::spawn(handle.run());

        // First run is immediate, then 1s, then 2s
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);

        shutdown.cancel();
        task.await.unwrap().unwrap();

        let mut closed = 0;
        while let Ok(event) = rx.try_recv() {
            assert!(matches!(event, SyncEvent::SessionClosed));
            closed += 1;
        }
        assert_eq!(closed, 3);
    }

    #[tokio::test]
    async fn test_init_failure_is_returned() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = AdapterHandle::new(FailingInit, tx, CancellationToken::new());
        assert_eq!(handle.prefix(), "broken");
        assert!(handle.run().await.is_err());
    }
}
