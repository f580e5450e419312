//! Background task that closes sessions nobody has touched for too long.

use std::{sync::Arc, time::Duration};

use tokio::{task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    audit::{AuditEvent, CloseReason},
    domain::UserId,
    menu,
    relay::RelayEngine,
};

const IDLE_NOTICE: &str = "ℹ️ The dialog was closed automatically due to inactivity.\n\
                           To start a new one, press «💬 Chat with a manager».";

pub struct IdleSweeper {
    engine: Arc<RelayEngine>,
    interval: Duration,
    max_idle: Duration,
}

/// Running sweeper; dropping it leaves the task running until the runtime stops.
pub struct SweeperHandle {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl IdleSweeper {
    pub fn new(engine: Arc<RelayEngine>, interval: Duration, max_idle: Duration) -> Self {
        Self {
            engine,
            interval,
            max_idle,
        }
    }

    /// One pass: remove every session idle for longer than `max_idle` as of `now`.
    ///
    /// Customers are notified best-effort; a customer who blocked the bot is
    /// still removed.
    pub async fn sweep_once_at(&self, now: Instant) -> Vec<UserId> {
        let expired = self
            .engine
            .sessions()
            .remove_expired_at(now, self.max_idle)
            .await;

        for &customer in &expired {
            self.engine.dialogs().clear(customer).await;
            self.engine
                .notify(customer.chat(), IDLE_NOTICE, Some(menu::main_menu()))
                .await;
            self.engine
                .audit(AuditEvent::session_closed(customer, CloseReason::Idle));
        }

        if expired.is_empty() {
            debug!("idle sweep: nothing to close");
        } else {
            info!(count = expired.len(), "idle sweep closed sessions");
        }
        expired
    }

    pub async fn sweep_once(&self) -> Vec<UserId> {
        self.sweep_once_at(Instant::now()).await
    }

    /// Spawn the periodic loop. The first pass runs one interval after start.
    pub fn start(self) -> SweeperHandle {
        let cancel = CancellationToken::new();
        let tok = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut tick =
                tokio::time::interval_at(Instant::now() + self.interval, self.interval);
            info!(
                interval_secs = self.interval.as_secs(),
                max_idle_secs = self.max_idle.as_secs(),
                "idle sweeper started"
            );
            loop {
                tokio::select! {
                    _ = tok.cancelled() => break,
                    _ = tick.tick() => {
                        self.sweep_once().await;
                    }
                }
            }
            info!("idle sweeper stopped");
        });
        SweeperHandle { cancel, handle }
    }
}

impl SweeperHandle {
    /// Stop the loop and wait for the task to finish.
    ///
    /// Returns `false` if the task had panicked or was aborted.
    pub async fn shutdown(self) -> bool {
        self.cancel.cancel();
        match self.handle.await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "idle sweeper task ended abnormally");
                false
            }
        }
    }
}
