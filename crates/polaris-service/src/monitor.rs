//! Hosting service for the collector and the sync loop.
//!
//! [`Monitor::start`] checks permissions, then spawns both tasks under one
//! cancellation token. The service stops either when the caller calls
//! [`Monitor::shutdown`] or on its own when a required permission is revoked.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use polaris_types::Permission;

use crate::collector::{Collector, CollectorExit};
use crate::events::EventReceiver;
use crate::state::{AppState, ServiceStatus};
use crate::sync::SyncLoop;
use crate::uplink::Uplink;

/// Runtime permissions granted by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions {
    pub location: bool,
    pub telephony: bool,
}

impl Permissions {
    /// Both permissions granted.
    pub fn granted() -> Self {
        Self {
            location: true,
            telephony: true,
        }
    }

    pub fn all_granted(&self) -> bool {
        self.missing().is_none()
    }

    /// The first permission that is not granted.
    pub fn missing(&self) -> Option<Permission> {
        if !self.location {
            Some(Permission::Location)
        } else if !self.telephony {
            Some(Permission::Telephony)
        } else {
            None
        }
    }
}

/// Errors starting the service.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MonitorError {
    #[error("{0} permission not granted")]
    PermissionDenied(Permission),
}

/// A running collector + sync loop pair.
///
/// Dropping the monitor without calling [`Monitor::shutdown`] still cancels
/// both tasks; it just does not wait for them.
pub struct Monitor {
    state: Arc<AppState>,
    cancel: CancellationToken,
    collector: Option<JoinHandle<CollectorExit>>,
    sync: Option<JoinHandle<()>>,
}

impl Monitor {
    /// Start the service. Nothing is spawned if a permission is missing.
    pub fn start(
        state: Arc<AppState>,
        uplink: Arc<dyn Uplink>,
        events: EventReceiver,
        permissions: Permissions,
    ) -> Result<Self, MonitorError> {
        if let Some(permission) = permissions.missing() {
            warn!("Not starting: {} permission not granted", permission);
            return Err(MonitorError::PermissionDenied(permission));
        }

        let cancel = CancellationToken::new();
        state.stats.set_running(true);

        let collector = {
            let state = Arc::clone(&state);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let exit = Collector::new(Arc::clone(&state))
                    .run(events, cancel.clone())
                    .await;
                if let CollectorExit::PermissionDenied(permission) = exit {
                    warn!("Stopping service: {} permission revoked", permission);
                    state.stats.set_running(false);
                    cancel.cancel();
                }
                exit
            })
        };

        let sync = tokio::spawn(SyncLoop::new(Arc::clone(&state), uplink).run(cancel.clone()));

        info!("Service started");
        Ok(Self {
            state,
            cancel,
            collector: Some(collector),
            sync: Some(sync),
        })
    }

    /// Whether the service is still running.
    pub fn is_running(&self) -> bool {
        self.state.stats.is_running() && !self.cancel.is_cancelled()
    }

    pub async fn status(&self) -> ServiceStatus {
        self.state.status().await
    }

    /// Resolves once the service has been told to stop, for any reason.
    pub async fn stopped(&self) {
        self.cancel.cancelled().await
    }

    /// Stop both tasks, wait for them, and return the final status.
    pub async fn shutdown(mut self) -> ServiceStatus {
        self.cancel.cancel();

        if let Some(collector) = self.collector.take() {
            match collector.await {
                Ok(exit) => info!("Collector finished: {:?}", exit),
                Err(e) => warn!("Collector task failed: {}", e),
            }
        }
        if let Some(sync) = self.sync.take()
            && let Err(e) = sync.await
        {
            warn!("Sync task failed: {}", e);
        }

        self.state.stats.set_running(false);
        info!("Service stopped");
        self.state.status().await
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        if !self.cancel.is_cancelled() {
            debug!("Monitor dropped without shutdown, cancelling tasks");
            self.cancel.cancel();
        }
        self.state.stats.set_running(false);
    }
}
