use portier_locator::{generate_instance_id, LocatorError, ServiceLocator};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Shortest heartbeat period the loop will run with
pub const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unregistered,
    Registered,
    /// At least one heartbeat has been accepted
    Heartbeating,
    Deregistered,
}

/// Registers this instance with the service registry on startup, heartbeats
/// while running and deregisters on shutdown.
pub struct LifecycleReporter {
    locator: Arc<dyn ServiceLocator>,
    instance_id: String,
    service_name: String,
    advertise_address: String,
    state: watch::Sender<LifecycleState>,
}

impl LifecycleReporter {
    /// A reporter with a freshly generated instance id
    pub fn new(
        locator: Arc<dyn ServiceLocator>,
        service_name: &str,
        advertise_address: &str,
    ) -> Self {
        let (state, _) = watch::channel(LifecycleState::Unregistered);
        Self {
            locator,
            instance_id: generate_instance_id(service_name),
            service_name: service_name.to_string(),
            advertise_address: advertise_address.to_string(),
            state,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Register with the locator. Failure here should abort startup.
    pub async fn register(&self) -> Result<(), LocatorError> {
        self.locator
            .register_self(&self.instance_id, &self.service_name, &self.advertise_address)
            .await?;
        self.state.send_replace(LifecycleState::Registered);
        tracing::info!(
            "{} registered with ID={} and address={}",
            self.service_name,
            self.instance_id,
            self.advertise_address
        );
        Ok(())
    }

    /// Spawn the heartbeat loop. Failed heartbeats are logged and the loop
    /// keeps going; it stops only when `cancel` fires.
    pub fn start_heartbeat(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let reporter = self.clone();
        tokio::spawn(async move {
            reporter.heartbeat_loop(interval, cancel).await;
        })
    }

    async fn heartbeat_loop(&self, period: Duration, cancel: CancellationToken) {
        if period < MIN_HEARTBEAT_INTERVAL {
            tracing::warn!(
                "Heartbeat interval {:?} too short, using {:?}",
                period,
                MIN_HEARTBEAT_INTERVAL
            );
        }
        let period = period.max(MIN_HEARTBEAT_INTERVAL);
        tracing::info!("Heartbeat started (interval={:?})", period);
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {},
                _ = cancel.cancelled() => {
                    tracing::info!("Heartbeat shutting down");
                    return;
                }
            }

            match self
                .locator
                .report_healthy(&self.instance_id, &self.service_name)
                .await
            {
                Ok(()) => {
                    tracing::debug!("Heartbeat sent successfully");
                    self.state.send_if_modified(|state| {
                        if *state == LifecycleState::Registered {
                            *state = LifecycleState::Heartbeating;
                            true
                        } else {
                            false
                        }
                    });
                }
                Err(e) => tracing::warn!("Failed to report healthy state: {}", e),
            }
        }
    }

    /// Spawn a task that deregisters once `cancel` fires.
    ///
    /// Runs independently of the HTTP drain triggered by the same token, so
    /// requests may still complete after the instance stops being discoverable.
    pub fn deregister_on_shutdown(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let reporter = self.clone();
        tokio::spawn(async move {
            cancel.cancelled().await;
            tracing::info!("Shutdown signal received, deregistering {}", reporter.instance_id);
            reporter.deregister().await;
        })
    }

    /// Best-effort deregistration: errors are logged, never returned.
    pub async fn deregister(&self) {
        match self
            .locator
            .deregister(&self.instance_id, &self.service_name)
            .await
        {
            Ok(()) => {
                self.state.send_replace(LifecycleState::Deregistered);
                tracing::info!("Deregistered {}", self.instance_id);
            }
            Err(e) => tracing::warn!("Failed to deregister {}: {}", self.instance_id, e),
        }
    }
}
