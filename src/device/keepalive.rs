//! Idle liveness probing. A connection the peer dropped silently is only
//! noticed on the next write, so idle devices are pinged on a timer and
//! closed when the ping fails.
use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{Device, context::AccessContext, error::DeviceResult};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct KeepAliveSettings {
    /// How often the idle check runs.
    pub interval: Duration,
    /// Minimum idle time before a ping is sent.
    pub idle: Duration,
    /// Deadline for the ping itself.
    pub timeout: Duration,
}

impl Default for KeepAliveSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            idle: Duration::from_secs(5),
            timeout: Duration::from_secs(2),
        }
    }
}

#[async_trait]
pub trait Heartbeat: Device + 'static {
    /// Label used in log output.
    fn label(&self) -> &str;

    /// Time since the last completed round trip.
    fn idle_for(&self) -> Duration;

    /// Issues a harmless query against the peer.
    async fn heartbeat(&self, ctx: &AccessContext) -> DeviceResult<()>;
}

/// Runs until the device is closed or dropped. Holds only a weak reference
/// so the task never keeps a device alive.
pub fn spawn_keepalive<D: Heartbeat>(
    device: &Arc<D>,
    settings: KeepAliveSettings,
) -> JoinHandle<()> {
    let weak: Weak<D> = Arc::downgrade(device);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(settings.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(device) = weak.upgrade() else {
                break;
            };
            if device.is_closed() {
                break;
            }
            if device.idle_for() < settings.idle {
                continue;
            }
            let ctx = AccessContext::with_timeout(settings.timeout);
            match device.heartbeat(&ctx).await {
                Ok(()) => debug!(device = device.label(), "keepalive ok"),
                Err(err) => {
                    warn!(
                        device = device.label(),
                        error = %err,
                        "keepalive failed, closing device"
                    );
                    if let Err(err) = device.close().await {
                        debug!(
                            device = device.label(),
                            error = %err,
                            "close after keepalive failure"
                        );
                    }
                    break;
                }
            }
        }
    })
}
