use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tracing::debug;

use crate::{
    device::{
        AccessContext, Device, DeviceCapabilities, DeviceResult, KeepAliveSettings, spawn_keepalive,
    },
    driver::{DeviceDescriptor, DeviceMap, DeviceUri, Driver, probe_all},
    snes::address::AddressSpace,
};

use super::device::EmuNwDevice;

pub const KIND: &str = "emunw";
/// First of the ports emulator bridges listen on by convention.
pub const DEFAULT_BASE_PORT: u16 = 48879;
pub const DEFAULT_PORT_COUNT: u16 = 10;

pub fn default_hosts() -> Vec<String> {
    (0..DEFAULT_PORT_COUNT)
        .map(|n| format!("127.0.0.1:{}", DEFAULT_BASE_PORT + n))
        .collect()
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EmuNwSettings {
    pub hosts: Vec<String>,
    pub probe_timeout: Duration,
    pub request_timeout: Duration,
    pub keepalive: KeepAliveSettings,
}

impl Default for EmuNwSettings {
    fn default() -> Self {
        Self {
            hosts: default_hosts(),
            probe_timeout: Duration::from_millis(250),
            request_timeout: Duration::from_secs(5),
            keepalive: KeepAliveSettings::default(),
        }
    }
}

/// Dials out to a fixed list of bridge endpoints. Each endpoint holds at
/// most one live device.
pub struct EmuNwDriver {
    settings: EmuNwSettings,
    devices: Arc<DeviceMap<EmuNwDevice>>,
}

impl EmuNwDriver {
    pub fn new(settings: EmuNwSettings) -> Self {
        Self {
            settings,
            devices: Arc::new(DeviceMap::new()),
        }
    }

    pub fn settings(&self) -> &EmuNwSettings {
        &self.settings
    }

    fn capabilities_of() -> DeviceCapabilities {
        DeviceCapabilities::READ_MEMORY
            | DeviceCapabilities::WRITE_MEMORY
            | DeviceCapabilities::RESET_SYSTEM
            | DeviceCapabilities::PAUSE_UNPAUSE_EMULATION
            | DeviceCapabilities::PAUSE_TOGGLE_EMULATION
    }
}

/// Returns the open device for `host`, dialing a fresh one when there is none
/// or the cached one was closed.
async fn connect_cached(
    devices: &DeviceMap<EmuNwDevice>,
    host: &str,
    ctx: &AccessContext,
    settings: &EmuNwSettings,
) -> DeviceResult<Arc<EmuNwDevice>> {
    if let Some(device) = devices.get_open(host) {
        return Ok(device);
    }
    let dialed = Arc::new(EmuNwDevice::connect(host, host, ctx, settings.request_timeout).await?);
    let (device, inserted) = devices.get_or_insert(host, Arc::clone(&dialed));
    if inserted {
        spawn_keepalive(&device, settings.keepalive);
    } else {
        debug!(device = host, "concurrent dial lost, keeping the open device");
        let _ = dialed.close().await;
    }
    Ok(device)
}

#[async_trait]
impl Driver for EmuNwDriver {
    fn kind(&self) -> &str {
        KIND
    }

    fn display_name(&self) -> &str {
        "Emulator network bridge"
    }

    fn capabilities(&self) -> DeviceCapabilities {
        Self::capabilities_of()
    }

    fn default_address_space(&self) -> AddressSpace {
        AddressSpace::FxPakPro
    }

    async fn detect(&self) -> DeviceResult<Vec<DeviceDescriptor>> {
        let devices = Arc::clone(&self.devices);
        let settings = self.settings.clone();
        let found = probe_all(
            self.settings.hosts.clone(),
            self.settings.probe_timeout,
            move |host: String, ctx| {
                let devices = Arc::clone(&devices);
                let settings = settings.clone();
                async move {
                    let device = connect_cached(&devices, &host, &ctx, &settings).await?;
                    let status = device.status(&ctx).await?;
                    let display_name = match status.game {
                        Some(game) if !game.is_empty() => format!("{game} ({host})"),
                        _ => format!("Emulator ({host})"),
                    };
                    Ok(DeviceDescriptor {
                        uri: DeviceUri::new(KIND, host),
                        display_name,
                        kind: KIND.to_string(),
                        capabilities: EmuNwDriver::capabilities_of(),
                        default_address_space: AddressSpace::FxPakPro,
                    })
                }
            },
        )
        .await;
        debug!(found = found.len(), candidates = self.settings.hosts.len(), "emunw detection");
        Ok(found.into_iter().map(|(_, descriptor)| descriptor).collect())
    }

    fn device(&self, uri: &DeviceUri) -> Option<Arc<dyn Device>> {
        self.devices
            .get_open(&self.device_key(uri))
            .map(|device| device as Arc<dyn Device>)
    }

    async fn open_device(&self, key: &str, _uri: &DeviceUri) -> DeviceResult<Arc<dyn Device>> {
        let ctx = AccessContext::with_timeout(self.settings.request_timeout);
        let device = connect_cached(&self.devices, key, &ctx, &self.settings).await?;
        Ok(device as Arc<dyn Device>)
    }

    async fn disconnect(&self, key: &str, device: &Arc<dyn Device>) {
        self.devices.remove_if_same(key, device);
        let _ = device.close().await;
    }

    async fn shutdown(&self) {
        for device in self.devices.drain() {
            let _ = device.close().await;
        }
    }
}
