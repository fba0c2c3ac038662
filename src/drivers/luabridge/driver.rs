use std::{
    io,
    net::SocketAddr,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use tokio::{net::TcpListener, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    device::{
        AccessContext, Device, DeviceCapabilities, DeviceError, DeviceResult, KeepAliveSettings,
        spawn_keepalive,
    },
    driver::{DeviceDescriptor, DeviceMap, DeviceUri, Driver},
    snes::address::AddressSpace,
};

use super::device::LuaBridgeDevice;

pub const KIND: &str = "luabridge";
pub const DEFAULT_LISTEN: &str = "127.0.0.1:65398";

/// Pause between retries when `accept` itself keeps failing.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LuaBridgeSettings {
    pub listen: String,
    pub request_timeout: Duration,
    pub keepalive: KeepAliveSettings,
}

impl Default for LuaBridgeSettings {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            request_timeout: Duration::from_secs(5),
            keepalive: KeepAliveSettings::default(),
        }
    }
}

struct Listener {
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

/// Waits for Lua bridge scripts to connect. Devices exist only while a
/// script is connected; this driver never dials out.
pub struct LuaBridgeDriver {
    settings: LuaBridgeSettings,
    devices: Arc<DeviceMap<LuaBridgeDevice>>,
    listener: Mutex<Option<Listener>>,
}

impl LuaBridgeDriver {
    pub fn new(settings: LuaBridgeSettings) -> Self {
        Self {
            settings,
            devices: Arc::new(DeviceMap::new()),
            listener: Mutex::new(None),
        }
    }

    /// Binds the configured address and starts accepting. Calling it again
    /// while listening returns the bound address.
    pub async fn listen(&self) -> io::Result<SocketAddr> {
        if let Some(addr) = self.local_addr() {
            return Ok(addr);
        }
        let listener = TcpListener::bind(&self.settings.listen).await?;
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, "lua bridge listening");
        let task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&self.devices),
            self.settings.clone(),
        ));
        let mut slot = self.listener.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.replace(Listener { local_addr, task }) {
            previous.task.abort();
        }
        Ok(local_addr)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|listener| listener.local_addr)
    }

    fn capabilities_of() -> DeviceCapabilities {
        DeviceCapabilities::READ_MEMORY
            | DeviceCapabilities::WRITE_MEMORY
            | DeviceCapabilities::RESET_SYSTEM
            | DeviceCapabilities::PAUSE_UNPAUSE_EMULATION
            | DeviceCapabilities::PAUSE_TOGGLE_EMULATION
    }
}

async fn accept_loop(
    listener: TcpListener,
    devices: Arc<DeviceMap<LuaBridgeDevice>>,
    settings: LuaBridgeSettings,
) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let devices = Arc::clone(&devices);
                let settings = settings.clone();
                tokio::spawn(async move {
                    let device = Arc::new(LuaBridgeDevice::accept(
                        stream,
                        peer,
                        settings.request_timeout,
                    ));
                    let ctx = AccessContext::with_timeout(settings.request_timeout);
                    match device.handshake(&ctx).await {
                        Ok(version) => {
                            info!(
                                peer = %peer,
                                emulator = %version.emulator,
                                "lua bridge connected"
                            );
                            let previous = devices.insert(device.key(), Arc::clone(&device));
                            if let Some(previous) = previous {
                                let _ = previous.close().await;
                            }
                            spawn_keepalive(&device, settings.keepalive);
                        }
                        Err(err) => {
                            debug!(peer = %peer, error = %err, "lua bridge handshake failed")
                        }
                    }
                });
            }
            Err(err) => {
                warn!(error = %err, "lua bridge accept failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

#[async_trait]
impl Driver for LuaBridgeDriver {
    fn kind(&self) -> &str {
        KIND
    }

    fn display_name(&self) -> &str {
        "Lua bridge"
    }

    fn capabilities(&self) -> DeviceCapabilities {
        Self::capabilities_of()
    }

    fn default_address_space(&self) -> AddressSpace {
        AddressSpace::SnesABus
    }

    async fn detect(&self) -> DeviceResult<Vec<DeviceDescriptor>> {
        Ok(self
            .devices
            .snapshot()
            .into_iter()
            .map(|(key, device)| DeviceDescriptor {
                display_name: format!("{} ({key})", device.emulator().unwrap_or("Lua bridge")),
                uri: DeviceUri::new(KIND, key),
                kind: KIND.to_string(),
                capabilities: Self::capabilities_of(),
                default_address_space: AddressSpace::SnesABus,
            })
            .collect())
    }

    fn device(&self, uri: &DeviceUri) -> Option<Arc<dyn Device>> {
        self.devices
            .get_open(&self.device_key(uri))
            .map(|device| device as Arc<dyn Device>)
    }

    async fn open_device(&self, key: &str, _uri: &DeviceUri) -> DeviceResult<Arc<dyn Device>> {
        Err(DeviceError::NoDeviceFound(key.to_string()))
    }

    async fn disconnect(&self, key: &str, device: &Arc<dyn Device>) {
        self.devices.remove_if_same(key, device);
        let _ = device.close().await;
    }

    async fn shutdown(&self) {
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(listener) = listener {
            listener.task.abort();
            debug!(address = %listener.local_addr, "lua bridge listener stopped");
        }
        for device in self.devices.drain() {
            let _ = device.close().await;
        }
    }
}
