//! Composition root for drivers. Routes `kind://address` URIs to the owning
//! driver, enforces capabilities before any device call and disconnects
//! devices whose operations failed fatally.
use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    device::{
        AccessContext, Device, DeviceCapabilities, DeviceError, DeviceResult, MemoryReadRequest,
        MemoryReadResponse, MemoryWriteRequest, MemoryWriteResponse,
    },
    snes::{
        address::MemoryMapping,
        header::{self, DetectError, DetectedMapping},
    },
};

use super::{DeviceDescriptor, DeviceUri, Driver};

struct Route {
    driver: Arc<dyn Driver>,
    key: String,
    device: Arc<dyn Device>,
}

#[derive(Default)]
pub struct DriverRegistry {
    drivers: Vec<Arc<dyn Driver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `driver`, replacing any driver of the same kind.
    pub fn register(&mut self, driver: Arc<dyn Driver>) {
        self.drivers.retain(|existing| existing.kind() != driver.kind());
        self.drivers.push(driver);
    }

    pub fn driver(&self, kind: &str) -> Option<Arc<dyn Driver>> {
        self.drivers
            .iter()
            .find(|driver| driver.kind() == kind)
            .cloned()
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.drivers.iter().map(|driver| driver.kind())
    }

    /// Runs detection on every driver whose kind is in `kinds` (all drivers
    /// when empty). A driver that fails detection contributes nothing.
    pub async fn list_devices(&self, kinds: &[&str]) -> Vec<DeviceDescriptor> {
        let mut descriptors = Vec::new();
        for driver in &self.drivers {
            if !kinds.is_empty() && !kinds.contains(&driver.kind()) {
                continue;
            }
            match driver.detect().await {
                Ok(found) => descriptors.extend(found),
                Err(err) => warn!(driver = driver.kind(), error = %err, "device detection failed"),
            }
        }
        descriptors
    }

    async fn route(&self, uri: &str, required: DeviceCapabilities) -> DeviceResult<Route> {
        let uri: DeviceUri = uri.parse()?;
        let driver = self
            .driver(uri.kind())
            .ok_or_else(|| DeviceError::NoDriverFound(uri.kind().to_string()))?;
        if !driver.has_capabilities(required) {
            return Err(DeviceError::CapabilityUnavailable(
                required.difference(driver.capabilities()),
            ));
        }
        let key = driver.device_key(&uri);
        let device = match driver.device(&uri) {
            Some(device) => device,
            None => driver.open_device(&key, &uri).await?,
        };
        Ok(Route {
            driver,
            key,
            device,
        })
    }

    async fn settle<T>(&self, route: &Route, result: DeviceResult<T>) -> DeviceResult<T> {
        if let Err(err) = &result
            && (err.is_fatal() || route.device.is_closed())
        {
            debug!(device = %route.key, error = %err, "dropping device after fatal error");
            route.driver.disconnect(&route.key, &route.device).await;
        }
        result
    }

    pub async fn multi_read_memory(
        &self,
        ctx: &AccessContext,
        uri: &str,
        reads: &[MemoryReadRequest],
    ) -> DeviceResult<Vec<MemoryReadResponse>> {
        let route = self.route(uri, DeviceCapabilities::READ_MEMORY).await?;
        let result = route.device.multi_read_memory(ctx, reads).await;
        self.settle(&route, result).await
    }

    pub async fn multi_write_memory(
        &self,
        ctx: &AccessContext,
        uri: &str,
        writes: &[MemoryWriteRequest],
    ) -> DeviceResult<Vec<MemoryWriteResponse>> {
        let route = self.route(uri, DeviceCapabilities::WRITE_MEMORY).await?;
        let result = route.device.multi_write_memory(ctx, writes).await;
        self.settle(&route, result).await
    }

    pub async fn reset_system(&self, ctx: &AccessContext, uri: &str) -> DeviceResult<()> {
        let route = self.route(uri, DeviceCapabilities::RESET_SYSTEM).await?;
        let result = route.device.reset_system(ctx).await;
        self.settle(&route, result).await
    }

    pub async fn pause_unpause(
        &self,
        ctx: &AccessContext,
        uri: &str,
        paused: bool,
    ) -> DeviceResult<bool> {
        let route = self
            .route(uri, DeviceCapabilities::PAUSE_UNPAUSE_EMULATION)
            .await?;
        let result = route.device.pause_unpause(ctx, paused).await;
        self.settle(&route, result).await
    }

    pub async fn pause_toggle(&self, ctx: &AccessContext, uri: &str) -> DeviceResult<()> {
        let route = self
            .route(uri, DeviceCapabilities::PAUSE_TOGGLE_EMULATION)
            .await?;
        let result = route.device.pause_toggle(ctx).await;
        self.settle(&route, result).await
    }

    /// Infers the cartridge mapping of the device behind `uri`. Supplied
    /// header bytes skip probing entirely.
    pub async fn detect_mapping(
        &self,
        ctx: &AccessContext,
        uri: &str,
        fallback: Option<MemoryMapping>,
        header_bytes: Option<&[u8]>,
    ) -> Result<DetectedMapping, DetectError> {
        let route = self.route(uri, DeviceCapabilities::READ_MEMORY).await?;
        let result = header::detect(&*route.device, ctx, fallback, header_bytes).await;
        if let Err(DetectError::Device(err)) = &result
            && err.is_fatal()
        {
            route.driver.disconnect(&route.key, &route.device).await;
        }
        result
    }

    pub async fn shutdown(&self) {
        for driver in &self.drivers {
            driver.shutdown().await;
        }
    }
}
