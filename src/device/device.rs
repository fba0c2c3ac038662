//! The uniform contract every transport adapter implements. Memory access is
//! split out as [`DeviceMemory`] so consumers that only read (the header
//! detector) do not depend on device control or lifecycle.
use async_trait::async_trait;

use super::{
    capability::DeviceCapabilities,
    context::AccessContext,
    error::{DeviceError, DeviceResult},
    request::{MemoryReadRequest, MemoryReadResponse, MemoryWriteRequest, MemoryWriteResponse},
};

#[async_trait]
pub trait DeviceMemory: Send + Sync {
    /// Reads every request; responses come back in request order with
    /// payloads of exactly the requested size.
    async fn multi_read_memory(
        &self,
        ctx: &AccessContext,
        reads: &[MemoryReadRequest],
    ) -> DeviceResult<Vec<MemoryReadResponse>>;

    async fn multi_write_memory(
        &self,
        ctx: &AccessContext,
        writes: &[MemoryWriteRequest],
    ) -> DeviceResult<Vec<MemoryWriteResponse>>;
}

#[async_trait]
pub trait Device: DeviceMemory {
    async fn reset_system(&self, _ctx: &AccessContext) -> DeviceResult<()> {
        Err(DeviceError::CapabilityUnavailable(
            DeviceCapabilities::RESET_SYSTEM,
        ))
    }

    /// Requests the paused state `paused` and returns the state reached.
    async fn pause_unpause(&self, _ctx: &AccessContext, _paused: bool) -> DeviceResult<bool> {
        Err(DeviceError::CapabilityUnavailable(
            DeviceCapabilities::PAUSE_UNPAUSE_EMULATION,
        ))
    }

    async fn pause_toggle(&self, _ctx: &AccessContext) -> DeviceResult<()> {
        Err(DeviceError::CapabilityUnavailable(
            DeviceCapabilities::PAUSE_TOGGLE_EMULATION,
        ))
    }

    /// Closes the connection. Once closed every operation fails with
    /// [`DeviceError::Closed`].
    async fn close(&self) -> DeviceResult<()>;

    fn is_closed(&self) -> bool;
}
