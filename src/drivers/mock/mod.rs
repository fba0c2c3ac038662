//! In-memory device with ROM, SRAM and WRAM backing stores. Useful for
//! tooling development without an emulator and as a fixture in tests.
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;

use crate::{
    device::{
        AccessContext, Device, DeviceCapabilities, DeviceError, DeviceMemory, DeviceResult,
        MemoryReadRequest, MemoryReadResponse, MemoryWriteRequest, MemoryWriteResponse,
    },
    driver::{DeviceDescriptor, DeviceMap, DeviceUri, Driver},
    snes::{
        address::{AddressSpace, AddressTuple},
        mapping::{MappingError, WRAM_SIZE},
        memory::{MemoryType, resolve_address},
    },
};

pub const KIND: &str = "mock";
pub const DEVICE_KEY: &str = "mock";

const DEFAULT_ROM_SIZE: usize = 0x8_0000;
const DEFAULT_SRAM_SIZE: usize = 0x2000;

/// A 512KiB LoROM image whose only content is a valid internal header.
pub fn lorom_test_image(title: &str) -> Vec<u8> {
    let mut rom = vec![0u8; DEFAULT_ROM_SIZE];
    let header = &mut rom[0x7FB0..0x8000];
    let mut name = [b' '; 21];
    for (slot, byte) in name.iter_mut().zip(title.bytes()) {
        *slot = byte;
    }
    header[0x10..0x25].copy_from_slice(&name);
    header[0x25] = 0x20;
    header[0x27] = 0x09;
    header[0x28] = 0x01;
    header[0x2C..0x2E].copy_from_slice(&0x0000u16.to_le_bytes());
    header[0x2E..0x30].copy_from_slice(&0xFFFFu16.to_le_bytes());
    header[0x4C..0x4E].copy_from_slice(&0x8000u16.to_le_bytes());
    rom
}

pub struct MockDevice {
    rom: Mutex<Vec<u8>>,
    sram: Mutex<Vec<u8>>,
    wram: Mutex<Vec<u8>>,
    closed: AtomicBool,
}

impl MockDevice {
    pub fn new(rom: Vec<u8>, sram_size: usize) -> Self {
        Self {
            rom: Mutex::new(rom),
            sram: Mutex::new(vec![0; sram_size]),
            wram: Mutex::new(vec![0; WRAM_SIZE as usize]),
            closed: AtomicBool::new(false),
        }
    }

    pub fn blank() -> Self {
        Self::new(vec![0; DEFAULT_ROM_SIZE], DEFAULT_SRAM_SIZE)
    }

    fn region(&self, tuple: AddressTuple) -> DeviceResult<(MutexGuard<'_, Vec<u8>>, u32, u32)> {
        let resolved = resolve_address(tuple)?;
        let store = match resolved.memory_type {
            MemoryType::CartRom => &self.rom,
            MemoryType::Sram => &self.sram,
            MemoryType::Wram => &self.wram,
            MemoryType::Unknown => {
                return Err(MappingError::Unclassified {
                    address: resolved.pak_address,
                }
                .into());
            }
        };
        Ok((
            store.lock().unwrap_or_else(PoisonError::into_inner),
            resolved.pak_address,
            resolved.offset,
        ))
    }

    fn ensure_open(&self) -> DeviceResult<()> {
        if self.is_closed() {
            Err(DeviceError::Closed)
        } else {
            Ok(())
        }
    }
}

fn checked_range(offset: u32, len: usize, capacity: usize) -> DeviceResult<std::ops::Range<usize>> {
    let start = offset as usize;
    match start.checked_add(len) {
        Some(end) if end <= capacity => Ok(start..end),
        _ => Err(DeviceError::OutOfRange {
            offset: offset as u64,
            len: len as u64,
            capacity: capacity as u64,
        }),
    }
}

#[async_trait]
impl DeviceMemory for MockDevice {
    async fn multi_read_memory(
        &self,
        ctx: &AccessContext,
        reads: &[MemoryReadRequest],
    ) -> DeviceResult<Vec<MemoryReadResponse>> {
        self.ensure_open()?;
        ctx.check()?;
        let mut responses = Vec::with_capacity(reads.len());
        for read in reads {
            let (store, pak_address, offset) = self.region(read.request_address)?;
            let range = checked_range(offset, read.size, store.len())?;
            responses.push(MemoryReadResponse {
                request_address: read.request_address,
                device_address: AddressTuple::new(
                    pak_address,
                    AddressSpace::FxPakPro,
                    read.request_address.mapping,
                ),
                data: store[range].to_vec(),
            });
        }
        Ok(responses)
    }

    async fn multi_write_memory(
        &self,
        ctx: &AccessContext,
        writes: &[MemoryWriteRequest],
    ) -> DeviceResult<Vec<MemoryWriteResponse>> {
        self.ensure_open()?;
        ctx.check()?;
        let mut responses = Vec::with_capacity(writes.len());
        for write in writes {
            let (mut store, pak_address, offset) = self.region(write.request_address)?;
            let range = checked_range(offset, write.data.len(), store.len())?;
            store[range].copy_from_slice(&write.data);
            responses.push(MemoryWriteResponse {
                request_address: write.request_address,
                device_address: AddressTuple::new(
                    pak_address,
                    AddressSpace::FxPakPro,
                    write.request_address.mapping,
                ),
                size: write.data.len(),
            });
        }
        Ok(responses)
    }
}

#[async_trait]
impl Device for MockDevice {
    async fn close(&self) -> DeviceResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Serves a single `mock://mock` device. Reopening after close starts from
/// the original ROM image with cleared RAM.
pub struct MockDriver {
    rom: Arc<Vec<u8>>,
    devices: DeviceMap<MockDevice>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::with_rom(lorom_test_image("SNESBRIDGE MOCK"))
    }

    pub fn with_rom(rom: Vec<u8>) -> Self {
        Self {
            rom: Arc::new(rom),
            devices: DeviceMap::new(),
        }
    }

    fn open(&self) -> Arc<MockDevice> {
        if let Some(device) = self.devices.get_open(DEVICE_KEY) {
            return device;
        }
        let device = Arc::new(MockDevice::new(self.rom.as_ref().clone(), DEFAULT_SRAM_SIZE));
        self.devices.get_or_insert(DEVICE_KEY, device).0
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Driver for MockDriver {
    fn kind(&self) -> &str {
        KIND
    }

    fn display_name(&self) -> &str {
        "Mock device"
    }

    fn capabilities(&self) -> DeviceCapabilities {
        DeviceCapabilities::READ_MEMORY | DeviceCapabilities::WRITE_MEMORY
    }

    fn default_address_space(&self) -> AddressSpace {
        AddressSpace::FxPakPro
    }

    async fn detect(&self) -> DeviceResult<Vec<DeviceDescriptor>> {
        Ok(vec![DeviceDescriptor {
            uri: DeviceUri::new(KIND, DEVICE_KEY),
            display_name: self.display_name().to_string(),
            kind: KIND.to_string(),
            capabilities: self.capabilities(),
            default_address_space: self.default_address_space(),
        }])
    }

    fn device(&self, uri: &DeviceUri) -> Option<Arc<dyn Device>> {
        (uri.address() == DEVICE_KEY).then(|| self.open() as Arc<dyn Device>)
    }

    async fn open_device(&self, key: &str, _uri: &DeviceUri) -> DeviceResult<Arc<dyn Device>> {
        if key != DEVICE_KEY {
            return Err(DeviceError::NoDeviceFound(key.to_string()));
        }
        Ok(self.open() as Arc<dyn Device>)
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
