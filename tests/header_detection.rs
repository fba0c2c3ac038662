use async_trait::async_trait;
use hex_literal::hex;
use snesbridge::{
    device::{
        AccessContext, DeviceError, DeviceMemory, DeviceResult, MemoryReadRequest,
        MemoryReadResponse, MemoryWriteRequest, MemoryWriteResponse,
    },
    drivers::mock::MockDevice,
    snes::{
        address::MemoryMapping,
        header::{DetectError, HeaderScorer, detect, detect_with},
    },
};

/// Internal header block as found at `$FFB0`, LoROM map mode, with a
/// matching checksum pair and a reset vector of `$8000`.
const LOROM_HEADER: [u8; 0x50] = hex!(
    "00000000000000000000000000000000"
    "53555045522054455354 2047414D45 202020202020"
    "20 02 09 03 01 33 00 5AA5 A55A"
    "00000000000000000000000000000000"
    "000000000000000000000000 0080 0000"
);

fn header_with_map_mode(map_mode: u8) -> [u8; 0x50] {
    let mut header = LOROM_HEADER;
    header[0x25] = map_mode;
    header
}

fn rom_with_header_at(offset: usize, header: &[u8]) -> MockDevice {
    let mut rom = vec![0u8; 0x8_0000];
    rom[offset..offset + header.len()].copy_from_slice(header);
    MockDevice::new(rom, 0x2000)
}

#[tokio::test]
async fn lorom_header_is_found_at_7fb0() {
    let device = rom_with_header_at(0x7FB0, &LOROM_HEADER);
    let detected = detect(&device, &AccessContext::BACKGROUND, None, None)
        .await
        .expect("detect LoROM");
    assert_eq!(detected.mapping, MemoryMapping::LoRom);
    assert!(detected.confident);
    assert_eq!(detected.header, LOROM_HEADER.to_vec(), "winning buffer is returned");
}

#[tokio::test]
async fn hirom_header_is_found_at_ffb0() {
    let device = rom_with_header_at(0xFFB0, &header_with_map_mode(0x31));
    let detected = detect(&device, &AccessContext::BACKGROUND, None, None)
        .await
        .expect("detect HiROM");
    assert_eq!(detected.mapping, MemoryMapping::HiRom, "FastROM HiROM folds to HiROM");
    assert!(detected.confident);
}

#[tokio::test]
async fn blank_rom_has_no_valid_header() {
    let device = MockDevice::blank();
    let err = detect(&device, &AccessContext::BACKGROUND, Some(MemoryMapping::HiRom), None)
        .await
        .unwrap_err();
    assert!(matches!(err, DetectError::NoValidHeader), "fallback does not rescue a missing header");
}

#[tokio::test]
async fn supplied_header_skips_probing() {
    let device = MockDevice::blank();
    let ctx = AccessContext::BACKGROUND;

    let exhirom = header_with_map_mode(0x25);
    let detected = detect(&device, &ctx, None, Some(&exhirom[..0x30])).await.unwrap();
    assert_eq!(detected.mapping, MemoryMapping::ExHiRom);
    assert!(detected.confident);

    let odd = header_with_map_mode(0x2B);
    let detected = detect(&device, &ctx, None, Some(&odd)).await.unwrap();
    assert_eq!(detected.mapping, MemoryMapping::HiRom, "odd unknown code guesses HiROM");
    assert!(!detected.confident);

    let detected = detect(&device, &ctx, Some(MemoryMapping::ExHiRom), Some(&odd))
        .await
        .unwrap();
    assert_eq!(detected.mapping, MemoryMapping::ExHiRom, "fallback beats parity");
    assert!(!detected.confident);
}

#[tokio::test]
async fn short_supplied_header_is_rejected() {
    let device = rom_with_header_at(0x7FB0, &LOROM_HEADER);
    let err = detect(&device, &AccessContext::BACKGROUND, None, Some(&LOROM_HEADER[..0x2F]))
        .await
        .unwrap_err();
    assert!(matches!(err, DetectError::HeaderTooShort { len: 0x2F }));
}

struct FailingMemory {
    error: fn() -> DeviceError,
}

#[async_trait]
impl DeviceMemory for FailingMemory {
    async fn multi_read_memory(
        &self,
        _ctx: &AccessContext,
        _reads: &[MemoryReadRequest],
    ) -> DeviceResult<Vec<MemoryReadResponse>> {
        Err((self.error)())
    }

    async fn multi_write_memory(
        &self,
        _ctx: &AccessContext,
        _writes: &[MemoryWriteRequest],
    ) -> DeviceResult<Vec<MemoryWriteResponse>> {
        Err((self.error)())
    }
}

/// Answers every read with fewer bytes than a header needs.
struct TruncatingMemory;

#[async_trait]
impl DeviceMemory for TruncatingMemory {
    async fn multi_read_memory(
        &self,
        _ctx: &AccessContext,
        reads: &[MemoryReadRequest],
    ) -> DeviceResult<Vec<MemoryReadResponse>> {
        Ok(reads
            .iter()
            .map(|read| MemoryReadResponse {
                request_address: read.request_address,
                device_address: read.request_address,
                data: vec![0x21; 0x10],
            })
            .collect())
    }

    async fn multi_write_memory(
        &self,
        _ctx: &AccessContext,
        _writes: &[MemoryWriteRequest],
    ) -> DeviceResult<Vec<MemoryWriteResponse>> {
        Ok(Vec::new())
    }
}

struct AcceptEverything;

impl HeaderScorer for AcceptEverything {
    fn score(&self, _header: &[u8], _candidate: u32) -> i32 {
        10
    }
}

#[tokio::test]
async fn truncated_candidates_never_win() {
    let err = detect_with(
        &TruncatingMemory,
        &AccessContext::BACKGROUND,
        None,
        None,
        &AcceptEverything,
    )
    .await
    .unwrap_err();
    assert!(
        matches!(err, DetectError::NoValidHeader),
        "a short buffer is not a header whatever it scores: {err}"
    );
}

#[tokio::test]
async fn fatal_read_aborts_detection() {
    let memory = FailingMemory {
        error: || DeviceError::Timeout,
    };
    let err = detect(&memory, &AccessContext::BACKGROUND, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DetectError::Device(DeviceError::Timeout)));
}

#[tokio::test]
async fn transient_reads_are_skipped() {
    let memory = FailingMemory {
        error: || DeviceError::Remote("busy".to_string()),
    };
    let err = detect(&memory, &AccessContext::BACKGROUND, None, None)
        .await
        .unwrap_err();
    assert!(
        matches!(err, DetectError::NoValidHeader),
        "every candidate skipped rather than failing: {err}"
    );
}
