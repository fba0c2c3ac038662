//! Cartridge header probing. The internal header sits just below the CPU
//! vectors at `$FFB0` of the bank the mapping places there; reading each
//! candidate location under each mapping and scoring the buffers tells the
//! mappings apart without trusting the map-mode byte alone.
use std::{error::Error, fmt};

use tracing::{debug, trace};

use crate::device::{AccessContext, DeviceError, DeviceMemory, ErrorKind, MemoryReadRequest};

use super::address::{AddressTuple, MemoryMapping};

/// Bytes needed to reach the checksum words.
pub const HEADER_MIN_LEN: usize = 0x30;
/// Header plus the native and emulation vector tables.
pub const HEADER_PROBE_LEN: usize = 0x50;

/// Pak addresses of the `$FFB0` header block under LoROM, HiROM and ExHiROM.
pub const HEADER_CANDIDATES: [u32; 3] = [0x00_7FB0, 0x00_FFB0, 0x40_FFB0];

const TITLE: std::ops::Range<usize> = 0x10..0x25;
const MAP_MODE: usize = 0x25;
const ROM_SIZE: usize = 0x27;
const COMPLEMENT: usize = 0x2C;
const CHECKSUM: usize = 0x2E;
const RESET_VECTOR: usize = 0x4C;
const FAST_ROM_BIT: u8 = 0x10;

/// Read-only accessors over a header block starting at `$FFB0`.
#[derive(Clone, Copy, Debug)]
pub struct HeaderView<'a>(&'a [u8]);

impl<'a> HeaderView<'a> {
    pub fn new(bytes: &'a [u8]) -> Option<Self> {
        (bytes.len() >= HEADER_MIN_LEN).then_some(Self(bytes))
    }

    pub fn title(&self) -> &'a [u8] {
        &self.0[TITLE]
    }

    pub fn map_mode(&self) -> u8 {
        self.0[MAP_MODE]
    }

    pub fn rom_size(&self) -> u8 {
        self.0[ROM_SIZE]
    }

    pub fn checksum(&self) -> u16 {
        u16::from_le_bytes([self.0[CHECKSUM], self.0[CHECKSUM + 1]])
    }

    pub fn complement(&self) -> u16 {
        u16::from_le_bytes([self.0[COMPLEMENT], self.0[COMPLEMENT + 1]])
    }

    /// Emulation-mode reset vector, when the vector table was captured.
    pub fn reset_vector(&self) -> Option<u16> {
        self.0
            .get(RESET_VECTOR..RESET_VECTOR + 2)
            .map(|bytes| u16::from_le_bytes([bytes[0], bytes[1]]))
    }
}

/// Maps a header map-mode byte to a mapping, ignoring the FastROM bit.
pub fn mapping_from_map_mode(map_mode: u8) -> Option<MemoryMapping> {
    match map_mode & !FAST_ROM_BIT {
        0x20 | 0x22 => Some(MemoryMapping::LoRom),
        0x21 | 0x23 => Some(MemoryMapping::HiRom),
        0x25 => Some(MemoryMapping::ExHiRom),
        _ => None,
    }
}

/// Rates how header-like `header` is for the block read at `candidate`.
/// Zero or below means "not a header".
pub trait HeaderScorer: Send + Sync {
    fn score(&self, header: &[u8], candidate: u32) -> i32;
}

/// Checksum/complement pairing, map mode matching the probed location,
/// plausible ROM size, printable title and a reset vector inside ROM.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardScorer;

impl StandardScorer {
    fn expected_mapping(candidate: u32) -> Option<MemoryMapping> {
        match candidate {
            0x00_7FB0 => Some(MemoryMapping::LoRom),
            0x00_FFB0 => Some(MemoryMapping::HiRom),
            0x40_FFB0 => Some(MemoryMapping::ExHiRom),
            _ => None,
        }
    }
}

impl HeaderScorer for StandardScorer {
    fn score(&self, header: &[u8], candidate: u32) -> i32 {
        let Some(view) = HeaderView::new(header) else {
            return 0;
        };
        let mut score = 0;
        if view.checksum() ^ view.complement() == 0xFFFF {
            score += 4;
        }
        let map_mode = view.map_mode();
        if map_mode & 0xE0 != 0x20 {
            score -= 2;
        } else if let Some(mapping) = mapping_from_map_mode(map_mode)
            && Some(mapping) == Self::expected_mapping(candidate)
        {
            score += 2;
        }
        if (0x07..=0x0D).contains(&view.rom_size()) {
            score += 1;
        }
        if view.title().iter().all(|b| (0x20..=0x7E).contains(b)) {
            score += 1;
        }
        match view.reset_vector() {
            Some(vector) if vector >= 0x8000 => score += 1,
            Some(_) => score -= 2,
            None => {}
        }
        score
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DetectedMapping {
    pub mapping: MemoryMapping,
    /// False when the map-mode byte was not recognised and the mapping is a
    /// fallback or a guess.
    pub confident: bool,
    pub header: Vec<u8>,
}

#[derive(Debug)]
pub enum DetectError {
    HeaderTooShort { len: usize },
    NoValidHeader,
    Device(DeviceError),
}

impl DetectError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DetectError::HeaderTooShort { .. } => ErrorKind::InvalidArgument,
            DetectError::NoValidHeader => ErrorKind::DetectionFailed,
            DetectError::Device(err) => err.kind(),
        }
    }
}

impl fmt::Display for DetectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectError::HeaderTooShort { len } => write!(
                f,
                "header must be at least {HEADER_MIN_LEN:#x} bytes, got {len:#x}"
            ),
            DetectError::NoValidHeader => write!(f, "no valid ROM header found"),
            DetectError::Device(err) => write!(f, "header probe failed: {err}"),
        }
    }
}

impl Error for DetectError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DetectError::Device(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DeviceError> for DetectError {
    fn from(value: DeviceError) -> Self {
        DetectError::Device(value)
    }
}

pub async fn detect<M: DeviceMemory + ?Sized>(
    memory: &M,
    ctx: &AccessContext,
    fallback: Option<MemoryMapping>,
    header: Option<&[u8]>,
) -> Result<DetectedMapping, DetectError> {
    detect_with(memory, ctx, fallback, header, &StandardScorer).await
}

pub async fn detect_with<M: DeviceMemory + ?Sized>(
    memory: &M,
    ctx: &AccessContext,
    fallback: Option<MemoryMapping>,
    header: Option<&[u8]>,
    scorer: &dyn HeaderScorer,
) -> Result<DetectedMapping, DetectError> {
    let header = match header {
        Some(bytes) if bytes.len() < HEADER_MIN_LEN => {
            return Err(DetectError::HeaderTooShort { len: bytes.len() });
        }
        Some(bytes) => bytes.to_vec(),
        None => probe_header(memory, ctx, scorer).await?,
    };
    Ok(classify_header(header, fallback))
}

async fn probe_header<M: DeviceMemory + ?Sized>(
    memory: &M,
    ctx: &AccessContext,
    scorer: &dyn HeaderScorer,
) -> Result<Vec<u8>, DetectError> {
    let mut best: Option<(i32, Vec<u8>)> = None;
    for mapping in MemoryMapping::KNOWN {
        for candidate in HEADER_CANDIDATES {
            let read = MemoryReadRequest::new(
                AddressTuple::pak(candidate).with_mapping(mapping),
                HEADER_PROBE_LEN,
            );
            let data = match memory.multi_read_memory(ctx, &[read]).await {
                Ok(mut responses) if !responses.is_empty() => responses.swap_remove(0).data,
                Ok(_) => continue,
                Err(err) if err.is_fatal() => return Err(err.into()),
                Err(err) => {
                    debug!(candidate, %mapping, error = %err, "header candidate skipped");
                    continue;
                }
            };
            if data.len() < HEADER_MIN_LEN {
                debug!(candidate, %mapping, len = data.len(), "header candidate too short");
                continue;
            }
            let score = scorer.score(&data, candidate);
            trace!(candidate, %mapping, score, "header candidate scored");
            if score > 0 && best.as_ref().is_none_or(|(top, _)| score > *top) {
                best = Some((score, data));
            }
        }
    }
    best.map(|(_, data)| data).ok_or(DetectError::NoValidHeader)
}

fn classify_header(header: Vec<u8>, fallback: Option<MemoryMapping>) -> DetectedMapping {
    let map_mode = header[MAP_MODE];
    let (mapping, confident) = match mapping_from_map_mode(map_mode) {
        Some(mapping) => (mapping, true),
        None => match fallback.filter(|mapping| *mapping != MemoryMapping::Unknown) {
            Some(mapping) => (mapping, false),
            None if map_mode & 1 == 1 => (MemoryMapping::HiRom, false),
            None => (MemoryMapping::LoRom, false),
        },
    };
    DetectedMapping {
        mapping,
        confident,
        header,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_with_map_mode(map_mode: u8) -> Vec<u8> {
        let mut header = vec![0u8; HEADER_MIN_LEN];
        header[MAP_MODE] = map_mode;
        header
    }

    #[test]
    fn map_mode_codes_fold_variants() {
        assert_eq!(mapping_from_map_mode(0x20), Some(MemoryMapping::LoRom));
        assert_eq!(mapping_from_map_mode(0x30), Some(MemoryMapping::LoRom), "FastROM bit ignored");
        assert_eq!(
            mapping_from_map_mode(0x22),
            Some(MemoryMapping::LoRom),
            "ExLoROM folds to LoROM"
        );
        assert_eq!(mapping_from_map_mode(0x23), Some(MemoryMapping::HiRom), "SA-1 folds to HiROM");
        assert_eq!(mapping_from_map_mode(0x35), Some(MemoryMapping::ExHiRom));
        assert_eq!(mapping_from_map_mode(0x2A), None);
    }

    #[test]
    fn unrecognised_code_prefers_fallback() {
        let detected = classify_header(header_with_map_mode(0x2A), Some(MemoryMapping::ExHiRom));
        assert_eq!(detected.mapping, MemoryMapping::ExHiRom);
        assert!(!detected.confident, "fallback is never confident");
    }

    #[test]
    fn unrecognised_code_guesses_by_parity() {
        let odd = classify_header(header_with_map_mode(0x27), None);
        assert_eq!(odd.mapping, MemoryMapping::HiRom);
        assert!(!odd.confident);
        let even = classify_header(header_with_map_mode(0x2C), Some(MemoryMapping::Unknown));
        assert_eq!(even.mapping, MemoryMapping::LoRom, "Unknown fallback counts as none");
        assert!(!even.confident);
    }

    #[test]
    fn scorer_rejects_blank_memory() {
        let scorer = StandardScorer;
        for fill in [0x00u8, 0xFF] {
            let blank = vec![fill; HEADER_PROBE_LEN];
            for candidate in HEADER_CANDIDATES {
                assert!(
                    scorer.score(&blank, candidate) <= 0,
                    "blank ${fill:02X} buffer at ${candidate:06X} is not a header"
                );
            }
        }
    }

    #[test]
    fn scorer_prefers_matching_location() {
        let mut header = vec![0u8; HEADER_PROBE_LEN];
        header[TITLE].copy_from_slice(b"TEST CARTRIDGE       ");
        header[MAP_MODE] = 0x21;
        header[ROM_SIZE] = 0x0A;
        header[COMPLEMENT..COMPLEMENT + 2].copy_from_slice(&0x1234u16.to_le_bytes());
        header[CHECKSUM..CHECKSUM + 2].copy_from_slice(&0xEDCBu16.to_le_bytes());
        header[RESET_VECTOR..RESET_VECTOR + 2].copy_from_slice(&0x8000u16.to_le_bytes());
        let scorer = StandardScorer;
        assert!(
            scorer.score(&header, 0x00_FFB0) > scorer.score(&header, 0x00_7FB0),
            "HiROM header scores best at the HiROM location"
        );
        assert!(scorer.score(&header, 0x00_7FB0) > 0);
    }
}
