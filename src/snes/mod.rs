//! SNES address model: spaces and mappings, per-mapping translation, region
//! classification and header-based mapping detection.
pub mod address;
pub mod header;
pub mod mapping;
pub mod memory;

pub use address::{AddressSpace, AddressTuple, MemoryMapping, translate};
pub use header::{DetectError, DetectedMapping, HeaderScorer, StandardScorer, detect, detect_with};
pub use memory::{MemoryType, ResolvedAddress, classify_pak_address, resolve_address};
