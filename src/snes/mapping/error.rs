use std::{error::Error, fmt};

use crate::snes::address::{AddressSpace, MemoryMapping};

pub type MappingResult<T> = Result<T, MappingError>;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MappingError {
    /// The address falls outside every region the mapping defines.
    Unmapped {
        address: u32,
        mapping: MemoryMapping,
    },
    /// Translation between bus and pak space was requested without a mapping.
    UnknownMapping {
        address: u32,
    },
    UnsupportedSpace {
        space: AddressSpace,
    },
    /// The pak address resolves to a region no transport can address by type.
    Unclassified {
        address: u32,
    },
}

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingError::Unmapped { address, mapping } => {
                write!(f, "address ${address:06X} is not mapped under {mapping}")
            }
            MappingError::UnknownMapping { address } => write!(
                f,
                "address ${address:06X} cannot be translated without a memory mapping"
            ),
            MappingError::UnsupportedSpace { space } => {
                write!(f, "address space {space} cannot be translated")
            }
            MappingError::Unclassified { address } => {
                write!(f, "pak address ${address:06X} has no known memory type")
            }
        }
    }
}

impl Error for MappingError {}
