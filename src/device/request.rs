use crate::snes::address::AddressTuple;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MemoryReadRequest {
    pub request_address: AddressTuple,
    pub size: usize,
}

impl MemoryReadRequest {
    pub fn new(request_address: AddressTuple, size: usize) -> Self {
        Self {
            request_address,
            size,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MemoryReadResponse {
    pub request_address: AddressTuple,
    /// Where the bytes were read from, always in pak space.
    pub device_address: AddressTuple,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MemoryWriteRequest {
    pub request_address: AddressTuple,
    pub data: Vec<u8>,
}

impl MemoryWriteRequest {
    pub fn new(request_address: AddressTuple, data: impl Into<Vec<u8>>) -> Self {
        Self {
            request_address,
            data: data.into(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MemoryWriteResponse {
    pub request_address: AddressTuple,
    pub device_address: AddressTuple,
    pub size: usize,
}

/// Implemented by both request kinds so batching code can treat them alike.
pub trait MemoryRequest {
    fn request_address(&self) -> AddressTuple;
    fn size(&self) -> usize;
}

impl MemoryRequest for MemoryReadRequest {
    fn request_address(&self) -> AddressTuple {
        self.request_address
    }

    fn size(&self) -> usize {
        self.size
    }
}

impl MemoryRequest for MemoryWriteRequest {
    fn request_address(&self) -> AddressTuple {
        self.request_address
    }

    fn size(&self) -> usize {
        self.data.len()
    }
}
