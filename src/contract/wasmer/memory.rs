/*
    Copyright © 2023, Mocknet Runtime Contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Defines the Region calling convention for moving byte buffers in and out of WASM linear memory.
//!
//! A [Region] is a 12-byte descriptor in guest memory: three little-endian u32 giving the
//! `offset` of a buffer, its `capacity` and the `length` in use. Entry points and host functions
//! exchange pointers to Regions, never raw offsets.
//!
//! Guest code may grow the memory (for example inside `allocate`), which moves the backing buffer.
//! Every access below therefore looks up the memory size and contents anew; nothing derived from
//! the memory is kept across a call into the guest.

use serde::{de::DeserializeOwned, Serialize};
use wasmer::{Array, Memory, NativeFunc, WasmPtr};

use crate::MocknetError;

/// Size in bytes of a Region descriptor.
pub const REGION_SIZE: u32 = 12;

/// Region describes a slice of one instance's linear memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Region {
    pub offset: u32,
    pub capacity: u32,
    pub length: u32,
}

impl Region {
    pub fn from_le_bytes(bytes: [u8; REGION_SIZE as usize]) -> Self {
        let word = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        Self {
            offset: word(0),
            capacity: word(4),
            length: word(8),
        }
    }

    pub fn to_le_bytes(&self) -> [u8; REGION_SIZE as usize] {
        let mut bytes = [0u8; REGION_SIZE as usize];
        bytes[0..4].copy_from_slice(&self.offset.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.capacity.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.length.to_le_bytes());
        bytes
    }

    /// Checks that the Region (found at `ptr`) fits in a memory of `memory_size` bytes and does not
    /// claim more bytes than it has room for.
    pub fn validate(&self, ptr: u32, memory_size: u64) -> Result<(), MocknetError> {
        if self.length > self.capacity {
            return Err(invalid_pointer(
                ptr,
                format!("length {} exceeds capacity {}", self.length, self.capacity),
            ));
        }
        let end = u64::from(self.offset) + u64::from(self.capacity);
        if end > memory_size {
            return Err(invalid_pointer(
                ptr,
                format!(
                    "region {}..{} is outside of the {} bytes of memory",
                    self.offset, end, memory_size
                ),
            ));
        }
        Ok(())
    }
}

/// MemoryContext gives read-write access to the linear memory of one instance, through the
/// guest's own `memory` and `allocate` exports.
pub trait MemoryContext {
    fn get_memory(&self) -> Result<&Memory, MocknetError>;
    fn get_allocate(&self) -> Result<&NativeFunc<u32, u32>, MocknetError>;

    /// Address of the contract that owns the memory, for diagnostics.
    fn owner(&self) -> &str;

    /// read the Region descriptor at `ptr`
    fn read_region_descriptor(&self, ptr: u32) -> Result<Region, MocknetError> {
        if ptr == 0 {
            return Err(invalid_pointer(ptr, "null pointer".to_string()));
        }
        let memory = self.get_memory()?;
        let bytes = read_bytes(memory, ptr, REGION_SIZE)?;
        let mut descriptor = [0u8; REGION_SIZE as usize];
        descriptor.copy_from_slice(&bytes);
        let region = Region::from_le_bytes(descriptor);
        region.validate(ptr, memory_size(memory))?;
        Ok(region)
    }

    /// read the bytes described by the Region at `ptr`
    fn read_region(&self, ptr: u32) -> Result<Vec<u8>, MocknetError> {
        let region = self.read_region_descriptor(ptr)?;
        read_bytes(self.get_memory()?, region.offset, region.length)
    }

    fn read_utf8(&self, ptr: u32, operation: &str) -> Result<String, MocknetError> {
        let bytes = self.read_region(ptr)?;
        String::from_utf8(bytes).map_err(|e| self.malformed(operation, e.to_string()))
    }

    fn read_json<T: DeserializeOwned>(&self, ptr: u32, operation: &str) -> Result<T, MocknetError> {
        let bytes = self.read_region(ptr)?;
        serde_json::from_slice(&bytes).map_err(|e| self.malformed(operation, e.to_string()))
    }

    /// allocate a Region in guest memory, copy `data` into it and return the pointer to the Region
    fn write_region(&self, data: &[u8]) -> Result<u32, MocknetError> {
        let length = u32::try_from(data.len())
            .map_err(|_| invalid_pointer(0, format!("{} bytes do not fit in a region", data.len())))?;

        let region_ptr = self.get_allocate()?.call(length).map_err(|e| MocknetError::GuestTrap {
            address: self.owner().to_string(),
            operation: "allocate".to_string(),
            message: e.message(),
        })?;

        // The allocation may have grown the memory: the descriptor is read afresh.
        let mut region = self.read_region_descriptor(region_ptr)?;
        if region.capacity < length {
            return Err(invalid_pointer(
                region_ptr,
                format!("allocated {} bytes, {} requested", region.capacity, length),
            ));
        }
        let memory = self.get_memory()?;
        write_bytes(memory, region.offset, data)?;
        region.length = length;
        write_bytes(memory, region_ptr, &region.to_le_bytes())?;
        Ok(region_ptr)
    }

    fn write_json<T: Serialize>(&self, value: &T, operation: &str) -> Result<u32, MocknetError> {
        let bytes = serde_json::to_vec(value).map_err(|e| self.malformed(operation, e.to_string()))?;
        self.write_region(&bytes)
    }

    /// copy `data` into a Region that the guest allocated beforehand and passed in at `ptr`
    fn write_to_region(&self, ptr: u32, data: &[u8]) -> Result<(), MocknetError> {
        let mut region = self.read_region_descriptor(ptr)?;
        if data.len() > region.capacity as usize {
            return Err(invalid_pointer(
                ptr,
                format!(
                    "{} bytes do not fit in a region with capacity {}",
                    data.len(),
                    region.capacity
                ),
            ));
        }
        let memory = self.get_memory()?;
        write_bytes(memory, region.offset, data)?;
        region.length = data.len() as u32;
        write_bytes(memory, ptr, &region.to_le_bytes())
    }

    fn malformed(&self, operation: &str, reason: String) -> MocknetError {
        MocknetError::MalformedPayload {
            address: self.owner().to_string(),
            operation: operation.to_string(),
            reason,
        }
    }
}

fn memory_size(memory: &Memory) -> u64 {
    memory.size().bytes().0 as u64
}

fn check_bounds(memory: &Memory, offset: u32, len: u32) -> Result<(), MocknetError> {
    let size = memory_size(memory);
    if u64::from(offset) + u64::from(len) > size {
        return Err(invalid_pointer(
            offset,
            format!("{len} bytes at {offset} are outside of the {size} bytes of memory"),
        ));
    }
    Ok(())
}

/// read bytes from memory given the offset and len of the memory location
fn read_bytes(memory: &Memory, offset: u32, len: u32) -> Result<Vec<u8>, MocknetError> {
    check_bounds(memory, offset, len)?;
    if len == 0 {
        return Ok(Vec::new());
    }
    let bytes_ptr: WasmPtr<u8, Array> = WasmPtr::new(offset);
    let bytes = bytes_ptr
        .deref(memory, 0, len)
        .ok_or_else(|| invalid_pointer(offset, "fail to read bytes from linear memory".to_string()))?;
    Ok(bytes.iter().map(|byte| byte.get()).collect())
}

fn write_bytes(memory: &Memory, offset: u32, data: &[u8]) -> Result<(), MocknetError> {
    let len = data.len() as u32;
    check_bounds(memory, offset, len)?;
    if len == 0 {
        return Ok(());
    }
    let bytes_ptr: WasmPtr<u8, Array> = WasmPtr::new(offset);
    let segment = bytes_ptr
        .deref(memory, 0, len)
        .ok_or_else(|| invalid_pointer(offset, "fail to dereference linear memory".to_string()))?;
    for (cell, byte) in segment.iter().zip(data) {
        cell.set(*byte);
    }
    Ok(())
}

fn invalid_pointer(ptr: u32, reason: String) -> MocknetError {
    MocknetError::InvalidPointer { ptr, reason }
}
