//! EFI Device Path Building and Parsing
//!
//! A device path is a sequence of self-describing nodes (`[type][sub_type][length: u16 LE][payload]`) terminated by
//! an End-Entire node. Firmware update records store one to tell the platform firmware where the capsule file lives.
//!
//! This crate only trusts what it can verify: sizes are computed by walking the node headers with checked
//! arithmetic, and every malformed input is reported as a [`DevicePathError`].
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod device_path_node;
pub mod nodes;
pub mod ucs2;

use alloc::vec::Vec;
use core::fmt::{self, Display};

use scroll::Pread;

use device_path_node::{DevicePathNode, Header, RawNode};
use nodes::{EndEntire, FilePath, HardDrive};

/// Size in bytes of a bare End-Entire node.
pub const END_ENTIRE_SIZE: usize = Header::size_of_header();

/// Errors reported while building or parsing a device path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DevicePathError {
    /// A node header or payload extends past the end of the buffer.
    Truncated,
    /// A node reports a length smaller than its own header.
    InvalidNodeLength,
    /// The buffer ends without an End-Entire node.
    MissingEnd,
    /// The destination buffer cannot hold the device path.
    BufferTooSmall,
    /// The node or path does not fit the 16-bit node length.
    TooLarge,
    /// The text cannot be stored as UCS-2.
    InvalidString,
}

impl Display for DevicePathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            DevicePathError::Truncated => "device path node extends past the end of the buffer",
            DevicePathError::InvalidNodeLength => "device path node is shorter than its header",
            DevicePathError::MissingEnd => "device path has no end node",
            DevicePathError::BufferTooSmall => "buffer too small for device path",
            DevicePathError::TooLarge => "device path node too large",
            DevicePathError::InvalidString => "string cannot be encoded as UCS-2",
        };
        f.write_str(message)
    }
}

impl core::error::Error for DevicePathError {}

pub type Result<T> = core::result::Result<T, DevicePathError>;

/// Returns the size in bytes of the device path at the start of `bytes`, End-Entire node included.
///
/// Bytes past the End-Entire node are ignored.
pub fn device_path_size(bytes: &[u8]) -> Result<usize> {
    let mut offset: usize = 0;
    loop {
        if offset == bytes.len() {
            return Err(DevicePathError::MissingEnd);
        }
        let header = bytes.pread_with::<Header>(offset, scroll::LE).map_err(|_| DevicePathError::Truncated)?;
        if header.length < Header::size_of_header() {
            return Err(DevicePathError::InvalidNodeLength);
        }
        offset = offset.checked_add(header.length).ok_or(DevicePathError::TooLarge)?;
        if offset > bytes.len() {
            return Err(DevicePathError::Truncated);
        }
        if EndEntire::is_type(header.r#type, header.sub_type) {
            return Ok(offset);
        }
    }
}

/// An owned, always terminated device path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevicePathBuf {
    buffer: Vec<u8>,
}

impl DevicePathBuf {
    /// A device path holding only the End-Entire node.
    pub fn end_entire() -> Self {
        Self::with_capacity(END_ENTIRE_SIZE)
    }

    /// A device path holding only the End-Entire node, with room reserved for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut buffer = Vec::with_capacity(capacity.max(END_ENTIRE_SIZE));
        buffer.extend_from_slice(&[nodes::DevicePathType::End as u8, nodes::EndSubType::Entire as u8, 4, 0]);
        Self { buffer }
    }

    /// Copies the device path at the start of `bytes` after validating every node header.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let size = device_path_size(bytes)?;
        Ok(Self { buffer: bytes[..size].to_vec() })
    }

    /// Inserts `node` before the End-Entire node.
    pub fn append<T: DevicePathNode>(&mut self, node: T) -> Result<()> {
        let header = node.header();
        if header.length > u16::MAX as usize {
            return Err(DevicePathError::TooLarge);
        }
        if header.length < Header::size_of_header() {
            return Err(DevicePathError::InvalidNodeLength);
        }

        let mut bytes = alloc::vec![0u8; header.length];
        let written = node.write_into(&mut bytes).map_err(|_| DevicePathError::BufferTooSmall)?;
        if written != header.length {
            return Err(DevicePathError::InvalidNodeLength);
        }

        let insert_at = self.buffer.len() - END_ENTIRE_SIZE;
        self.buffer.splice(insert_at..insert_at, bytes);
        Ok(())
    }

    /// Writes the device path to the start of `buffer`, returning the number of bytes written.
    pub fn write_to(&self, buffer: &mut [u8]) -> Result<usize> {
        let destination = buffer.get_mut(..self.size()).ok_or(DevicePathError::BufferTooSmall)?;
        destination.copy_from_slice(&self.buffer);
        Ok(self.size())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Size in bytes, End-Entire node included.
    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes reserved for the path without reallocating.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// True if the path holds nothing but the End-Entire node.
    pub fn is_end_entire(&self) -> bool {
        self.size() == END_ENTIRE_SIZE
    }

    /// Iterate through every node, the End-Entire node included.
    pub fn iter(&self) -> Iter<'_> {
        Iter::new(&self.buffer)
    }
}

impl Default for DevicePathBuf {
    fn default() -> Self {
        Self::end_entire()
    }
}

impl AsRef<[u8]> for DevicePathBuf {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl Display for DevicePathBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for node in self.iter().filter(|node| node.header.r#type != nodes::DevicePathType::End as u8) {
            if !first {
                f.write_str("/")?;
            }
            first = false;
            if let Some(hard_drive) = node.cast::<HardDrive>() {
                write!(f, "{hard_drive}")?;
            } else if let Some(file_path) = node.cast::<FilePath>() {
                write!(f, "{file_path}")?;
            } else {
                write!(f, "{node}")?;
            }
        }
        Ok(())
    }
}

/// Device path node iterator.
///
/// Stops after the End-Entire node, or at the first node that cannot be read.
pub struct Iter<'a> {
    buffer: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> Iter<'a> {
    /// Walks the nodes of an unvalidated byte buffer.
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, offset: 0, done: false }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = RawNode<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.buffer.len() {
            return None;
        }

        let buffer = self.buffer;
        let Ok(node) = buffer.gread_with::<RawNode>(&mut self.offset, scroll::LE) else {
            log::debug!("device path corrupted at offset {}", self.offset);
            self.done = true;
            return None;
        };

        if node.is::<EndEntire>() {
            self.done = true;
        }
        Some(node)
    }
}
