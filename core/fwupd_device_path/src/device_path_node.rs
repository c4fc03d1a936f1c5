//! Device path node header, the node trait, and the untyped node view used while walking a path.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

use core::{
    fmt::{Debug, Display, Write},
    mem,
};

use scroll::{
    ctx::{TryFromCtx, TryIntoCtx},
    Endian, Pread, Pwrite,
};

/// Common header of device path nodes.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Header {
    /// Type of the device path node.
    pub r#type: u8,
    /// Subtype of the device path node.
    pub sub_type: u8,
    /// Total length in bytes of the device path node, including the header.
    pub length: usize,
}

impl Header {
    pub const fn new(r#type: u8, sub_type: u8, length: usize) -> Self {
        Self { r#type, sub_type, length }
    }

    /// Return the size of the header in bytes.
    pub const fn size_of_header() -> usize {
        mem::size_of::<u8>() + mem::size_of::<u8>() + mem::size_of::<u16>()
    }
}

impl TryIntoCtx<Endian> for Header {
    type Error = scroll::Error;

    fn try_into_ctx(self, dest: &mut [u8], ctx: Endian) -> Result<usize, Self::Error> {
        // The on-disk length is 16 bits wide, never write a truncated value.
        let length = u16::try_from(self.length)
            .map_err(|_| scroll::Error::TooBig { size: self.length, len: u16::MAX as usize })?;
        let mut offset = 0;
        dest.gwrite_with(self.r#type, &mut offset, ctx)?;
        dest.gwrite_with(self.sub_type, &mut offset, ctx)?;
        dest.gwrite_with(length, &mut offset, ctx)?;
        Ok(offset)
    }
}

impl TryFromCtx<'_, Endian> for Header {
    type Error = scroll::Error;

    fn try_from_ctx(from: &[u8], ctx: Endian) -> Result<(Self, usize), Self::Error> {
        let mut offset = 0;
        Ok((
            Header {
                r#type: from.gread_with(&mut offset, ctx)?,
                sub_type: from.gread_with(&mut offset, ctx)?,
                length: from.gread_with::<u16>(&mut offset, ctx)? as usize,
            },
            offset,
        ))
    }
}

/// Trait that every device path node implements.
pub trait DevicePathNode: Debug + Display {
    /// Return the header of the device path node.
    fn header(&self) -> Header;

    /// Return true if this device path node has the same type and sub_type.
    fn is_type(r#type: u8, sub_type: u8) -> bool
    where
        Self: Sized;

    /// Write the device path node into the buffer and return the number of bytes written.
    fn write_into(self, buffer: &mut [u8]) -> Result<usize, scroll::Error>;
}

/// A node as found in a device path buffer, before it is interpreted as a specific type.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RawNode<'a> {
    pub header: Header,
    /// Node payload, the bytes following the header.
    pub data: &'a [u8],
}

impl<'a> RawNode<'a> {
    /// Creates a node with the given type and payload. The header length is derived from the payload.
    pub fn new(r#type: u8, sub_type: u8, data: &'a [u8]) -> Self {
        Self { header: Header::new(r#type, sub_type, Header::size_of_header() + data.len()), data }
    }

    /// Return true if this node is a `T`.
    pub fn is<T: DevicePathNode>(&self) -> bool {
        T::is_type(self.header.r#type, self.header.sub_type)
    }

    /// Interpret the payload as a `T`. Returns `None` if the type does not match or the payload is malformed.
    pub fn cast<T>(&self) -> Option<T>
    where
        T: DevicePathNode + TryFromCtx<'a, Endian, Error = scroll::Error>,
    {
        if !self.is::<T>() {
            return None;
        }
        self.data.pread_with::<T>(0, scroll::LE).ok()
    }
}

impl DevicePathNode for RawNode<'_> {
    fn header(&self) -> Header {
        self.header
    }

    fn is_type(_type: u8, _sub_type: u8) -> bool {
        // A raw node can hold any type.
        true
    }

    fn write_into(self, buffer: &mut [u8]) -> Result<usize, scroll::Error> {
        let mut offset = 0;
        buffer.gwrite_with(self, &mut offset, scroll::LE)?;
        Ok(offset)
    }
}

impl TryIntoCtx<Endian> for RawNode<'_> {
    type Error = scroll::Error;

    fn try_into_ctx(self, dest: &mut [u8], ctx: Endian) -> Result<usize, Self::Error> {
        let mut offset = 0;
        dest.gwrite_with(self.header, &mut offset, ctx)?;
        dest.gwrite_with(self.data, &mut offset, ())?;
        Ok(offset)
    }
}

impl<'a> TryFromCtx<'a, Endian> for RawNode<'a> {
    type Error = scroll::Error;

    fn try_from_ctx(from: &'a [u8], ctx: Endian) -> Result<(Self, usize), Self::Error> {
        let mut offset = 0;
        let header = from.gread_with::<Header>(&mut offset, ctx)?;
        if header.length < offset {
            return Err(scroll::Error::BadInput { size: header.length, msg: "node shorter than its header" });
        }
        if header.length > from.len() {
            return Err(scroll::Error::TooBig { size: header.length, len: from.len() });
        }
        Ok((RawNode { header, data: &from[offset..header.length] }, header.length))
    }
}

impl Display for RawNode<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Path({}, {},", self.header.r#type, self.header.sub_type)?;
        for b in self.data {
            write!(f, " {b:02X}")?;
        }
        f.write_char(')')
    }
}
