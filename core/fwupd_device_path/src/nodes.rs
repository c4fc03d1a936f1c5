//! Device path node types used by firmware update records.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

use alloc::string::String;
use core::fmt::{Display, Write};

use r_efi::efi;
use scroll::{
    ctx::{TryFromCtx, TryIntoCtx},
    Endian, Pread, Pwrite,
};

use crate::{
    device_path_node::{DevicePathNode, Header},
    ucs2, DevicePathError,
};

#[derive(Debug, Eq, PartialEq, Clone, Copy)]
#[repr(u8)]
pub enum DevicePathType {
    Hardware = 1,
    Acpi = 2,
    Messaging = 3,
    Media = 4,
    Bios = 5,
    End = 0x7F,
}

#[derive(Debug, Eq, PartialEq, Clone, Copy)]
#[repr(u8)]
pub enum MediaSubType {
    HardDrive = 1,
    CdRom = 2,
    Vendor = 3,
    FilePath = 4,
}

#[derive(Debug, Eq, PartialEq, Clone, Copy)]
#[repr(u8)]
pub enum EndSubType {
    Entire = 0xFF,
    Instance = 0x01,
}

/// Implements [`DevicePathNode`] for a node whose payload is written through its `TryIntoCtx` impl.
macro_rules! impl_device_path_node {
    ($node:ty, $type:expr, $sub_type:expr, |$this:ident| $length:expr) => {
        impl DevicePathNode for $node {
            fn header(&self) -> Header {
                let $this = self;
                Header::new($type as u8, $sub_type as u8, Header::size_of_header() + $length)
            }

            fn is_type(r#type: u8, sub_type: u8) -> bool {
                r#type == $type as u8 && sub_type == $sub_type as u8
            }

            fn write_into(self, buffer: &mut [u8]) -> Result<usize, scroll::Error> {
                let mut offset = 0;
                buffer.gwrite_with(self.header(), &mut offset, scroll::LE)?;
                buffer.gwrite_with(self, &mut offset, scroll::LE)?;
                Ok(offset)
            }
        }
    };
}

/// Partition table format recorded in a [`HardDrive`] node.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
#[repr(u8)]
pub enum PartitionFormat {
    Mbr = 1,
    Gpt = 2,
}

/// Kind of signature recorded in a [`HardDrive`] node.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
#[repr(u8)]
pub enum SignatureType {
    None = 0,
    Mbr = 1,
    Guid = 2,
}

/// <https://uefi.org/specs/UEFI/2.10/10_Protocols_Device_Path_Protocol.html#hard-drive-media-device-path>
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct HardDrive {
    /// Partition number, 1 based. Zero means the whole disk.
    pub partition_number: u32,
    /// Starting LBA of the partition.
    pub partition_start: u64,
    /// Size of the partition in logical blocks.
    pub partition_size: u64,
    /// GPT partition GUID, or the 32-bit MBR disk signature in the first four bytes.
    pub partition_signature: [u8; 16],
    pub partition_format: u8,
    pub signature_type: u8,
}

impl HardDrive {
    const PAYLOAD_SIZE: usize = 4 + 8 + 8 + 16 + 1 + 1;

    /// A partition on a GPT disk, identified by its unique partition GUID.
    pub fn gpt(partition_number: u32, partition_start: u64, partition_size: u64, partition_guid: &efi::Guid) -> Self {
        Self {
            partition_number,
            partition_start,
            partition_size,
            partition_signature: *partition_guid.as_bytes(),
            partition_format: PartitionFormat::Gpt as u8,
            signature_type: SignatureType::Guid as u8,
        }
    }

    /// A partition on an MBR disk, identified by the disk signature.
    pub fn mbr(partition_number: u32, partition_start: u64, partition_size: u64, disk_signature: u32) -> Self {
        let mut partition_signature = [0u8; 16];
        partition_signature[..4].copy_from_slice(&disk_signature.to_le_bytes());
        Self {
            partition_number,
            partition_start,
            partition_size,
            partition_signature,
            partition_format: PartitionFormat::Mbr as u8,
            signature_type: SignatureType::Mbr as u8,
        }
    }
}

impl_device_path_node!(HardDrive, DevicePathType::Media, MediaSubType::HardDrive, |_this| HardDrive::PAYLOAD_SIZE);

impl TryIntoCtx<Endian> for HardDrive {
    type Error = scroll::Error;

    fn try_into_ctx(self, dest: &mut [u8], ctx: Endian) -> Result<usize, Self::Error> {
        let mut offset = 0;
        dest.gwrite_with(self.partition_number, &mut offset, ctx)?;
        dest.gwrite_with(self.partition_start, &mut offset, ctx)?;
        dest.gwrite_with(self.partition_size, &mut offset, ctx)?;
        dest.gwrite_with(&self.partition_signature[..], &mut offset, ())?;
        dest.gwrite_with(self.partition_format, &mut offset, ctx)?;
        dest.gwrite_with(self.signature_type, &mut offset, ctx)?;
        Ok(offset)
    }
}

impl TryFromCtx<'_, Endian> for HardDrive {
    type Error = scroll::Error;

    fn try_from_ctx(from: &[u8], ctx: Endian) -> Result<(Self, usize), Self::Error> {
        let mut offset = 0;
        let partition_number = from.gread_with(&mut offset, ctx)?;
        let partition_start = from.gread_with(&mut offset, ctx)?;
        let partition_size = from.gread_with(&mut offset, ctx)?;
        let signature: &[u8] = from.gread_with(&mut offset, 16)?;
        let mut partition_signature = [0u8; 16];
        partition_signature.copy_from_slice(signature);
        let partition_format = from.gread_with(&mut offset, ctx)?;
        let signature_type = from.gread_with(&mut offset, ctx)?;
        Ok((
            Self {
                partition_number,
                partition_start,
                partition_size,
                partition_signature,
                partition_format,
                signature_type,
            },
            offset,
        ))
    }
}

impl Display for HardDrive {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "HD({},", self.partition_number)?;
        match self.signature_type {
            t if t == SignatureType::Guid as u8 => {
                write!(f, "GPT,{},", uuid::Uuid::from_bytes_le(self.partition_signature).hyphenated())?
            }
            t if t == SignatureType::Mbr as u8 => {
                let [a, b, c, d, ..] = self.partition_signature;
                write!(f, "MBR,0x{:08x},", u32::from_le_bytes([a, b, c, d]))?
            }
            t => write!(f, "{t},0,")?,
        }
        write!(f, "0x{:x},0x{:x})", self.partition_start, self.partition_size)
    }
}

/// <https://uefi.org/specs/UEFI/2.10/10_Protocols_Device_Path_Protocol.html#file-path-media-device-path>
///
/// The path is stored as NUL-terminated UCS-2, so it is restricted to BMP characters without NUL.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FilePath {
    path: String,
}

impl FilePath {
    /// Creates a file path node. Fails if the path cannot be stored as UCS-2 or does not fit in one node.
    pub fn new(path: &str) -> Result<Self, DevicePathError> {
        let units = ucs2::encode(path)?;
        let length = Header::size_of_header() + (units.len() + 1) * 2;
        if length > u16::MAX as usize {
            return Err(DevicePathError::TooLarge);
        }
        Ok(Self { path: String::from(path) })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn into_path(self) -> String {
        self.path
    }
}

// Every char is a single UCS-2 unit, so the char count is the unit count.
impl_device_path_node!(FilePath, DevicePathType::Media, MediaSubType::FilePath, |this| {
    (this.path.chars().count() + 1) * 2
});

impl TryIntoCtx<Endian> for FilePath {
    type Error = scroll::Error;

    fn try_into_ctx(self, dest: &mut [u8], ctx: Endian) -> Result<usize, Self::Error> {
        let mut offset = 0;
        for c in self.path.chars() {
            dest.gwrite_with(c as u16, &mut offset, ctx)?;
        }
        dest.gwrite_with(0u16, &mut offset, ctx)?; // End of string
        Ok(offset)
    }
}

impl TryFromCtx<'_, Endian> for FilePath {
    type Error = scroll::Error;

    fn try_from_ctx(from: &[u8], _ctx: Endian) -> Result<(Self, usize), Self::Error> {
        let units = ucs2::units_from_le_bytes(from)
            .ok_or(scroll::Error::BadInput { size: from.len(), msg: "odd length UCS-2 string" })?;
        let path = ucs2::decode(&units).ok_or(scroll::Error::BadInput { size: from.len(), msg: "invalid UCS-2" })?;
        Ok((Self { path }, from.len()))
    }
}

impl Display for FilePath {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.path)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct EndEntire;

impl_device_path_node!(EndEntire, DevicePathType::End, EndSubType::Entire, |_this| 0);

impl Display for EndEntire {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_char('.')
    }
}

impl TryIntoCtx<Endian> for EndEntire {
    type Error = scroll::Error;

    fn try_into_ctx(self, _: &mut [u8], _: Endian) -> Result<usize, Self::Error> {
        Ok(0)
    }
}

impl TryFromCtx<'_, Endian> for EndEntire {
    type Error = scroll::Error;

    fn try_from_ctx(_: &[u8], _: Endian) -> Result<(Self, usize), Self::Error> {
        Ok((Self, 0))
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct EndInstance;

impl_device_path_node!(EndInstance, DevicePathType::End, EndSubType::Instance, |_this| 0);

impl Display for EndInstance {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_char(';')
    }
}

impl TryIntoCtx<Endian> for EndInstance {
    type Error = scroll::Error;

    fn try_into_ctx(self, _: &mut [u8], _: Endian) -> Result<usize, Self::Error> {
        Ok(0)
    }
}

impl TryFromCtx<'_, Endian> for EndInstance {
    type Error = scroll::Error;

    fn try_from_ctx(_: &[u8], _: Endian) -> Result<(Self, usize), Self::Error> {
        Ok((Self, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device_path_node::RawNode;

    const PARTITION_GUID: efi::Guid =
        efi::Guid::from_fields(0x12345678, 0x9abc, 0xdef0, 0x11, 0x22, &[0x33, 0x44, 0x55, 0x66, 0x77, 0x88]);

    fn write<T: DevicePathNode>(node: T) -> Vec<u8> {
        let mut buffer = vec![0u8; node.header().length];
        let written = node.write_into(&mut buffer).unwrap();
        assert_eq!(written, buffer.len());
        buffer
    }

    #[test]
    fn test_hard_drive_layout() {
        let node = HardDrive::gpt(1, 0x800, 0x100000, &PARTITION_GUID);
        assert_eq!(node.header().length, 42);

        let bytes = write(node);
        assert_eq!(&bytes[..4], &[4, 1, 42, 0]);
        assert_eq!(&bytes[4..8], &1u32.to_le_bytes());
        assert_eq!(&bytes[8..16], &0x800u64.to_le_bytes());
        assert_eq!(&bytes[16..24], &0x100000u64.to_le_bytes());
        assert_eq!(&bytes[24..40], PARTITION_GUID.as_bytes());
        assert_eq!(bytes[40], PartitionFormat::Gpt as u8);
        assert_eq!(bytes[41], SignatureType::Guid as u8);

        let raw = bytes.pread_with::<RawNode>(0, scroll::LE).unwrap();
        assert_eq!(raw.cast::<HardDrive>(), Some(node));
    }

    #[test]
    fn test_hard_drive_display() {
        let gpt = HardDrive::gpt(1, 0x800, 0x100000, &PARTITION_GUID);
        assert_eq!(gpt.to_string(), "HD(1,GPT,12345678-9abc-def0-1122-334455667788,0x800,0x100000)");

        let mbr = HardDrive::mbr(2, 63, 1024, 0xDEADBEEF);
        assert_eq!(&mbr.partition_signature[..4], &[0xEF, 0xBE, 0xAD, 0xDE]);
        assert_eq!(mbr.to_string(), "HD(2,MBR,0xdeadbeef,0x3f,0x400)");
    }

    #[test]
    fn test_file_path_layout() {
        let node = FilePath::new("\\EFI\\a").unwrap();
        assert_eq!(node.header().length, 4 + 7 * 2);

        let bytes = write(node.clone());
        assert_eq!(bytes, vec![4, 4, 18, 0, b'\\', 0, b'E', 0, b'F', 0, b'I', 0, b'\\', 0, b'a', 0, 0, 0]);

        let raw = bytes.pread_with::<RawNode>(0, scroll::LE).unwrap();
        assert_eq!(raw.cast::<FilePath>(), Some(node));
        assert_eq!(raw.cast::<HardDrive>(), None);
    }

    #[test]
    fn test_file_path_rejects_unrepresentable_text() {
        assert_eq!(FilePath::new("a\0b"), Err(DevicePathError::InvalidString));
        assert_eq!(FilePath::new("\u{10000}"), Err(DevicePathError::InvalidString));
        assert_eq!(FilePath::new(&"a".repeat(u16::MAX as usize)), Err(DevicePathError::TooLarge));
    }

    #[test]
    fn test_malformed_file_path_payload_is_not_cast() {
        let odd = RawNode::new(DevicePathType::Media as u8, MediaSubType::FilePath as u8, &[b'a', 0, b'b']);
        assert_eq!(odd.cast::<FilePath>(), None);

        let surrogate = RawNode::new(DevicePathType::Media as u8, MediaSubType::FilePath as u8, &[0x3D, 0xD8, 0, 0]);
        assert_eq!(surrogate.cast::<FilePath>(), None);
    }

    #[test]
    fn test_end_nodes() {
        assert_eq!(write(EndEntire), vec![0x7F, 0xFF, 4, 0]);
        assert_eq!(write(EndInstance), vec![0x7F, 0x01, 4, 0]);
        assert!(EndEntire::is_type(0x7F, 0xFF));
        assert!(!EndEntire::is_type(0x7F, 0x01));
    }
}
