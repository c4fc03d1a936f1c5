//! The persisted update record.
//!
//! Wire layout, little-endian, no padding:
//!
//! | Offset | Size | Field |
//! |---|---|---|
//! | 0 | 4 | version |
//! | 4 | 16 | device GUID, packed firmware form |
//! | 20 | 8 | hardware instance |
//! | 28 | n | device path, terminated by End-Entire |
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

use std::path::Path;

use fwupd_device_path::{device_path_size, DevicePathBuf, END_ENTIRE_SIZE};
use r_efi::efi;
use scroll::{Pread, Pwrite};

use crate::{
    codec,
    config::UpdateInfoConfig,
    error::{Result, UpdateInfoError},
    generator::DevicePathGenerator,
};

/// Size of the fixed record header.
pub const HEADER_SIZE: usize = 4 + 16 + 8;

/// Smallest stored record that can be valid: a header and a bare End-Entire node.
pub const MIN_RECORD_SIZE: usize = HEADER_SIZE + END_ENTIRE_SIZE;

/// Update state of one device, identified by GUID and hardware instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    version: u32,
    guid: efi::Guid,
    hardware_instance: u64,
    device_path: DevicePathBuf,
}

impl DeviceInfo {
    /// A record that has never been configured: its device path holds only End-Entire.
    pub fn new_default(guid: efi::Guid, hardware_instance: u64, config: &UpdateInfoConfig) -> Self {
        Self {
            version: config.version,
            guid,
            hardware_instance,
            device_path: DevicePathBuf::with_capacity(config.default_device_path_capacity),
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn guid(&self) -> efi::Guid {
        self.guid
    }

    pub fn hardware_instance(&self) -> u64 {
        self.hardware_instance
    }

    pub fn device_path(&self) -> &DevicePathBuf {
        &self.device_path
    }

    /// Replaces the device path. The previous buffer is dropped.
    pub fn set_device_path(&mut self, device_path: DevicePathBuf) {
        self.device_path = device_path;
    }

    /// Points the record at the capsule file `path`.
    pub fn set_capsule_path<G>(&mut self, generator: &G, path: &Path) -> Result<()>
    where
        G: DevicePathGenerator + ?Sized,
    {
        let device_path = codec::encode(generator, path)?;
        self.set_device_path(device_path);
        Ok(())
    }

    /// ESP-relative path of the capsule file, if one was configured.
    pub fn existing_capsule_path(&self) -> Option<String> {
        codec::decode(self.device_path.as_bytes())
    }

    /// Serializes the record. The device path size is validated exactly as on load.
    pub fn to_bytes(&self, config: &UpdateInfoConfig) -> Result<Vec<u8>> {
        let dp_size = device_path_size(self.device_path.as_bytes())?;
        check_device_path_size(dp_size, config)?;

        let mut bytes = vec![0u8; HEADER_SIZE + dp_size];
        let mut offset = 0;
        write_header(&mut bytes, &mut offset, self).map_err(|err| {
            UpdateInfoError::NotSupported(format!("failed to serialize update info header: {err}"))
        })?;
        bytes[offset..].copy_from_slice(&self.device_path.as_bytes()[..dp_size]);
        Ok(bytes)
    }

    /// Parses a stored record. Only the device path is validated, the caller checks the version.
    pub fn from_bytes(bytes: &[u8], config: &UpdateInfoConfig) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(UpdateInfoError::NotSupported(format!("update info size {} too small", bytes.len())));
        }
        let mut offset = 0;
        let (version, guid, hardware_instance) = read_header(bytes, &mut offset)
            .map_err(|err| UpdateInfoError::NotSupported(format!("failed to parse update info header: {err}")))?;

        let trailing = &bytes[offset..];
        let dp_size = device_path_size(trailing)
            .map_err(|err| UpdateInfoError::NotSupported(format!("failed to get DP size: {err}")))?;
        check_device_path_size(dp_size, config)?;

        Ok(Self { version, guid, hardware_instance, device_path: DevicePathBuf::from_bytes(trailing)? })
    }
}

/// Reads the version of a stored record, if the blob is long enough to hold one.
pub(crate) fn stored_version(bytes: &[u8]) -> Option<u32> {
    bytes.pread_with::<u32>(0, scroll::LE).ok()
}

/// Guards against overflow and firmware-owned sizes the platform would never produce.
pub(crate) fn check_device_path_size(dp_size: usize, config: &UpdateInfoConfig) -> Result<()> {
    if dp_size < END_ENTIRE_SIZE {
        return Err(UpdateInfoError::NotSupported(format!("EFI DP size {dp_size} impossible")));
    }
    let total = dp_size.checked_add(HEADER_SIZE).filter(|total| *total <= isize::MAX as usize);
    if total.is_none() || dp_size > config.max_device_path_size() {
        return Err(UpdateInfoError::NotSupported(format!("device path size ({dp_size}) would overflow")));
    }
    Ok(())
}

fn write_header(bytes: &mut [u8], offset: &mut usize, info: &DeviceInfo) -> core::result::Result<(), scroll::Error> {
    bytes.gwrite_with(info.version, offset, scroll::LE)?;
    bytes.gwrite_with(&info.guid.as_bytes()[..], offset, ())?;
    bytes.gwrite_with(info.hardware_instance, offset, scroll::LE)?;
    Ok(())
}

fn read_header(bytes: &[u8], offset: &mut usize) -> core::result::Result<(u32, efi::Guid, u64), scroll::Error> {
    let version = bytes.gread_with::<u32>(offset, scroll::LE)?;
    let guid: &[u8] = bytes.gread_with(offset, 16)?;
    let mut guid_bytes = [0u8; 16];
    guid_bytes.copy_from_slice(guid);
    let hardware_instance = bytes.gread_with::<u64>(offset, scroll::LE)?;
    Ok((version, efi::Guid::from_bytes(&guid_bytes), hardware_instance))
}
