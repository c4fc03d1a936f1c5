//! Platform device path generation for files on an EFI System Partition.
//!
//! The firmware can only load a capsule from a partition it can find on its own, so a file is described by the
//! abbreviated hard drive form: a HardDrive node identifying the partition, then a FilePath node relative to the
//! partition root.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

use std::path::{Component, Path, PathBuf};

use fwupd_device_path::{
    nodes::{FilePath, HardDrive},
    DevicePathBuf, DevicePathError,
};
use r_efi::efi;

/// Produces device paths for OS file paths.
///
/// Implementations report a path they cannot address by producing a bare End-Entire node rather than an error.
pub trait DevicePathGenerator {
    /// Bytes needed to hold the device path of `path`.
    fn required_size(&self, path: &Path) -> Result<usize, DevicePathError>;

    /// Writes the device path of `path` into `buffer`, returning the number of bytes written.
    fn generate(&self, path: &Path, buffer: &mut [u8]) -> Result<usize, DevicePathError>;
}

/// How the partition is identified on its disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionSignature {
    /// Unique partition GUID from the GPT entry.
    Gpt(efi::Guid),
    /// 32-bit MBR disk signature.
    Mbr(u32),
}

/// A mounted EFI System Partition and its on-disk geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EspPartition {
    pub mount_point: PathBuf,
    pub partition_number: u32,
    /// Starting LBA.
    pub partition_start: u64,
    /// Size in LBAs.
    pub partition_size: u64,
    pub signature: PartitionSignature,
}

impl EspPartition {
    fn hard_drive(&self) -> HardDrive {
        match self.signature {
            PartitionSignature::Gpt(guid) => {
                HardDrive::gpt(self.partition_number, self.partition_start, self.partition_size, &guid)
            }
            PartitionSignature::Mbr(signature) => {
                HardDrive::mbr(self.partition_number, self.partition_start, self.partition_size, signature)
            }
        }
    }
}

/// [`DevicePathGenerator`] over a fixed set of known partitions.
#[derive(Debug, Clone, Default)]
pub struct PartitionDevicePathGenerator {
    partitions: Vec<EspPartition>,
}

impl PartitionDevicePathGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_partition(mut self, partition: EspPartition) -> Self {
        self.partitions.push(partition);
        self
    }

    pub fn add_partition(&mut self, partition: EspPartition) {
        self.partitions.push(partition);
    }

    pub fn partitions(&self) -> &[EspPartition] {
        &self.partitions
    }

    /// The innermost partition whose mount point contains `path`, and `path` relative to it.
    fn find<'a>(&'a self, path: &'a Path) -> Option<(&'a EspPartition, &'a Path)> {
        self.partitions
            .iter()
            .filter_map(|partition| {
                path.strip_prefix(&partition.mount_point).ok().map(|relative| (partition, relative))
            })
            .max_by_key(|(partition, _)| partition.mount_point.components().count())
    }

    fn build(&self, path: &Path) -> Result<DevicePathBuf, DevicePathError> {
        let Some((partition, relative)) = self.find(path) else {
            log::debug!("{} is not on a known EFI system partition", path.display());
            return Ok(DevicePathBuf::end_entire());
        };
        let Some(file_path) = firmware_file_path(relative) else {
            log::debug!("{} cannot be expressed relative to {}", path.display(), partition.mount_point.display());
            return Ok(DevicePathBuf::end_entire());
        };

        let mut device_path = DevicePathBuf::end_entire();
        device_path.append(partition.hard_drive())?;
        device_path.append(FilePath::new(&file_path)?)?;
        Ok(device_path)
    }
}

impl DevicePathGenerator for PartitionDevicePathGenerator {
    fn required_size(&self, path: &Path) -> Result<usize, DevicePathError> {
        Ok(self.build(path)?.size())
    }

    fn generate(&self, path: &Path, buffer: &mut [u8]) -> Result<usize, DevicePathError> {
        self.build(path)?.write_to(buffer)
    }
}

/// `EFI/fw/a.cap` becomes `\EFI\fw\a.cap`. Only plain, UTF-8 components below the partition root qualify.
fn firmware_file_path(relative: &Path) -> Option<String> {
    let mut file_path = String::new();
    for component in relative.components() {
        match component {
            Component::Normal(name) => {
                file_path.push('\\');
                file_path.push_str(name.to_str()?);
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (!file_path.is_empty()).then_some(file_path)
}
