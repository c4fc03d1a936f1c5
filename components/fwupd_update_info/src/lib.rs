//! Firmware Update Records
//!
//! Keeps the per-device record that tells the platform firmware where to find a capsule on the next boot. The
//! record lives in a UEFI variable named after the device GUID and hardware instance, and holds an EFI device path
//! pointing at the capsule file on the EFI System Partition.
//!
//! A typical update:
//!
//! ```no_run
//! use std::path::Path;
//! use fwupd_update_info::{
//!     esp::{resolve_capsule_path, OsDirectory},
//!     generator::{EspPartition, PartitionDevicePathGenerator, PartitionSignature},
//!     UpdateInfoStore,
//! };
//! use fwupd_uefi_vars::EfivarfsStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let records = UpdateInfoStore::new(EfivarfsStore::default());
//! let mut info = records.load("ddc0ee61-e7f0-4e7d-acc5-c070a398838e", 0)?;
//!
//! let esp = Path::new("/boot/efi");
//! let capsule = resolve_capsule_path(&info, esp, &OsDirectory::Root);
//! // ... write the capsule payload to `capsule` ...
//!
//! let generator = PartitionDevicePathGenerator::new().with_partition(EspPartition {
//!     mount_point: esp.to_path_buf(),
//!     partition_number: 1,
//!     partition_start: 2048,
//!     partition_size: 1_048_576,
//!     signature: PartitionSignature::Mbr(0x1234_5678),
//! });
//! info.set_capsule_path(&generator, &capsule)?;
//! records.persist(&info)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

pub mod codec;
pub mod config;
pub mod device_info;
pub mod error;
pub mod esp;
pub mod generator;
pub mod key;
pub mod logger;
pub mod store;

pub use config::UpdateInfoConfig;
pub use device_info::DeviceInfo;
pub use error::{Result, UpdateInfoError};
pub use store::UpdateInfoStore;
