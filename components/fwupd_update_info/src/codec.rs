//! Conversion between OS file paths and the device paths stored in update records.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

use std::path::{Component, Path};

use fwupd_device_path::{
    nodes::{EndEntire, FilePath},
    DevicePathBuf, DevicePathError, Iter, END_ENTIRE_SIZE,
};

use crate::{
    error::{Result, UpdateInfoError},
    generator::DevicePathGenerator,
};

/// Encodes `path` as an abbreviated hard drive device path.
///
/// Fails with `NotSupported` when the generator cannot place `path` on a device the firmware can address, which it
/// reports by needing no more than a bare End-Entire node.
pub fn encode<G>(generator: &G, path: &Path) -> Result<DevicePathBuf>
where
    G: DevicePathGenerator + ?Sized,
{
    let generation_failed = |err: DevicePathError| {
        UpdateInfoError::NotSupported(format!("failed to generate a device path for {}: {err}", path.display()))
    };

    let unresolved =
        || UpdateInfoError::NotSupported(format!("failed to get valid device_path for ({})", path.display()));

    let required = generator.required_size(path).map_err(generation_failed)?;
    if required <= END_ENTIRE_SIZE {
        return Err(unresolved());
    }

    let mut buffer = vec![0u8; required];
    let written = generator.generate(path, &mut buffer).map_err(generation_failed)?;
    let device_path = DevicePathBuf::from_bytes(&buffer[..written])?;
    if device_path.is_end_entire() {
        return Err(unresolved());
    }
    Ok(device_path)
}

/// Recovers the file path stored in a device path, with `/` separators.
///
/// Returns `None` if the device path was never configured, holds no file path node, or the file path is not
/// valid UCS-2. Callers fall back to a default name in all of those cases, as they do for a file path that would
/// leave the partition root.
pub fn decode(bytes: &[u8]) -> Option<String> {
    for node in Iter::new(bytes) {
        if node.is::<EndEntire>() {
            return None;
        }
        if node.is::<FilePath>() {
            let path = node.cast::<FilePath>()?.into_path().replace('\\', "/");
            if !stays_below_root(&path) {
                log::debug!("ignoring stored file path {path}: not below the partition root");
                return None;
            }
            return Some(path);
        }
    }
    None
}

/// True if `path` names a file below the partition root: no `..`, no drive prefix, at least one file name.
fn stays_below_root(path: &str) -> bool {
    let mut named = false;
    for component in Path::new(path).components() {
        match component {
            Component::Normal(_) => named = true,
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir | Component::Prefix(_) => return false,
        }
    }
    named
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{EspPartition, PartitionDevicePathGenerator, PartitionSignature};
    use fwupd_device_path::{
        device_path_node::RawNode,
        nodes::{DevicePathType, HardDrive, MediaSubType},
    };
    use r_efi::efi;
    use std::path::PathBuf;

    const PARTITION_GUID: efi::Guid =
        efi::Guid::from_fields(0x12345678, 0x9abc, 0xdef0, 0x11, 0x22, &[0x33, 0x44, 0x55, 0x66, 0x77, 0x88]);

    fn generator() -> PartitionDevicePathGenerator {
        PartitionDevicePathGenerator::new().with_partition(EspPartition {
            mount_point: PathBuf::from("/boot/efi"),
            partition_number: 1,
            partition_start: 2048,
            partition_size: 1_048_576,
            signature: PartitionSignature::Gpt(PARTITION_GUID),
        })
    }

    /// Reports whatever it is told, to exercise the size handshake.
    struct FixedGenerator {
        required: core::result::Result<usize, DevicePathError>,
    }

    impl DevicePathGenerator for FixedGenerator {
        fn required_size(&self, _path: &Path) -> core::result::Result<usize, DevicePathError> {
            self.required
        }

        fn generate(&self, _path: &Path, buffer: &mut [u8]) -> core::result::Result<usize, DevicePathError> {
            DevicePathBuf::end_entire().write_to(buffer)
        }
    }

    #[test]
    fn test_round_trip() {
        let generator = generator();
        let device_path = encode(&generator, Path::new("/boot/efi/EFI/fedora/fw/fwupdate-x.cap")).unwrap();

        let nodes: Vec<_> = device_path.iter().collect();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0].cast::<HardDrive>(), Some(HardDrive::gpt(1, 2048, 1_048_576, &PARTITION_GUID)));
        assert_eq!(decode(device_path.as_bytes()).as_deref(), Some("/EFI/fedora/fw/fwupdate-x.cap"));
    }

    #[test]
    fn test_encode_outside_partition_is_not_supported() {
        let err = encode(&generator(), Path::new("/home/user/fw.cap")).unwrap_err();
        let expected = UpdateInfoError::NotSupported("failed to get valid device_path for (/home/user/fw.cap)".into());
        assert_eq!(err, expected);
    }

    #[test]
    fn test_encode_generator_failure_is_not_supported() {
        let generator = FixedGenerator { required: Err(DevicePathError::InvalidString) };
        assert!(matches!(encode(&generator, Path::new("/x")), Err(UpdateInfoError::NotSupported(_))));
    }

    #[test]
    fn test_encode_short_generation_is_rejected() {
        // Claims room for a real path but only writes End-Entire.
        let generator = FixedGenerator { required: Ok(64) };
        assert_eq!(
            encode(&generator, Path::new("/x")),
            Err(UpdateInfoError::NotSupported("failed to get valid device_path for (/x)".into()))
        );
    }

    #[test]
    fn test_decode_bare_end_is_none() {
        assert_eq!(decode(DevicePathBuf::end_entire().as_bytes()), None);
        assert_eq!(decode(&[]), None);
    }

    #[test]
    fn test_decode_without_file_node_is_none() {
        let mut device_path = DevicePathBuf::end_entire();
        device_path.append(HardDrive::mbr(1, 63, 1024, 0x1234)).unwrap();
        assert_eq!(decode(device_path.as_bytes()), None);
    }

    #[test]
    fn test_decode_malformed_ucs2_is_none() {
        let mut device_path = DevicePathBuf::end_entire();
        let odd = [b'\\', 0, b'a'];
        device_path.append(RawNode::new(DevicePathType::Media as u8, MediaSubType::FilePath as u8, &odd)).unwrap();
        assert_eq!(decode(device_path.as_bytes()), None);
    }

    #[test]
    fn test_decode_empty_file_path_is_none() {
        let mut device_path = DevicePathBuf::end_entire();
        device_path.append(FilePath::new("").unwrap()).unwrap();
        assert_eq!(decode(device_path.as_bytes()), None);
    }

    #[test]
    fn test_decode_rejects_paths_leaving_the_root() {
        for stored in ["\\..\\..\\etc\\evil", "\\EFI\\..\\..\\x.cap", "..", "\\", "\\.\\"] {
            let mut device_path = DevicePathBuf::end_entire();
            device_path.append(FilePath::new(stored).unwrap()).unwrap();
            assert_eq!(decode(device_path.as_bytes()), None, "{stored}");
        }
    }

    #[test]
    fn test_decode_keeps_current_dir_components() {
        let mut device_path = DevicePathBuf::end_entire();
        device_path.append(FilePath::new("\\EFI\\.\\fw\\a.cap").unwrap()).unwrap();
        assert_eq!(decode(device_path.as_bytes()).as_deref(), Some("/EFI/./fw/a.cap"));
    }

    #[test]
    fn test_decode_normalizes_separators() {
        let mut device_path = DevicePathBuf::end_entire();
        device_path.append(FilePath::new("\\EFI\\fw\\fwupdate-a.cap").unwrap()).unwrap();
        assert_eq!(decode(device_path.as_bytes()).as_deref(), Some("/EFI/fw/fwupdate-a.cap"));
    }
}
