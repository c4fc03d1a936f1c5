//! Linux efivarfs variable store.
//!
//! Every variable is one file named `<name>-<namespace>` whose content is the 32-bit little-endian
//! attribute word followed by the variable data.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use r_efi::efi;

use crate::{guid_to_string, invalid_name, Result, VariableAttributes, VariableError, VariableStore};

/// Where efivarfs is mounted on a standard Linux system.
pub const DEFAULT_EFIVARFS_ROOT: &str = "/sys/firmware/efi/efivars";

const ATTRIBUTES_SIZE: usize = core::mem::size_of::<u32>();

/// [`VariableStore`] backed by an efivarfs mount (or any directory laid out the same way).
#[derive(Debug, Clone)]
pub struct EfivarfsStore {
    root: PathBuf,
}

impl EfivarfsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn variable_path(&self, namespace: &efi::Guid, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\0']) {
            return Err(invalid_name(name));
        }
        Ok(self.root.join(format!("{name}-{}", guid_to_string(namespace))))
    }
}

impl Default for EfivarfsStore {
    fn default() -> Self {
        Self::new(DEFAULT_EFIVARFS_ROOT)
    }
}

fn io_error(path: &Path, err: io::Error) -> VariableError {
    match err.kind() {
        io::ErrorKind::NotFound => VariableError::NotFound,
        _ => VariableError::Io(format!("{}: {err}", path.display())),
    }
}

/// Like [`io_error`], for writes and deletes. efivarfs marks existing variables immutable, which shows up as
/// a permission error even for root.
fn write_error(path: &Path, err: io::Error) -> VariableError {
    match err.kind() {
        io::ErrorKind::PermissionDenied => VariableError::Io(format!(
            "{}: {err} (the variable may carry the immutable flag, clear it with `chattr -i`)",
            path.display()
        )),
        _ => io_error(path, err),
    }
}

impl VariableStore for EfivarfsStore {
    fn get_variable(&self, namespace: &efi::Guid, name: &str) -> Result<(Vec<u8>, VariableAttributes)> {
        let path = self.variable_path(namespace, name)?;
        let mut content = fs::read(&path).map_err(|err| io_error(&path, err))?;
        if content.len() < ATTRIBUTES_SIZE {
            return Err(VariableError::Io(format!("{}: missing attribute header", path.display())));
        }
        let mut attributes = [0u8; ATTRIBUTES_SIZE];
        attributes.copy_from_slice(&content[..ATTRIBUTES_SIZE]);
        let data = content.split_off(ATTRIBUTES_SIZE);
        Ok((data, VariableAttributes::from_bits_retain(u32::from_le_bytes(attributes))))
    }

    fn set_variable(
        &self,
        namespace: &efi::Guid,
        name: &str,
        data: &[u8],
        attributes: VariableAttributes,
    ) -> Result<()> {
        let path = self.variable_path(namespace, name)?;
        let mut content = Vec::with_capacity(ATTRIBUTES_SIZE + data.len());
        content.extend_from_slice(&attributes.bits().to_le_bytes());
        content.extend_from_slice(data);
        // efivarfs takes the whole variable in a single write.
        fs::write(&path, &content).map_err(|err| write_error(&path, err))?;
        log::trace!("wrote {} bytes to {}", content.len(), path.display());
        Ok(())
    }

    fn delete_variable(&self, namespace: &efi::Guid, name: &str) -> Result<()> {
        let path = self.variable_path(namespace, name)?;
        fs::remove_file(&path).map_err(|err| write_error(&path, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FWUPDATE_NAMESPACE;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

    struct ScratchDir(PathBuf);

    impl ScratchDir {
        fn new() -> Self {
            let dir = std::env::temp_dir().join(format!(
                "fwupd_uefi_vars-{}-{}",
                std::process::id(),
                NEXT_DIR.fetch_add(1, Ordering::SeqCst)
            ));
            fs::create_dir_all(&dir).unwrap();
            Self(dir)
        }
    }

    impl Drop for ScratchDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    #[test]
    fn test_variable_file_layout() {
        let dir = ScratchDir::new();
        let store = EfivarfsStore::new(&dir.0);

        store.set_variable(&FWUPDATE_NAMESPACE, "fwupdate-x-0", &[0xAA, 0xBB], VariableAttributes::PERSISTENT).unwrap();

        let file = dir.0.join("fwupdate-x-0-0abba7dc-e516-4167-bbf5-4d9d1c739416");
        assert_eq!(fs::read(file).unwrap(), vec![0x07, 0, 0, 0, 0xAA, 0xBB]);
        assert_eq!(
            store.get_variable(&FWUPDATE_NAMESPACE, "fwupdate-x-0"),
            Ok((vec![0xAA, 0xBB], VariableAttributes::PERSISTENT))
        );
    }

    #[test]
    fn test_missing_variable_is_not_found() {
        let dir = ScratchDir::new();
        let store = EfivarfsStore::new(&dir.0);

        assert_eq!(store.get_variable(&FWUPDATE_NAMESPACE, "missing"), Err(VariableError::NotFound));
        assert_eq!(store.delete_variable(&FWUPDATE_NAMESPACE, "missing"), Err(VariableError::NotFound));
    }

    #[test]
    fn test_delete_removes_file() {
        let dir = ScratchDir::new();
        let store = EfivarfsStore::new(&dir.0);

        store.set_variable(&FWUPDATE_NAMESPACE, "v", &[1], VariableAttributes::NON_VOLATILE).unwrap();
        store.delete_variable(&FWUPDATE_NAMESPACE, "v").unwrap();
        assert_eq!(store.get_variable(&FWUPDATE_NAMESPACE, "v"), Err(VariableError::NotFound));
    }

    #[test]
    fn test_permission_denied_names_immutable_flag() {
        let path = Path::new("/sys/firmware/efi/efivars/v-0abba7dc-e516-4167-bbf5-4d9d1c739416");

        let VariableError::Io(message) = write_error(path, io::Error::from(io::ErrorKind::PermissionDenied)) else {
            panic!("expected an I/O error");
        };
        assert!(message.starts_with(path.to_str().unwrap()));
        assert!(message.contains("immutable"));

        assert_eq!(write_error(path, io::Error::from(io::ErrorKind::NotFound)), VariableError::NotFound);
        let VariableError::Io(message) = io_error(path, io::Error::from(io::ErrorKind::PermissionDenied)) else {
            panic!("expected an I/O error");
        };
        assert!(!message.contains("immutable"));
    }

    #[test]
    fn test_short_file_is_io_error() {
        let dir = ScratchDir::new();
        let store = EfivarfsStore::new(&dir.0);
        fs::write(dir.0.join("v-0abba7dc-e516-4167-bbf5-4d9d1c739416"), [1, 2]).unwrap();

        assert!(matches!(store.get_variable(&FWUPDATE_NAMESPACE, "v"), Err(VariableError::Io(_))));
    }

    #[test]
    fn test_names_with_separators_are_rejected() {
        let store = EfivarfsStore::default();
        assert_eq!(store.root(), Path::new(DEFAULT_EFIVARFS_ROOT));
        assert_eq!(
            store.get_variable(&FWUPDATE_NAMESPACE, "../etc/passwd"),
            Err(VariableError::InvalidName("../etc/passwd".into()))
        );
        assert_eq!(store.delete_variable(&FWUPDATE_NAMESPACE, ""), Err(VariableError::InvalidName(String::new())));
    }
}
