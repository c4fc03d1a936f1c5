//! Loading and persisting update records through a [`VariableStore`].
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

use fwupd_uefi_vars::{VariableAttributes, VariableError, VariableStore, FWUPDATE_NAMESPACE};

use crate::{
    config::UpdateInfoConfig,
    device_info::{stored_version, DeviceInfo, MIN_RECORD_SIZE},
    error::{Result, UpdateInfoError},
    key,
};

/// One read of the stored record plus one after a stale record has been deleted.
const MAX_LOAD_ATTEMPTS: usize = 2;

/// Update records of every device, kept in the firmware update variable namespace.
///
/// Operations on the same device must be serialized by the caller.
#[derive(Debug)]
pub struct UpdateInfoStore<S: VariableStore> {
    store: S,
    config: UpdateInfoConfig,
}

impl<S: VariableStore> UpdateInfoStore<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, UpdateInfoConfig::default())
    }

    pub fn with_config(store: S, config: UpdateInfoConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &UpdateInfoConfig {
        &self.config
    }

    /// Returns the record of a device, or a fresh default record if none is stored.
    ///
    /// A stored record that is too small, of another version, or that names another device is deleted and replaced
    /// by a default record.
    /// The default record is not persisted.
    pub fn load(&self, guid: &str, hardware_instance: u64) -> Result<DeviceInfo> {
        let packed_guid = key::parse_guid(guid)?;
        let name = key::build_key(&packed_guid, hardware_instance);

        for _ in 0..MAX_LOAD_ATTEMPTS {
            let data = match self.store.get_variable(&FWUPDATE_NAMESPACE, &name) {
                Ok((data, _)) => data,
                Err(VariableError::NotFound) => {
                    log::debug!("no saved state for {name}, creating a new record");
                    return Ok(DeviceInfo::new_default(packed_guid, hardware_instance, &self.config));
                }
                Err(err) => return Err(UpdateInfoError::store(format!("failed to read EFI variable {name}"))(err)),
            };

            if data.len() < MIN_RECORD_SIZE {
                log::debug!("uefi saved state size mismatch for {name}: {} bytes", data.len());
            } else if stored_version(&data) != Some(self.config.version) {
                log::debug!("uefi saved state version mismatch for {name}");
            } else {
                let info = DeviceInfo::from_bytes(&data, &self.config)?;
                if info.guid() == packed_guid && info.hardware_instance() == hardware_instance {
                    return Ok(info);
                }
                log::debug!("uefi saved state identity mismatch for {name}");
            }
            self.delete_variable(&name)?;
        }

        Err(UpdateInfoError::NotSupported(format!("saved state for {name} is still invalid after recreating it")))
    }

    /// Writes `info` to the store as non-volatile, boot service and runtime accessible.
    pub fn persist(&self, info: &DeviceInfo) -> Result<()> {
        let bytes = info.to_bytes(&self.config)?;
        let name = key::build_key(&info.guid(), info.hardware_instance());
        self.store
            .set_variable(&FWUPDATE_NAMESPACE, &name, &bytes, VariableAttributes::PERSISTENT)
            .map_err(UpdateInfoError::store(format!("failed to write EFI variable {name}")))?;
        log::info!("saved update info {name} ({} bytes)", bytes.len());
        Ok(())
    }

    /// Removes the record of a device. Removing a record that does not exist succeeds.
    pub fn delete(&self, guid: &str, hardware_instance: u64) -> Result<()> {
        let packed_guid = key::parse_guid(guid)?;
        self.delete_variable(&key::build_key(&packed_guid, hardware_instance))
    }

    fn delete_variable(&self, name: &str) -> Result<()> {
        match self.store.delete_variable(&FWUPDATE_NAMESPACE, name) {
            Ok(()) | Err(VariableError::NotFound) => Ok(()),
            Err(err) => Err(UpdateInfoError::store(format!("failed to delete EFI variable {name}"))(err)),
        }
    }
}
