//! Variable names and GUID text forms.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

use r_efi::efi;

use crate::error::{Result, UpdateInfoError};

/// Prefix shared by every update record variable and default capsule file name.
pub const VARIABLE_PREFIX: &str = "fwupdate-";

/// Builds the variable name of the record for a device: `fwupdate-<guid>-<hardware instance>`.
///
/// The GUID is formatted from its packed form, lowercase and hyphenated, so every spelling accepted by
/// [`parse_guid`] maps to the same variable.
pub fn build_key(guid: &efi::Guid, hardware_instance: u64) -> String {
    format!("{VARIABLE_PREFIX}{}-{hardware_instance}", guid_to_string(guid))
}

/// Parses the textual GUID of a device into its packed firmware form.
pub fn parse_guid(guid: &str) -> Result<efi::Guid> {
    let uuid = uuid::Uuid::parse_str(guid.trim())
        .map_err(|err| UpdateInfoError::InvalidArgument(format!("failed to convert {guid}: {err}")))?;
    Ok(efi::Guid::from_bytes(&uuid.to_bytes_le()))
}

/// Canonical text form of a packed GUID.
pub fn guid_to_string(guid: &efi::Guid) -> String {
    fwupd_uefi_vars::guid_to_string(guid)
}
