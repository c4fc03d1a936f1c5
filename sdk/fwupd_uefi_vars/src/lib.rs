//! UEFI Variable Store
//!
//! Provides the [`VariableStore`] interface used to read, write and delete UEFI variables by
//! `(namespace, name)`, plus the backends that implement it:
//!
//! - [`RuntimeVariableStore`] adapts any [`RuntimeServices`] implementation (the firmware runtime
//!   services table, or a mock of it).
//! - [`MemoryVariableStore`] keeps variables in memory. Useful for tests and dry runs.
//! - `EfivarfsStore` (`std` feature) reads and writes the Linux efivarfs filesystem.
//!
//! ```ignore
//! use fwupd_uefi_vars::{VariableAttributes, VariableStore, FWUPDATE_NAMESPACE};
//!
//! store.set_variable(&FWUPDATE_NAMESPACE, "fwupdate-example-0", &data, VariableAttributes::PERSISTENT)?;
//! let (data, attributes) = store.get_variable(&FWUPDATE_NAMESPACE, "fwupdate-example-0")?;
//! ```
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

#![cfg_attr(all(not(test), not(feature = "std")), no_std)]

extern crate alloc;

#[cfg(feature = "std")]
mod efivarfs;
mod memory;
/// Firmware runtime services wrappers and the variable store adapter built on them.
pub mod runtime_services;

#[cfg(feature = "std")]
pub use efivarfs::{EfivarfsStore, DEFAULT_EFIVARFS_ROOT};
pub use memory::MemoryVariableStore;
pub use runtime_services::{RuntimeServices, RuntimeVariableStore, StandardRuntimeServices};

#[cfg(any(test, feature = "mockall"))]
use mockall::automock;

use alloc::{
    string::{String, ToString},
    vec::Vec,
};
use core::fmt;

use bitflags::bitflags;
use r_efi::efi;

/// Namespace GUID holding the firmware update variables (`0abba7dc-e516-4167-bbf5-4d9d1c739416`).
pub const FWUPDATE_NAMESPACE: efi::Guid =
    efi::Guid::from_fields(0x0abba7dc, 0xe516, 0x4167, 0xbb, 0xf5, &[0x4d, 0x9d, 0x1c, 0x73, 0x94, 0x16]);

/// A specialized [`Result`](core::result::Result) type for variable store operations.
pub type Result<T> = core::result::Result<T, VariableError>;

bitflags! {
    /// Attributes attached to a UEFI variable.
    ///
    /// UEFI Spec Documentation: [8.2.3. EFI_RUNTIME_SERVICES.SetVariable()](https://uefi.org/specs/UEFI/2.10/08_Services_Runtime_Services.html#setvariable)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VariableAttributes: u32 {
        /// The variable survives a reset.
        const NON_VOLATILE = 0x0000_0001;
        /// The variable is visible before ExitBootServices().
        const BOOTSERVICE_ACCESS = 0x0000_0002;
        /// The variable is visible after ExitBootServices().
        const RUNTIME_ACCESS = 0x0000_0004;
        const HARDWARE_ERROR_RECORD = 0x0000_0008;
        const TIME_BASED_AUTHENTICATED_WRITE_ACCESS = 0x0000_0020;
        const APPEND_WRITE = 0x0000_0040;
    }
}

impl VariableAttributes {
    /// Attributes required for variables that the platform firmware consumes on the next boot.
    pub const PERSISTENT: Self =
        Self::NON_VOLATILE.union(Self::BOOTSERVICE_ACCESS).union(Self::RUNTIME_ACCESS);
}

/// Errors reported by a [`VariableStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableError {
    /// The variable does not exist in the store.
    NotFound,
    /// The variable name cannot be represented by the backend.
    InvalidName(String),
    /// The firmware returned an error status.
    Firmware(efi::Status),
    /// The host backend failed.
    Io(String),
}

impl fmt::Display for VariableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableError::NotFound => write!(f, "variable not found"),
            VariableError::InvalidName(name) => write!(f, "invalid variable name '{name}'"),
            VariableError::Firmware(status) => write!(f, "firmware returned status {status:?}"),
            VariableError::Io(message) => write!(f, "variable store I/O error: {message}"),
        }
    }
}

impl core::error::Error for VariableError {}

impl From<efi::Status> for VariableError {
    fn from(status: efi::Status) -> Self {
        match status {
            efi::Status::NOT_FOUND => VariableError::NotFound,
            status => VariableError::Firmware(status),
        }
    }
}

/// Key-value access to UEFI variables.
///
/// Calls are synchronous. Callers serialize access to a given `(namespace, name)` pair.
#[cfg_attr(any(test, feature = "mockall"), automock)]
pub trait VariableStore {
    /// Returns the variable data and its attributes, or [`VariableError::NotFound`].
    fn get_variable(&self, namespace: &efi::Guid, name: &str) -> Result<(Vec<u8>, VariableAttributes)>;

    /// Creates or replaces a variable.
    fn set_variable(
        &self,
        namespace: &efi::Guid,
        name: &str,
        data: &[u8],
        attributes: VariableAttributes,
    ) -> Result<()>;

    /// Deletes a variable. Returns [`VariableError::NotFound`] if it does not exist.
    fn delete_variable(&self, namespace: &efi::Guid, name: &str) -> Result<()>;
}

impl<T: VariableStore + ?Sized> VariableStore for &T {
    fn get_variable(&self, namespace: &efi::Guid, name: &str) -> Result<(Vec<u8>, VariableAttributes)> {
        (**self).get_variable(namespace, name)
    }

    fn set_variable(
        &self,
        namespace: &efi::Guid,
        name: &str,
        data: &[u8],
        attributes: VariableAttributes,
    ) -> Result<()> {
        (**self).set_variable(namespace, name, data, attributes)
    }

    fn delete_variable(&self, namespace: &efi::Guid, name: &str) -> Result<()> {
        (**self).delete_variable(namespace, name)
    }
}

/// Formats a GUID the way variable backends name it: lowercase, hyphenated.
pub fn guid_to_string(guid: &efi::Guid) -> String {
    uuid::Uuid::from_bytes_le(*guid.as_bytes()).hyphenated().to_string()
}

pub(crate) fn invalid_name(name: &str) -> VariableError {
    VariableError::InvalidName(name.to_string())
}
