//! Error type for update record operations.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

use std::fmt;

use fwupd_device_path::DevicePathError;
use fwupd_uefi_vars::VariableError;

/// Errors surfaced by update record operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateInfoError {
    /// Caller supplied input that cannot be used, such as an unparsable GUID.
    InvalidArgument(String),
    /// Stored or generated data cannot be used: bad device path size, overflow guard, unresolvable path.
    NotSupported(String),
    /// The variable store failed.
    Store { context: String, source: VariableError },
}

impl UpdateInfoError {
    /// Wraps a store failure with what was being attempted.
    pub(crate) fn store(context: impl Into<String>) -> impl FnOnce(VariableError) -> Self {
        let context = context.into();
        move |source| UpdateInfoError::Store { context, source }
    }
}

impl fmt::Display for UpdateInfoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateInfoError::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            UpdateInfoError::NotSupported(message) => write!(f, "not supported: {message}"),
            UpdateInfoError::Store { context, source } => write!(f, "{context}: {source}"),
        }
    }
}

impl std::error::Error for UpdateInfoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            UpdateInfoError::Store { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<DevicePathError> for UpdateInfoError {
    fn from(err: DevicePathError) -> Self {
        UpdateInfoError::NotSupported(format!("invalid device path: {err}"))
    }
}

pub type Result<T> = core::result::Result<T, UpdateInfoError>;
