//! UCS-2 conversion for strings embedded in device path nodes.
//!
//! UCS-2 is UTF-16 without surrogate pairs: every character is exactly one 16-bit unit, which
//! limits the character set to the Basic Multilingual Plane.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

use alloc::{string::String, vec::Vec};

use crate::{DevicePathError, Result};

/// Encodes `text` as UCS-2 code units, without a terminator.
///
/// Fails with [`DevicePathError::InvalidString`] if `text` contains NUL or a character outside the BMP.
pub fn encode(text: &str) -> Result<Vec<u16>> {
    text.chars()
        .map(|c| match u16::try_from(u32::from(c)) {
            Ok(0) | Err(_) => Err(DevicePathError::InvalidString),
            Ok(unit) => Ok(unit),
        })
        .collect()
}

/// Decodes UCS-2 code units up to the first NUL (or the end of the slice).
///
/// Returns `None` for surrogate code units, which have no meaning in UCS-2.
pub fn decode(units: &[u16]) -> Option<String> {
    units.iter().take_while(|&&unit| unit != 0).map(|&unit| char::from_u32(u32::from(unit))).collect()
}

/// Splits little-endian bytes into 16-bit code units. Returns `None` for an odd byte count.
pub fn units_from_le_bytes(bytes: &[u8]) -> Option<Vec<u16>> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    Some(bytes.chunks_exact(2).map(|pair| u16::from_le_bytes([pair[0], pair[1]])).collect())
}
