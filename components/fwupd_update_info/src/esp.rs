//! Capsule file placement on the EFI System Partition.
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

use crate::{
    device_info::DeviceInfo,
    key::{guid_to_string, VARIABLE_PREFIX},
};

/// Locations searched by [`OsRelease::load_default`], in order.
pub const OS_RELEASE_PATHS: [&str; 2] = ["/etc/os-release", "/usr/lib/os-release"];

/// The fields of an `os-release` file that name the OS directory on the ESP.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsRelease {
    pub id: Option<String>,
    /// Related distributions, closest first.
    pub id_like: Vec<String>,
}

impl OsRelease {
    /// Parses `KEY=value` lines. Values may be single or double quoted; comments and unknown keys are skipped.
    pub fn parse(text: &str) -> Self {
        let mut os_release = Self::default();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = unquote(value.trim());
            match key.trim() {
                "ID" if !value.is_empty() => os_release.id = Some(value.to_string()),
                "ID_LIKE" => os_release.id_like = value.split_whitespace().map(String::from).collect(),
                _ => {}
            }
        }
        os_release
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        Ok(Self::parse(&fs::read_to_string(path)?))
    }

    /// Reads the first readable file of [`OS_RELEASE_PATHS`].
    pub fn load_default() -> Option<Self> {
        OS_RELEASE_PATHS.iter().find_map(|path| match Self::load(Path::new(path)) {
            Ok(os_release) => Some(os_release),
            Err(err) => {
                log::debug!("failed to read {path}: {err}");
                None
            }
        })
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value.strip_prefix(quote).and_then(|rest| rest.strip_suffix(quote)) {
            return inner;
        }
    }
    value
}

/// Where the OS keeps its files under `<esp>/EFI`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OsDirectory {
    /// `<esp>/EFI` itself.
    #[default]
    Root,
    /// A directory relative to the ESP, chosen at build or install time.
    Fixed(PathBuf),
    /// `<esp>/EFI/<ID>`, or the first existing `<esp>/EFI/<ID_LIKE>` when `<ID>` does not exist.
    OsRelease(OsRelease),
}

/// Directory under the ESP holding this OS's files.
pub fn esp_path_for_os(esp: &Path, os_directory: &OsDirectory) -> PathBuf {
    let efi = esp.join("EFI");
    match os_directory {
        OsDirectory::Root => efi,
        OsDirectory::Fixed(dir) => esp.join(dir.strip_prefix("/").unwrap_or(dir.as_path())),
        OsDirectory::OsRelease(os_release) => {
            let by_id = efi.join(os_release.id.as_deref().unwrap_or("unknown"));
            if by_id.is_dir() {
                return by_id;
            }
            match os_release.id_like.iter().map(|like| efi.join(like)).find(|dir| dir.is_dir()) {
                Some(by_id_like) => {
                    log::debug!("using {} in place of missing {}", by_id_like.display(), by_id.display());
                    by_id_like
                }
                None => by_id,
            }
        }
    }
}

/// Absolute path the capsule for `info` must be written to.
///
/// A record that already names a capsule file keeps using it, so the firmware entry stays valid across updates.
/// Otherwise the file is `<os directory>/fw/fwupdate-<guid>.cap`.
pub fn resolve_capsule_path(info: &DeviceInfo, esp: &Path, os_directory: &OsDirectory) -> PathBuf {
    if let Some(existing) = info.existing_capsule_path() {
        log::debug!("reusing configured capsule path {existing}");
        return esp.join(existing.trim_start_matches('/'));
    }
    let file_name = format!("{VARIABLE_PREFIX}{}.cap", guid_to_string(&info.guid()));
    let path = esp_path_for_os(esp, os_directory).join("fw").join(file_name);
    log::debug!("using default capsule path {}", path.display());
    path
}
