//! Tunables for record creation and validation.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

/// Record format version understood by the platform firmware.
pub const CURRENT_VERSION: u32 = 7;

/// Page size used for the device path size ceiling.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Number of pages a stored device path may span.
pub const DEFAULT_PAGE_CEILING_PAGES: usize = 100;

/// Room reserved for the device path of a newly created record.
pub const DEFAULT_DEVICE_PATH_CAPACITY: usize = 1024;

/// Configuration passed to record creation, validation and serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateInfoConfig {
    /// Version written to, and required from, stored records.
    pub version: u32,
    /// Platform page size in bytes.
    pub page_size: usize,
    /// A device path larger than `page_size * page_ceiling_pages` bytes is rejected on load and persist.
    pub page_ceiling_pages: usize,
    /// Capacity of the device path buffer of a default record. Only a reservation, never a size limit.
    pub default_device_path_capacity: usize,
}

impl UpdateInfoConfig {
    pub const fn new() -> Self {
        Self {
            version: CURRENT_VERSION,
            page_size: DEFAULT_PAGE_SIZE,
            page_ceiling_pages: DEFAULT_PAGE_CEILING_PAGES,
            default_device_path_capacity: DEFAULT_DEVICE_PATH_CAPACITY,
        }
    }

    pub const fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub const fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub const fn with_page_ceiling_pages(mut self, pages: usize) -> Self {
        self.page_ceiling_pages = pages;
        self
    }

    pub const fn with_default_device_path_capacity(mut self, capacity: usize) -> Self {
        self.default_device_path_capacity = capacity;
        self
    }

    /// Largest device path accepted on load and persist.
    pub const fn max_device_path_size(&self) -> usize {
        self.page_size.saturating_mul(self.page_ceiling_pages)
    }
}

impl Default for UpdateInfoConfig {
    fn default() -> Self {
        Self::new()
    }
}
