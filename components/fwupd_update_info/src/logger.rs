//! Text logger for command line tools, writing one line per record to stderr.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

use std::fmt::{self, Write};

/// Writes `LEVEL - message` lines to stderr. Trace records also carry their source location.
pub struct StderrLogger<'a> {
    target_filters: &'a [(&'a str, log::LevelFilter)],
    max_level: log::LevelFilter,
}

impl<'a> StderrLogger<'a> {
    pub const fn new(target_filters: &'a [(&'a str, log::LevelFilter)], max_level: log::LevelFilter) -> Self {
        Self { target_filters, max_level }
    }
}

/// Formats `record` the way [`StderrLogger`] prints it, newline included.
pub fn format_record<W: Write>(target: &mut W, record: &log::Record) -> fmt::Result {
    if record.level() == log::Level::Trace {
        writeln!(
            target,
            "TRACE - {}:{}: {}",
            record.file().unwrap_or("unknown"),
            record.line().unwrap_or(0),
            record.args()
        )
    } else {
        writeln!(target, "{} - {}", record.level(), record.args())
    }
}

impl log::Log for StderrLogger<'_> {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level().to_level_filter()
            <= *self
                .target_filters
                .iter()
                .find(|(name, _)| metadata.target().starts_with(name))
                .map(|(_, level)| level)
                .unwrap_or(&self.max_level)
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            let mut line = String::new();
            if format_record(&mut line, record).is_ok() {
                eprint!("{line}");
            }
        }
    }

    fn flush(&self) {}
}
