//! Executable for inspecting and editing firmware update records through efivarfs.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

use std::{path::PathBuf, process::ExitCode};

use clap::{Args, Parser, Subcommand};
use fwupd_uefi_vars::{EfivarfsStore, DEFAULT_EFIVARFS_ROOT};
use fwupd_update_info::{
    esp::{resolve_capsule_path, OsDirectory, OsRelease},
    generator::{EspPartition, PartitionDevicePathGenerator, PartitionSignature},
    key::{self, guid_to_string},
    logger::StderrLogger,
    UpdateInfoError, UpdateInfoStore,
};

static LOGGER: StderrLogger = StderrLogger::new(&[], log::LevelFilter::Trace);

#[derive(Parser, Debug)]
#[command(name = "fwupd-update-info", version, about = "Inspect and edit UEFI capsule update records")]
struct Cli {
    /// Directory where efivarfs is mounted.
    #[arg(long, default_value = DEFAULT_EFIVARFS_ROOT)]
    efivarfs: PathBuf,
    /// Increase log verbosity, may be repeated.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the stored record of a device.
    Show(DeviceArgs),
    /// Print where the capsule of a device must be written.
    CapsulePath {
        #[command(flatten)]
        device: DeviceArgs,
        /// EFI System Partition mount point.
        #[arg(long)]
        esp: PathBuf,
        /// os-release file naming the OS directory under <ESP>/EFI.
        #[arg(long, conflicts_with = "os_dir")]
        os_release: Option<PathBuf>,
        /// OS directory relative to the ESP, e.g. EFI/debian.
        #[arg(long)]
        os_dir: Option<PathBuf>,
    },
    /// Point the record of a device at a capsule file and save it.
    SetPath {
        #[command(flatten)]
        device: DeviceArgs,
        /// Capsule file, on the EFI System Partition.
        file: PathBuf,
        #[command(flatten)]
        partition: PartitionArgs,
    },
    /// Delete the stored record of a device.
    Delete(DeviceArgs),
}

#[derive(Args, Debug)]
struct DeviceArgs {
    /// Device GUID.
    guid: String,
    /// Hardware instance of the device.
    #[arg(long, default_value_t = 0)]
    instance: u64,
}

#[derive(Args, Debug)]
struct PartitionArgs {
    /// EFI System Partition mount point.
    #[arg(long)]
    esp: PathBuf,
    #[arg(long)]
    partition_number: u32,
    /// First LBA of the partition.
    #[arg(long)]
    partition_start: u64,
    /// Partition size in LBAs.
    #[arg(long)]
    partition_size: u64,
    #[command(flatten)]
    signature: SignatureArgs,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct SignatureArgs {
    /// Unique partition GUID of a GPT partition.
    #[arg(long)]
    partition_uuid: Option<String>,
    /// Disk signature of an MBR disk, in hex.
    #[arg(long, value_parser = parse_hex_u32)]
    mbr_signature: Option<u32>,
}

fn parse_hex_u32(value: &str) -> Result<u32, String> {
    let digits = value.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(digits, 16).map_err(|err| format!("invalid MBR signature {value}: {err}"))
}

fn level_filter(verbose: u8) -> log::LevelFilter {
    match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level_filter(cli.verbose));
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), UpdateInfoError> {
    let records = UpdateInfoStore::new(EfivarfsStore::new(cli.efivarfs));

    match cli.command {
        Command::Show(device) => {
            let info = records.load(&device.guid, device.instance)?;
            println!("version: {}", info.version());
            println!("guid: {}", guid_to_string(&info.guid()));
            println!("hardware instance: {}", info.hardware_instance());
            println!("device path size: {}", info.device_path().size());
            println!("device path: {}", info.device_path());
            match info.existing_capsule_path() {
                Some(path) => println!("capsule path: {path}"),
                None => println!("capsule path: (not set)"),
            }
        }
        Command::CapsulePath { device, esp, os_release, os_dir } => {
            let info = records.load(&device.guid, device.instance)?;
            let os_directory = match (os_release, os_dir) {
                (Some(path), _) => OsDirectory::OsRelease(OsRelease::load(&path).map_err(|err| {
                    UpdateInfoError::InvalidArgument(format!("failed to read {}: {err}", path.display()))
                })?),
                (None, Some(dir)) => OsDirectory::Fixed(dir),
                (None, None) => OsDirectory::default(),
            };
            println!("{}", resolve_capsule_path(&info, &esp, &os_directory).display());
        }
        Command::SetPath { device, file, partition } => {
            let signature = match (partition.signature.partition_uuid, partition.signature.mbr_signature) {
                (Some(uuid), _) => PartitionSignature::Gpt(key::parse_guid(&uuid)?),
                (None, Some(signature)) => PartitionSignature::Mbr(signature),
                (None, None) => {
                    return Err(UpdateInfoError::InvalidArgument("a partition signature is required".into()));
                }
            };
            let generator = PartitionDevicePathGenerator::new().with_partition(EspPartition {
                mount_point: partition.esp,
                partition_number: partition.partition_number,
                partition_start: partition.partition_start,
                partition_size: partition.partition_size,
                signature,
            });

            let mut info = records.load(&device.guid, device.instance)?;
            info.set_capsule_path(&generator, &file)?;
            records.persist(&info)?;
            println!("{}", info.device_path());
        }
        Command::Delete(device) => records.delete(&device.guid, device.instance)?,
    }
    Ok(())
}
