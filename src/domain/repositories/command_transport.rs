//! Command transport trait
//!
//! The port through which every command reaches the physical device.
//! Implementations send exactly one command per call and never retry.

use crate::protocol::{AtaStatus, AtaTaskFile, AtaTaskFileExt, Cdb};
use std::time::Duration;

/// A command as handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCommand {
    /// ATA command using a CHS or 28-bit LBA task file
    Ata(AtaTaskFile),
    /// ATA command using a 48-bit task file
    AtaExt(AtaTaskFileExt),
    /// SCSI command descriptor block, for SCSI and ATAPI devices
    Scsi(Cdb),
}

impl DeviceCommand {
    pub fn opcode(&self) -> u8 {
        match self {
            DeviceCommand::Ata(tf) => tf.command,
            DeviceCommand::AtaExt(tf) => tf.command,
            DeviceCommand::Scsi(cdb) => cdb.opcode(),
        }
    }
}

/// Data phase of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataDirection {
    None,
    /// Device to host, with the number of bytes expected
    In(usize),
    /// Host to device, with the payload
    Out(Vec<u8>),
}

/// What came back from the device.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutcome {
    /// False when the device or the transport reported an error
    pub success: bool,
    /// ATA: `[status, error]` registers. SCSI: sense data, empty when none.
    pub status: Vec<u8>,
    /// Data-in payload
    pub data: Vec<u8>,
    /// Time the command took
    pub duration: Duration,
}

impl CommandOutcome {
    pub fn ok(data: Vec<u8>, duration: Duration) -> Self {
        Self {
            success: true,
            status: Vec::new(),
            data,
            duration,
        }
    }

    pub fn failed(status: Vec<u8>, duration: Duration) -> Self {
        Self {
            success: false,
            status,
            data: Vec::new(),
            duration,
        }
    }

    /// The status bytes read as ATA registers.
    pub fn ata_status(&self) -> AtaStatus {
        AtaStatus::from_bytes(&self.status)
    }
}

/// Issues commands to one physical device.
///
/// A transport is an exclusive resource: the reader never has more than one
/// command in flight, so implementations need no internal locking.
///
/// # Example
///
/// ```ignore
/// struct SgIoTransport { fd: OwnedFd }
///
/// impl CommandTransport for SgIoTransport {
///     fn issue(&mut self, command: &DeviceCommand, direction: DataDirection, timeout: Duration) -> CommandOutcome {
///         // SG_IO ioctl, map status and sense into a CommandOutcome
///     }
/// }
/// ```
pub trait CommandTransport {
    /// Sends one command and waits for it to complete or time out.
    fn issue(
        &mut self,
        command: &DeviceCommand,
        direction: DataDirection,
        timeout: Duration,
    ) -> CommandOutcome;
}

impl<T: CommandTransport + ?Sized> CommandTransport for &mut T {
    fn issue(
        &mut self,
        command: &DeviceCommand,
        direction: DataDirection,
        timeout: Duration,
    ) -> CommandOutcome {
        (**self).issue(command, direction, timeout)
    }
}

impl<T: CommandTransport + ?Sized> CommandTransport for Box<T> {
    fn issue(
        &mut self,
        command: &DeviceCommand,
        direction: DataDirection,
        timeout: Duration,
    ) -> CommandOutcome {
        (**self).issue(command, direction, timeout)
    }
}
