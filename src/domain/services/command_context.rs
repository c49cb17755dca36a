//! Command issuing context
//!
//! Pairs the transport with the sense classifier and the per-command
//! timeout, and reduces every outcome to a disposition the probing services
//! and the reader share.

use crate::domain::repositories::{
    CommandOutcome, CommandTransport, DataDirection, DeviceCommand, SenseClass, SenseClassifier,
};
use std::time::Duration;

/// How a command ended, as far as the caller is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Completed,
    /// Completed after the device corrected the data
    Recovered,
    /// The addressed block is unwritten (SCSI)
    BlankCheck,
    Failed,
}

/// An issued command together with its classification.
#[derive(Debug, Clone)]
pub struct Issued {
    pub outcome: CommandOutcome,
    pub disposition: Disposition,
    /// Classification of the sense data, for SCSI commands that returned any
    pub sense: Option<SenseClass>,
}

impl Issued {
    /// True when the data can be used.
    pub fn usable(&self) -> bool {
        matches!(
            self.disposition,
            Disposition::Completed | Disposition::Recovered
        )
    }

    /// Status and error codes for the error log.
    pub fn codes(&self, ata: bool) -> (u32, u32) {
        if ata {
            let status = self.outcome.ata_status();
            (status.status as u32, status.error as u32)
        } else {
            self.sense.map(|class| class.codes()).unwrap_or((0, 0))
        }
    }
}

pub struct CommandContext<'a> {
    transport: &'a mut dyn CommandTransport,
    classifier: &'a dyn SenseClassifier,
    timeout: Duration,
    issued: u32,
}

impl<'a> CommandContext<'a> {
    pub fn new(
        transport: &'a mut dyn CommandTransport,
        classifier: &'a dyn SenseClassifier,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            classifier,
            timeout,
            issued: 0,
        }
    }

    /// Number of commands sent through this context.
    pub fn issued(&self) -> u32 {
        self.issued
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn classify(&self, sense: &[u8]) -> SenseClass {
        self.classifier.classify(sense)
    }

    /// Sends one command and classifies the result.
    pub fn issue(&mut self, command: &DeviceCommand, direction: DataDirection) -> Issued {
        self.issued += 1;
        let outcome = self.transport.issue(command, direction, self.timeout);
        tracing::trace!(
            opcode = command.opcode(),
            success = outcome.success,
            status_len = outcome.status.len(),
            data_len = outcome.data.len(),
            "command issued"
        );

        match command {
            DeviceCommand::Ata(_) | DeviceCommand::AtaExt(_) => {
                let status = outcome.ata_status();
                let disposition = if status.has_error() {
                    Disposition::Failed
                } else if status.is_corrected() {
                    Disposition::Recovered
                } else if outcome.success {
                    Disposition::Completed
                } else {
                    Disposition::Failed
                };
                Issued {
                    outcome,
                    disposition,
                    sense: None,
                }
            }
            DeviceCommand::Scsi(_) => {
                let sense = (!outcome.status.is_empty())
                    .then(|| self.classifier.classify(&outcome.status));
                let disposition = match (outcome.success, sense) {
                    (_, Some(SenseClass::RecoveredError)) => Disposition::Recovered,
                    (true, _) => Disposition::Completed,
                    (false, Some(SenseClass::BlankCheck)) => Disposition::BlankCheck,
                    (false, _) => Disposition::Failed,
                };
                Issued {
                    outcome,
                    disposition,
                    sense,
                }
            }
        }
    }

    /// Sends a data-in command expecting `bytes` bytes.
    pub fn read(&mut self, command: &DeviceCommand, bytes: usize) -> Issued {
        self.issue(command, DataDirection::In(bytes))
    }
}
