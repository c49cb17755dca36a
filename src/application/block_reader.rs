//! Block reader
//!
//! The façade callers read through. It probes the device once, in stages,
//! the first time something needs the result, and then reads every block
//! with the best command found. Probing results never change afterwards.

use crate::application::dto::{ReadOutcome, ReaderOptions, SeekOutcome};
use crate::domain::entities::{
    BlockAddress, Chs, CommandCapabilities, DeviceFamily, DeviceIdentity, Geometry, ReadCommand,
    RawReadProfile, SeekCommand, TransferTuning,
};
use crate::domain::repositories::{
    CommandTransport, DataDirection, ErrorLog, ErrorRecord, SenseClassifier,
};
use crate::domain::services::{
    BlockGeometryResolver, CapabilityProbe, CommandContext, Disposition, Issued, ProbeReport,
    RawReadDetector, TransferLengthTuner, VendorQuirkRegistry,
};
use crate::error::{Diagnostic, ReaderError, Result};
use crate::infrastructure::{ScsiSenseClassifier, TracingErrorLog};
use tracing::{debug, info, warn};

/// How far probing has got. Stages only ever advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReaderStage {
    Uninitialized,
    GeometryResolved,
    CapabilitiesProbed,
    Tuned,
    Ready,
}

pub struct BlockReader<T: CommandTransport> {
    transport: T,
    family: DeviceFamily,
    identity: DeviceIdentity,
    options: ReaderOptions,
    classifier: Box<dyn SenseClassifier>,
    error_log: Box<dyn ErrorLog>,
    quirks: VendorQuirkRegistry,
    stage: ReaderStage,
    failure: Option<ReaderError>,
    geometry: Option<Geometry>,
    probe: Option<ProbeReport>,
    tuning: Option<TransferTuning>,
    raw: Option<RawReadProfile>,
    diagnostics: Vec<Diagnostic>,
}

impl<T: CommandTransport> BlockReader<T> {
    /// Wraps an opened device without issuing any command.
    ///
    /// Probing happens on first use. A fatal probing error is returned by
    /// that call and by every later one.
    pub fn open(
        transport: T,
        family: DeviceFamily,
        identity: DeviceIdentity,
        options: ReaderOptions,
    ) -> Self {
        Self {
            transport,
            family,
            identity,
            options,
            classifier: Box::new(ScsiSenseClassifier),
            error_log: Box::new(TracingErrorLog),
            quirks: VendorQuirkRegistry::builtin(),
            stage: ReaderStage::Uninitialized,
            failure: None,
            geometry: None,
            probe: None,
            tuning: None,
            raw: None,
            diagnostics: Vec::new(),
        }
    }

    /// Wraps an opened device and probes it completely.
    pub fn new(
        transport: T,
        family: DeviceFamily,
        identity: DeviceIdentity,
        options: ReaderOptions,
    ) -> Result<Self> {
        let mut reader = Self::open(transport, family, identity, options);
        reader.initialize()?;
        Ok(reader)
    }

    pub fn with_sense_classifier(mut self, classifier: impl SenseClassifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    pub fn with_error_log(mut self, error_log: impl ErrorLog + 'static) -> Self {
        self.error_log = Box::new(error_log);
        self
    }

    pub fn with_vendor_quirks(mut self, quirks: VendorQuirkRegistry) -> Self {
        self.quirks = quirks;
        self
    }

    /// Runs every remaining probing stage.
    pub fn initialize(&mut self) -> Result<()> {
        self.advance_to(ReaderStage::Ready)
    }

    pub fn stage(&self) -> ReaderStage {
        self.stage
    }

    pub fn family(&self) -> DeviceFamily {
        self.family
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// Non-fatal conditions found so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Resolves geometry if needed; does not probe commands.
    pub fn geometry(&mut self) -> Result<&Geometry> {
        self.advance_to(ReaderStage::GeometryResolved)?;
        self.geometry.as_ref().ok_or(ReaderError::UnsupportedDevice)
    }

    pub fn capabilities(&mut self) -> Result<&CommandCapabilities> {
        self.advance_to(ReaderStage::CapabilitiesProbed)?;
        self.probe
            .as_ref()
            .map(|report| &report.capabilities)
            .ok_or(ReaderError::UnsupportedDevice)
    }

    pub fn preferred_read(&mut self) -> Result<ReadCommand> {
        self.capabilities()?
            .preferred_read()
            .ok_or(ReaderError::UnsupportedDevice)
    }

    /// The seek command in use, `None` when the device has no working seek.
    pub fn preferred_seek(&mut self) -> Result<Option<SeekCommand>> {
        Ok(self.capabilities()?.preferred_seek())
    }

    /// Suggested block count per read request.
    pub fn blocks_per_request(&mut self) -> Result<u32> {
        self.advance_to(ReaderStage::Tuned)?;
        Ok(self.tuning.map_or(1, |tuning| tuning.blocks_per_request))
    }

    pub fn tuning(&mut self) -> Result<TransferTuning> {
        self.advance_to(ReaderStage::Tuned)?;
        self.tuning.ok_or(ReaderError::UnsupportedDevice)
    }

    pub fn raw_profile(&mut self) -> Result<RawReadProfile> {
        self.advance_to(ReaderStage::Ready)?;
        Ok(self.raw.unwrap_or_else(RawReadProfile::unsupported))
    }

    /// Gives the transport back, ending the reader.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Reads `count` logical blocks starting at `start`.
    ///
    /// The count is sent as is; callers wanting the tuned batch size ask
    /// [`Self::blocks_per_request`]. Reads that fail are not retried.
    pub fn read_blocks(&mut self, start: u64, count: u32) -> Result<ReadOutcome> {
        self.advance_to(ReaderStage::Ready)?;
        if count == 0 {
            return Ok(ReadOutcome::default());
        }
        let geometry = self.ready_geometry()?;
        Self::check_range(&geometry, start, count)?;

        let command = self.preferred_read()?;
        Self::check_count(command, count)?;
        let address = if command.is_chs() {
            geometry
                .chs
                .and_then(|chs| chs.to_chs(start))
                .map(BlockAddress::Chs)
                .ok_or(ReaderError::OutOfRange {
                    block: start,
                    total: geometry.total_blocks,
                })?
        } else {
            BlockAddress::Lba(start)
        };
        self.read_with(command, address, start, count, &geometry)
    }

    /// Reads `count` blocks at a CHS address. ATA devices with CHS reads only.
    pub fn read_chs(&mut self, cylinder: u16, head: u8, sector: u8, count: u32) -> Result<ReadOutcome> {
        self.advance_to(ReaderStage::Ready)?;
        let geometry = self.ready_geometry()?;
        let Some(command) = self.capabilities()?.preferred_chs_read() else {
            return Err(ReaderError::NotSupported("CHS reads"));
        };
        let chs = Chs::new(cylinder, head, sector);
        let start = Self::chs_to_lba(&geometry, chs)?;
        if count == 0 {
            return Ok(ReadOutcome::default());
        }
        Self::check_range(&geometry, start, count)?;
        Self::check_count(command, count)?;
        self.read_with(command, BlockAddress::Chs(chs), start, count, &geometry)
    }

    /// Reads `count` raw (long) blocks starting at `start`.
    ///
    /// Commands that carry one long block are issued once per block.
    pub fn read_raw(&mut self, start: u64, count: u32) -> Result<ReadOutcome> {
        self.advance_to(ReaderStage::Ready)?;
        let profile = self.raw.unwrap_or_else(RawReadProfile::unsupported);
        let Some(command) = profile.command.filter(|_| profile.supported) else {
            return Err(ReaderError::NotSupported("raw reads"));
        };
        if count == 0 {
            return Ok(ReadOutcome::default());
        }
        let geometry = self.ready_geometry()?;
        Self::check_range(&geometry, start, count)?;

        let long_size = profile.long_block_size;
        let chunk = command.max_blocks().max(1);
        let mut outcome = ReadOutcome {
            data: Vec::with_capacity(long_size as usize * count as usize),
            ..Default::default()
        };

        let end = start + count as u64;
        let mut lba = start;
        while lba < end {
            let blocks = chunk.min((end - lba) as u32);
            let bytes = long_size as usize * blocks as usize;
            let encoded = command
                .encode(lba, blocks, long_size)
                .ok_or(ReaderError::OutOfRange {
                    block: lba,
                    total: geometry.total_blocks,
                })?;
            let issued = self.context().read(&encoded, bytes);
            let part = self.finish_read(issued, lba, bytes)?;
            outcome.data.extend_from_slice(&part.data);
            outcome.duration += part.duration;
            outcome.recovered_error |= part.recovered_error;
            outcome.blank_check |= part.blank_check;
            lba += blocks as u64;
        }
        Ok(outcome)
    }

    /// Positions the heads at `block`. A no-op when no seek command works.
    pub fn seek(&mut self, block: u64) -> Result<SeekOutcome> {
        self.advance_to(ReaderStage::Ready)?;
        let geometry = self.ready_geometry()?;
        Self::check_range(&geometry, block, 1)?;

        let Some(command) = self.capabilities()?.preferred_seek() else {
            return Ok(SeekOutcome::default());
        };
        let address = if command.is_chs() {
            match geometry.chs.and_then(|chs| chs.to_chs(block)) {
                Some(chs) => BlockAddress::Chs(chs),
                None => return Ok(SeekOutcome::default()),
            }
        } else {
            BlockAddress::Lba(block)
        };
        self.seek_with(command, address, block)
    }

    /// Seeks to a CHS address. ATA devices with CHS geometry only.
    pub fn seek_chs(&mut self, cylinder: u16, head: u8, sector: u8) -> Result<SeekOutcome> {
        self.advance_to(ReaderStage::Ready)?;
        let geometry = self.ready_geometry()?;
        if self.family != DeviceFamily::Ata || geometry.chs.is_none() {
            return Err(ReaderError::NotSupported("CHS seeks"));
        }
        let chs = Chs::new(cylinder, head, sector);
        let block = Self::chs_to_lba(&geometry, chs)?;
        let Some(command) = self.capabilities()?.preferred_chs_seek() else {
            return Ok(SeekOutcome::default());
        };
        self.seek_with(command, BlockAddress::Chs(chs), block)
    }

    // ========================================================================
    // Probing stages
    // ========================================================================

    fn advance_to(&mut self, target: ReaderStage) -> Result<()> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        while self.stage < target {
            if let Err(error) = self.step() {
                warn!(stage = ?self.stage, %error, "device probing failed");
                self.failure = Some(error.clone());
                return Err(error);
            }
        }
        Ok(())
    }

    fn step(&mut self) -> Result<()> {
        match self.stage {
            ReaderStage::Uninitialized => {
                let timeout = self.options.timeout();
                let mut ctx =
                    CommandContext::new(&mut self.transport, self.classifier.as_ref(), timeout);
                let geometry = BlockGeometryResolver::resolve(&mut ctx, self.family, &self.identity)?;
                if !geometry.capacity_known {
                    self.diagnostics.push(Diagnostic::CapacityUnknown);
                }
                self.geometry = Some(geometry);
                self.stage = ReaderStage::GeometryResolved;
            }
            ReaderStage::GeometryResolved => {
                let geometry = self.ready_geometry()?;
                let mut probe =
                    CapabilityProbe::new(self.options.max_probe_attempts, self.options.probe_seed);
                let timeout = self.options.timeout();
                let mut ctx =
                    CommandContext::new(&mut self.transport, self.classifier.as_ref(), timeout);
                let report = probe.probe(&mut ctx, self.family, &geometry, &self.identity)?;
                if let (Some(size), Some(geometry)) = (report.learned_block_size, self.geometry.as_mut()) {
                    info!(block_size = size, "block size learned from trial reads");
                    geometry.logical_block_size = size;
                    geometry.physical_block_size = geometry.physical_block_size.max(size);
                }
                self.probe = Some(report);
                self.stage = ReaderStage::CapabilitiesProbed;
            }
            ReaderStage::CapabilitiesProbed => {
                let tuning = self.tune()?;
                if tuning.degraded {
                    self.diagnostics.push(Diagnostic::TransferDegraded);
                }
                self.tuning = Some(tuning);
                self.stage = ReaderStage::Tuned;
            }
            ReaderStage::Tuned => {
                let profile = if self.options.want_raw {
                    self.detect_raw()?
                } else {
                    RawReadProfile::unsupported()
                };
                self.raw = Some(profile);
                self.stage = ReaderStage::Ready;
                info!(family = %self.family, "device ready");
            }
            ReaderStage::Ready => {}
        }
        Ok(())
    }

    fn tune(&mut self) -> Result<TransferTuning> {
        let geometry = self.ready_geometry()?;
        let (command, block_zero_readable) = match &self.probe {
            Some(report) => (
                report
                    .capabilities
                    .preferred_read()
                    .ok_or(ReaderError::UnsupportedDevice)?,
                report.block_zero_readable,
            ),
            None => return Err(ReaderError::UnsupportedDevice),
        };

        if self.family == DeviceFamily::Scsi && self.identity.is_optical() && !block_zero_readable {
            let blocks = self.options.optical_transfer_blocks.min(command.max_blocks());
            info!(blocks_per_request = blocks, "optical block 0 unreadable, transfer length fixed");
            return Ok(TransferTuning::forced(blocks));
        }

        let tuner = TransferLengthTuner::new(self.options.initial_transfer_blocks);
        Ok(tuner.tune(&mut self.context(), command, &geometry))
    }

    fn detect_raw(&mut self) -> Result<RawReadProfile> {
        let geometry = self.ready_geometry()?;
        let trial_lba = self.probe.as_ref().map_or(0, |report| report.trial_lba);
        let timeout = self.options.timeout();
        let mut ctx = CommandContext::new(&mut self.transport, self.classifier.as_ref(), timeout);
        let profile = RawReadDetector::new(&self.quirks).detect(
            &mut ctx,
            self.family,
            &self.identity,
            &geometry,
            trial_lba,
        );
        if !profile.supported {
            self.diagnostics.push(Diagnostic::RawUnsupported);
        }
        Ok(profile)
    }

    fn context(&mut self) -> CommandContext<'_> {
        CommandContext::new(
            &mut self.transport,
            self.classifier.as_ref(),
            self.options.timeout(),
        )
    }

    fn ready_geometry(&self) -> Result<Geometry> {
        self.geometry.clone().ok_or(ReaderError::UnsupportedDevice)
    }

    // ========================================================================
    // Per-call helpers
    // ========================================================================

    fn check_range(geometry: &Geometry, start: u64, count: u32) -> Result<()> {
        if geometry.contains(start, count) {
            Ok(())
        } else {
            Err(ReaderError::OutOfRange {
                block: start.max(geometry.total_blocks),
                total: geometry.total_blocks,
            })
        }
    }

    fn check_count(command: ReadCommand, count: u32) -> Result<()> {
        let limit = command.max_blocks();
        if count > limit {
            return Err(ReaderError::TransferTooLong {
                command,
                count,
                limit,
            });
        }
        Ok(())
    }

    fn chs_to_lba(geometry: &Geometry, chs: Chs) -> Result<u64> {
        geometry
            .chs
            .and_then(|g| g.to_lba(chs))
            .ok_or(ReaderError::OutOfRange {
                block: geometry.total_blocks,
                total: geometry.total_blocks,
            })
    }

    fn read_with(
        &mut self,
        command: ReadCommand,
        address: BlockAddress,
        start: u64,
        count: u32,
        geometry: &Geometry,
    ) -> Result<ReadOutcome> {
        let encoded = command
            .encode(address, count)
            .ok_or(ReaderError::OutOfRange {
                block: start,
                total: geometry.total_blocks,
            })?;
        let bytes = geometry.byte_len(count);
        let issued = self.context().read(&encoded, bytes);
        self.finish_read(issued, start, bytes)
    }

    fn finish_read(&self, issued: Issued, address: u64, bytes: usize) -> Result<ReadOutcome> {
        match issued.disposition {
            Disposition::Completed | Disposition::Recovered if issued.outcome.data.len() >= bytes => {
                let recovered_error = issued.disposition == Disposition::Recovered;
                if recovered_error {
                    debug!(address, "device recovered a read error");
                }
                let mut data = issued.outcome.data;
                data.truncate(bytes);
                Ok(ReadOutcome {
                    data,
                    duration: issued.outcome.duration,
                    recovered_error,
                    blank_check: false,
                })
            }
            Disposition::BlankCheck => {
                debug!(address, "blank block");
                Ok(ReadOutcome {
                    data: vec![0; bytes],
                    duration: issued.outcome.duration,
                    recovered_error: false,
                    blank_check: true,
                })
            }
            _ => Err(self.fail(address, &issued)),
        }
    }

    /// Issues a seek. Addresses the command cannot carry make it a no-op.
    fn seek_with(
        &mut self,
        command: SeekCommand,
        address: BlockAddress,
        block: u64,
    ) -> Result<SeekOutcome> {
        let Some(encoded) = command.encode(address) else {
            debug!(?command, block, "address does not fit seek, skipped");
            return Ok(SeekOutcome::default());
        };
        let issued = self.context().issue(&encoded, DataDirection::None);
        if issued.usable() {
            Ok(SeekOutcome {
                duration: issued.outcome.duration,
                recovered_error: issued.disposition == Disposition::Recovered,
            })
        } else {
            Err(self.fail(block, &issued))
        }
    }

    /// Mirrors a failed command to the error log and builds the caller's error.
    fn fail(&self, address: u64, issued: &Issued) -> ReaderError {
        let ata = matches!(self.family, DeviceFamily::Ata);
        let (status_code, error_code) = issued.codes(ata);
        let record = ErrorRecord {
            address,
            status_code,
            error_code,
            raw: issued.outcome.status.clone(),
        };
        warn!(address, status_code, error_code, "command failed");
        if let Err(error) = self.error_log.record(&record) {
            warn!(%error, "error log rejected a record");
        }
        ReaderError::TransportFailure {
            address,
            status_code,
            error_code,
            raw: record.raw,
        }
    }
}

impl<T: CommandTransport> std::fmt::Debug for BlockReader<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockReader")
            .field("family", &self.family)
            .field("identity", &self.identity)
            .field("stage", &self.stage)
            .field("geometry", &self.geometry)
            .field("tuning", &self.tuning)
            .field("raw", &self.raw)
            .field("diagnostics", &self.diagnostics)
            .finish_non_exhaustive()
    }
}
