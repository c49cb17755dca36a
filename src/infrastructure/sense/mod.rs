//! Sense classifier implementations

mod scsi_sense_classifier;

pub use scsi_sense_classifier::ScsiSenseClassifier;
