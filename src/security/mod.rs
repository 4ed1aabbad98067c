//! Security gate for captured data.
//!
//! Every snapshot passes through [`SecurityScanner`] before it is built.
//! There is no way to submit unscanned variables.

pub mod scanner;

pub use scanner::{
    DetectorKind, FlagCategory, ScanResult, SecurityFlag, SecurityScanner, Severity,
    REDACTION_MARKER,
};
