//! Unified view construction

pub mod aggregate;
pub mod builder;
pub mod fingerprint;

pub use aggregate::{build_unified, first_present};
pub use builder::{RebuildOutcome, UnifiedViewBuilder};
pub use fingerprint::DataFingerprint;
