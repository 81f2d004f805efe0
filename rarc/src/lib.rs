//! Reading side of Android backup containers.
//!
//! [`Container::open`] validates the preamble and hands out the archive stream, which can
//! only be walked forward once through a [`Scanner`]. [`Search`] drives a scan that pulls
//! a set of [`ExtractionTarget`]s and one [`ConfigProbe`] value out of it.
pub mod container;
pub mod error;
pub mod extract;
pub mod header;
pub mod scanner;
pub mod search;
pub mod target;

#[cfg(test)]
mod test_util;

pub use container::Container;
pub use error::ArchiveError;
pub use extract::Extracted;
pub use header::{BackupHeader, Encryption};
pub use scanner::{ArchiveEntry, Entries, Scanner};
pub use search::{Search, SearchReport, TargetOutcome, TargetReport};
pub use target::{ConfigProbe, ExtractionTarget};
