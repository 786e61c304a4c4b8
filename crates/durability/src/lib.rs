//! Durability layer for serialbox
//!
//! This crate handles everything that touches disk:
//!
//! - Archive layout: `<prefix>.json` metadata next to a `<prefix>.dat` blob
//! - Encoding declaration recorded per archive
//! - Append-only data file with partial-write recovery
//! - JSON metadata document, rewritten atomically on flush
//! - `FileFormat` seam and the centralized implementation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod archive; // Paths and encoding declaration
pub mod data_file; // Append-only data arena
pub mod format; // FileFormat trait and implementations
pub mod metadata; // Metadata document

pub use archive::{ArchivePaths, ArchiveSettings, DATA_EXTENSION, METADATA_EXTENSION};
pub use data_file::DataFile;
pub use format::{CentralizedFileFormat, FileFormat, FormatMode};
pub use metadata::{MetadataDocument, PersistedOffset, METADATA_FORMAT_VERSION};
