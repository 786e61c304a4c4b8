//! Storage tables for serialbox
//!
//! This crate holds the in-memory indices of an archive:
//!
//! - Checksum: content digests used as dedup keys (SHA-256 or XXH3)
//! - FieldsTable: field name -> description, plus per-savepoint presence
//! - OffsetTable: (savepoint, field) -> byte range in the data blob
//!
//! Nothing here touches disk. Bytes are handed to a [`BlobWriter`], which the
//! durability layer implements over the archive's data file.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checksum;
pub mod fields_table;
pub mod offset_table;

pub use checksum::{Checksum, ChecksumAlgorithm};
pub use fields_table::{FieldsTable, Registration};
pub use offset_table::{
    AppendOutcome, BlobWriter, OffsetEntry, OffsetRecord, OffsetTable, SavepointId,
};
