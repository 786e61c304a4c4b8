//! Archive formats
//!
//! [`FileFormat`] is the seam between the serializer and the bytes on disk.
//! The serializer only ever talks to a `Box<dyn FileFormat>`, so another
//! layout can be added without touching it.
//!
//! # Module Structure
//!
//! - `centralized`: one metadata file plus one shared data file per archive

pub mod centralized;

pub use centralized::CentralizedFileFormat;

use crate::archive::{ArchivePaths, ArchiveSettings};
use serialbox_core::{DataFieldInfo, MetaValue, MetainfoSet, Result, Savepoint};
use serialbox_storage::{AppendOutcome, FieldsTable, OffsetTable, Registration};
use std::fmt;

/// Access mode of an open archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatMode {
    /// Read-only
    Read,
    /// Append-only
    Write,
}

impl FormatMode {
    /// Mode name
    pub fn as_str(self) -> &'static str {
        match self {
            FormatMode::Read => "read",
            FormatMode::Write => "write",
        }
    }
}

impl fmt::Display for FormatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage of one archive
///
/// Mutating operations fail `InvalidState` in read mode, `read_bytes` fails
/// `InvalidState` in write mode, and every operation fails `InvalidState`
/// after `close`.
pub trait FileFormat: Send + fmt::Debug {
    /// Access mode
    fn mode(&self) -> FormatMode;

    /// File layout
    fn paths(&self) -> &ArchivePaths;

    /// Encoding declaration
    fn settings(&self) -> ArchiveSettings;

    /// Registered fields and per-savepoint presence
    fn fields(&self) -> &FieldsTable;

    /// Offset table
    fn offsets(&self) -> &OffsetTable;

    /// Archive-level metainfo
    fn global_metainfo(&self) -> &MetainfoSet;

    /// Set an archive-level metainfo entry
    fn add_global_metainfo(&mut self, key: String, value: MetaValue) -> Result<()>;

    /// Register a field description or confirm a compatible one
    fn register_field(&mut self, info: DataFieldInfo) -> Result<Registration>;

    /// Record a savepoint that may have no fields yet
    fn register_savepoint(&mut self, savepoint: &Savepoint) -> Result<()>;

    /// Set a metainfo entry on a registered field
    fn add_field_metainfo(&mut self, field: &str, key: String, value: MetaValue) -> Result<()>;

    /// Store the encoded bytes of a registered field at `savepoint`
    fn append_field(
        &mut self,
        savepoint: &Savepoint,
        field: &str,
        bytes: &[u8],
    ) -> Result<AppendOutcome>;

    /// Bytes stored for `(savepoint, field)`
    fn read_bytes(&self, savepoint: &Savepoint, field: &str) -> Result<Vec<u8>>;

    /// Make everything written so far durable
    fn flush(&mut self) -> Result<()>;

    /// Flush (in write mode) and release the data file; idempotent
    fn close(&mut self) -> Result<()>;

    /// True once `close` has been called
    fn is_closed(&self) -> bool;

    /// Validated length of the data file
    fn data_length(&self) -> u64;
}
