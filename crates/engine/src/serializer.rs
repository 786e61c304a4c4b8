//! Serializer: the front door of an archive
//!
//! A `Serializer` binds one primary archive, opened for read or write, and
//! optionally a read-only reference archive in the same directory. Reads
//! consult the primary first and fall back to the reference.
//!
//! ## Lifecycle
//!
//! ```text
//! open(Read)  -> OpenForRead  -> close() -> Closed
//! open(Write) -> OpenForWrite -> close() -> Closed
//! ```
//!
//! Transitions are one way. Every operation on a closed serializer fails
//! `InvalidState`; `close` itself is idempotent. Dropping an open serializer
//! closes it.

use crate::binary::{BinarySerializer, FieldBuffer};
use crate::config::{DurabilityMode, SerializerConfig};
use serialbox_core::{DataFieldInfo, Error, MetaValue, MetainfoSet, Result, Savepoint};
use serialbox_durability::{
    ArchivePaths, ArchiveSettings, CentralizedFileFormat, FileFormat, FormatMode,
};
use serialbox_storage::{OffsetRecord, Registration};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// How the primary archive is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read an existing archive
    Read,
    /// Create an archive or append to an existing one
    Write,
}

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializerState {
    /// Reads allowed
    OpenForRead,
    /// Writes allowed
    OpenForWrite,
    /// Nothing allowed
    Closed,
}

impl fmt::Display for SerializerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SerializerState::OpenForRead => "open for read",
            SerializerState::OpenForWrite => "open for write",
            SerializerState::Closed => "closed",
        })
    }
}

/// Result of a write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// New bytes were appended to the data file
    Stored(OffsetRecord),
    /// Identical bytes already existed; their range was reused
    Deduplicated(OffsetRecord),
    /// Serialization is disabled; nothing happened
    Skipped,
}

impl WriteOutcome {
    /// Stored range, unless the write was skipped
    pub fn record(&self) -> Option<&OffsetRecord> {
        match self {
            WriteOutcome::Stored(r) | WriteOutcome::Deduplicated(r) => Some(r),
            WriteOutcome::Skipped => None,
        }
    }
}

/// Summary of the primary archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializerStats {
    /// Registered fields
    pub fields: usize,
    /// Known savepoints
    pub savepoints: usize,
    /// `(savepoint, field)` entries
    pub entries: usize,
    /// Distinct byte ranges in the data file
    pub unique_ranges: usize,
    /// Bytes in the data file
    pub data_bytes: u64,
}

/// Savepoint-addressed field archive
#[derive(Debug)]
pub struct Serializer {
    primary: Box<dyn FileFormat>,
    reference: Option<Box<dyn FileFormat>>,
    codec: BinarySerializer,
    state: SerializerState,
    enabled: bool,
    durability: DurabilityMode,
}

impl Serializer {
    /// Open `<directory>/<prefix>` with the default configuration
    ///
    /// `reference_prefix` names a read-only archive in the same directory
    /// consulted by reads that miss the primary.
    pub fn open(
        directory: impl AsRef<Path>,
        prefix: &str,
        mode: OpenMode,
        reference_prefix: Option<&str>,
    ) -> Result<Self> {
        Self::open_with_config(
            directory,
            prefix,
            mode,
            reference_prefix,
            SerializerConfig::default(),
        )
    }

    /// Open `<directory>/<prefix>` with an explicit configuration
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` if the configuration does not validate
    /// - `InvalidArgument` for a bad prefix, a reference prefix equal to the
    ///   primary, or an existing archive declaring other settings
    /// - `ArchiveNotFound` if a read-mode or reference archive is missing
    /// - `ArchiveUnwritable` if the write location cannot be created
    /// - `CorruptMetadata` if existing metadata is inconsistent
    pub fn open_with_config(
        directory: impl AsRef<Path>,
        prefix: &str,
        mode: OpenMode,
        reference_prefix: Option<&str>,
        config: SerializerConfig,
    ) -> Result<Self> {
        let settings = config.to_settings()?;
        let durability = config.durability_mode()?;
        let paths = ArchivePaths::new(directory, prefix)?;

        // Open the reference first so a missing one leaves no new archive behind
        let reference = match reference_prefix {
            Some(reference) if reference == prefix => {
                return Err(Error::invalid_argument(format!(
                    "reference prefix '{}' names the primary archive",
                    reference
                )));
            }
            Some(reference) => {
                let format = CentralizedFileFormat::open_for_read(paths.sibling(reference)?)?;
                Some(Box::new(format) as Box<dyn FileFormat>)
            }
            None => None,
        };

        let primary: Box<dyn FileFormat> = match mode {
            OpenMode::Write => Box::new(CentralizedFileFormat::create_or_open_for_write(
                paths,
                settings,
                config.sync_data,
            )?),
            OpenMode::Read => Box::new(CentralizedFileFormat::open_for_read(paths)?),
        };

        Ok(Self::from_formats(primary, reference, durability))
    }

    /// Wrap already opened formats
    ///
    /// The serializer's mode follows the primary's. The codec follows the
    /// primary's declared settings.
    pub fn from_formats(
        primary: Box<dyn FileFormat>,
        reference: Option<Box<dyn FileFormat>>,
        durability: DurabilityMode,
    ) -> Self {
        let settings = primary.settings();
        let state = match primary.mode() {
            FormatMode::Read => SerializerState::OpenForRead,
            FormatMode::Write => SerializerState::OpenForWrite,
        };
        info!(
            prefix = primary.paths().prefix(),
            state = %state,
            reference = reference.as_ref().map(|r| r.paths().prefix()),
            "Serializer opened"
        );
        Serializer {
            codec: BinarySerializer::new(settings.endianness, settings.precision),
            primary,
            reference,
            state,
            enabled: true,
            durability,
        }
    }

    // ========================================================================
    // State
    // ========================================================================

    /// Current lifecycle state
    pub fn state(&self) -> SerializerState {
        self.state
    }

    /// Mode the primary archive was opened in
    pub fn mode(&self) -> OpenMode {
        match self.primary.mode() {
            FormatMode::Read => OpenMode::Read,
            FormatMode::Write => OpenMode::Write,
        }
    }

    /// Encoding declaration of the primary archive
    pub fn settings(&self) -> ArchiveSettings {
        self.primary.settings()
    }

    /// Encoding declaration of the reference archive, if any
    pub fn reference_settings(&self) -> Option<ArchiveSettings> {
        self.reference.as_ref().map(|r| r.settings())
    }

    /// Resume serialization
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Suspend serialization; writes return [`WriteOutcome::Skipped`]
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// True unless serialization is suspended
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn require_open(&self, operation: &'static str) -> Result<()> {
        if self.state == SerializerState::Closed {
            return Err(Error::invalid_state(operation, self.state));
        }
        Ok(())
    }

    fn require_write(&self, operation: &'static str) -> Result<()> {
        if self.state != SerializerState::OpenForWrite {
            return Err(Error::invalid_state(operation, self.state));
        }
        Ok(())
    }

    fn require_read(&self, operation: &'static str) -> Result<()> {
        if self.state != SerializerState::OpenForRead {
            return Err(Error::invalid_state(operation, self.state));
        }
        Ok(())
    }

    // ========================================================================
    // Writing
    // ========================================================================

    /// Register a field description ahead of writing it by name
    ///
    /// Fails `TypeMismatch` if the name is registered with another shape.
    pub fn register_field(&mut self, info: DataFieldInfo) -> Result<Registration> {
        self.require_write("register a field")?;
        self.primary.register_field(info)
    }

    /// Record a savepoint that may never carry fields
    pub fn register_savepoint(&mut self, savepoint: &Savepoint) -> Result<()> {
        self.require_write("register a savepoint")?;
        self.primary.register_savepoint(savepoint)
    }

    /// Set an archive-level metainfo entry
    pub fn add_global_metainfo(
        &mut self,
        key: impl Into<String>,
        value: impl Into<MetaValue>,
    ) -> Result<()> {
        self.require_write("add global metainfo")?;
        self.primary.add_global_metainfo(key.into(), value.into())
    }

    /// Set a metainfo entry on a registered field
    ///
    /// Fails `InvalidArgument` if the field is not registered.
    pub fn add_field_metainfo(
        &mut self,
        field: &str,
        key: impl Into<String>,
        value: impl Into<MetaValue>,
    ) -> Result<()> {
        self.require_write("add field metainfo")?;
        self.primary
            .add_field_metainfo(field, key.into(), value.into())
    }

    /// Store one field snapshot at `savepoint`
    ///
    /// Registers `info` on first use. Identical bytes already in the archive
    /// are referenced instead of written again.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless open for write
    /// - `InvalidArgument` if `name` differs from `info`'s name
    /// - `TypeMismatch` if the buffer or an earlier registration disagrees
    /// - `SizeMismatch` if the buffer length disagrees with the extents
    /// - `DuplicateFieldAtSavepoint` if already written at `savepoint`
    /// - `Io` if [`DurabilityMode::Always`] and the per-write flush fails
    ///
    /// A failed per-write flush happens after the snapshot is recorded. The
    /// entry stays in the open archive and a later successful `flush` or
    /// `close` persists it; writing the same key again fails
    /// `DuplicateFieldAtSavepoint`.
    pub fn write_field(
        &mut self,
        savepoint: &Savepoint,
        name: &str,
        info: &DataFieldInfo,
        buffer: &FieldBuffer,
    ) -> Result<WriteOutcome> {
        self.require_write("write a field")?;
        if name != info.name() {
            return Err(Error::invalid_argument(format!(
                "field name '{}' does not match its description '{}'",
                name,
                info.name()
            )));
        }
        if !self.enabled {
            return Ok(WriteOutcome::Skipped);
        }
        let bytes = self.codec.encode(info, buffer)?;
        self.primary.register_field(info.clone())?;
        self.append(savepoint, name, &bytes)
    }

    /// Store a snapshot of a field registered earlier
    ///
    /// Fails `FieldNotFound` if `name` was never registered. Flush failures
    /// behave as in [`write_field`](Self::write_field).
    pub fn write(
        &mut self,
        savepoint: &Savepoint,
        name: &str,
        buffer: &FieldBuffer,
    ) -> Result<WriteOutcome> {
        self.require_write("write a field")?;
        let info = self
            .primary
            .fields()
            .field_info(name)
            .cloned()
            .ok_or_else(|| Error::FieldNotFound {
                savepoint: savepoint.to_string(),
                field: name.to_string(),
            })?;
        if !self.enabled {
            return Ok(WriteOutcome::Skipped);
        }
        let bytes = self.codec.encode(&info, buffer)?;
        self.append(savepoint, name, &bytes)
    }

    fn append(&mut self, savepoint: &Savepoint, name: &str, bytes: &[u8]) -> Result<WriteOutcome> {
        let outcome = self.primary.append_field(savepoint, name, bytes)?;
        if self.durability == DurabilityMode::Always {
            self.primary.flush()?;
        }
        debug!(
            savepoint = %savepoint,
            field = name,
            offset = outcome.record.offset,
            deduplicated = outcome.deduplicated,
            "Field written"
        );
        Ok(if outcome.deduplicated {
            WriteOutcome::Deduplicated(outcome.record)
        } else {
            WriteOutcome::Stored(outcome.record)
        })
    }

    /// Make everything written so far durable
    pub fn flush(&mut self) -> Result<()> {
        self.require_open("flush")?;
        self.primary.flush()
    }

    // ========================================================================
    // Reading
    // ========================================================================

    /// Decode the snapshot of `name` at `savepoint`
    ///
    /// Falls back to the reference archive when the primary lacks the key.
    /// The bytes are decoded with the byte order and precision declared by
    /// the archive that held them.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless open for read
    /// - `SavepointNotFound` if no consulted archive knows the savepoint
    /// - `FieldNotFound` otherwise when neither archive has the key
    pub fn read_field(&self, savepoint: &Savepoint, name: &str) -> Result<FieldBuffer> {
        self.require_read("read a field")?;
        let (format, info, bytes) = self.locate(savepoint, name)?;
        let settings = format.settings();
        BinarySerializer::new(settings.endianness, settings.precision).decode(info, &bytes)
    }

    /// Stored bytes of `name` at `savepoint` with the description that
    /// governs them, for external comparison tools
    pub fn read_raw(&self, savepoint: &Savepoint, name: &str) -> Result<(DataFieldInfo, Vec<u8>)> {
        self.require_read("read a field")?;
        let (_, info, bytes) = self.locate(savepoint, name)?;
        Ok((info.clone(), bytes))
    }

    fn locate(
        &self,
        savepoint: &Savepoint,
        name: &str,
    ) -> Result<(&dyn FileFormat, &DataFieldInfo, Vec<u8>)> {
        let formats = std::iter::once(self.primary.as_ref()).chain(self.reference.as_deref());
        for (position, format) in formats.enumerate() {
            match format.read_bytes(savepoint, name) {
                Ok(bytes) => {
                    let info = format.fields().field_info(name).ok_or_else(|| {
                        Error::corrupt(format!(
                            "field '{}' has data but no description in archive '{}'",
                            name,
                            format.paths().prefix()
                        ))
                    })?;
                    if position > 0 {
                        debug!(
                            savepoint = %savepoint,
                            field = name,
                            reference = format.paths().prefix(),
                            "Read served by reference archive"
                        );
                    }
                    return Ok((format, info, bytes));
                }
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }

        if self.savepoint_known(savepoint) {
            Err(Error::FieldNotFound {
                savepoint: savepoint.to_string(),
                field: name.to_string(),
            })
        } else {
            Err(Error::SavepointNotFound(savepoint.to_string()))
        }
    }

    fn savepoint_known(&self, savepoint: &Savepoint) -> bool {
        self.primary.offsets().savepoint_id(savepoint).is_some()
            || self
                .reference
                .as_ref()
                .map_or(false, |r| r.offsets().savepoint_id(savepoint).is_some())
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Savepoints of the primary archive, in first-seen order
    pub fn savepoints(&self) -> Result<&[Savepoint]> {
        self.require_open("list savepoints")?;
        Ok(self.primary.offsets().savepoints())
    }

    /// Fields stored at `savepoint` in the primary archive, in write order
    pub fn fields_at(&self, savepoint: &Savepoint) -> Result<&[String]> {
        self.require_open("list fields")?;
        Ok(self.primary.fields().fields_at(savepoint))
    }

    /// Registered field names of the primary archive
    pub fn field_names(&self) -> Result<impl Iterator<Item = &str> + Clone + '_> {
        self.require_open("list fields")?;
        Ok(self.primary.fields().all_field_names())
    }

    /// Description of `name`, from the primary or else the reference
    pub fn field_info(&self, name: &str) -> Result<Option<&DataFieldInfo>> {
        self.require_open("describe a field")?;
        Ok(self.primary.fields().field_info(name).or_else(|| {
            self.reference
                .as_ref()
                .and_then(|r| r.fields().field_info(name))
        }))
    }

    /// True if `name` is stored at `savepoint` in either archive
    pub fn has_field(&self, savepoint: &Savepoint, name: &str) -> Result<bool> {
        self.require_open("look up a field")?;
        Ok(self.primary.offsets().contains(savepoint, name)
            || self
                .reference
                .as_ref()
                .map_or(false, |r| r.offsets().contains(savepoint, name)))
    }

    /// Archive-level metainfo of the primary archive
    pub fn global_metainfo(&self) -> Result<&MetainfoSet> {
        self.require_open("read global metainfo")?;
        Ok(self.primary.global_metainfo())
    }

    /// Counts for the primary archive
    pub fn stats(&self) -> Result<SerializerStats> {
        self.require_open("collect stats")?;
        let offsets = self.primary.offsets();
        Ok(SerializerStats {
            fields: self.primary.fields().len(),
            savepoints: offsets.savepoints().len(),
            entries: offsets.len(),
            unique_ranges: offsets.unique_ranges(),
            data_bytes: self.primary.data_length(),
        })
    }

    // ========================================================================
    // Closing
    // ========================================================================

    /// Flush (in write mode) and release both archives
    ///
    /// Idempotent. The serializer is closed even if the final flush fails;
    /// the first error is returned.
    pub fn close(&mut self) -> Result<()> {
        if self.state == SerializerState::Closed {
            return Ok(());
        }
        self.state = SerializerState::Closed;
        let primary = self.primary.close();
        let reference = match self.reference.as_mut() {
            Some(r) => r.close(),
            None => Ok(()),
        };
        info!(prefix = self.primary.paths().prefix(), "Serializer closed");
        primary.and(reference)
    }
}

impl Drop for Serializer {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(
                prefix = self.primary.paths().prefix(),
                error = %e,
                "Failed to close serializer on drop"
            );
        }
    }
}
