//! Centralized archive format
//!
//! All fields of an archive share one data file; one JSON metadata file
//! indexes it. Metadata is held in memory while the archive is open and
//! rewritten atomically on flush.
//!
//! # Open for write
//!
//! 1. Create the directory
//! 2. If metadata exists: load it, check settings, rebuild tables, validate
//!    ranges and truncate the data file to the recorded length
//! 3. Otherwise: create an empty data file and persist initial metadata
//!
//! # Open for read
//!
//! Both files must exist. Settings are adopted from the archive.

use super::{FileFormat, FormatMode};
use crate::archive::{ArchivePaths, ArchiveSettings};
use crate::data_file::DataFile;
use crate::metadata::{now_rfc3339, MetadataDocument};
use serialbox_core::{DataFieldInfo, Error, MetaValue, MetainfoSet, Result, Savepoint};
use serialbox_storage::{AppendOutcome, FieldsTable, OffsetTable, Registration};
use tracing::{debug, info};
use uuid::Uuid;

/// JSON has no encoding for NaN or infinities
fn check_persistable(owner: &dyn std::fmt::Display, metainfo: &MetainfoSet) -> Result<()> {
    match metainfo.first_non_finite() {
        Some(key) => Err(Error::invalid_argument(format!(
            "metainfo '{}' of {} is not a finite number and cannot be stored",
            key, owner
        ))),
        None => Ok(()),
    }
}

/// Archive backed by `<prefix>.json` and `<prefix>.dat`
#[derive(Debug)]
pub struct CentralizedFileFormat {
    paths: ArchivePaths,
    mode: FormatMode,
    settings: ArchiveSettings,
    archive_id: Uuid,
    created_at: String,
    global_metainfo: MetainfoSet,
    fields: FieldsTable,
    offsets: OffsetTable,
    /// `None` once closed
    data: Option<DataFile>,
    /// Length recorded by the last loaded or flushed metadata
    data_length: u64,
    /// Metadata changed since the last flush
    dirty: bool,
    sync_data: bool,
}

impl CentralizedFileFormat {
    /// Open an archive for appending, creating it if absent
    ///
    /// # Errors
    ///
    /// - `ArchiveUnwritable` if the directory or files cannot be created
    /// - `InvalidArgument` if an existing archive declares other settings
    /// - `CorruptMetadata` if existing metadata is inconsistent
    pub fn create_or_open_for_write(
        paths: ArchivePaths,
        settings: ArchiveSettings,
        sync_data: bool,
    ) -> Result<Self> {
        paths.create_directory()?;

        if paths.exists() {
            let doc = MetadataDocument::load(&paths.metadata())?;
            settings.check_matches(&doc.settings)?;
            let archive_id = doc.archive_id;
            let created_at = doc.created_at.clone();
            let data_length = doc.data_length;
            let tables = doc.into_tables()?;

            let data_path = paths.data();
            let data = if !data_path.exists() && data_length == 0 {
                DataFile::create(&data_path)?
            } else if !data_path.exists() {
                return Err(Error::corrupt(format!(
                    "data file {} is missing but metadata records {} bytes",
                    data_path.display(),
                    data_length
                )));
            } else {
                DataFile::open_append(&data_path, data_length)?
            };

            info!(
                directory = %paths.directory().display(),
                prefix = paths.prefix(),
                fields = tables.fields.len(),
                savepoints = tables.offsets.savepoints().len(),
                data_length,
                "Opened archive for append"
            );

            return Ok(CentralizedFileFormat {
                paths,
                mode: FormatMode::Write,
                settings,
                archive_id,
                created_at,
                global_metainfo: tables.global_metainfo,
                fields: tables.fields,
                offsets: tables.offsets,
                data: Some(data),
                data_length,
                dirty: false,
                sync_data,
            });
        }

        let data = DataFile::create(&paths.data())?;
        let mut format = CentralizedFileFormat {
            offsets: OffsetTable::new(settings.checksum_algorithm),
            paths,
            mode: FormatMode::Write,
            settings,
            archive_id: Uuid::new_v4(),
            created_at: now_rfc3339(),
            global_metainfo: MetainfoSet::new(),
            fields: FieldsTable::new(),
            data: Some(data),
            data_length: 0,
            dirty: true,
            sync_data,
        };
        format.persist_metadata()?;

        info!(
            directory = %format.paths.directory().display(),
            prefix = format.paths.prefix(),
            archive_id = %format.archive_id,
            "Created archive"
        );
        Ok(format)
    }

    /// Open an existing archive read-only
    ///
    /// # Errors
    ///
    /// - `ArchiveNotFound` if either file is missing
    /// - `CorruptMetadata` if the metadata is inconsistent
    pub fn open_for_read(paths: ArchivePaths) -> Result<Self> {
        paths.validate_readable()?;
        let doc = MetadataDocument::load(&paths.metadata())?;
        let settings = doc.settings;
        let archive_id = doc.archive_id;
        let created_at = doc.created_at.clone();
        let data_length = doc.data_length;
        let tables = doc.into_tables()?;
        let data = DataFile::open_read(&paths.data(), data_length)?;

        info!(
            directory = %paths.directory().display(),
            prefix = paths.prefix(),
            fields = tables.fields.len(),
            savepoints = tables.offsets.savepoints().len(),
            "Opened archive for read"
        );

        Ok(CentralizedFileFormat {
            paths,
            mode: FormatMode::Read,
            settings,
            archive_id,
            created_at,
            global_metainfo: tables.global_metainfo,
            fields: tables.fields,
            offsets: tables.offsets,
            data: Some(data),
            data_length,
            dirty: false,
            sync_data: false,
        })
    }

    /// Archive identifier
    pub fn archive_id(&self) -> Uuid {
        self.archive_id
    }

    fn state_name(&self) -> String {
        if self.data.is_none() {
            "closed".to_string()
        } else {
            format!("open for {}", self.mode)
        }
    }

    fn require_open(&self, operation: &'static str) -> Result<()> {
        if self.data.is_none() {
            return Err(Error::invalid_state(operation, self.state_name()));
        }
        Ok(())
    }

    fn require_write(&self, operation: &'static str) -> Result<()> {
        self.require_open(operation)?;
        if self.mode != FormatMode::Write {
            return Err(Error::invalid_state(operation, self.state_name()));
        }
        Ok(())
    }

    fn persist_metadata(&mut self) -> Result<()> {
        let data_length = self.data.as_ref().map_or(self.data_length, DataFile::len);
        let doc = MetadataDocument::snapshot(
            self.archive_id,
            self.created_at.clone(),
            self.settings,
            &self.global_metainfo,
            &self.fields,
            &self.offsets,
            data_length,
        );
        doc.persist(&self.paths.metadata(), &self.paths.metadata_temp())?;
        self.data_length = data_length;
        self.dirty = false;
        Ok(())
    }
}

impl FileFormat for CentralizedFileFormat {
    fn mode(&self) -> FormatMode {
        self.mode
    }

    fn paths(&self) -> &ArchivePaths {
        &self.paths
    }

    fn settings(&self) -> ArchiveSettings {
        self.settings
    }

    fn fields(&self) -> &FieldsTable {
        &self.fields
    }

    fn offsets(&self) -> &OffsetTable {
        &self.offsets
    }

    fn global_metainfo(&self) -> &MetainfoSet {
        &self.global_metainfo
    }

    fn add_global_metainfo(&mut self, key: String, value: MetaValue) -> Result<()> {
        self.require_write("add global metainfo")?;
        if !value.is_finite() {
            return Err(Error::invalid_argument(format!(
                "global metainfo '{}' is not a finite number and cannot be stored",
                key
            )));
        }
        self.global_metainfo.set(key, value);
        self.dirty = true;
        Ok(())
    }

    fn register_field(&mut self, info: DataFieldInfo) -> Result<Registration> {
        self.require_write("register a field")?;
        check_persistable(&format!("field '{}'", info.name()), info.metainfo())?;
        let registration = self.fields.register_field(info)?;
        if registration == Registration::Inserted {
            self.dirty = true;
        }
        Ok(registration)
    }

    fn register_savepoint(&mut self, savepoint: &Savepoint) -> Result<()> {
        self.require_write("register a savepoint")?;
        check_persistable(savepoint, savepoint.metainfo())?;
        if self.offsets.savepoint_id(savepoint).is_none() {
            self.offsets.register_savepoint(savepoint);
            self.dirty = true;
        }
        Ok(())
    }

    fn add_field_metainfo(&mut self, field: &str, key: String, value: MetaValue) -> Result<()> {
        self.require_write("add field metainfo")?;
        if !value.is_finite() {
            return Err(Error::invalid_argument(format!(
                "metainfo '{}' of field '{}' is not a finite number and cannot be stored",
                key, field
            )));
        }
        self.fields.add_field_metainfo(field, key, value)?;
        self.dirty = true;
        Ok(())
    }

    fn append_field(
        &mut self,
        savepoint: &Savepoint,
        field: &str,
        bytes: &[u8],
    ) -> Result<AppendOutcome> {
        self.require_write("write a field")?;
        check_persistable(savepoint, savepoint.metainfo())?;
        let expected = self
            .fields
            .field_info(field)
            .map(DataFieldInfo::byte_size)
            .ok_or_else(|| Error::FieldNotFound {
                savepoint: savepoint.to_string(),
                field: field.to_string(),
            })?;
        if bytes.len() != expected {
            return Err(Error::SizeMismatch {
                field: field.to_string(),
                expected,
                actual: bytes.len(),
            });
        }

        let data = self
            .data
            .as_mut()
            .ok_or_else(|| Error::invalid_state("write a field", "closed"))?;
        let outcome = self.offsets.append(savepoint, field, bytes, data)?;
        self.fields.record_presence(savepoint, field)?;
        self.dirty = true;
        Ok(outcome)
    }

    fn read_bytes(&self, savepoint: &Savepoint, field: &str) -> Result<Vec<u8>> {
        self.require_open("read a field")?;
        if self.mode != FormatMode::Read {
            return Err(Error::invalid_state("read a field", self.state_name()));
        }
        let record = self.offsets.lookup(savepoint, field)?;
        let data = self
            .data
            .as_ref()
            .ok_or_else(|| Error::invalid_state("read a field", "closed"))?;
        data.read_range(record.offset, record.length)
    }

    fn flush(&mut self) -> Result<()> {
        if self.mode != FormatMode::Write {
            return Ok(());
        }
        self.require_open("flush")?;
        let appended = self.data.as_ref().map_or(0, DataFile::len) != self.data_length;
        if !self.dirty && !appended {
            return Ok(());
        }
        if self.sync_data {
            if let Some(data) = &self.data {
                data.sync()?;
            }
        }
        self.persist_metadata()?;
        debug!(
            prefix = self.paths.prefix(),
            entries = self.offsets.len(),
            data_length = self.data_length,
            "Flushed archive metadata"
        );
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.data.is_none() {
            return Ok(());
        }
        let result = self.flush();
        // The handle is released even if the final flush failed
        self.data = None;
        result
    }

    fn is_closed(&self) -> bool {
        self.data.is_none()
    }

    fn data_length(&self) -> u64 {
        self.data.as_ref().map_or(self.data_length, DataFile::len)
    }
}
