//! Metadata file format
//!
//! The metadata file is pretty-printed JSON so it can be inspected with
//! standard tools like `jq`. It is a full snapshot of an archive's indices
//! and is rewritten wholesale on every flush using write-fsync-rename, so a
//! crash leaves either the previous snapshot or the new one.
//!
//! # Contents
//!
//! - format version, archive id, timestamps
//! - encoding declaration (endianness, precision, checksum algorithm)
//! - archive-level metainfo
//! - registered fields
//! - savepoints in first-seen order
//! - offset entries referencing savepoints by position
//! - validated data length

use crate::archive::ArchiveSettings;
use serde::{Deserialize, Serialize};
use serialbox_core::{DataFieldInfo, Error, MetainfoSet, Result, Savepoint};
use serialbox_storage::{Checksum, FieldsTable, OffsetRecord, OffsetTable};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

/// Current metadata format version
pub const METADATA_FORMAT_VERSION: u32 = 1;

/// One persisted offset entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedOffset {
    /// Position of the savepoint in `savepoints`
    pub savepoint: usize,
    /// Field name
    pub field: String,
    /// Digest of the stored bytes
    pub checksum: Checksum,
    /// Start of the range
    pub offset: u64,
    /// Length of the range
    pub length: u64,
}

/// Serialized form of an archive's metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataDocument {
    /// Format version (currently 1)
    pub format_version: u32,
    /// Archive identifier, generated on creation
    pub archive_id: Uuid,
    /// RFC 3339 timestamp of creation
    pub created_at: String,
    /// RFC 3339 timestamp of the last flush
    pub updated_at: String,
    /// Encoding declaration
    pub settings: ArchiveSettings,
    /// Archive-level metainfo
    #[serde(default)]
    pub global_metainfo: MetainfoSet,
    /// Registered fields
    #[serde(default)]
    pub fields: Vec<DataFieldInfo>,
    /// Savepoints in first-seen order
    #[serde(default)]
    pub savepoints: Vec<Savepoint>,
    /// Offset entries in insertion order
    #[serde(default)]
    pub offsets: Vec<PersistedOffset>,
    /// Validated length of the data file
    pub data_length: u64,
}

/// In-memory indices rebuilt from a metadata document
#[derive(Debug)]
pub struct LoadedTables {
    /// Archive-level metainfo
    pub global_metainfo: MetainfoSet,
    /// Field registry with presence rebuilt from the offsets
    pub fields: FieldsTable,
    /// Offset table
    pub offsets: OffsetTable,
}

impl MetadataDocument {
    /// Snapshot the given indices
    pub fn snapshot(
        archive_id: Uuid,
        created_at: String,
        settings: ArchiveSettings,
        global_metainfo: &MetainfoSet,
        fields: &FieldsTable,
        offsets: &OffsetTable,
        data_length: u64,
    ) -> Self {
        MetadataDocument {
            format_version: METADATA_FORMAT_VERSION,
            archive_id,
            created_at,
            updated_at: now_rfc3339(),
            settings,
            global_metainfo: global_metainfo.clone(),
            fields: fields.iter().cloned().collect(),
            savepoints: offsets.savepoints().to_vec(),
            offsets: offsets
                .entries()
                .iter()
                .map(|e| PersistedOffset {
                    savepoint: e.savepoint,
                    field: e.field.clone(),
                    checksum: e.record.checksum.clone(),
                    offset: e.record.offset,
                    length: e.record.length,
                })
                .collect(),
            data_length,
        }
    }

    /// Read and parse a metadata file
    ///
    /// # Errors
    ///
    /// `CorruptMetadata` if the file is not valid JSON of this format or has
    /// an unsupported version; `Io` if it cannot be read.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let doc: MetadataDocument = serde_json::from_str(&content).map_err(|e| {
            Error::corrupt(format!(
                "failed to parse metadata file '{}': {}",
                path.display(),
                e
            ))
        })?;
        if doc.format_version != METADATA_FORMAT_VERSION {
            return Err(Error::corrupt(format!(
                "unsupported metadata format version {} in '{}'",
                doc.format_version,
                path.display()
            )));
        }
        Ok(doc)
    }

    /// Persist atomically (write-fsync-rename)
    pub fn persist(&self, path: &Path, temp_path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::corrupt(format!("failed to serialize metadata: {}", e)))?;

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(temp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(temp_path, path)?;

        if let Some(parent) = path.parent() {
            if parent.exists() {
                let dir = File::open(parent)?;
                dir.sync_all()?;
            }
        }
        Ok(())
    }

    /// Rebuild the in-memory indices
    ///
    /// # Errors
    ///
    /// `CorruptMetadata` on invalid or duplicate field descriptions, duplicate
    /// savepoints, offsets naming unregistered fields or unknown savepoints,
    /// malformed checksums, ranges whose length disagrees with the field size,
    /// or ranges past `data_length`.
    pub fn into_tables(self) -> Result<LoadedTables> {
        let mut fields = FieldsTable::new();
        for info in self.fields {
            let name = info.name().to_string();
            if fields.field_info(&name).is_some() {
                return Err(Error::corrupt(format!("field '{}' registered twice", name)));
            }
            info.validate().map_err(|e| {
                Error::corrupt(format!("invalid description of field '{}': {}", name, e))
            })?;
            fields.register_field(info)?;
        }

        let mut offsets = OffsetTable::new(self.settings.checksum_algorithm);
        for (position, savepoint) in self.savepoints.iter().enumerate() {
            if offsets.register_savepoint(savepoint) != position {
                return Err(Error::corrupt(format!(
                    "savepoint {} listed twice",
                    savepoint
                )));
            }
        }

        for entry in self.offsets {
            let expected = fields
                .field_info(&entry.field)
                .map(|info| info.byte_size() as u64)
                .ok_or_else(|| {
                    Error::corrupt(format!(
                        "offset entry references unregistered field '{}'",
                        entry.field
                    ))
                })?;
            if entry.length != expected {
                return Err(Error::corrupt(format!(
                    "field '{}' stored with {} bytes but its description requires {}",
                    entry.field, entry.length, expected
                )));
            }
            offsets.restore(
                entry.savepoint,
                &entry.field,
                OffsetRecord {
                    checksum: entry.checksum,
                    offset: entry.offset,
                    length: entry.length,
                },
            )?;
            let savepoint = &self.savepoints[entry.savepoint];
            fields.record_presence(savepoint, &entry.field)?;
        }

        offsets.validate_extent(self.data_length)?;

        Ok(LoadedTables {
            global_metainfo: self.global_metainfo,
            fields,
            offsets,
        })
    }
}

/// Current time as RFC 3339
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
