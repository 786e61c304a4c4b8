//! Offset table
//!
//! Maps `(savepoint, field)` to the byte range holding that snapshot inside
//! the shared data blob. Savepoints are interned into dense ids in first-seen
//! order; the table keeps an explicit hash index keyed by savepoint value.
//!
//! # Deduplication
//!
//! Every append digests its bytes first. If any existing record carries the
//! same checksum, the new key is mapped to that record's range and nothing is
//! written. Unchanged fields captured at many savepoints therefore cost one
//! range in the data file.
//!
//! # Append-only
//!
//! Entries are never overwritten or removed. Writing the same field twice at
//! one savepoint is an error.

use crate::checksum::{Checksum, ChecksumAlgorithm};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serialbox_core::{Error, Result, Savepoint};
use tracing::debug;

/// Dense savepoint index, in first-seen order
pub type SavepointId = usize;

/// Sink for bytes that are not yet stored
///
/// Implemented by the data file of an archive. Returns the offset at which
/// `bytes` begin.
pub trait BlobWriter {
    /// Append `bytes` and return their starting offset
    fn append_blob(&mut self, bytes: &[u8]) -> Result<u64>;
}

/// Location of one stored snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetRecord {
    /// Digest of the stored bytes
    pub checksum: Checksum,
    /// Start of the range in the data file
    pub offset: u64,
    /// Length of the range in bytes
    pub length: u64,
}

impl OffsetRecord {
    /// One past the last byte of the range; `None` if that overflows
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.length)
    }
}

/// One `(savepoint, field) -> record` mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetEntry {
    /// Savepoint id
    pub savepoint: SavepointId,
    /// Field name
    pub field: String,
    /// Stored range
    pub record: OffsetRecord,
}

/// Result of [`OffsetTable::append`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Record now associated with the key
    pub record: OffsetRecord,
    /// True if an existing range was reused and nothing was written
    pub deduplicated: bool,
}

/// Offset table with checksum deduplication
#[derive(Debug, Clone)]
pub struct OffsetTable {
    algorithm: ChecksumAlgorithm,
    savepoints: Vec<Savepoint>,
    savepoint_ids: FxHashMap<Savepoint, SavepointId>,
    /// Insertion order
    entries: Vec<OffsetEntry>,
    /// Per savepoint id: field name -> index into `entries`
    index: Vec<FxHashMap<String, usize>>,
    by_checksum: FxHashMap<Checksum, (u64, u64)>,
}

impl OffsetTable {
    /// Create an empty table digesting with `algorithm`
    pub fn new(algorithm: ChecksumAlgorithm) -> Self {
        OffsetTable {
            algorithm,
            savepoints: Vec::new(),
            savepoint_ids: FxHashMap::default(),
            entries: Vec::new(),
            index: Vec::new(),
            by_checksum: FxHashMap::default(),
        }
    }

    /// Digest algorithm of this table
    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    /// Intern `savepoint`, returning its id (idempotent)
    pub fn register_savepoint(&mut self, savepoint: &Savepoint) -> SavepointId {
        if let Some(&id) = self.savepoint_ids.get(savepoint) {
            return id;
        }
        let id = self.savepoints.len();
        self.savepoints.push(savepoint.clone());
        self.savepoint_ids.insert(savepoint.clone(), id);
        self.index.push(FxHashMap::default());
        id
    }

    /// Id of a known savepoint
    pub fn savepoint_id(&self, savepoint: &Savepoint) -> Option<SavepointId> {
        self.savepoint_ids.get(savepoint).copied()
    }

    /// Known savepoints in first-seen order
    pub fn savepoints(&self) -> &[Savepoint] {
        &self.savepoints
    }

    /// Store `bytes` for `(savepoint, field)`, deduplicating by checksum
    ///
    /// # Errors
    ///
    /// `DuplicateFieldAtSavepoint` if the key already has an entry; any
    /// error from `writer`. On error the table is unchanged apart from the
    /// savepoint being interned.
    pub fn append(
        &mut self,
        savepoint: &Savepoint,
        field: &str,
        bytes: &[u8],
        writer: &mut dyn BlobWriter,
    ) -> Result<AppendOutcome> {
        let sp_id = self.register_savepoint(savepoint);
        if self.index[sp_id].contains_key(field) {
            return Err(Error::DuplicateFieldAtSavepoint {
                savepoint: savepoint.to_string(),
                field: field.to_string(),
            });
        }

        let checksum = Checksum::compute(self.algorithm, bytes);
        let (record, deduplicated) = match self.by_checksum.get(&checksum) {
            Some(&(offset, length)) => {
                debug!(
                    savepoint = %savepoint,
                    field,
                    offset,
                    length,
                    "Reusing stored range with identical checksum"
                );
                (
                    OffsetRecord {
                        checksum,
                        offset,
                        length,
                    },
                    true,
                )
            }
            None => {
                let offset = writer.append_blob(bytes)?;
                let length = bytes.len() as u64;
                self.by_checksum.insert(checksum.clone(), (offset, length));
                (
                    OffsetRecord {
                        checksum,
                        offset,
                        length,
                    },
                    false,
                )
            }
        };

        self.insert(sp_id, field, record.clone());
        Ok(AppendOutcome {
            record,
            deduplicated,
        })
    }

    /// Re-insert a persisted entry while loading an archive
    ///
    /// # Errors
    ///
    /// `CorruptMetadata` if the savepoint id is unknown, the key is already
    /// present, the checksum is malformed, or the same checksum was already
    /// seen with a different range.
    pub fn restore(
        &mut self,
        savepoint: SavepointId,
        field: &str,
        record: OffsetRecord,
    ) -> Result<()> {
        if savepoint >= self.savepoints.len() {
            return Err(Error::corrupt(format!(
                "offset entry for field '{}' references savepoint #{} but only {} savepoints exist",
                field,
                savepoint,
                self.savepoints.len()
            )));
        }
        if self.index[savepoint].contains_key(field) {
            return Err(Error::corrupt(format!(
                "duplicate offset entry for field '{}' at savepoint {}",
                field, self.savepoints[savepoint]
            )));
        }
        if !record.checksum.is_well_formed(self.algorithm) {
            return Err(Error::corrupt(format!(
                "malformed {} checksum '{}' for field '{}'",
                self.algorithm, record.checksum, field
            )));
        }
        match self.by_checksum.get(&record.checksum) {
            Some(&(offset, length)) if (offset, length) != (record.offset, record.length) => {
                return Err(Error::corrupt(format!(
                    "checksum {} maps to two ranges ({}+{} and {}+{})",
                    record.checksum, offset, length, record.offset, record.length
                )));
            }
            Some(_) => {}
            None => {
                self.by_checksum
                    .insert(record.checksum.clone(), (record.offset, record.length));
            }
        }
        self.insert(savepoint, field, record);
        Ok(())
    }

    fn insert(&mut self, savepoint: SavepointId, field: &str, record: OffsetRecord) {
        self.index[savepoint].insert(field.to_string(), self.entries.len());
        self.entries.push(OffsetEntry {
            savepoint,
            field: field.to_string(),
            record,
        });
    }

    /// Locate the range stored for `(savepoint, field)`
    ///
    /// # Errors
    ///
    /// `SavepointNotFound` if the savepoint is unknown, `FieldNotFound` if it
    /// is known but has no entry for `field`.
    pub fn lookup(&self, savepoint: &Savepoint, field: &str) -> Result<&OffsetRecord> {
        let sp_id = self
            .savepoint_id(savepoint)
            .ok_or_else(|| Error::SavepointNotFound(savepoint.to_string()))?;
        self.index[sp_id]
            .get(field)
            .map(|&idx| &self.entries[idx].record)
            .ok_or_else(|| Error::FieldNotFound {
                savepoint: savepoint.to_string(),
                field: field.to_string(),
            })
    }

    /// True if `(savepoint, field)` has an entry
    pub fn contains(&self, savepoint: &Savepoint, field: &str) -> bool {
        self.lookup(savepoint, field).is_ok()
    }

    /// All entries in insertion order
    pub fn entries(&self) -> &[OffsetEntry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the table has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct stored ranges
    pub fn unique_ranges(&self) -> usize {
        self.by_checksum.len()
    }

    /// One past the last byte referenced by any entry
    pub fn data_extent(&self) -> u64 {
        self.entries
            .iter()
            .filter_map(|e| e.record.end())
            .max()
            .unwrap_or(0)
    }

    /// Check that every range lies within `data_len` bytes
    pub fn validate_extent(&self, data_len: u64) -> Result<()> {
        for entry in &self.entries {
            match entry.record.end() {
                Some(end) if end <= data_len => {}
                end => {
                    return Err(Error::corrupt(format!(
                        "field '{}' at savepoint {} references {} bytes at offset {} (end {}) beyond data length {}",
                        entry.field,
                        self.savepoints[entry.savepoint],
                        entry.record.length,
                        entry.record.offset,
                        end.map_or_else(|| "overflows".to_string(), |e| e.to_string()),
                        data_len
                    )));
                }
            }
        }
        Ok(())
    }
}
