//! Append-only data file
//!
//! The data file is an arena addressed by `(offset, length)`. Its logical
//! length is the validated extent recorded by the last flushed metadata, not
//! the physical file size: bytes past it belong to an append that was never
//! committed to metadata and are never trusted.
//!
//! # Recovery
//!
//! - Write mode truncates trailing bytes before appending.
//! - Read mode ignores them; reads past the logical length fail.
//! - A file shorter than the recorded extent is corrupt.

use serialbox_core::{Error, Result};
use serialbox_storage::BlobWriter;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Handle on an archive's data file
#[derive(Debug)]
pub struct DataFile {
    path: PathBuf,
    file: File,
    /// Logical length; appends start here
    len: u64,
    writable: bool,
}

impl DataFile {
    /// Create an empty data file, replacing any existing one
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|source| Error::ArchiveUnwritable {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(DataFile {
            path: path.to_path_buf(),
            file,
            len: 0,
            writable: true,
        })
    }

    /// Open an existing data file for appending after `valid_len` bytes
    ///
    /// Bytes beyond `valid_len` are discarded.
    ///
    /// # Errors
    ///
    /// `ArchiveUnwritable` if the file cannot be opened, `CorruptMetadata` if
    /// it is shorter than `valid_len`.
    pub fn open_append(path: &Path, valid_len: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| Error::ArchiveUnwritable {
                path: path.to_path_buf(),
                source,
            })?;
        let physical = file.metadata()?.len();
        check_physical_len(path, physical, valid_len)?;
        if physical > valid_len {
            warn!(
                path = %path.display(),
                discarded = physical - valid_len,
                "Discarding unreferenced trailing bytes in data file"
            );
            file.set_len(valid_len)?;
            file.sync_all()?;
        }
        Ok(DataFile {
            path: path.to_path_buf(),
            file,
            len: valid_len,
            writable: true,
        })
    }

    /// Open an existing data file read-only, trusting `valid_len` bytes
    ///
    /// # Errors
    ///
    /// `ArchiveNotFound` if the file is missing, `CorruptMetadata` if it is
    /// shorter than `valid_len`.
    pub fn open_read(path: &Path, valid_len: u64) -> Result<Self> {
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::ArchiveNotFound {
                path: path.to_path_buf(),
            },
            _ => Error::Io(e),
        })?;
        let physical = file.metadata()?.len();
        check_physical_len(path, physical, valid_len)?;
        if physical > valid_len {
            warn!(
                path = %path.display(),
                ignored = physical - valid_len,
                "Ignoring unreferenced trailing bytes in data file"
            );
        }
        Ok(DataFile {
            path: path.to_path_buf(),
            file,
            len: valid_len,
            writable: false,
        })
    }

    /// File path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Logical length in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    /// True if no bytes are stored
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read `length` bytes starting at `offset`
    ///
    /// # Errors
    ///
    /// `CorruptMetadata` if the range lies outside the logical length.
    pub fn read_range(&self, offset: u64, length: u64) -> Result<Vec<u8>> {
        let end = offset.checked_add(length).ok_or_else(|| {
            Error::corrupt(format!("range {}+{} overflows", offset, length))
        })?;
        if end > self.len {
            return Err(Error::corrupt(format!(
                "range {}..{} outside data file {} of length {}",
                offset,
                end,
                self.path.display(),
                self.len
            )));
        }
        let mut buf = vec![0u8; length as usize];
        let mut file = &self.file;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// fsync the data file
    pub fn sync(&self) -> Result<()> {
        if self.writable {
            self.file.sync_data()?;
        }
        Ok(())
    }
}

impl BlobWriter for DataFile {
    fn append_blob(&mut self, bytes: &[u8]) -> Result<u64> {
        if !self.writable {
            return Err(Error::invalid_state("append to a data file", "read-only"));
        }
        let offset = self.len;
        // A failed write leaves `len` untouched, so the next append overwrites
        // whatever partial bytes it left behind.
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(bytes)?;
        self.len += bytes.len() as u64;
        Ok(offset)
    }
}

fn check_physical_len(path: &Path, physical: u64, valid_len: u64) -> Result<()> {
    if physical < valid_len {
        return Err(Error::corrupt(format!(
            "data file {} has {} bytes but metadata records {}",
            path.display(),
            physical,
            valid_len
        )));
    }
    Ok(())
}
