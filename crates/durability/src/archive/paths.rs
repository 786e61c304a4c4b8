//! Archive file layout
//!
//! An archive is a pair of files sharing a prefix inside one directory:
//!
//! ```text
//! <directory>/
//! ├── <prefix>.json       # Metadata (rewritten wholesale on flush)
//! ├── <prefix>.json.tmp   # Transient, only during an atomic rewrite
//! └── <prefix>.dat        # Append-only data blob
//! ```
//!
//! A reference archive uses the same layout under a different prefix.

use serialbox_core::{Error, Result};
use std::path::{Path, PathBuf};

/// Metadata file extension
pub const METADATA_EXTENSION: &str = "json";

/// Data file extension
pub const DATA_EXTENSION: &str = "dat";

/// Paths of one archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivePaths {
    directory: PathBuf,
    prefix: String,
}

impl ArchivePaths {
    /// Paths for `prefix` inside `directory`
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the prefix is empty or contains a path separator.
    pub fn new(directory: impl AsRef<Path>, prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Err(Error::invalid_argument("archive prefix must not be empty"));
        }
        if prefix.contains('/') || prefix.contains('\\') {
            return Err(Error::invalid_argument(format!(
                "archive prefix '{}' must not contain path separators",
                prefix
            )));
        }
        Ok(ArchivePaths {
            directory: directory.as_ref().to_path_buf(),
            prefix,
        })
    }

    /// Paths of another archive in the same directory
    pub fn sibling(&self, prefix: impl Into<String>) -> Result<Self> {
        Self::new(&self.directory, prefix)
    }

    /// Archive directory
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Archive prefix
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Metadata file path
    pub fn metadata(&self) -> PathBuf {
        self.directory
            .join(format!("{}.{}", self.prefix, METADATA_EXTENSION))
    }

    /// Temporary metadata path used by atomic rewrites
    pub fn metadata_temp(&self) -> PathBuf {
        self.directory
            .join(format!("{}.{}.tmp", self.prefix, METADATA_EXTENSION))
    }

    /// Data file path
    pub fn data(&self) -> PathBuf {
        self.directory
            .join(format!("{}.{}", self.prefix, DATA_EXTENSION))
    }

    /// An archive exists if its metadata file is present
    pub fn exists(&self) -> bool {
        self.metadata().exists()
    }

    /// Check that both files exist, as required for reading
    pub fn validate_readable(&self) -> Result<()> {
        for path in [self.metadata(), self.data()] {
            if !path.exists() {
                return Err(Error::ArchiveNotFound { path });
            }
        }
        Ok(())
    }

    /// Create the archive directory
    pub fn create_directory(&self) -> Result<()> {
        std::fs::create_dir_all(&self.directory).map_err(|source| Error::ArchiveUnwritable {
            path: self.directory.clone(),
            source,
        })
    }
}
