//! Archive-wide encoding declaration
//!
//! Every archive declares, once, how its data was encoded. Readers adopt the
//! declaration of the archive they open; writers must match the declaration
//! of an archive they append to.

use serde::{Deserialize, Serialize};
use serialbox_core::{Endianness, Error, Precision, Result};
use serialbox_storage::ChecksumAlgorithm;

/// Encoding parameters recorded in the metadata file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArchiveSettings {
    /// Byte order of the data file
    pub endianness: Endianness,
    /// Floating point precision of real fields
    pub precision: Precision,
    /// Digest used for dedup keys
    pub checksum_algorithm: ChecksumAlgorithm,
}

impl ArchiveSettings {
    /// Check that an existing archive's declaration matches this session
    ///
    /// # Errors
    ///
    /// `InvalidArgument` naming the first differing setting.
    pub fn check_matches(&self, declared: &ArchiveSettings) -> Result<()> {
        if self.endianness != declared.endianness {
            return Err(Error::invalid_argument(format!(
                "archive declares {} endianness, session uses {}",
                declared.endianness, self.endianness
            )));
        }
        if self.precision != declared.precision {
            return Err(Error::invalid_argument(format!(
                "archive declares {} precision, session uses {}",
                declared.precision, self.precision
            )));
        }
        if self.checksum_algorithm != declared.checksum_algorithm {
            return Err(Error::invalid_argument(format!(
                "archive declares {} checksums, session uses {}",
                declared.checksum_algorithm, self.checksum_algorithm
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ArchiveSettings::default();
        assert_eq!(settings.endianness, Endianness::Little);
        assert_eq!(settings.precision, Precision::Double);
        assert_eq!(settings.checksum_algorithm, ChecksumAlgorithm::Sha256);
    }

    #[test]
    fn test_check_matches() {
        let session = ArchiveSettings::default();
        assert!(session.check_matches(&ArchiveSettings::default()).is_ok());

        let declared = ArchiveSettings {
            precision: Precision::Single,
            ..Default::default()
        };
        let err = session.check_matches(&declared).unwrap_err();
        assert!(err.to_string().contains("single"));
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(ArchiveSettings::default()).unwrap();
        assert_eq!(json["endianness"], "little");
        assert_eq!(json["precision"], "double");
        assert_eq!(json["checksum_algorithm"], "sha256");
    }
}
