//! Serializer configuration via `serialbox.toml`
//!
//! All encoding choices are injected through [`SerializerConfig`]; there is
//! no process-wide state. A config can be built in code with the `with_*`
//! setters or loaded from a TOML file.

use serde::{Deserialize, Serialize};
use serialbox_core::{Endianness, Error, Precision, Result};
use serialbox_durability::ArchiveSettings;
use serialbox_storage::ChecksumAlgorithm;
use std::path::Path;

/// Conventional config file name.
pub const CONFIG_FILE_NAME: &str = "serialbox.toml";

/// When metadata is made durable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurabilityMode {
    /// Flush on close (and on explicit flush)
    #[default]
    Standard,
    /// Flush after every write
    Always,
}

impl DurabilityMode {
    /// Mode name as written in the config file
    pub fn as_str(self) -> &'static str {
        match self {
            DurabilityMode::Standard => "standard",
            DurabilityMode::Always => "always",
        }
    }
}

/// Serializer configuration loaded from `serialbox.toml`.
///
/// # Example
///
/// ```toml
/// precision = "double"     # "single" | "double"
/// endianness = "little"    # "little" | "big"
/// checksum = "sha256"      # "sha256" | "xxh3"
/// durability = "standard"  # "standard" | "always"
/// sync_data = true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializerConfig {
    /// Real precision: `"single"` or `"double"`.
    #[serde(default = "default_precision")]
    pub precision: String,
    /// Byte order: `"little"` or `"big"`.
    #[serde(default = "default_endianness")]
    pub endianness: String,
    /// Dedup digest: `"sha256"` or `"xxh3"`.
    #[serde(default = "default_checksum")]
    pub checksum: String,
    /// Durability mode: `"standard"` or `"always"`.
    #[serde(default = "default_durability")]
    pub durability: String,
    /// fsync the data file before each metadata rewrite.
    #[serde(default = "default_sync_data")]
    pub sync_data: bool,
}

fn default_precision() -> String {
    Precision::default().as_str().to_string()
}

fn default_endianness() -> String {
    Endianness::default().as_str().to_string()
}

fn default_checksum() -> String {
    ChecksumAlgorithm::default().as_str().to_string()
}

fn default_durability() -> String {
    DurabilityMode::default().as_str().to_string()
}

fn default_sync_data() -> bool {
    true
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            precision: default_precision(),
            endianness: default_endianness(),
            checksum: default_checksum(),
            durability: default_durability(),
            sync_data: default_sync_data(),
        }
    }
}

impl SerializerConfig {
    /// Set the real precision.
    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision.as_str().to_string();
        self
    }

    /// Set the byte order.
    pub fn with_endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness.as_str().to_string();
        self
    }

    /// Set the dedup digest.
    pub fn with_checksum(mut self, checksum: ChecksumAlgorithm) -> Self {
        self.checksum = checksum.as_str().to_string();
        self
    }

    /// Set the durability mode.
    pub fn with_durability(mut self, durability: DurabilityMode) -> Self {
        self.durability = durability.as_str().to_string();
        self
    }

    /// Enable or disable fsync of the data file.
    pub fn with_sync_data(mut self, sync_data: bool) -> Self {
        self.sync_data = sync_data;
        self
    }

    /// Parse the precision string.
    pub fn precision(&self) -> Result<Precision> {
        self.precision
            .parse()
            .map_err(|e: String| Error::InvalidConfig(format!("precision: {}", e)))
    }

    /// Parse the endianness string.
    pub fn endianness(&self) -> Result<Endianness> {
        self.endianness
            .parse()
            .map_err(|e: String| Error::InvalidConfig(format!("endianness: {}", e)))
    }

    /// Parse the checksum string.
    pub fn checksum(&self) -> Result<ChecksumAlgorithm> {
        self.checksum
            .parse()
            .map_err(|e: String| Error::InvalidConfig(format!("checksum: {}", e)))
    }

    /// Parse the durability string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not `"standard"` or `"always"`.
    pub fn durability_mode(&self) -> Result<DurabilityMode> {
        match self.durability.as_str() {
            "standard" => Ok(DurabilityMode::Standard),
            "always" => Ok(DurabilityMode::Always),
            other => Err(Error::InvalidConfig(format!(
                "invalid durability mode '{}'. Expected \"standard\" or \"always\".",
                other
            ))),
        }
    }

    /// Encoding declaration for archives created with this config.
    pub fn to_settings(&self) -> Result<ArchiveSettings> {
        Ok(ArchiveSettings {
            endianness: self.endianness()?,
            precision: self.precision()?,
            checksum_algorithm: self.checksum()?,
        })
    }

    /// Check every field eagerly.
    pub fn validate(&self) -> Result<()> {
        self.to_settings()?;
        self.durability_mode()?;
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# serialbox configuration
#
# Floating point precision of real fields: "single" or "double" (default)
precision = "double"

# Byte order of the data file: "little" (default) or "big"
endianness = "little"

# Digest used to detect identical snapshots: "sha256" (default) or "xxh3"
#   "xxh3" is faster but not collision resistant
checksum = "sha256"

# Durability mode: "standard" (default) or "always"
#   "standard" = metadata rewritten on close
#   "always"   = metadata rewritten after every write
durability = "standard"

# fsync the data file before each metadata rewrite (default: true)
sync_data = true
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the file cannot be read, parsed or
    /// validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfig(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: SerializerConfig = toml::from_str(&content).map_err(|e| {
            Error::InvalidConfig(format!(
                "failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::InvalidConfig(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config() {
        let config = SerializerConfig::default();
        assert_eq!(config.durability_mode().unwrap(), DurabilityMode::Standard);
        assert_eq!(config.to_settings().unwrap(), ArchiveSettings::default());
        assert!(config.sync_data);
    }

    #[test]
    fn default_toml_parses_correctly() {
        let config: SerializerConfig = toml::from_str(SerializerConfig::default_toml()).unwrap();
        assert_eq!(config, SerializerConfig::default());
    }

    #[test]
    fn parse_always_single_big() {
        let config: SerializerConfig = toml::from_str(
            "durability = \"always\"\nprecision = \"single\"\nendianness = \"big\"\nchecksum = \"xxh3\"",
        )
        .unwrap();
        assert_eq!(config.durability_mode().unwrap(), DurabilityMode::Always);
        let settings = config.to_settings().unwrap();
        assert_eq!(settings.precision, Precision::Single);
        assert_eq!(settings.endianness, Endianness::Big);
        assert_eq!(settings.checksum_algorithm, ChecksumAlgorithm::Xxh3);
    }

    #[test]
    fn parse_invalid_values_return_error() {
        let config: SerializerConfig = toml::from_str("durability = \"turbo\"").unwrap();
        assert!(matches!(
            config.durability_mode(),
            Err(Error::InvalidConfig(_))
        ));

        let config: SerializerConfig = toml::from_str("precision = \"half\"").unwrap();
        assert!(matches!(config.to_settings(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn builder_setters() {
        let config = SerializerConfig::default()
            .with_precision(Precision::Single)
            .with_endianness(Endianness::Big)
            .with_checksum(ChecksumAlgorithm::Xxh3)
            .with_durability(DurabilityMode::Always)
            .with_sync_data(false);
        assert_eq!(config.precision, "single");
        assert_eq!(config.endianness, "big");
        assert_eq!(config.checksum, "xxh3");
        assert_eq!(config.durability, "always");
        assert!(!config.sync_data);
        config.validate().unwrap();
    }

    #[test]
    fn write_default_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        assert!(!path.exists());

        SerializerConfig::write_default_if_missing(&path).unwrap();
        assert!(path.exists());

        let config = SerializerConfig::from_file(&path).unwrap();
        assert_eq!(config, SerializerConfig::default());
    }

    #[test]
    fn write_default_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        std::fs::write(&path, "durability = \"always\"\n").unwrap();
        SerializerConfig::write_default_if_missing(&path).unwrap();

        let config = SerializerConfig::from_file(&path).unwrap();
        assert_eq!(config.durability, "always");
    }

    #[test]
    fn from_file_with_missing_fields_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "").unwrap();

        let config = SerializerConfig::from_file(&path).unwrap();
        assert_eq!(config, SerializerConfig::default());
    }

    #[test]
    fn from_file_rejects_invalid_value() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "endianness = \"middle\"\n").unwrap();

        assert!(matches!(
            SerializerConfig::from_file(&path),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn write_to_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = SerializerConfig::default().with_checksum(ChecksumAlgorithm::Xxh3);

        config.write_to_file(&path).unwrap();
        assert_eq!(SerializerConfig::from_file(&path).unwrap(), config);
    }
}
