//! Archive identity: file layout and encoding declaration

pub mod paths;
pub mod settings;

pub use paths::{ArchivePaths, DATA_EXTENSION, METADATA_EXTENSION};
pub use settings::ArchiveSettings;
