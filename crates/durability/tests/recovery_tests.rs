//! Crash recovery and corruption detection
//!
//! These tests simulate the states a crash can leave on disk:
//! - Data appended after the last flush (trailing bytes)
//! - Leftover temp file from an interrupted metadata rewrite
//! - Tampered or truncated metadata and data files
//! - Field descriptions whose width, rank or extents are inconsistent

use serialbox_core::{DataFieldInfo, ElementType, Error, Savepoint};
use serialbox_durability::{
    ArchivePaths, ArchiveSettings, CentralizedFileFormat, FileFormat, MetadataDocument,
};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

fn field() -> DataFieldInfo {
    DataFieldInfo::with_type("u", ElementType::Int32, &[4]).unwrap()
}

fn paths(dir: &Path) -> ArchivePaths {
    ArchivePaths::new(dir, "run").unwrap()
}

/// Write one flushed field and return the archive's data file path
fn seed(dir: &Path) -> std::path::PathBuf {
    let mut format = CentralizedFileFormat::create_or_open_for_write(
        paths(dir),
        ArchiveSettings::default(),
        true,
    )
    .unwrap();
    format.register_field(field()).unwrap();
    format
        .append_field(&Savepoint::new("s1"), "u", &[1u8; 16])
        .unwrap();
    format.close().unwrap();
    paths(dir).data()
}

fn append_garbage(path: &Path, bytes: &[u8]) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(bytes).unwrap();
}

#[test]
fn test_unflushed_append_is_discarded_on_write_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let data = seed(temp_dir.path());

    // Simulate a crash after the data write but before the metadata rewrite
    append_garbage(&data, &[9u8; 16]);
    assert_eq!(std::fs::metadata(&data).unwrap().len(), 32);

    let mut format = CentralizedFileFormat::create_or_open_for_write(
        paths(temp_dir.path()),
        ArchiveSettings::default(),
        true,
    )
    .unwrap();
    assert_eq!(format.data_length(), 16);
    assert_eq!(std::fs::metadata(&data).unwrap().len(), 16);

    // The next distinct payload lands where the garbage was
    let outcome = format
        .append_field(&Savepoint::new("s2"), "u", &[2u8; 16])
        .unwrap();
    assert_eq!(outcome.record.offset, 16);
    format.close().unwrap();

    let reader = CentralizedFileFormat::open_for_read(paths(temp_dir.path())).unwrap();
    assert_eq!(
        reader.read_bytes(&Savepoint::new("s2"), "u").unwrap(),
        vec![2u8; 16]
    );
}

#[test]
fn test_unflushed_append_is_ignored_on_read() {
    let temp_dir = TempDir::new().unwrap();
    let data = seed(temp_dir.path());
    append_garbage(&data, &[9u8; 7]);

    let reader = CentralizedFileFormat::open_for_read(paths(temp_dir.path())).unwrap();
    assert_eq!(reader.data_length(), 16);
    assert_eq!(
        reader.read_bytes(&Savepoint::new("s1"), "u").unwrap(),
        vec![1u8; 16]
    );
    // Read mode never modifies the archive
    assert_eq!(std::fs::metadata(&data).unwrap().len(), 23);
}

#[test]
fn test_leftover_temp_file_is_harmless() {
    let temp_dir = TempDir::new().unwrap();
    seed(temp_dir.path());
    std::fs::write(paths(temp_dir.path()).metadata_temp(), b"{ half written").unwrap();

    let reader = CentralizedFileFormat::open_for_read(paths(temp_dir.path())).unwrap();
    assert_eq!(reader.offsets().len(), 1);

    // The next rewrite replaces it
    let mut writer = CentralizedFileFormat::create_or_open_for_write(
        paths(temp_dir.path()),
        ArchiveSettings::default(),
        true,
    )
    .unwrap();
    writer.register_savepoint(&Savepoint::new("s2")).unwrap();
    writer.close().unwrap();
    assert!(!paths(temp_dir.path()).metadata_temp().exists());
}

#[test]
fn test_truncated_data_file_is_corrupt() {
    let temp_dir = TempDir::new().unwrap();
    let data = seed(temp_dir.path());
    OpenOptions::new()
        .write(true)
        .open(&data)
        .unwrap()
        .set_len(8)
        .unwrap();

    let err = CentralizedFileFormat::open_for_read(paths(temp_dir.path())).unwrap_err();
    assert!(matches!(err, Error::CorruptMetadata(_)));

    let err = CentralizedFileFormat::create_or_open_for_write(
        paths(temp_dir.path()),
        ArchiveSettings::default(),
        true,
    )
    .unwrap_err();
    assert!(matches!(err, Error::CorruptMetadata(_)));
}

#[test]
fn test_tampered_offset_is_corrupt() {
    let temp_dir = TempDir::new().unwrap();
    seed(temp_dir.path());
    let metadata = paths(temp_dir.path()).metadata();

    let mut doc = MetadataDocument::load(&metadata).unwrap();
    doc.offsets[0].offset = 1_000;
    std::fs::write(&metadata, serde_json::to_string_pretty(&doc).unwrap()).unwrap();

    let err = CentralizedFileFormat::open_for_read(paths(temp_dir.path())).unwrap_err();
    assert!(matches!(err, Error::CorruptMetadata(_)));
}

/// Rewrite the metadata file through its JSON form
fn tamper_json(dir: &Path, edit: impl FnOnce(&mut serde_json::Value)) {
    let metadata = paths(dir).metadata();
    let mut json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&metadata).unwrap()).unwrap();
    edit(&mut json);
    std::fs::write(&metadata, serde_json::to_string_pretty(&json).unwrap()).unwrap();
}

fn assert_corrupt_both_modes(dir: &Path) {
    let err = CentralizedFileFormat::open_for_read(paths(dir)).unwrap_err();
    assert!(matches!(err, Error::CorruptMetadata(_)), "read: {:?}", err);
    let err = CentralizedFileFormat::create_or_open_for_write(
        paths(dir),
        ArchiveSettings::default(),
        true,
    )
    .unwrap_err();
    assert!(matches!(err, Error::CorruptMetadata(_)), "write: {:?}", err);
}

#[test]
fn test_overflowing_offset_is_corrupt() {
    let temp_dir = TempDir::new().unwrap();
    seed(temp_dir.path());
    let metadata = paths(temp_dir.path()).metadata();

    let mut doc = MetadataDocument::load(&metadata).unwrap();
    doc.offsets[0].offset = u64::MAX - 4;
    std::fs::write(&metadata, serde_json::to_string_pretty(&doc).unwrap()).unwrap();

    assert_corrupt_both_modes(temp_dir.path());
}

#[test]
fn test_tampered_byte_width_is_corrupt() {
    let temp_dir = TempDir::new().unwrap();
    seed(temp_dir.path());
    // Same 16-byte total, so only the width check can catch it
    tamper_json(temp_dir.path(), |json| {
        json["fields"][0]["byte_width"] = 2.into();
        json["fields"][0]["dims"] = serde_json::json!([8]);
    });

    assert_corrupt_both_modes(temp_dir.path());
}

#[test]
fn test_tampered_halo_rank_is_corrupt() {
    let temp_dir = TempDir::new().unwrap();
    seed(temp_dir.path());
    tamper_json(temp_dir.path(), |json| {
        json["fields"][0]["halos"] = serde_json::json!([]);
    });

    assert_corrupt_both_modes(temp_dir.path());
}

#[test]
fn test_overflowing_dims_are_corrupt() {
    let temp_dir = TempDir::new().unwrap();
    seed(temp_dir.path());
    tamper_json(temp_dir.path(), |json| {
        json["fields"][0]["dims"] = serde_json::json!([u64::MAX, 4]);
        json["fields"][0]["halos"] =
            serde_json::json!([{"minus": 0, "plus": 0}, {"minus": 0, "plus": 0}]);
    });

    assert_corrupt_both_modes(temp_dir.path());
}

#[test]
fn test_empty_field_name_is_corrupt() {
    let temp_dir = TempDir::new().unwrap();
    seed(temp_dir.path());
    tamper_json(temp_dir.path(), |json| {
        json["fields"][0]["name"] = "".into();
        json["offsets"][0]["field"] = "".into();
    });

    assert_corrupt_both_modes(temp_dir.path());
}

#[test]
fn test_tampered_savepoint_index_is_corrupt() {
    let temp_dir = TempDir::new().unwrap();
    seed(temp_dir.path());
    let metadata = paths(temp_dir.path()).metadata();

    let mut doc = MetadataDocument::load(&metadata).unwrap();
    doc.offsets[0].savepoint = 5;
    std::fs::write(&metadata, serde_json::to_string_pretty(&doc).unwrap()).unwrap();

    let err = CentralizedFileFormat::open_for_read(paths(temp_dir.path())).unwrap_err();
    assert!(matches!(err, Error::CorruptMetadata(_)));
}

#[test]
fn test_unparseable_metadata_is_corrupt() {
    let temp_dir = TempDir::new().unwrap();
    seed(temp_dir.path());
    std::fs::write(paths(temp_dir.path()).metadata(), b"[1, 2").unwrap();

    let err = CentralizedFileFormat::open_for_read(paths(temp_dir.path())).unwrap_err();
    assert!(matches!(err, Error::CorruptMetadata(_)));
}

#[test]
fn test_missing_data_file_is_not_found_for_read() {
    let temp_dir = TempDir::new().unwrap();
    let data = seed(temp_dir.path());
    std::fs::remove_file(&data).unwrap();

    let err = CentralizedFileFormat::open_for_read(paths(temp_dir.path())).unwrap_err();
    assert!(matches!(err, Error::ArchiveNotFound { .. }));
}

#[test]
fn test_metadata_is_human_readable_json() {
    let temp_dir = TempDir::new().unwrap();
    seed(temp_dir.path());

    let text = std::fs::read_to_string(paths(temp_dir.path()).metadata()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["format_version"], 1);
    assert_eq!(json["settings"]["endianness"], "little");
    assert_eq!(json["settings"]["precision"], "double");
    assert_eq!(json["settings"]["checksum_algorithm"], "sha256");
    assert_eq!(json["fields"][0]["name"], "u");
    assert_eq!(json["fields"][0]["element_type"], "int32");
    assert_eq!(json["savepoints"][0]["name"], "s1");
    assert_eq!(json["offsets"][0]["length"], 16);
    assert_eq!(json["data_length"], 16);
}
