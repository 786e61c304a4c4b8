//! serialbox - savepoint-addressed field archives
//!
//! serialbox captures snapshots of multi-dimensional numeric fields at named
//! savepoints of a running simulation and stores them in an on-disk archive,
//! so two runs can be compared field by field. Identical snapshots are
//! stored once.
//!
//! # Quick Start
//!
//! ```no_run
//! use serialbox::{DataFieldInfo, ElementType, FieldBuffer, OpenMode, Savepoint, Serializer};
//!
//! # fn main() -> serialbox::Result<()> {
//! let mut ser = Serializer::open("./archive", "run", OpenMode::Write, None)?;
//! let info = DataFieldInfo::with_type("pt", ElementType::Float64, &[3, 3])?;
//! let sp = Savepoint::new("step").with("it", 1i32);
//! ser.write_field(&sp, "pt", &info, &FieldBuffer::zeros(ElementType::Float64, 9))?;
//! ser.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - `serialbox-core`: value types and the error enum
//! - `serialbox-storage`: in-memory field and offset tables
//! - `serialbox-durability`: archive files and the `FileFormat` seam
//! - `serialbox-engine`: the `Serializer`, codec and configuration

pub use serialbox_core::{
    DataFieldInfo, Dims, ElementType, Endianness, Error, Halo, MetaEntry, MetaValue, MetainfoSet,
    Precision, Result, Savepoint,
};
pub use serialbox_durability::{ArchivePaths, ArchiveSettings, FileFormat, FormatMode};
pub use serialbox_engine::{
    BinarySerializer, DurabilityMode, FieldBuffer, OpenMode, Serializer, SerializerConfig,
    SerializerState, SerializerStats, SharedSerializer, WriteOutcome, CONFIG_FILE_NAME,
};
pub use serialbox_storage::{ChecksumAlgorithm, OffsetRecord, Registration};
