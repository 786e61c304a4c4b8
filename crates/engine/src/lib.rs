//! Serialization engine for serialbox
//!
//! This crate orchestrates all lower layers:
//! - Serializer: open/close lifecycle, write/read of field snapshots
//! - Reference archive fallback on reads
//! - Binary codec for typed field buffers
//! - Configuration via `serialbox.toml`
//! - SharedSerializer: one archive shared across threads
//!
//! The engine is the only component that knows about:
//! - Typed buffers and their byte encoding
//! - Which archive serves a read
//! - When metadata is flushed

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod binary;
pub mod config;
pub mod serializer;
pub mod shared;

pub use binary::{BinarySerializer, FieldBuffer};
pub use config::{DurabilityMode, SerializerConfig, CONFIG_FILE_NAME};
pub use serializer::{OpenMode, Serializer, SerializerState, SerializerStats, WriteOutcome};
pub use shared::SharedSerializer;
