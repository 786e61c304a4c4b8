//! Thread-shareable serializer handle
//!
//! [`Serializer`] is `Send` but not `Sync`. `SharedSerializer` wraps one in
//! an `Arc<Mutex<_>>` so several threads can write to the same archive.
//! Every call takes the lock for its whole duration, so operations are
//! applied one at a time in lock order.

use crate::binary::FieldBuffer;
use crate::serializer::{Serializer, SerializerState, SerializerStats, WriteOutcome};
use parking_lot::Mutex;
use serialbox_core::{DataFieldInfo, MetaValue, MetainfoSet, Result, Savepoint};
use serialbox_storage::Registration;
use std::sync::Arc;

/// Cloneable handle on one serializer
#[derive(Debug, Clone)]
pub struct SharedSerializer {
    inner: Arc<Mutex<Serializer>>,
}

impl SharedSerializer {
    /// Share `serializer`
    pub fn new(serializer: Serializer) -> Self {
        SharedSerializer {
            inner: Arc::new(Mutex::new(serializer)),
        }
    }

    /// Run `f` with exclusive access
    pub fn with<R>(&self, f: impl FnOnce(&mut Serializer) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// See [`Serializer::state`]
    pub fn state(&self) -> SerializerState {
        self.inner.lock().state()
    }

    /// See [`Serializer::register_field`]
    pub fn register_field(&self, info: DataFieldInfo) -> Result<Registration> {
        self.inner.lock().register_field(info)
    }

    /// See [`Serializer::register_savepoint`]
    pub fn register_savepoint(&self, savepoint: &Savepoint) -> Result<()> {
        self.inner.lock().register_savepoint(savepoint)
    }

    /// See [`Serializer::write_field`]
    pub fn write_field(
        &self,
        savepoint: &Savepoint,
        name: &str,
        info: &DataFieldInfo,
        buffer: &FieldBuffer,
    ) -> Result<WriteOutcome> {
        self.inner.lock().write_field(savepoint, name, info, buffer)
    }

    /// See [`Serializer::write`]
    pub fn write(
        &self,
        savepoint: &Savepoint,
        name: &str,
        buffer: &FieldBuffer,
    ) -> Result<WriteOutcome> {
        self.inner.lock().write(savepoint, name, buffer)
    }

    /// See [`Serializer::read_field`]
    pub fn read_field(&self, savepoint: &Savepoint, name: &str) -> Result<FieldBuffer> {
        self.inner.lock().read_field(savepoint, name)
    }

    /// See [`Serializer::add_global_metainfo`]
    pub fn add_global_metainfo(
        &self,
        key: impl Into<String>,
        value: impl Into<MetaValue>,
    ) -> Result<()> {
        self.inner.lock().add_global_metainfo(key, value)
    }

    /// Copy of the archive-level metainfo
    pub fn global_metainfo(&self) -> Result<MetainfoSet> {
        self.inner.lock().global_metainfo().cloned()
    }

    /// Copy of the primary archive's savepoints
    pub fn savepoints(&self) -> Result<Vec<Savepoint>> {
        self.inner.lock().savepoints().map(<[Savepoint]>::to_vec)
    }

    /// See [`Serializer::stats`]
    pub fn stats(&self) -> Result<SerializerStats> {
        self.inner.lock().stats()
    }

    /// See [`Serializer::enable`]
    pub fn enable(&self) {
        self.inner.lock().enable()
    }

    /// See [`Serializer::disable`]
    pub fn disable(&self) {
        self.inner.lock().disable()
    }

    /// See [`Serializer::flush`]
    pub fn flush(&self) -> Result<()> {
        self.inner.lock().flush()
    }

    /// See [`Serializer::close`]
    pub fn close(&self) -> Result<()> {
        self.inner.lock().close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::OpenMode;
    use serialbox_core::ElementType;
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn test_concurrent_writers() {
        let dir = TempDir::new().unwrap();
        let shared = SharedSerializer::new(
            Serializer::open(dir.path(), "a", OpenMode::Write, None).unwrap(),
        );
        shared
            .register_field(DataFieldInfo::with_type("u", ElementType::Int32, &[4]).unwrap())
            .unwrap();

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for i in 0..8 {
                        let sp = Savepoint::new("step").with("thread", t).with("i", i);
                        shared
                            .write(&sp, "u", &FieldBuffer::Int32(vec![t, i, 0, 0]))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = shared.stats().unwrap();
        assert_eq!(stats.entries, 32);
        assert_eq!(stats.savepoints, 32);
        shared.close().unwrap();
        assert_eq!(shared.state(), SerializerState::Closed);

        let reader = Serializer::open(dir.path(), "a", OpenMode::Read, None).unwrap();
        let sp = Savepoint::new("step").with("thread", 2i32).with("i", 5i32);
        assert_eq!(
            reader.read_field(&sp, "u").unwrap(),
            FieldBuffer::Int32(vec![2, 5, 0, 0])
        );
    }

    #[test]
    fn test_with_gives_exclusive_access() {
        let dir = TempDir::new().unwrap();
        let shared = SharedSerializer::new(
            Serializer::open(dir.path(), "a", OpenMode::Write, None).unwrap(),
        );
        shared.add_global_metainfo("run", "ci").unwrap();
        let settings = shared.with(|s| s.settings());
        assert_eq!(settings, serialbox_durability::ArchiveSettings::default());
        assert_eq!(shared.global_metainfo().unwrap().get_str("run").unwrap(), "ci");
    }
}
