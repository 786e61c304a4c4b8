//! Field registry
//!
//! Maps field names to their [`DataFieldInfo`] and tracks which fields have
//! been stored at which savepoint. A field must be registered here before
//! the offset table may reference it.

use rustc_hash::FxHashMap;
use serialbox_core::{DataFieldInfo, Error, MetaValue, Result, Savepoint};

/// Result of [`FieldsTable::register_field`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// First registration of this name
    Inserted,
    /// Name already registered with a compatible description
    Confirmed,
}

/// Registry of field descriptions and per-savepoint presence
#[derive(Debug, Clone, Default)]
pub struct FieldsTable {
    /// Registration order
    fields: Vec<DataFieldInfo>,
    by_name: FxHashMap<String, usize>,
    /// Field names per savepoint, in write order
    presence: FxHashMap<Savepoint, Vec<String>>,
}

impl FieldsTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `info`, or confirm an earlier compatible registration
    ///
    /// # Errors
    ///
    /// `TypeMismatch` if a field of the same name was registered with a
    /// different type, width, rank or extents.
    pub fn register_field(&mut self, info: DataFieldInfo) -> Result<Registration> {
        if let Some(&idx) = self.by_name.get(info.name()) {
            self.fields[idx].check_compatible(&info)?;
            return Ok(Registration::Confirmed);
        }
        self.by_name.insert(info.name().to_string(), self.fields.len());
        self.fields.push(info);
        Ok(Registration::Inserted)
    }

    /// Description of a registered field
    pub fn field_info(&self, name: &str) -> Option<&DataFieldInfo> {
        self.by_name.get(name).map(|&idx| &self.fields[idx])
    }

    /// Mutable description of a registered field (metainfo updates)
    pub fn field_info_mut(&mut self, name: &str) -> Option<&mut DataFieldInfo> {
        match self.by_name.get(name) {
            Some(&idx) => Some(&mut self.fields[idx]),
            None => None,
        }
    }

    /// Add a metainfo entry to a registered field
    pub fn add_field_metainfo(
        &mut self,
        name: &str,
        key: impl Into<String>,
        value: impl Into<MetaValue>,
    ) -> Result<()> {
        let info = self
            .field_info_mut(name)
            .ok_or_else(|| Error::invalid_argument(format!("field '{}' is not registered", name)))?;
        info.metainfo_mut().set(key, value);
        Ok(())
    }

    /// Mark `field` as stored at `savepoint`
    ///
    /// Idempotent. Fails with `FieldNotFound` if the field is not registered.
    pub fn record_presence(&mut self, savepoint: &Savepoint, field: &str) -> Result<()> {
        if !self.by_name.contains_key(field) {
            return Err(Error::FieldNotFound {
                savepoint: savepoint.to_string(),
                field: field.to_string(),
            });
        }
        let names = self.presence.entry(savepoint.clone()).or_default();
        if !names.iter().any(|n| n == field) {
            names.push(field.to_string());
        }
        Ok(())
    }

    /// True if `field` was stored at `savepoint`
    pub fn has_field(&self, savepoint: &Savepoint, field: &str) -> bool {
        self.presence
            .get(savepoint)
            .map_or(false, |names| names.iter().any(|n| n == field))
    }

    /// Field names stored at `savepoint`, in write order
    pub fn fields_at(&self, savepoint: &Savepoint) -> &[String] {
        self.presence
            .get(savepoint)
            .map(|names| names.as_slice())
            .unwrap_or(&[])
    }

    /// All registered field names, in registration order
    ///
    /// The iterator is lazy and `Clone`, so it can be restarted.
    pub fn all_field_names(&self) -> impl Iterator<Item = &str> + Clone + '_ {
        self.fields.iter().map(DataFieldInfo::name)
    }

    /// All registered field descriptions, in registration order
    pub fn iter(&self) -> impl Iterator<Item = &DataFieldInfo> + '_ {
        self.fields.iter()
    }

    /// Number of registered fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if no field is registered
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
