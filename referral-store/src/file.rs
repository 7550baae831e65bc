use std::fs;
use std::path::{Path, PathBuf};

use referral_core::PatientRecord;

use crate::{delete_from, insert_into, update_in, RecordStore, StoreError};

/// The whole record list as one JSON array in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Vec<PatientRecord>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&self.path)?;
        if data.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&data).map_err(|err| StoreError::Serialization(err.to_string()))
    }

    fn save(&self, records: &[PatientRecord]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(records)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;

        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, json)?;
        fs::rename(&staging, &self.path)?;

        tracing::debug!(path = %self.path.display(), count = records.len(), "saved records");
        Ok(())
    }

    fn modify(
        &mut self,
        change: impl FnOnce(&mut Vec<PatientRecord>) -> Result<(), StoreError>,
    ) -> Result<Vec<PatientRecord>, StoreError> {
        let mut records = self.load()?;
        change(&mut records)?;
        self.save(&records)?;
        Ok(records)
    }
}

impl RecordStore for JsonFileStore {
    fn list(&self) -> Result<Vec<PatientRecord>, StoreError> {
        self.load()
    }

    fn insert(&mut self, record: PatientRecord) -> Result<Vec<PatientRecord>, StoreError> {
        self.modify(|records| insert_into(records, record))
    }

    fn update(&mut self, record: PatientRecord) -> Result<Vec<PatientRecord>, StoreError> {
        self.modify(|records| update_in(records, record))
    }

    fn delete(&mut self, id: &str) -> Result<Vec<PatientRecord>, StoreError> {
        self.modify(|records| delete_from(records, id))
    }
}
