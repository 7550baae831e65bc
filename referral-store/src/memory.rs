use referral_core::PatientRecord;

use crate::{delete_from, insert_into, update_in, RecordStore, StoreError};

/// Vector-backed store; nothing survives the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Vec<PatientRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<PatientRecord>) -> Self {
        Self { records }
    }
}

impl RecordStore for MemoryStore {
    fn list(&self) -> Result<Vec<PatientRecord>, StoreError> {
        Ok(self.records.clone())
    }

    fn insert(&mut self, record: PatientRecord) -> Result<Vec<PatientRecord>, StoreError> {
        insert_into(&mut self.records, record)?;
        Ok(self.records.clone())
    }

    fn update(&mut self, record: PatientRecord) -> Result<Vec<PatientRecord>, StoreError> {
        update_in(&mut self.records, record)?;
        Ok(self.records.clone())
    }

    fn delete(&mut self, id: &str) -> Result<Vec<PatientRecord>, StoreError> {
        delete_from(&mut self.records, id)?;
        Ok(self.records.clone())
    }
}
