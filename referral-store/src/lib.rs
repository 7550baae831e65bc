//! Record storage for patient referrals, with change notifications for
//! downstream graph recomputation.

use chrono::{NaiveDate, Utc};
use referral_core::{ExtractedFields, LocationDetails, PatientRecord, Sex};
use serde::{Deserialize, Serialize};

mod file;
mod memory;
mod watch;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use watch::{ChangeKind, GraphFeed, StoreEvent, Watched};

/// Single-writer store of patient records.
///
/// Mutations return the full list after the change, which is what views
/// re-render from.
pub trait RecordStore {
    fn list(&self) -> Result<Vec<PatientRecord>, StoreError>;

    /// Store `record` as-is. Fails if its identifier is already taken.
    fn insert(&mut self, record: PatientRecord) -> Result<Vec<PatientRecord>, StoreError>;

    /// Replace the record with the same identifier, keeping its creation time.
    fn update(&mut self, record: PatientRecord) -> Result<Vec<PatientRecord>, StoreError>;

    fn delete(&mut self, id: &str) -> Result<Vec<PatientRecord>, StoreError>;

    /// Assign a fresh identifier and timestamp to `draft` and store it.
    fn create(&mut self, draft: NewPatient) -> Result<Vec<PatientRecord>, StoreError> {
        let record = draft.into_record(
            uuid::Uuid::new_v4().to_string(),
            Utc::now().timestamp_millis(),
        );
        tracing::info!(id = %record.id, "creating patient record");
        self.insert(record)
    }

    fn get(&self, id: &str) -> Result<Option<PatientRecord>, StoreError> {
        Ok(self.list()?.into_iter().find(|record| record.id == id))
    }
}

/// Form contents for a record that has not been stored yet.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewPatient {
    pub name: String,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub commune: String,
    #[serde(default)]
    pub location_details: Option<LocationDetails>,
    #[serde(default)]
    pub referrer_name: String,
    #[serde(default)]
    pub relationship: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default, deserialize_with = "referral_core::lenient_date")]
    pub birth_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "referral_core::lenient_sex")]
    pub sex: Option<Sex>,
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub medications: String,
    #[serde(default)]
    pub contraceptive: String,
    #[serde(default)]
    pub last_treatment: String,
}

impl NewPatient {
    pub fn into_record(self, id: String, created_at: i64) -> PatientRecord {
        PatientRecord {
            id,
            name: self.name,
            photo_url: self.photo_url.filter(|url| !url.is_empty()),
            commune: self.commune,
            location_details: self.location_details,
            referrer_name: self.referrer_name,
            relationship: self.relationship,
            notes: self.notes,
            created_at,
            birth_date: self.birth_date,
            sex: self.sex,
            diagnosis: self.diagnosis,
            medications: self.medications,
            contraceptive: self.contraceptive,
            last_treatment: self.last_treatment,
        }
    }
}

/// Merge assistant output into `record`; present, non-blank values win.
pub fn apply_extraction(record: &mut PatientRecord, fields: &ExtractedFields) {
    fn fill(slot: &mut String, value: &Option<String>) {
        if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            *slot = value.to_string();
        }
    }

    fill(&mut record.name, &fields.name);
    fill(&mut record.diagnosis, &fields.diagnosis);
    fill(&mut record.medications, &fields.medications);
    fill(&mut record.contraceptive, &fields.contraceptive);
    fill(&mut record.last_treatment, &fields.last_treatment);

    if fields.birth_date.is_some() {
        record.birth_date = fields.birth_date;
    }
    if fields.sex.is_some() {
        record.sex = fields.sex;
    }
}

pub(crate) fn insert_into(
    records: &mut Vec<PatientRecord>,
    record: PatientRecord,
) -> Result<(), StoreError> {
    if records.iter().any(|existing| existing.id == record.id) {
        return Err(StoreError::DuplicateId(record.id));
    }
    records.push(record);
    Ok(())
}

pub(crate) fn update_in(
    records: &mut [PatientRecord],
    mut record: PatientRecord,
) -> Result<(), StoreError> {
    let slot = records
        .iter_mut()
        .find(|existing| existing.id == record.id)
        .ok_or_else(|| StoreError::RecordNotFound(record.id.clone()))?;
    record.created_at = slot.created_at;
    *slot = record;
    Ok(())
}

pub(crate) fn delete_from(records: &mut Vec<PatientRecord>, id: &str) -> Result<(), StoreError> {
    let before = records.len();
    records.retain(|record| record.id != id);
    if records.len() == before {
        return Err(StoreError::RecordNotFound(id.to_string()));
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Stored data is not valid JSON: {0}")]
    Serialization(String),
    #[error("A record with id {0} already exists")]
    DuplicateId(String),
    #[error("No record with id {0}")]
    RecordNotFound(String),
}
