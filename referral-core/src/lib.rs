//! Core data model for the referral tracker: patient records, the derived
//! referral network and the geographic view.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub mod geo;
pub mod graph;
pub mod layout;

pub use geo::{bounds, markers, GeoBounds, MapMarker, DEFAULT_MAP_CENTER};
pub use graph::{derive_graph, normalize_label, Graph, GraphEdge, GraphNode, GraphStats, NodeKind};
pub use layout::{ForceLayout, Layout, LayoutConfig, LayoutEngine, NodePosition, Viewport};

/// Display palette for the referral network.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphConfig {
    pub location_color: String,
    pub referrer_color: String,
    pub patient_color: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            location_color: "#6366f1".to_string(),
            referrer_color: "#10b981".to_string(),
            patient_color: "#f59e0b".to_string(),
        }
    }
}

impl GraphConfig {
    pub fn color_for(&self, kind: NodeKind) -> &str {
        match kind {
            NodeKind::Patient => &self.patient_color,
            NodeKind::OriginLocation => &self.location_color,
            NodeKind::Referrer => &self.referrer_color,
        }
    }
}

/// Sex category as recorded on the intake form.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Sex {
    #[serde(rename = "masculino")]
    Male,
    #[serde(rename = "femenino")]
    Female,
    #[serde(rename = "no-especificado")]
    Unspecified,
}

impl Sex {
    /// Lenient parser used for form input and assistant output.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "masculino" | "male" | "m" => Some(Sex::Male),
            "femenino" | "female" | "f" => Some(Sex::Female),
            "no-especificado" | "no especificado" | "unspecified" => Some(Sex::Unspecified),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "masculino",
            Sex::Female => "femenino",
            Sex::Unspecified => "no-especificado",
        }
    }
}

/// A resolved latitude/longitude pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Result<Self, ReferralError> {
        if !lat.is_finite() || !lng.is_finite() || lat.abs() > 90.0 || lng.abs() > 180.0 {
            return Err(ReferralError::InvalidCoordinates { lat, lng });
        }
        Ok(Self { lat, lng })
    }
}

/// Place information resolved for a record's origin location.
///
/// Latitude and longitude travel as two optional JSON fields; a pair with
/// only one half present is read as no coordinates at all.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(from = "RawLocationDetails", into = "RawLocationDetails")]
pub struct LocationDetails {
    pub formatted_address: Option<String>,
    pub uri: Option<String>,
    pub coordinates: Option<Coordinates>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLocationDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    formatted_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lng: Option<f64>,
}

impl From<RawLocationDetails> for LocationDetails {
    fn from(raw: RawLocationDetails) -> Self {
        let coordinates = match (raw.lat, raw.lng) {
            (Some(lat), Some(lng)) => match Coordinates::new(lat, lng) {
                Ok(coordinates) => Some(coordinates),
                Err(err) => {
                    tracing::warn!(lat, lng, "dropping stored coordinates: {err}");
                    None
                }
            },
            (None, None) => None,
            (lat, lng) => {
                tracing::warn!(?lat, ?lng, "dropping half-specified coordinates");
                None
            }
        };
        Self {
            formatted_address: raw.formatted_address,
            uri: raw.uri,
            coordinates,
        }
    }
}

impl From<LocationDetails> for RawLocationDetails {
    fn from(details: LocationDetails) -> Self {
        Self {
            formatted_address: details.formatted_address,
            uri: details.uri,
            lat: details.coordinates.map(|c| c.lat),
            lng: details.coordinates.map(|c| c.lng),
        }
    }
}

/// One patient/referral entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecord {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub commune: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_details: Option<LocationDetails>,
    #[serde(default)]
    pub referrer_name: String,
    #[serde(default)]
    pub relationship: String,
    #[serde(default)]
    pub notes: String,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub created_at: i64,
    #[serde(
        default,
        deserialize_with = "lenient_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub birth_date: Option<NaiveDate>,
    #[serde(
        default,
        deserialize_with = "lenient_sex",
        skip_serializing_if = "Option::is_none"
    )]
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

impl PatientRecord {
    /// Contraceptive information is only meaningful for female patients.
    pub fn contraceptive_applies(&self) -> bool {
        self.sex == Some(Sex::Female)
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        self.location_details.as_ref()?.coordinates
    }

    pub fn set_coordinates(&mut self, coordinates: Coordinates) {
        self.location_details
            .get_or_insert_with(LocationDetails::default)
            .coordinates = Some(coordinates);
    }

    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.created_at)
    }

    /// Age in whole years on `today`.
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        let birth = self.birth_date?;
        if birth > today {
            return None;
        }
        let mut age = today.year() - birth.year();
        if (today.month(), today.day()) < (birth.month(), birth.day()) {
            age -= 1;
        }
        u32::try_from(age).ok()
    }
}

/// Reads a `YYYY-MM-DD` form value; blank or malformed dates become `None`.
pub fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()))
}

/// Reads a sex category; blank or unknown values become `None`.
pub fn lenient_sex<'de, D>(deserializer: D) -> Result<Option<Sex>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(Sex::parse))
}

/// Fields an assistant pulled out of a clinical document. Every field is
/// optional; absent values never overwrite what a record already holds.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedFields {
    pub name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub sex: Option<Sex>,
    pub diagnosis: Option<String>,
    pub medications: Option<String>,
    pub contraceptive: Option<String>,
    pub last_treatment: Option<String>,
}

impl ExtractedFields {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Parse a JSON array of patient records.
pub fn parse_records(json: &str) -> Result<Vec<PatientRecord>, ReferralError> {
    serde_json::from_str(json).map_err(|err| ReferralError::Parse(err.to_string()))
}

/// Errors raised while reading referral data.
#[derive(Debug, thiserror::Error)]
pub enum ReferralError {
    #[error("Could not read records: {0}")]
    Parse(String),
    #[error("Coordinates out of range: lat {lat}, lng {lng}")]
    InvalidCoordinates { lat: f64, lng: f64 },
}
