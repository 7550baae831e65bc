use chrono::NaiveDate;
use referral_core::{Coordinates, ExtractedFields, PatientRecord, Sex};
use serde_json::{json, Map, Value};

use crate::model::{GenerateRequest, GenerativeModel, Part, ResponseFormat};
use crate::{AssistConfig, AssistError};

pub(crate) const NO_PATIENTS_MESSAGE: &str = "Agregue pacientes para obtener análisis de su red.";
pub(crate) const INSIGHTS_FALLBACK: &str = "No se pudieron generar insights.";

const EXTRACTION_PROMPT: &str = "Actúa como asistente médico. Extrae del PDF adjunto los \
siguientes campos y responde solo con JSON en español: name (nombre completo), birthDate \
(fecha de nacimiento, YYYY-MM-DD), sex (\"masculino\", \"femenino\" o \"no-especificado\"), \
diagnosis (diagnóstico principal), medications (medicamentos y dosis), contraceptive \
(anticonceptivo, solo si es mujer y se menciona), lastTreatment (último tratamiento \
indicado). Usa null para cualquier campo que no aparezca.";

/// Wraps a model with the tracker's prompts and lenient response parsing.
pub struct Assistant<M> {
    model: M,
    config: AssistConfig,
}

impl<M: GenerativeModel> Assistant<M> {
    pub fn new(model: M, config: AssistConfig) -> Self {
        Self { model, config }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Three-sentence summary of referral trends, or a fixed fallback.
    pub fn insights(&self, records: &[PatientRecord]) -> String {
        if records.is_empty() {
            return NO_PATIENTS_MESSAGE.to_string();
        }

        let request = GenerateRequest {
            model: self.config.text_model.clone(),
            parts: vec![Part::Text(insights_prompt(records))],
            format: ResponseFormat::Text,
        };

        match self.model.generate(&request) {
            Ok(text) => text.trim().to_string(),
            Err(err) => {
                tracing::error!("Insight generation failed: {err}");
                INSIGHTS_FALLBACK.to_string()
            }
        }
    }

    /// Clinical fields found in a PDF, or `None` when nothing usable came back.
    pub fn extract_pdf(&self, pdf: &[u8]) -> Option<ExtractedFields> {
        let request = GenerateRequest {
            model: self.config.text_model.clone(),
            parts: vec![
                Part::InlineData {
                    mime_type: "application/pdf".to_string(),
                    data: pdf.to_vec(),
                },
                Part::Text(EXTRACTION_PROMPT.to_string()),
            ],
            format: ResponseFormat::Json(extraction_schema()),
        };

        let result = self
            .model
            .generate(&request)
            .and_then(|text| parse_extracted_fields(&text));

        match result {
            Ok(fields) => Some(fields),
            Err(err) => {
                tracing::error!("PDF analysis failed: {err}");
                None
            }
        }
    }

    pub fn coordinates(&self, place: &str) -> Option<Coordinates> {
        let request = GenerateRequest {
            model: self.config.geocode_model.clone(),
            parts: vec![Part::Text(format!(
                "Provide the latitude and longitude for the following place: \"{}\".",
                place.trim()
            ))],
            format: ResponseFormat::Json(coordinates_schema()),
        };

        match self
            .model
            .generate(&request)
            .and_then(|text| parse_coordinates(&text))
        {
            Ok(coordinates) => {
                tracing::info!(place, lat = coordinates.lat, lng = coordinates.lng, "geocoded place");
                Some(coordinates)
            }
            Err(err) => {
                tracing::warn!(place, "Geocoding failed: {err}");
                None
            }
        }
    }
}

/// One line per record: where the patient comes from and who referred them.
pub fn insights_prompt(records: &[PatientRecord]) -> String {
    let summary = records
        .iter()
        .map(|p| {
            format!(
                "Paciente de {}, referido por {} ({})",
                p.commune, p.referrer_name, p.relationship
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Analiza los datos de referidos y resume en 3 frases las tendencias principales \
         (comunas activas, relaciones fuertes): \n\n{summary}"
    )
}

fn extraction_schema() -> Value {
    let properties: Map<String, Value> = [
        "name",
        "birthDate",
        "sex",
        "diagnosis",
        "medications",
        "contraceptive",
        "lastTreatment",
    ]
    .into_iter()
    .map(|field| (field.to_string(), json!({ "type": "STRING" })))
    .collect();

    json!({ "type": "OBJECT", "properties": properties })
}

fn coordinates_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "lat": { "type": "NUMBER" },
            "lng": { "type": "NUMBER" }
        },
        "required": ["lat", "lng"]
    })
}

/// Models sometimes wrap JSON in a Markdown code fence.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

fn parse_object(text: &str) -> Result<Map<String, Value>, AssistError> {
    let value: Value = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| AssistError::ResponseParsing(e.to_string()))?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(AssistError::ResponseParsing(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

fn text_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null"))
        .map(str::to_string)
}

/// Read extraction output. Absent, null, blank or unrecognised values are
/// left unset rather than failing the whole response.
pub fn parse_extracted_fields(text: &str) -> Result<ExtractedFields, AssistError> {
    let map = parse_object(text)?;

    Ok(ExtractedFields {
        name: text_field(&map, "name"),
        birth_date: text_field(&map, "birthDate")
            .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        sex: text_field(&map, "sex").and_then(|s| Sex::parse(&s)),
        diagnosis: text_field(&map, "diagnosis"),
        medications: text_field(&map, "medications"),
        contraceptive: text_field(&map, "contraceptive"),
        last_treatment: text_field(&map, "lastTreatment"),
    })
}

pub fn parse_coordinates(text: &str) -> Result<Coordinates, AssistError> {
    let map = parse_object(text)?;
    let lat = map.get("lat").and_then(Value::as_f64);
    let lng = map.get("lng").and_then(Value::as_f64);
    match (lat, lng) {
        (Some(lat), Some(lng)) => {
            Coordinates::new(lat, lng).map_err(|e| AssistError::ResponseParsing(e.to_string()))
        }
        _ => Err(AssistError::ResponseParsing(
            "response lacks numeric lat/lng".to_string(),
        )),
    }
}
