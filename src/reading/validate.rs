use std::fmt;

use serde_json::{Map, Value};

use crate::reading::NewReading;

/// Submission fields in wire order. Validation reports the first offender in this order.
pub const READING_FIELDS: [&str; 8] = [
    "datetime",
    "site_name",
    "latitude",
    "longitude",
    "mpsqa",
    "temperature",
    "pressure",
    "humidity",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
}

/// Expected kind of each entry in `READING_FIELDS`.
pub const READING_FIELD_KINDS: [FieldKind; 8] = [
    FieldKind::Text,
    FieldKind::Text,
    FieldKind::Number,
    FieldKind::Number,
    FieldKind::Number,
    FieldKind::Number,
    FieldKind::Number,
    FieldKind::Number,
];

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "non-empty string",
            FieldKind::Number => "number",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid value for {field}: expected {expected}")]
    TypeMismatch {
        field: &'static str,
        expected: FieldKind,
    },

    #[error("request body must be a JSON object")]
    MalformedBody,
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::MissingField(_) => "missing_field",
            ValidationError::TypeMismatch { .. } => "type_mismatch",
            ValidationError::MalformedBody => "malformed_body",
        }
    }
}

/// Parses a raw request body and validates it.
pub fn validate_body(body: &[u8]) -> Result<NewReading, ValidationError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(payload)) => validate(&payload),
        _ => Err(ValidationError::MalformedBody),
    }
}

pub fn validate(payload: &Map<String, Value>) -> Result<NewReading, ValidationError> {
    let [
        datetime,
        site_name,
        latitude,
        longitude,
        mpsqa,
        temperature,
        pressure,
        humidity,
    ] = READING_FIELDS;

    Ok(NewReading {
        datetime: text_field(payload, datetime)?,
        site_name: text_field(payload, site_name)?,
        latitude: number_field(payload, latitude)?,
        longitude: number_field(payload, longitude)?,
        mpsqa: number_field(payload, mpsqa)?,
        temperature: number_field(payload, temperature)?,
        pressure: number_field(payload, pressure)?,
        humidity: number_field(payload, humidity)?,
    })
}

fn text_field(payload: &Map<String, Value>, field: &'static str) -> Result<String, ValidationError> {
    match payload.get(field) {
        None => Err(ValidationError::MissingField(field)),
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(_) => Err(ValidationError::TypeMismatch {
            field,
            expected: FieldKind::Text,
        }),
    }
}

fn number_field(payload: &Map<String, Value>, field: &'static str) -> Result<f64, ValidationError> {
    let value = payload
        .get(field)
        .ok_or(ValidationError::MissingField(field))?;

    // as_f64 widens integer JSON numbers.
    value
        .as_f64()
        .ok_or(ValidationError::TypeMismatch {
            field,
            expected: FieldKind::Number,
        })
}
