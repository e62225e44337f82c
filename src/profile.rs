use crate::error::StorageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Stored sizing profile, one per user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chest: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waist: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hips: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    pub fn from_record(record: Map<String, Value>) -> Result<Self, StorageError> {
        Ok(serde_json::from_value(Value::Object(record))?)
    }
}

/// Body measurements in centimetres and kilograms
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    pub height: f64,
    pub weight: f64,
    pub chest: Option<f64>,
    pub waist: Option<f64>,
    pub hips: Option<f64>,
}

/// Partial profile write; unset fields are left untouched by the store
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chest: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waist: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hips: Option<f64>,
}

impl ProfilePatch {
    pub fn photo(url: impl Into<String>) -> Self {
        Self {
            photo_url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn measurements(measurements: &Measurements) -> Self {
        Self {
            height: Some(measurements.height),
            weight: Some(measurements.weight),
            chest: measurements.chest,
            waist: measurements.waist,
            hips: measurements.hips,
            ..Self::default()
        }
    }

    /// Serialize into the partial record handed to the record store
    pub fn into_record(self) -> Result<Map<String, Value>, StorageError> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }
}
