use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PARCEL_EXISTS: &str = "La partida existe";
pub const PARCEL_MISSING: &str = "La partida no existe";
pub const PARCEL_WITHOUT_UNITS: &str = "La partida existe pero no tiene unidades funcionales";

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

/// One sub-unit of a horizontal-property parcel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionalUnit {
    pub partida_horizontal: String,
    pub piso: String,
    pub dpto: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundReason {
    Unlisted,
    HorizontalWithoutUnits,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParcelResolution {
    Simple { matriz: String },
    Horizontal { units: Vec<FunctionalUnit> },
    NotFound(NotFoundReason),
}

/// What the first registry lookup says about a parcel.
#[derive(Debug, Clone, PartialEq)]
pub enum ParcelListing {
    HorizontalProperty,
    Matriz(String),
    Unlisted,
}

impl ParcelListing {
    pub fn from_payload(payload: &Value) -> Self {
        if payload.get("propiedad_horizontal").and_then(Value::as_str) == Some("Si") {
            return ParcelListing::HorizontalProperty;
        }

        match payload.get("pdamatriz").and_then(truthy_text) {
            Some(matriz) => ParcelListing::Matriz(matriz),
            None => ParcelListing::Unlisted,
        }
    }
}

impl ParcelResolution {
    /// Builds the outcome of a horizontal-property lookup from the `&ph` payload.
    pub fn from_unit_payload(payload: &Value) -> Self {
        let units: Vec<FunctionalUnit> = payload
            .get("phs")
            .and_then(Value::as_array)
            .map(|phs| {
                phs.iter()
                    .map(|ph| FunctionalUnit {
                        partida_horizontal: field_text(ph.get("pdahorizontal")),
                        piso: field_text(ph.get("piso")),
                        dpto: field_text(ph.get("dpto")),
                    })
                    .collect()
            })
            .unwrap_or_default();

        match units.is_empty() {
            true => ParcelResolution::NotFound(NotFoundReason::HorizontalWithoutUnits),
            false => ParcelResolution::Horizontal { units },
        }
    }

    pub fn is_found(&self) -> bool {
        !matches!(self, ParcelResolution::NotFound(_))
    }

    pub fn to_verification(&self) -> VerificationOutcome {
        match self {
            ParcelResolution::Simple { matriz } => VerificationOutcome {
                status: VerificationStatus::Success,
                message: PARCEL_EXISTS.to_string(),
                units: None,
                matriz: Some(matriz.clone()),
            },
            ParcelResolution::Horizontal { units } => VerificationOutcome {
                status: VerificationStatus::Success,
                message: PARCEL_EXISTS.to_string(),
                units: Some(units.clone()),
                matriz: None,
            },
            ParcelResolution::NotFound(NotFoundReason::Unlisted) => {
                VerificationOutcome::error(PARCEL_MISSING)
            }
            ParcelResolution::NotFound(NotFoundReason::HorizontalWithoutUnits) => {
                VerificationOutcome::error(PARCEL_WITHOUT_UNITS)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationOutcome {
    pub status: VerificationStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<Vec<FunctionalUnit>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matriz: Option<String>,
}

impl VerificationOutcome {
    pub fn error(message: &str) -> Self {
        VerificationOutcome {
            status: VerificationStatus::Error,
            message: message.to_string(),
            units: None,
            matriz: None,
        }
    }
}

/// Identifiers handed back to the caller once a parcel was resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Partidas {
    Matriz(String),
    Units(Vec<FunctionalUnit>),
}

impl Partidas {
    pub fn from_resolution(resolution: &ParcelResolution) -> Option<Self> {
        match resolution {
            ParcelResolution::Simple { matriz } => Some(Partidas::Matriz(matriz.clone())),
            ParcelResolution::Horizontal { units } => Some(Partidas::Units(units.clone())),
            ParcelResolution::NotFound(_) => None,
        }
    }
}

// Registry values are loosely typed; missing, null, false, 0 and "" all mean "absent".
fn truthy_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::Bool(true) => Some("true".to_string()),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 0.0 || f.is_nan() => None,
            _ => Some(n.to_string()),
        },
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn field_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
