//! Transit queries and response parsing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;
use transit_bot_core::{Location, ValidationError, validate_coordinates};

use crate::error::FetchError;

/// Query parameters sent to the transit API.
///
/// Built once and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitQuery {
    params: BTreeMap<String, String>,
}

impl TransitQuery {
    /// Creates a query for departures around `location`.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the coordinates are out of range.
    pub fn near(location: &Location) -> Result<Self, ValidationError> {
        validate_coordinates(location.lat, location.lon)?;
        Ok(Self::from_params([
            ("lat", location.lat.to_string()),
            ("lon", location.lon.to_string()),
        ]))
    }

    /// Creates a query from arbitrary named parameters.
    #[must_use]
    pub fn from_params<K, V>(params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            params: params
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Returns a parameter value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub(crate) fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }
}

impl fmt::Display for TransitQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in &self.params {
            if !first {
                f.write_str("&")?;
            }
            write!(f, "{name}={value}")?;
            first = false;
        }
        Ok(())
    }
}

/// One departure returned by the transit API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitEntry {
    /// Line identifier, e.g. "A" or "15".
    pub line: String,
    /// Terminus the vehicle is heading to.
    pub destination: String,
    /// Departure time as reported upstream.
    pub time: String,
    /// Vehicle type, e.g. "tram" or "bus".
    #[serde(rename = "type")]
    pub kind: String,
}

/// Why a raw record was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryDefect {
    /// The record is not a JSON object.
    NotAnObject,
    /// A required field is absent.
    Missing(&'static str),
    /// A required field is not a string.
    NotAString(&'static str),
    /// A required field is blank.
    Empty(&'static str),
}

impl fmt::Display for EntryDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "record is not an object"),
            Self::Missing(field) => write!(f, "missing field `{field}`"),
            Self::NotAString(field) => write!(f, "field `{field}` is not a string"),
            Self::Empty(field) => write!(f, "field `{field}` is empty"),
        }
    }
}

impl TransitEntry {
    /// Validates and converts one raw record.
    ///
    /// # Errors
    ///
    /// Returns the first defect found.
    pub fn from_json(value: &JsonValue) -> Result<Self, EntryDefect> {
        let JsonValue::Object(record) = value else {
            return Err(EntryDefect::NotAnObject);
        };

        Ok(Self {
            line: required(record, "line")?,
            destination: required(record, "destination")?,
            time: required(record, "time")?,
            kind: required(record, "type")?,
        })
    }
}

impl fmt::Display for TransitEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} ({})", self.line, self.destination, self.time)
    }
}

fn required(record: &Map<String, JsonValue>, field: &'static str) -> Result<String, EntryDefect> {
    match record.get(field) {
        None | Some(JsonValue::Null) => Err(EntryDefect::Missing(field)),
        Some(JsonValue::String(s)) if s.trim().is_empty() => Err(EntryDefect::Empty(field)),
        Some(JsonValue::String(s)) => Ok(s.clone()),
        Some(_) => Err(EntryDefect::NotAString(field)),
    }
}

/// Parses a transit API body into validated entries.
///
/// Invalid records are dropped with a warning. The result is never empty:
/// a blank body, a missing or empty `results` array, or a body whose records
/// are all invalid yields [`FetchError::EmptyResponse`].
pub fn parse_results(body: &str) -> Result<Vec<TransitEntry>, FetchError> {
    if body.trim().is_empty() {
        return Err(FetchError::EmptyResponse);
    }

    let value: JsonValue =
        serde_json::from_str(body).map_err(|e| FetchError::MalformedResponse {
            reason: e.to_string(),
        })?;

    let JsonValue::Object(mut root) = value else {
        return Err(FetchError::MalformedResponse {
            reason: "expected a JSON object".to_string(),
        });
    };

    let records = match root.remove("results") {
        None | Some(JsonValue::Null) => return Err(FetchError::EmptyResponse),
        Some(JsonValue::Array(records)) => records,
        Some(_) => {
            return Err(FetchError::MalformedResponse {
                reason: "`results` is not an array".to_string(),
            });
        }
    };

    let entries: Vec<TransitEntry> = records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| match TransitEntry::from_json(record) {
            Ok(entry) => Some(entry),
            Err(defect) => {
                warn!(index, %defect, "dropping invalid transit entry");
                None
            }
        })
        .collect();

    if entries.is_empty() {
        return Err(FetchError::EmptyResponse);
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tram_a() -> JsonValue {
        json!({"line": "A", "destination": "La Gardette", "time": "12:04", "type": "tram"})
    }

    #[test]
    fn query_near_location() {
        let location = Location::new(44.84, -0.58, "Bordeaux").expect("valid");
        let query = TransitQuery::near(&location).expect("valid query");

        assert_eq!(query.get("lat"), Some("44.84"));
        assert_eq!(query.get("lon"), Some("-0.58"));
        assert_eq!(query.to_string(), "lat=44.84&lon=-0.58");
    }

    #[test]
    fn query_rejects_invalid_coordinates() {
        let location = Location {
            lat: 95.0,
            lon: 0.0,
            name: "Nowhere".to_string(),
        };
        assert!(matches!(
            TransitQuery::near(&location),
            Err(ValidationError::InvalidCoordinates { .. })
        ));
    }

    #[test]
    fn parses_valid_results() {
        let body = json!({"results": [tram_a()]}).to_string();
        let entries = parse_results(&body).expect("parse");

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, "tram");
        assert_eq!(entries[0].to_string(), "A - La Gardette (12:04)");
    }

    #[test]
    fn drops_invalid_records() {
        let body = json!({"results": [
            tram_a(),
            {"line": "", "destination": "Mérignac", "time": "12:10", "type": "bus"},
            {"line": "3", "destination": "Gare", "time": "12:11"},
            {"line": 15, "destination": "Gare", "time": "12:12", "type": "bus"},
            "garbage",
        ]})
        .to_string();

        let entries = parse_results(&body).expect("parse");
        assert_eq!(entries, vec![TransitEntry::from_json(&tram_a()).expect("valid")]);
    }

    #[test]
    fn empty_shapes_are_empty_response() {
        for body in ["", "   ", "{}", r#"{"results": []}"#, r#"{"results": null}"#] {
            assert_eq!(parse_results(body), Err(FetchError::EmptyResponse), "{body:?}");
        }
    }

    #[test]
    fn all_invalid_records_is_empty_response() {
        let body = json!({"results": [{"line": "A"}]}).to_string();
        assert_eq!(parse_results(&body), Err(FetchError::EmptyResponse));
    }

    #[test]
    fn malformed_shapes() {
        for body in ["not valid json", "[1, 2]", r#"{"results": "soon"}"#] {
            let err = parse_results(body).expect_err(body);
            assert!(
                matches!(err, FetchError::MalformedResponse { .. }),
                "{body:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn entry_defects() {
        assert_eq!(
            TransitEntry::from_json(&json!([])),
            Err(EntryDefect::NotAnObject)
        );
        assert_eq!(
            TransitEntry::from_json(&json!({"line": "A", "destination": "X", "time": "1"})),
            Err(EntryDefect::Missing("type"))
        );
        assert_eq!(
            TransitEntry::from_json(
                &json!({"line": "A", "destination": " ", "time": "1", "type": "tram"})
            ),
            Err(EntryDefect::Empty("destination"))
        );
    }
}
