//! Catalog records.
//!
//! Records travel as JSON objects keyed by `id`. The local store keeps the
//! raw JSON so that fields added by the server survive a round trip; the
//! typed structs here are the read-side view.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::collections;
use crate::{RecordError, RecordId};

/// A typed record stored in a named collection.
pub trait Record: Serialize + DeserializeOwned {
    /// Collection this record type lives in.
    const COLLECTION: &'static str;

    /// Identity of this record.
    fn id(&self) -> &RecordId;

    /// Decode a record from its stored JSON.
    fn from_value(value: Value) -> Result<Self, RecordError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Encode this record as stored JSON.
    fn to_value(&self) -> Result<Value, RecordError> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Extract the `id` of a raw JSON record.
///
/// Returns [`RecordError::MissingId`] unless `value` is an object whose `id`
/// is a non-empty string.
pub fn record_id(value: &Value) -> Result<RecordId, RecordError> {
    match value.get("id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => Ok(RecordId::new(id)),
        _ => Err(RecordError::MissingId),
    }
}

/// A car accessory (e.g. "speed", "gasoline").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Accessory {
    /// Accessory kind, used to pick an icon.
    #[serde(rename = "type")]
    pub kind: String,
    /// Display label.
    pub name: String,
}

/// A car photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    /// Photo identifier.
    pub id: String,
    /// Photo URL.
    pub photo: String,
}

/// A car in the rental catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Car {
    /// Server-assigned identifier.
    pub id: RecordId,
    /// Manufacturer.
    pub brand: String,
    /// Model name.
    pub name: String,
    /// Billing period label (e.g. "Ao dia").
    pub period: String,
    /// Price per period.
    pub price: f64,
    /// Thumbnail URL.
    pub thumbnail: String,
    /// Accessories. Absent in listing payloads, present in detail payloads.
    #[serde(default)]
    pub accessories: Vec<Accessory>,
    /// Free-text description.
    #[serde(default)]
    pub about: String,
    /// Gallery. Absent in listing payloads, present in detail payloads.
    #[serde(default)]
    pub photos: Vec<Photo>,
}

impl Car {
    /// Photos to show in a gallery; falls back to the thumbnail.
    pub fn gallery(&self) -> Vec<Photo> {
        if self.photos.is_empty() {
            vec![Photo {
                id: self.thumbnail.clone(),
                photo: self.thumbnail.clone(),
            }]
        } else {
            self.photos.clone()
        }
    }
}

impl Record for Car {
    const COLLECTION: &'static str = collections::CARS;

    fn id(&self) -> &RecordId {
        &self.id
    }
}

/// A completed booking. Created server-side; the client only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rental {
    /// Server-assigned identifier.
    pub id: RecordId,
    /// The rented car, embedded.
    pub car: Car,
    /// First day of the rental (ISO-8601).
    pub start_date: String,
    /// Last day of the rental (ISO-8601).
    pub end_date: String,
}

impl Rental {
    /// Parsed start date.
    pub fn start(&self) -> Result<NaiveDate, RecordError> {
        parse_iso_date(&self.start_date)
    }

    /// Parsed end date.
    pub fn end(&self) -> Result<NaiveDate, RecordError> {
        parse_iso_date(&self.end_date)
    }

    /// Rental period formatted as `dd/MM/yyyy` pairs.
    pub fn period_display(&self) -> Result<(String, String), RecordError> {
        let fmt = "%d/%m/%Y";
        Ok((
            self.start()?.format(fmt).to_string(),
            self.end()?.format(fmt).to_string(),
        ))
    }
}

impl Record for Rental {
    const COLLECTION: &'static str = collections::RENTALS;

    fn id(&self) -> &RecordId {
        &self.id
    }
}

/// Parse an ISO-8601 date or date-time into a calendar date.
///
/// Accepts RFC 3339 timestamps, naive timestamps and bare `YYYY-MM-DD`.
pub fn parse_iso_date(raw: &str) -> Result<NaiveDate, RecordError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(dt.date());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| RecordError::InvalidDate(raw.to_string()))
}
