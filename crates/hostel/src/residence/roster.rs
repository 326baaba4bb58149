use std::io::Read;

use serde::{Deserialize, Serialize};

use super::forms::{RoomForm, ValidationError};
use super::service::HostelServiceError;

#[derive(Debug)]
pub enum RoomImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Service(HostelServiceError),
}

impl std::fmt::Display for RoomImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoomImportError::Io(err) => write!(f, "failed to read room roster: {}", err),
            RoomImportError::Csv(err) => write!(f, "invalid room roster CSV data: {}", err),
            RoomImportError::Service(err) => {
                write!(f, "could not apply room roster to the hostel: {}", err)
            }
        }
    }
}

impl std::error::Error for RoomImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RoomImportError::Io(err) => Some(err),
            RoomImportError::Csv(err) => Some(err),
            RoomImportError::Service(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for RoomImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for RoomImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<HostelServiceError> for RoomImportError {
    fn from(err: HostelServiceError) -> Self {
        Self::Service(err)
    }
}

/// Outcome of a roster import. Rejected rows carry their CSV line number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoomImportSummary {
    pub created: Vec<String>,
    pub rejected: Vec<(usize, ValidationError)>,
}

#[derive(Debug, Deserialize)]
struct RosterRow {
    #[serde(default)]
    room_number: String,
    #[serde(default)]
    room_type: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    capacity: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    is_available: Option<String>,
}

impl RosterRow {
    fn into_form(self) -> Result<RoomForm, ValidationError> {
        let mut errors = ValidationError::default();

        let capacity = match self.capacity.as_deref().map(str::parse::<i64>) {
            None => None,
            Some(Ok(value)) => Some(value),
            Some(Err(_)) => {
                errors.add("capacity", "Enter a whole number.");
                None
            }
        };

        let is_available = match self.is_available.as_deref() {
            None => None,
            Some(raw) => {
                let parsed = parse_flag(raw);
                if parsed.is_none() {
                    errors.add(
                        "is_available",
                        format!("'{raw}' is neither true nor false."),
                    );
                }
                parsed
            }
        };

        errors.into_result(RoomForm {
            room_number: self.room_number,
            room_type: self.room_type,
            capacity,
            is_available,
        })
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Some(true),
        "false" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

/// A roster row turned into a room form, or the cell errors that stopped it.
pub(crate) type RosterEntry = (usize, Result<RoomForm, ValidationError>);

pub(crate) fn parse_roster<R: Read>(mut reader: R) -> Result<Vec<RosterEntry>, RoomImportError> {
    let mut source = Vec::new();
    reader.read_to_end(&mut source)?;

    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(source.as_slice());

    let headers = csv_reader.headers()?.clone();
    let mut entries = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let line = record
            .position()
            .map_or(0, |position| record_line(&source, position));
        let row: RosterRow = record.deserialize(Some(&headers))?;
        entries.push((line, row.into_form()));
    }
    Ok(entries)
}

/// Line on which a record's first cell sits.
///
/// A record's position is taken before the reader skips blank lines, so those line breaks
/// are counted here.
fn record_line(source: &[u8], position: &csv::Position) -> usize {
    let start = usize::try_from(position.byte()).unwrap_or(usize::MAX);
    let skipped = source
        .get(start..)
        .unwrap_or_default()
        .iter()
        .take_while(|byte| matches!(byte, b'\r' | b'\n'))
        .filter(|byte| **byte == b'\n')
        .count();
    usize::try_from(position.line()).unwrap_or(usize::MAX) + skipped
}
