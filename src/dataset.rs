//! Dataset loading from the four CSV sources.
//!
//! Each source is optional. Loading is all-or-nothing: every configured file
//! is parsed before anything is returned, and the first malformed file fails
//! the whole load.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::DatastoreError;
use crate::models::{Airport, Amenity, Flight, GraphNode, Policy, KEY_PROPERTY};

/// Locations of the four dataset files. `None` (or an empty path) means the
/// corresponding entity type is not loaded.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatasetPaths {
    #[serde(default)]
    pub airports: Option<PathBuf>,
    #[serde(default)]
    pub amenities: Option<PathBuf>,
    #[serde(default)]
    pub flights: Option<PathBuf>,
    #[serde(default)]
    pub policies: Option<PathBuf>,
}

impl DatasetPaths {
    /// Builds paths positionally; empty strings mark a source as absent.
    pub fn new(
        airports: impl AsRef<Path>,
        amenities: impl AsRef<Path>,
        flights: impl AsRef<Path>,
        policies: impl AsRef<Path>,
    ) -> Self {
        Self {
            airports: non_empty(airports.as_ref()),
            amenities: non_empty(amenities.as_ref()),
            flights: non_empty(flights.as_ref()),
            policies: non_empty(policies.as_ref()),
        }
    }
}

fn non_empty(path: &Path) -> Option<PathBuf> {
    (!path.as_os_str().is_empty()).then(|| path.to_path_buf())
}

/// Parsed records, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    pub airports: Vec<Airport>,
    pub amenities: Vec<Amenity>,
    pub flights: Vec<Flight>,
    pub policies: Vec<Policy>,
}

impl Dataset {
    /// Record count per node label.
    pub fn counts(&self) -> [(&'static str, usize); 4] {
        [
            (Airport::LABEL, self.airports.len()),
            (Amenity::LABEL, self.amenities.len()),
            (Flight::LABEL, self.flights.len()),
            (Policy::LABEL, self.policies.len()),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.counts().iter().all(|(_, count)| *count == 0)
    }
}

/// Loads every configured source.
///
/// This is blocking file I/O; async callers should run it on a blocking
/// thread.
pub fn load(paths: &DatasetPaths) -> Result<Dataset, DatastoreError> {
    let dataset = Dataset {
        airports: read_optional(paths.airports.as_deref())?,
        amenities: read_optional(paths.amenities.as_deref())?,
        flights: read_optional(paths.flights.as_deref())?,
        policies: read_optional(paths.policies.as_deref())?,
    };

    for (label, count) in dataset.counts() {
        tracing::debug!("Parsed {} {} records", count, label);
    }

    Ok(dataset)
}

fn read_optional<N: GraphNode>(path: Option<&Path>) -> Result<Vec<N>, DatastoreError> {
    match path {
        Some(path) if !path.as_os_str().is_empty() => read_csv(path),
        _ => Ok(Vec::new()),
    }
}

/// Parses one CSV file into records of type `N`.
///
/// Row numbers are 1-based over data rows; header problems report row 0.
fn read_csv<N: GraphNode>(path: &Path) -> Result<Vec<N>, DatastoreError> {
    let file = File::open(path).map_err(|source| DatastoreError::DatasetIo {
        path: path.to_path_buf(),
        source,
    })?;
    let file_name = path.display().to_string();

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| format_error(&file_name, 0, "*", e.to_string()))?
        .clone();

    if let Some(missing) = N::COLUMNS
        .iter()
        .find(|column| !headers.iter().any(|h| h == **column))
    {
        return Err(format_error(
            &file_name,
            0,
            missing,
            format!("missing required column for {}", N::LABEL),
        ));
    }

    let mut records = Vec::new();
    for (index, result) in reader.deserialize::<N>().enumerate() {
        let row = index as u64 + 1;
        let record = result.map_err(|e| match e.kind() {
            csv::ErrorKind::Deserialize { err, .. } => {
                let column = err
                    .field()
                    .and_then(|field| headers.get(field as usize))
                    .unwrap_or("*");
                format_error(&file_name, row, column, err.kind().to_string())
            }
            _ => format_error(&file_name, row, "*", e.to_string()),
        })?;
        if record.id() < 0 {
            return Err(format_error(
                &file_name,
                row,
                KEY_PROPERTY,
                format!("id must be non-negative, got {}", record.id()),
            ));
        }
        records.push(record);
    }

    Ok(records)
}

fn format_error(file: &str, row: u64, column: &str, message: String) -> DatastoreError {
    DatastoreError::DatasetFormat {
        file: file.to_string(),
        row,
        column: column.to_string(),
        message,
    }
}
