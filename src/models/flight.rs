//! Flight model.

use serde::{Deserialize, Serialize};

use super::{EntityId, GraphNode};

/// A scheduled flight between two airports.
///
/// Times are kept verbatim as they appear in the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flight {
    pub id: EntityId,
    pub airline: String,
    pub flight_number: String,
    /// IATA code of the origin airport.
    pub departure_airport: String,
    /// IATA code of the destination airport.
    pub arrival_airport: String,
    pub departure_time: String,
    pub arrival_time: String,
    pub departure_gate: String,
    pub arrival_gate: String,
}

impl GraphNode for Flight {
    const LABEL: &'static str = "Flight";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "airline",
        "flight_number",
        "departure_airport",
        "arrival_airport",
        "departure_time",
        "arrival_time",
        "departure_gate",
        "arrival_gate",
    ];

    fn id(&self) -> EntityId {
        self.id
    }
}
