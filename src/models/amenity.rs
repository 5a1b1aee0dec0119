//! Amenity model: shops, lounges and facilities inside an airport.

use serde::{Deserialize, Serialize};

use super::{EntityId, GraphNode};

/// An airport amenity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amenity {
    pub id: EntityId,
    pub name: String,
    pub description: String,
    /// Where in the terminal the amenity is (e.g. "Arrivals Hall").
    pub location: String,
    /// Terminal name, or "All Terminals".
    pub terminal: String,
    /// Free-form category such as "restaurant" or "facility".
    pub category: String,
    /// Opening hours as published (e.g. "24/7").
    pub hour: String,
}

impl GraphNode for Amenity {
    const LABEL: &'static str = "Amenity";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "description",
        "location",
        "terminal",
        "category",
        "hour",
    ];

    fn id(&self) -> EntityId {
        self.id
    }
}
