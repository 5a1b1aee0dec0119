//! Airport model.

use serde::{Deserialize, Serialize};

use super::{EntityId, GraphNode};

/// An airport, addressable by its IATA code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Airport {
    pub id: EntityId,
    /// Three-letter IATA code; flights reference airports by this value.
    pub iata: String,
    pub name: String,
    pub city: String,
    pub country: String,
}

impl GraphNode for Airport {
    const LABEL: &'static str = "Airport";
    const COLUMNS: &'static [&'static str] = &["id", "iata", "name", "city", "country"];

    fn id(&self) -> EntityId {
        self.id
    }
}
