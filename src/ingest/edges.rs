//! Deferred relationship rules.

use crate::models::{Airport, Flight, GraphNode};

/// Links every `from_label` node to every `to_label` node whose properties
/// join: `from.from_property = to.to_property`.
///
/// Applying a rule also removes its relationships whose endpoints no longer
/// join, so a flight moved to another airport loses its old edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRule {
    pub from_label: &'static str,
    pub to_label: &'static str,
    pub relationship: &'static str,
    pub from_property: &'static str,
    pub to_property: &'static str,
}

impl EdgeRule {
    /// Relationship merge statement. Re-running it creates no duplicates.
    pub fn cypher(&self) -> String {
        format!(
            "MATCH (a:{from}), (b:{to}) WHERE a.{fp} = b.{tp} MERGE (a)-[:{rel}]->(b)",
            from = self.from_label,
            to = self.to_label,
            fp = self.from_property,
            tp = self.to_property,
            rel = self.relationship,
        )
    }

    /// Deletes relationships of this type whose endpoints no longer join.
    pub fn prune_cypher(&self) -> String {
        format!(
            "MATCH (a:{from})-[r:{rel}]->(b:{to}) WHERE a.{fp} IS NULL OR a.{fp} <> b.{tp} DELETE r",
            from = self.from_label,
            to = self.to_label,
            fp = self.from_property,
            tp = self.to_property,
            rel = self.relationship,
        )
    }

    /// Whether both endpoint labels are among `labels`.
    pub fn applies_to(&self, labels: &[&str]) -> bool {
        labels.contains(&self.from_label) && labels.contains(&self.to_label)
    }
}

/// Flights to their departure and arrival airports, joined on IATA code.
pub fn flight_airport_edges() -> Vec<EdgeRule> {
    vec![
        EdgeRule {
            from_label: Flight::LABEL,
            to_label: Airport::LABEL,
            relationship: "DEPARTS_FROM",
            from_property: "departure_airport",
            to_property: "iata",
        },
        EdgeRule {
            from_label: Flight::LABEL,
            to_label: Airport::LABEL,
            relationship: "ARRIVES_AT",
            from_property: "arrival_airport",
            to_property: "iata",
        },
    ]
}
