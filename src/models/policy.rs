//! Airline policy model.

use serde::{Deserialize, Serialize};

use super::{EntityId, GraphNode};

/// One passage of the airline's published policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub id: EntityId,
    pub topic: String,
    pub content: String,
}

impl GraphNode for Policy {
    const LABEL: &'static str = "Policy";
    const COLUMNS: &'static [&'static str] = &["id", "topic", "content"];

    fn id(&self) -> EntityId {
        self.id
    }
}
