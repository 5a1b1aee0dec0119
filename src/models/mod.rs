//! Row models for the knowledge graph datasets.
//!
//! Each model is an immutable record parsed from one CSV row and written as
//! one graph node. The node carries every field of the record as a property
//! and is identified by `(label, id)`.

mod airport;
mod amenity;
mod flight;
mod policy;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::error::DatastoreError;

pub use airport::Airport;
pub use amenity::Amenity;
pub use flight::Flight;
pub use policy::Policy;

/// Identity of a record within its label. Always non-negative; signed so
/// every id is a native Bolt and agtype integer.
pub type EntityId = i64;

/// Property holding the node identity.
pub const KEY_PROPERTY: &str = "id";

/// A record that materializes as a single labeled graph node.
pub trait GraphNode: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Node label (e.g. `Amenity`).
    const LABEL: &'static str;

    /// CSV columns the record requires; also the node's property keys.
    const COLUMNS: &'static [&'static str];

    /// Identity within [`Self::LABEL`].
    fn id(&self) -> EntityId;

    /// All fields as a property map, keyed by column name.
    fn properties(&self) -> Result<JsonMap<String, JsonValue>, DatastoreError> {
        match serde_json::to_value(self) {
            Ok(JsonValue::Object(map)) => Ok(map),
            Ok(other) => Err(DatastoreError::Internal(format!(
                "{} serialized to {} instead of a property map",
                Self::LABEL,
                other
            ))),
            Err(e) => Err(DatastoreError::Internal(format!(
                "failed to serialize {} {}: {}",
                Self::LABEL,
                self.id(),
                e
            ))),
        }
    }
}
