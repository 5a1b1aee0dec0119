//! In-memory graph client for unit tests.
//!
//! Understands the handful of statements this crate issues: batched node
//! upserts, property-join relationship merges, label counts, relationship
//! counts and single-node property lookups. Anything else is recorded and
//! answered with no rows.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Map as JsonMap, Value as JsonValue};

use crate::config::{BackendKind, Config};
use crate::error::DatastoreError;
use crate::graph::backends::{unsupported, Backend};
use crate::graph::row::{Params, Row, RowStream};
use crate::graph::traits::{CypherExecutor, GraphClient, Transaction};
use crate::models::EntityId;

type NodeKey = (String, EntityId);

#[derive(Default)]
pub(crate) struct MemoryState {
    pub nodes: BTreeMap<NodeKey, JsonMap<String, JsonValue>>,
    /// `(relationship, from, to)`
    pub edges: BTreeSet<(String, NodeKey, NodeKey)>,
    pub statements: Vec<String>,
    pub sessions_opened: usize,
    pub commits: usize,
    pub rollbacks: usize,
    pub closed: bool,
    fail_on: Option<NodeKey>,
    fail_relationship: Option<String>,
}

/// Shared in-memory graph. Clones see the same state.
#[derive(Clone, Default)]
pub(crate) struct MemoryClient {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes any upsert batch containing `(label, id)` fail.
    pub fn fail_on(&self, label: &str, id: EntityId) {
        self.state.lock().fail_on = Some((label.to_string(), id));
    }

    /// Makes any statement writing `relationship` edges fail.
    pub fn fail_link(&self, relationship: &str) {
        self.state.lock().fail_relationship = Some(relationship.to_string());
    }

    pub fn state(&self) -> parking_lot::MutexGuard<'_, MemoryState> {
        self.state.lock()
    }

    pub fn node_count(&self, label: &str) -> usize {
        self.state.lock().nodes.keys().filter(|(l, _)| l == label).count()
    }

    pub fn node(&self, label: &str, id: EntityId) -> Option<JsonMap<String, JsonValue>> {
        self.state.lock().nodes.get(&(label.to_string(), id)).cloned()
    }

    pub fn edge_count(&self, relationship: &str) -> usize {
        self.state
            .lock()
            .edges
            .iter()
            .filter(|(rel, _, _)| rel == relationship)
            .count()
    }

    fn ensure_open(&self) -> Result<(), DatastoreError> {
        if self.state.lock().closed {
            Err(DatastoreError::ClosedHandle)
        } else {
            Ok(())
        }
    }
}

enum Op {
    Upsert {
        label: String,
        rows: Vec<JsonMap<String, JsonValue>>,
    },
    Link(Join),
    Unlink(Join),
}

/// Property join between two labels, as written by relationship rules.
struct Join {
    from_label: String,
    to_label: String,
    from_property: String,
    to_property: String,
    relationship: String,
}

impl Join {
    fn parse(cypher: &str) -> Option<Self> {
        Some(Self {
            from_label: between(cypher, "(a:", ")")?.to_string(),
            to_label: between(cypher, "(b:", ")")?.to_string(),
            from_property: between(cypher, "WHERE a.", " ")?.to_string(),
            to_property: between(cypher, "b.", " ")?.to_string(),
            relationship: between(cypher, ":", "]")?
                .rsplit(':')
                .next()?
                .to_string(),
        })
    }

    fn joins(&self, state: &MemoryState, from: &NodeKey, to: &NodeKey) -> bool {
        let left = state.nodes.get(from).and_then(|p| p.get(&self.from_property));
        let right = state.nodes.get(to).and_then(|p| p.get(&self.to_property));
        left.is_some() && left == right
    }
}

impl Op {
    fn apply(self, state: &mut MemoryState) {
        match self {
            Op::Upsert { label, rows } => {
                for row in rows {
                    if let Some(id) = row.get("id").and_then(JsonValue::as_i64) {
                        state.nodes.insert((label.clone(), id), row);
                    }
                }
            }
            Op::Link(join) => {
                let view: &MemoryState = state;
                let mut links = Vec::new();
                for from_key in view.nodes.keys().filter(|(l, _)| *l == join.from_label) {
                    for to_key in view.nodes.keys().filter(|(l, _)| *l == join.to_label) {
                        if join.joins(view, from_key, to_key) {
                            links.push((join.relationship.clone(), from_key.clone(), to_key.clone()));
                        }
                    }
                }
                state.edges.extend(links);
            }
            Op::Unlink(join) => {
                let view: &MemoryState = state;
                let stale: Vec<_> = view
                    .edges
                    .iter()
                    .filter(|(rel, from, to)| {
                        *rel == join.relationship
                            && from.0 == join.from_label
                            && to.0 == join.to_label
                            && !join.joins(view, from, to)
                    })
                    .cloned()
                    .collect();
                for edge in stale {
                    state.edges.remove(&edge);
                }
            }
        }
    }
}

/// Returns the text between `start` and the next `end`.
fn between<'a>(text: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let rest = &text[text.find(start)? + start.len()..];
    Some(&rest[..rest.find(end)?])
}

/// Parses a statement into a write operation.
fn parse_write(
    state: &MemoryState,
    cypher: &str,
    params: &Params,
) -> Result<Option<Op>, DatastoreError> {
    if cypher.starts_with("UNWIND $rows AS row MERGE (n:") {
        let label = between(cypher, "MERGE (n:", " ").unwrap_or_default().to_string();
        let rows: Vec<JsonMap<String, JsonValue>> = params
            .get("rows")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| DatastoreError::Internal(e.to_string()))?
            .unwrap_or_default();

        if let Some((fail_label, fail_id)) = &state.fail_on {
            let hit = *fail_label == label
                && rows
                    .iter()
                    .any(|row| row.get("id").and_then(JsonValue::as_i64) == Some(*fail_id));
            if hit {
                return Err(DatastoreError::Query {
                    message: format!("injected failure for {label} {fail_id}"),
                    query: cypher.to_string(),
                });
            }
        }

        return Ok(Some(Op::Upsert { label, rows }));
    }

    if cypher.starts_with("MATCH (a:") {
        let Some(join) = Join::parse(cypher) else {
            return Ok(None);
        };
        if state.fail_relationship.as_deref() == Some(join.relationship.as_str()) {
            return Err(DatastoreError::Query {
                message: format!("injected failure for {}", join.relationship),
                query: cypher.to_string(),
            });
        }
        if cypher.ends_with("DELETE r") {
            return Ok(Some(Op::Unlink(join)));
        }
        if cypher.contains("MERGE (a)-[:") {
            return Ok(Some(Op::Link(join)));
        }
    }

    Ok(None)
}

/// Answers the read statements the tests issue.
fn answer_read(state: &MemoryState, cypher: &str, params: &Params) -> Vec<Row> {
    let row = |column: &str, value: JsonValue| {
        Row::new(HashMap::from([(column.to_string(), value)]))
    };

    if let Some(rel) = between(cypher, "MATCH ()-[r:", "]->() RETURN count(r)") {
        let count = state.edges.iter().filter(|(r, _, _)| r == rel).count();
        return vec![row("count", json!(count))];
    }

    if cypher.contains("RETURN count(n) AS count") {
        let label = between(cypher, "MATCH (n:", ")").unwrap_or_default();
        let count = state.nodes.keys().filter(|(l, _)| l == label).count();
        return vec![row("count", json!(count))];
    }

    if cypher.contains("RETURN properties(n) AS n") {
        let label = between(cypher, "MATCH (n:", " ").unwrap_or_default();
        let id = params.get("id").and_then(JsonValue::as_i64);
        return id
            .and_then(|id| state.nodes.get(&(label.to_string(), id)))
            .map(|props| vec![row("n", JsonValue::Object(props.clone()))])
            .unwrap_or_default();
    }

    Vec::new()
}

#[async_trait]
impl CypherExecutor for MemoryClient {
    async fn execute_cypher(
        &self,
        cypher: &str,
        params: Params,
    ) -> Result<RowStream<'_>, DatastoreError> {
        self.ensure_open()?;
        let mut state = self.state.lock();
        state.statements.push(cypher.to_string());
        let rows = answer_read(&state, cypher, &params);
        Ok(Box::pin(futures::stream::iter(rows.into_iter().map(Ok))))
    }

    async fn run_cypher(&self, cypher: &str, params: Params) -> Result<(), DatastoreError> {
        self.ensure_open()?;
        let mut state = self.state.lock();
        state.statements.push(cypher.to_string());
        if let Some(op) = parse_write(&state, cypher, &params)? {
            op.apply(&mut state);
        }
        Ok(())
    }
}

#[async_trait]
impl GraphClient for MemoryClient {
    type Session = MemorySession;

    async fn begin(&self) -> Result<Self::Session, DatastoreError> {
        self.ensure_open()?;
        self.state.lock().sessions_opened += 1;
        Ok(MemorySession {
            client: self.clone(),
            pending: Mutex::new(Vec::new()),
        })
    }

    async fn close(&self) -> Result<(), DatastoreError> {
        self.state.lock().closed = true;
        Ok(())
    }
}

#[async_trait]
impl Backend for MemoryClient {
    const KIND: BackendKind = BackendKind::Neo4j;

    async fn open(config: &Config) -> Result<Self, DatastoreError> {
        match config {
            Config::Neo4j(_) => Ok(Self::new()),
            other => Err(unsupported(Self::KIND, other)),
        }
    }
}

/// Buffers writes until commit.
pub(crate) struct MemorySession {
    client: MemoryClient,
    pending: Mutex<Vec<Op>>,
}

#[async_trait]
impl CypherExecutor for MemorySession {
    async fn execute_cypher(
        &self,
        cypher: &str,
        params: Params,
    ) -> Result<RowStream<'_>, DatastoreError> {
        self.client.execute_cypher(cypher, params).await
    }

    async fn run_cypher(&self, cypher: &str, params: Params) -> Result<(), DatastoreError> {
        self.client.ensure_open()?;
        let mut state = self.client.state.lock();
        state.statements.push(cypher.to_string());
        if let Some(op) = parse_write(&state, cypher, &params)? {
            self.pending.lock().push(op);
        }
        Ok(())
    }
}

#[async_trait]
impl Transaction for MemorySession {
    async fn commit(self) -> Result<(), DatastoreError> {
        let mut state = self.client.state.lock();
        for op in self.pending.into_inner() {
            op.apply(&mut state);
        }
        state.commits += 1;
        Ok(())
    }

    async fn rollback(self) -> Result<(), DatastoreError> {
        self.client.state.lock().rollbacks += 1;
        Ok(())
    }
}
