//! PostgreSQL + Apache AGE backend implementation.
//!
//! Cypher runs through AGE's `cypher()` SQL function. Parameters are bound
//! as a single `agtype` map, and the SQL column list is derived from the
//! final RETURN clause of the statement.
//!
//! # Example
//!
//! ```ignore
//! use retrieval_datastore::graph::backends::postgres::PostgresClient;
//! use retrieval_datastore::graph::QueryExt;
//!
//! let client = PostgresClient::connect(&postgres_config).await?;
//!
//! let rows = client
//!     .query("MATCH (a:Amenity) RETURN count(a) AS count")
//!     .fetch_all()
//!     .await?;
//! ```

use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::BytesMut;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use futures::TryStreamExt;
use serde_json::Value as JsonValue;
use tokio_postgres::types::{to_sql_checked, FromSql, IsNull, ToSql, Type};
use tokio_postgres::NoTls;

use crate::config::{BackendKind, Config, PostgresConfig};
use crate::error::DatastoreError;
use crate::graph::backends::{unsupported, Backend};
use crate::graph::cypher::{extract_return_columns, ParseError};
use crate::graph::row::{Params, Row, RowStream};
use crate::graph::traits::{CypherExecutor, GraphClient, Transaction};

// ----------------------------------------------------------------------------
// Agtype wrappers for AGE parameter binding and result decoding
// ----------------------------------------------------------------------------

/// AGE `agtype` parameter: a version byte followed by JSON text.
///
/// Parameters go over the extended query protocol as typed binary data and
/// are never interpolated into the statement.
#[derive(Debug, Clone)]
struct Agtype(String);

impl ToSql for Agtype {
    fn to_sql(
        &self,
        _ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        out.extend_from_slice(&[1]);
        out.extend_from_slice(self.0.as_bytes());
        Ok(IsNull::No)
    }

    fn accepts(ty: &Type) -> bool {
        // agtype's OID differs per installation
        ty.name() == "agtype"
    }

    to_sql_checked!();
}

/// Decoded `agtype` result value.
///
/// Vertices decode to their property map, matching what the Neo4j backend
/// returns for nodes.
#[derive(Debug)]
struct AgtypeValue(JsonValue);

impl<'a> FromSql<'a> for AgtypeValue {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        if raw.is_empty() {
            return Ok(AgtypeValue(JsonValue::Null));
        }

        let json_bytes = if raw[0] == 1 { &raw[1..] } else { raw };
        let text = std::str::from_utf8(json_bytes)?;
        Ok(AgtypeValue(decode_agtype(text)?))
    }

    fn accepts(ty: &Type) -> bool {
        ty.name() == "agtype"
    }
}

fn decode_agtype(text: &str) -> Result<JsonValue, serde_json::Error> {
    let is_vertex = text.ends_with("::vertex");
    let clean = text
        .trim_end_matches("::vertex")
        .trim_end_matches("::edge")
        .trim_end_matches("::path");

    let value: JsonValue = serde_json::from_str(clean)?;
    match value {
        JsonValue::Object(mut vertex) if is_vertex => Ok(vertex
            .remove("properties")
            .unwrap_or(JsonValue::Object(Default::default()))),
        other => Ok(other),
    }
}

// ----------------------------------------------------------------------------
// Client
// ----------------------------------------------------------------------------

/// PostgreSQL + Apache AGE graph client.
///
/// Provides connection pooling via deadpool-postgres. Cheap to clone; the
/// pool is shared.
#[derive(Clone)]
pub struct PostgresClient {
    pool: Pool,
    graph_name: Arc<str>,
}

impl PostgresClient {
    /// Creates the pool, verifies connectivity and ensures the AGE graph
    /// exists.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, DatastoreError> {
        validate_graph_name(&config.graph)?;

        let pg_config: tokio_postgres::Config = config.uri.parse().map_err(|e| {
            DatastoreError::Connection(format!("Invalid PostgreSQL connection string: {}", e))
        })?;

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let mgr = Manager::from_config(pg_config, NoTls, mgr_config);
        let pool = Pool::builder(mgr)
            .max_size(config.max_connections)
            .build()
            .map_err(|e| {
                DatastoreError::Connection(format!("Failed to create connection pool: {}", e))
            })?;

        let client = Self {
            pool,
            graph_name: Arc::from(config.graph.as_str()),
        };
        client.ensure_graph_exists().await?;

        tracing::debug!("PostgreSQL pool ready for graph '{}'", client.graph_name);
        Ok(client)
    }

    /// Returns a reference to the graph name.
    pub fn graph_name(&self) -> &str {
        &self.graph_name
    }

    /// Gets a connection from the pool with AGE session setup.
    async fn get_connection(&self) -> Result<Object, DatastoreError> {
        if self.pool.is_closed() {
            return Err(DatastoreError::ClosedHandle);
        }

        let conn = self.pool.get().await.map_err(|e| {
            DatastoreError::Connection(format!("Failed to get connection from pool: {}", e))
        })?;

        conn.batch_execute("LOAD 'age'; SET search_path = ag_catalog, \"$user\", public;")
            .await
            .map_err(|e| {
                DatastoreError::Connection(format!("Failed to initialize AGE session: {}", e))
            })?;

        Ok(conn)
    }

    /// Creates the AGE graph unless it already exists.
    async fn ensure_graph_exists(&self) -> Result<(), DatastoreError> {
        let conn = self.get_connection().await?;

        // create_graph has no IF NOT EXISTS form
        let sql = format!(
            r#"
            DO $$
            BEGIN
                IF NOT EXISTS (
                    SELECT 1 FROM ag_catalog.ag_graph WHERE name = '{0}'
                ) THEN
                    PERFORM ag_catalog.create_graph('{0}');
                END IF;
            END $$;
            "#,
            self.graph_name
        );

        conn.batch_execute(&sql)
            .await
            .map_err(|e| DatastoreError::Connection(format!("Failed to ensure graph exists: {}", e)))
    }
}

#[async_trait]
impl CypherExecutor for PostgresClient {
    async fn execute_cypher(
        &self,
        cypher: &str,
        params: Params,
    ) -> Result<RowStream<'_>, DatastoreError> {
        let conn = self.get_connection().await?;
        let (sql, param) = build_age_query(&self.graph_name, cypher, &params)?;
        let rows = query_age(&conn, &sql, param.as_ref(), cypher).await?;
        Ok(Box::pin(futures::stream::iter(rows.into_iter().map(Ok))))
    }

    async fn run_cypher(&self, cypher: &str, params: Params) -> Result<(), DatastoreError> {
        let conn = self.get_connection().await?;
        let (sql, param) = build_age_query(&self.graph_name, cypher, &params)?;
        query_age(&conn, &sql, param.as_ref(), cypher).await?;
        Ok(())
    }
}

#[async_trait]
impl GraphClient for PostgresClient {
    type Session = PostgresSession;

    async fn begin(&self) -> Result<Self::Session, DatastoreError> {
        let conn = self.get_connection().await?;

        conn.batch_execute("BEGIN")
            .await
            .map_err(|e| DatastoreError::Connection(format!("Failed to begin transaction: {}", e)))?;

        Ok(PostgresSession {
            conn: Some(conn),
            graph_name: self.graph_name.clone(),
            finished: false,
        })
    }

    async fn close(&self) -> Result<(), DatastoreError> {
        self.pool.close();
        tracing::debug!("Closed PostgreSQL pool for graph '{}'", self.graph_name);
        Ok(())
    }

    /// AGE cannot replace a property map with `SET n = row`, so every
    /// non-key column is assigned explicitly.
    fn upsert_nodes_cypher(&self, label: &str, key: &str, properties: &[&str]) -> String {
        age_upsert_cypher(label, key, properties)
    }
}

#[async_trait]
impl Backend for PostgresClient {
    const KIND: BackendKind = BackendKind::Postgres;

    async fn open(config: &Config) -> Result<Self, DatastoreError> {
        match config {
            Config::Postgres(postgres) => Self::connect(postgres).await,
            other => Err(unsupported(Self::KIND, other)),
        }
    }
}

// ----------------------------------------------------------------------------
// Session
// ----------------------------------------------------------------------------

/// A PostgreSQL transaction on one pooled connection.
///
/// Dropping an unfinished session detaches its connection from the pool and
/// closes it, so the server rolls the transaction back.
pub struct PostgresSession {
    conn: Option<Object>,
    graph_name: Arc<str>,
    finished: bool,
}

impl PostgresSession {
    fn conn(&self) -> Result<&Object, DatastoreError> {
        self.conn.as_ref().ok_or(DatastoreError::ClosedHandle)
    }

    /// On failure the session stays unfinished, so drop discards the
    /// connection instead of returning it to the pool.
    async fn finish(&mut self, statement: &str) -> Result<(), DatastoreError> {
        self.conn()?.batch_execute(statement).await.map_err(|e| {
            DatastoreError::Internal(format!(
                "Failed to {} transaction: {}",
                statement.to_lowercase(),
                e
            ))
        })?;
        self.finished = true;
        Ok(())
    }
}

#[async_trait]
impl CypherExecutor for PostgresSession {
    async fn execute_cypher(
        &self,
        cypher: &str,
        params: Params,
    ) -> Result<RowStream<'_>, DatastoreError> {
        let (sql, param) = build_age_query(&self.graph_name, cypher, &params)?;
        let rows = query_age(self.conn()?, &sql, param.as_ref(), cypher).await?;
        Ok(Box::pin(futures::stream::iter(rows.into_iter().map(Ok))))
    }

    async fn run_cypher(&self, cypher: &str, params: Params) -> Result<(), DatastoreError> {
        let (sql, param) = build_age_query(&self.graph_name, cypher, &params)?;
        query_age(self.conn()?, &sql, param.as_ref(), cypher).await?;
        Ok(())
    }
}

#[async_trait]
impl Transaction for PostgresSession {
    async fn commit(mut self) -> Result<(), DatastoreError> {
        self.finish("COMMIT").await
    }

    async fn rollback(mut self) -> Result<(), DatastoreError> {
        self.finish("ROLLBACK").await
    }
}

impl Drop for PostgresSession {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Some(conn) = self.conn.take() {
            tracing::warn!("PostgresSession dropped mid-transaction; discarding its connection");
            drop(Object::take(conn));
        }
    }
}

// ----------------------------------------------------------------------------
// Query helpers
// ----------------------------------------------------------------------------

/// Runs a prepared AGE statement and decodes all result rows.
async fn query_age(
    conn: &Object,
    sql: &str,
    param: Option<&Agtype>,
    cypher: &str,
) -> Result<Vec<Row>, DatastoreError> {
    let stream = match param {
        None => conn.query_raw::<_, &Agtype, _>(sql, std::iter::empty()).await,
        Some(param) => conn.query_raw(sql, std::iter::once(param)).await,
    }
    .map_err(|e| pg_query_error(cypher, e))?;

    stream
        .map_err(|e| pg_query_error(cypher, e))
        .and_then(|row| futures::future::ready(parse_pg_row(&row)))
        .try_collect()
        .await
}

fn pg_query_error(cypher: &str, e: tokio_postgres::Error) -> DatastoreError {
    let detail = e
        .as_db_error()
        .map(|db_err| {
            format!(
                "{}: {} ({})",
                db_err.severity(),
                db_err.message(),
                db_err.code().code()
            )
        })
        .unwrap_or_else(|| e.to_string());
    DatastoreError::Query {
        message: format!("Cypher query failed: {}", detail),
        query: cypher.to_string(),
    }
}

/// Builds the AGE SQL wrapper for a Cypher statement.
///
/// `RETURN a, r AS rel` becomes
/// `SELECT * FROM cypher('g', $$ ... $$) as ("a" agtype, "rel" agtype)`.
/// Statements without RETURN get a placeholder `result` column.
fn build_age_query(
    graph_name: &str,
    cypher: &str,
    params: &Params,
) -> Result<(String, Option<Agtype>), DatastoreError> {
    let columns_sql = match extract_return_columns(cypher) {
        Ok(columns) => columns
            .iter()
            .map(|name| format!("\"{}\" agtype", name.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(", "),
        Err(ParseError::NoReturnClause) => "result agtype".to_string(),
        Err(e) => {
            return Err(DatastoreError::Query {
                message: e.to_string(),
                query: cypher.to_string(),
            })
        }
    };

    if params.is_empty() {
        let sql = format!(
            "SELECT * FROM cypher('{}', $$ {} $$) as ({})",
            graph_name, cypher, columns_sql
        );
        Ok((sql, None))
    } else {
        let sql = format!(
            "SELECT * FROM cypher('{}', $$ {} $$, $1) as ({})",
            graph_name, cypher, columns_sql
        );
        let params_json = serde_json::to_string(params).map_err(|e| {
            DatastoreError::Internal(format!("Failed to serialize parameters: {}", e))
        })?;
        Ok((sql, Some(Agtype(params_json))))
    }
}

/// Builds the batched upsert for AGE with one assignment per property.
fn age_upsert_cypher(label: &str, key: &str, properties: &[&str]) -> String {
    let assignments = properties
        .iter()
        .filter(|property| **property != key)
        .map(|property| format!("n.{property} = row.{property}"))
        .collect::<Vec<_>>();

    let merge = format!("UNWIND $rows AS row MERGE (n:{label} {{{key}: row.{key}}})");
    if assignments.is_empty() {
        merge
    } else {
        format!("{merge} SET {}", assignments.join(", "))
    }
}

/// Converts a PostgreSQL row into a [`Row`].
///
/// AGE columns are `agtype`; anything else is read as text. SQL NULL
/// becomes JSON null; undecodable values are an error.
fn parse_pg_row(pg_row: &tokio_postgres::Row) -> Result<Row, DatastoreError> {
    let data = pg_row
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| -> Result<(String, JsonValue), DatastoreError> {
            let value = if column.type_().name() == "agtype" {
                pg_row
                    .try_get::<_, Option<AgtypeValue>>(idx)
                    .map(|v| v.map(|v| v.0))
            } else {
                pg_row
                    .try_get::<_, Option<String>>(idx)
                    .map(|v| v.map(JsonValue::String))
            }
            .map_err(|e| {
                DatastoreError::Internal(format!(
                    "Failed to decode column '{}': {}",
                    column.name(),
                    e
                ))
            })?;
            Ok((column.name().to_string(), value.unwrap_or(JsonValue::Null)))
        })
        .collect::<Result<HashMap<_, _>, DatastoreError>>()?;

    Ok(Row::new(data))
}

fn validate_graph_name(name: &str) -> Result<(), DatastoreError> {
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(DatastoreError::Connection(format!(
            "Invalid AGE graph name '{}': use letters, digits and underscores",
            name
        )))
    }
}
