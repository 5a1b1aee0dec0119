//! Macro for convenient Cypher query construction.

/// Builds a [`Query`](crate::graph::Query) with named parameters.
///
/// # Usage
///
/// ```ignore
/// use retrieval_datastore::cypher;
/// use retrieval_datastore::graph::QueryExt;
///
/// let query = cypher!(session, "MATCH (a:Amenity) RETURN count(a) AS count");
///
/// let query = cypher!(
///     session,
///     "MATCH (a:Amenity {id: $id}) RETURN properties(a) AS a",
///     id = 35,
/// );
///
/// let rows = query.fetch_all().await?;
/// ```
#[macro_export]
macro_rules! cypher {
    // Query without parameters
    ($executor:expr, $query:expr) => {
        $executor.query($query)
    };
    // Query with parameters
    ($executor:expr, $query:expr, $($name:ident = $value:expr),+ $(,)?) => {
        $executor.query($query)$(.param(stringify!($name), $value))+
    };
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use crate::error::DatastoreError;
    use crate::graph::query::QueryExt;
    use crate::graph::row::{Params, RowStream};
    use crate::graph::traits::CypherExecutor;

    #[derive(Default)]
    struct RecordingExecutor {
        runs: Mutex<Vec<(String, Params)>>,
    }

    #[async_trait::async_trait]
    impl CypherExecutor for RecordingExecutor {
        async fn execute_cypher(
            &self,
            _cypher: &str,
            _params: Params,
        ) -> Result<RowStream<'_>, DatastoreError> {
            Ok(Box::pin(futures::stream::empty()))
        }

        async fn run_cypher(&self, cypher: &str, params: Params) -> Result<(), DatastoreError> {
            self.runs.lock().push((cypher.to_string(), params));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_cypher_macro_no_params() {
        let executor = RecordingExecutor::default();
        cypher!(executor, "MATCH (n) DETACH DELETE n")
            .run()
            .await
            .unwrap();

        let runs = executor.runs.lock();
        assert_eq!(runs[0].0, "MATCH (n) DETACH DELETE n");
        assert!(runs[0].1.is_empty());
    }

    #[tokio::test]
    async fn test_cypher_macro_with_params() {
        let executor = RecordingExecutor::default();
        let rows = vec![serde_json::json!({"id": 35})];
        cypher!(
            executor,
            "UNWIND $rows AS row MERGE (n:Amenity {id: row.id}) SET n = row",
            rows = rows,
            batch = 1,
        )
        .run()
        .await
        .unwrap();

        let runs = executor.runs.lock();
        assert_eq!(runs[0].1["rows"], serde_json::json!([{"id": 35}]));
        assert_eq!(runs[0].1["batch"], serde_json::json!(1));
    }

    #[tokio::test]
    async fn test_cypher_macro_through_reference() {
        let executor = RecordingExecutor::default();
        let by_ref = &executor;
        cypher!(by_ref, "RETURN 1", id = "x").run().await.unwrap();
        assert_eq!(executor.runs.lock().len(), 1);
    }
}
