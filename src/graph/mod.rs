//! Graph-store access: Bolt client, schema management and the batched
//! entity writer.

pub mod bolt;
pub mod schema;
pub mod writer;

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use neo4rs::{Graph, Query};
use tracing::info;

use crate::control::TRANSACTION_TIMEOUT;

/// Thin wrapper around the Bolt driver with per-query timeouts.
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
}

impl GraphClient {
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self> {
        info!("Connecting to graph store at {}...", uri);
        let graph = Graph::new(uri, user, password)
            .await
            .context("Failed to connect to graph store")?;
        Ok(Self { graph })
    }

    /// Connect using `NEO4J_URI` / `NEO4J_USER` / `NEO4J_PASSWORD`,
    /// defaulting to a local instance.
    pub async fn from_env() -> Result<Self> {
        let uri = std::env::var("NEO4J_URI").unwrap_or_else(|_| "bolt://localhost:7687".into());
        let user = std::env::var("NEO4J_USER").unwrap_or_else(|_| "neo4j".into());
        let password = std::env::var("NEO4J_PASSWORD").unwrap_or_else(|_| "password".into());
        Self::connect(&uri, &user, &password).await
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Run a write query with the standard transaction timeout.
    pub async fn run(&self, query: Query) -> Result<()> {
        self.run_with_timeout(query, TRANSACTION_TIMEOUT).await
    }

    pub async fn run_with_timeout(&self, query: Query, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.graph.run(query))
            .await
            .map_err(|_| anyhow!("transaction timed out after {:?}", timeout))?
            .context("Graph write failed")?;
        Ok(())
    }

    /// Run a query and return a single integer column from its first row.
    pub async fn single_i64(&self, query: Query, column: &str) -> Result<i64> {
        let mut rows = tokio::time::timeout(TRANSACTION_TIMEOUT, self.graph.execute(query))
            .await
            .map_err(|_| anyhow!("transaction timed out after {:?}", TRANSACTION_TIMEOUT))?
            .context("Graph query failed")?;
        if let Some(row) = rows.next().await? {
            Ok(row.get::<i64>(column)?)
        } else {
            Ok(0)
        }
    }

    /// Run a query and collect one string column from every row.
    pub async fn string_column(&self, query: Query, column: &str) -> Result<Vec<String>> {
        let mut rows = self.graph.execute(query).await.context("Graph query failed")?;
        let mut values = Vec::new();
        while let Some(row) = rows.next().await? {
            values.push(row.get::<String>(column)?);
        }
        Ok(values)
    }
}
