use anyhow::Result;
use chrono::Utc;
use sqlx::{sqlite::SqlitePool, Row};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::cache::Cache;

use super::types::{Direction, EdgeType, GraphNode, NodeFilter, NodeLabel};

// Async property-graph store over a SQLx connection pool. Nodes carry JSON
// props; edges are typed and directed with at most one edge per
// (source, target, type) triple.
pub struct GraphStore {
    pool: SqlitePool,
    node_cache: Arc<Mutex<Cache<i64, GraphNode>>>,
}

const CONNECT_BACKOFF: Duration = Duration::from_secs(2);

impl GraphStore {
    /// Connects to the backing database, retrying with a fixed backoff until
    /// the store is reachable. Startup-time only; mid-request failures are
    /// surfaced, not retried.
    pub async fn connect(database_url: &str, cache_capacity: usize) -> Self {
        let pool = loop {
            match SqlitePool::connect(database_url).await {
                Ok(pool) => break pool,
                Err(err) => {
                    tracing::warn!(
                        "graph store unreachable ({}), retrying in {:?}",
                        err,
                        CONNECT_BACKOFF
                    );
                    tokio::time::sleep(CONNECT_BACKOFF).await;
                }
            }
        };

        GraphStore {
            pool,
            node_cache: Arc::new(Mutex::new(Cache::new(cache_capacity))),
        }
    }

    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS nodes (
                id INTEGER PRIMARY KEY,
                label TEXT NOT NULL,
                props TEXT NOT NULL,
                created INTEGER NOT NULL,
                updated INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS edges (
                source_id INTEGER NOT NULL,
                target_id INTEGER NOT NULL,
                edge_type TEXT NOT NULL,
                created INTEGER NOT NULL,
                UNIQUE(source_id, target_id, edge_type)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_nodes_label ON nodes(label)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_edges_source_type ON edges(source_id, edge_type)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_edges_target_type ON edges(target_id, edge_type)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn create_node(&self, label: NodeLabel, props: &serde_json::Value) -> Result<GraphNode> {
        let now = Utc::now().timestamp();
        let props_text = serde_json::to_string(props)?;

        let result = sqlx::query(
            "INSERT INTO nodes (label, props, created, updated) VALUES (?, ?, ?, ?)",
        )
        .bind(label.as_str())
        .bind(&props_text)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let node = GraphNode {
            id: result.last_insert_rowid(),
            label: label.as_str().to_string(),
            props: props.clone(),
            created: now,
            updated: now,
        };

        self.node_cache.lock().await.insert(node.id, node.clone());

        Ok(node)
    }

    pub async fn get_node(&self, id: i64) -> Result<Option<GraphNode>> {
        {
            let mut cache = self.node_cache.lock().await;
            if let Some(node) = cache.get(&id).cloned() {
                return Ok(Some(node));
            }
        }

        let row = sqlx::query("SELECT id, label, props, created, updated FROM nodes WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let node = node_from_row(&row)?;
                self.node_cache.lock().await.insert(id, node.clone());
                Ok(Some(node))
            }
            None => Ok(None),
        }
    }

    pub async fn find_one(&self, label: NodeLabel, filter: &NodeFilter) -> Result<Option<GraphNode>> {
        let mut nodes = self.find_many(label, filter, Some(1), None).await?;
        Ok(nodes.pop())
    }

    /// Filtered scan over one label. Results are ordered by creation time
    /// then id, so repeated reads without intervening writes are stable.
    pub async fn find_many(
        &self,
        label: NodeLabel,
        filter: &NodeFilter,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<GraphNode>> {
        let (conditions, binds) = filter.to_sql();
        let mut sql = String::from(
            "SELECT id, label, props, created, updated FROM nodes WHERE label = ?",
        );
        if !conditions.is_empty() {
            sql.push_str(" AND ");
            sql.push_str(&conditions);
        }
        sql.push_str(" ORDER BY created ASC, id ASC LIMIT ? OFFSET ?");

        let mut query = sqlx::query(&sql).bind(label.as_str());
        for bind in &binds {
            query = query.bind(bind.as_str());
        }
        // LIMIT -1 is SQLite for "no limit".
        query = query.bind(limit.unwrap_or(-1)).bind(offset.unwrap_or(0));

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(node_from_row).collect()
    }

    pub async fn update_node(&self, id: i64, props: &serde_json::Value) -> Result<()> {
        let now = Utc::now().timestamp();
        let props_text = serde_json::to_string(props)?;

        sqlx::query("UPDATE nodes SET props = ?, updated = ? WHERE id = ?")
            .bind(&props_text)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.node_cache.lock().await.remove(&id);

        Ok(())
    }

    /// Deletes a node and every edge touching it, atomically. Deleting an
    /// absent node is a no-op.
    pub async fn delete_node(&self, id: i64) -> Result<()> {
        self.delete_nodes(&[id]).await
    }

    /// Batch delete in a single transaction, for cascades: either the whole
    /// subtree goes or none of it does, and no dangling edges remain.
    pub async fn delete_nodes(&self, ids: &[i64]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for id in ids {
            sqlx::query("DELETE FROM edges WHERE source_id = ? OR target_id = ?")
                .bind(id)
                .bind(id)
                .execute(&mut *tx)
                .await?;

            sqlx::query("DELETE FROM nodes WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        // Invalidate only after a successful commit.
        let mut cache = self.node_cache.lock().await;
        for id in ids {
            cache.remove(id);
        }

        Ok(())
    }

    /// Creates an edge. A second connect for the same triple is a no-op, so
    /// a (source, target, type) pair never holds parallel duplicate edges.
    pub async fn connect_nodes(&self, source_id: i64, edge_type: EdgeType, target_id: i64) -> Result<()> {
        let now = Utc::now().timestamp();

        sqlx::query(
            "INSERT OR IGNORE INTO edges (source_id, target_id, edge_type, created)
             VALUES (?, ?, ?, ?)",
        )
        .bind(source_id)
        .bind(target_id)
        .bind(edge_type.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn disconnect_nodes(&self, source_id: i64, edge_type: EdgeType, target_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM edges WHERE source_id = ? AND target_id = ? AND edge_type = ?")
            .bind(source_id)
            .bind(target_id)
            .bind(edge_type.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn edge_exists(&self, source_id: i64, edge_type: EdgeType, target_id: i64) -> Result<bool> {
        let row = sqlx::query(
            "SELECT 1 FROM edges WHERE source_id = ? AND target_id = ? AND edge_type = ?",
        )
        .bind(source_id)
        .bind(target_id)
        .bind(edge_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    pub async fn count_edges(&self, node_id: i64, edge_type: EdgeType, direction: Direction) -> Result<i64> {
        let sql = match direction {
            Direction::Outgoing => {
                "SELECT COUNT(*) AS n FROM edges WHERE source_id = ? AND edge_type = ?"
            }
            Direction::Incoming => {
                "SELECT COUNT(*) AS n FROM edges WHERE target_id = ? AND edge_type = ?"
            }
        };

        let row = sqlx::query(sql)
            .bind(node_id)
            .bind(edge_type.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get::<i64, _>("n"))
    }

    /// One-hop traversal along a typed edge, ordered by neighbor creation
    /// time then id.
    pub async fn neighbors(
        &self,
        node_id: i64,
        edge_type: EdgeType,
        direction: Direction,
    ) -> Result<Vec<GraphNode>> {
        let sql = match direction {
            Direction::Outgoing => {
                "SELECT n.id, n.label, n.props, n.created, n.updated
                 FROM edges e JOIN nodes n ON n.id = e.target_id
                 WHERE e.source_id = ? AND e.edge_type = ?
                 ORDER BY n.created ASC, n.id ASC"
            }
            Direction::Incoming => {
                "SELECT n.id, n.label, n.props, n.created, n.updated
                 FROM edges e JOIN nodes n ON n.id = e.source_id
                 WHERE e.target_id = ? AND e.edge_type = ?
                 ORDER BY n.created ASC, n.id ASC"
            }
        };

        let rows = sqlx::query(sql)
            .bind(node_id)
            .bind(edge_type.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(node_from_row).collect()
    }
}

fn node_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<GraphNode> {
    let props_text: String = row.get("props");
    Ok(GraphNode {
        id: row.get("id"),
        label: row.get("label"),
        props: serde_json::from_str(&props_text)?,
        created: row.get("created"),
        updated: row.get("updated"),
    })
}
