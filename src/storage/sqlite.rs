//! SQLite storage backend

use super::traits::{
    GraphCounts, NeighborFilter, Neighbors, NodeFilter, NodeStore, OpenStore, StorageError,
    StorageResult,
};
use crate::graph::{normalize, Category, Edge, Node, NodeKey};
use rusqlite::{params, Connection, OptionalExtension, ToSql};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

/// Raw node columns: key, name, category, value, properties_json, history_json
type NodeRow = (String, String, String, String, String, String);

/// Raw edge columns: key_a, key_b, source, created_at
type EdgeRow = (String, String, Option<String>, String);

const NODE_COLUMNS: &str = "key, name, category, value, properties_json, history_json";

/// SQLite-backed node store
///
/// Uses a single database file with one table for nodes and one for
/// undirected edges. Thread-safe via internal mutex on the connection;
/// WAL mode lets other connections read while this one writes.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Initialize the database schema
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            -- Nodes keyed by the deterministic (name, value) key
            CREATE TABLE IF NOT EXISTS nodes (
                key TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                name_folded TEXT NOT NULL,
                category TEXT NOT NULL,
                value TEXT NOT NULL,
                properties_json TEXT NOT NULL,
                history_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_nodes_name
                ON nodes(name_folded);
            CREATE INDEX IF NOT EXISTS idx_nodes_category
                ON nodes(category);

            -- Undirected edges, endpoints stored with key_a < key_b
            CREATE TABLE IF NOT EXISTS edges (
                key_a TEXT NOT NULL,
                key_b TEXT NOT NULL,
                source TEXT,
                created_at TEXT NOT NULL,
                PRIMARY KEY (key_a, key_b),
                CHECK (key_a < key_b),
                FOREIGN KEY (key_a) REFERENCES nodes(key) ON DELETE CASCADE,
                FOREIGN KEY (key_b) REFERENCES nodes(key) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_edges_key_b
                ON edges(key_b);

            PRAGMA foreign_keys = ON;

            -- Readers never block on the single writer
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn node_to_row(node: &Node) -> StorageResult<NodeRow> {
        Ok((
            node.key.as_str().to_string(),
            node.name.clone(),
            node.category.as_str().to_string(),
            node.value.clone(),
            serde_json::to_string(&node.properties)?,
            serde_json::to_string(node.history())?,
        ))
    }

    fn row_to_node(row: NodeRow) -> StorageResult<Node> {
        let (key, name, category, value, properties_json, history_json) = row;
        let category: Category = category
            .parse()
            .map_err(|e: String| StorageError::InvalidRecord(format!("node {}: {}", key, e)))?;
        Ok(Node::from_parts(
            NodeKey::from_string(key),
            name,
            category,
            value,
            serde_json::from_str(&properties_json)?,
            serde_json::from_str(&history_json)?,
        ))
    }

    fn read_node_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<NodeRow> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
        ))
    }

    fn row_to_edge(row: EdgeRow) -> StorageResult<Edge> {
        use chrono::DateTime;

        let (key_a, key_b, source, created_at) = row;
        Ok(Edge {
            key_a: NodeKey::from_string(key_a),
            key_b: NodeKey::from_string(key_b),
            source,
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map_err(|e| StorageError::DateParse(e.to_string()))?
                .with_timezone(&chrono::Utc),
        })
    }

    fn node_exists(conn: &Connection, key: &str) -> StorageResult<bool> {
        let found: Option<i64> = conn
            .query_row("SELECT 1 FROM nodes WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    fn insert_node(conn: &Connection, node: &Node) -> StorageResult<()> {
        let (key, name, category, value, properties, history) = Self::node_to_row(node)?;
        let name_folded = normalize(&name);

        let result = conn.execute(
            r#"
            INSERT INTO nodes (key, name, name_folded, category, value, properties_json, history_json)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![key, name, name_folded, category, value, properties, history],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StorageError::DuplicateKey(key))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Insert an edge whose endpoints must already exist; false if it was present
    fn insert_edge(conn: &Connection, edge: &Edge) -> StorageResult<bool> {
        if edge.is_self_loop() {
            return Err(StorageError::SelfLoop(edge.key_a.to_string()));
        }
        for key in [&edge.key_a, &edge.key_b] {
            if !Self::node_exists(conn, key.as_str())? {
                return Err(StorageError::NodeNotFound(key.to_string()));
            }
        }

        let rows = conn.execute(
            r#"
            INSERT OR IGNORE INTO edges (key_a, key_b, source, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                edge.key_a.as_str(),
                edge.key_b.as_str(),
                edge.source,
                edge.created_at.to_rfc3339(),
            ],
        )?;
        Ok(rows > 0)
    }

    /// Collect rows from a prepared query into nodes
    fn query_nodes(
        conn: &Connection,
        sql: &str,
        params: &[Box<dyn ToSql>],
    ) -> StorageResult<Vec<Node>> {
        let mut stmt = conn.prepare(sql)?;
        let params_refs: Vec<&dyn ToSql> = params.iter().map(|b| b.as_ref()).collect();
        let rows = stmt.query_map(params_refs.as_slice(), Self::read_node_row)?;

        let mut nodes = Vec::new();
        for row in rows {
            nodes.push(Self::row_to_node(row?)?);
        }
        Ok(nodes)
    }
}

/// Append `AND <column> [NOT] IN (?n, ...)` for a non-empty value list
fn push_in_clause(
    sql: &mut String,
    params: &mut Vec<Box<dyn ToSql>>,
    column: &str,
    negate: bool,
    values: Vec<String>,
) {
    if values.is_empty() {
        return;
    }
    let placeholders: Vec<String> = values
        .into_iter()
        .map(|v| {
            params.push(Box::new(v));
            format!("?{}", params.len())
        })
        .collect();
    let op = if negate { "NOT IN" } else { "IN" };
    sql.push_str(&format!(" AND {} {} ({})", column, op, placeholders.join(", ")));
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl NodeStore for SqliteStore {
    // === Node Operations ===

    fn find_node(&self, key: &NodeKey) -> StorageResult<Option<Node>> {
        let conn = self.conn.lock().unwrap();

        let row: Option<NodeRow> = conn
            .query_row(
                &format!("SELECT {} FROM nodes WHERE key = ?1", NODE_COLUMNS),
                params![key.as_str()],
                Self::read_node_row,
            )
            .optional()?;

        row.map(Self::row_to_node).transpose()
    }

    fn create_node(&self, node: &Node) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        Self::insert_node(&conn, node)
    }

    fn create_node_with_edges(&self, node: &Node, edges: &[Edge]) -> StorageResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        Self::insert_node(&tx, node)?;
        for edge in edges {
            Self::insert_edge(&tx, edge)?;
        }

        tx.commit()?;
        Ok(())
    }

    fn update_node(&self, node: &Node) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        let (key, name, category, value, properties, history) = Self::node_to_row(node)?;
        let name_folded = normalize(&name);

        let rows = conn.execute(
            r#"
            UPDATE nodes SET
                name = ?2,
                name_folded = ?3,
                category = ?4,
                value = ?5,
                properties_json = ?6,
                history_json = ?7
            WHERE key = ?1
            "#,
            params![key, name, name_folded, category, value, properties, history],
        )?;

        if rows == 0 {
            return Err(StorageError::NodeNotFound(key));
        }
        Ok(())
    }

    fn delete_node(&self, key: &NodeKey) -> StorageResult<bool> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        // Delete edges connected to this node
        tx.execute(
            "DELETE FROM edges WHERE key_a = ?1 OR key_b = ?1",
            params![key.as_str()],
        )?;
        let rows = tx.execute("DELETE FROM nodes WHERE key = ?1", params![key.as_str()])?;

        tx.commit()?;
        Ok(rows > 0)
    }

    fn find_nodes(&self, filter: &NodeFilter) -> StorageResult<Vec<Node>> {
        let conn = self.conn.lock().unwrap();

        let mut sql = format!("SELECT {} FROM nodes WHERE 1 = 1", NODE_COLUMNS);
        let mut params_vec: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(ref category) = filter.category {
            params_vec.push(Box::new(category.as_str().to_string()));
            sql.push_str(&format!(" AND category = ?{}", params_vec.len()));
        }

        if let Some(ref name) = filter.name {
            params_vec.push(Box::new(normalize(name)));
            sql.push_str(&format!(" AND name_folded = ?{}", params_vec.len()));
        }

        sql.push_str(" ORDER BY key");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        Self::query_nodes(&conn, &sql, &params_vec)
    }

    // === Edge Operations ===

    fn connect(&self, edge: &Edge) -> StorageResult<bool> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let added = Self::insert_edge(&tx, edge)?;
        tx.commit()?;
        Ok(added)
    }

    fn has_edge(&self, a: &NodeKey, b: &NodeKey) -> StorageResult<bool> {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let conn = self.conn.lock().unwrap();
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM edges WHERE key_a = ?1 AND key_b = ?2",
                params![lo.as_str(), hi.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn edges_of(&self, key: &NodeKey) -> StorageResult<Vec<Edge>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT key_a, key_b, source, created_at FROM edges
             WHERE key_a = ?1 OR key_b = ?1
             ORDER BY key_a, key_b",
        )?;
        let rows = stmt.query_map(params![key.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut edges = Vec::new();
        for row in rows {
            edges.push(Self::row_to_edge(row?)?);
        }
        Ok(edges)
    }

    fn neighbors(&self, key: &NodeKey, filter: &NeighborFilter) -> StorageResult<Neighbors> {
        let conn = self.conn.lock().unwrap();

        let mut sql = String::from(
            "SELECT n.key, n.name, n.category, n.value, n.properties_json, n.history_json
             FROM edges e
             JOIN nodes n ON n.key = CASE WHEN e.key_a = ?1 THEN e.key_b ELSE e.key_a END
             WHERE (e.key_a = ?1 OR e.key_b = ?1)",
        );
        let mut params_vec: Vec<Box<dyn ToSql>> = vec![Box::new(key.as_str().to_string())];

        let fold = |names: &[String]| names.iter().map(|n| normalize(n)).collect::<Vec<_>>();
        let cats = |cats: &[Category]| cats.iter().map(|c| c.as_str().to_string()).collect::<Vec<_>>();

        push_in_clause(&mut sql, &mut params_vec, "n.name_folded", false, fold(&filter.name_want));
        push_in_clause(&mut sql, &mut params_vec, "n.name_folded", true, fold(&filter.name_dontwant));
        push_in_clause(&mut sql, &mut params_vec, "n.category", false, cats(&filter.category_want));
        push_in_clause(&mut sql, &mut params_vec, "n.category", true, cats(&filter.category_dontwant));

        sql.push_str(" ORDER BY n.key");
        if let Some(max) = filter.max_items {
            sql.push_str(&format!(" LIMIT {}", max));
        }

        Ok(Neighbors::new(Self::query_nodes(&conn, &sql, &params_vec)?))
    }

    // === Bulk Operations ===

    fn counts(&self) -> StorageResult<GraphCounts> {
        let conn = self.conn.lock().unwrap();

        let nodes: i64 = conn.query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))?;
        let edges: i64 = conn.query_row("SELECT COUNT(*) FROM edges", [], |row| row.get(0))?;

        let mut stmt =
            conn.prepare("SELECT category, COUNT(*) FROM nodes GROUP BY category ORDER BY category")?;
        let per_category: BTreeMap<String, usize> = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
            })?
            .collect::<Result<_, _>>()?;

        Ok(GraphCounts {
            nodes: nodes as usize,
            edges: edges as usize,
            per_category,
        })
    }

    fn delete_all(&self) -> StorageResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM edges", [])?;
        tx.execute("DELETE FROM nodes", [])?;
        tx.commit()?;
        Ok(())
    }
}
