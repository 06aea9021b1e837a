//! LanceDB connection and housekeeping helpers.

use anyhow::Result;
use arrow_array::RecordBatchIterator;
use lancedb::{connect, Connection};
use std::sync::Arc;

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

/// Create `name` with the given schema when it does not exist yet.
pub async fn ensure_table(
    conn: &Connection,
    name: &str,
    schema: Arc<arrow_schema::Schema>,
) -> Result<()> {
    let names = conn.table_names().execute().await?;
    if names.contains(&name.to_string()) {
        return Ok(());
    }
    // create empty table with 0 rows
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
    conn.create_table(name, Box::new(iter)).execute().await?;
    Ok(())
}

/// Escape a string literal for a LanceDB SQL predicate.
pub fn sql_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}
