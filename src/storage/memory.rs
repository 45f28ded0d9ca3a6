//! In-memory record store.
//!
//! Thread-safe tables of JSON rows. Intended for embedded usage, tests, and
//! as a reference implementation of [`RecordStore`].

use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::sync::RwLock;

use serde_json::Value;
use tracing::debug;

use crate::entity::{Attributes, EntityId};
use crate::storage::traits::{RecordStore, StorageError};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

#[derive(Debug, Default, Clone)]
struct Table {
    columns: Vec<String>,
    rows: Vec<Attributes>,
}

impl Table {
    fn push(&mut self, row: Attributes) {
        for key in row.keys() {
            if !self.columns.iter().any(|c| c == key) {
                self.columns.push(key.clone());
            }
        }
        self.rows.push(row);
    }
}

/// Thread-safe in-memory record store.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl InMemoryRecordStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty table with a fixed column order.
    ///
    /// # Errors
    ///
    /// [`StorageError::DuplicateTable`] when the table exists.
    pub fn create_table<I, S>(&self, table: &str, columns: I) -> Result<(), StorageError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tables = self.tables.write().map_err(|_| lock_err("table.create"))?;
        if tables.contains_key(table) {
            return Err(StorageError::DuplicateTable(table.to_string()));
        }
        tables.insert(
            table.to_string(),
            Table {
                columns: columns.into_iter().map(Into::into).collect(),
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    /// Appends rows, creating the table if needed.
    ///
    /// Keys not yet known become new trailing columns.
    ///
    /// # Errors
    ///
    /// [`StorageError::BackendError`] on a poisoned lock.
    pub fn insert_rows<I>(&self, table: &str, rows: I) -> Result<usize, StorageError>
    where
        I: IntoIterator<Item = Attributes>,
    {
        let mut tables = self.tables.write().map_err(|_| lock_err("table.insert"))?;
        let entry = tables.entry(table.to_string()).or_default();
        let before = entry.rows.len();
        for row in rows {
            entry.push(row);
        }
        Ok(entry.rows.len() - before)
    }

    /// Replaces `table` with the contents of a CSV document.
    ///
    /// The header row names the columns; every cell is stored as a JSON
    /// string and empty cells as `null`. Returns the number of rows loaded.
    ///
    /// # Errors
    ///
    /// [`StorageError::SerializationError`] for unreadable CSV.
    pub fn load_csv<R: Read>(&self, table: &str, reader: R) -> Result<usize, StorageError> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| StorageError::SerializationError(e.to_string()))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut loaded = Table {
            columns: headers.clone(),
            rows: Vec::new(),
        };
        for record in rdr.records() {
            let record = record.map_err(|e| StorageError::SerializationError(e.to_string()))?;
            let mut row = Attributes::new();
            for (column, cell) in headers.iter().zip(record.iter()) {
                let value = if cell.is_empty() {
                    Value::Null
                } else {
                    Value::String(cell.to_string())
                };
                row.insert(column.clone(), value);
            }
            loaded.rows.push(row);
        }

        let count = loaded.rows.len();
        debug!(target: "entify::storage", table, rows = count, columns = headers.len(), "loaded csv table");
        self.tables
            .write()
            .map_err(|_| lock_err("table.load_csv"))?
            .insert(table.to_string(), loaded);
        Ok(count)
    }

    /// Names of all tables, sorted.
    ///
    /// # Errors
    ///
    /// [`StorageError::BackendError`] on a poisoned lock.
    pub fn table_names(&self) -> Result<Vec<String>, StorageError> {
        let tables = self.tables.read().map_err(|_| lock_err("table.names"))?;
        let mut names: Vec<String> = tables.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Number of rows in `table`.
    ///
    /// # Errors
    ///
    /// [`StorageError::TableNotFound`] when the table is missing.
    pub fn row_count(&self, table: &str) -> Result<usize, StorageError> {
        let tables = self.tables.read().map_err(|_| lock_err("table.row_count"))?;
        tables
            .get(table)
            .map(|t| t.rows.len())
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()))
    }
}

impl RecordStore for InMemoryRecordStore {
    fn columns(&self, table: &str) -> Result<Vec<String>, StorageError> {
        let tables = self.tables.read().map_err(|_| lock_err("record.columns"))?;
        tables
            .get(table)
            .map(|t| t.columns.clone())
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()))
    }

    fn fetch_by_ids(
        &self,
        table: &str,
        id_column: &str,
        ids: &[EntityId],
    ) -> Result<Vec<Attributes>, StorageError> {
        let tables = self.tables.read().map_err(|_| lock_err("record.fetch"))?;
        let t = tables
            .get(table)
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()))?;
        if !t.columns.iter().any(|c| c == id_column) {
            return Err(StorageError::ColumnNotFound {
                table: table.to_string(),
                column: id_column.to_string(),
            });
        }

        let wanted: HashSet<&str> = ids.iter().map(EntityId::as_str).collect();
        Ok(t.rows
            .iter()
            .filter(|row| {
                row.get(id_column)
                    .and_then(EntityId::from_value)
                    .is_some_and(|id| wanted.contains(id.as_str()))
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: Value) -> Attributes {
        v.as_object().cloned().unwrap()
    }

    fn id(s: &str) -> EntityId {
        EntityId::parse(s).unwrap()
    }

    #[test]
    fn test_insert_and_fetch() {
        let store = InMemoryRecordStore::new();
        store
            .insert_rows(
                "people",
                vec![
                    row(json!({"unique_id": 1, "name": "Ann"})),
                    row(json!({"unique_id": 2, "name": "Bob"})),
                    row(json!({"unique_id": 3, "name": "Cy"})),
                ],
            )
            .unwrap();

        assert_eq!(store.columns("people").unwrap(), vec!["name", "unique_id"]);
        let rows = store
            .fetch_by_ids("people", "unique_id", &[id("1"), id("3"), id("9")])
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], json!("Ann"));
        assert_eq!(rows[1]["name"], json!("Cy"));
    }

    #[test]
    fn test_missing_table_and_column() {
        let store = InMemoryRecordStore::new();
        assert!(matches!(
            store.columns("nope"),
            Err(StorageError::TableNotFound(_))
        ));

        store.create_table("t", ["a", "b"]).unwrap();
        assert!(matches!(
            store.fetch_by_ids("t", "zzz", &[id("1")]),
            Err(StorageError::ColumnNotFound { .. })
        ));
        assert!(matches!(
            store.create_table("t", ["a"]),
            Err(StorageError::DuplicateTable(_))
        ));
    }

    #[test]
    fn test_load_csv() {
        let store = InMemoryRecordStore::new();
        let data = "person_id,first_name,city\np1,Ann,Oslo\np2,Bob,\n";
        let count = store.load_csv("input_data", data.as_bytes()).unwrap();
        assert_eq!(count, 2);
        assert_eq!(
            store.columns("input_data").unwrap(),
            vec!["person_id", "first_name", "city"]
        );
        let rows = store
            .fetch_by_ids("input_data", "person_id", &[id("p2")])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["city"], Value::Null);
        assert_eq!(store.row_count("input_data").unwrap(), 2);
        assert_eq!(store.table_names().unwrap(), vec!["input_data"]);
    }

    #[test]
    fn test_load_csv_replaces_table() {
        let store = InMemoryRecordStore::new();
        store.load_csv("t", "id\n1\n2\n".as_bytes()).unwrap();
        store.load_csv("t", "id\n3\n".as_bytes()).unwrap();
        assert_eq!(store.row_count("t").unwrap(), 1);
    }
}
