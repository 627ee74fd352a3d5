//! Result table model.
//!
//! Every query produces one [`Table`]: ordered, unique column names and rows of
//! textual cells in the order the database returned them. A missing cell
//! (`None`) is SQL `NULL`.

use crate::core::decode::Decode;
use crate::{Error, Result};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, PartialEq)]
struct Columns {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

/// One row of a [`Table`].
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<Columns>,
    cells: Vec<Option<String>>,
}

impl Row {
    /// Cell text at `index`, `None` for NULL or an index past the last column.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.cells.get(index).and_then(|c| c.as_deref())
    }

    /// Cell text under `column`, `None` for NULL or an unknown column.
    pub fn by_name(&self, column: &str) -> Option<&str> {
        self.index_of(column).and_then(|i| self.get(i))
    }

    /// Decode the cell under `column` into `T`.
    pub fn decode<T: Decode>(&self, column: &str) -> Result<T> {
        T::decode(self.by_name(column)).map_err(|source| Error::Decode {
            column: column.to_string(),
            source,
        })
    }

    pub fn index_of(&self, column: &str) -> Option<usize> {
        self.columns.index.get(column).copied()
    }

    pub fn cells(&self) -> &[Option<String>] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<&str> = self
            .cells
            .iter()
            .map(|c| c.as_deref().unwrap_or("NULL"))
            .collect();
        f.write_str(&cells.join(", "))
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (name, cell) in self.columns.names.iter().zip(&self.cells) {
            map.serialize_entry(name, cell)?;
        }
        map.end()
    }
}

/// Immutable rectangular query result.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Arc<Columns>,
    rows: Vec<Row>,
}

impl Table {
    /// Build a table, checking that names are unique and every row has one cell
    /// per column.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Result<Self> {
        let mut index = HashMap::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(Error::MalformedTable(format!(
                    "duplicate column name '{}'",
                    name
                )));
            }
        }

        let columns = Arc::new(Columns {
            names: columns,
            index,
        });

        let width = columns.names.len();
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(i, cells)| {
                if cells.len() != width {
                    return Err(Error::MalformedTable(format!(
                        "row {} has {} cells, expected {}",
                        i,
                        cells.len(),
                        width
                    )));
                }
                Ok(Row {
                    columns: Arc::clone(&columns),
                    cells,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { columns, rows })
    }

    /// A table with no columns and no rows.
    pub fn empty() -> Self {
        Self {
            columns: Arc::new(Columns {
                names: Vec::new(),
                index: HashMap::new(),
            }),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns.names
    }

    /// Name of the column at `index`.
    pub fn column_name(&self, index: usize) -> Option<&str> {
        self.columns.names.get(index).map(String::as_str)
    }

    /// Position of `column`, or `None` when the table has no such column.
    pub fn index_of(&self, column: &str) -> Option<usize> {
        self.columns.index.get(column).copied()
    }

    /// All cells of the column at `index`, top to bottom.
    pub fn column(&self, index: usize) -> Vec<Option<&str>> {
        self.rows.iter().map(|r| r.get(index)).collect()
    }

    /// All cells of `column`; empty when the column does not exist.
    pub fn column_by_name(&self, column: &str) -> Vec<Option<&str>> {
        match self.index_of(column) {
            Some(i) => self.column(i),
            None => Vec::new(),
        }
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.names.len()
    }
}

impl<'a> IntoIterator for &'a Table {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.columns.names.join(", "))?;
        for row in &self.rows {
            write!(f, "\n{}", row)?;
        }
        Ok(())
    }
}

impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for row in &self.rows {
            seq.serialize_element(row)?;
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[Option<&str>]) -> Vec<Option<String>> {
        values.iter().map(|v| v.map(str::to_string)).collect()
    }

    fn sample() -> Table {
        Table::new(
            vec!["id".to_string(), "text".to_string()],
            vec![cells(&[Some("12"), Some("test")]), cells(&[Some("12"), None])],
        )
        .unwrap()
    }

    #[test]
    fn test_lookup_by_name_and_position() {
        let table = sample();
        assert_eq!(table.index_of("text"), Some(1));
        assert_eq!(table.index_of("missing"), None);
        assert_eq!(table.row(0).unwrap().by_name("text"), Some("test"));
        assert_eq!(table.row(1).unwrap().get(1), None);
        assert_eq!(table.column(0), vec![Some("12"), Some("12")]);
        assert!(table.column_by_name("missing").is_empty());
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let err = Table::new(
            vec!["a".to_string(), "b".to_string()],
            vec![cells(&[Some("1")])],
        )
        .unwrap_err();
        assert!(matches!(err, Error::MalformedTable(_)));
    }

    #[test]
    fn test_rejects_duplicate_columns() {
        let err = Table::new(vec!["a".to_string(), "a".to_string()], Vec::new()).unwrap_err();
        assert!(matches!(err, Error::MalformedTable(_)));
    }

    #[test]
    fn test_display_and_json() {
        let table = sample();
        assert_eq!(table.to_string(), "id, text\n12, test\n12, NULL");

        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{"id": "12", "text": "test"}, {"id": "12", "text": null}])
        );
    }

    #[test]
    fn test_row_decode() {
        let table = sample();
        let row = table.row(0).unwrap();
        assert_eq!(row.decode::<i32>("id").unwrap(), 12);
        assert_eq!(table.row(1).unwrap().decode::<Option<String>>("text").unwrap(), None);
        assert!(table.row(1).unwrap().decode::<String>("text").is_err());
    }
}
