//! Mappers: pure functions from a result table to a typed value.

use crate::core::decode::Decode;
use crate::core::record::{ObjectMapper, Record};
use crate::models::table::{Row, Table};
use crate::{Error, Result};
use std::sync::Arc;

type MapFn<T> = dyn Fn(&Table) -> Result<T> + Send + Sync;

/// Maps the table resulting from a query to a value of type `T`.
///
/// Mappers never mutate the table and are cheap to clone. Composition
/// (`map`, `and_then`, `or_default`) builds a new mapper and leaves the
/// original usable.
pub struct Mapper<T> {
    f: Arc<MapFn<T>>,
}

impl<T> Clone for Mapper<T> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
        }
    }
}

impl<T> std::fmt::Debug for Mapper<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Mapper<{}>", std::any::type_name::<T>())
    }
}

impl<T: 'static> Mapper<T> {
    /// Makes a mapper out of the given function.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Table) -> Result<T> + Send + Sync + 'static,
    {
        Self { f: Arc::new(f) }
    }

    pub fn apply(&self, table: &Table) -> Result<T> {
        (self.f)(table)
    }

    /// Post-process the mapped value.
    pub fn map<U, F>(self, f: F) -> Mapper<U>
    where
        U: 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let inner = self.f;
        Mapper::from_fn(move |table| inner(table).map(&f))
    }

    /// Post-process the mapped value with a step that can fail.
    pub fn and_then<U, F>(self, f: F) -> Mapper<U>
    where
        U: 'static,
        F: Fn(T) -> Result<U> + Send + Sync + 'static,
    {
        let inner = self.f;
        Mapper::from_fn(move |table| inner(table).and_then(&f))
    }
}

impl<T: Clone + Send + Sync + 'static> Mapper<Option<T>> {
    /// Substitute `fallback` when this mapper yields nothing.
    pub fn or_default(self, fallback: T) -> Mapper<T> {
        self.map(move |value| value.unwrap_or_else(|| fallback.clone()))
    }
}

impl Mapper<Table> {
    /// A mapper that hands back the table itself.
    pub fn identity() -> Self {
        Mapper::from_fn(|table| Ok(table.clone()))
    }
}

impl Mapper<Option<String>> {
    /// The text at (0, 0), or `None` if the table is empty or the cell is NULL.
    pub fn string_value() -> Self {
        Mapper::from_fn(|table| Ok(table.row(0).and_then(|r| r.get(0)).map(str::to_string)))
    }
}

impl<T: Decode + 'static> Mapper<Option<T>> {
    /// The cell at (0, 0) decoded as `T`, or `None` if the table is empty.
    ///
    /// A NULL cell is handed to the decoder, so use `Option<_>` as `T` when the
    /// value may be NULL.
    pub fn value() -> Self {
        Mapper::from_fn(|table| match table.row(0) {
            None => Ok(None),
            Some(row) => decode_cell(table, row, 0).map(Some),
        })
    }
}

impl<T: 'static> Mapper<Option<T>> {
    /// The text at (0, 0) converted by `f`, or `None` if the table is empty
    /// or the cell is NULL.
    pub fn single_value<F>(f: F) -> Self
    where
        F: Fn(&str) -> Result<T> + Send + Sync + 'static,
    {
        Mapper::from_fn(move |table| {
            table
                .row(0)
                .and_then(|row| row.get(0))
                .map(&f)
                .transpose()
        })
    }
}

impl Mapper<Vec<Option<String>>> {
    /// Every row's first cell; an empty table gives an empty list.
    pub fn string_list() -> Self {
        Mapper::from_fn(|table| Ok(owned(table.column(0))))
    }

    /// Every row's cell under `column`; empty if the column does not exist.
    pub fn column_list(column: impl Into<String>) -> Self {
        let column = column.into();
        Mapper::from_fn(move |table| Ok(owned(table.column_by_name(&column))))
    }
}

impl<T: Decode + 'static> Mapper<Vec<T>> {
    /// Every row's first cell decoded as `T`.
    pub fn value_list() -> Self {
        Mapper::from_fn(|table| {
            table
                .iter()
                .map(|row| decode_cell(table, row, 0))
                .collect()
        })
    }
}

impl<T: 'static> Mapper<Vec<T>> {
    /// Every row's first cell converted by `f`. NULL cells reach `f` as `None`.
    pub fn value_list_with<F>(f: F) -> Self
    where
        F: Fn(Option<&str>) -> Result<T> + Send + Sync + 'static,
    {
        Mapper::from_fn(move |table| table.iter().map(|row| f(row.get(0))).collect())
    }
}

impl Mapper<Option<Row>> {
    pub fn first_row() -> Self {
        Mapper::from_fn(|table| Ok(table.row(0).cloned()))
    }
}

impl Mapper<Vec<Row>> {
    pub fn all_rows() -> Self {
        Mapper::from_fn(|table| Ok(table.rows().to_vec()))
    }
}

impl<T: Record> Mapper<Option<T>> {
    /// Build one `T` from the first row, or `None` for an empty table.
    ///
    /// Fails immediately if `T` declares no column bindings.
    pub fn to_object() -> Result<Self> {
        let mapper = ObjectMapper::<T>::new()?;
        Ok(Mapper::from_fn(move |table| mapper.first(table)))
    }
}

impl<T: Record> Mapper<Vec<T>> {
    /// Build one `T` per row.
    ///
    /// Fails immediately if `T` declares no column bindings.
    pub fn to_objects() -> Result<Self> {
        let mapper = ObjectMapper::<T>::new()?;
        Ok(Mapper::from_fn(move |table| mapper.all(table)))
    }
}

fn owned(cells: Vec<Option<&str>>) -> Vec<Option<String>> {
    cells.into_iter().map(|c| c.map(str::to_string)).collect()
}

fn decode_cell<T: Decode>(table: &Table, row: &Row, index: usize) -> Result<T> {
    T::decode(row.get(index)).map_err(|source| Error::Decode {
        column: table.column_name(index).unwrap_or("?").to_string(),
        source,
    })
}
