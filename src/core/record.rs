//! Row-to-struct construction.
//!
//! A [`Record`] type describes, once, which of its fields are filled from which
//! column. The resulting binding table is validated when a mapper is built, not
//! per row.
//!
//! ```
//! use dbaction::core::record::{Bindings, Record};
//!
//! #[derive(Debug, Default, Clone)]
//! struct Note {
//!     id: i32,
//!     value: Option<String>,
//! }
//!
//! impl Record for Note {
//!     fn bind(bindings: Bindings<Self>) -> Bindings<Self> {
//!         bindings
//!             .field("id", |n: &mut Note, v: i32| n.id = v)
//!             .field_as("value", "text", |n: &mut Note, v: Option<String>| n.value = v)
//!     }
//! }
//! ```

use crate::core::decode::{Decode, DecodeError};
use crate::models::table::{Row, Table};
use crate::{Error, Result};
use std::marker::PhantomData;
use std::sync::Arc;

type Setter<T> = dyn Fn(&mut T, Option<&str>) -> std::result::Result<(), DecodeError> + Send + Sync;

/// A struct that can be built from a result row.
///
/// `Default` supplies the zero-argument initializer; fields without a matching
/// column in the table keep their default value.
pub trait Record: Default + Send + 'static {
    /// Declare the bound fields.
    fn bind(bindings: Bindings<Self>) -> Bindings<Self>;
}

struct FieldBinding<T> {
    field: &'static str,
    column: String,
    set: Arc<Setter<T>>,
}

impl<T> Clone for FieldBinding<T> {
    fn clone(&self) -> Self {
        Self {
            field: self.field,
            column: self.column.clone(),
            set: Arc::clone(&self.set),
        }
    }
}

/// Column bindings of a [`Record`] type.
pub struct Bindings<T> {
    fields: Vec<FieldBinding<T>>,
}

impl<T: 'static> Bindings<T> {
    fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Bind `field` to the column of the same name.
    pub fn field<V, F>(self, field: &'static str, set: F) -> Self
    where
        V: Decode + 'static,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.field_as(field, field, set)
    }

    /// Bind `field` to `column`.
    pub fn field_as<V, F>(mut self, field: &'static str, column: &str, set: F) -> Self
    where
        V: Decode + 'static,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.fields.push(FieldBinding {
            field,
            column: column.to_string(),
            set: Arc::new(move |target: &mut T, cell: Option<&str>| {
                set(target, V::decode(cell)?);
                Ok(())
            }),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Builds [`Record`] values from table rows using a validated binding table.
pub(crate) struct ObjectMapper<T> {
    fields: Arc<[FieldBinding<T>]>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Record> ObjectMapper<T> {
    pub(crate) fn new() -> Result<Self> {
        let bindings = T::bind(Bindings::new());
        if bindings.is_empty() {
            return Err(Error::NoBindings(std::any::type_name::<T>()));
        }

        for (i, binding) in bindings.fields.iter().enumerate() {
            if binding.column.is_empty() {
                return Err(Error::Mapping(format!(
                    "field '{}' of {} is bound to an empty column name",
                    binding.field,
                    std::any::type_name::<T>()
                )));
            }
            if bindings.fields[..i].iter().any(|b| b.field == binding.field) {
                return Err(Error::Mapping(format!(
                    "field '{}' of {} is bound twice",
                    binding.field,
                    std::any::type_name::<T>()
                )));
            }
        }

        Ok(Self {
            fields: Arc::from(bindings.fields),
            _marker: PhantomData,
        })
    }

    fn build(&self, row: &Row) -> Result<T> {
        let mut instance = T::default();
        for binding in self.fields.iter() {
            let Some(index) = row.index_of(&binding.column) else {
                continue;
            };
            (binding.set)(&mut instance, row.get(index)).map_err(|source| Error::Decode {
                column: binding.column.clone(),
                source,
            })?;
        }
        Ok(instance)
    }

    pub(crate) fn first(&self, table: &Table) -> Result<Option<T>> {
        table.row(0).map(|row| self.build(row)).transpose()
    }

    pub(crate) fn all(&self, table: &Table) -> Result<Vec<T>> {
        table.iter().map(|row| self.build(row)).collect()
    }
}
