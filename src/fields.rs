//! Field mapper: the per-entity column/field descriptor.
//!
//! Every persistable type carries an ordered list of column names and a
//! dynamic `get`/`set` over [`sea_query::Value`], normally generated by
//! `#[derive(BuoyRecord)]`. The same ordering feeds the column list on reads
//! and the value list on writes, so positional parameter binding stays
//! aligned between the two paths.

use may_postgres::Row;
use sea_query::Value;
use std::fmt;

use crate::record::TableRecordTrait;

/// Field mapper error type
#[derive(Debug)]
pub enum FieldError {
    /// Column not declared by the entity's field map
    ColumnNotFound(String),
    /// Value could not be converted into the field's declared type
    InvalidValueType { column: String, expected: String },
    /// No mapped column matches the entity's declared primary key
    MissingPrimaryKey { table: String, column: String },
    /// A result-row value could not be decoded
    RowScan { column: String, message: String },
}

impl FieldError {
    pub(crate) fn scan(column: &str, message: impl fmt::Display) -> Self {
        FieldError::RowScan {
            column: column.to_string(),
            message: message.to_string(),
        }
    }

    /// Build an `InvalidValueType` for `column`; used by derive-generated `set` impls.
    pub fn invalid_type(column: &str, expected: &str) -> Self {
        FieldError::InvalidValueType {
            column: column.to_string(),
            expected: expected.to_string(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldError::ColumnNotFound(column) => {
                write!(f, "Column not found: {column}")
            }
            FieldError::InvalidValueType { column, expected } => {
                write!(f, "Invalid value type for column {column}: expected {expected}")
            }
            FieldError::MissingPrimaryKey { table, column } => {
                write!(
                    f,
                    "No field of table {table} corresponds to primary key column {column}"
                )
            }
            FieldError::RowScan { column, message } => {
                write!(f, "Failed to scan column {column}: {message}")
            }
        }
    }
}

impl std::error::Error for FieldError {}

/// Ordered column↔field correspondence for an entity type.
///
/// `columns()` lists every persisted column in declaration order, primary key
/// included; the embedded [`TableRecord`](crate::record::TableRecord) and any
/// `#[skip]` field are excluded. `get`/`set` address fields dynamically by
/// column name so the lifecycle can treat all entity types uniformly.
pub trait FieldMap {
    /// Every persisted column, in declaration order
    fn columns(&self) -> &'static [&'static str];

    /// Read the field mapped to `column` as a dynamic value
    ///
    /// # Errors
    ///
    /// Returns `FieldError::ColumnNotFound` for an undeclared column.
    fn get(&self, column: &str) -> Result<Value, FieldError>;

    /// Write the field mapped to `column` from a dynamic value
    ///
    /// # Errors
    ///
    /// Returns `FieldError::ColumnNotFound` for an undeclared column, or
    /// `FieldError::InvalidValueType` when the value does not fit the field.
    fn set(&mut self, column: &str, value: Value) -> Result<(), FieldError>;
}

/// Columns to write on insert/update: the field map minus the primary key.
///
/// # Errors
///
/// Returns `FieldError::MissingPrimaryKey` when the declared primary key has
/// no mapped column.
pub fn columns_excluding_primary_key<T>(ti: &T) -> Result<Vec<&'static str>, FieldError>
where
    T: TableRecordTrait + ?Sized,
{
    let pk = ti.primary_key_name();
    if !ti.columns().contains(&pk) {
        return Err(FieldError::MissingPrimaryKey {
            table: ti.table_name().to_string(),
            column: pk.to_string(),
        });
    }
    Ok(ti.columns().iter().copied().filter(|c| *c != pk).collect())
}

/// Values to write on insert/update, in the same order as
/// [`columns_excluding_primary_key`].
pub fn values_excluding_primary_key<T>(ti: &T) -> Result<Vec<Value>, FieldError>
where
    T: TableRecordTrait + ?Sized,
{
    columns_excluding_primary_key(ti)?
        .into_iter()
        .map(|column| ti.get(column))
        .collect()
}

/// Decode one result-row column into a dynamic value.
///
/// The supported column types mirror the bind-side conversion table in
/// [`record::with_converted_params`](crate::record::with_converted_params):
/// bool, int2/int4/int8, float4/float8, the text family, bytea and
/// json/jsonb. Anything else is a `RowScan` error.
pub fn decode_column(row: &Row, idx: usize) -> Result<Value, FieldError> {
    let column = &row.columns()[idx];
    let name = column.name();

    match column.type_().name() {
        "bool" => row
            .try_get::<usize, Option<bool>>(idx)
            .map(Value::Bool)
            .map_err(|e| FieldError::scan(name, e)),
        "int2" => row
            .try_get::<usize, Option<i16>>(idx)
            .map(Value::SmallInt)
            .map_err(|e| FieldError::scan(name, e)),
        "int4" => row
            .try_get::<usize, Option<i32>>(idx)
            .map(Value::Int)
            .map_err(|e| FieldError::scan(name, e)),
        "int8" => row
            .try_get::<usize, Option<i64>>(idx)
            .map(Value::BigInt)
            .map_err(|e| FieldError::scan(name, e)),
        "float4" => row
            .try_get::<usize, Option<f32>>(idx)
            .map(Value::Float)
            .map_err(|e| FieldError::scan(name, e)),
        "float8" => row
            .try_get::<usize, Option<f64>>(idx)
            .map(Value::Double)
            .map_err(|e| FieldError::scan(name, e)),
        "text" | "varchar" | "bpchar" | "name" => row
            .try_get::<usize, Option<String>>(idx)
            .map(Value::String)
            .map_err(|e| FieldError::scan(name, e)),
        "bytea" => row
            .try_get::<usize, Option<Vec<u8>>>(idx)
            .map(Value::Bytes)
            .map_err(|e| FieldError::scan(name, e)),
        "json" | "jsonb" => row
            .try_get::<usize, Option<serde_json::Value>>(idx)
            .map(|v| Value::Json(v.map(Box::new)))
            .map_err(|e| FieldError::scan(name, e)),
        other => Err(FieldError::RowScan {
            column: name.to_string(),
            message: format!("unsupported column type `{other}`"),
        }),
    }
}

/// Scan a whole result row into an entity by column name.
///
/// Every column of the row is decoded and written through
/// [`FieldMap::set`]; the first mismatch aborts the scan with an error, so an
/// entity is never left partially bound behind a success result.
pub fn bind_row<T>(ti: &mut T, row: &Row) -> Result<(), FieldError>
where
    T: FieldMap + ?Sized,
{
    for (idx, column) in row.columns().iter().enumerate() {
        let value = decode_column(row, idx)?;
        ti.set(column.name(), value)?;
    }
    Ok(())
}
