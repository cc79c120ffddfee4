//! Shared test scaffolding: a hand-implemented entity and a scriptable
//! executor double.
//!
//! The entity mirrors what `#[derive(BuoyRecord)]` generates so unit tests
//! exercise the same trait surface without the macro; the derive itself is
//! covered in `buoy-derive/tests`.

use may_postgres::types::ToSql;
use may_postgres::Row;
use sea_query::Value;
use std::sync::{Arc, Mutex};

use crate::executor::{BuoyError, BuoyExecutor, SharedExecutor};
use crate::fields::{FieldError, FieldMap};
use crate::record::{TableRecord, TableRecordTrait};

/// Executor double recording every statement and its parameter count.
///
/// `query_one` always fails (a `Row` cannot be fabricated without a server),
/// `query_all` returns no rows, `execute` reports a configurable
/// affected-row count. With `failing`, every call returns the given error.
pub(crate) struct MockExecutor {
    statements: Mutex<Vec<(String, usize)>>,
    affected_rows: u64,
    fail_with: Option<String>,
}

impl MockExecutor {
    pub(crate) fn new() -> Self {
        Self {
            statements: Mutex::new(Vec::new()),
            affected_rows: 0,
            fail_with: None,
        }
    }

    pub(crate) fn with_affected(affected_rows: u64) -> Self {
        Self {
            affected_rows,
            ..Self::new()
        }
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::new()
        }
    }

    /// Every statement seen so far, with its bound-parameter count
    pub(crate) fn recorded(&self) -> Vec<(String, usize)> {
        self.statements.lock().unwrap().clone()
    }

    fn record(&self, query: &str, params: &[&dyn ToSql]) -> Result<(), BuoyError> {
        self.statements
            .lock()
            .unwrap()
            .push((query.to_string(), params.len()));
        match &self.fail_with {
            Some(message) => Err(BuoyError::Query(message.clone())),
            None => Ok(()),
        }
    }
}

impl BuoyExecutor for MockExecutor {
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, BuoyError> {
        self.record(query, params)?;
        Ok(self.affected_rows)
    }

    fn query_one(&self, query: &str, params: &[&dyn ToSql]) -> Result<Row, BuoyError> {
        self.record(query, params)?;
        Err(BuoyError::Query("mock executor has no rows".to_string()))
    }

    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, BuoyError> {
        self.record(query, params)?;
        Ok(Vec::new())
    }
}

pub(crate) fn mock_executor() -> SharedExecutor {
    Arc::new(MockExecutor::new())
}

/// Test entity shaped like the derive output for:
///
/// ```ignore
/// #[derive(BuoyRecord)]
/// #[table_name = "users"]
/// pub struct TestUser {
///     #[primary_key]
///     pub id: i64,
///     pub name: Option<String>,
///     pub lastname: Option<String>,
///     pub gender: Option<String>,
///     record: TableRecord,
/// }
/// ```
pub(crate) struct TestUser {
    pub id: i64,
    pub name: Option<String>,
    pub lastname: Option<String>,
    pub gender: Option<String>,
    pub record: TableRecord,
}

impl TestUser {
    /// Fresh, never-persisted entity
    pub(crate) fn new(executor: SharedExecutor) -> Self {
        Self {
            id: 0,
            name: None,
            lastname: None,
            gender: None,
            record: TableRecord::new(executor, true, false),
        }
    }

    /// Entity already present in storage
    pub(crate) fn persisted(executor: SharedExecutor) -> Self {
        Self {
            record: TableRecord::new(executor.clone(), false, false),
            ..Self::new(executor)
        }
    }

    /// Entity that refuses mutation
    pub(crate) fn read_only(executor: SharedExecutor) -> Self {
        Self {
            record: TableRecord::new(executor.clone(), false, true),
            ..Self::new(executor)
        }
    }
}

impl FieldMap for TestUser {
    fn columns(&self) -> &'static [&'static str] {
        &["id", "name", "lastname", "gender"]
    }

    fn get(&self, column: &str) -> Result<Value, FieldError> {
        match column {
            "id" => Ok(self.id.into()),
            "name" => Ok(self.name.clone().into()),
            "lastname" => Ok(self.lastname.clone().into()),
            "gender" => Ok(self.gender.clone().into()),
            _ => Err(FieldError::ColumnNotFound(column.to_string())),
        }
    }

    fn set(&mut self, column: &str, value: Value) -> Result<(), FieldError> {
        match column {
            "id" => {
                self.id = <i64 as sea_query::ValueType>::try_from(value)
                    .map_err(|_| FieldError::invalid_type(column, "i64"))?;
            }
            "name" => {
                self.name = <Option<String> as sea_query::ValueType>::try_from(value)
                    .map_err(|_| FieldError::invalid_type(column, "Option<String>"))?;
            }
            "lastname" => {
                self.lastname = <Option<String> as sea_query::ValueType>::try_from(value)
                    .map_err(|_| FieldError::invalid_type(column, "Option<String>"))?;
            }
            "gender" => {
                self.gender = <Option<String> as sea_query::ValueType>::try_from(value)
                    .map_err(|_| FieldError::invalid_type(column, "Option<String>"))?;
            }
            _ => return Err(FieldError::ColumnNotFound(column.to_string())),
        }
        Ok(())
    }
}

impl TableRecordTrait for TestUser {
    fn table_name(&self) -> &'static str {
        "users"
    }

    fn primary_key_name(&self) -> &'static str {
        "id"
    }

    fn primary_key_value(&self) -> i64 {
        self.id
    }

    fn table_record(&self) -> &TableRecord {
        &self.record
    }

    fn table_record_mut(&mut self) -> &mut TableRecord {
        &mut self.record
    }
}
