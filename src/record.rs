//! Record lifecycle: persistence state and the CRUD operations.
//!
//! [`TableRecord`] is the embedded state every persistable entity carries
//! (new vs. persisted, read-only, the active connector and the staged query
//! builder). The operations in this module — [`save`], [`load_by_id`],
//! [`delete`], [`all`], [`exec_query`], [`load_from_row`] — work against the
//! [`TableRecordTrait`] capability set only, never against concrete types.

use may_postgres::types::ToSql;
use may_postgres::Row;
use sea_query::{Expr, Value};
use std::fmt;
use std::sync::Arc;

use crate::executor::{BuoyError, BuoyExecutor, SharedExecutor};
use crate::fields::{self, FieldError, FieldMap};
use crate::query::{self, QueryBuilder};

/// Convert dynamic values to `may_postgres` parameters and execute a closure
///
/// Converts a slice of `sea_query::Value` into `ToSql` trait objects usable
/// with `may_postgres`, then executes a closure with the converted
/// parameters:
///
/// 1. First pass: collect all values into typed vectors
/// 2. Second pass: create references to the stored values
/// 3. Execute the closure (references are valid within its scope)
///
/// NULLs keep the type of their variant, so a `Value::String(None)` binds as
/// an `Option<String>` and satisfies the driver's type check.
///
/// # Errors
///
/// Returns an error if an unsupported value type is encountered; the
/// supported set is bool, signed/unsigned integers up to 64 bits (unsigned
/// bound as widened signed), f32/f64, String, Vec<u8> and JSON.
pub fn with_converted_params<F, R>(values: &[Value], f: F) -> Result<R, RecordError>
where
    F: FnOnce(&[&dyn ToSql]) -> Result<R, RecordError>,
{
    let mut bools: Vec<Option<bool>> = Vec::new();
    let mut ints: Vec<Option<i32>> = Vec::new();
    let mut big_ints: Vec<Option<i64>> = Vec::new();
    let mut floats: Vec<Option<f32>> = Vec::new();
    let mut doubles: Vec<Option<f64>> = Vec::new();
    let mut strings: Vec<Option<String>> = Vec::new();
    let mut bytes: Vec<Option<Vec<u8>>> = Vec::new();
    let mut jsons: Vec<Option<serde_json::Value>> = Vec::new();

    // First pass: collect all values into typed vectors
    for value in values.iter() {
        match value {
            Value::Bool(b) => bools.push(*b),
            Value::TinyInt(i) => ints.push(i.map(i32::from)),
            Value::SmallInt(i) => ints.push(i.map(i32::from)),
            Value::Int(i) => ints.push(*i),
            Value::TinyUnsigned(u) => ints.push(u.map(i32::from)),
            Value::SmallUnsigned(u) => ints.push(u.map(i32::from)),
            Value::BigInt(i) => big_ints.push(*i),
            Value::Unsigned(u) => big_ints.push(u.map(i64::from)),
            Value::BigUnsigned(u) => {
                if let Some(v) = u {
                    if *v > i64::MAX as u64 {
                        return Err(RecordError::Db(BuoyError::Other(format!(
                            "BigUnsigned value {} exceeds i64::MAX ({}), cannot be safely cast to i64",
                            v,
                            i64::MAX
                        ))));
                    }
                }
                big_ints.push(u.map(|v| v as i64));
            }
            Value::Float(v) => floats.push(*v),
            Value::Double(v) => doubles.push(*v),
            Value::String(s) => strings.push(s.clone()),
            Value::Bytes(b) => bytes.push(b.clone()),
            Value::Json(j) => jsons.push(j.as_ref().map(|v| (**v).clone())),
            _ => {
                return Err(RecordError::Db(BuoyError::Other(format!(
                    "Unsupported value type in query: {value:?}"
                ))));
            }
        }
    }

    // Second pass: create references to the stored values
    let mut bool_idx = 0;
    let mut int_idx = 0;
    let mut big_int_idx = 0;
    let mut float_idx = 0;
    let mut double_idx = 0;
    let mut string_idx = 0;
    let mut byte_idx = 0;
    let mut json_idx = 0;

    let mut params: Vec<&dyn ToSql> = Vec::new();

    for value in values.iter() {
        match value {
            Value::Bool(_) => {
                params.push(&bools[bool_idx] as &dyn ToSql);
                bool_idx += 1;
            }
            Value::TinyInt(_)
            | Value::SmallInt(_)
            | Value::Int(_)
            | Value::TinyUnsigned(_)
            | Value::SmallUnsigned(_) => {
                params.push(&ints[int_idx] as &dyn ToSql);
                int_idx += 1;
            }
            Value::BigInt(_) | Value::Unsigned(_) | Value::BigUnsigned(_) => {
                params.push(&big_ints[big_int_idx] as &dyn ToSql);
                big_int_idx += 1;
            }
            Value::Float(_) => {
                params.push(&floats[float_idx] as &dyn ToSql);
                float_idx += 1;
            }
            Value::Double(_) => {
                params.push(&doubles[double_idx] as &dyn ToSql);
                double_idx += 1;
            }
            Value::String(_) => {
                params.push(&strings[string_idx] as &dyn ToSql);
                string_idx += 1;
            }
            Value::Bytes(_) => {
                params.push(&bytes[byte_idx] as &dyn ToSql);
                byte_idx += 1;
            }
            Value::Json(_) => {
                params.push(&jsons[json_idx] as &dyn ToSql);
                json_idx += 1;
            }
            _ => {
                return Err(RecordError::Db(BuoyError::Other(format!(
                    "Unsupported value type in query: {value:?}"
                ))));
            }
        }
    }

    // Execute the closure with the parameters (references are valid here)
    f(&params)
}

/// Record lifecycle error type
#[derive(Debug)]
pub enum RecordError {
    /// Mutation attempted on a read-only record; nothing reached the connector
    ReadOnly,
    /// No row matched the primary key on load
    NotFound { table: &'static str, id: i64 },
    /// Field mapping or row scan failure
    Field(FieldError),
    /// Connector failure, propagated unchanged
    Db(BuoyError),
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::ReadOnly => write!(f, "Read-only record"),
            RecordError::NotFound { table, id } => {
                write!(f, "No row in {table} with primary key {id}")
            }
            RecordError::Field(e) => write!(f, "{e}"),
            RecordError::Db(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RecordError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RecordError::Field(e) => Some(e),
            RecordError::Db(e) => Some(e),
            _ => None,
        }
    }
}

impl From<FieldError> for RecordError {
    fn from(err: FieldError) -> Self {
        RecordError::Field(err)
    }
}

impl From<BuoyError> for RecordError {
    fn from(err: BuoyError) -> Self {
        RecordError::Db(err)
    }
}

/// Embedded persistence state carried by every entity.
///
/// Constructed explicitly: `is_new` marks an entity that has never been
/// inserted, `is_read_only` permanently blocks mutation (there is no setter
/// for it), and the connector is injected rather than read from any global.
pub struct TableRecord {
    is_new: bool,
    is_read_only: bool,
    executor: SharedExecutor,
    stmt: QueryBuilder,
}

impl TableRecord {
    /// Returns a new instance with the given connector and state flags
    pub fn new(executor: SharedExecutor, is_new: bool, is_read_only: bool) -> Self {
        Self {
            is_new,
            is_read_only,
            executor,
            stmt: QueryBuilder::new(),
        }
    }

    /// Whether the record has never been successfully inserted
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Whether the record permanently refuses mutation
    pub fn is_read_only(&self) -> bool {
        self.is_read_only
    }

    pub(crate) fn set_is_new(&mut self, is_new: bool) -> &mut Self {
        self.is_new = is_new;
        self
    }

    /// The active connector
    pub fn executor(&self) -> &SharedExecutor {
        &self.executor
    }

    /// Replace the active connector
    pub fn set_executor(&mut self, executor: SharedExecutor) -> &mut Self {
        self.executor = executor;
        self
    }

    /// Stage a WHERE predicate for the next [`exec_query`] call
    pub fn and_where(&mut self, condition: Expr) -> &mut Self {
        self.stmt.and_where(condition);
        self
    }

    /// Whether any predicate is currently staged
    pub fn has_conditions(&self) -> bool {
        self.stmt.has_conditions()
    }

    /// Clear the staged predicates
    pub fn reset_stmt(&mut self) {
        self.stmt.reset_stmt();
    }

    pub(crate) fn stmt(&self) -> &QueryBuilder {
        &self.stmt
    }
}

impl Clone for TableRecord {
    fn clone(&self) -> Self {
        Self {
            is_new: self.is_new,
            is_read_only: self.is_read_only,
            executor: Arc::clone(&self.executor),
            stmt: self.stmt.clone(),
        }
    }
}

impl fmt::Debug for TableRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableRecord")
            .field("is_new", &self.is_new)
            .field("is_read_only", &self.is_read_only)
            .field("stmt", &self.stmt)
            .finish_non_exhaustive()
    }
}

/// Capability set required from every persistable type.
///
/// Normally implemented by `#[derive(BuoyRecord)]`; the lifecycle operates
/// only against this trait, never against concrete entity types.
pub trait TableRecordTrait: FieldMap {
    /// Table the entity persists to
    fn table_name(&self) -> &'static str;

    /// Column uniquely identifying a row
    fn primary_key_name(&self) -> &'static str;

    /// Current primary-key value; zero means not yet assigned
    fn primary_key_value(&self) -> i64;

    /// The embedded persistence state
    fn table_record(&self) -> &TableRecord;

    /// The embedded persistence state, mutably
    fn table_record_mut(&mut self) -> &mut TableRecord;
}

/// Insert or update the entity, then rehydrate it from storage.
///
/// A new entity is inserted (`RETURNING` the generated key) and an existing
/// one updated by its current primary key; both paths finish with a
/// [`load_by_id`] so the in-memory state reflects exactly what the database
/// persisted, including server-side defaults. The write and the reload are
/// two separate statements with no transaction around them: a concurrent
/// writer can interleave between the two.
///
/// # Errors
///
/// Fails with [`RecordError::ReadOnly`] before anything reaches the
/// connector when the record is read-only; connector errors propagate
/// unchanged.
pub fn save<T>(ti: &mut T) -> Result<(), RecordError>
where
    T: TableRecordTrait + ?Sized,
{
    if ti.table_record().is_read_only() {
        return Err(RecordError::ReadOnly);
    }

    if ti.table_record().is_new() {
        insert(ti)
    } else {
        update(ti)
    }
}

// Insert a never-persisted entity and pick up its generated key.
fn insert<T>(ti: &mut T) -> Result<(), RecordError>
where
    T: TableRecordTrait + ?Sized,
{
    let (sql, values) = query::gen_save_query(ti)?;
    log::debug!("insert into {}: {sql}", ti.table_name());

    let executor = Arc::clone(ti.table_record().executor());
    let row = with_converted_params(&values.0, |params| {
        executor.query_one(&sql, params).map_err(RecordError::Db)
    })?;
    let id = returned_key(&row)?;

    load_by_id(ti, id)?;
    ti.table_record_mut().set_is_new(false);

    Ok(())
}

// Update an already-persisted entity in place, keyed by its primary key.
fn update<T>(ti: &mut T) -> Result<(), RecordError>
where
    T: TableRecordTrait + ?Sized,
{
    let (sql, values) = query::gen_update_query(ti)?;
    log::debug!("update {}: {sql}", ti.table_name());

    let executor = Arc::clone(ti.table_record().executor());
    with_converted_params(&values.0, |params| {
        executor.execute(&sql, params).map_err(RecordError::Db)
    })?;

    load_by_id(ti, ti.primary_key_value())
}

// Extract the generated primary key from an insert's RETURNING row.
fn returned_key(row: &Row) -> Result<i64, RecordError> {
    let column = row.columns()[0].name().to_string();
    match fields::decode_column(row, 0)? {
        Value::BigInt(Some(id)) => Ok(id),
        Value::Int(Some(id)) => Ok(i64::from(id)),
        Value::SmallInt(Some(id)) => Ok(i64::from(id)),
        other => Err(RecordError::Field(FieldError::scan(
            &column,
            format!("expected an integer primary key, got {other:?}"),
        ))),
    }
}

/// Load the entity's fields from the row matching `id`.
///
/// Overwrites every mapped field in place and clears `is_new`.
///
/// # Errors
///
/// Fails with [`RecordError::NotFound`] when no row matches — the entity is
/// left entirely unchanged in that case.
pub fn load_by_id<T>(ti: &mut T, id: i64) -> Result<(), RecordError>
where
    T: TableRecordTrait + ?Sized,
{
    let (sql, values) = query::gen_select_query(ti, id);

    let executor = Arc::clone(ti.table_record().executor());
    let rows = with_converted_params(&values.0, |params| {
        executor.query_all(&sql, params).map_err(RecordError::Db)
    })?;

    match rows.first() {
        Some(row) => load_from_row(row, ti),
        None => Err(RecordError::NotFound {
            table: ti.table_name(),
            id,
        }),
    }
}

/// Delete the entity's row by primary key.
///
/// Returns the number of affected rows. The in-memory entity is not mutated;
/// reusing it afterwards is the caller's responsibility.
///
/// # Errors
///
/// Fails with [`RecordError::ReadOnly`] when the record is read-only;
/// connector errors propagate unchanged.
pub fn delete<T>(ti: &T) -> Result<u64, RecordError>
where
    T: TableRecordTrait + ?Sized,
{
    if ti.table_record().is_read_only() {
        return Err(RecordError::ReadOnly);
    }

    let (sql, values) = query::gen_delete_query(ti);
    log::debug!("delete from {}: {sql}", ti.table_name());

    let executor = Arc::clone(ti.table_record().executor());
    with_converted_params(&values.0, |params| {
        executor.execute(&sql, params).map_err(RecordError::Db)
    })
}

/// Load every row of the entity's table.
///
/// A pivot entity built by `new_model` supplies table identity and the
/// connector; each result row is materialized into a fresh entity via
/// `new_model` + [`load_from_row`]. Any row scan failure fails the whole
/// call — partial collections are never returned.
pub fn all<T, F>(new_model: F) -> Result<Vec<T>, RecordError>
where
    T: TableRecordTrait,
    F: Fn() -> T,
{
    let pivot = new_model();
    let (sql, _) = QueryBuilder::new().build_query(&pivot);

    let executor = Arc::clone(pivot.table_record().executor());
    let rows = executor.query_all(&sql, &[]).map_err(RecordError::Db)?;

    materialize(&rows, &new_model, &executor)
}

/// Execute the predicates staged on the entity's query builder.
///
/// The staged state is cleared as soon as the statement is rendered, before
/// the round trip, so it never leaks into the next call — on success or on
/// error. Matching rows are materialized like in [`all`].
pub fn exec_query<T, F>(ti: &mut T, new_model: F) -> Result<Vec<T>, RecordError>
where
    T: TableRecordTrait,
    F: Fn() -> T,
{
    let (sql, values) = ti.table_record().stmt().build_query(ti);
    ti.table_record_mut().reset_stmt();

    let executor = Arc::clone(ti.table_record().executor());
    let rows = with_converted_params(&values.0, |params| {
        executor.query_all(&sql, params).map_err(RecordError::Db)
    })?;

    materialize(&rows, &new_model, &executor)
}

/// Bind one result row into the entity by column name.
///
/// Clears `is_new`: an entity loaded from storage is persisted by
/// definition. The caller attaching a connector beforehand (or the
/// constructor having injected one) keeps the entity independently
/// save/delete-capable.
pub fn load_from_row<T>(row: &Row, ti: &mut T) -> Result<(), RecordError>
where
    T: TableRecordTrait + ?Sized,
{
    fields::bind_row(ti, row)?;
    ti.table_record_mut().set_is_new(false);
    Ok(())
}

// One fresh entity per row, each reattached to the pivot's connector.
fn materialize<T, F>(
    rows: &[Row],
    new_model: &F,
    executor: &SharedExecutor,
) -> Result<Vec<T>, RecordError>
where
    T: TableRecordTrait,
    F: Fn() -> T,
{
    let mut result = Vec::with_capacity(rows.len());
    for row in rows {
        let mut entity = new_model();
        entity
            .table_record_mut()
            .set_executor(Arc::clone(executor));
        load_from_row(row, &mut entity)?;
        result.push(entity);
    }
    Ok(result)
}
