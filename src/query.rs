//! Query builder: staged predicates and per-operation SQL generators.
//!
//! SQL is rendered by `sea-query`'s `PostgresQueryBuilder`, so every value
//! becomes a `$N` placeholder and the returned [`Values`] carry the bound
//! parameters in declaration order.

use sea_query::{
    DeleteStatement, Expr, ExprTrait, InsertStatement, PostgresQueryBuilder, SelectStatement,
    UpdateStatement, Values,
};

use crate::fields::{self, FieldError};
use crate::record::TableRecordTrait;

/// Accumulator of WHERE predicates for ad-hoc queries on one entity.
///
/// Predicates are staged with [`and_where`](QueryBuilder::and_where) and
/// rendered by [`build_query`](QueryBuilder::build_query) into a SELECT over
/// the entity's mapped columns. The staged state is transient:
/// [`exec_query`](crate::record::exec_query) clears it on every execution so
/// one call can never leak predicates into the next.
///
/// # Example
///
/// ```no_run
/// use sea_query::{Expr, ExprTrait};
/// # use buoy::{exec_query, RecordError, TableRecordTrait};
/// # fn demo<T: TableRecordTrait, F: Fn() -> T>(user: &mut T, new_user: F) -> Result<(), RecordError> {
/// user.table_record_mut()
///     .and_where(Expr::col("gender").eq("M"));
/// let males = exec_query(user, new_user)?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct QueryBuilder {
    wheres: Vec<Expr>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a WHERE predicate; predicates are ANDed in the order added
    pub fn and_where(&mut self, condition: Expr) -> &mut Self {
        self.wheres.push(condition);
        self
    }

    /// Whether any predicate is currently staged
    pub fn has_conditions(&self) -> bool {
        !self.wheres.is_empty()
    }

    /// Clear the staged predicates and their parameters
    pub fn reset_stmt(&mut self) {
        self.wheres.clear();
    }

    /// Render the staged predicates into a parametrized SELECT over the
    /// entity's mapped columns
    pub fn build_query<T>(&self, ti: &T) -> (String, Values)
    where
        T: TableRecordTrait + ?Sized,
    {
        let mut query = SelectStatement::default();
        query
            .columns(ti.columns().iter().copied())
            .from(ti.table_name());
        for condition in &self.wheres {
            query.and_where(condition.clone());
        }
        query.build(PostgresQueryBuilder)
    }
}

/// `INSERT INTO <table> (<cols except PK>) VALUES (...) RETURNING <pk>`
///
/// The generated key comes back through `RETURNING`, PostgreSQL's equivalent
/// of a last-insert-id.
///
/// # Errors
///
/// Returns `FieldError::MissingPrimaryKey` when the declared primary key has
/// no mapped column.
pub fn gen_save_query<T>(ti: &T) -> Result<(String, Values), FieldError>
where
    T: TableRecordTrait + ?Sized,
{
    let columns = fields::columns_excluding_primary_key(ti)?;
    let values = fields::values_excluding_primary_key(ti)?;

    let mut query = InsertStatement::default();
    query
        .into_table(ti.table_name())
        .columns(columns)
        .values_panic(values.into_iter().map(Expr::val))
        .returning_col(ti.primary_key_name());

    Ok(query.build(PostgresQueryBuilder))
}

/// `UPDATE <table> SET <col> = $n, ... WHERE <pk> = $last`
///
/// The primary-key parameter is appended after the SET values, matching the
/// order the values are bound in.
///
/// # Errors
///
/// Returns `FieldError::MissingPrimaryKey` when the declared primary key has
/// no mapped column.
pub fn gen_update_query<T>(ti: &T) -> Result<(String, Values), FieldError>
where
    T: TableRecordTrait + ?Sized,
{
    let columns = fields::columns_excluding_primary_key(ti)?;
    let values = fields::values_excluding_primary_key(ti)?;

    let mut query = UpdateStatement::default();
    query.table(ti.table_name());
    for (column, value) in columns.into_iter().zip(values) {
        query.value(column, Expr::val(value));
    }
    query.and_where(Expr::col(ti.primary_key_name()).eq(ti.primary_key_value()));

    Ok(query.build(PostgresQueryBuilder))
}

/// `DELETE FROM <table> WHERE <pk> = $1`
pub fn gen_delete_query<T>(ti: &T) -> (String, Values)
where
    T: TableRecordTrait + ?Sized,
{
    let mut query = DeleteStatement::default();
    query
        .from_table(ti.table_name())
        .and_where(Expr::col(ti.primary_key_name()).eq(ti.primary_key_value()));
    query.build(PostgresQueryBuilder)
}

/// `SELECT <all mapped columns> FROM <table> WHERE <pk> = $1`
pub fn gen_select_query<T>(ti: &T, id: i64) -> (String, Values)
where
    T: TableRecordTrait + ?Sized,
{
    let mut query = SelectStatement::default();
    query
        .columns(ti.columns().iter().copied())
        .from(ti.table_name())
        .and_where(Expr::col(ti.primary_key_name()).eq(id));
    query.build(PostgresQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_cfg::{mock_executor, TestUser};
    use sea_query::Value;

    fn sample_user() -> TestUser {
        let mut user = TestUser::new(mock_executor());
        user.id = 7;
        user.name = Some("Mario".to_string());
        user.lastname = Some("Rossi".to_string());
        user.gender = Some("M".to_string());
        user
    }

    #[test]
    fn test_gen_save_query() {
        let user = sample_user();
        let (sql, values) = gen_save_query(&user).unwrap();

        assert_eq!(
            sql,
            r#"INSERT INTO "users" ("name", "lastname", "gender") VALUES ($1, $2, $3) RETURNING "id""#
        );
        assert_eq!(
            values.0,
            vec![
                Value::String(Some("Mario".to_string())),
                Value::String(Some("Rossi".to_string())),
                Value::String(Some("M".to_string())),
            ]
        );
    }

    #[test]
    fn test_gen_update_query_pk_parameter_last() {
        let user = sample_user();
        let (sql, values) = gen_update_query(&user).unwrap();

        assert_eq!(
            sql,
            r#"UPDATE "users" SET "name" = $1, "lastname" = $2, "gender" = $3 WHERE "id" = $4"#
        );
        assert_eq!(values.0.len(), 4);
        assert_eq!(values.0.last(), Some(&Value::BigInt(Some(7))));
    }

    #[test]
    fn test_gen_delete_query() {
        let user = sample_user();
        let (sql, values) = gen_delete_query(&user);

        assert_eq!(sql, r#"DELETE FROM "users" WHERE "id" = $1"#);
        assert_eq!(values.0, vec![Value::BigInt(Some(7))]);
    }

    #[test]
    fn test_gen_select_query() {
        let user = sample_user();
        let (sql, values) = gen_select_query(&user, 42);

        assert_eq!(
            sql,
            r#"SELECT "id", "name", "lastname", "gender" FROM "users" WHERE "id" = $1"#
        );
        assert_eq!(values.0, vec![Value::BigInt(Some(42))]);
    }

    #[test]
    fn test_build_query_without_conditions() {
        let user = sample_user();
        let (sql, values) = QueryBuilder::new().build_query(&user);

        assert_eq!(
            sql,
            r#"SELECT "id", "name", "lastname", "gender" FROM "users""#
        );
        assert!(values.0.is_empty());
    }

    #[test]
    fn test_build_query_binds_parameters_in_declaration_order() {
        let user = sample_user();

        let mut builder = QueryBuilder::new();
        builder
            .and_where(Expr::col("gender").eq("M"))
            .and_where(Expr::col("lastname").eq("Rossi"));
        let (sql, values) = builder.build_query(&user);

        assert_eq!(
            sql,
            r#"SELECT "id", "name", "lastname", "gender" FROM "users" WHERE "gender" = $1 AND "lastname" = $2"#
        );
        assert_eq!(
            values.0,
            vec![
                Value::String(Some("M".to_string())),
                Value::String(Some("Rossi".to_string())),
            ]
        );
    }

    #[test]
    fn test_reset_stmt_clears_staged_state() {
        let user = sample_user();

        let mut builder = QueryBuilder::new();
        builder.and_where(Expr::col("gender").eq("M"));
        assert!(builder.has_conditions());

        builder.reset_stmt();
        assert!(!builder.has_conditions());

        let (sql, values) = builder.build_query(&user);
        assert_eq!(
            sql,
            r#"SELECT "id", "name", "lastname", "gender" FROM "users""#
        );
        assert!(values.0.is_empty());
    }

    #[test]
    fn test_gen_queries_missing_primary_key() {
        use crate::fields::FieldMap;

        struct NoKey {
            record: crate::record::TableRecord,
        }

        impl FieldMap for NoKey {
            fn columns(&self) -> &'static [&'static str] {
                &["name"]
            }
            fn get(&self, column: &str) -> Result<Value, FieldError> {
                Err(FieldError::ColumnNotFound(column.to_string()))
            }
            fn set(&mut self, column: &str, _value: Value) -> Result<(), FieldError> {
                Err(FieldError::ColumnNotFound(column.to_string()))
            }
        }

        impl TableRecordTrait for NoKey {
            fn table_name(&self) -> &'static str {
                "nokeys"
            }
            fn primary_key_name(&self) -> &'static str {
                "id"
            }
            fn primary_key_value(&self) -> i64 {
                0
            }
            fn table_record(&self) -> &crate::record::TableRecord {
                &self.record
            }
            fn table_record_mut(&mut self) -> &mut crate::record::TableRecord {
                &mut self.record
            }
        }

        let nokey = NoKey {
            record: crate::record::TableRecord::new(mock_executor(), true, false),
        };

        assert!(matches!(
            gen_save_query(&nokey),
            Err(FieldError::MissingPrimaryKey { .. })
        ));
        assert!(matches!(
            gen_update_query(&nokey),
            Err(FieldError::MissingPrimaryKey { .. })
        ));
    }
}
