//! Procedural macros for the Buoy active-record layer
//!
//! This crate provides the `BuoyRecord` derive macro.

mod attributes;
mod macros;
mod utils;

use proc_macro::TokenStream;

/// Derive macro for `BuoyRecord` - generates the per-entity column/field descriptor
///
/// This macro implements `buoy::FieldMap` and `buoy::TableRecordTrait` for a
/// struct, turning it into a persistable entity:
///
/// - `columns()`: every persisted column in declaration order
/// - `get`/`set`: dynamic field access by column name over `sea_query::Value`
/// - table identity: `table_name`, `primary_key_name`, `primary_key_value`
/// - state access: `table_record`/`table_record_mut` on the embedded
///   `buoy::TableRecord` field (detected by type, excluded from the map)
///
/// # Attributes
///
/// - `#[table_name = "..."]` on the struct (defaults to the snake_case type name)
/// - `#[primary_key]` on exactly one field
/// - `#[column_name = "..."]` on a field (defaults to the snake_case field name)
/// - `#[skip]` on fields that are not persisted
///
/// # Example
///
/// ```ignore
/// use buoy::{BuoyRecord, TableRecord};
///
/// #[derive(BuoyRecord)]
/// #[table_name = "users"]
/// pub struct User {
///     #[primary_key]
///     pub id: i64,
///     pub name: Option<String>,
///     pub lastname: Option<String>,
///     record: TableRecord,
/// }
/// ```
#[proc_macro_derive(BuoyRecord, attributes(table_name, primary_key, column_name, skip))]
pub fn derive_buoy_record(input: TokenStream) -> TokenStream {
    macros::derive_buoy_record(input)
}
