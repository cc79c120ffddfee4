//! BuoyRecord derive macro implementation

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, ToTokens};
use syn::{parse_macro_input, Data, DataStruct, DeriveInput, Fields, Ident};

use crate::attributes;
use crate::utils;

/// Generate the `FieldMap` and `TableRecordTrait` implementations
///
/// Persisted columns are the struct's named fields in declaration order,
/// excluding the embedded `TableRecord` (detected by type) and any `#[skip]`
/// field. Exactly one field must carry `#[primary_key]`.
pub fn derive_buoy_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let struct_name = &input.ident;

    // Extract struct fields
    let fields = match &input.data {
        Data::Struct(DataStruct {
            fields: Fields::Named(fields),
            ..
        }) => &fields.named,
        _ => {
            return syn::Error::new_spanned(
                &input.ident,
                "BuoyRecord can only be derived for structs with named fields",
            )
            .to_compile_error()
            .into();
        }
    };

    // Extract table name from attributes
    let table_name = attributes::extract_table_name(&input.attrs)
        .unwrap_or_else(|| utils::snake_case(&struct_name.to_string()));

    let mut record_field: Option<Ident> = None;
    let mut primary_key: Option<(Ident, String)> = None;

    let mut column_names: Vec<String> = Vec::new();
    let mut get_arms: Vec<TokenStream2> = Vec::new();
    let mut set_arms: Vec<TokenStream2> = Vec::new();

    for field in fields.iter() {
        let field_name = field.ident.as_ref().unwrap();
        let field_type = &field.ty;

        // The embedded persistence state is excluded from the field map
        if is_table_record(field_type) {
            if record_field.is_some() {
                return syn::Error::new_spanned(
                    field_name,
                    "BuoyRecord structs must embed exactly one TableRecord field",
                )
                .to_compile_error()
                .into();
            }
            record_field = Some(field_name.clone());
            continue;
        }

        if attributes::has_attribute(field, "skip") {
            continue;
        }

        // Column name from attribute or snake_case of the field name
        let column_name = attributes::extract_column_name(field)
            .unwrap_or_else(|| utils::snake_case(&field_name.to_string()));

        if attributes::has_attribute(field, "primary_key") {
            if primary_key.is_some() {
                return syn::Error::new_spanned(
                    field_name,
                    "BuoyRecord supports a single #[primary_key] field",
                )
                .to_compile_error()
                .into();
            }
            primary_key = Some((field_name.clone(), column_name.clone()));
        }

        let column_name_str = column_name.as_str();
        let expected = field_type.to_token_stream().to_string().replace(' ', "");

        get_arms.push(quote! {
            #column_name_str => Ok(sea_query::Value::from(self.#field_name.clone())),
        });

        set_arms.push(quote! {
            #column_name_str => {
                self.#field_name = <#field_type as sea_query::ValueType>::try_from(value)
                    .map_err(|_| buoy::FieldError::invalid_type(column, #expected))?;
            }
        });

        column_names.push(column_name);
    }

    let Some(record_field) = record_field else {
        return syn::Error::new_spanned(
            &input.ident,
            "BuoyRecord requires an embedded buoy::TableRecord field to carry persistence state",
        )
        .to_compile_error()
        .into();
    };

    let Some((pk_field, pk_column)) = primary_key else {
        return syn::Error::new_spanned(
            &input.ident,
            "BuoyRecord requires a #[primary_key] field",
        )
        .to_compile_error()
        .into();
    };

    let columns: Vec<&str> = column_names.iter().map(String::as_str).collect();

    let expanded = quote! {
        impl buoy::FieldMap for #struct_name {
            fn columns(&self) -> &'static [&'static str] {
                &[#(#columns),*]
            }

            fn get(&self, column: &str) -> Result<sea_query::Value, buoy::FieldError> {
                match column {
                    #(#get_arms)*
                    _ => Err(buoy::FieldError::ColumnNotFound(column.to_string())),
                }
            }

            fn set(
                &mut self,
                column: &str,
                value: sea_query::Value,
            ) -> Result<(), buoy::FieldError> {
                match column {
                    #(#set_arms)*
                    _ => return Err(buoy::FieldError::ColumnNotFound(column.to_string())),
                }
                Ok(())
            }
        }

        impl buoy::TableRecordTrait for #struct_name {
            fn table_name(&self) -> &'static str {
                #table_name
            }

            fn primary_key_name(&self) -> &'static str {
                #pk_column
            }

            fn primary_key_value(&self) -> i64 {
                i64::from(self.#pk_field)
            }

            fn table_record(&self) -> &buoy::TableRecord {
                &self.#record_field
            }

            fn table_record_mut(&mut self) -> &mut buoy::TableRecord {
                &mut self.#record_field
            }
        }
    };

    TokenStream::from(expanded)
}

// The embedded state field is recognized by its type's last path segment, so
// both `TableRecord` and `buoy::TableRecord` spellings work.
fn is_table_record(ty: &syn::Type) -> bool {
    if let syn::Type::Path(syn::TypePath { path, .. }) = ty {
        path.segments
            .last()
            .map(|segment| segment.ident == "TableRecord")
            .unwrap_or(false)
    } else {
        false
    }
}
