use duckdb::{
    core::{DataChunkHandle, Inserter, LogicalTypeHandle, LogicalTypeId},
    vscalar::{ScalarFunctionSignature, VScalar},
    vtab::arrow::WritableVector,
};
use libduckdb_sys::duckdb_string_t;

use crate::info::info_greeting;
use crate::key;

/// Read row `i` of a VARCHAR input column as an owned `String`.
unsafe fn varchar_arg(values: &[duckdb_string_t], i: usize) -> String {
    duckdb::types::DuckString::new(&mut { values[i] })
        .as_str()
        .to_string()
}

/// `snowducks_normalize_query(VARCHAR) -> VARCHAR`
///
/// Whitespace-collapsed, lowercased query text — the exact form that gets
/// hashed into a cache key.
pub struct NormalizeQuery;

impl VScalar for NormalizeQuery {
    type State = ();

    fn signatures() -> Vec<ScalarFunctionSignature> {
        vec![ScalarFunctionSignature::exact(
            vec![LogicalTypeHandle::from(LogicalTypeId::Varchar)],
            LogicalTypeHandle::from(LogicalTypeId::Varchar),
        )]
    }

    unsafe fn invoke(
        _: &Self::State,
        input: &mut DataChunkHandle,
        output: &mut dyn WritableVector,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let col = input.flat_vector(0);
        let values = col.as_slice_with_len::<duckdb_string_t>(input.len());
        let out = output.flat_vector();
        for i in 0..input.len() {
            let normalized = key::normalize_query(&varchar_arg(values, i));
            out.insert(i, normalized.as_str());
        }
        Ok(())
    }
}

/// `snowducks_cache_table_name(VARCHAR) -> VARCHAR`
///
/// The `t_<16 hex>` cache key for a query.
pub struct CacheTableName;

impl VScalar for CacheTableName {
    type State = ();

    fn signatures() -> Vec<ScalarFunctionSignature> {
        vec![ScalarFunctionSignature::exact(
            vec![LogicalTypeHandle::from(LogicalTypeId::Varchar)],
            LogicalTypeHandle::from(LogicalTypeId::Varchar),
        )]
    }

    unsafe fn invoke(
        _: &Self::State,
        input: &mut DataChunkHandle,
        output: &mut dyn WritableVector,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let col = input.flat_vector(0);
        let values = col.as_slice_with_len::<duckdb_string_t>(input.len());
        let out = output.flat_vector();
        for i in 0..input.len() {
            let name = key::cache_table_name(&varchar_arg(values, i));
            out.insert(i, name.as_str());
        }
        Ok(())
    }
}

/// `snowducks_generate_cache_table_name_without_limit(VARCHAR) -> VARCHAR`
///
/// Same key derivation, ignoring a trailing `LIMIT` clause — the key the
/// table function and the CLI actually share.
pub struct CacheTableNameWithoutLimit;

impl VScalar for CacheTableNameWithoutLimit {
    type State = ();

    fn signatures() -> Vec<ScalarFunctionSignature> {
        vec![ScalarFunctionSignature::exact(
            vec![LogicalTypeHandle::from(LogicalTypeId::Varchar)],
            LogicalTypeHandle::from(LogicalTypeId::Varchar),
        )]
    }

    unsafe fn invoke(
        _: &Self::State,
        input: &mut DataChunkHandle,
        output: &mut dyn WritableVector,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let col = input.flat_vector(0);
        let values = col.as_slice_with_len::<duckdb_string_t>(input.len());
        let out = output.flat_vector();
        for i in 0..input.len() {
            let name = key::cache_table_name_without_limit(&varchar_arg(values, i));
            out.insert(i, name.as_str());
        }
        Ok(())
    }
}

/// `snowducks_has_limit_clause(VARCHAR) -> BOOLEAN`
pub struct HasLimitClause;

impl VScalar for HasLimitClause {
    type State = ();

    fn signatures() -> Vec<ScalarFunctionSignature> {
        vec![ScalarFunctionSignature::exact(
            vec![LogicalTypeHandle::from(LogicalTypeId::Varchar)],
            LogicalTypeHandle::from(LogicalTypeId::Boolean),
        )]
    }

    unsafe fn invoke(
        _: &Self::State,
        input: &mut DataChunkHandle,
        output: &mut dyn WritableVector,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let col = input.flat_vector(0);
        let values = col.as_slice_with_len::<duckdb_string_t>(input.len());
        let mut out = output.flat_vector();
        let out_slice = out.as_mut_slice::<bool>();
        for i in 0..input.len() {
            out_slice[i] = key::has_limit_clause(&varchar_arg(values, i));
        }
        Ok(())
    }
}

/// `snowducks_extract_limit_value(VARCHAR) -> INTEGER`
///
/// 0 when the query carries no parseable `LIMIT`.
pub struct ExtractLimitValue;

impl VScalar for ExtractLimitValue {
    type State = ();

    fn signatures() -> Vec<ScalarFunctionSignature> {
        vec![ScalarFunctionSignature::exact(
            vec![LogicalTypeHandle::from(LogicalTypeId::Varchar)],
            LogicalTypeHandle::from(LogicalTypeId::Integer),
        )]
    }

    unsafe fn invoke(
        _: &Self::State,
        input: &mut DataChunkHandle,
        output: &mut dyn WritableVector,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let col = input.flat_vector(0);
        let values = col.as_slice_with_len::<duckdb_string_t>(input.len());
        let mut out = output.flat_vector();
        let out_slice = out.as_mut_slice::<i32>();
        for i in 0..input.len() {
            out_slice[i] = key::extract_limit_value(&varchar_arg(values, i));
        }
        Ok(())
    }
}

/// `snowducks_info(VARCHAR) -> VARCHAR` — fixed greeting template.
pub struct Info;

impl VScalar for Info {
    type State = ();

    fn signatures() -> Vec<ScalarFunctionSignature> {
        vec![ScalarFunctionSignature::exact(
            vec![LogicalTypeHandle::from(LogicalTypeId::Varchar)],
            LogicalTypeHandle::from(LogicalTypeId::Varchar),
        )]
    }

    unsafe fn invoke(
        _: &Self::State,
        input: &mut DataChunkHandle,
        output: &mut dyn WritableVector,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let col = input.flat_vector(0);
        let values = col.as_slice_with_len::<duckdb_string_t>(input.len());
        let out = output.flat_vector();
        for i in 0..input.len() {
            let greeting = info_greeting(&varchar_arg(values, i));
            out.insert(i, greeting.as_str());
        }
        Ok(())
    }
}
