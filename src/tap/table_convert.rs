//! VOTable rows to Polars DataFrame conversion
//!
//! Every FIELD becomes one typed Polars column:
//! - boolean → Boolean
//! - unsignedByte / short / int / long → Int64
//! - float / double → Float64
//! - everything else (text, arrays, bit, complex) → String
//!
//! Empty cells and cells matching the FIELD's `VALUES null` sentinel become
//! nulls. NaN floats are nulls as well.

use super::error::{Result, TapError};
use super::votable::{Field, RawRow, VoDatatype};
use polars::prelude::*;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Boolean,
    Integer,
    Float,
    Text,
}

fn column_kind(field: &Field) -> ColumnKind {
    if !field.is_scalar() {
        return ColumnKind::Text;
    }
    match field.datatype {
        VoDatatype::Boolean => ColumnKind::Boolean,
        VoDatatype::UnsignedByte | VoDatatype::Short | VoDatatype::Int | VoDatatype::Long => {
            ColumnKind::Integer
        }
        VoDatatype::Float | VoDatatype::Double => ColumnKind::Float,
        _ => ColumnKind::Text,
    }
}

/// Build a DataFrame from raw rows, one column per field
pub(crate) fn rows_to_dataframe(fields: &[Field], rows: &[RawRow]) -> Result<DataFrame> {
    for (i, row) in rows.iter().enumerate() {
        if row.len() > fields.len() {
            return Err(TapError::VoTable(format!(
                "row {} has {} cells but the table declares {} fields",
                i,
                row.len(),
                fields.len()
            )));
        }
    }

    let names = unique_names(fields);
    let mut columns = Vec::with_capacity(fields.len());

    for (idx, (field, name)) in fields.iter().zip(names).enumerate() {
        let cells = rows.iter().map(|row| {
            row.get(idx)
                .and_then(|c| c.as_deref())
                .map(str::trim)
                .filter(|c| !c.is_empty() && Some(*c) != field.null.as_deref())
        });

        let series = match column_kind(field) {
            ColumnKind::Boolean => {
                let values: Vec<Option<bool>> = cells.map(|c| c.and_then(parse_bool)).collect();
                Series::new(name.into(), values)
            }
            ColumnKind::Integer => {
                let values = cells
                    .map(|c| c.map(|v| parse_int(field, v)).transpose())
                    .collect::<Result<Vec<Option<i64>>>>()?;
                Series::new(name.into(), values)
            }
            ColumnKind::Float => {
                let values = cells
                    .map(|c| c.map(|v| parse_float(field, v)).transpose())
                    .collect::<Result<Vec<Option<f64>>>>()?;
                let values: Vec<Option<f64>> =
                    values.into_iter().map(|v| v.filter(|f| !f.is_nan())).collect();
                Series::new(name.into(), values)
            }
            ColumnKind::Text => {
                let values: Vec<Option<String>> =
                    cells.map(|c| c.map(str::to_string)).collect();
                Series::new(name.into(), values)
            }
        };
        columns.push(series.into_column());
    }

    Ok(DataFrame::new(columns)?)
}

/// Joins often return several columns with the same name; Polars requires
/// unique names, so repeats get a `_2`, `_3`, ... suffix.
fn unique_names(fields: &[Field]) -> Vec<String> {
    let mut seen = HashSet::new();
    fields
        .iter()
        .map(|f| {
            let mut name = f.name.clone();
            let mut n = 2;
            while !seen.insert(name.clone()) {
                name = format!("{}_{}", f.name, n);
                n += 1;
            }
            name
        })
        .collect()
}

fn parse_bool(v: &str) -> Option<bool> {
    match v {
        "T" | "t" | "1" => Some(true),
        "F" | "f" | "0" => Some(false),
        _ if v.eq_ignore_ascii_case("true") => Some(true),
        _ if v.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

fn parse_int(field: &Field, v: &str) -> Result<i64> {
    let parsed = match v.strip_prefix("0x").or_else(|| v.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).ok(),
        None => v.parse().ok(),
    };
    parsed.ok_or_else(|| {
        TapError::VoTable(format!(
            "column '{}': invalid {} value '{}'",
            field.name, field.datatype, v
        ))
    })
}

fn parse_float(field: &Field, v: &str) -> Result<f64> {
    v.parse().map_err(|_| {
        TapError::VoTable(format!(
            "column '{}': invalid {} value '{}'",
            field.name, field.datatype, v
        ))
    })
}
