//! VOTable BINARY and BINARY2 stream decoding
//!
//! Both serializations write rows back to back, each field big-endian in
//! FIELD order. Variable-length arrays (`arraysize` ending in `*`) carry a
//! 4-byte element count. BINARY2 prefixes every row with a null bitmap, one
//! bit per field, most significant bit first.
//!
//! Cells are rendered to text so TABLEDATA and binary results share the same
//! typed conversion in `table_convert`.

use super::error::{Result, TapError};
use super::votable::{Field, RawRow, VoDatatype};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryFormat {
    Binary,
    Binary2,
}

/// Number of primitives in one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Count {
    Fixed(usize),
    Variable,
}

fn element_count(field: &Field) -> Result<Count> {
    let Some(arraysize) = field.arraysize.as_deref() else {
        return Ok(Count::Fixed(1));
    };

    let mut total = 1usize;
    for dim in arraysize.split('x') {
        let dim = dim.trim();
        if dim.ends_with('*') {
            return Ok(Count::Variable);
        }
        let invalid = || {
            TapError::VoTable(format!(
                "FIELD '{}' has invalid arraysize '{}'",
                field.name, arraysize
            ))
        };
        let n: usize = dim.parse().map_err(|_| invalid())?;
        total = total.checked_mul(n).ok_or_else(invalid)?;
    }
    Ok(Count::Fixed(total))
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&end| end <= self.buf.len());
        match end {
            Some(end) => {
                let out = &self.buf[self.pos..end];
                self.pos = end;
                Ok(out)
            }
            None => Err(TapError::VoTable(format!(
                "binary stream truncated: need {} bytes at offset {}, have {}",
                n,
                self.pos,
                self.buf.len() - self.pos
            ))),
        }
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Fail unless `count` elements of `size` bytes are left in the stream
    fn ensure(&self, count: usize, size: usize) -> Result<usize> {
        let remaining = self.buf.len() - self.pos;
        match count.checked_mul(size) {
            Some(bytes) if bytes <= remaining => Ok(bytes),
            _ => Err(TapError::VoTable(format!(
                "binary stream truncated: {} elements of {} bytes at offset {}, have {}",
                count, size, self.pos, remaining
            ))),
        }
    }
}

/// Decode every row of a binary stream
pub(crate) fn decode_rows(
    format: BinaryFormat,
    fields: &[Field],
    bytes: &[u8],
) -> Result<Vec<RawRow>> {
    if fields.is_empty() {
        return Ok(Vec::new());
    }

    let counts = fields
        .iter()
        .map(element_count)
        .collect::<Result<Vec<_>>>()?;
    let mask_len = fields.len().div_ceil(8);

    let mut cursor = Cursor { buf: bytes, pos: 0 };
    let mut rows = Vec::new();

    while !cursor.is_empty() {
        let mask = match format {
            BinaryFormat::Binary2 => Some(cursor.take(mask_len)?),
            BinaryFormat::Binary => None,
        };

        let mut row = Vec::with_capacity(fields.len());
        for (i, (field, count)) in fields.iter().zip(&counts).enumerate() {
            let n = match count {
                Count::Fixed(n) => *n,
                Count::Variable => u32::from_be_bytes(cursor.take_array()?) as usize,
            };
            let cell = decode_cell(&mut cursor, field, n)?;
            let is_null = mask.is_some_and(|m| m[i / 8] & (0x80 >> (i % 8)) != 0);
            row.push(if is_null { None } else { cell });
        }
        rows.push(row);
    }

    Ok(rows)
}

fn decode_cell(cursor: &mut Cursor, field: &Field, n: usize) -> Result<Option<String>> {
    let scalar = field.is_scalar();

    let text = match field.datatype {
        VoDatatype::Char => {
            let raw = cursor.take(n)?;
            let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
            String::from_utf8_lossy(&raw[..end]).trim_end().to_string()
        }
        VoDatatype::UnicodeChar => {
            let len = cursor.ensure(n, 2)?;
            let raw = cursor.take(len)?;
            let units: Vec<u16> = raw
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .take_while(|&u| u != 0)
                .collect();
            String::from_utf16_lossy(&units).trim_end().to_string()
        }
        VoDatatype::Bit => {
            let raw = cursor.take(n.div_ceil(8))?;
            (0..n)
                .map(|i| if raw[i / 8] & (0x80 >> (i % 8)) != 0 { '1' } else { '0' })
                .collect()
        }
        VoDatatype::Boolean => {
            let values: Vec<&str> = cursor
                .take(n)?
                .iter()
                .map(|b| match b {
                    b'T' | b't' | b'1' => "T",
                    b'F' | b'f' | b'0' => "F",
                    _ => "?",
                })
                .collect();
            if scalar && values.first() == Some(&"?") {
                return Ok(None);
            }
            values.join(" ")
        }
        _ => {
            cursor.ensure(n, element_size(field.datatype))?;
            let mut values = Vec::with_capacity(n);
            for _ in 0..n {
                values.push(decode_number(cursor, field.datatype)?);
            }
            if scalar && values.first().map(String::as_str) == Some("NaN") {
                return Ok(None);
            }
            values.join(" ")
        }
    };

    Ok(Some(text))
}

fn decode_number(cursor: &mut Cursor, datatype: VoDatatype) -> Result<String> {
    Ok(match datatype {
        VoDatatype::UnsignedByte => u8::from_be_bytes(cursor.take_array()?).to_string(),
        VoDatatype::Short => i16::from_be_bytes(cursor.take_array()?).to_string(),
        VoDatatype::Int => i32::from_be_bytes(cursor.take_array()?).to_string(),
        VoDatatype::Long => i64::from_be_bytes(cursor.take_array()?).to_string(),
        VoDatatype::Float => format_f32(f32::from_be_bytes(cursor.take_array()?)),
        VoDatatype::Double => format_float(f64::from_be_bytes(cursor.take_array()?)),
        VoDatatype::FloatComplex => {
            let re = f32::from_be_bytes(cursor.take_array()?);
            let im = f32::from_be_bytes(cursor.take_array()?);
            format!("{} {}", format_f32(re), format_f32(im))
        }
        VoDatatype::DoubleComplex => {
            let re = f64::from_be_bytes(cursor.take_array()?);
            let im = f64::from_be_bytes(cursor.take_array()?);
            format!("{} {}", format_float(re), format_float(im))
        }
        other => {
            return Err(TapError::VoTable(format!(
                "'{}' is not a numeric datatype",
                other
            )))
        }
    })
}

/// Bytes per element of a numeric datatype
fn element_size(datatype: VoDatatype) -> usize {
    match datatype {
        VoDatatype::UnsignedByte => 1,
        VoDatatype::Short => 2,
        VoDatatype::Int | VoDatatype::Float => 4,
        VoDatatype::Long | VoDatatype::Double | VoDatatype::FloatComplex => 8,
        VoDatatype::DoubleComplex => 16,
        _ => 1,
    }
}

// Shortest decimal form of the f32 itself, not of its f64 widening
fn format_f32(v: f32) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else {
        v.to_string()
    }
}

fn format_float(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else {
        v.to_string()
    }
}
