/*
    PlatterDB
    https://github.com/dbalsom/platterdb

    Copyright 2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------
*/

//! The `record` module defines the typed [`Value`] a field can hold and the
//! fixed-width binary codec that maps a schema-described row to and from its
//! on-disk byte image. All encodings are little-endian; string families are
//! right-padded with ASCII spaces, and a NULL of any type is stored as
//! `field.size` zero bytes.

use std::collections::HashMap;
use std::fmt::Display;

use crate::schema::{FieldDef, FieldType, Schema};
use crate::StoreError;

/// A typed field value. Which variant a field carries is determined by its
/// declared [`FieldType`]; string-family types (CHAR, VARCHAR, TEXT, DATE,
/// DATETIME) all carry [`Value::Text`].
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    TinyInt(i8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
    Text(String),
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::TinyInt(v) => write!(f, "{}", v),
            Value::SmallInt(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{}", v),
        }
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// A validated row: a mapping from field name to typed value.
pub type Record = HashMap<String, Value>;

/// Serialize a record to its fixed-width byte image, emitting fields in
/// schema order. The result is always exactly `schema.record_size()` bytes.
pub fn serialize_record(record: &Record, schema: &Schema) -> Result<Vec<u8>, StoreError> {
    let mut image = Vec::with_capacity(schema.record_size());
    for field in schema.fields() {
        let value = record.get(field.name()).unwrap_or(&Value::Null);
        encode_field(&mut image, value, field)?;
    }
    Ok(image)
}

/// Deserialize a fixed-width byte image back into a record, slicing by field
/// size in schema order.
pub fn deserialize_record(data: &[u8], schema: &Schema) -> Result<Record, StoreError> {
    let mut record = Record::new();
    let mut offset = 0;
    for field in schema.fields() {
        let bytes = data.get(offset..offset + field.size()).ok_or(StoreError::ShortRead)?;
        offset += field.size();
        record.insert(field.name().to_string(), decode_field(bytes, field)?);
    }
    Ok(record)
}

fn type_error(field: &FieldDef, value: &Value) -> StoreError {
    StoreError::TypeMismatch {
        field: field.name().to_string(),
        ftype: field.ftype(),
        value: value.to_string(),
    }
}

fn encode_field(image: &mut Vec<u8>, value: &Value, field: &FieldDef) -> Result<(), StoreError> {
    if value.is_null() {
        image.resize(image.len() + field.size(), 0);
        return Ok(());
    }

    match field.ftype() {
        FieldType::TinyInt => match value {
            Value::TinyInt(v) => image.extend_from_slice(&v.to_le_bytes()),
            _ => return Err(type_error(field, value)),
        },
        FieldType::SmallInt => match value {
            Value::SmallInt(v) => image.extend_from_slice(&v.to_le_bytes()),
            _ => return Err(type_error(field, value)),
        },
        FieldType::Integer => match value {
            Value::Int(v) => image.extend_from_slice(&v.to_le_bytes()),
            _ => return Err(type_error(field, value)),
        },
        FieldType::BigInt => match value {
            Value::BigInt(v) => image.extend_from_slice(&v.to_le_bytes()),
            _ => return Err(type_error(field, value)),
        },
        FieldType::Float => match value {
            Value::Float(v) => image.extend_from_slice(&v.to_le_bytes()),
            _ => return Err(type_error(field, value)),
        },
        FieldType::Decimal | FieldType::Double => match value {
            Value::Double(v) => image.extend_from_slice(&v.to_le_bytes()),
            _ => return Err(type_error(field, value)),
        },
        FieldType::Boolean => match value {
            Value::Bool(v) => image.push(*v as u8),
            _ => return Err(type_error(field, value)),
        },
        FieldType::Char | FieldType::VarChar | FieldType::Text | FieldType::Date | FieldType::DateTime => {
            match value {
                Value::Text(v) => encode_string(image, v, field.size()),
                _ => return Err(type_error(field, value)),
            }
        }
    }
    Ok(())
}

/// Emit a string as raw UTF-8, truncated from the right if longer than the
/// field and right-padded with ASCII spaces if shorter.
fn encode_string(image: &mut Vec<u8>, value: &str, size: usize) {
    let bytes = value.as_bytes();
    if bytes.len() >= size {
        image.extend_from_slice(&bytes[..size]);
    }
    else {
        image.extend_from_slice(bytes);
        image.resize(image.len() - bytes.len() + size, b' ');
    }
}

fn decode_field(bytes: &[u8], field: &FieldDef) -> Result<Value, StoreError> {
    let value = match field.ftype() {
        FieldType::TinyInt => Value::TinyInt(i8::from_le_bytes(fixed(bytes)?)),
        FieldType::SmallInt => Value::SmallInt(i16::from_le_bytes(fixed(bytes)?)),
        FieldType::Integer => Value::Int(i32::from_le_bytes(fixed(bytes)?)),
        FieldType::BigInt => Value::BigInt(i64::from_le_bytes(fixed(bytes)?)),
        FieldType::Float => Value::Float(f32::from_le_bytes(fixed(bytes)?)),
        FieldType::Decimal | FieldType::Double => Value::Double(f64::from_le_bytes(fixed(bytes)?)),
        FieldType::Boolean => Value::Bool(bytes.first().copied().unwrap_or(0) != 0),
        FieldType::Char | FieldType::VarChar | FieldType::Text | FieldType::Date | FieldType::DateTime => {
            decode_string(bytes)
        }
    };
    Ok(value)
}

fn fixed<const N: usize>(bytes: &[u8]) -> Result<[u8; N], StoreError> {
    bytes.try_into().map_err(|_| StoreError::ShortRead)
}

/// An all-zero image denotes NULL; anything else decodes as UTF-8 with
/// trailing whitespace stripped.
fn decode_string(bytes: &[u8]) -> Value {
    if bytes.iter().all(|b| *b == 0) {
        return Value::Null;
    }
    let text = String::from_utf8_lossy(bytes);
    Value::Text(text.trim_end().to_string())
}
