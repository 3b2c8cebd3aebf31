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

//! The `validator` module checks raw string-valued rows against a schema and
//! converts them into typed [`Record`]s. Values are gated by a per-type
//! pattern, integer types are range-checked against their declared widths,
//! and overlong strings are truncated to the field's on-disk size.

use std::collections::HashMap;

use regex::Regex;

use crate::record::{Record, Value};
use crate::schema::{FieldDef, FieldType, Schema};
use crate::StoreError;

/// A raw input row: normalized lower-case field names mapped to trimmed
/// string values.
pub type Row = HashMap<String, String>;

/// Validates raw rows against a schema. The per-type patterns are compiled
/// once at construction.
pub struct RowValidator {
    integer_re: Regex,
    decimal_re: Regex,
    date_re: Regex,
    datetime_re: Regex,
    boolean_re: Regex,
}

impl Default for RowValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl RowValidator {
    pub fn new() -> RowValidator {
        RowValidator {
            integer_re: Regex::new(r"^-?\d+$").expect("Invalid regex"),
            decimal_re: Regex::new(r"^-?\d+(\.\d+)?$").expect("Invalid regex"),
            date_re: Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("Invalid regex"),
            datetime_re: Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}$").expect("Invalid regex"),
            boolean_re: Regex::new(r"(?i)^(true|false|1|0|yes|no)$").expect("Invalid regex"),
        }
    }

    /// Validate one raw row against the schema, producing a typed record.
    ///
    /// A missing or empty value is NULL; NULL in a non-nullable field fails
    /// with [`StoreError::NullViolation`]. Values failing their type pattern
    /// fail with [`StoreError::TypeMismatch`]; integers outside their
    /// declared width fail with [`StoreError::OutOfRange`].
    pub fn validate_row(&self, row: &Row, schema: &Schema) -> Result<Record, StoreError> {
        let mut record = Record::new();

        for field in schema.fields() {
            let raw = row.get(&field.name().to_lowercase()).map(|s| s.trim());
            match raw {
                None | Some("") => {
                    if !field.nullable() {
                        return Err(StoreError::NullViolation {
                            field: field.name().to_string(),
                        });
                    }
                    record.insert(field.name().to_string(), Value::Null);
                }
                Some(raw) => {
                    let value = self.convert_value(raw, field)?;
                    record.insert(field.name().to_string(), value);
                }
            }
        }

        Ok(record)
    }

    fn pattern_for(&self, ftype: FieldType) -> Option<&Regex> {
        match ftype {
            ftype if ftype.is_integer_family() => Some(&self.integer_re),
            ftype if ftype.is_decimal_family() => Some(&self.decimal_re),
            FieldType::Date => Some(&self.date_re),
            FieldType::DateTime => Some(&self.datetime_re),
            FieldType::Boolean => Some(&self.boolean_re),
            // CHAR/VARCHAR/TEXT accept anything.
            _ => None,
        }
    }

    fn convert_value(&self, raw: &str, field: &FieldDef) -> Result<Value, StoreError> {
        if let Some(pattern) = self.pattern_for(field.ftype()) {
            if !pattern.is_match(raw) {
                return Err(StoreError::TypeMismatch {
                    field: field.name().to_string(),
                    ftype: field.ftype(),
                    value: raw.to_string(),
                });
            }
        }

        match field.ftype() {
            FieldType::TinyInt | FieldType::SmallInt | FieldType::Integer | FieldType::BigInt => {
                self.convert_integer(raw, field)
            }
            FieldType::Float => Ok(Value::Float(raw.parse::<f32>().map_err(|_| {
                StoreError::TypeMismatch {
                    field: field.name().to_string(),
                    ftype: field.ftype(),
                    value: raw.to_string(),
                }
            })?)),
            FieldType::Decimal | FieldType::Double => Ok(Value::Double(raw.parse::<f64>().map_err(|_| {
                StoreError::TypeMismatch {
                    field: field.name().to_string(),
                    ftype: field.ftype(),
                    value: raw.to_string(),
                }
            })?)),
            FieldType::Boolean => Ok(Value::Bool(matches!(
                raw.to_lowercase().as_str(),
                "true" | "1" | "yes"
            ))),
            FieldType::Char | FieldType::VarChar | FieldType::Text => {
                Ok(Value::Text(truncate_to_bytes(raw, field.size()).to_string()))
            }
            // Dates are validated by pattern but stored as strings.
            FieldType::Date | FieldType::DateTime => {
                Ok(Value::Text(truncate_to_bytes(raw, field.size()).to_string()))
            }
        }
    }

    fn convert_integer(&self, raw: &str, field: &FieldDef) -> Result<Value, StoreError> {
        let out_of_range = || StoreError::OutOfRange {
            field: field.name().to_string(),
            ftype: field.ftype(),
            value: raw.to_string(),
        };

        // An overflowing literal fails the i64 parse even though it matched
        // the integer pattern.
        let parsed = raw.parse::<i64>().map_err(|_| out_of_range())?;

        match field.ftype() {
            FieldType::TinyInt => i8::try_from(parsed).map(Value::TinyInt).map_err(|_| out_of_range()),
            FieldType::SmallInt => i16::try_from(parsed).map(Value::SmallInt).map_err(|_| out_of_range()),
            FieldType::Integer => i32::try_from(parsed).map(Value::Int).map_err(|_| out_of_range()),
            _ => Ok(Value::BigInt(parsed)),
        }
    }
}

/// Truncate a string to at most `max` UTF-8 bytes, on a char boundary.
fn truncate_to_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
