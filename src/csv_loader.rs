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

//! The `csv_loader` module reads delimited text files into raw rows for
//! ingestion. The delimiter is detected by counting candidates over the head
//! of the file, the first line is a header, and keys and values are trimmed
//! of surrounding whitespace and enclosing single or double quotes. Header
//! keys are normalized to lower case.

use std::path::Path;

use crate::schema::Schema;
use crate::validator::Row;
use crate::StoreError;

/// Delimiters considered during detection, in tie-break order.
const DELIMITER_CANDIDATES: [char; 4] = [',', ';', '\t', '|'];

/// Number of bytes sampled from the head of the file for delimiter detection.
const DETECT_SAMPLE_SIZE: usize = 1024;

/// Load rows from a delimited text file. The first line is the header; keys
/// are lower-cased. Rows shorter than the header are padded with empty
/// values, and cells beyond the header are dropped.
pub fn load_rows(path: impl AsRef<Path>) -> Result<Vec<Row>, StoreError> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let delimiter = detect_delimiter(&content);
    log::debug!(
        "load_rows(): Loading {} with delimiter {:?}",
        path.as_ref().display(),
        delimiter
    );

    let mut lines = content.lines().filter(|line| !line.trim().is_empty());
    let header: Vec<String> = match lines.next() {
        Some(line) => split_line(line, delimiter)
            .iter()
            .map(|key| clean(key).to_lowercase())
            .collect(),
        None => return Ok(Vec::new()),
    };

    let mut rows = Vec::new();
    for line in lines {
        let cells = split_line(line, delimiter);
        let mut row = Row::new();
        for (i, key) in header.iter().enumerate() {
            let value = cells.get(i).map(|cell| clean(cell)).unwrap_or_default();
            row.insert(key.clone(), value);
        }
        rows.push(row);
    }

    Ok(rows)
}

/// Pick the candidate delimiter occurring most often in the head of the
/// content. Ties break toward the earlier candidate.
pub fn detect_delimiter(content: &str) -> char {
    let sample = &content.as_bytes()[..content.len().min(DETECT_SAMPLE_SIZE)];
    let mut best = DELIMITER_CANDIDATES[0];
    let mut best_count = 0;
    for candidate in DELIMITER_CANDIDATES {
        let count = sample.iter().filter(|b| **b == candidate as u8).count();
        if count > best_count {
            best = candidate;
            best_count = count;
        }
    }
    best
}

/// Split a line on the delimiter, ignoring delimiters inside single- or
/// double-quoted runs.
fn split_line(line: &str, delimiter: char) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in line.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            None if ch == '"' || ch == '\'' => quote = Some(ch),
            None if ch == delimiter => {
                cells.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    cells.push(current);
    cells
}

/// Trim surrounding whitespace and one level of enclosing quotes.
fn clean(cell: &str) -> String {
    let trimmed = cell.trim();
    let trimmed = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| trimmed.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
        .unwrap_or(trimmed);
    trimmed.trim().to_string()
}

/// Check that the loaded rows carry every schema field. Missing fields fail
/// with [`StoreError::SchemaMismatch`]; extra columns are warned about and
/// ignored.
pub fn validate_structure(rows: &[Row], schema: &Schema) -> Result<(), StoreError> {
    let first = match rows.first() {
        Some(first) => first,
        None => return Ok(()),
    };

    let missing: Vec<&str> = schema
        .fields()
        .iter()
        .map(|f| f.name())
        .filter(|name| !first.contains_key(&name.to_lowercase()))
        .collect();
    if !missing.is_empty() {
        return Err(StoreError::SchemaMismatch(format!(
            "missing fields in input: {}",
            missing.join(", ")
        )));
    }

    let extra: Vec<&str> = first
        .keys()
        .map(|key| key.as_str())
        .filter(|key| schema.field(key).is_none())
        .collect();
    if !extra.is_empty() {
        log::warn!(
            "validate_structure(): Ignoring extra columns not in schema: {}",
            extra.join(", ")
        );
    }

    Ok(())
}
