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

    The RecordStore binds the disk, the sector manager, the record codec, the
    row validator and the primary-key index into the ingest and lookup
    pipelines:

        row (strings) -> validated typed row -> fixed-width bytes
                      -> fragment chain -> (sector, offset) in the index

    and the reverse on lookup. Per-row failures during ingest are reported
    and skipped; the batch continues.
*/

use std::fmt::Display;
use std::path::Path;

use crate::csv_loader;
use crate::disk::{Disk, DiskStatus};
use crate::geometry::{DiskGeometry, PhysicalLocation};
use crate::index::{IndexKey, RecordIndex};
use crate::record::{deserialize_record, serialize_record, Record, Value};
use crate::schema::{FieldType, Schema};
use crate::sector_manager::{RecordAddress, SectorManager};
use crate::validator::{Row, RowValidator};
use crate::StoreError;

/// One rejected row from an ingest batch.
#[derive(Debug)]
pub struct RowFailure {
    /// 1-based ordinal of the row in the batch.
    pub row: usize,
    /// The offending field, when the error names one.
    pub field: Option<String>,
    pub error: StoreError,
}

impl Display for RowFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.field {
            Some(field) => write!(f, "row {}: [{}] {}", self.row, field, self.error),
            None => write!(f, "row {}: {}", self.row, self.error),
        }
    }
}

/// Summary of an ingest batch.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub accepted: usize,
    pub rejected: usize,
    pub failures: Vec<RowFailure>,
}

impl Display for IngestReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "accepted {}, rejected {}", self.accepted, self.rejected)
    }
}

/// A successful lookup: the typed record plus where it physically lives.
#[derive(Debug)]
pub struct RecordHit {
    pub record: Record,
    pub address: RecordAddress,
    pub location: PhysicalLocation,
}

/// The coordinating store: owns the disk (through the sector manager), the
/// loaded schema, the row validator and the primary-key index.
pub struct RecordStore {
    manager: SectorManager,
    schema: Option<Schema>,
    validator: RowValidator,
    index: RecordIndex,
}

impl RecordStore {
    /// Create a store over a disk image at `path`, initializing the image if
    /// it does not exist yet.
    pub fn create(geometry: DiskGeometry, path: impl AsRef<Path>) -> Result<RecordStore, StoreError> {
        let disk = Disk::open(geometry, path)?;
        Ok(RecordStore {
            manager: SectorManager::new(disk),
            schema: None,
            validator: RowValidator::new(),
            index: RecordIndex::new(),
        })
    }

    /// Load a table schema. Any previously indexed records are forgotten;
    /// the index always describes the current table.
    pub fn load_schema(&mut self, schema: Schema) -> Result<(), StoreError> {
        let pk = schema.primary_key_field();
        if !(pk.ftype().is_integer_family() || pk.ftype().is_decimal_family() || pk.ftype().is_string_family()) {
            return Err(StoreError::KeyTypeError {
                field: pk.name().to_string(),
                ftype: pk.ftype(),
            });
        }

        log::debug!("load_schema(): Loaded schema {}", schema);
        self.schema = Some(schema);
        self.index = RecordIndex::new();
        Ok(())
    }

    /// Parse and load a schema from CREATE TABLE text.
    pub fn load_schema_ddl(&mut self, ddl: &str) -> Result<(), StoreError> {
        self.load_schema(Schema::parse(ddl)?)
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    pub fn index(&self) -> &RecordIndex {
        &self.index
    }

    /// Ingest a batch of raw rows: validate, serialize, write the fragment
    /// chain, and index each row by its primary key. A failing row is
    /// reported and skipped; the batch continues. Only a header/schema
    /// mismatch aborts the whole batch.
    pub fn ingest_rows(&mut self, rows: &[Row]) -> Result<IngestReport, StoreError> {
        let schema = self.schema.as_ref().ok_or(StoreError::NoSchema)?;
        csv_loader::validate_structure(rows, schema)?;

        let mut report = IngestReport::default();

        for (ordinal, row) in rows.iter().enumerate() {
            let ordinal = ordinal + 1;
            match self.ingest_row(row) {
                Ok(_) => report.accepted += 1,
                Err(error) => {
                    log::warn!("ingest_rows(): Rejecting row {}: {}", ordinal, error);
                    report.rejected += 1;
                    report.failures.push(RowFailure {
                        row: ordinal,
                        field: error.field().map(str::to_string),
                        error,
                    });
                }
            }
        }

        log::debug!("ingest_rows(): Batch complete: {}", report);
        Ok(report)
    }

    /// Load rows from a delimited file and ingest them.
    pub fn ingest_file(&mut self, path: impl AsRef<Path>) -> Result<IngestReport, StoreError> {
        let rows = csv_loader::load_rows(path)?;
        self.ingest_rows(&rows)
    }

    fn ingest_row(&mut self, row: &Row) -> Result<RecordAddress, StoreError> {
        let schema = self.schema.as_ref().ok_or(StoreError::NoSchema)?;

        let record = self.validator.validate_row(row, schema)?;
        let key = Self::primary_key_of(&record, schema)?;
        let image = serialize_record(&record, schema)?;

        let addr = self.manager.write_record(&image)?;
        self.index.insert(key, addr);
        Ok(addr)
    }

    fn primary_key_of(record: &Record, schema: &Schema) -> Result<IndexKey, StoreError> {
        let pk = schema.primary_key_field();
        match record.get(pk.name()) {
            None | Some(Value::Null) => Err(StoreError::NullViolation {
                field: pk.name().to_string(),
            }),
            Some(value) => IndexKey::try_from(value),
        }
    }

    /// Parse a raw search term into an [`IndexKey`] according to the loaded
    /// schema's primary-key type.
    pub fn parse_key(&self, raw: &str) -> Result<IndexKey, StoreError> {
        let schema = self.schema.as_ref().ok_or(StoreError::NoSchema)?;
        let pk = schema.primary_key_field();
        let raw = raw.trim();

        let mismatch = || StoreError::TypeMismatch {
            field: pk.name().to_string(),
            ftype: pk.ftype(),
            value: raw.to_string(),
        };

        match pk.ftype() {
            ftype if ftype.is_integer_family() => raw.parse::<i64>().map(IndexKey::Int).map_err(|_| mismatch()),
            ftype if ftype.is_decimal_family() => raw.parse::<f64>().map(IndexKey::Dec).map_err(|_| mismatch()),
            FieldType::Boolean => Err(StoreError::KeyTypeError {
                field: pk.name().to_string(),
                ftype: pk.ftype(),
            }),
            _ => Ok(IndexKey::Str(raw.to_string())),
        }
    }

    /// Look up a record by primary key. Returns the typed record along with
    /// its chain address and physical coordinates, or None when the key is
    /// absent.
    pub fn lookup(&mut self, key: &IndexKey) -> Result<Option<RecordHit>, StoreError> {
        let schema = self.schema.as_ref().ok_or(StoreError::NoSchema)?;

        let addr = match self.index.search(key) {
            Some(addr) => addr,
            None => return Ok(None),
        };

        let image = self.manager.read_record(addr)?;
        let record = deserialize_record(&image, schema)?;
        let location = self
            .manager
            .disk()
            .geometry()
            .physical_location(addr.sector as usize)?;

        Ok(Some(RecordHit {
            record,
            address: addr,
            location,
        }))
    }

    /// Reclaim the record stored under `key`, zeroing its fragment chain and
    /// dropping the key from the index. Returns false when the key is absent.
    pub fn free(&mut self, key: &IndexKey) -> Result<bool, StoreError> {
        let addr = match self.index.search(key) {
            Some(addr) => addr,
            None => return Ok(false),
        };

        self.manager.free_record(addr)?;
        self.index.remove(key);
        log::debug!("free(): Reclaimed record {} at {}", key, addr);
        Ok(true)
    }

    /// Produce the disk status report.
    pub fn status(&self) -> DiskStatus {
        self.manager.disk().status()
    }
}
