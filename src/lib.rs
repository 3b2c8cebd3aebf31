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

//! # platterdb
//!
//! platterdb is a Rust library that simulates a rotating magnetic disk and
//! layers a fixed-width record store with a balanced primary-key index on top
//! of it.
//!
//! It is primarily designed for teaching how database storage engines map
//! table rows onto physical media: a table schema (a small CREATE TABLE
//! subset) drives a fixed-width binary record codec, records are written into
//! simulated sectors as chains of fragments, and an in-memory AVL index maps
//! each primary-key value to the physical address of the first fragment.
//!
//! The main interface to platterdb is a [`RecordStore`] object, which owns the
//! backing disk image, the sector manager, the loaded [`Schema`] and the
//! [`RecordIndex`], and exposes the ingest, lookup, free and status
//! operations.
//!
//! A disk is described by a [`DiskGeometry`] (platters, tracks per surface,
//! sectors per track, sector size). Every platter carries two surfaces; the
//! logical sector numbering iterates sectors within a track, tracks within a
//! surface, surfaces within a platter, then platters.

pub mod csv_loader;
pub mod disk;
pub mod geometry;
pub mod index;
pub mod record;
pub mod schema;
pub mod sector_manager;
pub mod store;
pub mod validator;

use thiserror::Error;

/// Every platter carries exactly two recording surfaces.
pub const SURFACES_PER_PLATTER: usize = 2;

/// The largest sector size supported by the fragment chain format. Fragment
/// headers address bytes within a sector with a u16 offset.
pub const MAXIMUM_SECTOR_SIZE: usize = 0xFFFF;

/// The largest sector count supported by the fragment chain format. Fragment
/// headers address sectors with a u16, and 0xFFFF is reserved as the
/// end-of-chain sentinel.
pub const MAXIMUM_SECTOR_COUNT: usize = 0xFFFF;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("An IO error occurred reading or writing the backing disk file")]
    IoError(String),
    #[error("An invalid parameter was supplied: {0}")]
    ParameterError(String),
    #[error("Sector {0} is out of range for the disk geometry")]
    SectorOutOfRange(usize),
    #[error("No sector has enough free space for the next fragment")]
    OutOfSpace,
    #[error("A fragment header was truncated")]
    ShortRead,
    #[error("Field '{field}' cannot be NULL")]
    NullViolation { field: String },
    #[error("Value '{value}' in field '{field}' does not match the pattern for type {ftype}")]
    TypeMismatch {
        field: String,
        ftype: schema::FieldType,
        value: String,
    },
    #[error("Value '{value}' in field '{field}' is out of range for type {ftype}")]
    OutOfRange {
        field: String,
        ftype: schema::FieldType,
        value: String,
    },
    #[error("The input does not match the table schema: {0}")]
    SchemaMismatch(String),
    #[error("The schema definition could not be parsed: {0}")]
    SchemaParseError(String),
    #[error("No schema has been loaded")]
    NoSchema,
    #[error("Field '{field}' of type {ftype} cannot be used as an index key")]
    KeyTypeError {
        field: String,
        ftype: schema::FieldType,
    },
}

impl StoreError {
    /// Return the name of the offending field for per-row validation errors,
    /// if the error carries one.
    pub fn field(&self) -> Option<&str> {
        match self {
            StoreError::NullViolation { field } => Some(field),
            StoreError::TypeMismatch { field, .. } => Some(field),
            StoreError::OutOfRange { field, .. } => Some(field),
            StoreError::KeyTypeError { field, .. } => Some(field),
            _ => None,
        }
    }
}

// Manually implement `From<io::Error>` for `StoreError`
impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::IoError(err.to_string())
    }
}

// Manually implement `From<binrw::Error>` for `StoreError`
impl From<binrw::Error> for StoreError {
    fn from(err: binrw::Error) -> Self {
        StoreError::IoError(err.to_string())
    }
}

pub use crate::disk::{Disk, DiskStatus};
pub use crate::geometry::{DiskGeometry, PhysicalLocation};
pub use crate::index::{IndexKey, RecordIndex};
pub use crate::record::{Record, Value};
pub use crate::schema::{FieldDef, FieldType, Schema};
pub use crate::sector_manager::{RecordAddress, SectorManager, FRAGMENT_END, FRAGMENT_HEADER_SIZE};
pub use crate::store::{IngestReport, RecordHit, RecordStore, RowFailure};
pub use crate::validator::{Row, RowValidator};
