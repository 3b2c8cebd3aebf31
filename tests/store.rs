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

    tests/store.rs

    End-to-end coverage of the ingest/lookup pipeline over the PRODUCTO
    table from the schema reader down to the disk image bytes.
*/

mod common;

use common::*;
use platterdb::{DiskGeometry, IndexKey, RecordStore, StoreError, Value};
use std::io::Write;
use tempfile::TempDir;

fn producto_store(dir: &TempDir) -> RecordStore {
    let geom = DiskGeometry::new(1, 4, 8, 256).unwrap();
    let mut store = RecordStore::create(geom, dir.path().join("disk.bin")).unwrap();
    store.load_schema_ddl(PRODUCTO_DDL).unwrap();
    store
}

#[test]
fn ingest_and_lookup_a_product() {
    init();
    let dir = TempDir::new().unwrap();
    let mut store = producto_store(&dir);
    assert_eq!(store.schema().unwrap().record_size(), 68);

    let report = store
        .ingest_rows(&[producto_row("1", "Widget", "10.0", "1.5", "11.5")])
        .unwrap();
    assert_eq!(report.accepted, 1);

    let hit = store.lookup(&IndexKey::Int(1)).unwrap().unwrap();
    assert_eq!(hit.record["item"], Value::Text("Widget".to_string()));
    assert_eq!(hit.record["cost"], Value::Double(10.0));
    assert_eq!(hit.record["tax"], Value::Double(1.5));
    assert_eq!(hit.record["total"], Value::Double(11.5));

    // The first record starts at the first free slot of the first sector.
    assert_eq!((hit.address.sector, hit.address.offset), (0, 0));
    assert_eq!(
        (hit.location.platter, hit.location.surface, hit.location.track, hit.location.sector),
        (0, 0, 0, 0)
    );
}

#[test]
fn bad_row_is_rejected_and_the_batch_continues() {
    init();
    let dir = TempDir::new().unwrap();
    let mut store = producto_store(&dir);

    let report = store
        .ingest_rows(&[
            producto_row("1", "Widget", "10.0", "1.5", "11.5"),
            producto_row("2", "Broken", "abc", "1.0", "2.0"),
            producto_row("3", "Gadget", "5.0", "0.5", "5.5"),
        ])
        .unwrap();

    assert_eq!(report.accepted, 2);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].row, 2);
    assert_eq!(report.failures[0].field.as_deref(), Some("cost"));
    assert!(matches!(report.failures[0].error, StoreError::TypeMismatch { .. }));

    assert_eq!(store.index().len(), 2);
    assert!(store.lookup(&IndexKey::Int(2)).unwrap().is_none());
    assert!(store.lookup(&IndexKey::Int(3)).unwrap().is_some());
}

#[test]
fn identical_batches_produce_identical_disk_images() {
    init();
    let rows = [
        producto_row("10", "Widget", "10.0", "1.5", "11.5"),
        producto_row("20", "Gadget", "5.25", "0.75", "6.0"),
        producto_row("30", "Gizmo", "99.99", "9.99", "109.98"),
    ];

    let hash_of_run = || {
        let dir = TempDir::new().unwrap();
        let mut store = producto_store(&dir);
        store.ingest_rows(&rows).unwrap();
        compute_file_hash(dir.path().join("disk.bin"))
    };

    assert_eq!(hash_of_run(), hash_of_run());
}

#[test]
fn freed_record_disappears_and_space_is_reclaimed() {
    init();
    let dir = TempDir::new().unwrap();
    let mut store = producto_store(&dir);

    store
        .ingest_rows(&[
            producto_row("1", "Widget", "10.0", "1.5", "11.5"),
            producto_row("2", "Gadget", "5.0", "0.5", "5.5"),
        ])
        .unwrap();
    let used_before = store.status().used_sectors;

    assert!(store.free(&IndexKey::Int(1)).unwrap());
    assert!(store.lookup(&IndexKey::Int(1)).unwrap().is_none());
    assert_eq!(store.index().len(), 1);
    // Record 2 shares sector 0 with the freed record, so the sector stays
    // used until both are reclaimed.
    assert_eq!(store.status().used_sectors, used_before);

    assert!(store.free(&IndexKey::Int(2)).unwrap());
    assert_eq!(store.status().used_sectors, 0);
}

#[test]
fn lookup_reports_physical_coordinates_across_surfaces() {
    init();
    let dir = TempDir::new().unwrap();
    // 64-byte sectors force each 68-byte record to fragment across sectors.
    let geom = DiskGeometry::new(1, 1, 2, 64).unwrap();
    let mut store = RecordStore::create(geom, dir.path().join("disk.bin")).unwrap();
    store.load_schema_ddl(PRODUCTO_DDL).unwrap();

    let rows: Vec<_> = (1..=3)
        .map(|i| producto_row(&i.to_string(), "Item", "1.0", "0.1", "1.1"))
        .collect();
    let report = store.ingest_rows(&rows).unwrap();
    assert_eq!(report.accepted, 3);

    let hit = store.lookup(&IndexKey::Int(3)).unwrap().unwrap();
    // Sectors 0 and 1 are track 0 of surface 0; sector 2 starts surface 1.
    assert!(hit.address.sector >= 2);
    assert_eq!(hit.location.surface, 1);
}

#[test]
fn ingest_from_a_delimited_file() {
    init();
    let dir = TempDir::new().unwrap();
    let mut store = producto_store(&dir);

    let csv_path = dir.path().join("productos.csv");
    let mut file = std::fs::File::create(&csv_path).unwrap();
    writeln!(file, "Index;Item;Cost;Tax;Total").unwrap();
    writeln!(file, "1;'Widget';10.0;1.5;11.5").unwrap();
    writeln!(file, "2;\"Gadget; deluxe\";5.0;0.5;5.5").unwrap();
    drop(file);

    let report = store.ingest_file(&csv_path).unwrap();
    assert_eq!(report.accepted, 2);

    let hit = store.lookup(&IndexKey::Int(2)).unwrap().unwrap();
    assert_eq!(hit.record["item"], Value::Text("Gadget; deluxe".to_string()));
}

#[test]
fn missing_column_aborts_the_whole_batch() {
    init();
    let dir = TempDir::new().unwrap();
    let mut store = producto_store(&dir);

    let mut row = producto_row("1", "Widget", "10.0", "1.5", "11.5");
    row.remove("total");
    assert!(matches!(
        store.ingest_rows(&[row]),
        Err(StoreError::SchemaMismatch(_))
    ));
    assert_eq!(store.index().len(), 0);
}

#[test]
fn status_tracks_ingest() {
    init();
    let dir = TempDir::new().unwrap();
    let mut store = producto_store(&dir);

    let status = store.status();
    assert_eq!(status.total_sectors, 64);
    assert_eq!(status.used_sectors, 0);
    assert_eq!(status.total_capacity, 64 * 256);

    store
        .ingest_rows(&[producto_row("1", "Widget", "10.0", "1.5", "11.5")])
        .unwrap();
    let status = store.status();
    assert_eq!(status.used_sectors, 1);
    assert_eq!(status.free_sectors, 63);
    assert_eq!(status.used_space, 256);
}
