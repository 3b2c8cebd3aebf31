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

    tests/fragmentation.rs

    End-to-end coverage of the fragment chain format: single-fragment
    writes, allocator placement, multi-sector chains and reclamation.
*/

mod common;

use common::*;
use platterdb::{Disk, DiskGeometry, RecordAddress, SectorManager, StoreError, FRAGMENT_HEADER_SIZE};
use tempfile::TempDir;

fn manager(dir: &TempDir, platters: usize, tracks: usize, sectors: usize, sector_size: usize) -> SectorManager {
    let geom = DiskGeometry::new(platters, tracks, sectors, sector_size).unwrap();
    let disk = Disk::open(geom, dir.path().join("disk.bin")).unwrap();
    SectorManager::new(disk)
}

#[test]
fn single_fragment_record_is_bit_exact() {
    init();
    let dir = TempDir::new().unwrap();
    let mut mgr = manager(&dir, 1, 1, 4, 70);

    let payload = b"ABCDEFGHIJ1234567890abcdefghij";
    let addr = mgr.write_record(payload).unwrap();
    assert_eq!(addr, RecordAddress { sector: 0, offset: 0 });

    // Header (30, 0xFFFF, 0xFFFF) little-endian, then the payload verbatim.
    let image = std::fs::read(mgr.disk().path()).unwrap();
    assert_eq!(&image[0..6], &[30, 0, 0xFF, 0xFF, 0xFF, 0xFF]);
    assert_eq!(&image[6..36], payload);

    assert_eq!(mgr.read_record(addr).unwrap(), payload);
}

#[test]
fn second_record_moves_to_a_sector_that_fits_it_whole() {
    init();
    let dir = TempDir::new().unwrap();
    let mut mgr = manager(&dir, 1, 1, 4, 70);

    let first_payload = [0x11u8; 30];
    let second_payload = [0x22u8; 30];
    let first = mgr.write_record(&first_payload).unwrap();
    assert_eq!(first, RecordAddress { sector: 0, offset: 0 });

    // Sector 0's free cursor is 36, and 36 + 6 + 30 > 70, so the second
    // record lands whole at the start of sector 1.
    let second = mgr.write_record(&second_payload).unwrap();
    assert_eq!(second, RecordAddress { sector: 1, offset: 0 });

    assert_eq!(mgr.read_record(first).unwrap(), first_payload);
    assert_eq!(mgr.read_record(second).unwrap(), second_payload);
}

#[test]
fn chain_spans_sectors_and_runs_out_of_space() {
    init();
    let dir = TempDir::new().unwrap();
    // Two 20-byte sectors (one platter, one track, one sector per surface).
    let mut mgr = manager(&dir, 1, 1, 1, 20);

    let result = mgr.write_record(&[0x33u8; 30]);
    assert!(matches!(result, Err(StoreError::OutOfSpace)));

    // Fragments 1 and 2 remain as garbage: 14 payload bytes in each sector.
    let image = std::fs::read(mgr.disk().path()).unwrap();
    // Fragment 1 chains to (1, 0).
    assert_eq!(&image[0..6], &[14, 0, 1, 0, 0, 0]);
    assert_eq!(&image[6..20], &[0x33u8; 14]);
    // Fragment 2 still carries its placeholder next pointer; it was never
    // backpatched because the chain could not be completed.
    assert_eq!(&image[20..26], &[14, 0, 0, 0, 0, 0]);
    assert_eq!(&image[26..40], &[0x33u8; 14]);
}

#[test]
fn fragments_never_cross_sector_boundaries() {
    init();
    let dir = TempDir::new().unwrap();
    let mut mgr = manager(&dir, 1, 2, 2, 32);

    // Payloads sized to force fragmentation at awkward offsets.
    for len in [10, 40, 7, 26, 13] {
        let payload = vec![0xA5u8; len];
        let _ = mgr.write_record(&payload);
    }

    let sector_size = mgr.disk().sector_size();
    let image = std::fs::read(mgr.disk().path()).unwrap();
    for sector in 0..mgr.disk().total_sectors() {
        let data = &image[sector * sector_size..(sector + 1) * sector_size];
        let mut offset = 0;
        while offset + FRAGMENT_HEADER_SIZE <= sector_size {
            let window = &data[offset..offset + FRAGMENT_HEADER_SIZE];
            if window.iter().all(|b| *b == 0) {
                break;
            }
            let size = u16::from_le_bytes([window[0], window[1]]) as usize;
            offset += FRAGMENT_HEADER_SIZE + size;
            assert!(
                offset <= sector_size,
                "fragment crosses the boundary of sector {}",
                sector
            );
        }
    }
}

#[test]
fn long_chain_round_trips() {
    init();
    let dir = TempDir::new().unwrap();
    let mut mgr = manager(&dir, 1, 2, 4, 32);

    // 150 bytes over 32-byte sectors: a six-fragment chain.
    let payload: Vec<u8> = (0..150u16).map(|i| (i % 251) as u8).collect();
    let addr = mgr.write_record(&payload).unwrap();
    assert_eq!(mgr.read_record(addr).unwrap(), payload);
}

#[test]
fn freeing_a_chain_releases_space_for_reuse() {
    init();
    let dir = TempDir::new().unwrap();
    let mut mgr = manager(&dir, 1, 1, 1, 20);

    let addr = mgr.write_record(&[0x44u8; 28]).unwrap();
    assert_eq!(mgr.disk().status().used_sectors, 2);

    mgr.free_record(addr).unwrap();
    assert_eq!(mgr.disk().status().used_sectors, 0);

    // The same write fits again from the top.
    let addr = mgr.write_record(&[0x55u8; 28]).unwrap();
    assert_eq!(addr, RecordAddress { sector: 0, offset: 0 });
    assert_eq!(mgr.read_record(addr).unwrap(), [0x55u8; 28]);
}
