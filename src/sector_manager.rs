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

    The SectorManager performs in-sector allocation and writes records as
    chains of fragments. Each fragment is a 6-byte little-endian header
    (u16 payload size, u16 next sector, u16 next offset) followed by the
    payload; 0xFFFF in both next fields marks the end of a chain, and a
    6-byte all-zero window marks the first free slot of a sector.

    Writers place a fragment header with a (0, 0) placeholder in its next
    fields, write the payload, and only then backpatch the previous header.
    Chain walkers therefore never observe a placeholder once write_record
    has returned.
*/

use std::fmt::Display;
use std::io::Cursor;

use binrw::{binrw, BinRead, BinWrite};

use crate::disk::Disk;
use crate::StoreError;

/// Size of the on-disk fragment header, in bytes.
pub const FRAGMENT_HEADER_SIZE: usize = 6;

/// Sentinel value marking the end of a fragment chain when present in both
/// `next_sector` and `next_offset`.
pub const FRAGMENT_END: u16 = 0xFFFF;

/// The physical address of a record: the sector and in-sector offset of its
/// first fragment.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct RecordAddress {
    pub sector: u16,
    pub offset: u16,
}

impl From<(u16, u16)> for RecordAddress {
    fn from((sector, offset): (u16, u16)) -> Self {
        Self { sector, offset }
    }
}

impl Display for RecordAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[sector:{} offset:{}]", self.sector, self.offset)
    }
}

/// The 6-byte header preceding every fragment payload.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[binrw]
#[brw(little)]
pub struct FragmentHeader {
    pub size: u16,
    pub next_sector: u16,
    pub next_offset: u16,
}

impl FragmentHeader {
    pub fn end_of_chain(&self) -> bool {
        self.next_sector == FRAGMENT_END && self.next_offset == FRAGMENT_END
    }

    /// A 6-byte all-zero window denotes free space rather than a header.
    pub fn is_free_window(bytes: &[u8]) -> bool {
        bytes.len() >= FRAGMENT_HEADER_SIZE && bytes[..FRAGMENT_HEADER_SIZE].iter().all(|b| *b == 0)
    }

    fn to_bytes(self) -> Result<Vec<u8>, StoreError> {
        let mut cursor = Cursor::new(Vec::with_capacity(FRAGMENT_HEADER_SIZE));
        self.write(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    fn from_bytes(bytes: &[u8]) -> Result<FragmentHeader, StoreError> {
        Ok(FragmentHeader::read(&mut Cursor::new(bytes))?)
    }
}

/// Manages in-sector allocation, fragmented record writes, chained reads and
/// reclamation. The SectorManager owns the [`Disk`]; all byte traffic to the
/// backing file routes through here.
pub struct SectorManager {
    disk: Disk,
    // Cached free cursor per sector. The authoritative test for free space is
    // the in-sector header scan; the cache only avoids rescanning sectors
    // whose cursor is already known. None = unknown, rescan.
    cursors: Vec<Option<usize>>,
}

impl SectorManager {
    pub fn new(disk: Disk) -> SectorManager {
        let cursors = vec![None; disk.total_sectors()];
        SectorManager { disk, cursors }
    }

    pub fn disk(&self) -> &Disk {
        &self.disk
    }

    pub fn disk_mut(&mut self) -> &mut Disk {
        &mut self.disk
    }

    /// Find the free cursor of a sector: the offset of the first 6-byte
    /// all-zero window, found by walking fragment headers from offset 0.
    /// A full sector yields its sector size.
    pub fn free_cursor(&mut self, sector: usize) -> Result<usize, StoreError> {
        if let Some(cursor) = self.cursors.get(sector).copied().flatten() {
            return Ok(cursor);
        }

        let sector_size = self.disk.sector_size();
        let data = self.disk.read_sector(sector)?;
        let mut offset = 0;
        while offset + FRAGMENT_HEADER_SIZE <= data.len() {
            let window = &data[offset..offset + FRAGMENT_HEADER_SIZE];
            if FragmentHeader::is_free_window(window) {
                break;
            }
            let header = FragmentHeader::from_bytes(window)?;
            offset += FRAGMENT_HEADER_SIZE + header.size as usize;
        }

        let cursor = std::cmp::min(offset, sector_size);
        self.cursors[sector] = Some(cursor);
        Ok(cursor)
    }

    /// Find space for the next fragment of a record with `needed` bytes
    /// remaining. A sector that can hold the whole remainder is preferred
    /// over any partial fit; ties break to the lowest-numbered sector.
    /// Returns `(sector, offset, remaining_bytes_in_sector)`.
    fn find_free_space(&mut self, needed: usize) -> Result<Option<(usize, usize, usize)>, StoreError> {
        let sector_size = self.disk.sector_size();
        let mut partial: Option<(usize, usize, usize)> = None;

        for sector in 0..self.disk.total_sectors() {
            let cursor = self.free_cursor(sector)?;
            let remaining = sector_size.saturating_sub(cursor);
            if remaining >= FRAGMENT_HEADER_SIZE + needed {
                return Ok(Some((sector, cursor, remaining)));
            }
            if remaining > FRAGMENT_HEADER_SIZE && partial.is_none() {
                partial = Some((sector, cursor, remaining));
            }
        }

        Ok(partial)
    }

    /// Write a record as a chain of fragments and return the address of the
    /// first fragment.
    ///
    /// On `OutOfSpace` mid-chain, fragments already placed are left behind as
    /// garbage; there is no rollback.
    pub fn write_record(&mut self, data: &[u8]) -> Result<RecordAddress, StoreError> {
        if data.is_empty() {
            return Err(StoreError::ParameterError("cannot write an empty record".to_string()));
        }

        let total = data.len();
        let mut written = 0;
        let mut first: Option<RecordAddress> = None;
        let mut prev: Option<(RecordAddress, u16)> = None;

        while written < total {
            let (sector, offset, remaining) = self
                .find_free_space(total - written)?
                .ok_or(StoreError::OutOfSpace)?;

            let max_payload = remaining - FRAGMENT_HEADER_SIZE;
            let payload_len = std::cmp::min(total - written, max_payload);
            let completes = written + payload_len >= total;

            // The (0, 0) placeholder is never observed by a chain walker: the
            // previous header is only backpatched after this fragment is in
            // place, and the chain is only published once write_record returns.
            let header = FragmentHeader {
                size: payload_len as u16,
                next_sector: if completes { FRAGMENT_END } else { 0 },
                next_offset: if completes { FRAGMENT_END } else { 0 },
            };

            let mut fragment = header.to_bytes()?;
            fragment.extend_from_slice(&data[written..written + payload_len]);
            self.disk.write_at(sector, offset, &fragment)?;

            log::trace!(
                "write_record(): Placed fragment of {} bytes at sector {} offset {}",
                payload_len,
                sector,
                offset
            );

            self.cursors[sector] = Some(offset + FRAGMENT_HEADER_SIZE + payload_len);
            self.disk.set_sector_used(sector, true);
            self.disk.save_sector_map()?;

            let addr = RecordAddress {
                sector: sector as u16,
                offset: offset as u16,
            };

            if let Some((prev_addr, prev_size)) = prev {
                let patched = FragmentHeader {
                    size: prev_size,
                    next_sector: addr.sector,
                    next_offset: addr.offset,
                };
                self.disk
                    .write_at(prev_addr.sector as usize, prev_addr.offset as usize, &patched.to_bytes()?)?;
            }

            if first.is_none() {
                first = Some(addr);
            }
            prev = Some((addr, payload_len as u16));
            written += payload_len;
        }

        first.ok_or_else(|| StoreError::ParameterError("cannot write an empty record".to_string()))
    }

    /// Read a record's payload by walking its fragment chain from `addr`.
    /// A truncated header terminates the walk gracefully, returning whatever
    /// payload was collected.
    pub fn read_record(&mut self, addr: RecordAddress) -> Result<Vec<u8>, StoreError> {
        let mut result = Vec::new();
        let mut sector = addr.sector as usize;
        let mut offset = addr.offset as usize;

        // A well-formed chain visits each sector at most once.
        let mut fragments = 0;
        let max_fragments = self.disk.total_sectors();

        loop {
            let mut header_buf = [0u8; FRAGMENT_HEADER_SIZE];
            let n = self.disk.read_at(sector, offset, &mut header_buf)?;
            if n < FRAGMENT_HEADER_SIZE {
                break;
            }
            let header = FragmentHeader::from_bytes(&header_buf)?;
            if header.size == 0 {
                break;
            }

            let mut payload = vec![0u8; header.size as usize];
            let n = self.disk.read_at(sector, offset + FRAGMENT_HEADER_SIZE, &mut payload)?;
            payload.truncate(n);
            result.extend_from_slice(&payload);

            if header.end_of_chain() {
                break;
            }

            fragments += 1;
            if fragments > max_fragments {
                log::warn!("read_record(): Chain from {} exceeds sector count; stopping", addr);
                break;
            }

            sector = header.next_sector as usize;
            offset = header.next_offset as usize;
        }

        Ok(result)
    }

    /// Reclaim a record's chain: zero each fragment's header and payload and
    /// mark fully-reclaimed sectors free again. The occupancy map is
    /// persisted once after the traversal.
    pub fn free_record(&mut self, addr: RecordAddress) -> Result<(), StoreError> {
        let mut sector = addr.sector as usize;
        let mut offset = addr.offset as usize;
        let mut visited: Vec<usize> = Vec::new();

        let mut fragments = 0;
        let max_fragments = self.disk.total_sectors();

        loop {
            let mut header_buf = [0u8; FRAGMENT_HEADER_SIZE];
            let n = self.disk.read_at(sector, offset, &mut header_buf)?;
            if n < FRAGMENT_HEADER_SIZE {
                break;
            }
            let header = FragmentHeader::from_bytes(&header_buf)?;
            if header.size == 0 {
                break;
            }

            let zeroes = vec![0u8; FRAGMENT_HEADER_SIZE + header.size as usize];
            self.disk.write_at(sector, offset, &zeroes)?;
            self.cursors[sector] = None;
            if !visited.contains(&sector) {
                visited.push(sector);
            }

            if header.end_of_chain() {
                break;
            }

            fragments += 1;
            if fragments > max_fragments {
                log::warn!("free_record(): Chain from {} exceeds sector count; stopping", addr);
                break;
            }

            sector = header.next_sector as usize;
            offset = header.next_offset as usize;
        }

        // A sector only goes back to free once every fragment in it has been
        // reclaimed, i.e. its bytes are all zero again.
        for sector in visited {
            let data = self.disk.read_sector(sector)?;
            if data.iter().all(|b| *b == 0) {
                self.disk.set_sector_used(sector, false);
            }
        }
        self.disk.save_sector_map()?;

        Ok(())
    }
}
