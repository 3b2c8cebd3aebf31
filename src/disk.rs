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

    The Disk owns the backing byte file of the simulated disk plus a sidecar
    occupancy bitmap. Every sector is sector_size bytes at file offset
    sector_num * sector_size. All readers and writers route through the
    SectorManager; the Disk only exposes byte-level access at sector
    coordinates.
*/

use std::ffi::OsString;
use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use binrw::{binrw, BinRead, BinWrite};
use bit_vec::BitVec;

use crate::geometry::DiskGeometry;
use crate::{StoreError, MAXIMUM_SECTOR_COUNT, MAXIMUM_SECTOR_SIZE, SURFACES_PER_PLATTER};

/// Chunk size used when zero-filling a fresh disk image.
const INIT_CHUNK_SIZE: usize = 64 * 1024;

/// On-disk format of the occupancy-map sidecar. The bitmap is stored packed,
/// most significant bit first, one bit per sector.
#[binrw]
#[brw(little, magic = b"PMAP")]
struct SectorMapFile {
    sector_count: u32,
    #[br(count = (sector_count as usize).div_ceil(8))]
    bits: Vec<u8>,
}

/// A simulated disk: a flat backing file of `total_capacity` bytes and an
/// occupancy map with one bit per sector.
pub struct Disk {
    geometry: DiskGeometry,
    path: PathBuf,
    file: File,
    sector_map: BitVec,
}

impl Disk {
    /// Open a simulated disk at `path`, creating and zero-filling it if it
    /// does not exist yet. The occupancy map is persisted to a `<path>.map`
    /// sidecar; when opening an existing image without a sidecar, all sectors
    /// are assumed free.
    pub fn open(geometry: DiskGeometry, path: impl AsRef<Path>) -> Result<Disk, StoreError> {
        let path = path.as_ref().to_path_buf();

        if geometry.total_sectors() > MAXIMUM_SECTOR_COUNT {
            return Err(StoreError::ParameterError(format!(
                "geometry {} addresses {} sectors; the chain format supports at most {}",
                geometry,
                geometry.total_sectors(),
                MAXIMUM_SECTOR_COUNT
            )));
        }
        if geometry.sector_size() > MAXIMUM_SECTOR_SIZE {
            return Err(StoreError::ParameterError(format!(
                "sector size {} exceeds the maximum of {}",
                geometry.sector_size(),
                MAXIMUM_SECTOR_SIZE
            )));
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let fresh = !path.exists();
        let mut file = OpenOptions::new().read(true).write(true).create(true).open(&path)?;

        if fresh {
            log::debug!(
                "open(): Initializing new disk image {} ({} bytes)",
                path.display(),
                geometry.total_capacity()
            );
            Self::zero_fill(&mut file, geometry.total_capacity())?;
            let disk = Disk {
                geometry,
                path,
                file,
                sector_map: BitVec::from_elem(geometry.total_sectors(), false),
            };
            disk.save_sector_map()?;
            Ok(disk)
        }
        else {
            let sector_map = Self::load_sector_map(&Self::sidecar_path(&path), geometry.total_sectors());
            Ok(Disk {
                geometry,
                path,
                file,
                sector_map,
            })
        }
    }

    fn zero_fill(file: &mut File, capacity: usize) -> Result<(), StoreError> {
        let chunk = vec![0u8; INIT_CHUNK_SIZE];
        let mut remaining = capacity;
        file.seek(SeekFrom::Start(0))?;
        while remaining > 0 {
            let n = std::cmp::min(remaining, chunk.len());
            file.write_all(&chunk[..n])?;
            remaining -= n;
        }
        file.flush()?;
        Ok(())
    }

    /// Return the path of the occupancy-map sidecar for a backing file.
    pub fn sidecar_path(path: &Path) -> PathBuf {
        let mut os: OsString = path.as_os_str().to_os_string();
        os.push(".map");
        PathBuf::from(os)
    }

    /// Persist the occupancy map to the sidecar file.
    pub fn save_sector_map(&self) -> Result<(), StoreError> {
        let map_file = SectorMapFile {
            sector_count: self.sector_map.len() as u32,
            bits: self.sector_map.to_bytes(),
        };
        let mut file = File::create(Self::sidecar_path(&self.path))?;
        map_file.write(&mut file)?;
        Ok(())
    }

    fn load_sector_map(sidecar: &Path, total_sectors: usize) -> BitVec {
        let mut file = match File::open(sidecar) {
            Ok(file) => file,
            Err(_) => {
                log::debug!(
                    "load_sector_map(): No sidecar at {}; assuming all sectors free",
                    sidecar.display()
                );
                return BitVec::from_elem(total_sectors, false);
            }
        };

        match SectorMapFile::read(&mut file) {
            Ok(map_file) if map_file.sector_count as usize == total_sectors => {
                let mut map = BitVec::from_bytes(&map_file.bits);
                map.truncate(total_sectors);
                map
            }
            Ok(map_file) => {
                log::warn!(
                    "load_sector_map(): Sidecar sector count {} does not match geometry ({}); rebuilding as all-free",
                    map_file.sector_count,
                    total_sectors
                );
                BitVec::from_elem(total_sectors, false)
            }
            Err(e) => {
                log::warn!("load_sector_map(): Could not parse sidecar: {}; rebuilding as all-free", e);
                BitVec::from_elem(total_sectors, false)
            }
        }
    }

    pub fn geometry(&self) -> &DiskGeometry {
        &self.geometry
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn total_sectors(&self) -> usize {
        self.geometry.total_sectors()
    }

    pub fn sector_size(&self) -> usize {
        self.geometry.sector_size()
    }

    /// Return the occupancy-map state for one sector.
    pub fn is_sector_used(&self, sector: usize) -> bool {
        self.sector_map.get(sector).unwrap_or(false)
    }

    /// Update the occupancy-map state for one sector. The change is not
    /// persisted until [`Disk::save_sector_map`] is called.
    pub fn set_sector_used(&mut self, sector: usize, used: bool) {
        if sector < self.sector_map.len() {
            self.sector_map.set(sector, used);
        }
    }

    /// First-fit scan for `n` consecutively-free sectors, per the occupancy
    /// map. Returns the run of sector numbers, or None.
    pub fn find_free_sectors(&self, n: usize) -> Option<Vec<usize>> {
        if n == 0 {
            return None;
        }
        let mut consecutive = 0;
        let mut start = 0;
        for sector in 0..self.total_sectors() {
            if !self.is_sector_used(sector) {
                if consecutive == 0 {
                    start = sector;
                }
                consecutive += 1;
                if consecutive >= n {
                    return Some((start..start + n).collect());
                }
            }
            else {
                consecutive = 0;
            }
        }
        None
    }

    /// Read up to `buf.len()` bytes starting at `(sector, offset)`. The read
    /// is clamped at the end of the backing file; the number of bytes read is
    /// returned so callers can detect a short read.
    pub fn read_at(&mut self, sector: usize, offset: usize, buf: &mut [u8]) -> Result<usize, StoreError> {
        if sector >= self.total_sectors() {
            return Err(StoreError::SectorOutOfRange(sector));
        }
        let pos = sector * self.sector_size() + offset;
        let capacity = self.geometry.total_capacity();
        if pos >= capacity {
            return Ok(0);
        }
        let n = std::cmp::min(buf.len(), capacity - pos);
        self.file.seek(SeekFrom::Start(pos as u64))?;
        self.file.read_exact(&mut buf[..n])?;
        Ok(n)
    }

    /// Read one whole sector.
    pub fn read_sector(&mut self, sector: usize) -> Result<Vec<u8>, StoreError> {
        let mut buf = vec![0u8; self.sector_size()];
        let n = self.read_at(sector, 0, &mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Write `data` starting at `(sector, offset)`. Writes past the end of
    /// the backing file are rejected.
    pub fn write_at(&mut self, sector: usize, offset: usize, data: &[u8]) -> Result<(), StoreError> {
        if sector >= self.total_sectors() {
            return Err(StoreError::SectorOutOfRange(sector));
        }
        let pos = sector * self.sector_size() + offset;
        if pos + data.len() > self.geometry.total_capacity() {
            return Err(StoreError::ParameterError(format!(
                "write of {} bytes at sector {} offset {} exceeds disk capacity",
                data.len(),
                sector,
                offset
            )));
        }
        self.file.seek(SeekFrom::Start(pos as u64))?;
        self.file.write_all(data)?;
        Ok(())
    }

    /// Produce the disk status report: sector counts and derived byte totals
    /// per the occupancy map, plus the geometry parameters.
    pub fn status(&self) -> DiskStatus {
        let used_sectors = self.sector_map.iter().filter(|used| *used).count();
        let free_sectors = self.total_sectors() - used_sectors;
        DiskStatus {
            total_sectors: self.total_sectors(),
            used_sectors,
            free_sectors,
            total_capacity: self.geometry.total_capacity(),
            used_space: used_sectors * self.sector_size(),
            free_space: free_sectors * self.sector_size(),
            sector_size: self.sector_size(),
            platters: self.geometry.platters(),
            tracks_per_surface: self.geometry.tracks(),
            sectors_per_track: self.geometry.sectors(),
            surfaces_per_platter: SURFACES_PER_PLATTER,
        }
    }
}

/// A point-in-time summary of disk occupancy and geometry.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DiskStatus {
    pub total_sectors: usize,
    pub used_sectors: usize,
    pub free_sectors: usize,
    pub total_capacity: usize,
    pub used_space: usize,
    pub free_space: usize,
    pub sector_size: usize,
    pub platters: usize,
    pub tracks_per_surface: usize,
    pub sectors_per_track: usize,
    pub surfaces_per_platter: usize,
}

impl Display for DiskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} sectors used ({}/{} bytes), {} byte sectors, {} platters, {} tracks/surface, {} sectors/track",
            self.used_sectors,
            self.total_sectors,
            self.used_space,
            self.total_capacity,
            self.sector_size,
            self.platters,
            self.tracks_per_surface,
            self.sectors_per_track
        )
    }
}
