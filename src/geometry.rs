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

//! The `geometry` module defines the physical shape of a simulated disk and
//! the mapping from logical sector numbers to physical
//! (platter, surface, track, sector) coordinates.

use std::fmt::Display;

use crate::{StoreError, SURFACES_PER_PLATTER};

/// The immutable physical description of a simulated disk.
///
/// A disk has `platters` platters with two surfaces each, `tracks` tracks per
/// surface, `sectors` sectors per track, and `sector_size` bytes per sector.
/// All four parameters must be greater than zero.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct DiskGeometry {
    platters: usize,
    tracks: usize,
    sectors: usize,
    sector_size: usize,
}

impl Display for DiskGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[p:{} t:{} s:{} n:{}]",
            self.platters, self.tracks, self.sectors, self.sector_size
        )
    }
}

impl DiskGeometry {
    pub fn new(platters: usize, tracks: usize, sectors: usize, sector_size: usize) -> Result<Self, StoreError> {
        if platters == 0 || tracks == 0 || sectors == 0 || sector_size == 0 {
            return Err(StoreError::ParameterError(
                "all geometry parameters must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            platters,
            tracks,
            sectors,
            sector_size,
        })
    }

    /// Return the number of platters.
    pub fn platters(&self) -> usize {
        self.platters
    }
    /// Return the number of tracks per surface.
    pub fn tracks(&self) -> usize {
        self.tracks
    }
    /// Return the number of sectors per track.
    pub fn sectors(&self) -> usize {
        self.sectors
    }
    /// Return the sector size in bytes.
    pub fn sector_size(&self) -> usize {
        self.sector_size
    }

    /// Return the number of sectors on one surface.
    pub fn sectors_per_surface(&self) -> usize {
        self.tracks * self.sectors
    }

    /// Return the number of sectors on one platter (both surfaces).
    pub fn sectors_per_platter(&self) -> usize {
        SURFACES_PER_PLATTER * self.sectors_per_surface()
    }

    /// Return the total number of addressable sectors on the disk.
    pub fn total_sectors(&self) -> usize {
        self.platters * self.sectors_per_platter()
    }

    /// Return the total capacity of the disk in bytes.
    pub fn total_capacity(&self) -> usize {
        self.total_sectors() * self.sector_size
    }

    /// Decompose a logical sector number into physical coordinates.
    ///
    /// The logical numbering iterates sectors within a track, tracks within a
    /// surface, surfaces within a platter, then platters, so the decomposition
    /// is a pure division/remainder chain and a bijection over
    /// `[0, total_sectors)`.
    pub fn physical_location(&self, sector_num: usize) -> Result<PhysicalLocation, StoreError> {
        if sector_num >= self.total_sectors() {
            return Err(StoreError::SectorOutOfRange(sector_num));
        }

        let mut remaining = sector_num;

        let platter = remaining / self.sectors_per_platter();
        remaining %= self.sectors_per_platter();

        let surface = remaining / self.sectors_per_surface();
        remaining %= self.sectors_per_surface();

        let track = remaining / self.sectors;
        let sector = remaining % self.sectors;

        Ok(PhysicalLocation {
            platter,
            surface,
            track,
            sector,
        })
    }
}

/// The physical coordinates of one sector: platter, surface (0 or 1), track
/// within the surface, and sector within the track.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct PhysicalLocation {
    pub platter: usize,
    pub surface: usize,
    pub track: usize,
    pub sector: usize,
}

impl Display for PhysicalLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[platter:{} surface:{} track:{} sector:{}]",
            self.platter, self.surface, self.track, self.sector
        )
    }
}
