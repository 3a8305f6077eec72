//! Sector-level access to DSK/JVC disk images.
//!
//! # Background
//!
//! A raw `.DSK` image is nothing but the byte-for-byte contents of a floppy:
//! 256-byte sectors laid out track by track.  The JVC variant (named after
//! Jeff Vavasour's CoCo emulator) prepends an optional 1–5 byte header that
//! describes the geometry.  Because a raw image is always a multiple of 256
//! bytes, the header size can be recovered as `file_size mod 256` — no magic
//! number needed.
//!
//! # Scope
//!
//! This module owns the in-memory image buffer and does exactly two things:
//! translate `(track, sector)` coordinates into byte offsets, and move whole
//! 256-byte sectors in and out of the buffer.  Everything that knows what the
//! sectors *mean* (FAT, directory, OS-9 structures) lives elsewhere.

use serde::Serialize;

use crate::error::DiskError;

/// Every supported CoCo format uses 256-byte sectors.
pub const SECTOR_SIZE: usize = 256;

/// Optional JVC header prepended to a raw sector dump.
///
/// Header fields, in order (each 1 byte; a header may stop after any of them):
///
/// | Offset | Field            | Default |
/// |--------|------------------|---------|
/// |   0    | sectors per track| 18      |
/// |   1    | side count       | 1       |
/// |   2    | sector size code (`128 << code` bytes) | 1 (= 256) |
/// |   3    | first sector id  | 1       |
/// |   4    | sector attribute | 0       |
#[derive(Debug, Clone, Serialize)]
pub struct JvcHeader {
    pub sectors_per_track: u8,
    pub side_count: u8,
    pub sector_size: u16,
    pub first_sector_id: u8,
    pub sector_attribute: u8,
    /// Number of header bytes present (0 for a raw image).
    pub header_size: usize,
}

impl Default for JvcHeader {
    fn default() -> Self {
        Self {
            sectors_per_track: 18,
            side_count: 1,
            sector_size: SECTOR_SIZE as u16,
            first_sector_id: 1,
            sector_attribute: 0,
            header_size: 0,
        }
    }
}

impl JvcHeader {
    /// Infer and parse the header from a complete image buffer.
    ///
    /// The header size is `buffer_len mod 256`; fields beyond the header's
    /// actual length keep their defaults.
    pub fn parse(data: &[u8]) -> Self {
        let header_size = data.len() % SECTOR_SIZE;
        let mut header = Self {
            header_size,
            ..Self::default()
        };
        if header_size >= 1 {
            header.sectors_per_track = data[0];
        }
        if header_size >= 2 {
            header.side_count = data[1];
        }
        if header_size >= 3 {
            // Size codes above 7 would overflow a u16; the supported
            // geometries only ever use code 1 (256 bytes).
            header.sector_size = 128u16 << data[2].min(7);
        }
        if header_size >= 4 {
            header.first_sector_id = data[3];
        }
        if header_size >= 5 {
            header.sector_attribute = data[4];
        }
        header
    }

    /// The 5-byte header written when formatting with `add_jvc_header`.
    pub fn to_bytes(&self) -> [u8; 5] {
        let code = (self.sector_size / 128).trailing_zeros() as u8;
        [
            self.sectors_per_track,
            self.side_count,
            code,
            self.first_sector_id,
            self.sector_attribute,
        ]
    }
}

/// An in-memory disk image addressed by `(track, sector)`.
///
/// The buffer is authoritative: all reads and writes go through it, and the
/// caller decides when (and whether) to persist it back to a file.
#[derive(Debug, Clone)]
pub struct SectorImage {
    data: Vec<u8>,
    header: JvcHeader,
}

impl SectorImage {
    /// Take ownership of an image buffer, inferring the JVC header.
    pub fn new(data: Vec<u8>) -> Self {
        let header = JvcHeader::parse(&data);
        Self { data, header }
    }

    pub fn header(&self) -> &JvcHeader {
        &self.header
    }

    /// The raw buffer, header included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Byte offset of a sector: `header + (track * spt + (sector - 1)) * 256`.
    /// Sectors are numbered from 1 within a track; 0 is never a valid number.
    fn sector_offset(&self, track: u8, sector: u8) -> Option<usize> {
        let spt = self.header.sectors_per_track as usize;
        let sector_num = track as usize * spt + (sector as usize).checked_sub(1)?;
        Some(self.header.header_size + sector_num * SECTOR_SIZE)
    }

    /// Read one 256-byte sector.
    pub fn read_sector(&self, track: u8, sector: u8) -> Result<&[u8], DiskError> {
        self.sector_offset(track, sector)
            .and_then(|offset| self.data.get(offset..offset + SECTOR_SIZE))
            .ok_or_else(|| DiskError::InvalidImage {
                message: format!("sector read out of range: track {track} sector {sector}"),
            })
    }

    /// Overwrite one sector.  `data` must be exactly 256 bytes.
    pub fn write_sector(&mut self, track: u8, sector: u8, data: &[u8]) -> Result<(), DiskError> {
        if data.len() != SECTOR_SIZE {
            return Err(DiskError::InvalidImage {
                message: format!("sector data must be {SECTOR_SIZE} bytes, got {}", data.len()),
            });
        }
        let dest = self
            .sector_offset(track, sector)
            .and_then(|offset| self.data.get_mut(offset..offset + SECTOR_SIZE))
            .ok_or_else(|| DiskError::InvalidImage {
                message: format!("sector write out of range: track {track} sector {sector}"),
            })?;
        dest.copy_from_slice(data);
        Ok(())
    }
}
