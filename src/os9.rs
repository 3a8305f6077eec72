//! Read-only access to OS-9 RBF (Random Block File) disk images.
//!
//! # Background
//!
//! OS-9 — the other operating system of the Color Computer world — uses a
//! filesystem that looks nothing like DECB's.  RBF numbers every sector with
//! a Logical Sector Number (LSN) from 0 across the whole disk:
//!
//! ```text
//! ┌─────────┬────────────────────────────────────────────────────┐
//! │   LSN   │ Contents                                           │
//! ├─────────┼────────────────────────────────────────────────────┤
//! │    0    │ Identification sector (disk descriptor)            │
//! │   1..   │ Allocation bitmap, one bit per cluster, MSB first  │
//! │ dd_dir  │ Root directory's file descriptor                   │
//! │   ...   │ File descriptors, directory data, file data        │
//! └─────────┴────────────────────────────────────────────────────┘
//! ```
//!
//! Every file — directories included — is described by a one-sector *file
//! descriptor* holding attributes, size, dates and a segment list of
//! `(LSN, sector count)` runs.  Directories are just files whose data is a
//! sequence of 32-byte entries pointing at more file descriptors.
//!
//! # Scope
//!
//! Reading only: mount, detect, list the root directory, extract files.
//! Writing to RBF volumes is out of scope, and the [`crate::volume`] façade
//! answers every mutation with [`DiskError::ReadOnly`].

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::DiskError;
use crate::image::SECTOR_SIZE;

fn be16(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

fn be24(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([0, data[offset], data[offset + 1], data[offset + 2]])
}

fn be32(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// The identification sector (LSN 0).
///
/// Field offsets, all multi-byte values big-endian:
///
/// | Offset | Size | Field                                    |
/// |--------|------|------------------------------------------|
/// |  0x00  |   3  | total sectors (`DD.TOT`)                 |
/// |  0x03  |   1  | tracks per side (`DD.TKS`)               |
/// |  0x04  |   2  | allocation map size in bytes (`DD.MAP`)  |
/// |  0x06  |   2  | sectors per cluster (`DD.BIT`)           |
/// |  0x08  |   3  | root directory LSN (`DD.DIR`)            |
/// |  0x0B  |   2  | owner user number (`DD.OWN`)             |
/// |  0x0D  |   1  | disk attributes (`DD.ATT`)               |
/// |  0x0E  |   2  | disk id (`DD.DSK`)                       |
/// |  0x10  |   1  | format: density, sides (`DD.FMT`)        |
/// |  0x11  |   2  | sectors per track (`DD.SPT`)             |
/// |  0x15  |   3  | bootstrap LSN (`DD.BT`)                  |
/// |  0x18  |   2  | bootstrap size (`DD.BSZ`)                |
/// |  0x1A  |   5  | creation date, YY MM DD HH MM (`DD.DAT`) |
/// |  0x1F  |  32  | disk name, ASCII (`DD.NAM`)              |
/// |  0x3F  |   1  | options (`DD.OPT`)                       |
#[derive(Debug, Clone, Serialize)]
pub struct DiskDescriptor {
    pub total_sectors: u32,
    pub track_count: u8,
    pub map_bytes: u16,
    pub cluster_sectors: u16,
    pub root_dir_lsn: u32,
    pub owner: u16,
    pub attributes: u8,
    pub disk_id: u16,
    pub format: u8,
    pub sectors_per_track: u16,
    pub bootstrap_lsn: u32,
    pub bootstrap_size: u16,
    pub created: [u8; 5],
    pub name: String,
    pub options: u8,
}

impl DiskDescriptor {
    fn parse(lsn0: &[u8]) -> Self {
        let mut created = [0u8; 5];
        created.copy_from_slice(&lsn0[0x1A..0x1F]);
        let name = lsn0[0x1F..0x3F]
            .iter()
            .filter(|b| b.is_ascii())
            .map(|&b| b as char)
            .collect::<String>()
            .trim_end_matches('\0')
            .to_string();
        Self {
            total_sectors: be24(lsn0, 0x00),
            track_count: lsn0[0x03],
            map_bytes: be16(lsn0, 0x04),
            cluster_sectors: be16(lsn0, 0x06),
            root_dir_lsn: be24(lsn0, 0x08),
            owner: be16(lsn0, 0x0B),
            attributes: lsn0[0x0D],
            disk_id: be16(lsn0, 0x0E),
            format: lsn0[0x10],
            sectors_per_track: be16(lsn0, 0x11),
            bootstrap_lsn: be24(lsn0, 0x15),
            bootstrap_size: be16(lsn0, 0x18),
            created,
            name,
            options: lsn0[0x3F],
        }
    }

    /// Density from the format byte's low bit.
    pub fn density(&self) -> &'static str {
        if self.format & 0x01 == 0 { "single" } else { "double" }
    }

    /// Side count from the format byte's second bit.
    pub fn sides(&self) -> u8 {
        if self.format & 0x02 == 0 { 1 } else { 2 }
    }

    /// Bytes per cluster.
    pub fn cluster_size(&self) -> usize {
        self.cluster_sectors as usize * SECTOR_SIZE
    }

    /// Whole-disk capacity in bytes.
    pub fn capacity_bytes(&self) -> usize {
        self.total_sectors as usize * SECTOR_SIZE
    }

    /// Number of clusters covered by the allocation bitmap.
    pub fn total_clusters(&self) -> u32 {
        if self.cluster_sectors == 0 {
            0
        } else {
            self.total_sectors / self.cluster_sectors as u32
        }
    }
}

/// One run of contiguous sectors in a file descriptor's segment list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub lsn: u32,
    pub sectors: u16,
}

/// A parsed file descriptor sector.
#[derive(Debug, Clone, Serialize)]
pub struct FileDescriptor {
    pub attributes: u8,
    pub owner: u16,
    /// Modification date, YY MM DD HH MM.
    pub modified: [u8; 5],
    pub link_count: u8,
    pub size: u32,
    /// Creation date, YY MM DD.
    pub created: [u8; 3],
    pub segments: Vec<Segment>,
}

impl FileDescriptor {
    /// Attribute bit 7 marks a directory.
    pub fn is_directory(&self) -> bool {
        self.attributes & 0x80 != 0
    }
}

/// A 32-byte root-directory entry: high-bit-terminated name, attribute
/// byte, and the LSN of the file's descriptor.
#[derive(Debug, Clone, Serialize)]
pub struct Os9DirEntry {
    pub name: String,
    pub attributes: u8,
    pub fd_lsn: u32,
}

/// One row of a root-directory listing, joined with its file descriptor.
#[derive(Debug, Clone, Serialize)]
pub struct Os9FileInfo {
    pub name: String,
    pub directory: bool,
    pub size: u32,
    /// Modification date, YY MM DD HH MM (zeros when the FD was unreadable).
    pub modified: [u8; 5],
    pub attributes: String,
}

/// Decode an attribute byte into OS-9's flag names.
pub fn attributes_string(attr: u8) -> String {
    let flags: &[(u8, &str)] = &[
        (0x80, "DIR"),
        (0x40, "SHARE"),
        (0x20, "PR"),
        (0x10, "PW"),
        (0x08, "PE"),
        (0x02, "W"),
        (0x01, "R"),
    ];
    let set: Vec<&str> = flags
        .iter()
        .filter(|(bit, _)| attr & bit != 0)
        .map(|&(_, name)| name)
        .collect();
    if set.is_empty() {
        "NONE".to_string()
    } else {
        set.join(" ")
    }
}

/// Heuristic: does this buffer look like an OS-9 RBF image?
///
/// All five checks must hold: a total-sector count within ±10 of the buffer
/// size, a sane sectors-per-track, a power-of-two cluster size, a plausible
/// allocation-map size, a root-directory LSN inside the disk — and a disk
/// name of NULs and printable ASCII only.
pub fn detect(data: &[u8]) -> bool {
    if data.len() < SECTOR_SIZE {
        return false;
    }
    let lsn0 = &data[..SECTOR_SIZE];

    let total_sectors = be24(lsn0, 0x00);
    let expected = (data.len() / SECTOR_SIZE) as u32;
    if total_sectors.abs_diff(expected) > 10 {
        return false;
    }

    let sectors_per_track = be16(lsn0, 0x11);
    if !(1..=255).contains(&sectors_per_track) {
        return false;
    }

    let cluster_sectors = be16(lsn0, 0x06);
    if !matches!(cluster_sectors, 1 | 2 | 4 | 8 | 16 | 32 | 64) {
        return false;
    }

    let map_bytes = be16(lsn0, 0x04);
    if !(1..=2048).contains(&map_bytes) {
        return false;
    }

    let root_dir_lsn = be24(lsn0, 0x08);
    if root_dir_lsn < 1 || root_dir_lsn >= total_sectors {
        return false;
    }

    lsn0[0x1F..0x3F]
        .iter()
        .all(|&b| b == 0 || (0x20..=0x7E).contains(&b))
}

/// A mounted OS-9 RBF volume.  Read-only: there is no mutation surface.
#[derive(Debug, Clone)]
pub struct Os9Image {
    data: Vec<u8>,
    descriptor: DiskDescriptor,
    allocation_map: Vec<u8>,
    root_entries: Vec<Os9DirEntry>,
}

impl Os9Image {
    /// Mount an OS-9 disk image file.
    pub fn mount(path: impl AsRef<Path>) -> Result<Self, DiskError> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|e| DiskError::Io {
            context: format!("reading disk image {}", path.display()),
            source: e,
        })?;
        let image = Self::from_bytes(data)?;
        tracing::info!(
            path = %path.display(),
            disk = %image.descriptor.name,
            files = image.root_entries.len(),
            "mounted OS-9 image"
        );
        Ok(image)
    }

    /// Mount an image already loaded into memory.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, DiskError> {
        if data.len() < SECTOR_SIZE {
            return Err(DiskError::InvalidImage {
                message: format!("image too small for an identification sector: {} bytes", data.len()),
            });
        }
        let descriptor = DiskDescriptor::parse(&data[..SECTOR_SIZE]);

        let mut image = Self {
            data,
            descriptor,
            allocation_map: Vec::new(),
            root_entries: Vec::new(),
        };
        image.allocation_map = image.read_allocation_map()?;
        // A damaged root directory still leaves the volume inspectable, so
        // fall back to an empty listing rather than failing the mount.
        image.root_entries = match image.read_root_directory() {
            Ok(entries) => entries,
            Err(error) => {
                tracing::warn!(%error, "could not read OS-9 root directory");
                Vec::new()
            }
        };
        Ok(image)
    }

    pub fn descriptor(&self) -> &DiskDescriptor {
        &self.descriptor
    }

    /// Root-directory entries, `.` and `..` excluded.
    pub fn root_entries(&self) -> &[Os9DirEntry] {
        &self.root_entries
    }

    fn read_lsn(&self, lsn: u32) -> Result<&[u8], DiskError> {
        if lsn >= self.descriptor.total_sectors {
            return Err(DiskError::InvalidImage {
                message: format!(
                    "LSN {lsn} out of range (0-{})",
                    self.descriptor.total_sectors.saturating_sub(1)
                ),
            });
        }
        let offset = lsn as usize * SECTOR_SIZE;
        self.data
            .get(offset..offset + SECTOR_SIZE)
            .ok_or_else(|| DiskError::InvalidImage {
                message: format!("LSN {lsn} lies beyond the image buffer"),
            })
    }

    /// The allocation bitmap spans consecutive sectors from LSN 1.
    fn read_allocation_map(&self) -> Result<Vec<u8>, DiskError> {
        let mut map = Vec::with_capacity(self.descriptor.map_bytes as usize);
        let mut remaining = self.descriptor.map_bytes as usize;
        let mut lsn = 1;
        while remaining > 0 {
            let sector = self.read_lsn(lsn)?;
            let take = remaining.min(SECTOR_SIZE);
            map.extend_from_slice(&sector[..take]);
            remaining -= take;
            lsn += 1;
        }
        Ok(map)
    }

    /// Is `cluster` marked allocated?  Bits run MSB-first within each byte;
    /// clusters beyond the map read as allocated.
    pub fn cluster_allocated(&self, cluster: u32) -> bool {
        let byte_index = (cluster / 8) as usize;
        let bit_index = 7 - (cluster % 8);
        match self.allocation_map.get(byte_index) {
            Some(byte) => byte & (1 << bit_index) != 0,
            None => true,
        }
    }

    /// Count of free clusters in the allocation map.
    pub fn free_clusters(&self) -> u32 {
        (0..self.descriptor.total_clusters())
            .filter(|&c| !self.cluster_allocated(c))
            .count() as u32
    }

    /// Read and parse the file descriptor sector at `lsn`.
    pub fn read_file_descriptor(&self, lsn: u32) -> Result<FileDescriptor, DiskError> {
        let sector = self.read_lsn(lsn)?;
        let mut modified = [0u8; 5];
        modified.copy_from_slice(&sector[0x03..0x08]);
        let mut created = [0u8; 3];
        created.copy_from_slice(&sector[0x0D..0x10]);

        // Segment list: 5-byte (LSN, count) pairs from 0x10, ended by a zero
        // count or the end of the sector.
        let mut segments = Vec::new();
        let mut offset = 0x10;
        while offset + 5 <= SECTOR_SIZE {
            let sectors = be16(sector, offset + 3);
            if sectors == 0 {
                break;
            }
            segments.push(Segment {
                lsn: be24(sector, offset),
                sectors,
            });
            offset += 5;
        }

        Ok(FileDescriptor {
            attributes: sector[0x00],
            owner: be16(sector, 0x01),
            modified,
            link_count: sector[0x08],
            size: be32(sector, 0x09),
            created,
            segments,
        })
    }

    /// Concatenate a file's segments and trim to its recorded size.
    pub fn read_file_data(&self, fd: &FileDescriptor) -> Result<Vec<u8>, DiskError> {
        let mut data = Vec::new();
        for segment in &fd.segments {
            for i in 0..segment.sectors as u32 {
                data.extend_from_slice(self.read_lsn(segment.lsn + i)?);
            }
        }
        data.truncate(fd.size as usize);
        Ok(data)
    }

    fn read_root_directory(&self) -> Result<Vec<Os9DirEntry>, DiskError> {
        let root_fd = self.read_file_descriptor(self.descriptor.root_dir_lsn)?;
        let dir_data = self.read_file_data(&root_fd)?;

        let mut entries = Vec::new();
        for raw in dir_data.chunks_exact(32) {
            if let Some(entry) = parse_dir_entry(raw) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    /// Root-directory listing with sizes, dates and decoded attributes.
    pub fn list(&self) -> Vec<Os9FileInfo> {
        self.root_entries
            .iter()
            .map(|entry| match self.read_file_descriptor(entry.fd_lsn) {
                Ok(fd) => Os9FileInfo {
                    name: entry.name.clone(),
                    directory: fd.is_directory(),
                    size: fd.size,
                    modified: fd.modified,
                    attributes: attributes_string(entry.attributes),
                },
                Err(_) => Os9FileInfo {
                    name: entry.name.clone(),
                    directory: false,
                    size: 0,
                    modified: [0; 5],
                    attributes: attributes_string(entry.attributes),
                },
            })
            .collect()
    }

    /// Read a root-directory file's bytes.  Fails with [`DiskError::IsDirectory`]
    /// when the name refers to a directory.
    pub fn read_file(&self, name: &str) -> Result<Vec<u8>, DiskError> {
        let key = name.to_ascii_uppercase();
        let entry = self
            .root_entries
            .iter()
            .find(|e| e.name.to_ascii_uppercase() == key)
            .ok_or_else(|| DiskError::NotFound {
                name: name.to_string(),
            })?;
        let fd = self.read_file_descriptor(entry.fd_lsn)?;
        if fd.is_directory() {
            return Err(DiskError::IsDirectory {
                name: entry.name.clone(),
            });
        }
        self.read_file_data(&fd)
    }

    /// Extract a root-directory file to a host path.
    pub fn extract_to(&self, name: &str, out_path: impl AsRef<Path>) -> Result<(), DiskError> {
        let out_path = out_path.as_ref();
        let data = self.read_file(name)?;
        fs::write(out_path, &data).map_err(|e| DiskError::Io {
            context: format!("writing extracted file {}", out_path.display()),
            source: e,
        })?;
        tracing::info!(
            name,
            path = %out_path.display(),
            bytes = data.len(),
            "extracted file from OS-9 image"
        );
        Ok(())
    }
}

/// Parse a 32-byte directory entry; `None` for empty slots and `.`/`..`.
fn parse_dir_entry(raw: &[u8]) -> Option<Os9DirEntry> {
    if raw[0] == 0x00 {
        return None;
    }

    // The name occupies bytes 0..28; the first byte with bit 7 set is the
    // final character, with bit 7 cleared to recover it.  An unterminated
    // name just uses all 28 bytes.
    let mut name_bytes: Vec<u8> = Vec::with_capacity(28);
    for &b in &raw[..28] {
        if b & 0x80 != 0 {
            name_bytes.push(b & 0x7F);
            break;
        }
        name_bytes.push(b);
    }
    let name = name_bytes
        .iter()
        .filter(|b| b.is_ascii())
        .map(|&b| b as char)
        .collect::<String>()
        .trim_end_matches('\0')
        .to_string();

    if name == "." || name == ".." {
        return None;
    }

    Some(Os9DirEntry {
        name,
        attributes: raw[28],
        fd_lsn: be24(raw, 29),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a small synthetic RBF image:
    ///
    /// ```text
    /// LSN  0   descriptor: 40 sectors, 4 sectors/cluster, map 2 bytes,
    ///          root dir FD at LSN 3, name "MYDISK"
    /// LSN  1   allocation bitmap: 0xF0 0x00 (clusters 0-3 allocated)
    /// LSN  3   root directory FD: dir, size 160, one segment (5, 1)
    /// LSN  5   root entries: "..", ".", STARTUP, SUBDIR, empty
    /// LSN 16   STARTUP's FD: file, size 11, one segment (17, 1)
    /// LSN 17   "HELLO WORLD" padded with zeros
    /// LSN 18   SUBDIR's FD: directory, size 0, no segments
    /// LSN 20   TWOSEG's FD: file, size 260, segments (21, 1) and (22, 1)
    /// ```
    fn build_image() -> Vec<u8> {
        let mut img = vec![0u8; 40 * SECTOR_SIZE];

        // LSN 0: identification sector.
        img[0x02] = 40; // dd_tot
        img[0x03] = 35; // dd_tks
        img[0x05] = 2; // dd_map
        img[0x07] = 4; // dd_bit
        img[0x0A] = 3; // dd_dir
        img[0x10] = 0x03; // dd_fmt: double density, two sides
        img[0x12] = 18; // dd_spt
        img[0x1F..0x25].copy_from_slice(b"MYDISK");

        // LSN 1: bitmap, clusters 0-3 allocated, 4-9 free.
        img[SECTOR_SIZE] = 0xF0;

        // LSN 3: root directory file descriptor.
        let fd = 3 * SECTOR_SIZE;
        img[fd] = 0xBF; // directory, all access bits
        img[fd + 0x0C] = 160; // fd_siz = 160 (5 entries)
        img[fd + 0x12] = 5; // segment LSN 5
        img[fd + 0x14] = 1; // segment count 1

        // LSN 5: root directory entries.
        let dir = 5 * SECTOR_SIZE;
        img[dir] = b'.';
        img[dir + 1] = b'.' | 0x80;
        let slot1 = dir + 32;
        img[slot1] = b'.' | 0x80;
        let slot2 = dir + 64;
        img[slot2..slot2 + 7].copy_from_slice(b"STARTUP");
        img[slot2 + 7] = 0x80; // NUL terminator with the high bit
        img[slot2 + 28] = 0x03; // read + write
        img[slot2 + 31] = 16; // fd at LSN 16
        let slot3 = dir + 96;
        img[slot3..slot3 + 5].copy_from_slice(b"SUBDI");
        img[slot3 + 5] = b'R' | 0x80;
        img[slot3 + 28] = 0xBF;
        img[slot3 + 31] = 18;
        let slot4 = dir + 128;
        img[slot4..slot4 + 5].copy_from_slice(b"TWOSE");
        img[slot4 + 5] = b'G' | 0x80;
        img[slot4 + 28] = 0x03;
        img[slot4 + 31] = 20;

        // LSN 16: STARTUP's file descriptor.
        let fd = 16 * SECTOR_SIZE;
        img[fd] = 0x03;
        img[fd + 0x03..fd + 0x08].copy_from_slice(&[85, 12, 25, 10, 30]);
        img[fd + 0x0C] = 11; // fd_siz
        img[fd + 0x12] = 17;
        img[fd + 0x14] = 1;

        // LSN 17: STARTUP's data.
        let data = 17 * SECTOR_SIZE;
        img[data..data + 11].copy_from_slice(b"HELLO WORLD");

        // LSN 18: SUBDIR's file descriptor.
        let fd = 18 * SECTOR_SIZE;
        img[fd] = 0xBF;

        // LSN 20: TWOSEG's file descriptor, two one-sector segments.
        let fd = 20 * SECTOR_SIZE;
        img[fd] = 0x03;
        img[fd + 0x0B] = 1; // fd_siz = 260
        img[fd + 0x0C] = 4;
        img[fd + 0x12] = 21;
        img[fd + 0x14] = 1;
        img[fd + 0x17] = 22;
        img[fd + 0x19] = 1;

        // LSN 21 and 22: TWOSEG's data.
        let seg = 21 * SECTOR_SIZE;
        img[seg..seg + SECTOR_SIZE].copy_from_slice(&[0xAA; SECTOR_SIZE]);
        let seg = 22 * SECTOR_SIZE;
        img[seg..seg + SECTOR_SIZE].copy_from_slice(&[0xBB; SECTOR_SIZE]);

        img
    }

    #[test]
    fn detect_accepts_the_fixture() {
        assert!(detect(&build_image()));
    }

    #[test]
    fn detect_rejects_small_and_garbage_buffers() {
        assert!(!detect(&[0u8; 100]));
        // All 0xFF: dd_tot wildly exceeds the buffer.
        assert!(!detect(&vec![0xFFu8; 35 * 18 * 256]));
        // All zero: a zero total-sector count is nowhere near the buffer size.
        assert!(!detect(&vec![0u8; 40 * 256]));
    }

    #[test]
    fn detect_rejects_unprintable_disk_name() {
        let mut img = build_image();
        img[0x20] = 0x07;
        assert!(!detect(&img));
    }

    #[test]
    fn descriptor_fields_parse() {
        let image = Os9Image::from_bytes(build_image()).unwrap();
        let d = image.descriptor();
        assert_eq!(d.total_sectors, 40);
        assert_eq!(d.track_count, 35);
        assert_eq!(d.map_bytes, 2);
        assert_eq!(d.cluster_sectors, 4);
        assert_eq!(d.root_dir_lsn, 3);
        assert_eq!(d.sectors_per_track, 18);
        assert_eq!(d.name, "MYDISK");
        assert_eq!(d.density(), "double");
        assert_eq!(d.sides(), 2);
        assert_eq!(d.cluster_size(), 1024);
        assert_eq!(d.total_clusters(), 10);
        assert_eq!(d.capacity_bytes(), 40 * 256);
    }

    #[test]
    fn bitmap_is_msb_first() {
        let image = Os9Image::from_bytes(build_image()).unwrap();
        for cluster in 0..4 {
            assert!(image.cluster_allocated(cluster), "cluster {cluster}");
        }
        for cluster in 4..10 {
            assert!(!image.cluster_allocated(cluster), "cluster {cluster}");
        }
        assert_eq!(image.free_clusters(), 6);
    }

    #[test]
    fn clusters_beyond_the_map_read_allocated() {
        let image = Os9Image::from_bytes(build_image()).unwrap();
        assert!(image.cluster_allocated(5000));
    }

    #[test]
    fn root_listing_skips_dot_entries() {
        let image = Os9Image::from_bytes(build_image()).unwrap();
        let names: Vec<&str> = image.root_entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["STARTUP", "SUBDIR", "TWOSEG"]);
    }

    #[test]
    fn listing_joins_file_descriptors() {
        let image = Os9Image::from_bytes(build_image()).unwrap();
        let listing = image.list();
        let startup = &listing[0];
        assert_eq!(startup.name, "STARTUP");
        assert!(!startup.directory);
        assert_eq!(startup.size, 11);
        assert_eq!(startup.modified, [85, 12, 25, 10, 30]);
        assert_eq!(startup.attributes, "W R");

        let subdir = &listing[1];
        assert!(subdir.directory);
        assert_eq!(subdir.attributes, "DIR PR PW PE W R");
    }

    #[test]
    fn read_file_trims_to_descriptor_size() {
        let image = Os9Image::from_bytes(build_image()).unwrap();
        assert_eq!(image.read_file("STARTUP").unwrap(), b"HELLO WORLD");
    }

    #[test]
    fn read_file_is_case_insensitive() {
        let image = Os9Image::from_bytes(build_image()).unwrap();
        assert_eq!(image.read_file("startup").unwrap(), b"HELLO WORLD");
    }

    #[test]
    fn multi_segment_file_concatenates_in_order() {
        let image = Os9Image::from_bytes(build_image()).unwrap();
        let data = image.read_file("TWOSEG").unwrap();
        assert_eq!(data.len(), 260);
        assert!(data[..256].iter().all(|&b| b == 0xAA));
        assert!(data[256..].iter().all(|&b| b == 0xBB));
    }

    #[test]
    fn extracting_a_directory_fails() {
        let image = Os9Image::from_bytes(build_image()).unwrap();
        assert!(matches!(
            image.read_file("SUBDIR"),
            Err(DiskError::IsDirectory { .. })
        ));
    }

    #[test]
    fn missing_file_is_not_found() {
        let image = Os9Image::from_bytes(build_image()).unwrap();
        assert!(matches!(
            image.read_file("NOPE"),
            Err(DiskError::NotFound { .. })
        ));
    }

    #[test]
    fn unreadable_root_directory_mounts_empty() {
        let mut img = build_image();
        img[0x0A] = 39; // root FD points at the last sector...
        let truncated = img[..39 * SECTOR_SIZE].to_vec();
        // ...which the buffer no longer contains.
        let image = Os9Image::from_bytes(truncated).unwrap();
        assert!(image.root_entries().is_empty());
    }

    #[test]
    fn attribute_strings_match_os9_flags() {
        assert_eq!(attributes_string(0x00), "NONE");
        assert_eq!(attributes_string(0x03), "W R");
        assert_eq!(attributes_string(0xBF), "DIR PR PW PE W R");
        assert_eq!(attributes_string(0x40), "SHARE");
    }
}
