//! DECB volume operations: mount, format, extract, insert, delete, rename.
//!
//! # Background
//!
//! Disk Extended Color BASIC stores files as chains of 9-sector granules
//! tracked by the FAT on track 17 (see [`crate::fat`]), with one 32-byte
//! directory slot per file (see [`crate::dir`]).  The standard disk is 35
//! tracks of 18 sectors, 161,280 bytes; 40- and 80-track and double-sided
//! variants exist, but the filesystem itself never grows past 68 granules.
//!
//! # Scope
//!
//! All mutation happens against the in-memory buffer; nothing touches the
//! backing file until [`DskImage::save`].  `insert` validates capacity (both
//! FAT and directory) before writing a single sector, so a failed insert
//! leaves the volume untouched.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::dir::{
    self, DIR_TRACK, DirEntry, ENTRY_SIZE, FAT_SECTOR, FileType, normalize_name,
};
use crate::error::DiskError;
use crate::fat::{Fat, GRANULE_SECTORS, GRANULE_SIZE, granule_location};
use crate::image::{JvcHeader, SECTOR_SIZE, SectorImage};

/// Sectors per track on every supported DECB geometry.
pub const SECTORS_PER_TRACK: usize = 18;

/// One row of a directory listing, sized and decoded for display.
#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub extension: String,
    pub file_type: FileType,
    pub ascii: bool,
    pub first_granule: u8,
    pub size_bytes: usize,
    pub last_sector_bytes: u16,
}

/// A mounted (or freshly formatted) DECB volume.
///
/// The image buffer is authoritative until [`DskImage::save`] writes it
/// back; the FAT and directory listing are kept in sync with the buffer
/// after every mutation.
#[derive(Debug, Clone)]
pub struct DskImage {
    image: SectorImage,
    fat: Fat,
    directory: Vec<DirEntry>,
    path: Option<PathBuf>,
}

impl DskImage {
    /// Mount a DSK/JVC image file.
    pub fn mount(path: impl AsRef<Path>) -> Result<Self, DiskError> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|e| DiskError::Io {
            context: format!("reading disk image {}", path.display()),
            source: e,
        })?;
        let mut dsk = Self::from_bytes(data)?;
        dsk.path = Some(path.to_path_buf());
        tracing::info!(
            path = %path.display(),
            files = dsk.directory.len(),
            free_granules = dsk.free_granules(),
            "mounted DECB image"
        );
        Ok(dsk)
    }

    /// Mount an image already loaded into memory.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, DiskError> {
        let image = SectorImage::new(data);
        let fat = Fat::from_sector(image.read_sector(DIR_TRACK, FAT_SECTOR)?);
        let directory = dir::read_directory(&image)?;
        Ok(Self {
            image,
            fat,
            directory,
            path: None,
        })
    }

    /// Format a fresh volume in memory.
    ///
    /// Every data byte is `0xFF`, which doubles as an all-free FAT and an
    /// all-empty directory, so the result mounts without further writes.
    /// With `add_jvc_header` the buffer gains the 5-byte header
    /// `[18, sides, 1, 1, 0]`.
    pub fn format(tracks: u32, sides: u32, add_jvc_header: bool) -> Result<Self, DiskError> {
        if !matches!(tracks, 35 | 40 | 80) || !matches!(sides, 1 | 2) {
            return Err(DiskError::InvalidImage {
                message: format!("unsupported geometry: {tracks} tracks, {sides} sides"),
            });
        }
        let data_size = tracks as usize * sides as usize * SECTORS_PER_TRACK * SECTOR_SIZE;
        let mut buffer = Vec::with_capacity(data_size + 5);
        if add_jvc_header {
            let header = JvcHeader {
                side_count: sides as u8,
                header_size: 5,
                ..JvcHeader::default()
            };
            buffer.extend_from_slice(&header.to_bytes());
        }
        buffer.resize(buffer.len() + data_size, 0xFF);
        let dsk = Self::from_bytes(buffer)?;
        tracing::info!(tracks, sides, jvc = add_jvc_header, "formatted DECB image");
        Ok(dsk)
    }

    /// Format a fresh volume and write it to `path`.
    pub fn format_disk(
        path: impl AsRef<Path>,
        tracks: u32,
        sides: u32,
        add_jvc_header: bool,
    ) -> Result<Self, DiskError> {
        let path = path.as_ref();
        let mut dsk = Self::format(tracks, sides, add_jvc_header)?;
        dsk.save_as(path)?;
        dsk.path = Some(path.to_path_buf());
        Ok(dsk)
    }

    pub fn header(&self) -> &JvcHeader {
        self.image.header()
    }

    /// The raw image buffer, header included.
    pub fn as_bytes(&self) -> &[u8] {
        self.image.as_bytes()
    }

    /// Active directory entries, in slot order.
    pub fn directory(&self) -> &[DirEntry] {
        &self.directory
    }

    /// Number of free granules (out of [`crate::fat::GRANULE_COUNT`]).
    pub fn free_granules(&self) -> usize {
        self.fat.free_count()
    }

    /// Free space in bytes.
    pub fn free_bytes(&self) -> usize {
        self.free_granules() * GRANULE_SIZE
    }

    /// Find an entry by case-insensitive `NAME.EXT`.
    pub fn find(&self, name: &str) -> Option<&DirEntry> {
        let key = name.trim().to_ascii_uppercase();
        self.directory
            .iter()
            .find(|e| e.full_name().to_ascii_uppercase() == key)
    }

    /// Logical size of a file, from its chain length and final-sector count.
    /// Uses the same arithmetic as [`DskImage::extract`] without copying.
    pub fn file_size(&self, entry: &DirEntry) -> usize {
        let total_sectors: usize = self
            .fat
            .chain(entry.first_granule)
            .iter()
            .map(|&(_, sectors)| sectors as usize)
            .sum();
        if total_sectors == 0 {
            return 0;
        }
        if entry.last_sector_bytes > 0 {
            (total_sectors - 1) * SECTOR_SIZE + entry.last_sector_bytes as usize
        } else {
            total_sectors * SECTOR_SIZE
        }
    }

    /// Directory listing with decoded types and computed sizes.
    pub fn list(&self) -> Vec<FileInfo> {
        self.directory
            .iter()
            .map(|entry| FileInfo {
                name: entry.filename.clone(),
                extension: entry.extension.clone(),
                file_type: entry.file_type(),
                ascii: entry.is_ascii(),
                first_granule: entry.first_granule,
                size_bytes: self.file_size(entry),
                last_sector_bytes: entry.last_sector_bytes,
            })
            .collect()
    }

    /// Read a file's bytes out of the image.
    pub fn extract(&self, name: &str) -> Result<Vec<u8>, DiskError> {
        let entry = self.find(name).ok_or_else(|| DiskError::NotFound {
            name: name.to_string(),
        })?;
        let mut data = Vec::new();
        for (granule, sectors_used) in self.fat.chain(entry.first_granule) {
            let (track, start_sector) = granule_location(granule);
            for i in 0..sectors_used {
                data.extend_from_slice(self.image.read_sector(track, start_sector + i)?);
            }
        }
        // Trim to the logical length: all-but-one full sectors plus the
        // final sector's byte count.
        if entry.last_sector_bytes > 0 && !data.is_empty() {
            let full_sectors = data.len() / SECTOR_SIZE - 1;
            data.truncate(full_sectors * SECTOR_SIZE + entry.last_sector_bytes as usize);
        }
        Ok(data)
    }

    /// Write a file into the image.
    ///
    /// Capacity is validated — granules *and* a directory slot — before any
    /// sector is written, so a failed insert leaves the volume unchanged.
    /// Granules are taken lowest-first; fragmentation is fine, the chain
    /// records the order.
    pub fn insert(
        &mut self,
        name: &str,
        data: &[u8],
        file_type: FileType,
        ascii: bool,
    ) -> Result<(), DiskError> {
        let (base, ext) = normalize_name(name)?;

        let granules_needed = data.len().div_ceil(GRANULE_SIZE);
        // A zero-length file allocates nothing but still points its
        // directory entry at a free granule, so one must exist.
        let required = granules_needed.max(1);
        let free = self.fat.find_free(required);
        if free.len() < required {
            return Err(DiskError::OutOfSpace {
                needed: required,
                free: self.fat.free_count(),
            });
        }
        let (dir_sector, dir_offset) = dir::find_free_slot(&self.image)?
            .ok_or(DiskError::DirectoryFull)?;

        let first_granule = free[0];
        if !data.is_empty() {
            let allocated = &free[..granules_needed];

            // Lay the bytes down sector by sector, zero-padding the tail.
            let mut offset = 0;
            for &granule in allocated {
                let (track, start_sector) = granule_location(granule);
                let remaining = data.len() - offset;
                let sectors = GRANULE_SECTORS.min(remaining.div_ceil(SECTOR_SIZE));
                for s in 0..sectors {
                    let chunk = &data[offset..data.len().min(offset + SECTOR_SIZE)];
                    let mut sector = [0u8; SECTOR_SIZE];
                    sector[..chunk.len()].copy_from_slice(chunk);
                    self.image
                        .write_sector(track, start_sector + s as u8, &sector)?;
                    offset += chunk.len();
                }
            }

            // Sectors used inside the terminal granule; a file ending exactly
            // on a granule boundary uses all nine.
            let remainder = data.len() % GRANULE_SIZE;
            let tail_sectors = if remainder == 0 {
                GRANULE_SECTORS as u8
            } else {
                remainder.div_ceil(SECTOR_SIZE) as u8
            };
            self.fat.commit_chain(allocated, tail_sectors);
        }

        let mut last_sector_bytes = (data.len() % SECTOR_SIZE) as u16;
        if last_sector_bytes == 0 && !data.is_empty() {
            last_sector_bytes = SECTOR_SIZE as u16;
        }

        let entry = DirEntry {
            filename: base,
            extension: ext,
            file_type: file_type.as_byte(),
            ascii_flag: if ascii { 0xFF } else { 0x00 },
            first_granule,
            last_sector_bytes,
        };
        self.write_dir_slot(dir_sector, dir_offset, &entry.encode())?;
        self.flush_fat()?;
        self.directory = dir::read_directory(&self.image)?;

        tracing::info!(
            name = %entry.full_name(),
            bytes = data.len(),
            granules = granules_needed,
            "inserted file into DECB image"
        );
        Ok(())
    }

    /// Delete a file: free its granule chain and tombstone the slot.
    pub fn delete(&mut self, name: &str) -> Result<(), DiskError> {
        let (sector, offset, entry) =
            dir::locate_entry(&self.image, name)?.ok_or_else(|| DiskError::NotFound {
                name: name.to_string(),
            })?;
        self.fat.release(entry.first_granule);
        self.flush_fat()?;

        let mut sector_data = self.image.read_sector(DIR_TRACK, sector)?.to_vec();
        sector_data[offset] = 0xFF;
        self.image.write_sector(DIR_TRACK, sector, &sector_data)?;
        self.directory = dir::read_directory(&self.image)?;

        tracing::info!(name = %entry.full_name(), "deleted file from DECB image");
        Ok(())
    }

    /// Rename a file in place.  Only the name bytes of the slot change; the
    /// chain, type and mode stay as they are.
    pub fn rename(&mut self, old_name: &str, new_name: &str) -> Result<(), DiskError> {
        let (_, _, entry) =
            dir::locate_entry(&self.image, old_name)?.ok_or_else(|| DiskError::NotFound {
                name: old_name.to_string(),
            })?;
        let (base, ext) = normalize_name(new_name)?;

        // Re-find the slot by first granule, the key that survives renames.
        for sector in dir::DIR_START_SECTOR..=dir::DIR_END_SECTOR {
            let mut sector_data = self.image.read_sector(DIR_TRACK, sector)?.to_vec();
            for slot in 0..dir::ENTRIES_PER_SECTOR {
                let offset = slot * ENTRY_SIZE;
                let parsed = DirEntry::parse(&sector_data[offset..offset + ENTRY_SIZE]);
                if parsed.is_some_and(|e| e.first_granule == entry.first_granule) {
                    let mut renamed = entry.clone();
                    renamed.filename = base.clone();
                    renamed.extension = ext.clone();
                    let encoded = renamed.encode();
                    sector_data[offset..offset + 11].copy_from_slice(&encoded[..11]);
                    self.image.write_sector(DIR_TRACK, sector, &sector_data)?;
                    self.directory = dir::read_directory(&self.image)?;
                    tracing::info!(
                        old = %entry.full_name(),
                        new = %renamed.full_name(),
                        "renamed file in DECB image"
                    );
                    return Ok(());
                }
            }
        }
        Err(DiskError::NotFound {
            name: old_name.to_string(),
        })
    }

    /// Write the buffer back to the file it was mounted from.
    pub fn save(&self) -> Result<(), DiskError> {
        let path = self.path.as_ref().ok_or_else(|| DiskError::Io {
            context: "image has no backing file; use save_as".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })?;
        self.write_to(path)
    }

    /// Write the buffer to an arbitrary path.
    pub fn save_as(&self, path: impl AsRef<Path>) -> Result<(), DiskError> {
        self.write_to(path.as_ref())
    }

    fn write_to(&self, path: &Path) -> Result<(), DiskError> {
        fs::write(path, self.image.as_bytes()).map_err(|e| DiskError::Io {
            context: format!("writing disk image {}", path.display()),
            source: e,
        })?;
        tracing::info!(path = %path.display(), bytes = self.image.as_bytes().len(), "saved DECB image");
        Ok(())
    }

    fn write_dir_slot(
        &mut self,
        sector: u8,
        offset: usize,
        entry: &[u8; ENTRY_SIZE],
    ) -> Result<(), DiskError> {
        let mut sector_data = self.image.read_sector(DIR_TRACK, sector)?.to_vec();
        sector_data[offset..offset + ENTRY_SIZE].copy_from_slice(entry);
        self.image.write_sector(DIR_TRACK, sector, &sector_data)
    }

    fn flush_fat(&mut self) -> Result<(), DiskError> {
        let mut sector_data = self.image.read_sector(DIR_TRACK, FAT_SECTOR)?.to_vec();
        self.fat.write_to_sector(&mut sector_data);
        self.image.write_sector(DIR_TRACK, FAT_SECTOR, &sector_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fat::GRANULE_COUNT;

    fn fresh_disk() -> DskImage {
        DskImage::format(35, 1, false).unwrap()
    }

    #[test]
    fn format_produces_empty_mountable_volume() {
        let dsk = fresh_disk();
        assert_eq!(dsk.as_bytes().len(), 35 * 18 * 256);
        assert_eq!(dsk.free_granules(), GRANULE_COUNT);
        assert!(dsk.list().is_empty());

        // Round-trip the raw buffer through a fresh mount.
        let remounted = DskImage::from_bytes(dsk.as_bytes().to_vec()).unwrap();
        assert_eq!(remounted.free_granules(), GRANULE_COUNT);
        assert!(remounted.list().is_empty());
    }

    #[test]
    fn format_geometries() {
        assert_eq!(
            DskImage::format(40, 2, false).unwrap().as_bytes().len(),
            40 * 2 * 18 * 256
        );
        assert_eq!(
            DskImage::format(80, 1, false).unwrap().as_bytes().len(),
            80 * 18 * 256
        );
    }

    #[test]
    fn format_with_jvc_header() {
        let dsk = DskImage::format(35, 1, true).unwrap();
        assert_eq!(dsk.as_bytes().len(), 35 * 18 * 256 + 5);
        assert_eq!(&dsk.as_bytes()[..5], &[18, 1, 1, 1, 0]);
        assert_eq!(dsk.header().header_size, 5);
        assert_eq!(dsk.free_granules(), GRANULE_COUNT);
    }

    #[test]
    fn format_rejects_unsupported_geometry() {
        assert!(DskImage::format(36, 1, false).is_err());
        assert!(DskImage::format(35, 3, false).is_err());
    }

    #[test]
    fn insert_and_extract_round_trip() {
        let mut dsk = fresh_disk();
        let data = vec![0x01u8; 5000];
        dsk.insert("PROG.BIN", &data, FileType::MachineLanguage, false)
            .unwrap();

        // 5000 bytes is 3 granules; 5000 mod 256 = 136.
        assert_eq!(dsk.free_granules(), 65);
        let listing = dsk.list();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].name, "PROG");
        assert_eq!(listing[0].extension, "BIN");
        assert_eq!(listing[0].last_sector_bytes, 136);
        assert_eq!(listing[0].size_bytes, 5000);

        assert_eq!(dsk.extract("PROG.BIN").unwrap(), data);
    }

    #[test]
    fn insert_exactly_one_granule() {
        let mut dsk = fresh_disk();
        let data = vec![0xABu8; GRANULE_SIZE];
        dsk.insert("FULL.DAT", &data, FileType::Data, false).unwrap();

        assert_eq!(dsk.free_granules(), 67);
        let entry = dsk.find("FULL.DAT").unwrap();
        assert_eq!(entry.last_sector_bytes, 256);
        // Terminal marker: all nine sectors in use.
        assert_eq!(dsk.fat.entries()[entry.first_granule as usize], 0xC9);
        assert_eq!(dsk.extract("FULL.DAT").unwrap(), data);
    }

    #[test]
    fn insert_one_byte_past_a_granule() {
        let mut dsk = fresh_disk();
        let data = vec![0x42u8; GRANULE_SIZE + 1];
        dsk.insert("SPILL.DAT", &data, FileType::Data, false).unwrap();

        assert_eq!(dsk.free_granules(), 66);
        let entry = dsk.find("SPILL.DAT").unwrap();
        assert_eq!(entry.last_sector_bytes, 1);
        assert_eq!(dsk.extract("SPILL.DAT").unwrap(), data);
    }

    #[test]
    fn insert_empty_file() {
        let mut dsk = fresh_disk();
        dsk.insert("EMPTY.TXT", &[], FileType::Text, true).unwrap();

        assert_eq!(dsk.free_granules(), GRANULE_COUNT);
        let entry = dsk.find("EMPTY.TXT").unwrap();
        assert_eq!(entry.last_sector_bytes, 0);
        assert!(dsk.extract("EMPTY.TXT").unwrap().is_empty());

        // The entry survives a remount.
        let remounted = DskImage::from_bytes(dsk.as_bytes().to_vec()).unwrap();
        assert!(remounted.find("EMPTY.TXT").is_some());
    }

    #[test]
    fn insert_too_large_fails_before_writing() {
        let mut dsk = fresh_disk();
        let before = dsk.as_bytes().to_vec();
        let data = vec![0u8; GRANULE_COUNT * GRANULE_SIZE + 1];
        let err = dsk.insert("BIG.DAT", &data, FileType::Data, false);
        assert!(matches!(err, Err(DiskError::OutOfSpace { needed: 69, .. })));
        assert_eq!(dsk.as_bytes(), &before[..]);
    }

    #[test]
    fn directory_fills_at_72_entries() {
        let mut dsk = fresh_disk();
        // Zero-length files take a slot but no granules, so all 72 slots can
        // fill up before space runs out.
        for i in 0..72 {
            dsk.insert(&format!("F{i}.TXT"), &[], FileType::Text, true)
                .unwrap();
        }
        let err = dsk.insert("MORE.TXT", &[], FileType::Text, true);
        assert!(matches!(err, Err(DiskError::DirectoryFull)));
    }

    #[test]
    fn delete_frees_granules_and_slot() {
        let mut dsk = fresh_disk();
        dsk.insert("PROG.BIN", &vec![0x01u8; 5000], FileType::MachineLanguage, false)
            .unwrap();
        assert_eq!(dsk.free_granules(), 65);

        dsk.delete("PROG.BIN").unwrap();
        assert_eq!(dsk.free_granules(), GRANULE_COUNT);
        assert!(dsk.list().is_empty());

        // The freed slot and granules are reused from the bottom.
        dsk.insert("HI.TXT", b"HELLO", FileType::Text, true).unwrap();
        let entry = dsk.find("HI.TXT").unwrap();
        assert_eq!(entry.first_granule, 0);
        assert_eq!(entry.last_sector_bytes, 5);
        assert_eq!(dsk.list()[0].size_bytes, 5);
        assert_eq!(dsk.extract("HI.TXT").unwrap(), b"HELLO");
    }

    #[test]
    fn delete_missing_file_is_not_found() {
        let mut dsk = fresh_disk();
        assert!(matches!(
            dsk.delete("NOPE.BIN"),
            Err(DiskError::NotFound { .. })
        ));
    }

    #[test]
    fn rename_keeps_contents() {
        let mut dsk = fresh_disk();
        dsk.insert("OLD.BAS", b"10 PRINT", FileType::Basic, true).unwrap();
        dsk.rename("OLD.BAS", "new.bas").unwrap();

        assert!(dsk.find("OLD.BAS").is_none());
        let entry = dsk.find("NEW.BAS").unwrap();
        assert_eq!(entry.file_type(), FileType::Basic);
        assert!(entry.is_ascii());
        assert_eq!(dsk.extract("NEW.BAS").unwrap(), b"10 PRINT");
    }

    #[test]
    fn insert_rejects_bad_names() {
        let mut dsk = fresh_disk();
        assert!(matches!(
            dsk.insert("sch\u{f6}n.bas", b"x", FileType::Basic, false),
            Err(DiskError::BadName { .. })
        ));
        assert!(matches!(
            dsk.insert("", b"x", FileType::Basic, false),
            Err(DiskError::BadName { .. })
        ));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut dsk = fresh_disk();
        dsk.insert("Hello.Bas", b"data", FileType::Basic, false).unwrap();
        assert!(dsk.find("hello.bas").is_some());
        assert_eq!(dsk.extract("HELLO.BAS").unwrap(), b"data");
    }

    #[test]
    fn free_count_matches_granule_arithmetic() {
        let mut dsk = fresh_disk();
        dsk.insert("A.DAT", &vec![0u8; 100], FileType::Data, false).unwrap();
        dsk.insert("B.DAT", &vec![0u8; 2305], FileType::Data, false).unwrap();
        dsk.insert("C.DAT", &vec![0u8; 6912], FileType::Data, false).unwrap();
        // 1 + 2 + 3 granules used.
        assert_eq!(dsk.free_granules(), GRANULE_COUNT - 6);

        dsk.delete("B.DAT").unwrap();
        assert_eq!(dsk.free_granules(), GRANULE_COUNT - 4);
    }

    #[test]
    fn fragmented_chain_round_trips() {
        let mut dsk = fresh_disk();
        dsk.insert("A.DAT", &vec![0xAAu8; 2304], FileType::Data, false).unwrap();
        dsk.insert("B.DAT", &vec![0xBBu8; 2304], FileType::Data, false).unwrap();
        dsk.insert("C.DAT", &vec![0xCCu8; 2304], FileType::Data, false).unwrap();
        // Freeing A and C leaves holes at granules 0 and 2; the next insert
        // spans them.
        dsk.delete("A.DAT").unwrap();
        dsk.delete("C.DAT").unwrap();
        let data: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        dsk.insert("FRAG.BIN", &data, FileType::MachineLanguage, false)
            .unwrap();
        let entry = dsk.find("FRAG.BIN").unwrap();
        assert_eq!(entry.first_granule, 0);
        assert_eq!(dsk.extract("FRAG.BIN").unwrap(), data);
    }

    #[test]
    fn jvc_image_mutations_round_trip() {
        let mut dsk = DskImage::format(35, 1, true).unwrap();
        let data = vec![0x5Au8; 700];
        dsk.insert("PROG.BIN", &data, FileType::MachineLanguage, false)
            .unwrap();
        let remounted = DskImage::from_bytes(dsk.as_bytes().to_vec()).unwrap();
        assert_eq!(remounted.extract("PROG.BIN").unwrap(), data);
    }
}
