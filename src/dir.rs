//! DECB directory entries and the track-17 directory scan.
//!
//! The directory lives in sectors 3–11 of track 17, eight 32-byte slots per
//! sector, 72 slots in all.  Entry layout:
//!
//! | Offset | Size | Field                                          |
//! |--------|------|------------------------------------------------|
//! |   0    |   8  | filename, ASCII, space-padded                  |
//! |   8    |   3  | extension, ASCII, space-padded                 |
//! |  11    |   1  | file type (0=BASIC 1=DATA 2=ML 3=TEXT)         |
//! |  12    |   1  | ascii flag (`0x00` binary, `0xFF` ASCII)       |
//! |  13    |   1  | first granule of the file's FAT chain          |
//! |  14    |   2  | bytes used in the file's last sector (BE)      |
//! |  16    |  16  | reserved, filled with `0xFF`                   |
//!
//! A slot whose first byte is `0x00` (never used) or `0xFF` (deleted) is
//! empty.  Deleting a file only tombstones the first byte, so a deleted slot
//! is indistinguishable from a fresh one — that matches DECB itself.

use std::fmt;

use serde::Serialize;

use crate::error::DiskError;
use crate::fat::GRANULE_COUNT;
use crate::image::SectorImage;

/// Directory track number; the same on every supported geometry.
pub const DIR_TRACK: u8 = 17;
/// FAT sector within the directory track.
pub const FAT_SECTOR: u8 = 2;
/// First sector holding directory slots.
pub const DIR_START_SECTOR: u8 = 3;
/// Last sector holding directory slots.
pub const DIR_END_SECTOR: u8 = 11;
/// Bytes per directory slot.
pub const ENTRY_SIZE: usize = 32;
/// Slots per directory sector (256 / 32).
pub const ENTRIES_PER_SECTOR: usize = 8;

/// DECB file type byte, as shown in directory listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FileType {
    Basic,
    Data,
    MachineLanguage,
    Text,
    Unknown(u8),
}

impl FileType {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => FileType::Basic,
            0x01 => FileType::Data,
            0x02 => FileType::MachineLanguage,
            0x03 => FileType::Text,
            other => FileType::Unknown(other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            FileType::Basic => 0x00,
            FileType::Data => 0x01,
            FileType::MachineLanguage => 0x02,
            FileType::Text => 0x03,
            FileType::Unknown(byte) => byte,
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileType::Basic => write!(f, "BASIC"),
            FileType::Data => write!(f, "DATA"),
            FileType::MachineLanguage => write!(f, "ML"),
            FileType::Text => write!(f, "TEXT"),
            FileType::Unknown(byte) => write!(f, "UNK({byte:02X})"),
        }
    }
}

/// A parsed directory entry.  Fields mirror the on-disk values; `filename`
/// and `extension` are stored trimmed of their space padding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirEntry {
    pub filename: String,
    pub extension: String,
    pub file_type: u8,
    pub ascii_flag: u8,
    pub first_granule: u8,
    pub last_sector_bytes: u16,
}

impl DirEntry {
    /// Parse a 32-byte slot.  Returns `None` for empty slots and for entries
    /// that fail validation (first granule beyond the FAT).
    pub fn parse(raw: &[u8]) -> Option<Self> {
        if raw.len() != ENTRY_SIZE {
            return None;
        }
        if raw[0] == 0x00 || raw[0] == 0xFF {
            return None;
        }
        let first_granule = raw[13];
        if first_granule as usize >= GRANULE_COUNT {
            return None;
        }
        Some(Self {
            filename: field_to_string(&raw[0..8]),
            extension: field_to_string(&raw[8..11]),
            file_type: raw[11],
            ascii_flag: raw[12],
            first_granule,
            last_sector_bytes: u16::from_be_bytes([raw[14], raw[15]]),
        })
    }

    /// Encode as a 32-byte slot, space-padding the name fields and filling
    /// the reserved tail with `0xFF`.
    pub fn encode(&self) -> [u8; ENTRY_SIZE] {
        let mut raw = [0u8; ENTRY_SIZE];
        write_padded(&mut raw[0..8], &self.filename);
        write_padded(&mut raw[8..11], &self.extension);
        raw[11] = self.file_type;
        raw[12] = self.ascii_flag;
        raw[13] = self.first_granule;
        raw[14..16].copy_from_slice(&self.last_sector_bytes.to_be_bytes());
        raw[16..32].fill(0xFF);
        raw
    }

    /// Canonical `NAME.EXT` form (no dot when the extension is empty).
    pub fn full_name(&self) -> String {
        if self.extension.is_empty() {
            self.filename.clone()
        } else {
            format!("{}.{}", self.filename, self.extension)
        }
    }

    pub fn file_type(&self) -> FileType {
        FileType::from_byte(self.file_type)
    }

    /// `true` when the ascii flag marks this as an ASCII-mode file.
    pub fn is_ascii(&self) -> bool {
        self.ascii_flag == 0xFF
    }
}

fn field_to_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .filter(|b| b.is_ascii())
        .map(|&b| b as char)
        .collect::<String>()
        .trim_end()
        .to_string()
}

fn write_padded(dest: &mut [u8], value: &str) {
    dest.fill(b' ');
    let bytes = value.as_bytes();
    let len = bytes.len().min(dest.len());
    dest[..len].copy_from_slice(&bytes[..len]);
}

/// Normalize a host filename to DECB 8.3 form.
///
/// Splits on the last `.`, uppercases, and truncates to 8 and 3 characters.
/// Rejects names that are empty or contain anything outside printable ASCII
/// — uppercasing non-ASCII bytes has no defined meaning on a CoCo disk.
pub fn normalize_name(name: &str) -> Result<(String, String), DiskError> {
    let (base, ext) = match name.rfind('.') {
        Some(dot) => (&name[..dot], &name[dot + 1..]),
        None => (name, ""),
    };
    if base.is_empty() {
        return Err(DiskError::BadName {
            name: name.to_string(),
            reason: "empty file name".to_string(),
        });
    }
    for part in [base, ext] {
        if let Some(bad) = part.chars().find(|c| !c.is_ascii_graphic()) {
            return Err(DiskError::BadName {
                name: name.to_string(),
                reason: format!("character {bad:?} is not printable ASCII"),
            });
        }
    }
    let base: String = base.chars().take(8).collect::<String>().to_ascii_uppercase();
    let ext: String = ext.chars().take(3).collect::<String>().to_ascii_uppercase();
    Ok((base, ext))
}

/// Canonical `NAME.EXT` lookup key for a host-supplied name, uppercased but
/// not truncated — lookup must not silently match a longer name.
fn lookup_key(name: &str) -> String {
    name.trim().to_ascii_uppercase()
}

/// Scan the directory sectors for active entries, in slot order.
pub fn read_directory(image: &SectorImage) -> Result<Vec<DirEntry>, DiskError> {
    let mut entries = Vec::new();
    for sector in DIR_START_SECTOR..=DIR_END_SECTOR {
        let data = image.read_sector(DIR_TRACK, sector)?;
        for slot in 0..ENTRIES_PER_SECTOR {
            let offset = slot * ENTRY_SIZE;
            if let Some(entry) = DirEntry::parse(&data[offset..offset + ENTRY_SIZE]) {
                entries.push(entry);
            }
        }
    }
    Ok(entries)
}

/// Find the first empty slot.  Returns `(sector, byte_offset)` within the
/// directory track, or `None` when all 72 slots are taken.
pub fn find_free_slot(image: &SectorImage) -> Result<Option<(u8, usize)>, DiskError> {
    for sector in DIR_START_SECTOR..=DIR_END_SECTOR {
        let data = image.read_sector(DIR_TRACK, sector)?;
        for slot in 0..ENTRIES_PER_SECTOR {
            let offset = slot * ENTRY_SIZE;
            if data[offset] == 0x00 || data[offset] == 0xFF {
                return Ok(Some((sector, offset)));
            }
        }
    }
    Ok(None)
}

/// Locate an active entry by case-insensitive `NAME.EXT` match.  Returns the
/// slot's `(sector, byte_offset)` along with the parsed entry.
pub fn locate_entry(
    image: &SectorImage,
    name: &str,
) -> Result<Option<(u8, usize, DirEntry)>, DiskError> {
    let key = lookup_key(name);
    for sector in DIR_START_SECTOR..=DIR_END_SECTOR {
        let data = image.read_sector(DIR_TRACK, sector)?;
        for slot in 0..ENTRIES_PER_SECTOR {
            let offset = slot * ENTRY_SIZE;
            if let Some(entry) = DirEntry::parse(&data[offset..offset + ENTRY_SIZE]) {
                if entry.full_name().to_ascii_uppercase() == key {
                    return Ok(Some((sector, offset, entry)));
                }
            }
        }
    }
    Ok(None)
}
