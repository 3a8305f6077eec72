//! A tagged façade over the two volume kinds.
//!
//! Front-ends don't want to care which filesystem a `.dsk` file carries, so
//! [`Volume::open`] sniffs the image with the OS-9 heuristic and mounts the
//! matching kind.  DECB volumes answer every operation; OS-9 volumes answer
//! reads and turn every mutation into [`DiskError::ReadOnly`].

use std::fs;
use std::path::Path;

use crate::dir::FileType;
use crate::dsk::DskImage;
use crate::error::DiskError;
use crate::fat::GRANULE_COUNT;
use crate::os9::{self, Os9Image};

/// Which filesystem a mounted volume carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeKind {
    Decb,
    Os9,
}

/// A mounted volume of either kind.
#[derive(Debug, Clone)]
pub enum Volume {
    Decb(DskImage),
    Os9(Os9Image),
}

impl Volume {
    /// Load an image file and mount it as whichever filesystem it carries.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DiskError> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|e| DiskError::Io {
            context: format!("reading disk image {}", path.display()),
            source: e,
        })?;
        if os9::detect(&data) {
            tracing::debug!(path = %path.display(), "image detected as OS-9 RBF");
            Ok(Volume::Os9(Os9Image::from_bytes(data)?))
        } else {
            Ok(Volume::Decb(DskImage::from_bytes(data)?))
        }
    }

    pub fn kind(&self) -> VolumeKind {
        match self {
            Volume::Decb(_) => VolumeKind::Decb,
            Volume::Os9(_) => VolumeKind::Os9,
        }
    }

    pub fn as_decb(&self) -> Option<&DskImage> {
        match self {
            Volume::Decb(dsk) => Some(dsk),
            Volume::Os9(_) => None,
        }
    }

    pub fn as_os9(&self) -> Option<&Os9Image> {
        match self {
            Volume::Decb(_) => None,
            Volume::Os9(image) => Some(image),
        }
    }

    /// File names in listing order, whichever kind the volume is.
    pub fn file_names(&self) -> Vec<String> {
        match self {
            Volume::Decb(dsk) => dsk.directory().iter().map(|e| e.full_name()).collect(),
            Volume::Os9(image) => image.root_entries().iter().map(|e| e.name.clone()).collect(),
        }
    }

    /// `(free units, total units)` — granules for DECB, clusters for OS-9.
    pub fn free_space(&self) -> (usize, usize) {
        match self {
            Volume::Decb(dsk) => (dsk.free_granules(), GRANULE_COUNT),
            Volume::Os9(image) => (
                image.free_clusters() as usize,
                image.descriptor().total_clusters() as usize,
            ),
        }
    }

    /// Read a file's bytes from either kind.
    pub fn extract(&self, name: &str) -> Result<Vec<u8>, DiskError> {
        match self {
            Volume::Decb(dsk) => dsk.extract(name),
            Volume::Os9(image) => image.read_file(name),
        }
    }

    /// Insert a file.  OS-9 volumes are read-only.
    pub fn insert(
        &mut self,
        name: &str,
        data: &[u8],
        file_type: FileType,
        ascii: bool,
    ) -> Result<(), DiskError> {
        match self {
            Volume::Decb(dsk) => dsk.insert(name, data, file_type, ascii),
            Volume::Os9(_) => Err(DiskError::ReadOnly),
        }
    }

    /// Delete a file.  OS-9 volumes are read-only.
    pub fn delete(&mut self, name: &str) -> Result<(), DiskError> {
        match self {
            Volume::Decb(dsk) => dsk.delete(name),
            Volume::Os9(_) => Err(DiskError::ReadOnly),
        }
    }

    /// Rename a file.  OS-9 volumes are read-only.
    pub fn rename(&mut self, old_name: &str, new_name: &str) -> Result<(), DiskError> {
        match self {
            Volume::Decb(dsk) => dsk.rename(old_name, new_name),
            Volume::Os9(_) => Err(DiskError::ReadOnly),
        }
    }

    /// Write the buffer back to a file.  OS-9 volumes are read-only.
    pub fn save_as(&self, path: impl AsRef<Path>) -> Result<(), DiskError> {
        match self {
            Volume::Decb(dsk) => dsk.save_as(path),
            Volume::Os9(_) => Err(DiskError::ReadOnly),
        }
    }
}
