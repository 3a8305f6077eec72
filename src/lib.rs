//! Disk-image tooling for the TRS-80 Color Computer.
//!
//! Three pieces, usable together or alone:
//!
//! - [`dsk`] — read, write, format and mutate DECB `.DSK`/`.JVC` images;
//! - [`os9`] — read OS-9 RBF images (root listing and extraction);
//! - [`basic`] — turn tokenized Color BASIC programs back into source text.
//!
//! [`volume::Volume`] wraps the two filesystems behind one auto-detecting
//! handle for front-ends that take whatever image they are given.

pub mod basic;
pub mod dir;
pub mod dsk;
pub mod error;
pub mod fat;
pub mod image;
pub mod os9;
pub mod volume;

pub use basic::detokenize;
pub use dir::FileType;
pub use dsk::DskImage;
pub use error::DiskError;
pub use os9::Os9Image;
pub use volume::{Volume, VolumeKind};
