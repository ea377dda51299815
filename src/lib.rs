//! Reading and writing of GUID Partition Table headers and partition entries arrays.
//!
//! The crate only deals with the on-disk records and their checksums: callers provide a seekable
//! stream over the device and its sector size.
//!
//! ```
//! use std::io::Cursor;
//!
//! use efipart::{Gpt, GptHeader, GptPartition, DEFAULT_SECTOR_SIZE};
//!
//! let mut header = GptHeader::new(DEFAULT_SECTOR_SIZE).unwrap();
//! header.partition_entries_count = 4;
//!
//! let gpt = Gpt {
//!     sector_size: DEFAULT_SECTOR_SIZE,
//!     header,
//!     partitions: vec![GptPartition::default(); 4],
//! };
//!
//! let mut disk = Cursor::new(Vec::new());
//! gpt.write_to_device(&mut disk).unwrap();
//!
//! disk.set_position(DEFAULT_SECTOR_SIZE.into());
//! let parsed = Gpt::parse_from_device(&mut disk, DEFAULT_SECTOR_SIZE).unwrap();
//!
//! assert_eq!(parsed.iter_partitions().count(), 0);
//! ```

#![no_std]

#[macro_use]
extern crate static_assertions;

mod error;
mod gpt;
mod io;
mod offset;

pub use error::GptError;
pub use gpt::{
    Gpt, GptHeader, GptPartition, GPT_ENTRY_SIZE, GPT_HEADER_SIZE, GPT_REVISION, GPT_SIG,
};
pub use offset::{byte_offset, checked_multiply};

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

/// Logical block size assumed by most devices.
pub const DEFAULT_SECTOR_SIZE: u32 = 0x200;

#[cfg(feature = "std")]
pub use std::io::Read as DiskRead;

#[cfg(feature = "std")]
pub use std::io::Write as DiskWrite;

#[cfg(feature = "std")]
pub use std::io::Seek as DiskSeek;

#[cfg(feature = "std")]
pub use std::io::SeekFrom;

#[derive(Clone, Copy, Debug)]
pub enum IoError {}

#[cfg(not(feature = "std"))]
pub trait DiskRead {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, IoError>;
}

#[cfg(not(feature = "std"))]
pub trait DiskWrite {
    fn write(&mut self, buf: &[u8]) -> Result<usize, IoError>;
}

#[cfg(not(feature = "std"))]
pub enum SeekFrom {
    Start(u64),
    End(i64),
    Current(i64),
}

#[cfg(not(feature = "std"))]
pub trait DiskSeek {
    fn seek(&mut self, pos: SeekFrom) -> Result<u64, IoError>;
}
