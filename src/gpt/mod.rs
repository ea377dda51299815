//! GPT (_GUID Partition Table_) handling
//!
//! A GPT disk stores a header on LBA 1 (and a mirror copy on the last LBA), describing an array
//! of fixed-size partition entries. Both the header and the entries array are protected by a
//! CRC32 checksum.

mod header;
mod partition;

use alloc::vec::Vec;

use log::{debug, trace};

pub use header::GptHeader;
pub use partition::GptPartition;

use crate::io::{seek_to, write_all};
use crate::offset::byte_offset;
use crate::{DiskRead, DiskSeek, DiskWrite, GptError};

/// Size of the fixed header fields, in bytes.
pub const GPT_HEADER_SIZE: usize = 0x5C;

/// Size of the standard partition entry fields, in bytes.
pub const GPT_ENTRY_SIZE: usize = 0x80;

pub const GPT_SIG: &[u8; 8] = b"EFI PART";

/// Header revision 1.0.
pub const GPT_REVISION: u32 = 0x0001_0000;

/// A GPT header along with its complete partition entries array.
///
/// A `Gpt` is either parsed from a device, in which case both checksums have been verified, or
/// assembled by hand before being written. Checksums are always recomputed on write, so the
/// stored values of a hand-assembled table do not matter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Gpt {
    /// Size of a logical block of the device, in bytes.
    pub sector_size: u32,

    pub header: GptHeader,

    /// Every slot of the entries array, in on-disk order. Empty slots included.
    pub partitions: Vec<GptPartition>,
}

impl Gpt {
    /// Reads a GPT from `device`, which must be positioned at the start of a header.
    ///
    /// The partition entries array is then read from the location given by the header, and its
    /// checksum verified.
    pub fn parse_from_device<D>(device: &mut D, sector_size: u32) -> Result<Self, GptError>
    where
        D: DiskRead + DiskSeek + ?Sized,
    {
        let header = GptHeader::parse_from_device(device, sector_size)?;
        trace!(
            "GPT header at LBA {}: {} entries of {} bytes at LBA {}",
            header.lba,
            header.partition_entries_count,
            header.partition_entry_size,
            header.partition_start_lba
        );

        seek_to(device, byte_offset(header.partition_start_lba, sector_size)?)?;

        let mut partitions = Vec::with_capacity((header.partition_entries_count as usize).min(128));
        for _ in 0..header.partition_entries_count {
            partitions.push(GptPartition::parse_from_device(
                device,
                header.partition_entry_size,
            )?);
        }
        trace!("read {} GPT entries", partitions.len());

        let expected_checksum = entries_checksum(&partitions, header.partition_entry_size)?;

        if expected_checksum != header.partition_entries_checksum {
            debug!(
                "bad GPT partitions checksum: expected {expected_checksum:#010x}, found {:#010x}",
                header.partition_entries_checksum
            );
            return Err(GptError::BadPartitionsChecksum {
                expected: expected_checksum,
                found: header.partition_entries_checksum,
            });
        }

        Ok(Self {
            sector_size,
            header,
            partitions,
        })
    }

    /// Writes the header and the partition entries array to `device`.
    ///
    /// The current position of `device` does not matter: the header is written at the LBA it
    /// declares for itself, and the entries at the LBA it declares for the array. Both
    /// checksums are computed fresh; `self` is not modified.
    ///
    /// Only this copy of the header is written. Keeping the alternate copy in sync is up to the
    /// caller.
    pub fn write_to_device<D>(&self, device: &mut D) -> Result<(), GptError>
    where
        D: DiskWrite + DiskSeek + ?Sized,
    {
        if self.partitions.len() != self.header.partition_entries_count as usize {
            return Err(GptError::PartitionCountMismatch {
                declared: self.header.partition_entries_count,
                found: self.partitions.len(),
            });
        }

        let header = GptHeader {
            partition_entries_checksum: self.partitions_checksum()?,
            ..self.header.clone()
        };

        let header_offset = byte_offset(header.lba, self.sector_size)?;
        let entries_offset = byte_offset(header.partition_start_lba, self.sector_size)?;

        seek_to(device, header_offset)?;
        header.write_to_device(device, true)?;
        trace!("wrote GPT header at {header_offset:#x}");

        seek_to(device, entries_offset)?;
        let mut buf = Vec::new();
        for part in &self.partitions {
            buf.clear();
            part.encode_into(header.partition_entry_size, &mut buf)?;
            write_all(device, &buf)?;
        }
        trace!(
            "wrote {} GPT entries at {entries_offset:#x}",
            self.partitions.len()
        );

        Ok(())
    }

    /// Computes the CRC32 of the partition entries array, each entry serialized at the entry size
    /// declared by the header.
    pub fn partitions_checksum(&self) -> Result<u32, GptError> {
        entries_checksum(&self.partitions, self.header.partition_entry_size)
    }

    /// Stores freshly computed checksums in this table's header, as they would be written.
    pub fn update_checksums(&mut self) -> Result<(), GptError> {
        self.header.partition_entries_checksum = self.partitions_checksum()?;
        self.header.checksum = self.header.compute_checksum()?;

        Ok(())
    }

    /// Returns the slot at index `slot`, used or not.
    pub fn get_partition(&self, slot: usize) -> Option<&GptPartition> {
        self.partitions.get(slot)
    }

    /// Iterates over used slots, along with their slot index.
    pub fn iter_partitions(&self) -> impl Iterator<Item = (usize, &GptPartition)> {
        self.partitions
            .iter()
            .enumerate()
            .filter(|(_, part)| part.is_used())
    }
}

fn entries_checksum(partitions: &[GptPartition], entry_size: u32) -> Result<u32, GptError> {
    let mut hasher = crc32fast::Hasher::new();
    let mut scratch = Vec::new();

    for part in partitions {
        scratch.clear();
        part.encode_into(entry_size, &mut scratch)?;
        hasher.update(&scratch);
    }

    Ok(hasher.finalize())
}
