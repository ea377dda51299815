use alloc::vec;
use alloc::vec::Vec;

use log::debug;
use zerocopy::byteorder::little_endian::{U32, U64};
use zerocopy::{FromBytes, IntoBytes};
use zerocopy_derive::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::io::{read_exact, read_vec, write_all};
use crate::{DiskRead, DiskWrite, GptError};

use super::{GPT_ENTRY_SIZE, GPT_HEADER_SIZE, GPT_REVISION, GPT_SIG};

/// On-disk layout of the fixed header fields, all little-endian.
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct HeaderLayout {
    signature: [u8; 8],
    revision: U32,
    size: U32,
    checksum: U32,
    reserved: U32,
    lba: U64,
    alternate_lba: U64,
    first_usable_lba: U64,
    last_usable_lba: U64,
    disk_guid: [u8; 16],
    partition_start_lba: U64,
    partition_entries_count: U32,
    partition_entry_size: U32,
    partition_entries_checksum: U32,
}

assert_eq_size!(HeaderLayout, [u8; GPT_HEADER_SIZE]);
assert_eq_align!(HeaderLayout, u8);

/// GPT header, as stored on one sector of the disk.
///
/// The header describes the usable area of the disk and where the partition entries array lives.
/// Two copies exist on a disk (primary and alternate); this type represents either of them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GptHeader {
    /// Identifies EFI-compatible partition table header.
    /// Should contain the string "EFI PART".
    pub signature: [u8; 8],

    /// Revision number for this header.
    pub revision: u32,

    /// Size of the header in bytes, the range covered by [`checksum`](Self::checksum).
    pub size: u32,

    /// CRC32 checksum for the header, as last read.
    pub checksum: u32,

    /// Should be zero, but preserved as found.
    pub reserved: u32,

    /// The LBA that contains this structure.
    pub lba: u64,

    /// The LBA of the alternate `GPT` header.
    pub alternate_lba: u64,

    /// First logical block that may be used by a partition.
    pub first_usable_lba: u64,

    /// Last logical block that may be used by a partition.
    pub last_usable_lba: u64,

    /// GUID used to identify the disk, in its on-disk (mixed-endian) form.
    pub disk_guid: [u8; 16],

    /// Starting LBA of the GUID Partition Entry array.
    pub partition_start_lba: u64,

    /// Number of partitions entries in the GUID Partition Entry array.
    pub partition_entries_count: u32,

    /// Size in bytes of each entry in the GUID Partition Entry array.
    pub partition_entry_size: u32,

    /// CRC32 of the GUID Partition Entry array.
    pub partition_entries_checksum: u32,

    /// Rest of the header sector, kept verbatim.
    pub trailing: Vec<u8>,
}

impl GptHeader {
    /// Creates a new primary header for a disk with `sector_size`-byte sectors.
    ///
    /// The header lives on LBA 1 and describes 128 entries of 128 bytes starting on LBA 2.
    /// Usable LBAs, the alternate header location and the disk GUID are left to the caller.
    ///
    /// # Examples
    ///
    /// ```
    /// use efipart::{GptHeader, DEFAULT_SECTOR_SIZE};
    ///
    /// let header = GptHeader::new(DEFAULT_SECTOR_SIZE).unwrap();
    ///
    /// assert_eq!(header.trailing.len(), 420);
    /// assert!(GptHeader::new(64).is_err());
    /// ```
    pub fn new(sector_size: u32) -> Result<Self, GptError> {
        let trailing_len = trailing_len(sector_size)?;

        Ok(Self {
            signature: *GPT_SIG,
            revision: GPT_REVISION,
            size: GPT_HEADER_SIZE as u32,
            checksum: 0,
            reserved: 0,
            lba: 1,
            alternate_lba: 0,
            first_usable_lba: 0,
            last_usable_lba: 0,
            disk_guid: [0; 16],
            partition_start_lba: 2,
            partition_entries_count: 128,
            partition_entry_size: GPT_ENTRY_SIZE as u32,
            partition_entries_checksum: 0,
            trailing: vec![0; trailing_len],
        })
    }

    /// Reads a header from the current position of `device`.
    ///
    /// Reads one full sector: the fixed fields, then `sector_size - 92` trailing bytes.
    /// The signature and the header checksum are verified before returning.
    pub fn parse_from_device<D>(device: &mut D, sector_size: u32) -> Result<Self, GptError>
    where
        D: DiskRead + ?Sized,
    {
        let trailing_len = trailing_len(sector_size)?;

        let mut raw = [0u8; GPT_HEADER_SIZE];
        read_exact(device, &mut raw)?;

        let layout = HeaderLayout::read_from_bytes(&raw).map_err(|_| GptError::MalformedStream {
            wanted: GPT_HEADER_SIZE,
            got: raw.len(),
        })?;

        if &layout.signature != GPT_SIG {
            debug!("bad GPT signature {:02x?}", layout.signature);
            return Err(GptError::BadSignature(layout.signature));
        }

        let trailing = read_vec(device, trailing_len)?;
        let header = Self::from_layout(&layout, trailing);

        header.is_valid()?;

        Ok(header)
    }

    /// Writes this header at the current position of `device`.
    ///
    /// With `write_checksum`, a fresh CRC32 is computed and written in place of
    /// [`checksum`](Self::checksum); otherwise the checksum field is written as zero.
    /// `self` is left untouched either way.
    pub fn write_to_device<D>(&self, device: &mut D, write_checksum: bool) -> Result<(), GptError>
    where
        D: DiskWrite + ?Sized,
    {
        let checksum = if write_checksum {
            self.compute_checksum()?
        } else {
            0
        };

        let mut buf = Vec::with_capacity(GPT_HEADER_SIZE + self.trailing.len());
        self.encode_into(checksum, &mut buf);

        write_all(device, &buf)
    }

    /// Computes the CRC32 of this header, over its first [`size`](Self::size) serialized bytes
    /// with the checksum field zeroed.
    pub fn compute_checksum(&self) -> Result<u32, GptError> {
        let mut scratch = Vec::with_capacity(GPT_HEADER_SIZE + self.trailing.len());
        self.encode_into(0, &mut scratch);

        let covered = scratch
            .get(..self.size as usize)
            .ok_or(GptError::InvalidHeaderSize {
                size: self.size,
                available: scratch.len(),
            })?;

        Ok(crc32fast::hash(covered))
    }

    /// Interprets the disk GUID.
    #[cfg(feature = "std")]
    #[must_use]
    pub fn disk_uuid(&self) -> uuid::Uuid {
        uuid::Uuid::from_bytes_le(self.disk_guid)
    }

    /// Sets the disk GUID.
    #[cfg(feature = "std")]
    pub fn set_disk_uuid(&mut self, guid: uuid::Uuid) {
        self.disk_guid = guid.to_bytes_le();
    }

    fn is_valid(&self) -> Result<(), GptError> {
        let expected_checksum = match self.compute_checksum() {
            Ok(checksum) => checksum,
            // A size pointing past the sector cannot be the one the checksum was computed with.
            Err(GptError::InvalidHeaderSize { size, available }) => {
                debug!("GPT header size {size} exceeds the {available}-byte sector");

                let mut scratch = Vec::with_capacity(available);
                self.encode_into(0, &mut scratch);

                return Err(GptError::BadHeaderChecksum {
                    expected: crc32fast::hash(&scratch),
                    found: self.checksum,
                });
            }
            Err(err) => return Err(err),
        };

        if expected_checksum != self.checksum {
            debug!(
                "bad GPT header checksum: expected {expected_checksum:#010x}, found {:#010x}",
                self.checksum
            );
            return Err(GptError::BadHeaderChecksum {
                expected: expected_checksum,
                found: self.checksum,
            });
        }

        Ok(())
    }

    fn from_layout(layout: &HeaderLayout, trailing: Vec<u8>) -> Self {
        Self {
            signature: layout.signature,
            revision: layout.revision.get(),
            size: layout.size.get(),
            checksum: layout.checksum.get(),
            reserved: layout.reserved.get(),
            lba: layout.lba.get(),
            alternate_lba: layout.alternate_lba.get(),
            first_usable_lba: layout.first_usable_lba.get(),
            last_usable_lba: layout.last_usable_lba.get(),
            disk_guid: layout.disk_guid,
            partition_start_lba: layout.partition_start_lba.get(),
            partition_entries_count: layout.partition_entries_count.get(),
            partition_entry_size: layout.partition_entry_size.get(),
            partition_entries_checksum: layout.partition_entries_checksum.get(),
            trailing,
        }
    }

    fn encode_into(&self, checksum: u32, buf: &mut Vec<u8>) {
        let layout = HeaderLayout {
            signature: self.signature,
            revision: U32::new(self.revision),
            size: U32::new(self.size),
            checksum: U32::new(checksum),
            reserved: U32::new(self.reserved),
            lba: U64::new(self.lba),
            alternate_lba: U64::new(self.alternate_lba),
            first_usable_lba: U64::new(self.first_usable_lba),
            last_usable_lba: U64::new(self.last_usable_lba),
            disk_guid: self.disk_guid,
            partition_start_lba: U64::new(self.partition_start_lba),
            partition_entries_count: U32::new(self.partition_entries_count),
            partition_entry_size: U32::new(self.partition_entry_size),
            partition_entries_checksum: U32::new(self.partition_entries_checksum),
        };

        buf.extend_from_slice(layout.as_bytes());
        buf.extend_from_slice(&self.trailing);
    }
}

fn trailing_len(sector_size: u32) -> Result<usize, GptError> {
    (sector_size as usize)
        .checked_sub(GPT_HEADER_SIZE)
        .ok_or(GptError::SectorTooSmall(sector_size))
}
