use alloc::vec::Vec;

#[cfg(feature = "alloc")]
use alloc::string::String;

use log::debug;
use zerocopy::byteorder::little_endian::U64;
use zerocopy::{FromBytes, IntoBytes};
use zerocopy_derive::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::io::{read_exact, read_vec, write_all};
use crate::{DiskRead, DiskWrite, GptError};

use super::GPT_ENTRY_SIZE;

/// Size of the partition name field, in UTF-16 code units.
const NAME_LEN: usize = 36;

/// On-disk layout of the fixed partition entry fields.
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct PartitionLayout {
    type_guid: [u8; 16],
    partition_guid: [u8; 16],
    start_lba: U64,
    last_lba: U64,
    attributes: [u8; 8],
    partition_name: [u8; NAME_LEN * 2],
}

assert_eq_size!(PartitionLayout, [u8; GPT_ENTRY_SIZE]);
assert_eq_align!(PartitionLayout, u8);

/// One slot of the GUID Partition Entry array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GptPartition {
    /// Defines the purpose and type of this partition. All zeroes for an unused slot.
    pub type_guid: [u8; 16],

    /// GUID unique for every partition entry.
    pub partition_guid: [u8; 16],

    /// Starting LBA of this partition.
    pub start_lba: u64,

    /// Last LBA of this partition (inclusive).
    pub last_lba: u64,

    /// Partition's attributes bits.
    pub attributes: [u8; 8],

    /// Null-terminated UTF-16LE string containing a human-readable name of this partition.
    pub partition_name: [u8; NAME_LEN * 2],

    /// Bytes past the standard entry fields, up to the entry size declared by the header.
    /// Usually empty.
    pub trailing: Vec<u8>,
}

impl GptPartition {
    /// Creates a new standard-sized entry with a random unique GUID.
    ///
    /// # Examples
    ///
    /// ```
    /// use efipart::GptPartition;
    /// use uuid::uuid;
    ///
    /// let esp = GptPartition::new(uuid!("C12A7328-F81F-11D2-BA4B-00A0C93EC93B"), 2048, 4095, "esp");
    ///
    /// assert_eq!(esp.name().unwrap(), "esp");
    /// assert_eq!(esp.sectors_count(), 2048);
    /// ```
    #[cfg(feature = "std")]
    pub fn new(type_guid: uuid::Uuid, start_lba: u64, last_lba: u64, name: &str) -> Self {
        let mut part = Self {
            type_guid: type_guid.to_bytes_le(),
            partition_guid: uuid::Uuid::new_v4().to_bytes_le(),
            start_lba,
            last_lba,
            ..Self::default()
        };
        part.set_name(name);

        part
    }

    /// Reads one entry of `entry_size` bytes from the current position of `device`.
    pub fn parse_from_device<D>(device: &mut D, entry_size: u32) -> Result<Self, GptError>
    where
        D: DiskRead + ?Sized,
    {
        let trailing_len = (entry_size as usize)
            .checked_sub(GPT_ENTRY_SIZE)
            .ok_or(GptError::EntrySizeTooSmall(entry_size))?;

        let mut raw = [0u8; GPT_ENTRY_SIZE];
        read_exact(device, &mut raw)?;

        let layout =
            PartitionLayout::read_from_bytes(&raw).map_err(|_| GptError::MalformedStream {
                wanted: GPT_ENTRY_SIZE,
                got: raw.len(),
            })?;

        let trailing = read_vec(device, trailing_len)?;

        Ok(Self {
            type_guid: layout.type_guid,
            partition_guid: layout.partition_guid,
            start_lba: layout.start_lba.get(),
            last_lba: layout.last_lba.get(),
            attributes: layout.attributes,
            partition_name: layout.partition_name,
            trailing,
        })
    }

    /// Writes this entry at the current position of `device`.
    ///
    /// `entry_size` must account for exactly the standard fields and this entry's
    /// [`trailing`](Self::trailing) bytes, otherwise every following slot would be misplaced.
    pub fn write_to_device<D>(&self, device: &mut D, entry_size: u32) -> Result<(), GptError>
    where
        D: DiskWrite + ?Sized,
    {
        let mut buf = Vec::with_capacity(GPT_ENTRY_SIZE + self.trailing.len());
        self.encode_into(entry_size, &mut buf)?;

        write_all(device, &buf)
    }

    /// Returns `true` if this slot describes a partition.
    pub fn is_used(&self) -> bool {
        !self.is_empty()
    }

    /// Returns `true` if this slot is unused, i.e. its type GUID is all zeroes.
    pub fn is_empty(&self) -> bool {
        self.type_guid == [0; 16]
    }

    /// Returns this partition's sectors count, bounds included.
    pub fn sectors_count(&self) -> u64 {
        if self.is_empty() {
            return 0;
        }

        self.last_lba
            .saturating_sub(self.start_lba)
            .saturating_add(1)
    }

    #[cfg(feature = "alloc")]
    pub fn name(&self) -> Result<String, GptError> {
        let units = self
            .partition_name
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .take_while(|&c| c != 0);

        char::decode_utf16(units)
            .collect::<Result<String, _>>()
            .map_err(|_| GptError::InvalidPartitionName)
    }

    /// Sets this partition's name, truncated to 36 UTF-16 code units.
    pub fn set_name(&mut self, name: &str) {
        self.partition_name = [0; NAME_LEN * 2];

        for (unit, dst) in name
            .encode_utf16()
            .take(NAME_LEN)
            .zip(self.partition_name.chunks_exact_mut(2))
        {
            dst.copy_from_slice(&unit.to_le_bytes());
        }
    }

    #[cfg(feature = "std")]
    #[must_use]
    pub fn type_uuid(&self) -> uuid::Uuid {
        uuid::Uuid::from_bytes_le(self.type_guid)
    }

    #[cfg(feature = "std")]
    #[must_use]
    pub fn partition_uuid(&self) -> uuid::Uuid {
        uuid::Uuid::from_bytes_le(self.partition_guid)
    }

    pub(crate) fn encode_into(&self, entry_size: u32, buf: &mut Vec<u8>) -> Result<(), GptError> {
        let actual_size = GPT_ENTRY_SIZE + self.trailing.len();

        if entry_size as usize != actual_size {
            debug!("partition entry is {actual_size} bytes, table declares {entry_size}");
            return Err(GptError::EntrySizeMismatch {
                expected: u32::try_from(actual_size).unwrap_or(u32::MAX),
                given: entry_size,
            });
        }

        let layout = PartitionLayout {
            type_guid: self.type_guid,
            partition_guid: self.partition_guid,
            start_lba: U64::new(self.start_lba),
            last_lba: U64::new(self.last_lba),
            attributes: self.attributes,
            partition_name: self.partition_name,
        };

        buf.extend_from_slice(layout.as_bytes());
        buf.extend_from_slice(&self.trailing);

        Ok(())
    }
}

impl Default for GptPartition {
    fn default() -> Self {
        Self {
            type_guid: Default::default(),
            partition_guid: Default::default(),
            start_lba: Default::default(),
            last_lba: Default::default(),
            attributes: Default::default(),
            partition_name: [0u8; NAME_LEN * 2],
            trailing: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::vec;
    use std::vec::Vec;

    use base64::prelude::*;

    use super::GptPartition;
    use crate::gpt::tests::GPT_TEST_ENTRY;
    use crate::GptError;

    fn entry_bytes() -> Vec<u8> {
        BASE64_STANDARD.decode(GPT_TEST_ENTRY).unwrap()
    }

    #[test]
    pub fn parse_partition() {
        let part = GptPartition::parse_from_device(&mut Cursor::new(entry_bytes()), 128).unwrap();

        assert_eq!(
            part.type_guid,
            [40, 115, 42, 193, 31, 248, 210, 17, 186, 75, 0, 160, 201, 62, 201, 59]
        );
        assert_eq!(
            part.type_uuid(),
            uuid::uuid!("C12A7328-F81F-11D2-BA4B-00A0C93EC93B")
        );
        assert_eq!(
            part.partition_guid,
            [176, 80, 47, 220, 222, 152, 129, 70, 168, 104, 66, 233, 254, 189, 110, 62]
        );
        assert_eq!(part.start_lba, 2048);
        assert_eq!(part.last_lba, 780_287);
        assert_eq!(part.sectors_count(), 778_240);
        assert_eq!(part.attributes, [0; 8]);
        assert_eq!(part.partition_name, [0; 72]);
        assert_eq!(part.name().unwrap(), "");
        assert!(part.trailing.is_empty());
        assert!(part.is_used());
    }

    #[test]
    pub fn partition_round_trip_with_trailing() {
        let mut bytes = entry_bytes();
        bytes[126] = 215;
        bytes.extend_from_slice(&[1, 231, 144, 66, 123, 15, 18, 26, 0]);

        let part = GptPartition::parse_from_device(&mut Cursor::new(bytes.clone()), 137).unwrap();
        assert_eq!(part.trailing, [1, 231, 144, 66, 123, 15, 18, 26, 0]);

        let mut out: Vec<u8> = Vec::new();
        part.write_to_device(&mut out, 137).unwrap();

        assert_eq!(out, bytes);
    }

    #[test]
    pub fn partition_size_guard() {
        let part = GptPartition {
            trailing: vec![1, 2, 3],
            ..GptPartition::default()
        };

        let mut out: Vec<u8> = Vec::new();

        assert_eq!(
            part.write_to_device(&mut out, 130),
            Err(GptError::EntrySizeMismatch {
                expected: 131,
                given: 130
            })
        );
        assert_eq!(
            part.write_to_device(&mut out, 132),
            Err(GptError::EntrySizeMismatch {
                expected: 131,
                given: 132
            })
        );
        assert!(out.is_empty());

        part.write_to_device(&mut out, 131).unwrap();
        assert_eq!(out.len(), 131);
    }

    #[test]
    pub fn entry_size_too_small() {
        assert_eq!(
            GptPartition::parse_from_device(&mut Cursor::new(entry_bytes()), 127),
            Err(GptError::EntrySizeTooSmall(127))
        );
    }

    #[test]
    pub fn truncated_entry() {
        assert_eq!(
            GptPartition::parse_from_device(&mut Cursor::new(entry_bytes()), 256),
            Err(GptError::MalformedStream {
                wanted: 128,
                got: 0
            })
        );
        assert_eq!(
            GptPartition::parse_from_device(&mut Cursor::new(&entry_bytes()[..100]), 128),
            Err(GptError::MalformedStream {
                wanted: 128,
                got: 100
            })
        );
    }

    #[test]
    pub fn partition_names() {
        let mut part = GptPartition::default();
        assert!(part.is_empty());
        assert_eq!(part.sectors_count(), 0);

        part.set_name("part_a");
        assert_eq!(part.name().unwrap(), "part_a");
        assert_eq!(&part.partition_name[..4], &[b'p', 0, b'a', 0]);

        part.set_name("a name that is definitely longer than thirty-six units");
        assert_eq!(part.name().unwrap(), "a name that is definitely longer tha");

        // Unpaired high surrogate.
        part.partition_name[..2].copy_from_slice(&0xD800u16.to_le_bytes());
        part.partition_name[2..4].copy_from_slice(&0x0041u16.to_le_bytes());
        assert_eq!(part.name(), Err(GptError::InvalidPartitionName));
    }

    #[test]
    pub fn new_partition_has_unique_guid() {
        let esp = uuid::uuid!("C12A7328-F81F-11D2-BA4B-00A0C93EC93B");
        let a = GptPartition::new(esp, 2048, 4095, "a");
        let b = GptPartition::new(esp, 4096, 8191, "b");

        assert_ne!(a.partition_guid, b.partition_guid);
        assert_eq!(a.type_uuid(), esp);
        assert_eq!(a.partition_uuid().get_version_num(), 4);
    }
}
