use core::fmt;

/// Error type when dealing with [`Gpt`](crate::Gpt) tables and their records.
///
/// Every variant is terminal for the operation that produced it: nothing is
/// retried, and no partially decoded structure is handed back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GptError {
    /// The underlying stream failed, or ended before `wanted` bytes could be transferred.
    MalformedStream { wanted: usize, got: usize },

    /// The underlying stream refused to seek to this absolute byte offset.
    Seek(u64),

    /// The header does not start with `"EFI PART"`. Holds the bytes actually found.
    BadSignature([u8; 8]),

    /// The header CRC32 does not match its content.
    BadHeaderChecksum { expected: u32, found: u32 },

    /// The partition entries CRC32 stored in the header does not match the array.
    BadPartitionsChecksum { expected: u32, found: u32 },

    /// A partition entry cannot be written at the declared entry size.
    EntrySizeMismatch { expected: u32, given: u32 },

    /// The table holds a different number of slots than its header declares.
    PartitionCountMismatch { declared: u32, found: usize },

    /// `lba * sector_size` does not fit in a stream offset.
    SeekOverflow { lba: u64, sector_size: u32 },

    /// Sector size is smaller than the fixed header fields.
    SectorTooSmall(u32),

    /// Entry size is smaller than the fixed partition entry fields.
    EntrySizeTooSmall(u32),

    /// The header size field points past the serialized header.
    InvalidHeaderSize { size: u32, available: usize },

    /// The partition name is not valid UTF-16.
    InvalidPartitionName,
}

impl fmt::Display for GptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedStream { wanted, got } => {
                write!(f, "malformed stream: wanted {wanted} bytes, got {got}")
            }
            Self::Seek(offset) => write!(f, "failed to seek to byte offset {offset:#x}"),
            Self::BadSignature(sig) => write!(f, "bad GPT signature {sig:02x?}"),
            Self::BadHeaderChecksum { expected, found } => write!(
                f,
                "bad GPT header checksum: expected {expected:#010x}, found {found:#010x}"
            ),
            Self::BadPartitionsChecksum { expected, found } => write!(
                f,
                "bad GPT partitions checksum: expected {expected:#010x}, found {found:#010x}"
            ),
            Self::EntrySizeMismatch { expected, given } => write!(
                f,
                "partition entry size mismatch: entry is {expected} bytes, table declares {given}"
            ),
            Self::PartitionCountMismatch { declared, found } => write!(
                f,
                "header declares {declared} partition entries, table holds {found}"
            ),
            Self::SeekOverflow { lba, sector_size } => write!(
                f,
                "seek overflow: LBA {lba} with {sector_size}-byte sectors"
            ),
            Self::SectorTooSmall(size) => write!(f, "sector size {size} is too small"),
            Self::EntrySizeTooSmall(size) => write!(f, "partition entry size {size} is too small"),
            Self::InvalidHeaderSize { size, available } => write!(
                f,
                "header size {size} exceeds the {available} serialized header bytes"
            ),
            Self::InvalidPartitionName => f.write_str("partition name is not valid UTF-16"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for GptError {}
