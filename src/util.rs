use zerocopy::byteorder::{LittleEndian, U16, U32};
use zerocopy::{AsBytes, FromBytes, Unaligned};

pub(crate) type Le16 = U16<LittleEndian>;
pub(crate) type Le32 = U32<LittleEndian>;

#[derive(Debug, AsBytes, FromBytes, Unaligned, PartialEq, Eq, Clone, Copy)]
#[repr(C)]
pub(crate) struct BlockMagic(pub(crate) [u8; 4]);

/// Index of a block on the device.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub struct BlockId(pub u32);

pub(crate) const BLOCK_ID_NULL: BlockId = BlockId(0xFFFFFFFF);

impl From<Le32> for BlockId {
    fn from(v: Le32) -> Self {
        BlockId(v.get())
    }
}

impl From<BlockId> for Le32 {
    fn from(v: BlockId) -> Self {
        Le32::new(v.0)
    }
}

pub(crate) const CRC: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_CKSUM);

/// Every on-media record starts with a 4 byte magic followed by a 4 byte CRC.
const CRC_RANGE: core::ops::Range<usize> = 4..8;

fn record_crc(record: &[u8]) -> u32 {
    let mut digest = CRC.digest();
    digest.update(&record[..CRC_RANGE.start]);
    digest.update(&[0u8; 4]);
    digest.update(&record[CRC_RANGE.end..]);
    digest.finalize()
}

/// Store the checksum of `record` (computed with its CRC field zeroed) in its CRC field.
pub(crate) fn seal(record: &mut [u8]) {
    let crc = record_crc(record);
    record[CRC_RANGE].copy_from_slice(&crc.to_le_bytes());
}

pub(crate) fn is_sealed(record: &[u8]) -> bool {
    if record.len() < CRC_RANGE.end {
        return false;
    }
    let mut stored = [0u8; 4];
    stored.copy_from_slice(&record[CRC_RANGE]);
    u32::from_le_bytes(stored) == record_crc(record)
}
