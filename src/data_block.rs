use crate::error::ErrorKind;
use crate::util::{is_sealed, seal, BlockId, BlockMagic, Le32};
use alloc::vec::Vec;
use log::error;
use zerocopy::{AsBytes, FromBytes, LayoutVerified, Unaligned};

pub(crate) const DATA_BLOCK_MAGIC: BlockMagic = BlockMagic(*b"DATA");

pub(crate) const FREE_BLOCK_MAGIC: BlockMagic = BlockMagic(*b"FREE");

#[derive(Debug, AsBytes, FromBytes, Unaligned, Clone)]
#[repr(C)]
pub(crate) struct DataBlock {
    magic: BlockMagic,
    crc: Le32,
    next: Le32,
    len: Le32,
}

impl DataBlock {
    pub(crate) const fn header_len() -> usize {
        core::mem::size_of::<DataBlock>()
    }

    pub(crate) const fn capacity(block_size: usize) -> usize {
        block_size - DataBlock::header_len()
    }

    pub(crate) fn new(next: BlockId, len: usize) -> Self {
        DataBlock {
            magic: DATA_BLOCK_MAGIC,
            crc: Le32::new(0),
            next: next.into(),
            len: Le32::new(len as u32),
        }
    }

    pub(crate) fn next(&self) -> BlockId {
        self.next.into()
    }

    pub(crate) fn len(&self) -> usize {
        self.len.get() as usize
    }

    pub(crate) fn to_record(&self, payload: &[u8]) -> Vec<u8> {
        let mut record = Vec::with_capacity(DataBlock::header_len() + payload.len());
        record.extend_from_slice(self.as_bytes());
        record.extend_from_slice(payload);
        seal(&mut record);
        record
    }

    pub(crate) fn parse(bytes: &[u8], block_size: usize) -> Result<(Self, &[u8]), ErrorKind> {
        let (block, rest): (LayoutVerified<_, DataBlock>, _) =
            LayoutVerified::new_unaligned_from_prefix(bytes).ok_or_else(|| {
                error!("Failure to create data block from bytes.");
                ErrorKind::InconsistentState
            })?;
        let block = (*block).clone();
        if block.magic != DATA_BLOCK_MAGIC {
            return Err(ErrorKind::InconsistentState);
        }
        let len = block.len();
        if len > DataBlock::capacity(block_size) || rest.len() < len {
            return Err(ErrorKind::InconsistentState);
        }
        if !is_sealed(&bytes[..DataBlock::header_len() + len]) {
            return Err(ErrorKind::InconsistentState);
        }
        Ok((block, &rest[..len]))
    }
}

/// Marker written at the start of released blocks so stale heads are not picked up on mount.
pub(crate) fn free_record() -> [u8; 8] {
    let mut record = [0u8; 8];
    record[..4].copy_from_slice(&FREE_BLOCK_MAGIC.0);
    seal(&mut record);
    record
}
