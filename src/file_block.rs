use crate::error::ErrorKind;
use crate::util::{is_sealed, seal, BlockId, BlockMagic, Le16, Le32};
use alloc::vec::Vec;
use log::{error, trace};
use zerocopy::{AsBytes, FromBytes, LayoutVerified, Unaligned};

pub(crate) const FILE_BLOCK_MAGIC: BlockMagic = BlockMagic(*b"FILE");

pub(crate) const NAME_NLEN: usize = 48;

/// Head of a file: name, total size and the first part of its contents. Remaining bytes
/// live in a chain of data blocks starting at `next`.
#[derive(Debug, AsBytes, FromBytes, Unaligned, Clone)]
#[repr(C)]
pub(crate) struct FileBlock {
    magic: BlockMagic,
    crc: Le32,
    seq: Le32,
    next: Le32,
    size: Le32,
    name_len: Le16,
    reserved: Le16,
    name: [u8; NAME_NLEN],
}

pub(crate) fn validate_name(name: &str) -> Result<(), ErrorKind> {
    let bad_char = |c: char| c == '/' || c == '\0';
    if name.is_empty() || name.len() > NAME_NLEN || name.contains(bad_char) {
        return Err(ErrorKind::InvalidName);
    }
    Ok(())
}

impl FileBlock {
    pub(crate) const fn header_len() -> usize {
        core::mem::size_of::<FileBlock>()
    }

    /// Bytes of file contents held inline.
    pub(crate) const fn capacity(block_size: usize) -> usize {
        block_size - FileBlock::header_len()
    }

    pub(crate) fn new(name: &str, seq: u32, size: usize, next: BlockId) -> Result<Self, ErrorKind> {
        validate_name(name)?;
        let mut block = FileBlock {
            magic: FILE_BLOCK_MAGIC,
            crc: Le32::new(0),
            seq: Le32::new(seq),
            next: next.into(),
            size: Le32::new(size as u32),
            name_len: Le16::new(name.len() as u16),
            reserved: Le16::new(0),
            name: [0u8; NAME_NLEN],
        };
        block.name[..name.len()].copy_from_slice(name.as_bytes());
        Ok(block)
    }

    pub(crate) fn name(&self) -> Result<&str, ErrorKind> {
        let name_len = self.name_len.get() as usize;
        if name_len > NAME_NLEN {
            return Err(ErrorKind::InconsistentState);
        }
        core::str::from_utf8(&self.name[..name_len]).map_err(|_| ErrorKind::InconsistentState)
    }

    pub(crate) fn seq(&self) -> u32 {
        self.seq.get()
    }

    pub(crate) fn next(&self) -> BlockId {
        self.next.into()
    }

    pub(crate) fn size(&self) -> usize {
        self.size.get() as usize
    }

    pub(crate) fn inline_len(&self, block_size: usize) -> usize {
        core::cmp::min(self.size(), FileBlock::capacity(block_size))
    }

    /// Header followed by the inline contents, checksummed.
    pub(crate) fn to_record(&self, inline: &[u8]) -> Vec<u8> {
        let mut record = Vec::with_capacity(FileBlock::header_len() + inline.len());
        record.extend_from_slice(self.as_bytes());
        record.extend_from_slice(inline);
        seal(&mut record);
        record
    }

    /// Parse a record read from the start of a block. Returns the header and inline contents.
    pub(crate) fn parse(bytes: &[u8], block_size: usize) -> Result<(Self, &[u8]), ErrorKind> {
        let (block, rest): (LayoutVerified<_, FileBlock>, _) =
            LayoutVerified::new_unaligned_from_prefix(bytes).ok_or_else(|| {
                error!("Failure to create file block from bytes.");
                ErrorKind::InconsistentState
            })?;
        let block = (*block).clone();
        if block.magic != FILE_BLOCK_MAGIC {
            return Err(ErrorKind::InconsistentState);
        }
        let inline_len = block.inline_len(block_size);
        if rest.len() < inline_len {
            return Err(ErrorKind::InconsistentState);
        }
        let record_len = FileBlock::header_len() + inline_len;
        if !is_sealed(&bytes[..record_len]) {
            trace!("File block crc mismatch");
            return Err(ErrorKind::InconsistentState);
        }
        Ok((block, &rest[..inline_len]))
    }
}
