use crate::error::ErrorKind;
use crate::storage::Geometry;
use crate::util::{is_sealed, seal, BlockMagic, Le32};
use log::{error, warn};
use zerocopy::{AsBytes, FromBytes, LayoutVerified, Unaligned};

pub(crate) const SUPER_BLOCK_MAGIC: BlockMagic = BlockMagic(*b"EEFS");

pub(crate) const EEFS_VERSION: u32 = 1;

#[derive(Debug, AsBytes, FromBytes, Unaligned, Clone)]
#[repr(C)]
pub(crate) struct SuperBlock {
    magic: BlockMagic,
    crc: Le32,
    version: Le32,
    block_size: Le32,
    block_count: Le32,
}

impl SuperBlock {
    pub(crate) const fn len() -> usize {
        core::mem::size_of::<SuperBlock>()
    }

    pub(crate) fn new(geometry: &Geometry) -> Self {
        let mut block = SuperBlock {
            magic: SUPER_BLOCK_MAGIC,
            crc: Le32::new(0),
            version: Le32::new(EEFS_VERSION),
            block_size: Le32::new(geometry.block_size as u32),
            block_count: Le32::new(geometry.block_count as u32),
        };
        block.fix_crc();
        block
    }

    fn fix_crc(&mut self) {
        seal(self.as_bytes_mut());
    }

    /// Media is usable only if it was formatted by this version with the same geometry.
    pub(crate) fn validate(&self, geometry: &Geometry) -> Result<(), ErrorKind> {
        if self.version.get() != EEFS_VERSION {
            warn!("Unsupported version: {}", self.version.get());
            return Err(ErrorKind::NotFormatted);
        }
        let formatted = Geometry {
            block_size: self.block_size.get() as usize,
            block_count: self.block_count.get() as usize,
        };
        if formatted != *geometry {
            warn!(
                "Media formatted as {:?} but mounted as {:?}",
                formatted, geometry
            );
            return Err(ErrorKind::NotFormatted);
        }
        Ok(())
    }
}

impl TryFrom<&[u8]> for SuperBlock {
    type Error = ErrorKind;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let bytes = bytes.get(..SuperBlock::len()).ok_or(ErrorKind::NotFormatted)?;
        let block: Option<LayoutVerified<_, SuperBlock>> = LayoutVerified::new_unaligned(bytes);
        if let Some(block) = block {
            if block.magic != SUPER_BLOCK_MAGIC || !is_sealed(bytes) {
                return Err(ErrorKind::NotFormatted);
            }
            return Ok((*block).clone());
        }

        error!("Failure to create super block from bytes.");
        Err(ErrorKind::NotFormatted)
    }
}
