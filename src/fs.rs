//! Flat-namespace filesystem engine over a [`BlockDevice`].
//!
//! Block 0 holds the super block. Every other block is either a file head, a data block
//! chained from a head, or free. A file is replaced by writing a complete new chain and
//! then its head, so the previous version stays intact until the new head lands. Heads
//! carry a sequence number; if two heads share a name at mount time the higher one wins
//! and the other is reclaimed.

use crate::data_block::{free_record, DataBlock};
use crate::error::ErrorKind;
use crate::file_block::{validate_name, FileBlock};
use crate::storage::{BlockDevice, Geometry};
use crate::super_block::SuperBlock;
use crate::util::{BlockId, BLOCK_ID_NULL};
use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use log::{debug, info, trace, warn};
use zerocopy::AsBytes;

struct Inode {
    seq: u32,
    size: usize,
    /// Head first, then data blocks in chain order.
    blocks: Vec<BlockId>,
}

/// Mount failure. The device is handed back so the caller keeps its bus.
pub struct MountError<D> {
    pub kind: ErrorKind,
    pub device: D,
}

impl<D> fmt::Debug for MountError<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountError").field("kind", &self.kind).finish()
    }
}

pub struct EeFs<D: BlockDevice> {
    device: D,
    geometry: Geometry,
    used: Vec<bool>,
    inodes: BTreeMap<String, Inode>,
    seq: u32,
    cursor: usize,
}

/// Smallest layout that holds a super block plus one file head.
pub(crate) fn check_geometry(geometry: &Geometry) -> Result<(), ErrorKind> {
    if geometry.block_count < 2
        || geometry.block_count >= BLOCK_ID_NULL.0 as usize
        || geometry.block_size <= FileBlock::header_len()
    {
        warn!("Geometry {:?} cannot hold a filesystem", geometry);
        return Err(ErrorKind::InvalidConfig);
    }
    Ok(())
}

impl<D: BlockDevice> EeFs<D> {
    /// Write an empty filesystem over the whole device.
    pub fn format(device: &mut D) -> Result<(), ErrorKind> {
        let geometry = device.geometry();
        check_geometry(&geometry)?;
        info!("Formatting {:?}", geometry);

        // Invalidate the old super block first so an interrupted format never mounts.
        let free = free_record();
        device.write(0, &free)?;
        device.erase(0, geometry.capacity())?;
        for idx in 1..geometry.block_count {
            device.write(idx * geometry.block_size, &free)?;
        }
        device.write(0, SuperBlock::new(&geometry).as_bytes())?;
        Ok(())
    }

    /// Load an existing filesystem. Never formats.
    pub fn mount(device: D) -> Result<Self, MountError<D>> {
        let geometry = device.geometry();
        if let Err(kind) = check_geometry(&geometry) {
            return Err(MountError { kind, device });
        }
        let mut fs = EeFs {
            device,
            geometry,
            used: vec![false; geometry.block_count],
            inodes: BTreeMap::new(),
            seq: 0,
            cursor: 1,
        };
        match fs.load() {
            Ok(()) => {
                info!(
                    "Mounted {:?} with {} files, {} free blocks",
                    geometry,
                    fs.inodes.len(),
                    fs.free_blocks()
                );
                Ok(fs)
            }
            Err(kind) => {
                warn!("Mount failed: {:?}", kind);
                Err(MountError {
                    kind,
                    device: fs.device,
                })
            }
        }
    }

    pub fn into_device(self) -> D {
        self.device
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Names of all files, sorted.
    pub fn list(&self) -> Vec<String> {
        self.inodes.keys().cloned().collect()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.inodes.contains_key(name)
    }

    pub fn size(&self, name: &str) -> Result<usize, ErrorKind> {
        self.inodes
            .get(name)
            .map(|inode| inode.size)
            .ok_or(ErrorKind::NoEntry)
    }

    pub fn free_blocks(&self) -> usize {
        self.used.iter().filter(|used| !**used).count()
    }

    pub fn read(&mut self, name: &str) -> Result<Vec<u8>, ErrorKind> {
        let inode = self.inodes.get(name).ok_or(ErrorKind::NoEntry)?;
        let block_size = self.geometry.block_size;
        let size = inode.size;
        trace!("rd file: {} size: {}", name, size);

        let inline_len = core::cmp::min(size, FileBlock::capacity(block_size));
        let mut bytes = vec![0u8; FileBlock::header_len() + inline_len];
        self.device
            .read(inode.blocks[0].0 as usize * block_size, &mut bytes)?;
        let (head, inline) = FileBlock::parse(&bytes, block_size)?;
        if head.size() != size || head.seq() != inode.seq {
            warn!("Head of {} changed underneath the index", name);
            return Err(ErrorKind::InconsistentState);
        }

        let mut contents = Vec::with_capacity(size);
        contents.extend_from_slice(inline);
        let mut next = head.next();
        while contents.len() < size {
            if next == BLOCK_ID_NULL || next.0 as usize >= self.geometry.block_count {
                warn!("Chain of {} ends early at {} bytes", name, contents.len());
                return Err(ErrorKind::InconsistentState);
            }
            let len = core::cmp::min(size - contents.len(), DataBlock::capacity(block_size));
            let mut bytes = vec![0u8; DataBlock::header_len() + len];
            self.device.read(next.0 as usize * block_size, &mut bytes)?;
            let (data, payload) = DataBlock::parse(&bytes, block_size)?;
            if payload.len() != len {
                return Err(ErrorKind::InconsistentState);
            }
            contents.extend_from_slice(payload);
            next = data.next();
        }
        Ok(contents)
    }

    /// Create or replace `name` with `data`.
    ///
    /// The new version needs free blocks of its own; the old one is released only after
    /// the new head is written.
    pub fn write(&mut self, name: &str, data: &[u8]) -> Result<(), ErrorKind> {
        validate_name(name)?;
        if data.len() > u32::MAX as usize {
            return Err(ErrorKind::OutOfSpace);
        }
        let block_size = self.geometry.block_size;
        let inline_len = core::cmp::min(data.len(), FileBlock::capacity(block_size));
        let (inline, rest) = data.split_at(inline_len);
        let chunks: Vec<&[u8]> = rest.chunks(DataBlock::capacity(block_size)).collect();
        let ids = self.allocate(1 + chunks.len())?;
        debug!(
            "wr file: {} len: {} blocks: {:?}",
            name,
            data.len(),
            ids
        );

        for (i, chunk) in chunks.iter().enumerate() {
            let next = ids.get(i + 2).copied().unwrap_or(BLOCK_ID_NULL);
            let record = DataBlock::new(next, chunk.len()).to_record(chunk);
            self.device.write(ids[i + 1].0 as usize * block_size, &record)?;
        }

        let seq = self.seq.wrapping_add(1);
        let first = ids.get(1).copied().unwrap_or(BLOCK_ID_NULL);
        let head = FileBlock::new(name, seq, data.len(), first)?;
        self.device
            .write(ids[0].0 as usize * block_size, &head.to_record(inline))?;
        self.seq = seq;

        for id in &ids {
            self.used[id.0 as usize] = true;
        }
        let old = self.inodes.insert(
            name.to_string(),
            Inode {
                seq,
                size: data.len(),
                blocks: ids,
            },
        );
        if let Some(old) = old {
            // A failure here leaves the old head on media; the next mount discards it by
            // sequence number.
            self.release(&old)?;
        }
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<(), ErrorKind> {
        let inode = self.inodes.remove(name).ok_or(ErrorKind::NoEntry)?;
        if let Err(e) = self.release(&inode) {
            self.inodes.insert(name.to_string(), inode);
            return Err(e);
        }
        debug!("Removed {}", name);
        Ok(())
    }

    fn release(&mut self, inode: &Inode) -> Result<(), ErrorKind> {
        let head = inode.blocks[0];
        self.device
            .write(head.0 as usize * self.geometry.block_size, &free_record())?;
        for id in &inode.blocks {
            self.used[id.0 as usize] = false;
        }
        Ok(())
    }

    /// Pick `n` free blocks, continuing from where the previous allocation stopped so
    /// writes rotate over the device.
    fn allocate(&mut self, n: usize) -> Result<Vec<BlockId>, ErrorKind> {
        let count = self.geometry.block_count;
        let mut ids = Vec::with_capacity(n);
        let mut idx = self.cursor;
        for _ in 1..count {
            if ids.len() == n {
                break;
            }
            if !self.used[idx] {
                ids.push(BlockId(idx as u32));
            }
            idx = if idx + 1 >= count { 1 } else { idx + 1 };
        }
        if ids.len() < n {
            warn!("Need {} blocks, {} free", n, self.free_blocks());
            return Err(ErrorKind::OutOfSpace);
        }
        self.cursor = idx;
        Ok(ids)
    }

    fn load(&mut self) -> Result<(), ErrorKind> {
        let block_size = self.geometry.block_size;
        let count = self.geometry.block_count;
        let mut bytes = vec![0u8; block_size];

        self.device.read(0, &mut bytes)?;
        SuperBlock::try_from(&bytes[..])?.validate(&self.geometry)?;
        self.used[0] = true;

        // Data block links and the newest head per name.
        let mut links: Vec<Option<(BlockId, usize)>> = vec![None; count];
        let mut heads: BTreeMap<String, (BlockId, FileBlock)> = BTreeMap::new();
        let mut stale = Vec::new();
        for idx in 1..count {
            self.device.read(idx * block_size, &mut bytes)?;
            if let Ok((data, payload)) = DataBlock::parse(&bytes, block_size) {
                links[idx] = Some((data.next(), payload.len()));
                continue;
            }
            let head = match FileBlock::parse(&bytes, block_size) {
                Ok((head, _)) => head,
                Err(_) => continue,
            };
            let name = match head.name() {
                Ok(name) => name.to_string(),
                Err(_) => continue,
            };
            let id = BlockId(idx as u32);
            self.seq = core::cmp::max(self.seq, head.seq());
            let newer = heads
                .get(&name)
                .map_or(true, |(_, prev)| head.seq() > prev.seq());
            if newer {
                if let Some((prev, _)) = heads.insert(name, (id, head)) {
                    stale.push(prev);
                }
            } else {
                stale.push(id);
            }
        }

        for (id, _) in heads.values() {
            self.used[id.0 as usize] = true;
        }
        for (name, (id, head)) in heads {
            let mut blocks = vec![id];
            let mut remaining = head.size() - head.inline_len(block_size);
            let mut next = head.next();
            while remaining > 0 && next != BLOCK_ID_NULL {
                let idx = next.0 as usize;
                let link = if idx < count && !self.used[idx] {
                    links[idx]
                } else {
                    None
                };
                match link {
                    Some((after, len)) => {
                        self.used[idx] = true;
                        blocks.push(next);
                        remaining = remaining.saturating_sub(len);
                        next = after;
                    }
                    None => {
                        warn!("Broken chain for {} at block {}", name, idx);
                        break;
                    }
                }
            }
            self.inodes.insert(
                name,
                Inode {
                    seq: head.seq(),
                    size: head.size(),
                    blocks,
                },
            );
        }

        for id in stale {
            warn!("Reclaiming superseded head at block {}", id.0);
            self.device.write(id.0 as usize * block_size, &free_record())?;
        }
        Ok(())
    }
}
