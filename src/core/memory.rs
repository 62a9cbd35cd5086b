use slotmap::{SlotMap, new_key_type};

pub type Addr = u32;

pub const MEMORY_SIZE: u32 = 2048;

new_key_type! {
    pub struct BlockId;
}

/// A free hole. `end` is inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub start: Addr,
    pub end: Addr,
    pub size: u32,
    next: Option<BlockId>,
}

impl Block {
    fn new(start: Addr, size: u32, next: Option<BlockId>) -> Self {
        Self {
            start,
            end: start + size - 1,
            size,
            next,
        }
    }
}

/// Best-fit allocator over a fixed address space, backed by an
/// address-ordered singly linked free list.
#[derive(Debug)]
pub struct MemoryAllocator {
    capacity: u32,
    blocks: SlotMap<BlockId, Block>,
    head: Option<BlockId>,
}

impl MemoryAllocator {
    pub fn new(capacity: u32) -> Self {
        assert!(capacity > 0, "Address space must not be empty");
        let mut blocks = SlotMap::with_key();
        let head = blocks.insert(Block::new(0, capacity, None));
        Self {
            capacity,
            blocks,
            head: Some(head),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn free_blocks(&self) -> FreeBlocks<'_> {
        FreeBlocks {
            blocks: &self.blocks,
            cursor: self.head,
        }
    }

    pub fn free_space(&self) -> u32 {
        self.free_blocks().map(|(_, block)| block.size).sum()
    }

    /// Carves `size` units out of the smallest hole that fits, lowest
    /// address first among equals.
    pub fn try_allocate(&mut self, size: u32) -> Option<Addr> {
        if size == 0 {
            return None;
        }

        // (candidate, its predecessor in the list)
        let mut best: Option<(BlockId, Option<BlockId>)> = None;
        let mut prev = None;
        for (id, block) in self.free_blocks() {
            let better = block.size >= size
                && best.map_or(true, |(best_id, _)| block.size < self.blocks[best_id].size);
            if better {
                best = Some((id, prev));
            }
            prev = Some(id);
        }

        let (id, prev) = best?;
        let block = &mut self.blocks[id];
        let addr = block.start;
        if block.size == size {
            let next = block.next;
            self.link(prev, next);
            self.blocks.remove(id);
        } else {
            block.start += size;
            block.size -= size;
        }
        Some(addr)
    }

    /// Returns `[addr, addr + size)` to the free list, merging with
    /// either neighbour when contiguous.
    pub fn release(&mut self, addr: Addr, size: u32) {
        debug_assert!(size > 0, "Released an empty range");
        debug_assert!(
            addr.checked_add(size).is_some_and(|end| end <= self.capacity),
            "Released range {addr}+{size} exceeds capacity {}",
            self.capacity
        );
        let end = addr + size - 1;

        let mut prev = None;
        let mut cursor = self.head;
        while let Some(id) = cursor {
            let block = &self.blocks[id];
            if block.end >= addr {
                break;
            }
            prev = Some(id);
            cursor = block.next;
        }
        let next = cursor;
        debug_assert!(
            next.map_or(true, |id| self.blocks[id].start > end),
            "Released range {addr}..={end} overlaps a free block"
        );

        let merged = match prev {
            Some(left) if self.blocks[left].end + 1 == addr => {
                let block = &mut self.blocks[left];
                block.end = end;
                block.size += size;
                left
            }
            _ => {
                let id = self.blocks.insert(Block::new(addr, size, next));
                self.link(prev, Some(id));
                id
            }
        };

        if let Some(right) = next {
            if self.blocks[right].start == self.blocks[merged].end + 1 {
                if let Some(right) = self.blocks.remove(right) {
                    let block = &mut self.blocks[merged];
                    block.end = right.end;
                    block.size += right.size;
                    block.next = right.next;
                }
            }
        }
    }

    fn link(&mut self, prev: Option<BlockId>, next: Option<BlockId>) {
        match prev {
            Some(prev) => self.blocks[prev].next = next,
            None => self.head = next,
        }
    }
}

pub struct FreeBlocks<'a> {
    blocks: &'a SlotMap<BlockId, Block>,
    cursor: Option<BlockId>,
}

impl<'a> Iterator for FreeBlocks<'a> {
    type Item = (BlockId, &'a Block);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        let block = &self.blocks[id];
        self.cursor = block.next;
        Some((id, block))
    }
}
