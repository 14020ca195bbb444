//! Block-backed record store: a hash set living inside one contiguous
//! byte block.
//!
//! The block can be memory-mapped and shared between processes, so the
//! set never stores a pointer: records are addressed by slot index and
//! byte offset from the block base.
//!
//! ```text
//! Offset               Size             Field
//! ------               ----             -----
//! 0                    4                capacity (u32)
//! 4                    4                num_slots (u32)
//! 8                    4                size: live records (u32)
//! 12                   4                free_head: free list (u32)
//! 16                   4 * num_slots    slot array: chain heads (u32)
//! align8(...)          capacity * R     record array, R = record size
//! ```
//!
//! Integers are native-endian in memory; the layout is not portable
//! across architectures with different endianness or alignment.
//!
//! Collisions chain through cell indices embedded in each record's
//! reserved link field. The free list threads through the same field.
//! `u32::MAX` terminates both.
//!
//! The set itself is not synchronized; [`BlockStatDataAllocator`] wraps
//! it in a process-local mutex. When the block is genuinely shared
//! between processes, that mutex only serializes one side and the callers
//! must layer a shared lock of their own.

use std::marker::PhantomData;
use std::ptr::NonNull;

use parking_lot::Mutex;
use tracing::debug;

use crate::allocator::{StatDataAllocator, StatRef};
use crate::config::{BlockOptions, StatsOptions};
use crate::error::StatsError;
use crate::raw::{RECORD_HEADER_SIZE, RawStatData};

/// Byte size of the block header.
pub const BLOCK_HEADER_BYTES: usize = 16;

/// Terminates slot chains and the free list.
const NO_CELL: u32 = u32::MAX;

#[inline]
fn align8(n: usize) -> usize {
    (n + 7) & !7
}

#[repr(C)]
struct BlockHeader {
    capacity: u32,
    num_slots: u32,
    size: u32,
    free_head: u32,
}

const _: () = assert!(std::mem::size_of::<BlockHeader>() == BLOCK_HEADER_BYTES);

/// A fixed-size record type that can live in a [`BlockMemoryHashSet`].
///
/// All methods take raw record addresses because the implementing type is
/// only a header; the record extends past it in memory.
pub trait BlockEntry {
    /// Canonical byte size of one record.
    fn record_size(stats_options: &StatsOptions) -> usize;

    /// Hash of a key. Must not depend on process-local state: the block
    /// may outlive the process that wrote it.
    fn hash(key: &str) -> u64;

    /// Initialize a freshly claimed record in place.
    ///
    /// # Safety
    ///
    /// `ptr` must address a full record inside the block, not currently
    /// linked into any chain.
    unsafe fn initialize(ptr: *mut u8, key: &str, stats_options: &StatsOptions);

    /// Mark a record as vacant again.
    ///
    /// # Safety
    ///
    /// `ptr` must address a full record inside the block.
    unsafe fn clear(ptr: *mut u8);

    /// Key stored in an initialized record.
    ///
    /// # Safety
    ///
    /// `ptr` must address a record previously passed to `initialize`.
    unsafe fn key<'a>(ptr: *const u8) -> &'a str;

    /// Read the chain link lent to the set.
    ///
    /// # Safety
    ///
    /// `ptr` must address a full record inside the block.
    unsafe fn next_cell(ptr: *const u8) -> u32;

    /// Write the chain link lent to the set.
    ///
    /// # Safety
    ///
    /// `ptr` must address a full record inside the block.
    unsafe fn set_next_cell(ptr: *mut u8, next: u32);
}

impl BlockEntry for RawStatData {
    fn record_size(stats_options: &StatsOptions) -> usize {
        RawStatData::record_size_with_options(stats_options)
    }

    fn hash(key: &str) -> u64 {
        RawStatData::hash(key)
    }

    unsafe fn initialize(ptr: *mut u8, key: &str, stats_options: &StatsOptions) {
        // SAFETY: forwarded contract.
        unsafe { RawStatData::initialize(ptr, key, stats_options) }
    }

    unsafe fn clear(ptr: *mut u8) {
        // An empty name marks the record uninitialized.
        // SAFETY: the name field follows the header inside the record.
        unsafe { *ptr.add(RECORD_HEADER_SIZE) = 0 }
    }

    unsafe fn key<'a>(ptr: *const u8) -> &'a str {
        // SAFETY: forwarded contract.
        unsafe { RawStatData::from_ptr(ptr).key() }
    }

    unsafe fn next_cell(ptr: *const u8) -> u32 {
        // SAFETY: zeroed or initialized records both have a valid header.
        unsafe { RawStatData::from_ptr(ptr).next_cell() }
    }

    unsafe fn set_next_cell(ptr: *mut u8, next: u32) {
        // SAFETY: as above.
        unsafe { RawStatData::from_ptr(ptr).set_next_cell(next) }
    }
}

/// Hash set whose storage is a single contiguous byte block. See the
/// module docs for the layout.
pub struct BlockMemoryHashSet<T: BlockEntry> {
    base: NonNull<u8>,
    options: BlockOptions,
    stats_options: StatsOptions,
    record_size: usize,
    records_offset: usize,
    _marker: PhantomData<T>,
}

// Safety: the set owns no thread-affine state; callers serialize access.
unsafe impl<T: BlockEntry> Send for BlockMemoryHashSet<T> {}

impl<T: BlockEntry> BlockMemoryHashSet<T> {
    /// Exact byte size of the block for the given options. The sole
    /// sizing primitive; callers pre-allocate.
    pub fn num_bytes(options: &BlockOptions, stats_options: &StatsOptions) -> usize {
        let slots_end = BLOCK_HEADER_BYTES + 4 * options.num_slots as usize;
        align8(slots_end) + options.capacity as usize * T::record_size(stats_options)
    }

    /// Attach over caller-provided memory. With `init=true` the metadata
    /// is written from scratch; with `init=false` the existing contents
    /// are sanity-checked against `options` and reused (the restart
    /// path).
    ///
    /// # Safety
    ///
    /// `base` must be 8-byte aligned and point to at least `len` bytes
    /// that stay valid and writable for the life of the set and are not
    /// accessed except through it (or through a cooperating set in
    /// another process, with external locking).
    pub unsafe fn attach(
        base: NonNull<u8>,
        len: usize,
        init: bool,
        options: &BlockOptions,
        stats_options: &StatsOptions,
    ) -> Result<Self, StatsError> {
        assert!(base.as_ptr() as usize % 8 == 0, "block base misaligned");
        assert!(options.num_slots > 0, "block needs at least one slot");

        let needed = Self::num_bytes(options, stats_options);
        if len < needed {
            return Err(StatsError::BlockTooSmall {
                needed,
                actual: len,
            });
        }

        let slots_end = BLOCK_HEADER_BYTES + 4 * options.num_slots as usize;
        let mut set = Self {
            base,
            options: *options,
            stats_options: *stats_options,
            record_size: T::record_size(stats_options),
            records_offset: align8(slots_end),
            _marker: PhantomData,
        };

        if init {
            set.init_metadata();
            debug!(
                capacity = options.capacity,
                num_slots = options.num_slots,
                bytes = needed,
                "initialized stats block"
            );
        } else {
            set.sanity_check()?;
            debug!(
                capacity = options.capacity,
                live = set.size(),
                "reattached stats block"
            );
        }
        Ok(set)
    }

    fn init_metadata(&mut self) {
        let capacity = self.options.capacity;
        let num_slots = self.options.num_slots;

        for slot in 0..num_slots {
            self.set_slot(slot, NO_CELL);
        }
        // Thread every cell onto the free list in index order.
        for cell in 0..capacity {
            let next = if cell + 1 < capacity { cell + 1 } else { NO_CELL };
            // SAFETY: cell < capacity addresses a record inside the block.
            unsafe {
                T::clear(self.cell_ptr(cell));
                T::set_next_cell(self.cell_ptr(cell), next);
            }
        }

        let header = self.header_mut();
        header.capacity = capacity;
        header.num_slots = num_slots;
        header.size = 0;
        header.free_head = if capacity > 0 { 0 } else { NO_CELL };
    }

    fn sanity_check(&self) -> Result<(), StatsError> {
        let header = self.header();
        if header.capacity != self.options.capacity || header.num_slots != self.options.num_slots {
            return Err(StatsError::BlockMismatch {
                expected_capacity: self.options.capacity,
                found_capacity: header.capacity,
                expected_slots: self.options.num_slots,
                found_slots: header.num_slots,
            });
        }
        if header.size > header.capacity {
            return Err(StatsError::BlockCorrupt("size exceeds capacity"));
        }

        // Every cell is either chained from a slot or on the free list,
        // and chain walks must terminate within capacity steps.
        let mut chained: u64 = 0;
        for slot in 0..header.num_slots {
            let mut index = self.slot(slot);
            let mut steps = 0u32;
            while index != NO_CELL {
                if index >= header.capacity {
                    return Err(StatsError::BlockCorrupt("chain index out of range"));
                }
                steps += 1;
                if steps > header.capacity {
                    return Err(StatsError::BlockCorrupt("cycle in slot chain"));
                }
                // SAFETY: index checked against capacity above.
                index = unsafe { T::next_cell(self.cell_ptr(index)) };
            }
            chained += u64::from(steps);
        }
        if chained != u64::from(header.size) {
            return Err(StatsError::BlockCorrupt("slot chains disagree with size"));
        }

        let mut free = 0u32;
        let mut index = header.free_head;
        while index != NO_CELL {
            if index >= header.capacity {
                return Err(StatsError::BlockCorrupt("free index out of range"));
            }
            free += 1;
            if free > header.capacity {
                return Err(StatsError::BlockCorrupt("cycle in free list"));
            }
            // SAFETY: index checked against capacity above.
            index = unsafe { T::next_cell(self.cell_ptr(index)) };
        }
        if free != header.capacity - header.size {
            return Err(StatsError::BlockCorrupt("free list disagrees with size"));
        }
        Ok(())
    }

    /// Number of live records.
    pub fn size(&self) -> u32 {
        self.header().size
    }

    /// Find the record for `key`, if present.
    pub fn get(&self, key: &str) -> Option<NonNull<u8>> {
        let slot = self.slot_of(key);
        let mut index = self.slot(slot);
        while index != NO_CELL {
            let ptr = self.cell_ptr(index);
            // SAFETY: chained cells hold initialized records.
            unsafe {
                if T::key(ptr) == key {
                    return Some(NonNull::new_unchecked(ptr));
                }
                index = T::next_cell(ptr);
            }
        }
        None
    }

    /// Get-or-create the record for `key`. The `bool` is true when the
    /// record was freshly created. Returns `None` when every cell is
    /// occupied.
    pub fn insert(&mut self, key: &str) -> Option<(NonNull<u8>, bool)> {
        if let Some(ptr) = self.get(key) {
            return Some((ptr, false));
        }

        let free = self.header().free_head;
        if free == NO_CELL {
            return None;
        }

        let slot = self.slot_of(key);
        let ptr = self.cell_ptr(free);
        // SAFETY: `free` came off the free list, so the cell is vacant and
        // unlinked; reading its link first preserves the rest of the list.
        unsafe {
            let next_free = T::next_cell(ptr);
            T::initialize(ptr, key, &self.stats_options);
            T::set_next_cell(ptr, self.slot(slot));
            self.set_slot(slot, free);
            let header = self.header_mut();
            header.free_head = next_free;
            header.size += 1;
            Some((NonNull::new_unchecked(ptr), true))
        }
    }

    /// Unlink the record for `key` and return its cell to the free list.
    pub fn remove(&mut self, key: &str) -> bool {
        let slot = self.slot_of(key);
        let mut index = self.slot(slot);
        let mut prev = NO_CELL;
        while index != NO_CELL {
            let ptr = self.cell_ptr(index);
            // SAFETY: chained cells hold initialized records.
            unsafe {
                if T::key(ptr) == key {
                    let next = T::next_cell(ptr);
                    if prev == NO_CELL {
                        self.set_slot(slot, next);
                    } else {
                        T::set_next_cell(self.cell_ptr(prev), next);
                    }
                    T::clear(ptr);
                    T::set_next_cell(ptr, self.header().free_head);
                    let header = self.header_mut();
                    header.free_head = index;
                    header.size -= 1;
                    return true;
                }
                prev = index;
                index = T::next_cell(ptr);
            }
        }
        false
    }

    #[inline]
    fn slot_of(&self, key: &str) -> u32 {
        (T::hash(key) % u64::from(self.options.num_slots)) as u32
    }

    #[inline]
    fn header(&self) -> &BlockHeader {
        // SAFETY: attach() verified size and alignment of the block.
        unsafe { &*(self.base.as_ptr() as *const BlockHeader) }
    }

    #[inline]
    fn header_mut(&mut self) -> &mut BlockHeader {
        // SAFETY: as above, plus &mut self.
        unsafe { &mut *(self.base.as_ptr() as *mut BlockHeader) }
    }

    #[inline]
    fn slot(&self, slot: u32) -> u32 {
        debug_assert!(slot < self.options.num_slots);
        // SAFETY: the slot array sits inside the verified block.
        unsafe {
            (self.base.as_ptr().add(BLOCK_HEADER_BYTES) as *const u32)
                .add(slot as usize)
                .read()
        }
    }

    #[inline]
    fn set_slot(&mut self, slot: u32, index: u32) {
        debug_assert!(slot < self.options.num_slots);
        // SAFETY: as above.
        unsafe {
            (self.base.as_ptr().add(BLOCK_HEADER_BYTES) as *mut u32)
                .add(slot as usize)
                .write(index)
        }
    }

    #[inline]
    fn cell_ptr(&self, index: u32) -> *mut u8 {
        debug_assert!(index < self.options.capacity);
        // SAFETY: index < capacity keeps the record inside the block.
        unsafe {
            self.base
                .as_ptr()
                .add(self.records_offset + index as usize * self.record_size)
        }
    }
}

/// An anonymous shared memory mapping. `MAP_SHARED` keeps the pages
/// common across `fork()`, which is how the block reaches a successor
/// process.
pub struct SharedBlock {
    ptr: NonNull<u8>,
    len: usize,
}

// Safety: raw shared memory; synchronization is the users' concern.
unsafe impl Send for SharedBlock {}
unsafe impl Sync for SharedBlock {}

impl SharedBlock {
    pub fn new(len: usize) -> Result<Self, std::io::Error> {
        // SAFETY: plain anonymous mapping request; result is checked.
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED || ptr.is_null() {
            return Err(std::io::Error::last_os_error());
        }
        Ok(Self {
            // SAFETY: null was rejected above.
            ptr: unsafe { NonNull::new_unchecked(ptr as *mut u8) },
            len,
        })
    }

    #[inline]
    pub fn base(&self) -> NonNull<u8> {
        self.ptr
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for SharedBlock {
    fn drop(&mut self) {
        // SAFETY: mapping came from mmap with this length.
        let result = unsafe { libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.len) };
        debug_assert_eq!(result, 0, "munmap failed");
    }
}

/// Record allocator backed by a [`BlockMemoryHashSet`]. Same contract as
/// the heap variant, except that names longer than the configured bound
/// are silently truncated (truncated names alias one another) and
/// `alloc` returns `None` when every cell is occupied.
pub struct BlockStatDataAllocator {
    options: StatsOptions,
    set: Mutex<BlockMemoryHashSet<RawStatData>>,
    /// Owned backing when constructed via [`new`](Self::new).
    _block: Option<SharedBlock>,
}

impl BlockStatDataAllocator {
    /// Exact block size for the given options.
    pub fn num_bytes(options: &BlockOptions, stats_options: &StatsOptions) -> usize {
        BlockMemoryHashSet::<RawStatData>::num_bytes(options, stats_options)
    }

    /// Allocate a fresh shared mapping and initialize a set inside it.
    pub fn new(options: &BlockOptions, stats_options: &StatsOptions) -> Result<Self, StatsError> {
        let block = SharedBlock::new(Self::num_bytes(options, stats_options))?;
        // SAFETY: the mapping is page-aligned, exactly sized, and owned
        // by the allocator for its whole life.
        let set = unsafe {
            BlockMemoryHashSet::attach(block.base(), block.len(), true, options, stats_options)?
        };
        Ok(Self {
            options: *stats_options,
            set: Mutex::new(set),
            _block: Some(block),
        })
    }

    /// Attach over caller-managed memory, e.g. a mapping inherited from a
    /// predecessor process (`init=false`).
    ///
    /// # Safety
    ///
    /// Same contract as [`BlockMemoryHashSet::attach`].
    pub unsafe fn attach(
        base: NonNull<u8>,
        len: usize,
        init: bool,
        options: &BlockOptions,
        stats_options: &StatsOptions,
    ) -> Result<Self, StatsError> {
        // SAFETY: forwarded contract.
        let set = unsafe { BlockMemoryHashSet::attach(base, len, init, options, stats_options)? };
        Ok(Self {
            options: *stats_options,
            set: Mutex::new(set),
            _block: None,
        })
    }

    /// Number of live records.
    pub fn size(&self) -> u32 {
        self.set.lock().size()
    }
}

/// Clamp a name to the configured bound without splitting a UTF-8
/// character.
fn truncate_name(name: &str, max: usize) -> &str {
    if name.len() <= max {
        return name;
    }
    let mut end = max;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

impl StatDataAllocator for BlockStatDataAllocator {
    fn alloc(&self, name: &str) -> Option<StatRef> {
        let name = truncate_name(name, self.options.max_name_length);
        let mut set = self.set.lock();
        let (ptr, created) = set.insert(name)?;
        if !created {
            // SAFETY: the record is live while it is in the set.
            unsafe { RawStatData::from_ptr(ptr.as_ptr()) }.incr_ref();
        }
        Some(StatRef::new(ptr))
    }

    fn free(&self, data: StatRef) {
        let mut set = self.set.lock();
        // SAFETY: free() is only called with live handles.
        let record = unsafe { data.get() };
        if record.decr_ref() == 1 {
            // SAFETY: still initialized; remove() is what retires it.
            let key = unsafe { record.key() };
            let removed = set.remove(key);
            debug_assert!(removed, "freeing unknown stat '{key}'");
        }
    }

    fn stats_options(&self) -> &StatsOptions {
        &self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_options() -> (BlockOptions, StatsOptions) {
        (
            BlockOptions {
                capacity: 8,
                num_slots: 13,
            },
            StatsOptions::default(),
        )
    }

    #[test]
    fn test_num_bytes() {
        let (block, stats) = small_options();
        let record = RawStatData::record_size(stats.max_name_length);
        // header 16 + 13*4 = 68 -> 72, then 8 records
        assert_eq!(
            BlockStatDataAllocator::num_bytes(&block, &stats),
            72 + 8 * record
        );
    }

    #[test]
    fn test_alloc_free_lifecycle() {
        let (block, stats) = small_options();
        let allocator = BlockStatDataAllocator::new(&block, &stats).unwrap();

        let a = allocator.alloc("x.y").unwrap();
        let b = allocator.alloc("x.y").unwrap();
        assert_eq!(a.as_ptr(), b.as_ptr());
        assert_eq!(allocator.size(), 1);

        allocator.free(b);
        // SAFETY: `a` still holds a reference.
        let record = unsafe { a.get() };
        assert_eq!(record.ref_count(), 1);
        assert_eq!(unsafe { record.key() }, "x.y");

        allocator.free(a);
        assert_eq!(allocator.size(), 0);
    }

    #[test]
    fn test_full_block_returns_none() {
        let stats = StatsOptions::default();
        let block = BlockOptions {
            capacity: 2,
            num_slots: 5,
        };
        let allocator = BlockStatDataAllocator::new(&block, &stats).unwrap();

        let x = allocator.alloc("x").unwrap();
        let y = allocator.alloc("y").unwrap();
        assert!(allocator.alloc("z").is_none());
        // An existing name still resolves when the block is full.
        let x2 = allocator.alloc("x").unwrap();
        assert_eq!(x.as_ptr(), x2.as_ptr());

        allocator.free(x2);
        allocator.free(y);
        // Freeing the last reference opens a cell again.
        allocator.free(x);
        assert!(allocator.alloc("z").is_some());
    }

    #[test]
    fn test_truncated_names_alias() {
        let stats = StatsOptions {
            max_name_length: 8,
            ..Default::default()
        };
        let block = BlockOptions {
            capacity: 4,
            num_slots: 7,
        };
        let allocator = BlockStatDataAllocator::new(&block, &stats).unwrap();

        let a = allocator.alloc("cluster.a.requests").unwrap();
        let b = allocator.alloc("cluster.b.requests").unwrap();
        // Both truncate to "cluster." and collapse onto one record.
        assert_eq!(a.as_ptr(), b.as_ptr());
        assert_eq!(unsafe { a.get().key() }, "cluster.");
        assert_eq!(allocator.size(), 1);

        allocator.free(a);
        allocator.free(b);
    }

    #[test]
    fn test_chaining_in_one_slot() {
        // One slot forces every record into a single chain.
        let stats = StatsOptions::default();
        let block = BlockOptions {
            capacity: 4,
            num_slots: 1,
        };
        let (options, stats_options) = (block, stats);
        let size = BlockMemoryHashSet::<RawStatData>::num_bytes(&options, &stats_options);
        let mapping = SharedBlock::new(size).unwrap();
        let mut set = unsafe {
            BlockMemoryHashSet::<RawStatData>::attach(
                mapping.base(),
                mapping.len(),
                true,
                &options,
                &stats_options,
            )
            .unwrap()
        };

        let (a, created_a) = set.insert("a").unwrap();
        assert!(created_a);
        set.insert("b").unwrap();
        set.insert("c").unwrap();
        assert_eq!(set.size(), 3);

        // Unlink from the middle of the chain.
        assert!(set.remove("b"));
        assert!(set.get("b").is_none());
        assert_eq!(set.get("a"), Some(a));
        assert!(set.get("c").is_some());
        assert_eq!(set.size(), 2);

        // The freed cell is reusable.
        let (_, created_d) = set.insert("d").unwrap();
        assert!(created_d);
        let (_, created_e) = set.insert("e").unwrap();
        assert!(created_e);
        assert!(set.insert("f").is_none());
    }

    #[test]
    fn test_reattach_preserves_records() {
        let (block, stats) = small_options();
        let size = BlockStatDataAllocator::num_bytes(&block, &stats);
        let mapping = SharedBlock::new(size).unwrap();

        {
            let allocator = unsafe {
                BlockStatDataAllocator::attach(mapping.base(), mapping.len(), true, &block, &stats)
                    .unwrap()
            };
            let c = allocator.alloc("persist.me").unwrap();
            unsafe { c.get() }.add_value(17);
            // The predecessor exits without freeing; its reference stays
            // counted in the shared record.
        }

        let allocator = unsafe {
            BlockStatDataAllocator::attach(mapping.base(), mapping.len(), false, &block, &stats)
                .unwrap()
        };
        assert_eq!(allocator.size(), 1);
        let c = allocator.alloc("persist.me").unwrap();
        let record = unsafe { c.get() };
        assert_eq!(record.value(), 17);
        assert_eq!(record.ref_count(), 2);
    }

    #[test]
    fn test_reattach_rejects_mismatched_options() {
        let (block, stats) = small_options();
        let size = BlockStatDataAllocator::num_bytes(&block, &stats);
        let mapping = SharedBlock::new(size).unwrap();
        unsafe {
            BlockStatDataAllocator::attach(mapping.base(), mapping.len(), true, &block, &stats)
                .unwrap();
        }

        let bigger = BlockOptions {
            capacity: block.capacity + 1,
            ..block
        };
        let result = unsafe {
            BlockStatDataAllocator::attach(mapping.base(), mapping.len(), false, &bigger, &stats)
        };
        assert!(matches!(
            result,
            Err(StatsError::BlockTooSmall { .. }) | Err(StatsError::BlockMismatch { .. })
        ));
    }

    #[test]
    fn test_attach_rejects_short_block() {
        let (block, stats) = small_options();
        let size = BlockStatDataAllocator::num_bytes(&block, &stats);
        let mapping = SharedBlock::new(size - 8).unwrap();
        let result = unsafe {
            BlockStatDataAllocator::attach(mapping.base(), mapping.len(), true, &block, &stats)
        };
        assert!(matches!(result, Err(StatsError::BlockTooSmall { .. })));
    }

    #[test]
    fn test_truncate_name_respects_char_boundaries() {
        assert_eq!(truncate_name("abcdef", 4), "abcd");
        assert_eq!(truncate_name("abc", 4), "abc");
        // Multi-byte character straddling the cut.
        assert_eq!(truncate_name("ab\u{00e9}d", 3), "ab");
    }
}
