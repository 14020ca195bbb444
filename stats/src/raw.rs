//! The raw stat record backing counters and gauges.
//!
//! Each record is a fixed atomic header followed by the stat's name
//! inline, zero-terminated:
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       8     value (atomic)
//! 8       8     pending_delta (atomic)
//! 16      2     flags (atomic)
//! 18      2     ref_count (atomic)
//! 20      4     chain: cell index lent to the block hash set
//! 24      n+1   name bytes, zero-terminated
//! ```
//!
//! The name field's capacity is fixed by `StatsOptions::max_name_length`,
//! so every record has the same byte size and records can be laid out in a
//! flat array (the block allocator does exactly that, possibly in shared
//! memory). Use [`RawStatData::record_size`] for sizing; `size_of` only
//! covers the header.
//!
//! `value` and `pending_delta` are updated with relaxed read-modify-write
//! operations outside any allocator lock; readers that publish snapshots
//! across threads should pair them with acquire/release edges of their
//! own.

use std::sync::atomic::{AtomicU16, AtomicU32, AtomicU64, Ordering};

use xxhash_rust::xxh64::xxh64;

use crate::config::StatsOptions;

/// Flag bits stored in [`RawStatData`]'s `flags` field.
pub mod flags {
    /// Set on the first write to the stat.
    pub const USED: u16 = 1 << 0;
}

/// Byte size of the fixed header preceding the inline name.
pub const RECORD_HEADER_SIZE: usize = 24;

/// Fixed-layout header of a stat record. The inline name follows directly
/// behind it in memory; see the module docs.
#[repr(C)]
pub struct RawStatData {
    value: AtomicU64,
    pending_delta: AtomicU64,
    flags: AtomicU16,
    ref_count: AtomicU16,
    /// Reserved cell used by the block hash set for slot chaining. Heap
    /// records leave it zero.
    chain: AtomicU32,
}

// The layout above is load-bearing for the block format.
const _: () = assert!(std::mem::size_of::<RawStatData>() == RECORD_HEADER_SIZE);
const _: () = assert!(std::mem::align_of::<RawStatData>() == 8);

impl RawStatData {
    /// Canonical byte size of one record: header, name capacity, NUL,
    /// rounded up to 8-byte alignment so records pack into an array.
    #[inline]
    pub fn record_size(max_name_length: usize) -> usize {
        (RECORD_HEADER_SIZE + max_name_length + 1 + 7) & !7
    }

    /// [`record_size`](Self::record_size) keyed off a full options struct.
    #[inline]
    pub fn record_size_with_options(options: &StatsOptions) -> usize {
        Self::record_size(options.max_name_length)
    }

    /// Hash of a stat name, computed over the raw dotted form so the same
    /// name always lands in the same slot regardless of symbol churn.
    #[inline]
    pub fn hash(key: &str) -> u64 {
        xxh64(key.as_bytes(), 0)
    }

    /// Initialize a record in place: `ref_count` 1, all other fields zero,
    /// `key` copied into the name field and zero-terminated.
    ///
    /// # Safety
    ///
    /// `ptr` must point to at least `record_size(options.max_name_length)`
    /// writable bytes, 8-byte aligned, with no live references into them.
    ///
    /// # Panics
    ///
    /// Panics if `key` exceeds the name capacity; callers truncate or
    /// reject first.
    pub unsafe fn initialize(ptr: *mut u8, key: &str, options: &StatsOptions) {
        assert!(
            key.len() <= options.max_name_length,
            "stat name too long: {} > {}",
            key.len(),
            options.max_name_length
        );
        // SAFETY: caller guarantees ptr covers the full record exclusively.
        unsafe {
            let data = &mut *(ptr as *mut RawStatData);
            data.value = AtomicU64::new(0);
            data.pending_delta = AtomicU64::new(0);
            data.flags = AtomicU16::new(0);
            data.ref_count = AtomicU16::new(1);
            data.chain = AtomicU32::new(0);

            let name = ptr.add(RECORD_HEADER_SIZE);
            std::ptr::copy_nonoverlapping(key.as_ptr(), name, key.len());
            *name.add(key.len()) = 0;
        }
    }

    /// Reinterpret record memory as a header reference.
    ///
    /// # Safety
    ///
    /// `ptr` must be 8-byte aligned and point to at least a full record of
    /// readable bytes that outlive `'a`. Zeroed memory is a valid
    /// (uninitialized) record.
    #[inline]
    pub unsafe fn from_ptr<'a>(ptr: *const u8) -> &'a RawStatData {
        // SAFETY: caller guarantees alignment, size and lifetime.
        unsafe { &*(ptr as *const RawStatData) }
    }

    /// Whether the record holds a live stat (the name field is non-empty).
    ///
    /// # Safety
    ///
    /// The header must sit at the start of a full record.
    #[inline]
    pub unsafe fn initialized(&self) -> bool {
        // SAFETY: caller guarantees the name field follows the header.
        unsafe { *self.name_ptr() != 0 }
    }

    /// The record's name.
    ///
    /// # Safety
    ///
    /// The header must sit at the start of a full record whose name field
    /// was written by [`initialize`](Self::initialize).
    #[inline]
    pub unsafe fn key(&self) -> &str {
        // SAFETY: initialize() zero-terminates within the record and only
        // ever copies in whole UTF-8 strings.
        unsafe {
            let name = self.name_ptr();
            let mut len = 0;
            while *name.add(len) != 0 {
                len += 1;
            }
            std::str::from_utf8_unchecked(std::slice::from_raw_parts(name, len))
        }
    }

    #[inline]
    fn name_ptr(&self) -> *const u8 {
        // The name bytes follow the header inline.
        unsafe { (self as *const Self as *const u8).add(RECORD_HEADER_SIZE) }
    }

    /// Current value.
    #[inline]
    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Add to the value.
    #[inline]
    pub fn add_value(&self, delta: u64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    /// Subtract from the value (wrapping, like the underlying atomic).
    #[inline]
    pub fn sub_value(&self, delta: u64) {
        self.value.fetch_sub(delta, Ordering::Relaxed);
    }

    /// Overwrite the value.
    #[inline]
    pub fn store_value(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }

    /// Add to the pending delta accumulated since the last latch.
    #[inline]
    pub fn add_pending(&self, delta: u64) {
        self.pending_delta.fetch_add(delta, Ordering::Relaxed);
    }

    /// Take and clear the pending delta.
    #[inline]
    pub fn latch_pending(&self) -> u64 {
        self.pending_delta.swap(0, Ordering::Relaxed)
    }

    /// Mark the stat as written-to.
    #[inline]
    pub fn mark_used(&self) {
        self.flags.fetch_or(flags::USED, Ordering::Relaxed);
    }

    /// Whether the stat has ever been written.
    #[inline]
    pub fn used(&self) -> bool {
        self.flags.load(Ordering::Relaxed) & flags::USED != 0
    }

    /// Number of outstanding handles to this record.
    #[inline]
    pub fn ref_count(&self) -> u16 {
        self.ref_count.load(Ordering::Relaxed)
    }

    /// Add one handle. Called under the owning allocator's lock.
    #[inline]
    pub(crate) fn incr_ref(&self) {
        self.ref_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Drop one handle, returning the previous count. Called under the
    /// owning allocator's lock.
    #[inline]
    pub(crate) fn decr_ref(&self) -> u16 {
        self.ref_count.fetch_sub(1, Ordering::Relaxed)
    }

    /// Chain link lent to the block hash set.
    #[inline]
    pub(crate) fn next_cell(&self) -> u32 {
        self.chain.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_next_cell(&self, next: u32) {
        self.chain.store(next, Ordering::Relaxed);
    }
}
