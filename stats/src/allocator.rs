//! The allocator contract shared by the heap and block record stores.

use std::ptr::NonNull;

use crate::config::StatsOptions;
use crate::raw::RawStatData;

/// Handle to a live [`RawStatData`] record.
///
/// The handle is a bare address: it holds no reference of its own. It is
/// valid from the `alloc` that produced it until the matching `free`.
#[derive(Clone, Copy, Debug)]
pub struct StatRef {
    ptr: NonNull<u8>,
}

// Safety: a StatRef is just an address; access goes through get(), whose
// contract requires the record to still be live.
unsafe impl Send for StatRef {}
unsafe impl Sync for StatRef {}

impl StatRef {
    #[inline]
    pub(crate) fn new(ptr: NonNull<u8>) -> Self {
        Self { ptr }
    }

    /// Raw record address; useful for identity checks.
    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Access the record.
    ///
    /// # Safety
    ///
    /// The record must not have been freed. The returned reference may
    /// outlive the handle but not the allocator's backing storage.
    #[inline]
    pub unsafe fn get<'a>(&self) -> &'a RawStatData {
        // SAFETY: alloc() hands out 8-aligned record addresses; liveness
        // is the caller's contract.
        unsafe { RawStatData::from_ptr(self.ptr.as_ptr()) }
    }
}

/// Interns [`RawStatData`] records by name and reference-counts shared
/// records. Both the heap and block variants implement this contract:
///
/// - `alloc` on a new name claims a record, initializes it with
///   `ref_count` 1, and returns it; `alloc` on a live name bumps the
///   count and returns the same record.
/// - `free` drops one count; the record is reclaimed at zero.
///
/// Implementations serialize `alloc`/`free` behind their own mutex. That
/// lock is never held while the symbol table's lock is held; callers that
/// use both must finish with one before touching the other.
pub trait StatDataAllocator: Send + Sync {
    /// Get-or-create the record for `name`. Returns `None` when the
    /// backing storage is exhausted; the caller decides whether to drop
    /// the stat or treat that as fatal.
    fn alloc(&self, name: &str) -> Option<StatRef>;

    /// Release one reference to a record obtained from [`alloc`](Self::alloc).
    fn free(&self, data: StatRef);

    /// Options used to size records.
    fn stats_options(&self) -> &StatsOptions;
}
