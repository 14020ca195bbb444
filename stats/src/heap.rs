//! Process-local heap-backed record store.

use std::alloc::{Layout, alloc_zeroed, dealloc, handle_alloc_error};
use std::collections::HashMap;
use std::ptr::NonNull;

use ahash::RandomState;
use parking_lot::Mutex;

use crate::allocator::{StatDataAllocator, StatRef};
use crate::config::StatsOptions;
use crate::raw::RawStatData;

/// One owned record allocation. The record address is stable even as the
/// map rehashes.
struct HeapRecord {
    ptr: NonNull<u8>,
}

// Safety: the record is plain owned memory; all access is serialized by
// the allocator mutex or goes through the record's atomics.
unsafe impl Send for HeapRecord {}

/// Interns records by name in a process-local map. Names longer than
/// `StatsOptions::max_name_length` are a caller error and panic; callers
/// are expected to pre-validate.
pub struct HeapStatDataAllocator {
    options: StatsOptions,
    records: Mutex<HashMap<Box<str>, HeapRecord, RandomState>>,
}

impl HeapStatDataAllocator {
    pub fn new(options: StatsOptions) -> Self {
        Self {
            options,
            records: Mutex::new(HashMap::default()),
        }
    }

    /// Number of live records.
    pub fn num_records(&self) -> usize {
        self.records.lock().len()
    }

    fn record_layout(&self) -> Layout {
        let size = RawStatData::record_size(self.options.max_name_length);
        // Infallible for any sane name bound.
        Layout::from_size_align(size, 8).expect("record layout")
    }
}

impl StatDataAllocator for HeapStatDataAllocator {
    fn alloc(&self, name: &str) -> Option<StatRef> {
        assert!(
            name.len() <= self.options.max_name_length,
            "stat name too long for heap allocator: {} > {}",
            name.len(),
            self.options.max_name_length
        );

        let mut records = self.records.lock();
        if let Some(record) = records.get(name) {
            // SAFETY: the record is live while it is in the map.
            unsafe { RawStatData::from_ptr(record.ptr.as_ptr()) }.incr_ref();
            return Some(StatRef::new(record.ptr));
        }

        let layout = self.record_layout();
        // SAFETY: layout has non-zero size; initialize() gets a fresh,
        // exclusive, zeroed allocation of the full record size.
        let ptr = unsafe {
            let ptr = alloc_zeroed(layout);
            if ptr.is_null() {
                handle_alloc_error(layout);
            }
            RawStatData::initialize(ptr, name, &self.options);
            NonNull::new_unchecked(ptr)
        };
        records.insert(name.into(), HeapRecord { ptr });
        Some(StatRef::new(ptr))
    }

    fn free(&self, data: StatRef) {
        // SAFETY: free() is only called with live handles.
        let record = unsafe { data.get() };
        let mut records = self.records.lock();
        if record.decr_ref() == 1 {
            // SAFETY: live record; the key borrow ends before dealloc.
            let key = unsafe { record.key() };
            let removed = records
                .remove(key)
                .unwrap_or_else(|| panic!("freeing unknown stat '{key}'"));
            // SAFETY: the record came from alloc() with this layout and
            // the last reference is gone.
            unsafe { dealloc(removed.ptr.as_ptr(), self.record_layout()) };
        }
    }

    fn stats_options(&self) -> &StatsOptions {
        &self.options
    }
}

impl Drop for HeapStatDataAllocator {
    fn drop(&mut self) {
        let records = self.records.get_mut();
        debug_assert!(
            records.is_empty(),
            "{} stat records still referenced at allocator teardown",
            records.len()
        );
        // Release builds reclaim rather than leak.
        let layout = Layout::from_size_align(
            RawStatData::record_size(self.options.max_name_length),
            8,
        )
        .expect("record layout");
        for (_, record) in records.drain() {
            // SAFETY: allocation came from alloc() with this layout.
            unsafe { dealloc(record.ptr.as_ptr(), layout) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_interns_by_name() {
        let allocator = HeapStatDataAllocator::new(StatsOptions::default());
        let a = allocator.alloc("x.y").unwrap();
        let b = allocator.alloc("x.y").unwrap();
        assert_eq!(a.as_ptr(), b.as_ptr());
        assert_eq!(allocator.num_records(), 1);

        let other = allocator.alloc("x.z").unwrap();
        assert_ne!(a.as_ptr(), other.as_ptr());
        assert_eq!(allocator.num_records(), 2);

        allocator.free(a);
        allocator.free(b);
        allocator.free(other);
        assert_eq!(allocator.num_records(), 0);
    }

    #[test]
    fn test_ref_count_lifecycle() {
        let allocator = HeapStatDataAllocator::new(StatsOptions::default());
        let a = allocator.alloc("x.y").unwrap();
        let b = allocator.alloc("x.y").unwrap();
        allocator.free(b);

        // Still live with one reference, name intact.
        // SAFETY: `a` has not been freed.
        let record = unsafe { a.get() };
        assert_eq!(record.ref_count(), 1);
        assert_eq!(unsafe { record.key() }, "x.y");
        assert_eq!(allocator.num_records(), 1);

        allocator.free(a);
        assert_eq!(allocator.num_records(), 0);
    }

    #[test]
    fn test_value_survives_realloc_of_same_name() {
        let allocator = HeapStatDataAllocator::new(StatsOptions::default());
        let a = allocator.alloc("c").unwrap();
        unsafe { a.get() }.add_value(41);
        let b = allocator.alloc("c").unwrap();
        assert_eq!(unsafe { b.get() }.value(), 41);
        allocator.free(a);
        allocator.free(b);
    }

    #[test]
    #[should_panic(expected = "too long for heap allocator")]
    fn test_long_name_panics() {
        let allocator = HeapStatDataAllocator::new(StatsOptions {
            max_name_length: 8,
            ..Default::default()
        });
        let _ = allocator.alloc("far.too.long.a.name");
    }
}
