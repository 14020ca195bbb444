//! Views and backing storage for encoded stat names.
//!
//! A [`StatName`] is a borrow of immutable bytes laid out as
//! `[len_lo][len_hi][payload..]`. It does not own the bytes and holds no
//! reference counts; whatever owns the storage is responsible for keeping
//! it (and the symbol references inside it) alive.
//!
//! [`StatNameStorage`] owns the bytes for exactly one name. It is *not*
//! fully RAII: the owner must call [`release`](StatNameStorage::release)
//! with the table before dropping it, which keeps the storage to a bare
//! byte allocation instead of carrying a table reference per stat. The
//! RAII convenience wrapper [`StatNameTempStorage`] carries the table
//! reference and is meant for temporaries and tests.

use std::borrow::Borrow;
use std::hash::{Hash, Hasher};

use crate::symbol::{LENGTH_PREFIX_BYTES, write_length_prefix};
use crate::table::SymbolTable;

/// A view of one encoded stat name. Copyable and cheap; see the module
/// docs for the ownership rules.
#[derive(Clone, Copy)]
pub struct StatName<'a> {
    size_and_data: &'a [u8],
}

impl<'a> StatName<'a> {
    /// Wrap bytes beginning with a length prefix. The slice may extend
    /// past the encoded name (names can be packed adjacently).
    #[inline]
    pub fn new(size_and_data: &'a [u8]) -> Self {
        debug_assert!(size_and_data.len() >= LENGTH_PREFIX_BYTES);
        let name = Self { size_and_data };
        debug_assert!(size_and_data.len() >= name.size());
        name
    }

    /// Payload length in bytes, excluding the two-byte prefix.
    #[inline]
    pub fn data_size(&self) -> usize {
        self.size_and_data[0] as usize | (self.size_and_data[1] as usize) << 8
    }

    /// Total length in bytes, including the prefix.
    #[inline]
    pub fn size(&self) -> usize {
        self.data_size() + LENGTH_PREFIX_BYTES
    }

    /// The payload: variable-length encoded symbols.
    #[inline]
    pub fn data(&self) -> &'a [u8] {
        &self.size_and_data[LENGTH_PREFIX_BYTES..self.size()]
    }

    /// Prefix and payload together.
    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        &self.size_and_data[..self.size()]
    }
}

impl PartialEq for StatName<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.data() == other.data()
    }
}

impl Eq for StatName<'_> {}

impl std::fmt::Debug for StatName<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StatName({:02x?})", self.data())
    }
}

/// Owns the backing bytes for one encoded stat name.
///
/// Construction bumps the symbol reference counts; [`release`](Self::release)
/// must be called before drop to balance them. Dropping a non-released
/// storage trips a debug assertion (and leaks the references in release
/// builds).
pub struct StatNameStorage {
    bytes: Option<Box<[u8]>>,
}

impl StatNameStorage {
    /// Encode `name` into fresh storage, bumping reference counts.
    pub fn new(name: &str, table: &SymbolTable) -> Self {
        let mut encoding = table.encode(name);
        let mut bytes = vec![0u8; encoding.bytes_required()].into_boxed_slice();
        encoding.move_to_storage(&mut bytes);
        Self { bytes: Some(bytes) }
    }

    /// Copy an existing encoded name into fresh storage, bumping reference
    /// counts for the copy.
    pub fn from_stat_name(src: StatName<'_>, table: &SymbolTable) -> Self {
        let storage = Self {
            bytes: Some(src.as_bytes().into()),
        };
        table.inc_ref_count(storage.stat_name());
        storage
    }

    /// A view of the owned name.
    ///
    /// # Panics
    ///
    /// Panics if the storage has been released.
    pub fn stat_name(&self) -> StatName<'_> {
        StatName::new(self.bytes.as_ref().expect("storage already released"))
    }

    /// Drop the symbol references held by this storage and free the bytes.
    ///
    /// # Panics
    ///
    /// Panics if called twice.
    pub fn release(&mut self, table: &SymbolTable) {
        let bytes = self.bytes.take().expect("release() called twice");
        table.free(StatName::new(&bytes));
    }
}

impl Drop for StatNameStorage {
    fn drop(&mut self) {
        debug_assert!(
            self.bytes.is_none(),
            "StatNameStorage dropped without release()"
        );
    }
}

// Storages key hash maps by their encoded bytes, so equality, hashing and
// borrowing all go through the byte form.

impl PartialEq for StatNameStorage {
    fn eq(&self, other: &Self) -> bool {
        self.stat_name() == other.stat_name()
    }
}

impl Eq for StatNameStorage {}

impl Hash for StatNameStorage {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.stat_name().as_bytes().hash(state);
    }
}

impl Borrow<[u8]> for StatNameStorage {
    fn borrow(&self) -> &[u8] {
        self.stat_name().as_bytes()
    }
}

/// RAII variant of [`StatNameStorage`] that carries the table reference and
/// releases on drop. Costs an extra pointer per instance, so it is meant
/// for scoped temporaries rather than bulk storage.
pub struct StatNameTempStorage<'t> {
    storage: StatNameStorage,
    table: &'t SymbolTable,
}

impl<'t> StatNameTempStorage<'t> {
    pub fn new(name: &str, table: &'t SymbolTable) -> Self {
        Self {
            storage: StatNameStorage::new(name, table),
            table,
        }
    }

    pub fn from_stat_name(src: StatName<'_>, table: &'t SymbolTable) -> Self {
        Self {
            storage: StatNameStorage::from_stat_name(src, table),
            table,
        }
    }

    pub fn stat_name(&self) -> StatName<'_> {
        self.storage.stat_name()
    }
}

impl Drop for StatNameTempStorage<'_> {
    fn drop(&mut self) {
        self.storage.release(self.table);
    }
}

/// Concatenates the payloads of two or more stat names under a fresh
/// length prefix. `join("a.b", "c.d")` views the same bytes as an encoding
/// of `"a.b.c.d"` without re-interning or touching the table (or its
/// lock).
///
/// The joiner holds no symbol references of its own, so it is only valid
/// while every constituent name's storage remains live.
pub struct StatNameJoiner {
    bytes: Box<[u8]>,
}

impl StatNameJoiner {
    /// Join two names.
    pub fn new(a: StatName<'_>, b: StatName<'_>) -> Self {
        Self::from_names(&[a, b])
    }

    /// Join any number of names in order.
    pub fn from_names(names: &[StatName<'_>]) -> Self {
        let payload_len: usize = names.iter().map(|n| n.data_size()).sum();
        let mut bytes = vec![0u8; payload_len + LENGTH_PREFIX_BYTES].into_boxed_slice();
        write_length_prefix(payload_len, &mut bytes);
        let mut at = LENGTH_PREFIX_BYTES;
        for name in names {
            let data = name.data();
            bytes[at..at + data.len()].copy_from_slice(data);
            at += data.len();
        }
        Self { bytes }
    }

    /// A view of the joined name.
    pub fn stat_name(&self) -> StatName<'_> {
        StatName::new(&self.bytes)
    }
}
