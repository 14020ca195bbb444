//! The symbol table: interns dot-separated tokens to reference-counted
//! symbols.
//!
//! Proxy stat names draw their tokens from a fairly small set of common
//! strings, so mapping each token to a [`Symbol`] and byte-encoding the
//! symbol sequence shrinks a name from dozens of ASCII bytes to a few.
//! Symbols are reference counted and returned to a reuse pool when the
//! last referencing name is freed, so the table shrinks as well as grows.
//!
//! One mutex guards both directions of the bimap. Operations that walk
//! encoded bytes (`free`, `inc_ref_count`, `less_than`) decode the symbol
//! list *before* taking the lock, keeping the critical section to pure map
//! mutation.
//!
//! Symbol identifiers are recycled: a string re-interned after being fully
//! freed may or may not receive its previous identifier.

use std::sync::Arc;

use ahash::RandomState;
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::collections::HashMap;

use crate::name::StatName;
use crate::symbol::{Symbol, SymbolEncoding, SymbolVec};

/// First symbol ever assigned. Symbol 0 is reserved for "unassigned".
const FIRST_SYMBOL: Symbol = 1;

type EncodeMap = HashMap<Arc<str>, SharedSymbol, RandomState>;
type DecodeMap = HashMap<Symbol, Arc<str>, RandomState>;

/// Per-token record: the assigned symbol and the number of encoded
/// occurrences across all live stat names.
struct SharedSymbol {
    symbol: Symbol,
    ref_count: u32,
}

struct TableState {
    /// Token string -> symbol + ref count. The `Arc<str>` key is shared
    /// with `decode_map` so each token's bytes are stored once.
    encode_map: EncodeMap,
    /// Symbol -> token string. Exactly one entry per live symbol.
    decode_map: DecodeMap,
    /// Freed symbols available for reuse, most recently freed on top.
    pool: Vec<Symbol>,
    /// Staged ahead of insertion time so that a successful insert writes
    /// the correct value.
    next_symbol: Symbol,
    /// Advanced only when the pool is empty. Never wraps; overflow is a
    /// fatal error.
    monotonic_counter: Symbol,
}

impl TableState {
    fn to_symbol(&mut self, token: &str) -> Symbol {
        if let Some(shared) = self.encode_map.get_mut(token) {
            shared.ref_count += 1;
            return shared.symbol;
        }

        let token: Arc<str> = Arc::from(token);
        let symbol = self.next_symbol;
        self.encode_map.insert(
            Arc::clone(&token),
            SharedSymbol {
                symbol,
                ref_count: 1,
            },
        );
        self.decode_map.insert(symbol, token);
        self.stage_next_symbol();
        symbol
    }

    fn stage_next_symbol(&mut self) {
        self.next_symbol = match self.pool.pop() {
            Some(symbol) => symbol,
            None => {
                self.monotonic_counter = self
                    .monotonic_counter
                    .checked_add(1)
                    .expect("symbol space exhausted");
                self.monotonic_counter
            }
        };
    }

    fn from_symbol(&self, symbol: Symbol) -> Arc<str> {
        match self.decode_map.get(&symbol) {
            Some(token) => Arc::clone(token),
            // Never expected; do not keep running with a corrupt stats set.
            None => panic!("no symbol {symbol} in decode map"),
        }
    }
}

/// Interning table for stat name tokens. See the module docs.
pub struct SymbolTable {
    state: Mutex<TableState>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TableState {
                encode_map: EncodeMap::default(),
                decode_map: DecodeMap::default(),
                pool: Vec::new(),
                next_symbol: FIRST_SYMBOL,
                monotonic_counter: FIRST_SYMBOL,
            }),
        }
    }

    /// Encode `name`, bumping the reference count of every token it
    /// contains (a token appearing twice is counted twice). The caller is
    /// responsible for eventually balancing those references via
    /// [`free`](Self::free), normally by moving the encoding into a
    /// `StatNameStorage`. An empty name produces an empty encoding.
    pub fn encode(&self, name: &str) -> SymbolEncoding {
        let mut encoding = SymbolEncoding::default();
        if name.is_empty() {
            return encoding;
        }

        // Split outside the lock; the critical section is map work only.
        let tokens: SmallVec<[&str; 8]> = name.split('.').collect();
        let mut symbols = SymbolVec::with_capacity(tokens.len());
        {
            let mut state = self.state.lock();
            for token in tokens {
                symbols.push(state.to_symbol(token));
            }
        }

        for symbol in symbols {
            encoding.add_symbol(symbol);
        }
        encoding
    }

    /// Decode an encoded name back to its dotted form.
    ///
    /// # Panics
    ///
    /// Panics if any symbol is missing from the table; that indicates
    /// corruption or an unbalanced free.
    pub fn decode(&self, name: StatName<'_>) -> String {
        let symbols = SymbolEncoding::decode_symbols(name.data());
        let mut tokens: SmallVec<[Arc<str>; 8]> = SmallVec::with_capacity(symbols.len());
        {
            let state = self.state.lock();
            for &symbol in &symbols {
                tokens.push(state.from_symbol(symbol));
            }
        }
        tokens.join(".")
    }

    /// Drop one reference per token occurrence in `name`. Tokens reaching
    /// a count of zero are erased and their symbols pooled for reuse.
    pub fn free(&self, name: StatName<'_>) {
        // Decode before taking the lock.
        let symbols = SymbolEncoding::decode_symbols(name.data());

        let mut state = self.state.lock();
        for symbol in symbols {
            let token = state.from_symbol(symbol);
            let shared = state
                .encode_map
                .get_mut(&*token)
                .unwrap_or_else(|| panic!("no encode map entry for symbol {symbol}"));
            shared.ref_count -= 1;
            if shared.ref_count == 0 {
                state.encode_map.remove(&*token);
                state.decode_map.remove(&symbol);
                state.pool.push(symbol);
            }
        }
    }

    /// Add one reference per token occurrence in `name`. Used when an
    /// existing encoded name is copied into new backing storage.
    pub fn inc_ref_count(&self, name: StatName<'_>) {
        // Decode before taking the lock.
        let symbols = SymbolEncoding::decode_symbols(name.data());

        let mut state = self.state.lock();
        for symbol in symbols {
            let token = state.from_symbol(symbol);
            let shared = state
                .encode_map
                .get_mut(&*token)
                .unwrap_or_else(|| panic!("no encode map entry for symbol {symbol}"));
            shared.ref_count += 1;
        }
    }

    /// Whether `a` lexically precedes `b`, comparing token *strings* (not
    /// numeric symbol values) at the first differing position. Names that
    /// agree on a shared prefix order by length. This matches the lexical
    /// order of the elaborated dotted forms on token sequences.
    pub fn less_than(&self, a: StatName<'_>, b: StatName<'_>) -> bool {
        let av = SymbolEncoding::decode_symbols(a.data());
        let bv = SymbolEncoding::decode_symbols(b.data());
        for (&sa, &sb) in av.iter().zip(bv.iter()) {
            if sa != sb {
                let state = self.state.lock();
                return state.from_symbol(sa) < state.from_symbol(sb);
            }
        }
        av.len() < bv.len()
    }

    /// Number of live symbols in the table.
    pub fn num_symbols(&self) -> usize {
        let state = self.state.lock();
        debug_assert_eq!(state.encode_map.len(), state.decode_map.len());
        state.encode_map.len()
    }

    /// Log every live symbol with its token and reference count at debug
    /// level.
    pub fn debug_dump(&self) {
        let state = self.state.lock();
        let mut symbols: Vec<Symbol> = state.decode_map.keys().copied().collect();
        symbols.sort_unstable();
        for symbol in symbols {
            let token = &state.decode_map[&symbol];
            let shared = &state.encode_map[&**token];
            tracing::debug!(symbol, token = &**token, ref_count = shared.ref_count);
        }
    }
}
