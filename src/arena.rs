//! Bump allocator used for the compiler's short-lived, flat collections.
//!
//! Owned tree data (the AST) is plain `Box`/`Vec` — see `src/ast.rs` — so
//! `Arena` only backs the places the specification calls out explicitly:
//! the typechecker's and IR builder's scope tables (`src/scope.rs`) and the
//! register allocator's live-range vectors (`src/regalloc.rs`). Dropping an
//! `Arena` frees every backing chunk at once.
//!
//! `Arena::alloc`/`alloc_str` place a single value directly in a bump
//! chunk; like the underlying `bumpalo::Bump`, they never run that value's
//! destructor, so only non-owning data (no `String`/`Vec`/`Box`) should go
//! through them directly. The scope table and live-range vectors instead go
//! through `ArenaVec` (`src/vec.rs`), whose own destructor *does* drop its
//! elements in place before the arena reclaims the backing chunk — so
//! owning types (e.g. the `String` labels in a scope table) are fine there.

use bumpalo::Bump;

pub struct Arena {
    bump: Bump,
}

impl Arena {
    pub fn new() -> Self {
        Arena { bump: Bump::new() }
    }

    /// Allocate `value` in the arena and return a reference with the
    /// arena's lifetime. `T` must not require a destructor to run.
    pub fn alloc<T>(&self, value: T) -> &T {
        self.bump.alloc(value)
    }

    /// Copy `s` into the arena and return a `&str` borrowing its storage.
    pub fn alloc_str(&self, s: &str) -> &str {
        self.bump.alloc_str(s)
    }

    /// Total bytes currently allocated across all chunks (for diagnostics/tests).
    pub fn bytes_allocated(&self) -> usize {
        self.bump.allocated_bytes()
    }

    pub(crate) fn bump(&self) -> &Bump {
        &self.bump
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_round_trips_values() {
        let arena = Arena::new();
        let a = arena.alloc(42i64);
        let b = arena.alloc(43i64);
        assert_eq!(*a, 42);
        assert_eq!(*b, 43);
    }

    #[test]
    fn alloc_str_round_trips_text() {
        let arena = Arena::new();
        let s = arena.alloc_str("main_var_3");
        assert_eq!(s, "main_var_3");
    }

    #[test]
    fn many_allocations_span_multiple_chunks() {
        let arena = Arena::new();
        for i in 0..10_000i64 {
            let r = arena.alloc(i);
            assert_eq!(*r, i);
        }
        assert!(arena.bytes_allocated() >= 10_000 * std::mem::size_of::<i64>());
    }
}
