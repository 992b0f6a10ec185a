//! Scoped symbol table: a single flat vector plus marker sentinels.
//!
//! Shared by the typechecker (`V = Type`, tracking declared variable types)
//! and the IR builder (`V = String`, tracking source-name-to-IR-label
//! bindings) — both need exactly the shape the specification describes:
//! "a flat vector with marker sentinels used as scope separators", scanned
//! from the end so inner declarations shadow outer ones.

use crate::arena::Arena;
use crate::vec::ArenaVec;

enum Entry<V> {
    Marker,
    Binding { name: String, value: V },
}

pub struct ScopeTable<'a, V> {
    entries: ArenaVec<'a, Entry<V>>,
    /// Entries past this point are logically popped but still physically
    /// present in the append-only `ArenaVec` (reclaimed when the arena drops).
    logical_len: usize,
}

impl<'a, V: Clone> ScopeTable<'a, V> {
    pub fn new(arena: &'a Arena) -> Self {
        ScopeTable {
            entries: ArenaVec::new_in(arena),
            logical_len: 0,
        }
    }

    pub fn push_scope(&mut self) {
        self.entries.push(Entry::Marker);
        self.logical_len += 1;
    }

    /// Truncate back to (and including removing) the most recent marker.
    ///
    /// `ArenaVec` is append-only, so instead of physically truncating we
    /// just move `logical_len` back to the marker; the stale tail stays in
    /// the arena and is reclaimed in bulk when the arena drops.
    pub fn pop_scope(&mut self) {
        for i in (0..self.logical_len).rev() {
            if matches!(self.entries.get(i), Some(Entry::Marker)) {
                self.logical_len = i;
                return;
            }
        }
        panic!("pop_scope: no matching push_scope");
    }

    /// True if `name` is already bound at the *current* scope depth (i.e.
    /// before the next marker walking back from the end).
    fn declared_in_current_scope(&self, name: &str) -> bool {
        for i in (0..self.logical_len).rev() {
            match self.entries.get(i) {
                Some(Entry::Marker) => return false,
                Some(Entry::Binding { name: n, .. }) if n == name => return true,
                _ => {}
            }
        }
        false
    }

    /// Declare `name` -> `value` in the current scope. Returns `Err(())` if
    /// `name` is already bound at this same scope depth (redefinition).
    pub fn declare(&mut self, name: &str, value: V) -> Result<(), ()> {
        if self.declared_in_current_scope(name) {
            return Err(());
        }
        self.entries.push(Entry::Binding {
            name: name.to_string(),
            value,
        });
        self.logical_len += 1;
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<V> {
        for i in (0..self.logical_len).rev() {
            if let Some(Entry::Binding { name: n, value }) = self.entries.get(i) {
                if n == name {
                    return Some(value.clone());
                }
            }
        }
        None
    }
}
