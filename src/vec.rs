//! Growable vector backed by an `Arena`.
//!
//! Wraps `bumpalo::collections::Vec` and adds the interior-pointer
//! operations the specification describes: `insert_before_ptr`/
//! `insert_after_ptr`/`remove_at_ptr` resolve a `*const T` to a position by
//! an identity scan (`std::ptr::eq`) over the backing slice, then delegate
//! to the underlying vector's own `insert`/`remove`. `migrate_pool` copies
//! the contents into a freshly backed `ArenaVec` in a different arena — used
//! when a scope's entries must outlive the arena they were built in.

use crate::arena::Arena;
use bumpalo::collections::Vec as BumpVec;

pub struct ArenaVec<'a, T> {
    data: BumpVec<'a, T>,
}

impl<'a, T> ArenaVec<'a, T> {
    pub fn new_in(arena: &'a Arena) -> Self {
        ArenaVec {
            data: BumpVec::new_in(arena.bump()),
        }
    }

    pub fn push(&mut self, value: T) {
        self.data.push(value);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.data.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }

    pub fn last_ptr(&self) -> Option<*const T> {
        self.data.last().map(|v| v as *const T)
    }

    fn index_of_ptr(&self, ptr: *const T) -> Option<usize> {
        self.data.iter().position(|elem| std::ptr::eq(elem, ptr))
    }

    /// Insert `value` immediately before the element identified by `ptr`.
    /// Panics if `ptr` does not point at an element currently in this vector.
    pub fn insert_before_ptr(&mut self, ptr: *const T, value: T) {
        let idx = self
            .index_of_ptr(ptr)
            .expect("insert_before_ptr: pointer not found in vector");
        self.data.insert(idx, value);
    }

    /// Insert `value` immediately after the element identified by `ptr`.
    pub fn insert_after_ptr(&mut self, ptr: *const T, value: T) {
        let idx = self
            .index_of_ptr(ptr)
            .expect("insert_after_ptr: pointer not found in vector");
        self.data.insert(idx + 1, value);
    }

    /// Remove the element identified by `ptr`, shifting the tail down.
    pub fn remove_at_ptr(&mut self, ptr: *const T) -> T {
        let idx = self
            .index_of_ptr(ptr)
            .expect("remove_at_ptr: pointer not found in vector");
        self.data.remove(idx)
    }
}

impl<'a, T: Clone> ArenaVec<'a, T> {
    /// Copy this vector's contents into a new `ArenaVec` backed by `other`.
    /// The original storage is left behind (reclaimed when its arena drops).
    pub fn migrate_pool<'b>(&self, other: &'b Arena) -> ArenaVec<'b, T> {
        let mut migrated = ArenaVec::new_in(other);
        for item in self.data.iter() {
            migrated.push(item.clone());
        }
        migrated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_index() {
        let arena = Arena::new();
        let mut v: ArenaVec<i32> = ArenaVec::new_in(&arena);
        v.push(1);
        v.push(2);
        v.push(3);
        assert_eq!(v.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn insert_before_and_after_ptr() {
        let arena = Arena::new();
        let mut v: ArenaVec<i32> = ArenaVec::new_in(&arena);
        v.push(1);
        v.push(3);
        let ptr_three = v.get(1).unwrap() as *const i32;
        v.insert_before_ptr(ptr_three, 2);
        assert_eq!(v.as_slice(), &[1, 2, 3]);

        let ptr_one = v.get(0).unwrap() as *const i32;
        v.insert_after_ptr(ptr_one, 0);
        assert_eq!(v.as_slice(), &[1, 0, 2, 3]);
    }

    #[test]
    fn remove_at_ptr_shifts_tail() {
        let arena = Arena::new();
        let mut v: ArenaVec<i32> = ArenaVec::new_in(&arena);
        v.push(10);
        v.push(20);
        v.push(30);
        let ptr_twenty = v.get(1).unwrap() as *const i32;
        let removed = v.remove_at_ptr(ptr_twenty);
        assert_eq!(removed, 20);
        assert_eq!(v.as_slice(), &[10, 30]);
    }

    #[test]
    fn migrate_pool_copies_into_new_arena() {
        let arena1 = Arena::new();
        let mut v: ArenaVec<i32> = ArenaVec::new_in(&arena1);
        v.push(1);
        v.push(2);

        let arena2 = Arena::new();
        let migrated = v.migrate_pool(&arena2);
        assert_eq!(migrated.as_slice(), &[1, 2]);
    }
}
