//! Memory allocators for the J2K codestream, grounded on OpenJPH's
//! `ojph_mem.h` (`mem_fixed_allocator`, `mem_elastic_allocator`). Both are
//! reworked from raw-pointer arenas into index-based, safe-Rust arenas:
//! slice indices stand in for the raw pointer offsets OpenJPH uses.

use crate::error::{Error, Result};

/// A two-phase bump allocator for values of one type `T`: every consumer
/// first calls `pre_alloc` (during a dry-run sizing pass) to register how
/// many elements it will need, then `alloc()` reserves one contiguous `Vec<T>`
/// sized to the sum of all registrations, then each consumer calls
/// `post_alloc` again, in the exact same order, to receive its index range.
///
/// Misuse (calling `post_alloc` before `alloc()`, or requesting more total
/// elements in the second pass than were registered in the first) is a
/// programmer error and panics rather than returning a `Result`.
#[derive(Debug)]
pub struct Fixed<T> {
    planned: usize,
    store: Option<Vec<T>>,
    cursor: usize,
}

impl<T: Clone + Default> Fixed<T> {
    pub fn new() -> Self {
        Self { planned: 0, store: None, cursor: 0 }
    }

    /// Registers a future allocation of `count` elements. Must be called
    /// before `alloc()`.
    pub fn pre_alloc(&mut self, count: usize) {
        assert!(self.store.is_none(), "pre_alloc called after alloc()");
        self.planned += count;
    }

    /// Reserves the backing storage for every `pre_alloc` call made so far.
    pub fn alloc(&mut self) {
        assert!(self.store.is_none(), "alloc() called twice");
        self.store = Some(vec![T::default(); self.planned]);
    }

    /// Hands out the next `count` elements, in the same order `pre_alloc` was
    /// called. Returns the index range backing this allocation.
    pub fn post_alloc(&mut self, count: usize) -> std::ops::Range<usize> {
        let store = self.store.as_ref().expect("post_alloc called before alloc()");
        let end = self.cursor + count;
        assert!(end <= store.len(), "post_alloc exceeded the planned allocation");

        let range = self.cursor .. end;
        self.cursor = end;
        range
    }

    pub fn slice(&self, range: std::ops::Range<usize>) -> &[T] {
        &self.store.as_ref().expect("allocator not yet alloc()'d")[range]
    }

    pub fn slice_mut(&mut self, range: std::ops::Range<usize>) -> &mut [T] {
        &mut self.store.as_mut().expect("allocator not yet alloc()'d")[range]
    }

    /// Releases the backing storage and all registrations, ready for the next tile.
    pub fn restart(&mut self) {
        self.planned = 0;
        self.store = None;
        self.cursor = 0;
    }
}

impl<T: Clone + Default> Default for Fixed<T> {
    fn default() -> Self { Self::new() }
}

/// The growable byte store backing coded codeblock output. Reworked from
/// OpenJPH's singly-linked list of fixed-size `coded_lists` chunks into a
/// `Vec` of owned chunks; a codeblock's coded bytes may span chunk
/// boundaries, so callers accumulate into a `Vec<u8>` and call
/// [`Elastic::store`] once the codeblock's encoding is complete, receiving a
/// stable index they can use to retrieve it later in the same tile.
#[derive(Debug, Default)]
pub struct Elastic {
    chunks: Vec<Vec<u8>>,
}

/// A handle to one codeblock's coded bytes inside an [`Elastic`] allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElasticHandle(usize);

impl Elastic {
    pub fn new() -> Self { Self::default() }

    pub fn store(&mut self, bytes: Vec<u8>) -> ElasticHandle {
        self.chunks.push(bytes);
        ElasticHandle(self.chunks.len() - 1)
    }

    pub fn get(&self, handle: ElasticHandle) -> Result<&[u8]> {
        self.chunks.get(handle.0).map(Vec::as_slice)
            .ok_or_else(|| Error::resources_exhausted("elastic allocator handle out of range"))
    }

    /// Releases every stored chunk, called between tiles on the encode side.
    pub fn reset(&mut self) {
        self.chunks.clear();
    }

    pub fn chunk_count(&self) -> usize { self.chunks.len() }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fixed_allocator_round_trip() {
        let mut alloc = Fixed::<i32>::new();
        alloc.pre_alloc(4);
        alloc.pre_alloc(6);
        alloc.alloc();

        let a = alloc.post_alloc(4);
        let b = alloc.post_alloc(6);

        alloc.slice_mut(a.clone()).copy_from_slice(&[1, 2, 3, 4]);
        alloc.slice_mut(b.clone()).copy_from_slice(&[5, 6, 7, 8, 9, 10]);

        assert_eq!(alloc.slice(a), &[1, 2, 3, 4]);
        assert_eq!(alloc.slice(b), &[5, 6, 7, 8, 9, 10]);
    }

    #[test]
    #[should_panic]
    fn fixed_allocator_rejects_overrun() {
        let mut alloc = Fixed::<u8>::new();
        alloc.pre_alloc(2);
        alloc.alloc();
        alloc.post_alloc(3);
    }

    #[test]
    fn elastic_allocator_stores_and_resets() {
        let mut elastic = Elastic::new();
        let handle = elastic.store(vec![1, 2, 3]);
        assert_eq!(elastic.get(handle).unwrap(), &[1, 2, 3]);

        elastic.reset();
        assert_eq!(elastic.chunk_count(), 0);
    }
}
