//! The lock-free shared parameter matrix.
//!
//! This is the one correctness-relevant `unsafe` surface in the crate.
//! Workers update different (and, under Hogwild, occasionally the same)
//! rows of `in_vec`/`hs_vec`/`neg_vec` without any synchronization: updates
//! to distinct rows never alias, and the rare same-row race is accepted as
//! SGD noise rather than guarded against. Every other module only ever
//! touches these matrices through the safe, bounds-checked [`SharedMatrix::row`]
//! or the unsafe, caller-trusted [`SharedMatrix::row_mut`] — nothing outside
//! this file reaches for raw pointers.

use std::alloc::{Layout, alloc_zeroed, dealloc, handle_alloc_error};
use std::ptr::NonNull;
use std::sync::Arc;

use crate::error::{Result, Word2VecError};
use crate::rng::Lcg64;

/// One AVX2 register's width; rows are aligned to this so the numeric
/// kernels never straddle an unaligned load.
const ROW_ALIGNMENT: usize = 32;

struct AlignedBuffer {
    ptr: NonNull<f32>,
    len: usize,
    layout: Layout,
}

impl AlignedBuffer {
    fn zeroed(len: usize) -> Result<Self> {
        let bytes = len
            .checked_mul(std::mem::size_of::<f32>())
            .ok_or(Word2VecError::AllocationFailure { bytes: usize::MAX })?;
        let layout = Layout::from_size_align(bytes.max(1), ROW_ALIGNMENT)
            .map_err(|_| Word2VecError::AllocationFailure { bytes })?;
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = match NonNull::new(raw as *mut f32) {
            Some(ptr) => ptr,
            None => handle_alloc_error(layout),
        };
        Ok(Self { ptr, len, layout })
    }

    fn as_slice(&self) -> &[f32] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// # Safety
    /// Caller must uphold the Hogwild contract: concurrent callers may race
    /// on overlapping elements, but the resulting tearing is tolerated by
    /// design, not merely permitted by the type system.
    unsafe fn as_mut_slice(&self) -> &mut [f32] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for AlignedBuffer {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr.as_ptr() as *mut u8, self.layout) }
    }
}

// Safety: the buffer is heap-allocated and only ever accessed through
// `SharedMatrix`'s row-indexed methods, which is itself the contract this
// module documents. Neither `NonNull` nor `Layout` carry thread-confined
// state here.
unsafe impl Send for AlignedBuffer {}
unsafe impl Sync for AlignedBuffer {}

/// A `rows x dim` matrix of `f32`, row-major, 32-byte aligned per row,
/// shared cheaply (an `Arc` clone) across worker threads.
#[derive(Clone)]
pub struct SharedMatrix {
    buffer: Arc<AlignedBuffer>,
    rows: usize,
    dim: usize,
}

impl SharedMatrix {
    /// Allocate a zero-filled matrix.
    pub fn zeroed(rows: usize, dim: usize) -> Result<Self> {
        let buffer = AlignedBuffer::zeroed(rows * dim)?;
        Ok(Self {
            buffer: Arc::new(buffer),
            rows,
            dim,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Fill every element with `(draw - 0.5) / dim`, where `draw` is the
    /// reference's `(next_random & 0xFFFF) / 65536` unit draw. Only valid
    /// to call before any worker has been spawned against this matrix.
    pub fn randomize_uniform(&mut self, rng: &mut Lcg64) {
        let dim = self.dim as f32;
        let slice = unsafe { self.buffer.as_mut_slice() };
        for v in slice.iter_mut() {
            *v = (rng.next_unit_f32() - 0.5) / dim;
        }
    }

    /// A read-only view of row `idx`. Bounds-checked.
    #[inline]
    pub fn row(&self, idx: usize) -> &[f32] {
        assert!(idx < self.rows, "row {idx} out of bounds ({} rows)", self.rows);
        let start = idx * self.dim;
        &self.buffer.as_slice()[start..start + self.dim]
    }

    /// A mutable view of row `idx`, handed out without exclusive-access
    /// tracking.
    ///
    /// # Safety
    /// The caller takes on the Hogwild contract: other threads may be
    /// concurrently reading or writing the same row (or an overlapping one,
    /// which cannot happen here since rows never overlap) through their own
    /// call to `row_mut`. This is sound as far as Rust's memory model is
    /// concerned only because every write here is a plain `f32` store with
    /// no invariant spanning multiple elements — there is no partially
    /// updated state another thread could observe that would cause undefined
    /// behavior beyond a torn/stale read, which is the accepted outcome.
    #[inline]
    pub unsafe fn row_mut(&self, idx: usize) -> &mut [f32] {
        assert!(idx < self.rows, "row {idx} out of bounds ({} rows)", self.rows);
        let start = idx * self.dim;
        unsafe { &mut self.buffer.as_mut_slice()[start..start + self.dim] }
    }
}
