//! Scratch buffer pool.
//!
//! Buffers are handed out as [`PooledBuffer`] guards that give the buffer back
//! on drop, so every exit path of an effect (early returns, `?` on errors)
//! releases what it acquired. The pool is single-threaded: one frame runs at a
//! time and owns the pool for its duration.

use std::{
    cell::RefCell,
    ops::{Deref, DerefMut},
};

use tracing::{debug, trace};

use super::{
    error::{RenderError, RenderResult},
    types::{BufferDesc, ImageBuffer},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub releases: u64,
}

#[derive(Debug)]
struct FreeBuffer {
    buffer: ImageBuffer,
    /// Released since the last [`BufferPool::trim_unused`].
    touched: bool,
}

#[derive(Debug, Default)]
struct PoolState {
    free: Vec<FreeBuffer>,
    outstanding: usize,
    /// Bytes held by every live buffer, free or outstanding.
    allocated_bytes: usize,
    budget_bytes: Option<usize>,
    stats: PoolStats,
}

impl PoolState {
    fn take_free(&mut self, desc: &BufferDesc) -> Option<ImageBuffer> {
        let idx = self
            .free
            .iter()
            .position(|f| f.buffer.size() == desc.size && f.buffer.format == desc.format)?;
        Some(self.free.swap_remove(idx).buffer)
    }

    fn evict_until_fits(&mut self, requested: usize) {
        let Some(budget) = self.budget_bytes else {
            return;
        };
        while self.allocated_bytes + requested > budget {
            let Some(f) = self.free.pop() else {
                break;
            };
            self.allocated_bytes = self.allocated_bytes.saturating_sub(f.buffer.byte_size());
            self.stats.evictions += 1;
        }
    }
}

#[derive(Debug, Default)]
pub struct BufferPool {
    state: RefCell<PoolState>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pool that refuses to hold more than `bytes` of live buffers.
    pub fn with_budget(bytes: usize) -> Self {
        let pool = Self::default();
        pool.state.borrow_mut().budget_bytes = Some(bytes);
        pool
    }

    /// Hand out a buffer matching `desc` exactly, recycled when possible.
    ///
    /// Never blocks. Fails with [`RenderError::OutOfMemory`] when the budget
    /// cannot be met even after evicting free buffers, or the allocator refuses.
    pub fn acquire(&self, desc: BufferDesc) -> RenderResult<PooledBuffer<'_>> {
        let mut st = self.state.borrow_mut();

        if let Some(mut buf) = st.take_free(&desc) {
            buf.filter = desc.filter;
            buf.edge = desc.edge;
            st.outstanding += 1;
            st.stats.hits += 1;
            trace!(w = desc.size[0], h = desc.size[1], "buffer pool hit");
            return Ok(PooledBuffer {
                pool: self,
                buffer: Some(buf),
            });
        }

        let requested = desc.byte_size();
        st.evict_until_fits(requested);
        if let Some(budget) = st.budget_bytes {
            if st.allocated_bytes + requested > budget {
                debug!(requested, budget, "buffer pool budget exhausted");
                return Err(RenderError::OutOfMemory {
                    requested_bytes: requested,
                    budget_bytes: Some(budget),
                });
            }
        }

        let buf = ImageBuffer::try_new(&desc).ok_or(RenderError::OutOfMemory {
            requested_bytes: requested,
            budget_bytes: st.budget_bytes,
        })?;
        st.allocated_bytes += requested;
        st.outstanding += 1;
        st.stats.misses += 1;
        trace!(w = desc.size[0], h = desc.size[1], "buffer pool miss");

        Ok(PooledBuffer {
            pool: self,
            buffer: Some(buf),
        })
    }

    fn release(&self, buf: ImageBuffer) {
        let mut st = self.state.borrow_mut();
        st.outstanding = st.outstanding.saturating_sub(1);
        st.stats.releases += 1;
        st.free.push(FreeBuffer {
            buffer: buf,
            touched: true,
        });
    }

    fn forget(&self, buf: &ImageBuffer) {
        let mut st = self.state.borrow_mut();
        st.outstanding = st.outstanding.saturating_sub(1);
        st.allocated_bytes = st.allocated_bytes.saturating_sub(buf.byte_size());
    }

    /// Buffers currently handed out and not yet released.
    pub fn outstanding(&self) -> usize {
        self.state.borrow().outstanding
    }

    pub fn free_count(&self) -> usize {
        self.state.borrow().free.len()
    }

    pub fn allocated_bytes(&self) -> usize {
        self.state.borrow().allocated_bytes
    }

    pub fn budget_bytes(&self) -> Option<usize> {
        self.state.borrow().budget_bytes
    }

    pub fn stats(&self) -> PoolStats {
        self.state.borrow().stats
    }

    /// Destroy every free buffer. Outstanding buffers are unaffected.
    pub fn drain(&self) {
        let mut st = self.state.borrow_mut();
        let freed: usize = st.free.iter().map(|f| f.buffer.byte_size()).sum();
        st.free.clear();
        st.allocated_bytes = st.allocated_bytes.saturating_sub(freed);
    }

    /// Destroy free buffers nobody released since the previous call.
    ///
    /// Called once per frame, this keeps only what the latest frame used, so
    /// buffers of a size the pipeline stopped asking for (after a resize)
    /// do not stay resident.
    pub fn trim_unused(&self) {
        let mut st = self.state.borrow_mut();
        let before = st.free.len();
        let mut freed = 0usize;
        st.free.retain_mut(|f| {
            if f.touched {
                f.touched = false;
                true
            } else {
                freed += f.buffer.byte_size();
                false
            }
        });
        let evicted = before - st.free.len();
        st.allocated_bytes = st.allocated_bytes.saturating_sub(freed);
        st.stats.evictions += evicted as u64;
        if evicted > 0 {
            debug!(evicted, freed, "trimmed idle pool buffers");
        }
    }
}

/// Exclusive handle to a pooled buffer; returns it to the pool on drop.
#[derive(Debug)]
pub struct PooledBuffer<'p> {
    pool: &'p BufferPool,
    buffer: Option<ImageBuffer>,
}

impl PooledBuffer<'_> {
    /// Take the buffer out of the pool's ownership for good.
    pub fn detach(mut self) -> ImageBuffer {
        let Some(buf) = self.buffer.take() else {
            unreachable!("PooledBuffer holds its buffer until dropped");
        };
        self.pool.forget(&buf);
        buf
    }
}

impl Deref for PooledBuffer<'_> {
    type Target = ImageBuffer;

    fn deref(&self) -> &ImageBuffer {
        match self.buffer.as_ref() {
            Some(b) => b,
            None => unreachable!("PooledBuffer holds its buffer until dropped"),
        }
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut ImageBuffer {
        match self.buffer.as_mut() {
            Some(b) => b,
            None => unreachable!("PooledBuffer holds its buffer until dropped"),
        }
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buffer.take() {
            self.pool.release(buf);
        }
    }
}
