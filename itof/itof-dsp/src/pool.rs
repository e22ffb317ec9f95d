//! Thread-local scratch-buffer pool for DSP kernels.
//!
//! Kernels that need a temporary `Vec<f32>` acquire one keyed by length
//! instead of allocating; the buffer is returned to the pool when the guard
//! drops, so repeated whole-frame processing on the worker thread settles
//! into a steady allocation-free state.

use std::cell::RefCell;
use std::collections::HashMap;

thread_local! {
    static POOL: RefCell<HashMap<usize, Vec<Vec<f32>>>> = RefCell::new(HashMap::new());
}

/// An acquired scratch buffer. Returned to the thread-local pool on drop.
pub struct PooledVec {
    buf: Option<Vec<f32>>,
    len: usize,
}

impl PooledVec {
    pub fn as_slice(&self) -> &[f32] {
        self.buf.as_ref().unwrap()
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        self.buf.as_mut().unwrap()
    }
}

impl std::ops::Deref for PooledVec {
    type Target = [f32];
    fn deref(&self) -> &[f32] {
        self.as_slice()
    }
}

impl std::ops::DerefMut for PooledVec {
    fn deref_mut(&mut self) -> &mut [f32] {
        self.as_mut_slice()
    }
}

impl Drop for PooledVec {
    fn drop(&mut self) {
        if let Some(mut buf) = self.buf.take() {
            buf.iter_mut().for_each(|v| *v = 0.0);
            POOL.with(|p| p.borrow_mut().entry(self.len).or_default().push(buf));
        }
    }
}

/// Acquire a zeroed scratch buffer of exactly `len` elements.
pub fn acquire(len: usize) -> PooledVec {
    let buf = POOL.with(|p| p.borrow_mut().get_mut(&len).and_then(|v| v.pop()));
    let buf = buf.unwrap_or_else(|| vec![0.0f32; len]);
    PooledVec { buf: Some(buf), len }
}

/// Drop all buffers held by the calling thread's pool, regardless of length.
pub fn clear() {
    POOL.with(|p| p.borrow_mut().clear());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_released_buffer() {
        clear();
        {
            let mut v = acquire(16);
            v.as_mut_slice()[0] = 42.0;
        }
        let v2 = acquire(16);
        assert_eq!(v2.as_slice()[0], 0.0, "released buffer must be zeroed before reuse");
        assert_eq!(v2.len(), 16);
    }
}
