// Copyright (c) 2025 vivo Mobile Communication Co., Ltd.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//       http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Fixed-count message slot pool backing one queue.
//!
//! The arena is allocated once at queue creation and tiled into
//! `max_messages` equally sized slots. A slot is either on the free
//! list or enqueued on the priority list, never both.

use crate::{
    config::ALIGN_SIZE,
    error::{code, Error},
};

fn align_up(size: usize, align: usize) -> usize {
    (size + align - 1) & !(align - 1)
}

#[derive(Debug)]
pub(crate) struct MsgPool {
    arena: Box<[u8]>,
    stride: usize,
    msg_size: usize,
    // LIFO, so the most recently freed slot is reused first.
    free: Vec<usize>,
}

impl MsgPool {
    pub(crate) fn new(max_msgs: usize, msg_size: usize) -> Result<Self, Error> {
        let stride = align_up(msg_size, ALIGN_SIZE);
        let bytes = stride.checked_mul(max_msgs).ok_or(code::ENOSPC)?;
        let arena = vec![0u8; bytes].into_boxed_slice();
        Ok(Self {
            arena,
            stride,
            msg_size,
            free: (0..max_msgs).rev().collect(),
        })
    }

    pub(crate) fn alloc(&mut self) -> Option<usize> {
        self.free.pop()
    }

    pub(crate) fn free(&mut self, slot: usize) {
        debug_assert!(slot < self.capacity());
        debug_assert!(!self.free.contains(&slot));
        self.free.push(slot);
    }

    pub(crate) fn capacity(&self) -> usize {
        self.arena.len() / self.stride.max(1)
    }

    #[allow(dead_code)]
    pub(crate) fn free_count(&self) -> usize {
        self.free.len()
    }

    pub(crate) fn payload(&self, slot: usize) -> &[u8] {
        let start = slot * self.stride;
        &self.arena[start..start + self.msg_size]
    }

    pub(crate) fn payload_mut(&mut self, slot: usize) -> &mut [u8] {
        let start = slot * self.stride;
        &mut self.arena[start..start + self.msg_size]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_until_exhausted() {
        let mut pool = MsgPool::new(3, 16).unwrap();
        assert_eq!(pool.free_count(), 3);
        assert!(pool.alloc().is_some());
        assert!(pool.alloc().is_some());
        assert!(pool.alloc().is_some());
        assert!(pool.alloc().is_none());
        assert_eq!(pool.free_count(), 0);
    }

    #[test]
    fn test_free_is_lifo() {
        let mut pool = MsgPool::new(4, 8).unwrap();
        let a = pool.alloc().unwrap();
        let b = pool.alloc().unwrap();
        pool.free(a);
        pool.free(b);
        // b was freed last, so it comes back first.
        assert_eq!(pool.alloc(), Some(b));
        assert_eq!(pool.alloc(), Some(a));
    }

    #[test]
    fn test_payload_roundtrip() {
        let mut pool = MsgPool::new(2, 5).unwrap();
        let slot = pool.alloc().unwrap();
        pool.payload_mut(slot)[..3].copy_from_slice(b"abc");
        assert_eq!(&pool.payload(slot)[..3], b"abc");
    }

    #[test]
    fn test_oversized_pool_is_rejected() {
        assert_eq!(MsgPool::new(usize::MAX, 64).err(), Some(code::ENOSPC));
    }
}
