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

//! Queue descriptor table.
//!
//! Descriptors carry the per-opener flag word: the access mode fixed
//! at open time plus the non-blocking bit, which `set_attr` may flip
//! later.

use crate::{
    config,
    error::{code, Error},
    mqueue::MessageQueue,
};
use core::{
    ffi::c_int,
    sync::atomic::{AtomicI32, Ordering},
};
use log::warn;
use spin::{Mutex as SpinLock, Once};
use std::sync::Arc;

#[derive(Debug)]
pub(crate) struct MqDescriptor {
    mq: Arc<MessageQueue>,
    flags: AtomicI32,
}

impl MqDescriptor {
    pub(crate) fn queue(&self) -> &Arc<MessageQueue> {
        &self.mq
    }

    pub(crate) fn flags(&self) -> c_int {
        self.flags.load(Ordering::Relaxed)
    }

    pub(crate) fn set_flags(&self, flags: c_int) {
        self.flags.store(flags, Ordering::Relaxed);
    }
}

struct DescTable {
    fds: Vec<Option<Arc<MqDescriptor>>>,
    next_fd: usize,
}

impl DescTable {
    fn new() -> Self {
        Self {
            fds: Vec::new(),
            next_fd: 0,
        }
    }

    fn update_next_fd(&mut self, just_used: usize) {
        let len = self.fds.len();
        self.next_fd = (just_used + 1..len)
            .find(|&fd| self.fds[fd].is_none())
            .unwrap_or_else(|| {
                (0..just_used)
                    .find(|&fd| self.fds[fd].is_none())
                    .unwrap_or(len)
            });
    }
}

static DESC_TABLE: Once<SpinLock<DescTable>> = Once::new();

fn desc_table() -> &'static SpinLock<DescTable> {
    DESC_TABLE.call_once(|| SpinLock::new(DescTable::new()))
}

pub(crate) fn desc_create(mq: Arc<MessageQueue>, flags: c_int) -> Result<c_int, Error> {
    let mut table = desc_table().lock();
    let fd = table.next_fd;
    if fd >= config::DESC_MAX {
        warn!("[mq] descriptor table full");
        return Err(code::ENOSPC);
    }
    if fd == table.fds.len() {
        table.fds.push(None);
    }
    table.fds[fd] = Some(Arc::new(MqDescriptor {
        mq,
        flags: AtomicI32::new(flags),
    }));
    table.update_next_fd(fd);
    Ok(fd as c_int)
}

pub(crate) fn desc_get(fd: c_int) -> Result<Arc<MqDescriptor>, Error> {
    let table = desc_table().lock();
    if fd < 0 || fd as usize >= table.fds.len() {
        return Err(code::EBADF);
    }
    table.fds[fd as usize].clone().ok_or(code::EBADF)
}

pub(crate) fn desc_destroy(fd: c_int) -> Result<Arc<MqDescriptor>, Error> {
    let mut table = desc_table().lock();
    if fd < 0 || fd as usize >= table.fds.len() {
        warn!("[mq] close of invalid descriptor {}", fd);
        return Err(code::EBADF);
    }
    let desc = table.fds[fd as usize].take().ok_or(code::EBADF)?;
    if (fd as usize) < table.next_fd {
        table.next_fd = fd as usize;
    }
    Ok(desc)
}

/// Drop every descriptor bound to `mq`. Used by forced teardown only;
/// the released references are the caller's to account for.
pub(crate) fn purge_queue(mq: &Arc<MessageQueue>) -> usize {
    let mut table = desc_table().lock();
    let mut dropped = 0;
    for fd in 0..table.fds.len() {
        let bound = matches!(&table.fds[fd], Some(d) if Arc::ptr_eq(d.queue(), mq));
        if bound {
            table.fds[fd] = None;
            if fd < table.next_fd {
                table.next_fd = fd;
            }
            dropped += 1;
        }
    }
    dropped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mqueue::{MqAttr, MessageQueue};

    fn queue() -> Arc<MessageQueue> {
        let attr = MqAttr {
            flags: 0,
            max_msgs: 1,
            msg_size: 4,
            cur_msgs: 0,
        };
        Arc::new(MessageQueue::new("desc-test", Some(&attr)).unwrap())
    }

    #[test]
    fn test_create_get_destroy() {
        let mq = queue();
        let fd = desc_create(mq.clone(), libc::O_RDWR).unwrap();
        let desc = desc_get(fd).unwrap();
        assert!(Arc::ptr_eq(desc.queue(), &mq));
        assert_eq!(desc.flags(), libc::O_RDWR);
        desc_destroy(fd).unwrap();
        assert_eq!(desc_get(fd).err(), Some(code::EBADF));
    }

    #[test]
    fn test_negative_fd_is_rejected() {
        assert_eq!(desc_get(-1).err(), Some(code::EBADF));
        assert_eq!(desc_destroy(-1).err(), Some(code::EBADF));
    }

    #[test]
    fn test_freed_fd_stays_dead_until_reused() {
        let mq = queue();
        let a = desc_create(mq.clone(), libc::O_RDONLY).unwrap();
        let b = desc_create(mq.clone(), libc::O_RDONLY).unwrap();
        assert_ne!(a, b);
        desc_destroy(a).unwrap();
        assert_eq!(desc_get(a).err(), Some(code::EBADF));
        let c = desc_create(mq, libc::O_RDONLY).unwrap();
        assert!(desc_get(c).is_ok());
        desc_destroy(b).unwrap();
        desc_destroy(c).unwrap();
    }
}
