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

//! Realtime signal delivery for queue notification.
//!
//! Each thread owns a pending-signal queue; delivery appends and wakes
//! one waiter. Only the owning thread dequeues.

use crate::thread::{self, ThreadNode};
use core::ffi::c_int;
use parking_lot::{Condvar, Mutex};
use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

/// First realtime signal number.
pub const SIGRTMIN: c_int = 32;
/// Last realtime signal number.
pub const SIGRTMAX: c_int = 63;

/// si_code: sent by message queue state change.
pub const SI_MESGQ: c_int = -3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigInfo {
    pub signo: c_int,
    pub code: c_int,
    pub value: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigNotify {
    /// Deliver a signal on the notified event.
    Signal,
    /// Arm the registration but deliver nothing.
    None,
}

#[derive(Debug, Clone, Copy)]
pub struct SigEvent {
    pub notify: SigNotify,
    pub signo: c_int,
    pub value: usize,
}

pub(crate) fn is_realtime_signal(signo: c_int) -> bool {
    (SIGRTMIN..=SIGRTMAX).contains(&signo)
}

#[derive(Debug)]
pub(crate) struct PendingSignals {
    queue: Mutex<VecDeque<SigInfo>>,
    cond: Condvar,
}

impl PendingSignals {
    pub(crate) fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            cond: Condvar::new(),
        }
    }

    pub(crate) fn push(&self, si: SigInfo) {
        let mut queue = self.queue.lock();
        queue.push_back(si);
        self.cond.notify_one();
    }

    pub(crate) fn try_take(&self) -> Option<SigInfo> {
        self.queue.lock().pop_front()
    }

    pub(crate) fn wait_timeout(&self, timeout: Duration) -> Option<SigInfo> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.queue.lock();
        loop {
            if let Some(si) = queue.pop_front() {
                return Some(si);
            }
            if self.cond.wait_until(&mut queue, deadline).timed_out() {
                return queue.pop_front();
            }
        }
    }
}

/// Queue a signal for `target`.
pub(crate) fn sigqueue(target: &ThreadNode, si: SigInfo) {
    target.signals().push(si);
}

/// Dequeue one pending signal for the calling thread, waiting up to
/// `timeout`.
pub fn wait_timeout(timeout: Duration) -> Option<SigInfo> {
    thread::current().signals().wait_timeout(timeout)
}

/// Dequeue one pending signal for the calling thread without waiting.
pub fn try_take() -> Option<SigInfo> {
    thread::current().signals().try_take()
}
