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

//! Priority-ordered wait queue for blocked threads.
//!
//! Every suspension goes through a [`WaitEntry`]: the sleeper inserts
//! it under the owning object's lock, drops the lock and parks on the
//! entry's event. Wakers claim the entry by CAS on its wake cause, so
//! a waker and a concurrently firing timeout resolve to exactly one
//! outcome. A receiver entry additionally carries the rendezvous a
//! sender fills in on the direct-handoff path.

use crate::thread::{Thread, ThreadNode};
use core::{
    cell::UnsafeCell,
    sync::atomic::{AtomicU8, Ordering},
};
use parking_lot::{Condvar, Mutex};
use std::{collections::VecDeque, sync::Arc, time::Instant};

const PENDING: u8 = 0;
const WOKEN: u8 = 1;
const TIMED_OUT: u8 = 2;
const INTERRUPTED: u8 = 3;
const REMOVED: u8 = 4;

/// Why a sleeper came back from [`WaitEntry::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeCause {
    /// A waker released this entry; the condition may hold now.
    Woken,
    /// The absolute deadline elapsed.
    TimedOut,
    /// The thread was interrupted while blocked.
    Interrupted,
    /// The object the entry was queued on has been removed.
    Removed,
}

impl WakeCause {
    fn from_state(state: u8) -> WakeCause {
        match state {
            WOKEN => WakeCause::Woken,
            TIMED_OUT => WakeCause::TimedOut,
            INTERRUPTED => WakeCause::Interrupted,
            REMOVED => WakeCause::Removed,
            _ => unreachable!("wait entry resolved without a cause"),
        }
    }
}

/// Receiver-published landing zone for a direct handoff.
///
/// Holds raw pointers into the receiver's frame. They stay valid
/// because the receiver cannot return from [`WaitEntry::wait`] until
/// the claimant completes the entry, and only the claimant touches
/// them in between.
pub(crate) struct Rendezvous {
    buf: *mut u8,
    cap: usize,
    len: *mut usize,
    prio: Option<*mut u32>,
    used: bool,
}

impl Rendezvous {
    pub(crate) fn new(buf: &mut [u8], len: &mut usize, prio: Option<&mut u32>) -> Self {
        Self {
            buf: buf.as_mut_ptr(),
            cap: buf.len(),
            len,
            prio: prio.map(|p| p as *mut u32),
            used: false,
        }
    }
}

pub(crate) struct WaitEntry {
    thread: ThreadNode,
    cause: AtomicU8,
    signaled: Mutex<bool>,
    cond: Condvar,
    slot: UnsafeCell<Option<Rendezvous>>,
}

// The rendezvous slot is written only by the thread that claimed the
// entry and read by the sleeper only after completion; the completion
// handshake orders the two.
unsafe impl Send for WaitEntry {}
unsafe impl Sync for WaitEntry {}

impl core::fmt::Debug for WaitEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WaitEntry")
            .field("thread", &Thread::id(&self.thread))
            .field("cause", &self.cause.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl WaitEntry {
    pub(crate) fn new(thread: ThreadNode) -> Arc<Self> {
        Arc::new(Self {
            thread,
            cause: AtomicU8::new(PENDING),
            signaled: Mutex::new(false),
            cond: Condvar::new(),
            slot: UnsafeCell::new(None),
        })
    }

    pub(crate) fn with_slot(thread: ThreadNode, slot: Rendezvous) -> Arc<Self> {
        Arc::new(Self {
            thread,
            cause: AtomicU8::new(PENDING),
            signaled: Mutex::new(false),
            cond: Condvar::new(),
            slot: UnsafeCell::new(Some(slot)),
        })
    }

    pub(crate) fn thread(&self) -> &ThreadNode {
        &self.thread
    }

    fn claim(&self, cause: u8) -> bool {
        self.cause
            .compare_exchange(PENDING, cause, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn claim_interrupted(&self) -> bool {
        self.claim(INTERRUPTED)
    }

    /// Release the sleeper. The claimant must have won the CAS first.
    pub(crate) fn complete(&self) {
        let mut signaled = self.signaled.lock();
        *signaled = true;
        self.cond.notify_one();
    }

    /// Copy a payload into the receiver's rendezvous.
    ///
    /// Must be called by the claimant, under the queue lock, before
    /// [`complete`](Self::complete).
    pub(crate) fn fill_slot(&self, payload: &[u8], prio: u32) {
        // SAFETY: we are the claimant and the sleeper is still parked,
        // so the pointers published in the rendezvous are live and
        // unaliased.
        unsafe {
            let slot = (*self.slot.get())
                .as_mut()
                .expect("direct handoff without a rendezvous");
            debug_assert!(payload.len() <= slot.cap);
            core::ptr::copy_nonoverlapping(payload.as_ptr(), slot.buf, payload.len());
            *slot.len = payload.len();
            if let Some(p) = slot.prio {
                *p = prio;
            }
            slot.used = true;
        }
    }

    /// Whether a sender completed a direct handoff into this entry.
    pub(crate) fn handoff_used(&self) -> bool {
        // SAFETY: called by the sleeper after wait() returned, which
        // happens-after any claimant write.
        unsafe { (*self.slot.get()).as_ref().is_some_and(|s| s.used) }
    }

    /// Park until a waker completes the entry or the deadline passes.
    pub(crate) fn wait(&self, deadline: Option<Instant>) -> WakeCause {
        let mut signaled = self.signaled.lock();
        while !*signaled {
            match deadline {
                None => self.cond.wait(&mut signaled),
                Some(at) => {
                    if self.cond.wait_until(&mut signaled, at).timed_out() {
                        if self.claim(TIMED_OUT) {
                            return WakeCause::TimedOut;
                        }
                        // A waker beat the timeout; its completion is
                        // imminent and may carry a handoff.
                        while !*signaled {
                            self.cond.wait(&mut signaled);
                        }
                        break;
                    }
                }
            }
        }
        WakeCause::from_state(self.cause.load(Ordering::Acquire))
    }
}

/// Threads blocked on one condition, ordered by thread priority
/// (most urgent first), FIFO within a priority.
pub(crate) struct WaitQueue {
    entries: VecDeque<Arc<WaitEntry>>,
}

impl WaitQueue {
    pub(crate) const fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    pub(crate) fn add(&mut self, entry: Arc<WaitEntry>) {
        let prio = entry.thread().priority();
        let pos = self
            .entries
            .iter()
            .position(|queued| queued.thread().priority() > prio);
        match pos {
            Some(at) => self.entries.insert(at, entry),
            None => self.entries.push_back(entry),
        }
    }

    /// Claim the most urgent waiter without releasing it yet, so the
    /// caller can fill its rendezvous first. Entries that already
    /// resolved (timeout, interrupt) are discarded along the way.
    pub(crate) fn claim_one(&mut self) -> Option<Arc<WaitEntry>> {
        while let Some(entry) = self.entries.pop_front() {
            if entry.claim(WOKEN) {
                return Some(entry);
            }
        }
        None
    }

    /// Wake the most urgent waiter. Returns whether one was released.
    pub(crate) fn wake_one(&mut self) -> bool {
        match self.claim_one() {
            Some(entry) => {
                entry.complete();
                true
            }
            None => false,
        }
    }

    /// Wake every waiter with the given cause. Returns whether any
    /// thread was released.
    pub(crate) fn flush(&mut self, cause: WakeCause) -> bool {
        let state = match cause {
            WakeCause::Woken => WOKEN,
            WakeCause::TimedOut => TIMED_OUT,
            WakeCause::Interrupted => INTERRUPTED,
            WakeCause::Removed => REMOVED,
        };
        let mut any = false;
        while let Some(entry) = self.entries.pop_front() {
            if entry.claim(state) {
                entry.complete();
                any = true;
            }
        }
        any
    }

    /// Detach an abandoned entry. A no-op if a waker already popped it.
    pub(crate) fn remove(&mut self, entry: &Arc<WaitEntry>) {
        self.entries.retain(|queued| !Arc::ptr_eq(queued, entry));
    }

    #[allow(dead_code)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread;
    use std::time::Duration;

    fn entry_with_priority(prio: crate::thread::ThreadPriority) -> Arc<WaitEntry> {
        let t = thread::current();
        t.set_priority(prio);
        WaitEntry::new(t)
    }

    #[test]
    fn test_wake_order_follows_priority_then_fifo() {
        let mut q = WaitQueue::new();
        let a = WaitEntry::new(thread::spawn(|| {}).thread().clone());
        let b = WaitEntry::new(thread::spawn(|| {}).thread().clone());
        let c = WaitEntry::new(thread::spawn(|| {}).thread().clone());
        a.thread().set_priority(8);
        b.thread().set_priority(4);
        c.thread().set_priority(8);
        q.add(a.clone());
        q.add(b.clone());
        q.add(c.clone());

        let first = q.claim_one().unwrap();
        assert!(Arc::ptr_eq(&first, &b));
        let second = q.claim_one().unwrap();
        assert!(Arc::ptr_eq(&second, &a));
        let third = q.claim_one().unwrap();
        assert!(Arc::ptr_eq(&third, &c));
        assert!(q.claim_one().is_none());
    }

    #[test]
    fn test_wake_one_on_empty_queue() {
        let mut q = WaitQueue::new();
        assert!(!q.wake_one());
    }

    #[test]
    fn test_timed_out_entry_is_skipped_by_wakers() {
        let mut q = WaitQueue::new();
        let stale = entry_with_priority(8);
        q.add(stale.clone());
        // Resolve the entry the way an expiring sleep would.
        assert!(stale.claim(TIMED_OUT));
        assert!(!q.wake_one());
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn test_flush_reports_cause() {
        let mut q = WaitQueue::new();
        let entry = WaitEntry::new(thread::spawn(|| {}).thread().clone());
        q.add(entry.clone());
        assert!(q.flush(WakeCause::Removed));
        assert_eq!(entry.wait(None), WakeCause::Removed);
    }

    #[test]
    fn test_wait_times_out() {
        let entry = entry_with_priority(8);
        let deadline = std::time::Instant::now() + Duration::from_millis(10);
        assert_eq!(entry.wait(Some(deadline)), WakeCause::TimedOut);
    }
}
