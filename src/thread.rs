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

//! Thread representation consumed by the queue subsystem.
//!
//! A [`Thread`] is the subsystem's view of an executing thread: a
//! priority used to order wait queues, the wait entry it is currently
//! blocked on, an interrupt flag honored at cancellation points and a
//! pending-signal queue for notification delivery. Threads spawned
//! through [`spawn`]/[`Builder`] are registered at birth; any other
//! thread is adopted at default priority on first contact.

use crate::{config, signal::PendingSignals, sync::wait_queue::WaitEntry};
use core::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use spin::Mutex as SpinLock;
use std::{cell::RefCell, sync::Arc};

pub type ThreadPriority = u8;
pub type ThreadNode = Arc<Thread>;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT: RefCell<Option<ThreadNode>> = const { RefCell::new(None) };
    static NO_BLOCK_DEPTH: std::cell::Cell<u32> = const { std::cell::Cell::new(0) };
}

#[derive(Debug)]
pub struct Thread {
    id: u64,
    name: Option<String>,
    priority: AtomicU8,
    interrupt_pending: AtomicBool,
    blocked_on: SpinLock<Option<Arc<WaitEntry>>>,
    signals: PendingSignals,
}

impl Thread {
    fn new(name: Option<String>, priority: ThreadPriority) -> ThreadNode {
        Arc::new(Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            name,
            priority: AtomicU8::new(priority),
            interrupt_pending: AtomicBool::new(false),
            blocked_on: SpinLock::new(None),
            signals: PendingSignals::new(),
        })
    }

    #[inline]
    pub fn id(me: &ThreadNode) -> u64 {
        me.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    pub fn priority(&self) -> ThreadPriority {
        self.priority.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_priority(&self, priority: ThreadPriority) {
        debug_assert!(priority < config::THREAD_PRIORITY_MAX);
        self.priority.store(priority, Ordering::Relaxed);
    }

    /// Break the thread out of a blocking queue operation.
    ///
    /// If it is suspended on a wait entry the entry resolves as
    /// interrupted; otherwise the interrupt stays pending and the next
    /// cancellation point consumes it.
    pub fn interrupt(&self) {
        let blocked = self.blocked_on.lock().clone();
        if let Some(entry) = blocked {
            if entry.claim_interrupted() {
                entry.complete();
                return;
            }
        }
        self.interrupt_pending.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub(crate) fn take_interrupt_pending(&self) -> bool {
        self.interrupt_pending.swap(false, Ordering::SeqCst)
    }

    pub(crate) fn set_blocked_on(&self, entry: &Arc<WaitEntry>) {
        *self.blocked_on.lock() = Some(entry.clone());
    }

    pub(crate) fn clear_blocked_on(&self) {
        *self.blocked_on.lock() = None;
    }

    pub(crate) fn signals(&self) -> &PendingSignals {
        &self.signals
    }
}

/// The calling thread's node, adopting foreign threads on first use.
pub fn current() -> ThreadNode {
    CURRENT.with(|cell| {
        let mut slot = cell.borrow_mut();
        match &*slot {
            Some(node) => node.clone(),
            None => {
                let name = std::thread::current().name().map(str::to_owned);
                let node = Thread::new(name, config::THREAD_PRIORITY_DEFAULT);
                *slot = Some(node.clone());
                node
            }
        }
    })
}

/// Whether the calling context is allowed to suspend.
pub(crate) fn may_block() -> bool {
    NO_BLOCK_DEPTH.with(|depth| depth.get() == 0)
}

/// Marks the calling thread as non-blockable for the guard's lifetime;
/// blocking queue operations fail with `EPERM` instead of suspending.
pub struct NoBlockGuard {
    _not_send: core::marker::PhantomData<*const ()>,
}

pub fn forbid_blocking() -> NoBlockGuard {
    NO_BLOCK_DEPTH.with(|depth| depth.set(depth.get() + 1));
    NoBlockGuard {
        _not_send: core::marker::PhantomData,
    }
}

impl Drop for NoBlockGuard {
    fn drop(&mut self) {
        NO_BLOCK_DEPTH.with(|depth| depth.set(depth.get() - 1));
    }
}

pub struct Builder {
    name: Option<String>,
    priority: ThreadPriority,
}

impl Builder {
    pub fn new() -> Self {
        Self {
            name: None,
            priority: config::THREAD_PRIORITY_DEFAULT,
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_owned());
        self
    }

    pub fn priority(mut self, priority: ThreadPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn spawn<F, T>(self, f: F) -> std::io::Result<JoinHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let node = Thread::new(self.name.clone(), self.priority);
        let registered = node.clone();
        let mut builder = std::thread::Builder::new();
        if let Some(name) = self.name {
            builder = builder.name(name);
        }
        let inner = builder.spawn(move || {
            CURRENT.with(|cell| *cell.borrow_mut() = Some(registered));
            f()
        })?;
        Ok(JoinHandle { node, inner })
    }
}

impl Default for Builder {
    fn default() -> Self {
        Builder::new()
    }
}

pub fn spawn<F, T>(f: F) -> JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    Builder::new().spawn(f).expect("failed to spawn thread")
}

pub struct JoinHandle<T> {
    node: ThreadNode,
    inner: std::thread::JoinHandle<T>,
}

impl<T> JoinHandle<T> {
    pub fn thread(&self) -> &ThreadNode {
        &self.node
    }

    pub fn join(self) -> std::thread::Result<T> {
        self.inner.join()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_adopts_foreign_thread() {
        let me = current();
        assert_eq!(me.priority(), config::THREAD_PRIORITY_DEFAULT);
        assert!(Arc::ptr_eq(&me, &current()));
    }

    #[test]
    fn test_spawn_registers_node() {
        let handle = Builder::new().name("worker").priority(4).spawn(|| {
            let me = current();
            (Thread::id(&me), me.priority())
        });
        let handle = handle.unwrap();
        let id = Thread::id(handle.thread());
        let (seen_id, seen_prio) = handle.join().unwrap();
        assert_eq!(seen_id, id);
        assert_eq!(seen_prio, 4);
    }

    #[test]
    fn test_forbid_blocking_nests() {
        assert!(may_block());
        {
            let _outer = forbid_blocking();
            let _inner = forbid_blocking();
            assert!(!may_block());
        }
        assert!(may_block());
    }

    #[test]
    fn test_interrupt_without_sleeper_stays_pending() {
        let me = current();
        me.interrupt();
        assert!(me.take_interrupt_pending());
        assert!(!me.take_interrupt_pending());
    }
}
