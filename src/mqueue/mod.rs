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

//! POSIX message queues.
//!
//! A queue is a named, refcounted object holding a fixed pool of
//! message slots, a priority-ordered list of pending messages and two
//! wait queues (blocked senders and blocked receivers). Senders and
//! receivers rendezvous directly when possible: a send that finds a
//! waiting receiver copies straight into the receiver's buffer and
//! never touches the pool.

mod descriptor;
mod pool;
mod prio_list;
mod registry;

use crate::{
    config,
    error::{code, Error},
    signal::{self, SigEvent, SigInfo, SigNotify},
    sync::wait_queue::{Rendezvous, WaitEntry, WaitQueue},
    sync::WakeCause,
    thread::{self, Thread, ThreadNode},
    time,
};
use core::ffi::c_int;
use log::{debug, warn};
use pool::MsgPool;
use prio_list::{PrioList, QueuedMsg};
use registry::{Lookup, NodeState};
use spin::{Mutex as SpinLock, Once};
use std::sync::Arc;

pub(crate) const MQ_MAGIC: u32 = 0x6d71_6f62;

const PERMS_MASK: c_int = libc::O_RDONLY | libc::O_WRONLY | libc::O_RDWR;

/// Queue attributes as seen through a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MqAttr {
    /// Per-descriptor flag word: access mode plus `O_NONBLOCK`.
    pub flags: c_int,
    /// Capacity in messages, fixed at creation.
    pub max_msgs: usize,
    /// Maximum payload bytes per message, fixed at creation.
    pub msg_size: usize,
    /// Messages currently enqueued.
    pub cur_msgs: usize,
}

struct NotifyTarget {
    thread: ThreadNode,
    si: SigInfo,
}

struct MqInner {
    pool: MsgPool,
    queued: PrioList,
    receivers: WaitQueue,
    senders: WaitQueue,
    notify: Option<NotifyTarget>,
}

pub struct MessageQueue {
    name: String,
    magic: u32,
    max_msgs: usize,
    msg_size: usize,
    node: SpinLock<NodeState>,
    inner: SpinLock<MqInner>,
}

impl core::fmt::Debug for MessageQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MessageQueue")
            .field("name", &self.name)
            .field("max_msgs", &self.max_msgs)
            .field("msg_size", &self.msg_size)
            .finish_non_exhaustive()
    }
}

impl MessageQueue {
    pub(crate) fn new(name: &str, attr: Option<&MqAttr>) -> Result<Self, Error> {
        let (max_msgs, msg_size) = match attr {
            Some(a) => (a.max_msgs, a.msg_size),
            None => (config::MQ_MAXMSG_DEFAULT, config::MQ_MSGSIZE_DEFAULT),
        };
        if max_msgs == 0 || msg_size == 0 {
            return Err(code::EINVAL);
        }
        let pool = MsgPool::new(max_msgs, msg_size)?;
        debug!(
            "[mq] creating \"{}\": max_msgs={} msg_size={}",
            name, max_msgs, msg_size
        );
        Ok(Self {
            name: name.to_owned(),
            magic: MQ_MAGIC,
            max_msgs,
            msg_size,
            node: SpinLock::new(NodeState::new_linked()),
            inner: SpinLock::new(MqInner {
                pool,
                queued: PrioList::new(),
                receivers: WaitQueue::new(),
                senders: WaitQueue::new(),
                notify: None,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn magic(&self) -> u32 {
        self.magic
    }

    pub(crate) fn node(&self) -> &SpinLock<NodeState> {
        &self.node
    }

    /// Wake everything still blocked on the queue and drop the
    /// notification registration. The pool is released with the
    /// object itself.
    fn destroy(&self) {
        let mut inner = self.inner.lock();
        inner.receivers.flush(WakeCause::Removed);
        inner.senders.flush(WakeCause::Removed);
        inner.notify = None;
    }

    fn try_send_locked(
        &self,
        inner: &mut MqInner,
        flags: c_int,
        buf: &[u8],
        prio: u32,
    ) -> Result<(), Error> {
        let perms = flags & PERMS_MASK;
        if perms != libc::O_WRONLY && perms != libc::O_RDWR {
            return Err(code::EPERM);
        }
        if buf.len() > self.msg_size {
            return Err(code::EMSGSIZE);
        }

        if let Some(receiver) = inner.receivers.claim_one() {
            // Direct handoff: the payload lands in the receiver's
            // buffer, no slot is consumed, the notifier stays armed.
            receiver.fill_slot(buf, prio);
            receiver.complete();
            return Ok(());
        }

        let Some(slot) = inner.pool.alloc() else {
            return Err(code::EAGAIN);
        };
        inner.pool.payload_mut(slot)[..buf.len()].copy_from_slice(buf);
        inner.queued.enqueue(QueuedMsg {
            slot,
            len: buf.len(),
            prio,
        });

        // First message into an empty queue with nobody waiting:
        // fire the one-shot notification.
        if inner.queued.count() == 1 {
            if let Some(target) = inner.notify.take() {
                signal::sigqueue(&target.thread, target.si);
            }
        }
        Ok(())
    }

    fn try_receive_locked(
        &self,
        inner: &mut MqInner,
        flags: c_int,
        buf: &mut [u8],
        prio: Option<&mut u32>,
    ) -> Result<usize, Error> {
        let perms = flags & PERMS_MASK;
        if perms != libc::O_RDONLY && perms != libc::O_RDWR {
            return Err(code::EPERM);
        }
        if buf.len() < self.msg_size {
            return Err(code::EMSGSIZE);
        }

        let Some(msg) = inner.queued.dequeue_head() else {
            return Err(code::EAGAIN);
        };
        buf[..msg.len].copy_from_slice(&inner.pool.payload(msg.slot)[..msg.len]);
        if let Some(prio) = prio {
            *prio = msg.prio;
        }
        inner.pool.free(msg.slot);

        // The queue had been full if senders are parked; hand the
        // freed slot's chance to the most urgent one.
        inner.senders.wake_one();
        Ok(msg.len)
    }

    #[cfg(test)]
    pub(crate) fn free_slots(&self) -> usize {
        self.inner.lock().pool.free_count()
    }

    #[cfg(test)]
    pub(crate) fn waiting_receivers(&self) -> usize {
        self.inner.lock().receivers.len()
    }

    #[cfg(test)]
    pub(crate) fn waiting_senders(&self) -> usize {
        self.inner.lock().senders.len()
    }
}

static MQ_LIST: Once<SpinLock<Vec<Arc<MessageQueue>>>> = Once::new();

fn mq_list() -> &'static SpinLock<Vec<Arc<MessageQueue>>> {
    MQ_LIST.call_once(|| SpinLock::new(Vec::new()))
}

fn mq_list_add(mq: &Arc<MessageQueue>) {
    mq_list().lock().push(mq.clone());
}

fn mq_list_remove(mq: &Arc<MessageQueue>) {
    mq_list().lock().retain(|queued| !Arc::ptr_eq(queued, mq));
}

fn destroy_queue(mq: &Arc<MessageQueue>) {
    mq.destroy();
    mq_list_remove(mq);
    debug!("[mq] message queue \"{}\" destroyed", mq.name());
}

fn attach_descriptor(mq: Arc<MessageQueue>, oflags: c_int) -> Result<c_int, Error> {
    let flags = oflags & (libc::O_NONBLOCK | PERMS_MASK);
    match descriptor::desc_create(mq.clone(), flags) {
        Ok(fd) => Ok(fd),
        Err(e) => {
            if registry::node_put(&mq) {
                destroy_queue(&mq);
            }
            Err(e)
        }
    }
}

/// Open the queue `name`, creating it when `O_CREAT` is set.
///
/// `attr` supplies `max_msgs`/`msg_size` at creation; `None` applies
/// the defaults from [`config`].
pub fn open(name: &str, oflags: c_int, attr: Option<&MqAttr>) -> Result<c_int, Error> {
    if name.is_empty() {
        return Err(code::EINVAL);
    }
    if name.len() > config::NAME_MAX {
        return Err(code::ENAMETOOLONG);
    }
    if !thread::may_block() {
        return Err(code::EPERM);
    }

    loop {
        match registry::node_get(name, MQ_MAGIC, oflags)? {
            Lookup::Exists(mq) => return attach_descriptor(mq, oflags),
            Lookup::Building(gate) => {
                gate.wait()?;
            }
            Lookup::Missing(gate) => {
                // The registry is unlocked while the pool arena is
                // set up; concurrent openers park on the gate.
                return match MessageQueue::new(name, attr) {
                    Ok(mq) => {
                        let mq = Arc::new(mq);
                        // Claim the descriptor's reference before the
                        // name becomes visible, so a concurrent unlink
                        // cannot tear the queue down under us.
                        mq.node().lock().refs += 1;
                        mq_list_add(&mq);
                        registry::node_add_finished(name, Ok(mq.clone()), &gate);
                        attach_descriptor(mq, oflags)
                    }
                    Err(e) => {
                        registry::node_add_finished(name, Err(e), &gate);
                        Err(e)
                    }
                };
            }
        }
    }
}

/// Release one descriptor. The queue is destroyed when the name is
/// already unlinked and this was the last descriptor.
pub fn close(fd: c_int) -> Result<(), Error> {
    if !thread::may_block() {
        return Err(code::EPERM);
    }
    let desc = descriptor::desc_destroy(fd)?;
    let mq = desc.queue().clone();
    if registry::node_put(&mq) {
        destroy_queue(&mq);
    }
    Ok(())
}

/// Remove `name` from the registry. Open descriptors keep the queue
/// alive; the last close destroys it.
pub fn unlink(name: &str) -> Result<(), Error> {
    if name.len() > config::NAME_MAX {
        return Err(code::ENAMETOOLONG);
    }
    if !thread::may_block() {
        return Err(code::EPERM);
    }
    let (mq, destroy) = registry::node_remove(name, MQ_MAGIC)?;
    if destroy {
        destroy_queue(&mq);
    }
    Ok(())
}

fn send_inner(fd: c_int, buf: &[u8], prio: u32, abs: Option<&libc::timespec>) -> Result<(), Error> {
    loop {
        let desc = descriptor::desc_get(fd)?;
        let mq = desc.queue().clone();
        let flags = desc.flags();

        let mut inner = mq.inner.lock();
        match mq.try_send_locked(&mut inner, flags, buf, prio) {
            Err(e) if e == code::EAGAIN => {}
            result => return result,
        }
        if flags & libc::O_NONBLOCK != 0 {
            return Err(code::EAGAIN);
        }
        if !thread::may_block() {
            return Err(code::EPERM);
        }
        let deadline = match abs {
            Some(ts) => Some(time::deadline_instant(ts)?),
            None => None,
        };

        let current = thread::current();
        let entry = WaitEntry::new(current.clone());
        // Publish the entry to the interrupter before it is reachable
        // from the wait queue.
        current.set_blocked_on(&entry);
        inner.senders.add(entry.clone());
        // An interrupt that arrived before the entry was visible had
        // nothing to claim; catch it now, while the queue is locked.
        if current.take_interrupt_pending() {
            entry.claim_interrupted();
            inner.senders.remove(&entry);
            drop(inner);
            current.clear_blocked_on();
            return Err(code::EINTR);
        }
        drop(inner);

        let cause = entry.wait(deadline);
        current.clear_blocked_on();
        if cause != WakeCause::Woken {
            mq.inner.lock().senders.remove(&entry);
        }
        match cause {
            WakeCause::Woken => {
                if current.take_interrupt_pending() {
                    // Bailing out consumes the wake; pass the freed
                    // slot's chance to the next parked sender.
                    mq.inner.lock().senders.wake_one();
                    return Err(code::EINTR);
                }
                // A slot came free; whether it is still free is
                // decided by the retry.
            }
            WakeCause::TimedOut => return Err(code::ETIMEDOUT),
            WakeCause::Interrupted => return Err(code::EINTR),
            WakeCause::Removed => return Err(code::EBADF),
        }
    }
}

fn receive_inner(
    fd: c_int,
    buf: &mut [u8],
    mut prio: Option<&mut u32>,
    abs: Option<&libc::timespec>,
) -> Result<usize, Error> {
    loop {
        let desc = descriptor::desc_get(fd)?;
        let mq = desc.queue().clone();
        let flags = desc.flags();

        let mut inner = mq.inner.lock();
        match mq.try_receive_locked(&mut inner, flags, buf, prio.as_deref_mut()) {
            Err(e) if e == code::EAGAIN => {}
            result => return result,
        }
        if flags & libc::O_NONBLOCK != 0 {
            return Err(code::EAGAIN);
        }
        if !thread::may_block() {
            return Err(code::EPERM);
        }
        let deadline = match abs {
            Some(ts) => Some(time::deadline_instant(ts)?),
            None => None,
        };

        let current = thread::current();
        // Publish the rendezvous before suspending so a sender can
        // finish the exchange while we are parked.
        let mut handoff_len: usize = 0;
        let rendezvous = Rendezvous::new(buf, &mut handoff_len, prio.as_deref_mut());
        let entry = WaitEntry::with_slot(current.clone(), rendezvous);
        current.set_blocked_on(&entry);
        inner.receivers.add(entry.clone());
        // An interrupt that arrived before the entry was visible had
        // nothing to claim; catch it now, while the queue is locked.
        if current.take_interrupt_pending() {
            entry.claim_interrupted();
            inner.receivers.remove(&entry);
            drop(inner);
            current.clear_blocked_on();
            return Err(code::EINTR);
        }
        drop(inner);

        let cause = entry.wait(deadline);
        current.clear_blocked_on();
        if cause != WakeCause::Woken {
            mq.inner.lock().receivers.remove(&entry);
        }
        match cause {
            WakeCause::Woken => {
                if entry.handoff_used() {
                    return Ok(handoff_len);
                }
                if current.take_interrupt_pending() {
                    // Bailing out consumes the wake; pass it to the
                    // next parked receiver.
                    mq.inner.lock().receivers.wake_one();
                    return Err(code::EINTR);
                }
            }
            WakeCause::TimedOut => return Err(code::ETIMEDOUT),
            WakeCause::Interrupted => return Err(code::EINTR),
            WakeCause::Removed => return Err(code::EBADF),
        }
    }
}

/// Send `buf` at `prio`, blocking while the queue is full.
pub fn send(fd: c_int, buf: &[u8], prio: u32) -> Result<(), Error> {
    send_inner(fd, buf, prio, None)
}

/// Send with an absolute realtime deadline.
pub fn timed_send(fd: c_int, buf: &[u8], prio: u32, abs: &libc::timespec) -> Result<(), Error> {
    time::check_timespec(abs)?;
    send_inner(fd, buf, prio, Some(abs))
}

/// Receive the highest-priority message, blocking while the queue is
/// empty. `buf` must hold at least the queue's configured message
/// size. Returns the payload length.
pub fn receive(fd: c_int, buf: &mut [u8], prio: Option<&mut u32>) -> Result<usize, Error> {
    receive_inner(fd, buf, prio, None)
}

/// Receive with an absolute realtime deadline.
pub fn timed_receive(
    fd: c_int,
    buf: &mut [u8],
    prio: Option<&mut u32>,
    abs: &libc::timespec,
) -> Result<usize, Error> {
    time::check_timespec(abs)?;
    receive_inner(fd, buf, prio, Some(abs))
}

/// Snapshot the queue attributes through a descriptor.
pub fn getattr(fd: c_int) -> Result<MqAttr, Error> {
    let desc = descriptor::desc_get(fd)?;
    let mq = desc.queue();
    let inner = mq.inner.lock();
    Ok(MqAttr {
        flags: desc.flags(),
        max_msgs: mq.max_msgs,
        msg_size: mq.msg_size,
        cur_msgs: inner.queued.count(),
    })
}

/// Update the descriptor's flag word and return the previous
/// attributes. Permission bits fixed at open time are preserved; only
/// the remaining bits (principally `O_NONBLOCK`) change.
pub fn setattr(fd: c_int, attr: &MqAttr) -> Result<MqAttr, Error> {
    let desc = descriptor::desc_get(fd)?;
    let mq = desc.queue();
    let old = {
        let inner = mq.inner.lock();
        MqAttr {
            flags: desc.flags(),
            max_msgs: mq.max_msgs,
            msg_size: mq.msg_size,
            cur_msgs: inner.queued.count(),
        }
    };
    let flags = (desc.flags() & PERMS_MASK) | (attr.flags & !PERMS_MASK);
    desc.set_flags(flags);
    Ok(old)
}

/// Register, re-arm or clear the queue's notification.
///
/// At most one registration exists per queue. Clearing succeeds only
/// for the registered thread; registering over another thread's
/// registration fails with `EBUSY`. Delivery is one-shot.
pub fn notify(fd: c_int, event: Option<&SigEvent>) -> Result<(), Error> {
    // The signal number is validated before the delivery mode is
    // looked at, so an event never carries an out-of-range signo.
    if let Some(ev) = event {
        if !signal::is_realtime_signal(ev.signo) {
            return Err(code::EINVAL);
        }
    }
    if !thread::may_block() {
        return Err(code::EPERM);
    }
    let current = thread::current();
    let desc = descriptor::desc_get(fd)?;
    let mq = desc.queue();

    let mut inner = mq.inner.lock();
    if let Some(target) = &inner.notify {
        if Thread::id(&target.thread) != Thread::id(&current) {
            return Err(code::EBUSY);
        }
    }
    inner.notify = match event {
        None => None,
        Some(ev) if matches!(ev.notify, SigNotify::None) => None,
        Some(ev) => Some(NotifyTarget {
            thread: current,
            si: SigInfo {
                signo: ev.signo,
                code: signal::SI_MESGQ,
                value: ev.value,
            },
        }),
    };
    Ok(())
}

/// Forcibly destroy every queue still live. Part of subsystem
/// teardown.
pub fn package_cleanup() {
    loop {
        let mq = mq_list().lock().first().cloned();
        let Some(mq) = mq else {
            break;
        };
        warn!(
            "[mq] message queue \"{}\" was not unlinked, unlinking now",
            mq.name()
        );
        let _ = registry::node_remove(mq.name(), MQ_MAGIC);
        descriptor::purge_queue(&mq);
        destroy_queue(&mq);
    }
}
