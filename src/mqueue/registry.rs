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

//! Named-object registry.
//!
//! Maps queue names to refcounted nodes. Creation is published in two
//! phases: the creator installs a placeholder, initializes the object
//! with the registry unlocked, then either publishes it or withdraws
//! the name. Concurrent openers of the same name park on the
//! placeholder's gate and never observe a half-built object.
//!
//! A node's reference count is the number of live descriptors plus one
//! while the name is still linked. Whoever drops the count to zero on
//! an unlinked node performs destruction, with the registry lock
//! released.

use crate::{
    error::{code, Error},
    mqueue::MessageQueue,
};
use core::ffi::c_int;
use parking_lot::{Condvar, Mutex};
use spin::{Mutex as SpinLock, Once};
use std::{collections::BTreeMap, sync::Arc};

#[derive(Debug)]
pub(crate) struct NodeState {
    pub refs: usize,
    pub unlinked: bool,
}

impl NodeState {
    pub(crate) fn new_linked() -> Self {
        Self {
            refs: 1,
            unlinked: false,
        }
    }
}

/// Parks openers of a name whose object is still being built.
pub(crate) struct InitGate {
    done: Mutex<Option<Result<(), Error>>>,
    cond: Condvar,
}

impl InitGate {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            done: Mutex::new(None),
            cond: Condvar::new(),
        })
    }

    fn finish(&self, result: Result<(), Error>) {
        let mut done = self.done.lock();
        *done = Some(result);
        self.cond.notify_all();
    }

    pub(crate) fn wait(&self) -> Result<(), Error> {
        let mut done = self.done.lock();
        while done.is_none() {
            self.cond.wait(&mut done);
        }
        // The creator's outcome, shared by every parked opener.
        (*done).unwrap_or(Err(code::ENOENT))
    }
}

enum RegEntry {
    Building { magic: u32, gate: Arc<InitGate> },
    Active { magic: u32, mq: Arc<MessageQueue> },
}

struct Registry {
    entries: BTreeMap<String, RegEntry>,
}

static REGISTRY: Once<SpinLock<Registry>> = Once::new();

fn registry() -> &'static SpinLock<Registry> {
    REGISTRY.call_once(|| {
        SpinLock::new(Registry {
            entries: BTreeMap::new(),
        })
    })
}

pub(crate) enum Lookup {
    /// The node exists; its reference count was bumped for the caller.
    Exists(Arc<MessageQueue>),
    /// Someone else is creating it; park on the gate and retry.
    Building(Arc<InitGate>),
    /// A placeholder was installed; the caller must build the object
    /// and call [`node_add_finished`].
    Missing(Arc<InitGate>),
}

pub(crate) fn node_get(name: &str, magic: u32, oflags: c_int) -> Result<Lookup, Error> {
    let mut reg = registry().lock();
    match reg.entries.get(name) {
        Some(RegEntry::Active { magic: tag, mq }) => {
            if *tag != magic {
                return Err(code::EINVAL);
            }
            if oflags & libc::O_CREAT != 0 && oflags & libc::O_EXCL != 0 {
                return Err(code::EEXIST);
            }
            mq.node().lock().refs += 1;
            Ok(Lookup::Exists(mq.clone()))
        }
        Some(RegEntry::Building { gate, .. }) => Ok(Lookup::Building(gate.clone())),
        None => {
            if oflags & libc::O_CREAT == 0 {
                return Err(code::ENOENT);
            }
            let gate = InitGate::new();
            reg.entries.insert(
                name.to_owned(),
                RegEntry::Building {
                    magic,
                    gate: gate.clone(),
                },
            );
            Ok(Lookup::Missing(gate))
        }
    }
}

/// Publish or withdraw a name whose placeholder was installed by
/// [`node_get`], then release the parked openers.
pub(crate) fn node_add_finished(
    name: &str,
    result: Result<Arc<MessageQueue>, Error>,
    gate: &InitGate,
) {
    let mut reg = registry().lock();
    match result {
        Ok(mq) => {
            let magic = mq.magic();
            reg.entries
                .insert(name.to_owned(), RegEntry::Active { magic, mq });
            drop(reg);
            gate.finish(Ok(()));
        }
        Err(e) => {
            reg.entries.remove(name);
            drop(reg);
            gate.finish(Err(e));
        }
    }
}

/// Unlink a name. Returns the node and whether the caller must destroy
/// it (the unlink dropped the final reference).
pub(crate) fn node_remove(name: &str, magic: u32) -> Result<(Arc<MessageQueue>, bool), Error> {
    loop {
        let gate = {
            let mut reg = registry().lock();
            match reg.entries.get(name) {
                None => return Err(code::ENOENT),
                Some(RegEntry::Building { gate, .. }) => gate.clone(),
                Some(RegEntry::Active { magic: tag, mq }) => {
                    if *tag != magic {
                        return Err(code::EINVAL);
                    }
                    let mq = mq.clone();
                    reg.entries.remove(name);
                    let destroy = {
                        let mut node = mq.node().lock();
                        node.unlinked = true;
                        node.refs -= 1;
                        node.refs == 0
                    };
                    return Ok((mq, destroy));
                }
            }
        };
        // The name is mid-creation; wait it out and retry.
        gate.wait()?;
    }
}

/// Drop one reference. Returns whether the caller must destroy the
/// node (it was the last reference and the name is gone).
pub(crate) fn node_put(mq: &Arc<MessageQueue>) -> bool {
    let mut node = mq.node().lock();
    debug_assert!(node.refs > 0);
    node.refs -= 1;
    node.refs == 0 && node.unlinked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mqueue::{MqAttr, MQ_MAGIC};

    fn attr() -> MqAttr {
        MqAttr {
            flags: 0,
            max_msgs: 2,
            msg_size: 8,
            cur_msgs: 0,
        }
    }

    fn create(name: &str) -> Arc<MessageQueue> {
        match node_get(name, MQ_MAGIC, libc::O_CREAT).unwrap() {
            Lookup::Missing(gate) => {
                let mq = Arc::new(MessageQueue::new(name, Some(&attr())).unwrap());
                node_add_finished(name, Ok(mq.clone()), &gate);
                mq
            }
            _ => panic!("expected a fresh name"),
        }
    }

    #[test]
    fn test_open_without_create_fails_when_absent() {
        assert!(matches!(
            node_get("reg-absent", MQ_MAGIC, 0),
            Err(e) if e == code::ENOENT
        ));
    }

    #[test]
    fn test_exclusive_create_detects_existing() {
        let mq = create("reg-excl");
        assert!(matches!(
            node_get("reg-excl", MQ_MAGIC, libc::O_CREAT | libc::O_EXCL),
            Err(e) if e == code::EEXIST
        ));
        let (_, destroy) = node_remove("reg-excl", MQ_MAGIC).unwrap();
        assert!(destroy);
        drop(mq);
    }

    #[test]
    fn test_refcount_governs_destruction() {
        let mq = create("reg-refs");
        // One extra opener.
        let Lookup::Exists(opened) = node_get("reg-refs", MQ_MAGIC, 0).unwrap() else {
            panic!("expected the node to exist");
        };
        let (_, destroy) = node_remove("reg-refs", MQ_MAGIC).unwrap();
        assert!(!destroy, "a descriptor reference is still live");
        assert!(node_put(&opened), "last reference after unlink destroys");
        drop(mq);
    }

    #[test]
    fn test_failed_creation_releases_waiters_with_error() {
        let Lookup::Missing(gate) = node_get("reg-fail", MQ_MAGIC, libc::O_CREAT).unwrap() else {
            panic!("expected a fresh name");
        };
        let waiter = crate::thread::spawn(|| {
            match node_get("reg-fail", MQ_MAGIC, libc::O_CREAT).unwrap() {
                Lookup::Building(gate) => gate.wait(),
                _ => panic!("expected the name to be mid-creation"),
            }
        });
        std::thread::sleep(core::time::Duration::from_millis(20));
        node_add_finished("reg-fail", Err(code::ENOSPC), &gate);
        assert_eq!(waiter.join().unwrap(), Err(code::ENOSPC));
        // The name was withdrawn.
        assert!(matches!(
            node_get("reg-fail", MQ_MAGIC, 0),
            Err(e) if e == code::ENOENT
        ));
    }
}
