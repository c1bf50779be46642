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

//! Priority-ordered list of enqueued messages.
//!
//! Highest priority at the head, FIFO within a priority band.

use std::collections::VecDeque;

#[derive(Debug, Clone, Copy)]
pub(crate) struct QueuedMsg {
    pub slot: usize,
    pub len: usize,
    pub prio: u32,
}

#[derive(Debug)]
pub(crate) struct PrioList {
    entries: VecDeque<QueuedMsg>,
}

impl PrioList {
    pub(crate) const fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    pub(crate) fn enqueue(&mut self, msg: QueuedMsg) {
        let pos = self
            .entries
            .iter()
            .position(|queued| queued.prio < msg.prio);
        match pos {
            Some(at) => self.entries.insert(at, msg),
            None => self.entries.push_back(msg),
        }
    }

    pub(crate) fn dequeue_head(&mut self) -> Option<QueuedMsg> {
        self.entries.pop_front()
    }

    pub(crate) fn count(&self) -> usize {
        self.entries.len()
    }
}
