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

//! POSIX-compatible real-time message queues.
//!
//! Named, priority-ordered, bounded queues for inter-thread messaging:
//! blocking and non-blocking send/receive, absolute-deadline timed
//! waits, one-shot empty-queue notification and a direct handoff fast
//! path from a sender to an already-waiting receiver.
//!
//! The core lives in [`mqueue`] with `Result`-based operations; the
//! [`posix`] module wraps them in the classic `mq_*` shapes with a
//! thread-local errno.

pub mod config;
pub mod errno;
pub mod error;
pub mod mqueue;
pub mod posix;
pub mod signal;
pub mod sync;
pub mod thread;
pub mod time;

pub use error::Error;
pub use mqueue::MqAttr;
