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

//! Compile-time tunables of the message queue subsystem.

/// Maximum length of a queue name, not counting the leading slash.
pub const NAME_MAX: usize = 64;

/// Message slots are tiled on this boundary inside the pool arena.
pub const ALIGN_SIZE: usize = core::mem::size_of::<usize>();

/// Default `max_messages` when a queue is created without attributes.
pub const MQ_MAXMSG_DEFAULT: usize = 10;

/// Default `message_size` when a queue is created without attributes.
pub const MQ_MSGSIZE_DEFAULT: usize = 8192;

/// Upper bound on simultaneously open queue descriptors.
pub const DESC_MAX: usize = 1024;

/// Priority assigned to threads the subsystem did not spawn itself.
pub const THREAD_PRIORITY_DEFAULT: crate::thread::ThreadPriority = 16;

/// Number of distinct thread priority levels.
pub const THREAD_PRIORITY_MAX: crate::thread::ThreadPriority = 32;
