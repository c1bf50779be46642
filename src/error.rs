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

use core::num::TryFromIntError;

pub mod code {
    use libc;
    pub const ETIMEDOUT: super::Error = super::Error(-libc::ETIMEDOUT);
    pub const ENOSPC: super::Error = super::Error(-libc::ENOSPC);
    pub const ENOMEM: super::Error = super::Error(-libc::ENOMEM);
    pub const EBUSY: super::Error = super::Error(-libc::EBUSY);
    pub const EINTR: super::Error = super::Error(-libc::EINTR);
    pub const EINVAL: super::Error = super::Error(-libc::EINVAL);
    pub const ENOENT: super::Error = super::Error(-libc::ENOENT);
    pub const EPERM: super::Error = super::Error(-libc::EPERM);
    pub const EAGAIN: super::Error = super::Error(-libc::EAGAIN);
    pub const EBADF: super::Error = super::Error(-libc::EBADF);
    pub const EEXIST: super::Error = super::Error(-libc::EEXIST);
    pub const EMSGSIZE: super::Error = super::Error(-libc::EMSGSIZE);
    pub const ENAMETOOLONG: super::Error = super::Error(-libc::ENAMETOOLONG);
}

const UNKNOWN_STR: &str = "Unknown error";
const ETIMEDOUT_STR: &str = "Operation timed out";
const ENOSPC_STR: &str = "No space left on device";
const ENOMEM_STR: &str = "Cannot allocate memory";
const EBUSY_STR: &str = "Device or resource busy";
const EINTR_STR: &str = "Interrupted system call";
const EINVAL_STR: &str = "Invalid argument";
const ENOENT_STR: &str = "No such file or directory";
const EPERM_STR: &str = "Operation not permitted";
const EAGAIN_STR: &str = "Try again";
const EBADF_STR: &str = "File descriptor in bad state";
const EEXIST_STR: &str = "File exists";
const EMSGSIZE_STR: &str = "Message too long";
const ENAMETOOLONG_STR: &str = "File name too long";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Error(i32);

impl Error {
    pub fn from_errno(errno: i32) -> Error {
        Error(errno)
    }

    pub fn to_errno(self) -> i32 {
        self.0
    }

    pub fn name(&self) -> &'static str {
        match *self {
            code::ETIMEDOUT => ETIMEDOUT_STR,
            code::ENOSPC => ENOSPC_STR,
            code::ENOMEM => ENOMEM_STR,
            code::EBUSY => EBUSY_STR,
            code::EINTR => EINTR_STR,
            code::EINVAL => EINVAL_STR,
            code::ENOENT => ENOENT_STR,
            code::EPERM => EPERM_STR,
            code::EAGAIN => EAGAIN_STR,
            code::EBADF => EBADF_STR,
            code::EEXIST => EEXIST_STR,
            code::EMSGSIZE => EMSGSIZE_STR,
            code::ENAMETOOLONG => ENAMETOOLONG_STR,
            _ => UNKNOWN_STR,
        }
    }
}

impl From<TryFromIntError> for Error {
    fn from(_: TryFromIntError) -> Error {
        code::EINVAL
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Error({}): {}", self.0, self.name())
    }
}
