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

//! Thread-local error indicator for the boundary layer.
//!
//! Only the functions in [`crate::posix`] set this; the core never
//! touches it.

use core::{cell::Cell, ffi::c_int};

thread_local! {
    static ERRNO: Cell<c_int> = const { Cell::new(0) };
}

pub fn errno() -> c_int {
    ERRNO.with(|e| e.get())
}

pub fn set_errno(value: c_int) {
    ERRNO.with(|e| e.set(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_is_per_thread() {
        set_errno(libc::EINVAL);
        let other = std::thread::spawn(|| {
            assert_eq!(errno(), 0);
            set_errno(libc::EAGAIN);
        });
        other.join().unwrap();
        assert_eq!(errno(), libc::EINVAL);
    }
}
