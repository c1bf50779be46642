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

//! Subsystem teardown gets its own process: `package_cleanup` tears
//! down every live queue, so it cannot share a registry with the
//! other suites.

use core::time::Duration;
use rtmq::{
    error::code,
    mqueue::{self, MqAttr},
    thread,
};

#[test]
fn test_package_cleanup_destroys_live_queues() {
    let attr = MqAttr {
        flags: 0,
        max_msgs: 2,
        msg_size: 8,
        cur_msgs: 0,
    };
    let fd1 = mqueue::open("td-open", libc::O_RDWR | libc::O_CREAT, Some(&attr)).unwrap();
    let fd2 = mqueue::open("td-idle", libc::O_RDWR | libc::O_CREAT, Some(&attr)).unwrap();

    // A waiter blocked across teardown must come back with EBADF.
    let blocked = thread::spawn(move || {
        let mut buf = [0u8; 8];
        mqueue::receive(fd1, &mut buf, None)
    });
    std::thread::sleep(Duration::from_millis(100));

    mqueue::package_cleanup();

    assert_eq!(blocked.join().unwrap(), Err(code::EBADF));
    assert_eq!(mqueue::open("td-open", libc::O_RDWR, None), Err(code::ENOENT));
    assert_eq!(mqueue::open("td-idle", libc::O_RDWR, None), Err(code::ENOENT));
    assert_eq!(mqueue::close(fd1), Err(code::EBADF));
    assert_eq!(mqueue::close(fd2), Err(code::EBADF));
}
