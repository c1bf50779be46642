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

//! POSIX-shaped boundary over the core queue operations.
//!
//! Failures surface through the thread-local error indicator and a
//! `-1` return; successes return `0` or a length. Names may carry one
//! leading slash, which is stripped before reaching the registry.

use crate::{
    errno::set_errno,
    error::Error,
    mqueue::{self, MqAttr},
    signal::SigEvent,
};
use core::ffi::{c_int, c_long, c_uint};
use libc::{mode_t, timespec};

#[allow(non_camel_case_types)]
pub type mqd_t = c_int;

#[allow(non_camel_case_types)]
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct mq_attr {
    pub mq_flags: c_long,
    pub mq_maxmsg: c_long,
    pub mq_msgsize: c_long,
    pub mq_curmsgs: c_long,
}

fn fail<T: From<i8>>(e: Error) -> T {
    set_errno(-e.to_errno());
    T::from(-1)
}

fn canonical(name: &str) -> &str {
    name.strip_prefix('/').unwrap_or(name)
}

fn core_attr(attr: &mq_attr) -> Result<MqAttr, Error> {
    Ok(MqAttr {
        flags: attr.mq_flags as c_int,
        max_msgs: usize::try_from(attr.mq_maxmsg)?,
        msg_size: usize::try_from(attr.mq_msgsize)?,
        cur_msgs: 0,
    })
}

fn posix_attr(attr: &MqAttr) -> mq_attr {
    mq_attr {
        mq_flags: attr.flags as c_long,
        mq_maxmsg: attr.max_msgs as c_long,
        mq_msgsize: attr.msg_size as c_long,
        mq_curmsgs: attr.cur_msgs as c_long,
    }
}

pub fn mq_open(name: &str, oflag: c_int, _mode: mode_t, attr: Option<&mq_attr>) -> mqd_t {
    let attr = match attr.map(core_attr).transpose() {
        Ok(a) => a,
        Err(e) => return fail(e),
    };
    match mqueue::open(canonical(name), oflag, attr.as_ref()) {
        Ok(fd) => fd,
        Err(e) => fail(e),
    }
}

pub fn mq_close(mqdes: mqd_t) -> c_int {
    match mqueue::close(mqdes) {
        Ok(()) => 0,
        Err(e) => fail(e),
    }
}

pub fn mq_unlink(name: &str) -> c_int {
    match mqueue::unlink(canonical(name)) {
        Ok(()) => 0,
        Err(e) => fail(e),
    }
}

pub fn mq_send(mqdes: mqd_t, msg: &[u8], prio: c_uint) -> c_int {
    match mqueue::send(mqdes, msg, prio) {
        Ok(()) => 0,
        Err(e) => fail(e),
    }
}

pub fn mq_timedsend(mqdes: mqd_t, msg: &[u8], prio: c_uint, abs_timeout: &timespec) -> c_int {
    match mqueue::timed_send(mqdes, msg, prio, abs_timeout) {
        Ok(()) => 0,
        Err(e) => fail(e),
    }
}

pub fn mq_receive(mqdes: mqd_t, msg: &mut [u8], prio: Option<&mut c_uint>) -> isize {
    match mqueue::receive(mqdes, msg, prio) {
        Ok(len) => len as isize,
        Err(e) => fail(e),
    }
}

pub fn mq_timedreceive(
    mqdes: mqd_t,
    msg: &mut [u8],
    prio: Option<&mut c_uint>,
    abs_timeout: &timespec,
) -> isize {
    match mqueue::timed_receive(mqdes, msg, prio, abs_timeout) {
        Ok(len) => len as isize,
        Err(e) => fail(e),
    }
}

pub fn mq_getattr(mqdes: mqd_t, attr: &mut mq_attr) -> c_int {
    match mqueue::getattr(mqdes) {
        Ok(got) => {
            *attr = posix_attr(&got);
            0
        }
        Err(e) => fail(e),
    }
}

pub fn mq_setattr(mqdes: mqd_t, new: &mq_attr, old: Option<&mut mq_attr>) -> c_int {
    let wanted = MqAttr {
        flags: new.mq_flags as c_int,
        max_msgs: 0,
        msg_size: 0,
        cur_msgs: 0,
    };
    match mqueue::setattr(mqdes, &wanted) {
        Ok(previous) => {
            if let Some(old) = old {
                *old = posix_attr(&previous);
            }
            0
        }
        Err(e) => fail(e),
    }
}

pub fn mq_notify(mqdes: mqd_t, event: Option<&SigEvent>) -> c_int {
    match mqueue::notify(mqdes, event) {
        Ok(()) => 0,
        Err(e) => fail(e),
    }
}
