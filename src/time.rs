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

//! Realtime clock access and absolute-deadline handling.
//!
//! Timed operations take absolute deadlines against the realtime
//! clock. Each blocking iteration converts the deadline to a monotonic
//! instant right before suspending, so clock reads stay close to the
//! sleep they arm.

use crate::error::{code, Error};
use core::time::Duration;
use libc::timespec;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

const NSEC_PER_SEC: i64 = 1_000_000_000;

/// Current realtime clock value.
pub fn realtime_now() -> timespec {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO);
    timespec {
        tv_sec: now.as_secs() as libc::time_t,
        tv_nsec: now.subsec_nanos() as libc::c_long,
    }
}

/// Absolute realtime deadline `delay` from now. Convenience for timed
/// send/receive callers.
pub fn realtime_after(delay: Duration) -> timespec {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        + delay;
    timespec {
        tv_sec: now.as_secs() as libc::time_t,
        tv_nsec: now.subsec_nanos() as libc::c_long,
    }
}

/// Validate a caller-supplied timespec.
pub(crate) fn check_timespec(ts: &timespec) -> Result<(), Error> {
    if ts.tv_nsec < 0 || ts.tv_nsec as i64 >= NSEC_PER_SEC {
        return Err(code::EINVAL);
    }
    Ok(())
}

/// Convert an absolute realtime deadline into a monotonic instant.
///
/// An already-elapsed deadline yields `ETIMEDOUT`, so a blocking
/// caller fails before it ever suspends.
pub(crate) fn deadline_instant(abs: &timespec) -> Result<Instant, Error> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO);
    let now_ns = now.as_nanos() as i128;
    let abs_ns = abs.tv_sec as i128 * NSEC_PER_SEC as i128 + abs.tv_nsec as i128;
    let delta = abs_ns - now_ns;
    if delta <= 0 {
        return Err(code::ETIMEDOUT);
    }
    Ok(Instant::now() + Duration::from_nanos(delta as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timespec_validation() {
        let ok = timespec {
            tv_sec: 1,
            tv_nsec: 999_999_999,
        };
        assert!(check_timespec(&ok).is_ok());

        let neg = timespec {
            tv_sec: 1,
            tv_nsec: -1,
        };
        assert_eq!(check_timespec(&neg), Err(code::EINVAL));

        let big = timespec {
            tv_sec: 1,
            tv_nsec: 1_000_000_000,
        };
        assert_eq!(check_timespec(&big), Err(code::EINVAL));
    }

    #[test]
    fn test_elapsed_deadline_times_out() {
        let past = timespec {
            tv_sec: 1,
            tv_nsec: 0,
        };
        assert_eq!(deadline_instant(&past), Err(code::ETIMEDOUT));
    }

    #[test]
    fn test_future_deadline_converts() {
        let abs = realtime_after(Duration::from_millis(200));
        let instant = deadline_instant(&abs).unwrap();
        assert!(instant > Instant::now());
    }
}
