// SPDX-License-Identifier: CEPL-1.0
//! One place that decides what a `vk::Result` means for the frame loop.
use std::time::Duration;

use ash::prelude::VkResult;
use ash::vk;
use vke_render::{Acquired, FrameError, Presented};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Recoverable {
    OutOfDate,
    Suboptimal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Recoverable(Recoverable),
    Fatal(vk::Result),
}

pub fn classify(code: vk::Result) -> Outcome {
    match code {
        vk::Result::SUCCESS => Outcome::Success,
        vk::Result::SUBOPTIMAL_KHR => Outcome::Recoverable(Recoverable::Suboptimal),
        vk::Result::ERROR_OUT_OF_DATE_KHR => Outcome::Recoverable(Recoverable::OutOfDate),
        other => Outcome::Fatal(other),
    }
}

/// Host-side bound on acquire and fence waits. `None` waits forever.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WaitTimeout(pub Option<Duration>);

impl WaitTimeout {
    pub fn as_nanos(self) -> u64 {
        self.0
            .map_or(u64::MAX, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
    }

    pub fn as_millis(self) -> u64 {
        self.0
            .map_or(u64::MAX, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

/// Maps a failed call to the fatal error it stands for.
pub fn fatal(call: &'static str, code: vk::Result, timeout: WaitTimeout) -> FrameError {
    match code {
        vk::Result::TIMEOUT | vk::Result::NOT_READY => FrameError::Timeout {
            call,
            timeout_ms: timeout.as_millis(),
        },
        other => FrameError::api(call, other),
    }
}

/// For calls where no result other than success is expected.
pub fn check<T>(call: &'static str, r: VkResult<T>) -> Result<T, FrameError> {
    r.map_err(|code| FrameError::api(call, code))
}

pub fn acquire_outcome(
    r: VkResult<(u32, bool)>,
    timeout: WaitTimeout,
) -> Result<Acquired, FrameError> {
    let code = match r {
        Ok((image, false)) => return Ok(Acquired::Ready(image)),
        Ok((image, true)) => return Ok(Acquired::Suboptimal(image)),
        Err(code) => code,
    };
    match classify(code) {
        // No image index comes back with an error code, so a suboptimal
        // error is as good as stale.
        Outcome::Recoverable(_) => Ok(Acquired::OutOfDate),
        Outcome::Success => Err(FrameError::api("acquire_next_image", code)),
        Outcome::Fatal(code) => Err(fatal("acquire_next_image", code, timeout)),
    }
}

pub fn present_outcome(r: VkResult<bool>) -> Result<Presented, FrameError> {
    let code = match r {
        Ok(false) => return Ok(Presented::Done),
        Ok(true) => return Ok(Presented::Suboptimal),
        Err(code) => code,
    };
    match classify(code) {
        Outcome::Recoverable(Recoverable::Suboptimal) => Ok(Presented::Suboptimal),
        Outcome::Recoverable(Recoverable::OutOfDate) => Ok(Presented::OutOfDate),
        Outcome::Success | Outcome::Fatal(_) => Err(FrameError::api("queue_present", code)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOREVER: WaitTimeout = WaitTimeout(None);

    #[test]
    fn classify_three_ways() {
        assert_eq!(classify(vk::Result::SUCCESS), Outcome::Success);
        assert_eq!(
            classify(vk::Result::SUBOPTIMAL_KHR),
            Outcome::Recoverable(Recoverable::Suboptimal)
        );
        assert_eq!(
            classify(vk::Result::ERROR_OUT_OF_DATE_KHR),
            Outcome::Recoverable(Recoverable::OutOfDate)
        );
        assert_eq!(
            classify(vk::Result::ERROR_DEVICE_LOST),
            Outcome::Fatal(vk::Result::ERROR_DEVICE_LOST)
        );
    }

    #[test]
    fn acquire_results() {
        assert_eq!(acquire_outcome(Ok((2, false)), FOREVER).unwrap(), Acquired::Ready(2));
        assert_eq!(
            acquire_outcome(Ok((1, true)), FOREVER).unwrap(),
            Acquired::Suboptimal(1)
        );
        assert_eq!(
            acquire_outcome(Err(vk::Result::ERROR_OUT_OF_DATE_KHR), FOREVER).unwrap(),
            Acquired::OutOfDate
        );
        assert!(matches!(
            acquire_outcome(Err(vk::Result::ERROR_SURFACE_LOST_KHR), FOREVER),
            Err(FrameError::Api { call: "acquire_next_image", .. })
        ));
    }

    #[test]
    fn acquire_timeout_is_distinguishable() {
        let t = WaitTimeout(Some(Duration::from_millis(250)));
        assert!(matches!(
            acquire_outcome(Err(vk::Result::TIMEOUT), t),
            Err(FrameError::Timeout { timeout_ms: 250, .. })
        ));
    }

    #[test]
    fn present_results() {
        assert_eq!(present_outcome(Ok(false)).unwrap(), Presented::Done);
        assert_eq!(present_outcome(Ok(true)).unwrap(), Presented::Suboptimal);
        assert_eq!(
            present_outcome(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(),
            Presented::OutOfDate
        );
        assert!(present_outcome(Err(vk::Result::ERROR_DEVICE_LOST)).is_err());
    }

    #[test]
    fn unbounded_wait_is_u64_max() {
        assert_eq!(FOREVER.as_nanos(), u64::MAX);
        assert_eq!(WaitTimeout(Some(Duration::from_millis(3))).as_nanos(), 3_000_000);
    }
}
