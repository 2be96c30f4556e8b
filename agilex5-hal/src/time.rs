//! Time units and polling helpers.
use embedded_hal::delay::DelayNs;

pub use fugit::HertzU32 as Hertz;
pub type MillisDuration = fugit::MillisDurationU32;

/// Polling interval used by [poll_until] and [try_poll_until].
pub const POLL_INTERVAL_US: u32 = 100;

/// Poll the given condition until it returns true or the timeout expires.
///
/// The condition is always checked at least once. Returns whether the condition was met.
pub fn poll_until<D: DelayNs>(
    delay: &mut D,
    timeout: MillisDuration,
    mut done: impl FnMut() -> bool,
) -> bool {
    matches!(
        try_poll_until(delay, timeout, || Ok::<_, core::convert::Infallible>(done())),
        Ok(true)
    )
}

/// Fallible version of [poll_until]. An error returned by the condition aborts the polling.
pub fn try_poll_until<D: DelayNs, E>(
    delay: &mut D,
    timeout: MillisDuration,
    mut done: impl FnMut() -> Result<bool, E>,
) -> Result<bool, E> {
    let timeout_us = timeout.to_micros();
    let mut waited_us: u32 = 0;
    loop {
        if done()? {
            return Ok(true);
        }
        if waited_us >= timeout_us {
            return Ok(false);
        }
        delay.delay_us(POLL_INTERVAL_US);
        waited_us = waited_us.saturating_add(POLL_INTERVAL_US);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::NoDelay;

    #[test]
    fn condition_met_after_some_polls() {
        let mut calls = 0;
        let done = poll_until(&mut NoDelay, MillisDuration::millis(1), || {
            calls += 1;
            calls == 3
        });
        assert!(done);
        assert_eq!(calls, 3);
    }

    #[test]
    fn timeout_expires() {
        let mut calls = 0;
        let done = poll_until(&mut NoDelay, MillisDuration::millis(1), || {
            calls += 1;
            false
        });
        assert!(!done);
        // One initial check plus one check per elapsed interval.
        assert_eq!(calls, 1 + 1000 / POLL_INTERVAL_US as usize);
    }

    #[test]
    fn error_aborts_polling() {
        let mut calls = 0;
        let result: Result<bool, u32> =
            try_poll_until(&mut NoDelay, MillisDuration::millis(10), || {
                calls += 1;
                if calls == 2 { Err(5) } else { Ok(false) }
            });
        assert_eq!(result, Err(5));
        assert_eq!(calls, 2);
    }
}
