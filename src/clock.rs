//! Source of "now" for lease arithmetic.

use std::time::SystemTime;

use cfg_if::cfg_if;

/// A source of the current time, as seconds since the Unix epoch.
///
/// Any `Fn() -> u64` closure is a `Clock`, which is handy for pinning the time in tests.
pub trait Clock {
    fn now(&self) -> u64;
}

/// The wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        now_unix()
    }
}

impl<F: Fn() -> u64> Clock for F {
    fn now(&self) -> u64 {
        self()
    }
}

cfg_if! {
    if #[cfg(test)] {
        // Follows `tokio::time::pause` and `tokio::time::advance` when called inside a runtime.
        fn system_time_now() -> SystemTime {
            use std::time::Instant;

            if tokio::runtime::Handle::try_current().is_err() {
                return SystemTime::now();
            }
            let instant = Instant::now();
            let sys = SystemTime::now();
            let mocked = tokio::time::Instant::now().into_std();
            if mocked > instant {
                sys + (mocked - instant)
            } else {
                sys - (instant - mocked)
            }
        }
    } else {
        fn system_time_now() -> SystemTime {
            SystemTime::now()
        }
    }
}

fn now_unix() -> u64 {
    system_time_now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn closure_clock() {
        let clock = || 1_234_567_890_u64;
        assert_eq!(clock.now(), 1_234_567_890);
    }

    #[tokio::test]
    async fn system_clock_follows_paused_time() {
        tokio::time::pause();
        let start = SystemClock.now();
        tokio::time::advance(Duration::from_secs(3600)).await;
        let end = SystemClock.now();

        // Allow one second of rounding across the boundary.
        assert!((3600..=3601).contains(&(end - start)), "{}", end - start);
    }
}
