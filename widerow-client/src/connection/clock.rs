//! Write-stamp generation.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use widerow_core::Clock;

static LAST_SYNC_MICROS: AtomicI64 = AtomicI64::new(0);

/// Resolution of the write stamps a connection produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClockResolution {
    /// Seconds since the epoch.
    Seconds,
    /// Milliseconds since the epoch.
    Milliseconds,
    /// Microseconds since the epoch.
    #[default]
    Microseconds,
    /// Microseconds since the epoch, strictly increasing across the process.
    MicrosecondsSync,
}

impl ClockResolution {
    /// Creates a write stamp for the current instant.
    pub fn create_clock(&self) -> Clock {
        let micros = now_micros();
        let timestamp = match self {
            ClockResolution::Seconds => micros / 1_000_000,
            ClockResolution::Milliseconds => micros / 1_000,
            ClockResolution::Microseconds => micros,
            ClockResolution::MicrosecondsSync => next_sync_micros(micros),
        };
        Clock::new(timestamp)
    }
}

fn now_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0)
}

fn next_sync_micros(now: i64) -> i64 {
    let mut last = LAST_SYNC_MICROS.load(Ordering::Acquire);
    loop {
        let next = if now > last { now } else { last + 1 };
        match LAST_SYNC_MICROS.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

impl fmt::Display for ClockResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClockResolution::Seconds => "seconds",
            ClockResolution::Milliseconds => "milliseconds",
            ClockResolution::Microseconds => "microseconds",
            ClockResolution::MicrosecondsSync => "microseconds-sync",
        };
        f.write_str(name)
    }
}

impl FromStr for ClockResolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "seconds" | "s" => Ok(ClockResolution::Seconds),
            "milliseconds" | "ms" => Ok(ClockResolution::Milliseconds),
            "microseconds" | "us" => Ok(ClockResolution::Microseconds),
            "microseconds-sync" | "microseconds_sync" => Ok(ClockResolution::MicrosecondsSync),
            _ => Err(format!("unknown clock resolution: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolutions_scale() {
        let secs = ClockResolution::Seconds.create_clock().timestamp;
        let millis = ClockResolution::Milliseconds.create_clock().timestamp;
        let micros = ClockResolution::Microseconds.create_clock().timestamp;

        assert!(secs > 1_600_000_000);
        assert!(millis / 1_000 >= secs);
        assert!(micros / 1_000 >= millis);
    }

    #[test]
    fn test_microseconds_sync_strictly_increases() {
        let mut previous = ClockResolution::MicrosecondsSync.create_clock().timestamp;
        for _ in 0..1_000 {
            let next = ClockResolution::MicrosecondsSync.create_clock().timestamp;
            assert!(next > previous);
            previous = next;
        }
    }

    #[test]
    fn test_microseconds_sync_unique_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                std::thread::spawn(|| {
                    (0..250)
                        .map(|_| ClockResolution::MicrosecondsSync.create_clock().timestamp)
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all: Vec<i64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let total = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), total);
    }

    #[test]
    fn test_parse_and_display() {
        for resolution in [
            ClockResolution::Seconds,
            ClockResolution::Milliseconds,
            ClockResolution::Microseconds,
            ClockResolution::MicrosecondsSync,
        ] {
            assert_eq!(resolution.to_string().parse::<ClockResolution>(), Ok(resolution));
        }
        assert!("hours".parse::<ClockResolution>().is_err());
    }

    #[test]
    fn test_default_is_microseconds() {
        assert_eq!(ClockResolution::default(), ClockResolution::Microseconds);
    }
}
