use std::time::SystemTime;

/// Wall-clock source for round timing. Injectable so state-machine tests
/// can advance time deterministically.
pub trait Clock {
    fn now(&self) -> SystemTime;
}

/// Production clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Elapsed whole milliseconds between two instants, saturating to zero if
/// the clock stepped backwards between readings.
pub fn time_diff_ms(start: SystemTime, end: SystemTime) -> u64 {
    end.duration_since(start).unwrap_or_default().as_millis() as u64
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_time_diff_ms() {
        let start = SystemTime::now();
        let end = start + Duration::from_millis(180);

        assert_eq!(time_diff_ms(start, end), 180);
    }

    #[test]
    fn test_time_diff_ms_saturates_on_backwards_clock() {
        let start = SystemTime::now();
        let end = start - Duration::from_millis(50);

        assert_eq!(time_diff_ms(start, end), 0);
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = testing::ManualClock::new();
        let t0 = clock.now();

        clock.advance_ms(2500);

        assert_eq!(time_diff_ms(t0, clock.now()), 2500);
    }
}
