//! Billing - Credits derived from call duration

const SECONDS_PER_CREDIT: i32 = 60;

/// One credit per started minute. Negative durations bill nothing.
pub fn credits_for_duration(duration_secs: i32) -> i32 {
    let secs = duration_secs.max(0);
    let whole = secs / SECONDS_PER_CREDIT;
    if secs % SECONDS_PER_CREDIT > 0 {
        whole + 1
    } else {
        whole
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounds_up_per_minute() {
        assert_eq!(credits_for_duration(0), 0);
        assert_eq!(credits_for_duration(1), 1);
        assert_eq!(credits_for_duration(47), 1);
        assert_eq!(credits_for_duration(60), 1);
        assert_eq!(credits_for_duration(61), 2);
        assert_eq!(credits_for_duration(3600), 60);
    }

    #[test]
    fn test_negative_duration_is_free() {
        assert_eq!(credits_for_duration(-30), 0);
    }
}
