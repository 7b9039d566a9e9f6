use chrono::Duration;

/// How far back a cadence looks for signals, in days
pub fn window_days(cadence: &str) -> i64 {
    let cadence = cadence.to_lowercase();
    if cadence.contains("daily") {
        1
    } else if cadence.contains("bi-weekly")
        || cadence.contains("biweekly")
        || cadence.contains("fortnight")
    {
        14
    } else if cadence.contains("monthly") {
        30
    } else {
        7
    }
}

pub fn recency_window(cadence: &str) -> Duration {
    Duration::days(window_days(cadence))
}

/// Human-readable label for the metadata block, e.g. "Past 7 days"
pub fn timeframe_label(cadence: &str) -> String {
    match window_days(cadence) {
        1 => "Past 24 hours".to_string(),
        days => format!("Past {} days", days),
    }
}
