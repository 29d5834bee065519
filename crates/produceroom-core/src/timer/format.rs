//! Human-readable durations for operator output.

/// `m:ss`, e.g. `3:07`.
pub fn clock(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// `45 sec`, `3 min`, `3 min 7 sec`.
pub fn with_units(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    if total < 60 {
        return format!("{total} sec");
    }
    let (mins, secs) = (total / 60, total % 60);
    if secs > 0 {
        format!("{mins} min {secs} sec")
    } else {
        format!("{mins} min")
    }
}
