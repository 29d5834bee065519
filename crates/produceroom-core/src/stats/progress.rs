use serde::{Deserialize, Serialize};

/// Day progress over the loaded worklist.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub total_cases: u64,
    pub completed_cases: u64,
    pub remaining_cases: u64,
    pub remaining_items: usize,
    /// Whole percent of `total_cases` completed, 0 when nothing is loaded.
    pub completed_pct: u8,
}

impl Progress {
    /// `total_cases` is the count recorded when the worklist was loaded;
    /// manual additions can push completed cases past it.
    pub fn compute(total_cases: u64, completed_cases: u64, remaining_items: usize) -> Self {
        let remaining_cases = total_cases.saturating_sub(completed_cases);
        let completed_pct = if total_cases == 0 {
            0
        } else {
            let pct = (completed_cases as f64 / total_cases as f64 * 100.0).round();
            pct.clamp(0.0, 100.0) as u8
        };
        Self {
            total_cases,
            completed_cases,
            remaining_cases,
            remaining_items,
            completed_pct,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_rounds() {
        let p = Progress::compute(3, 1, 2);
        assert_eq!(p.completed_pct, 33);
        assert_eq!(p.remaining_cases, 2);
    }

    #[test]
    fn empty_day_is_zero_percent() {
        assert_eq!(Progress::compute(0, 0, 0).completed_pct, 0);
    }

    #[test]
    fn overshoot_is_capped() {
        let p = Progress::compute(4, 6, 0);
        assert_eq!(p.remaining_cases, 0);
        assert_eq!(p.completed_pct, 100);
    }
}
