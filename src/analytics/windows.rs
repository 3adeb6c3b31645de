use chrono::{Days, NaiveDate};
use serde::Serialize;

/// Two equal-length adjacent date windows ending the day before `today`.
///
/// The day before is used because the warehouse is loaded with a lag. Bounds
/// are inclusive on both sides, so `curr_start == prev_end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnalysisWindows {
    pub window_days: u32,
    pub curr_start: NaiveDate,
    pub curr_end: NaiveDate,
    pub prev_start: NaiveDate,
    pub prev_end: NaiveDate,
}

impl AnalysisWindows {
    pub fn ending_before(today: NaiveDate, window_days: u32) -> Self {
        let analysis_end = today - Days::new(1);
        Self::ending_at(analysis_end, window_days)
    }

    pub fn ending_at(analysis_end: NaiveDate, window_days: u32) -> Self {
        let window = Days::new(u64::from(window_days));
        let curr_start = analysis_end - window;
        Self {
            window_days,
            curr_start,
            curr_end: analysis_end,
            prev_start: curr_start - window,
            prev_end: curr_start,
        }
    }
}
