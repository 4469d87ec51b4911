//! Timetable Fetcher & Parser (C3) — one entity's weekly HTML grid →
//! a 5×N course matrix, period clock, and lunch-break sidecar (§4.3).

pub mod crawler;

use crate::error::ValidationError;
use crate::index::Role;
use chrono::{DateTime, NaiveTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use crawler::TimetableCrawler;

/// The other side of a course pairing: a teacher for a class's grid, a class
/// for a teacher's grid (§10 glossary).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counterpart {
    pub participant: String,
    pub url: String,
}

/// One grid cell. Absent (`None` in the matrix) means a free period — there
/// is no empty-but-present `CourseInfo` (§4.3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseInfo {
    pub subject: String,
    pub counterpart: Vec<Counterpart>,
}

pub type PeriodClock = IndexMap<String, (NaiveTime, NaiveTime)>;

/// A complete weekly timetable for one teacher or class (§4.3).
///
/// `table[weekday][period]` is 0-based on both axes; weekday runs Mon..Fri
/// (0..=4). `periods` keys match `table`'s column indices one-to-one, in
/// insertion order, which is why it is an [`IndexMap`] and not a `HashMap`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timetable {
    pub target: String,
    pub category: Option<String>,
    pub target_url: String,
    pub role: Role,
    pub id: String,

    pub last_update: DateTime<Utc>,
    pub cache_fetch_at: Option<DateTime<Utc>>,

    pub table: Vec<Vec<Option<CourseInfo>>>,
    pub periods: PeriodClock,
    pub lunch_break: Option<Vec<Option<CourseInfo>>>,
    pub lunch_break_periods: Option<PeriodClock>,
}

impl Timetable {
    /// Exactly 5 weekday rows, each the same length as `periods` (§4.3).
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.table.len() != 5 {
            return Err(ValidationError::RowCount(self.table.len()));
        }
        let expected = self.periods.len();
        for (weekday, row) in self.table.iter().enumerate() {
            if row.len() != expected {
                return Err(ValidationError::RowLength {
                    weekday,
                    expected,
                    actual: row.len(),
                });
            }
        }
        Ok(())
    }

    pub fn period_count(&self) -> usize {
        self.periods.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock(n: usize) -> PeriodClock {
        let mut map = PeriodClock::new();
        for i in 0..n {
            map.insert(
                format!("第{i}節"),
                (
                    NaiveTime::from_hms_opt(8 + i as u32, 0, 0).unwrap(),
                    NaiveTime::from_hms_opt(8 + i as u32, 50, 0).unwrap(),
                ),
            );
        }
        map
    }

    fn timetable(rows: Vec<Vec<Option<CourseInfo>>>, periods: usize) -> Timetable {
        Timetable {
            target: "T1".into(),
            category: None,
            target_url: "TA01.html".into(),
            role: Role::Teacher,
            id: "TA01".into(),
            last_update: Utc::now(),
            cache_fetch_at: None,
            table: rows,
            periods: clock(periods),
            lunch_break: None,
            lunch_break_periods: None,
        }
    }

    #[test]
    fn rejects_wrong_row_count() {
        let t = timetable(vec![vec![None; 8]; 4], 8);
        assert!(matches!(t.validate(), Err(ValidationError::RowCount(4))));
    }

    #[test]
    fn rejects_mismatched_row_length() {
        let mut rows = vec![vec![None; 8]; 5];
        rows[2] = vec![None; 7];
        let t = timetable(rows, 8);
        assert!(matches!(
            t.validate(),
            Err(ValidationError::RowLength { weekday: 2, expected: 8, actual: 7 })
        ));
    }

    #[test]
    fn accepts_well_formed_grid() {
        let t = timetable(vec![vec![None; 8]; 5], 8);
        assert!(t.validate().is_ok());
    }
}
