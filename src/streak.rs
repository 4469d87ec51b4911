//! Streak Log Builder (C5) — compress timetable rows into maximal runs of
//! equal cells, keyed by their starting slot (§4.5).

use crate::error::ValidationError;
use crate::index::Role;
use crate::timetable::{CourseInfo, Timetable};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// `(weekday, period, streak)`; equality and hashing use `(weekday, period)`
/// only, so two streak-times at the same starting slot are equal regardless
/// of how long the run is (§3). `period` is 1-based in the public surface.
#[derive(Debug, Clone, Copy, Eq, serde::Serialize, serde::Deserialize)]
pub struct StreakTime {
    pub weekday: u8,
    pub period: u8,
    pub streak: u8,
}

impl StreakTime {
    pub fn new(weekday: u8, period: u8, streak: u8) -> Self {
        StreakTime { weekday, period, streak }
    }
}

impl PartialEq for StreakTime {
    fn eq(&self, other: &Self) -> bool {
        self.weekday == other.weekday && self.period == other.period
    }
}

impl Hash for StreakTime {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.weekday.hash(state);
        self.period.hash(state);
    }
}

/// `(source, StreakTime) → course at that streak's start`, where `source` is
/// the owning entity's display key (class code or teacher name) (§4.5).
pub type TimetableSlotLogDict = HashMap<(String, StreakTime), Option<CourseInfo>>;

/// Scan every weekday row of `timetable`, emitting one entry per maximal run
/// of equal cells. `source` is the display key this timetable belongs to.
///
/// Two cells are "equal" iff their `CourseInfo` values are equal; a run of
/// `None` (free periods) is a valid streak like any other.
pub fn build_streak_log(source: &str, timetable: &Timetable, log: &mut TimetableSlotLogDict) -> Result<(), ValidationError> {
    for (weekday, row) in timetable.table.iter().enumerate() {
        let row_len = row.len();
        let mut start_period = 0usize;
        let mut streak_len = 0usize;
        let mut current: Option<&Option<CourseInfo>> = None;
        let mut emitted_total = 0usize;

        for (period, cell) in row.iter().enumerate() {
            match current {
                None => {
                    current = Some(cell);
                    start_period = period;
                    streak_len = 1;
                }
                Some(prev) if *prev == *cell => {
                    streak_len += 1;
                }
                Some(prev) => {
                    emit(log, source, weekday as u8, start_period, streak_len, prev.clone());
                    emitted_total += streak_len;
                    current = Some(cell);
                    start_period = period;
                    streak_len = 1;
                }
            }
        }
        if let Some(prev) = current {
            emit(log, source, weekday as u8, start_period, streak_len, prev.clone());
            emitted_total += streak_len;
        }

        if emitted_total != row_len {
            return Err(ValidationError::StreakConservation {
                source: source.to_owned(),
                weekday: weekday as u8,
                expected: row_len,
                actual: emitted_total,
            });
        }
    }
    Ok(())
}

/// The full log plus which role (teacher/class) each source key belongs to —
/// the graph builder (§4.6) needs this to tell class sources from teacher
/// sources.
#[derive(Debug, Default)]
pub struct StreakLog {
    pub entries: TimetableSlotLogDict,
    pub roles: HashMap<String, Role>,
}

/// Build the combined log across every fetched timetable (§4.5).
pub fn build_streak_log_dict(timetables: &[Timetable]) -> Result<StreakLog, ValidationError> {
    let mut log = StreakLog::default();
    for timetable in timetables {
        build_streak_log(&timetable.target, timetable, &mut log.entries)?;
        log.roles.insert(timetable.target.clone(), timetable.role);
    }
    Ok(log)
}

fn emit(
    log: &mut TimetableSlotLogDict,
    source: &str,
    weekday: u8,
    start_period_0based: usize,
    streak_len: usize,
    value: Option<CourseInfo>,
) {
    let key = (
        source.to_owned(),
        StreakTime::new(weekday, (start_period_0based + 1) as u8, streak_len as u8),
    );
    log.entry(key).or_insert(value);
}
