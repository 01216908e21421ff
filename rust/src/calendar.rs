//! Projection of integer time units onto calendar dates.

use chrono::{Days, NaiveDate};

use crate::graph::GraphId;
use crate::models::{Activity, ScheduledActivity};

/// An activity placed on the calendar.
///
/// `finish` is the first day after the work ends, matching the half-open
/// `[start, finish)` time units it occupies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatedActivity<T> {
    pub id: T,
    pub name: String,
    pub start: NaiveDate,
    pub finish: NaiveDate,
}

/// Calendar anchored so that time unit 0 falls on `start`, one unit per day.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProjectCalendar {
    start: NaiveDate,
}

impl ProjectCalendar {
    pub fn new(start: NaiveDate) -> Self {
        Self { start }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Date of a time unit; `None` when it falls outside chrono's range.
    pub fn date_of(&self, time: i32) -> Option<NaiveDate> {
        let days = Days::new(u64::from(time.unsigned_abs()));
        if time >= 0 {
            self.start.checked_add_days(days)
        } else {
            self.start.checked_sub_days(days)
        }
    }

    pub fn time_of(&self, date: NaiveDate) -> i64 {
        (date - self.start).num_days()
    }

    pub fn dated_scheduled_activity<T: GraphId>(&self, scheduled: &ScheduledActivity<T>) -> Option<DatedActivity<T>> {
        Some(DatedActivity {
            id: scheduled.id,
            name: scheduled.name.clone(),
            start: self.date_of(scheduled.start_time)?,
            finish: self.date_of(scheduled.finish_time)?,
        })
    }

    /// Dates for a timed activity; `None` until a critical path pass has run.
    pub fn dated_activity<T, R, W>(&self, activity: &Activity<T, R, W>) -> Option<DatedActivity<T>>
    where
        T: GraphId,
        R: GraphId,
        W: GraphId,
    {
        Some(DatedActivity {
            id: activity.id,
            name: activity.name.clone(),
            start: self.date_of(activity.earliest_start_time?)?,
            finish: self.date_of(activity.earliest_finish_time()?)?,
        })
    }
}
