use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;

use super::config::{weekday_index, ScheduleConfig};
use super::slots::{generate_slots, TimeSlot};

/// One cell of the month grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub slots: Vec<TimeSlot>,
    /// Padding day from the previous or next month.
    pub is_disabled: bool,
}

impl CalendarDay {
    fn padding(date: NaiveDate) -> Self {
        Self {
            date,
            slots: Vec::new(),
            is_disabled: true,
        }
    }
}

/// Complete weeks (Sunday to Saturday) covering one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthGrid {
    pub year: i32,
    pub month: u32,
    pub days: Vec<CalendarDay>,
}

impl MonthGrid {
    pub fn empty(year: i32, month: u32) -> Self {
        Self {
            year,
            month,
            days: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn day(&self, date: NaiveDate) -> Option<&CalendarDay> {
        self.days.iter().find(|d| d.date == date)
    }

    pub fn contains_month_of(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

/// Build the grid for `year`/`month`. An invalid month yields an empty grid.
pub fn build_month_grid(year: i32, month: u32, config: &ScheduleConfig) -> MonthGrid {
    match try_build(year, month, config) {
        Some(grid) => grid,
        None => {
            tracing::warn!("Cannot build calendar for {}-{:02}", year, month);
            MonthGrid::empty(year, month)
        }
    }
}

fn try_build(year: i32, month: u32, config: &ScheduleConfig) -> Option<MonthGrid> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let last = last_day_of_month(first)?;

    let grid_start = first.checked_sub_days(Days::new(weekday_index(first) as u64))?;
    let grid_end = last.checked_add_days(Days::new(6 - weekday_index(last) as u64))?;

    let days = grid_start
        .iter_days()
        .take_while(|d| *d <= grid_end)
        .map(|date| {
            if date.month() == month && date.year() == year {
                CalendarDay {
                    date,
                    slots: generate_slots(date, config),
                    is_disabled: false,
                }
            } else {
                CalendarDay::padding(date)
            }
        })
        .collect();

    Some(MonthGrid { year, month, days })
}

fn last_day_of_month(first: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = if first.month() == 12 {
        (first.year() + 1, 1)
    } else {
        (first.year(), first.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)?.pred_opt()
}

/// Number of days in a month, `None` for an invalid month.
pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    last_day_of_month(first).map(|d| d.day())
}

// ── Tests ──
