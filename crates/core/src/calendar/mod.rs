//! Month picker for rental ranges.
//!
//! Rendering is a pure function of the displayed month, an availability snapshot, the optional
//! start already chosen and today's date. Days the snapshot does not list, and days before today,
//! render as unavailable.

pub mod token;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use thiserror::Error;

use crate::domain::availability::AvailabilitySnapshot;

pub use token::{shift_month, CalendarAction, CalendarTokenError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CalendarMode {
    PickStart,
    PickEnd { start: NaiveDate },
}

impl CalendarMode {
    pub fn from_anchor(anchor: Option<NaiveDate>) -> Self {
        match anchor {
            Some(start) => Self::PickEnd { start },
            None => Self::PickStart,
        }
    }

    pub fn anchor(&self) -> Option<NaiveDate> {
        match self {
            Self::PickStart => None,
            Self::PickEnd { start } => Some(*start),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DayStatus {
    Unavailable,
    /// Today, available as a start.
    TodayStart,
    Start,
    ValidEnd,
    InvalidEnd,
}

impl DayStatus {
    pub fn is_selectable(&self) -> bool {
        matches!(self, Self::TodayStart | Self::Start | Self::ValidEnd)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DayCell {
    pub date: NaiveDate,
    pub status: DayStatus,
    pub action: CalendarAction,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CalendarCell {
    Padding,
    Day(DayCell),
}

impl CalendarCell {
    pub fn action(&self) -> Option<&CalendarAction> {
        match self {
            Self::Padding => None,
            Self::Day(cell) => Some(&cell.action),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CalendarGrid {
    pub year: i32,
    pub month: u32,
    pub mode: CalendarMode,
    pub prev: CalendarAction,
    pub next: CalendarAction,
    /// Monday-first rows of exactly seven cells.
    pub weeks: Vec<Vec<CalendarCell>>,
    /// `cal_today` while picking a start, `cal_reset` while picking an end.
    pub footer: CalendarAction,
}

impl CalendarGrid {
    pub fn days(&self) -> impl Iterator<Item = &DayCell> {
        self.weeks.iter().flatten().filter_map(|cell| match cell {
            CalendarCell::Day(day) => Some(day),
            CalendarCell::Padding => None,
        })
    }

    pub fn day(&self, date: NaiveDate) -> Option<&DayCell> {
        self.days().find(|cell| cell.date == date)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CalendarError {
    #[error("month {year}-{month} is outside the supported calendar range")]
    OutOfRange { year: i32, month: i32 },
}

/// Renders one month. `month` may be 0 or 13 (or further out) and is normalized first.
pub fn render_month(
    year: i32,
    month: i32,
    availability: &AvailabilitySnapshot,
    selected_start: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<CalendarGrid, CalendarError> {
    let (year, month) = shift_month(year, month).ok_or(CalendarError::OutOfRange { year, month })?;
    let out_of_range = || CalendarError::OutOfRange { year, month: month as i32 };
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(out_of_range)?;
    let (next_year, next_month) = shift_month(year, month as i32 + 1).ok_or_else(out_of_range)?;
    let next_first = NaiveDate::from_ymd_opt(next_year, next_month, 1).ok_or_else(out_of_range)?;

    let mode = CalendarMode::from_anchor(selected_start);
    let offset = first.weekday().num_days_from_monday() as usize;

    let mut cells: Vec<CalendarCell> = Vec::with_capacity(42);
    cells.extend(std::iter::repeat_with(|| CalendarCell::Padding).take(offset));
    for date in first.iter_days().take_while(|date| *date < next_first) {
        cells.push(CalendarCell::Day(classify(date, availability, mode, today)));
    }
    while cells.len() % 7 != 0 {
        cells.push(CalendarCell::Padding);
    }

    let mut weeks = Vec::with_capacity(cells.len() / 7);
    let mut cells = cells.into_iter().peekable();
    while cells.peek().is_some() {
        weeks.push(cells.by_ref().take(7).collect());
    }

    Ok(CalendarGrid {
        year,
        month,
        mode,
        prev: CalendarAction::Prev { year, month, anchor: selected_start },
        next: CalendarAction::Next { year, month, anchor: selected_start },
        weeks,
        footer: match mode {
            CalendarMode::PickStart => CalendarAction::Today,
            CalendarMode::PickEnd { .. } => CalendarAction::Reset,
        },
    })
}

fn classify(
    date: NaiveDate,
    availability: &AvailabilitySnapshot,
    mode: CalendarMode,
    today: NaiveDate,
) -> DayCell {
    if date < today || !availability.is_available(date) {
        return DayCell { date, status: DayStatus::Unavailable, action: CalendarAction::Unavailable };
    }

    match mode {
        CalendarMode::PickStart => DayCell {
            date,
            status: if date == today { DayStatus::TodayStart } else { DayStatus::Start },
            action: CalendarAction::Start(date),
        },
        CalendarMode::PickEnd { start } => {
            if date >= start && availability.range_available(start, date) {
                DayCell { date, status: DayStatus::ValidEnd, action: CalendarAction::End(date) }
            } else {
                DayCell { date, status: DayStatus::InvalidEnd, action: CalendarAction::UnavailableRange }
            }
        }
    }
}
