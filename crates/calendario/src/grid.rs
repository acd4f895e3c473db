use chrono::{Datelike, Duration, NaiveDate};

use crate::filter::WeekStart;
use crate::types::Event;

pub const MONTH_NAMES: [&str; 12] = [
    "ENERO",
    "FEBRERO",
    "MARZO",
    "ABRIL",
    "MAYO",
    "JUNIO",
    "JULIO",
    "AGOSTO",
    "SEPTIEMBRE",
    "OCTUBRE",
    "NOVIEMBRE",
    "DICIEMBRE",
];

/// Column headings, Monday first
pub const DAY_NAMES: [&str; 7] = [
    "Lunes",
    "Martes",
    "Miércoles",
    "Jueves",
    "Viernes",
    "Sábado",
    "Domingo",
];

/// One slot of the month view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayCell {
    /// Padding before the first day of the month
    Empty,
    Day(NaiveDate),
}

impl DayCell {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            DayCell::Empty => None,
            DayCell::Day(date) => Some(*date),
        }
    }
}

/// Cells for a month, `month0` counted from 0 (January) to 11.
///
/// Leading empty cells align the 1st under its Monday-first weekday column.
/// The last row is not padded. Returns an empty grid for an out-of-range
/// month or year.
pub fn build_month_grid(year: i32, month0: u32) -> Vec<DayCell> {
    let first = month0
        .checked_add(1)
        .and_then(|month| NaiveDate::from_ymd_opt(year, month, 1));
    let Some(first) = first else {
        return Vec::new();
    };
    let leading = WeekStart::Monday.offset(first) as usize;
    let days = days_in_month(first);

    let mut cells = Vec::with_capacity(leading + days as usize);
    cells.extend(std::iter::repeat(DayCell::Empty).take(leading));
    cells.extend(
        (0..days).map(|offset| DayCell::Day(first + Duration::days(offset as i64))),
    );
    cells
}

/// Length of the month containing `first`: the day before the 1st of the next month
fn days_in_month(first: NaiveDate) -> u32 {
    let next = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    };
    next.and_then(|n| n.pred_opt())
        .map(|last| last.day())
        .unwrap_or(31)
}

/// Events falling on `date`, in input order
pub fn events_for_date<'a>(events: &'a [Event], date: NaiveDate) -> Vec<&'a Event> {
    events
        .iter()
        .filter(|e| e.calendar_date() == Some(date))
        .collect()
}

/// Single-letter headings for the small side calendars, Monday first
pub const MINI_DAY_NAMES: [&str; 7] = ["L", "M", "X", "J", "V", "S", "D"];

/// Year and 0-based month shown by the calendar view. Always within the
/// range of years `NaiveDate` can represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthCursor {
    year: i32,
    month0: u32,
}

impl MonthCursor {
    pub fn min_year() -> i32 {
        NaiveDate::MIN.year()
    }

    pub fn max_year() -> i32 {
        NaiveDate::MAX.year()
    }

    /// Clamps both the year and the month into range
    pub fn new(year: i32, month0: u32) -> Self {
        Self {
            year: year.clamp(Self::min_year(), Self::max_year()),
            month0: month0.min(11),
        }
    }

    /// `None` unless the year is representable and `month0` is 0..=11
    pub fn checked(year: i32, month0: u32) -> Option<Self> {
        if (Self::min_year()..=Self::max_year()).contains(&year) && month0 <= 11 {
            Some(Self { year, month0 })
        } else {
            None
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month0: date.month0(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month0(&self) -> u32 {
        self.month0
    }

    /// The month before, or the same cursor at the earliest supported month
    pub fn previous(&self) -> Self {
        match self.month0 {
            0 if self.year <= Self::min_year() => *self,
            0 => Self::new(self.year - 1, 11),
            month0 => Self::new(self.year, month0 - 1),
        }
    }

    /// The month after, or the same cursor at the latest supported month
    pub fn next(&self) -> Self {
        match self.month0 {
            11 if self.year >= Self::max_year() => *self,
            11 => Self::new(self.year + 1, 0),
            month0 => Self::new(self.year, month0 + 1),
        }
    }

    /// Heading such as "ENERO 2025"
    pub fn title(&self) -> String {
        let name = MONTH_NAMES.get(self.month0 as usize).copied().unwrap_or_default();
        format!("{} {}", name, self.year)
    }

    pub fn grid(&self) -> Vec<DayCell> {
        build_month_grid(self.year, self.month0)
    }
}
