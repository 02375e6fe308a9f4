// src/fiscal_calendar.rs
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{hash_map::Entry, BTreeMap, HashMap};
use std::fmt;
use tracing::debug;

/// Hours a full-time employee is expected to work per workday.
pub const HOURS_PER_DAY: Decimal = dec!(8);

// --- Fiscal Month ---

/// A month of the fiscal year. Declaration order is fiscal order (April first),
/// so the derived `Ord` sorts months the way the report displays them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FiscalMonth {
    Apr,
    May,
    Jun,
    Jul,
    Aug,
    Sep,
    Oct,
    Nov,
    Dec,
    Jan,
    Feb,
    Mar,
}

impl FiscalMonth {
    pub const COUNT: usize = 12;

    pub const ALL: [FiscalMonth; FiscalMonth::COUNT] = [
        FiscalMonth::Apr,
        FiscalMonth::May,
        FiscalMonth::Jun,
        FiscalMonth::Jul,
        FiscalMonth::Aug,
        FiscalMonth::Sep,
        FiscalMonth::Oct,
        FiscalMonth::Nov,
        FiscalMonth::Dec,
        FiscalMonth::Jan,
        FiscalMonth::Feb,
        FiscalMonth::Mar,
    ];

    /// Zero-based position in the fiscal year (Apr = 0, Mar = 11).
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// The month before this one in the same fiscal year. `None` for April.
    pub fn previous(self) -> Option<Self> {
        self.index().checked_sub(1).and_then(Self::from_index)
    }

    pub fn last() -> Self {
        FiscalMonth::Mar
    }

    /// Fiscal month a calendar date falls in, ignoring the year.
    pub fn from_date(date: NaiveDate) -> Self {
        // month0: Jan = 0 .. Dec = 11; shift so that April lands on 0
        Self::ALL[(date.month0() as usize + 9) % Self::COUNT]
    }

    pub fn label(self) -> &'static str {
        match self {
            FiscalMonth::Apr => "Apr",
            FiscalMonth::May => "May",
            FiscalMonth::Jun => "Jun",
            FiscalMonth::Jul => "Jul",
            FiscalMonth::Aug => "Aug",
            FiscalMonth::Sep => "Sep",
            FiscalMonth::Oct => "Oct",
            FiscalMonth::Nov => "Nov",
            FiscalMonth::Dec => "Dec",
            FiscalMonth::Jan => "Jan",
            FiscalMonth::Feb => "Feb",
            FiscalMonth::Mar => "Mar",
        }
    }
}

impl fmt::Display for FiscalMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// --- Calendar Tables ---

/// One row of the fiscal date table: the workdays remaining in the month as of `date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FiscalDate {
    pub date: NaiveDate,
    pub remaining: u32,
    pub month: FiscalMonth,
}

/// Monthly capacity: the largest "remaining" value seen in the month (the workday
/// count at the start of the month) and the FTE hours derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthCapacity {
    pub month: FiscalMonth,
    pub max_remaining: u32,
    pub fte: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct FiscalCalendar {
    dates: Vec<FiscalDate>,
    remaining_by_date: HashMap<NaiveDate, u32>,
    months: BTreeMap<FiscalMonth, MonthCapacity>,
}

impl FiscalCalendar {
    /// Builds the per-date and per-month tables from `(date, remaining workdays)` rows.
    ///
    /// Monthly capacity is the maximum remaining value within the month, not a sum.
    /// When a date appears more than once the first row wins for lookups.
    pub fn from_dates<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, u32)>,
    {
        let mut dates = Vec::new();
        let mut remaining_by_date = HashMap::new();
        let mut max_remaining: BTreeMap<FiscalMonth, u32> = BTreeMap::new();

        for (date, remaining) in rows {
            let month = FiscalMonth::from_date(date);
            match remaining_by_date.entry(date) {
                Entry::Vacant(slot) => {
                    slot.insert(remaining);
                }
                Entry::Occupied(_) => {
                    debug!("Duplicate fiscal date {} ignored for lookups", date);
                }
            }
            let slot = max_remaining.entry(month).or_insert(0);
            *slot = (*slot).max(remaining);
            dates.push(FiscalDate {
                date,
                remaining,
                month,
            });
        }

        let months = max_remaining
            .into_iter()
            .map(|(month, max_remaining)| {
                (
                    month,
                    MonthCapacity {
                        month,
                        max_remaining,
                        fte: Decimal::from(max_remaining) * HOURS_PER_DAY,
                    },
                )
            })
            .collect();

        Self {
            dates,
            remaining_by_date,
            months,
        }
    }

    pub fn dates(&self) -> &[FiscalDate] {
        &self.dates
    }

    /// Capacity rows in fiscal order. Months without any date rows are absent.
    pub fn months(&self) -> impl Iterator<Item = &MonthCapacity> {
        self.months.values()
    }

    pub fn capacity(&self, month: FiscalMonth) -> Option<&MonthCapacity> {
        self.months.get(&month)
    }

    pub fn fte(&self, month: FiscalMonth) -> Option<Decimal> {
        self.capacity(month).map(|c| c.fte)
    }

    pub fn remaining_on(&self, date: NaiveDate) -> Option<u32> {
        self.remaining_by_date.get(&date).copied()
    }
}
