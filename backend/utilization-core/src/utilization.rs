// src/utilization.rs
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::fiscal_calendar::{FiscalCalendar, FiscalMonth, HOURS_PER_DAY};
use crate::time_entries::{ActivityTable, TimeEntry};

// --- Error Types ---

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MissingDataReason {
    #[error("no time entries recorded")]
    NoEntries,
    #[error("no billable time entries recorded")]
    NoBillableEntries,
    #[error("last day worked ({date}) is not in the fiscal date table")]
    NoRemainingDays { date: NaiveDate },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UtilizationError {
    #[error("Missing data for employee '{employee}': {reason}")]
    MissingData {
        employee: String,
        reason: MissingDataReason,
    },
    #[error("Invalid FTE capacity for {month}: {}", describe_fte(.fte))]
    InvalidCapacity {
        month: FiscalMonth,
        fte: Option<Decimal>,
    },
    #[error("Unknown forecasting method '{0}' (expected one of: Month to Date, Last Month, Year to Date)")]
    InvalidMethod(String),
}

fn describe_fte(fte: &Option<Decimal>) -> String {
    match fte {
        Some(value) => format!("{} hours", value),
        None => "no capacity row".to_string(),
    }
}

// --- Forecasting Methods ---

/// How the utilization rate for unworked months is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ForecastMethod {
    #[default]
    #[serde(rename = "Month to Date")]
    MonthToDate,
    #[serde(rename = "Last Month")]
    LastMonth,
    #[serde(rename = "Year to Date")]
    YearToDate,
}

impl ForecastMethod {
    pub const ALL: [ForecastMethod; 3] = [
        ForecastMethod::MonthToDate,
        ForecastMethod::LastMonth,
        ForecastMethod::YearToDate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ForecastMethod::MonthToDate => "Month to Date",
            ForecastMethod::LastMonth => "Last Month",
            ForecastMethod::YearToDate => "Year to Date",
        }
    }
}

impl fmt::Display for ForecastMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ForecastMethod {
    type Err = UtilizationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UtilizationError::InvalidMethod(s.to_string()))
    }
}

// --- Report Structures ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UtilizationRow {
    pub month: FiscalMonth,
    /// Billable hours actually recorded (zero for zero-filled months).
    pub hours_worked: Decimal,
    pub fte: Decimal,
    pub utilization: Decimal,
    pub util_to_date: Decimal,
    pub predicted_hours: Decimal,
    /// Running ratio of predicted hours to FTE from April through this month.
    pub expected_utilization: Decimal,
    /// False for months that had no billable rows and were zero-filled.
    pub recorded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UtilizationReport {
    pub employee: String,
    pub method: ForecastMethod,
    pub current_month: FiscalMonth,
    pub last_day_worked: NaiveDate,
    pub days_remaining: u32,
    /// Rate applied to every zero-filled month.
    pub predicted_rate: Decimal,
    /// Activity names that had no classification and were left out of billable totals.
    pub unclassified_activities: Vec<String>,
    /// Always twelve rows, April first.
    pub rows: Vec<UtilizationRow>,
}

impl UtilizationReport {
    pub fn row(&self, month: FiscalMonth) -> &UtilizationRow {
        &self.rows[month.index()]
    }

    /// Expected utilization at the end of the fiscal year, in percent.
    pub fn predicted_utilization_percent(&self) -> Decimal {
        self.row(FiscalMonth::last()).expected_utilization * dec!(100)
    }
}

// --- Builder ---

/// Builds the twelve-month utilization table for one employee.
///
/// Inputs are only read; every call constructs a fresh report.
pub fn build_utilization(
    employee: &str,
    entries: &[TimeEntry],
    activities: &ActivityTable,
    calendar: &FiscalCalendar,
    method: ForecastMethod,
) -> Result<UtilizationReport, UtilizationError> {
    let missing = |reason| UtilizationError::MissingData {
        employee: employee.to_string(),
        reason,
    };

    let own_entries: Vec<&TimeEntry> = entries.iter().filter(|e| e.employee == employee).collect();
    let last_day_worked = own_entries
        .iter()
        .map(|e| e.date)
        .max()
        .ok_or_else(|| missing(MissingDataReason::NoEntries))?;

    // Billable hours per fiscal month
    let mut hours_worked = [Decimal::ZERO; FiscalMonth::COUNT];
    let mut recorded = [false; FiscalMonth::COUNT];
    let mut unclassified = BTreeSet::new();
    for entry in &own_entries {
        match activities.classify(&entry.activity) {
            Some(classification) if classification.is_billable() => {
                let idx = entry.fiscal_month().index();
                hours_worked[idx] += entry.hours;
                recorded[idx] = true;
            }
            Some(_) => {}
            None => {
                unclassified.insert(entry.activity.clone());
            }
        }
    }
    if !unclassified.is_empty() {
        warn!(
            "Employee '{}' has {} unclassified activity name(s) excluded from billable hours: {:?}",
            employee,
            unclassified.len(),
            unclassified
        );
    }

    let current_month = FiscalMonth::ALL
        .iter()
        .rev()
        .copied()
        .find(|m| recorded[m.index()])
        .ok_or_else(|| missing(MissingDataReason::NoBillableEntries))?;
    let days_remaining = calendar
        .remaining_on(last_day_worked)
        .ok_or_else(|| missing(MissingDataReason::NoRemainingDays {
            date: last_day_worked,
        }))?;

    let mut fte = [Decimal::ZERO; FiscalMonth::COUNT];
    for month in FiscalMonth::ALL {
        let capacity = calendar.fte(month);
        match capacity {
            Some(value) if value > Decimal::ZERO => fte[month.index()] = value,
            _ => {
                return Err(UtilizationError::InvalidCapacity {
                    month,
                    fte: capacity,
                })
            }
        }
    }

    let mut utilization = [Decimal::ZERO; FiscalMonth::COUNT];
    for i in 0..FiscalMonth::COUNT {
        utilization[i] = hours_worked[i] / fte[i];
    }
    let mut util_to_date = utilization;

    // Blend the current month's actuals with a projection over its remaining workdays
    let cur = current_month.index();
    let hours_remaining = Decimal::from(days_remaining) * HOURS_PER_DAY;
    let projected_current_hours = hours_worked[cur] + hours_remaining * utilization[cur];
    util_to_date[cur] = projected_current_hours / fte[cur];
    debug!(
        "{}: {} hours worked, {} hours remaining, projected {} hours",
        current_month, hours_worked[cur], hours_remaining, projected_current_hours
    );

    // util_to_date × FTE, taken from the hours directly so non-terminating ratios stay exact
    let mut predicted_hours = hours_worked;
    predicted_hours[cur] = projected_current_hours;

    let predicted_rate = match method {
        ForecastMethod::MonthToDate => util_to_date[cur],
        ForecastMethod::LastMonth => match current_month.previous() {
            Some(previous) => utilization[previous.index()],
            None => util_to_date[cur],
        },
        ForecastMethod::YearToDate => {
            let hours: Decimal = predicted_hours[..=cur].iter().sum();
            let capacity: Decimal = fte[..=cur].iter().sum();
            hours / capacity
        }
    };
    debug!("{} predicted rate: {}", method, predicted_rate);

    for i in 0..FiscalMonth::COUNT {
        if !recorded[i] {
            predicted_hours[i] = predicted_rate * fte[i];
        }
    }

    let mut rows = Vec::with_capacity(FiscalMonth::COUNT);
    let mut cumulative_hours = Decimal::ZERO;
    let mut cumulative_fte = Decimal::ZERO;
    for month in FiscalMonth::ALL {
        let i = month.index();
        cumulative_hours += predicted_hours[i];
        cumulative_fte += fte[i];
        rows.push(UtilizationRow {
            month,
            hours_worked: hours_worked[i],
            fte: fte[i],
            utilization: utilization[i],
            util_to_date: util_to_date[i],
            predicted_hours: predicted_hours[i],
            expected_utilization: cumulative_hours / cumulative_fte,
            recorded: recorded[i],
        });
    }

    let report = UtilizationReport {
        employee: employee.to_string(),
        method,
        current_month,
        last_day_worked,
        days_remaining,
        predicted_rate,
        unclassified_activities: unclassified.into_iter().collect(),
        rows,
    };
    info!(
        "Built utilization report for '{}' ({}): current month {}, predicted {}%",
        employee,
        method,
        current_month,
        report.predicted_utilization_percent().round_dp(1)
    );
    Ok(report)
}
