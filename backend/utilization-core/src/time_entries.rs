// src/time_entries.rs
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::fiscal_calendar::FiscalMonth;

pub const BILLABLE_LABEL: &str = "Billable";

type EmployeeId = String;
type ActivityName = String;

// --- Time Entries ---

/// One logged time record after normalization. Time off is already folded into
/// `hours` and `activity`, so consumers never see the raw time-off columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeEntry {
    pub employee: EmployeeId,
    pub date: NaiveDate,
    pub activity: ActivityName,
    pub hours: Decimal,
}

impl TimeEntry {
    /// Normalizes an exported row.
    ///
    /// When `time_off_hours > 0` those hours are added to the worked hours and the
    /// time-off type is appended to the activity name, which forms a synthetic
    /// category (e.g. "Vacation" for an empty activity). The name is trimmed since
    /// exports carry trailing whitespace.
    pub fn from_export(
        employee: &str,
        date: NaiveDate,
        activity: &str,
        hours_worked: Decimal,
        time_off_hours: Decimal,
        time_off_type: &str,
    ) -> Self {
        let (hours, activity) = if time_off_hours > Decimal::ZERO {
            (
                hours_worked + time_off_hours,
                format!("{}{}", activity, time_off_type),
            )
        } else {
            (hours_worked, activity.to_string())
        };

        Self {
            employee: employee.trim().to_string(),
            date,
            activity: activity.trim().to_string(),
            hours,
        }
    }

    pub fn fiscal_month(&self) -> FiscalMonth {
        FiscalMonth::from_date(self.date)
    }
}

// --- Activity Classifications ---

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Classification {
    Billable,
    Other(String),
}

impl Classification {
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        if label == BILLABLE_LABEL {
            Classification::Billable
        } else {
            Classification::Other(label.to_string())
        }
    }

    pub fn is_billable(&self) -> bool {
        matches!(self, Classification::Billable)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Billable => f.write_str(BILLABLE_LABEL),
            Classification::Other(label) => f.write_str(label),
        }
    }
}

/// Activity name -> classification lookup. Names are matched after trimming.
#[derive(Debug, Clone, Default)]
pub struct ActivityTable {
    classifications: HashMap<ActivityName, Classification>,
}

impl ActivityTable {
    pub fn from_pairs<I, A, C>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, C)>,
        A: AsRef<str>,
        C: AsRef<str>,
    {
        let classifications = pairs
            .into_iter()
            .map(|(activity, classification)| {
                (
                    activity.as_ref().trim().to_string(),
                    Classification::from_label(classification.as_ref()),
                )
            })
            .collect();
        Self { classifications }
    }

    /// `None` means the activity is unclassified.
    pub fn classify(&self, activity: &str) -> Option<&Classification> {
        self.classifications.get(activity.trim())
    }

    pub fn len(&self) -> usize {
        self.classifications.len()
    }
}

// --- Roster ---

/// Unique employee names in the order they first appear.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Roster {
    names: Vec<EmployeeId>,
}

impl Roster {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let names = names
            .into_iter()
            .map(|n| n.as_ref().trim().to_string())
            .filter(|n| !n.is_empty() && seen.insert(n.clone()))
            .collect();
        Self { names }
    }

    pub fn names(&self) -> &[EmployeeId] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(date_str: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
            .unwrap_or_else(|_| panic!("Invalid date string format: {}", date_str))
    }

    #[test]
    fn activity_name_is_trimmed() {
        let entry = TimeEntry::from_export(
            "E1",
            d("2021-04-06"),
            "Client Work   ",
            dec!(7.5),
            Decimal::ZERO,
            "",
        );
        assert_eq!(entry.activity, "Client Work");
        assert_eq!(entry.hours, dec!(7.5));
        assert_eq!(entry.fiscal_month(), FiscalMonth::Apr);
    }

    #[test]
    fn time_off_is_merged_into_hours_and_activity() {
        let entry = TimeEntry::from_export(
            "E1",
            d("2021-07-02"),
            "",
            Decimal::ZERO,
            dec!(8),
            "Vacation ",
        );
        assert_eq!(entry.hours, dec!(8));
        assert_eq!(entry.activity, "Vacation");
    }

    #[test]
    fn time_off_type_ignored_without_time_off_hours() {
        let entry = TimeEntry::from_export(
            "E1",
            d("2021-07-02"),
            "Client Work",
            dec!(6),
            Decimal::ZERO,
            "Sick",
        );
        assert_eq!(entry.activity, "Client Work");
        assert_eq!(entry.hours, dec!(6));
    }

    #[test]
    fn classify_matches_trimmed_names() {
        let table = ActivityTable::from_pairs(vec![
            ("Client Work ", "Billable"),
            ("Vacation", "Leave"),
        ]);
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.classify("Client Work"),
            Some(&Classification::Billable)
        );
        assert_eq!(
            table.classify("Vacation"),
            Some(&Classification::Other("Leave".to_string()))
        );
        assert!(!table.classify("Vacation").unwrap().is_billable());
        assert_eq!(table.classify("Unknown"), None);
    }

    #[test]
    fn roster_deduplicates_in_first_seen_order() {
        let roster = Roster::from_names(vec!["Dana", "Peter", " Dana", "", "Ida"]);
        assert_eq!(roster.names(), &["Dana", "Peter", "Ida"]);
        assert_eq!(roster.len(), 3);
    }
}
