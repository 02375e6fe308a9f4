// src/loader.rs
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::prelude::*;
use serde::{Deserialize, Deserializer};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::fiscal_calendar::FiscalCalendar;
use crate::time_entries::{ActivityTable, Roster, TimeEntry};
use crate::utilization::{build_utilization, ForecastMethod, UtilizationError, UtilizationReport};

// --- Error Types ---

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to open {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {table} data: {source}")]
    Csv {
        table: &'static str,
        #[source]
        source: csv::Error,
    },
    #[error("Invalid date '{value}' in {table} row {row}")]
    InvalidDate {
        table: &'static str,
        row: usize,
        value: String,
    },
    #[error("Invalid remaining workday count '{value}' in dates row {row}")]
    InvalidRemaining { row: usize, value: String },
}

// --- Raw CSV Rows ---

#[derive(Debug, Deserialize)]
struct RawTimeEntry {
    #[serde(rename = "User Name")]
    user_name: String,
    #[serde(rename = "Entry Date")]
    entry_date: String,
    #[serde(rename = "Activity Name", default)]
    activity_name: String,
    #[serde(rename = "Hours Worked", default, deserialize_with = "de_decimal")]
    hours_worked: Decimal,
    #[serde(rename = "Time Off Hrs", default, deserialize_with = "de_decimal")]
    time_off_hours: Decimal,
    #[serde(rename = "Time Off Type", default)]
    time_off_type: String,
}

#[derive(Debug, Deserialize)]
struct RawActivity {
    #[serde(rename = "Activity Name")]
    activity_name: String,
    #[serde(rename = "Classification", default)]
    classification: String,
}

#[derive(Debug, Deserialize)]
struct RawFiscalDate {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Remaining")]
    remaining: String,
}

#[derive(Debug, Deserialize)]
struct RawName {
    #[serde(rename = "User Name")]
    user_name: String,
}

/// Empty cells count as zero.
fn de_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(Decimal::ZERO),
        Some(value) => Decimal::from_str(value)
            .or_else(|_| Decimal::from_scientific(value))
            .map_err(serde::de::Error::custom),
    }
}

/// Accepts ISO dates, ISO date-times (spreadsheet exports append midnight) and US dates.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];
    const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M"];

    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(value, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(value, f).ok())
                .map(|dt| dt.date())
        })
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(reader)
}

fn rows<T, R>(reader: R, table: &'static str) -> Result<Vec<T>, LoadError>
where
    T: for<'de> Deserialize<'de>,
    R: Read,
{
    csv_reader(reader)
        .deserialize()
        .collect::<Result<Vec<T>, csv::Error>>()
        .map_err(|source| LoadError::Csv { table, source })
}

// --- Table Readers ---

pub fn read_time_entries<R: Read>(reader: R) -> Result<Vec<TimeEntry>, LoadError> {
    rows::<RawTimeEntry, _>(reader, "hours")?
        .into_iter()
        .enumerate()
        // rows are numbered from 1, after the header
        .map(|(i, raw)| -> Result<TimeEntry, LoadError> {
            let date = parse_date(&raw.entry_date).ok_or_else(|| LoadError::InvalidDate {
                table: "hours",
                row: i + 1,
                value: raw.entry_date.clone(),
            })?;
            Ok(TimeEntry::from_export(
                &raw.user_name,
                date,
                &raw.activity_name,
                raw.hours_worked,
                raw.time_off_hours,
                &raw.time_off_type,
            ))
        })
        .collect()
}

pub fn read_activities<R: Read>(reader: R) -> Result<ActivityTable, LoadError> {
    let raw = rows::<RawActivity, _>(reader, "activities")?;
    Ok(ActivityTable::from_pairs(
        raw.into_iter().map(|a| (a.activity_name, a.classification)),
    ))
}

pub fn read_fiscal_dates<R: Read>(reader: R) -> Result<FiscalCalendar, LoadError> {
    let parsed = rows::<RawFiscalDate, _>(reader, "dates")?
        .into_iter()
        .enumerate()
        .map(|(i, raw)| -> Result<_, LoadError> {
            let row = i + 1;
            let date = parse_date(&raw.date).ok_or_else(|| LoadError::InvalidDate {
                table: "dates",
                row,
                value: raw.date.clone(),
            })?;
            let remaining = parse_remaining(&raw.remaining).ok_or_else(|| {
                LoadError::InvalidRemaining {
                    row,
                    value: raw.remaining.clone(),
                }
            })?;
            Ok((date, remaining))
        })
        .collect::<Result<Vec<_>, LoadError>>()?;
    Ok(FiscalCalendar::from_dates(parsed))
}

// Spreadsheet exports may write whole numbers as "5.0"
fn parse_remaining(value: &str) -> Option<u32> {
    let value = Decimal::from_str(value.trim()).ok()?;
    if value.fract().is_zero() {
        value.to_u32()
    } else {
        None
    }
}

pub fn read_roster<R: Read>(reader: R) -> Result<Roster, LoadError> {
    let raw = rows::<RawName, _>(reader, "names")?;
    Ok(Roster::from_names(raw.into_iter().map(|n| n.user_name)))
}

// --- Input Bundle ---

#[derive(Debug, Clone)]
pub struct InputPaths {
    pub hours: PathBuf,
    pub activities: PathBuf,
    pub dates: PathBuf,
    pub names: PathBuf,
}

/// Everything the report needs, loaded once and then only read.
#[derive(Debug, Clone, Default)]
pub struct ReportInputs {
    pub entries: Vec<TimeEntry>,
    pub activities: ActivityTable,
    pub calendar: FiscalCalendar,
    pub roster: Roster,
}

impl ReportInputs {
    pub fn load(paths: &InputPaths) -> Result<Self, LoadError> {
        info!("Loading report inputs...");
        let entries = read_time_entries(open(&paths.hours)?)?;
        debug!("Loaded {} time entries from {}", entries.len(), paths.hours.display());
        let activities = read_activities(open(&paths.activities)?)?;
        debug!("Loaded {} activity classifications", activities.len());
        let calendar = read_fiscal_dates(open(&paths.dates)?)?;
        debug!(
            "Loaded {} fiscal dates covering {} months",
            calendar.dates().len(),
            calendar.months().count()
        );
        let roster = read_roster(open(&paths.names)?)?;
        info!(
            "Report inputs loaded: {} entries, {} activities, {} fiscal dates, {} employees",
            entries.len(),
            activities.len(),
            calendar.dates().len(),
            roster.len()
        );
        Ok(Self {
            entries,
            activities,
            calendar,
            roster,
        })
    }

    pub fn build_report(
        &self,
        employee: &str,
        method: ForecastMethod,
    ) -> Result<UtilizationReport, UtilizationError> {
        build_utilization(
            employee,
            &self.entries,
            &self.activities,
            &self.calendar,
            method,
        )
    }
}

fn open(path: &Path) -> Result<File, LoadError> {
    File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fiscal_calendar::FiscalMonth;
    use crate::time_entries::Classification;
    use rust_decimal_macros::dec;
    use std::io::Write;

    const HOURS_CSV: &str = "\
User Name,Entry Date,Activity Name,Hours Worked,Time Off Hrs,Time Off Type
Dana,2021-04-12 00:00:00,Client Work   ,7.5,,
Dana,2021-04-13,,0,8,Vacation
Peter,05/03/2021,Support,4,0,
";

    #[test]
    fn reads_and_normalizes_time_entries() {
        let entries = read_time_entries(HOURS_CSV.as_bytes()).unwrap();
        assert_eq!(entries.len(), 3);

        assert_eq!(entries[0].employee, "Dana");
        assert_eq!(entries[0].activity, "Client Work");
        assert_eq!(entries[0].hours, dec!(7.5));
        assert_eq!(entries[0].date, NaiveDate::from_ymd_opt(2021, 4, 12).unwrap());

        assert_eq!(entries[1].activity, "Vacation");
        assert_eq!(entries[1].hours, dec!(8));

        assert_eq!(entries[2].date, NaiveDate::from_ymd_opt(2021, 5, 3).unwrap());
    }

    #[test]
    fn invalid_entry_date_reports_row() {
        let csv = "User Name,Entry Date,Activity Name,Hours Worked\nDana,not-a-date,Support,1\n";
        match read_time_entries(csv.as_bytes()) {
            Err(LoadError::InvalidDate { table, row, value }) => {
                assert_eq!(table, "hours");
                assert_eq!(row, 1);
                assert_eq!(value, "not-a-date");
            }
            other => panic!("Expected InvalidDate, got {:?}", other),
        }
    }

    #[test]
    fn unparseable_hours_is_csv_error() {
        let csv = "User Name,Entry Date,Activity Name,Hours Worked\nDana,2021-04-01,Support,lots\n";
        assert!(matches!(
            read_time_entries(csv.as_bytes()),
            Err(LoadError::Csv { table: "hours", .. })
        ));
    }

    #[test]
    fn reads_activities() {
        let csv = "Activity Name,Classification\nClient Work ,Billable\nAdmin,Overhead\n";
        let table = read_activities(csv.as_bytes()).unwrap();
        assert_eq!(table.classify("Client Work"), Some(&Classification::Billable));
        assert_eq!(
            table.classify("Admin"),
            Some(&Classification::Other("Overhead".to_string()))
        );
    }

    #[test]
    fn reads_fiscal_dates_with_float_remaining() {
        let csv = "Date,Remaining\n2021-04-01,22.0\n2021-04-30,1\n";
        let calendar = read_fiscal_dates(csv.as_bytes()).unwrap();
        assert_eq!(calendar.fte(FiscalMonth::Apr), Some(dec!(176)));
        assert_eq!(
            calendar.remaining_on(NaiveDate::from_ymd_opt(2021, 4, 30).unwrap()),
            Some(1)
        );
    }

    #[test]
    fn fractional_remaining_is_rejected() {
        let csv = "Date,Remaining\n2021-04-01,2.5\n";
        assert!(matches!(
            read_fiscal_dates(csv.as_bytes()),
            Err(LoadError::InvalidRemaining { row: 1, .. })
        ));
    }

    #[test]
    fn reads_roster() {
        let csv = "User Name\nDana\nPeter\nDana\n";
        let roster = read_roster(csv.as_bytes()).unwrap();
        assert_eq!(roster.names(), &["Dana", "Peter"]);
    }

    #[test]
    fn loads_bundle_from_files_and_builds_report() {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, content: &str| {
            let path = dir.path().join(name);
            let mut file = File::create(&path).unwrap();
            file.write_all(content.as_bytes()).unwrap();
            path
        };

        let mut dates = String::from("Date,Remaining\n");
        for (year, month) in [(2021, 4), (2021, 5), (2021, 6), (2021, 7), (2021, 8), (2021, 9),
            (2021, 10), (2021, 11), (2021, 12), (2022, 1), (2022, 2), (2022, 3)]
        {
            dates.push_str(&format!("{}-{:02}-01,20\n", year, month));
        }
        dates.push_str("2021-04-13,13\n");

        let paths = InputPaths {
            hours: write("hours.csv", HOURS_CSV),
            activities: write(
                "activities.csv",
                "Activity Name,Classification\nClient Work,Billable\nVacation,Leave\n",
            ),
            dates: write("dates.csv", &dates),
            names: write("names.csv", "User Name\nDana\nPeter\n"),
        };

        let inputs = ReportInputs::load(&paths).unwrap();
        assert_eq!(inputs.entries.len(), 3);
        assert_eq!(inputs.roster.len(), 2);

        let report = inputs
            .build_report("Dana", ForecastMethod::MonthToDate)
            .unwrap();
        assert_eq!(report.current_month, FiscalMonth::Apr);
        assert_eq!(report.days_remaining, 13);
        assert_eq!(report.row(FiscalMonth::Apr).hours_worked, dec!(7.5));
    }

    #[test]
    fn missing_file_is_io_error() {
        let paths = InputPaths {
            hours: PathBuf::from("/nonexistent/hours.csv"),
            activities: PathBuf::from("/nonexistent/activities.csv"),
            dates: PathBuf::from("/nonexistent/dates.csv"),
            names: PathBuf::from("/nonexistent/names.csv"),
        };
        assert!(matches!(
            ReportInputs::load(&paths),
            Err(LoadError::Io { .. })
        ));
    }
}
