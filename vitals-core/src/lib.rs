//! Core model for turning health export samples into daily series.

use std::path::PathBuf;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

pub mod assemble;
pub mod csv;
pub mod table;

pub use assemble::{
    assemble_daily, assemble_pressure, bucket_by_week, long_form, week_of, BloodPressureSeries,
    DailyPressure, DailyValue, HeartRateSeries, PressureKind, PressurePoint, WeekBucket, WeekKey,
};
pub use csv::CsvRow;
pub use table::{join, CategoryTable, PairedRow, PairedTable, TableRow};

pub const HEART_RATE: &str = "HKQuantityTypeIdentifierHeartRate";
pub const BLOOD_PRESSURE_SYSTOLIC: &str = "HKQuantityTypeIdentifierBloodPressureSystolic";
pub const BLOOD_PRESSURE_DIASTOLIC: &str = "HKQuantityTypeIdentifierBloodPressureDiastolic";

/// Metric name used for the combined systolic/diastolic artifacts.
pub const BLOOD_PRESSURE_METRIC: &str = "bloodpressure";

/// Layout of `startDate` in the export, e.g. `2017-01-05 08:23:00 -0500`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// How a category's raw values are mapped to the emitted unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryRule {
    /// Exact `type` discriminator in the export.
    pub identifier: String,
    /// Short metric name used in artifact names.
    pub metric: String,
    /// Multiplier applied to min/max/average (never to the record count).
    pub scale: f64,
}

impl CategoryRule {
    pub fn new(identifier: impl Into<String>, metric: impl Into<String>, scale: f64) -> Self {
        Self {
            identifier: identifier.into(),
            metric: metric.into(),
            scale,
        }
    }
}

/// Which sample wins when a day holds several readings.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SameDayPolicy {
    /// First reading in arrival order; discards later same-day readings.
    #[default]
    First,
    Last,
    Mean,
}

impl SameDayPolicy {
    /// Collapse one day's values into a single value.
    pub fn resolve<I>(self, values: I) -> Option<f64>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut values = values.into_iter();
        match self {
            SameDayPolicy::First => values.next(),
            SameDayPolicy::Last => values.last(),
            SameDayPolicy::Mean => {
                let (sum, count) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
                (count > 0).then(|| sum / count as f64)
            }
        }
    }
}

/// Shape of a CSV line.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CsvLayout {
    /// `YYYY,MM,DD,hh,mm,min,max,avg,count[,+]`
    #[default]
    Full,
    /// `YYYY,MM,DD,hh,mm,min,max,avg`
    Compact,
}

/// Log level used for records that are dropped because they cannot be decoded.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DropLogging {
    #[default]
    Warn,
    Quiet,
}

/// Everything a run needs; nothing is read from globals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    pub source_path: PathBuf,
    pub output_dir: PathBuf,
    pub range: DateRange,
    pub categories: Vec<CategoryRule>,
    pub csv_layout: CsvLayout,
    pub same_day: SameDayPolicy,
    pub drop_logging: DropLogging,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let start = NaiveDate::from_ymd_opt(2016, 12, 11).unwrap_or_default();
        let end = NaiveDate::from_ymd_opt(2017, 1, 5).unwrap_or_default();
        Self {
            source_path: PathBuf::from("apple_health_export/export.xml"),
            output_dir: PathBuf::from("."),
            range: DateRange { start, end },
            categories: vec![
                CategoryRule::new(HEART_RATE, "heartrate", 60.0),
                CategoryRule::new(BLOOD_PRESSURE_SYSTOLIC, "systolic", 1.0),
                CategoryRule::new(BLOOD_PRESSURE_DIASTOLIC, "diastolic", 1.0),
            ],
            csv_layout: CsvLayout::Full,
            same_day: SameDayPolicy::First,
            drop_logging: DropLogging::Warn,
        }
    }
}

impl PipelineConfig {
    /// Rule for an exact category identifier.
    pub fn rule(&self, identifier: &str) -> Result<&CategoryRule, VitalsError> {
        self.categories
            .iter()
            .find(|rule| rule.identifier == identifier)
            .ok_or_else(|| VitalsError::UnknownCategory(identifier.to_string()))
    }
}

/// Inclusive calendar range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, VitalsError> {
        if end < start {
            return Err(VitalsError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Parse a `YYYY-MM-DD` pair.
    pub fn parse(start: &str, end: &str) -> Result<Self, VitalsError> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Every calendar day from `start` to `end`, no gaps.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day <= end)
    }

    /// `<start>to<end>`, as used in artifact names.
    pub fn label(&self) -> String {
        format!(
            "{}to{}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

pub fn parse_date(value: &str) -> Result<NaiveDate, VitalsError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| VitalsError::InvalidDate(value.to_string()))
}

/// Wall-clock date and time decoded from one `startDate`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Stamp {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl Stamp {
    /// Parse with [`TIMESTAMP_FORMAT`]. The offset is validated but the local
    /// wall-clock values are kept, so the day matches what the export shows.
    pub fn parse(raw: &str) -> Result<Self, VitalsError> {
        let parsed = DateTime::<FixedOffset>::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
            .map_err(|_| VitalsError::InvalidTimestamp(raw.to_string()))?;
        let local = parsed.naive_local();
        Ok(Self {
            date: local.date(),
            time: local.time(),
        })
    }

    /// `(year, month, day, hour, minute)` for compact row emission.
    pub fn compact_fields(&self) -> (i32, u32, u32, u32, u32) {
        (
            self.date.year(),
            self.date.month(),
            self.date.day(),
            self.time.hour(),
            self.time.minute(),
        )
    }

    pub fn iso_date(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    pub fn iso_time(&self) -> String {
        self.time.format("%H:%M").to_string()
    }
}

/// One flat sample from the export. Only the consumed attributes are kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    pub record_type: Option<String>,
    pub start_date: Option<String>,
    pub value: Option<String>,
    pub min: Option<String>,
    pub max: Option<String>,
    pub average: Option<String>,
    pub record_count: Option<String>,
}

impl Record {
    /// Attribute lookup by its export name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        let field = match name {
            "type" => &self.record_type,
            "startDate" => &self.start_date,
            "value" => &self.value,
            "min" => &self.min,
            "max" => &self.max,
            "average" => &self.average,
            "recordCount" => &self.record_count,
            _ => return None,
        };
        field.as_deref()
    }

    /// Exact, case-sensitive category match.
    pub fn is_category(&self, identifier: &str) -> bool {
        self.record_type.as_deref() == Some(identifier)
    }
}

/// Decoded value of one record, already in the emitted unit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Reading {
    /// Pre-aggregated bucket.
    Aggregated {
        min: f64,
        max: f64,
        average: f64,
        count: f64,
    },
    /// Single instantaneous value (the fallback shape).
    Single { value: f64 },
}

impl Reading {
    pub fn min(&self) -> f64 {
        match *self {
            Reading::Aggregated { min, .. } => min,
            Reading::Single { value } => value,
        }
    }

    pub fn max(&self) -> f64 {
        match *self {
            Reading::Aggregated { max, .. } => max,
            Reading::Single { value } => value,
        }
    }

    pub fn average(&self) -> f64 {
        match *self {
            Reading::Aggregated { average, .. } => average,
            Reading::Single { value } => value,
        }
    }

    pub fn count(&self) -> f64 {
        match *self {
            Reading::Aggregated { count, .. } => count,
            Reading::Single { .. } => 1.0,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Reading::Single { .. })
    }

    pub fn scaled(self, factor: f64) -> Self {
        match self {
            Reading::Aggregated {
                min,
                max,
                average,
                count,
            } => Reading::Aggregated {
                min: min * factor,
                max: max * factor,
                average: average * factor,
                count,
            },
            Reading::Single { value } => Reading::Single {
                value: value * factor,
            },
        }
    }
}

/// A matched record after timestamp and value decoding.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ExtractedPoint {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub reading: Reading,
}

impl ExtractedPoint {
    pub fn new(stamp: Stamp, reading: Reading) -> Self {
        Self {
            date: stamp.date,
            time: stamp.time,
            reading,
        }
    }

    pub fn stamp(&self) -> Stamp {
        Stamp {
            date: self.date,
            time: self.time,
        }
    }

    /// Scalar used by the tables: the average, or the single reading.
    pub fn value(&self) -> f64 {
        self.reading.average()
    }
}

/// Errors raised while building series.
#[derive(Debug, thiserror::Error)]
pub enum VitalsError {
    #[error("could not read data: {0}")]
    Parse(String),
    #[error("timestamp {0:?} does not match `%Y-%m-%d %H:%M:%S %z`")]
    InvalidTimestamp(String),
    #[error("invalid calendar date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("date range ends ({end}) before it starts ({start})")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
    #[error("no rule configured for category {0}")]
    UnknownCategory(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
