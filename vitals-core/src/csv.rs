//! Comma-separated rows emitted per matched record.

use serde::{Deserialize, Serialize};

use crate::{CsvLayout, ExtractedPoint, VitalsError};

/// Marker appended to rows decoded from a single `value`.
const FALLBACK_MARKER: &str = "+";

/// One emitted line. Numeric fields are truncated toward zero.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CsvRow {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub min: i64,
    pub max: i64,
    pub average: i64,
    /// Always 0 when parsed from a compact line.
    pub count: i64,
    pub fallback: bool,
}

impl CsvRow {
    pub fn from_point(point: &ExtractedPoint) -> Self {
        let (year, month, day, hour, minute) = point.stamp().compact_fields();
        let reading = point.reading;
        Self {
            year,
            month,
            day,
            hour,
            minute,
            min: reading.min().trunc() as i64,
            max: reading.max().trunc() as i64,
            average: reading.average().trunc() as i64,
            count: reading.count().trunc() as i64,
            fallback: reading.is_fallback(),
        }
    }

    pub fn render(&self, layout: CsvLayout) -> String {
        let line = format!(
            "{:04},{:02},{:02},{:02},{:02},{},{},{}",
            self.year, self.month, self.day, self.hour, self.minute, self.min, self.max, self.average
        );
        match layout {
            CsvLayout::Compact => line,
            CsvLayout::Full if self.fallback => {
                format!("{line},{},{FALLBACK_MARKER}", self.count)
            }
            CsvLayout::Full => format!("{line},{}", self.count),
        }
    }

    pub fn parse(line: &str, layout: CsvLayout) -> Result<Self, VitalsError> {
        let fields: Vec<&str> = line.trim_end().split(',').collect();
        let expected = match layout {
            CsvLayout::Full => 9..=10,
            CsvLayout::Compact => 8..=8,
        };
        if !expected.contains(&fields.len()) {
            return Err(VitalsError::Parse(format!(
                "expected {expected:?} fields, found {} in {line:?}",
                fields.len()
            )));
        }

        let int = |idx: usize| -> Result<i64, VitalsError> {
            fields[idx]
                .parse::<i64>()
                .map_err(|_| VitalsError::Parse(format!("field {idx} in {line:?} is not an integer")))
        };
        let unsigned = |idx: usize| -> Result<u32, VitalsError> {
            fields[idx]
                .parse::<u32>()
                .map_err(|_| VitalsError::Parse(format!("field {idx} in {line:?} is not a date part")))
        };

        let fallback = match fields.get(9) {
            None => false,
            Some(&FALLBACK_MARKER) => true,
            Some(other) => {
                return Err(VitalsError::Parse(format!(
                    "unexpected trailing field {other:?} in {line:?}"
                )))
            }
        };

        Ok(Self {
            year: fields[0]
                .parse::<i32>()
                .map_err(|_| VitalsError::Parse(format!("year in {line:?} is not numeric")))?,
            month: unsigned(1)?,
            day: unsigned(2)?,
            hour: unsigned(3)?,
            minute: unsigned(4)?,
            min: int(5)?,
            max: int(6)?,
            average: int(7)?,
            count: if layout == CsvLayout::Full { int(8)? } else { 0 },
            fallback,
        })
    }
}
