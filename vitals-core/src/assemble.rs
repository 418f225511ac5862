//! Per-day assembly over a [`DateRange`] and ISO week buckets.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::table::{CategoryTable, PairedTable};
use crate::{DateRange, SameDayPolicy};

/// One day of a single-valued metric.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DailyValue {
    pub day: NaiveDate,
    pub value: f64,
}

/// One day of blood pressure. At least one side is present.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DailyPressure {
    pub day: NaiveDate,
    pub systolic: Option<f64>,
    pub diastolic: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PressureKind {
    Systolic,
    Diastolic,
}

/// Long-form blood pressure point, one per side per day.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PressurePoint {
    pub day: NaiveDate,
    pub value: f64,
    pub kind: PressureKind,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WeekKey {
    pub iso_year: i32,
    pub week: u32,
}

/// Days of one ISO week that fall inside the range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeekBucket {
    pub key: WeekKey,
    /// First in-range day of the week, data or not.
    pub anchor: NaiveDate,
    pub days: Vec<DailyValue>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
}

impl WeekBucket {
    fn open(key: WeekKey, anchor: NaiveDate) -> Self {
        Self {
            key,
            anchor,
            days: Vec::new(),
            max: None,
            mean: None,
        }
    }

    fn close(&mut self) {
        self.max = self.days.iter().map(|d| d.value).reduce(f64::max);
        self.mean = SameDayPolicy::Mean.resolve(self.days.iter().map(|d| d.value));
    }

    pub fn count(&self) -> usize {
        self.days.len()
    }
}

/// Heart-rate output handed to a plot sink.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeartRateSeries {
    pub metric: String,
    pub range: DateRange,
    pub daily: Vec<DailyValue>,
    pub weeks: Vec<WeekBucket>,
}

/// Blood-pressure output handed to a plot sink.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BloodPressureSeries {
    pub metric: String,
    pub range: DateRange,
    pub daily: Vec<DailyPressure>,
    pub points: Vec<PressurePoint>,
}

/// One row per in-range day that has data, oldest first. Empty days are
/// skipped rather than zero-filled.
pub fn assemble_daily(
    range: &DateRange,
    table: &CategoryTable,
    policy: SameDayPolicy,
) -> Vec<DailyValue> {
    range
        .days()
        .filter_map(|day| {
            table
                .resolve(day, policy)
                .map(|value| DailyValue { day, value })
        })
        .collect()
}

pub fn assemble_pressure(
    range: &DateRange,
    table: &PairedTable,
    policy: SameDayPolicy,
) -> Vec<DailyPressure> {
    range
        .days()
        .filter_map(|day| {
            table
                .resolve(day, policy)
                .map(|(systolic, diastolic)| DailyPressure {
                    day,
                    systolic,
                    diastolic,
                })
        })
        .collect()
}

pub fn long_form(rows: &[DailyPressure]) -> Vec<PressurePoint> {
    rows.iter()
        .flat_map(|row| {
            let sys = row.systolic.map(|value| PressurePoint {
                day: row.day,
                value,
                kind: PressureKind::Systolic,
            });
            let dia = row.diastolic.map(|value| PressurePoint {
                day: row.day,
                value,
                kind: PressureKind::Diastolic,
            });
            sys.into_iter().chain(dia)
        })
        .collect()
}

pub fn week_of(date: NaiveDate) -> WeekKey {
    let iso = date.iso_week();
    WeekKey {
        iso_year: iso.year(),
        week: iso.week(),
    }
}

/// Group daily rows by ISO week. Every week touched by the range gets a
/// bucket, so weeks without data show up with no `max`/`mean`.
pub fn bucket_by_week(range: &DateRange, rows: &[DailyValue]) -> Vec<WeekBucket> {
    let mut buckets: Vec<WeekBucket> = Vec::new();
    for day in range.days() {
        let key = week_of(day);
        if buckets.last().map(|b| b.key) != Some(key) {
            buckets.push(WeekBucket::open(key, day));
        }
    }

    for row in rows.iter().filter(|row| range.contains(row.day)) {
        let key = week_of(row.day);
        if let Ok(idx) = buckets.binary_search_by_key(&key, |b| b.key) {
            buckets[idx].days.push(*row);
        }
    }

    for bucket in &mut buckets {
        bucket.close();
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{join, ExtractedPoint, Reading, Stamp};

    fn day(m: u32, d: u32) -> NaiveDate {
        let year = if m == 12 { 2016 } else { 2017 };
        NaiveDate::from_ymd_opt(year, m, d).unwrap()
    }

    fn point(raw: &str, value: f64) -> ExtractedPoint {
        ExtractedPoint::new(Stamp::parse(raw).unwrap(), Reading::Single { value })
    }

    #[test]
    fn daily_rows_skip_empty_days() {
        let table = CategoryTable::from_points(
            "hr",
            vec![
                point("2017-01-03 10:00:00 -0500", 64.0),
                point("2017-01-01 10:00:00 -0500", 61.0),
                point("2017-01-01 22:00:00 -0500", 75.0),
                point("2017-01-09 10:00:00 -0500", 99.0),
            ],
        );
        let range = DateRange::parse("2017-01-01", "2017-01-03").unwrap();
        let rows = assemble_daily(&range, &table, SameDayPolicy::First);

        assert_eq!(
            rows,
            vec![
                DailyValue {
                    day: day(1, 1),
                    value: 61.0
                },
                DailyValue {
                    day: day(1, 3),
                    value: 64.0
                },
            ]
        );
        assert!(rows.windows(2).all(|w| w[0].day < w[1].day));
    }

    #[test]
    fn pressure_rows_follow_the_range() {
        let sys = CategoryTable::from_points("sys", vec![point("2017-01-02 08:00:00 -0500", 120.0)]);
        let dia = CategoryTable::from_points("dia", vec![point("2017-01-02 08:00:00 -0500", 80.0)]);
        let range = DateRange::parse("2017-01-01", "2017-01-03").unwrap();
        let rows = assemble_pressure(&range, &join(&sys, &dia), SameDayPolicy::First);

        assert_eq!(
            rows,
            vec![DailyPressure {
                day: day(1, 2),
                systolic: Some(120.0),
                diastolic: Some(80.0),
            }]
        );

        let points = long_form(&rows);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].kind, PressureKind::Systolic);
        assert_eq!(points[1].value, 80.0);
    }

    #[test]
    fn iso_weeks_start_on_monday() {
        assert_eq!(week_of(day(1, 2)), week_of(day(1, 8)));
        let next = week_of(day(1, 9));
        assert_eq!(next.week, week_of(day(1, 2)).week + 1);
        // 2017-01-01 is a Sunday and still belongs to 2016's last week.
        assert_eq!(
            week_of(day(1, 1)),
            WeekKey {
                iso_year: 2016,
                week: 52
            }
        );
    }

    #[test]
    fn buckets_cover_every_week_in_range() {
        let range = DateRange::parse("2016-12-30", "2017-01-10").unwrap();
        let rows = vec![
            DailyValue {
                day: day(12, 30),
                value: 70.0,
            },
            DailyValue {
                day: day(1, 3),
                value: 80.0,
            },
            DailyValue {
                day: day(1, 4),
                value: 90.0,
            },
        ];
        let buckets = bucket_by_week(&range, &rows);

        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[0].anchor, day(12, 30));
        assert_eq!(buckets[0].max, Some(70.0));
        assert_eq!(buckets[1].anchor, day(1, 2));
        assert_eq!(buckets[1].count(), 2);
        assert_eq!(buckets[1].max, Some(90.0));
        assert_eq!(buckets[1].mean, Some(85.0));
        assert_eq!(buckets[2].anchor, day(1, 9));
        assert_eq!(buckets[2].max, None);
    }
}
