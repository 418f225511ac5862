//! Date-indexed tables built from extracted points, and the systolic/diastolic join.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::{ExtractedPoint, SameDayPolicy};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TableRow {
    pub time: NaiveTime,
    pub value: f64,
}

/// Points of one category keyed by date. Rows inside a date keep arrival order.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CategoryTable {
    category: String,
    rows: BTreeMap<NaiveDate, Vec<TableRow>>,
    len: usize,
}

impl CategoryTable {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            ..Self::default()
        }
    }

    pub fn from_points<I>(category: impl Into<String>, points: I) -> Self
    where
        I: IntoIterator<Item = ExtractedPoint>,
    {
        let mut table = Self::new(category);
        for point in points {
            table.push(&point);
        }
        table
    }

    pub fn push(&mut self, point: &ExtractedPoint) {
        self.rows.entry(point.date).or_default().push(TableRow {
            time: point.time,
            value: point.value(),
        });
        self.len += 1;
    }

    /// All rows recorded on `date`, in arrival order.
    pub fn on(&self, date: NaiveDate) -> &[TableRow] {
        self.rows.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn resolve(&self, date: NaiveDate, policy: SameDayPolicy) -> Option<f64> {
        policy.resolve(self.on(date).iter().map(|row| row.value))
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.rows.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// One blood-pressure measurement; either side may be missing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PairedRow {
    pub time: NaiveTime,
    pub systolic: Option<f64>,
    pub diastolic: Option<f64>,
}

impl PairedRow {
    fn same_values(&self, other: &PairedRow) -> bool {
        self.systolic == other.systolic && self.diastolic == other.diastolic
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct PairedTable {
    rows: BTreeMap<NaiveDate, Vec<PairedRow>>,
}

impl PairedTable {
    pub fn on(&self, date: NaiveDate) -> &[PairedRow] {
        self.rows.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Collapse one day into `(systolic, diastolic)`. `Mean` averages each side
    /// over the rows where it is present.
    pub fn resolve(
        &self,
        date: NaiveDate,
        policy: SameDayPolicy,
    ) -> Option<(Option<f64>, Option<f64>)> {
        let rows = self.on(date);
        let resolved = match policy {
            SameDayPolicy::First => rows.first().map(|row| (row.systolic, row.diastolic)),
            SameDayPolicy::Last => rows.last().map(|row| (row.systolic, row.diastolic)),
            SameDayPolicy::Mean => Some((
                policy.resolve(rows.iter().filter_map(|row| row.systolic)),
                policy.resolve(rows.iter().filter_map(|row| row.diastolic)),
            )),
        };
        resolved.filter(|(sys, dia)| sys.is_some() || dia.is_some())
    }

    pub fn len(&self) -> usize {
        self.rows.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Outer join on date. Inside a date the n-th systolic reading pairs with the
/// n-th diastolic one, in arrival order; readings left over on the longer side
/// become partial rows. Rows repeating a (systolic, diastolic) pair already
/// seen that day are dropped.
pub fn join(systolic: &CategoryTable, diastolic: &CategoryTable) -> PairedTable {
    let mut dates: Vec<NaiveDate> = systolic.dates().chain(diastolic.dates()).collect();
    dates.sort_unstable();
    dates.dedup();

    let mut rows = BTreeMap::new();
    for date in dates {
        let (sys, dia) = (systolic.on(date), diastolic.on(date));
        let mut unique: Vec<PairedRow> = Vec::with_capacity(sys.len().max(dia.len()));

        for idx in 0..sys.len().max(dia.len()) {
            let row = match (sys.get(idx), dia.get(idx)) {
                (Some(s), d) => PairedRow {
                    time: s.time,
                    systolic: Some(s.value),
                    diastolic: d.map(|d| d.value),
                },
                (None, Some(d)) => PairedRow {
                    time: d.time,
                    systolic: None,
                    diastolic: Some(d.value),
                },
                (None, None) => break,
            };
            if !unique.iter().any(|kept| kept.same_values(&row)) {
                unique.push(row);
            }
        }
        rows.insert(date, unique);
    }

    PairedTable { rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Reading, Stamp};

    fn point(raw: &str, value: f64) -> ExtractedPoint {
        ExtractedPoint::new(Stamp::parse(raw).unwrap(), Reading::Single { value })
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2017, 1, d).unwrap()
    }

    #[test]
    fn table_keeps_arrival_order_within_a_day() {
        let table = CategoryTable::from_points(
            "hr",
            vec![
                point("2017-01-02 18:00:00 -0500", 90.0),
                point("2017-01-02 07:00:00 -0500", 60.0),
                point("2017-01-03 07:00:00 -0500", 70.0),
            ],
        );
        assert_eq!(table.len(), 3);
        assert_eq!(table.on(day(2)).len(), 2);
        assert_eq!(table.on(day(2))[0].value, 90.0);
        assert_eq!(table.resolve(day(2), SameDayPolicy::First), Some(90.0));
        assert_eq!(table.resolve(day(2), SameDayPolicy::Last), Some(60.0));
        assert_eq!(table.resolve(day(4), SameDayPolicy::First), None);
        assert_eq!(table.dates().collect::<Vec<_>>(), vec![day(2), day(3)]);
    }

    #[test]
    fn join_pairs_matching_days() {
        let sys = CategoryTable::from_points("sys", vec![point("2017-01-02 08:00:00 -0500", 120.0)]);
        let dia = CategoryTable::from_points("dia", vec![point("2017-01-02 08:00:00 -0500", 80.0)]);
        let joined = join(&sys, &dia);

        assert_eq!(joined.len(), 1);
        assert_eq!(
            joined.resolve(day(2), SameDayPolicy::First),
            Some((Some(120.0), Some(80.0)))
        );
        assert!(joined.on(day(3)).is_empty());
        assert_eq!(joined.resolve(day(3), SameDayPolicy::First), None);
    }

    #[test]
    fn join_pairs_same_day_readings_taken_seconds_apart() {
        let sys = CategoryTable::from_points("sys", vec![point("2017-01-02 08:00:00 -0500", 120.0)]);
        let dia = CategoryTable::from_points("dia", vec![point("2017-01-02 08:00:01 -0500", 80.0)]);
        let joined = join(&sys, &dia);

        assert_eq!(
            joined.on(day(2)),
            &[PairedRow {
                time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                systolic: Some(120.0),
                diastolic: Some(80.0),
            }]
        );
        assert_eq!(
            joined.resolve(day(2), SameDayPolicy::First),
            Some((Some(120.0), Some(80.0)))
        );
    }

    #[test]
    fn join_pairs_in_arrival_order() {
        let sys = CategoryTable::from_points(
            "sys",
            vec![
                point("2017-01-04 08:00:00 -0500", 130.0),
                point("2017-01-04 20:00:00 -0500", 125.0),
                point("2017-01-04 22:00:00 -0500", 121.0),
            ],
        );
        let dia = CategoryTable::from_points(
            "dia",
            vec![
                point("2017-01-04 09:00:00 -0500", 85.0),
                point("2017-01-04 21:00:00 -0500", 83.0),
            ],
        );
        let values: Vec<_> = join(&sys, &dia)
            .on(day(4))
            .iter()
            .map(|row| (row.systolic, row.diastolic))
            .collect();
        assert_eq!(
            values,
            vec![
                (Some(130.0), Some(85.0)),
                (Some(125.0), Some(83.0)),
                (Some(121.0), None),
            ]
        );
    }

    #[test]
    fn join_keeps_one_sided_days_as_partial() {
        let sys = CategoryTable::from_points("sys", vec![point("2017-01-04 08:00:00 -0500", 130.0)]);
        let dia = CategoryTable::from_points("dia", vec![point("2017-01-05 09:00:00 -0500", 82.0)]);
        let joined = join(&sys, &dia);

        assert_eq!(
            joined.on(day(5)),
            &[PairedRow {
                time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                systolic: None,
                diastolic: Some(82.0),
            }]
        );
        assert_eq!(
            joined.resolve(day(4), SameDayPolicy::First),
            Some((Some(130.0), None))
        );
        assert_eq!(
            joined.resolve(day(5), SameDayPolicy::Mean),
            Some((None, Some(82.0)))
        );
    }

    #[test]
    fn join_drops_duplicate_pairs() {
        let sys = CategoryTable::from_points(
            "sys",
            vec![
                point("2017-01-02 08:00:00 -0500", 120.0),
                point("2017-01-02 08:00:00 -0500", 120.0),
                point("2017-01-02 20:00:00 -0500", 118.0),
            ],
        );
        let dia = CategoryTable::from_points(
            "dia",
            vec![
                point("2017-01-02 08:00:00 -0500", 80.0),
                point("2017-01-02 08:00:00 -0500", 80.0),
                point("2017-01-02 20:00:00 -0500", 79.0),
            ],
        );
        let joined = join(&sys, &dia);
        let values: Vec<_> = joined
            .on(day(2))
            .iter()
            .map(|row| (row.systolic, row.diastolic))
            .collect();
        assert_eq!(
            values,
            vec![(Some(120.0), Some(80.0)), (Some(118.0), Some(79.0))]
        );
    }
}
