//! Category filter and field decoding for export records.

use log::{debug, trace, warn};
use serde::Serialize;
use vitals_core::{CategoryRule, DropLogging, ExtractedPoint, Reading, Record, Stamp};

/// Why a matched record produced no point.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("record has no `{0}` attribute")]
    MissingAttribute(&'static str),
    #[error("startDate {0:?} is not an export timestamp")]
    InvalidTimestamp(String),
    #[error("no aggregate bucket and `value` {value:?} is not numeric")]
    BothShapesFail { value: String },
}

/// Why the aggregate shape did not apply. Never surfaced: the decoder moves
/// on to the single-reading shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AggregateMiss {
    Absent(&'static str),
    Unparsable(&'static str),
}

const AGGREGATE_FIELDS: [&str; 4] = ["min", "max", "average", "recordCount"];

/// Per-category accounting of matched and dropped records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DropReport {
    pub category: String,
    pub matched: usize,
    pub kept: usize,
    pub fallback: usize,
    pub missing_attribute: usize,
    pub invalid_timestamp: usize,
    pub unparsable: usize,
}

impl DropReport {
    fn new(category: &str) -> Self {
        Self {
            category: category.to_string(),
            ..Self::default()
        }
    }

    pub fn dropped(&self) -> usize {
        self.missing_attribute + self.invalid_timestamp + self.unparsable
    }

    fn count(&mut self, err: &DecodeError) {
        match err {
            DecodeError::MissingAttribute(_) => self.missing_attribute += 1,
            DecodeError::InvalidTimestamp(_) => self.invalid_timestamp += 1,
            DecodeError::BothShapesFail { .. } => self.unparsable += 1,
        }
    }
}

/// Points of one category, in document order, plus what was lost on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub points: Vec<ExtractedPoint>,
    pub report: DropReport,
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn decode_aggregated(record: &Record) -> Result<Reading, AggregateMiss> {
    let mut parsed = [0.0; 4];
    for (slot, name) in parsed.iter_mut().zip(AGGREGATE_FIELDS) {
        let raw = record.attribute(name).ok_or(AggregateMiss::Absent(name))?;
        *slot = parse_number(raw).ok_or(AggregateMiss::Unparsable(name))?;
    }
    let [min, max, average, count] = parsed;
    Ok(Reading::Aggregated {
        min,
        max,
        average,
        count,
    })
}

/// Aggregate bucket first, then the single `value`. Values are unscaled.
pub fn decode_reading(record: &Record) -> Result<Reading, DecodeError> {
    match decode_aggregated(record) {
        Ok(reading) => return Ok(reading),
        Err(AggregateMiss::Absent(field)) => trace!("no aggregate `{field}`, trying `value`"),
        Err(AggregateMiss::Unparsable(field)) => {
            trace!("aggregate `{field}` is not numeric, trying `value`")
        }
    }

    let raw = record
        .attribute("value")
        .ok_or(DecodeError::MissingAttribute("value"))?;
    parse_number(raw)
        .map(|value| Reading::Single { value })
        .ok_or_else(|| DecodeError::BothShapesFail {
            value: raw.to_string(),
        })
}

/// Decode one record that already matched its category.
pub fn decode_point(record: &Record, scale: f64) -> Result<ExtractedPoint, DecodeError> {
    let raw = record
        .attribute("startDate")
        .ok_or(DecodeError::MissingAttribute("startDate"))?;
    let stamp = Stamp::parse(raw).map_err(|_| DecodeError::InvalidTimestamp(raw.to_string()))?;
    let reading = decode_reading(record)?.scaled(scale);
    Ok(ExtractedPoint::new(stamp, reading))
}

/// Keep records whose `type` equals `rule.identifier` exactly and decode them.
pub fn extract(records: &[Record], rule: &CategoryRule, logging: DropLogging) -> Extraction {
    let mut report = DropReport::new(&rule.identifier);
    let mut points = Vec::new();

    for record in records.iter().filter(|r| r.is_category(&rule.identifier)) {
        report.matched += 1;
        match decode_point(record, rule.scale) {
            Ok(point) => {
                if point.reading.is_fallback() {
                    report.fallback += 1;
                }
                points.push(point);
            }
            Err(err) => {
                report.count(&err);
                match (&err, logging) {
                    (DecodeError::MissingAttribute(_), _) | (_, DropLogging::Quiet) => {
                        debug!("dropping {} record: {err}", rule.metric)
                    }
                    (_, DropLogging::Warn) => warn!("dropping {} record: {err}", rule.metric),
                }
            }
        }
    }

    report.kept = points.len();
    debug!(
        "{}: {} matched, {} kept, {} dropped",
        rule.identifier,
        report.matched,
        report.kept,
        report.dropped()
    );
    Extraction { points, report }
}
