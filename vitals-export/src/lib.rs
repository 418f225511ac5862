//! Health export XML to daily heart-rate and blood-pressure series.

pub mod extract;
pub mod source;

use log::debug;
use vitals_core::{
    assemble_daily, assemble_pressure, bucket_by_week, join, long_form, BloodPressureSeries,
    CategoryTable, CsvRow, HeartRateSeries, PipelineConfig, Record, VitalsError,
    BLOOD_PRESSURE_DIASTOLIC, BLOOD_PRESSURE_METRIC, BLOOD_PRESSURE_SYSTOLIC, HEART_RATE,
};

pub use extract::{decode_point, decode_reading, extract, DecodeError, DropReport, Extraction};
pub use source::{parse_records_reader, parse_records_str, read_records};

#[derive(Debug, Clone, PartialEq)]
pub struct HeartRateReport {
    pub series: HeartRateSeries,
    pub drops: DropReport,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BloodPressureReport {
    pub series: BloodPressureSeries,
    pub drops: Vec<DropReport>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CsvExtraction {
    pub rows: Vec<CsvRow>,
    pub drops: DropReport,
}

/// One CSV row per matched record of `category`, in document order. The
/// configured date range does not apply here.
pub fn csv_rows(
    records: &[Record],
    category: &str,
    config: &PipelineConfig,
) -> Result<CsvExtraction, VitalsError> {
    let rule = config.rule(category)?;
    let extraction = extract(records, rule, config.drop_logging);
    let rows = extraction.points.iter().map(CsvRow::from_point).collect();
    Ok(CsvExtraction {
        rows,
        drops: extraction.report,
    })
}

/// Daily heart rate over the configured range, with ISO week buckets.
pub fn heart_rate_report(
    records: &[Record],
    config: &PipelineConfig,
) -> Result<HeartRateReport, VitalsError> {
    let rule = config.rule(HEART_RATE)?;
    let extraction = extract(records, rule, config.drop_logging);
    let table = CategoryTable::from_points(&rule.identifier, extraction.points);

    let daily = assemble_daily(&config.range, &table, config.same_day);
    let weeks = bucket_by_week(&config.range, &daily);
    debug!(
        "heart rate: {} table rows, {} days with data in {}",
        table.len(),
        daily.len(),
        config.range.label()
    );

    Ok(HeartRateReport {
        series: HeartRateSeries {
            metric: rule.metric.clone(),
            range: config.range,
            daily,
            weeks,
        },
        drops: extraction.report,
    })
}

/// Daily systolic/diastolic pairs over the configured range.
pub fn blood_pressure_report(
    records: &[Record],
    config: &PipelineConfig,
) -> Result<BloodPressureReport, VitalsError> {
    let systolic_rule = config.rule(BLOOD_PRESSURE_SYSTOLIC)?;
    let diastolic_rule = config.rule(BLOOD_PRESSURE_DIASTOLIC)?;

    let systolic = extract(records, systolic_rule, config.drop_logging);
    let diastolic = extract(records, diastolic_rule, config.drop_logging);

    let paired = join(
        &CategoryTable::from_points(&systolic_rule.identifier, systolic.points),
        &CategoryTable::from_points(&diastolic_rule.identifier, diastolic.points),
    );
    let daily = assemble_pressure(&config.range, &paired, config.same_day);
    debug!(
        "blood pressure: {} joined rows, {} days with data in {}",
        paired.len(),
        daily.len(),
        config.range.label()
    );

    Ok(BloodPressureReport {
        series: BloodPressureSeries {
            metric: BLOOD_PRESSURE_METRIC.to_string(),
            range: config.range,
            points: long_form(&daily),
            daily,
        },
        drops: vec![systolic.report, diastolic.report],
    })
}
