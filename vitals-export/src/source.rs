//! Reads `Record` elements out of a health export XML document.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::debug;
use serde::Deserialize;
use vitals_core::{Record, VitalsError};

/// Root element of the export. Every other child (`Me`, `Workout`,
/// `ActivitySummary`, ...) is ignored.
#[derive(Debug, Deserialize)]
struct HealthData {
    #[serde(rename = "Record", default)]
    records: Vec<ExportRecord>,
    #[serde(rename = "Correlation", default)]
    correlations: Vec<Correlation>,
}

/// Groups readings taken together, e.g. a blood-pressure pair.
#[derive(Debug, Deserialize)]
struct Correlation {
    #[serde(rename = "Record", default)]
    records: Vec<ExportRecord>,
}

impl HealthData {
    /// Top-level records first, then those nested in correlations, each group
    /// in document order.
    fn into_records(self) -> Vec<Record> {
        let nested = self
            .correlations
            .into_iter()
            .flat_map(|correlation| correlation.records);
        self.records.into_iter().chain(nested).map(Record::from).collect()
    }
}

#[derive(Debug, Deserialize)]
struct ExportRecord {
    #[serde(rename = "@type", default)]
    record_type: Option<String>,
    #[serde(rename = "@startDate", default)]
    start_date: Option<String>,
    #[serde(rename = "@value", default)]
    value: Option<String>,
    #[serde(rename = "@min", default)]
    min: Option<String>,
    #[serde(rename = "@max", default)]
    max: Option<String>,
    #[serde(rename = "@average", default)]
    average: Option<String>,
    #[serde(rename = "@recordCount", default)]
    record_count: Option<String>,
}

impl From<ExportRecord> for Record {
    fn from(raw: ExportRecord) -> Self {
        Self {
            record_type: raw.record_type,
            start_date: raw.start_date,
            value: raw.value,
            min: raw.min,
            max: raw.max,
            average: raw.average,
            record_count: raw.record_count,
        }
    }
}

/// Read every record from the export at `path`. The file is closed before
/// returning, whether or not the document parsed.
pub fn read_records(path: &Path) -> Result<Vec<Record>, VitalsError> {
    let records = {
        let file = File::open(path)?;
        parse_records_reader(BufReader::new(file))?
    };
    debug!("read {} records from {}", records.len(), path.display());
    Ok(records)
}

pub fn parse_records_reader<R: BufRead>(reader: R) -> Result<Vec<Record>, VitalsError> {
    let document: HealthData = quick_xml::de::from_reader(reader)
        .map_err(|err| VitalsError::Parse(format!("malformed export document: {err}")))?;
    Ok(document.into_records())
}

pub fn parse_records_str(xml: &str) -> Result<Vec<Record>, VitalsError> {
    let document: HealthData = quick_xml::de::from_str(xml)
        .map_err(|err| VitalsError::Parse(format!("malformed export document: {err}")))?;
    Ok(document.into_records())
}
