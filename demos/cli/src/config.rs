//! Optional JSON run configuration, merged over the defaults.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use vitals_core::{
    CategoryRule, CsvLayout, DateRange, DropLogging, PipelineConfig, SameDayPolicy, VitalsError,
};

/// Every field is optional; missing ones keep their default.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    source_path: Option<PathBuf>,
    #[serde(default)]
    output_dir: Option<PathBuf>,
    #[serde(default)]
    start: Option<String>,
    #[serde(default)]
    end: Option<String>,
    #[serde(default)]
    categories: Option<Vec<CategoryRule>>,
    #[serde(default)]
    csv_layout: Option<CsvLayout>,
    #[serde(default)]
    same_day: Option<SameDayPolicy>,
    #[serde(default)]
    drop_logging: Option<DropLogging>,
}

impl FileConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("could not read config {path:?}"))?;
        serde_json::from_str(&data).with_context(|| format!("invalid config {path:?}"))
    }

    pub fn into_config(self) -> Result<PipelineConfig, VitalsError> {
        let mut base = PipelineConfig::default();
        if let Some(path) = self.source_path {
            base.source_path = path;
        }
        if let Some(dir) = self.output_dir {
            base.output_dir = dir;
        }
        base.range = override_range(base.range, self.start.as_deref(), self.end.as_deref())?;
        if let Some(categories) = self.categories {
            base.categories = categories;
        }
        if let Some(layout) = self.csv_layout {
            base.csv_layout = layout;
        }
        if let Some(policy) = self.same_day {
            base.same_day = policy;
        }
        if let Some(logging) = self.drop_logging {
            base.drop_logging = logging;
        }
        Ok(base)
    }
}

/// Replace either end of `range`, re-validating the result.
pub fn override_range(
    range: DateRange,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<DateRange, VitalsError> {
    let start = match start {
        Some(raw) => vitals_core::parse_date(raw)?,
        None => range.start,
    };
    let end = match end {
        Some(raw) => vitals_core::parse_date(raw)?,
        None => range.end,
    };
    DateRange::new(start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_keeps_defaults() {
        let config: FileConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.into_config().unwrap(), PipelineConfig::default());
    }

    #[test]
    fn partial_file_overrides_named_fields() {
        let json = r#"{
            "start": "2017-01-01",
            "end": "2017-01-31",
            "same_day": "mean",
            "csv_layout": "compact",
            "categories": [
                {"identifier": "HKQuantityTypeIdentifierHeartRate", "metric": "heartrate", "scale": 1.0}
            ]
        }"#;
        let config: FileConfig = serde_json::from_str(json).unwrap();
        let config = config.into_config().unwrap();

        assert_eq!(config.range, DateRange::parse("2017-01-01", "2017-01-31").unwrap());
        assert_eq!(config.same_day, SameDayPolicy::Mean);
        assert_eq!(config.csv_layout, CsvLayout::Compact);
        assert_eq!(config.categories.len(), 1);
        assert_eq!(config.drop_logging, DropLogging::Warn);
    }

    #[test]
    fn inverted_override_is_rejected() {
        let range = PipelineConfig::default().range;
        assert!(override_range(range, Some("2018-01-01"), None).is_err());
        assert_eq!(
            override_range(range, None, Some("2017-02-01")).unwrap().end,
            vitals_core::parse_date("2017-02-01").unwrap()
        );
    }

    #[test]
    fn load_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"output_dir": "charts", "drop_logging": "quiet"}}"#).unwrap();

        let config = FileConfig::load(file.path()).unwrap().into_config().unwrap();
        assert_eq!(config.output_dir, PathBuf::from("charts"));
        assert_eq!(config.drop_logging, DropLogging::Quiet);
        assert!(FileConfig::load(Path::new("/no/such/config.json")).is_err());
    }
}
