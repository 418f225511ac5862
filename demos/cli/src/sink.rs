//! Output sinks: CSV lines and per-metric chart series.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use log::info;
use serde::Serialize;
use vitals_core::{BloodPressureSeries, CsvLayout, CsvRow, DateRange, HeartRateSeries};

/// Receives rows one at a time.
pub trait TabularSink {
    fn emit(&mut self, row: &CsvRow) -> io::Result<()>;
}

pub struct CsvSink<W: Write> {
    writer: W,
    layout: CsvLayout,
    written: usize,
}

impl<W: Write> CsvSink<W> {
    pub fn new(writer: W, layout: CsvLayout) -> Self {
        Self {
            writer,
            layout,
            written: 0,
        }
    }

    pub fn written(&self) -> usize {
        self.written
    }

    /// Flush and hand the writer back.
    pub fn finish(mut self) -> io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> TabularSink for CsvSink<W> {
    fn emit(&mut self, row: &CsvRow) -> io::Result<()> {
        writeln!(self.writer, "{}", row.render(self.layout))?;
        self.written += 1;
        Ok(())
    }
}

/// Receives complete, ordered series and produces one artifact per metric.
pub trait PlotSink {
    type Artifact;

    fn heart_rate(&mut self, series: &HeartRateSeries) -> anyhow::Result<Self::Artifact>;
    fn blood_pressure(&mut self, series: &BloodPressureSeries) -> anyhow::Result<Self::Artifact>;
}

/// `<metric>_<start>to<end>.<extension>`
pub fn artifact_name(metric: &str, range: &DateRange, extension: &str) -> String {
    format!("{metric}_{}.{extension}", range.label())
}

/// Writes each series as JSON for an external renderer.
pub struct JsonSeriesSink {
    dir: PathBuf,
}

impl JsonSeriesSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn write<T: Serialize>(
        &self,
        metric: &str,
        range: &DateRange,
        series: &T,
    ) -> anyhow::Result<PathBuf> {
        let path = self.dir.join(artifact_name(metric, range, "json"));
        write_json(&path, series)?;
        info!("wrote {}", path.display());
        Ok(path)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("could not create {path:?}"))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("could not serialize {path:?}"))?;
    writer.flush()?;
    Ok(())
}

impl PlotSink for JsonSeriesSink {
    type Artifact = PathBuf;

    fn heart_rate(&mut self, series: &HeartRateSeries) -> anyhow::Result<PathBuf> {
        self.write(&series.metric, &series.range, series)
    }

    fn blood_pressure(&mut self, series: &BloodPressureSeries) -> anyhow::Result<PathBuf> {
        self.write(&series.metric, &series.range, series)
    }
}
