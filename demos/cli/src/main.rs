use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};
use vitals_core::{CsvLayout, CsvRow, PipelineConfig, SameDayPolicy, HEART_RATE};
use vitals_export::{blood_pressure_report, csv_rows, heart_rate_report, read_records, DropReport};

mod config;
mod sink;

use config::{override_range, FileConfig};
use sink::{CsvSink, JsonSeriesSink, PlotSink, TabularSink};

#[derive(Parser, Debug)]
#[command(
    name = "vitals-cli",
    about = "Extract heart rate and blood pressure from a health export."
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print one CSV line per matched record.
    Csv(CsvOptions),
    /// Write daily heart-rate and blood-pressure series for a date range.
    Plot(PlotOptions),
}

#[derive(clap::Args, Debug)]
struct CsvOptions {
    /// Path to the export XML.
    #[arg(short, long)]
    input: Option<PathBuf>,
    /// JSON run configuration.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Record type to extract.
    #[arg(long, default_value = HEART_RATE)]
    category: String,
    #[arg(long, value_enum)]
    layout: Option<LayoutArg>,
    /// Write to a file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct PlotOptions {
    /// Path to the export XML.
    #[arg(short, long)]
    input: Option<PathBuf>,
    /// JSON run configuration.
    #[arg(long)]
    config: Option<PathBuf>,
    /// First day, YYYY-MM-DD.
    #[arg(long)]
    start: Option<String>,
    /// Last day, YYYY-MM-DD (inclusive).
    #[arg(long)]
    end: Option<String>,
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
    #[arg(long, value_enum)]
    same_day: Option<SameDayArg>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LayoutArg {
    Full,
    Compact,
}

impl From<LayoutArg> for CsvLayout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Full => CsvLayout::Full,
            LayoutArg::Compact => CsvLayout::Compact,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SameDayArg {
    First,
    Last,
    Mean,
}

impl From<SameDayArg> for SameDayPolicy {
    fn from(arg: SameDayArg) -> Self {
        match arg {
            SameDayArg::First => SameDayPolicy::First,
            SameDayArg::Last => SameDayPolicy::Last,
            SameDayArg::Mean => SameDayPolicy::Mean,
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match args.command {
        Command::Csv(opts) => run_csv(opts),
        Command::Plot(opts) => run_plot(opts),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    let file = match path {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    Ok(file.into_config()?)
}

fn run_csv(opts: CsvOptions) -> anyhow::Result<()> {
    let mut config = load_config(opts.config.as_deref())?;
    if let Some(input) = opts.input {
        config.source_path = input;
    }
    if let Some(layout) = opts.layout {
        config.csv_layout = layout.into();
    }

    let records = read_records(&config.source_path)
        .with_context(|| format!("could not read export {:?}", config.source_path))?;
    let extraction = csv_rows(&records, &opts.category, &config)?;

    let written = match &opts.output {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("could not create {path:?}"))?;
            let sink = CsvSink::new(BufWriter::new(file), config.csv_layout);
            let count = emit_rows(sink, &extraction.rows)?;
            info!("wrote {count} rows to {}", path.display());
            count
        }
        None => {
            let sink = CsvSink::new(io::stdout().lock(), config.csv_layout);
            emit_rows(sink, &extraction.rows)?
        }
    };

    log_drops(&extraction.drops);
    info!("{written} rows for {}", opts.category);
    Ok(())
}

fn emit_rows<W: io::Write>(mut sink: CsvSink<W>, rows: &[CsvRow]) -> io::Result<usize> {
    for row in rows {
        sink.emit(row)?;
    }
    let written = sink.written();
    sink.finish()?;
    Ok(written)
}

fn run_plot(opts: PlotOptions) -> anyhow::Result<()> {
    let mut config = load_config(opts.config.as_deref())?;
    if let Some(input) = opts.input {
        config.source_path = input;
    }
    if let Some(dir) = opts.output_dir {
        config.output_dir = dir;
    }
    if let Some(policy) = opts.same_day {
        config.same_day = policy.into();
    }
    config.range = override_range(config.range, opts.start.as_deref(), opts.end.as_deref())?;

    std::fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("could not create {:?}", config.output_dir))?;
    let records = read_records(&config.source_path)
        .with_context(|| format!("could not read export {:?}", config.source_path))?;

    let mut sink = JsonSeriesSink::new(&config.output_dir);

    let heart = heart_rate_report(&records, &config)?;
    for week in &heart.series.weeks {
        match week.max {
            Some(max) => info!(
                "{}-W{:02} (from {}): max {max:.0} bpm over {} days",
                week.key.iso_year,
                week.key.week,
                week.anchor,
                week.count()
            ),
            None => info!(
                "{}-W{:02} (from {}): no data",
                week.key.iso_year, week.key.week, week.anchor
            ),
        }
    }
    let heart_path = sink.heart_rate(&heart.series)?;
    log_drops(&heart.drops);

    let pressure = blood_pressure_report(&records, &config)?;
    let pressure_path = sink.blood_pressure(&pressure.series)?;
    for drops in &pressure.drops {
        log_drops(drops);
    }

    println!(
        "Range: {}\nHeart rate: {} days -> {}\nBlood pressure: {} days -> {}",
        config.range.label(),
        heart.series.daily.len(),
        heart_path.display(),
        pressure.series.daily.len(),
        pressure_path.display()
    );
    Ok(())
}

fn log_drops(report: &DropReport) {
    if report.dropped() == 0 {
        info!(
            "{}: {} records, {} single readings",
            report.category, report.kept, report.fallback
        );
        return;
    }
    warn!(
        "{}: kept {} of {} records ({} missing attributes, {} bad timestamps, {} unparsable)",
        report.category,
        report.kept,
        report.matched,
        report.missing_attribute,
        report.invalid_timestamp,
        report.unparsable
    );
}
