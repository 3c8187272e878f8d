//! gridscan CLI: rank exchange-listed funds or shares by grid-trading suitability.
//!
//! Commands:
//! - `scan`: scan a whole market listing and export the ranked table
//! - `inspect`: run the pipeline on one code and print every metric or the rejection
//! - `profile`: print a built-in scan profile as TOML, as a starting point for `--config`

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use gridscan_core::data::{
    CsvDirProvider, HistoryProvider, ListingProvider, SinaProvider, SyntheticProvider,
};
use gridscan_core::domain::{AssetClass, Instrument};
use gridscan_runner::{
    init_logging, manifest_path_for, render_table, write_csv, write_manifest, LogConfig,
    LogFormat, Outcome, ScanManifest, ScanProfile, ScanWindow, Scanner, TracingObserver,
    CONSOLE_TOP_N,
};

#[derive(Parser)]
#[command(
    name = "gridscan",
    about = "Screen A-share funds and equities for grid-trading suitability"
)]
struct Cli {
    /// Log filter directive (overridden by RUST_LOG).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log format: pretty, compact or json.
    #[arg(long, global = true, default_value = "compact")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProfileArg {
    Etf,
    Equity,
}

impl From<ProfileArg> for AssetClass {
    fn from(p: ProfileArg) -> Self {
        match p {
            ProfileArg::Etf => AssetClass::Etf,
            ProfileArg::Equity => AssetClass::Equity,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProviderArg {
    /// Sina Finance over HTTP.
    Sina,
    /// CSV files under --data-dir.
    Csv,
    /// Deterministic generated data.
    Synthetic,
}

#[derive(clap::Args)]
struct SourceArgs {
    /// Built-in profile. Ignored when --config is given.
    #[arg(long, value_enum, default_value = "etf")]
    profile: ProfileArg,

    /// TOML profile file overriding the built-in defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Years of history required.
    #[arg(long)]
    years: Option<u32>,

    /// Last day of the window (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    end: Option<String>,

    /// Data source.
    #[arg(long, value_enum, default_value = "sina")]
    provider: ProviderArg,

    /// Directory for the csv provider.
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Listing size for the synthetic provider.
    #[arg(long, default_value_t = 60)]
    synthetic_count: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a market listing and export the ranked table.
    Scan {
        #[command(flatten)]
        source: SourceArgs,

        /// Scan at most this many listing entries.
        #[arg(long)]
        max_count: Option<usize>,

        /// Parallel workers (1 = sequential).
        #[arg(long)]
        workers: Option<usize>,

        /// Output CSV path. Defaults to the profile's file name.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Skip writing the JSON manifest beside the CSV.
        #[arg(long, default_value_t = false)]
        no_manifest: bool,
    },
    /// Evaluate a single code and print the result.
    Inspect {
        /// Listing code, e.g. 510300 or 600519.
        code: String,

        /// Display name, used only for the exclusion check.
        #[arg(long, default_value = "")]
        name: String,

        #[command(flatten)]
        source: SourceArgs,
    },
    /// Print a built-in profile as TOML.
    Profile {
        #[arg(long, value_enum, default_value = "etf")]
        profile: ProfileArg,
    },
}

/// Concrete provider selected on the command line.
enum Source {
    Sina(SinaProvider),
    Csv(CsvDirProvider),
    Synthetic(SyntheticProvider),
}

impl Source {
    fn listing(&self) -> &dyn ListingProvider {
        match self {
            Source::Sina(p) => p,
            Source::Csv(p) => p,
            Source::Synthetic(p) => p,
        }
    }

    fn history(&self) -> &dyn HistoryProvider {
        match self {
            Source::Sina(p) => p,
            Source::Csv(p) => p,
            Source::Synthetic(p) => p,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&LogConfig::new(cli.log_level.clone()).with_format(cli.log_format))
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    match cli.command {
        Commands::Scan {
            source,
            max_count,
            workers,
            output,
            no_manifest,
        } => run_scan(source, max_count, workers, output, no_manifest),
        Commands::Inspect { code, name, source } => run_inspect(&code, &name, source),
        Commands::Profile { profile } => {
            print!("{}", ScanProfile::for_class(profile.into()).to_toml()?);
            Ok(())
        }
    }
}

/// Defaults → TOML file → command-line flags.
fn resolve_profile(source: &SourceArgs) -> Result<ScanProfile> {
    let mut profile = match &source.config {
        Some(path) => ScanProfile::from_file(path)?,
        None => ScanProfile::for_class(source.profile.into()),
    };
    if let Some(years) = source.years {
        profile.min_years = years;
    }
    Ok(profile)
}

fn resolve_window(source: &SourceArgs, profile: &ScanProfile) -> Result<ScanWindow> {
    match source.end.as_deref() {
        Some(s) => {
            let end = NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .with_context(|| format!("invalid --end date '{s}'"))?;
            Ok(ScanWindow::ending(end, profile.min_years))
        }
        None => Ok(ScanWindow::trailing_years(profile.min_years)),
    }
}

fn build_source(source: &SourceArgs, profile: &ScanProfile) -> Result<Source> {
    Ok(match source.provider {
        ProviderArg::Sina => Source::Sina(SinaProvider::new(profile.network.clone())?),
        ProviderArg::Csv => {
            if !source.data_dir.is_dir() {
                bail!("data directory does not exist: {}", source.data_dir.display());
            }
            Source::Csv(CsvDirProvider::new(&source.data_dir))
        }
        ProviderArg::Synthetic => Source::Synthetic(SyntheticProvider::new(source.synthetic_count)),
    })
}

fn run_scan(
    source: SourceArgs,
    max_count: Option<usize>,
    workers: Option<usize>,
    output: Option<PathBuf>,
    no_manifest: bool,
) -> Result<()> {
    let mut profile = resolve_profile(&source)?;
    if let Some(max) = max_count {
        profile.max_instruments = Some(max);
    }
    if let Some(w) = workers {
        profile.workers = w;
    }
    profile.validate()?;

    let window = resolve_window(&source, &profile)?;
    let providers = build_source(&source, &profile)?;

    println!(
        "Scanning {} listing: window {} → {}, turnover ≥ {:.2} 亿, amplitude ≥ {:.2}%",
        profile.asset_class,
        window.start,
        window.end,
        profile.gates.min_avg_turnover / 1e8,
        profile.gates.min_amplitude_pct,
    );

    let report = Scanner::new(&profile, providers.listing(), providers.history())
        .run(window, &TracingObserver, None)
        .context("scan could not start")?;

    let c = &report.counts;
    println!(
        "Processed {}/{}: {} qualified, {} excluded, {} unroutable, {} fetch failures, {} insufficient, {} rejected ({:.1}s)",
        c.processed,
        report.total,
        c.qualified,
        c.excluded,
        c.unroutable,
        c.fetch_failed,
        c.insufficient,
        c.rejected,
        report.elapsed_secs,
    );

    if !report.has_survivors() {
        println!("Scan finished: no instrument passed every gate. Try relaxing the thresholds.");
        return Ok(());
    }

    println!("\nTop {} by grid score:", CONSOLE_TOP_N.min(report.records.len()));
    print!("{}", render_table(&report.records, CONSOLE_TOP_N));

    let csv_path = output.unwrap_or_else(|| PathBuf::from(&profile.output_file));
    write_csv(&csv_path, &report.records)?;
    println!("\nFull table saved to: {}", csv_path.display());

    if !no_manifest {
        let manifest_path = manifest_path_for(&csv_path);
        write_manifest(
            &manifest_path,
            &ScanManifest::new(&report, &profile, Some(&csv_path)),
        )?;
        println!("Manifest saved to: {}", manifest_path.display());
    }

    Ok(())
}

fn run_inspect(code: &str, name: &str, source: SourceArgs) -> Result<()> {
    let profile = resolve_profile(&source)?;
    profile.validate()?;
    let window = resolve_window(&source, &profile)?;
    let providers = build_source(&source, &profile)?;

    let instrument = Instrument::new(code, name);
    let report = Scanner::new(&profile, providers.listing(), providers.history())
        .inspect(&instrument, window);

    println!("Instrument:  {} {}", report.instrument.code, report.instrument.name);
    println!("Window:      {} → {}", report.window.start, report.window.end);
    if let Some(exclusion) = &report.exclusion {
        println!("Exclusion:   would be skipped in a full scan ({exclusion})");
    }
    if let Some(series) = &report.series {
        println!(
            "Series:      {} ({} raw rows, {} usable bars, need {})",
            series.symbol,
            series.raw_rows,
            series.bars,
            profile.min_bars()
        );
        if let (Some(first), Some(last)) = (series.first_date, series.last_date) {
            println!("Coverage:    {first} → {last}");
        }
    }

    match &report.outcome {
        Outcome::Qualified(r) => {
            println!("Result:      qualified");
            println!("  score        {:.2}", r.score);
            println!("  amplitude    {:.2}%", r.amplitude_pct);
            println!("  choppiness   {:.3}", r.choppiness);
            println!("  turnover     {}", r.turnover_display());
            println!("  ma_cv        {:.4}", r.ma_cv);
            println!("  trend slope  {:.4}%", r.trend_slope_pct);
        }
        other => println!("Result:      {other}"),
    }
    Ok(())
}
