//! edf-parity CLI tool
//!
//! Command-line interface for comparing EDF recordings

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edf_parity::differential::{compare_pair, CancelToken, PairJob};
use edf_parity::parallel_differential::{run_batch, BatchStatus};
use edf_parity::recording::EdfHeaderReader;
use edf_parity::sink::{summary_table_header, summary_table_row};
use edf_parity::synth::{write_recording, SynthSpec};
use edf_parity::BatchConfig;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "edf-parity")]
#[command(about = "Sample-level parity checking for EDF recordings")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare two recordings
    Compare {
        a: PathBuf,
        b: PathBuf,
        #[command(flatten)]
        options: CompareOptions,
    },
    /// Compare every pair of recordings in a directory
    Batch {
        dir: PathBuf,
        #[command(flatten)]
        options: CompareOptions,
        /// Abort unfinished pairs after this many seconds
        #[arg(long)]
        timeout_secs: Option<f64>,
        /// Skip summary.csv, matrix.csv and report.json
        #[arg(long)]
        no_reports: bool,
    },
    /// Write a synthetic recording
    Synth {
        path: PathBuf,
        /// Samples per record for each channel, comma separated
        #[arg(long, value_delimiter = ',', default_value = "256,256,256,256")]
        layout: Vec<u32>,
        #[arg(long, default_value_t = 60)]
        records: u64,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Add DELTA to the sample at flat index INDEX, given as INDEX:DELTA
        #[arg(long, value_parser = parse_perturbation)]
        perturb: Vec<(u64, i16)>,
    },
}

#[derive(Args)]
struct CompareOptions {
    /// Differences at or below this raw value are matches
    #[arg(long)]
    threshold: Option<u16>,
    /// Window budget in MB
    #[arg(long)]
    chunk_mb: Option<usize>,
    /// Write per-pair mismatch CSVs
    #[arg(long)]
    csv: bool,
    /// Write per-pair binned scatter CSVs
    #[arg(long)]
    bins: bool,
    #[arg(long)]
    target_bins: Option<usize>,
    #[arg(long, env = "EDF_PARITY_WORKERS")]
    workers: Option<usize>,
    /// Output directory for artifacts
    #[arg(long, env = "EDF_PARITY_OUT")]
    out: Option<PathBuf>,
    /// JSON configuration file; flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,
}

impl CompareOptions {
    fn into_config(self) -> Result<BatchConfig> {
        let mut config = match &self.config {
            Some(path) => BatchConfig::from_json_file(path)?,
            None => BatchConfig::default(),
        };

        if let Some(threshold) = self.threshold {
            config.compare.error_threshold = threshold;
        }
        if let Some(mb) = self.chunk_mb {
            config.compare.chunk_budget_bytes = mb * 1024 * 1024;
        }
        if self.csv {
            config.compare.emit_mismatch_stream = true;
        }
        if self.bins {
            config.compare.enable_visualization_binning = true;
        }
        if let Some(bins) = self.target_bins {
            config.compare.target_bin_count = bins;
        }
        if let Some(workers) = self.workers {
            config.num_workers = workers;
        }
        if let Some(out) = self.out {
            config.output_dir = out;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_perturbation(s: &str) -> Result<(u64, i16), String> {
    let (index, delta) = s
        .split_once(':')
        .ok_or_else(|| format!("expected INDEX:DELTA, got '{}'", s))?;
    let index = index.parse().map_err(|e| format!("bad index '{}': {}", index, e))?;
    let delta = delta.parse().map_err(|e| format!("bad delta '{}': {}", delta, e))?;
    Ok((index, delta))
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Compare { a, b, options } => {
            let config = options.into_config()?;
            let outcome = compare_pair(
                &PairJob::new(&a, &b),
                &EdfHeaderReader::new(),
                &config.compare,
                Some(config.output_dir.as_path()),
                &CancelToken::new(),
            );

            println!("{}", summary_table_header());
            println!("{}", "-".repeat(95));
            println!("{}", summary_table_row(&outcome));
            if let Some(path) = &outcome.mismatch_csv {
                println!("\nMismatches written to {}", path.display());
            }

            Ok(BatchStatus::from_outcomes(std::slice::from_ref(&outcome)).exit_code())
        }
        Commands::Batch {
            dir,
            options,
            timeout_secs,
            no_reports,
        } => {
            let mut config = options.into_config()?;
            if let Some(secs) = timeout_secs {
                config.timeout = Some(
                    Duration::try_from_secs_f64(secs)
                        .with_context(|| format!("Invalid timeout: {}", secs))?,
                );
            }
            if no_reports {
                config.write_reports = false;
            }

            println!("Comparing recordings in {}", dir.display());
            println!("   Workers: {}", config.num_workers);
            println!("   Threshold: {}", config.compare.error_threshold);

            let report = run_batch(&dir, &config)?;
            println!();
            report.print_table();
            println!(
                "\n{} of {} pairs compared in {:.1}s",
                report.valid_pairs(),
                report.outcomes.len(),
                report.duration_secs
            );
            match report.status {
                BatchStatus::AllMatched => println!("All pairs matched"),
                BatchStatus::Divergent => println!("Differences found"),
                BatchStatus::NoValidPairs => eprintln!("No valid pairs were compared"),
            }
            if config.write_reports {
                println!("Reports written to {}", config.output_dir.display());
            }

            Ok(report.status.exit_code())
        }
        Commands::Synth {
            path,
            layout,
            records,
            seed,
            perturb,
        } => {
            let spec = SynthSpec {
                samples_per_record: layout,
                num_records: records,
                seed,
                perturbations: perturb,
                ..SynthSpec::default()
            };
            write_recording(&path, &spec)?;
            println!(
                "Wrote {} ({} channels, {} samples)",
                path.display(),
                spec.samples_per_record.len(),
                spec.total_samples()
            );
            Ok(0)
        }
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    edf_parity::init_tracing("warn")?;

    let code = run(cli)?;
    std::process::exit(code);
}
