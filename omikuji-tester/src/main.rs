mod logic;

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::time::Instant;

use logic::{
    AcceptanceReport, demo_coordinator, reports, resolve_seed_inputs, run_acceptance,
    validate_acceptance,
};

#[derive(Debug, Parser)]
#[command(name = "omikuji-tester", version = "0.1.0")]
#[command(about = "Statistical acceptance and reproducibility checks for the omikuji engine")]
struct Args {
    /// Seeds to replay (comma-separated, numeric or text)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Unseeded readings per rank
    #[arg(long, default_value_t = 500)]
    iterations: usize,

    /// Fortune ranks to sweep (comma-separated values or `a..=b` ranges)
    #[arg(long, default_value = "-2..=4", allow_hyphen_values = true)]
    ranks: String,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console"])]
    report: String,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    announce_banner();

    let start_time = Instant::now();
    let ranks = parse_ranks(&args.ranks)?;
    let seeds = resolve_seed_inputs(&split_csv(&args.seeds))?;
    let coordinator = demo_coordinator()?;

    if args.verbose {
        println!(
            "Sweeping ranks {ranks:?} with {} readings each; seeds: {}",
            args.iterations,
            seeds
                .iter()
                .map(|s| s.token.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    let report = run_acceptance(&coordinator, &ranks, args.iterations, &seeds).await?;
    write_reports(&args, &report, start_time)?;
    validate_acceptance(&report)?;

    Ok(())
}

fn announce_banner() {
    println!("{}", "🎋 Omikuji Acceptance Tester".bright_cyan().bold());
    println!("{}", "============================".cyan());
}

fn split_csv(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Parse `-2,0,3` or `-2..=4` (or a mix) into a sorted, deduplicated rank list.
fn parse_ranks(input: &str) -> Result<Vec<i32>> {
    let mut ranks = Vec::new();
    for token in split_csv(input) {
        if let Some((low, high)) = token.split_once("..=") {
            let low: i32 = low
                .trim()
                .parse()
                .with_context(|| format!("invalid range start in {token}"))?;
            let high: i32 = high
                .trim()
                .parse()
                .with_context(|| format!("invalid range end in {token}"))?;
            if low > high {
                bail!("Empty rank range: {token}");
            }
            ranks.extend(low..=high);
        } else {
            ranks.push(
                token
                    .parse()
                    .with_context(|| format!("invalid rank {token}"))?,
            );
        }
    }
    ranks.sort_unstable();
    ranks.dedup();
    if ranks.is_empty() {
        bail!("No fortune ranks given");
    }
    Ok(ranks)
}

fn write_reports(args: &Args, report: &AcceptanceReport, start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report.as_str() {
        "json" => reports::generate_json_report(&mut output_target, report)?,
        "markdown" => reports::generate_markdown_report(&mut output_target, report)?,
        _ => reports::generate_console_report(&mut output_target, report, start_time.elapsed())?,
    }

    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
