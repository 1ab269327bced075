use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use halfacq::config::{load_config, SearchConfig, StitchConfig};
use halfacq::image::io::write_json_file;
use halfacq::image::IndexPattern;
use halfacq::orchestrator::{launch_ranks, run_rank, RankJob, RankPartition};
use halfacq::search::ExternalReconstructor;
use halfacq::{find_overlaps, run_stitch};
use log::{info, warn};
use std::path::PathBuf;
use std::process::Command;

/// Half-acquisition projection stitching and axis search
#[derive(Parser, Debug)]
#[command(name = "halfacq")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Stitch every CT-set under the configured input tree
    Stitch {
        /// JSON stitch configuration
        config: PathBuf,
    },
    /// Estimate the axis column of every CT-set under the configured input
    FindOverlap {
        /// JSON search configuration
        config: PathBuf,
    },
    /// Run one rank of a distributed stitch over a frame container
    StitchRank(RankArgs),
    /// Start SIZE local stitch-rank processes and wait for all of them
    LaunchRanks {
        /// Number of rank processes
        #[arg(long)]
        size: usize,
        #[command(flatten)]
        job: JobArgs,
    },
}

#[derive(Args, Debug, Clone)]
struct JobArgs {
    /// Multi-page TIFF container or directory of frames
    #[arg(long)]
    input: PathBuf,

    /// Axis column
    #[arg(long, allow_hyphen_values = true)]
    axis: i64,

    /// Columns removed from each end of every stitched frame
    #[arg(long, default_value = "0")]
    crop: usize,

    /// Output pattern with one %d or %0Nd field, e.g. out/sti-%04d.tif
    #[arg(long)]
    output: String,

    /// Write a JSON report per rank to this pattern (same field rules)
    #[arg(long)]
    report: Option<String>,
}

#[derive(Args, Debug)]
struct RankArgs {
    #[command(flatten)]
    job: JobArgs,

    /// Rank of this process; taken from the launcher environment if omitted
    #[arg(long, requires = "size")]
    rank: Option<usize>,

    /// Total number of ranks
    #[arg(long, requires = "rank")]
    size: Option<usize>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Stitch { config } => stitch(config),
        Commands::FindOverlap { config } => find_overlap(config),
        Commands::StitchRank(args) => stitch_rank(args),
        Commands::LaunchRanks { size, job } => launch(size, job),
    }
}

fn stitch(path: PathBuf) -> Result<()> {
    let config: StitchConfig = load_config(&path)?;
    let report = run_stitch(&config)
        .with_context(|| format!("stitching {}", config.input.display()))?;
    if report.pairs_failed > 0 {
        warn!("{} pairs failed", report.pairs_failed);
    }
    Ok(())
}

fn find_overlap(path: PathBuf) -> Result<()> {
    let config: SearchConfig = load_config(&path)?;
    let reconstructor = ExternalReconstructor::new(config.reconstructor.clone());
    let report = find_overlaps(&config, &reconstructor)
        .with_context(|| format!("searching overlaps in {}", config.input.display()))?;
    for est in &report.estimates {
        println!("{}\t{}", est.ctset.display(), est.axis);
    }
    Ok(())
}

fn stitch_rank(args: RankArgs) -> Result<()> {
    let partition = match (args.rank, args.size) {
        (Some(rank), Some(size)) => RankPartition::new(rank, size)
            .with_context(|| format!("rank {rank} is not below size {size}"))?,
        _ => RankPartition::from_env()
            .context("no --rank/--size given and no launcher environment found")?,
    };
    let job = RankJob {
        input: args.job.input.clone(),
        axis: args.job.axis,
        crop: args.job.crop,
        output: IndexPattern::parse(&args.job.output)?,
    };
    let report = run_rank(&job, &partition)
        .with_context(|| format!("rank {} of {}", partition.rank, partition.size))?;
    if let Some(pattern) = &args.job.report {
        let path = IndexPattern::parse(pattern)?.path(partition.rank);
        write_json_file(&path, &report)?;
    }
    if !report.errors.is_empty() {
        bail!(
            "rank {}: {} of {} pairs failed",
            partition.rank,
            report.errors.len(),
            report.assigned
        );
    }
    Ok(())
}

fn launch(size: usize, job: JobArgs) -> Result<()> {
    if size == 0 {
        bail!("--size must be at least 1");
    }
    IndexPattern::parse(&job.output)?;
    let exe = std::env::current_exe().context("locating the halfacq executable")?;
    info!("launching {size} ranks of {}", exe.display());
    let statuses = launch_ranks(size, |p| {
        let mut cmd = Command::new(&exe);
        cmd.arg("stitch-rank")
            .arg("--input")
            .arg(&job.input)
            .arg("--axis")
            .arg(job.axis.to_string())
            .arg("--crop")
            .arg(job.crop.to_string())
            .arg("--output")
            .arg(&job.output)
            .arg("--rank")
            .arg(p.rank.to_string())
            .arg("--size")
            .arg(p.size.to_string());
        if let Some(report) = &job.report {
            cmd.arg("--report").arg(report);
        }
        cmd
    })
    .context("starting rank processes")?;
    let failed: Vec<usize> = statuses
        .iter()
        .enumerate()
        .filter(|(_, s)| !s.success())
        .map(|(rank, _)| rank)
        .collect();
    if !failed.is_empty() {
        bail!("ranks {failed:?} did not finish cleanly");
    }
    info!("all {size} ranks finished");
    Ok(())
}
