//! One rank of a distributed stitch over a single frame container.
//!
//! Every rank opens the same (usually multi-page) container and stitches the
//! pairs its [`RankPartition`] assigns. Ranks share nothing but the input
//! file and the output naming pattern.
use super::partition::{RankPartition, WorkPartition};
use super::run::stitch_pair;
use crate::error::StitchError;
use crate::image::{FrameSequence, IndexPattern};
use log::{info, warn};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus};

#[derive(Clone, Debug)]
pub struct RankJob {
    /// Multi-page container, or a directory of frames.
    pub input: PathBuf,
    pub axis: i64,
    pub crop: usize,
    /// Output path per pair index, e.g. `out/sti-%04d.tif`.
    pub output: IndexPattern,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankReport {
    pub rank: usize,
    pub size: usize,
    pub pairs_total: usize,
    pub assigned: usize,
    pub written: usize,
    pub errors: Vec<String>,
}

/// Stitch the pairs of `job.input` owned by `partition`.
pub fn run_rank(job: &RankJob, partition: &RankPartition) -> Result<RankReport, StitchError> {
    let frames = if job.input.is_dir() {
        FrameSequence::open(&job.input)?
    } else {
        FrameSequence::from_file(&job.input)?
    };
    let pairs = frames.len() / 2;
    if frames.len() % 2 == 1 {
        warn!(
            "rank {}: odd number of frames ({}) in {}, the last one is not stitched",
            partition.rank,
            frames.len(),
            job.input.display()
        );
    }

    let results = partition.execute(pairs, |i| {
        let out = job.output.path(i);
        stitch_pair(&frames, pairs, i, job.axis, job.crop, &out)
            .map_err(|err| format!("{}: {err}", out.display()))
    });

    let mut report = RankReport {
        rank: partition.rank,
        size: partition.size,
        pairs_total: pairs,
        assigned: results.len(),
        ..RankReport::default()
    };
    for (_, result) in results {
        match result {
            Ok(()) => report.written += 1,
            Err(message) => {
                warn!("rank {}: {message}", partition.rank);
                report.errors.push(message);
            }
        }
    }
    info!(
        "rank {}/{}: wrote {} of {} assigned pairs",
        partition.rank, partition.size, report.written, report.assigned
    );
    Ok(report)
}

/// Start `size` rank processes, then wait for all of them.
///
/// `command` builds the process for one rank. If a rank cannot be started,
/// the ranks already running are still waited for before the error is
/// returned.
pub fn launch_ranks(
    size: usize,
    mut command: impl FnMut(RankPartition) -> Command,
) -> io::Result<Vec<ExitStatus>> {
    let mut children: Vec<Child> = Vec::with_capacity(size);
    let mut spawn_error = None;
    for rank in 0..size {
        let partition = RankPartition { rank, size };
        match command(partition).spawn() {
            Ok(child) => children.push(child),
            Err(err) => {
                spawn_error = Some(err);
                break;
            }
        }
    }
    let mut statuses = Vec::with_capacity(children.len());
    for mut child in children {
        statuses.push(child.wait()?);
    }
    match spawn_error {
        Some(err) => Err(err),
        None => Ok(statuses),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn every_rank_is_started_and_awaited() {
        let statuses = launch_ranks(3, |p| {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(format!("exit {}", p.rank));
            cmd
        })
        .unwrap();
        let codes: Vec<_> = statuses.iter().map(|s| s.code()).collect();
        assert_eq!(codes, vec![Some(0), Some(1), Some(2)]);
    }

    #[test]
    fn unstartable_rank_is_an_error() {
        let result = launch_ranks(2, |_| Command::new("halfacq-no-such-program"));
        assert!(result.is_err());
    }
}
