//! Batch stitching of whole acquisition trees.
//!
//! Planning walks the input tree once: CT-sets are discovered, every slice
//! of an outer-loop scan gets its axis and crop from the
//! [`AxisSpecification`](crate::axis::AxisSpecification), and each frame
//! directory (`tomo`, `flats`, `darks`, `flats2`) contributes `N / 2`
//! independent pair jobs. Execution hands the flat job list to a
//! [`WorkPartition`]: a thread pool inside one process, or one rank out of
//! several processes. Output names depend only on the job, so any subset of
//! jobs can run anywhere and an interrupted run can simply be repeated.
mod partition;
mod plan;
mod rank;
mod run;

pub use self::partition::{RankPartition, ThreadPoolPartition, WorkPartition};
pub use self::plan::{output_name, plan_stitch, PairJob, SeriesPlan, StitchPlan};
pub use self::rank::{launch_ranks, run_rank, RankJob, RankReport};
pub use self::run::{execute_plan, run_stitch, stitch_pair};

use crate::diagnostics::TimingBreakdown;
use serde::Serialize;

/// Result of one pair job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PairOutcome {
    Written,
    /// Left out on purpose, e.g. a gap in the file naming sequence.
    Skipped(String),
    Failed(String),
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StitchReport {
    pub ctsets: usize,
    pub ctsets_skipped: usize,
    pub series: usize,
    pub pairs_planned: usize,
    pub pairs_written: usize,
    pub pairs_skipped: usize,
    pub pairs_failed: usize,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub timing: TimingBreakdown,
}

impl StitchReport {
    pub fn from_plan(plan: &StitchPlan) -> Self {
        Self {
            ctsets: plan.ctsets,
            ctsets_skipped: plan.skipped_ctsets,
            series: plan.series.len(),
            pairs_planned: plan.jobs.len(),
            warnings: plan.warnings.clone(),
            ..Self::default()
        }
    }

    pub fn record(&mut self, outcomes: impl IntoIterator<Item = PairOutcome>) {
        for outcome in outcomes {
            match outcome {
                PairOutcome::Written => self.pairs_written += 1,
                PairOutcome::Skipped(msg) => {
                    self.pairs_skipped += 1;
                    self.warnings.push(msg);
                }
                PairOutcome::Failed(msg) => {
                    self.pairs_failed += 1;
                    self.errors.push(msg);
                }
            }
        }
    }
}
