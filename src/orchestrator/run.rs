use super::partition::{ThreadPoolPartition, WorkPartition};
use super::plan::{plan_stitch, PairJob, SeriesPlan, StitchPlan};
use super::{PairOutcome, StitchReport};
use crate::axis::AxisSpecification;
use crate::config::StitchConfig;
use crate::diagnostics::elapsed_ms;
use crate::error::StitchError;
use crate::image::io::{write_frame, write_json_file};
use crate::image::FrameSequence;
use crate::stitch::stitch;
use log::{debug, info, warn};
use std::path::Path;
use std::time::Instant;

/// Read pair `index` of a sequence, mirror the second frame, blend and write.
pub fn stitch_pair(
    frames: &FrameSequence,
    pairs: usize,
    index: usize,
    axis: i64,
    crop: usize,
    out: &Path,
) -> Result<(), StitchError> {
    let first = frames.read(index)?;
    let second = frames.read(index + pairs)?;
    if first.format != second.format {
        return Err(StitchError::FormatMismatch {
            first: index,
            second: index + pairs,
        });
    }
    let blended = stitch(
        &first.image,
        &second.image.mirrored(),
        axis as f64,
        crop,
        first.format.valid_range(),
    )?;
    write_frame(out, &blended, first.format)?;
    Ok(())
}

fn run_job(series: &SeriesPlan, job: PairJob) -> PairOutcome {
    if !series.names_match(job.index) {
        let message = format!(
            "{}: pair {} does not follow the file naming sequence, skipped",
            series.ctset.join(&series.subdir).display(),
            job.index
        );
        warn!("{message}");
        return PairOutcome::Skipped(message);
    }
    let out = series.output_path(job.index);
    match stitch_pair(
        &series.frames,
        series.pairs,
        job.index,
        series.axis,
        series.crop,
        &out,
    ) {
        Ok(()) => {
            debug!("wrote {}", out.display());
            PairOutcome::Written
        }
        Err(err) => {
            let message = format!("{}: {err}", out.display());
            warn!("{message}");
            PairOutcome::Failed(message)
        }
    }
}

/// Run the jobs of `plan` that `partition` assigns to this process.
pub fn execute_plan<P: WorkPartition>(plan: &StitchPlan, partition: &P) -> Vec<PairOutcome> {
    partition
        .execute(plan.jobs.len(), |i| {
            let job = plan.jobs[i];
            run_job(&plan.series[job.series], job)
        })
        .into_iter()
        .map(|(_, outcome)| outcome)
        .collect()
}

/// Stitch every CT-set under `config.input` into `config.output`.
///
/// Failing pairs are logged and counted; the call itself fails only when
/// the input cannot be scanned or the axis specification cannot be loaded.
pub fn run_stitch(config: &StitchConfig) -> Result<StitchReport, StitchError> {
    let total_start = Instant::now();
    let spec: AxisSpecification = config.axis.load()?;

    let start = Instant::now();
    let plan = plan_stitch(
        &config.input,
        &config.output,
        &config.layout,
        &spec,
        config.crop,
    )?;
    let mut report = StitchReport::from_plan(&plan);
    report.timing.push("plan", elapsed_ms(start));
    info!(
        "stitching {} pairs from {} CT-sets with {} threads",
        plan.jobs.len(),
        plan.ctsets,
        if config.threads == 0 {
            "all".to_string()
        } else {
            config.threads.to_string()
        }
    );

    let start = Instant::now();
    let outcomes = execute_plan(&plan, &ThreadPoolPartition::new(config.threads));
    report.record(outcomes);
    report.timing.push("stitch", elapsed_ms(start));
    report.timing.total_ms = elapsed_ms(total_start);
    info!(
        "stitched {} of {} pairs ({} failed, {} skipped)",
        report.pairs_written, report.pairs_planned, report.pairs_failed, report.pairs_skipped
    );

    if let Some(path) = &config.report {
        write_json_file(path, &report)?;
    }
    Ok(report)
}
