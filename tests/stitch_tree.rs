mod common;

use common::synthetic_ct::{frame, ramp_frames, write_series};
use halfacq::axis::{AxisSource, AxisTable, CropPolicy};
use halfacq::config::StitchConfig;
use halfacq::image::io::{read_page, write_frame};
use halfacq::image::{FrameSequence, SampleFormat};
use halfacq::run_stitch;
use halfacq::stitch::{overlap_width, stitch};
use std::path::Path;

fn config(input: &Path, output: &Path, axis: AxisSource, crop: CropPolicy) -> StitchConfig {
    StitchConfig {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        layout: Default::default(),
        axis,
        crop,
        threads: 2,
        report: None,
    }
}

fn width_of(path: &Path) -> usize {
    read_page(path, 0).unwrap().image.w
}

#[test]
fn flat_ctset_writes_half_as_many_frames_per_directory() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("raw");
    write_series(&raw.join("tomo"), "proj_", &ramp_frames(8, 12, 3), SampleFormat::U16);
    write_series(&raw.join("flats"), "flat_", &ramp_frames(4, 12, 3), SampleFormat::U16);
    write_series(&raw.join("darks"), "dark_", &ramp_frames(3, 12, 3), SampleFormat::U16);
    let out = dir.path().join("sti");

    let mut cfg = config(
        &raw,
        &out,
        AxisSource::List {
            values: "9".to_string(),
        },
        CropPolicy::Auto,
    );
    cfg.report = Some(out.join("report.json"));
    let report = run_stitch(&cfg).unwrap();

    for i in 0..4 {
        assert!(out.join(format!("tomo/sti-{i:04}.tif")).is_file());
    }
    assert!(!out.join("tomo/sti-0004.tif").exists());
    assert!(out.join("flats/sti-0001.tif").is_file());
    assert!(out.join("darks/sti-0000.tif").is_file());
    assert!(!out.join("darks/sti-0001.tif").exists());
    assert_eq!(report.pairs_planned, 4 + 2 + 1);
    assert_eq!(report.pairs_written, 7);
    assert_eq!(report.pairs_failed, 0);
    assert!(report.warnings.iter().any(|w| w.contains("odd number of frames")));
    assert!(out.join("report.json").is_file());

    // axis 9 of 12 columns -> overlap 6, result 18 columns wide
    assert_eq!(overlap_width(12, 9.0), 6);
    assert_eq!(width_of(&out.join("tomo/sti-0000.tif")), 18);
}

#[test]
fn stitched_frame_matches_the_direct_blend() {
    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("raw");
    let frames = ramp_frames(6, 10, 2);
    write_series(&raw.join("tomo"), "p", &frames, SampleFormat::U16);
    let out = dir.path().join("sti");
    let cfg = config(
        &raw,
        &out,
        AxisSource::List {
            values: "3".to_string(),
        },
        CropPolicy::Fixed(1),
    );
    run_stitch(&cfg).unwrap();

    let expected = stitch(&frames[1], &frames[4].mirrored(), 3.0, 1, (0.0, 65535.0)).unwrap();
    let written = read_page(&out.join("tomo/sti-0001.tif"), 0).unwrap();
    assert_eq!(written.format, SampleFormat::U16);
    assert_eq!(written.image.shape(), expected.shape());
    for (a, b) in written.image.data.iter().zip(&expected.data) {
        assert!((a - b).abs() <= 0.5, "{a} vs {b}");
    }
}

#[test]
fn interpolated_axes_give_equal_widths_across_slices() {
    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("raw");
    for z in ["z00", "z01", "z02"] {
        write_series(
            &raw.join("scan").join(z).join("tomo"),
            "p_",
            &ramp_frames(4, 16, 2),
            SampleFormat::U16,
        );
    }
    let out = dir.path().join("sti");
    let cfg = config(
        &raw,
        &out,
        AxisSource::Interpolated {
            first: 11.0,
            last: 13.0,
        },
        CropPolicy::Auto,
    );
    let report = run_stitch(&cfg).unwrap();
    assert_eq!(report.pairs_written, 6);

    // axes 11, 12, 13 -> uncropped widths 22, 24, 26; all equalized to 22
    for z in ["z00", "z01", "z02"] {
        for i in 0..2 {
            let path = out.join(format!("scan/{z}/tomo/sti-{i:04}.tif"));
            assert_eq!(width_of(&path), 22, "{}", path.display());
        }
    }
}

#[test]
fn table_axes_apply_per_slice_and_missing_slices_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("raw");
    for z in ["z00", "z01"] {
        write_series(
            &raw.join("scan").join(z).join("tomo"),
            "p_",
            &ramp_frames(2, 16, 2),
            SampleFormat::U16,
        );
    }
    let mut table = AxisTable::new();
    table.insert(&raw.join("scan"), "z00", 12);
    let table_path = dir.path().join("axes.json");
    table.save(&table_path).unwrap();

    let out = dir.path().join("sti");
    let cfg = config(
        &raw,
        &out,
        AxisSource::Table { path: table_path },
        CropPolicy::Auto,
    );
    let report = run_stitch(&cfg).unwrap();
    assert_eq!(report.ctsets, 2);
    assert_eq!(report.ctsets_skipped, 1);
    assert_eq!(report.pairs_written, 1);
    assert_eq!(width_of(&out.join("scan/z00/tomo/sti-0000.tif")), 24);
    assert!(!out.join("scan/z01").exists());
}

#[test]
fn short_axis_list_stitches_the_leading_slices_only() {
    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("raw");
    for z in ["a", "b", "c"] {
        write_series(
            &raw.join("scan").join(z).join("tomo"),
            "p_",
            &ramp_frames(2, 8, 2),
            SampleFormat::U16,
        );
    }
    let out = dir.path().join("sti");
    let cfg = config(
        &raw,
        &out,
        AxisSource::List {
            values: "6,5".to_string(),
        },
        CropPolicy::None,
    );
    let report = run_stitch(&cfg).unwrap();
    assert_eq!(report.pairs_written, 2);
    assert_eq!(width_of(&out.join("scan/a/tomo/sti-0000.tif")), 12);
    assert_eq!(width_of(&out.join("scan/b/tomo/sti-0000.tif")), 10);
    assert!(!out.join("scan/c").exists());
}

#[test]
fn naming_gap_skips_only_the_affected_pair() {
    let dir = tempfile::tempdir().unwrap();
    let tomo = dir.path().join("raw/tomo");
    write_series(&tomo, "p_", &ramp_frames(4, 8, 2), SampleFormat::U16);
    std::fs::rename(tomo.join("p_0003.tif"), tomo.join("p_0007.tif")).unwrap();
    let out = dir.path().join("sti");
    let cfg = config(
        &dir.path().join("raw"),
        &out,
        AxisSource::List {
            values: "6".to_string(),
        },
        CropPolicy::None,
    );
    let report = run_stitch(&cfg).unwrap();
    assert_eq!(report.pairs_written, 1);
    assert_eq!(report.pairs_skipped, 1);
    assert!(out.join("tomo/sti-0000.tif").is_file());
    assert!(!out.join("tomo/sti-0001.tif").exists());
}

#[test]
fn multi_page_frames_and_mixed_formats() {
    let dir = tempfile::tempdir().unwrap();
    let tomo = dir.path().join("raw/tomo");
    std::fs::create_dir_all(&tomo).unwrap();
    let pages = ramp_frames(4, 8, 2);
    halfacq::image::io::write_tiff_pages(&tomo.join("stack.tif"), &pages, SampleFormat::U16)
        .unwrap();
    assert_eq!(FrameSequence::open(&tomo).unwrap().len(), 4);

    // a float frame directory is stitched without clipping
    let flats = dir.path().join("raw/flats");
    std::fs::create_dir_all(&flats).unwrap();
    for i in 0..2 {
        let f = frame(8, 2, |x, _| -1.5 * (x as f32 + i as f32));
        write_frame(&flats.join(format!("f_{i:02}.tif")), &f, SampleFormat::F32).unwrap();
    }

    let out = dir.path().join("sti");
    let cfg = config(
        &dir.path().join("raw"),
        &out,
        AxisSource::List {
            values: "6".to_string(),
        },
        CropPolicy::None,
    );
    let report = run_stitch(&cfg).unwrap();
    assert_eq!(report.pairs_written, 3);
    let flat = read_page(&out.join("flats/sti-0000.tif"), 0).unwrap();
    assert_eq!(flat.format, SampleFormat::F32);
    assert!(flat.image.data.iter().any(|&v| v < 0.0));
}
