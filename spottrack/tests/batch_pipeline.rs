//! End-to-end batch runs over `.nd` stacks written to a temp directory.

use std::fs::File;
use std::path::Path;

use common::Buffer2;
use tiff::encoder::{TiffEncoder, colortype};

use spottrack::{BatchConfig, BatchRunner, ChannelOutcome, TrajectoryDocument};

const WIDTH: usize = 32;
const HEIGHT: usize = 32;
const WAVES: [&str; 2] = ["Quad-TIRF488", "Quad-TIRF642"];

/// A 16-bit frame with Gaussian spots of amplitude 1000 over a flat background.
fn frame(spots: &[(f32, f32)]) -> Buffer2<u16> {
    Buffer2::from_fn(WIDTH, HEIGHT, |x, y| {
        let mut value = 100.0f32;
        for &(cx, cy) in spots {
            let d2 = (x as f32 - cx).powi(2) + (y as f32 - cy).powi(2);
            value += 1000.0 * (-d2 / (2.0 * 2.5 * 2.5)).exp();
        }
        value.round() as u16
    })
}

fn write_tiff(path: &Path, page: &Buffer2<u16>) {
    let mut encoder = TiffEncoder::new(File::create(path).unwrap()).unwrap();
    encoder
        .write_image::<colortype::Gray16>(WIDTH as u32, HEIGHT as u32, page.pixels())
        .unwrap();
}

/// Writes `<base>.nd` plus one TIFF per wave and time point. Both waves get
/// the same frames.
fn write_stack(dir: &Path, base: &str, frames: &[Buffer2<u16>]) {
    let mut nd = String::from("\"NDInfoFile\", Version 1.0\n\"DoTimelapse\", TRUE\n");
    nd.push_str(&format!("\"NTimePoints\", {}\n", frames.len()));
    nd.push_str("\"DoStage\", FALSE\n\"DoWave\", TRUE\n\"NWavelengths\", 2\n");
    for (i, wave) in WAVES.iter().enumerate() {
        nd.push_str(&format!("\"WaveName{}\", \"{}\"\n", i + 1, wave));
    }
    nd.push_str("\"DoZSeries\", FALSE\n\"EndFile\"\n");
    std::fs::write(dir.join(format!("{base}.nd")), nd).unwrap();

    for (w, wave) in WAVES.iter().enumerate() {
        for (t, page) in frames.iter().enumerate() {
            let name = format!("{base}_w{}{wave}_t{}.TIF", w + 1, t + 1);
            write_tiff(&dir.join(name), page);
        }
    }
}

fn read_rows(path: &Path) -> Vec<csv::StringRecord> {
    csv::Reader::from_path(path)
        .unwrap()
        .records()
        .map(Result::unwrap)
        .collect()
}

#[test]
fn test_gap_closed_spot_forms_one_track() {
    let input = tempfile::tempdir().unwrap();
    write_stack(
        input.path(),
        "cell",
        &[frame(&[(10.0, 10.0)]), frame(&[]), frame(&[(11.0, 11.0)])],
    );

    let report = BatchRunner::new(BatchConfig::default())
        .run(input.path(), None)
        .unwrap();
    assert_eq!(report.exported_channels(), 2);

    let rows = read_rows(&input.path().join("cell_channel_1_results.csv"));
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][1], &rows[1][1]);
    assert_eq!(&rows[0][7], "0");
    assert_eq!(&rows[1][7], "2");
    let x: f64 = rows[1][3].parse().unwrap();
    assert!((x - 11.0).abs() < 0.25, "x = {x}");

    let xml = std::fs::read_to_string(input.path().join("cell_w1Quad-TIRF488_t1.xml")).unwrap();
    let doc = TrajectoryDocument::from_xml(&xml).unwrap();
    assert_eq!(doc.n_tracks, 1);
    assert_eq!(doc.from, "cell");
    assert_eq!(doc.particles[0].n_spots, 2);
    assert!((doc.particles[0].displacement - 2f64.sqrt()).abs() < 0.3);
}

#[test]
fn test_outputs_are_byte_identical_across_runs() {
    let input = tempfile::tempdir().unwrap();
    write_stack(
        input.path(),
        "cell",
        &[
            frame(&[(8.0, 8.0), (22.0, 20.0)]),
            frame(&[(9.0, 8.5), (21.0, 21.0)]),
            frame(&[(10.0, 9.0), (20.0, 22.0)]),
        ],
    );

    let runs: Vec<_> = (0..2)
        .map(|_| {
            let out = tempfile::tempdir().unwrap();
            BatchRunner::new(BatchConfig::default())
                .run(input.path(), Some(out.path()))
                .unwrap();
            out
        })
        .collect();

    for name in [
        "cell_w1Quad-TIRF488_t1.xml",
        "cell_channel_1_results.csv",
        "cell_w2Quad-TIRF642_t1.xml",
        "cell_channel_2_results.csv",
    ] {
        let a = std::fs::read(runs[0].path().join(name)).unwrap();
        let b = std::fs::read(runs[1].path().join(name)).unwrap();
        assert_eq!(a, b, "{name} differs between runs");
    }
    assert_eq!(read_rows(&runs[0].path().join("cell_channel_1_results.csv")).len(), 6);
}

#[test]
fn test_corrupt_inputs_do_not_stop_the_batch() {
    let input = tempfile::tempdir().unwrap();
    let frames = [frame(&[(12.0, 12.0)]), frame(&[(13.0, 12.0)])];
    write_stack(input.path(), "b_good", &frames);

    std::fs::write(input.path().join("a_broken.nd"), "\"DoTimelapse\", sometimes\n").unwrap();

    write_stack(input.path(), "c_partial", &frames);
    std::fs::write(
        input.path().join("c_partial_w2Quad-TIRF642_t2.TIF"),
        b"not a tiff at all",
    )
    .unwrap();

    let report = BatchRunner::new(BatchConfig::default())
        .run(input.path(), None)
        .unwrap();

    assert_eq!(report.files.len(), 3);
    assert!(report.files[0].outcome.is_err());
    assert!(report.files[1].channels().iter().all(|c| c.is_exported()));

    let partial = report.files[2].channels();
    assert!(partial[0].is_exported());
    assert!(matches!(partial[1].outcome, ChannelOutcome::Failed { .. }));
    assert!(!input.path().join("c_partial_channel_2_results.csv").exists());

    assert_eq!(report.exported_channels(), 3);
    assert_eq!(report.failed_channels(), 1);
    assert_eq!(report.failed_files(), 1);
}

#[test]
fn test_empty_detection_writes_empty_documents() {
    let input = tempfile::tempdir().unwrap();
    write_stack(input.path(), "blank", &[frame(&[]), frame(&[])]);

    let report = BatchRunner::new(BatchConfig::default())
        .run(input.path(), None)
        .unwrap();
    assert_eq!(report.exported_channels(), 2);

    let table = std::fs::read_to_string(input.path().join("blank_channel_1_results.csv")).unwrap();
    assert_eq!(table.lines().count(), 1);
    assert!(table.starts_with("ID,TRACK_ID,QUALITY"));

    let xml = std::fs::read_to_string(input.path().join("blank_w1Quad-TIRF488_t1.xml")).unwrap();
    let doc = TrajectoryDocument::from_xml(&xml).unwrap();
    assert_eq!(doc.n_tracks, 0);
}

#[test]
fn test_directory_without_stacks_completes() {
    let input = tempfile::tempdir().unwrap();
    std::fs::write(input.path().join("readme.txt"), "nothing here").unwrap();
    let report = BatchRunner::new(BatchConfig::default())
        .run(input.path(), None)
        .unwrap();
    assert!(report.files.is_empty());
}
