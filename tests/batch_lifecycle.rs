use fileconv::{
    AppConfig, BatchConverter, BatchError, BatchEvent, CancelToken, ConversionError, ScanError,
    TargetFormat,
};
use image::{Rgba, RgbaImage};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn converter_in(temp: &TempDir, workers: usize) -> BatchConverter {
    let config = AppConfig::default()
        .with_max_workers(workers)
        .with_log_file(temp.path().join("conversion_logs.txt"));
    BatchConverter::with_config(config).unwrap()
}

fn write_png(path: &Path) {
    RgbaImage::from_pixel(4, 3, Rgba([0, 0, 255, 255]))
        .save(path)
        .unwrap();
}

#[test]
fn mixed_directory_to_csv() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("in");
    let output = temp.path().join("out");
    fs::create_dir(&input).unwrap();
    fs::write(input.join("a.txt"), "x y z\n").unwrap();
    write_png(&input.join("b.png"));
    fs::write(input.join("c.jpg"), "not decoded").unwrap();
    fs::write(input.join("notes.md"), "ignored").unwrap();

    let converter = converter_in(&temp, 2);
    let mut log_events = 0;
    let run = converter
        .run_batch(&input, &output, TargetFormat::Csv, &CancelToken::new(), |event| {
            if let BatchEvent::Log(_) = event {
                log_events += 1;
            }
        })
        .unwrap();

    assert_eq!(run.total_jobs, 3);
    assert_eq!(run.outcomes.len(), 3);
    assert_eq!(run.succeeded(), 1);
    assert_eq!(run.failed(), 2);

    let sources: HashSet<String> = run.outcomes.iter().map(|o| o.job.display_name()).collect();
    assert!(!sources.contains("notes.md"));

    assert_eq!(fs::read_to_string(output.join("a.txt.csv")).unwrap(), "x,y,z\n");
    assert!(!output.join("b.png.csv").exists());
    assert!(!output.join("c.jpg.csv").exists());

    // start line, one per job, summary
    assert_eq!(log_events, 5);
    assert!(converter.log().contains("Starting batch conversion of 3 files to csv..."));
    assert!(converter.log().contains("Batch conversion completed. 1 succeeded, 2 failed."));

    let persisted = converter.view_logs().unwrap().unwrap();
    assert_eq!(persisted.lines().count(), 5);
}

#[test]
fn png_directory_to_jpeg() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("in");
    let output = temp.path().join("out");
    fs::create_dir(&input).unwrap();
    for i in 0..5 {
        write_png(&input.join(format!("img{}.png", i)));
    }

    let converter = converter_in(&temp, 3);
    let run = converter
        .run_batch(&input, &output, TargetFormat::Jpg, &CancelToken::new(), |_| {})
        .unwrap();

    assert_eq!(run.succeeded(), 5, "{:?}", run.outcomes);
    assert!(run.peak_running <= 3);
    for i in 0..5 {
        let decoded = image::open(output.join(format!("img{}.png.jpg", i))).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 3));
    }
}

#[test]
fn text_round_trip_is_byte_exact() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("in");
    let output = temp.path().join("out");
    fs::create_dir(&input).unwrap();
    let body = "tabs\tand  double spaces\r\nunicode: ñ ü\n";
    fs::write(input.join("doc.txt"), body).unwrap();

    let converter = converter_in(&temp, 1);
    let run = converter
        .run_batch(&input, &output, TargetFormat::Txt, &CancelToken::new(), |_| {})
        .unwrap();

    assert_eq!(run.summary(), "1 succeeded, 0 failed");
    assert_eq!(fs::read_to_string(output.join("doc.txt.txt")).unwrap(), body);
}

#[test]
fn text_directory_to_pdf() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("in");
    let output = temp.path().join("out");
    fs::create_dir(&input).unwrap();
    fs::write(input.join("report.txt"), "Title\n\nBody line\n").unwrap();

    let converter = converter_in(&temp, 2);
    let run = converter
        .run_batch(&input, &output, TargetFormat::Pdf, &CancelToken::new(), |_| {})
        .unwrap();

    assert_eq!(run.succeeded(), 1);
    assert!(fs::read(output.join("report.txt.pdf")).unwrap().starts_with(b"%PDF"));
}

#[test]
fn empty_directory_runs_nothing() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("in");
    fs::create_dir(&input).unwrap();
    fs::write(input.join("readme.md"), "not convertible").unwrap();

    let converter = converter_in(&temp, 2);
    let mut events = 0;
    let run = converter
        .run_batch(&input, &temp.path().join("out"), TargetFormat::Csv, &CancelToken::new(), |_| {
            events += 1
        })
        .unwrap();

    assert!(run.is_empty());
    assert_eq!(events, 0);
    assert!(converter.log().entries().is_empty());
    assert!(converter.view_logs().unwrap().is_none());
}

#[test]
fn missing_input_directory_is_setup_error() {
    let temp = TempDir::new().unwrap();
    let converter = converter_in(&temp, 2);

    let err = converter
        .run_batch(
            &temp.path().join("does-not-exist"),
            &temp.path().join("out"),
            TargetFormat::Txt,
            &CancelToken::new(),
            |_| {},
        )
        .unwrap_err();

    assert!(matches!(err, BatchError::Scan(ScanError::DirectoryNotFound { .. })));
    assert!(converter.log().contains("Error opening input directory"));
    assert!(!converter.log().contains("Starting batch conversion"));
}

#[test]
fn unusable_output_directory_is_setup_error() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("in");
    fs::create_dir(&input).unwrap();
    fs::write(input.join("a.txt"), "x").unwrap();
    let output = temp.path().join("taken");
    fs::write(&output, "a regular file").unwrap();

    let converter = converter_in(&temp, 2);
    let err = converter
        .run_batch(&input, &output, TargetFormat::Csv, &CancelToken::new(), |_| {})
        .unwrap_err();

    assert!(matches!(err, BatchError::OutputDirectory { .. }));
    assert!(converter.log().contains("Error preparing output directory"));
    assert!(!converter.log().contains("Starting batch conversion"));
    let persisted = converter.view_logs().unwrap().unwrap();
    assert_eq!(persisted.lines().count(), 1);
}

#[test]
fn every_job_gets_one_outcome_under_load() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("in");
    let output = temp.path().join("out");
    fs::create_dir(&input).unwrap();
    for i in 0..40 {
        fs::write(input.join(format!("f{:02}.txt", i)), format!("row {}\n", i)).unwrap();
    }

    let converter = converter_in(&temp, 4);
    let mut last_completed = 0;
    let run = converter
        .run_batch(&input, &output, TargetFormat::Csv, &CancelToken::new(), |event| {
            if let BatchEvent::JobFinished { progress, .. } = event {
                assert_eq!(progress.completed, last_completed + 1);
                last_completed = progress.completed;
            }
        })
        .unwrap();

    assert_eq!(last_completed, 40);
    assert_eq!(run.outcomes.len(), 40);
    let unique: HashSet<_> = run.outcomes.iter().map(|o| o.job.source_path.clone()).collect();
    assert_eq!(unique.len(), 40);
    assert!(run.peak_running <= 4);
    assert_eq!(run.progress().fraction, 1.0);
}

#[test]
fn cancelled_before_start_fails_every_job() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("in");
    let output = temp.path().join("out");
    fs::create_dir(&input).unwrap();
    for name in ["a.txt", "b.txt", "c.txt"] {
        fs::write(input.join(name), "x").unwrap();
    }

    let converter = converter_in(&temp, 2);
    let cancel = CancelToken::new();
    cancel.cancel();
    let run = converter
        .run_batch(&input, &output, TargetFormat::Txt, &cancel, |_| {})
        .unwrap();

    assert!(run.cancelled);
    assert_eq!(run.outcomes.len(), 3);
    assert_eq!(run.failed(), 3);
    assert!(run.outcomes.iter().all(|o| o.message.contains("cancelled")));
    assert!(converter.log().contains("Batch conversion cancelled. 0 succeeded, 3 failed."));
}

#[test]
fn dropped_files_use_fixed_names() {
    let temp = TempDir::new().unwrap();
    let txt = temp.path().join("dropped.txt");
    let png = temp.path().join("dropped.png");
    let jpg = temp.path().join("dropped.jpg");
    fs::write(&txt, "hello\n").unwrap();
    write_png(&png);
    fs::write(&jpg, "x").unwrap();
    let out = temp.path().join("out");
    fs::create_dir(&out).unwrap();

    let converter = converter_in(&temp, 2);
    let tasks = converter.convert_dropped(&[txt, png, jpg], &out);
    assert_eq!(tasks.len(), 3);

    let mut tasks = tasks.into_iter();
    let pdf = tasks.next().unwrap().unwrap().wait();
    let jpeg = tasks.next().unwrap().unwrap().wait();
    let rejected = tasks.next().unwrap();

    assert!(pdf.is_success(), "{}", pdf.message);
    assert!(jpeg.is_success(), "{}", jpeg.message);
    assert!(matches!(rejected, Err(ConversionError::NotSupported { .. })));
    assert!(out.join("converted_output.pdf").exists());
    assert!(out.join("converted_output.jpg").exists());
    assert!(converter.log().contains("PNG file detected."));
}
