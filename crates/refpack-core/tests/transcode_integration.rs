use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use refpack_core::{FilterRules, TranscodeError, TranscodeJob, summarize, transcode};
use tempfile::tempdir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let file = File::create(path).expect("create source zip");
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .last_modified_time(
            zip::DateTime::from_date_and_time(2024, 1, 2, 3, 4, 6).expect("valid zip timestamp"),
        );
    for (name, data) in entries {
        writer.start_file(*name, options).expect("start entry");
        writer.write_all(data).expect("write entry");
    }
    writer.finish().expect("finish source zip");
}

fn entry_names(path: &Path) -> Vec<String> {
    summarize(path).expect("summarize archive").entries
}

#[test]
fn filtered_entries_are_dropped_under_new_root() {
    let temp_dir = tempdir().expect("create temp dir");
    let source = temp_dir.path().join("MHWILDS.zip");
    let destination = temp_dir.path().join("out.zip");
    write_zip(
        &source,
        &[
            ("README.txt", b"readme"),
            ("vr_runtime.dll", b"vr"),
            ("core.dll", b"core"),
        ],
    );

    let job = TranscodeJob::new(&source, &destination, FilterRules::new(["vr"]), "OUT/");
    let stats = transcode(&job, |_| {}).expect("transcode");

    assert_eq!(stats.total, 3);
    assert_eq!(stats.copied, 2);
    assert_eq!(stats.skipped, 1);
    assert_eq!(
        entry_names(&destination),
        vec!["OUT/", "OUT/README.txt", "OUT/core.dll"]
    );
}

#[test]
fn output_has_survivors_plus_root_entry() {
    let temp_dir = tempdir().expect("create temp dir");
    let source = temp_dir.path().join("in.zip");
    let destination = temp_dir.path().join("out.zip");
    let entries: Vec<(String, Vec<u8>)> = (0..12)
        .map(|i| {
            let name = if i % 3 == 0 {
                format!("plugins/OpenXR_{i}.dll")
            } else {
                format!("plugins/keep_{i}.dll")
            };
            (name, vec![u8::try_from(i).expect("small index"); 64])
        })
        .collect();
    let borrowed: Vec<(&str, &[u8])> = entries
        .iter()
        .map(|(name, data)| (name.as_str(), data.as_slice()))
        .collect();
    write_zip(&source, &borrowed);

    let job = TranscodeJob::new(&source, &destination, FilterRules::default(), "MHWILDS/");
    transcode(&job, |_| {}).expect("transcode");

    let names = entry_names(&destination);
    assert_eq!(names.len(), 12 - 4 + 1);
    assert_eq!(names[0], "MHWILDS/");
    assert!(names.iter().all(|name| !name.contains("OpenXR")));
}

#[test]
fn source_order_is_preserved() {
    let temp_dir = tempdir().expect("create temp dir");
    let source = temp_dir.path().join("in.zip");
    let destination = temp_dir.path().join("out.zip");
    write_zip(
        &source,
        &[("z.txt", b"z"), ("a.txt", b"a"), ("m/inner.txt", b"m")],
    );

    let job = TranscodeJob::new(&source, &destination, FilterRules::new(["nothing"]), "R/");
    transcode(&job, |_| {}).expect("transcode");

    assert_eq!(
        entry_names(&destination),
        vec!["R/", "R/z.txt", "R/a.txt", "R/m/inner.txt"]
    );
}

#[test]
fn contents_and_timestamps_survive_with_deflate() {
    let temp_dir = tempdir().expect("create temp dir");
    let source = temp_dir.path().join("in.zip");
    let destination = temp_dir.path().join("out.zip");
    let payload = b"dinput8 payload ".repeat(256);
    write_zip(&source, &[("dinput8.dll", payload.as_slice())]);

    let job = TranscodeJob::new(&source, &destination, FilterRules::default(), "MHWILDS/");
    transcode(&job, |_| {}).expect("transcode");

    let mut archive = ZipArchive::new(File::open(&destination).expect("open output"))
        .expect("output is a zip");
    let mut entry = archive.by_name("MHWILDS/dinput8.dll").expect("entry exists");
    assert_eq!(entry.compression(), CompressionMethod::Deflated);
    let modified = entry.last_modified().expect("timestamp preserved");
    assert_eq!(
        (modified.year(), modified.month(), modified.day()),
        (2024, 1, 2)
    );
    assert_eq!((modified.hour(), modified.minute()), (3, 4));
    let mut contents = Vec::new();
    entry.read_to_end(&mut contents).expect("read entry");
    assert_eq!(contents, payload);
}

#[test]
fn progress_is_monotonic_and_ends_at_one() {
    let temp_dir = tempdir().expect("create temp dir");
    let source = temp_dir.path().join("in.zip");
    let destination = temp_dir.path().join("out.zip");
    write_zip(
        &source,
        &[
            ("a.txt", b"a"),
            ("DELETE_ME", b"x"),
            ("b.txt", b"b"),
            ("openvr_api.dll", b"x"),
            ("c.txt", b"c"),
        ],
    );

    let mut observed = Vec::new();
    let job = TranscodeJob::new(&source, &destination, FilterRules::default(), "OUT/");
    transcode(&job, |value| observed.push(value)).expect("transcode");

    assert_eq!(observed.len(), 5);
    assert!(observed.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(observed.iter().all(|value| (0.0..=1.0).contains(value)));
    assert_eq!(observed.last().copied(), Some(1.0));
}

#[test]
fn progress_reaches_one_when_last_entry_is_skipped() {
    let temp_dir = tempdir().expect("create temp dir");
    let source = temp_dir.path().join("in.zip");
    let destination = temp_dir.path().join("out.zip");
    write_zip(&source, &[("keep.txt", b"k"), ("xr_loader.dll", b"x")]);

    let mut observed = Vec::new();
    let job = TranscodeJob::new(&source, &destination, FilterRules::default(), "OUT/");
    transcode(&job, |value| observed.push(value)).expect("transcode");

    assert_eq!(observed, vec![0.5, 1.0]);
}

#[test]
fn transcoding_output_again_drops_nothing_new() {
    let temp_dir = tempdir().expect("create temp dir");
    let source = temp_dir.path().join("in.zip");
    let first = temp_dir.path().join("first.zip");
    let second = temp_dir.path().join("second.zip");
    write_zip(
        &source,
        &[
            ("README.txt", b"readme"),
            ("vr_runtime.dll", b"vr"),
            ("core.dll", b"core"),
        ],
    );
    let rules = FilterRules::new(["vr"]);

    transcode(
        &TranscodeJob::new(&source, &first, rules.clone(), "OUT/"),
        |_| {},
    )
    .expect("first transcode");
    let stats = transcode(&TranscodeJob::new(&first, &second, rules, "OUT/"), |_| {})
        .expect("second transcode");

    assert_eq!(stats.skipped, 0);
    assert_eq!(
        entry_names(&second),
        vec!["OUT/", "OUT/OUT/", "OUT/OUT/README.txt", "OUT/OUT/core.dll"]
    );
}

#[test]
fn rule_equal_to_root_prefix_drops_everything_on_second_pass() {
    let temp_dir = tempdir().expect("create temp dir");
    let source = temp_dir.path().join("in.zip");
    let first = temp_dir.path().join("first.zip");
    let second = temp_dir.path().join("second.zip");
    write_zip(&source, &[("README.txt", b"readme"), ("core.dll", b"core")]);
    let rules = FilterRules::new(["OUT/"]);

    let first_stats = transcode(
        &TranscodeJob::new(&source, &first, rules.clone(), "OUT/"),
        |_| {},
    )
    .expect("first transcode");
    let second_stats = transcode(&TranscodeJob::new(&first, &second, rules, "OUT/"), |_| {})
        .expect("second transcode");

    assert_eq!(first_stats.skipped, 0);
    assert_eq!(second_stats.skipped, second_stats.total);
    assert_eq!(entry_names(&second), vec!["OUT/"]);
}

#[test]
fn missing_source_fails_without_creating_destination() {
    let temp_dir = tempdir().expect("create temp dir");
    let destination = temp_dir.path().join("out.zip");

    let job = TranscodeJob::new(
        temp_dir.path().join("missing.zip"),
        &destination,
        FilterRules::default(),
        "OUT/",
    );
    let result = transcode(&job, |_| {});

    assert!(matches!(result, Err(TranscodeError::SourceOpen { .. })));
    assert!(!destination.exists());
}

#[test]
fn corrupt_entry_mid_job_removes_partial_destination() {
    let temp_dir = tempdir().expect("create temp dir");
    let source = temp_dir.path().join("in.zip");
    let destination = temp_dir.path().join("out.zip");
    write_zip(
        &source,
        &[("good.txt", b"good"), ("bad.txt", b"payload-bytes")],
    );
    let mut bytes = std::fs::read(&source).expect("read source zip");
    let offset = bytes
        .windows(b"payload-bytes".len())
        .position(|window| window == b"payload-bytes")
        .expect("stored payload is present verbatim");
    bytes[offset] ^= 0xFF;
    std::fs::write(&source, bytes).expect("rewrite corrupted source zip");

    let mut observed = Vec::new();
    let job = TranscodeJob::new(&source, &destination, FilterRules::default(), "OUT/");
    let result = transcode(&job, |value| observed.push(value));

    assert!(matches!(
        result,
        Err(TranscodeError::Copy { ref name, .. }) if name == "bad.txt"
    ));
    assert!(!destination.exists());
    assert_eq!(observed, vec![0.5]);
}
