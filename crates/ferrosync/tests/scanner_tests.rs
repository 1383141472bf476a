use std::fs;
use std::io::Write;

use ferrosync::{Error, Scanner};
use flate2::{Compression, write::GzEncoder};

const SIMPLE: &str = "SyncTeX Version:1\nInput:1:./main.tex\nOutput:pdf\nMagnification:1000\nUnit:1\nX Offset:0\nY Offset:0\nContent:\n{1\n(1,5:10,20:100,10,2\n)\n}1\nPostamble:\nCount:1\nPost scriptum:\n";

fn gzipped(content: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

#[test]
fn missing_candidates_report_not_found() {
    let dir = tempfile::tempdir().unwrap();
    match Scanner::new_with_output_file(dir.path().join("main.pdf"), None, true) {
        Err(Error::NotFound { output }) => assert!(output.contains("main.pdf")),
        Err(other) => panic!("expected NotFound, got {other:?}"),
        Ok(_) => panic!("expected NotFound, got a scanner"),
    }
}

#[test]
fn plain_candidate_next_to_the_output() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("main.synctex"), SIMPLE).unwrap();
    let scanner = Scanner::new_with_output_file(dir.path().join("main.pdf"), None, true).unwrap();
    assert_eq!(scanner.sheet_pages(), vec![1]);
    assert!(scanner.synctex_path().ends_with("main.synctex"));
}

#[test]
fn gz_candidate_is_decompressed() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("main.synctex.gz"), gzipped(SIMPLE)).unwrap();
    let scanner = Scanner::new_with_output_file(dir.path().join("main.pdf"), None, true).unwrap();
    assert_eq!(scanner.sheet_pages(), vec![1]);
}

#[test]
fn gz_candidate_is_skipped_when_not_accepted() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("main.synctex.gz"), gzipped(SIMPLE)).unwrap();
    match Scanner::new_with_output_file(dir.path().join("main.pdf"), None, false) {
        Err(Error::NotFound { .. }) => {}
        Err(other) => panic!("expected NotFound, got {other:?}"),
        Ok(_) => panic!("expected NotFound, got a scanner"),
    }
}

#[test]
fn directory_hint_candidate_is_found() {
    let dir = tempfile::tempdir().unwrap();
    let build = dir.path().join("build");
    fs::create_dir(&build).unwrap();
    fs::write(build.join("main.synctex"), SIMPLE).unwrap();
    let scanner =
        Scanner::new_with_output_file(dir.path().join("main.pdf"), Some(&build), true).unwrap();
    assert!(scanner.synctex_path().starts_with(&build));
}

#[test]
fn most_recently_modified_candidate_wins() {
    let dir = tempfile::tempdir().unwrap();
    let older = dir.path().join("main.synctex");
    let newer = dir.path().join("main.synctex.gz");
    // The stale flavor carries a second page so the pick is observable.
    let stale = SIMPLE.replace("Postamble:", "{9\n(1,5:0,0:1,1,0\n)\n}9\nPostamble:");
    fs::write(&older, stale).unwrap();
    fs::write(&newer, gzipped(SIMPLE)).unwrap();
    let earlier = std::time::SystemTime::now() - std::time::Duration::from_secs(60);
    let file = fs::File::options().write(true).open(&older).unwrap();
    file.set_modified(earlier).unwrap();
    let scanner = Scanner::new_with_output_file(dir.path().join("main.pdf"), None, true).unwrap();
    assert!(scanner.synctex_path().ends_with("main.synctex.gz"));
    assert_eq!(scanner.sheet_pages(), vec![1]);
}

#[test]
fn stale_detection_after_rewrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("main.synctex");
    fs::write(&path, SIMPLE).unwrap();
    let scanner = Scanner::new_with_output_file(dir.path().join("main.pdf"), None, true).unwrap();
    assert!(!scanner.is_stale());
    let later = std::time::SystemTime::now() + std::time::Duration::from_secs(60);
    let file = fs::File::options().write(true).open(&path).unwrap();
    file.set_modified(later).unwrap();
    assert!(scanner.is_stale());
}
