//! End-to-end runs over generated metadata trees and tar.gz archives.

use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tarpick::metadata::{NamingPolicy, RowFormat};
use tarpick::{
    ArchiveSource, FilterConfig, HttpArchiveSource, LocalArchiveSource, PhraseFilter, RipConfig,
    RipError, Ripper, Schema,
};

fn tar_gz(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::fast()));
    for (name, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

fn plain_tar(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.into_inner().unwrap()
}

fn noise(len: u32) -> Vec<u8> {
    (0..len)
        .map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8)
        .collect()
}

fn write_file(path: &Path, data: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, data).unwrap();
}

/// Metadata tree under `meta/`, archive mirror under `archives/`.
struct Fixture {
    _tmp: tempfile::TempDir,
    meta: PathBuf,
    archives: PathBuf,
    out: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let meta = tmp.path().join("meta");
        let archives = tmp.path().join("archives");
        let out = tmp.path().join("out");
        fs::create_dir_all(&meta).unwrap();
        Self {
            _tmp: tmp,
            meta,
            archives,
            out,
        }
    }

    fn metadata(&self, relative: &str, body: &str) -> PathBuf {
        let path = self.meta.join(relative);
        write_file(&path, body.as_bytes());
        path
    }

    fn archive(&self, relative: &str, data: &[u8]) {
        write_file(&self.archives.join(relative), data);
    }

    fn config(&self) -> RipConfig {
        let mut config = RipConfig::new(&self.meta, &self.out);
        config.schema.source_extension = ".src".to_string();
        config
    }

    fn run(&self, config: RipConfig) -> tarpick::RunSummary {
        Ripper::new(config, LocalArchiveSource::new(&self.archives))
            .run()
            .unwrap()
    }
}

#[test]
fn test_segment_rows_end_to_end() {
    let fx = Fixture::new();
    fx.metadata(
        "large-additional/l_chunks_0001_metadata.csv",
        "seg1,a,b,c,d,e,f,/a/b/seg1.src\n\
         seg2,a,b,c,d,e,f,/a/b/seg2.txt\n",
    );
    fx.archive(
        "l_files_additional/l_chunks_0001.tar.gz",
        &tar_gz(&[
            ("l_chunks_0001/seg0.wav", &b"zero"[..]),
            ("l_chunks_0001/seg1.wav", &b"one"[..]),
            ("l_chunks_0001/seg2.wav", &b"two"[..]),
        ]),
    );

    let summary = fx.run(fx.config());

    assert_eq!(summary.files_processed, 1);
    assert_eq!(summary.rows_invalid, 1);
    assert_eq!(summary.members_targeted, 1);
    assert_eq!(summary.members_matched, 1);
    assert_eq!(summary.members_unmatched, 0);
    assert_eq!(fs::read(fx.out.join("l_chunks_0001/seg1.wav")).unwrap(), b"one");
    // The .txt row contributed nothing.
    assert!(!fx.out.join("l_chunks_0001/seg2.wav").exists());
    assert!(!fx.out.join("l_chunks_0001/seg0.wav").exists());
}

#[test]
fn test_path_rows_end_to_end() {
    let fx = Fixture::new();
    fx.metadata(
        "dev/dev_chunks_0000_metadata.csv",
        "/audio/P1/YOU1_S1.wav,Word1 word2 spoken\n/audio/P1/YOU1_S2.wav,Word1 word2\n",
    );
    fx.archive(
        "dev_files/dev_chunks_0000.tar.gz",
        &tar_gz(&[
            ("YOU1_S2.wav", &b"s2"[..]),
            ("YOU1_S3.wav", &b"s3"[..]),
            ("YOU1_S1.wav", &b"s1"[..]),
        ]),
    );

    let mut config = RipConfig::new(&fx.meta, &fx.out);
    config.schema = Schema::paths();
    assert_eq!(config.schema.row_format, RowFormat::FirstField);
    assert_eq!(config.schema.policy, NamingPolicy::Direct);

    let summary = fx.run(config);
    assert_eq!(summary.members_matched, 2);
    assert_eq!(fs::read(fx.out.join("YOU1_S1.wav")).unwrap(), b"s1");
    assert_eq!(fs::read(fx.out.join("YOU1_S2.wav")).unwrap(), b"s2");
    assert!(!fx.out.join("YOU1_S3.wav").exists());
}

#[test]
fn test_truncated_archive_keeps_partial_results() {
    let fx = Fixture::new();
    fx.metadata(
        "xs/xs_chunks_0000_metadata.csv",
        "a,1,2,3,4,5,6,/x/a.src\nz,1,2,3,4,5,6,/x/z.src\n",
    );
    // A second archive that must still be processed after the broken one.
    fx.metadata("xs/xs_chunks_0001_metadata.csv", "b,1,2,3,4,5,6,/x/b.src\n");

    // Incompressible filler so that cutting the gzip stream lands inside it.
    let filler = noise(200_000);
    let full = tar_gz(&[
        ("xs_chunks_0000/a.wav", &b"first"[..]),
        ("xs_chunks_0000/filler.bin", filler.as_slice()),
        ("xs_chunks_0000/z.wav", &b"last"[..]),
    ]);
    fx.archive("xs_files/xs_chunks_0000.tar.gz", &full[..full.len() / 2]);
    fx.archive(
        "xs_files/xs_chunks_0001.tar.gz",
        &tar_gz(&[("xs_chunks_0001/b.wav", &b"bee"[..])]),
    );

    let summary = fx.run(fx.config());

    assert_eq!(summary.files_processed, 2);
    assert_eq!(summary.files_failed, 0);
    assert_eq!(summary.archives_truncated, 1);
    assert_eq!(summary.members_targeted, 3);
    assert_eq!(summary.members_matched, 2);
    assert_eq!(summary.members_unmatched, 1);
    assert_eq!(fs::read(fx.out.join("xs_chunks_0000/a.wav")).unwrap(), b"first");
    assert!(!fx.out.join("xs_chunks_0000/z.wav").exists());
    assert_eq!(fs::read(fx.out.join("xs_chunks_0001/b.wav")).unwrap(), b"bee");
}

#[test]
fn test_cut_inside_targeted_member_is_unmatched() {
    let fx = Fixture::new();
    let path = fx.metadata(
        "xs/xs_chunks_0003_metadata.csv",
        "a,1,2,3,4,5,6,/x/a.src\nbig,1,2,3,4,5,6,/x/big.src\n",
    );
    let big = noise(200_000);
    let full = tar_gz(&[
        ("xs_chunks_0003/a.wav", &b"first"[..]),
        ("xs_chunks_0003/big.wav", big.as_slice()),
    ]);
    fx.archive("xs_files/xs_chunks_0003.tar.gz", &full[..full.len() / 2]);

    let ripper = Ripper::new(fx.config(), LocalArchiveSource::new(&fx.archives));
    let report = ripper.process_file(&path).unwrap();

    assert_eq!(report.written, vec![fx.out.join("xs_chunks_0003/a.wav")]);
    assert_eq!(report.matched(), 1);
    assert_eq!(report.unmatched, vec!["xs_chunks_0003/big.wav".to_string()]);
    assert!(report.truncated.is_some());

    let summary = ripper.run().unwrap();
    assert_eq!(summary.archives_truncated, 1);
    assert_eq!(summary.members_unmatched, 1);
}

#[test]
fn test_plain_tar_cut_on_header_boundary() {
    let fx = Fixture::new();
    let path = fx.metadata(
        "xs/xs_chunks_0004_metadata.csv",
        "a,1,2,3,4,5,6,/x/a.src\nz,1,2,3,4,5,6,/x/z.src\n",
    );
    let full = plain_tar(&[
        ("xs_chunks_0004/a.wav", &b"first"[..]),
        ("xs_chunks_0004/z.wav", &b"last"[..]),
    ]);
    // One header block and one padded content block for a.wav, nothing more.
    fx.archive("xs_files/xs_chunks_0004.tar", &full[..1024]);

    let mut config = fx.config();
    config.naming.archive_suffix = ".tar".to_string();
    let ripper = Ripper::new(config, LocalArchiveSource::new(&fx.archives));
    let report = ripper.process_file(&path).unwrap();

    assert_eq!(report.written, vec![fx.out.join("xs_chunks_0004/a.wav")]);
    assert_eq!(report.unmatched, vec!["xs_chunks_0004/z.wav".to_string()]);
    assert!(report.truncated.is_some());
}

#[test]
fn test_process_file_reports_unmatched() {
    let fx = Fixture::new();
    let path = fx.metadata(
        "xs/xs_chunks_0002_metadata.csv",
        "a,1,2,3,4,5,6,/x/a.src\nmissing,1,2,3,4,5,6,/x/m.src\n",
    );
    fx.archive(
        "xs_files/xs_chunks_0002.tar.gz",
        &tar_gz(&[("xs_chunks_0002/a.wav", &b"a"[..])]),
    );

    let ripper = Ripper::new(fx.config(), LocalArchiveSource::new(&fx.archives));
    let report = ripper.process_file(&path).unwrap();
    assert_eq!(report.written, vec![fx.out.join("xs_chunks_0002/a.wav")]);
    assert_eq!(report.unmatched, vec!["xs_chunks_0002/missing.wav".to_string()]);
    assert!(report.truncated.is_none());
}

#[test]
fn test_unknown_category_does_not_stop_run() {
    let fx = Fixture::new();
    fx.metadata("huge/h_0_metadata.csv", "a,1,2,3,4,5,6,/x/a.src\n");
    fx.metadata("xs/xs_0_metadata.csv", "a,1,2,3,4,5,6,/x/a.src\n");
    fx.archive("xs_files/xs_0.tar.gz", &tar_gz(&[("xs_0/a.wav", &b"a"[..])]));

    let ripper = Ripper::new(fx.config(), LocalArchiveSource::new(&fx.archives));
    let err = ripper
        .process_file(&fx.meta.join("huge/h_0_metadata.csv"))
        .unwrap_err();
    assert!(matches!(err, RipError::UnknownCategory { .. }));

    let summary = ripper.run().unwrap();
    assert_eq!(summary.files_failed, 1);
    assert_eq!(summary.members_matched, 1);
}

#[test]
fn test_filter_then_rip() {
    let fx = Fixture::new();
    let raw = fx._tmp.path().join("raw");
    write_file(
        &raw.join("dev/dev_chunks_0000_metadata.csv"),
        b"/audio/a.wav,Word1 word2\n/audio/b.wav,other text\n",
    );

    let summary = PhraseFilter::new(FilterConfig {
        input_dir: raw,
        output_dir: fx.meta.clone(),
        phrase: "Word1 word2".to_string(),
        recursive: true,
    })
    .run()
    .unwrap();
    assert_eq!(summary.matching_lines, 1);

    fx.archive(
        "dev_files/dev_chunks_0000.tar.gz",
        &tar_gz(&[("a.wav", &b"A"[..]), ("b.wav", &b"B"[..])]),
    );
    let mut config = RipConfig::new(&fx.meta, &fx.out);
    config.schema = Schema::paths();
    let rip = fx.run(config);

    assert_eq!(rip.members_matched, 1);
    assert!(fx.out.join("a.wav").exists());
    assert!(!fx.out.join("b.wav").exists());
}

#[test]
fn test_http_source_end_to_end() {
    use httpmock::prelude::*;

    let fx = Fixture::new();
    fx.metadata("xs/xs_chunks_0000_metadata.csv", "seg1,a,b,c,d,e,f,/p/seg1.src\n");
    let archive = tar_gz(&[
        ("xs_chunks_0000/seg1.wav", &b"remote"[..]),
        ("xs_chunks_0000/seg2.wav", &b"other"[..]),
    ]);

    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/resolve/main/data/audio/xs_files/xs_chunks_0000.tar.gz")
            .header("authorization", "Bearer hf_test");
        then.status(200).body(archive.clone());
    });

    let source = HttpArchiveSource::new(
        format!("{}/resolve/main/data/audio", server.base_url()),
        Some("hf_test".to_string()),
    )
    .unwrap();
    let ripper = Ripper::new(fx.config(), source);
    let summary = ripper.run().unwrap();

    mock.assert();
    assert_eq!(summary.members_matched, 1);
    assert_eq!(fs::read(fx.out.join("xs_chunks_0000/seg1.wav")).unwrap(), b"remote");
    assert!(ripper.source().transferred_bytes() > 0);
}

#[test]
fn test_http_unauthorized_aborts() {
    use httpmock::prelude::*;

    let fx = Fixture::new();
    fx.metadata("xs/xs_0_metadata.csv", "seg1,a,b,c,d,e,f,/p/seg1.src\n");
    fx.metadata("xs/xs_1_metadata.csv", "seg1,a,b,c,d,e,f,/p/seg1.src\n");

    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET);
        then.status(403);
    });

    let source = HttpArchiveSource::new(server.base_url(), Some("expired".to_string())).unwrap();
    let descriptor = tarpick::ArchiveDescriptor {
        archive_name: "xs_0.tar.gz".to_string(),
        remote_folder: "xs_files".to_string(),
        stem: "xs_0".to_string(),
    };
    assert!(source.locate(&descriptor).ends_with("/xs_files/xs_0.tar.gz"));

    let err = Ripper::new(fx.config(), source).run().unwrap_err();
    assert!(matches!(err, RipError::Unauthorized(_)));
    mock.assert_hits(1);
}
