//! File streams through the public API
//!
//! Open, transcode, alias and close real files.

use std::fs;

use crate::common::registry;
use yaoxiang_stream::stream::{Encoding, Mode, OpenOptions, Source, StreamError};

#[test]
fn test_transcode_utf8_to_utf16_with_bom() {
    let registry = registry();
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("in.txt");
    let dst = dir.path().join("out.txt");
    fs::write(&src, "héllo\n€").unwrap();

    let input = registry
        .open(&Source::file(&src), Mode::Read, &OpenOptions::new())
        .unwrap();
    let output = registry
        .open(
            &Source::file(&dst),
            Mode::Write,
            &OpenOptions::new().encoding(Encoding::UnicodeBe).bom(true),
        )
        .unwrap();
    let copied = registry.copy_stream_data(&input, &output, None).unwrap();
    assert_eq!(copied, 7);
    registry.close_stream(&input, false).unwrap();
    registry.close_stream(&output, false).unwrap();

    assert_eq!(
        fs::read(&dst).unwrap(),
        vec![
            0xFE, 0xFF, 0x00, b'h', 0x00, 0xE9, 0x00, b'l', 0x00, b'l', 0x00, b'o', 0x00, b'\n', 0x20,
            0xAC
        ]
    );

    // Reading it back without options picks the encoding from the BOM.
    let back = registry
        .open(&Source::file(&dst), Mode::Read, &OpenOptions::new())
        .unwrap();
    let mut g = back.lock().unwrap();
    assert_eq!(g.encoding(), Encoding::UnicodeBe);
    assert!(g.has_bom());
    let mut text = String::new();
    while let Some(code) = g.get_code().unwrap() {
        text.push(char::from_u32(code).unwrap());
    }
    assert_eq!(text, "héllo\n€");
}

#[test]
fn test_alias_lives_as_long_as_the_stream() {
    let registry = registry();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("log.txt");

    let log = registry
        .open(&Source::file(&path), Mode::Write, &OpenOptions::new().alias("log"))
        .unwrap();
    let found = registry.lookup_alias("log").unwrap();
    assert_eq!(found.id(), log.id());
    assert_eq!(registry.describe(&log), "log");

    registry.close_stream(&log, false).unwrap();
    assert!(registry.lookup_alias("log").is_none());
    assert!(log.is_erased());
    assert!(matches!(log.lock(), Err(e) if e.is_existence_error()));
}

#[test]
fn test_append_keeps_existing_content() {
    let registry = registry();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    fs::write(&path, "one\n").unwrap();

    let s = registry
        .open(&Source::file(&path), Mode::Append, &OpenOptions::new())
        .unwrap();
    {
        let mut g = s.lock().unwrap();
        let r = g.write_str("two\n");
        g.finish(r).unwrap();
    }
    registry.close_stream(&s, false).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");
}

#[test]
fn test_missing_file_is_an_open_error() {
    let registry = registry();
    let dir = tempfile::tempdir().unwrap();
    let before = registry.len();
    let err = registry
        .open(
            &Source::file(dir.path().join("nope.txt")),
            Mode::Read,
            &OpenOptions::new().alias("ghost"),
        )
        .unwrap_err();
    assert!(matches!(err, StreamError::Open { .. }));
    assert_eq!(registry.len(), before);
    assert!(registry.lookup_alias("ghost").is_none());
}

#[test]
fn test_close_files_leaves_standard_streams() {
    let registry = registry();
    let dir = tempfile::tempdir().unwrap();
    let before = registry.len();
    for name in ["a.txt", "b.txt"] {
        registry
            .open(&Source::file(dir.path().join(name)), Mode::Write, &OpenOptions::new())
            .unwrap();
    }
    assert_eq!(registry.len(), before + 2);

    registry.close_files(true);
    assert_eq!(registry.len(), before);
    assert!(!registry.std_output().is_erased());
}

#[test]
fn test_properties_serialize_as_json() {
    let registry = registry();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.bin");
    fs::write(&path, [1u8, 2, 3]).unwrap();

    let s = registry
        .open(&Source::file(&path), Mode::Read, &OpenOptions::new().binary().alias("data"))
        .unwrap();
    let props = registry.properties(&s).unwrap();
    let json = serde_json::to_value(&props).unwrap();
    assert_eq!(json["type"], "binary");
    assert_eq!(json["encoding"], "octet");
    assert_eq!(json["aliases"][0], "data");
    assert_eq!(json["file_name"], path.display().to_string());
    assert_eq!(json["input"], true);
}
