//! Configuration applied to newly opened streams

use std::fs;

use crate::common::registry_with;
use yaoxiang_stream::stream::{Encoding, Mode, Newline, OpenOptions, Source};
use yaoxiang_stream::util::config::{load_config_file, parse_config};

#[test]
fn test_default_encoding_and_newline() {
    let config = parse_config(
        r#"
default_encoding = "iso_latin_1"
newline = "dos"
"#,
    )
    .unwrap();
    let registry = registry_with(config);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("latin.txt");

    let s = registry
        .open(&Source::file(&path), Mode::Write, &OpenOptions::new())
        .unwrap();
    {
        let mut g = s.lock().unwrap();
        assert_eq!(g.encoding(), Encoding::IsoLatin1);
        assert_eq!(g.newline(), Newline::Dos);
        let r = g.write_str("é\n");
        g.finish(r).unwrap();
    }
    registry.close_stream(&s, false).unwrap();
    assert_eq!(fs::read(&path).unwrap(), vec![0xE9, b'\r', b'\n']);
}

#[test]
fn test_open_options_override_config() {
    let config = parse_config("default_encoding = \"iso_latin_1\"").unwrap();
    let registry = registry_with(config);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("utf8.txt");

    let s = registry
        .open(
            &Source::file(&path),
            Mode::Write,
            &OpenOptions::new().encoding(Encoding::Utf8).newline(Newline::Posix),
        )
        .unwrap();
    {
        let mut g = s.lock().unwrap();
        let r = g.write_str("é\n");
        g.finish(r).unwrap();
    }
    registry.close_stream(&s, false).unwrap();
    assert_eq!(fs::read(&path).unwrap(), vec![0xC3, 0xA9, b'\n']);
}

#[test]
fn test_config_file_buffer_size() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stream.toml");
    fs::write(&path, "buffer_size = 8\nmax_pending = 2\n").unwrap();
    let registry = registry_with(load_config_file(&path).unwrap());

    let s = registry.open_memory_input("abcdef", Encoding::Utf8);
    let props = registry.properties(&s).unwrap();
    assert_eq!(props.buffer_size, 8);
}
