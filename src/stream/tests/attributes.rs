//! set_stream attributes and stream properties

use std::time::Duration;

use super::test_registry;
use crate::stream::core::{BufferMode, EndOfStream, EofAction, RepresentationErrors, StreamType};
use crate::stream::encoding::{Encoding, Newline};
use crate::stream::options::OptionValue;
use crate::stream::transport::ChannelKind;
use crate::stream::{Handle, StreamAttribute, StreamError, StreamSpec};

#[cfg(test)]
mod parse_tests {
    use super::*;

    #[test]
    fn test_parse_attributes() {
        assert_eq!(
            StreamAttribute::parse("buffer", OptionValue::from("line")).unwrap(),
            StreamAttribute::Buffer(BufferMode::Line)
        );
        assert_eq!(
            StreamAttribute::parse("timeout", OptionValue::from("infinite")).unwrap(),
            StreamAttribute::Timeout(None)
        );
        assert_eq!(
            StreamAttribute::parse("timeout", OptionValue::from(1.5)).unwrap(),
            StreamAttribute::Timeout(Some(Duration::from_millis(1500)))
        );
        assert_eq!(
            StreamAttribute::parse("encoding", OptionValue::from("unicode_le")).unwrap(),
            StreamAttribute::Encoding(Encoding::UnicodeLe)
        );
        assert_eq!(
            StreamAttribute::parse("representation_errors", OptionValue::from("xml")).unwrap().name(),
            "representation_errors"
        );
    }

    #[test]
    fn test_parse_rejects() {
        assert!(matches!(
            StreamAttribute::parse("colour", OptionValue::from("red")),
            Err(StreamError::Domain { domain: "stream_attribute", .. })
        ));
        assert!(matches!(
            StreamAttribute::parse("timeout", OptionValue::from(-1i64)),
            Err(StreamError::Domain { domain: "timeout", .. })
        ));
        assert!(matches!(
            StreamAttribute::parse("line_position", OptionValue::from(-3i64)),
            Err(StreamError::Domain { .. })
        ));
        assert!(matches!(
            StreamAttribute::parse("tty", OptionValue::from(1i64)),
            Err(StreamError::Type { .. })
        ));
    }
}

#[cfg(test)]
mod set_stream_tests {
    use super::*;

    #[test]
    fn test_set_on_single_stream() {
        let registry = test_registry();
        let mut io = registry.attach_thread();
        let s = registry.open_memory_input("", Encoding::Utf8);
        let h = Handle::from_stream(s.clone());
        let spec = StreamSpec::Handle(&h);

        io.set_stream(spec, StreamAttribute::EofAction(EofAction::Reset)).unwrap();
        io.set_stream(spec, StreamAttribute::Type(StreamType::Binary)).unwrap();
        io.set_stream(spec, StreamAttribute::Newline(Newline::Detect)).unwrap();
        io.set_stream(spec, StreamAttribute::FileName(Some("in.txt".to_string()))).unwrap();
        io.set_stream(spec, StreamAttribute::Alias("src".to_string())).unwrap();

        let g = s.lock().unwrap();
        assert_eq!(g.eof_action(), EofAction::Reset);
        assert_eq!(g.encoding(), Encoding::Octet);
        assert!(!g.is_text());
        assert_eq!(g.newline(), Newline::Detect);
        drop(g);
        assert_eq!(registry.filename(&s).unwrap().as_str(), "in.txt");
        assert!(registry.lookup_alias("src").is_some());

        io.set_stream(spec, StreamAttribute::Type(StreamType::Text)).unwrap();
        assert_eq!(s.lock().unwrap().encoding(), Encoding::Utf8);
    }

    #[test]
    fn test_detect_refused_on_output() {
        let registry = test_registry();
        let mut io = registry.attach_thread();
        let h = Handle::from_stream(registry.open_memory_output(Encoding::Utf8));
        assert!(io
            .set_stream(StreamSpec::Handle(&h), StreamAttribute::Newline(Newline::Detect))
            .is_err());
    }

    #[test]
    fn test_pair_sets_relevant_side() {
        let registry = test_registry();
        let mut io = registry.attach_thread();
        let input = registry.open_memory_input("", Encoding::Utf8);
        let output = registry.open_memory_output(Encoding::Utf8);
        let pair = Handle::pair(input.clone(), output.clone()).unwrap();
        let spec = StreamSpec::Handle(&pair);

        io.set_stream(spec, StreamAttribute::Buffer(BufferMode::Line)).unwrap();
        assert_eq!(output.lock().unwrap().buffering(), BufferMode::Line);
        assert_eq!(input.lock().unwrap().buffering(), BufferMode::Full);

        io.set_stream(spec, StreamAttribute::Encoding(Encoding::IsoLatin1)).unwrap();
        assert_eq!(output.lock().unwrap().encoding(), Encoding::IsoLatin1);
        assert_eq!(input.lock().unwrap().encoding(), Encoding::IsoLatin1);

        let err = io
            .set_stream(spec, StreamAttribute::Alias("both".to_string()))
            .unwrap_err();
        assert!(matches!(err, StreamError::Permission { kind: "stream_pair", .. }));
        let err = io.set_stream(spec, StreamAttribute::LinePosition(3)).unwrap_err();
        assert!(matches!(err, StreamError::Permission { .. }));
    }

    #[test]
    fn test_record_and_line_position() {
        let registry = test_registry();
        let mut io = registry.attach_thread();
        let s = registry.open_memory_output(Encoding::Utf8);
        let h = Handle::from_stream(s.clone());
        let spec = StreamSpec::Handle(&h);

        io.set_stream(spec, StreamAttribute::LinePosition(4)).unwrap();
        assert_eq!(registry.line_position(&s).unwrap(), 4);

        io.set_stream(spec, StreamAttribute::RecordPosition(false)).unwrap();
        assert!(registry.line_count(&s).is_err());
        assert!(io.set_stream(spec, StreamAttribute::LinePosition(1)).is_err());

        io.set_stream(spec, StreamAttribute::RecordPosition(true)).unwrap();
        assert_eq!(registry.line_count(&s).unwrap(), 1);
    }

    #[test]
    fn test_close_on_exec_needs_descriptor() {
        let registry = test_registry();
        let mut io = registry.attach_thread();
        let h = Handle::from_stream(registry.open_memory_output(Encoding::Utf8));
        assert!(matches!(
            io.set_stream(StreamSpec::Handle(&h), StreamAttribute::CloseOnExec(true)),
            Err(StreamError::Permission { action: "close_on_exec", .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_close_on_exec_on_file() {
        use crate::stream::{Mode, OpenOptions, Source};

        let registry = test_registry();
        let mut io = registry.attach_thread();
        let dir = tempfile::tempdir().unwrap();
        let s = registry
            .open(&Source::file(dir.path().join("f")), Mode::Write, &OpenOptions::new())
            .unwrap();
        let h = Handle::from_stream(s.clone());
        io.set_stream(StreamSpec::Handle(&h), StreamAttribute::CloseOnExec(false)).unwrap();
        assert_eq!(registry.properties(&s).unwrap().close_on_exec, Some(false));
        io.set_stream(StreamSpec::Handle(&h), StreamAttribute::CloseOnExec(true)).unwrap();
        assert_eq!(registry.properties(&s).unwrap().close_on_exec, Some(true));
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;

    #[test]
    fn test_properties_of_memory_input() {
        let registry = test_registry();
        let s = registry.open_memory_input("abc", Encoding::Utf8);
        registry.bind_alias(&s, "mem");
        let props = registry.properties(&s).unwrap();
        assert_eq!(props.id, s.id());
        assert!(props.input);
        assert!(!props.output);
        assert_eq!(props.channel, ChannelKind::Memory);
        assert_eq!(props.end_of_stream, Some(EndOfStream::Not));
        assert_eq!(props.stream_type, StreamType::Text);
        assert_eq!(props.aliases.len(), 1);
        assert!(props.reposition);
        assert_eq!(props.file_no, None);
        assert_eq!(props.representation_errors, RepresentationErrors::Error);
    }

    #[test]
    fn test_properties_serialize() {
        let registry = test_registry();
        let s = registry.open_memory_output(Encoding::UnicodeBe);
        let props = registry.properties(&s).unwrap();
        let json = serde_json::to_value(&props).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["encoding"], "unicode_be");
        assert_eq!(json["channel"], "memory");
        assert_eq!(json["mode"], "write");
        assert!(json["end_of_stream"].is_null());
    }

    #[test]
    fn test_enumerate_properties() {
        let registry = test_registry();
        let s = registry.open_memory_input("", Encoding::Utf8);
        let all = registry.stream_properties();
        let ids: Vec<u64> = all.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![0, 1, 2, s.id()]);
        registry.close_stream(&s, false).unwrap();
        assert_eq!(registry.stream_properties().len(), 3);
    }
}
