//! see/tell family and session protocol

use std::fs;
use std::sync::Arc;

use super::test_registry;
use crate::stream::encoding::Encoding;
use crate::stream::StreamError;

#[cfg(test)]
mod edinburgh_tests {
    use super::*;

    #[test]
    fn test_tell_and_told() {
        let registry = test_registry();
        let mut io = registry.attach_thread();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let name = path.display().to_string();

        io.tell(&name).unwrap();
        assert_eq!(io.telling(), name);
        io.write_output("first").unwrap();

        // A second tell of the same file reuses the stream.
        let before = io.current_output();
        io.tell(&name).unwrap();
        assert!(Arc::ptr_eq(&io.current_output(), &before));
        assert_eq!(io.output_depth(), 1);

        io.told().unwrap();
        assert_eq!(io.telling(), "user");
        assert_eq!(fs::read_to_string(&path).unwrap(), "first");

        io.append(&name).unwrap();
        io.write_output(" second").unwrap();
        io.told().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "first second");
    }

    #[test]
    fn test_see_and_seen() {
        let registry = test_registry();
        let mut io = registry.attach_thread();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.txt");
        fs::write(&path, "hi").unwrap();
        let name = path.display().to_string();

        assert_eq!(io.seeing(), "user");
        io.see(&name).unwrap();
        assert_eq!(io.seeing(), name);
        assert_eq!(io.read_code().unwrap(), Some('h' as u32));

        io.see("user").unwrap();
        assert_eq!(io.seeing(), "user");
        io.see(&name).unwrap();
        assert_eq!(io.read_code().unwrap(), Some('i' as u32));

        io.seen().unwrap();
        assert_eq!(io.seeing(), "user");
        assert!(registry.find_stream_from_file(&name, true, false).is_none());
    }

    #[test]
    fn test_see_by_alias() {
        let registry = test_registry();
        let mut io = registry.attach_thread();
        let s = registry.open_memory_input("q", Encoding::Utf8);
        registry.bind_alias(&s, "quiz");
        io.see("quiz").unwrap();
        assert!(Arc::ptr_eq(&io.current_input(), &s));
        assert_eq!(io.seeing(), "quiz");
        assert_eq!(io.input_depth(), 0);
    }

    #[test]
    fn test_see_missing_file() {
        let registry = test_registry();
        let mut io = registry.attach_thread();
        let err = io.see("/nonexistent/definitely/not/here").unwrap_err();
        assert!(matches!(err, StreamError::Open { .. }));
        assert_eq!(io.seeing(), "user");
    }

    #[test]
    fn test_tell_string() {
        let registry = test_registry();
        let mut io = registry.attach_thread();
        io.tell_string(Encoding::Utf8);
        io.write_output("héllo").unwrap();
        assert_eq!(io.told_string().unwrap(), "héllo");
        assert!(Arc::ptr_eq(&io.current_output(), registry.std_output()));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_told_string_needs_string_sink() {
        let registry = test_registry();
        let mut io = registry.attach_thread();
        assert!(matches!(io.told_string(), Err(StreamError::Permission { .. })));
        assert!(!registry.std_output().is_erased());
    }
}

#[cfg(test)]
mod protocol_tests {
    use super::*;

    #[test]
    fn test_protocol_records_user_streams() {
        let registry = test_registry();
        let mut io = registry.attach_thread();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.log");

        io.open_protocol(&path, false).unwrap();
        assert!(io.protocolling().is_some());
        io.write_output("visible").unwrap();
        io.protocol(b" [raw]").unwrap();

        // Streams other than the user streams are not recorded.
        let other = registry.open_memory_output(Encoding::Utf8);
        {
            let mut g = other.lock().unwrap();
            g.write_str("hidden").unwrap();
        }

        io.no_protocol().unwrap();
        assert!(io.protocolling().is_none());
        assert!(registry.std_output().lock().unwrap().tee.is_none());
        assert_eq!(fs::read_to_string(&path).unwrap(), "visible [raw]");

        io.write_output(" after").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "visible [raw]");
    }

    #[test]
    fn test_protocol_append_and_replace() {
        let registry = test_registry();
        let mut io = registry.attach_thread();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.log");
        fs::write(&path, "old;").unwrap();

        io.open_protocol(&path, true).unwrap();
        io.write_output("new").unwrap();
        let first = io.protocolling().unwrap();

        let second_path = dir.path().join("second.log");
        io.open_protocol(&second_path, false).unwrap();
        assert!(first.is_erased());
        io.write_output("2").unwrap();
        io.no_protocol().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "old;new");
        assert_eq!(fs::read_to_string(&second_path).unwrap(), "2");
    }

    #[test]
    fn test_protocol_survives_close_on_abort() {
        let registry = test_registry();
        let mut io = registry.attach_thread();
        let dir = tempfile::tempdir().unwrap();
        io.open_protocol(&dir.path().join("p.log"), false).unwrap();
        registry.close_files(false);
        assert!(io.protocolling().is_some());
        io.no_protocol().unwrap();
    }
}
