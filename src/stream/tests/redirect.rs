//! Redirection and capture tests

use std::sync::Arc;

use super::test_registry;
use crate::stream::encoding::Encoding;
use crate::stream::redirect::{CaptureKind, Captured, RedirectTarget};
use crate::stream::{Atom, Result, StreamError, StreamSpec};

#[cfg(test)]
mod input_redirect_tests {
    use super::*;

    #[test]
    fn test_discard_after_failure_restores_input() {
        let registry = test_registry();
        let mut io = registry.attach_thread();
        let before = io.current_input();
        let file = registry.open_memory_input("body", Encoding::Utf8);

        let outcome: Result<()> = {
            let redirect = io.redirect_input("load", file.clone()).unwrap();
            assert!(Arc::ptr_eq(&redirect.current_input(), &file));
            assert_eq!(redirect.input_depth(), 1);
            let nested: Result<()> = Err(StreamError::Cancelled {
                reason: "nested failure".to_string(),
            });
            if nested.is_err() {
                redirect.discard();
            }
            nested
        };

        assert!(outcome.is_err());
        assert!(Arc::ptr_eq(&io.current_input(), &before));
        assert_eq!(io.input_depth(), 0);
    }

    #[test]
    fn test_drop_pops_once() {
        let registry = test_registry();
        let mut io = registry.attach_thread();
        let outer = registry.open_memory_input("", Encoding::Utf8);
        let inner = registry.open_memory_input("", Encoding::Utf8);

        io.push_input("outer");
        io.set_input(StreamSpec::Handle(&crate::stream::Handle::from_stream(outer.clone())))
            .unwrap();
        {
            let _redirect = io.redirect_input("inner", inner.clone()).unwrap();
        }
        assert!(Arc::ptr_eq(&io.current_input(), &outer));
        assert_eq!(io.input_depth(), 1);
    }

    #[test]
    fn test_close_reports_status_and_tolerates_closed_stream() {
        let registry = test_registry();
        let mut io = registry.attach_thread();
        let file = registry.open_memory_input("x", Encoding::Utf8);

        let redirect = io.redirect_input("load", file.clone()).unwrap();
        assert_eq!(redirect.read_code().unwrap(), Some('x' as u32));
        registry.close_stream(&file, false).unwrap();
        redirect.close().unwrap();
        assert!(Arc::ptr_eq(&io.current_input(), registry.std_input()));
    }

    #[test]
    fn test_redirect_rejects_output_stream() {
        let registry = test_registry();
        let mut io = registry.attach_thread();
        let sink = registry.open_memory_output(Encoding::Utf8);
        assert!(io.redirect_input("load", sink).is_err());
        assert_eq!(io.input_depth(), 0);
    }

    #[test]
    fn test_input_context_innermost_first() {
        let registry = test_registry();
        let mut io = registry.attach_thread();
        io.push_input("consult");
        io.push_input("include");
        let kinds: Vec<String> = io.input_context().into_iter().map(|c| c.kind.to_string()).collect();
        assert_eq!(kinds, vec!["include", "consult"]);
        assert!(io.pop_input());
        assert!(io.pop_input());
        assert!(!io.pop_input());
    }

    #[test]
    fn test_pop_skips_closed_stream() {
        let registry = test_registry();
        let mut io = registry.attach_thread();
        let file = registry.open_memory_input("", Encoding::Utf8);
        let handle = crate::stream::Handle::from_stream(file.clone());
        io.set_input(StreamSpec::Handle(&handle)).unwrap();
        io.push_input("saved");
        io.set_input(StreamSpec::Name("user_input")).unwrap();

        registry.close_stream(&file, false).unwrap();
        assert!(io.pop_input());
        assert!(Arc::ptr_eq(&io.current_input(), registry.std_input()));
    }
}

#[cfg(test)]
mod output_redirect_tests {
    use super::*;

    #[test]
    fn test_capture_string() {
        let registry = test_registry();
        let mut io = registry.attach_thread();
        let before = io.current_output();
        let (value, captured) = io
            .with_output_to(RedirectTarget::Capture(CaptureKind::String), |io| {
                io.write_output("héllo €")?;
                Ok(42)
            })
            .unwrap();
        assert_eq!(value, 42);
        assert_eq!(captured, Some(Captured::String("héllo €".to_string())));
        assert!(Arc::ptr_eq(&io.current_output(), &before));
        assert_eq!(io.output_depth(), 0);
    }

    #[test]
    fn test_capture_kinds() {
        let registry = test_registry();
        let mut io = registry.attach_thread();
        let capture = |io: &mut crate::stream::ThreadIo, kind: CaptureKind| {
            io.with_output_to(RedirectTarget::Capture(kind), |io| io.write_output("ab"))
                .unwrap()
                .1
                .unwrap()
        };
        assert_eq!(capture(&mut io, CaptureKind::Atom), Captured::Atom(Atom::new("ab")));
        assert_eq!(capture(&mut io, CaptureKind::Codes), Captured::Codes(vec![97, 98]));
        assert_eq!(
            capture(&mut io, CaptureKind::CodesWithTail(vec![0])),
            Captured::Codes(vec![97, 98, 0])
        );
        assert_eq!(capture(&mut io, CaptureKind::Chars), Captured::Chars(vec!['a', 'b']));
        assert_eq!(
            capture(&mut io, CaptureKind::CharsWithTail(vec!['!'])),
            Captured::Chars(vec!['a', 'b', '!'])
        );
    }

    #[test]
    fn test_failure_discards_capture() {
        let registry = test_registry();
        let mut io = registry.attach_thread();
        let streams_before = registry.len();
        let result = io.with_output_to(RedirectTarget::Capture(CaptureKind::String), |io| {
            io.write_output("partial")?;
            Err::<(), _>(StreamError::Cancelled {
                reason: "abort".to_string(),
            })
        });
        assert!(matches!(result, Err(StreamError::Cancelled { .. })));
        assert!(Arc::ptr_eq(&io.current_output(), registry.std_output()));
        assert_eq!(io.output_depth(), 0);
        assert_eq!(registry.len(), streams_before);
    }

    #[test]
    fn test_nested_captures() {
        let registry = test_registry();
        let mut io = registry.attach_thread();
        let (inner, outer) = io
            .with_output_to(RedirectTarget::Capture(CaptureKind::String), |io| {
                io.write_output("outer ")?;
                let (_, inner) = io.with_output_to(RedirectTarget::Capture(CaptureKind::String), |io| {
                    io.write_output("inner")
                })?;
                io.write_output("again")?;
                Ok(inner)
            })
            .unwrap();
        assert_eq!(inner, Some(Captured::String("inner".to_string())));
        assert_eq!(outer, Some(Captured::String("outer again".to_string())));
    }

    #[test]
    fn test_redirect_to_alias_without_current() {
        let registry = test_registry();
        let mut io = registry.attach_thread();
        let sink = registry.open_memory_output(Encoding::Utf8);
        registry.bind_alias(&sink, "log");

        let redirect = io
            .redirect_output(RedirectTarget::Stream(StreamSpec::Name("log")), false)
            .unwrap();
        assert!(Arc::ptr_eq(redirect.sink(), &sink));
        assert!(Arc::ptr_eq(&redirect.current_output(), registry.std_output()));
        assert_eq!(redirect.close().unwrap(), None);
        assert_eq!(io.output_depth(), 0);
    }

    #[test]
    fn test_drop_restores_output() {
        let registry = test_registry();
        let mut io = registry.attach_thread();
        {
            let redirect = io
                .redirect_output(RedirectTarget::Capture(CaptureKind::Codes), true)
                .unwrap();
            redirect.write_output("lost").unwrap();
        }
        assert!(Arc::ptr_eq(&io.current_output(), registry.std_output()));
        assert_eq!(registry.len(), 3);
    }
}
