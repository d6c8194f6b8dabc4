//! Per-thread redirection through the public API

use std::fs;
use std::sync::Arc;
use std::thread;

use crate::common::registry;
use yaoxiang_stream::stream::{CaptureKind, Captured, RedirectTarget, StreamError, StreamSpec};

#[test]
fn test_capture_restores_output() {
    let registry = registry();
    let mut io = registry.attach_thread();

    let (value, captured) = io
        .with_output_to(RedirectTarget::Capture(CaptureKind::String), |io| {
            io.write_output("hello ")?;
            io.write_output("wörld")?;
            Ok(42)
        })
        .unwrap();
    assert_eq!(value, 42);
    assert_eq!(captured, Some(Captured::String("hello wörld".to_string())));
    assert!(Arc::ptr_eq(&io.current_output(), &io.user_output()));
    assert_eq!(io.output_depth(), 0);
}

#[test]
fn test_failed_capture_is_discarded() {
    let registry = registry();
    let mut io = registry.attach_thread();
    let streams = registry.len();

    let result: Result<((), Option<Captured>), StreamError> =
        io.with_output_to(RedirectTarget::Capture(CaptureKind::Codes), |io| {
            io.write_output("lost")?;
            Err(StreamError::Domain {
                domain: "answer",
                value: "none".to_string(),
                message: None,
            })
        });
    assert!(result.is_err());
    assert_eq!(io.output_depth(), 0);
    assert!(Arc::ptr_eq(&io.current_output(), &io.user_output()));
    assert_eq!(registry.len(), streams);
}

#[test]
fn test_tell_inside_capture() {
    let registry = registry();
    let mut io = registry.attach_thread();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("inner.txt");
    let name = path.display().to_string();

    let (_, captured) = io
        .with_output_to(RedirectTarget::Capture(CaptureKind::Chars), |io| {
            io.write_output("a")?;
            io.tell(&name)?;
            io.write_output("to file")?;
            io.told()?;
            io.write_output("b")
        })
        .unwrap();
    assert_eq!(captured, Some(Captured::Chars(vec!['a', 'b'])));
    assert_eq!(fs::read_to_string(&path).unwrap(), "to file");
}

#[test]
fn test_redirect_to_alias() {
    let registry = registry();
    let mut io = registry.attach_thread();
    let sink = registry.open_memory_output(yaoxiang_stream::stream::Encoding::Utf8);
    registry.bind_alias(&sink, "sink");

    io.with_output_to(RedirectTarget::Stream(StreamSpec::Name("sink")), |io| {
        assert!(Arc::ptr_eq(&io.current_output(), &sink));
        io.write_output("kept")
    })
    .unwrap();
    assert!(!sink.is_erased());
    assert!(Arc::ptr_eq(&io.current_output(), &io.user_output()));
}

#[test]
fn test_threads_redirect_independently() {
    let registry = registry();
    let workers: Vec<_> = (0..4)
        .map(|n| {
            let registry = registry.clone();
            thread::spawn(move || {
                let mut io = registry.attach_thread();
                let (_, captured) = io
                    .with_output_to(RedirectTarget::Capture(CaptureKind::String), |io| {
                        for _ in 0..100 {
                            io.write_output(&n.to_string())?;
                        }
                        Ok(())
                    })
                    .unwrap();
                (n, captured)
            })
        })
        .collect();

    for worker in workers {
        let (n, captured) = worker.join().unwrap();
        assert_eq!(captured, Some(Captured::String(n.to_string().repeat(100))));
    }
}
