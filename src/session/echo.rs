//! Live copy of terminal output to an external writer

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::warn;

/// Shared slot for the echo target, swapped by the session and written by
/// the reader task.
#[derive(Clone, Default)]
pub(crate) struct EchoSink {
    target: Arc<Mutex<Option<Box<dyn Write + Send>>>>,
}

impl EchoSink {
    /// Replace the target; `None` turns echoing off.
    pub(crate) fn set(&self, target: Option<Box<dyn Write + Send>>) {
        let mut slot = self.target.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = slot.as_mut() {
            let _ = old.flush();
        }
        *slot = target;
    }

    pub(crate) fn is_on(&self) -> bool {
        self.target
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Copy one byte to the target, if any.
    ///
    /// A failing target is dropped so the reader keeps going.
    pub(crate) fn tee(&self, byte: u8) {
        self.with_target(|target| target.write_all(&[byte]));
    }

    /// Push everything teed so far out of the target's buffers.
    pub(crate) fn flush(&self) {
        self.with_target(|target| target.flush());
    }

    fn with_target(&self, op: impl FnOnce(&mut Box<dyn Write + Send>) -> io::Result<()>) {
        let mut slot = self.target.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(target) = slot.as_mut() else {
            return;
        };
        if let Err(e) = op(target) {
            warn!(error = %e, "echo target failed, disabling echo");
            *slot = None;
        }
    }
}

impl fmt::Debug for EchoSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EchoSink")
            .field("on", &self.is_on())
            .finish()
    }
}

/// Echo target that writes to the process's standard output.
pub(crate) fn stdout() -> Box<dyn Write + Send> {
    Box::new(io::stdout())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_tee_without_target_is_noop() {
        let sink = EchoSink::default();
        assert!(!sink.is_on());
        sink.tee(b'x');
    }

    #[test]
    fn test_tee_copies_until_switched_off() {
        let sink = EchoSink::default();
        let capture = Capture::default();
        sink.set(Some(Box::new(capture.clone())));

        for byte in b"hi\n" {
            sink.tee(*byte);
        }
        sink.set(None);
        sink.tee(b'!');

        assert_eq!(&*capture.0.lock().unwrap(), b"hi\n");
    }

    /// Shows bytes only once flushed, like a line-buffered stdout.
    #[derive(Clone, Default)]
    struct Buffered {
        pending: Vec<u8>,
        shown: Arc<Mutex<Vec<u8>>>,
    }

    impl Write for Buffered {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.pending.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.shown.lock().unwrap().append(&mut self.pending);
            Ok(())
        }
    }

    #[test]
    fn test_flush_shows_prompt_without_newline() {
        let sink = EchoSink::default();
        let target = Buffered::default();
        let shown = target.shown.clone();
        sink.set(Some(Box::new(target)));

        for byte in b"Password: " {
            sink.tee(*byte);
        }
        assert!(shown.lock().unwrap().is_empty());

        sink.flush();
        assert_eq!(&*shown.lock().unwrap(), b"Password: ");
    }

    #[test]
    fn test_failing_flush_is_dropped() {
        struct NoFlush;

        impl Write for NoFlush {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                Ok(buf.len())
            }

            fn flush(&mut self) -> io::Result<()> {
                Err(io::ErrorKind::BrokenPipe.into())
            }
        }

        let sink = EchoSink::default();
        sink.set(Some(Box::new(NoFlush)));
        sink.tee(b'x');
        assert!(sink.is_on());
        sink.flush();
        assert!(!sink.is_on());
    }

    #[test]
    fn test_failing_target_is_dropped() {
        let sink = EchoSink::default();
        sink.set(Some(Box::new(Broken)));
        sink.tee(b'x');
        assert!(!sink.is_on());
    }
}
