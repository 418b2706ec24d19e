//! Background task moving terminal output into the session queue

use super::cancel::CancelToken;
use super::echo::EchoSink;
use crate::pty::is_hangup;
use std::io::{self, BufReader, ErrorKind, Read};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, trace, Span};

/// Pause before retrying a read that would have blocked
pub(crate) const RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// One unit handed from the reader task to the matcher.
#[derive(Debug)]
pub(crate) enum QueueItem {
    /// A byte of output
    Byte(u8),
    /// The stream closed cleanly; nothing follows
    Eof,
    /// Reading failed; nothing follows
    Error(io::Error),
}

impl QueueItem {
    fn is_terminal(&self) -> bool {
        !matches!(self, QueueItem::Byte(_))
    }
}

/// Reads the terminal one byte at a time and forwards each byte, or the
/// reason reading stopped, to the queue.
pub(crate) struct ReaderTask {
    pub(crate) reader: Box<dyn Read + Send>,
    pub(crate) queue: mpsc::Sender<QueueItem>,
    pub(crate) cancel: CancelToken,
    pub(crate) echo: EchoSink,
    pub(crate) debug: bool,
    pub(crate) span: Span,
}

impl ReaderTask {
    pub(crate) fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("ptyexpect-reader".to_string())
            .spawn(move || self.run())
    }

    fn run(self) {
        let span = self.span.clone();
        let _enter = span.enter();
        debug!("reader starting");

        let mut reader = BufReader::new(self.reader);
        let mut unit = [0u8; 1];

        loop {
            if self.cancel.is_cancelled() {
                debug!("reader cancelled");
                return;
            }

            let item = match reader.read(&mut unit) {
                Ok(0) => QueueItem::Eof,
                Ok(_) => {
                    if self.debug {
                        trace!(byte = unit[0], "reader got byte");
                    }
                    self.echo.tee(unit[0]);
                    // End of what the terminal handed over in one read
                    if reader.buffer().is_empty() {
                        self.echo.flush();
                    }
                    QueueItem::Byte(unit[0])
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if self.debug {
                        trace!("reader would block");
                    }
                    thread::sleep(RETRY_INTERVAL);
                    continue;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if is_hangup(&e) => QueueItem::Eof,
                Err(e) => QueueItem::Error(e),
            };

            if self.cancel.is_cancelled() {
                debug!("reader cancelled");
                return;
            }

            let terminal = item.is_terminal();
            if terminal {
                debug!(?item, "reader ending");
            }
            // Blocks while the queue is full
            if self.queue.blocking_send(item).is_err() {
                debug!("session dropped, reader ending");
                return;
            }
            if terminal {
                return;
            }
        }
    }
}
