//! Session management for PTY-based process automation

mod builder;
mod cancel;
mod echo;
mod reader;
mod reaper;

pub use builder::{SessionBuilder, DEFAULT_EOF, DEFAULT_QUEUE_CAPACITY};
pub use cancel::CancelToken;

use crate::buffer::BufferManager;
use crate::pattern::{self, Matcher, Pattern};
use crate::pty::PtyControl;
use crate::result::{
    ExpectError, Match, MatchResult, INVALID_ARGUMENT, NOT_FOUND, TIMED_OUT,
};
use bytes::Bytes;
use portable_pty::ExitStatus;
use reader::QueueItem;
use reaper::ExitSlot;
use std::ffi::OsStr;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tracing::{debug, trace, Instrument, Span};

/// Line terminator appended by [`Session::send_line`]: what the Enter key sends.
pub const LINE_TERMINATOR: &str = "\r";

/// Interval at which [`Session::wait_exit`] re-checks the exit slot
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A running program attached to a pseudo-terminal.
///
/// Two background tasks serve each session: a reader that moves terminal
/// output into a bounded queue one byte at a time, and (for sessions created
/// with [`spawn`](Self::spawn)) a reaper that records the exit status. All
/// other work happens inside the calls made on the session, which take
/// `&mut self` so they cannot overlap.
///
/// # Examples
///
/// ```no_run
/// use ptyexpect::{Pattern, Session, DEFAULT_EOF};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut session = Session::builder()
///     .timeout(Duration::from_secs(5))
///     .spawn("rev", [] as [&str; 0])?;
///
/// session.send(b"hello\r").await?;
/// let result = session.expect(&["olleh".into()]).await;
/// assert_eq!(result.index, 0);
/// assert_eq!(&result.matched[..], b"olleh");
///
/// session.send_eof().await?;
/// # Ok(())
/// # }
/// ```
pub struct Session {
    process_id: Option<u32>,
    writer: Option<Arc<Mutex<Box<dyn Write + Send>>>>,
    control: Option<Box<dyn PtyControl>>,
    queue: mpsc::Receiver<QueueItem>,
    cancel: CancelToken,
    buffer: BufferManager,
    eof_reached: bool,
    exit: ExitSlot,
    timeout: Option<Duration>,
    echo: echo::EchoSink,
    eof_sequence: Bytes,
    debug: bool,
    terminated: bool,
    span: Span,
}

impl Session {
    /// Create a new session builder.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Spawn `program` with `args` using the default configuration.
    ///
    /// Shorthand for `Session::builder().spawn(program, args)`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use ptyexpect::Session;
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let session = Session::spawn("ftp", ["ftp.example.com"])?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn spawn<I, S>(program: impl AsRef<OsStr>, args: I) -> Result<Self, ExpectError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        SessionBuilder::new().spawn(program, args)
    }

    /// Wait until one of `patterns` matches the output.
    ///
    /// Patterns are tried in argument order against every new state of the
    /// buffer; the first one that matches anywhere wins, even if a later
    /// pattern matches earlier in the buffer. On a match, everything up to
    /// and including the matched bytes is removed from the buffer. Bytes left
    /// over from earlier calls are checked before any new output is awaited.
    ///
    /// The call ends with:
    ///
    /// - the pattern's index and a copy of the matched bytes;
    /// - [`NOT_FOUND`] and no error when the output ended cleanly (then and on
    ///   every later call, without reading again);
    /// - [`NOT_FOUND`] and [`ExpectError::ReadError`] when reading failed;
    /// - [`TIMED_OUT`] and [`ExpectError::Timeout`] when the configured
    ///   timeout elapsed;
    /// - [`TIMED_OUT`] and [`ExpectError::Cancelled`] when the session was
    ///   cancelled;
    /// - [`INVALID_ARGUMENT`] and [`ExpectError::InvalidPattern`] when a
    ///   pattern cannot be evaluated; nothing is read or changed in that case.
    ///
    /// `NOT_FOUND` without an error never means "not there yet": on a live
    /// stream a missing pattern shows up as a timeout, or as a call that keeps
    /// waiting when no timeout is set.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use ptyexpect::{Pattern, Session};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// # let mut session = Session::spawn("rev", [] as [&str; 0])?;
    /// session.send(b"hello\r").await?;
    ///
    /// // The terminal echoes the input before rev answers
    /// let patterns = ["hello".into(), "olleh".into()];
    /// assert_eq!(session.expect(&patterns).await.index, 0);
    /// assert_eq!(session.expect(&patterns).await.index, 1);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn expect(&mut self, patterns: &[Pattern]) -> MatchResult {
        let span = self.span.clone();
        self.expect_inner(patterns).instrument(span).await
    }

    async fn expect_inner(&mut self, patterns: &[Pattern]) -> MatchResult {
        let matchers = match pattern::compile(patterns) {
            Ok(matchers) => matchers,
            Err(e) => {
                debug!(error = %e, "rejecting pattern");
                return MatchResult::failed(INVALID_ARGUMENT, e.into());
            }
        };

        if self.eof_reached {
            debug!("already at end of stream");
            return MatchResult::eof();
        }

        let timeout = self.timeout;
        let deadline = timeout.map(|t| Instant::now() + t);

        // Leftovers from an earlier call are checked before waiting
        let mut grown = !self.buffer.is_empty();

        loop {
            if grown {
                if let Some(result) = self.try_match(&matchers) {
                    return result;
                }
            }

            let item = {
                let cancel = &self.cancel;
                let queue = &mut self.queue;
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        debug!("expect cancelled");
                        return MatchResult::failed(TIMED_OUT, ExpectError::Cancelled);
                    }
                    () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)),
                        if deadline.is_some() =>
                    {
                        let duration = timeout.unwrap_or_default();
                        debug!(?duration, "expect timed out");
                        return MatchResult::failed(TIMED_OUT, ExpectError::Timeout { duration });
                    }
                    item = queue.recv() => item,
                }
            };

            match item {
                Some(QueueItem::Byte(byte)) => {
                    self.buffer.push(byte);
                    grown = true;
                }
                Some(QueueItem::Eof) => {
                    debug!("end of stream");
                    self.eof_reached = true;
                    return MatchResult::eof();
                }
                Some(QueueItem::Error(e)) => {
                    debug!(error = %e, "read error");
                    self.eof_reached = true;
                    return MatchResult::failed(NOT_FOUND, ExpectError::ReadError(e));
                }
                None => {
                    debug!("reader task gone");
                    self.eof_reached = true;
                    return MatchResult::failed(NOT_FOUND, ExpectError::ReaderStopped);
                }
            }
        }
    }

    fn try_match(&mut self, matchers: &[Box<dyn Matcher>]) -> Option<MatchResult> {
        if self.debug {
            trace!(buffer = %self.buffer.to_string_lossy(), "checking patterns");
        }
        let (index, m) = pattern::first_match(matchers, self.buffer.as_bytes())?;
        let found = self.buffer.take_match(m.start, m.end);
        debug!(index, start = m.start, end = m.end, "pattern matched");
        if self.debug {
            trace!(remaining = %self.buffer.to_string_lossy(), "buffer after match");
        }
        Some(MatchResult::matched(index, found))
    }

    /// Like [`expect`](Self::expect) but returns only the index or sentinel.
    pub async fn expect_index(&mut self, patterns: &[Pattern]) -> isize {
        self.expect(patterns).await.index
    }

    /// Like [`expect`](Self::expect) but treats anything other than a match
    /// as an error.
    ///
    /// End of stream becomes [`ExpectError::NoMatch`]. Use this where a
    /// missing pattern should abort the whole script.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use ptyexpect::Session;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// # let mut session = Session::spawn("telnet", ["localhost"])?;
    /// session.expect_or_fail(&["username:".into()]).await?;
    /// session.send_line("lee").await?;
    /// session.expect_or_fail(&["password:".into()]).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn expect_or_fail(&mut self, patterns: &[Pattern]) -> Result<Match, ExpectError> {
        self.expect(patterns).await.into_result()
    }

    /// Send raw bytes to the process.
    ///
    /// Control characters go through verbatim:
    ///
    /// ```no_run
    /// use ptyexpect::Session;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// # let mut session = Session::spawn("bash", [] as [&str; 0])?;
    /// // Ctrl-C
    /// session.send(&[0x03]).await?;
    ///
    /// // Up arrow
    /// session.send(b"\x1b[A").await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Fails if the terminal has been closed by [`terminate`](Self::terminate)
    /// or the write fails.
    pub async fn send(&mut self, data: &[u8]) -> Result<(), ExpectError> {
        let writer = self
            .writer
            .clone()
            .ok_or_else(|| ExpectError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "terminal closed")))?;
        let data = data.to_vec();
        if self.debug {
            trace!(parent: &self.span, bytes = ?String::from_utf8_lossy(&data), "sending");
        }

        tokio::task::spawn_blocking(move || {
            let mut writer = writer.blocking_lock();
            writer.write_all(&data)?;
            writer.flush()
        })
        .await
        .map_err(|e| ExpectError::Io(io::Error::other(e)))??;

        Ok(())
    }

    /// Send a string verbatim.
    pub async fn send_str(&mut self, s: &str) -> Result<(), ExpectError> {
        self.send(s.as_bytes()).await
    }

    /// Send `line` followed by [`LINE_TERMINATOR`].
    pub async fn send_line(&mut self, line: &str) -> Result<(), ExpectError> {
        self.send_lines([line]).await
    }

    /// Send each line followed by [`LINE_TERMINATOR`], stopping at the first
    /// failed write.
    pub async fn send_lines<I, S>(&mut self, lines: I) -> Result<(), ExpectError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            let mut data = String::with_capacity(line.as_ref().len() + LINE_TERMINATOR.len());
            data.push_str(line.as_ref());
            data.push_str(LINE_TERMINATOR);
            self.send(data.as_bytes()).await?;
        }
        Ok(())
    }

    /// Send `s` one character at a time, pausing `delay` before each.
    ///
    /// For programs that misbehave when input arrives faster than a person
    /// types. Returns the number of bytes written, not characters.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use ptyexpect::Session;
    /// use std::time::Duration;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// # let mut session = Session::spawn("cat", [] as [&str; 0])?;
    /// let sent = session.send_slow(Duration::from_millis(50), "HELLO\r世界\r").await?;
    /// assert_eq!(sent, 13);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn send_slow(&mut self, delay: Duration, s: &str) -> Result<usize, ExpectError> {
        let mut utf8 = [0u8; 4];
        for ch in s.chars() {
            tokio::time::sleep(delay).await;
            self.send(ch.encode_utf8(&mut utf8).as_bytes()).await?;
        }
        Ok(s.len())
    }

    /// Send the configured end-of-input sequence ([`DEFAULT_EOF`] unless
    /// overridden with [`SessionBuilder::eof_sequence`]).
    pub async fn send_eof(&mut self) -> Result<(), ExpectError> {
        let sequence = self.eof_sequence.clone();
        self.send(&sequence).await
    }

    /// The end-of-input sequence sent by [`send_eof`](Self::send_eof).
    pub fn eof_sequence(&self) -> &[u8] {
        &self.eof_sequence
    }

    /// Discard buffered output that no match has consumed.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Output read but not consumed by a match.
    pub fn buffer(&self) -> &[u8] {
        self.buffer.as_bytes()
    }

    /// [`buffer`](Self::buffer) decoded lossily.
    pub fn buffer_string(&self) -> String {
        self.buffer.to_string_lossy()
    }

    /// Whether the output stream has ended.
    pub fn is_eof(&self) -> bool {
        self.eof_reached
    }

    /// Set the timeout for later `expect` calls; zero disables it.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
    }

    /// [`set_timeout`](Self::set_timeout) in whole seconds.
    pub fn set_timeout_secs(&mut self, secs: u64) {
        self.set_timeout(Duration::from_secs(secs));
    }

    /// Current per-call timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Copy every byte read from the terminal to `target`; `None` stops.
    ///
    /// Only output read from now on is copied.
    pub fn set_echo(&mut self, target: Option<Box<dyn Write + Send>>) {
        self.echo.set(target);
    }

    /// Echo output to standard output (`true`) or stop echoing (`false`).
    pub fn log_user(&mut self, on: bool) {
        self.set_echo(on.then(echo::stdout));
    }

    /// A handle to this session's cancellation token.
    ///
    /// Cancelling it has the same effect on the process as
    /// [`terminate`](Self::terminate) and makes a pending or later `expect`
    /// return [`ExpectError::Cancelled`].
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Kill the process and close the terminal.
    ///
    /// Buffered output is discarded. The session should not be used
    /// afterwards; calls return errors or the cancelled sentinel.
    pub fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        debug!(parent: &self.span, "terminating");
        self.terminated = true;
        // Kill before closing so nothing reaches a live process
        self.cancel.cancel();
        self.buffer.clear();
        self.writer = None;
        self.control = None;
    }

    /// Whether [`terminate`](Self::terminate) has been called.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// OS process id, if known.
    pub fn process_id(&self) -> Option<u32> {
        self.process_id
    }

    /// Whether the process is still believed to be running.
    ///
    /// Based on the reaper's record, so always `true` for sessions created
    /// with [`SessionBuilder::spawn_scoped`] until they are terminated.
    pub fn is_alive(&self) -> bool {
        !self.terminated && self.exit.get().is_none()
    }

    /// The process exit result, once the reaper has recorded it.
    ///
    /// `None` while the process runs and, for sessions created with
    /// [`SessionBuilder::spawn_scoped`], forever.
    pub fn exit_result(&self) -> Option<&io::Result<ExitStatus>> {
        self.exit.get()
    }

    /// Poll [`exit_result`](Self::exit_result) for up to `timeout`.
    pub async fn wait_exit(&self, timeout: Duration) -> Option<&io::Result<ExitStatus>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(result) = self.exit.get() {
                return Some(result);
            }
            if Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(EXIT_POLL_INTERVAL).await;
        }
    }

    /// Change the terminal size.
    pub fn resize(&self, rows: u16, cols: u16) -> Result<(), ExpectError> {
        match &self.control {
            Some(control) => control.resize(rows, cols),
            None => Err(ExpectError::Pty("terminal cannot be resized".to_string())),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.terminated {
            debug!(parent: &self.span, "session dropped, killing process");
            self.cancel.cancel();
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("process_id", &self.process_id)
            .field("buffered", &self.buffer.len())
            .field("eof_reached", &self.eof_reached)
            .field("timeout", &self.timeout)
            .field("echo", &self.echo)
            .field("terminated", &self.terminated)
            .finish_non_exhaustive()
    }
}
