//! Session builder for configuration

use super::cancel::CancelToken;
use super::echo::{self, EchoSink};
use super::reader::ReaderTask;
use super::reaper::{self, ExitSlot};
use super::Session;
use crate::buffer::BufferManager;
use crate::pty::{
    default_provider, ProcessHandle, PtyProcess, PtyProvider, SpawnRequest, DEFAULT_COLS,
    DEFAULT_ROWS,
};
use crate::result::ExpectError;
use bytes::Bytes;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info_span};

/// Capacity of the queue between the reader task and the matcher.
///
/// When the matcher falls this far behind, the reader waits for it rather
/// than dropping output.
pub const DEFAULT_QUEUE_CAPACITY: usize = 20 * 1024;

/// Byte sequence a terminal treats as end of input.
///
/// A best guess: the program on the other end may be configured differently.
#[cfg(not(windows))]
pub const DEFAULT_EOF: &[u8] = b"\x04";

/// Byte sequence a terminal treats as end of input.
///
/// A best guess: the program on the other end may be configured differently.
#[cfg(windows)]
pub const DEFAULT_EOF: &[u8] = b"\x1a";

/// Builder for configuring and spawning sessions.
///
/// # Defaults
///
/// - Timeout: none (wait forever)
/// - Queue capacity: [`DEFAULT_QUEUE_CAPACITY`]
/// - PTY size: 24 rows × 80 columns
/// - Debug tracing: off
/// - Echo: off
/// - End-of-input sequence: [`DEFAULT_EOF`]
/// - Working directory: the current one
///
/// # Examples
///
/// ```no_run
/// use ptyexpect::Session;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let session = Session::builder()
///     .timeout(Duration::from_secs(60))
///     .pty_size(40, 120)
///     .debug(true)
///     .spawn("python3", ["-i"])?;
/// # Ok(())
/// # }
/// ```
pub struct SessionBuilder {
    timeout: Option<Duration>,
    queue_capacity: usize,
    rows: u16,
    cols: u16,
    debug: bool,
    echo: Option<Box<dyn Write + Send>>,
    eof_sequence: Bytes,
    cwd: Option<PathBuf>,
    env: Vec<(OsString, OsString)>,
    provider: Arc<dyn PtyProvider>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("timeout", &self.timeout)
            .field("queue_capacity", &self.queue_capacity)
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("debug", &self.debug)
            .field("echo", &self.echo.is_some())
            .field("eof_sequence", &self.eof_sequence)
            .field("cwd", &self.cwd)
            .finish_non_exhaustive()
    }
}

impl SessionBuilder {
    /// Create a new session builder with default configuration.
    pub fn new() -> Self {
        Self {
            timeout: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            debug: false,
            echo: None,
            eof_sequence: Bytes::from_static(DEFAULT_EOF),
            cwd: None,
            env: Vec::new(),
            provider: default_provider(),
        }
    }

    /// Set the timeout for each `expect` call.
    ///
    /// A zero duration disables the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Disable timeout (wait indefinitely).
    pub fn no_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Set the capacity of the reader queue (minimum 1).
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set PTY (terminal) size.
    pub fn pty_size(mut self, rows: u16, cols: u16) -> Self {
        self.rows = rows;
        self.cols = cols;
        self
    }

    /// Emit per-byte and per-buffer trace events for this session.
    pub fn debug(mut self, on: bool) -> Self {
        self.debug = on;
        self
    }

    /// Copy everything read from the terminal to `target` from the start.
    pub fn echo(mut self, target: impl Write + Send + 'static) -> Self {
        self.echo = Some(Box::new(target));
        self
    }

    /// Copy everything read from the terminal to standard output.
    pub fn log_user(mut self, on: bool) -> Self {
        self.echo = on.then(echo::stdout);
        self
    }

    /// Override the bytes sent by [`Session::send_eof`].
    pub fn eof_sequence(mut self, sequence: impl AsRef<[u8]>) -> Self {
        self.eof_sequence = Bytes::copy_from_slice(sequence.as_ref());
        self
    }

    /// Run the program in `dir`.
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Add an environment variable for the program.
    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.env
            .push((key.as_ref().to_owned(), value.as_ref().to_owned()));
        self
    }

    /// Use `provider` instead of the platform default to start processes.
    pub fn provider(mut self, provider: Arc<dyn PtyProvider>) -> Self {
        self.provider = provider;
        self
    }

    /// Spawn `program` with `args` and return a configured session.
    ///
    /// The process is killed when the session is terminated or dropped, and
    /// its exit status is collected in the background (see
    /// [`Session::exit_result`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be allocated, the program
    /// cannot be started, or the platform has no terminal support. A process
    /// that did start is killed before the error is returned.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use ptyexpect::Session;
    /// use std::time::Duration;
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let session = Session::builder()
    ///     .timeout(Duration::from_secs(5))
    ///     .spawn("rev", [] as [&str; 0])?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn spawn<I, S>(self, program: impl AsRef<OsStr>, args: I) -> Result<Session, ExpectError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let (session, _) = self.start(CancelToken::new(), true, program.as_ref(), args)?;
        Ok(session)
    }

    /// Spawn under an external cancellation scope, without collecting the
    /// exit status.
    ///
    /// Cancelling `scope` (or terminating or dropping the session) kills the
    /// process. Reaping is left to the caller through the returned handle:
    /// a process that is never waited on keeps its slot in the OS process
    /// table. [`Session::exit_result`] stays `None` for such sessions.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use ptyexpect::{CancelToken, Session};
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let scope = CancelToken::new();
    /// let (_session, mut process) = Session::builder()
    ///     .spawn_scoped(&scope, "rev", [] as [&str; 0])?;
    ///
    /// scope.cancel();
    /// let status = process.wait()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn spawn_scoped<I, S>(
        self,
        scope: &CancelToken,
        program: impl AsRef<OsStr>,
        args: I,
    ) -> Result<(Session, Box<dyn ProcessHandle>), ExpectError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let (session, process) = self.start(scope.child_token(), false, program.as_ref(), args)?;
        let process =
            process.ok_or_else(|| ExpectError::Spawn("process handle unavailable".to_string()))?;
        Ok((session, process))
    }

    fn start<I, S>(
        self,
        cancel: CancelToken,
        reap: bool,
        program: &OsStr,
        args: I,
    ) -> Result<(Session, Option<Box<dyn ProcessHandle>>), ExpectError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut request = SpawnRequest::new(
            program,
            args.into_iter().map(|a| a.as_ref().to_owned()),
        );
        request.rows = self.rows;
        request.cols = self.cols;
        request.cwd = self.cwd.or_else(|| std::env::current_dir().ok());
        request.env = self.env;

        let program = request.display();
        let PtyProcess {
            reader,
            writer,
            process,
            control,
        } = self.provider.spawn(&request)?;

        let process_id = process.process_id();
        let span = info_span!("session", %program, pid = ?process_id);
        debug!(parent: &span, "process started");

        // Cancelling the session is how the process gets killed, including
        // when setup below fails
        let mut killer = process.killer();
        let kill_span = span.clone();
        cancel.on_cancel(move || {
            if let Err(e) = killer.kill() {
                debug!(parent: &kill_span, error = %e, "kill failed");
            }
        });

        let echo = EchoSink::default();
        echo.set(self.echo);

        let (queue_tx, queue_rx) = mpsc::channel(self.queue_capacity);
        let reader_task = ReaderTask {
            reader,
            queue: queue_tx,
            cancel: cancel.clone(),
            echo: echo.clone(),
            debug: self.debug,
            span: span.clone(),
        };
        if let Err(e) = reader_task.spawn() {
            cancel.cancel();
            return Err(ExpectError::Spawn(format!("cannot start reader task: {e}")));
        }

        let exit = ExitSlot::default();
        let process = if reap {
            if let Err(e) = reaper::spawn(process, exit.clone(), span.clone()) {
                cancel.cancel();
                return Err(ExpectError::Spawn(format!("cannot start reaper task: {e}")));
            }
            None
        } else {
            Some(process)
        };

        let session = Session {
            process_id,
            writer: Some(Arc::new(Mutex::new(writer))),
            control,
            queue: queue_rx,
            cancel,
            buffer: BufferManager::new(),
            eof_reached: false,
            exit,
            timeout: self.timeout,
            echo,
            eof_sequence: self.eof_sequence,
            debug: self.debug,
            terminated: false,
            span,
        };
        Ok((session, process))
    }
}
