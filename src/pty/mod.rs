//! Pseudo-terminal capability providers
//!
//! A [`PtyProvider`] turns a [`SpawnRequest`] into a running process attached
//! to a terminal: a byte stream to read its output, a byte stream to write its
//! input, and a handle to wait on or kill it. Sessions only ever talk to a
//! provider, so platforms without terminal support are handled in one place
//! ([`Unsupported`]) and tests can substitute a scripted one.

#[cfg(unix)]
mod native;
mod unsupported;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(unix)]
pub use native::NativePty;
pub use unsupported::Unsupported;

use crate::result::ExpectError;
use portable_pty::ExitStatus;
use std::ffi::OsString;
use std::fmt;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// Default terminal rows
pub const DEFAULT_ROWS: u16 = 24;

/// Default terminal columns
pub const DEFAULT_COLS: u16 = 80;

/// What to run and how the terminal should look.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRequest {
    /// Program to execute
    pub program: OsString,
    /// Arguments passed to the program
    pub args: Vec<OsString>,
    /// Terminal rows
    pub rows: u16,
    /// Terminal columns
    pub cols: u16,
    /// Working directory; the provider's default when `None`
    pub cwd: Option<PathBuf>,
    /// Extra environment variables
    pub env: Vec<(OsString, OsString)>,
}

impl SpawnRequest {
    /// Request for `program` with `args` on a default-sized terminal.
    pub fn new<I, S>(program: impl Into<OsString>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            cwd: None,
            env: Vec::new(),
        }
    }

    /// Program and arguments joined for log output
    pub fn display(&self) -> String {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(|s| s.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A process started by a provider.
pub struct PtyProcess {
    /// Terminal output
    pub reader: Box<dyn Read + Send>,
    /// Terminal input
    pub writer: Box<dyn Write + Send>,
    /// The running process
    pub process: Box<dyn ProcessHandle>,
    /// Terminal controls, when the provider has any
    pub control: Option<Box<dyn PtyControl>>,
}

impl fmt::Debug for PtyProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PtyProcess")
            .field("process", &self.process)
            .finish_non_exhaustive()
    }
}

/// Handle to a running child process.
pub trait ProcessHandle: Send + fmt::Debug {
    /// Block until the process exits.
    fn wait(&mut self) -> io::Result<ExitStatus>;

    /// Exit status if the process has already exited.
    fn try_wait(&mut self) -> io::Result<Option<ExitStatus>>;

    /// OS process id, if known.
    fn process_id(&self) -> Option<u32>;

    /// Independent handle that can kill the process.
    fn killer(&self) -> Box<dyn ProcessKiller>;
}

/// Kills a process from any thread.
pub trait ProcessKiller: Send + Sync + fmt::Debug {
    /// Ask the OS to terminate the process.
    fn kill(&mut self) -> io::Result<()>;
}

/// Terminal-level controls.
pub trait PtyControl: Send {
    /// Change the terminal size.
    fn resize(&self, rows: u16, cols: u16) -> Result<(), ExpectError>;
}

/// Starts processes attached to a terminal.
pub trait PtyProvider: Send + Sync {
    /// Start the requested process.
    ///
    /// If anything fails after the process started, the provider kills it
    /// before returning the error.
    fn spawn(&self, request: &SpawnRequest) -> Result<PtyProcess, ExpectError>;
}

/// The provider for the current platform.
pub fn default_provider() -> Arc<dyn PtyProvider> {
    #[cfg(unix)]
    {
        Arc::new(NativePty)
    }
    #[cfg(not(unix))]
    {
        Arc::new(Unsupported)
    }
}

/// Whether a read error is the terminal's way of saying the other side hung up.
///
/// Linux reports a closed slave to master reads as `EIO` rather than a
/// zero-length read.
pub(crate) fn is_hangup(err: &io::Error) -> bool {
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(libc::EIO)
    }
    #[cfg(not(unix))]
    {
        let _ = err;
        false
    }
}
