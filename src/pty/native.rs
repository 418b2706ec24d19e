//! Native pseudo-terminals via portable-pty

use super::{ProcessHandle, ProcessKiller, PtyControl, PtyProcess, PtyProvider, SpawnRequest};
use crate::result::ExpectError;
use portable_pty::{native_pty_system, Child, CommandBuilder, ExitStatus, MasterPty, PtySize};
use std::fs::File;
use std::io::{self, Read};
use std::os::fd::{AsRawFd, BorrowedFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// How long a read waits for output before reporting `WouldBlock`
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Provider backed by the operating system's pseudo-terminals.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativePty;

impl PtyProvider for NativePty {
    fn spawn(&self, request: &SpawnRequest) -> Result<PtyProcess, ExpectError> {
        let pty_system = native_pty_system();

        let pty_pair = pty_system
            .openpty(size(request.rows, request.cols))
            .map_err(|e| ExpectError::Pty(e.to_string()))?;

        let mut cmd = CommandBuilder::new(&request.program);
        cmd.args(&request.args);
        if let Some(cwd) = &request.cwd {
            cmd.cwd(cwd);
        }
        for (key, value) in &request.env {
            cmd.env(key, value);
        }

        let mut child = pty_pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| ExpectError::Spawn(format!("{}: {e}", request.display())))?;

        // Only the child may hold the slave, otherwise reads never see the
        // hang-up when it exits
        drop(pty_pair.slave);
        let master = pty_pair.master;

        // Plain duplicates of the master: closing them writes nothing to the
        // terminal, unlike portable-pty's own writer
        let streams = dup_master(master.as_ref())
            .and_then(|reader| dup_master(master.as_ref()).map(|writer| (reader, writer)));

        let (reader, writer) = match streams {
            Ok(streams) => streams,
            Err(e) => {
                debug!(program = %request.display(), error = %e, "killing process after setup failure");
                let _ = child.kill();
                let _ = child.wait();
                return Err(ExpectError::Pty(e.to_string()));
            }
        };

        let pid = child.process_id();
        Ok(PtyProcess {
            reader: Box::new(PollingReader::new(reader)),
            writer: Box::new(writer),
            process: Box::new(NativeProcess {
                child,
                pid,
                reaped: Arc::default(),
            }),
            control: Some(Box::new(NativeControl { master })),
        })
    }
}

fn size(rows: u16, cols: u16) -> PtySize {
    PtySize {
        rows,
        cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

fn dup_master(master: &(dyn MasterPty + Send)) -> io::Result<File> {
    let fd = master
        .as_raw_fd()
        .ok_or_else(|| io::Error::other("terminal has no file descriptor"))?;
    // SAFETY: `master` owns `fd` and keeps it open for the whole call
    let owned = unsafe { BorrowedFd::borrow_raw(fd) }.try_clone_to_owned()?;
    Ok(File::from(owned))
}

/// Reads that give up after [`POLL_INTERVAL`] without output.
///
/// The descriptor stays in blocking mode, so writes through other duplicates
/// are unaffected; only reads learn to return `WouldBlock`, which lets the
/// reader task notice cancellation while the terminal is idle.
pub(crate) struct PollingReader {
    file: File,
}

impl PollingReader {
    pub(crate) fn new(file: File) -> Self {
        Self { file }
    }
}

impl Read for PollingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut pollfd = libc::pollfd {
            fd: self.file.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let timeout = POLL_INTERVAL.as_millis() as libc::c_int;
        // SAFETY: `pollfd` is a single valid entry for the duration of the call
        match unsafe { libc::poll(&mut pollfd, 1, timeout) } {
            -1 => Err(io::Error::last_os_error()),
            0 => Err(io::ErrorKind::WouldBlock.into()),
            // Readable, hung up or errored: the read reports which
            _ => self.file.read(buf),
        }
    }
}

#[derive(Debug)]
struct NativeProcess {
    child: Box<dyn Child + Send + Sync>,
    pid: Option<u32>,
    reaped: Arc<AtomicBool>,
}

impl ProcessHandle for NativeProcess {
    fn wait(&mut self) -> io::Result<ExitStatus> {
        let status = self.child.wait()?;
        self.reaped.store(true, Ordering::SeqCst);
        Ok(status)
    }

    fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        let status = self.child.try_wait()?;
        if status.is_some() {
            self.reaped.store(true, Ordering::SeqCst);
        }
        Ok(status)
    }

    fn process_id(&self) -> Option<u32> {
        self.pid
    }

    fn killer(&self) -> Box<dyn ProcessKiller> {
        Box::new(NativeKiller {
            pid: self.pid,
            reaped: self.reaped.clone(),
        })
    }
}

/// Sends `SIGKILL`, which a program cannot catch or ignore.
#[derive(Debug)]
struct NativeKiller {
    pid: Option<u32>,
    reaped: Arc<AtomicBool>,
}

impl ProcessKiller for NativeKiller {
    fn kill(&mut self) -> io::Result<()> {
        // Once reaped the pid may belong to someone else
        if self.reaped.load(Ordering::SeqCst) {
            return Ok(());
        }
        let pid = self
            .pid
            .and_then(|pid| libc::pid_t::try_from(pid).ok())
            .ok_or_else(|| io::Error::other("process id unknown"))?;
        // SAFETY: plain syscall on a pid this session started
        if unsafe { libc::kill(pid, libc::SIGKILL) } == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            Ok(())
        } else {
            Err(err)
        }
    }
}

struct NativeControl {
    master: Box<dyn MasterPty + Send>,
}

impl PtyControl for NativeControl {
    fn resize(&self, rows: u16, cols: u16) -> Result<(), ExpectError> {
        self.master
            .resize(size(rows, cols))
            .map_err(|e| ExpectError::Pty(e.to_string()))
    }
}
