//! Scripted in-memory provider for tests.
//!
//! [`mock`] returns a provider and the [`MockTerminal`] that drives it. The
//! terminal decides what the "process" prints, when its output ends, how
//! reads fail, and when it exits; it also records everything sent to it.
//!
//! ```rust,ignore
//! # #[tokio::main]
//! # async fn main() {
//! use ptyexpect::pty::mock::mock;
//! use ptyexpect::Session;
//!
//! let (provider, terminal) = mock();
//! let mut session = Session::builder()
//!     .provider(provider)
//!     .spawn("fake", [] as [&str; 0])
//!     .unwrap();
//!
//! terminal.output("Login: ");
//! let result = session.expect(&["Login: ".into()]).await;
//! assert_eq!(result.index, 0);
//! # }
//! ```

use super::{ProcessHandle, ProcessKiller, PtyProcess, PtyProvider, SpawnRequest};
use crate::result::ExpectError;
use portable_pty::ExitStatus;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

/// Exit code reported for a killed mock process
pub const KILLED_EXIT_CODE: u32 = 137;

enum MockEvent {
    Output(Vec<u8>),
    WouldBlock,
    Fail(io::ErrorKind),
    Eof,
}

#[derive(Default)]
struct Shared {
    input: Mutex<Vec<u8>>,
    fail_writes: Mutex<bool>,
    requests: Mutex<Vec<SpawnRequest>>,
    exit: Mutex<Option<u32>>,
    exited: Condvar,
    killed: Mutex<bool>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn set_exit(&self, code: u32) {
        let mut exit = lock(&self.exit);
        if exit.is_none() {
            *exit = Some(code);
        }
        self.exited.notify_all();
    }
}

/// Create a provider and the terminal that scripts it.
///
/// The provider serves a single spawn; later spawns fail.
pub fn mock() -> (Arc<MockProvider>, MockTerminal) {
    let (events, receiver) = mpsc::channel();
    let shared = Arc::new(Shared::default());
    let provider = MockProvider {
        receiver: Mutex::new(Some(receiver)),
        events: events.clone(),
        shared: shared.clone(),
        spawn_error: None,
    };
    (Arc::new(provider), MockTerminal { events, shared })
}

/// Provider whose every spawn fails with `message`.
pub fn failing(message: &str) -> Arc<MockProvider> {
    let (events, _) = mpsc::channel();
    Arc::new(MockProvider {
        receiver: Mutex::new(None),
        events,
        shared: Arc::new(Shared::default()),
        spawn_error: Some(message.to_string()),
    })
}

/// Provider half of [`mock`].
pub struct MockProvider {
    receiver: Mutex<Option<Receiver<MockEvent>>>,
    events: Sender<MockEvent>,
    shared: Arc<Shared>,
    spawn_error: Option<String>,
}

impl PtyProvider for MockProvider {
    fn spawn(&self, request: &SpawnRequest) -> Result<PtyProcess, ExpectError> {
        if let Some(message) = &self.spawn_error {
            return Err(ExpectError::Spawn(message.clone()));
        }
        let receiver = lock(&self.receiver)
            .take()
            .ok_or_else(|| ExpectError::Spawn("mock terminal already used".to_string()))?;
        lock(&self.shared.requests).push(request.clone());

        Ok(PtyProcess {
            reader: Box::new(MockReader {
                receiver,
                pending: VecDeque::new(),
                done: false,
            }),
            writer: Box::new(MockWriter {
                shared: self.shared.clone(),
            }),
            process: Box::new(MockProcess {
                shared: self.shared.clone(),
                events: self.events.clone(),
            }),
            control: None,
        })
    }
}

/// Script and inspect the mock process.
#[derive(Clone)]
pub struct MockTerminal {
    events: Sender<MockEvent>,
    shared: Arc<Shared>,
}

impl MockTerminal {
    /// Make the process print `data`.
    pub fn output(&self, data: impl AsRef<[u8]>) {
        let _ = self.events.send(MockEvent::Output(data.as_ref().to_vec()));
    }

    /// Make the next read report "try again later".
    pub fn would_block(&self) {
        let _ = self.events.send(MockEvent::WouldBlock);
    }

    /// Make the next read fail with `kind`.
    pub fn fail(&self, kind: io::ErrorKind) {
        let _ = self.events.send(MockEvent::Fail(kind));
    }

    /// Close the output stream cleanly.
    pub fn close(&self) {
        let _ = self.events.send(MockEvent::Eof);
    }

    /// Make the process exit with `code`.
    pub fn exit(&self, code: u32) {
        self.shared.set_exit(code);
    }

    /// Make every later write fail.
    pub fn fail_writes(&self) {
        *lock(&self.shared.fail_writes) = true;
    }

    /// Everything written to the process so far.
    pub fn input(&self) -> Vec<u8> {
        lock(&self.shared.input).clone()
    }

    /// Whether the process was killed.
    pub fn was_killed(&self) -> bool {
        *lock(&self.shared.killed)
    }

    /// The request the provider was asked to start.
    pub fn request(&self) -> Option<SpawnRequest> {
        lock(&self.shared.requests).last().cloned()
    }
}

struct MockReader {
    receiver: Receiver<MockEvent>,
    pending: VecDeque<u8>,
    done: bool,
}

impl Read for MockReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pending.is_empty() {
            if self.done {
                return Ok(0);
            }
            match self.receiver.recv() {
                Ok(MockEvent::Output(data)) => self.pending.extend(data),
                Ok(MockEvent::WouldBlock) => return Err(io::ErrorKind::WouldBlock.into()),
                Ok(MockEvent::Fail(kind)) => return Err(kind.into()),
                Ok(MockEvent::Eof) | Err(_) => self.done = true,
            }
        }

        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

struct MockWriter {
    shared: Arc<Shared>,
}

impl Write for MockWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if *lock(&self.shared.fail_writes) {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        lock(&self.shared.input).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct MockProcess {
    shared: Arc<Shared>,
    events: Sender<MockEvent>,
}

impl std::fmt::Debug for MockProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockProcess").finish_non_exhaustive()
    }
}

impl ProcessHandle for MockProcess {
    fn wait(&mut self) -> io::Result<ExitStatus> {
        let mut exit = lock(&self.shared.exit);
        loop {
            if let Some(code) = *exit {
                return Ok(ExitStatus::with_exit_code(code));
            }
            exit = self
                .shared
                .exited
                .wait(exit)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        let exit = *lock(&self.shared.exit);
        Ok(exit.map(ExitStatus::with_exit_code))
    }

    fn process_id(&self) -> Option<u32> {
        Some(4242)
    }

    fn killer(&self) -> Box<dyn ProcessKiller> {
        Box::new(MockKiller {
            shared: self.shared.clone(),
            events: Mutex::new(self.events.clone()),
        })
    }
}

struct MockKiller {
    shared: Arc<Shared>,
    events: Mutex<Sender<MockEvent>>,
}

impl std::fmt::Debug for MockKiller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockKiller").finish_non_exhaustive()
    }
}

impl ProcessKiller for MockKiller {
    fn kill(&mut self) -> io::Result<()> {
        *lock(&self.shared.killed) = true;
        self.shared.set_exit(KILLED_EXIT_CODE);
        // A killed process hangs up its terminal
        let _ = lock(&self.events).send(MockEvent::Eof);
        Ok(())
    }
}
