//! Background task collecting the process exit status

use crate::pty::ProcessHandle;
use portable_pty::ExitStatus;
use std::io;
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn, Span};

/// Write-once slot holding the result of waiting on the process.
pub(crate) type ExitSlot = Arc<OnceLock<io::Result<ExitStatus>>>;

/// Wait for `process` to exit on its own thread and record the result in
/// `slot`.
pub(crate) fn spawn(
    mut process: Box<dyn ProcessHandle>,
    slot: ExitSlot,
    span: Span,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("ptyexpect-reaper".to_string())
        .spawn(move || {
            let _enter = span.enter();
            let result = process.wait();
            match &result {
                Ok(status) => debug!(?status, "process exited"),
                Err(e) => warn!(error = %e, "waiting on process failed"),
            }
            if slot.set(result).is_err() {
                warn!("exit status already recorded");
            }
        })
}
