//! Capture everything a program prints while scripting it.
//!
//! The echo target here is an in-memory buffer, printed once the program
//! has finished. Any `Write + Send` works: a file, a socket, a pipe.

use ptyexpect::Session;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default)]
struct Transcript(Arc<Mutex<Vec<u8>>>);

impl Write for Transcript {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .map_err(|_| io::Error::other("transcript poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let transcript = Transcript::default();
    let mut session = Session::builder()
        .timeout(Duration::from_secs(5))
        .echo(transcript.clone())
        .spawn("rev", [] as [&str; 0])?;

    session
        .send_lines(["one", "two", "three"])
        .await?;
    session.send_eof().await?;

    // Nothing to match: read until rev exits
    let result = session.expect(&[]).await;
    if !result.is_eof() {
        eprintln!("rev did not finish: {:?}", result.error);
    }

    let text = transcript
        .0
        .lock()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default();
    println!("--- transcript ---");
    print!("{text}");
    println!("--- end ---");

    Ok(())
}
