//! Interactive program driven by the end-to-end tests.
//!
//! With `rev` as its only argument it reverses every input line. With
//! `nothing` it prints its arguments, idles briefly and exits. Otherwise it
//! loops on an `Enter test name: ` prompt and answers each test name with a
//! fixed reply.

use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

/// Pause in the middle of the split-output reply
const SPLIT_DELAY: Duration = Duration::from_millis(500);

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let result = match args.get(1).map(String::as_str) {
        Some("rev") if args.len() == 2 => rev(),
        Some("nothing") if args.len() == 2 => {
            println!("Args passed: {args:?}");
            thread::sleep(Duration::from_secs(3));
            Ok(())
        }
        _ => menu(&args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("pty-test-app: {e}");
            ExitCode::FAILURE
        }
    }
}

fn rev() -> io::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    for line in stdin.lock().lines() {
        let line = line?;
        let reversed: String = line.trim_end_matches('\r').chars().rev().collect();
        writeln!(stdout, "{reversed}")?;
        stdout.flush()?;
    }
    Ok(())
}

fn menu(args: &[String]) -> io::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    writeln!(stdout, "Args passed: {args:?}")?;

    let mut line = String::new();
    loop {
        write!(stdout, "Enter test name: ")?;
        stdout.flush()?;

        line.clear();
        stdin.lock().read_line(&mut line)?;
        let name = line.trim_end_matches(['\r', '\n']);

        match name {
            "" => {
                writeln!(stdout, "No input goodbye")?;
                return Ok(());
            }
            "0" => {
                writeln!(stdout, "Goodbye")?;
                return Ok(());
            }
            "1" => writeln!(stdout, "Welcome to the first test")?,
            "2" => {
                writeln!(stdout, "Welcome to the second test")?;
                writeln!(stdout, "Two lines of output!")?;
            }
            "3" => {
                writeln!(stdout, "Abcdef")?;
                write!(stdout, "gh")?;
                stdout.flush()?;
                thread::sleep(SPLIT_DELAY);
                writeln!(stdout, "ijk")?;
            }
            "4" => writeln!(stdout, "世界")?,
            "HELLO" => writeln!(stdout, "I saw hello")?,
            other => writeln!(stdout, "unknown test <<{other}>>")?,
        }
        stdout.flush()?;
    }
}
