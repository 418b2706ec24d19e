//! ptyexpect: drive interactive programs through a pseudo-terminal
//!
//! ptyexpect runs a program attached to a pseudo-terminal, feeds it input and
//! waits for its output to match one of an ordered list of patterns, in the
//! style of the Unix `expect` utility. Everything is async and built on tokio.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ptyexpect::{Pattern, Session};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = Session::builder()
//!         .timeout(Duration::from_secs(30))
//!         .spawn("python3", ["-i"])?;
//!
//!     session.expect_or_fail(&[">>> ".into()]).await?;
//!     session.send_line("print('Hello, World!')").await?;
//!
//!     let result = session.expect(&["Hello, World!".into()]).await;
//!     println!("matched {}", result.matched_str());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Matching
//!
//! [`Session::expect`] takes a slice of [`Pattern`]s, each either a literal
//! byte string or a regular expression. After every byte of output the
//! patterns are tried in order; the first one that matches wins and its
//! index is returned. Negative indexes report why nothing matched:
//!
//! ```rust,no_run
//! use ptyexpect::{Pattern, Session, NOT_FOUND, TIMED_OUT};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let mut session = Session::spawn("ftp", [] as [&str; 0])?;
//! let patterns = [
//!     Pattern::from("230 Login successful"),
//!     Pattern::from("530 Login incorrect"),
//!     Pattern::regex(r"ftp: .*refused")?,
//! ];
//! let result = session.expect(&patterns).await;
//! match result.index {
//!     0 => println!("logged in"),
//!     1 | 2 => println!("login failed"),
//!     NOT_FOUND => println!("ftp exited"),
//!     TIMED_OUT => println!("no answer: {:?}", result.error),
//!     _ => println!("bad pattern: {:?}", result.error),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Platforms
//!
//! Terminals are provided by [`pty::PtyProvider`] implementations. Unix
//! systems get [`pty::NativePty`]; elsewhere spawning fails with
//! [`ExpectError::Unsupported`]. A scripted provider for tests lives in
//! `pty::mock` behind the `mock` feature.

#![warn(missing_docs)]

mod buffer;
mod pattern;
pub mod pty;
mod result;
mod session;

// Public API exports
pub use pattern::Pattern;
pub use result::{
    ExpectError, Match, MatchResult, PatternError, INVALID_ARGUMENT, NOT_FOUND, TIMED_OUT,
};
pub use session::{
    CancelToken, Session, SessionBuilder, DEFAULT_EOF, DEFAULT_QUEUE_CAPACITY, LINE_TERMINATOR,
};

// Re-export commonly used types
pub use portable_pty::ExitStatus;
