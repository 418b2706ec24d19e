//! End-to-end tests driving `pty-test-app` through a real pseudo-terminal

#![cfg(unix)]

use ptyexpect::{CancelToken, ExpectError, Pattern, Session, NOT_FOUND, TIMED_OUT};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const APP: &str = env!("CARGO_BIN_EXE_pty-test-app");
const PROMPT: &str = "Enter test name:";

fn menu() -> Session {
    Session::builder()
        .timeout(Duration::from_secs(10))
        .spawn(APP, ["somearg"])
        .expect("Failed to spawn test app")
}

async fn menu_at_prompt() -> Session {
    let mut session = menu();
    let result = session.expect(&[PROMPT.into()]).await;
    assert_eq!(result.index, 0, "no prompt: {:?}", result.error);
    session
}

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_hello_olleh_then_end_of_stream() {
    let mut session = Session::builder()
        .timeout(Duration::from_secs(5))
        .spawn(APP, ["rev"])
        .expect("Failed to spawn rev");

    session.send(b"hello\r").await.unwrap();
    let patterns = ["hello".into(), "olleh".into()];

    // The terminal echoes the input before rev answers
    let result = session.expect(&patterns).await;
    assert_eq!(result.index, 0);
    assert_eq!(&result.matched[..], b"hello");

    let result = session.expect(&patterns).await;
    assert_eq!(result.index, 1);
    assert_eq!(&result.matched[..], b"olleh");

    session.send_eof().await.unwrap();
    let result = session.expect(&patterns).await;
    assert_eq!(result.index, NOT_FOUND);
    assert!(result.error.is_none(), "unexpected error: {:?}", result.error);

    let result = session.expect(&patterns).await;
    assert!(result.is_eof());
}

#[tokio::test]
async fn test_literal_match() {
    let mut session = menu();
    session.send(b"1\r").await.unwrap();

    let result = session.expect(&["Welcome to the first test".into()]).await;
    assert_eq!(result.index, 0);
    assert_eq!(result.matched_str(), "Welcome to the first test");
}

#[tokio::test]
async fn test_regex_match() {
    let mut session = menu();
    session.send(b"1\r").await.unwrap();

    let pattern = Pattern::regex("Welcome to the first test").unwrap();
    let result = session.expect(&[pattern]).await;
    assert_eq!(result.index, 0);
    assert_eq!(result.matched_str(), "Welcome to the first test");
}

#[tokio::test]
async fn test_expect_index() {
    let mut session = menu();
    session.send(b"1\r").await.unwrap();

    let index = session
        .expect_index(&["Welcome to the first test".into()])
        .await;
    assert_eq!(index, 0);
}

#[tokio::test]
async fn test_two_patterns_matched_in_turn() {
    let mut session = menu();
    session.send(b"2\r").await.unwrap();

    let patterns = ["Welcome ".into(), "to the second test".into()];
    let first = session.expect(&patterns).await;
    assert_eq!(first.index, 0);
    assert_eq!(first.matched_str(), "Welcome ");

    let second = session.expect(&patterns).await;
    assert_eq!(second.index, 1);
    assert_eq!(second.matched_str(), "to the second test");
}

#[tokio::test]
async fn test_two_regexes_matched_in_turn() {
    let mut session = menu();
    session.send(b"2\r").await.unwrap();

    let patterns = [
        Pattern::regex("Welcome ").unwrap(),
        Pattern::regex("to the second test").unwrap(),
    ];
    assert_eq!(session.expect(&patterns).await.index, 0);
    assert_eq!(session.expect(&patterns).await.index, 1);
}

#[tokio::test]
async fn test_terminal_line_endings() {
    let mut session = menu();
    session.send(b"2\r").await.unwrap();

    // The terminal turns each newline into CR LF
    let patterns = ["test\r\n".into(), "Two lines".into()];
    let first = session.expect(&patterns).await;
    assert_eq!(first.index, 0);
    assert_eq!(&first.matched[..], b"test\r\n");

    let second = session.expect(&patterns).await;
    assert_eq!(second.index, 1);
}

#[tokio::test]
async fn test_finds_second_pattern() {
    let mut session = menu_at_prompt().await;
    session.send(b"2\r").await.unwrap();

    let result = session
        .expect(&["DONT FIND THIS".into(), "Two lines of output!".into()])
        .await;
    assert_eq!(result.index, 1);
    assert_eq!(result.matched_str(), "Two lines of output!");
}

#[tokio::test]
async fn test_match_across_delayed_output() {
    let mut session = menu_at_prompt().await;
    session.send(b"3\r").await.unwrap();

    let result = session.expect(&["Abcdef".into()]).await;
    assert_eq!(result.index, 0);

    // "gh" and "ijk" are written half a second apart
    let result = session.expect(&["ghijk".into()]).await;
    assert_eq!(result.index, 0);
    assert_eq!(result.matched_str(), "ghijk");
}

#[tokio::test]
async fn test_send_slow() {
    let mut session = menu_at_prompt().await;

    let sent = session
        .send_slow(Duration::from_millis(20), "HELLO\r世界\r")
        .await
        .unwrap();
    assert_eq!(sent, 13);

    let result = session.expect(&["I saw hello".into()]).await;
    assert_eq!(result.index, 0);
}

#[tokio::test]
async fn test_multibyte_literal() {
    let mut session = menu_at_prompt().await;
    session.send_line("4").await.unwrap();

    let result = session.expect(&["世界".into()]).await;
    assert_eq!(result.index, 0);
    assert_eq!(result.matched_str(), "世界");
}

#[tokio::test]
async fn test_multibyte_regex() {
    let mut session = menu_at_prompt().await;
    session.send_line("4").await.unwrap();

    let result = session
        .expect(&[Pattern::regex(r"世\p{L}").unwrap()])
        .await;
    assert_eq!(result.index, 0);
    assert_eq!(result.matched_str(), "世界");
}

#[tokio::test]
async fn test_timeout() {
    let mut session = Session::builder()
        .timeout(Duration::from_secs(1))
        .spawn(APP, ["somearg"])
        .unwrap();

    let started = std::time::Instant::now();
    let result = session.expect(&["no way".into()]).await;
    assert!(started.elapsed() >= Duration::from_secs(1));
    assert_eq!(result.index, TIMED_OUT);
    assert!(matches!(result.error, Some(ExpectError::Timeout { .. })));
}

#[tokio::test]
async fn test_echo_and_clear() {
    let capture = Capture::default();
    let mut session = Session::builder()
        .timeout(Duration::from_secs(5))
        .echo(capture.clone())
        .spawn(APP, [] as [&str; 0])
        .unwrap();

    session.send(b"1\r").await.unwrap();
    session.send_eof().await.unwrap();

    // Read everything up to the end of the stream
    let result = session.expect(&[]).await;
    assert!(result.is_eof(), "unexpected result: {result:?}");
    assert!(capture.text().contains("Welcome to the first test"));
    assert!(session.buffer_string().contains("No input goodbye"));

    session.clear();
    assert_eq!(session.buffer_string(), "");
}

#[tokio::test]
async fn test_exit_result_after_goodbye() {
    let mut session = menu_at_prompt().await;
    session.send_line("0").await.unwrap();

    let result = session.expect(&["Goodbye".into()]).await;
    assert_eq!(result.index, 0);
    assert!(session.expect(&[]).await.is_eof());

    let status = session
        .wait_exit(Duration::from_secs(5))
        .await
        .expect("exit status not recorded");
    assert!(status.as_ref().unwrap().success());
}

#[tokio::test]
async fn test_terminate_kills_process() {
    let mut session = menu_at_prompt().await;
    assert!(session.process_id().is_some());

    session.terminate();
    let status = session
        .wait_exit(Duration::from_secs(5))
        .await
        .expect("exit status not recorded");
    assert!(!status.as_ref().unwrap().success());
}

#[tokio::test]
async fn test_scoped_spawn_cancelled_by_scope() {
    let scope = CancelToken::new();
    let (mut session, mut process) = Session::builder()
        .timeout(Duration::from_secs(10))
        .spawn_scoped(&scope, APP, ["somearg"])
        .unwrap();

    let result = session.expect(&[PROMPT.into()]).await;
    assert_eq!(result.index, 0);

    scope.cancel();
    let status = tokio::task::spawn_blocking(move || process.wait())
        .await
        .unwrap()
        .unwrap();
    assert!(!status.success());
    assert!(session.exit_result().is_none());

    let result = session.expect(&[PROMPT.into()]).await;
    assert!(matches!(result.error, Some(ExpectError::Cancelled)));
}

#[tokio::test]
async fn test_resize() {
    let session = menu();
    session.resize(40, 120).unwrap();
}

/// A marker file path no other test uses.
fn marker(name: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("ptyexpect-{}-{name}", std::process::id()));
    let _ = std::fs::remove_file(&path);
    path
}

/// A shell that ignores hang-ups and reports what it read, if anything.
fn hup_ignoring_reader(path: &std::path::Path) -> Session {
    let script = format!(
        "trap '' HUP; echo ready; read x; echo \"got<$x>\" > '{}'; sleep 3",
        path.display()
    );
    Session::builder()
        .timeout(Duration::from_secs(5))
        .spawn("sh", ["-c", script.as_str()])
        .expect("Failed to spawn sh")
}

#[tokio::test]
async fn test_terminate_sends_no_input() {
    let path = marker("terminate-no-input");
    let mut session = hup_ignoring_reader(&path);
    assert_eq!(session.expect_index(&["ready".into()]).await, 0);

    session.terminate();
    let status = session
        .wait_exit(Duration::from_secs(5))
        .await
        .expect("exit status not recorded");
    assert!(!status.as_ref().unwrap().success());

    tokio::time::sleep(Duration::from_millis(300)).await;
    let written = std::fs::read_to_string(&path).ok();
    let _ = std::fs::remove_file(&path);
    assert_eq!(written, None, "process read input during terminate");
}

#[tokio::test]
async fn test_drop_sends_no_input() {
    let path = marker("drop-no-input");
    let mut session = hup_ignoring_reader(&path);
    assert_eq!(session.expect_index(&["ready".into()]).await, 0);

    drop(session);
    tokio::time::sleep(Duration::from_millis(500)).await;
    let written = std::fs::read_to_string(&path).ok();
    let _ = std::fs::remove_file(&path);
    assert_eq!(written, None, "process read input during drop");
}

#[tokio::test]
async fn test_terminate_kills_process_ignoring_hangup() {
    let mut session = Session::builder()
        .timeout(Duration::from_secs(5))
        .spawn("sh", ["-c", "trap '' HUP; echo ready; exec sleep 30"])
        .unwrap();
    assert_eq!(session.expect_index(&["ready".into()]).await, 0);

    session.terminate();
    let status = session
        .wait_exit(Duration::from_secs(5))
        .await
        .expect("process survived terminate");
    assert!(!status.as_ref().unwrap().success());
}

#[tokio::test]
async fn test_drop_kills_process_ignoring_hangup() {
    let path = marker("drop-kills");
    let script = format!(
        "trap '' HUP; echo ready; sleep 2; echo alive > '{}'",
        path.display()
    );
    let mut session = Session::builder()
        .timeout(Duration::from_secs(5))
        .spawn("sh", ["-c", script.as_str()])
        .unwrap();
    assert_eq!(session.expect_index(&["ready".into()]).await, 0);

    drop(session);
    tokio::time::sleep(Duration::from_secs(3)).await;
    let survived = path.exists();
    let _ = std::fs::remove_file(&path);
    assert!(!survived, "process outlived its session");
}

#[tokio::test]
async fn test_scope_kills_process_ignoring_hangup() {
    let scope = CancelToken::new();
    let (mut session, mut process) = Session::builder()
        .timeout(Duration::from_secs(5))
        .spawn_scoped(&scope, "sh", ["-c", "trap '' HUP; echo ready; exec sleep 30"])
        .unwrap();
    assert_eq!(session.expect_index(&["ready".into()]).await, 0);

    scope.cancel();
    let status = tokio::time::timeout(
        Duration::from_secs(5),
        tokio::task::spawn_blocking(move || process.wait()),
    )
    .await
    .expect("process survived cancellation")
    .unwrap()
    .unwrap();
    assert!(!status.success());
}
