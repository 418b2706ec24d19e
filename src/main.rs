use anyhow::{bail, Context, Result};
use ptyexpect::{Pattern, Session};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG=ptyexpect=debug shows the session internals
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    println!("ptyexpect - PTY automation demo");
    println!("{}", "=".repeat(50));
    println!();

    demo_olleh().await?;
    println!();
    demo_pattern_matching().await?;

    println!("\n{}", "=".repeat(50));
    println!("Done.");

    Ok(())
}

/// Send `hello` to `rev` and wait for it to come back reversed.
async fn demo_olleh() -> Result<()> {
    println!("Demo 1: hello / olleh");
    println!("{}", "-".repeat(40));

    let mut session = Session::builder()
        .timeout(Duration::from_secs(5))
        .spawn("rev", [] as [&str; 0])
        .context("failed to start rev")?;

    session.send_line("hello").await?;

    let patterns = ["hello".into(), "olleh".into()];
    for _ in 0..2 {
        let result = session.expect(&patterns).await;
        match result.pattern_index() {
            Some(0) => println!("✓ terminal echoed: {}", result.matched_str()),
            Some(_) => println!("✓ rev answered: {}", result.matched_str()),
            None => bail!("rev did not answer: {:?}", result.error),
        }
    }

    session.send_eof().await?;
    let result = session.expect(&patterns).await;
    if result.is_eof() {
        println!("✓ rev exited after end of input");
    }
    if let Some(Ok(status)) = session.wait_exit(Duration::from_secs(2)).await {
        println!("  exit status: {status:?}");
    }

    Ok(())
}

/// Pick a line out of `uname -a` with a regular expression.
async fn demo_pattern_matching() -> Result<()> {
    println!("Demo 2: Pattern Matching");
    println!("{}", "-".repeat(40));

    let mut session = Session::builder()
        .timeout(Duration::from_secs(5))
        .spawn("uname", ["-a"])
        .context("failed to start uname")?;

    let patterns = [
        Pattern::regex(r"(?i)linux|darwin|bsd")?,
        Pattern::regex(r"\r?\n")?,
    ];
    let result = session.expect(&patterns).await;
    match result.index {
        0 => println!("✓ kernel: {}", result.matched_str()),
        1 => println!("✓ uname printed an unfamiliar kernel name"),
        _ => println!("✗ no output: {:?}", result.error),
    }

    Ok(())
}
