//! Show the program's output live on stdout while waiting for a prompt.

use ptyexpect::Session;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut session = Session::builder()
        .timeout(Duration::from_secs(5))
        .debug(true)
        .spawn("sh", [] as [&str; 0])?;
    session.log_user(true);

    session.send_line("echo logged-$((40 + 2))").await?;
    let result = session.expect(&["logged-42".into()]).await;
    println!();
    println!("matched index {} ({})", result.index, result.matched_str());

    session.log_user(false);
    session.send_line("echo quiet").await?;
    session.expect(&["quiet\r".into()]).await;

    session.send_line("exit 7").await?;
    session.expect(&[]).await;
    if let Some(Ok(status)) = session.wait_exit(Duration::from_secs(2)).await {
        println!("sh exited with code {}", status.exit_code());
    }

    Ok(())
}
