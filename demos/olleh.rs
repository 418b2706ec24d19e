//! The classic hello / olleh round trip through `rev`.

use ptyexpect::Session;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::builder()
        .timeout(Duration::from_secs(5))
        .spawn("rev", [] as [&str; 0])?;

    session.send(b"hello\r").await?;

    let result = session.expect(&["olleh".into()]).await;
    if result.index == 0 {
        println!("found {}", result.matched_str());
    } else {
        println!("failed {:?}", result.error);
    }

    session.terminate();
    Ok(())
}
