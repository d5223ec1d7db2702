//! Example: Log in, query the portfolio and stream a feed
//!
//! Reads `CODY_API_URL`, `CODY_API_KEY` and `CODY_API_SECRET` from the
//! environment or a `.env` file. If no saved session is valid, prompts for
//! the user name, password and one-time code on stdin.
//!
//! Run with: RUST_LOG=info cargo run --example session_stream -- GARAN THYAO

use cody_sdk::prelude::*;
use std::io::{self, BufRead, Write};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn prompt(label: &str) -> io::Result<String> {
    print!("{label}: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let symbols: Vec<String> = std::env::args().skip(1).collect();
    let symbols = if symbols.is_empty() {
        vec!["GARAN".to_string()]
    } else {
        symbols
    };

    let session = Session::start(SdkConfig::from_env()?).await?;
    println!("Session status: {:?}", session.restore_status());

    if !session.is_authenticated() {
        let user = prompt("Internet user")?;
        let password = prompt("Password")?;
        let challenge = session.send_otp(&user, &password).await?;
        let otp = prompt("One-time code")?;
        session.login(&challenge, &otp).await?;
        println!("Logged in\n");
    }

    let accounts = session.rest().portfolio().sub_accounts().await;
    match accounts.json() {
        Some(body) => println!("Sub accounts: {body}\n"),
        None => println!("Sub accounts unavailable: {:?}\n", accounts.failure()),
    }

    let mut stream = session.streaming()?;
    let mut events = stream.take_event_receiver().expect("event receiver already taken");
    let running = stream.spawn();
    running.handle().subscribe(Feed::T, &symbols).await?;
    println!("Streaming {:?} for 60 seconds...\n", symbols);

    let deadline = tokio::time::sleep(Duration::from_secs(60));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            event = events.recv() => match event {
                Some(StreamEvent::Message(frame)) => println!("{frame}"),
                Some(StreamEvent::Reconnecting { attempt, delay }) => {
                    println!("Reconnecting (attempt {attempt}) in {delay:?}");
                }
                Some(StreamEvent::ReconnectFailed { error }) => {
                    println!("Streaming gave up: {error}");
                    break;
                }
                Some(_) => {}
                None => break,
            },
        }
    }

    if let Err(e) = running.shutdown(Duration::from_secs(5)).await {
        println!("Stream ended with error: {e}");
    }
    session.shutdown(Duration::from_secs(5)).await?;
    println!("\nDone");
    Ok(())
}
