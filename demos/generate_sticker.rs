//! Generate one sticker with live progress and save it to disk.
//!
//! Reads `STICKER_API_URL` and friends from the environment. Ctrl-C
//! cancels the run and sends a cancel request to the server.
//!
//! ```sh
//! RUST_LOG=sticker_client=debug cargo run --example generate_sticker -- "Bismillah"
//! ```

use futures::StreamExt;
use sticker_client::{ClientConfig, GenerationEvent, GenerationOutcome, GenerationRequest, StickerClient};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let phrase = std::env::args().nth(1).unwrap_or_else(|| "Bismillah".to_string());
    let client = StickerClient::new(ClientConfig::from_env()?)?;

    let mut run = client.generate(GenerationRequest::new(phrase));
    let cancel = run.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    while let Some(event) = run.next().await {
        match event {
            GenerationEvent::Accepted(handle) => {
                println!("Queued {} (about {}s)", handle.task_id, handle.estimated_seconds);
            }
            GenerationEvent::Progress(status) => {
                println!("  {:>3}% {}", status.progress, status.current_step);
            }
            GenerationEvent::Fetching => println!("Downloading sticker..."),
            GenerationEvent::Finished(GenerationOutcome::Done(sticker)) => {
                let path = format!("{}.png", sticker.task_id);
                std::fs::write(&path, &sticker.image)?;
                println!("Saved {} ({} bytes)", path, sticker.image.len());
                println!("Meaning: {}", sticker.analysis.meaning);
                println!("Style: {}", sticker.analysis.recommended_style);
            }
            GenerationEvent::Finished(GenerationOutcome::Failed(err)) => {
                eprintln!("{}", err.user_message());
                eprintln!("  ({})", err);
            }
            GenerationEvent::Finished(GenerationOutcome::Cancelled) => eprintln!("Cancelled"),
        }
    }

    Ok(())
}
