//! Probe the sticker service: health, example phrases and connectivity.
//!
//! ```sh
//! STICKER_API_URL=http://localhost:8000 cargo run --example health_check
//! ```

use sticker_client::{ClientConfig, StickerClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("warn").init();

    let config = ClientConfig::from_env()?;
    println!("Checking {}", config.base_url);
    let client = StickerClient::new(config)?;

    match client.health().await {
        Ok(report) => {
            println!("Status: {} (v{})", report.status, report.version);
            println!("  prompt agent: {}", report.agents.prompt_agent);
            println!("  image agent:  {}", report.agents.image_agent);
            println!("  save agent:   {}", report.agents.save_agent);
        }
        Err(e) => {
            eprintln!("Health check failed: {}", e);
            return Ok(());
        }
    }

    let test = client.test_connection().await?;
    println!("Connection: {} ({})", test.message, test.timestamp);

    let examples = client.examples().await?;
    println!("Try one of:");
    for phrase in examples.textual_examples.iter().chain(&examples.visual_examples) {
        println!("  - {}", phrase);
    }

    Ok(())
}
