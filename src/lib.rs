//! # sticker-client
//!
//! Async Rust client for a remote sticker generation service: submit a
//! phrase, poll the long-running task with progress, fetch the result, and
//! download the generated image.
//!
//! ## Features
//!
//! - **Typed operations** for every endpoint: submit, task status, task
//!   result, asset download, cancel, plus health/examples/test probes
//! - **Full runs as a stream**: [`StickerClient::generate`] yields progress
//!   events and ends with exactly one [`GenerationOutcome`]
//! - **Transient error tolerance**: failed polls are retried with a capped
//!   linear backoff; server-reported failures are final
//! - **Cancellation**: cancelling or dropping a run stops polling and sends a
//!   best-effort cancel to the server
//! - **Pluggable transport**: the [`Transport`] trait lets tests and
//!   embedders replace the reqwest-backed [`HttpTransport`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use sticker_client::{ClientConfig, GenerationOutcome, GenerationRequest, StickerClient};
//!
//! # async fn example() -> sticker_client::Result<()> {
//! let client = StickerClient::new(ClientConfig::from_env()?)?;
//!
//! let run = client.generate(GenerationRequest::new("Bismillah"));
//! let outcome = run
//!     .outcome_with_progress(|s| println!("{}% - {}", s.progress, s.current_step))
//!     .await;
//!
//! match outcome {
//!     GenerationOutcome::Done(sticker) => {
//!         println!("{} bytes, meaning: {}", sticker.image.len(), sticker.analysis.meaning);
//!     }
//!     GenerationOutcome::Failed(err) => eprintln!("{}", err.user_message()),
//!     GenerationOutcome::Cancelled => {}
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod generation;
pub mod transport;
pub mod types;

pub use client::{AssetValidator, DecodableImage, StickerClient};
pub use config::{ClientConfig, ClientConfigBuilder, PollPolicy};
pub use error::{ApiError, Result};
pub use generation::{GenerationEvent, GenerationOutcome, GenerationRun};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Transport};
pub use types::{
    Analysis, ConnectionTest, Examples, GeneratedSticker, GenerationRequest, HealthAgents,
    HealthReport, TaskHandle, TaskResult, TaskState, TaskStatus,
};
