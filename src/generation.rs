//! Full generation runs: submit, poll until terminal, fetch, download.
//!
//! A run moves through `Submitting → Polling → Fetching` and ends in exactly
//! one [`GenerationOutcome`]. Poll errors are retried with a linear backoff up
//! to the policy's consecutive-error limit; everything else is final.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::channel::mpsc;
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::StickerClient;
use crate::error::ApiError;
use crate::transport::Transport;
use crate::types::*;

/// One step of a generation run, in the order they happen.
#[derive(Debug)]
pub enum GenerationEvent {
    /// The server accepted the request.
    Accepted(TaskHandle),
    /// A status poll succeeded. `progress` never decreases within a run.
    Progress(TaskStatus),
    /// The task completed; the result and image are being fetched.
    Fetching,
    /// The run ended. Always the last event.
    Finished(GenerationOutcome),
}

/// How a generation run ended.
#[derive(Debug)]
pub enum GenerationOutcome {
    /// The sticker was generated, downloaded and validated.
    Done(GeneratedSticker),
    /// The run failed; see [`ApiError::user_message`] for display.
    Failed(ApiError),
    /// The caller cancelled the run.
    Cancelled,
}

impl GenerationOutcome {
    pub fn sticker(&self) -> Option<&GeneratedSticker> {
        match self {
            GenerationOutcome::Done(sticker) => Some(sticker),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ApiError> {
        match self {
            GenerationOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, GenerationOutcome::Cancelled)
    }
}

/// Why a run stopped before producing a sticker.
enum Interrupt {
    Cancelled,
    Failed(ApiError),
}

impl From<ApiError> for Interrupt {
    fn from(err: ApiError) -> Self {
        Interrupt::Failed(err)
    }
}

type Step<T> = std::result::Result<T, Interrupt>;

/// Await `fut` unless `cancel` fires first.
async fn until_cancelled<F: Future>(cancel: &CancellationToken, fut: F) -> Step<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupt::Cancelled),
        out = fut => Ok(out),
    }
}

async fn pause(cancel: &CancellationToken, delay: Duration) -> Step<()> {
    until_cancelled(cancel, tokio::time::sleep(delay)).await
}

/// Error reported once the consecutive poll error budget is spent.
fn poll_budget_exhausted(last: ApiError, attempts: u32) -> ApiError {
    match last {
        err @ ApiError::Network { .. } => err,
        other => ApiError::network(
            format!("Task status unavailable after {attempts} consecutive attempts"),
            other,
        ),
    }
}

/// A generation running in the background.
///
/// Yields [`GenerationEvent`]s as a stream; the final item is always
/// [`GenerationEvent::Finished`]. Dropping the run cancels it.
#[derive(Debug)]
pub struct GenerationRun {
    events: mpsc::UnboundedReceiver<GenerationEvent>,
    cancel: CancellationToken,
}

impl GenerationRun {
    /// Request cancellation. The stream ends with `Finished(Cancelled)` unless
    /// the run had already finished.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The token controlling this run, for wiring into other cancellation.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drain the run and return its outcome, ignoring progress.
    pub async fn outcome(self) -> GenerationOutcome {
        self.outcome_with_progress(|_| {}).await
    }

    /// Drain the run, calling `on_progress` for each status.
    pub async fn outcome_with_progress<F>(mut self, mut on_progress: F) -> GenerationOutcome
    where
        F: FnMut(&TaskStatus),
    {
        while let Some(event) = self.events.next().await {
            match event {
                GenerationEvent::Progress(status) => on_progress(&status),
                GenerationEvent::Finished(outcome) => return outcome,
                GenerationEvent::Accepted(_) | GenerationEvent::Fetching => {}
            }
        }
        // Sender dropped without an outcome: the task was aborted.
        GenerationOutcome::Cancelled
    }
}

impl Stream for GenerationRun {
    type Item = GenerationEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_next_unpin(cx)
    }
}

impl Drop for GenerationRun {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl<T: Transport + 'static> StickerClient<T> {
    /// Start a generation on a background tokio task.
    ///
    /// Cancel any previous run before starting a new one for the same
    /// user action.
    ///
    /// # Example
    /// ```no_run
    /// use futures::StreamExt;
    /// use sticker_client::{ClientConfig, GenerationEvent, GenerationRequest, StickerClient};
    ///
    /// # async fn example() -> sticker_client::Result<()> {
    /// let client = StickerClient::new(ClientConfig::default())?;
    /// let mut run = client.generate(GenerationRequest::new("Bismillah"));
    /// while let Some(event) = run.next().await {
    ///     match event {
    ///         GenerationEvent::Progress(s) => println!("{}% {}", s.progress, s.current_step),
    ///         GenerationEvent::Finished(outcome) => println!("{:?}", outcome.error()),
    ///         _ => {}
    ///     }
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn generate(&self, request: GenerationRequest) -> GenerationRun {
        let cancel = CancellationToken::new();
        let (tx, events) = mpsc::unbounded();

        let client = self.clone();
        let token = cancel.clone();
        tokio::spawn(async move {
            let progress_tx = tx.clone();
            let outcome = client
                .run_generation(&request, &token, move |event| {
                    let _ = progress_tx.unbounded_send(event);
                })
                .await;
            let _ = tx.unbounded_send(GenerationEvent::Finished(outcome));
        });

        GenerationRun { events, cancel }
    }

    /// Run a full generation on the current task.
    ///
    /// `on_event` receives every event except `Finished`; the outcome is
    /// returned instead. Cancelling `cancel` stops the run at its next await
    /// point and fires a best-effort server-side cancel.
    pub async fn run_generation<F>(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
        mut on_event: F,
    ) -> GenerationOutcome
    where
        F: FnMut(GenerationEvent),
    {
        let handle = match until_cancelled(cancel, self.submit(request)).await {
            Ok(Ok(handle)) => handle,
            Ok(Err(err)) => {
                warn!(error = %err, "sticker submission failed");
                return GenerationOutcome::Failed(err);
            }
            Err(_) => {
                // No task id yet, so there is nothing to cancel server-side.
                info!("generation cancelled during submission");
                return GenerationOutcome::Cancelled;
            }
        };

        let task_id = handle.task_id.clone();
        on_event(GenerationEvent::Accepted(handle));

        let result = match self.poll_until_complete(&task_id, cancel, &mut on_event).await {
            Ok(()) => {
                on_event(GenerationEvent::Fetching);
                self.fetch_sticker(&task_id, cancel).await
            }
            Err(interrupt) => Err(interrupt),
        };

        match result {
            Ok(sticker) => {
                info!(%task_id, bytes = sticker.image.len(), "sticker generated");
                GenerationOutcome::Done(sticker)
            }
            Err(Interrupt::Failed(err)) => {
                warn!(%task_id, error = %err, "sticker generation failed");
                GenerationOutcome::Failed(err)
            }
            Err(Interrupt::Cancelled) => {
                info!(%task_id, "generation cancelled");
                self.notify_cancel(task_id);
                GenerationOutcome::Cancelled
            }
        }
    }

    async fn poll_until_complete<F>(
        &self,
        task_id: &str,
        cancel: &CancellationToken,
        on_event: &mut F,
    ) -> Step<()>
    where
        F: FnMut(GenerationEvent),
    {
        let policy = &self.config().polling;
        let mut consecutive_errors = 0u32;
        let mut reported = 0u32;

        for iteration in 1..=policy.max_iterations {
            if cancel.is_cancelled() {
                return Err(Interrupt::Cancelled);
            }
            let last = iteration == policy.max_iterations;

            match until_cancelled(cancel, self.task_status(task_id)).await? {
                Ok(mut status) => {
                    consecutive_errors = 0;
                    status.progress = status.progress.min(100).max(reported);
                    reported = status.progress;

                    let state = status.status;
                    let error_message = status.error_message.clone();
                    debug!(
                        %task_id,
                        iteration,
                        ?state,
                        progress = status.progress,
                        step = %status.current_step,
                        "task status"
                    );
                    on_event(GenerationEvent::Progress(status));

                    match state {
                        TaskState::Completed => return Ok(()),
                        TaskState::Failed => {
                            let message = error_message
                                .filter(|m| !m.trim().is_empty())
                                .unwrap_or_else(|| "Unknown error".to_string());
                            return Err(ApiError::GenerationFailed(message).into());
                        }
                        TaskState::Pending | TaskState::Processing => {
                            if !last {
                                pause(cancel, policy.interval).await?;
                            }
                        }
                    }
                }
                Err(err) => {
                    consecutive_errors += 1;
                    warn!(
                        %task_id,
                        attempt = consecutive_errors,
                        max = policy.max_consecutive_errors,
                        error = %err,
                        "task status poll failed"
                    );
                    if consecutive_errors >= policy.max_consecutive_errors {
                        return Err(poll_budget_exhausted(err, consecutive_errors).into());
                    }
                    if !last {
                        pause(cancel, policy.backoff(consecutive_errors)).await?;
                    }
                }
            }
        }

        Err(ApiError::Timeout.into())
    }

    async fn fetch_sticker(&self, task_id: &str, cancel: &CancellationToken) -> Step<GeneratedSticker> {
        if cancel.is_cancelled() {
            return Err(Interrupt::Cancelled);
        }

        let result = until_cancelled(cancel, self.task_result(task_id)).await??;
        let image_url = result.asset_reference()?.to_string();
        let image = until_cancelled(cancel, self.download_asset(&image_url)).await??;

        let TaskResult {
            message,
            content_type,
            generation_time,
            analysis,
            is_islamic,
            ..
        } = result;
        let analysis = analysis.ok_or_else(|| {
            ApiError::InvalidResponse("successful result is missing analysis".into())
        })?;

        Ok(GeneratedSticker {
            task_id: task_id.to_string(),
            image,
            image_url,
            analysis,
            message,
            content_type,
            generation_time,
            is_islamic,
        })
    }

    /// Fire a server-side cancel without waiting for it.
    fn notify_cancel(&self, task_id: String) {
        let client = self.clone();
        tokio::spawn(async move {
            if let Err(err) = client.cancel_task(&task_id).await {
                warn!(%task_id, error = %err, "failed to cancel task on server");
            }
        });
    }
}
