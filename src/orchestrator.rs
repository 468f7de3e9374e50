use std::{sync::Arc, time::Instant};
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    events::GenerationEvent,
    providers::{clamp_count, collect_urls, ImageProvider},
};

#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub prompt: String,
    pub count: u8,
}

/// Runs one provider call off the front-end task and reports the outcome on
/// `tx`. Exactly one `Started` followed by one terminal event is sent, even
/// when the provider panics.
pub fn spawn_generation(
    provider: Arc<dyn ImageProvider>,
    job: GenerationJob,
    tx: mpsc::UnboundedSender<GenerationEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let count = clamp_count(job.count);
        let _ = tx.send(GenerationEvent::Started { count });

        let started = Instant::now();
        let call = {
            let provider = provider.clone();
            tokio::spawn(async move { provider.generate(&job.prompt, count).await })
        };
        let event = match call.await {
            Ok(Ok(items)) => {
                let urls = collect_urls(&items);
                tracing::info!(
                    provider = provider.name(),
                    images = urls.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "generation finished"
                );
                GenerationEvent::Finished { urls }
            }
            Ok(Err(e)) => {
                tracing::warn!(provider = provider.name(), "generation failed: {e}");
                GenerationEvent::Failed { error: e.to_string() }
            }
            Err(e) => {
                tracing::error!(provider = provider.name(), "generation worker died: {e}");
                GenerationEvent::Failed { error: "worker panicked".into() }
            }
        };
        if tx.send(event).is_err() {
            tracing::debug!("front-end went away before the generation finished");
        }
    })
}
