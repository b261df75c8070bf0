//! Queue-driven host loop: text in, replies out, cancellable between items.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::session::VoiceAgent;

/// Aggregate statistics are logged after every this many processed items.
pub const STATS_LOG_INTERVAL: u64 = 5;

/// Feed queued utterances to the agent until the input closes or `cancel` fires.
///
/// Each item is processed to completion; cancellation is only observed
/// between items. A failed turn is logged and produces no reply. Items still
/// queued when the loop stops are discarded. Returns the number of items
/// processed.
pub async fn run_pipeline(
    agent: &mut VoiceAgent,
    mut input_rx: mpsc::Receiver<String>,
    output_tx: mpsc::Sender<String>,
    cancel: CancellationToken,
) -> u64 {
    let mut processed = 0u64;

    loop {
        let item = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            item = input_rx.recv() => item,
        };
        let Some(text) = item else {
            break;
        };

        match agent.process(&text).await {
            Ok(reply) if reply.is_empty() => {}
            Ok(reply) => {
                if output_tx.send(reply).await.is_err() {
                    tracing::debug!("reply receiver dropped; stopping pipeline");
                    break;
                }
            }
            Err(error) => {
                tracing::warn!(%error, impact = ?error.impact(), "turn failed");
            }
        }

        processed += 1;
        if processed % STATS_LOG_INTERVAL == 0 {
            let stats = agent.stats();
            tracing::info!(
                turns = stats.agent.total_turns,
                tool_calls = stats.agent.total_tool_calls,
                errors = stats.agent.total_errors,
                messages = stats.context.total_messages,
                providers = stats.registry.total_providers,
                tools = stats.registry.total_tools,
                "session statistics"
            );
        }

        if cancel.is_cancelled() {
            break;
        }
    }

    input_rx.close();
    let mut discarded = 0usize;
    while input_rx.try_recv().is_ok() {
        discarded += 1;
    }
    if discarded > 0 {
        tracing::info!(discarded, "discarded queued input");
    }
    processed
}
