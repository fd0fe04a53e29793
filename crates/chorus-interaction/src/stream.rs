//! Server-sent-event accumulation for streamed completions.

use crate::error::CompletionError;
use crate::request::ChatCompletionChunk;
use crate::transport::BodyStream;
use eventsource_stream::{EventStreamError, Eventsource};
use futures::StreamExt;

/// Data payload that ends a stream.
pub const DONE_MARKER: &str = "[DONE]";

/// Reads `data:` events until `[DONE]` or end of body and returns the
/// concatenated `choices[0].delta.content` fragments.
///
/// `on_delta` sees the accumulated text after each non-empty fragment.
/// Malformed chunks are logged and skipped.
pub async fn accumulate_deltas<F>(body: BodyStream, mut on_delta: F) -> Result<String, CompletionError>
where
    F: FnMut(&str),
{
    let mut events = body.eventsource();
    let mut accumulated = String::new();

    while let Some(event) = events.next().await {
        let event = event.map_err(map_event_error)?;
        let data = event.data.trim();
        if data == DONE_MARKER {
            break;
        }
        if data.is_empty() {
            continue;
        }

        let chunk: ChatCompletionChunk = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!("[Completion] Skipping malformed stream chunk: {}, data: {}", e, data);
                continue;
            }
        };

        if let Some(reason) = chunk.first_choice().and_then(|c| c.finish_reason.as_deref()) {
            tracing::debug!("[Completion] Stream finished: {}", reason);
        }
        if let Some(piece) = chunk.delta_content().filter(|piece| !piece.is_empty()) {
            accumulated.push_str(piece);
            on_delta(&accumulated);
        }
    }

    Ok(accumulated)
}

fn map_event_error(err: EventStreamError<CompletionError>) -> CompletionError {
    match err {
        EventStreamError::Transport(inner) => inner,
        other => CompletionError::Stream(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn body(chunks: &[&str]) -> BodyStream {
        let chunks: Vec<Result<Vec<u8>, CompletionError>> =
            chunks.iter().map(|c| Ok(c.as_bytes().to_vec())).collect();
        Box::pin(stream::iter(chunks))
    }

    fn delta(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"object": "chat.completion.chunk", "choices": [{"delta": {"content": text}}]})
        )
    }

    #[tokio::test]
    async fn test_accumulates_until_done() {
        let mut seen = Vec::new();
        let text = accumulate_deltas(
            body(&[&delta("Hi"), &delta(" there"), &delta("!"), "data: [DONE]\n\n", &delta("ignored")]),
            |partial| seen.push(partial.to_string()),
        )
        .await
        .unwrap();

        assert_eq!(text, "Hi there!");
        assert_eq!(seen, vec!["Hi", "Hi there", "Hi there!"]);
    }

    #[tokio::test]
    async fn test_events_split_across_chunks() {
        let first = delta("Hel");
        let (a, b) = first.split_at(12);
        let text = accumulate_deltas(body(&[a, b, &delta("lo")]), |_| {})
            .await
            .unwrap();
        assert_eq!(text, "Hello");
    }

    #[tokio::test]
    async fn test_malformed_chunk_skipped() {
        let text = accumulate_deltas(
            body(&[&delta("A"), "data: {not json\n\n", ": keep-alive\n\n", &delta("B"), "data: [DONE]\n\n"]),
            |_| {},
        )
        .await
        .unwrap();
        assert_eq!(text, "AB");
    }

    #[tokio::test]
    async fn test_transport_error_mid_stream() {
        let chunks: Vec<Result<Vec<u8>, CompletionError>> = vec![
            Ok(delta("partial").into_bytes()),
            Err(CompletionError::Timeout),
        ];
        let err = accumulate_deltas(Box::pin(stream::iter(chunks)), |_| {})
            .await
            .unwrap_err();
        assert_eq!(err, CompletionError::Timeout);
    }
}
