//! Line-oriented event loop over stdin/stdout.
//!
//! One JSON event per input line, zero-or-more JSON directive lines out,
//! flushed per event. Events are handled strictly in order; a new line is
//! not read until the previous event's directives have been written. A line
//! that fails to decode is answered with a single `noop` so the
//! orchestrator sees the worker is alive; liveness beats strictness here.
//! End of input runs the dispatcher's shutdown before returning.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::dispatch::Dispatcher;
use crate::error::PluginResult;
use crate::protocol::{decode_event, encode_directive, PluginDirective};

/// Drive a dispatcher from `reader` until EOF, writing directives to
/// `writer`.
pub async fn run<D, R, W>(dispatcher: &mut D, reader: R, mut writer: W) -> PluginResult<()>
where
    D: Dispatcher + Send,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let directives = match decode_event(line) {
            Ok(event) => {
                tracing::debug!(
                    event_id = %event.event_id,
                    event_type = %event.event_type,
                    "event received"
                );
                dispatcher.handle_event(&event).await
            }
            Err(err) => {
                tracing::warn!(error = %err, "malformed event line");
                vec![PluginDirective::Noop]
            }
        };

        for directive in &directives {
            let encoded = encode_directive(directive)?;
            writer.write_all(encoded.as_bytes()).await?;
            writer.write_all(b"\n").await?;
        }
        writer.flush().await?;
    }

    tracing::info!("input closed, shutting down");
    dispatcher.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::protocol::EventEnvelope;

    #[derive(Default)]
    struct ScriptedDispatcher {
        seen: Vec<String>,
        shutdown_called: bool,
    }

    #[async_trait]
    impl Dispatcher for ScriptedDispatcher {
        async fn handle_event(&mut self, event: &EventEnvelope) -> Vec<PluginDirective> {
            self.seen.push(event.event_id.clone());
            vec![PluginDirective::enqueue_task(
                "echo",
                None,
                None,
                json!({ "event_id": event.event_id }),
            )]
        }

        async fn shutdown(&mut self) {
            self.shutdown_called = true;
        }
    }

    fn output_lines(output: &[u8]) -> Vec<PluginDirective> {
        std::str::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_events_are_handled_in_order() {
        let input = concat!(
            r#"{"event_id":"e-1","event_type":"task.received"}"#,
            "\n",
            r#"{"event_id":"e-2","event_type":"task.received"}"#,
            "\n",
        );
        let mut dispatcher = ScriptedDispatcher::default();
        let mut output = Vec::new();

        run(&mut dispatcher, input.as_bytes(), &mut output).await.unwrap();

        assert_eq!(dispatcher.seen, ["e-1", "e-2"]);
        let directives = output_lines(&output);
        assert_eq!(directives.len(), 2);
        match &directives[0] {
            PluginDirective::EnqueueTask { payload, .. } => {
                assert_eq!(payload["event_id"], json!("e-1"));
            }
            other => panic!("expected enqueue_task, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_line_gets_one_noop_and_loop_continues() {
        let input = concat!(
            "this is not json\n",
            r#"{"event_id":"e-2","event_type":"task.received"}"#,
            "\n",
        );
        let mut dispatcher = ScriptedDispatcher::default();
        let mut output = Vec::new();

        run(&mut dispatcher, input.as_bytes(), &mut output).await.unwrap();

        let directives = output_lines(&output);
        assert_eq!(directives[0], PluginDirective::Noop);
        assert_eq!(directives.len(), 2);
        assert_eq!(dispatcher.seen, ["e-2"]);
    }

    #[tokio::test]
    async fn test_blank_lines_are_skipped() {
        let input = "\n   \n\n";
        let mut dispatcher = ScriptedDispatcher::default();
        let mut output = Vec::new();

        run(&mut dispatcher, input.as_bytes(), &mut output).await.unwrap();

        assert!(output.is_empty());
        assert!(dispatcher.seen.is_empty());
    }

    #[tokio::test]
    async fn test_eof_runs_shutdown() {
        let mut dispatcher = ScriptedDispatcher::default();
        let mut output = Vec::new();

        run(&mut dispatcher, &b""[..], &mut output).await.unwrap();
        assert!(dispatcher.shutdown_called);
    }
}
