//! JSON-lines bridge: one command per input line, one UI event per output
//! line.

use std::time::Duration;

use tabhost_common::TabhostError;
use tabhost_orchestrator::{Command, Orchestrator, UiEvent};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BridgeStats {
    pub commands: usize,
    pub rejected: usize,
    pub events: usize,
}

/// Pump commands from `input` into the orchestrator and UI events into
/// `output` until `input` ends. Then waits for the queued commands, keeps
/// forwarding until no event arrived for `settle`, and shuts down.
pub async fn run<R, W>(
    orch: &Orchestrator,
    input: R,
    output: &mut W,
    settle: Duration,
) -> Result<BridgeStats, TabhostError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut stats = BridgeStats::default();
    let mut events = orch.subscribe_ui();
    let mut lines = input.lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_line(&line) {
                    Ok(Some(command)) => {
                        stats.commands += 1;
                        orch.dispatch(command);
                    }
                    Ok(None) => {}
                    Err(rejection) => {
                        stats.rejected += 1;
                        write_event(output, &rejection).await?;
                        stats.events += 1;
                    }
                }
            }
            Some(event) = events.recv() => {
                write_event(output, &event).await?;
                stats.events += 1;
            }
        }
    }
    debug!("input closed, draining");

    orch.flush().await;
    while let Ok(Some(event)) = tokio::time::timeout(settle, events.recv()).await {
        write_event(output, &event).await?;
        stats.events += 1;
    }

    orch.shutdown().await;
    while let Ok(event) = events.try_recv() {
        write_event(output, &event).await?;
        stats.events += 1;
    }
    output.flush().await?;

    info!(
        commands = stats.commands,
        rejected = stats.rejected,
        events = stats.events,
        "bridge finished"
    );
    Ok(stats)
}

/// `Ok(None)` for blank lines and `#` comments; a `CommandFailed` event for
/// anything that is not a command.
fn parse_line(line: &str) -> Result<Option<Command>, UiEvent> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some).map_err(|e| {
        warn!(error = %e, "rejected malformed command");
        UiEvent::CommandFailed {
            tab_id: None,
            window_id: None,
            kind: "invalid_command".into(),
            error: e.to_string(),
        }
    })
}

async fn write_event<W>(output: &mut W, event: &UiEvent) -> Result<(), TabhostError>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_string(event)
        .map_err(|e| TabhostError::Other(format!("failed to encode event: {e}")))?;
    line.push('\n');
    output.write_all(line.as_bytes()).await?;
    output.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::Value;
    use tabhost_common::WindowId;
    use tabhost_config::TabhostConfig;
    use tabhost_surface::{HeadlessHost, HeadlessSettings};

    use super::*;

    fn orchestrator() -> (Orchestrator, HeadlessHost) {
        let host = HeadlessHost::with_windows(HeadlessSettings::default(), [WindowId(1)]);
        let mut config = TabhostConfig::default();
        config.lifecycle.destroy_debounce_ms = 5;
        (Orchestrator::new(Arc::new(host.clone()), &config), host)
    }

    fn types(output: &[u8]) -> Vec<String> {
        String::from_utf8_lossy(output)
            .lines()
            .map(|l| serde_json::from_str::<Value>(l).unwrap())
            .map(|v| v["type"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn blank_and_comment_lines_are_skipped() {
        assert_eq!(parse_line("   "), Ok(None));
        assert_eq!(parse_line("# setup"), Ok(None));
    }

    #[test]
    fn malformed_line_becomes_command_failed() {
        let Err(UiEvent::CommandFailed { kind, .. }) = parse_line("{\"type\":\"nope\"}") else {
            panic!("expected rejection");
        };
        assert_eq!(kind, "invalid_command");
    }

    #[test]
    fn valid_line_parses() {
        let cmd = parse_line(r#"{"type":"close_window","window_id":3}"#).unwrap();
        assert_eq!(
            cmd,
            Some(Command::CloseWindow {
                window_id: WindowId(3)
            })
        );
    }

    #[tokio::test]
    async fn commands_in_events_out() {
        let (orch, host) = orchestrator();
        let input: &[u8] = b"{\"type\":\"create_tab\",\"window_id\":1,\"url\":\"https://a.test\"}\n\
                              not json\n\
                              {\"type\":\"create_tab\",\"window_id\":9,\"url\":\"https://b.test\"}\n";
        let mut output = Vec::new();

        let stats = run(&orch, input, &mut output, Duration::from_millis(50))
            .await
            .unwrap();

        assert_eq!(stats.commands, 2);
        assert_eq!(stats.rejected, 1);
        let types = types(&output);
        assert_eq!(types.len(), stats.events);
        assert!(types.iter().any(|t| t == "tab_created"));
        assert!(types.iter().any(|t| t == "window_state_changed"));
        assert_eq!(types.iter().filter(|t| *t == "command_failed").count(), 2);
        assert_eq!(host.surface_count(), 0);
    }

    #[tokio::test]
    async fn empty_input_shuts_down_cleanly() {
        let (orch, _host) = orchestrator();
        let mut output = Vec::new();
        let stats = run(&orch, &b""[..], &mut output, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(stats, BridgeStats::default());
        assert!(output.is_empty());
    }
}
