//! Local actions read as JSON lines from stdin.

use relayworld_core::LocalAction;
use tokio::io::{AsyncBufReadExt as _, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Parse one input line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Option<Result<LocalAction, serde_json::Error>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    Some(serde_json::from_str(line))
}

/// Forward actions from stdin until it closes or the loop goes away.
pub fn spawn_stdin_reader(actions: mpsc::Sender<LocalAction>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    debug!("stdin closed");
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read stdin");
                    return;
                }
            };
            match parse_line(&line) {
                None => {}
                Some(Ok(action)) => {
                    if actions.send(action).await.is_err() {
                        return;
                    }
                }
                Some(Err(e)) => warn!(error = %e, %line, "Ignoring malformed action"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_comment_lines_are_skipped() {
        assert!(parse_line("   ").is_none());
        assert!(parse_line("# place a wall").is_none());
    }

    #[test]
    fn actions_parse() {
        let parsed = parse_line(r#"{"action":"move_to","x":3,"y":4}"#);
        assert!(matches!(
            parsed,
            Some(Ok(LocalAction::MoveTo { x, y })) if (x - 3.0).abs() < f64::EPSILON && (y - 4.0).abs() < f64::EPSILON
        ));
        assert!(matches!(parse_line(r#"{"action":"fly"}"#), Some(Err(_))));
    }
}
