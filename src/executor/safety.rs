// Confirmation gate for sensitive taps, plus the stock Interaction implementations.
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::action::types::Command;
use crate::executor::traits::Interaction;

/// The confirmation text attached to a command that must be approved before it runs.
pub fn requires_confirmation(command: &Command) -> Option<&str> {
    match command {
        Command::Tap {
            sensitive: Some(message),
            ..
        } => Some(message.as_str()),
        _ => None,
    }
}

/// Approves everything and never waits; for unattended runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoApprove;

#[async_trait]
impl Interaction for AutoApprove {
    async fn confirm(&self, message: &str) -> bool {
        tracing::info!(message, "sensitive action auto-approved");
        true
    }

    async fn take_over(&self, message: &str) {
        tracing::warn!(message, "takeover requested; continuing unattended");
    }
}

/// Asks on the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleInteraction;

impl ConsoleInteraction {
    async fn prompt(&self, text: &str) -> String {
        let mut stdout = tokio::io::stdout();
        let _ = stdout.write_all(text.as_bytes()).await;
        let _ = stdout.flush().await;
        let mut line = String::new();
        let mut reader = BufReader::new(tokio::io::stdin());
        if let Err(e) = reader.read_line(&mut line).await {
            tracing::warn!(error = %e, "failed to read from stdin");
        }
        line.trim().to_string()
    }
}

#[async_trait]
impl Interaction for ConsoleInteraction {
    async fn confirm(&self, message: &str) -> bool {
        let answer = self
            .prompt(&format!("Sensitive operation: {message}\nProceed? [y/N] "))
            .await;
        is_affirmative(&answer)
    }

    async fn take_over(&self, message: &str) {
        self.prompt(&format!(
            "Manual step required: {message}\nPress Enter when done... "
        ))
        .await;
    }
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.to_lowercase().as_str(), "y" | "yes")
}
