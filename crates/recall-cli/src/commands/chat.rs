use clap::Parser;
use recall::{AppContext, ChatReply};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::warn;

use crate::error::CliResult;
use crate::output::OutputFormat;

#[derive(Parser)]
pub struct ChatCommand {
    #[clap(help = "Send a single message and exit. Without it, read messages from stdin")]
    pub message: Option<String>,
}

impl ChatCommand {
    pub async fn execute(&self, app: &AppContext, format: OutputFormat) -> CliResult<()> {
        match &self.message {
            Some(message) => {
                let reply = app.chat(message).await?;
                print_reply(&reply, format)
            }
            None => Self::interactive(app, format).await,
        }
    }

    async fn interactive(app: &AppContext, format: OutputFormat) -> CliResult<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        loop {
            if matches!(format, OutputFormat::Table) {
                stdout.write_all(b"> ").await?;
                stdout.flush().await?;
            }

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if is_exit(line) {
                break;
            }

            // A failed turn should not end the session.
            match app.chat(line).await {
                Ok(reply) => print_reply(&reply, format)?,
                Err(e) => {
                    warn!("Chat turn failed: {e}");
                    eprintln!("Error: [{}] {}", e.code(), e.user_message());
                }
            }
        }

        Ok(())
    }
}

fn is_exit(line: &str) -> bool {
    line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit")
}

fn print_reply(reply: &ChatReply, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(reply)?),
        OutputFormat::Table => {
            println!("{}", reply.reply);
            if reply.record_id.is_none() {
                eprintln!("(this exchange was not saved to history)");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_words() {
        assert!(is_exit("exit"));
        assert!(is_exit("QUIT"));
        assert!(!is_exit("exit now"));
    }
}
