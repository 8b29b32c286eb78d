use clap::Parser;
use recall::ConversationStore;

use crate::error::CliResult;
use crate::output::OutputFormat;

#[derive(Parser)]
pub struct VerifyCommand {}

impl VerifyCommand {
    pub async fn execute(&self, store: &ConversationStore, format: OutputFormat) -> CliResult<()> {
        let ok = store.verify_persistence().await;
        let count = if ok { store.count().await.ok() } else { None };

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "ok": ok,
                    "record_count": count,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => match count {
                Some(n) => println!("Storage OK: {n} conversations readable"),
                None => println!("Storage check failed, see log output for details"),
            },
        }

        if ok {
            Ok(())
        } else {
            Err("Persistence verification failed".into())
        }
    }
}
