use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use recall::{
    ConversationRecord, ConversationStore, RecallError, ScoredRecord,
    retrieval::{RawListParams, RawSearchParams, RetrievalFilter},
};
use uuid::Uuid;

use crate::error::CliResult;
use crate::output::{OutputFormat, format_timestamp, single_line, truncate_string};

#[derive(Parser)]
pub struct HistoryCommand {
    #[clap(subcommand)]
    pub command: HistorySubcommand,
}

#[derive(Subcommand)]
pub enum HistorySubcommand {
    #[clap(about = "List stored conversations, newest first")]
    List(ListArgs),

    #[clap(about = "Find conversations similar to a query")]
    Search(SearchArgs),

    #[clap(about = "Show one conversation in full")]
    Show(ShowArgs),

    #[clap(about = "Store a conversation turn without calling the assistant")]
    Add(AddArgs),

    #[clap(about = "Delete conversations by ID")]
    Delete(DeleteArgs),
}

#[derive(Parser)]
pub struct ListArgs {
    #[clap(long, short, help = "Maximum number of conversations to display")]
    pub limit: Option<usize>,

    #[clap(long, help = "Number of newest matches to skip")]
    pub offset: Option<usize>,

    #[clap(long, short, help = "Filter by privacy level (high, medium, low)")]
    pub privacy: Option<String>,

    #[clap(long, short, help = "Only conversations containing this text")]
    pub keyword: Option<String>,

    #[clap(long = "tag", short, help = "Only conversations with any of these tags")]
    pub tags: Vec<String>,

    #[clap(long, help = "Earliest creation date (YYYY-MM-DD or ISO 8601)")]
    pub start: Option<String>,

    #[clap(long, help = "Latest creation date (YYYY-MM-DD or ISO 8601)")]
    pub end: Option<String>,
}

#[derive(Parser)]
pub struct SearchArgs {
    #[clap(help = "Text to search for")]
    pub query: String,

    #[clap(long, short, help = "Maximum number of results")]
    pub limit: Option<usize>,

    #[clap(long, short, help = "Filter by privacy level (high, medium, low)")]
    pub privacy: Option<String>,

    #[clap(long = "tag", short, help = "Only conversations with any of these tags")]
    pub tags: Vec<String>,

    #[clap(long, help = "Earliest creation date (YYYY-MM-DD or ISO 8601)")]
    pub start: Option<String>,

    #[clap(long, help = "Latest creation date (YYYY-MM-DD or ISO 8601)")]
    pub end: Option<String>,
}

#[derive(Parser)]
pub struct ShowArgs {
    #[clap(help = "Conversation ID (UUID format)")]
    pub id: String,
}

#[derive(Parser)]
pub struct AddArgs {
    #[clap(long, short, help = "User message")]
    pub user: String,

    #[clap(long, short, help = "Assistant reply")]
    pub assistant: String,

    #[clap(long = "tag", short, help = "Tag to attach (repeatable)")]
    pub tags: Vec<String>,
}

#[derive(Parser)]
pub struct DeleteArgs {
    #[clap(required = true, help = "Conversation IDs to delete (UUID format)")]
    pub ids: Vec<String>,
}

impl HistoryCommand {
    pub async fn execute(
        &self,
        store: &ConversationStore,
        filter: &RetrievalFilter,
        format: OutputFormat,
    ) -> CliResult<()> {
        match &self.command {
            HistorySubcommand::List(args) => Self::list(store, filter, args, format).await,
            HistorySubcommand::Search(args) => Self::search(store, filter, args, format).await,
            HistorySubcommand::Show(args) => Self::show(store, args, format).await,
            HistorySubcommand::Add(args) => Self::add(store, args, format).await,
            HistorySubcommand::Delete(args) => Self::delete(store, args, format).await,
        }
    }

    async fn list(
        store: &ConversationStore,
        filter: &RetrievalFilter,
        args: &ListArgs,
        format: OutputFormat,
    ) -> CliResult<()> {
        let query = filter.list(&RawListParams {
            privacy_level: args.privacy.clone(),
            keyword: args.keyword.clone(),
            tags: args.tags.clone(),
            start_date: args.start.clone(),
            end_date: args.end.clone(),
            limit: args.limit,
            offset: args.offset,
        })?;

        let records = store.list(&query).await?;

        match format {
            OutputFormat::Json => {
                let output: Vec<_> = records.iter().map(record_json).collect();
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                if records.is_empty() {
                    println!("No conversations found.");
                    return Ok(());
                }

                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["ID", "Conversation", "Privacy", "Tags", "Created"]);

                for record in &records {
                    table.add_row([
                        truncate_string(&record.id.to_string(), 8),
                        truncate_string(&single_line(&record.content), 60),
                        record.privacy_level.to_string(),
                        record.tags.join(", "),
                        format_timestamp(&record.created_at),
                    ]);
                }

                println!("{table}");
                println!("\nTotal: {} conversations", records.len());
            }
        }

        Ok(())
    }

    async fn search(
        store: &ConversationStore,
        filter: &RetrievalFilter,
        args: &SearchArgs,
        format: OutputFormat,
    ) -> CliResult<()> {
        let query = filter.search(&RawSearchParams {
            query: Some(args.query.clone()),
            privacy_level: args.privacy.clone(),
            tags: args.tags.clone(),
            start_date: args.start.clone(),
            end_date: args.end.clone(),
            limit: args.limit,
        })?;

        let results: Vec<ScoredRecord> = store.search(&query).await?;

        match format {
            OutputFormat::Json => {
                let output: Vec<_> = results
                    .iter()
                    .map(|r| {
                        let mut value = record_json(&r.record);
                        value["score"] = serde_json::json!(r.score);
                        value
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                if results.is_empty() {
                    println!("No matching conversations.");
                    return Ok(());
                }

                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["Score", "ID", "Conversation", "Privacy", "Created"]);

                for result in &results {
                    table.add_row([
                        format!("{:.3}", result.score),
                        truncate_string(&result.record.id.to_string(), 8),
                        truncate_string(&single_line(&result.record.content), 60),
                        result.record.privacy_level.to_string(),
                        format_timestamp(&result.record.created_at),
                    ]);
                }

                println!("{table}");
            }
        }

        Ok(())
    }

    async fn show(store: &ConversationStore, args: &ShowArgs, format: OutputFormat) -> CliResult<()> {
        let id = parse_id(&args.id)?;

        let record = store
            .get(id)
            .await?
            .ok_or_else(|| RecallError::NotFound(format!("Conversation not found: {}", args.id)))?;

        match format {
            OutputFormat::Json => {
                let mut output = record_json(&record);
                output["embedding_size"] = serde_json::json!(record.embedding.len());
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                let (user, assistant) = record.turn().unwrap_or((record.content.as_str(), "-"));

                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["Property", "Value"]);

                table.add_row(["ID", &record.id.to_string()]);
                table.add_row(["User", user]);
                table.add_row(["Assistant", assistant]);
                table.add_row(["Privacy", record.privacy_level.as_str()]);
                table.add_row(["Tags", &record.tags.join(", ")]);
                table.add_row(["Created", &record.created_at.to_rfc3339()]);
                table.add_row(["Message Length", &record.message_length.to_string()]);
                table.add_row(["Response Length", &record.response_length.to_string()]);
                table.add_row(["Embedding Size", &record.embedding.len().to_string()]);

                println!("{table}");
            }
        }

        Ok(())
    }

    async fn add(store: &ConversationStore, args: &AddArgs, format: OutputFormat) -> CliResult<()> {
        let id = store
            .save_with_tags(&args.user, &args.assistant, args.tags.clone())
            .await?;

        let record = store.get(id).await?;
        let privacy = record
            .as_ref()
            .map(|r| r.privacy_level.as_str())
            .unwrap_or("unknown");

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "id": id.to_string(),
                    "privacy_level": privacy,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                println!("Conversation saved: {id} (privacy: {privacy})");
            }
        }

        Ok(())
    }

    async fn delete(store: &ConversationStore, args: &DeleteArgs, format: OutputFormat) -> CliResult<()> {
        let ids = args
            .ids
            .iter()
            .map(|s| parse_id(s))
            .collect::<CliResult<Vec<Uuid>>>()?;

        store.delete(ids.iter().copied()).await?;

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "deleted": ids.iter().map(Uuid::to_string).collect::<Vec<_>>(),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                println!("Deleted {} conversation(s).", ids.len());
            }
        }

        Ok(())
    }
}

fn parse_id(raw: &str) -> CliResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|e| format!("Invalid UUID format: {e}").into())
}

fn record_json(record: &ConversationRecord) -> serde_json::Value {
    let (user, assistant) = match record.turn() {
        Some((u, a)) => (Some(u), Some(a)),
        None => (None, None),
    };

    serde_json::json!({
        "id": record.id.to_string(),
        "content": &record.content,
        "user": user,
        "assistant": assistant,
        "privacy_level": record.privacy_level,
        "tags": &record.tags,
        "created_at": record.created_at.to_rfc3339(),
        "message_length": record.message_length,
        "response_length": record.response_length,
    })
}
