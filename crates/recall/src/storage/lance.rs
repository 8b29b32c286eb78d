//! LanceDB persistence for conversation records

use std::path::Path;
use std::sync::Arc;

use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator,
    StringArray, TimestampMicrosecondArray,
};
use arrow_schema::{DataType, Field, Schema, TimeUnit};
use chrono::{TimeZone, Utc};
use futures::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{DistanceType, Table};
use uuid::Uuid;

use crate::error::{RecallError, Result};
use crate::memory::types::{ConversationRecord, PrivacyLevel, RecordId};

const DISTANCE_COLUMN: &str = "_distance";

/// One LanceDB table holding turn text, metadata and embedding together.
///
/// Every write is a single table commit, so the scan path and the vector path
/// always observe the same set of records.
pub struct LanceStore {
    connection: Connection,
    table: Option<Table>,
    collection: String,
    dimensions: i32,
}

impl LanceStore {
    pub async fn connect(path: &Path, collection: &str, dimensions: usize) -> Result<Self> {
        let uri = path
            .to_str()
            .ok_or_else(|| RecallError::Persistence("Invalid path encoding".to_string()))?;

        let dimensions = i32::try_from(dimensions).map_err(|_| {
            RecallError::Persistence(format!("Embedding dimension {dimensions} is too large"))
        })?;

        let connection = lancedb::connect(uri)
            .execute()
            .await
            .map_err(|e| RecallError::Persistence(format!("Failed to connect to LanceDB: {e}")))?;

        Ok(Self {
            connection,
            table: None,
            collection: collection.to_string(),
            dimensions,
        })
    }

    pub fn schema(dimensions: i32) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimensions,
                ),
                false,
            ),
            Field::new("privacy_level", DataType::Utf8, false),
            Field::new("tags", DataType::Utf8, false),
            Field::new(
                "created_at",
                DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
                false,
            ),
            Field::new("message_length", DataType::Int32, false),
            Field::new("response_length", DataType::Int32, false),
        ]))
    }

    pub async fn table_exists(&self) -> Result<bool> {
        let names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RecallError::Persistence(format!("Failed to list tables: {e}")))?;

        Ok(names.contains(&self.collection))
    }

    pub async fn create_table(&mut self) -> Result<()> {
        let schema = Self::schema(self.dimensions);
        let batch = RecordBatch::new_empty(schema.clone());
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        let table = self
            .connection
            .create_table(&self.collection, Box::new(batches))
            .execute()
            .await
            .map_err(|e| {
                RecallError::Persistence(format!(
                    "Failed to create table {}: {e}",
                    self.collection
                ))
            })?;

        self.table = Some(table);
        Ok(())
    }

    /// Open the existing table, refusing one built for a different embedding size.
    pub async fn open_table(&mut self) -> Result<()> {
        let table = self
            .connection
            .open_table(&self.collection)
            .execute()
            .await
            .map_err(|e| {
                RecallError::Persistence(format!("Failed to open table {}: {e}", self.collection))
            })?;

        let schema = table
            .schema()
            .await
            .map_err(|e| RecallError::Persistence(format!("Failed to read table schema: {e}")))?;

        let stored = match schema.field_with_name("embedding").map(|f| f.data_type()) {
            Ok(DataType::FixedSizeList(_, size)) => *size,
            _ => {
                return Err(RecallError::Persistence(format!(
                    "Table {} has no embedding column",
                    self.collection
                )));
            }
        };

        if stored != self.dimensions {
            return Err(RecallError::Config(format!(
                "Table {} stores {stored}-dimensional embeddings but the embedding provider \
                 produces {}",
                self.collection, self.dimensions
            )));
        }

        self.table = Some(table);
        Ok(())
    }

    pub async fn open_or_create(&mut self) -> Result<()> {
        if self.table_exists().await? {
            self.open_table().await
        } else {
            self.create_table().await
        }
    }

    fn table(&self) -> Result<&Table> {
        self.table.as_ref().ok_or_else(|| {
            RecallError::Persistence("Conversation table not initialized".to_string())
        })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions as usize
    }

    /// Append one record as a single commit.
    pub async fn insert(&self, record: &ConversationRecord) -> Result<()> {
        let table = self.table()?;

        let schema = Self::schema(self.dimensions);
        let batch =
            Self::records_to_batch(std::slice::from_ref(record), schema.clone(), self.dimensions)?;
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        table
            .add(Box::new(batches))
            .execute()
            .await
            .map_err(|e| RecallError::Persistence(format!("Failed to insert record: {e}")))?;

        Ok(())
    }

    pub async fn get(&self, id: RecordId) -> Result<Option<ConversationRecord>> {
        let mut records = self.scan(Some(format!("id = '{id}'"))).await?;
        Ok(records.pop())
    }

    /// Read every record matching the optional SQL predicate, in storage order.
    pub async fn scan(&self, predicate: Option<String>) -> Result<Vec<ConversationRecord>> {
        let table = self.table()?;

        let mut query = table.query();
        if let Some(sql) = predicate {
            query = query.only_if(sql);
        }

        let stream = query
            .execute()
            .await
            .map_err(|e| RecallError::Persistence(format!("Failed to query records: {e}")))?;

        let batches: Vec<RecordBatch> = stream.try_collect().await.map_err(|e| {
            RecallError::Persistence(format!("Failed to collect query results: {e}"))
        })?;

        let mut records = Vec::new();
        for batch in &batches {
            for row in 0..batch.num_rows() {
                records.push(Self::batch_to_record(batch, row)?);
            }
        }
        Ok(records)
    }

    /// Cosine nearest-neighbour query with the predicate applied as a prefilter.
    ///
    /// Returns records with their cosine distance, closest first.
    pub async fn nearest(
        &self,
        embedding: &[f32],
        predicate: Option<String>,
        limit: usize,
    ) -> Result<Vec<(ConversationRecord, f32)>> {
        let table = self.table()?;

        if self.count().await? == 0 {
            return Ok(Vec::new());
        }

        let mut query = table
            .query()
            .nearest_to(embedding)
            .map_err(|e| RecallError::Persistence(format!("Failed to create vector query: {e}")))?
            .distance_type(DistanceType::Cosine)
            .limit(limit);

        if let Some(sql) = predicate {
            query = query.only_if(sql);
        }

        let stream = query
            .execute()
            .await
            .map_err(|e| RecallError::Persistence(format!("Failed to execute search: {e}")))?;

        let batches: Vec<RecordBatch> = stream.try_collect().await.map_err(|e| {
            RecallError::Persistence(format!("Failed to collect search results: {e}"))
        })?;

        let mut hits = Vec::new();
        for batch in &batches {
            let distances = column::<Float32Array>(batch, DISTANCE_COLUMN)?;
            for row in 0..batch.num_rows() {
                hits.push((Self::batch_to_record(batch, row)?, distances.value(row)));
            }
        }
        Ok(hits)
    }

    /// Remove every listed id in one commit. Unknown ids are ignored.
    pub async fn delete_ids(&self, ids: &[RecordId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let table = self.table()?;
        let in_list = ids
            .iter()
            .map(|id| format!("'{id}'"))
            .collect::<Vec<_>>()
            .join(", ");

        table
            .delete(&format!("id IN ({in_list})"))
            .await
            .map_err(|e| RecallError::Persistence(format!("Failed to delete records: {e}")))?;

        Ok(())
    }

    pub async fn count(&self) -> Result<usize> {
        let table = self.table()?;
        table
            .count_rows(None)
            .await
            .map_err(|e| RecallError::Persistence(format!("Failed to count rows: {e}")))
    }

    fn records_to_batch(
        records: &[ConversationRecord],
        schema: Arc<Schema>,
        dimensions: i32,
    ) -> Result<RecordBatch> {
        let ids: Vec<String> = records.iter().map(|r| r.id.to_string()).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();

        let contents: Vec<&str> = records.iter().map(|r| r.content.as_str()).collect();

        let embeddings: Vec<Option<Vec<Option<f32>>>> = records
            .iter()
            .map(|r| Some(r.embedding.iter().map(|&v| Some(v)).collect()))
            .collect();

        let levels: Vec<&str> = records.iter().map(|r| r.privacy_level.as_str()).collect();

        let tags: Vec<String> = records.iter().map(|r| encode_tags(&r.tags)).collect();
        let tag_refs: Vec<&str> = tags.iter().map(String::as_str).collect();

        let created_at: Vec<i64> = records
            .iter()
            .map(|r| r.created_at.timestamp_micros())
            .collect();

        let message_lengths: Vec<i32> = records
            .iter()
            .map(|r| i32::try_from(r.message_length).unwrap_or(i32::MAX))
            .collect();
        let response_lengths: Vec<i32> = records
            .iter()
            .map(|r| i32::try_from(r.response_length).unwrap_or(i32::MAX))
            .collect();

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(id_refs)),
                Arc::new(StringArray::from(contents)),
                Arc::new(FixedSizeListArray::from_iter_primitive::<
                    arrow_array::types::Float32Type,
                    _,
                    _,
                >(embeddings, dimensions)),
                Arc::new(StringArray::from(levels)),
                Arc::new(StringArray::from(tag_refs)),
                Arc::new(TimestampMicrosecondArray::from(created_at).with_timezone("UTC")),
                Arc::new(Int32Array::from(message_lengths)),
                Arc::new(Int32Array::from(response_lengths)),
            ],
        )
        .map_err(|e| RecallError::Persistence(format!("Failed to create RecordBatch: {e}")))
    }

    /// Decode a row by column name, so extra columns such as `_distance` are ignored.
    fn batch_to_record(batch: &RecordBatch, row: usize) -> Result<ConversationRecord> {
        let id_array = column::<StringArray>(batch, "id")?;
        let content_array = column::<StringArray>(batch, "content")?;
        let embedding_array = column::<FixedSizeListArray>(batch, "embedding")?;
        let level_array = column::<StringArray>(batch, "privacy_level")?;
        let tags_array = column::<StringArray>(batch, "tags")?;
        let created_at_array = column::<TimestampMicrosecondArray>(batch, "created_at")?;
        let message_length_array = column::<Int32Array>(batch, "message_length")?;
        let response_length_array = column::<Int32Array>(batch, "response_length")?;

        let id = Uuid::parse_str(id_array.value(row))
            .map_err(|e| RecallError::Persistence(format!("Failed to parse UUID: {e}")))?;

        let embedding_list = embedding_array.value(row);
        let embedding = embedding_list
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| RecallError::Persistence("Failed to get embedding values".to_string()))?
            .values()
            .to_vec();

        let privacy_level: PrivacyLevel = level_array.value(row).parse().map_err(|_| {
            RecallError::Persistence(format!(
                "Unknown privacy level: {}",
                level_array.value(row)
            ))
        })?;

        let created_at = Utc
            .timestamp_micros(created_at_array.value(row))
            .single()
            .ok_or_else(|| {
                RecallError::Persistence("Failed to parse created_at timestamp".to_string())
            })?;

        Ok(ConversationRecord {
            id,
            content: content_array.value(row).to_string(),
            embedding,
            privacy_level,
            tags: decode_tags(tags_array.value(row)),
            created_at,
            message_length: message_length_array.value(row).max(0) as usize,
            response_length: response_length_array.value(row).max(0) as usize,
        })
    }
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| RecallError::Persistence(format!("Failed to get {name} column")))
}

/// `["a", "b"]` is stored as `",a,b,"` so each tag can be matched with a delimited LIKE.
fn encode_tags(tags: &[String]) -> String {
    if tags.is_empty() {
        String::new()
    } else {
        format!(",{},", tags.join(","))
    }
}

fn decode_tags(stored: &str) -> Vec<String> {
    stored
        .split(',')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
