//! Persisted conversation store
//!
//! Wraps the LanceDB table with classification, embedding, filtering and ordering.
//! All methods take `&self`; share the store as `Arc<ConversationStore>`.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, error, info, warn};

use crate::error::{RecallError, Result};
use crate::memory::types::{
    ConversationRecord, PrivacyLevel, RecordId, ScoredRecord, format_turn,
};
use crate::privacy::PrivacyClassifier;
use crate::provider::{EmbeddingProvider, ProviderError, with_timeout};
use crate::retrieval::{ListQuery, SearchQuery, normalize_tags};
use crate::storage::{LanceStore, RecordFilter};

const DEFAULT_EMBED_TIMEOUT: Duration = Duration::from_secs(30);

/// Records logged by `verify_persistence`.
const VERIFY_SAMPLE: usize = 5;

/// Hands out strictly increasing UTC timestamps at microsecond resolution.
#[derive(Debug, Default)]
struct MonotonicClock {
    last_micros: AtomicI64,
}

impl MonotonicClock {
    fn next(&self) -> DateTime<Utc> {
        let now = Utc::now().timestamp_micros();
        let mut last = self.last_micros.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match self.last_micros.compare_exchange_weak(
                last,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Utc.timestamp_micros(candidate).single().unwrap_or_else(Utc::now),
                Err(observed) => last = observed,
            }
        }
    }

    /// Never hand out a timestamp at or below one already persisted.
    fn observe(&self, at: DateTime<Utc>) {
        self.last_micros
            .fetch_max(at.timestamp_micros(), Ordering::AcqRel);
    }
}

pub struct ConversationStore {
    lance: LanceStore,
    embedder: Arc<dyn EmbeddingProvider>,
    classifier: PrivacyClassifier,
    clock: MonotonicClock,
    embed_timeout: Duration,
}

impl ConversationStore {
    /// Open (or create) the collection under `path`, sized for the embedder's vectors.
    pub async fn open(
        path: &Path,
        collection: &str,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        std::fs::create_dir_all(path)?;

        let mut lance = LanceStore::connect(path, collection, embedder.dimensions()).await?;
        lance.open_or_create().await?;

        let store = Self {
            lance,
            embedder,
            classifier: PrivacyClassifier::default(),
            clock: MonotonicClock::default(),
            embed_timeout: DEFAULT_EMBED_TIMEOUT,
        };

        if let Some(newest) = store.list(&ListQuery::recent(1)).await?.first() {
            store.clock.observe(newest.created_at);
        }

        info!(
            "Conversation store opened at {} (collection {}, embedder {})",
            path.display(),
            collection,
            store.embedder.name()
        );

        Ok(store)
    }

    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    /// Persist one turn. Returns the new record's id.
    pub async fn save(&self, user_text: &str, assistant_text: &str) -> Result<RecordId> {
        self.save_with_tags(user_text, assistant_text, Vec::new())
            .await
    }

    /// Persist one turn with a tag set.
    ///
    /// Tags are normalized (trimmed, lowercased, deduplicated) and rejected if they contain
    /// characters other than alphanumerics, `-`, `.` or `:`. Nothing is written unless
    /// classification, embedding and the dimension check all complete; the append itself is a
    /// single commit.
    pub async fn save_with_tags(
        &self,
        user_text: &str,
        assistant_text: &str,
        tags: Vec<String>,
    ) -> Result<RecordId> {
        let user_text = user_text.trim();
        let assistant_text = assistant_text.trim();
        if user_text.is_empty() {
            return Err(RecallError::Validation(
                "User message must not be empty".to_string(),
            ));
        }
        if assistant_text.is_empty() {
            return Err(RecallError::Validation(
                "Assistant reply must not be empty".to_string(),
            ));
        }

        let tags = normalize_tags(&tags)?;

        let document = format_turn(user_text, assistant_text);
        let privacy_level = self.classify_guarded(&document);
        let embedding = self.embed(&document).await?;

        let mut record = ConversationRecord::new(
            user_text,
            assistant_text,
            embedding,
            privacy_level,
            self.clock.next(),
        );
        record.tags = tags;

        self.lance.insert(&record).await?;

        info!(
            "Saved conversation {} (privacy: {}, {} tags)",
            record.id,
            record.privacy_level,
            record.tags.len()
        );
        Ok(record.id)
    }

    fn classify_guarded(&self, document: &str) -> PrivacyLevel {
        match catch_unwind(AssertUnwindSafe(|| self.classifier.classify(document))) {
            Ok(level) => level,
            Err(_) => {
                warn!("Privacy classification failed, defaulting to low");
                PrivacyLevel::Low
            }
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = with_timeout(
            self.embed_timeout,
            self.embedder.name(),
            self.embedder.embed(text),
        )
        .await?;

        let expected = self.lance.dimensions();
        if embedding.len() != expected {
            return Err(ProviderError::Dimension {
                expected,
                actual: embedding.len(),
            }
            .into());
        }
        Ok(embedding)
    }

    /// Similarity search, best match first.
    ///
    /// Every filter is applied as a prefilter, so the `limit` nearest records are drawn from
    /// the matching rows only. Ties on score go to the newer record.
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<ScoredRecord>> {
        let filter = query.record_filter();
        let embedding = self.embed(&query.text).await?;

        let hits = self
            .lance
            .nearest(&embedding, filter.to_sql_clause(), query.limit)
            .await?;

        let mut results: Vec<ScoredRecord> = hits
            .into_iter()
            .map(|(record, distance)| ScoredRecord {
                record,
                score: 1.0 - distance,
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.record.created_at.cmp(&a.record.created_at))
        });
        results.truncate(query.limit);

        debug!(
            "Search returned {} of {} requested results",
            results.len(),
            query.limit
        );
        Ok(results)
    }

    /// Filtered listing, newest first, then `offset` and `limit` applied.
    pub async fn list(&self, query: &ListQuery) -> Result<Vec<ConversationRecord>> {
        let mut records = self.lance.scan(query.filter.to_sql_clause()).await?;
        records.retain(|r| query.filter.matches(r));
        records.sort_by(newest_first);

        Ok(records
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }

    /// The `limit` newest records, optionally restricted to one privacy level.
    pub async fn recent(
        &self,
        limit: usize,
        privacy_level: Option<PrivacyLevel>,
    ) -> Result<Vec<ConversationRecord>> {
        let mut query = ListQuery::recent(limit);
        query.filter = RecordFilter {
            privacy_level,
            ..RecordFilter::default()
        };
        self.list(&query).await
    }

    pub async fn get(&self, id: RecordId) -> Result<Option<ConversationRecord>> {
        self.lance.get(id).await
    }

    pub async fn count(&self) -> Result<usize> {
        self.lance.count().await
    }

    /// Remove the given ids in one commit. Unknown ids are ignored.
    pub async fn delete(&self, ids: impl IntoIterator<Item = RecordId>) -> Result<()> {
        let ids: Vec<RecordId> = ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        if ids.is_empty() {
            return Ok(());
        }

        self.lance.delete_ids(&ids).await?;
        info!("Deleted up to {} conversation records", ids.len());
        Ok(())
    }

    /// Start-up check: logs the record count and newest records.
    ///
    /// Returns `true` only when the store is reachable and holds at least one record.
    pub async fn verify_persistence(&self) -> bool {
        let records = match self.lance.scan(None).await {
            Ok(records) => records,
            Err(e) => {
                error!("Persistence verification failed: {e}");
                return false;
            }
        };

        info!("Conversation store holds {} records", records.len());
        if records.is_empty() {
            return false;
        }

        let mut records = records;
        records.sort_by(newest_first);
        for record in records.iter().take(VERIFY_SAMPLE) {
            let preview: String = record.content.chars().take(80).collect();
            info!(
                "  {} [{}] {} {:?}",
                record.created_at.format("%Y-%m-%d %H:%M:%S"),
                record.privacy_level,
                record.id,
                preview
            );
        }
        true
    }
}

fn newest_first(a: &ConversationRecord, b: &ConversationRecord) -> CmpOrdering {
    b.created_at.cmp(&a.created_at)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_is_strictly_increasing() {
        let clock = MonotonicClock::default();
        let mut prev = clock.next();
        for _ in 0..1000 {
            let next = clock.next();
            assert!(next > prev);
            prev = next;
        }
    }

    #[test]
    fn test_clock_observe_moves_past_future_timestamp() {
        let clock = MonotonicClock::default();
        let future = Utc::now() + chrono::Duration::hours(1);
        clock.observe(future);
        assert!(clock.next() > future);
    }

    #[test]
    fn test_clock_concurrent_callers_never_collide() {
        let clock = Arc::new(MonotonicClock::default());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let clock = Arc::clone(&clock);
                std::thread::spawn(move || (0..500).map(|_| clock.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<DateTime<Utc>> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let total = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), total);
    }
}
