use serde::Deserialize;

use crate::memory::types::PrivacyLevel;
use crate::storage::{DateRange, RecordFilter};

/// A normalized similarity search request.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub text: String,
    pub privacy_level: Option<PrivacyLevel>,
    pub tags: Vec<String>,
    pub date_range: Option<DateRange>,
    pub limit: usize,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, limit: usize) -> Self {
        Self {
            text: text.into(),
            privacy_level: None,
            tags: Vec::new(),
            date_range: None,
            limit,
        }
    }

    pub fn record_filter(&self) -> RecordFilter {
        RecordFilter {
            privacy_level: self.privacy_level,
            tags: self.tags.clone(),
            keyword: None,
            date_range: self.date_range,
        }
    }
}

/// A normalized listing request.
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub filter: RecordFilter,
    pub limit: usize,
    pub offset: usize,
}

impl ListQuery {
    /// The `limit` newest records, unfiltered.
    pub fn recent(limit: usize) -> Self {
        Self {
            filter: RecordFilter::default(),
            limit,
            offset: 0,
        }
    }
}

/// Search parameters as they arrive from a caller, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSearchParams {
    pub query: Option<String>,
    pub privacy_level: Option<String>,
    pub tags: Vec<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub limit: Option<usize>,
}

/// Listing parameters as they arrive from a caller, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawListParams {
    pub privacy_level: Option<String>,
    pub keyword: Option<String>,
    pub tags: Vec<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_params_deserialize_with_missing_fields() {
        let raw: RawListParams =
            serde_json::from_str(r#"{"keyword": "paris", "limit": 10}"#).unwrap();
        assert_eq!(raw.keyword.as_deref(), Some("paris"));
        assert_eq!(raw.limit, Some(10));
        assert!(raw.tags.is_empty());
        assert!(raw.offset.is_none());
    }

    #[test]
    fn test_search_filter_has_no_keyword() {
        let mut query = SearchQuery::new("hello", 5);
        query.privacy_level = Some(PrivacyLevel::High);
        let filter = query.record_filter();
        assert_eq!(filter.privacy_level, Some(PrivacyLevel::High));
        assert!(filter.keyword.is_none());
    }
}
