//! Filter types for conversation queries
//!
//! Privacy, tag and date-range predicates are pushed down to LanceDB as a SQL prefilter so
//! that the vector search and the table scan see the same narrowed row set. The keyword
//! predicate is evaluated on decoded records.

use chrono::{DateTime, Utc};

use crate::memory::types::{ConversationRecord, PrivacyLevel};

/// Inclusive time window. Either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.is_none_or(|s| at >= s) && self.end.is_none_or(|e| at <= e)
    }

    pub fn is_open(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Filter criteria shared by search and listing.
///
/// All fields are optional - when `None` (or empty, for tags), that filter is not applied.
/// Criteria combine with AND; tags match when the record carries any of them.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    /// Exact privacy level
    pub privacy_level: Option<PrivacyLevel>,
    /// Match-any tag set (already normalized)
    pub tags: Vec<String>,
    /// Case-insensitive substring of the turn document
    pub keyword: Option<String>,
    /// Inclusive creation-time window
    pub date_range: Option<DateRange>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_privacy_level(mut self, level: PrivacyLevel) -> Self {
        self.privacy_level = Some(level);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    /// Build the SQL WHERE clause for the pushed-down predicates.
    /// Returns `None` if none are set.
    pub fn to_sql_clause(&self) -> Option<String> {
        let mut conditions = Vec::new();

        if let Some(level) = self.privacy_level {
            conditions.push(format!("privacy_level = '{}'", level.as_str()));
        }

        // Tags are stored as ",a,b," so a delimited LIKE never matches a tag prefix
        if !self.tags.is_empty() {
            let any = self
                .tags
                .iter()
                .map(|t| format!("tags LIKE '%,{},%'", t.replace('\'', "''")))
                .collect::<Vec<_>>()
                .join(" OR ");
            conditions.push(format!("({any})"));
        }

        // created_at is stored as microseconds since epoch
        if let Some(range) = self.date_range {
            if let Some(start) = range.start {
                conditions.push(format!("created_at >= {}", start.timestamp_micros()));
            }
            if let Some(end) = range.end {
                conditions.push(format!("created_at <= {}", end.timestamp_micros()));
            }
        }

        if conditions.is_empty() {
            None
        } else {
            Some(conditions.join(" AND "))
        }
    }

    /// Evaluate every criterion against a decoded record.
    pub fn matches(&self, record: &ConversationRecord) -> bool {
        if self.privacy_level.is_some_and(|level| record.privacy_level != level) {
            return false;
        }

        if !self.tags.is_empty() && !self.tags.iter().any(|t| record.has_tag(t)) {
            return false;
        }

        if let Some(ref keyword) = self.keyword {
            if !record
                .content
                .to_lowercase()
                .contains(&keyword.to_lowercase())
            {
                return false;
            }
        }

        self.date_range
            .is_none_or(|range| range.contains(record.created_at))
    }

    pub fn is_empty(&self) -> bool {
        self.privacy_level.is_none()
            && self.tags.is_empty()
            && self.keyword.is_none()
            && self.date_range.is_none_or(|r| r.is_open())
    }
}
