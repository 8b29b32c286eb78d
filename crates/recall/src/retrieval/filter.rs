use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::config::RetrievalConfig;
use crate::error::{RecallError, Result};
use crate::memory::types::PrivacyLevel;
use crate::retrieval::query::{ListQuery, RawListParams, RawSearchParams, SearchQuery};
use crate::storage::{DateRange, RecordFilter};

/// Which end of a range a bare date stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Start,
    End,
}

/// Turns raw, possibly-absent query parameters into validated queries. Performs no I/O.
#[derive(Debug, Clone)]
pub struct RetrievalFilter {
    search_limit: usize,
    list_limit: usize,
    max_limit: usize,
}

impl Default for RetrievalFilter {
    fn default() -> Self {
        Self::from_config(&RetrievalConfig::default())
    }
}

impl RetrievalFilter {
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self {
            search_limit: config.search_limit,
            list_limit: config.list_limit,
            max_limit: config.max_limit,
        }
    }

    pub fn search(&self, raw: &RawSearchParams) -> Result<SearchQuery> {
        let text = non_empty(raw.query.as_deref()).ok_or_else(|| {
            RecallError::Validation("Search query must not be empty".to_string())
        })?;

        Ok(SearchQuery {
            text,
            privacy_level: parse_privacy(raw.privacy_level.as_deref())?,
            tags: normalize_tags(&raw.tags)?,
            date_range: parse_date_range(raw.start_date.as_deref(), raw.end_date.as_deref())?,
            limit: self.limit(raw.limit, self.search_limit)?,
        })
    }

    pub fn list(&self, raw: &RawListParams) -> Result<ListQuery> {
        let filter = RecordFilter {
            privacy_level: parse_privacy(raw.privacy_level.as_deref())?,
            tags: normalize_tags(&raw.tags)?,
            keyword: non_empty(raw.keyword.as_deref()),
            date_range: parse_date_range(raw.start_date.as_deref(), raw.end_date.as_deref())?,
        };

        Ok(ListQuery {
            filter,
            limit: self.limit(raw.limit, self.list_limit)?,
            offset: raw.offset.unwrap_or(0),
        })
    }

    fn limit(&self, requested: Option<usize>, default: usize) -> Result<usize> {
        match requested {
            Some(0) => Err(RecallError::Validation(
                "limit must be greater than 0".to_string(),
            )),
            Some(n) => Ok(n.min(self.max_limit)),
            None => Ok(default.min(self.max_limit)),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_privacy(value: Option<&str>) -> Result<Option<PrivacyLevel>> {
    non_empty(value).map(|v| v.parse()).transpose()
}

/// Trim, lowercase, drop empties and deduplicate keeping first occurrence.
///
/// Tags may contain only alphanumerics, `-`, `.` and `:`.
pub fn normalize_tags(raw: &[String]) -> Result<Vec<String>> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() {
            continue;
        }
        if let Some(bad) = tag
            .chars()
            .find(|c| !(c.is_alphanumeric() || matches!(c, '-' | '.' | ':')))
        {
            return Err(RecallError::Validation(format!(
                "Invalid character {bad:?} in tag {tag:?}"
            )));
        }
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    Ok(tags)
}

fn parse_date_range(start: Option<&str>, end: Option<&str>) -> Result<Option<DateRange>> {
    let start = non_empty(start)
        .map(|s| parse_date(&s, Bound::Start))
        .transpose()?;
    let end = non_empty(end)
        .map(|s| parse_date(&s, Bound::End))
        .transpose()?;

    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            return Err(RecallError::Validation(format!(
                "Start date {} is after end date {}",
                s.to_rfc3339(),
                e.to_rfc3339()
            )));
        }
    }

    if start.is_none() && end.is_none() {
        Ok(None)
    } else {
        Ok(Some(DateRange::new(start, end)))
    }
}

/// Accepts RFC 3339, naive ISO date-times (taken as UTC) and bare dates.
fn parse_date(value: &str, bound: Bound) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let time = match bound {
            Bound::Start => NaiveTime::MIN,
            Bound::End => NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999)
                .unwrap_or(NaiveTime::MIN),
        };
        return Ok(date.and_time(time).and_utc());
    }

    Err(RecallError::Validation(format!(
        "Invalid date {value:?}: use YYYY-MM-DD or an ISO 8601 date-time"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn filter() -> RetrievalFilter {
        RetrievalFilter::default()
    }

    fn search(query: &str) -> RawSearchParams {
        RawSearchParams {
            query: Some(query.to_string()),
            ..RawSearchParams::default()
        }
    }

    #[test]
    fn test_defaults() {
        let q = filter().search(&search("hello")).unwrap();
        assert_eq!(q.text, "hello");
        assert_eq!(q.limit, 5);
        assert!(q.privacy_level.is_none());
        assert!(q.date_range.is_none());

        let l = filter().list(&RawListParams::default()).unwrap();
        assert_eq!(l.limit, 50);
        assert_eq!(l.offset, 0);
        assert!(l.filter.is_empty());
    }

    #[test]
    fn test_zero_limit_rejected() {
        let raw = RawListParams {
            limit: Some(0),
            ..RawListParams::default()
        };
        assert!(matches!(
            filter().list(&raw),
            Err(RecallError::Validation(_))
        ));
    }

    #[test]
    fn test_limit_clamped_to_max() {
        let raw = RawSearchParams {
            limit: Some(10_000),
            ..search("x")
        };
        assert_eq!(filter().search(&raw).unwrap().limit, 500);
    }

    #[test]
    fn test_empty_search_text_rejected() {
        assert!(filter().search(&search("   ")).is_err());
        assert!(filter().search(&RawSearchParams::default()).is_err());
    }

    #[test]
    fn test_privacy_case_insensitive_and_empty_is_absent() {
        let raw = RawListParams {
            privacy_level: Some("HiGh".to_string()),
            ..RawListParams::default()
        };
        assert_eq!(
            filter().list(&raw).unwrap().filter.privacy_level,
            Some(PrivacyLevel::High)
        );

        let raw = RawListParams {
            privacy_level: Some("  ".to_string()),
            ..RawListParams::default()
        };
        assert!(filter().list(&raw).unwrap().filter.privacy_level.is_none());

        let raw = RawListParams {
            privacy_level: Some("top-secret".to_string()),
            ..RawListParams::default()
        };
        assert!(filter().list(&raw).is_err());
    }

    #[test]
    fn test_keyword_trimmed() {
        let raw = RawListParams {
            keyword: Some("  Paris ".to_string()),
            ..RawListParams::default()
        };
        assert_eq!(
            filter().list(&raw).unwrap().filter.keyword.as_deref(),
            Some("Paris")
        );
    }

    #[test]
    fn test_normalize_tags() {
        let raw: Vec<String> = ["Work", " travel ", "", "work", "q3:2024", "v1.2-rc"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            normalize_tags(&raw).unwrap(),
            vec!["work", "travel", "q3:2024", "v1.2-rc"]
        );
    }

    #[test]
    fn test_normalize_tags_rejects_bad_chars() {
        for bad in ["o'brien", "a b", "50%", "snake_case", "a,b"] {
            assert!(
                normalize_tags(&[bad.to_string()]).is_err(),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_date_only_bounds_cover_whole_days() {
        let range = parse_date_range(Some("2024-03-01"), Some("2024-03-02"))
            .unwrap()
            .unwrap();
        assert_eq!(
            range.start,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
        );
        let end = range.end.unwrap();
        assert_eq!(end.date_naive(), NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        assert!(range.contains(Utc.with_ymd_and_hms(2024, 3, 2, 23, 59, 59).unwrap()));
    }

    #[test]
    fn test_same_day_range_is_valid() {
        let range = parse_date_range(Some("2024-03-01"), Some("2024-03-01"))
            .unwrap()
            .unwrap();
        assert!(range.contains(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()));
    }

    #[test]
    fn test_datetime_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
        for input in [
            "2024-03-01T08:30:00Z",
            "2024-03-01T10:30:00+02:00",
            "2024-03-01T08:30:00",
            "2024-03-01T08:30:00.000000",
            "2024-03-01 08:30:00",
        ] {
            assert_eq!(parse_date(input, Bound::Start).unwrap(), expected, "{input}");
        }
    }

    #[test]
    fn test_bad_dates_rejected() {
        assert!(parse_date_range(Some("yesterday"), None).is_err());
        assert!(parse_date_range(Some("2024-13-01"), None).is_err());
        assert!(matches!(
            parse_date_range(Some("2024-03-05"), Some("2024-03-01")),
            Err(RecallError::Validation(_))
        ));
    }

    #[test]
    fn test_empty_dates_are_absent() {
        assert!(parse_date_range(Some(" "), Some("")).unwrap().is_none());
        let range = parse_date_range(None, Some("2024-03-01")).unwrap().unwrap();
        assert!(range.start.is_none());
        assert!(range.end.is_some());
    }
}
