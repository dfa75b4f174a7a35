//! Reshapes upstream payloads into the gateway's response types.
//!
//! The envelope is strict: a payload that is not an object, or whose record
//! collection is not a list, fails the whole request. Records are lenient:
//! each one is read on its own and a bad record becomes a placeholder, so the
//! output always has one entry per upstream record.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::errors::GatewayError;
use crate::models::{KeywordIdea, SearchResult};

/// Why a single record was replaced. Never leaves this module.
#[derive(Debug, Error)]
enum RecordError {
    #[error("record is not an object")]
    NotAnObject,
    #[error("missing field `{0}`")]
    Missing(&'static str),
    #[error("field `{0}` is not a non-negative integer")]
    BadNumber(&'static str),
}

#[derive(Debug, PartialEq, Eq)]
pub struct KeywordIdeasPage {
    pub ideas: Vec<KeywordIdea>,
    pub next_page_token: Option<String>,
}

pub fn normalize_keyword_ideas(raw: &Value) -> Result<KeywordIdeasPage, GatewayError> {
    let envelope = envelope(raw)?;
    let records = records(envelope, "results")?;

    let mut ideas: Vec<KeywordIdea> = records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            keyword_idea(record).unwrap_or_else(|e| {
                debug!(index, error = %e, "substituting placeholder keyword idea");
                KeywordIdea::unknown()
            })
        })
        .collect();
    // sort_by is stable: equal volumes keep upstream order.
    ideas.sort_by(|a, b| b.avg_monthly_searches.cmp(&a.avg_monthly_searches));

    let next_page_token = envelope
        .get("nextPageToken")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    Ok(KeywordIdeasPage {
        ideas,
        next_page_token,
    })
}

pub fn normalize_search_results(raw: &Value) -> Result<Vec<SearchResult>, GatewayError> {
    let envelope = envelope(raw)?;
    let records = records(envelope, "items")?;

    Ok(records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            search_result(record).unwrap_or_else(|e| {
                debug!(index, error = %e, "substituting placeholder search result");
                SearchResult::unknown()
            })
        })
        .collect())
}

fn envelope(raw: &Value) -> Result<&Map<String, Value>, GatewayError> {
    raw.as_object()
        .ok_or_else(|| GatewayError::Shape("payload is not a JSON object".to_string()))
}

/// An absent or null collection means the upstream had nothing to return.
fn records<'a>(envelope: &'a Map<String, Value>, field: &str) -> Result<&'a [Value], GatewayError> {
    match envelope.get(field) {
        None | Some(Value::Null) => Ok(&[][..]),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(_) => Err(GatewayError::Shape(format!("`{field}` is not a list"))),
    }
}

fn keyword_idea(record: &Value) -> Result<KeywordIdea, RecordError> {
    let record = record.as_object().ok_or(RecordError::NotAnObject)?;
    let keyword = record
        .get("text")
        .and_then(Value::as_str)
        .ok_or(RecordError::Missing("text"))?;
    let metrics = record
        .get("keywordIdeaMetrics")
        .and_then(Value::as_object)
        .ok_or(RecordError::Missing("keywordIdeaMetrics"))?;

    Ok(KeywordIdea {
        keyword: keyword.to_string(),
        avg_monthly_searches: metric(metrics, "avgMonthlySearches")?,
        competition_index: metric(metrics, "competitionIndex")?,
    })
}

/// Integer metrics arrive as numbers or as decimal strings (int64 in JSON).
/// Zero-valued metrics may be omitted entirely. `12.0` and `"12.0"` read as
/// 12; fractional or negative values in either form are rejected.
fn metric(metrics: &Map<String, Value>, field: &'static str) -> Result<u64, RecordError> {
    let value = match metrics.get(field) {
        None | Some(Value::Null) => return Ok(0),
        Some(Value::Number(n)) => n.as_u64().or_else(|| n.as_f64().and_then(whole)),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(whole))
        }
        Some(_) => None,
    };
    value.ok_or(RecordError::BadNumber(field))
}

fn whole(f: f64) -> Option<u64> {
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f < u64::MAX as f64).then_some(f as u64)
}

fn search_result(record: &Value) -> Result<SearchResult, RecordError> {
    let record = record.as_object().ok_or(RecordError::NotAnObject)?;
    let text = |field: &'static str| {
        record
            .get(field)
            .and_then(Value::as_str)
            .ok_or(RecordError::Missing(field))
    };

    Ok(SearchResult {
        title: text("title")?.to_string(),
        link: text("link")?.to_string(),
        display_link: text("displayLink").unwrap_or_default().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_metrics_becomes_placeholder() {
        let raw = json!({
            "results": [
                { "text": "seo tools", "keywordIdeaMetrics": { "avgMonthlySearches": "880", "competitionIndex": "42" } },
                { "text": "seo audit" }
            ]
        });

        let page = normalize_keyword_ideas(&raw).unwrap();
        assert_eq!(page.ideas.len(), 2);
        assert_eq!(
            page.ideas[0],
            KeywordIdea {
                keyword: "seo tools".to_string(),
                avg_monthly_searches: 880,
                competition_index: 42,
            }
        );
        assert_eq!(page.ideas[1], KeywordIdea::unknown());
    }

    #[test]
    fn test_non_object_and_unparsable_records() {
        let raw = json!({
            "results": [
                "not a record",
                null,
                { "text": "x", "keywordIdeaMetrics": { "avgMonthlySearches": "lots" } },
                { "text": "y", "keywordIdeaMetrics": { "competitionIndex": -3 } },
                { "text": "z", "keywordIdeaMetrics": {} }
            ]
        });

        let page = normalize_keyword_ideas(&raw).unwrap();
        assert_eq!(page.ideas.len(), 5);
        // All volumes are zero, so upstream order is kept.
        assert!(page.ideas[..4].iter().all(|i| *i == KeywordIdea::unknown()));
        assert_eq!(page.ideas[4].keyword, "z");
    }

    #[test]
    fn test_fractional_metrics_rejected_in_both_forms() {
        let raw = json!({
            "results": [
                { "text": "num", "keywordIdeaMetrics": { "avgMonthlySearches": 12.5 } },
                { "text": "str", "keywordIdeaMetrics": { "avgMonthlySearches": "12.5" } },
                { "text": "whole-num", "keywordIdeaMetrics": { "avgMonthlySearches": 12.0 } },
                { "text": "whole-str", "keywordIdeaMetrics": { "avgMonthlySearches": " 12.0 " } }
            ]
        });

        let page = normalize_keyword_ideas(&raw).unwrap();
        let names: Vec<&str> = page.ideas.iter().map(|i| i.keyword.as_str()).collect();
        assert_eq!(names, vec!["whole-num", "whole-str", "Unknown", "Unknown"]);
        assert_eq!(page.ideas[0].avg_monthly_searches, 12);
        assert_eq!(page.ideas[1].avg_monthly_searches, 12);
    }

    #[test]
    fn test_sorted_by_volume_descending() {
        let raw = json!({
            "results": [
                { "text": "a", "keywordIdeaMetrics": { "avgMonthlySearches": 10 } },
                { "text": "b", "keywordIdeaMetrics": { "avgMonthlySearches": "1000" } },
                { "text": "c", "keywordIdeaMetrics": { "avgMonthlySearches": 500 } }
            ],
            "nextPageToken": "abc"
        });

        let page = normalize_keyword_ideas(&raw).unwrap();
        let volumes: Vec<u64> = page.ideas.iter().map(|i| i.avg_monthly_searches).collect();
        assert_eq!(volumes, vec![1000, 500, 10]);
        assert_eq!(page.next_page_token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_ties_keep_upstream_order() {
        let raw = json!({
            "results": [
                { "text": "first", "keywordIdeaMetrics": { "avgMonthlySearches": 5 } },
                { "text": "second", "keywordIdeaMetrics": { "avgMonthlySearches": 5 } },
                { "text": "third", "keywordIdeaMetrics": { "avgMonthlySearches": 5 } }
            ]
        });

        let page = normalize_keyword_ideas(&raw).unwrap();
        let names: Vec<&str> = page.ideas.iter().map(|i| i.keyword.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_bad_envelope_is_shape_error() {
        assert!(matches!(
            normalize_keyword_ideas(&json!([1, 2])),
            Err(GatewayError::Shape(_))
        ));
        assert!(matches!(
            normalize_keyword_ideas(&json!({ "results": { "text": "x" } })),
            Err(GatewayError::Shape(_))
        ));
        assert!(matches!(
            normalize_search_results(&json!("nope")),
            Err(GatewayError::Shape(_))
        ));
        assert!(matches!(
            normalize_search_results(&json!({ "items": 3 })),
            Err(GatewayError::Shape(_))
        ));
    }

    #[test]
    fn test_absent_collection_is_empty() {
        let page = normalize_keyword_ideas(&json!({})).unwrap();
        assert!(page.ideas.is_empty());
        assert!(page.next_page_token.is_none());
        assert!(normalize_search_results(&json!({ "kind": "customsearch#search" }))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_search_results() {
        let raw = json!({
            "items": [
                { "title": "Rust", "link": "https://www.rust-lang.org/", "displayLink": "www.rust-lang.org" },
                { "title": "No link" },
                { "title": "Docs", "link": "https://doc.rust-lang.org/" }
            ]
        });

        let results = normalize_search_results(&raw).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].display_link, "www.rust-lang.org");
        assert_eq!(results[1], SearchResult::unknown());
        assert_eq!(results[2].display_link, "");
    }
}
