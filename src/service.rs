//! PostgREST-style client for the hosted events backend. No retries.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::config::AppConfig;
use crate::filter::{temporal, FilterCriteria, TimeWindow};
use crate::models::{Event, EventPage, Pagination, TaxonomyEntry, VibeOverride};

static CONTENT_RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(\d+)-(\d+)|\*)/(\d+|\*)$").expect("valid content-range regex")
});

const OVERRIDE_BATCH: usize = 100;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("events service not configured: {0}")]
    NotConfigured(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("parse error: {0}")]
    Parse(String),
}

/// Server-side prefilter. Only trims rows the client pipeline would drop anyway.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventQuery {
    pub category_id: Option<i64>,
    pub source: Option<String>,
    pub starts_from: Option<NaiveDate>,
}

impl EventQuery {
    pub fn for_criteria(criteria: &FilterCriteria) -> Self {
        Self::for_criteria_on(criteria, temporal::today_in(Utc::now()))
    }

    /// Override filters look across categories and dates, so they fetch unfiltered.
    pub fn for_criteria_on(criteria: &FilterCriteria, today: NaiveDate) -> Self {
        if criteria.override_filter.is_some() {
            return Self::default();
        }
        Self {
            category_id: criteria.category_id,
            source: criteria
                .source
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            starts_from: earliest_start(criteria, today),
        }
    }

    /// Whether rows loaded with `self` include every row `other` would load.
    pub fn covers(&self, other: &EventQuery) -> bool {
        let category = self.category_id.is_none() || self.category_id == other.category_id;
        let source = match (&self.source, &other.source) {
            (None, _) => true,
            (Some(mine), Some(theirs)) => mine.eq_ignore_ascii_case(theirs),
            (Some(_), None) => false,
        };
        let start = match (self.starts_from, other.starts_from) {
            (None, _) => true,
            (Some(mine), Some(theirs)) => mine <= theirs,
            (Some(_), None) => false,
        };
        category && source && start
    }
}

/// Zurich days begin before UTC midnight, so the bound steps back a day.
fn earliest_start(criteria: &FilterCriteria, today: NaiveDate) -> Option<NaiveDate> {
    let first_day = match (criteria.explicit_date, criteria.time_window) {
        (Some(date), _) => date,
        (None, Some(TimeWindow::ThisMonth)) => today.with_day(1)?,
        (None, Some(_)) => today,
        (None, None) => return None,
    };
    first_day.pred_opt()
}

#[async_trait]
pub trait DataService: Send + Sync {
    async fn list_events(
        &self,
        query: &EventQuery,
        offset: usize,
        limit: usize,
    ) -> Result<EventPage, ServiceError>;

    async fn list_overrides(&self, external_ids: &[String]) -> Result<Vec<VibeOverride>, ServiceError>;

    async fn list_taxonomy(&self) -> Result<Vec<TaxonomyEntry>, ServiceError>;
}

pub struct RestDataService {
    base_url: Url,
    api_key: String,
    client: Client,
}

impl RestDataService {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, ServiceError> {
        let api_key = api_key.trim().to_string();
        if api_key.is_empty() {
            return Err(ServiceError::NotConfigured("api key is empty".into()));
        }
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|err| ServiceError::NotConfigured(format!("bad api url {base}: {err}")))?;
        let client = Client::builder()
            .user_agent(concat!("swiss-events/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(20))
            .build()
            .map_err(|err| ServiceError::Http(err.to_string()))?;
        Ok(Self {
            base_url,
            api_key,
            client,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        let url = config
            .api_url
            .as_deref()
            .ok_or_else(|| ServiceError::NotConfigured("api_url missing".into()))?;
        let key = config
            .api_key
            .as_deref()
            .ok_or_else(|| ServiceError::NotConfigured("api_key missing".into()))?;
        Self::new(url, key)
    }

    fn table_url(&self, table: &str) -> Result<Url, ServiceError> {
        self.base_url
            .join(&format!("rest/v1/{table}"))
            .map_err(|err| ServiceError::NotConfigured(err.to_string()))
    }

    pub fn events_url(&self, query: &EventQuery, offset: usize, limit: usize) -> Result<Url, ServiceError> {
        let mut url = self.table_url("events")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("select", "*")
                .append_pair("order", "start_date.asc.nullslast,id.asc")
                .append_pair("offset", &offset.to_string())
                .append_pair("limit", &limit.to_string());
            if let Some(id) = query.category_id {
                pairs.append_pair("category_main_id", &format!("eq.{id}"));
            }
            if let Some(source) = &query.source {
                pairs.append_pair("source", &format!("ilike.{source}"));
            }
            if let Some(from) = query.starts_from {
                pairs.append_pair("start_date", &format!("gte.{}", from.format("%Y-%m-%d")));
            }
        }
        Ok(url)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        url: Url,
        count: bool,
    ) -> Result<(T, Option<String>), ServiceError> {
        debug!(%url, "events service request");
        let mut request = self
            .client
            .get(url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key);
        if count {
            request = request.header("Prefer", "count=exact");
        }
        let response = request
            .send()
            .await
            .map_err(|err| ServiceError::Http(err.to_string()))?;
        let status = response.status();
        let content_range = response
            .headers()
            .get("content-range")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|err| ServiceError::Http(err.to_string()))?;
        if !status.is_success() {
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let parsed = serde_json::from_str(&body).map_err(|err| ServiceError::Parse(err.to_string()))?;
        Ok((parsed, content_range))
    }
}

#[async_trait]
impl DataService for RestDataService {
    async fn list_events(
        &self,
        query: &EventQuery,
        offset: usize,
        limit: usize,
    ) -> Result<EventPage, ServiceError> {
        let url = self.events_url(query, offset, limit)?;
        let (events, content_range): (Vec<Event>, _) = self.fetch(url, true).await?;
        let total = content_range.as_deref().and_then(parse_total);
        let pagination = paginate(offset, limit, events.len(), total);
        Ok(EventPage { events, pagination })
    }

    async fn list_overrides(&self, external_ids: &[String]) -> Result<Vec<VibeOverride>, ServiceError> {
        let mut out = Vec::new();
        for batch in external_ids.chunks(OVERRIDE_BATCH) {
            let mut url = self.table_url("vibe_overrides")?;
            url.query_pairs_mut()
                .append_pair("select", "external_id,buzz_boost")
                .append_pair("external_id", &in_list(batch));
            let (rows, _): (Vec<VibeOverride>, _) = self.fetch(url, false).await?;
            out.extend(rows);
        }
        Ok(out)
    }

    async fn list_taxonomy(&self) -> Result<Vec<TaxonomyEntry>, ServiceError> {
        let mut url = self.table_url("taxonomy")?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("order", "display_order.asc");
        let (rows, _) = self.fetch(url, false).await?;
        Ok(rows)
    }
}

/// Total row count from a `Content-Range` value like `0-49/1234` or `*/0`.
pub fn parse_total(content_range: &str) -> Option<usize> {
    let caps = CONTENT_RANGE_RE.captures(content_range.trim())?;
    caps.get(3)?.as_str().parse().ok()
}

pub fn paginate(offset: usize, limit: usize, returned: usize, total: Option<usize>) -> Pagination {
    let next_offset = offset + returned;
    let has_more = match total {
        Some(total) => next_offset < total,
        None => returned > 0 && returned >= limit,
    };
    Pagination {
        has_more,
        next_offset,
        total,
    }
}

/// PostgREST `in.(...)` operand with every value double-quoted.
fn in_list(values: &[String]) -> String {
    let quoted: Vec<String> = values
        .iter()
        .map(|value| format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("in.({})", quoted.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::OverrideFilter;

    #[test]
    fn parses_content_range_totals() {
        assert_eq!(parse_total("0-49/1234"), Some(1234));
        assert_eq!(parse_total("*/0"), Some(0));
        assert_eq!(parse_total("0-49/*"), None);
        assert_eq!(parse_total("bytes 0-1/2"), None);
    }

    #[test]
    fn pagination_uses_total_when_known() {
        assert_eq!(
            paginate(0, 50, 50, Some(120)),
            Pagination {
                has_more: true,
                next_offset: 50,
                total: Some(120)
            }
        );
        assert!(!paginate(100, 50, 20, Some(120)).has_more);
        assert!(paginate(0, 50, 50, None).has_more);
        assert!(!paginate(0, 50, 0, None).has_more);
    }

    #[test]
    fn builds_filtered_events_url() {
        let service = RestDataService::new("https://abc.example.co", "anon").expect("service");
        let query = EventQuery {
            category_id: Some(3),
            source: Some("ticketcorner".into()),
            starts_from: NaiveDate::from_ymd_opt(2026, 10, 21),
        };
        let url = service.events_url(&query, 100, 50).expect("url");
        assert_eq!(url.path(), "/rest/v1/events");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("category_main_id".into(), "eq.3".into())));
        assert!(pairs.contains(&("source".into(), "ilike.ticketcorner".into())));
        assert!(pairs.contains(&("start_date".into(), "gte.2026-10-21".into())));
        assert!(pairs.contains(&("offset".into(), "100".into())));
        assert!(pairs.contains(&("limit".into(), "50".into())));
    }

    #[test]
    fn in_list_quotes_values() {
        let ids = vec!["a1".to_string(), "odd,\"id".to_string()];
        assert_eq!(in_list(&ids), r#"in.("a1","odd,\"id")"#);
    }

    #[test]
    fn missing_settings_are_reported() {
        let config = AppConfig::default();
        assert!(matches!(
            RestDataService::from_config(&config),
            Err(ServiceError::NotConfigured(_))
        ));
        assert!(RestDataService::new("https://abc.example.co", "  ").is_err());
    }

    #[test]
    fn override_criteria_fetch_everything() {
        let criteria = FilterCriteria {
            category_id: Some(2),
            override_filter: Some(OverrideFilter::Similar("e1".into())),
            ..FilterCriteria::default()
        };
        assert_eq!(EventQuery::for_criteria(&criteria), EventQuery::default());

        let plain = FilterCriteria {
            category_id: Some(2),
            source: Some("  ".into()),
            ..FilterCriteria::default()
        };
        assert_eq!(
            EventQuery::for_criteria(&plain),
            EventQuery {
                category_id: Some(2),
                ..EventQuery::default()
            }
        );
    }

    #[test]
    fn date_criteria_bound_the_fetch_a_day_early() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 21).expect("date");
        let window = FilterCriteria {
            time_window: Some(TimeWindow::ThisWeekend),
            ..FilterCriteria::default()
        };
        assert_eq!(
            EventQuery::for_criteria_on(&window, today).starts_from,
            NaiveDate::from_ymd_opt(2026, 10, 20)
        );

        let month = FilterCriteria {
            time_window: Some(TimeWindow::ThisMonth),
            ..FilterCriteria::default()
        };
        assert_eq!(
            EventQuery::for_criteria_on(&month, today).starts_from,
            NaiveDate::from_ymd_opt(2026, 9, 30)
        );

        let explicit = FilterCriteria {
            time_window: Some(TimeWindow::Today),
            explicit_date: NaiveDate::from_ymd_opt(2026, 12, 24),
            ..FilterCriteria::default()
        };
        assert_eq!(
            EventQuery::for_criteria_on(&explicit, today).starts_from,
            NaiveDate::from_ymd_opt(2026, 12, 23)
        );
        assert_eq!(
            EventQuery::for_criteria_on(&FilterCriteria::default(), today).starts_from,
            None
        );
    }

    #[test]
    fn covers_only_narrower_queries() {
        let everything = EventQuery::default();
        let music = EventQuery {
            category_id: Some(1),
            ..EventQuery::default()
        };
        let markets = EventQuery {
            category_id: Some(2),
            ..EventQuery::default()
        };
        assert!(everything.covers(&music));
        assert!(music.covers(&music));
        assert!(!music.covers(&markets));
        assert!(!music.covers(&everything));

        let from_monday = EventQuery {
            starts_from: NaiveDate::from_ymd_opt(2026, 10, 19),
            ..EventQuery::default()
        };
        let from_friday = EventQuery {
            starts_from: NaiveDate::from_ymd_opt(2026, 10, 23),
            ..EventQuery::default()
        };
        assert!(from_monday.covers(&from_friday));
        assert!(!from_friday.covers(&from_monday));
        assert!(!from_friday.covers(&everything));

        let lower = EventQuery {
            source: Some("ticketcorner".into()),
            ..EventQuery::default()
        };
        let upper = EventQuery {
            source: Some("Ticketcorner".into()),
            ..EventQuery::default()
        };
        assert!(lower.covers(&upper));
        assert!(!lower.covers(&everything));
    }
}
