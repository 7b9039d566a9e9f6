//! Signal sweep: fan a brief out to every source, then dedupe, rank and bound
//! the combined list.
//!
//! Sources are allowed to fail. A failing or slow source only shrinks the list
//! handed to composition, it never fails the run.

pub mod hacker_news;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::cadence;
use crate::error::SourceError;
use crate::models::{Brief, SignalItem};

pub use hacker_news::HackerNewsSource;

/// One search issued against a source
#[derive(Debug, Clone, PartialEq)]
pub struct SignalQuery {
    pub terms: String,
    pub since: DateTime<Utc>,
    pub limit: usize,
}

/// An external discussion or news feed that can be searched by topic
#[async_trait]
pub trait SignalSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, query: &SignalQuery) -> Result<Vec<SignalItem>, SourceError>;
}

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub max_signals: usize,
    pub timeout: Duration,
    pub per_query_limit: usize,
    pub recency_half_life_hours: f64,
    pub concurrency: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_signals: 10,
            timeout: Duration::from_secs(12),
            per_query_limit: 20,
            recency_half_life_hours: 24.0,
            concurrency: 4,
        }
    }
}

pub struct SignalCollector {
    sources: Vec<Arc<dyn SignalSource>>,
    config: CollectorConfig,
}

impl SignalCollector {
    pub fn new(config: CollectorConfig) -> Self {
        Self {
            sources: Vec::new(),
            config,
        }
    }

    pub fn with_source(mut self, source: impl SignalSource + 'static) -> Self {
        self.add_source(Arc::new(source));
        self
    }

    pub fn add_source(&mut self, source: Arc<dyn SignalSource>) {
        info!("Adding signal source: {}", source.name());
        self.sources.push(source);
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// The topic query, plus a region-qualified one unless the region is global
    pub fn queries(&self, brief: &Brief, now: DateTime<Utc>) -> Vec<SignalQuery> {
        let since = now - cadence::recency_window(&brief.cadence);
        let mut terms = vec![brief.topic.clone()];

        let region = brief.focus_region.trim();
        if !region.is_empty() && !region.eq_ignore_ascii_case("global") {
            terms.push(format!("{} {}", brief.topic, region));
        }

        terms
            .into_iter()
            .map(|terms| SignalQuery {
                terms,
                since,
                limit: self.config.per_query_limit,
            })
            .collect()
    }

    /// Collect, dedupe, rank and truncate. Degrades to a partial or empty list.
    pub async fn collect(&self, brief: &Brief) -> Vec<SignalItem> {
        let now = Utc::now();
        let queries = self.queries(brief, now);

        let tasks: Vec<(Arc<dyn SignalSource>, SignalQuery)> = self
            .sources
            .iter()
            .flat_map(|source| {
                queries
                    .iter()
                    .map(move |query| (Arc::clone(source), query.clone()))
            })
            .collect();

        if tasks.is_empty() {
            warn!("No signal sources configured; composing without signals");
            return Vec::new();
        }

        debug!(
            "Sweeping {} sources with {} queries for topic {:?}",
            self.sources.len(),
            queries.len(),
            brief.topic
        );

        let batches = self.sweep(tasks).await;
        let fetched: usize = batches.iter().map(Vec::len).sum();

        let unique = dedupe(batches.into_iter().flatten());
        let mut ranked = rank(unique, now, self.config.recency_half_life_hours);
        ranked.truncate(self.config.max_signals);

        info!(
            "Signal sweep kept {} of {} fetched items",
            ranked.len(),
            fetched
        );
        ranked
    }

    /// Runs every (source, query) pair and returns the successful batches in
    /// declaration order, whatever order they finished in.
    async fn sweep(
        &self,
        tasks: Vec<(Arc<dyn SignalSource>, SignalQuery)>,
    ) -> Vec<Vec<SignalItem>> {
        let deadline = Instant::now() + self.config.timeout;
        let total = tasks.len();

        let mut pending = pin!(stream::iter(tasks.into_iter().enumerate())
            .map(|(order, (source, query))| async move {
                let result = source.fetch(&query).await;
                (order, source, result)
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .boxed());

        let mut batches: Vec<(usize, Vec<SignalItem>)> = Vec::new();
        loop {
            match tokio::time::timeout_at(deadline, pending.next()).await {
                Ok(Some((order, source, Ok(items)))) => {
                    debug!("{} returned {} items", source.name(), items.len());
                    batches.push((order, items));
                }
                Ok(Some((_, source, Err(e)))) => {
                    warn!("Signal source {} degraded, continuing without it: {}", source.name(), e);
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        "Signal sweep timed out after {:?}; keeping {}/{} batches",
                        self.config.timeout,
                        batches.len(),
                        total
                    );
                    break;
                }
            }
        }

        batches.sort_by_key(|(order, _)| *order);
        batches.into_iter().map(|(_, items)| items).collect()
    }
}

/// Canonical form of a URL for duplicate detection
pub fn normalize_url(raw: &str) -> String {
    let raw = raw.trim();
    let mut normalized = match Url::parse(raw) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => raw.to_lowercase(),
    };
    while normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn dedupe_key(item: &SignalItem) -> String {
    match item.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        Some(url) => format!("url:{}", normalize_url(url)),
        None => format!("title:{}", normalize_title(&item.title)),
    }
}

/// Keeps the first occurrence of each URL, or of each title when there is no URL
pub fn dedupe(items: impl IntoIterator<Item = SignalItem>) -> Vec<SignalItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(dedupe_key(item)))
        .collect()
}

/// Engagement damped by age: `(1 + ln(1 + points)) * 0.5^(age / half_life)`
pub fn signal_score(item: &SignalItem, now: DateTime<Utc>, half_life_hours: f64) -> f64 {
    let points = item.points.unwrap_or(0).max(0) as f64;
    let age_hours = (now - item.created_at).num_seconds().max(0) as f64 / 3600.0;
    let decay = 0.5_f64.powf(age_hours / half_life_hours.max(f64::EPSILON));
    (1.0 + points.ln_1p()) * decay
}

/// Descending by score; equal scores keep their incoming order
pub fn rank(items: Vec<SignalItem>, now: DateTime<Utc>, half_life_hours: f64) -> Vec<SignalItem> {
    let mut scored: Vec<(f64, SignalItem)> = items
        .into_iter()
        .map(|item| (signal_score(&item, now, half_life_hours), item))
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    scored.into_iter().map(|(_, item)| item).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brief::{normalize, BriefDefaults, PartialBrief};
    use chrono::{Duration as ChronoDuration, TimeZone};
    use std::sync::Mutex;

    fn item(title: &str, url: Option<&str>, hours_ago: i64, points: Option<i64>) -> SignalItem {
        SignalItem {
            title: title.to_string(),
            url: url.map(str::to_string),
            author: Some("pg".to_string()),
            created_at: Utc::now() - ChronoDuration::hours(hours_ago),
            points,
        }
    }

    fn brief(topic: &str, region: Option<&str>) -> Brief {
        normalize(
            PartialBrief {
                topic: Some(topic.to_string()),
                focus_region: region.map(str::to_string),
                ..PartialBrief::default()
            },
            &BriefDefaults::default(),
        )
    }

    struct StaticSource {
        name: String,
        items: Vec<SignalItem>,
        queries: Mutex<Vec<SignalQuery>>,
    }

    impl StaticSource {
        fn new(name: &str, items: Vec<SignalItem>) -> Self {
            Self {
                name: name.to_string(),
                items,
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SignalSource for StaticSource {
        fn name(&self) -> &str {
            &self.name
        }

        async fn fetch(&self, query: &SignalQuery) -> Result<Vec<SignalItem>, SourceError> {
            self.queries.lock().unwrap().push(query.clone());
            Ok(self.items.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl SignalSource for FailingSource {
        fn name(&self) -> &str {
            "failing"
        }

        async fn fetch(&self, _query: &SignalQuery) -> Result<Vec<SignalItem>, SourceError> {
            Err(SourceError::Status {
                source_name: "failing".to_string(),
                status: 503,
            })
        }
    }

    struct SlowSource;

    #[async_trait]
    impl SignalSource for SlowSource {
        fn name(&self) -> &str {
            "slow"
        }

        async fn fetch(&self, _query: &SignalQuery) -> Result<Vec<SignalItem>, SourceError> {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            Ok(vec![item("Too late", Some("https://late.example"), 0, Some(999))])
        }
    }

    // ==================== Query Tests ====================

    #[test]
    fn test_global_region_issues_single_query() {
        let collector = SignalCollector::new(CollectorConfig::default());
        let now = Utc.with_ymd_and_hms(2026, 2, 8, 12, 0, 0).unwrap();
        let queries = collector.queries(&brief("AI safety", None), now);

        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].terms, "AI safety");
        assert_eq!(queries[0].since, now - ChronoDuration::days(7));
        assert_eq!(queries[0].limit, 20);
    }

    #[test]
    fn test_regional_brief_adds_region_query() {
        let collector = SignalCollector::new(CollectorConfig::default());
        let queries = collector.queries(&brief("fintech", Some("Europe")), Utc::now());

        let terms: Vec<&str> = queries.iter().map(|q| q.terms.as_str()).collect();
        assert_eq!(terms, vec!["fintech", "fintech Europe"]);
    }

    // ==================== Dedup Tests ====================

    #[test]
    fn test_dedupe_by_url_keeps_first() {
        let items = vec![
            item("First", Some("https://example.com/a"), 1, Some(10)),
            item("Second", Some("https://EXAMPLE.com/a/"), 2, Some(50)),
            item("Third", Some("https://example.com/a#comments"), 3, None),
            item("Other", Some("https://example.com/b"), 1, None),
        ];
        let unique = dedupe(items);

        let titles: Vec<&str> = unique.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Other"]);
    }

    #[test]
    fn test_dedupe_by_title_when_url_missing() {
        let items = vec![
            item("Ask HN: Who is hiring?", None, 1, None),
            item("ask hn:  who is HIRING?", None, 2, None),
            item("Ask HN: Who is hiring?", Some("https://example.com/jobs"), 1, None),
        ];
        let unique = dedupe(items);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].url, None);
        assert!(unique[1].url.is_some());
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("https://Example.com/post/"), "https://example.com/post");
        assert_eq!(normalize_url("https://example.com/#top"), "https://example.com");
        assert_eq!(normalize_url("not a url/"), "not a url");
    }

    // ==================== Ranking Tests ====================

    #[test]
    fn test_rank_orders_out_of_order_fixture() {
        let now = Utc.with_ymd_and_hms(2026, 2, 8, 12, 0, 0).unwrap();
        let at = |hours: i64| now - ChronoDuration::hours(hours);
        let fixture = vec![
            SignalItem {
                title: "Old and popular".to_string(),
                url: Some("https://a.example".to_string()),
                author: None,
                created_at: at(96),
                points: Some(900),
            },
            SignalItem {
                title: "Fresh and popular".to_string(),
                url: Some("https://b.example".to_string()),
                author: None,
                created_at: at(2),
                points: Some(300),
            },
            SignalItem {
                title: "Fresh, no points".to_string(),
                url: Some("https://c.example".to_string()),
                author: None,
                created_at: at(1),
                points: None,
            },
            SignalItem {
                title: "Day old, some points".to_string(),
                url: Some("https://d.example".to_string()),
                author: None,
                created_at: at(24),
                points: Some(40),
            },
        ];

        let ranked = rank(fixture, now, 24.0);
        let titles: Vec<&str> = ranked.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Fresh and popular",
                "Day old, some points",
                "Fresh, no points",
                "Old and popular",
            ]
        );

        let scores: Vec<f64> = ranked.iter().map(|i| signal_score(i, now, 24.0)).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_rank_is_stable_for_ties() {
        let now = Utc.with_ymd_and_hms(2026, 2, 8, 12, 0, 0).unwrap();
        let tie = |title: &str| SignalItem {
            title: title.to_string(),
            url: None,
            author: None,
            created_at: now,
            points: Some(5),
        };
        let ranked = rank(vec![tie("a"), tie("b"), tie("c")], now, 24.0);
        let titles: Vec<&str> = ranked.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_future_timestamps_are_not_boosted() {
        let now = Utc.with_ymd_and_hms(2026, 2, 8, 12, 0, 0).unwrap();
        let future = SignalItem {
            title: "clock skew".to_string(),
            url: None,
            author: None,
            created_at: now + ChronoDuration::hours(5),
            points: Some(10),
        };
        let score = signal_score(&future, now, 24.0);
        assert!((score - (1.0 + 10f64.ln_1p())).abs() < 1e-9);
    }

    // ==================== Collector Tests ====================

    #[tokio::test]
    async fn test_collect_merges_dedupes_and_bounds() {
        let a = StaticSource::new(
            "a",
            vec![
                item("Shared story", Some("https://shared.example/x"), 1, Some(100)),
                item("Only in a", Some("https://a.example"), 3, Some(20)),
            ],
        );
        let b = StaticSource::new(
            "b",
            vec![
                item("Shared story (dup)", Some("https://shared.example/x/"), 1, Some(100)),
                item("Only in b", Some("https://b.example"), 5, Some(5)),
                item("Another in b", Some("https://b2.example"), 6, Some(1)),
            ],
        );
        let config = CollectorConfig {
            max_signals: 3,
            ..CollectorConfig::default()
        };
        let collector = SignalCollector::new(config).with_source(a).with_source(b);

        let signals = collector.collect(&brief("rust", None)).await;

        assert_eq!(signals.len(), 3);
        assert_eq!(signals[0].title, "Shared story");
        let urls: Vec<String> = signals.iter().filter_map(|s| s.url.clone()).collect();
        let unique: HashSet<&String> = urls.iter().collect();
        assert_eq!(urls.len(), unique.len());
    }

    #[tokio::test]
    async fn test_collect_sends_region_query_to_every_source() {
        let source = Arc::new(StaticSource::new("recording", Vec::new()));
        let mut collector = SignalCollector::new(CollectorConfig::default());
        collector.add_source(source.clone());

        collector.collect(&brief("batteries", Some("Latin America"))).await;

        let mut terms: Vec<String> = source
            .queries
            .lock()
            .unwrap()
            .iter()
            .map(|q| q.terms.clone())
            .collect();
        terms.sort();
        assert_eq!(terms, vec!["batteries", "batteries Latin America"]);
    }

    #[tokio::test]
    async fn test_failing_source_degrades_to_partial_list() {
        let good = StaticSource::new(
            "good",
            vec![item("Survivor", Some("https://ok.example"), 1, Some(3))],
        );
        let collector = SignalCollector::new(CollectorConfig::default())
            .with_source(FailingSource)
            .with_source(good);

        let signals = collector.collect(&brief("rust", None)).await;
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].title, "Survivor");
    }

    #[tokio::test]
    async fn test_all_sources_failing_yields_empty_list() {
        let collector = SignalCollector::new(CollectorConfig::default()).with_source(FailingSource);
        assert!(collector.collect(&brief("rust", None)).await.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_keeps_batches_that_arrived() {
        let config = CollectorConfig {
            timeout: std::time::Duration::from_millis(100),
            ..CollectorConfig::default()
        };
        let fast = StaticSource::new(
            "fast",
            vec![item("On time", Some("https://fast.example"), 1, Some(1))],
        );
        let collector = SignalCollector::new(config)
            .with_source(SlowSource)
            .with_source(fast);

        let started = std::time::Instant::now();
        let signals = collector.collect(&brief("rust", None)).await;

        assert!(started.elapsed() < std::time::Duration::from_secs(5));
        let titles: Vec<&str> = signals.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["On time"]);
    }

    #[tokio::test]
    async fn test_no_sources_yields_empty_list() {
        let collector = SignalCollector::new(CollectorConfig::default());
        assert!(collector.collect(&brief("rust", None)).await.is_empty());
    }
}
