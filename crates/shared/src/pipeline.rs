use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};

use crate::brief::{normalize, BriefDefaults, PartialBrief};
use crate::composer::ArtifactComposer;
use crate::config::Config;
use crate::error::{PipelineError, PipelineFailure};
use crate::generator::ClaudeGenerator;
use crate::models::PipelineOutput;
use crate::progress::{NoopObserver, ProgressObserver, ProgressTracker, StepId};
use crate::signals::{HackerNewsSource, SignalCollector};

/// Brief in, artifacts out. Holds only shared, read-only state so one
/// pipeline can serve many concurrent runs.
pub struct ContentPipeline {
    defaults: BriefDefaults,
    collector: SignalCollector,
    composer: ArtifactComposer,
}

impl ContentPipeline {
    pub fn new(
        defaults: BriefDefaults,
        collector: SignalCollector,
        composer: ArtifactComposer,
    ) -> Self {
        Self {
            defaults,
            collector,
            composer,
        }
    }

    /// Hacker News signals and Claude generation, wired from `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let source = HackerNewsSource::new(config.signal_endpoint.as_str())?;
        let collector = SignalCollector::new(config.collector_config()).with_source(source);

        let generator = ClaudeGenerator::new(config.anthropic_api_key.clone())?
            .with_model(config.model.as_str())
            .with_endpoint(config.anthropic_url.as_str())
            .with_max_concurrency(config.generation_concurrency);
        let composer = ArtifactComposer::new(Arc::new(generator), config.composer_config());

        Ok(Self::new(BriefDefaults::from_env(), collector, composer))
    }

    pub fn defaults(&self) -> &BriefDefaults {
        &self.defaults
    }

    pub async fn generate(&self, partial: PartialBrief) -> Result<PipelineOutput, PipelineFailure> {
        self.generate_with_observer(partial, &NoopObserver).await
    }

    /// Runs brief -> intel -> compose, reporting each transition to `observer`.
    ///
    /// Dropping the returned future abandons the run along with any request
    /// still in flight.
    pub async fn generate_with_observer(
        &self,
        partial: PartialBrief,
        observer: &dyn ProgressObserver,
    ) -> Result<PipelineOutput, PipelineFailure> {
        let mut tracker = ProgressTracker::new(observer);

        match self.run(partial, &mut tracker).await {
            Ok(output) => Ok(output),
            Err(e) => {
                error!("Content run failed: {}", e);
                Err(PipelineFailure {
                    error: e,
                    steps: tracker.snapshot(),
                })
            }
        }
    }

    async fn run(
        &self,
        partial: PartialBrief,
        tracker: &mut ProgressTracker<'_>,
    ) -> Result<PipelineOutput, PipelineError> {
        tracker.begin(StepId::Brief)?;
        let brief = normalize(partial, &self.defaults);
        info!(
            "Brief: {:?} / {} / {} / {}",
            brief.topic, brief.cadence, brief.tone, brief.focus_region
        );
        tracker.complete(StepId::Brief)?;

        tracker.begin(StepId::Intel)?;
        let signals = self.collector.collect(&brief).await;
        info!("Collected {} signals", signals.len());
        tracker.complete(StepId::Intel)?;

        tracker.begin(StepId::Compose)?;
        let result = self.composer.compose(&brief, signals).await?;
        info!(
            "Composed {} idea pitches with {} cited sources",
            result.idea_pitches.len(),
            result.sources.len()
        );
        tracker.complete(StepId::Compose)?;

        Ok(PipelineOutput {
            result,
            steps: tracker.snapshot(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::ComposerConfig;
    use crate::error::{GenerationError, SourceError, GENERIC_FAILURE_MESSAGE};
    use crate::generator::{GenerationRequest, TextGenerator};
    use crate::models::SignalItem;
    use crate::progress::{is_monotonic, RecordingObserver, StepStatus};
    use crate::signals::{CollectorConfig, SignalQuery, SignalSource};
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::time::Duration;

    /// Returns one story per query, titled after the query terms
    struct EchoSource;

    #[async_trait]
    impl SignalSource for EchoSource {
        fn name(&self) -> &str {
            "echo"
        }

        async fn fetch(&self, query: &SignalQuery) -> Result<Vec<SignalItem>, SourceError> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(vec![SignalItem {
                title: format!("News about {}", query.terms),
                url: Some(format!("https://news.example/{}", urlencoding::encode(&query.terms))),
                author: Some("reporter".to_string()),
                created_at: Utc::now() - ChronoDuration::hours(2),
                points: Some(120),
            }])
        }
    }

    struct DownSource;

    #[async_trait]
    impl SignalSource for DownSource {
        fn name(&self) -> &str {
            "down"
        }

        async fn fetch(&self, _query: &SignalQuery) -> Result<Vec<SignalItem>, SourceError> {
            Err(SourceError::Request {
                source_name: "down".to_string(),
                message: "connection refused".to_string(),
            })
        }
    }

    /// Writes a short artifact that cites the first signal and names the first
    /// pool entry's title, so cross-run leakage would be visible.
    struct CitingGenerator;

    #[async_trait]
    impl TextGenerator for CitingGenerator {
        async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let first = request
                .prompt
                .lines()
                .find(|l| l.starts_with("[1] "))
                .unwrap_or("no signals")
                .to_string();
            Ok(match request.deliverable {
                crate::error::Deliverable::IdeaPitches => format!("- Follow up on {}", first),
                _ => format!("# Draft\nBased on {} [1].", first),
            })
        }
    }

    struct BrokenGenerator;

    #[async_trait]
    impl TextGenerator for BrokenGenerator {
        async fn generate(&self, _request: &GenerationRequest) -> Result<String, GenerationError> {
            Err(GenerationError::Api {
                status: 401,
                body: "invalid x-api-key".to_string(),
            })
        }
    }

    fn pipeline(
        source: impl SignalSource + 'static,
        generator: impl TextGenerator + 'static,
    ) -> ContentPipeline {
        let collector = SignalCollector::new(CollectorConfig::default()).with_source(source);
        let composer = ArtifactComposer::new(Arc::new(generator), ComposerConfig::default());
        ContentPipeline::new(BriefDefaults::default(), collector, composer)
    }

    // ==================== Run Tests ====================

    #[tokio::test]
    async fn test_topic_only_brief_completes() {
        let pipeline = pipeline(EchoSource, CitingGenerator);
        let observer = RecordingObserver::new();

        let output = pipeline
            .generate_with_observer(PartialBrief::topic("AI safety"), &observer)
            .await
            .unwrap();

        assert!(output.result.newsletter.is_some());
        assert!(output.result.blog.is_some());
        assert!(!output.result.idea_pitches.is_empty());
        assert_eq!(output.result.metadata.topic, "AI safety");
        assert_eq!(output.result.metadata.tone, "Analytical");
        assert_eq!(output.result.metadata.audience, "General readership");
        assert_eq!(output.result.sources.len(), 1);
        assert_eq!(output.result.sources[0].title, "News about AI safety");

        assert!(output.steps.iter().all(|s| s.status == StepStatus::Complete));

        let transitions = observer.transitions();
        assert_eq!(transitions.len(), 6);
        let order: Vec<(StepId, StepStatus)> =
            transitions.iter().map(|s| (s.id, s.status)).collect();
        assert_eq!(
            order,
            vec![
                (StepId::Brief, StepStatus::Active),
                (StepId::Brief, StepStatus::Complete),
                (StepId::Intel, StepStatus::Active),
                (StepId::Intel, StepStatus::Complete),
                (StepId::Compose, StepStatus::Active),
                (StepId::Compose, StepStatus::Complete),
            ]
        );
    }

    #[tokio::test]
    async fn test_unreachable_sources_still_compose() {
        let pipeline = pipeline(DownSource, CitingGenerator);

        let output = pipeline.generate(PartialBrief::topic("quantum")).await.unwrap();

        assert!(output.result.sources.is_empty());
        assert!(output.result.newsletter.is_some());
        assert!(is_monotonic(&output.steps));
    }

    #[tokio::test]
    async fn test_empty_body_runs_on_defaults() {
        let pipeline = pipeline(EchoSource, CitingGenerator);
        let output = pipeline
            .generate(PartialBrief::from_value(serde_json::json!("not an object")))
            .await
            .unwrap();
        assert_eq!(output.result.metadata.topic, "emerging technology");
        assert_eq!(output.result.metadata.timeframe, "Past 7 days");
    }

    // ==================== Failure Tests ====================

    #[tokio::test]
    async fn test_generation_failure_leaves_compose_active() {
        let pipeline = pipeline(EchoSource, BrokenGenerator);
        let observer = RecordingObserver::new();

        let failure = pipeline
            .generate_with_observer(PartialBrief::topic("AI safety"), &observer)
            .await
            .unwrap_err();

        assert!(matches!(
            failure.error,
            PipelineError::Composition(GenerationError::Api { status: 401, .. })
        ));
        assert_eq!(failure.public_message(), GENERIC_FAILURE_MESSAGE);

        let statuses: Vec<StepStatus> = failure.steps.iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![StepStatus::Complete, StepStatus::Complete, StepStatus::Active]
        );
        assert!(is_monotonic(&failure.steps));

        let last = observer.transitions().pop().unwrap();
        assert_eq!((last.id, last.status), (StepId::Compose, StepStatus::Active));
    }

    // ==================== Concurrency Tests ====================

    #[tokio::test]
    async fn test_concurrent_runs_do_not_share_state() {
        let pipeline = pipeline(EchoSource, CitingGenerator);
        let first_observer = RecordingObserver::new();
        let second_observer = RecordingObserver::new();

        let (first, second) = tokio::join!(
            pipeline.generate_with_observer(PartialBrief::topic("fusion energy"), &first_observer),
            pipeline.generate_with_observer(
                PartialBrief {
                    tone: Some("Playful".to_string()),
                    ..PartialBrief::topic("deep sea mining")
                },
                &second_observer
            ),
        );
        let first = first.unwrap();
        let second = second.unwrap();

        assert_eq!(first.result.metadata.topic, "fusion energy");
        assert_eq!(second.result.metadata.topic, "deep sea mining");
        assert_eq!(second.result.metadata.tone, "Playful");

        assert_eq!(first.result.sources[0].title, "News about fusion energy");
        assert_eq!(second.result.sources[0].title, "News about deep sea mining");

        let first_text = first.result.newsletter.unwrap();
        assert!(first_text.contains("fusion energy"));
        assert!(!first_text.contains("deep sea mining"));
        let second_text = second.result.blog.unwrap();
        assert!(second_text.contains("deep sea mining"));
        assert!(!second_text.contains("fusion energy"));

        assert_eq!(first_observer.transitions().len(), 6);
        assert_eq!(second_observer.transitions().len(), 6);
    }
}
