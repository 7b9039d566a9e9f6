// Public modules
pub mod brief;
pub mod cadence;
pub mod client;
pub mod composer;
pub mod config;
pub mod error;
pub mod export;
pub mod generator;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod signals;

// Re-export commonly used types
pub use brief::{normalize, BriefCatalog, BriefDefaults, PartialBrief, TopicPreset};
pub use client::PulseClient;
pub use composer::{ArtifactComposer, ComposerConfig};
pub use config::Config;
pub use error::{
    ClientError, Deliverable, GenerationError, PipelineError, PipelineFailure, SourceError,
    GENERIC_FAILURE_MESSAGE, TRANSPORT_FAILURE_MESSAGE,
};
pub use export::{ArtifactExporter, ExportKind};
pub use generator::{ClaudeGenerator, GenerationRequest, TextGenerator};
pub use models::{
    Brief, CatalogResponse, ErrorBody, GenerationMetadata, GenerationResult, PipelineOutput,
    SignalItem,
};
pub use pipeline::ContentPipeline;
pub use progress::{
    NoopObserver, PipelineStep, ProgressObserver, ProgressTracker, RecordingObserver, StepId,
    StepStatus,
};
pub use signals::{CollectorConfig, HackerNewsSource, SignalCollector, SignalQuery, SignalSource};
