use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::brief::{BriefCatalog, BriefDefaults};
use crate::progress::PipelineStep;

/// A fully populated content brief
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Brief {
    pub topic: String,
    pub tone: String,
    pub audience: String,
    pub cadence: String,
    pub writing_style: String,
    pub include_newsletter: bool,
    pub include_blog: bool,
    pub extra_notes: String,
    pub focus_region: String,
}

/// One piece of external content used as generation input and citation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalItem {
    pub title: String,
    pub url: Option<String>,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationMetadata {
    pub topic: String,
    pub tone: String,
    pub audience: String,
    pub timeframe: String,
    pub generated_at: DateTime<Utc>,
}

/// Everything a single run produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub newsletter: Option<String>,
    pub blog: Option<String>,
    pub idea_pitches: Vec<String>,
    pub sources: Vec<SignalItem>,
    pub metadata: GenerationMetadata,
}

/// Successful response body of the generate operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub result: GenerationResult,
    pub steps: Vec<PipelineStep>,
}

/// Body of the catalog operation: the selectable options plus the defaults in effect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogResponse {
    #[serde(flatten)]
    pub catalog: BriefCatalog,
    pub defaults: BriefDefaults,
}

/// Body of a failed generate call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
