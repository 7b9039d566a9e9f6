use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::env;

use crate::models::Brief;

/// A brief as submitted: every field optional, wrong JSON types treated as absent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialBrief {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub cadence: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub writing_style: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool", skip_serializing_if = "Option::is_none")]
    pub include_newsletter: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool", skip_serializing_if = "Option::is_none")]
    pub include_blog: Option<bool>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub extra_notes: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub focus_region: Option<String>,
}

impl PartialBrief {
    /// Accepts any JSON value. Anything that is not an object is an empty brief.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(_) => serde_json::from_value(value).unwrap_or_default(),
            _ => Self::default(),
        }
    }

    pub fn topic(topic: impl Into<String>) -> Self {
        Self {
            topic: Some(topic.into()),
            ..Self::default()
        }
    }
}

impl From<Brief> for PartialBrief {
    fn from(brief: Brief) -> Self {
        Self {
            topic: Some(brief.topic),
            tone: Some(brief.tone),
            audience: Some(brief.audience),
            cadence: Some(brief.cadence),
            writing_style: Some(brief.writing_style),
            include_newsletter: Some(brief.include_newsletter),
            include_blog: Some(brief.include_blog),
            extra_notes: Some(brief.extra_notes),
            focus_region: Some(brief.focus_region),
        }
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => Some(b),
        _ => None,
    })
}

/// Values substituted for missing or blank brief fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BriefDefaults {
    pub topic: String,
    pub tone: String,
    pub audience: String,
    pub cadence: String,
    pub writing_style: String,
    pub focus_region: String,
    pub include_newsletter: bool,
    pub include_blog: bool,
}

impl Default for BriefDefaults {
    fn default() -> Self {
        Self {
            topic: "emerging technology".to_string(),
            tone: "Analytical".to_string(),
            audience: "General readership".to_string(),
            cadence: "Weekly Pulse".to_string(),
            writing_style: "Editorial".to_string(),
            focus_region: "Global".to_string(),
            include_newsletter: true,
            include_blog: true,
        }
    }
}

impl BriefDefaults {
    /// Built-in defaults with any `PULSE_DEFAULT_*` overrides applied
    pub fn from_env() -> Self {
        let mut defaults = Self::default();
        let overrides: [(&str, &mut String); 6] = [
            ("PULSE_DEFAULT_TOPIC", &mut defaults.topic),
            ("PULSE_DEFAULT_TONE", &mut defaults.tone),
            ("PULSE_DEFAULT_AUDIENCE", &mut defaults.audience),
            ("PULSE_DEFAULT_CADENCE", &mut defaults.cadence),
            ("PULSE_DEFAULT_STYLE", &mut defaults.writing_style),
            ("PULSE_DEFAULT_REGION", &mut defaults.focus_region),
        ];
        for (key, slot) in overrides {
            if let Ok(value) = env::var(key) {
                let value = value.trim();
                if !value.is_empty() {
                    *slot = value.to_string();
                }
            }
        }
        defaults
    }
}

fn text_or(value: Option<String>, default: &str) -> String {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}

/// Fill every missing or blank field from `defaults`. Never fails.
pub fn normalize(partial: PartialBrief, defaults: &BriefDefaults) -> Brief {
    Brief {
        topic: text_or(partial.topic, &defaults.topic),
        tone: text_or(partial.tone, &defaults.tone),
        audience: text_or(partial.audience, &defaults.audience),
        cadence: text_or(partial.cadence, &defaults.cadence),
        writing_style: text_or(partial.writing_style, &defaults.writing_style),
        include_newsletter: partial
            .include_newsletter
            .unwrap_or(defaults.include_newsletter),
        include_blog: partial.include_blog.unwrap_or(defaults.include_blog),
        extra_notes: text_or(partial.extra_notes, ""),
        focus_region: text_or(partial.focus_region, &defaults.focus_region),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicPreset {
    pub label: String,
    pub topic: String,
    pub notes: String,
}

impl TopicPreset {
    fn new(label: &str, topic: &str, notes: &str) -> Self {
        Self {
            label: label.to_string(),
            topic: topic.to_string(),
            notes: notes.to_string(),
        }
    }
}

/// Selectable options offered to brief authors. Advisory only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BriefCatalog {
    pub tones: Vec<String>,
    pub cadences: Vec<String>,
    pub writing_styles: Vec<String>,
    pub regions: Vec<String>,
    pub presets: Vec<TopicPreset>,
}

impl Default for BriefCatalog {
    fn default() -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            tones: owned(&["Analytical", "Optimistic", "Candid", "Urgent", "Story-driven"]),
            cadences: owned(&["Weekly Pulse", "Bi-weekly Deep Dive", "Monthly Flagship"]),
            writing_styles: owned(&[
                "Concise",
                "Editorial",
                "Narrative",
                "Playful",
                "Investor Update",
            ]),
            regions: owned(&[
                "Global",
                "United States",
                "Europe",
                "Asia-Pacific",
                "Latin America",
            ]),
            presets: vec![
                TopicPreset::new(
                    "AI Research",
                    "frontier AI safety and regulation",
                    "Highlight model evaluations, governance moves, and implications for \
                     enterprise teams.",
                ),
                TopicPreset::new(
                    "Climate Tech",
                    "latest climate tech funding rounds",
                    "Spotlight moonshot solutions and chart policy developments across EU & US.",
                ),
                TopicPreset::new(
                    "Consumer Apps",
                    "trending consumer social products",
                    "Analyze retention hooks and monetization signals for early-stage founders.",
                ),
            ],
        }
    }
}

impl BriefCatalog {
    /// Case-insensitive lookup by preset label
    pub fn preset(&self, label: &str) -> Option<&TopicPreset> {
        self.presets
            .iter()
            .find(|p| p.label.eq_ignore_ascii_case(label.trim()))
    }
}
