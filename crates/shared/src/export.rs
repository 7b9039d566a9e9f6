use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

use crate::composer::cited_numbers;
use crate::models::{GenerationResult, SignalItem};

/// What a saved file holds; decides the file suffix and extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Newsletter,
    Blog,
    Ideas,
    Sources,
}

impl ExportKind {
    fn suffix(self) -> &'static str {
        match self {
            ExportKind::Newsletter => "newsletter",
            ExportKind::Blog => "blog",
            ExportKind::Ideas => "ideas",
            ExportKind::Sources => "sources",
        }
    }

    fn extension(self) -> &'static str {
        match self {
            ExportKind::Sources => "csv",
            _ => "md",
        }
    }
}

pub struct ArtifactExporter;

impl ArtifactExporter {
    fn format_date(date: DateTime<Utc>) -> String {
        date.format("%-d-%b-%Y %-I:%M%p").to_string()
    }

    /// Only the sources `text` cites, listed under the numbers its markers use
    fn sources_section(text: &str, sources: &[SignalItem]) -> String {
        let cited: Vec<(usize, &SignalItem)> = cited_numbers(text)
            .into_iter()
            .filter_map(|n| sources.get(n.checked_sub(1)?).map(|item| (n, item)))
            .collect();
        if cited.is_empty() {
            return String::new();
        }

        let mut md = String::from("\n\n## Sources\n\n");
        for (number, item) in cited {
            let title = match &item.url {
                Some(url) => format!("[{}]({})", item.title, url),
                None => item.title.clone(),
            };
            md.push_str(&format!("{}. {}", number, title));
            if let Some(author) = &item.author {
                md.push_str(&format!(" by {}", author));
            }
            md.push_str(&format!(" ({})\n", Self::format_date(item.created_at)));
        }
        md
    }

    fn with_sources(text: &str, sources: &[SignalItem]) -> String {
        format!("{}{}", text.trim_end(), Self::sources_section(text, sources))
    }

    /// Newsletter text followed by the sources it cites, or `None` when no
    /// newsletter was requested
    pub fn newsletter_markdown(result: &GenerationResult) -> Option<String> {
        result
            .newsletter
            .as_deref()
            .map(|text| Self::with_sources(text, &result.sources))
    }

    pub fn blog_markdown(result: &GenerationResult) -> Option<String> {
        result
            .blog
            .as_deref()
            .map(|text| Self::with_sources(text, &result.sources))
    }

    pub fn ideas_markdown(result: &GenerationResult) -> String {
        let mut md = format!("# Next brief ideas: {}\n\n", result.metadata.topic);
        if result.idea_pitches.is_empty() {
            md.push_str("_No idea pitches this run._\n");
        }
        for pitch in &result.idea_pitches {
            md.push_str(&format!("- {}\n", pitch));
        }
        md
    }

    pub fn sources_csv(sources: &[SignalItem]) -> String {
        let mut csv = String::from("index,title,url,author,date,points\n");

        for (index, item) in sources.iter().enumerate() {
            csv.push_str(&format!(
                "{},{},{},{},{},{}\n",
                index + 1,
                Self::escape_csv(&item.title),
                Self::escape_csv(item.url.as_deref().unwrap_or("")),
                Self::escape_csv(item.author.as_deref().unwrap_or("")),
                item.created_at.format("%Y-%m-%d"),
                item.points.map(|p| p.to_string()).unwrap_or_default()
            ));
        }

        csv
    }

    fn escape_csv(text: &str) -> String {
        // If the text contains comma, quote, or newline, wrap in quotes and escape quotes
        if text.contains(',') || text.contains('"') || text.contains('\n') {
            format!("\"{}\"", text.replace('"', "\"\""))
        } else {
            text.to_string()
        }
    }

    /// Lowercase ASCII words joined by single dashes, for file names
    pub fn slugify(topic: &str) -> String {
        let slug = topic
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|word| !word.is_empty())
            .map(|word| word.to_ascii_lowercase())
            .collect::<Vec<_>>()
            .join("-");

        if slug.is_empty() {
            "pulse".to_string()
        } else {
            slug
        }
    }

    /// Writes `<slug>-<YYYY-MM-DD>-<kind>.<ext>` into `dir`, or the Documents
    /// directory when no directory is given
    pub fn save(
        content: &str,
        slug: &str,
        kind: ExportKind,
        date: DateTime<Utc>,
        dir: Option<&Path>,
    ) -> Result<PathBuf> {
        let filename = format!(
            "{}-{}-{}.{}",
            slug,
            date.format("%Y-%m-%d"),
            kind.suffix(),
            kind.extension()
        );

        let target_dir = match dir {
            Some(dir) => dir.to_path_buf(),
            None => dirs::document_dir().unwrap_or_else(|| PathBuf::from(".")),
        };
        fs::create_dir_all(&target_dir)
            .with_context(|| format!("Failed to create {}", target_dir.display()))?;

        let filepath = target_dir.join(&filename);
        fs::write(&filepath, content)
            .with_context(|| format!("Failed to write {} file", kind.suffix()))?;

        Ok(filepath)
    }
}
