//! Turns a brief and its signals into the newsletter, blog, idea pitches and
//! source list of a run.
//!
//! Signals are offered to the generator as a numbered citation pool (`[1]`,
//! `[2]`, ...). After generation only the pool entries that were actually cited
//! become `sources`, and the markers in the text are renumbered to match.

use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::cadence;
use crate::error::{Deliverable, GenerationError};
use crate::generator::{GenerationRequest, TextGenerator};
use crate::models::{Brief, GenerationMetadata, GenerationResult, SignalItem};

const SYSTEM_PROMPT: &str = "You are Latest Pulse, an editorial agent that drafts \
publication-ready markdown for newsletters and blogs. Cite only the numbered signals you are \
given, using their [n] marker exactly as shown. Never invent sources, quotes, statistics or URLs.";

#[derive(Debug, Clone)]
pub struct ComposerConfig {
    pub max_citations: usize,
    pub idea_count: usize,
    pub timeout: Duration,
    pub newsletter_tokens: u32,
    pub blog_tokens: u32,
    pub idea_tokens: u32,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            max_citations: 8,
            idea_count: 4,
            timeout: Duration::from_secs(90),
            newsletter_tokens: 1800,
            blog_tokens: 3200,
            idea_tokens: 400,
        }
    }
}

struct Drafts {
    newsletter: Option<String>,
    blog: Option<String>,
    ideas: String,
}

pub struct ArtifactComposer {
    generator: Arc<dyn TextGenerator>,
    config: ComposerConfig,
}

impl ArtifactComposer {
    pub fn new(generator: Arc<dyn TextGenerator>, config: ComposerConfig) -> Self {
        Self { generator, config }
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    /// Fails if any requested deliverable fails; never returns a partial result
    pub async fn compose(
        &self,
        brief: &Brief,
        signals: Vec<SignalItem>,
    ) -> Result<GenerationResult, GenerationError> {
        let pool: Vec<SignalItem> = signals
            .into_iter()
            .take(self.config.max_citations)
            .collect();
        let digest = signal_digest(&pool);

        info!(
            "Composing for {:?} (newsletter: {}, blog: {}, {} citable signals)",
            brief.topic,
            brief.include_newsletter,
            brief.include_blog,
            pool.len()
        );

        let drafting = self.draft_all(brief, &digest);
        let drafts = match tokio::time::timeout(self.config.timeout, drafting).await {
            Ok(drafts) => drafts?,
            Err(_) => return Err(GenerationError::Timeout(self.config.timeout)),
        };

        let idea_pitches = parse_pitches(&drafts.ideas, self.config.idea_count);
        if idea_pitches.is_empty() {
            debug!("Idea reply had no usable list items");
        }

        let texts = drafts
            .newsletter
            .iter()
            .chain(drafts.blog.iter())
            .chain(idea_pitches.iter())
            .map(String::as_str);
        let cited = cited_indices(texts, pool.len());
        let renumber: HashMap<usize, usize> = cited
            .iter()
            .enumerate()
            .map(|(position, original)| (*original, position + 1))
            .collect();

        let sources: Vec<SignalItem> = cited.iter().map(|n| pool[n - 1].clone()).collect();

        Ok(GenerationResult {
            newsletter: drafts.newsletter.map(|t| renumber_citations(&t, &renumber)),
            blog: drafts.blog.map(|t| renumber_citations(&t, &renumber)),
            idea_pitches: idea_pitches
                .iter()
                .map(|p| renumber_citations(p, &renumber))
                .collect(),
            sources,
            metadata: GenerationMetadata {
                topic: brief.topic.clone(),
                tone: brief.tone.clone(),
                audience: brief.audience.clone(),
                timeframe: cadence::timeframe_label(&brief.cadence),
                generated_at: Utc::now(),
            },
        })
    }

    async fn draft_all(&self, brief: &Brief, digest: &str) -> Result<Drafts, GenerationError> {
        let (newsletter, blog, ideas) = tokio::try_join!(
            self.draft_if(brief.include_newsletter, || {
                newsletter_request(brief, digest, &self.config)
            }),
            self.draft_if(brief.include_blog, || {
                blog_request(brief, digest, &self.config)
            }),
            self.draft(ideas_request(brief, digest, &self.config)),
        )?;
        Ok(Drafts {
            newsletter,
            blog,
            ideas,
        })
    }

    async fn draft_if(
        &self,
        wanted: bool,
        request: impl FnOnce() -> GenerationRequest,
    ) -> Result<Option<String>, GenerationError> {
        if !wanted {
            return Ok(None);
        }
        self.draft(request()).await.map(Some)
    }

    async fn draft(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let text = self.generator.generate(&request).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(GenerationError::EmptyOutput {
                deliverable: request.deliverable,
            });
        }
        Ok(text.to_string())
    }
}

/// Numbered signal list handed to every prompt
pub fn signal_digest(pool: &[SignalItem]) -> String {
    if pool.is_empty() {
        return "No fresh signals were found for this window. Write from the brief alone and do not \
use [n] markers."
            .to_string();
    }

    pool.iter()
        .enumerate()
        .map(|(idx, item)| {
            let mut line = format!("[{}] {}", idx + 1, item.title);
            if let Some(url) = &item.url {
                line.push_str(&format!(" ({})", url));
            }
            if let Some(author) = &item.author {
                line.push_str(&format!(" by {}", author));
            }
            line.push_str(&format!(", {}", item.created_at.format("%Y-%m-%d")));
            if let Some(points) = item.points {
                line.push_str(&format!(", {} points", points));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn brief_block(brief: &Brief) -> String {
    let mut block = format!(
        "- Topic: {}\n- Tone: {}\n- Audience: {}\n- Writing style: {}\n\
         - Region focus: {}\n- Timeframe: {}",
        brief.topic,
        brief.tone,
        brief.audience,
        brief.writing_style,
        brief.focus_region,
        cadence::timeframe_label(&brief.cadence)
    );
    if !brief.extra_notes.is_empty() {
        block.push_str(&format!("\n- Editor notes: {}", brief.extra_notes));
    }
    block
}

fn newsletter_structure(cadence_name: &str) -> &'static str {
    match cadence::window_days(cadence_name) {
        0..=7 => {
            "1. A punchy headline (H1)\n\
             2. A two-sentence intro\n\
             3. Three to five short story blocks (H3), each ending with a \"Why it matters\" line\n\
             4. A \"Quick hits\" bullet list\n\
             5. A one-line sign-off"
        }
        8..=14 => {
            "1. A headline (H1) and a short intro\n\
             2. Two or three deeper analysis sections (H2) that connect the signals\n\
             3. A \"What to watch\" bullet list\n\
             4. A sign-off"
        }
        _ => {
            "1. A flagship headline (H1) and an editor's letter\n\
             2. Month-in-review sections (H2) grouped by theme\n\
             3. A \"By the numbers\" list using only figures present in the signals\n\
             4. A \"Looking ahead\" section\n\
             5. A sign-off"
        }
    }
}

fn newsletter_request(brief: &Brief, digest: &str, config: &ComposerConfig) -> GenerationRequest {
    let prompt = format!(
        r#"Write the "{cadence}" newsletter edition.

Brief:
{brief}

Structure:
{structure}

Signals:
{digest}

Cite signals inline with their [n] marker. Return markdown only."#,
        cadence = brief.cadence,
        brief = brief_block(brief),
        structure = newsletter_structure(&brief.cadence),
        digest = digest,
    );

    GenerationRequest {
        deliverable: Deliverable::Newsletter,
        system: SYSTEM_PROMPT.to_string(),
        prompt,
        max_tokens: config.newsletter_tokens,
    }
}

fn blog_request(brief: &Brief, digest: &str, config: &ComposerConfig) -> GenerationRequest {
    let prompt = format!(
        r#"Write a standalone long-form blog article. It is published alongside a newsletter
but must not reuse the newsletter's layout or read as an expanded version of it.

Brief:
{brief}

Structure:
1. A title (H1)
2. A hook paragraph that frames the central argument
3. Three to five sections (H2) that build the argument step by step
4. A section on what this means for {audience}
5. A conclusion with a clear point of view

Signals:
{digest}

Cite signals inline with their [n] marker. Return markdown only."#,
        brief = brief_block(brief),
        audience = brief.audience,
        digest = digest,
    );

    GenerationRequest {
        deliverable: Deliverable::Blog,
        system: SYSTEM_PROMPT.to_string(),
        prompt,
        max_tokens: config.blog_tokens,
    }
}

fn ideas_request(brief: &Brief, digest: &str, config: &ComposerConfig) -> GenerationRequest {
    let prompt = format!(
        r#"Suggest {count} follow-up story angles that could seed the next brief on "{topic}"
for {audience}.

Signals:
{digest}

RULES:
1. One angle per line, formatted as a dash bullet (-)
2. Each angle under 20 words
3. A [n] marker is allowed when an angle grows out of a specific signal
4. No preamble and no closing remarks"#,
        count = config.idea_count,
        topic = brief.topic,
        audience = brief.audience,
        digest = digest,
    );

    GenerationRequest {
        deliverable: Deliverable::IdeaPitches,
        system: SYSTEM_PROMPT.to_string(),
        prompt,
        max_tokens: config.idea_tokens,
    }
}

/// `1. text`, `2) text`, `- text`, `* text` or `• text`; anything else is prose
fn list_item(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    let digits = trimmed.len() - trimmed.trim_start_matches(|c: char| c.is_ascii_digit()).len();

    let rest = if digits > 0 {
        trimmed[digits..].strip_prefix(|c: char| c == '.' || c == ')')?
    } else {
        trimmed.strip_prefix(|c: char| c == '-' || c == '*' || c == '•')?
    };
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let item = rest.trim();
    (!item.is_empty()).then_some(item)
}

/// Bullet or numbered list items from a free-form reply, at most `limit`
pub fn parse_pitches(text: &str, limit: usize) -> Vec<String> {
    text.lines()
        .filter_map(list_item)
        .map(str::to_string)
        .take(limit)
        .collect()
}

/// Widest `[a-b]` range accepted as a citation
const MAX_CITATION_RANGE: usize = 20;

/// Numbers inside one bracket group: `3`, `3, 5`, `1-3` or `1–3, 7`
fn parse_citation_group(inner: &str) -> Option<Vec<usize>> {
    let mut numbers = Vec::new();

    for part in inner.split(',') {
        let part = part.trim();
        match part.split_once(|c: char| c == '-' || c == '–') {
            Some((lo, hi)) => {
                let lo: usize = lo.trim().parse().ok()?;
                let hi: usize = hi.trim().parse().ok()?;
                if hi < lo || hi - lo > MAX_CITATION_RANGE {
                    return None;
                }
                numbers.extend(lo..=hi);
            }
            None => numbers.push(part.parse().ok()?),
        }
    }

    Some(numbers)
}

/// `(start, end, numbers)` of every citation group, skipping markdown links
/// like `[1](...)`
fn citation_markers(text: &str) -> Vec<(usize, usize, Vec<usize>)> {
    let bytes = text.as_bytes();
    let mut markers = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'[' {
            if let Some(close) = text[i + 1..].find(|c: char| c == ']' || c == '[') {
                let end = i + 1 + close;
                let is_link = bytes.get(end + 1) == Some(&b'(');
                if bytes[end] == b']' && !is_link {
                    if let Some(numbers) = parse_citation_group(&text[i + 1..end]) {
                        markers.push((i, end + 1, numbers));
                        i = end + 1;
                        continue;
                    }
                }
            }
        }
        i += 1;
    }

    markers
}

/// Every number cited in `text`, whatever its grouping
pub fn cited_numbers(text: &str) -> BTreeSet<usize> {
    citation_markers(text)
        .into_iter()
        .flat_map(|(_, _, numbers)| numbers)
        .collect()
}

/// Pool positions (1-based) cited anywhere in `texts`, in pool order
fn cited_indices<'a>(texts: impl Iterator<Item = &'a str>, pool_len: usize) -> Vec<usize> {
    let cited: BTreeSet<usize> = texts
        .flat_map(cited_numbers)
        .filter(|n| (1..=pool_len).contains(n))
        .collect();
    cited.into_iter().collect()
}

/// Rewrites each group with the new numbers; numbers missing from `renumber`
/// are dropped, and a group left empty is removed
fn renumber_citations(text: &str, renumber: &HashMap<usize, usize>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for (start, end, numbers) in citation_markers(text) {
        out.push_str(&text[last..start]);
        let kept: BTreeSet<usize> = numbers
            .iter()
            .filter_map(|n| renumber.get(n).copied())
            .collect();
        if !kept.is_empty() {
            let kept: Vec<String> = kept.iter().map(usize::to_string).collect();
            out.push_str(&format!("[{}]", kept.join(", ")));
        }
        last = end;
    }
    out.push_str(&text[last..]);
    out
}
