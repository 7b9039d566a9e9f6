use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::debug;

use shared::{
    ArtifactExporter, BriefCatalog, Config, ContentPipeline, ExportKind, GenerationResult,
    PartialBrief, PipelineOutput, PipelineStep, ProgressObserver, PulseClient, StepStatus,
};

#[derive(Parser)]
#[command(name = "pulse-agent")]
#[command(about = "Turn a content brief into a newsletter, blog article and idea pitches")]
struct Args {
    /// What the edition is about
    #[arg(short, long)]
    topic: Option<String>,

    #[arg(long)]
    tone: Option<String>,

    #[arg(long)]
    audience: Option<String>,

    /// e.g. "Weekly Pulse", "Bi-weekly Deep Dive", "Monthly Flagship"
    #[arg(long)]
    cadence: Option<String>,

    /// Writing style
    #[arg(long)]
    style: Option<String>,

    /// Focus region, "Global" for no regional focus
    #[arg(long)]
    region: Option<String>,

    /// Free-form notes for the editor
    #[arg(long)]
    notes: Option<String>,

    /// Skip the newsletter edition
    #[arg(long)]
    no_newsletter: bool,

    /// Skip the blog article
    #[arg(long)]
    no_blog: bool,

    /// Start from a topic preset (see --list-options)
    #[arg(short, long)]
    preset: Option<String>,

    /// Use a running pulse-server instead of generating locally
    #[arg(long, value_name = "URL")]
    remote: Option<String>,

    /// Where to write the exported files (defaults to ~/Documents)
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// Print the tones, cadences, styles, regions and presets, then exit
    #[arg(long)]
    list_options: bool,
}

/// Prints each stage as the run moves through it
struct ConsoleObserver;

impl ProgressObserver for ConsoleObserver {
    fn on_transition(&self, step: &PipelineStep) {
        match step.status {
            StepStatus::Active => println!("⏳ {}: {}...", step.label, step.description),
            StepStatus::Complete => println!("✓ {}", step.label),
            StepStatus::Pending => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    let catalog = match &args.remote {
        Some(url) => PulseClient::new(url.as_str())?.catalog().await?.catalog,
        None => BriefCatalog::default(),
    };

    if args.list_options {
        print_catalog(&catalog);
        return Ok(());
    }

    let brief = build_brief(&args, &catalog)?;
    debug!("Submitting brief: {:?}", brief);

    println!(
        "📚 Drafting content for: {}",
        brief.topic.as_deref().unwrap_or("(default topic)")
    );

    let output = match &args.remote {
        Some(url) => {
            println!("🌐 Sending brief to {}", url);
            let output = PulseClient::new(url.as_str())?.generate(&brief).await?;
            for step in &output.steps {
                println!("✓ {}", step.label);
            }
            output
        }
        None => run_local(brief).await?,
    };

    print_result(&output.result);
    save_exports(&output, args.out_dir.as_deref())?;

    println!("\n✅ Done!");
    Ok(())
}

async fn run_local(brief: PartialBrief) -> Result<PipelineOutput> {
    let config = Config::from_env()?;
    let pipeline = ContentPipeline::from_config(&config)?;

    // The cause was already logged by the pipeline; the user gets the generic message
    pipeline
        .generate_with_observer(brief, &ConsoleObserver)
        .await
        .map_err(|failure| anyhow::anyhow!(failure.public_message()))
}

/// Flags win over the preset; unset fields are left for the pipeline to default
fn build_brief(args: &Args, catalog: &BriefCatalog) -> Result<PartialBrief> {
    let preset = match &args.preset {
        Some(label) => {
            let preset = catalog.preset(label).with_context(|| {
                let labels: Vec<&str> = catalog.presets.iter().map(|p| p.label.as_str()).collect();
                format!(
                    "Unknown preset {:?}. Available presets: {}",
                    label,
                    labels.join(", ")
                )
            })?;
            Some(preset)
        }
        None => None,
    };

    Ok(PartialBrief {
        topic: args
            .topic
            .clone()
            .or_else(|| preset.map(|p| p.topic.clone())),
        tone: args.tone.clone(),
        audience: args.audience.clone(),
        cadence: args.cadence.clone(),
        writing_style: args.style.clone(),
        include_newsletter: args.no_newsletter.then_some(false),
        include_blog: args.no_blog.then_some(false),
        extra_notes: args
            .notes
            .clone()
            .or_else(|| preset.map(|p| p.notes.clone())),
        focus_region: args.region.clone(),
    })
}

fn print_catalog(catalog: &BriefCatalog) {
    println!("Tones:          {}", catalog.tones.join(", "));
    println!("Cadences:       {}", catalog.cadences.join(", "));
    println!("Writing styles: {}", catalog.writing_styles.join(", "));
    println!("Regions:        {}", catalog.regions.join(", "));
    println!("\nPresets:");
    for preset in &catalog.presets {
        println!("  {} -> {}", preset.label, preset.topic);
        println!("      {}", preset.notes);
    }
}

fn print_result(result: &GenerationResult) {
    let meta = &result.metadata;
    println!(
        "\n📰 {} | {} | {} | {}",
        meta.topic, meta.tone, meta.audience, meta.timeframe
    );
    println!("   {} cited sources", result.sources.len());

    if !result.idea_pitches.is_empty() {
        println!("\n💡 Next brief ideas:");
        for pitch in &result.idea_pitches {
            println!("   - {}", pitch);
        }
    }
}

fn save_exports(output: &PipelineOutput, out_dir: Option<&std::path::Path>) -> Result<()> {
    let result = &output.result;
    let slug = ArtifactExporter::slugify(&result.metadata.topic);
    let date = result.metadata.generated_at;

    let mut files = Vec::new();
    if let Some(md) = ArtifactExporter::newsletter_markdown(result) {
        files.push((md, ExportKind::Newsletter));
    }
    if let Some(md) = ArtifactExporter::blog_markdown(result) {
        files.push((md, ExportKind::Blog));
    }
    files.push((ArtifactExporter::ideas_markdown(result), ExportKind::Ideas));
    files.push((ArtifactExporter::sources_csv(&result.sources), ExportKind::Sources));

    println!();
    for (content, kind) in files {
        let path = ArtifactExporter::save(&content, &slug, kind, date, out_dir)
            .context("Failed to save export")?;
        println!("✓ Saved to: {}", path.display());
    }

    Ok(())
}
