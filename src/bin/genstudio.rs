//! CLI for GenStudio - text-to-image generation with history.

use async_trait::async_trait;
use chrono::Local;
use clap::{Args, Parser, Subcommand, ValueEnum};
use genstudio::{
    GenStudioError, GeneratedResult, GenerationRequest, ImageCategory, ImageGenerator,
    ImagePayload, ImageSize, JsonFileStore, Studio, StudioConfig, SubmitOutcome,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "genstudio")]
#[command(about = "Turn text prompts into images with Imagen and keep a local gallery")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// API key (defaults to GOOGLE_API_KEY)
    #[arg(long, global = true)]
    api_key: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an image from a text prompt
    Generate(GenerateArgs),

    /// List past generations, newest first
    History,

    /// Show one past generation
    Show {
        /// Id of the generation
        id: String,
    },

    /// Save a past generation as an image file
    Download {
        /// Id of the generation
        id: String,

        /// Directory to save into (defaults to GENSTUDIO_DOWNLOAD_DIR or .)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List available sizes and categories
    Options,

    /// Check that the generation service is reachable
    Check,
}

#[derive(Args)]
struct GenerateArgs {
    /// The text prompt describing the image
    prompt: String,

    /// Image size
    #[arg(short, long, value_enum, default_value = "1024x1024")]
    size: SizeArg,

    /// Style category
    #[arg(short, long, value_enum, default_value = "general")]
    category: CategoryArg,

    /// Also save the image into this directory
    #[arg(short, long)]
    download: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SizeArg {
    #[value(name = "512x512")]
    Small,
    #[value(name = "1024x1024")]
    Medium,
    #[value(name = "1536x1536")]
    Large,
    #[value(name = "banner", alias = "1920x1080")]
    Banner,
}

impl From<SizeArg> for ImageSize {
    fn from(arg: SizeArg) -> Self {
        match arg {
            SizeArg::Small => ImageSize::Small,
            SizeArg::Medium => ImageSize::Medium,
            SizeArg::Large => ImageSize::Large,
            SizeArg::Banner => ImageSize::Banner,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CategoryArg {
    General,
    Nature,
    Futuristic,
    Fantasy,
    Animals,
    Technology,
}

impl From<CategoryArg> for ImageCategory {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::General => ImageCategory::General,
            CategoryArg::Nature => ImageCategory::Nature,
            CategoryArg::Futuristic => ImageCategory::Futuristic,
            CategoryArg::Fantasy => ImageCategory::Fantasy,
            CategoryArg::Animals => ImageCategory::Animals,
            CategoryArg::Technology => ImageCategory::Technology,
        }
    }
}

/// Stands in for the provider when no API key is configured, so commands
/// that only read history still work.
struct Unavailable {
    reason: String,
}

#[async_trait]
impl ImageGenerator for Unavailable {
    async fn generate(&self, _request: &GenerationRequest) -> genstudio::Result<ImagePayload> {
        Err(GenStudioError::Auth(self.reason.clone()))
    }

    fn name(&self) -> &str {
        "unavailable"
    }

    async fn health_check(&self) -> genstudio::Result<()> {
        Err(GenStudioError::Auth(self.reason.clone()))
    }
}

#[derive(serde::Serialize)]
struct ResultView<'a> {
    id: &'a str,
    prompt: &'a str,
    size: &'a str,
    category: &'a str,
    mime_type: Option<&'a str>,
    created_at: String,
}

impl<'a> From<&'a GeneratedResult> for ResultView<'a> {
    fn from(result: &'a GeneratedResult) -> Self {
        Self {
            id: &result.id,
            prompt: &result.prompt_text,
            size: result.size.label(),
            category: result.category.label(),
            mime_type: result.payload.mime_type(),
            created_at: result.created_at.to_rfc3339(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = StudioConfig::from_env()?;
    let studio = open_studio(&config, cli.api_key.clone());
    studio.load_history();

    match cli.command {
        Commands::Generate(args) => {
            generate(&studio, &config, args, cli.json).await?;
        }
        Commands::History => {
            list_history(&studio, cli.json)?;
        }
        Commands::Show { id } => {
            show(&studio, &id, cli.json)?;
        }
        Commands::Download { id, output } => {
            let dir = output.unwrap_or_else(|| config.download_dir.clone());
            download(&studio, &id, dir, cli.json)?;
        }
        Commands::Options => {
            list_options(cli.json)?;
        }
        Commands::Check => {
            check(&studio, cli.json).await?;
        }
    }

    Ok(())
}

fn open_studio(config: &StudioConfig, api_key: Option<String>) -> Studio {
    let store = Arc::new(JsonFileStore::new(&config.history_path));
    let generator: Arc<dyn ImageGenerator> = match config.imagen_provider(api_key) {
        Ok(provider) => Arc::new(provider),
        Err(e) => {
            tracing::debug!(error = %e, "generation provider unavailable");
            Arc::new(Unavailable {
                reason: e.to_string(),
            })
        }
    };
    Studio::new(generator, store)
}

fn find(studio: &Studio, id: &str) -> anyhow::Result<GeneratedResult> {
    studio
        .find(id)
        .ok_or_else(|| anyhow::anyhow!("no generation with id {id}"))
}

async fn generate(
    studio: &Studio,
    config: &StudioConfig,
    args: GenerateArgs,
    json_output: bool,
) -> anyhow::Result<()> {
    let size: ImageSize = args.size.into();
    let category: ImageCategory = args.category.into();

    studio.set_prompt(&args.prompt);
    studio.select_size(size);
    studio.select_category(category);

    let status = (!json_output).then(|| spawn_status_line(studio));
    let outcome = studio.submit_draft().await;
    if let Some(status) = status {
        status.abort();
    }

    match outcome {
        SubmitOutcome::Generated(result) => {
            let saved = args
                .download
                .map(|dir| studio.download(&result, dir))
                .transpose()?;

            if json_output {
                let output = serde_json::json!({
                    "type": "image",
                    "success": true,
                    "result": ResultView::from(&result),
                    "aspect_ratio": result.size.aspect_ratio().as_str(),
                    "history_path": config.history_path.display().to_string(),
                    "saved_to": saved.as_ref().map(|p| p.display().to_string()),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("Generated image {}", result.id);
                println!("  {} • {}", result.size, result.category);
                if let Some(path) = saved {
                    println!("Saved to {}", path.display());
                }
            }
            Ok(())
        }
        SubmitOutcome::Failed(message) => {
            if json_output {
                let output = serde_json::json!({
                    "type": "image",
                    "success": false,
                    "error": message,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            anyhow::bail!("{message}");
        }
        SubmitOutcome::Rejected(reason) => {
            anyhow::bail!("nothing to generate ({reason:?})");
        }
    }
}

/// Prints a status line whenever a generation starts.
fn spawn_status_line(studio: &Studio) -> tokio::task::JoinHandle<()> {
    let mut rx = studio.subscribe();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            if rx.borrow_and_update().session.in_flight {
                eprintln!("Generating...");
            }
        }
    })
}

fn list_history(studio: &Studio, json_output: bool) -> anyhow::Result<()> {
    let history = studio.history();

    if json_output {
        let views: Vec<ResultView<'_>> = history.iter().map(ResultView::from).collect();
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }

    if history.is_empty() {
        println!("No creations yet.");
        return Ok(());
    }

    println!("Recent Creations ({} images)\n", history.len());
    for result in &history {
        println!(
            "  {}  {}  {:<18}  {:<10}  {}",
            result.id,
            result.created_at.with_timezone(&Local).format("%Y-%m-%d"),
            result.size.label(),
            result.category.label(),
            result.prompt_text
        );
    }
    Ok(())
}

fn show(studio: &Studio, id: &str, json_output: bool) -> anyhow::Result<()> {
    let result = find(studio, id)?;
    studio.select_for_viewing(Some(result));
    let Some(result) = studio.session().viewing else {
        return Ok(());
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&ResultView::from(&result))?);
    } else {
        println!("{}", result.prompt_text);
        println!("{} • {}", result.size, result.category);
        println!(
            "Created {}",
            result.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        );
        if let Some(mime) = result.payload.mime_type() {
            println!("Type: {mime}");
        }
        println!("File name: {}", result.download_filename());
    }
    studio.select_for_viewing(None);
    Ok(())
}

fn download(studio: &Studio, id: &str, dir: PathBuf, json_output: bool) -> anyhow::Result<()> {
    let result = find(studio, id)?;
    let path = studio.download(&result, dir)?;

    if json_output {
        let output = serde_json::json!({
            "id": result.id,
            "saved_to": path.display().to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Saved {}", path.display());
    }
    Ok(())
}

async fn check(studio: &Studio, json_output: bool) -> anyhow::Result<()> {
    let result = studio.health_check().await;
    let provider = studio.generator_name();

    if json_output {
        let output = serde_json::json!({
            "provider": provider,
            "ok": result.is_ok(),
            "error": result.as_ref().err().map(|e| e.to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        match &result {
            Ok(()) => println!("✓ {provider} is reachable"),
            Err(e) => println!("✗ {provider}: {e}"),
        }
    }

    result.map_err(Into::into)
}

fn list_options(json_output: bool) -> anyhow::Result<()> {
    if json_output {
        let sizes: Vec<_> = ImageSize::ALL
            .iter()
            .map(|s| serde_json::json!({ "size": s.label(), "aspect_ratio": s.aspect_ratio().as_str() }))
            .collect();
        let categories: Vec<_> = ImageCategory::ALL.iter().map(|c| c.label()).collect();
        let output = serde_json::json!({ "sizes": sizes, "categories": categories });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("SIZES:");
        for size in ImageSize::ALL {
            println!("  {:<20} {}", size.label(), size.aspect_ratio());
        }
        println!("\nCATEGORIES:");
        for category in ImageCategory::ALL {
            let marker = if category.is_neutral() { " (default)" } else { "" };
            println!("  {}{marker}", category.label());
        }
    }
    Ok(())
}
