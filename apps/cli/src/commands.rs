//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use triage_core::delivery;
use triage_core::pipeline::{Pipeline, ProgressReporter, Stage};
use triage_extract::Downloader;
use triage_shared::{
    AppConfig, ArtifactId, ArtifactInput, ArtifactRecord, PipelineConfig, ProviderId,
    ProviderSettings, init_config, load_config, load_config_from,
};
use triage_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Triage: decide what saved content is worth reading.
#[derive(Parser)]
#[command(
    name = "triage",
    version,
    about = "Extract saved content, ask a language model whether to read or discard it, and keep the verdicts.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.triage/triage.toml.
    #[arg(long, env = "TRIAGE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Process a new artifact and store the verdict.
    Process {
        #[command(subcommand)]
        input: ProcessInput,
    },

    /// Re-run analysis on a stored artifact with the current configuration.
    Reprocess {
        /// Artifact ID.
        id: ArtifactId,
    },

    /// List stored artifacts, newest first.
    List {
        /// Print records as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show one artifact, including its extracted content.
    Show {
        /// Artifact ID.
        id: ArtifactId,

        /// Print the record as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Delete a stored artifact.
    Delete {
        /// Artifact ID.
        id: ArtifactId,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// What to process.
#[derive(Subcommand)]
pub(crate) enum ProcessInput {
    /// A local file (PDF, DOCX, or plain text).
    File {
        /// Path to the file.
        path: PathBuf,
    },
    /// A web page, video link, or direct document link.
    Url {
        /// URL to process.
        url: String,
    },
    /// Literal text.
    Text {
        /// Text to analyze.
        body: String,

        /// Label stored as the artifact's source.
        #[arg(short, long, default_value = "note")]
        label: String,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration (API keys masked).
    Show,
    /// Select the provider used for new runs.
    Use {
        /// Provider: openai, anthropic, or local.
        provider: ProviderId,
    },
    /// Store settings for a provider. Omitted fields are kept.
    SetProvider {
        /// Provider: openai, anthropic, or local.
        provider: ProviderId,

        /// API key for hosted providers.
        #[arg(long, env = "TRIAGE_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Request URL (required for local, optional override for hosted).
        #[arg(long)]
        endpoint: Option<String>,

        /// Model identifier.
        #[arg(long)]
        model: Option<String>,
    },
    /// Replace the steering instruction sent with every run.
    SetPrompt {
        /// New instruction text.
        prompt: String,
    },
    /// Set the token ceiling for content sent to the model.
    SetCeiling {
        /// Estimated tokens.
        tokens: usize,
    },
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "triage=info",
        1 => "triage=debug",
        _ => "triage=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    match cli.command {
        Command::Process { input } => cmd_process(&config, input).await,
        Command::Reprocess { id } => cmd_reprocess(&config, &id).await,
        Command::List { json } => cmd_list(&config, json).await,
        Command::Show { id, json } => cmd_show(&config, &id, json).await,
        Command::Delete { id } => cmd_delete(&config, &id).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(&config).await,
            ConfigAction::Use { provider } => {
                update_pipeline_config(&config, |c| c.active_provider = provider).await
            }
            ConfigAction::SetProvider {
                provider,
                api_key,
                endpoint,
                model,
            } => {
                update_pipeline_config(&config, |c| {
                    let entry = c.providers.entry(provider).or_default();
                    merge_settings(entry, api_key, endpoint, model);
                })
                .await
            }
            ConfigAction::SetPrompt { prompt } => {
                update_pipeline_config(&config, |c| c.instruction_prompt = prompt).await
            }
            ConfigAction::SetCeiling { tokens } => {
                update_pipeline_config(&config, |c| c.token_ceiling = tokens).await
            }
        },
    }
}

async fn open_storage(config: &AppConfig) -> Result<Storage> {
    Ok(Storage::open(&config.storage.resolved_path()).await?)
}

async fn open_storage_readonly(config: &AppConfig) -> Result<Storage> {
    Ok(Storage::open_readonly(&config.storage.resolved_path()).await?)
}

// ---------------------------------------------------------------------------
// Processing
// ---------------------------------------------------------------------------

async fn cmd_process(config: &AppConfig, input: ProcessInput) -> Result<()> {
    let input = match input {
        ProcessInput::File { path } => read_file_input(&path)?,
        ProcessInput::Url { url } => {
            let downloader = Downloader::new(&config.delivery, &config.extraction.user_agent)?;
            delivery::resolve(&url, &downloader).await?
        }
        ProcessInput::Text { body, label } => ArtifactInput::text(label, body),
    };

    let storage = open_storage(config).await?;
    let progress = Arc::new(CliProgress::new());
    let pipeline = Pipeline::from_app_config(config)?.with_progress(progress);

    info!(kind = %input.kind, source = %input.source, "processing artifact");
    let record = pipeline.process_and_store(&input, &storage).await?;

    print_record(&record, false);
    Ok(())
}

fn read_file_input(path: &Path) -> Result<ArtifactInput> {
    let bytes =
        std::fs::read(path).map_err(|e| eyre!("cannot read '{}': {e}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| eyre!("'{}' is not a file path", path.display()))?;
    Ok(ArtifactInput::file(filename, bytes))
}

async fn cmd_reprocess(config: &AppConfig, id: &ArtifactId) -> Result<()> {
    let storage = open_storage(config).await?;
    let progress = Arc::new(CliProgress::new());
    let pipeline = Pipeline::from_app_config(config)?.with_progress(progress);

    let record = pipeline.reprocess(&storage, id).await?;
    print_record(&record, false);
    Ok(())
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

async fn cmd_list(config: &AppConfig, json: bool) -> Result<()> {
    let storage = open_storage_readonly(config).await?;
    let records = storage.list_artifacts().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No artifacts yet.");
        return Ok(());
    }

    for record in &records {
        println!(
            "{}  {:<8} {:<5} {}  {}",
            record.id,
            record.result.recommendation.as_str(),
            record.kind.as_str(),
            record.created_at.format("%Y-%m-%d %H:%M"),
            record.source
        );
    }
    Ok(())
}

async fn cmd_show(config: &AppConfig, id: &ArtifactId, json: bool) -> Result<()> {
    let storage = open_storage_readonly(config).await?;
    let record = storage
        .get_artifact(id)
        .await?
        .ok_or_else(|| eyre!("artifact {id} not found"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print_record(&record, true);
    }
    Ok(())
}

async fn cmd_delete(config: &AppConfig, id: &ArtifactId) -> Result<()> {
    let storage = open_storage(config).await?;
    if !storage.delete_artifact(id).await? {
        return Err(eyre!("artifact {id} not found"));
    }
    println!("Deleted {id}");
    Ok(())
}

fn print_record(record: &ArtifactRecord, with_content: bool) {
    let result = &record.result;
    println!();
    println!("  ID:             {}", record.id);
    println!("  Source:         {} ({})", record.source, record.kind);
    println!("  Recommendation: {}", result.recommendation);
    println!("  Summary:        {}", result.summary);
    if let (Some(provider), Some(model)) = (&result.provider_id, &result.model_id) {
        println!("  Model:          {provider} / {model}");
    }
    if result.was_truncated {
        println!("  Truncated:      yes");
    }
    println!();
    println!("{}", result.rationale);
    if with_content {
        println!();
        println!("--- Extracted content ---");
        println!("{}", result.extracted_content);
    }
    println!();
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config: &AppConfig) -> Result<()> {
    println!("{}", toml::to_string_pretty(config)?);

    let storage = open_storage(config).await?;
    let pipeline = storage.load_pipeline_config().await?;
    println!("[pipeline]");
    println!("provider = {}", pipeline.active_provider);
    println!("token_ceiling = {}", pipeline.token_ceiling);
    println!("prompt = {:?}", pipeline.instruction_prompt);
    for (id, settings) in &pipeline.providers {
        println!();
        println!("[pipeline.providers.{id}]");
        println!("{}", toml::to_string_pretty(&settings.redacted())?);
    }
    Ok(())
}

/// Load the stored pipeline config, apply `edit`, and save it back.
async fn update_pipeline_config(
    config: &AppConfig,
    edit: impl FnOnce(&mut PipelineConfig),
) -> Result<()> {
    let storage = open_storage(config).await?;
    let mut pipeline = storage.load_pipeline_config().await?;
    edit(&mut pipeline);
    storage.save_pipeline_config(&pipeline).await?;
    println!("Configuration updated.");
    Ok(())
}

/// Overwrite only the fields that were given.
fn merge_settings(
    settings: &mut ProviderSettings,
    api_key: Option<String>,
    endpoint: Option<String>,
    model: Option<String>,
) {
    if api_key.is_some() {
        settings.api_key = api_key;
    }
    if endpoint.is_some() {
        settings.endpoint = endpoint;
    }
    if model.is_some() {
        settings.model = model;
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn stage(&self, stage: Stage) {
        if stage == Stage::Done {
            self.spinner.finish_and_clear();
        } else {
            self.spinner.set_message(stage.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_process_text() {
        let cli = Cli::try_parse_from(["triage", "process", "text", "hello", "--label", "clip"])
            .unwrap();
        match cli.command {
            Command::Process {
                input: ProcessInput::Text { body, label },
            } => {
                assert_eq!(body, "hello");
                assert_eq!(label, "clip");
            }
            _ => panic!("expected process text"),
        }
    }

    #[test]
    fn cli_parses_provider_ids() {
        let cli = Cli::try_parse_from(["triage", "config", "use", "anthropic"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Config {
                action: ConfigAction::Use {
                    provider: ProviderId::Anthropic
                }
            }
        ));
        assert!(Cli::try_parse_from(["triage", "config", "use", "gemini"]).is_err());
    }

    #[test]
    fn cli_rejects_bad_ids() {
        assert!(Cli::try_parse_from(["triage", "show", "not-an-id"]).is_err());
    }

    #[test]
    fn merge_keeps_omitted_fields() {
        let mut settings = ProviderSettings {
            api_key: Some("sk-old".into()),
            endpoint: None,
            model: Some("gpt-4o".into()),
        };
        merge_settings(&mut settings, None, Some("http://localhost:1234".into()), None);
        assert_eq!(settings.api_key.as_deref(), Some("sk-old"));
        assert_eq!(settings.endpoint.as_deref(), Some("http://localhost:1234"));
        assert_eq!(settings.model.as_deref(), Some("gpt-4o"));
    }
}
