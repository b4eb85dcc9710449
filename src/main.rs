use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use topical::config::Config;
use topical::governor::CallOptions;
use topical::models::ContentRecord;
use topical::output::terminal;
use topical::providers::ProviderKind;
use topical::Extractor;

/// Topical: extract topics from content with any LLM provider.
///
/// Sends a content record to OpenAI, Anthropic or Gemini and returns a
/// validated, confidence-ranked list of topics.
#[derive(Parser)]
#[command(name = "topical", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract topics with one provider
    Extract {
        /// Provider to use (openai, anthropic, gemini)
        #[arg(long, short)]
        provider: String,

        #[command(flatten)]
        content: ContentArgs,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Give up after this many seconds (throttling and retries included)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Run the same content through several providers concurrently
    Compare {
        /// Comma-separated providers (default: every configured provider)
        #[arg(long, value_delimiter = ',')]
        providers: Vec<String>,

        #[command(flatten)]
        content: ContentArgs,

        /// Print the results as JSON
        #[arg(long)]
        json: bool,

        /// Give up after this many seconds, per provider
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Render the prompt for a content record without calling any provider
    Prompt {
        /// Provider whose topic limits to apply (default: openai)
        #[arg(long, short, default_value = "openai")]
        provider: String,

        #[command(flatten)]
        content: ContentArgs,
    },

    /// List providers, their models, prices and whether a key is configured
    Providers,
}

/// Where the content record comes from.
#[derive(Args)]
struct ContentArgs {
    /// JSON file with title, url, description and body
    #[arg(long, conflicts_with_all = ["title", "url", "description", "body", "body_file"])]
    input: Option<PathBuf>,

    #[arg(long)]
    title: Option<String>,

    #[arg(long)]
    url: Option<String>,

    #[arg(long)]
    description: Option<String>,

    /// Body text inline
    #[arg(long, conflicts_with = "body_file")]
    body: Option<String>,

    /// Read the body text from a file
    #[arg(long)]
    body_file: Option<PathBuf>,
}

impl ContentArgs {
    fn load(&self) -> Result<ContentRecord> {
        if let Some(path) = &self.input {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            return serde_json::from_str(&json)
                .with_context(|| format!("{} is not a valid content record", path.display()));
        }

        let body = match (&self.body, &self.body_file) {
            (Some(body), _) => body.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?,
            (None, None) => String::new(),
        };

        Ok(ContentRecord {
            title: self.title.clone().unwrap_or_default(),
            url: self.url.clone().unwrap_or_default(),
            description: self.description.clone(),
            body,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("topical=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Extract {
            provider,
            content,
            json,
            timeout,
        } => {
            let config = Config::load()?;
            let kind: ProviderKind = provider.parse()?;
            config.require_provider(kind)?;
            let record = content.load()?;
            let extractor = Extractor::from_config(&config)?;
            let options = call_options(timeout);

            let spinner = spinner(&format!("Extracting topics with {kind}..."), json);
            let result = extractor
                .extract_topics_with(&record, kind.as_str(), &options)
                .await;
            spinner.finish_and_clear();

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                terminal::display_result(&result);
            }

            if let Some(err) = result.error {
                return Err(err.into());
            }
        }

        Commands::Compare {
            providers,
            content,
            json,
            timeout,
        } => {
            let config = Config::load()?;
            let kinds: Vec<ProviderKind> = if providers.is_empty() {
                config.configured_providers()
            } else {
                providers
                    .iter()
                    .map(|name| name.parse::<ProviderKind>())
                    .collect::<Result<_, _>>()?
            };
            if kinds.is_empty() {
                anyhow::bail!(
                    "No providers configured. Set at least one of OPENAI_API_KEY, \
                     ANTHROPIC_API_KEY or GEMINI_API_KEY in your .env file."
                );
            }
            for kind in &kinds {
                config.require_provider(*kind)?;
            }

            let record = content.load()?;
            let extractor = Extractor::from_config(&config)?;
            let options = call_options(timeout);
            let names: Vec<&str> = kinds.iter().map(|k| k.as_str()).collect();

            info!(providers = ?names, "Comparing providers");
            let spinner = spinner(
                &format!("Comparing {} providers...", names.len()),
                json,
            );
            let results = extractor.compare(&record, &names, &options).await;
            spinner.finish_and_clear();

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                terminal::display_comparison(&results);
            }

            if results.iter().all(|r| r.error.is_some()) {
                anyhow::bail!("Every provider failed");
            }
        }

        Commands::Prompt { provider, content } => {
            let config = Config::load()?;
            let kind: ProviderKind = provider.parse()?;
            let record = content.load()?;
            let rules = config
                .provider(kind)
                .map(|p| p.prompt_rules())
                .unwrap_or_default();
            let prompt = topical::prompt::build_prompt(&record, &rules)?;
            println!("{prompt}");
        }

        Commands::Providers => {
            let config = Config::load()?;
            terminal::display_providers(&config);
            if config.configured_providers().is_empty() {
                println!(
                    "\n{}",
                    "No API keys found. See .env.example for the required variables.".dimmed()
                );
            }
        }
    }

    Ok(())
}

/// Call options wired to Ctrl-C.
fn call_options(timeout_secs: Option<u64>) -> CallOptions {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling in-flight requests");
            on_interrupt.cancel();
        }
    });

    let options = CallOptions::default().with_cancel(cancel);
    match timeout_secs {
        Some(secs) => options.with_timeout(Duration::from_secs(secs)),
        None => options,
    }
}

/// A spinner on stderr, hidden when printing JSON.
fn spinner(message: &str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner} {msg}")
            .unwrap(),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
