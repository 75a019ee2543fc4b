use anyhow::{bail, Context, Result};
use cartlens::config::{DEFAULT_BASE_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE};
use cartlens::{
    build_prompt, normalize_reply, Cart, ExtractionConfig, ExtractionMode,
    Extractor, HttpSnapshot, JsonFileStore, MarkupSnapshot, ModelConfig, OpenRouterInvoker,
    PageSnapshot, Pipeline, SaveOutcome, SelectorProfile, SnapshotProvider,
};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "cartlens",
    version,
    about = "Excerpt product pages, ask a model for the product record, keep a cart"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the excerpt built from a page
    Extract {
        #[command(flatten)]
        page: PageArgs,
        #[command(flatten)]
        extraction: ExtractionArgs,
        /// Print the excerpt (fragments, rendered text, truncation) as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print the prompt that would be sent to the model
    Prompt {
        #[command(flatten)]
        page: PageArgs,
        #[command(flatten)]
        extraction: ExtractionArgs,
    },
    /// Print display hints scraped from a page
    Hints {
        #[command(flatten)]
        page: PageArgs,
    },
    /// Normalize a saved model reply into a product record
    Normalize {
        /// Reply text file, or '-' for stdin
        #[arg(long, default_value = "-")]
        reply: PathBuf,
    },
    /// Run the full pipeline against the model
    Process {
        #[command(flatten)]
        page: PageArgs,
        #[command(flatten)]
        extraction: ExtractionArgs,
        #[command(flatten)]
        model: ModelArgs,
        /// Save the page and its record to the cart
        #[arg(long, default_value_t = false)]
        save: bool,
        /// Cart store file
        #[arg(long, env = "CARTLENS_STORE", default_value = "cartlens-cart.json")]
        store: PathBuf,
    },
    /// Inspect or edit the cart
    Cart {
        /// Cart store file
        #[arg(long, env = "CARTLENS_STORE", default_value = "cartlens-cart.json")]
        store: PathBuf,
        #[command(subcommand)]
        action: CartAction,
    },
}

#[derive(Subcommand, Debug)]
enum CartAction {
    /// List entries, newest first
    List,
    /// Delete one entry by id
    Delete {
        /// Entry id
        id: String,
    },
    /// Remove every entry
    Clear,
}

#[derive(Args, Debug)]
struct PageArgs {
    /// HTML file to read, or '-' for stdin
    #[arg(long, conflicts_with = "url", required_unless_present = "url")]
    input: Option<PathBuf>,

    /// Page URL to fetch
    #[arg(long)]
    url: Option<String>,

    /// URL recorded for --input pages (defaults to a file:// URL)
    #[arg(long, requires = "input")]
    page_url: Option<String>,

    /// Page title (defaults to the document <title>)
    #[arg(long)]
    title: Option<String>,

    /// Fetch timeout in seconds
    #[arg(long, default_value_t = 30)]
    fetch_timeout_secs: u64,
}

#[derive(Args, Debug)]
struct ExtractionArgs {
    /// Extraction strategy
    #[arg(long, value_enum, default_value_t = ExtractionMode::Structural)]
    mode: ExtractionMode,

    /// Byte ceiling for structural excerpts
    #[arg(long)]
    max_bytes: Option<usize>,

    /// JSON selector profile replacing the built-in one
    #[arg(long, env = "CARTLENS_PROFILE")]
    profile: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ModelArgs {
    /// OpenRouter API key
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model id
    #[arg(long, env = "CARTLENS_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// API root
    #[arg(long, env = "CARTLENS_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Sampling temperature
    #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
    temperature: f32,

    /// Completion token ceiling
    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    max_tokens: usize,

    /// Model request timeout in seconds
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Extract {
            page,
            extraction,
            json,
        } => {
            let snapshot = page.snapshot()?;
            let excerpt = Extractor::new(extraction.config()?)?.extract(&snapshot);
            if json {
                println!("{}", serde_json::to_string_pretty(&excerpt)?);
            } else {
                println!("{excerpt}");
            }
        }
        Command::Prompt { page, extraction } => {
            let snapshot = page.snapshot()?;
            let excerpt = Extractor::new(extraction.config()?)?.extract(&snapshot);
            println!("{}", build_prompt(&snapshot, &excerpt));
        }
        Command::Hints { page } => {
            let snapshot = page.snapshot()?;
            println!("{}", serde_json::to_string_pretty(snapshot.hints())?);
        }
        Command::Normalize { reply } => {
            let text = read_input(&reply)?;
            let record = normalize_reply(&text).context("failed to normalize reply")?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::Process {
            page,
            extraction,
            model,
            save,
            store,
        } => {
            let snapshot = page.snapshot()?;
            let pipeline = Pipeline::new(extraction.config()?, OpenRouterInvoker::new())?;
            let config = model.config();
            let record = pipeline.process(&snapshot, &config).map_err(|err| {
                let stage = err.stage();
                anyhow::Error::new(err).context(format!("processing failed at the {stage} stage"))
            })?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            if save {
                let mut cart = Cart::new(JsonFileStore::new(store));
                match cart.save(&snapshot, Some(record))? {
                    SaveOutcome::Inserted(entry) => info!(id = %entry.id, "saved to cart"),
                    SaveOutcome::Updated(entry) => info!(id = %entry.id, "updated cart entry"),
                }
            }
        }
        Command::Cart { store, action } => {
            let mut cart = Cart::new(JsonFileStore::new(store));
            match action {
                CartAction::List => {
                    println!("{}", serde_json::to_string_pretty(&cart.list()?)?);
                }
                CartAction::Delete { id } => {
                    if !cart.delete(&id)? {
                        bail!("no cart entry with id '{id}'");
                    }
                }
                CartAction::Clear => cart.clear()?,
            }
        }
    }
    Ok(())
}

impl PageArgs {
    fn snapshot(&self) -> Result<PageSnapshot> {
        if let Some(url) = &self.url {
            let provider = HttpSnapshot::new(
                url,
                self.title.clone(),
                Duration::from_secs(self.fetch_timeout_secs),
            )?;
            return provider
                .snapshot()
                .with_context(|| format!("failed to capture {url}"));
        }
        let Some(path) = &self.input else {
            bail!("either --input or --url is required");
        };
        let markup = read_input(path)?;
        let page_url = self.page_url.clone().unwrap_or_else(|| {
            if path.as_os_str() == "-" {
                "stdin:".to_string()
            } else {
                let absolute = fs::canonicalize(path).unwrap_or_else(|_| path.clone());
                format!("file://{}", absolute.display())
            }
        });
        Ok(MarkupSnapshot::new(page_url, self.title.clone(), markup).snapshot()?)
    }
}

impl ExtractionArgs {
    fn config(&self) -> Result<ExtractionConfig> {
        let mut config = ExtractionConfig {
            mode: self.mode,
            ..ExtractionConfig::default()
        };
        if let Some(max_bytes) = self.max_bytes {
            config.max_excerpt_bytes = max_bytes;
        }
        if let Some(path) = &self.profile {
            config.profile = SelectorProfile::from_path(path)?;
        }
        Ok(config)
    }
}

impl ModelArgs {
    fn config(&self) -> ModelConfig {
        ModelConfig {
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            base_url: self.base_url.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            timeout: Duration::from_secs(self.timeout_secs),
            ..ModelConfig::default()
        }
    }
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
