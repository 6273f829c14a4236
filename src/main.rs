use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};
use tracing::{debug, warn};

use techdigest_classify::{
    build_provider, BatchClassifier, ModelClassifier, Orchestrator, OrchestratorSettings,
};
use techdigest_core::{
    Article, CategoryRegistry, ClassificationStats, DigestConfig, OutputFormat,
};
use techdigest_digest::render;

const DEFAULT_CONFIG_PATH: &str = ".techdigest.toml";

#[derive(Parser)]
#[command(
    name = "techdigest",
    version,
    about = "Categorize tech blog articles into a weekly digest",
    long_about = "Categorize tech blog articles into a weekly digest.\n\n\
                   Articles are sorted into configured categories by a chat model, with a\n\
                   keyword classifier as fallback. Every article ends up in exactly one category.\n\n\
                   Examples:\n  \
                     techdigest init                                Create a .techdigest.toml config file\n  \
                     techdigest classify --articles week.json       Classify and preview the digest\n  \
                     fetch-feeds | techdigest classify --format json  Classify articles piped on stdin\n  \
                     techdigest classify --no-model                 Keyword classification only\n  \
                     techdigest categories                          List and validate categories"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .techdigest.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Plain-text digest preview (default)\n  \
                         json      Machine-readable JSON for a digest publisher\n  \
                         markdown  Markdown digest preview"
    )]
    format: OutputFormat,

    /// Enable verbose (debug) logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Log line format on stderr
    #[arg(long, global = true, default_value = "text")]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Command {
    /// Classify articles and print the grouped digest
    #[command(long_about = "Classify articles and print the grouped digest.\n\n\
        Reads a JSON array of articles (title, url, source, published, summary)\n\
        from --articles or stdin. The model API key is read from the environment\n\
        variable named by llm.api_key_env; without one, keywords are used.\n\n\
        Examples:\n  techdigest classify --articles week.json\n  \
        techdigest classify --no-model --format markdown < week.json")]
    Classify {
        /// Read articles from a JSON file instead of stdin
        #[arg(long)]
        articles: Option<PathBuf>,

        /// Skip the model and classify by keywords only
        #[arg(long)]
        no_model: bool,

        /// Put articles the model could not classify in the catch-all instead of using keywords
        #[arg(long)]
        no_fallback: bool,

        /// Articles per model request (overrides classifier.batch_size)
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
        batch_size: Option<u16>,
    },
    /// List and validate the configured categories
    Categories,
    /// Create a default .techdigest.toml configuration file
    #[command(long_about = "Create a default .techdigest.toml configuration file.\n\n\
        Generates a template with sample categories and all available options.\n\
        Fails if .techdigest.toml already exists.")]
    Init,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    /// Human-readable log lines
    Text,
    /// One JSON object per log line
    Json,
}

const DEFAULT_CONFIG: &str = r#"# techdigest configuration

[classifier]
# use_model = true
# fallback_to_keywords = true
# batch_size = 10
# catch_all = "Other"
# max_retries = 0
# retry_delay_ms = 1000
# summary_chars = 200
# categories_file = "categories.toml"

[llm]
# provider = "openrouter"   # openrouter | github | openai | anthropic
# model = "openai/gpt-4o-mini"
# base_url = "https://openrouter.ai/api/v1"
# api_key_env = "OPENROUTER_API_KEY"
# max_tokens = 500
# temperature = 0.3
# timeout_secs = 60

# Categories in digest order. Articles that fit none of them go to the
# catch-all ("Other" unless classifier.catch_all says otherwise).

[[categories]]
name = "AI & Machine Learning"
description = "Models, training, inference, LLMs, and applied ML"
keywords = ["machine learning", "llm", "transformer", "neural network", "gpt", "inference"]

[[categories]]
name = "Security"
description = "Vulnerabilities, incident write-ups, and defensive engineering"
keywords = ["security", "vulnerability", "cve", "exploit", "encryption", "auth"]

[[categories]]
name = "Infrastructure & Cloud"
description = "Cloud platforms, containers, networking, and reliability"
keywords = ["kubernetes", "cloud", "aws", "docker", "serverless", "observability"]

[[categories]]
name = "Data Engineering"
description = "Databases, pipelines, streaming, and analytics"
keywords = ["database", "sql", "data pipeline", "kafka", "warehouse", "spark"]

[[categories]]
name = "Software Engineering & Systems"
description = "Languages, architecture, performance, and developer tooling"
keywords = ["rust", "compiler", "performance", "architecture", "testing", "api"]
"#;

fn init_tracing(verbose: bool, format: LogFormat) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if verbose {
        "techdigest=debug,techdigest_core=debug,techdigest_classify=debug,techdigest_digest=debug"
    } else {
        "techdigest=info,techdigest_core=info,techdigest_classify=info,techdigest_digest=info"
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
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

fn load_config(path: Option<&Path>) -> Result<DigestConfig> {
    let config = match path {
        Some(path) => DigestConfig::from_file(path)?,
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                DigestConfig::from_file(default_path)?
            } else {
                debug!("no {DEFAULT_CONFIG_PATH} found, using defaults");
                DigestConfig::default()
            }
        }
    };
    Ok(config)
}

fn read_articles(file: Option<&Path>) -> Result<Vec<Article>> {
    let input = match file {
        Some(path) => {
            if !path.exists() {
                return Err(techdigest_core::DigestError::FileNotFound(path.to_path_buf()).into());
            }
            std::fs::read_to_string(path).into_diagnostic()?
        }
        None => {
            if std::io::stdin().is_terminal() {
                miette::bail!(
                    "No articles given. Pass --articles <FILE> or pipe a JSON array on stdin."
                );
            }
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .into_diagnostic()?;
            buf
        }
    };
    Ok(Article::list_from_json(&input)?)
}

/// Build the model classifier, or `None` when no API key is available.
fn model_classifier(config: &DigestConfig) -> Result<Option<Box<dyn BatchClassifier>>> {
    let Some(api_key) = config.llm.resolve_api_key(|var| std::env::var(var).ok()) else {
        warn!(
            env = config.llm.api_key_env(),
            provider = %config.llm.provider,
            "no API key found, classifying with keywords only"
        );
        return Ok(None);
    };
    let provider = build_provider(&config.llm, api_key)?;
    Ok(Some(Box::new(ModelClassifier::new(
        provider,
        config.classifier.summary_chars,
    ))))
}

fn spinner(message: &str) -> Option<indicatif::ProgressBar> {
    if !std::io::stderr().is_terminal() {
        return None;
    }
    let pb = indicatif::ProgressBar::new_spinner();
    if let Ok(style) = indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
    {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    Some(pb)
}

async fn run_classify(
    mut config: DigestConfig,
    format: OutputFormat,
    articles_file: Option<&Path>,
    no_model: bool,
    no_fallback: bool,
    batch_size: Option<u16>,
) -> Result<()> {
    if no_model {
        config.classifier.use_model = false;
    }
    if no_fallback {
        config.classifier.fallback_to_keywords = false;
    }
    if let Some(size) = batch_size {
        config.classifier.batch_size = usize::from(size);
    }

    let registry = CategoryRegistry::from_config(&config)?;
    let articles = read_articles(articles_file)?;
    debug!(
        articles = articles.len(),
        categories = registry.len(),
        "loaded input"
    );

    let use_model = config.classifier.use_model;
    let model = if use_model {
        model_classifier(&config)?
    } else {
        None
    };
    let querying = model.is_some() && !articles.is_empty();
    let orchestrator = Orchestrator::new(model, OrchestratorSettings::from(&config.classifier));

    let progress = if querying {
        spinner(&format!(
            "Classifying {} articles with {}...",
            articles.len(),
            config.llm.model
        ))
    } else {
        None
    };

    let results = orchestrator
        .classify_all(&articles, &registry, use_model)
        .await;

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let groups = techdigest_digest::group(&results, &registry);
    let week_of = render::week_start(Utc::now().date_naive());

    match format {
        OutputFormat::Json => println!("{}", render::to_json(&groups)?),
        OutputFormat::Markdown => print!("{}", render::to_markdown(&groups, week_of)),
        OutputFormat::Text => print!("{}", render::to_text(&groups, week_of)),
    }

    eprintln!("Classified {}", ClassificationStats::from_results(&results));
    Ok(())
}

fn run_categories(config: &DigestConfig, format: OutputFormat) -> Result<()> {
    let registry = CategoryRegistry::from_config(config)?;

    match format {
        OutputFormat::Json => {
            let categories: Vec<_> = registry.all().collect();
            let output = serde_json::json!({
                "catchAll": registry.catch_all(),
                "categories": categories,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&output).into_diagnostic()?
            );
        }
        OutputFormat::Markdown => {
            println!("| # | Category | Description | Keywords |");
            println!("|---|----------|-------------|----------|");
            for (i, c) in registry.all().enumerate() {
                let name = if registry.is_catch_all(&c.name) {
                    format!("{} (catch-all)", c.name)
                } else {
                    c.name.clone()
                };
                println!(
                    "| {} | {} | {} | {} |",
                    i + 1,
                    name,
                    c.description.trim(),
                    c.keywords.join(", ")
                );
            }
        }
        OutputFormat::Text => {
            println!(
                "{} categories plus catch-all \"{}\"\n",
                registry.len(),
                registry.catch_all()
            );
            for (i, c) in registry.all().enumerate() {
                let marker = if registry.is_catch_all(&c.name) {
                    " [catch-all]"
                } else {
                    ""
                };
                println!("{:>2}. {}{marker}", i + 1, c.name);
                if !c.description.trim().is_empty() {
                    println!("    {}", c.description.trim());
                }
                if !c.keywords.is_empty() {
                    println!("    keywords: {}", c.keywords.join(", "));
                }
            }
        }
    }
    Ok(())
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!("techdigest v{version}: weekly tech blog digest categorizer\n");
    println!("Quick start:");
    println!("  techdigest init                            Create a .techdigest.toml config file");
    println!("  techdigest categories                      Check your category list");
    println!("  techdigest classify --articles week.json   Classify and preview the digest\n");
    println!("Run 'techdigest --help' for all options.");
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    match cli.command {
        None => print_welcome(),
        Some(Command::Classify {
            ref articles,
            no_model,
            no_fallback,
            batch_size,
        }) => {
            let config = load_config(cli.config.as_deref())?;
            run_classify(
                config,
                cli.format,
                articles.as_deref(),
                no_model,
                no_fallback,
                batch_size,
            )
            .await?;
        }
        Some(Command::Categories) => {
            let config = load_config(cli.config.as_deref())?;
            run_categories(&config, cli.format)?;
        }
        Some(Command::Init) => {
            let path = Path::new(DEFAULT_CONFIG_PATH);
            if path.exists() {
                miette::bail!("{DEFAULT_CONFIG_PATH} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {DEFAULT_CONFIG_PATH} with default configuration");
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "techdigest", &mut std::io::stdout());
        }
    }

    Ok(())
}
