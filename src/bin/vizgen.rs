//! vizgen: turn text into SVG or HTML visualizations from the command line.

use std::fs;
use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use vizgen::cache::FileBackend;
use vizgen::config::{Config, Secrets};
use vizgen::{
    CacheStore, KnownModel, NewHistoryItem, OpenRouterClient, OutputFormat, PerformanceRecorder,
    Storage, VisualizationRequest,
};

/// vizgen CLI
#[derive(Parser)]
#[command(name = "vizgen")]
#[command(version = vizgen::PKG_VERSION)]
#[command(about = "Generate SVG/HTML visualizations from text with LLMs")]
struct Args {
    /// Config file (default: ~/.vizgen/config.toml, then /etc/vizgen/config.toml)
    #[arg(short, long, env = "VIZGEN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a visualization
    Generate {
        /// Text to visualize (or omit to read from stdin)
        text: Option<String>,
        /// Prompt template key
        #[arg(short, long)]
        template: Option<String>,
        /// Model id
        #[arg(short, long)]
        model: Option<String>,
        /// Output format: svg or html
        #[arg(short, long)]
        format: Option<OutputFormat>,
        /// Write the code to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Cut over-long input instead of asking
        #[arg(long)]
        truncate: bool,
        /// Do not record this generation in the history
        #[arg(long)]
        no_history: bool,
    },

    /// List supported models
    Models,

    /// List prompt templates
    Templates,

    /// Show request performance and cache statistics
    Stats,

    /// Browse the generation history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Manage the result cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Check that the API key is accepted
    Check,
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List past generations, newest first
    List,
    /// Print the code of one generation
    Show { id: u64 },
    /// Delete one generation
    Delete { id: u64 },
    /// Delete every generation
    Clear,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Remove every cache entry, including performance history
    Clear,
    /// Remove expired entries
    Sweep,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    match args.command {
        Command::Generate {
            text,
            template,
            model,
            format,
            output,
            truncate,
            no_history,
        } => {
            let text = resolve_text(text, "generate")?;
            let template = template.unwrap_or_else(|| config.defaults.template.clone());
            let model = model.unwrap_or_else(|| config.defaults.model.clone());
            let format = format.unwrap_or(config.defaults.format);

            let library = config.template_library()?;
            if library.get(&template).is_none() {
                eprintln!("unknown template '{template}', using data-analysis");
            }
            let prompt = library.render(&template, &text);

            let mut request = VisualizationRequest::new(prompt, &model, format);
            let max = config.limits.max_input_chars;
            if request.prompt_chars() > max {
                if !truncate && !confirm(&format!(
                    "input is {} characters, at most {max} are supported. Truncate?",
                    request.prompt_chars()
                ))? {
                    return Err(vizgen::VizgenError::InputTooLong {
                        len: request.prompt_chars(),
                        max,
                    }
                    .into());
                }
                request = request.truncated(max);
            }

            let api_key = Secrets::load()?.require_api_key()?;
            let visualizer = config.visualizer_builder(api_key).build()?;
            let result = visualizer.generate(&request).await;
            visualizer.shutdown();
            let code = result?;

            match &output {
                Some(path) => {
                    fs::write(path, &code)?;
                    eprintln!("saved {} ({} bytes)", path.display(), code.len());
                }
                None => println!("{code}"),
            }

            if !no_history {
                config.history_store().add(NewHistoryItem {
                    text: &text,
                    template: &template,
                    model: &model,
                    format,
                    result: &code,
                })?;
            }
        }

        Command::Models => {
            for model in KnownModel::ALL {
                println!(
                    "{:<32} {:<18} {}",
                    model.id(),
                    model.display_name(),
                    model.description()
                );
            }
            println!("\nany other OpenRouter model id is accepted with default settings");
        }

        Command::Templates => {
            let library = config.template_library()?;
            for (key, template) in library.iter() {
                println!("{key:<16} {:<22} {}", template.name, template.description);
            }
        }

        Command::Stats => {
            let cache = Arc::new(CacheStore::new(&config.cache_config())?);
            let recorder = PerformanceRecorder::with_store(Arc::clone(&cache));
            println!("{}", recorder.stats());
            let results = cached_result_count(&config)?;
            println!("cached results: {results}");
        }

        Command::History { action } => {
            let history = config.history_store();
            match action {
                HistoryAction::List => {
                    let items = history.list()?;
                    if items.is_empty() {
                        println!("no history");
                    }
                    for item in items {
                        println!(
                            "{}  {:<4} {:<32} {}",
                            item.id,
                            item.format.as_str(),
                            item.model,
                            item.title
                        );
                    }
                }
                HistoryAction::Show { id } => {
                    println!("{}", history.get(id)?.result);
                }
                HistoryAction::Delete { id } => {
                    history.delete(id)?;
                    println!("deleted {id}");
                }
                HistoryAction::Clear => {
                    history.clear()?;
                    println!("history cleared");
                }
            }
        }

        Command::Cache { action } => {
            let cache = CacheStore::new(&config.cache_config())?;
            match action {
                CacheAction::Clear => {
                    cache.clear(Storage::All);
                    println!("cache cleared");
                }
                CacheAction::Sweep => {
                    let removed = cache.sweep_expired();
                    println!("removed {removed} expired entries");
                }
            }
        }

        Command::Check => {
            let api_key = Secrets::load()?.require_api_key()?;
            let client = OpenRouterClient::with_base_url(api_key, &config.api.base_url)?
                .app_url(&config.api.app_url)
                .app_title(&config.api.app_title);
            client.check_connection().await?;
            println!("connection ok ({})", client.base_url());
        }
    }

    Ok(())
}

/// Resolve text input from an optional CLI argument and/or stdin.
///
/// - arg only → arg
/// - stdin only → stdin
/// - both → `"{arg}\n\n{stdin}"`
/// - neither → error
fn resolve_text(arg: Option<String>, command: &str) -> Result<String, Box<dyn std::error::Error>> {
    let stdin_is_pipe = !io::stdin().is_terminal();
    let stdin_text = if stdin_is_pipe {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        let trimmed = buf.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    } else {
        None
    };

    match (arg, stdin_text) {
        (Some(a), Some(s)) => Ok(format!("{a}\n\n{s}")),
        (Some(a), None) => Ok(a),
        (None, Some(s)) => Ok(s),
        (None, None) => {
            Err(format!("{command}: no input provided (pass text as argument or via stdin)").into())
        }
    }
}

/// Ask a yes/no question on the terminal. Without a terminal the answer is no.
fn confirm(question: &str) -> io::Result<bool> {
    if !io::stdin().is_terminal() {
        eprintln!("{question} (pass --truncate to cut the input)");
        return Ok(false);
    }
    eprint!("{question} [y/N] ");
    io::stderr().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

/// Number of visualization results in the persistent cache.
fn cached_result_count(config: &Config) -> vizgen::Result<usize> {
    use vizgen::cache::CacheBackend;
    use vizgen::cache::fingerprint::RESULT_KEY_PREFIX;
    use vizgen::monitor::PERFORMANCE_KEY;

    let dir = config
        .cache_config()
        .persistent_dir
        .unwrap_or_else(FileBackend::default_dir);
    Ok(FileBackend::open(dir)?
        .keys()?
        .iter()
        .filter(|key| key.starts_with(RESULT_KEY_PREFIX) && key.as_str() != PERFORMANCE_KEY)
        .count())
}
