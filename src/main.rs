use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ollama_reasoning::{
    config::{Config, LogFormat},
    engine::{ReasoningEngine, ReasoningSession, SessionLimits},
    error::SynthesisError,
    ollama::OllamaClient,
    sink::{FileSink, ProgressSink, StdoutSink, TeeSink},
};

/// Bounded iterative reasoning over an Ollama endpoint
#[derive(Debug, Parser)]
#[command(name = "ollama-reasoning", version, about)]
struct Cli {
    /// Problem statement to reason about
    query: String,

    /// Model identifier (overrides REASONING_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// Maximum committed reasoning steps
    #[arg(long)]
    max_depth: Option<u32>,

    /// Candidate continuations per step
    #[arg(long)]
    max_width: Option<u32>,

    /// Token budget per generation
    #[arg(long)]
    n_tokens: Option<u32>,

    /// Mirror streamed output into this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Synthesize an article from the finished transcript
    #[arg(long)]
    article: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // CLI flags override the environment
    if let Some(model) = cli.model {
        config.generation.model = model;
    }
    if let Some(max_depth) = cli.max_depth {
        config.engine.max_depth = max_depth;
    }
    if let Some(max_width) = cli.max_width {
        config.engine.max_width = max_width;
    }
    if let Some(n_tokens) = cli.n_tokens {
        config.generation.num_predict = n_tokens;
    }

    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        model = %config.generation.model,
        max_depth = config.engine.max_depth,
        max_width = config.engine.max_width,
        "Reasoning engine starting"
    );

    let client = match OllamaClient::new(&config.ollama, config.request.clone()) {
        Ok(c) => {
            info!(host = %config.ollama.host, "Ollama client initialized");
            Arc::new(c)
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize Ollama client");
            return Err(e.into());
        }
    };

    let mut tee = TeeSink::new().with(StdoutSink);
    if let Some(dir) = &cli.log_dir {
        info!(dir = %dir.display(), "Mirroring output to log directory");
        tee = tee.with(FileSink::new(dir));
    }
    let sink: Arc<dyn ProgressSink> = Arc::new(tee);

    let engine = ReasoningEngine::from_config(client, sink, &config);
    let mut session = ReasoningSession::new(cli.query, SessionLimits::from(&config.engine));

    let status = engine.run(&mut session).await?;
    println!();
    info!(
        session_id = %session.id(),
        depth = session.depth(),
        status = %status,
        "Reasoning finished"
    );

    if cli.article {
        match engine.synthesize(&session).await {
            Ok(document) => {
                println!();
                info!(document_len = document.len(), "Article synthesis finished");
            }
            Err(SynthesisError::Runaway { rounds, partial }) => {
                println!();
                warn!(
                    rounds,
                    partial_len = partial.len(),
                    "Article synthesis hit its continuation bound; keeping partial document"
                );
            }
            Err(e) => {
                error!(error = %e, "Article synthesis failed");
                return Err(e.into());
            }
        }
    }

    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
