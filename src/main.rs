//! # DocChat CLI (`docchat`)
//!
//! ## Usage
//!
//! ```bash
//! docchat --config ./config/docchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat build` | Scan the upload directory and publish a new index |
//! | `docchat ask "<question>"` | Answer from the index, with citations |
//! | `docchat locate <source> <chunk>` | Print the text of a cited chunk |
//! | `docchat view <source> <chunk>` | Render a source as HTML with the chunk highlighted |
//! | `docchat export` | Write the latest answer to `summary.docx` |
//! | `docchat status` | Show the live index and which sources changed since |
//!
//! Logs go to stderr; set `RUST_LOG` (e.g. `RUST_LOG=docchat=debug`) to
//! change verbosity.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use docchat::config::{self, Config};
use docchat::embedding::create_embedder;
use docchat::generation::create_generator;
use docchat::index_store::IndexStore;
use docchat::{export, pipeline};
use docchat_core::retrieve::DEFAULT_TOP_K;
use tracing_subscriber::EnvFilter;

/// DocChat: question answering over office documents with citations.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docchat.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docchat",
    about = "DocChat: question answering over office documents with citations",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a new index from the upload directory.
    ///
    /// The previous index stays live until the new one is fully written.
    Build,

    /// Answer a question from the indexed documents.
    Ask {
        question: String,

        /// Number of chunks to retrieve.
        #[arg(short, long, default_value_t = DEFAULT_TOP_K)]
        k: usize,

        /// Print the answer and citations as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the text of chunk `<chunk>` of `<source>`.
    Locate {
        source: String,
        chunk: usize,
        #[arg(long)]
        json: bool,
    },

    /// Render `<source>` as HTML with chunk `<chunk>` highlighted.
    View {
        source: String,
        chunk: usize,
        /// Write the page here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Export the latest answer as a Word document.
    Export {
        /// Output path (default `<index_dir>/summary.docx`).
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Show the live index and compare it with the upload directory.
    Status {
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docchat=info,docchat_core=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Build => run_build(&cfg).await?,
        Commands::Ask { question, k, json } => run_ask(&cfg, &question, k, json).await?,
        Commands::Locate {
            source,
            chunk,
            json,
        } => {
            let located = pipeline::locate_chunk(&cfg, &source, chunk)?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "source_id": located.chunk.source_id,
                        "ordinal": located.chunk.ordinal,
                        "text": located.chunk.text,
                    }))?
                );
            } else {
                println!("{}", located.chunk.text);
            }
        }
        Commands::View { source, chunk, out } => {
            let page = pipeline::view_chunk(&cfg, &source, chunk)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, page)?;
                    println!("ok: wrote {}", path.display());
                }
                None => print!("{}", page),
            }
        }
        Commands::Export { out } => {
            let path = export::export_summary(&cfg.paths.index_dir, out.as_deref())?;
            println!("ok: wrote {}", path.display());
        }
        Commands::Status { json } => run_status(&cfg, json)?,
    }

    Ok(())
}

async fn run_build(cfg: &Config) -> Result<()> {
    let embedder = create_embedder(&cfg.embedding)?;
    let summary = pipeline::build_index(cfg, embedder.as_ref()).await?;
    for skipped in &summary.skipped {
        println!("skipped {}: {}", skipped.source_id, skipped.reason);
    }
    let report = &summary.report;
    println!(
        "ok: indexed {} chunks from {} sources ({}, {} dims) as {}",
        report.chunks, report.sources, report.model, report.dims, report.version
    );
    Ok(())
}

async fn run_ask(cfg: &Config, question: &str, k: usize, json: bool) -> Result<()> {
    // Fail fast with "index not built" before touching any provider.
    IndexStore::new(&cfg.paths.index_dir).manifest()?;

    let embedder = create_embedder(&cfg.embedding)?;
    let generator = create_generator(&cfg.generation)?;
    let answer = pipeline::answer_question(cfg, embedder, generator, question, k).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
        return Ok(());
    }
    println!("{}\n", answer.answer);
    if !answer.citations.is_empty() {
        println!("Sources:");
        for (i, c) in answer.citations.iter().enumerate() {
            println!(
                "  [{}] {} #{}: {}",
                i + 1,
                c.source_id,
                c.ordinal,
                c.preview.replace('\n', " ")
            );
        }
    }
    Ok(())
}

fn run_status(cfg: &Config, json: bool) -> Result<()> {
    let status = pipeline::index_status(cfg)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }
    println!("version:   {}", status.version);
    println!("built:     {}", status.created_at.to_rfc3339());
    println!("model:     {} ({} dims)", status.model, status.dims);
    println!("chunking:  size {} overlap {}", status.chunk_size, status.overlap);
    println!("entries:   {}", status.entries);
    for s in &status.sources {
        println!("  {:<8} {} ({} chunks)", s.state.as_str(), s.source_id, s.chunks);
    }
    if status.is_stale() {
        println!("index is stale; run `docchat build` to refresh");
    }
    Ok(())
}
