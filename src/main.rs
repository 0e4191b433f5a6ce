use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use docs_rag::chunking::CharacterTextSplitter;
use docs_rag::config::{Config, init_config, render_config, resolve_config_dir};
use docs_rag::embeddings::{ProviderKind, create_provider};
use docs_rag::loader::DocumentLoader;
use docs_rag::pipeline::{IngestResult, RetrievalPipeline};
use docs_rag::{RagError, Result};

const CHUNK_PREVIEW_SEPARATOR: &str = "--------";

#[derive(Parser)]
#[command(name = "docs-rag")]
#[command(about = "Chunk documents, embed them, and retrieve grounding context for a query")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml (defaults to $DOCS_RAG_CONFIG_DIR, then the platform config dir)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file, update settings, or show the effective configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
        #[command(flatten)]
        overrides: ConfigOverrides,
    },
    /// Load a file or directory and show how it is chunked
    Chunk {
        /// File or directory to load
        path: PathBuf,
        /// Override the configured chunk size
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Override the configured chunk overlap
        #[arg(long)]
        chunk_overlap: Option<usize>,
    },
    /// Ingest sources into a fresh store and retrieve the chunks closest to a query
    Query {
        /// Files or directories to ingest
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Query text
        #[arg(long, short)]
        query: String,
        /// Number of chunks to retrieve (defaults to the configured top_k)
        #[arg(short)]
        k: Option<usize>,
        /// Print similarity scores next to each chunk
        #[arg(long, conflicts_with = "context")]
        scores: bool,
        /// Print the joined grounding context instead of individual chunks
        #[arg(long)]
        context: bool,
    },
    /// Ingest sources and show what the store holds
    Status {
        /// Files or directories to ingest
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

/// Settings written to config.toml by `config`
#[derive(Args, Debug, Default)]
struct ConfigOverrides {
    /// Embedding provider
    #[arg(long, value_enum)]
    provider: Option<ProviderArg>,
    /// Embedding server base URL
    #[arg(long)]
    base_url: Option<String>,
    /// Embedding model name
    #[arg(long)]
    model: Option<String>,
    /// Texts sent per embedding request
    #[arg(long)]
    batch_size: Option<u32>,
    /// Embedding calls in flight during ingest
    #[arg(long)]
    max_in_flight: Option<usize>,
    /// Chunks retrieved per query
    #[arg(long)]
    top_k: Option<usize>,
    #[arg(long)]
    chunk_size: Option<usize>,
    #[arg(long)]
    chunk_overlap: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ProviderArg {
    Openai,
    Ollama,
}

impl From<ProviderArg> for ProviderKind {
    fn from(provider: ProviderArg) -> Self {
        match provider {
            ProviderArg::Openai => Self::OpenAi,
            ProviderArg::Ollama => Self::Ollama,
        }
    }
}

impl ConfigOverrides {
    fn is_empty(&self) -> bool {
        self.provider.is_none()
            && self.base_url.is_none()
            && self.model.is_none()
            && self.batch_size.is_none()
            && self.max_in_flight.is_none()
            && self.top_k.is_none()
            && self.chunk_size.is_none()
            && self.chunk_overlap.is_none()
    }

    /// Validate and apply every given setting to `config`
    fn apply(self, config: &mut Config) -> Result<()> {
        if let Some(provider) = self.provider {
            config.set_provider(provider.into());
        }
        if let Some(url) = &self.base_url {
            config.set_base_url(url)?;
        }
        if let Some(model) = self.model {
            config.set_model(model)?;
        }
        if let Some(batch_size) = self.batch_size {
            config.set_batch_size(batch_size)?;
        }
        if let Some(max_in_flight) = self.max_in_flight {
            config.set_max_in_flight(max_in_flight)?;
        }
        if let Some(top_k) = self.top_k {
            config.set_top_k(top_k)?;
        }
        if self.chunk_size.is_some() || self.chunk_overlap.is_some() {
            config.set_chunking(
                self.chunk_size.unwrap_or(config.chunking.chunk_size),
                self.chunk_overlap.unwrap_or(config.chunking.chunk_overlap),
            )?;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config_dir = resolve_config_dir(cli.config_dir.as_deref())?;

    match cli.command {
        Commands::Config { show, overrides } => {
            if !overrides.is_empty() {
                let mut config = Config::load(&config_dir)?;
                overrides.apply(&mut config)?;
                config.save()?;
                println!("Updated configuration at {}", config.config_file_path().display());
                if show {
                    println!("{}", render_config(&config));
                }
            } else if show {
                let config = Config::load(&config_dir)?;
                println!("{}", render_config(&config));
            } else {
                let (path, created) = init_config(&config_dir)?;
                if created {
                    println!("Wrote default configuration to {}", path.display());
                } else {
                    println!("Configuration already exists at {}", path.display());
                }
            }
        }
        Commands::Chunk {
            path,
            chunk_size,
            chunk_overlap,
        } => {
            let config = Config::load(&config_dir)?;
            show_chunks(&config, &path, chunk_size, chunk_overlap)?;
        }
        Commands::Query {
            paths,
            query,
            k,
            scores,
            context,
        } => {
            let config = Config::load(&config_dir)?;
            let pipeline = ingest(&config, &paths).await?;
            let k = k.unwrap_or_else(|| pipeline.top_k());

            if context {
                match pipeline.build_context(&query, k).await? {
                    Some(context) => println!("{}", context),
                    None => println!("No matching chunks"),
                }
            } else if scores {
                for hit in pipeline.retrieve_scored(&query, k).await? {
                    println!("[{:.4}] {}", hit.score, hit.key);
                    println!("{}", CHUNK_PREVIEW_SEPARATOR);
                }
            } else {
                for chunk in pipeline.retrieve(&query, k).await? {
                    println!("{}", chunk);
                    println!("{}", CHUNK_PREVIEW_SEPARATOR);
                }
            }
        }
        Commands::Status { paths } => {
            let config = Config::load(&config_dir)?;
            let pipeline = ingest(&config, &paths).await?;
            let status = pipeline.status().await;

            println!("Document loaded: {}", status.document_loaded);
            println!("Chunks: {}", status.chunks_count);
            match status.dimension {
                Some(dimension) => println!("Dimension: {}", dimension),
                None => println!("Dimension: -"),
            }
        }
    }

    Ok(())
}

fn show_chunks(
    config: &Config,
    path: &Path,
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
) -> Result<()> {
    let splitter = CharacterTextSplitter::new(
        chunk_size.unwrap_or(config.chunking.chunk_size),
        chunk_overlap.unwrap_or(config.chunking.chunk_overlap),
    )?;
    let documents = DocumentLoader::from_config(&config.loader).load(path)?;
    let chunks = splitter.split_documents(&documents);

    println!("Documents: {}", documents.len());
    println!("Chunks: {}", chunks.len());

    for chunk in preview(&chunks) {
        println!("{}", CHUNK_PREVIEW_SEPARATOR);
        println!("{}", chunk.text);
    }
    Ok(())
}

/// First two and last two items, without repeats when there are fewer than five
fn preview<T>(items: &[T]) -> impl Iterator<Item = &T> {
    let head = items.len().min(2);
    let tail_start = items.len().saturating_sub(2).max(head);
    items[..head].iter().chain(items[tail_start..].iter())
}

async fn ingest(config: &Config, paths: &[PathBuf]) -> Result<RetrievalPipeline> {
    let provider = create_provider(&config.embeddings)?;
    let pipeline = RetrievalPipeline::new(config, provider)?;
    let result = pipeline.ingest(paths).await?;
    report_ingest(&result)?;
    Ok(pipeline)
}

fn report_ingest(result: &IngestResult) -> Result<()> {
    eprintln!(
        "Ingested {} documents into {} chunks ({} stored)",
        result.documents_loaded, result.chunks_created, result.chunks_inserted
    );
    for (path, error) in &result.source_failures {
        eprintln!("  {} skipped: {}", path.display(), error);
    }
    for failure in &result.failed {
        eprintln!("  chunk {} failed: {}", failure.index, failure.error);
    }

    if result.chunks_created > 0 && result.chunks_inserted == 0 {
        return Err(RagError::Provider(
            "no chunk could be embedded".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn config_command() {
        let cli = Cli::try_parse_from(["docs-rag", "config", "--show"]).expect("should parse");
        let Commands::Config { show, overrides } = cli.command else {
            panic!("expected config command");
        };
        assert!(show);
        assert!(overrides.is_empty());
        assert!(cli.config_dir.is_none());
    }

    #[test]
    fn config_flags_update_settings() {
        let cli = Cli::try_parse_from([
            "docs-rag",
            "config",
            "--provider",
            "ollama",
            "--base-url",
            "http://gpu-box:11434",
            "--model",
            "mxbai-embed-large",
            "--batch-size",
            "16",
            "--max-in-flight",
            "4",
            "--top-k",
            "7",
            "--chunk-overlap",
            "100",
        ])
        .expect("should parse");
        let Commands::Config { overrides, .. } = cli.command else {
            panic!("expected config command");
        };
        assert!(!overrides.is_empty());

        let mut config = Config::default();
        overrides.apply(&mut config).expect("valid settings");
        assert_eq!(config.embeddings.provider, ProviderKind::Ollama);
        assert_eq!(
            config.embeddings.base_url.as_ref().map(|url| url.host_str()),
            Some(Some("gpu-box"))
        );
        assert_eq!(config.embeddings.model.as_deref(), Some("mxbai-embed-large"));
        assert_eq!(config.embeddings.batch_size, 16);
        assert_eq!(config.embeddings.max_in_flight, 4);
        assert_eq!(config.retrieval.top_k, 7);
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 100);
    }

    #[test]
    fn config_flags_are_validated() {
        let overrides = ConfigOverrides {
            chunk_size: Some(50),
            chunk_overlap: Some(50),
            ..ConfigOverrides::default()
        };
        let mut config = Config::default();
        let result = overrides.apply(&mut config);
        assert!(matches!(result, Err(RagError::InvalidConfiguration(_))));

        let overrides = ConfigOverrides {
            base_url: Some("ftp://example.com".to_string()),
            ..ConfigOverrides::default()
        };
        assert!(overrides.apply(&mut config).is_err());

        let unknown_provider =
            Cli::try_parse_from(["docs-rag", "config", "--provider", "cohere"]);
        let Err(error) = unknown_provider else {
            panic!("unknown provider should fail");
        };
        assert_eq!(error.kind(), ErrorKind::InvalidValue);
    }

    #[test]
    fn global_config_dir() {
        let cli = Cli::try_parse_from(["docs-rag", "config", "--config-dir", "/tmp/rag"])
            .expect("should parse");
        assert_eq!(cli.config_dir, Some(PathBuf::from("/tmp/rag")));
    }

    #[test]
    fn chunk_command_with_overrides() {
        let cli = Cli::try_parse_from([
            "docs-rag",
            "chunk",
            "notes.txt",
            "--chunk-size",
            "500",
            "--chunk-overlap",
            "50",
        ])
        .expect("should parse");

        let Commands::Chunk {
            path,
            chunk_size,
            chunk_overlap,
        } = cli.command
        else {
            panic!("expected chunk command");
        };
        assert_eq!(path, PathBuf::from("notes.txt"));
        assert_eq!(chunk_size, Some(500));
        assert_eq!(chunk_overlap, Some(50));
    }

    #[test]
    fn query_command() {
        let cli = Cli::try_parse_from([
            "docs-rag", "query", "a.txt", "docs/", "--query", "what is rust", "-k", "5",
            "--scores",
        ])
        .expect("should parse");

        let Commands::Query {
            paths,
            query,
            k,
            scores,
            context,
        } = cli.command
        else {
            panic!("expected query command");
        };
        assert_eq!(paths, vec![PathBuf::from("a.txt"), PathBuf::from("docs/")]);
        assert_eq!(query, "what is rust");
        assert_eq!(k, Some(5));
        assert!(scores);
        assert!(!context);
    }

    #[test]
    fn query_requires_paths_and_text() {
        let missing_paths = Cli::try_parse_from(["docs-rag", "query", "--query", "rust"]);
        assert!(missing_paths.is_err());

        let missing_query = Cli::try_parse_from(["docs-rag", "query", "a.txt"]);
        assert!(missing_query.is_err());
    }

    #[test]
    fn scores_conflicts_with_context() {
        let cli = Cli::try_parse_from([
            "docs-rag", "query", "a.txt", "-q", "rust", "--scores", "--context",
        ]);
        let Err(error) = cli else {
            panic!("conflicting flags should fail");
        };
        assert_eq!(error.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["docs-rag", "invalid"]);
        let Err(error) = cli else {
            panic!("unknown subcommand should fail");
        };
        assert_eq!(error.kind(), ErrorKind::InvalidSubcommand);
    }

    #[test]
    fn help_command() {
        let cli = Cli::try_parse_from(["docs-rag", "--help"]);
        let Err(error) = cli else {
            panic!("help should short-circuit parsing");
        };
        assert_eq!(error.kind(), ErrorKind::DisplayHelp);
    }

    #[test]
    fn preview_takes_head_and_tail() {
        let items: Vec<u32> = (0..10).collect();
        let shown: Vec<u32> = preview(&items).copied().collect();
        assert_eq!(shown, vec![0, 1, 8, 9]);

        let few = [1, 2, 3];
        let shown: Vec<i32> = preview(&few).copied().collect();
        assert_eq!(shown, vec![1, 2, 3]);

        let empty: [u8; 0] = [];
        assert_eq!(preview(&empty).count(), 0);
    }

    #[test]
    fn all_failed_ingest_is_an_error() {
        let result = IngestResult {
            chunks_created: 2,
            ..IngestResult::default()
        };
        assert!(matches!(report_ingest(&result), Err(RagError::Provider(_))));

        let empty = IngestResult::default();
        assert!(report_ingest(&empty).is_ok());
    }
}
