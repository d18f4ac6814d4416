use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use envconfig::Envconfig;

use crate::config::Config;

pub mod check_hashes;
pub mod search;
pub mod upload_annotations;
pub mod upload_proteins;
pub mod upload_sources;
pub mod upload_vectors;

#[derive(Parser)]
#[command(version, about = "Batch tools for the protein homolog pipeline", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Hash sequences from a FASTA file and store the new ones
    UploadProteins {
        /// Path to the FASTA file to ingest
        fasta: PathBuf,

        /// How to derive identifiers from headers: plain or uniprot
        #[arg(long, default_value = "plain")]
        header_format: String,
    },

    /// Link stored sequences to external identifiers under a named source
    UploadSources {
        /// FASTA file whose headers carry the identifiers
        fasta: PathBuf,

        /// Source vocabulary name, e.g. uniprot (must already exist)
        #[arg(long)]
        source: String,

        #[arg(long, default_value = "uniprot")]
        header_format: String,
    },

    /// Attach JSON annotation payloads to sequences by identifier
    UploadAnnotations {
        /// JSON object mapping identifier -> payload
        json: PathBuf,

        /// Annotation vocabulary name (must already exist)
        #[arg(long)]
        annotation: String,
    },

    /// Bulk-load named embedding vectors into the vector index
    UploadVectors {
        /// FASTA file pairing identifiers with sequences
        fasta: PathBuf,

        /// Named-array file with one embedding per identifier
        vectors: PathBuf,

        #[arg(long, default_value = "uniprot")]
        header_format: String,
    },

    /// Verify every stored fingerprint has a named array in an embedding file
    CheckHashes {
        /// Named-array file keyed by fingerprint
        vectors: PathBuf,
    },

    /// Find homologs for each query sequence and write per-query outputs
    Search {
        /// Query FASTA file
        query: PathBuf,

        /// Embedding backend: ProtT5, ESM2-3B, ESM2-650M or ESM2-150M
        #[arg(long, default_value = "ProtT5")]
        model: String,

        /// Ask the inference service to run on GPU
        #[arg(long)]
        use_gpu: bool,

        /// Directory holding the model files, forwarded to the service
        #[arg(long)]
        model_dir: Option<PathBuf>,

        /// Where the per-query FASTA and JSON files go
        #[arg(long)]
        output_dir: PathBuf,

        /// Exact search instead of the approximate index traversal
        #[arg(long)]
        exact: bool,
    },
}

impl Cli {
    pub async fn run() -> Result<()> {
        let cli = Cli::parse();
        let config = Config::init_from_env().context("failed to load configuration from env")?;

        match cli.command {
            Commands::UploadProteins {
                fasta,
                header_format,
            } => upload_proteins::run(&config, &fasta, &header_format).await,
            Commands::UploadSources {
                fasta,
                source,
                header_format,
            } => upload_sources::run(&config, &fasta, &source, &header_format).await,
            Commands::UploadAnnotations { json, annotation } => {
                upload_annotations::run(&config, &json, &annotation).await
            }
            Commands::UploadVectors {
                fasta,
                vectors,
                header_format,
            } => upload_vectors::run(&config, &fasta, &vectors, &header_format).await,
            Commands::CheckHashes { vectors } => check_hashes::run(&config, &vectors).await,
            Commands::Search {
                query,
                model,
                use_gpu,
                model_dir,
                output_dir,
                exact,
            } => {
                search::run(
                    &config,
                    search::SearchArgs {
                        query,
                        model,
                        use_gpu,
                        model_dir,
                        output_dir,
                        exact,
                    },
                )
                .await
            }
        }
    }
}
