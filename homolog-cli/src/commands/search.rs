use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use common_types::EmbeddingModel;
use embedding_client::RestEmbedder;
use sequence_store::PgSequenceStore;
use vector_index::{QdrantIndex, SearchParams};

use crate::config::Config;
use crate::error::PipelineError;
use crate::pipeline::HomologPipeline;

pub struct SearchArgs {
    pub query: PathBuf,
    pub model: String,
    pub use_gpu: bool,
    pub model_dir: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub exact: bool,
}

pub async fn run(config: &Config, args: SearchArgs) -> Result<()> {
    let model: EmbeddingModel = args.model.parse()?;
    // a malformed query file is an input error, not a per-item skip
    let records = common_fasta::read_fasta(&args.query).map_err(PipelineError::Parse)?;

    let store = Arc::new(
        PgSequenceStore::connect(&config.database_url, config.max_pg_connections)
            .await
            .context("failed to connect to the sequence store")?,
    );
    let index = Arc::new(
        QdrantIndex::new(
            &config.index_url,
            &config.index_collection,
            Duration::from_secs(config.index_timeout_secs),
        )
        .context("failed to build the vector index client")?,
    );
    let embedder = Arc::new(
        RestEmbedder::new(
            &config.embedder_url,
            model,
            args.use_gpu,
            args.model_dir,
            Duration::from_secs(config.embedder_timeout_secs),
        )
        .context("failed to build the embedding client")?,
    );

    let pipeline = HomologPipeline::new(
        store,
        index,
        embedder,
        SearchParams {
            limit: config.search_limit,
            hnsw_ef: config.hnsw_ef,
            exact: args.exact,
        },
    );

    let summary = pipeline.run(&records, &args.output_dir).await;
    println!("{summary}");

    if summary.processed() == 0 {
        bail!("no queries were fully processed");
    }
    Ok(())
}
