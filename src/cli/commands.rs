//! Command implementations for the nearby CLI.

use anyhow::{Context, Result};
use bytes::Bytes;

use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::ServiceConfig;
use crate::geo::Distance;
use crate::ingest::{IngestRequest, MediaUpload, parse_coordinate};
use crate::server::{self, AppState};
use crate::store::elastic::ElasticDocumentStoreConfig;
use crate::store::schema::CollectionSchema;
use crate::store::{DocumentStoreConfig, provision};

/// Execute a CLI command.
pub async fn execute_command(args: NearbyArgs) -> Result<()> {
    let config = load_config(&args)?;

    match &args.command {
        Command::Serve(serve_args) => run_server(serve_args.clone(), config).await,
        Command::Provision => run_provision(config, &args).await,
        Command::Post(post_args) => ingest_post(post_args.clone(), config, &args).await,
        Command::Search(search_args) => search_posts(search_args.clone(), config, &args).await,
        Command::Cluster(cluster_args) => cluster_posts(cluster_args.clone(), config, &args).await,
    }
}

/// Read the configuration file, if any, and apply global overrides.
fn load_config(args: &NearbyArgs) -> Result<ServiceConfig> {
    let mut config = match &args.config {
        Some(path) => ServiceConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => ServiceConfig::default(),
    };

    if let Some(url) = &args.es_url {
        tracing::debug!(%url, "document store overridden from the command line");
        config.document_store = DocumentStoreConfig::Elasticsearch(ElasticDocumentStoreConfig {
            url: url.clone(),
            ..Default::default()
        });
    }
    Ok(config)
}

async fn assemble(config: &ServiceConfig) -> Result<AppState> {
    let state = AppState::from_config(config).context("assembling the service")?;
    provision(state.documents.as_ref())
        .await
        .context("provisioning collections")?;
    Ok(state)
}

/// Provision collections, then serve HTTP until shut down.
async fn run_server(args: ServeArgs, mut config: ServiceConfig) -> Result<()> {
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    if let Some(key) = args.signing_key {
        config.auth.signing_key = Some(key);
    }

    let state = assemble(&config).await?;
    server::serve(state, config.listen_addr)
        .await
        .context("running the HTTP server")
}

async fn run_provision(config: ServiceConfig, cli_args: &NearbyArgs) -> Result<()> {
    assemble(&config).await?;
    let result = ProvisionResult {
        collections: [CollectionSchema::post(), CollectionSchema::user()]
            .iter()
            .map(|schema| schema.name().to_string())
            .collect(),
    };
    output_result("Collections are provisioned.", &result, cli_args)
}

async fn ingest_post(args: PostArgs, config: ServiceConfig, cli_args: &NearbyArgs) -> Result<()> {
    let media = match &args.media {
        Some(path) => {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("reading media file {}", path.display()))?;
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            Some(MediaUpload::new(filename, Bytes::from(bytes)))
        }
        None => None,
    };

    let state = assemble(&config).await?;
    let record = state
        .pipeline
        .ingest(IngestRequest {
            author: args.author,
            message: args.message,
            lat: parse_coordinate(&args.lat),
            lon: parse_coordinate(&args.lon),
            media,
        })
        .await
        .context("ingesting the post")?;

    output_result("Post ingested.", &record, cli_args)
}

async fn search_posts(args: SearchArgs, config: ServiceConfig, cli_args: &NearbyArgs) -> Result<()> {
    let radius = args
        .range
        .as_deref()
        .map(str::parse::<Distance>)
        .transpose()
        .context("parsing --range")?;

    let state = assemble(&config).await?;
    let records = state
        .search
        .search_by_radius(parse_coordinate(&args.lat), parse_coordinate(&args.lon), radius)
        .await
        .context("searching by radius")?;

    output_result(
        "Posts within range:",
        &RecordList {
            total: records.len(),
            records,
        },
        cli_args,
    )
}

async fn cluster_posts(args: ClusterArgs, config: ServiceConfig, cli_args: &NearbyArgs) -> Result<()> {
    let state = assemble(&config).await?;
    let records = state
        .search
        .search_by_threshold(&args.term, args.min)
        .await
        .context("searching by threshold")?;

    output_result(
        "Posts above the threshold:",
        &RecordList {
            total: records.len(),
            records,
        },
        cli_args,
    )
}
