//! span-mutator: apply attribute actions and span renaming to an OTLP batch.
//!
//! Reads a protobuf `ExportTraceServiceRequest`, runs it through the processor
//! described by a YAML configuration and writes the mutated batch back out as
//! protobuf.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use otlp_span_mutator::{constants, Config, ConsumerError, SpanMutator, TraceConsumer};
use prost::Message;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Apply attribute actions and span renaming to an OTLP trace batch.
#[derive(Parser, Debug)]
#[command(name = "span-mutator", version, about, long_about = None)]
struct CliArgs {
    /// YAML processor configuration.
    #[arg(short, long, env = constants::env_vars::CONFIG_PATH)]
    config: PathBuf,

    /// Protobuf ExportTraceServiceRequest to read. Defaults to stdin.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Where to write the mutated batch. Defaults to stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// Final stage: encodes the batch and writes it to a file or stdout.
struct ProtobufWriter {
    output: Option<PathBuf>,
}

#[async_trait]
impl TraceConsumer for ProtobufWriter {
    async fn consume(&self, batch: ExportTraceServiceRequest) -> Result<(), ConsumerError> {
        let payload = batch.encode_to_vec();
        match &self.output {
            Some(path) => tokio::fs::write(path, payload).await?,
            None => {
                let mut stdout = tokio::io::stdout();
                stdout.write_all(&payload).await?;
                stdout.flush().await?;
            }
        }
        Ok(())
    }
}

async fn read_input(input: Option<&PathBuf>) -> Result<Vec<u8>> {
    match input {
        Some(path) => tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read input file {}", path.display())),
        None => {
            let mut buffer = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buffer)
                .await
                .context("Failed to read batch from stdin")?;
            Ok(buffer)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // stdout may carry the batch, so logs go to stderr.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(constants::defaults::LOG_FILTER)),
        )
        .init();

    let settings = Config::from_path(&args.config)
        .and_then(|config| config.compile())
        .with_context(|| format!("Invalid configuration in {}", args.config.display()))?;

    let payload = read_input(args.input.as_ref()).await?;
    let batch = ExportTraceServiceRequest::decode(payload.as_slice())
        .context("Failed to decode ExportTraceServiceRequest")?;
    tracing::info!(
        resource_spans = batch.resource_spans.len(),
        "Processing trace batch"
    );

    let mutator = SpanMutator::builder()
        .settings(settings)
        .next(ProtobufWriter {
            output: args.output.clone(),
        })
        .build();

    mutator.start().await?;
    mutator
        .process(batch)
        .await
        .context("Failed to forward mutated batch")?;
    mutator.shutdown().await?;

    Ok(())
}
